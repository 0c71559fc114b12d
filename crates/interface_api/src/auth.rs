//! Authentication and authorization

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::UserId;

use crate::error::ApiError;

/// Clinic staff roles carried in the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    ClaimsManager,
    ClinicalOfficer,
    Receptionist,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ClaimsManager => "claims_manager",
            Role::ClinicalOfficer => "clinical_officer",
            Role::Receptionist => "receptionist",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "claims_manager" => Ok(Role::ClaimsManager),
            "clinical_officer" => Ok(Role::ClinicalOfficer),
            "receptionist" => Ok(Role::Receptionist),
            other => Err(AuthError::UnknownRole(other.to_string())),
        }
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Login name, recorded as the actor on claims and workflows
    pub username: String,
    /// User's roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    /// The subject as a user id
    pub fn user_id(&self) -> Result<UserId, ApiError> {
        self.sub.parse().map_err(|_| ApiError::Unauthorized)
    }

    pub fn actor(&self) -> &str {
        &self.username
    }
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Unknown role: {0}")]
    UnknownRole(String),
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `user_id` - User identifier
/// * `username` - Login name
/// * `roles` - User's roles
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    user_id: UserId,
    username: &str,
    roles: &[Role],
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: user_id.as_uuid().to_string(),
        username: username.to_string(),
        roles: roles.iter().map(|r| r.as_str().to_string()).collect(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Checks if user has the role; admins pass every check
pub fn has_role(claims: &Claims, required: Role) -> bool {
    claims
        .roles
        .iter()
        .any(|r| r == required.as_str() || r == Role::Admin.as_str())
}

/// Fails with `Forbidden` unless the user holds one of the roles
pub fn require_any(claims: &Claims, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.iter().any(|role| has_role(claims, *role)) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "requires one of: {}",
            allowed.iter().map(Role::as_str).collect::<Vec<_>>().join(", ")
        )))
    }
}

/// Role sets per route group
pub mod permissions {
    use super::Role;

    pub const CLAIM_READ: &[Role] = &[Role::ClaimsManager, Role::ClinicalOfficer, Role::Receptionist];
    pub const CLAIM_CREATE: &[Role] = &[Role::ClinicalOfficer];
    pub const CLAIM_DOCUMENTS: &[Role] = &[Role::ClaimsManager, Role::ClinicalOfficer];
    pub const CLAIM_SUBMIT: &[Role] = &[Role::ClaimsManager];
    pub const CLAIM_DELETE: &[Role] = &[Role::Admin];
    pub const INVOICE: &[Role] = &[Role::ClaimsManager, Role::ClinicalOfficer];
    pub const BATCH: &[Role] = &[Role::ClaimsManager];
    pub const WORKFLOW: &[Role] = &[Role::ClaimsManager, Role::ClinicalOfficer];
    pub const WORKFLOW_CANCEL: &[Role] = &[Role::ClaimsManager];
    pub const JOBS: &[Role] = &[Role::ClaimsManager];
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_token_round_trip() {
        let user = UserId::new();
        let token = create_token(user, "claims.clerk", &[Role::ClaimsManager], SECRET, 60).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.user_id().unwrap(), user);
        assert_eq!(claims.actor(), "claims.clerk");
        assert_eq!(claims.roles, vec!["claims_manager"]);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token(UserId::new(), "x", &[Role::Admin], SECRET, 60).unwrap();
        assert!(matches!(validate_token(&token, "other"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_admin_passes_every_role_check() {
        let token = create_token(UserId::new(), "root", &[Role::Admin], SECRET, 60).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();
        assert!(require_any(&claims, permissions::BATCH).is_ok());
        assert!(require_any(&claims, permissions::CLAIM_CREATE).is_ok());
    }

    #[test]
    fn test_receptionist_cannot_manage_batches() {
        let token = create_token(UserId::new(), "front.desk", &[Role::Receptionist], SECRET, 60).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();
        assert!(require_any(&claims, permissions::CLAIM_READ).is_ok());
        assert!(matches!(require_any(&claims, permissions::BATCH), Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("clinical_officer".parse::<Role>().unwrap(), Role::ClinicalOfficer);
        assert!("doctor".parse::<Role>().is_err());
    }
}
