//! Request and response bodies

pub mod claims;
pub mod batches;
pub mod workflows;
pub mod jobs;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses an optional text code from a query string
pub(crate) fn parse_optional<T>(value: Option<&str>, field: &str) -> Result<Option<T>, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<T>().map_err(|e| ApiError::BadRequest(format!("{field}: {e}"))))
        .transpose()
}
