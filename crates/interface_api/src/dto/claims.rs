//! Claims, documents and invoice DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use core_kernel::{Money, UserId};
use domain_claims::{
    ClaimUpdate, ComplianceReport, Diagnosis, DocumentAttachment, DocumentType, InvoiceFilter,
    InvoiceStatus, NewClaim, NewDocument, ServiceItem, ServiceType, ShaClaim,
};

use crate::error::ApiError;

fn validate_member_number(value: &str) -> Result<(), ValidationError> {
    if value.len() == 9 && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        let mut error = ValidationError::new("member_number");
        error.message = Some("SHA member number must be exactly 9 digits".into());
        Err(error)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct DiagnosisRequest {
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    #[validate(length(min = 1))]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ServiceItemRequest {
    pub service_code: Option<String>,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(range(min = 1))]
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Service category; drives the supporting documents a claim needs
    pub service_type: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClaimRequest {
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub patient_name: String,
    #[validate(custom(function = "validate_member_number"))]
    pub member_number: String,
    pub visit_date: NaiveDate,
    #[validate(nested)]
    pub primary_diagnosis: DiagnosisRequest,
    #[serde(default)]
    #[validate(nested)]
    pub secondary_diagnoses: Vec<DiagnosisRequest>,
    #[serde(default)]
    #[validate(nested)]
    pub services: Vec<ServiceItemRequest>,
    pub claim_amount: Decimal,
    pub notes: Option<String>,
}

impl CreateClaimRequest {
    pub fn into_new_claim(self, created_by: UserId) -> Result<NewClaim, ApiError> {
        let diagnosis = |d: DiagnosisRequest| Diagnosis::new(d.code, d.description);
        let services = self
            .services
            .into_iter()
            .map(|s| {
                let mut item = ServiceItem::new(s.description, s.quantity, Money::kes(s.unit_price));
                if let Some(code) = s.service_code {
                    item = item.with_code(code);
                }
                if let Some(kind) = s.service_type {
                    let kind: ServiceType = kind.parse().map_err(|e: domain_claims::ClaimError| {
                        ApiError::validation(e.to_string())
                    })?;
                    item = item.with_type(kind);
                }
                Ok(item)
            })
            .collect::<Result<Vec<_>, ApiError>>()?;
        Ok(NewClaim {
            patient_id: self.patient_id.into(),
            visit_id: self.visit_id.into(),
            patient_name: self.patient_name,
            member_number: self.member_number,
            visit_date: self.visit_date,
            primary_diagnosis: diagnosis(self.primary_diagnosis),
            secondary_diagnoses: self.secondary_diagnoses.into_iter().map(diagnosis).collect(),
            services,
            claim_amount: Money::kes(self.claim_amount),
            notes: self.notes,
            created_by,
        })
    }
}

/// Body for `PUT /sha-claims/:id`
///
/// `status: "draft"` sends a rejected claim back for rework and cannot be
/// combined with field changes.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateClaimRequest {
    pub status: Option<String>,
    pub claim_amount: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl UpdateClaimRequest {
    pub fn into_update(self) -> ClaimUpdate {
        ClaimUpdate {
            claim_amount: self.claim_amount.map(Money::kes),
            notes: self.notes,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ClaimListQuery {
    pub status: Option<String>,
    pub patient_id: Option<Uuid>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceListQuery {
    pub status: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Matches invoice number, claim number or patient name
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl InvoiceListQuery {
    pub fn into_filter(self) -> Result<InvoiceFilter, ApiError> {
        Ok(InvoiceFilter {
            status: crate::dto::parse_optional::<InvoiceStatus>(self.status.as_deref(), "status")?,
            from: self.from,
            to: self.to,
            search: self.search.filter(|s| !s.trim().is_empty()),
            limit: self.limit,
            offset: self.offset,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub id: Uuid,
    pub claim_number: String,
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    pub patient_name: String,
    pub member_number: String,
    pub visit_date: NaiveDate,
    pub primary_diagnosis: Diagnosis,
    pub secondary_diagnoses: Vec<Diagnosis>,
    pub services: Vec<ServiceItem>,
    pub claim_amount: Money,
    pub approved_amount: Option<Money>,
    pub status: String,
    pub compliance_status: String,
    pub batch_id: Option<Uuid>,
    pub sha_reference: Option<String>,
    pub submission_date: Option<DateTime<Utc>>,
    pub approval_date: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ShaClaim> for ClaimResponse {
    fn from(claim: ShaClaim) -> Self {
        Self {
            id: claim.id.into(),
            claim_number: claim.claim_number,
            patient_id: claim.patient_id.into(),
            visit_id: claim.visit_id.into(),
            patient_name: claim.patient_name,
            member_number: claim.member_number,
            visit_date: claim.visit_date,
            primary_diagnosis: claim.primary_diagnosis,
            secondary_diagnoses: claim.secondary_diagnoses,
            services: claim.services,
            claim_amount: claim.claim_amount,
            approved_amount: claim.approved_amount,
            status: claim.status.to_string(),
            compliance_status: claim.compliance_status.to_string(),
            batch_id: claim.batch_id.map(Uuid::from),
            sha_reference: claim.sha_reference,
            submission_date: claim.submission_date,
            approval_date: claim.approval_date,
            rejection_reason: claim.rejection_reason,
            notes: claim.notes,
            created_at: claim.created_at,
            updated_at: claim.updated_at,
        }
    }
}

/// A claim with its documents and compliance state
#[derive(Debug, Serialize)]
pub struct ClaimDetailResponse {
    #[serde(flatten)]
    pub claim: ClaimResponse,
    pub documents: Vec<DocumentAttachment>,
    pub compliance: ComplianceReport,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddDocumentRequest {
    pub document_type: String,
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_required: bool,
}

impl AddDocumentRequest {
    pub fn into_new_document(self) -> Result<NewDocument, ApiError> {
        let document_type: DocumentType = self
            .document_type
            .parse()
            .map_err(|e: domain_claims::ClaimError| ApiError::validation(e.to_string()))?;
        Ok(NewDocument {
            document_type,
            file_name: self.file_name,
            description: self.description,
            is_required: self.is_required,
        })
    }
}
