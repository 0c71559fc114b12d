//! Supporting documents and the compliance check

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClaimId, DocumentId, UserId};
use crate::claim::{ServiceType, ShaClaim};
use crate::error::ClaimError;

text_enum! {
    /// Kind of supporting document attached to a claim
    pub enum DocumentType {
        LabResults => "LAB_RESULTS",
        DischargeSummary => "DISCHARGE_SUMMARY",
        Prescription => "PRESCRIPTION",
        ReferralLetter => "REFERRAL_LETTER",
        MedicalReport => "MEDICAL_REPORT",
        ImagingReport => "IMAGING_REPORT",
        ConsentForm => "CONSENT_FORM",
        InsuranceCard => "INSURANCE_CARD",
        Identification => "IDENTIFICATION",
        Other => "OTHER",
    }
}

impl DocumentType {
    pub fn label(self) -> &'static str {
        match self {
            DocumentType::LabResults => "Laboratory test results",
            DocumentType::DischargeSummary => "Patient discharge summary",
            DocumentType::Prescription => "Prescription form",
            DocumentType::ReferralLetter => "Referral letter",
            DocumentType::MedicalReport => "Medical report",
            DocumentType::ImagingReport => "Imaging report",
            DocumentType::ConsentForm => "Procedure consent form",
            DocumentType::InsuranceCard => "Patient SHA insurance card copy",
            DocumentType::Identification => "Patient national ID copy",
            DocumentType::Other => "Other supporting document",
        }
    }

    /// Document a service category calls for, if any
    pub fn required_for(service: ServiceType) -> Option<DocumentType> {
        match service {
            ServiceType::Laboratory => Some(DocumentType::LabResults),
            ServiceType::Pharmacy => Some(DocumentType::Prescription),
            ServiceType::Inpatient => Some(DocumentType::DischargeSummary),
            ServiceType::Procedure => Some(DocumentType::ConsentForm),
            ServiceType::Consultation | ServiceType::Imaging | ServiceType::Other => None,
        }
    }
}

/// A document uploaded against a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAttachment {
    pub id: DocumentId,
    pub claim_id: ClaimId,
    pub document_type: DocumentType,
    pub file_name: String,
    pub description: Option<String>,
    pub is_required: bool,
    pub compliance_verified: bool,
    pub verified_by: Option<UserId>,
    pub verified_at: Option<DateTime<Utc>>,
    pub uploaded_by: UserId,
    pub uploaded_at: DateTime<Utc>,
}

impl DocumentAttachment {
    pub fn new(
        claim_id: ClaimId,
        document_type: DocumentType,
        file_name: impl Into<String>,
        is_required: bool,
        uploaded_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DocumentId::new_v7(),
            claim_id,
            document_type,
            file_name: file_name.into(),
            description: None,
            is_required,
            compliance_verified: false,
            verified_by: None,
            verified_at: None,
            uploaded_by,
            uploaded_at: now,
        }
    }

    pub fn verify(&mut self, by: UserId, now: DateTime<Utc>) {
        self.compliance_verified = true;
        self.verified_by = Some(by);
        self.verified_at = Some(now);
    }
}

/// Summary of the required documents on a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub required: usize,
    pub verified: usize,
}

impl ComplianceReport {
    pub fn from_documents(documents: &[DocumentAttachment]) -> Self {
        let required: Vec<_> = documents.iter().filter(|d| d.is_required).collect();
        Self {
            required: required.len(),
            verified: required.iter().filter(|d| d.compliance_verified).count(),
        }
    }

    /// A claim is compliant when it has required documents and all are verified
    pub fn is_compliant(&self) -> bool {
        self.required > 0 && self.required == self.verified
    }

    pub fn ensure_compliant(&self) -> Result<(), ClaimError> {
        if self.is_compliant() {
            Ok(())
        } else {
            Err(ClaimError::ComplianceFailed {
                required: self.required,
                verified: self.verified,
            })
        }
    }
}

/// Documents every claim must carry
pub const ALWAYS_REQUIRED: [DocumentType; 2] = [DocumentType::InsuranceCard, DocumentType::Identification];

text_enum! {
    pub enum ChecklistStatus {
        Uploaded => "uploaded",
        Missing => "missing",
    }
}

/// One required document type and what has been uploaded for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecklistItem {
    pub document_type: DocumentType,
    pub description: &'static str,
    pub required: bool,
    pub uploaded: usize,
    /// At least one upload and every upload of the type verified
    pub verified: bool,
    pub status: ChecklistStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChecklistSummary {
    pub total_required: usize,
    pub uploaded: usize,
    pub verified: usize,
    pub missing: usize,
    pub compliance_ready: bool,
}

/// Required documents for a claim, derived from its service lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentChecklist {
    pub items: Vec<ChecklistItem>,
    pub summary: ChecklistSummary,
}

impl DocumentChecklist {
    pub fn build(claim: &ShaClaim, documents: &[DocumentAttachment]) -> Self {
        let mut required: Vec<DocumentType> = ALWAYS_REQUIRED.to_vec();
        for doc_type in claim
            .services
            .iter()
            .filter_map(|s| s.service_type)
            .filter_map(DocumentType::required_for)
        {
            if !required.contains(&doc_type) {
                required.push(doc_type);
            }
        }

        let items: Vec<ChecklistItem> = required
            .into_iter()
            .map(|document_type| {
                let uploads: Vec<_> = documents.iter().filter(|d| d.document_type == document_type).collect();
                let uploaded = uploads.len();
                ChecklistItem {
                    document_type,
                    description: document_type.label(),
                    required: true,
                    uploaded,
                    verified: uploaded > 0 && uploads.iter().all(|d| d.compliance_verified),
                    status: if uploaded > 0 { ChecklistStatus::Uploaded } else { ChecklistStatus::Missing },
                }
            })
            .collect();

        let uploaded = items.iter().filter(|i| i.uploaded > 0).count();
        let verified = items.iter().filter(|i| i.verified).count();
        let summary = ChecklistSummary {
            total_required: items.len(),
            uploaded,
            verified,
            missing: items.len() - uploaded,
            compliance_ready: verified == items.len(),
        };
        Self { items, summary }
    }
}
