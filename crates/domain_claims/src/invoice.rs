//! SHA invoices generated from verified claims

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClaimId, InvoiceId, Money, PatientId};
use crate::claim::{ComplianceStatus, Diagnosis, ServiceItem, ShaClaim};
use crate::error::ClaimError;

text_enum! {
    /// Invoice status
    pub enum InvoiceStatus {
        Generated => "generated",
        Printed => "printed",
        Submitted => "submitted",
        Paid => "paid",
        Rejected => "rejected",
    }
}

impl InvoiceStatus {
    pub fn can_transition_to(self, target: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, target),
            (Generated, Printed) |
            (Printed, Submitted) |
            (Submitted, Paid) |
            (Submitted, Rejected)
        )
    }
}

/// Printable invoice for a single claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaInvoice {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub claim_id: ClaimId,
    pub claim_number: String,
    pub patient_id: PatientId,
    pub patient_name: String,
    pub member_number: String,
    pub visit_date: NaiveDate,
    pub diagnosis: Diagnosis,
    pub services: Vec<ServiceItem>,
    pub total_amount: Money,
    pub status: InvoiceStatus,
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
    pub printed_by: Option<String>,
    pub printed_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl ShaInvoice {
    /// Generates an invoice from a compliance-verified claim
    pub fn from_claim(
        claim: &ShaClaim,
        invoice_number: String,
        generated_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, ClaimError> {
        if claim.compliance_status != ComplianceStatus::Verified {
            return Err(ClaimError::ComplianceNotVerified);
        }

        let total_amount = if claim.services.is_empty() {
            claim.claim_amount
        } else {
            Money::sum(claim.currency(), claim.services.iter().map(|s| &s.total))?
        };

        Ok(Self {
            id: InvoiceId::new_v7(),
            invoice_number,
            claim_id: claim.id,
            claim_number: claim.claim_number.clone(),
            patient_id: claim.patient_id,
            patient_name: claim.patient_name.clone(),
            member_number: claim.member_number.clone(),
            visit_date: claim.visit_date,
            diagnosis: claim.primary_diagnosis.clone(),
            services: claim.services.clone(),
            total_amount,
            status: InvoiceStatus::Generated,
            generated_by: generated_by.into(),
            generated_at: now,
            printed_by: None,
            printed_at: None,
            submitted_at: None,
        })
    }

    fn transition_to(&mut self, target: InvoiceStatus) -> Result<(), ClaimError> {
        if !self.status.can_transition_to(target) {
            return Err(ClaimError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        Ok(())
    }

    /// Records who printed the invoice and when
    pub fn mark_printed(&mut self, by: impl Into<String>, now: DateTime<Utc>) -> Result<(), ClaimError> {
        self.transition_to(InvoiceStatus::Printed)?;
        self.printed_by = Some(by.into());
        self.printed_at = Some(now);
        Ok(())
    }

    pub fn mark_submitted(&mut self, now: DateTime<Utc>) -> Result<(), ClaimError> {
        self.transition_to(InvoiceStatus::Submitted)?;
        self.submitted_at = Some(now);
        Ok(())
    }

    /// SHA paid the claim behind this invoice
    pub fn mark_paid(&mut self) -> Result<(), ClaimError> {
        self.transition_to(InvoiceStatus::Paid)
    }

    /// SHA rejected the claim behind this invoice
    pub fn mark_rejected(&mut self) -> Result<(), ClaimError> {
        self.transition_to(InvoiceStatus::Rejected)
    }

    pub fn is_printed(&self) -> bool {
        self.printed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::NewClaim;
    use core_kernel::{UserId, VisitId};
    use rust_decimal_macros::dec;

    fn verified_claim() -> ShaClaim {
        let input = NewClaim {
            patient_id: PatientId::new(),
            visit_id: VisitId::new(),
            patient_name: "Otieno Ouma".into(),
            member_number: "987654321".into(),
            visit_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            primary_diagnosis: Diagnosis::new("J06.9", "Acute upper respiratory infection"),
            secondary_diagnoses: vec![],
            services: vec![ServiceItem::new("Consultation", 1, Money::kes(dec!(1000)))],
            claim_amount: Money::kes(dec!(1000)),
            notes: None,
            created_by: UserId::new(),
        };
        let mut claim = ShaClaim::create(input, "SHA-202405-000001".into(), Utc::now()).unwrap();
        claim.set_compliance(ComplianceStatus::Verified, Utc::now());
        claim
    }

    #[test]
    fn test_invoice_copies_claim_lines() {
        let claim = verified_claim();
        let invoice = ShaInvoice::from_claim(&claim, "SHA-INV-202405-000001".into(), "system", Utc::now()).unwrap();
        assert_eq!(invoice.claim_id, claim.id);
        assert_eq!(invoice.total_amount, Money::kes(dec!(1000)));
        assert_eq!(invoice.status, InvoiceStatus::Generated);
        assert_eq!(invoice.generated_by, "system");
    }

    #[test]
    fn test_unverified_claim_cannot_be_invoiced() {
        let mut claim = verified_claim();
        claim.set_compliance(ComplianceStatus::Pending, Utc::now());
        let result = ShaInvoice::from_claim(&claim, "SHA-INV-202405-000002".into(), "system", Utc::now());
        assert!(matches!(result, Err(ClaimError::ComplianceNotVerified)));
    }

    #[test]
    fn test_print_only_once() {
        let claim = verified_claim();
        let mut invoice = ShaInvoice::from_claim(&claim, "SHA-INV-202405-000003".into(), "system", Utc::now()).unwrap();
        invoice.mark_printed("reception", Utc::now()).unwrap();
        assert!(invoice.is_printed());
        assert!(invoice.mark_printed("reception", Utc::now()).is_err());
    }

    #[test]
    fn test_settlement_follows_submission() {
        let claim = verified_claim();
        let mut invoice = ShaInvoice::from_claim(&claim, "SHA-INV-202405-000004".into(), "system", Utc::now()).unwrap();
        assert!(invoice.mark_paid().is_err());

        invoice.mark_printed("reception", Utc::now()).unwrap();
        invoice.mark_submitted(Utc::now()).unwrap();
        invoice.mark_paid().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert!(invoice.mark_rejected().is_err());
    }

    #[test]
    fn test_submitted_invoice_can_be_rejected() {
        let claim = verified_claim();
        let mut invoice = ShaInvoice::from_claim(&claim, "SHA-INV-202405-000005".into(), "system", Utc::now()).unwrap();
        invoice.mark_printed("reception", Utc::now()).unwrap();
        invoice.mark_submitted(Utc::now()).unwrap();
        invoice.mark_rejected().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Rejected);
    }
}
