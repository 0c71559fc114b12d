//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.

use chrono::{NaiveDate, Utc};
use fake::faker::name::en::Name;
use fake::Fake;
use core_kernel::{Money, PatientId, UserId, VisitId};
use domain_claims::{BatchType, ClaimStatus, Diagnosis, NewBatch, NewClaim, ServiceItem, ShaClaim};

use crate::fixtures::{ClaimFixtures, IdFixtures, MoneyFixtures, StringFixtures, TemporalFixtures};

/// Builder for claim creation input
pub struct NewClaimBuilder {
    patient_id: PatientId,
    visit_id: VisitId,
    patient_name: String,
    member_number: String,
    visit_date: NaiveDate,
    primary_diagnosis: Diagnosis,
    secondary_diagnoses: Vec<Diagnosis>,
    services: Vec<ServiceItem>,
    claim_amount: Money,
    notes: Option<String>,
    created_by: UserId,
}

impl Default for NewClaimBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewClaimBuilder {
    /// Creates a builder for a valid outpatient claim
    pub fn new() -> Self {
        Self {
            patient_id: PatientId::new(),
            visit_id: VisitId::new(),
            patient_name: StringFixtures::patient_name().to_string(),
            member_number: StringFixtures::member_number().to_string(),
            visit_date: TemporalFixtures::visit_date(),
            primary_diagnosis: ClaimFixtures::primary_diagnosis(),
            secondary_diagnoses: Vec::new(),
            services: ClaimFixtures::outpatient_services(),
            claim_amount: MoneyFixtures::kes_outpatient_total(),
            notes: None,
            created_by: IdFixtures::clerk_id(),
        }
    }

    /// Creates a builder with a random patient name and member number
    pub fn random() -> Self {
        let member_number: u32 = (100_000_000..999_999_999).fake();
        Self::new()
            .with_patient_name(Name().fake::<String>())
            .with_member_number(member_number.to_string())
    }

    pub fn with_patient_id(mut self, id: PatientId) -> Self {
        self.patient_id = id;
        self
    }

    pub fn with_patient_name(mut self, name: impl Into<String>) -> Self {
        self.patient_name = name.into();
        self
    }

    pub fn with_member_number(mut self, number: impl Into<String>) -> Self {
        self.member_number = number.into();
        self
    }

    pub fn with_visit_date(mut self, date: NaiveDate) -> Self {
        self.visit_date = date;
        self
    }

    pub fn with_primary_diagnosis(mut self, diagnosis: Diagnosis) -> Self {
        self.primary_diagnosis = diagnosis;
        self
    }

    pub fn with_secondary_diagnosis(mut self, diagnosis: Diagnosis) -> Self {
        self.secondary_diagnoses.push(diagnosis);
        self
    }

    /// Replaces the service lines and sets the claim amount to their sum
    pub fn with_services(mut self, services: Vec<ServiceItem>) -> Self {
        if let Some(first) = services.first() {
            let currency = first.total.currency();
            if let Ok(total) = Money::sum(currency, services.iter().map(|s| &s.total)) {
                self.claim_amount = total;
            }
        }
        self.services = services;
        self
    }

    /// Sets the claim amount without touching the service lines
    pub fn with_claim_amount(mut self, amount: Money) -> Self {
        self.claim_amount = amount;
        self
    }

    /// Drops all service lines, keeping the claim amount
    pub fn without_services(mut self) -> Self {
        self.services.clear();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_created_by(mut self, user: UserId) -> Self {
        self.created_by = user;
        self
    }

    pub fn build(self) -> NewClaim {
        NewClaim {
            patient_id: self.patient_id,
            visit_id: self.visit_id,
            patient_name: self.patient_name,
            member_number: self.member_number,
            visit_date: self.visit_date,
            primary_diagnosis: self.primary_diagnosis,
            secondary_diagnoses: self.secondary_diagnoses,
            services: self.services,
            claim_amount: self.claim_amount,
            notes: self.notes,
            created_by: self.created_by,
        }
    }

    /// Builds a stored claim directly, bypassing numbering
    ///
    /// # Panics
    ///
    /// Panics if the input is invalid.
    pub fn build_claim(self, claim_number: &str) -> ShaClaim {
        ShaClaim::create(self.build(), claim_number.to_string(), Utc::now()).expect("valid test claim")
    }

    /// Builds a stored claim that is ready to submit
    pub fn build_ready_claim(self, claim_number: &str) -> ShaClaim {
        let mut claim = self.build_claim(claim_number);
        claim
            .transition_to(ClaimStatus::ReadyToSubmit, Utc::now())
            .expect("draft claims can become ready");
        claim
    }
}

/// Builder for batch creation input
pub struct NewBatchBuilder {
    batch_type: BatchType,
    batch_date: NaiveDate,
    claim_ids: Vec<core_kernel::ClaimId>,
    created_by: String,
}

impl Default for NewBatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewBatchBuilder {
    /// Creates a builder for a custom batch dated today
    pub fn new() -> Self {
        Self {
            batch_type: BatchType::Custom,
            batch_date: Utc::now().date_naive(),
            claim_ids: Vec::new(),
            created_by: StringFixtures::clerk().to_string(),
        }
    }

    pub fn with_batch_type(mut self, batch_type: BatchType) -> Self {
        self.batch_type = batch_type;
        self
    }

    pub fn with_batch_date(mut self, date: NaiveDate) -> Self {
        self.batch_date = date;
        self
    }

    pub fn with_claims(mut self, ids: impl IntoIterator<Item = core_kernel::ClaimId>) -> Self {
        self.claim_ids.extend(ids);
        self
    }

    pub fn build(self) -> NewBatch {
        NewBatch {
            batch_type: self.batch_type,
            batch_date: self.batch_date,
            claim_ids: self.claim_ids,
            created_by: self.created_by,
        }
    }
}
