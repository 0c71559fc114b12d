//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for claims and background jobs.
//! These fixtures are designed to be consistent and predictable for unit tests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{ClaimId, Currency, Money, PatientId, UserId, VisitId};
use domain_claims::{Diagnosis, DocumentType, NewDocument, ServiceItem};
use domain_jobs::Notification;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Standard outpatient consultation fee
    pub fn kes_consultation() -> Money {
        Money::new(dec!(1500.00), Currency::KES)
    }

    /// Standard laboratory test fee
    pub fn kes_lab_test() -> Money {
        Money::new(dec!(850.00), Currency::KES)
    }

    /// Consultation plus one lab test
    pub fn kes_outpatient_total() -> Money {
        Money::new(dec!(2350.00), Currency::KES)
    }

    /// Creates a zero amount
    pub fn kes_zero() -> Money {
        Money::zero(Currency::KES)
    }

    /// Creates a USD amount for currency mismatch tests
    pub fn usd_100() -> Money {
        Money::new(dec!(100.00), Currency::USD)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Standard visit date
    pub fn visit_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
    }

    /// Morning of the standard visit
    pub fn visit_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 8, 30, 0).unwrap()
    }

    /// A fixed "today" for inventory checks
    pub fn inventory_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    /// Creates a deterministic patient ID for testing
    pub fn patient_id() -> PatientId {
        PatientId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap())
    }

    /// Creates a deterministic visit ID for testing
    pub fn visit_id() -> VisitId {
        VisitId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440002").unwrap())
    }

    /// Creates a deterministic claim ID for testing
    pub fn claim_id() -> ClaimId {
        ClaimId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440003").unwrap())
    }

    /// Creates a deterministic clerk user ID for testing
    pub fn clerk_id() -> UserId {
        UserId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440004").unwrap())
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    /// Valid 9 digit SHA member number
    pub fn member_number() -> &'static str {
        "123456789"
    }

    pub fn patient_name() -> &'static str {
        "Amina Wanjiru"
    }

    pub fn clerk() -> &'static str {
        "claims.clerk"
    }

    pub fn admin_email() -> &'static str {
        "admin@sethclinic.com"
    }

    pub fn phone() -> &'static str {
        "+254712345678"
    }
}

/// Fixture for claim content
pub struct ClaimFixtures;

impl ClaimFixtures {
    pub fn primary_diagnosis() -> Diagnosis {
        Diagnosis::new("J06.9", "Acute upper respiratory infection")
    }

    pub fn secondary_diagnosis() -> Diagnosis {
        Diagnosis::new("R50.9", "Fever, unspecified")
    }

    /// Consultation and lab test lines totalling [`MoneyFixtures::kes_outpatient_total`]
    pub fn outpatient_services() -> Vec<ServiceItem> {
        vec![
            ServiceItem::new("General consultation", 1, MoneyFixtures::kes_consultation()).with_code("CONS-01"),
            ServiceItem::new("Full blood count", 1, MoneyFixtures::kes_lab_test()).with_code("LAB-FBC"),
        ]
    }

    /// A required document of the given type
    pub fn required_document(document_type: DocumentType) -> NewDocument {
        NewDocument {
            document_type,
            file_name: format!("{}.pdf", document_type.as_str().to_lowercase()),
            description: None,
            is_required: true,
        }
    }
}

/// Fixture for notification jobs
pub struct NotificationFixtures;

impl NotificationFixtures {
    pub fn email(message: &str) -> Notification {
        Notification::new(StringFixtures::admin_email(), message)
    }

    pub fn sms(message: &str) -> Notification {
        Notification::new(StringFixtures::phone(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outpatient_services_sum_to_total() {
        let services = ClaimFixtures::outpatient_services();
        let total = Money::sum(Currency::KES, services.iter().map(|s| &s.total)).unwrap();
        assert_eq!(total, MoneyFixtures::kes_outpatient_total());
    }

    #[test]
    fn test_id_fixtures_are_deterministic() {
        assert_eq!(IdFixtures::claim_id(), IdFixtures::claim_id());
        assert_ne!(IdFixtures::patient_id().as_uuid(), IdFixtures::visit_id().as_uuid());
    }
}
