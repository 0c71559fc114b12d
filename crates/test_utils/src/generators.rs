//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use chrono::{Duration, NaiveDate};
use core_kernel::{Currency, Money, PatientId, UserId, VisitId};
use domain_claims::{Diagnosis, NewClaim, ServiceItem};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for valid 9 digit SHA member numbers
pub fn member_number_strategy() -> impl Strategy<Value = String> {
    "[0-9]{9}"
}

/// Strategy for strings that are not valid member numbers
pub fn invalid_member_number_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9]{1,8}",
        "[0-9]{10,12}",
        "[0-9]{4}[A-Z][0-9]{4}",
    ]
}

/// Strategy for positive KES prices in whole cents up to one million shillings
pub fn kes_price_strategy() -> impl Strategy<Value = Money> {
    (1i64..100_000_000i64).prop_map(|cents| Money::new(Decimal::new(cents, 2), Currency::KES))
}

/// Strategy for service lines with consistent totals
pub fn service_item_strategy() -> impl Strategy<Value = ServiceItem> {
    ("[A-Z][a-z]{3,12}", 1u32..10u32, kes_price_strategy())
        .prop_map(|(description, quantity, unit_price)| ServiceItem::new(description, quantity, unit_price))
}

/// Strategy for ICD-10 style diagnoses
pub fn diagnosis_strategy() -> impl Strategy<Value = Diagnosis> {
    ("[A-Z][0-9]{2}\\.[0-9]", "[A-Z][a-z]{4,20}").prop_map(|(code, description)| Diagnosis::new(code, description))
}

/// Strategy for visit dates within 2024
pub fn visit_date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..366i64).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
    })
}

/// Strategy for claim input that passes validation
///
/// The claim amount is always the sum of the generated service lines.
pub fn new_claim_strategy() -> impl Strategy<Value = NewClaim> {
    (
        member_number_strategy(),
        "[A-Z][a-z]{2,10} [A-Z][a-z]{2,10}",
        visit_date_strategy(),
        diagnosis_strategy(),
        prop::collection::vec(service_item_strategy(), 1..5),
    )
        .prop_map(|(member_number, patient_name, visit_date, primary_diagnosis, services)| {
            let claim_amount = Money::sum(Currency::KES, services.iter().map(|s| &s.total))
                .unwrap_or_else(|_| Money::zero(Currency::KES));
            NewClaim {
                patient_id: PatientId::new(),
                visit_id: VisitId::new(),
                patient_name,
                member_number,
                visit_date,
                primary_diagnosis,
                secondary_diagnoses: Vec::new(),
                services,
                claim_amount,
                notes: None,
                created_by: UserId::new(),
            }
        })
}
