//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for domain types that give
//! more meaningful error messages than standard assertions.

use core_kernel::Money;
use domain_claims::{ClaimError, ClaimStatus, ShaClaim, StepName, StepStatus, WorkflowInstance};
use domain_jobs::{JobRecord, JobState};
use rust_decimal::Decimal;

/// Asserts that two Money values are approximately equal within a tolerance
///
/// # Panics
///
/// Panics if the currencies don't match or the amounts differ by more than tolerance
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );

    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

/// Asserts a claim's lifecycle status
pub fn assert_claim_status(claim: &ShaClaim, expected: ClaimStatus) {
    assert_eq!(
        claim.status, expected,
        "Claim {} has status {}, expected {}",
        claim.claim_number, claim.status, expected
    );
}

/// Asserts the status of one workflow step
pub fn assert_step_status(workflow: &WorkflowInstance, step: StepName, expected: StepStatus) {
    let actual = workflow
        .step(step)
        .unwrap_or_else(|e| panic!("Workflow {}: {}", workflow.id, e))
        .status;
    assert_eq!(actual, expected, "Step {} is {}, expected {}", step, actual, expected);
}

/// Asserts a job's state and attempt count
pub fn assert_job_state(job: &JobRecord, expected: JobState, attempts: u32) {
    assert_eq!(job.state, expected, "Job {} is {:?}, expected {:?}", job.id, job.state, expected);
    assert_eq!(job.attempts, attempts, "Job {} attempts", job.id);
}

/// Asserts that a result failed with a validation error
pub fn assert_validation_error<T: std::fmt::Debug>(result: Result<T, ClaimError>) {
    match result {
        Err(ClaimError::Validation(_)) => {}
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_approx_eq_within_tolerance() {
        let a = Money::new(dec!(100.00), Currency::KES);
        let b = Money::new(dec!(100.004), Currency::KES);
        assert_money_approx_eq(&a, &b, dec!(0.01));
    }

    #[test]
    #[should_panic(expected = "Currency mismatch")]
    fn test_money_approx_eq_currency_mismatch() {
        let a = Money::new(dec!(100), Currency::KES);
        let b = Money::new(dec!(100), Currency::USD);
        assert_money_approx_eq(&a, &b, dec!(0.01));
    }
}
