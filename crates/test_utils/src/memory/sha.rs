use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_claims::{ShaBatchPayload, ShaClaimPayload, ShaGateway, ShaStatusResponse, ShaSubmissionResponse};

use super::lock;

/// Provider code the fake reports
pub const TEST_PROVIDER_CODE: &str = "SETH-CLINIC-TEST";

#[derive(Default)]
struct State {
    next_reference: u32,
    submit_failures: VecDeque<PortError>,
    status_failures: VecDeque<PortError>,
    claim_statuses: HashMap<String, ShaStatusResponse>,
    batch_statuses: HashMap<String, ShaStatusResponse>,
    submitted_claims: Vec<ShaClaimPayload>,
    submitted_batches: Vec<ShaBatchPayload>,
}

/// Scriptable stand-in for the SHA API
///
/// Submissions succeed with references `SHA-REF-0001`, `SHA-REF-0002`, ...
/// unless a failure was queued with [`FakeShaGateway::fail_next_submission`].
/// Status lookups answer `pending` for unknown references.
#[derive(Default)]
pub struct FakeShaGateway {
    state: Mutex<State>,
}

impl FakeShaGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_submission(&self, error: PortError) {
        lock(&self.state).submit_failures.push_back(error);
    }

    pub fn fail_next_status(&self, error: PortError) {
        lock(&self.state).status_failures.push_back(error);
    }

    pub fn set_claim_status(&self, reference: &str, status: &str, approved_amount: Option<Decimal>) {
        lock(&self.state)
            .claim_statuses
            .insert(reference.to_string(), status_response(status, approved_amount));
    }

    pub fn reject_claim(&self, reference: &str, reason: &str) {
        let response = ShaStatusResponse {
            status: "rejected".to_string(),
            approved_amount: None,
            rejection_reason: Some(reason.to_string()),
        };
        lock(&self.state).claim_statuses.insert(reference.to_string(), response);
    }

    pub fn set_batch_status(&self, reference: &str, status: &str) {
        lock(&self.state)
            .batch_statuses
            .insert(reference.to_string(), status_response(status, None));
    }

    pub fn submitted_claims(&self) -> Vec<ShaClaimPayload> {
        lock(&self.state).submitted_claims.clone()
    }

    pub fn submitted_batches(&self) -> Vec<ShaBatchPayload> {
        lock(&self.state).submitted_batches.clone()
    }

    fn next_reference(state: &mut State) -> String {
        state.next_reference += 1;
        format!("SHA-REF-{:04}", state.next_reference)
    }
}

fn status_response(status: &str, approved_amount: Option<Decimal>) -> ShaStatusResponse {
    ShaStatusResponse {
        status: status.to_string(),
        approved_amount,
        rejection_reason: None,
    }
}

impl DomainPort for FakeShaGateway {}

#[async_trait]
impl HealthCheckable for FakeShaGateway {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("fake-sha-gateway")
    }
}

#[async_trait]
impl ShaGateway for FakeShaGateway {
    fn provider_code(&self) -> &str {
        TEST_PROVIDER_CODE
    }

    async fn submit_claim(&self, payload: &ShaClaimPayload) -> Result<ShaSubmissionResponse, PortError> {
        let mut state = lock(&self.state);
        if let Some(error) = state.submit_failures.pop_front() {
            return Err(error);
        }
        state.submitted_claims.push(payload.clone());
        Ok(ShaSubmissionResponse {
            reference: Some(Self::next_reference(&mut state)),
            status: Some("received".to_string()),
            ..Default::default()
        })
    }

    async fn submit_batch(&self, payload: &ShaBatchPayload) -> Result<ShaSubmissionResponse, PortError> {
        let mut state = lock(&self.state);
        if let Some(error) = state.submit_failures.pop_front() {
            return Err(error);
        }
        state.submitted_batches.push(payload.clone());
        Ok(ShaSubmissionResponse {
            batch_reference: Some(Self::next_reference(&mut state)),
            status: Some("received".to_string()),
            ..Default::default()
        })
    }

    async fn claim_status(&self, reference: &str) -> Result<ShaStatusResponse, PortError> {
        let mut state = lock(&self.state);
        if let Some(error) = state.status_failures.pop_front() {
            return Err(error);
        }
        Ok(state
            .claim_statuses
            .get(reference)
            .cloned()
            .unwrap_or_else(|| status_response("pending", None)))
    }

    async fn batch_status(&self, reference: &str) -> Result<ShaStatusResponse, PortError> {
        let mut state = lock(&self.state);
        if let Some(error) = state.status_failures.pop_front() {
            return Err(error);
        }
        Ok(state
            .batch_statuses
            .get(reference)
            .cloned()
            .unwrap_or_else(|| status_response("pending", None)))
    }
}
