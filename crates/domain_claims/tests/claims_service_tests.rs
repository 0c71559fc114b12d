//! Claims Service Tests
//!
//! Exercises `ClaimsService` against the in-memory store and the scriptable
//! SHA gateway from `test_utils`.
//!
//! # Test Organization
//!
//! - `claim_creation` - numbering and validation
//! - `documents` - attachments and the compliance report
//! - `invoices` - generation, printing and the claim status hand-off
//! - `batches` - selection, deletion and printing
//! - `submission` - single and batch submission with logging
//! - `reconciliation` - SHA status polling and payment checks
//! - `rework` - returning rejected claims to draft and resubmitting
//! - `maintenance` - edits, deletion, checklists, listings and statistics

use std::sync::Arc;

use chrono::{Duration, Utc};
use core_kernel::{ClaimId, PortError, UserId};
use domain_claims::{
    BatchStatus, ClaimError, ClaimFilter, ClaimStatus, ClaimStore, ClaimUpdate, ClaimsService, ComplianceStatus,
    DocumentType, InvoiceFilter, InvoiceStatus, PaymentTracking, ServiceItem, ServiceType, ShaClaim,
    SubmissionStatus, SubmissionType,
};
use rust_decimal_macros::dec;
use test_utils::{
    assert_claim_status, assert_validation_error, ClaimFixtures, FakeShaGateway, InMemoryClaimsDb,
    MoneyFixtures, NewBatchBuilder, NewClaimBuilder, TEST_PROVIDER_CODE,
};

// ============================================================================
// TEST FIXTURES
// ============================================================================

struct Harness {
    db: Arc<InMemoryClaimsDb>,
    sha: Arc<FakeShaGateway>,
    service: ClaimsService,
}

fn harness() -> Harness {
    let db = Arc::new(InMemoryClaimsDb::new());
    let sha = Arc::new(FakeShaGateway::new());
    let service = ClaimsService::new(db.clone(), sha.clone());
    Harness { db, sha, service }
}

/// Stores a claim that has verified compliance
async fn verified_claim(h: &Harness) -> ShaClaim {
    let mut claim = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();
    claim.set_compliance(ComplianceStatus::Verified, Utc::now());
    h.db.put_claim(claim.clone());
    claim
}

/// Stores a claim that is ready to submit
async fn ready_claim(h: &Harness) -> ShaClaim {
    let claim = verified_claim(h).await;
    let invoice = h.service.generate_invoice(claim.id, "clerk").await.unwrap();
    h.service.print_invoice(invoice.id, "clerk").await.unwrap();
    h.service.get_claim(claim.id).await.unwrap()
}

// ============================================================================
// CLAIM CREATION
// ============================================================================

mod claim_creation {
    use super::*;

    #[tokio::test]
    async fn test_claims_are_numbered_per_month() {
        let h = harness();
        let period = Utc::now().format("%Y%m").to_string();

        let first = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();
        let second = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();

        assert_eq!(first.claim_number, format!("SHA-{period}-000001"));
        assert_eq!(second.claim_number, format!("SHA-{period}-000002"));
        assert_claim_status(&first, ClaimStatus::Draft);
        assert_eq!(first.compliance_status, ComplianceStatus::Pending);
    }

    #[tokio::test]
    async fn test_invalid_member_number_is_rejected_before_numbering() {
        let h = harness();
        let input = NewClaimBuilder::new().with_member_number("12345").build();

        assert_validation_error(h.service.create_claim(input).await);
        assert!(h.db.claims().is_empty());

        let period = Utc::now().format("%Y%m").to_string();
        let claim = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();
        assert_eq!(claim.claim_number, format!("SHA-{period}-000001"));
    }

    #[tokio::test]
    async fn test_services_must_sum_to_claim_amount() {
        let h = harness();
        let input = NewClaimBuilder::new()
            .with_claim_amount(core_kernel::Money::kes(dec!(9999)))
            .build();

        assert_validation_error(h.service.create_claim(input).await);
    }

    #[tokio::test]
    async fn test_get_unknown_claim_is_not_found() {
        let h = harness();
        let result = h.service.get_claim(ClaimId::new()).await;
        assert!(matches!(result, Err(ClaimError::NotFound { entity: "Claim", .. })));
    }

    #[tokio::test]
    async fn test_list_claims_filters_by_status() {
        let h = harness();
        ready_claim(&h).await;
        h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();

        let filter = ClaimFilter {
            status: Some(ClaimStatus::ReadyToSubmit),
            ..Default::default()
        };
        let ready = h.service.list_claims(&filter).await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(h.service.list_claims(&ClaimFilter::default()).await.unwrap().len(), 2);
    }
}

// ============================================================================
// DOCUMENTS
// ============================================================================

mod documents {
    use super::*;

    #[tokio::test]
    async fn test_compliance_report_counts_verified_required_documents() {
        let h = harness();
        let claim = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();
        let clerk = UserId::new();

        let lab = h
            .service
            .add_document(claim.id, ClaimFixtures::required_document(DocumentType::LabResults), clerk)
            .await
            .unwrap();
        h.service
            .add_document(claim.id, ClaimFixtures::required_document(DocumentType::InsuranceCard), clerk)
            .await
            .unwrap();

        let report = h.service.compliance_report(claim.id).await.unwrap();
        assert_eq!((report.required, report.verified), (2, 0));
        assert!(report.ensure_compliant().is_err());

        let verified = h.service.verify_document(claim.id, lab.id, clerk).await.unwrap();
        assert!(verified.compliance_verified);
        assert_eq!(verified.verified_by, Some(clerk));

        let report = h.service.compliance_report(claim.id).await.unwrap();
        assert_eq!((report.required, report.verified), (2, 1));
    }

    #[tokio::test]
    async fn test_document_needs_a_file_name() {
        let h = harness();
        let claim = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();
        let mut input = ClaimFixtures::required_document(DocumentType::Prescription);
        input.file_name = "  ".to_string();

        assert_validation_error(h.service.add_document(claim.id, input, UserId::new()).await);
    }

    #[tokio::test]
    async fn test_verify_document_of_another_claim_is_not_found() {
        let h = harness();
        let first = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();
        let second = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();
        let document = h
            .service
            .add_document(first.id, ClaimFixtures::required_document(DocumentType::Prescription), UserId::new())
            .await
            .unwrap();

        let result = h.service.verify_document(second.id, document.id, UserId::new()).await;
        assert!(matches!(result, Err(ClaimError::NotFound { .. })));
    }
}

// ============================================================================
// INVOICES
// ============================================================================

mod invoices {
    use super::*;

    #[tokio::test]
    async fn test_invoice_requires_verified_compliance() {
        let h = harness();
        let claim = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();

        let result = h.service.generate_invoice(claim.id, "clerk").await;
        assert!(matches!(result, Err(ClaimError::ComplianceNotVerified)));
        assert!(h.db.invoices().is_empty());
    }

    #[tokio::test]
    async fn test_generate_invoice_copies_claim_details() {
        let h = harness();
        let claim = verified_claim(&h).await;

        let invoice = h.service.generate_invoice(claim.id, "clerk").await.unwrap();
        let period = Utc::now().format("%Y%m").to_string();
        assert_eq!(invoice.invoice_number, format!("SHA-INV-{period}-000001"));
        assert_eq!(invoice.status, InvoiceStatus::Generated);
        assert_eq!(invoice.total_amount, claim.claim_amount);
        assert_eq!(invoice.claim_number, claim.claim_number);
        assert_eq!(invoice.services.len(), 2);
    }

    #[tokio::test]
    async fn test_second_invoice_for_claim_is_rejected() {
        let h = harness();
        let claim = verified_claim(&h).await;
        let first = h.service.generate_invoice(claim.id, "clerk").await.unwrap();

        match h.service.generate_invoice(claim.id, "clerk").await {
            Err(ClaimError::InvoiceExists(number)) => assert_eq!(number, first.invoice_number),
            other => panic!("expected InvoiceExists, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_printing_makes_claim_ready_to_submit() {
        let h = harness();
        let claim = verified_claim(&h).await;
        let invoice = h.service.generate_invoice(claim.id, "clerk").await.unwrap();

        let printed = h.service.print_invoice(invoice.id, "front.desk").await.unwrap();
        assert_eq!(printed.status, InvoiceStatus::Printed);
        assert_eq!(printed.printed_by.as_deref(), Some("front.desk"));
        assert!(printed.is_printed());

        let claim = h.service.get_claim(claim.id).await.unwrap();
        assert_claim_status(&claim, ClaimStatus::ReadyToSubmit);
    }

    #[tokio::test]
    async fn test_invoice_cannot_be_printed_twice() {
        let h = harness();
        let claim = verified_claim(&h).await;
        let invoice = h.service.generate_invoice(claim.id, "clerk").await.unwrap();
        h.service.print_invoice(invoice.id, "clerk").await.unwrap();

        assert!(h.service.print_invoice(invoice.id, "clerk").await.is_err());
    }
}

// ============================================================================
// BATCHES
// ============================================================================

mod batches {
    use super::*;

    #[tokio::test]
    async fn test_custom_batch_takes_only_ready_unbatched_claims() {
        let h = harness();
        let ready = ready_claim(&h).await;
        let draft = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();

        let input = NewBatchBuilder::new().with_claims([ready.id, draft.id]).build();
        let (batch, claims) = h.service.create_batch(input).await.unwrap();

        assert_eq!(batch.status, BatchStatus::Draft);
        assert_eq!(batch.total_claims, 1);
        assert_eq!(batch.total_amount, ready.claim_amount);
        assert!(batch.batch_number.starts_with("SHA-BATCH-"));
        assert!(batch.batch_number.ends_with("-0001"));
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].batch_id, Some(batch.id));

        let stored = h.service.get_claim(ready.id).await.unwrap();
        assert_eq!(stored.batch_id, Some(batch.id));
        assert_eq!(h.service.batch_claims(batch.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_custom_batch_without_ids_uses_last_day() {
        let h = harness();
        ready_claim(&h).await;
        ready_claim(&h).await;

        let (batch, _) = h.service.create_batch(NewBatchBuilder::new().build()).await.unwrap();
        assert_eq!(batch.total_claims, 2);
    }

    #[tokio::test]
    async fn test_batch_without_eligible_claims_fails() {
        let h = harness();
        h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();

        let result = h.service.create_batch(NewBatchBuilder::new().build()).await;
        assert!(matches!(result, Err(ClaimError::EmptyBatch)));
        assert!(h.db.batches().is_empty());
    }

    #[tokio::test]
    async fn test_batched_claim_is_not_batched_again() {
        let h = harness();
        let claim = ready_claim(&h).await;
        h.service
            .create_batch(NewBatchBuilder::new().with_claims([claim.id]).build())
            .await
            .unwrap();

        let result = h.service.create_batch(NewBatchBuilder::new().with_claims([claim.id]).build()).await;
        assert!(matches!(result, Err(ClaimError::EmptyBatch)));
    }

    #[tokio::test]
    async fn test_delete_draft_batch_releases_claims() {
        let h = harness();
        let claim = ready_claim(&h).await;
        let (batch, _) = h
            .service
            .create_batch(NewBatchBuilder::new().with_claims([claim.id]).build())
            .await
            .unwrap();

        h.service.delete_batch(batch.id).await.unwrap();

        assert!(h.service.get_batch(batch.id).await.is_err());
        assert_eq!(h.service.get_claim(claim.id).await.unwrap().batch_id, None);
    }

    #[tokio::test]
    async fn test_submitted_batch_cannot_be_deleted() {
        let h = harness();
        let claim = ready_claim(&h).await;
        let (batch, _) = h
            .service
            .create_batch(NewBatchBuilder::new().with_claims([claim.id]).build())
            .await
            .unwrap();
        h.service.submit_batch(batch.id, 0).await.unwrap();

        let result = h.service.delete_batch(batch.id).await;
        assert!(matches!(result, Err(ClaimError::BatchNotDraft { .. })));
    }

    #[tokio::test]
    async fn test_mark_batch_printed() {
        let h = harness();
        let claim = ready_claim(&h).await;
        let (batch, _) = h
            .service
            .create_batch(NewBatchBuilder::new().with_claims([claim.id]).build())
            .await
            .unwrap();

        let printed = h.service.mark_batch_printed(batch.id, "clerk").await.unwrap();
        assert!(printed.is_printed);
        assert_eq!(printed.printed_by.as_deref(), Some("clerk"));
    }

    #[tokio::test]
    async fn test_list_batches_by_status() {
        let h = harness();
        let claim = ready_claim(&h).await;
        h.service
            .create_batch(NewBatchBuilder::new().with_claims([claim.id]).build())
            .await
            .unwrap();

        assert_eq!(h.service.list_batches(Some(BatchStatus::Draft)).await.unwrap().len(), 1);
        assert!(h.service.list_batches(Some(BatchStatus::Submitted)).await.unwrap().is_empty());
    }
}

// ============================================================================
// SUBMISSION
// ============================================================================

mod submission {
    use super::*;

    #[tokio::test]
    async fn test_submit_single_claim_records_reference_and_log() {
        let h = harness();
        let claim = ready_claim(&h).await;

        let submitted = h.service.submit_single_claim(claim.id, 0).await.unwrap();

        assert_claim_status(&submitted, ClaimStatus::Submitted);
        assert_eq!(submitted.sha_reference.as_deref(), Some("SHA-REF-0001"));
        assert!(submitted.submission_date.is_some());

        let payloads = h.sha.submitted_claims();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].provider_code, TEST_PROVIDER_CODE);
        assert_eq!(payloads[0].member_number, claim.member_number);

        let logs = h.db.submission_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].submission_type, SubmissionType::Single);
        assert_eq!(logs[0].status, SubmissionStatus::Success);
        assert!(logs[0].response_payload.is_some());

        let invoice = h.db.invoices().into_iter().find(|i| i.claim_id == claim.id).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Submitted);
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_claim_ready() {
        let h = harness();
        let claim = ready_claim(&h).await;
        h.sha.fail_next_submission(PortError::connection("SHA API unreachable"));

        let result = h.service.submit_single_claim(claim.id, 2).await;
        assert!(result.as_ref().is_err_and(|e| e.is_transient()));

        let stored = h.service.get_claim(claim.id).await.unwrap();
        assert_claim_status(&stored, ClaimStatus::ReadyToSubmit);

        let logs = h.db.submission_logs();
        assert_eq!(logs[0].status, SubmissionStatus::Failed);
        assert_eq!(logs[0].retry_count, 2);
        assert!(logs[0].error_message.as_deref().unwrap().contains("unreachable"));
    }

    #[tokio::test]
    async fn test_draft_claim_cannot_be_submitted() {
        let h = harness();
        let claim = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();

        let result = h.service.submit_single_claim(claim.id, 0).await;
        assert!(matches!(result, Err(ClaimError::InvalidStatusTransition { .. })));
        assert!(h.sha.submitted_claims().is_empty());
    }

    #[tokio::test]
    async fn test_batched_claim_cannot_be_submitted_alone() {
        let h = harness();
        let claim = ready_claim(&h).await;
        h.service
            .create_batch(NewBatchBuilder::new().with_claims([claim.id]).build())
            .await
            .unwrap();

        let result = h.service.submit_single_claim(claim.id, 0).await;

        assert!(matches!(result, Err(ClaimError::ClaimInBatch { .. })));
        assert!(h.sha.submitted_claims().is_empty());
        assert_claim_status(&h.service.get_claim(claim.id).await.unwrap(), ClaimStatus::ReadyToSubmit);
    }

    #[tokio::test]
    async fn test_batch_payload_skips_claims_no_longer_ready() {
        let h = harness();
        let first = ready_claim(&h).await;
        let second = ready_claim(&h).await;
        let (batch, _) = h
            .service
            .create_batch(NewBatchBuilder::new().with_claims([first.id, second.id]).build())
            .await
            .unwrap();
        let mut moved = h.service.get_claim(second.id).await.unwrap();
        moved.mark_submitted(Some("SHA-REF-0900".to_string()), Utc::now()).unwrap();
        h.db.put_claim(moved);

        let submitted = h.service.submit_batch(batch.id, 0).await.unwrap();

        assert_eq!(submitted.status, BatchStatus::Submitted);
        let payloads = h.sha.submitted_batches();
        assert_eq!(payloads[0].claims.len(), 1);
        assert_eq!(payloads[0].claims[0].claim_number, first.claim_number);
        assert_eq!(payloads[0].total_claims, 1);
        assert_eq!(payloads[0].total_amount, first.claim_amount.amount());
        let untouched = h.service.get_claim(second.id).await.unwrap();
        assert_eq!(untouched.sha_reference.as_deref(), Some("SHA-REF-0900"));
    }

    #[tokio::test]
    async fn test_batch_with_no_ready_claims_is_empty() {
        let h = harness();
        let claim = ready_claim(&h).await;
        let (batch, _) = h
            .service
            .create_batch(NewBatchBuilder::new().with_claims([claim.id]).build())
            .await
            .unwrap();
        let mut moved = h.service.get_claim(claim.id).await.unwrap();
        moved.mark_submitted(None, Utc::now()).unwrap();
        h.db.put_claim(moved);

        let result = h.service.submit_batch(batch.id, 0).await;
        assert!(matches!(result, Err(ClaimError::EmptyBatch)));
        assert!(h.sha.submitted_batches().is_empty());
    }

    #[tokio::test]
    async fn test_batch_submission_write_requires_draft_batch() {
        let h = harness();
        let claim = ready_claim(&h).await;
        let (batch, _) = h
            .service
            .create_batch(NewBatchBuilder::new().with_claims([claim.id]).build())
            .await
            .unwrap();
        let batch = h.service.submit_batch(batch.id, 0).await.unwrap();

        let result = h.db.save_batch_submission(&batch, &[]).await;
        assert!(result.is_err_and(|e| matches!(e, PortError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_submit_batch_submits_every_claim() {
        let h = harness();
        let first = ready_claim(&h).await;
        let second = ready_claim(&h).await;
        let (batch, _) = h
            .service
            .create_batch(NewBatchBuilder::new().with_claims([first.id, second.id]).build())
            .await
            .unwrap();

        let submitted = h.service.submit_batch(batch.id, 0).await.unwrap();

        assert_eq!(submitted.status, BatchStatus::Submitted);
        assert_eq!(submitted.sha_batch_reference.as_deref(), Some("SHA-REF-0001"));
        let payloads = h.sha.submitted_batches();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].claims.len(), 2);

        for id in [first.id, second.id] {
            let claim = h.service.get_claim(id).await.unwrap();
            assert_claim_status(&claim, ClaimStatus::Submitted);
            assert!(claim.sha_reference.is_none());
        }
        assert_eq!(h.db.submission_logs()[0].submission_type, SubmissionType::Batch);
    }

    #[tokio::test]
    async fn test_failed_batch_submission_leaves_batch_draft() {
        let h = harness();
        let claim = ready_claim(&h).await;
        let (batch, _) = h
            .service
            .create_batch(NewBatchBuilder::new().with_claims([claim.id]).build())
            .await
            .unwrap();
        h.sha.fail_next_submission(PortError::internal("HTTP 500"));

        assert!(h.service.submit_batch(batch.id, 0).await.is_err());
        assert_eq!(h.service.get_batch(batch.id).await.unwrap().status, BatchStatus::Draft);
        assert_claim_status(&h.service.get_claim(claim.id).await.unwrap(), ClaimStatus::ReadyToSubmit);
    }
}

// ============================================================================
// RECONCILIATION
// ============================================================================

mod reconciliation {
    use super::*;

    #[tokio::test]
    async fn test_reconcile_applies_sha_decisions() {
        let h = harness();
        let approved = h.service.submit_single_claim(ready_claim(&h).await.id, 0).await.unwrap();
        let rejected = h.service.submit_single_claim(ready_claim(&h).await.id, 0).await.unwrap();
        let pending = h.service.submit_single_claim(ready_claim(&h).await.id, 0).await.unwrap();

        h.sha
            .set_claim_status(approved.sha_reference.as_deref().unwrap(), "approved", Some(dec!(2000)));
        h.sha
            .reject_claim(rejected.sha_reference.as_deref().unwrap(), "Member not eligible");

        let summary = h.service.reconcile_claims().await.unwrap();
        assert_eq!((summary.checked, summary.updated, summary.failed), (3, 2, 0));

        let approved = h.service.get_claim(approved.id).await.unwrap();
        assert_claim_status(&approved, ClaimStatus::Approved);
        assert_eq!(approved.approved_amount, Some(core_kernel::Money::kes(dec!(2000))));
        assert!(approved.approval_date.is_some());

        let rejected = h.service.get_claim(rejected.id).await.unwrap();
        assert_claim_status(&rejected, ClaimStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Member not eligible"));
        let invoice = h.db.invoices().into_iter().find(|i| i.claim_id == rejected.id).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Rejected);
        let invoice = h.db.invoices().into_iter().find(|i| i.claim_id == approved.id).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Submitted);

        let pending = h.service.get_claim(pending.id).await.unwrap();
        assert_claim_status(&pending, ClaimStatus::Submitted);
        assert!(pending.last_reconciled_at.is_some());
    }

    #[tokio::test]
    async fn test_reconcile_counts_gateway_failures() {
        let h = harness();
        h.service.submit_single_claim(ready_claim(&h).await.id, 0).await.unwrap();
        h.sha.fail_next_status(PortError::connection("timeout"));

        let summary = h.service.reconcile_claims().await.unwrap();
        assert_eq!((summary.checked, summary.updated, summary.failed), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_reconcile_updates_submitted_batches() {
        let h = harness();
        let claim = ready_claim(&h).await;
        let (batch, _) = h
            .service
            .create_batch(NewBatchBuilder::new().with_claims([claim.id]).build())
            .await
            .unwrap();
        let batch = h.service.submit_batch(batch.id, 0).await.unwrap();
        h.sha.set_batch_status(batch.sha_batch_reference.as_deref().unwrap(), "processed");

        h.service.reconcile_claims().await.unwrap();

        assert_eq!(h.service.get_batch(batch.id).await.unwrap().status, BatchStatus::Completed);
    }

    #[tokio::test]
    async fn test_payment_check_stops_once_claim_is_paid() {
        let h = harness();
        let claim = h.service.submit_single_claim(ready_claim(&h).await.id, 0).await.unwrap();
        let started = Utc::now() - Duration::days(2);
        h.db.put_payment_tracking(PaymentTracking::start(&claim, None, None, started));
        h.sha.set_claim_status(claim.sha_reference.as_deref().unwrap(), "paid", Some(dec!(2350)));

        let summary = h.service.run_payment_checks(Utc::now()).await.unwrap();
        assert_eq!((summary.checked, summary.updated), (1, 1));

        let tracking = &h.db.payment_tracking()[0];
        assert!(!tracking.auto_check_enabled);
        assert!(tracking.next_check_at.is_none());
        assert_claim_status(&h.service.get_claim(claim.id).await.unwrap(), ClaimStatus::Paid);
        let invoice = h.db.invoices().into_iter().find(|i| i.claim_id == claim.id).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn test_payment_check_reschedules_unsettled_claims() {
        let h = harness();
        let claim = h.service.submit_single_claim(ready_claim(&h).await.id, 0).await.unwrap();
        let started = Utc::now() - Duration::days(2);
        h.db.put_payment_tracking(PaymentTracking::start(&claim, None, None, started));

        let now = Utc::now();
        let summary = h.service.run_payment_checks(now).await.unwrap();
        assert_eq!((summary.checked, summary.updated), (1, 0));

        let tracking = &h.db.payment_tracking()[0];
        assert!(tracking.auto_check_enabled);
        assert!(tracking.next_check_at.is_some_and(|at| at > now));
        assert_eq!(tracking.last_checked_at, Some(now));
    }

    #[tokio::test]
    async fn test_payment_checks_that_are_not_due_are_skipped() {
        let h = harness();
        let claim = h.service.submit_single_claim(ready_claim(&h).await.id, 0).await.unwrap();
        h.db.put_payment_tracking(PaymentTracking::start(&claim, None, None, Utc::now()));

        let summary = h.service.run_payment_checks(Utc::now()).await.unwrap();
        assert_eq!(summary.checked, 0);
    }
}

// ============================================================================
// REWORK
// ============================================================================

mod rework {
    use super::*;

    async fn rejected_claim(h: &Harness) -> ShaClaim {
        let claim = h.service.submit_single_claim(ready_claim(h).await.id, 0).await.unwrap();
        h.sha
            .reject_claim(claim.sha_reference.as_deref().unwrap(), "Discharge summary missing");
        h.service.reconcile_claims().await.unwrap();
        h.service.get_claim(claim.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_rejected_claim_is_reworked_and_resubmitted() {
        let h = harness();
        let rejected = rejected_claim(&h).await;
        assert_claim_status(&rejected, ClaimStatus::Rejected);

        let draft = h.service.rework_claim(rejected.id, "clerk").await.unwrap();
        assert_claim_status(&draft, ClaimStatus::Draft);
        assert_eq!(draft.compliance_status, ComplianceStatus::Pending);
        assert!(draft.sha_reference.is_none());
        assert_eq!(draft.rejection_reason.as_deref(), Some("Discharge summary missing"));
        assert!(h.db.invoices().iter().all(|i| i.claim_id != rejected.id));

        let mut verified = h.service.get_claim(rejected.id).await.unwrap();
        verified.set_compliance(ComplianceStatus::Verified, Utc::now());
        h.db.put_claim(verified);
        let invoice = h.service.generate_invoice(rejected.id, "clerk").await.unwrap();
        h.service.print_invoice(invoice.id, "clerk").await.unwrap();

        let resubmitted = h.service.submit_single_claim(rejected.id, 0).await.unwrap();
        assert_claim_status(&resubmitted, ClaimStatus::Submitted);
        assert_eq!(resubmitted.sha_reference.as_deref(), Some("SHA-REF-0002"));
        assert!(resubmitted.rejection_reason.is_none());
        assert_eq!(h.sha.submitted_claims().len(), 2);
    }

    #[tokio::test]
    async fn test_only_rejected_claims_can_be_reworked() {
        let h = harness();
        let claim = ready_claim(&h).await;

        let result = h.service.rework_claim(claim.id, "clerk").await;
        assert!(matches!(result, Err(ClaimError::InvalidStatusTransition { .. })));
        assert_eq!(h.db.invoices().len(), 1);
    }
}

// ============================================================================
// MAINTENANCE
// ============================================================================

mod maintenance {
    use super::*;

    #[tokio::test]
    async fn test_update_changes_notes_and_checks_amount() {
        let h = harness();
        let claim = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();

        let update = ClaimUpdate { notes: Some("Referred from Kisumu".into()), ..ClaimUpdate::default() };
        let updated = h.service.update_claim(claim.id, update).await.unwrap();
        assert_eq!(updated.notes.as_deref(), Some("Referred from Kisumu"));

        let update = ClaimUpdate { claim_amount: Some(MoneyFixtures::kes_consultation()), ..ClaimUpdate::default() };
        assert_validation_error(h.service.update_claim(claim.id, update).await);
        assert_validation_error(h.service.update_claim(claim.id, ClaimUpdate::default()).await);
    }

    #[tokio::test]
    async fn test_update_of_stale_claim_conflicts() {
        let h = harness();
        let claim = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();
        let mut stale = claim.clone();
        stale.notes = Some("edited from an old copy".into());
        let mut moved = claim.clone();
        moved.transition_to(ClaimStatus::ReadyToSubmit, Utc::now()).unwrap();
        h.db.put_claim(moved);

        let result = h.db.transition_claim(&stale, ClaimStatus::Draft).await;

        assert!(result.is_err_and(|e| matches!(e, PortError::Conflict { .. })));
        assert_claim_status(&h.service.get_claim(claim.id).await.unwrap(), ClaimStatus::ReadyToSubmit);
    }

    #[tokio::test]
    async fn test_delete_claim_only_while_open() {
        let h = harness();
        let open = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();
        h.service
            .add_document(open.id, ClaimFixtures::required_document(DocumentType::Prescription), UserId::new())
            .await
            .unwrap();
        let submitted = h.service.submit_single_claim(ready_claim(&h).await.id, 0).await.unwrap();

        h.service.delete_claim(open.id).await.unwrap();
        assert!(matches!(h.service.get_claim(open.id).await, Err(ClaimError::NotFound { .. })));
        assert!(h.service.list_documents(open.id).await.unwrap().is_empty());

        let result = h.service.delete_claim(submitted.id).await;
        assert!(matches!(result, Err(ClaimError::ClaimLocked { .. })));
    }

    #[tokio::test]
    async fn test_delete_document_checks_owner() {
        let h = harness();
        let first = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();
        let second = h.service.create_claim(NewClaimBuilder::new().build()).await.unwrap();
        let document = h
            .service
            .add_document(first.id, ClaimFixtures::required_document(DocumentType::Prescription), UserId::new())
            .await
            .unwrap();

        let result = h.service.delete_document(second.id, document.id).await;
        assert!(matches!(result, Err(ClaimError::NotFound { .. })));

        h.service.delete_document(first.id, document.id).await.unwrap();
        assert!(h.service.list_documents(first.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checklist_follows_service_types() {
        let h = harness();
        let services = vec![
            ServiceItem::new("General consultation", 1, MoneyFixtures::kes_consultation())
                .with_type(ServiceType::Consultation),
            ServiceItem::new("Full blood count", 1, MoneyFixtures::kes_lab_test()).with_type(ServiceType::Laboratory),
        ];
        let claim = h
            .service
            .create_claim(NewClaimBuilder::new().with_services(services).build())
            .await
            .unwrap();
        let clerk = UserId::new();
        let mut uploaded = Vec::new();
        for doc_type in [DocumentType::InsuranceCard, DocumentType::Identification, DocumentType::LabResults] {
            let document = h
                .service
                .add_document(claim.id, ClaimFixtures::required_document(doc_type), clerk)
                .await
                .unwrap();
            uploaded.push(document);
        }

        let checklist = h.service.document_checklist(claim.id).await.unwrap();
        assert_eq!(checklist.summary.total_required, 3);
        assert_eq!(checklist.summary.uploaded, 3);
        assert!(!checklist.summary.compliance_ready);

        for document in &uploaded {
            h.service.verify_document(claim.id, document.id, clerk).await.unwrap();
        }
        let checklist = h.service.document_checklist(claim.id).await.unwrap();
        assert!(checklist.summary.compliance_ready);
    }

    #[tokio::test]
    async fn test_list_invoices_filters_and_searches() {
        let h = harness();
        let printed = ready_claim(&h).await;
        let generated = verified_claim(&h).await;
        h.service.generate_invoice(generated.id, "clerk").await.unwrap();

        let all = h.service.list_invoices(&InvoiceFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let filter = InvoiceFilter { status: Some(InvoiceStatus::Printed), ..InvoiceFilter::default() };
        let only_printed = h.service.list_invoices(&filter).await.unwrap();
        assert_eq!(only_printed.len(), 1);
        assert_eq!(only_printed[0].claim_id, printed.id);

        let filter = InvoiceFilter { search: Some(generated.claim_number.to_lowercase()), ..InvoiceFilter::default() };
        let found = h.service.list_invoices(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].claim_id, generated.id);
    }

    #[tokio::test]
    async fn test_batch_statistics_respect_date_range() {
        let h = harness();
        let claim = ready_claim(&h).await;
        let (batch, _) = h
            .service
            .create_batch(NewBatchBuilder::new().with_claims([claim.id]).build())
            .await
            .unwrap();

        let stats = h.service.batch_statistics(None, None).await.unwrap();
        assert_eq!(stats.total_batches, 1);
        assert_eq!(stats.draft_batches, 1);
        assert_eq!(stats.total_claims_in_batches, 1);
        assert_eq!(stats.total_amount_in_batches, claim.claim_amount);

        let later = batch.batch_date + Duration::days(1);
        let stats = h.service.batch_statistics(Some(later), None).await.unwrap();
        assert_eq!(stats.total_batches, 0);
    }
}
