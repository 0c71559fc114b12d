//! PostgreSQL adapter integration tests
//!
//! Each test starts its own PostgreSQL container and applies the
//! migrations. Run with `cargo test -p infra_db -- --ignored`.

use chrono::{Duration, NaiveDate, Utc};
use domain_claims::{
    ClaimFilter, ClaimStatus, ClaimStore, ClaimsService, ComplianceStatus, InvoiceFilter, InvoiceStatus, NumberKind,
    WorkflowService, WorkflowStore,
};
use domain_jobs::{AuditEntry, AuditLog, InventoryMonitor};
use infra_db::{PgAuditLog, PgClaimStore, PgInventoryMonitor, PgWorkflowStore};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use test_utils::{db_test, FakeShaGateway, NewBatchBuilder, NewClaimBuilder};
use uuid::Uuid;

fn services(pool: &PgPool) -> (Arc<ClaimsService>, WorkflowService) {
    let store = Arc::new(PgClaimStore::new(pool.clone()));
    let claims = Arc::new(ClaimsService::new(store, Arc::new(FakeShaGateway::new())));
    let workflows = WorkflowService::new(claims.clone(), Arc::new(PgWorkflowStore::new(pool.clone())));
    (claims, workflows)
}

db_test!(test_sequences_are_per_kind_and_period, |pool| {
    let store = PgClaimStore::new(pool.clone());

    assert_eq!(store.next_sequence(NumberKind::Claim, "202403").await.unwrap(), 1);
    assert_eq!(store.next_sequence(NumberKind::Claim, "202403").await.unwrap(), 2);
    assert_eq!(store.next_sequence(NumberKind::Claim, "202404").await.unwrap(), 1);
    assert_eq!(store.next_sequence(NumberKind::Invoice, "202403").await.unwrap(), 1);
});

db_test!(test_claim_round_trip_and_filtering, |pool| {
    let (claims, _) = services(&pool);
    let created = claims.create_claim(NewClaimBuilder::new().build()).await.unwrap();

    let loaded = claims.get_claim(created.id).await.unwrap();
    assert_eq!(loaded.claim_number, created.claim_number);
    assert_eq!(loaded.services, created.services);
    assert_eq!(loaded.claim_amount, created.claim_amount);
    assert_eq!(loaded.primary_diagnosis, created.primary_diagnosis);

    let drafts = claims
        .list_claims(&ClaimFilter {
            status: Some(ClaimStatus::Draft),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(drafts.len(), 1);
    let submitted = claims
        .list_claims(&ClaimFilter {
            status: Some(ClaimStatus::Submitted),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(submitted.is_empty());
});

db_test!(test_batch_creation_and_submission, |pool| {
    let (claims, _) = services(&pool);
    let store = claims.store().clone();

    let mut claim = claims.create_claim(NewClaimBuilder::new().build()).await.unwrap();
    claim.set_compliance(ComplianceStatus::Verified, Utc::now());
    store.update_claim(&claim).await.unwrap();
    let invoice = claims.generate_invoice(claim.id, "clerk").await.unwrap();
    claims.print_invoice(invoice.id, "clerk").await.unwrap();

    let (batch, _) = claims
        .create_batch(NewBatchBuilder::new().with_claims([claim.id]).build())
        .await
        .unwrap();
    assert_eq!(claims.batch_claims(batch.id).await.unwrap().len(), 1);

    let submitted = claims.submit_batch(batch.id, 0).await.unwrap();
    assert_eq!(submitted.sha_batch_reference.as_deref(), Some("SHA-REF-0001"));

    let stored = claims.get_claim(claim.id).await.unwrap();
    assert_eq!(stored.status, ClaimStatus::Submitted);
    assert_eq!(stored.batch_id, Some(batch.id));
});

db_test!(test_batch_submission_requires_draft_batch, |pool| {
    let (claims, _) = services(&pool);
    let store = claims.store().clone();

    let mut claim = claims.create_claim(NewClaimBuilder::new().build()).await.unwrap();
    claim.set_compliance(ComplianceStatus::Verified, Utc::now());
    store.update_claim(&claim).await.unwrap();
    let invoice = claims.generate_invoice(claim.id, "clerk").await.unwrap();
    claims.print_invoice(invoice.id, "clerk").await.unwrap();
    let (batch, _) = claims
        .create_batch(NewBatchBuilder::new().with_claims([claim.id]).build())
        .await
        .unwrap();
    claims.submit_batch(batch.id, 0).await.unwrap();

    // Replaying the write against the already submitted batch conflicts
    let stale_claims = store.claims_in_batch(batch.id).await.unwrap();
    let replay = store.save_batch_submission(&batch, &stale_claims).await;
    assert!(matches!(replay, Err(core_kernel::PortError::Conflict { .. })));
});

db_test!(test_conditional_claim_write, |pool| {
    let (claims, _) = services(&pool);
    let store = claims.store().clone();
    let claim = claims.create_claim(NewClaimBuilder::new().build()).await.unwrap();

    let mut edited = claim.clone();
    edited.notes = Some("checked".into());
    let stale = store.transition_claim(&edited, ClaimStatus::ReadyToSubmit).await;
    assert!(matches!(stale, Err(core_kernel::PortError::Conflict { .. })));

    store.transition_claim(&edited, ClaimStatus::Draft).await.unwrap();
    assert_eq!(claims.get_claim(claim.id).await.unwrap().notes.as_deref(), Some("checked"));
});

db_test!(test_rework_voids_invoice, |pool| {
    let (claims, _) = services(&pool);
    let store = claims.store().clone();

    let mut claim = claims.create_claim(NewClaimBuilder::new().build()).await.unwrap();
    claim.set_compliance(ComplianceStatus::Verified, Utc::now());
    store.update_claim(&claim).await.unwrap();
    let invoice = claims.generate_invoice(claim.id, "clerk").await.unwrap();

    let mut rejected = claims.get_claim(claim.id).await.unwrap();
    rejected.status = ClaimStatus::Rejected;
    store.update_claim(&rejected).await.unwrap();

    let reworked = claims.rework_claim(claim.id, "clerk").await.unwrap();
    assert_eq!(reworked.status, ClaimStatus::Draft);
    assert!(store.get_invoice(invoice.id).await.unwrap().is_none());
    assert!(store.invoice_for_claim(claim.id).await.unwrap().is_none());
});

db_test!(test_invoice_listing_filters, |pool| {
    let (claims, _) = services(&pool);
    let store = claims.store().clone();
    let mut numbers = Vec::new();
    for _ in 0..2 {
        let mut claim = claims.create_claim(NewClaimBuilder::new().build()).await.unwrap();
        claim.set_compliance(ComplianceStatus::Verified, Utc::now());
        store.update_claim(&claim).await.unwrap();
        let invoice = claims.generate_invoice(claim.id, "clerk").await.unwrap();
        numbers.push((claim.claim_number, invoice.id));
    }
    claims.print_invoice(numbers[0].1, "clerk").await.unwrap();

    let all = claims.list_invoices(&InvoiceFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    let printed = InvoiceFilter { status: Some(InvoiceStatus::Printed), ..InvoiceFilter::default() };
    let printed = claims.list_invoices(&printed).await.unwrap();
    assert_eq!(printed.len(), 1);
    assert_eq!(printed[0].id, numbers[0].1);

    let search = InvoiceFilter { search: Some(numbers[1].0.to_lowercase()), ..InvoiceFilter::default() };
    let found = claims.list_invoices(&search).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, numbers[1].1);
});

db_test!(test_delete_claim_cascades, |pool| {
    let (claims, _) = services(&pool);
    let store = claims.store().clone();
    let claim = claims.create_claim(NewClaimBuilder::new().build()).await.unwrap();
    claims
        .add_document(
            claim.id,
            domain_claims::NewDocument {
                document_type: domain_claims::DocumentType::InsuranceCard,
                file_name: "card.pdf".into(),
                description: None,
                is_required: true,
            },
            core_kernel::UserId::new(),
        )
        .await
        .unwrap();

    claims.delete_claim(claim.id).await.unwrap();
    assert!(store.get_claim(claim.id).await.unwrap().is_none());
    assert!(store.list_documents(claim.id).await.unwrap().is_empty());
});

db_test!(test_workflow_transitions_are_persisted, |pool| {
    let (claims, workflows) = services(&pool);
    let claim = claims.create_claim(NewClaimBuilder::new().build()).await.unwrap();

    let workflow = workflows.initialize(claim.id, "clerk").await.unwrap();
    let advanced = workflows
        .complete_step(workflow.id, domain_claims::StepName::ClaimCreation, "clerk", None, true)
        .await
        .unwrap();

    let loaded = workflows.get(workflow.id).await.unwrap();
    assert_eq!(loaded.version, advanced.version);
    assert_eq!(loaded.current_step, Some(domain_claims::StepName::ClinicalReview));
    assert_eq!(loaded.steps.len(), 9);
    assert_eq!(workflows.activity(workflow.id).await.unwrap().len(), 4);

    // A write based on the old version is rejected
    let store = PgWorkflowStore::new(pool.clone());
    let stale = store.save_transition(&workflow, &[], &[]).await;
    assert!(matches!(stale, Err(core_kernel::PortError::Conflict { .. })));
});

db_test!(test_inventory_queries, |pool| {
    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let low = Uuid::new_v4();
    let stocked = Uuid::new_v4();
    for (id, name, reorder) in [(low, "Amoxicillin 250mg", 50), (stocked, "Paracetamol 500mg", 10)] {
        sqlx::query("INSERT INTO inventory_items (id, name, reorder_level) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(name)
            .bind(reorder)
            .execute(&pool)
            .await
            .unwrap();
    }
    for (item, quantity, expiry) in [
        (low, 20, today + Duration::days(10)),
        (low, 100, today - Duration::days(1)),
        (stocked, 200, today + Duration::days(90)),
    ] {
        sqlx::query("INSERT INTO inventory_batches (id, item_id, quantity, expiry_date) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(item)
            .bind(quantity)
            .bind(expiry)
            .execute(&pool)
            .await
            .unwrap();
    }

    let monitor = PgInventoryMonitor::new(pool.clone());
    let low_stock = monitor.low_stock_items(today).await.unwrap();
    assert_eq!(low_stock.len(), 1);
    assert_eq!(low_stock[0].item_id, low);
    assert_eq!(low_stock[0].current_stock, 20);

    let expiring = monitor.expiring_batches(today, 30).await.unwrap();
    assert_eq!(expiring.len(), 1);
    assert_eq!(expiring[0].name, "Amoxicillin 250mg");
});

db_test!(test_audit_entries_are_written, |pool| {
    let log = PgAuditLog::new(pool.clone());
    let entry = AuditEntry::new(
        "database_backup",
        "system",
        json!({ "backup_file": "/backups/backup-2024-06-01T02-00-00-000Z.sql" }),
        Utc::now(),
    );
    log.record(&entry).await.unwrap();

    let rows = log.repository().recent("database_backup", 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].target_type, "system");
});
