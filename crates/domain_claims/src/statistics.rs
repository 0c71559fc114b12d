//! Workflow and batch statistics

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money};

use crate::batch::{BatchStatus, BatchType, ClaimBatch};
use crate::workflow::{StepName, StepStatus, WorkflowInstance, WorkflowStatus};

/// Per step and status breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStatistics {
    pub step: StepName,
    pub status: StepStatus,
    pub count: u64,
    pub average_actual_minutes: Option<f64>,
    pub estimated_minutes: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub total: u64,
    pub completed: u64,
    pub in_progress: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStatistics {
    pub by_status: BTreeMap<String, u64>,
    /// Mean elapsed hours per workflow status; open workflows count up to now
    pub average_duration_by_status: BTreeMap<String, f64>,
    pub average_duration_hours: Option<f64>,
    pub steps: Vec<StepStatistics>,
    pub summary: WorkflowSummary,
}

impl WorkflowStatistics {
    pub fn from_instances(workflows: &[WorkflowInstance], now: DateTime<Utc>) -> Self {
        let mut by_status: BTreeMap<String, u64> = BTreeMap::new();
        let mut durations_by_status: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for wf in workflows {
            *by_status.entry(wf.status.to_string()).or_default() += 1;
            durations_by_status
                .entry(wf.status.to_string())
                .or_default()
                .push(wf.elapsed_hours(now));
        }

        let durations: Vec<f64> = workflows.iter().map(|wf| wf.elapsed_hours(now)).collect();
        let average_duration_by_status = durations_by_status
            .into_iter()
            .filter_map(|(status, hours)| mean(hours.into_iter()).map(|avg| (status, avg)))
            .collect();

        let mut buckets: BTreeMap<(u8, &'static str), (StepName, StepStatus, u64, Vec<i64>)> = BTreeMap::new();
        for step in workflows.iter().flat_map(|wf| wf.steps.iter()) {
            let entry = buckets
                .entry((step.step_order, step.status.as_str()))
                .or_insert((step.step, step.status, 0, Vec::new()));
            entry.2 += 1;
            if let Some(minutes) = step.actual_minutes {
                entry.3.push(minutes);
            }
        }

        let steps = buckets
            .into_values()
            .map(|(step, status, count, minutes)| StepStatistics {
                step,
                status,
                count,
                average_actual_minutes: mean(minutes.iter().map(|m| *m as f64)),
                estimated_minutes: step.definition().estimated_minutes,
            })
            .collect();

        let count = |status: WorkflowStatus| by_status.get(status.as_str()).copied().unwrap_or(0);
        let summary = WorkflowSummary {
            total: workflows.len() as u64,
            completed: count(WorkflowStatus::Completed),
            in_progress: count(WorkflowStatus::InProgress),
            failed: count(WorkflowStatus::Failed),
        };

        Self {
            average_duration_hours: mean(durations.into_iter()),
            average_duration_by_status,
            by_status,
            steps,
            summary,
        }
    }
}

/// Batch counts and totals for the batch dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub total_batches: u64,
    pub draft_batches: u64,
    pub submitted_batches: u64,
    pub completed_batches: u64,
    pub failed_batches: u64,
    pub weekly_batches: u64,
    pub monthly_batches: u64,
    pub custom_batches: u64,
    pub total_claims_in_batches: u64,
    pub total_amount_in_batches: Money,
    pub batches_with_printed_invoices: u64,
}

impl BatchStatistics {
    pub fn from_batches(batches: &[ClaimBatch], currency: Currency) -> Self {
        let by_status = |status: BatchStatus| batches.iter().filter(|b| b.status == status).count() as u64;
        let by_type = |batch_type: BatchType| batches.iter().filter(|b| b.batch_type == batch_type).count() as u64;
        let amount = batches
            .iter()
            .filter(|b| b.total_amount.currency() == currency)
            .fold(Money::zero(currency), |acc, b| {
                Money::new(acc.amount() + b.total_amount.amount(), currency)
            });

        Self {
            total_batches: batches.len() as u64,
            draft_batches: by_status(BatchStatus::Draft),
            submitted_batches: by_status(BatchStatus::Submitted),
            completed_batches: by_status(BatchStatus::Completed),
            failed_batches: by_status(BatchStatus::Failed),
            weekly_batches: by_type(BatchType::Weekly),
            monthly_batches: by_type(BatchType::Monthly),
            custom_batches: by_type(BatchType::Custom),
            total_claims_in_batches: batches.iter().map(|b| u64::from(b.total_claims)).sum(),
            total_amount_in_batches: amount,
            batches_with_printed_invoices: batches.iter().filter(|b| b.is_printed).count() as u64,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0u32), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use core_kernel::ClaimId;

    #[test]
    fn test_statistics() {
        let now = Utc::now();
        let (mut done, _) = WorkflowInstance::initialize(ClaimId::new(), "clerk", now).unwrap();
        for step in StepName::ALL {
            done.complete_step(*step, "clerk", None, true, now + Duration::hours(2)).unwrap();
        }
        let (open, _) = WorkflowInstance::initialize(ClaimId::new(), "clerk", now).unwrap();

        let stats = WorkflowStatistics::from_instances(&[done, open], now + Duration::hours(6));
        assert_eq!(stats.summary, WorkflowSummary { total: 2, completed: 1, in_progress: 1, failed: 0 });
        assert_eq!(stats.by_status.get("completed"), Some(&1));
        assert_eq!(stats.average_duration_by_status.get("completed"), Some(&2.0));
        assert_eq!(stats.average_duration_by_status.get("in_progress"), Some(&6.0));
        assert_eq!(stats.average_duration_hours, Some(4.0));

        let creation_completed = stats
            .steps
            .iter()
            .find(|s| s.step == StepName::ClaimCreation && s.status == StepStatus::Completed)
            .unwrap();
        assert_eq!(creation_completed.count, 1);
        assert_eq!(creation_completed.average_actual_minutes, Some(120.0));
        assert_eq!(creation_completed.estimated_minutes, 15);
    }

    #[test]
    fn test_batch_statistics() {
        use chrono::NaiveDate;
        use core_kernel::BatchId;
        use rust_decimal_macros::dec;

        let now = Utc::now();
        let batch = |batch_type, status, total_claims, amount, is_printed| ClaimBatch {
            id: BatchId::new(),
            batch_number: "SHA-B-202407-0001".into(),
            batch_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            batch_type,
            status,
            total_claims,
            total_amount: Money::kes(amount),
            is_printed,
            printed_by: None,
            printed_at: None,
            sha_batch_reference: None,
            submitted_at: None,
            created_by: "clerk".into(),
            created_at: now,
            updated_at: now,
        };
        let weekly = batch(BatchType::Weekly, BatchStatus::Draft, 3, dec!(4500), true);
        let custom = batch(BatchType::Custom, BatchStatus::Submitted, 1, dec!(1200), false);

        let stats = BatchStatistics::from_batches(&[weekly, custom], Currency::KES);
        assert_eq!(stats.total_batches, 2);
        assert_eq!(stats.draft_batches, 1);
        assert_eq!(stats.submitted_batches, 1);
        assert_eq!(stats.weekly_batches, 1);
        assert_eq!(stats.custom_batches, 1);
        assert_eq!(stats.monthly_batches, 0);
        assert_eq!(stats.total_claims_in_batches, 4);
        assert_eq!(stats.total_amount_in_batches, Money::kes(dec!(5700)));
        assert_eq!(stats.batches_with_printed_invoices, 1);
    }

    #[test]
    fn test_empty() {
        let stats = WorkflowStatistics::from_instances(&[], Utc::now());
        assert_eq!(stats.summary.total, 0);
        assert!(stats.average_duration_hours.is_none());
        assert!(stats.average_duration_by_status.is_empty());
        assert!(stats.steps.is_empty());
    }
}
