//! Human-readable document numbers
//!
//! Claims, invoices and batches get sequential numbers scoped to a period:
//!
//! | kind    | format                      | period   |
//! |---------|-----------------------------|----------|
//! | claim   | `SHA-YYYYMM-NNNNNN`         | month    |
//! | invoice | `SHA-INV-YYYYMM-NNNNNN`     | month    |
//! | batch   | `SHA-BATCH-YYYYMMDD-NNNN`   | day      |
//!
//! The sequence itself comes from the claim store so numbers stay unique
//! across processes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which numbered document a sequence belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberKind {
    Claim,
    Invoice,
    Batch,
}

impl NumberKind {
    fn prefix(&self) -> &'static str {
        match self {
            NumberKind::Claim => "SHA",
            NumberKind::Invoice => "SHA-INV",
            NumberKind::Batch => "SHA-BATCH",
        }
    }

    fn width(&self) -> usize {
        match self {
            NumberKind::Batch => 4,
            _ => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NumberKind::Claim => "claim",
            NumberKind::Invoice => "invoice",
            NumberKind::Batch => "batch",
        }
    }

    /// Period key the sequence restarts on
    pub fn period(&self, date: NaiveDate) -> String {
        match self {
            NumberKind::Batch => date.format("%Y%m%d").to_string(),
            _ => date.format("%Y%m").to_string(),
        }
    }

    /// Formats a number for the given date and sequence value
    pub fn format(&self, date: NaiveDate, sequence: u32) -> String {
        format!(
            "{}-{}-{:0width$}",
            self.prefix(),
            self.period(date),
            sequence,
            width = self.width()
        )
    }

    /// Extracts the sequence value from a formatted number of this kind
    pub fn parse_sequence(&self, number: &str) -> Option<u32> {
        let rest = number.strip_prefix(self.prefix())?.strip_prefix('-')?;
        let (period, seq) = rest.split_once('-')?;
        let period_len = if *self == NumberKind::Batch { 8 } else { 6 };
        if period.len() != period_len || !period.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if seq.len() < self.width() || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        seq.parse().ok()
    }
}
