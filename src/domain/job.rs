//! Import job state
//!
//! One `ImportJob` tracks a single end-to-end run: aggregate counters plus
//! the per-row outcome trail. The blob is rewritten whole after every chunk
//! and read concurrently by progress pollers, so it carries everything a
//! consumer needs in one record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome class for one processed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Created,
    Updated,
    Skipped,
    Error,
}

/// Result of processing a single spreadsheet row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowOutcome {
    /// 1-based spreadsheet row number, header row included.
    pub row_number: u32,
    pub title: String,
    pub status: RowStatus,
    pub message: String,
    /// Reference to the created/updated/skipped page, when one exists.
    pub page_id: Option<u64>,
}

/// Durable progress record for one import run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: String,
    pub total: u32,
    pub created: u32,
    pub updated: u32,
    pub skipped: u32,
    pub errors: u32,
    pub details: Vec<RowOutcome>,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    pub fn new(id: impl Into<String>, total: u32) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            total,
            created: 0,
            updated: 0,
            skipped: 0,
            errors: 0,
            details: Vec::new(),
            completed: false,
            started_at: now,
            updated_at: now,
        }
    }

    /// Append an outcome and bump the matching counter.
    pub fn record(&mut self, outcome: RowOutcome) {
        match outcome.status {
            RowStatus::Created => self.created += 1,
            RowStatus::Updated => self.updated += 1,
            RowStatus::Skipped => self.skipped += 1,
            RowStatus::Error => self.errors += 1,
        }
        self.details.push(outcome);
        self.updated_at = Utc::now();
    }

    pub fn processed(&self) -> u32 {
        self.details.len() as u32
    }

    /// Derive the poller-facing progress view.
    pub fn progress(&self, chunk_size: u32) -> ImportProgress {
        let total_batches = self.total.div_ceil(chunk_size);
        let processed = self.processed();
        let percentage = if self.completed {
            100
        } else if self.total == 0 {
            0
        } else {
            (processed * 100 / self.total).min(100)
        };
        ImportProgress {
            percentage,
            processed_batches: processed.div_ceil(chunk_size),
            total_batches,
            is_complete: self.completed,
        }
    }
}

/// Lightweight polling view of a running job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportProgress {
    pub percentage: u32,
    pub processed_batches: u32,
    pub total_batches: u32,
    pub is_complete: bool,
}
