//! Per-run summary.

use chrono::{DateTime, Utc};
use merchant_sync_core::OfferId;
use serde::Serialize;

/// A record that reached the upload step and did not make it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetail {
    pub offer_id: OfferId,
    pub kind: String,
    pub message: String,
    pub attempts: u32,
}

/// A record filtered out before upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipDetail {
    pub offer_id: OfferId,
    pub field: String,
    pub reason: String,
}

/// Counts and details of one pass. Owned by the engine while it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Records the source handed over.
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    /// Subset of `updated` whose payload matched the last one sent.
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub would_upload: usize,
    pub failures: Vec<FailureDetail>,
    pub skipped_details: Vec<SkipDetail>,
    /// Set when the state file could not be read and the run started empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_warning: Option<String>,
}

impl RunReport {
    pub fn new(dry_run: bool, started_at: DateTime<Utc>) -> Self {
        Self {
            dry_run,
            started_at,
            finished_at: None,
            fetched: 0,
            created: 0,
            updated: 0,
            unchanged: 0,
            skipped: 0,
            failed: 0,
            would_upload: 0,
            failures: Vec::new(),
            skipped_details: Vec::new(),
            state_warning: None,
        }
    }

    pub(crate) fn skip(&mut self, offer_id: OfferId, field: &str, reason: impl Into<String>) {
        self.skipped += 1;
        self.skipped_details.push(SkipDetail {
            offer_id,
            field: field.to_string(),
            reason: reason.into(),
        });
    }

    pub(crate) fn fail(&mut self, detail: FailureDetail) {
        self.failed += 1;
        self.failures.push(detail);
    }

    /// Records that reached the remote successfully.
    pub fn succeeded(&self) -> usize {
        self.created + self.updated
    }
}
