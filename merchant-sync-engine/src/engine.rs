//! One sync pass: pull → transform → upload → record.
//!
//! Records are handled strictly one after another in source order. Only a
//! source failure or a state save failure ends the pass early; everything
//! that goes wrong with a single record lands in the [`RunReport`].

use std::collections::HashSet;

use chrono::Utc;
use merchant_sync_core::{CatalogSettings, OfferId, SavePolicy, SyncSettings, TargetPayload};
use merchant_sync_transform::{transform, OFFER_ID_PREFIX};
use sha2::{Digest, Sha256};

use crate::error::SyncError;
use crate::error_log::{ErrorLog, ErrorLogEntry};
use crate::report::{FailureDetail, RunReport};
use crate::retry::{upload_with_retry, Sleeper, ThreadSleeper};
use crate::source::{FilterCriteria, RecordSource};
use crate::state::{Outcome, SyncRecordState, SyncState};
use crate::upload::UploadClient;

/// Whether a pass may touch the remote catalog.
///
/// A dry run has no client to call, so it cannot upload by construction.
pub enum RunMode<'a> {
    DryRun,
    Live(&'a mut dyn UploadClient),
}

impl RunMode<'_> {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, RunMode::DryRun)
    }
}

pub struct SyncEngine<S = ThreadSleeper> {
    catalog: CatalogSettings,
    settings: SyncSettings,
    criteria: FilterCriteria,
    sleeper: S,
}

impl SyncEngine<ThreadSleeper> {
    pub fn new(catalog: CatalogSettings, settings: SyncSettings) -> Self {
        Self::with_sleeper(catalog, settings, ThreadSleeper)
    }
}

impl<S: Sleeper> SyncEngine<S> {
    pub fn with_sleeper(catalog: CatalogSettings, settings: SyncSettings, sleeper: S) -> Self {
        Self {
            catalog,
            settings,
            criteria: FilterCriteria::default(),
            sleeper,
        }
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Run one full pass.
    pub fn run(
        &mut self,
        source: &mut dyn RecordSource,
        mut mode: RunMode<'_>,
    ) -> Result<RunReport, SyncError> {
        let dry_run = mode.is_dry_run();
        let mut report = RunReport::new(dry_run, Utc::now());

        let (mut state, warning) = SyncState::load_at(&self.settings.state_file);
        report.state_warning = warning.map(|e| e.to_string());
        let error_log = ErrorLog::new(&self.settings.error_log);

        let records = source.fetch_all(&self.criteria)?;
        report.fetched = records.len();
        tracing::info!(
            "fetched {} records{}",
            records.len(),
            if dry_run { " (dry run)" } else { "" }
        );

        let mut seen: HashSet<OfferId> = HashSet::with_capacity(records.len());
        let mut uploaded_any = false;

        for record in &records {
            let offer_id = OfferId::namespaced(OFFER_ID_PREFIX, record.id);
            if !seen.insert(offer_id.clone()) {
                tracing::warn!("{offer_id}: duplicate identifier in this pass, skipping");
                report.skip(offer_id, "id", "duplicate identifier");
                continue;
            }

            let payload = match transform(record, &self.catalog) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::info!("{offer_id}: skipped ({err})");
                    report.skip(offer_id, err.field, err.reason.to_string());
                    continue;
                }
            };

            let client = match &mut mode {
                RunMode::DryRun => {
                    let attrs = &payload.product_attributes;
                    tracing::info!(
                        "[dry-run] would upload {offer_id}: {:?} {:.2} {}",
                        attrs.title,
                        attrs.price.amount_micros as f64 / 1_000_000.0,
                        attrs.price.currency_code
                    );
                    tracing::debug!("{}", serde_json::to_string(&payload)?);
                    report.would_upload += 1;
                    continue;
                }
                RunMode::Live(client) => &mut **client,
            };

            if uploaded_any && !self.settings.record_delay.is_zero() {
                self.sleeper.sleep(self.settings.record_delay);
            }
            uploaded_any = true;

            let digest = payload_digest(&payload)?;
            let prior = state.get(&offer_id).cloned();
            let attempted =
                upload_with_retry(client, &payload, &self.settings.retry, &mut self.sleeper);

            let entry = match attempted.result {
                Ok(remote_id) => {
                    let known = prior.as_ref().is_some_and(|p| p.remote_id.is_some());
                    if known {
                        report.updated += 1;
                        if prior.as_ref().and_then(|p| p.payload_digest.as_deref())
                            == Some(digest.as_str())
                        {
                            report.unchanged += 1;
                        }
                    } else {
                        report.created += 1;
                    }
                    tracing::info!(
                        "{offer_id}: {} as {remote_id}",
                        if known { "updated" } else { "created" }
                    );
                    SyncRecordState {
                        outcome: Outcome::Success,
                        last_attempt_at: Utc::now(),
                        remote_id: Some(remote_id),
                        last_error: None,
                        attempts: attempted.attempts,
                        payload_digest: Some(digest),
                    }
                }
                Err(err) => {
                    tracing::error!(
                        "{offer_id}: failed after {} attempt(s): {err}",
                        attempted.attempts
                    );
                    let now = Utc::now();
                    let log_entry = ErrorLogEntry {
                        run_started_at: report.started_at,
                        offer_id: offer_id.clone(),
                        kind: err.kind().to_string(),
                        message: err.to_string(),
                        attempts: attempted.attempts,
                        timestamp: now,
                    };
                    if let Err(e) = error_log.append(&log_entry) {
                        tracing::warn!("could not append to error log: {e}");
                    }
                    report.fail(FailureDetail {
                        offer_id: offer_id.clone(),
                        kind: log_entry.kind,
                        message: log_entry.message,
                        attempts: attempted.attempts,
                    });
                    SyncRecordState {
                        outcome: Outcome::Failure,
                        last_attempt_at: now,
                        remote_id: prior.as_ref().and_then(|p| p.remote_id.clone()),
                        last_error: Some(err.to_string()),
                        attempts: attempted.attempts,
                        payload_digest: prior.and_then(|p| p.payload_digest),
                    }
                }
            };

            state.put(offer_id, entry);
            if self.settings.save_policy == SavePolicy::EveryRecord {
                state.save()?;
            }
        }

        if !dry_run {
            state.save()?;
        }

        report.finished_at = Some(Utc::now());
        tracing::info!(
            "run finished: created={} updated={} unchanged={} skipped={} failed={} would_upload={}",
            report.created,
            report.updated,
            report.unchanged,
            report.skipped,
            report.failed,
            report.would_upload
        );
        Ok(report)
    }
}

/// Hex SHA-256 of the payload's JSON encoding.
pub fn payload_digest(payload: &TargetPayload) -> Result<String, SyncError> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
