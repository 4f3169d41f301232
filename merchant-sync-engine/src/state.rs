//! Durable per-record sync state.
//!
//! One JSON document keyed by [`OfferId`]:
//!
//! ```json
//! { "version": 1, "saved_at": "…", "records": { "odoo_42": { "outcome": "success", … } } }
//! ```
//!
//! Writes go to `<path>.tmp` first and are renamed over the real file, so a
//! crash never leaves a half-written document where the loader looks.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use merchant_sync_core::OfferId;
use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};
use crate::upload::RemoteId;

pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Skipped,
}

/// What the last attempt on one record left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecordState {
    pub outcome: Outcome,
    pub last_attempt_at: DateTime<Utc>,
    /// Kept across later failures once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Upload attempts made in the run that wrote this entry.
    pub attempts: u32,
    /// SHA-256 of the last payload sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_digest: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    records: BTreeMap<OfferId, SyncRecordState>,
}

/// In-memory view of the state file at `path`.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    path: PathBuf,
    saved_at: Option<DateTime<Utc>>,
    records: BTreeMap<OfferId, SyncRecordState>,
}

impl SyncState {
    /// A state with no entries that will be saved to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            saved_at: None,
            records: BTreeMap::new(),
        }
    }

    /// Strict load, for reporting tools. A missing file is an empty state.
    pub fn try_load_at(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            return Ok(Self::empty(path));
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let file: StateFile =
            serde_json::from_str(&contents).map_err(|source| SyncError::StateCorrupt {
                path: path.to_path_buf(),
                source,
            })?;
        if file.version != STATE_VERSION {
            return Err(SyncError::UnsupportedStateVersion {
                path: path.to_path_buf(),
                version: file.version,
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            saved_at: file.saved_at,
            records: file.records,
        })
    }

    /// Fail-open load, for the engine.
    ///
    /// An unreadable or corrupt file yields an empty state plus the error
    /// that caused it. Starting empty only costs redundant uploads.
    pub fn load_at(path: &Path) -> (Self, Option<SyncError>) {
        match Self::try_load_at(path) {
            Ok(state) => (state, None),
            Err(err) => {
                tracing::warn!("starting from empty sync state: {err}");
                (Self::empty(path), Some(err))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When this state was last written, if ever.
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.saved_at
    }

    pub fn get(&self, id: &OfferId) -> Option<&SyncRecordState> {
        self.records.get(id)
    }

    /// Overwrite the entry for `id`. Durable only after [`save`](Self::save).
    pub fn put(&mut self, id: OfferId, state: SyncRecordState) {
        self.records.insert(id, state);
    }

    pub fn remove(&mut self, id: &OfferId) -> Option<SyncRecordState> {
        self.records.remove(id)
    }

    /// Drop every entry; returns how many there were.
    pub fn clear(&mut self) -> usize {
        let n = self.records.len();
        self.records.clear();
        n
    }

    pub fn records(&self) -> &BTreeMap<OfferId, SyncRecordState> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persist atomically: write `<path>.tmp`, fsync, rename over `<path>`.
    pub fn save(&mut self) -> Result<(), SyncError> {
        let tmp = tmp_path(&self.path);
        self.save_with_tmp(&tmp)
    }

    fn save_with_tmp(&mut self, tmp: &Path) -> Result<(), SyncError> {
        let path = self.path.clone();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }

        let saved_at = Utc::now();
        let file = StateFile {
            version: STATE_VERSION,
            saved_at: Some(saved_at),
            records: self.records.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let mut out = File::create(tmp).map_err(|e| io_err(tmp, e))?;
        out.write_all(json.as_bytes())
            .and_then(|()| out.sync_all())
            .map_err(|e| io_err(tmp, e))?;
        drop(out);

        if let Err(e) = std::fs::rename(tmp, &path) {
            let _ = std::fs::remove_file(tmp);
            return Err(io_err(&path, e));
        }
        self.saved_at = Some(saved_at);
        tracing::debug!("saved {} state entries to {}", self.records.len(), path.display());
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.tmp", path.display()))
}
