//! Error types for merchant-sync-engine.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Run-level failures. Anything here aborts the pass; per-record problems
/// never surface as a `SyncError`.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The record source could not deliver the collection at all.
    #[error("record source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but is not a state document.
    #[error("state file {path} is unreadable: {source}")]
    StateCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state file {path} has unsupported version {version}")]
    UnsupportedStateVersion { path: PathBuf, version: u32 },

    /// JSON serialization error (state, error log, payload digest).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Failures of a [`RecordSource`](crate::RecordSource).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// The remote answered, but not with something we understand.
    #[error("unexpected response: {0}")]
    Protocol(String),
}

/// Failures of a single [`UploadClient::upload`](crate::UploadClient::upload) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("rate limited{}", retry_after_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication rejected: {0}")]
    AuthError(String),

    #[error("rejected by remote validation: {details}")]
    ValidationRejected { details: String },

    #[error("transient failure: {cause}")]
    Transient { cause: String },

    #[error("fatal failure: {cause}")]
    Fatal { cause: String },
}

impl UploadError {
    /// `RateLimited` and `Transient` are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient { .. })
    }

    /// Stable short name, used in the error log and report.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::AuthError(_) => "auth_error",
            Self::ValidationRejected { .. } => "validation_rejected",
            Self::Transient { .. } => "transient",
            Self::Fatal { .. } => "fatal",
        }
    }
}

fn retry_after_suffix(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}
