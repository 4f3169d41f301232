//! # merchant-sync-engine
//!
//! Resumable, sequential sync of ERP records into a remote catalog.
//!
//! [`SyncEngine::run`] pulls every eligible record from a [`RecordSource`],
//! transforms it, uploads it through an [`UploadClient`] with bounded retry,
//! and records the outcome in the durable [`SyncState`]. A [`RunReport`]
//! summarises the pass.

pub mod engine;
pub mod error;
pub mod error_log;
pub mod report;
pub mod retry;
pub mod source;
pub mod state;
pub mod upload;

pub use engine::{payload_digest, RunMode, SyncEngine};
pub use error::{SourceError, SyncError, UploadError};
pub use error_log::{ErrorLog, ErrorLogEntry};
pub use report::{FailureDetail, RunReport, SkipDetail};
pub use retry::{upload_with_retry, Attempted, RecordingSleeper, Sleeper, ThreadSleeper};
pub use source::{FilterCriteria, RecordSource};
pub use state::{Outcome, SyncRecordState, SyncState, STATE_VERSION};
pub use upload::{RemoteId, UploadClient};
