//! Where payloads go.

use std::fmt;

use merchant_sync_core::TargetPayload;
use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// Identifier the remote catalog assigned to an uploaded payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(pub String);

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RemoteId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Upserts one payload into the remote catalog.
///
/// Implementations make a single attempt; retrying is the engine's job.
pub trait UploadClient {
    fn upload(&mut self, payload: &TargetPayload) -> Result<RemoteId, UploadError>;
}
