//! Error types for merchant-sync-transform.

use std::fmt;

use thiserror::Error;

/// Why a field could not be mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// The source left the field unset.
    Missing,
    /// Present but blank after trimming.
    Empty,
    /// Prices must be strictly positive.
    NotPositive,
    /// NaN or infinite.
    NotFinite,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reason::Missing => "missing",
            Reason::Empty => "empty",
            Reason::NotPositive => "must be greater than zero",
            Reason::NotFinite => "not a finite number",
        };
        f.write_str(s)
    }
}

/// A record cannot become a payload. Expected filtering outcome, not a fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: Reason,
}

impl ValidationError {
    pub(crate) fn new(field: &'static str, reason: Reason) -> Self {
        Self { field, reason }
    }
}
