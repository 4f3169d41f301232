//! Error types for merchant-sync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading and resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading a config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// One or more required options are unset. Lists every missing key.
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<String>),

    /// An option is present but cannot be used.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}
