//! Subcommand implementations and the config loading they share.

pub mod reset;
pub mod run;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use merchant_sync_core::{config::default_config_path, RawConfig};

/// Where configuration comes from. Accepted by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// YAML config file (default: $MERCHANT_SYNC_CONFIG, then
    /// <config dir>/merchant-sync/config.yaml if present).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Load environment variables from this file instead of ./.env.
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,
}

impl ConfigArgs {
    /// `.env`, then the config file, then the process environment on top.
    pub fn load(&self) -> Result<RawConfig> {
        match &self.env_file {
            Some(path) => {
                dotenvy::from_path(path)
                    .with_context(|| format!("failed to load env file {}", path.display()))?;
            }
            None => {
                // A missing ./.env is normal.
                let _ = dotenvy::dotenv();
            }
        }

        let mut raw = match self.config_path() {
            Some(path) => {
                tracing::debug!("loading config from {}", path.display());
                RawConfig::load_at(&path).context("failed to load configuration file")?
            }
            None => RawConfig::default(),
        };
        raw.apply_env(|key| std::env::var(key).ok())
            .context("invalid environment configuration")?;
        Ok(raw)
    }

    fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config {
            return Some(path.clone());
        }
        if let Some(path) = std::env::var_os("MERCHANT_SYNC_CONFIG").filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }
        default_config_path().filter(|p| Path::exists(p))
    }
}
