//! Run configuration.
//!
//! # Sources, lowest precedence first
//!
//! ```text
//! 1. built-in defaults (currency EUR, country ES, language es, …)
//! 2. YAML file           (--config, $MERCHANT_SYNC_CONFIG, or <config_dir>/merchant-sync/config.yaml)
//! 3. environment         (ODOO_URL, GOOGLE_MERCHANT_ID, WEBSITE_BASE_URL, …)
//! ```
//!
//! Everything is collected into a [`RawConfig`] of optional values and then
//! [`RawConfig::resolve`]d into a validated [`Config`]. The environment is read
//! through an injected lookup function so callers (and tests) decide where
//! values come from; nothing here touches process-global state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_STATE_FILE: &str = "Workflow/merchant_sync_progress.json";
pub const DEFAULT_ERROR_LOG: &str = "Workflow/merchant_sync_errors.jsonl";
pub const DEFAULT_MERCHANT_ENDPOINT: &str = "https://merchantapi.googleapis.com";
pub const DEFAULT_CURRENCY: &str = "EUR";
pub const DEFAULT_COUNTRY: &str = "ES";
pub const DEFAULT_LANGUAGE: &str = "es";
pub const DEFAULT_GTIN_PREFIX: &str = "748";
pub const DEFAULT_BATCH_SIZE: usize = 500;

// ---------------------------------------------------------------------------
// 1. Resolved configuration
// ---------------------------------------------------------------------------

/// Fully validated configuration for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub odoo: OdooSettings,
    /// `None` only in dry-run mode, where no upload client is built.
    pub merchant: Option<MerchantSettings>,
    pub catalog: CatalogSettings,
    pub sync: SyncSettings,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OdooSettings {
    pub url: String,
    pub database: String,
    pub username: String,
    /// API key or password; Odoo accepts either in the same slot.
    pub secret: String,
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub images: ImageSettings,
}

/// How the base64 image blob of a record is turned into a public URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSettings {
    /// Link straight to Odoo's `/web/image/...` route under the site base URL.
    OdooLinks,
    /// Decode blobs into `dir` and link them under `base_url`.
    Directory { dir: PathBuf, base_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantSettings {
    pub endpoint: String,
    pub account_id: String,
    pub data_source_id: String,
    pub token: TokenSource,
}

/// Where the Merchant API bearer token comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Static(String),
    /// Shell command printing a token on stdout (e.g. `gcloud auth print-access-token`).
    Command(String),
}

/// Static catalog defaults applied by the transformer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSettings {
    pub base_url: String,
    pub currency: String,
    pub country: String,
    pub language: String,
    pub gtin_prefix: String,
    pub brand: Option<String>,
    pub default_google_category: Option<String>,
    /// Odoo public category id → Google product category.
    pub category_map: BTreeMap<u64, String>,
}

impl CatalogSettings {
    /// Catalog settings with the built-in defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            currency: DEFAULT_CURRENCY.to_string(),
            country: DEFAULT_COUNTRY.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            gtin_prefix: DEFAULT_GTIN_PREFIX.to_string(),
            brand: None,
            default_google_category: None,
            category_map: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub state_file: PathBuf,
    pub error_log: PathBuf,
    /// Pause after each uploaded record; zero disables it.
    pub record_delay: Duration,
    pub retry: RetryPolicy,
    pub save_policy: SavePolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            error_log: PathBuf::from(DEFAULT_ERROR_LOG),
            record_delay: Duration::from_millis(500),
            retry: RetryPolicy::default(),
            save_policy: SavePolicy::default(),
        }
    }
}

/// When the sync state is written back to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavePolicy {
    /// Once, after the whole pass.
    #[default]
    EndOfRun,
    /// After every record that touched the state.
    EveryRecord,
}

impl FromStr for SavePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "end_of_run" => Ok(Self::EndOfRun),
            "every_record" => Ok(Self::EveryRecord),
            other => Err(format!(
                "unknown save policy '{other}'; expected: end_of_run, every_record"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Retry policy
// ---------------------------------------------------------------------------

/// Bounded exponential backoff for retryable upload errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total upload attempts per record, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped at `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }

    /// Delay honouring a server-provided hint, clamped to `max_delay`.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.max_delay),
            None => self.backoff(retry),
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Raw (unvalidated) configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    pub odoo: RawOdoo,
    pub merchant: RawMerchant,
    pub catalog: RawCatalog,
    pub sync: RawSync,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawOdoo {
    pub url: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub batch_size: Option<usize>,
    pub batch_pause_ms: Option<u64>,
    pub image_dir: Option<PathBuf>,
    pub image_base_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawMerchant {
    pub endpoint: Option<String>,
    pub account_id: Option<String>,
    pub data_source_id: Option<String>,
    pub access_token: Option<String>,
    pub token_command: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawCatalog {
    pub base_url: Option<String>,
    pub currency: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub gtin_prefix: Option<String>,
    pub brand: Option<String>,
    pub google_category: Option<String>,
    pub category_map: BTreeMap<u64, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawSync {
    pub state_file: Option<PathBuf>,
    pub error_log: Option<PathBuf>,
    pub record_delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub save_policy: Option<SavePolicy>,
}

/// `<config_dir>/merchant-sync/config.yaml`. Pure, no I/O.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("merchant-sync").join("config.yaml"))
}

impl RawConfig {
    /// Parse a YAML config file.
    ///
    /// Returns `ConfigError::Parse` (with path + line context) if malformed.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Where the sync state lives, without validating anything else.
    ///
    /// Read-only tools use this so they work without credentials.
    pub fn state_file(&self) -> PathBuf {
        self.sync
            .state_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
    }

    /// Overlay environment values on top of whatever the file provided.
    ///
    /// Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        overlay(&mut self.odoo.url, get("ODOO_URL"));
        overlay(&mut self.odoo.database, get("ODOO_DB"));
        overlay(&mut self.odoo.username, get("ODOO_USER"));
        overlay(&mut self.odoo.password, get("ODOO_PASSWORD"));
        overlay(&mut self.odoo.api_key, get("ODOO_API_KEY"));
        overlay(&mut self.odoo.image_dir, get("MERCHANT_SYNC_IMAGE_DIR").map(PathBuf::from));
        overlay(&mut self.odoo.image_base_url, get("MERCHANT_SYNC_IMAGE_BASE_URL"));
        overlay(
            &mut self.odoo.batch_size,
            parse_env("MERCHANT_SYNC_BATCH_SIZE", get("MERCHANT_SYNC_BATCH_SIZE"))?,
        );

        overlay(&mut self.merchant.endpoint, get("MERCHANT_API_ENDPOINT"));
        overlay(&mut self.merchant.account_id, get("GOOGLE_MERCHANT_ID"));
        overlay(&mut self.merchant.data_source_id, get("GOOGLE_DATA_SOURCE_ID"));
        overlay(&mut self.merchant.access_token, get("GOOGLE_ACCESS_TOKEN"));
        overlay(&mut self.merchant.token_command, get("GOOGLE_TOKEN_COMMAND"));

        overlay(&mut self.catalog.base_url, get("WEBSITE_BASE_URL"));
        overlay(&mut self.catalog.currency, get("DEFAULT_CURRENCY"));
        overlay(&mut self.catalog.country, get("DEFAULT_COUNTRY"));
        overlay(&mut self.catalog.language, get("DEFAULT_LANGUAGE"));
        overlay(&mut self.catalog.gtin_prefix, get("GTIN_PREFIX"));
        overlay(&mut self.catalog.brand, get("DEFAULT_BRAND"));
        overlay(&mut self.catalog.google_category, get("GOOGLE_PRODUCT_CATEGORY"));

        overlay(&mut self.sync.state_file, get("MERCHANT_SYNC_STATE_FILE").map(PathBuf::from));
        overlay(&mut self.sync.error_log, get("MERCHANT_SYNC_ERROR_LOG").map(PathBuf::from));
        overlay(
            &mut self.sync.record_delay_ms,
            parse_env("MERCHANT_SYNC_RECORD_DELAY_MS", get("MERCHANT_SYNC_RECORD_DELAY_MS"))?,
        );
        overlay(
            &mut self.sync.max_attempts,
            parse_env("MERCHANT_SYNC_MAX_ATTEMPTS", get("MERCHANT_SYNC_MAX_ATTEMPTS"))?,
        );
        overlay(
            &mut self.sync.save_policy,
            parse_env("MERCHANT_SYNC_SAVE_POLICY", get("MERCHANT_SYNC_SAVE_POLICY"))?,
        );
        Ok(())
    }

    /// Validate and fill defaults.
    ///
    /// Every missing required key is reported in one [`ConfigError::Missing`].
    /// Merchant settings are only required outside dry-run.
    pub fn resolve(self, dry_run: bool) -> Result<Config, ConfigError> {
        let mut missing = Vec::new();

        let odoo_url = require(self.odoo.url, "ODOO_URL", &mut missing);
        let database = require(self.odoo.database, "ODOO_DB", &mut missing);
        let credentials = match (self.odoo.api_key, self.odoo.username, self.odoo.password) {
            (Some(key), user, _) => Some((user.unwrap_or_else(|| "admin".to_string()), key)),
            (None, Some(user), Some(password)) => Some((user, password)),
            _ => {
                missing.push("ODOO_API_KEY or (ODOO_USER + ODOO_PASSWORD)".to_string());
                None
            }
        };
        let base_url = require(self.catalog.base_url, "WEBSITE_BASE_URL", &mut missing);

        let merchant = if dry_run {
            None
        } else {
            let account_id = require(self.merchant.account_id, "GOOGLE_MERCHANT_ID", &mut missing);
            let data_source_id =
                require(self.merchant.data_source_id, "GOOGLE_DATA_SOURCE_ID", &mut missing);
            let token = match (self.merchant.access_token, self.merchant.token_command) {
                (Some(token), _) => Some(TokenSource::Static(token)),
                (None, Some(command)) => Some(TokenSource::Command(command)),
                (None, None) => {
                    missing.push("GOOGLE_ACCESS_TOKEN or GOOGLE_TOKEN_COMMAND".to_string());
                    None
                }
            };
            match (account_id, data_source_id, token) {
                (Some(account_id), Some(data_source_id), Some(token)) => Some(MerchantSettings {
                    endpoint: self
                        .merchant
                        .endpoint
                        .unwrap_or_else(|| DEFAULT_MERCHANT_ENDPOINT.to_string()),
                    account_id,
                    data_source_id,
                    token,
                }),
                _ => None,
            }
        };

        let images = match (self.odoo.image_dir, self.odoo.image_base_url) {
            (Some(dir), Some(base_url)) => ImageSettings::Directory { dir, base_url },
            (None, None) => ImageSettings::OdooLinks,
            (Some(_), None) => {
                missing.push("MERCHANT_SYNC_IMAGE_BASE_URL".to_string());
                ImageSettings::OdooLinks
            }
            (None, Some(_)) => {
                missing.push("MERCHANT_SYNC_IMAGE_DIR".to_string());
                ImageSettings::OdooLinks
            }
        };

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        let (Some(url), Some(database), Some((username, secret)), Some(base_url)) =
            (odoo_url, database, credentials, base_url)
        else {
            return Err(ConfigError::Missing(vec!["odoo connection".to_string()]));
        };

        let gtin_prefix = self
            .catalog
            .gtin_prefix
            .unwrap_or_else(|| DEFAULT_GTIN_PREFIX.to_string());
        if gtin_prefix.len() != 3 || !gtin_prefix.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Invalid {
                key: "GTIN_PREFIX".to_string(),
                reason: format!("expected exactly 3 digits, got '{gtin_prefix}'"),
            });
        }

        let batch_size = self.odoo.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "MERCHANT_SYNC_BATCH_SIZE".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let defaults = SyncSettings::default();
        let retry = RetryPolicy {
            max_attempts: self.sync.max_attempts.unwrap_or(defaults.retry.max_attempts),
            base_delay: self
                .sync
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.base_delay),
            max_delay: self
                .sync
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.max_delay),
        };
        if retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "MERCHANT_SYNC_MAX_ATTEMPTS".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Config {
            odoo: OdooSettings {
                url: url.trim_end_matches('/').to_string(),
                database,
                username,
                secret,
                batch_size,
                batch_pause: Duration::from_millis(self.odoo.batch_pause_ms.unwrap_or(1000)),
                images,
            },
            merchant,
            catalog: CatalogSettings {
                base_url,
                currency: self
                    .catalog
                    .currency
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
                country: self
                    .catalog
                    .country
                    .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
                language: self
                    .catalog
                    .language
                    .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
                gtin_prefix,
                brand: self.catalog.brand,
                default_google_category: self.catalog.google_category,
                category_map: self.catalog.category_map,
            },
            sync: SyncSettings {
                state_file: self.sync.state_file.unwrap_or(defaults.state_file),
                error_log: self.sync.error_log.unwrap_or(defaults.error_log),
                record_delay: self
                    .sync
                    .record_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.record_delay),
                retry,
                save_policy: self.sync.save_policy.unwrap_or_default(),
            },
            dry_run,
        })
    }
}

// ---------------------------------------------------------------------------
// 4. Helpers
// ---------------------------------------------------------------------------

fn overlay<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn require(value: Option<String>, key: &str, missing: &mut Vec<String>) -> Option<String> {
    if value.is_none() {
        missing.push(key.to_string());
    }
    value
}

fn parse_env<T>(key: &str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(5));
        assert_eq!(policy.backoff(40), Duration::from_secs(5));
    }

    #[test]
    fn retry_after_hint_wins_but_is_clamped() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(3600))),
            policy.max_delay
        );
    }

    #[test]
    fn api_key_defaults_username_to_admin() {
        let mut raw = RawConfig::default();
        raw.apply_env(env(&[
            ("ODOO_URL", "https://erp.example/"),
            ("ODOO_DB", "prod"),
            ("ODOO_API_KEY", "k"),
            ("WEBSITE_BASE_URL", "https://shop.example"),
        ]))
        .unwrap();
        let config = raw.resolve(true).unwrap();
        assert_eq!(config.odoo.username, "admin");
        assert_eq!(config.odoo.secret, "k");
        assert_eq!(config.odoo.url, "https://erp.example");
        assert!(config.merchant.is_none());
    }

    #[test]
    fn empty_env_values_count_as_unset() {
        let mut raw = RawConfig::default();
        raw.apply_env(env(&[("ODOO_URL", "  ")])).unwrap();
        assert!(raw.odoo.url.is_none());
    }

    #[test]
    fn invalid_numeric_env_is_reported_with_key() {
        let mut raw = RawConfig::default();
        let err = raw
            .apply_env(env(&[("MERCHANT_SYNC_MAX_ATTEMPTS", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "MERCHANT_SYNC_MAX_ATTEMPTS"));
    }

    #[test]
    fn save_policy_parses_both_spellings() {
        assert_eq!("every-record".parse::<SavePolicy>(), Ok(SavePolicy::EveryRecord));
        assert_eq!("END_OF_RUN".parse::<SavePolicy>(), Ok(SavePolicy::EndOfRun));
        assert!("sometimes".parse::<SavePolicy>().is_err());
    }
}
