//! merchant-sync core library: domain types, configuration, errors.
//!
//! - [`types`]: source records, target payloads, identifiers
//! - [`config`]: [`RawConfig`] loading and [`Config`] resolution
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    CatalogSettings, Config, ImageSettings, MerchantSettings, OdooSettings, RawConfig,
    RetryPolicy, SavePolicy, SyncSettings, TokenSource,
};
pub use error::ConfigError;
pub use types::{
    Availability, Condition, OfferId, Price, ProductAttributes, ShippingWeight, SourceId,
    SourceRecord, TargetPayload,
};
