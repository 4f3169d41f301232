//! # merchant-sync-transform
//!
//! Pure mapping from an ERP [`SourceRecord`] to the Merchant API
//! [`TargetPayload`]. No I/O happens here; image resolution and uploads are
//! the caller's business.
//!
//! ## Usage
//!
//! ```rust
//! use merchant_sync_core::{CatalogSettings, SourceId, SourceRecord};
//! use merchant_sync_transform::transform;
//!
//! let catalog = CatalogSettings::new("https://shop.example");
//! let record = SourceRecord {
//!     id: SourceId(7),
//!     name: Some("Upright piano".into()),
//!     description: Some("<p>Walnut finish</p>".into()),
//!     image_link: Some("https://shop.example/web/image/product.template/7/image_1920".into()),
//!     list_price: Some(29.99),
//!     ..Default::default()
//! };
//! let payload = transform(&record, &catalog).expect("valid record");
//! assert_eq!(payload.offer_id.as_str(), "odoo_7");
//! assert_eq!(payload.product_attributes.price.amount_micros, 29_990_000);
//! ```

pub mod error;
pub mod gtin;
pub mod links;
pub mod transform;

pub use error::{Reason, ValidationError};
pub use gtin::{gs1_check_digit, normalize_gtin};
pub use links::{image_link, product_link};
pub use transform::{
    to_micros, transform, MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS, OFFER_ID_PREFIX,
};
