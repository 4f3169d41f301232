//! Domain types shared by the transformer, the engine and the CLI collaborators.
//!
//! `SourceRecord` is what the ERP side hands over; `TargetPayload` is the
//! Merchant API `ProductInput` shape (camelCase on the wire).

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of a record in the source system (an Odoo `product.template` id).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for SourceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Namespaced identifier of a record in the remote catalog.
///
/// Sync state is keyed by this value, never by the raw [`SourceId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(pub String);

impl OfferId {
    /// `<prefix><source id>`, e.g. `odoo_42`.
    pub fn namespaced(prefix: &str, id: SourceId) -> Self {
        Self(format!("{prefix}{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for OfferId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OfferId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Source side
// ---------------------------------------------------------------------------

/// One record pulled from the source system.
///
/// Empty ERP fields arrive as `None`. `image_link` is already resolved to a
/// public URL by an image resolver before the record is built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceRecord {
    pub id: SourceId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_link: Option<String>,
    pub list_price: Option<f64>,
    /// Strike-through price; when set it becomes the main price.
    pub compare_price: Option<f64>,
    pub website_url: Option<String>,
    pub published: bool,
    pub barcode: Option<String>,
    pub default_code: Option<String>,
    /// Weight in kilograms.
    pub weight: Option<f64>,
    pub public_category_ids: Vec<u64>,
}

// ---------------------------------------------------------------------------
// Target side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    #[default]
    InStock,
    OutOfStock,
    Preorder,
    Backorder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    #[default]
    New,
    Refurbished,
    Used,
}

/// Monetary amount in micros (`amount * 1_000_000`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    pub amount_micros: i64,
    pub currency_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingWeight {
    pub value: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAttributes {
    pub title: String,
    pub description: String,
    pub link: String,
    pub image_link: String,
    pub availability: Availability,
    pub condition: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<Price>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gtins: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_weight: Option<ShippingWeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_product_category: Option<String>,
}

/// A fully validated record in the remote schema. Never partially populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetPayload {
    pub offer_id: OfferId,
    pub content_language: String,
    pub feed_label: String,
    pub product_attributes: ProductAttributes,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
