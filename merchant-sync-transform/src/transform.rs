//! `SourceRecord` → `TargetPayload`.

use merchant_sync_core::{
    Availability, CatalogSettings, Condition, OfferId, Price, ProductAttributes, ShippingWeight,
    SourceRecord, TargetPayload,
};

use crate::error::{Reason, ValidationError};
use crate::gtin::normalize_gtin;
use crate::links::product_link;

/// Namespace for offer ids so other feeds in the same account never collide.
pub const OFFER_ID_PREFIX: &str = "odoo_";
pub const MAX_TITLE_CHARS: usize = 150;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;

const WEIGHT_UNIT: &str = "kg";

/// Map one record into the Merchant API schema.
///
/// Fails with [`ValidationError`] when title, description, price or image is
/// unusable; a payload is never partially populated.
pub fn transform(
    record: &SourceRecord,
    catalog: &CatalogSettings,
) -> Result<TargetPayload, ValidationError> {
    let title = required_text("title", record.name.as_deref())?;
    let description = required_text("description", record.description.as_deref())?;
    let image_link = required_text("image_link", record.image_link.as_deref())?;

    // Strike-through price is the regular price; list price becomes the sale price.
    let main = match record.compare_price {
        Some(p) if p.is_finite() && p > 0.0 => Some(p),
        _ => record.list_price,
    };
    let amount_micros = match main {
        None => return Err(ValidationError::new("price", Reason::Missing)),
        Some(p) => to_micros(p).map_err(|reason| ValidationError::new("price", reason))?,
    };
    let sale_price = record
        .list_price
        .and_then(|p| to_micros(p).ok())
        .filter(|micros| *micros != amount_micros)
        .map(|micros| price(micros, catalog));

    let gtins = record
        .barcode
        .as_deref()
        .and_then(|b| normalize_gtin(b, &catalog.gtin_prefix))
        .into_iter()
        .collect();

    let google_product_category = record
        .public_category_ids
        .iter()
        .find_map(|id| catalog.category_map.get(id).cloned())
        .or_else(|| {
            (!record.public_category_ids.is_empty())
                .then(|| catalog.default_google_category.clone())
                .flatten()
        });

    Ok(TargetPayload {
        offer_id: OfferId::namespaced(OFFER_ID_PREFIX, record.id),
        content_language: catalog.language.clone(),
        feed_label: catalog.country.clone(),
        product_attributes: ProductAttributes {
            title: truncate(title, MAX_TITLE_CHARS),
            description: truncate(description, MAX_DESCRIPTION_CHARS),
            link: product_link(&catalog.base_url, record.website_url.as_deref(), record.id),
            image_link: image_link.to_string(),
            availability: Availability::InStock,
            condition: Condition::New,
            brand: catalog.brand.clone(),
            price: price(amount_micros, catalog),
            sale_price,
            gtins,
            mpn: record
                .default_code
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            shipping_weight: record
                .weight
                .filter(|w| w.is_finite() && *w > 0.0)
                .map(|value| ShippingWeight {
                    value,
                    unit: WEIGHT_UNIT.to_string(),
                }),
            google_product_category,
        },
    })
}

/// `round(amount * 1_000_000)`; only strictly positive finite amounts pass.
pub fn to_micros(amount: f64) -> Result<i64, Reason> {
    if !amount.is_finite() {
        return Err(Reason::NotFinite);
    }
    let micros = (amount * 1_000_000.0).round();
    if micros <= 0.0 {
        return Err(Reason::NotPositive);
    }
    Ok(micros as i64)
}

fn price(amount_micros: i64, catalog: &CatalogSettings) -> Price {
    Price {
        amount_micros,
        currency_code: catalog.currency.clone(),
    }
}

fn required_text<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str, ValidationError> {
    match value {
        None => Err(ValidationError::new(field, Reason::Missing)),
        Some(v) if v.trim().is_empty() => Err(ValidationError::new(field, Reason::Empty)),
        Some(v) => Ok(v.trim()),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
