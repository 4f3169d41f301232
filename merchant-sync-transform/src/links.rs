//! Storefront URL building.

use merchant_sync_core::SourceId;

/// Public product page for a record.
///
/// An absolute `website_url` is used as-is; a relative one is joined onto
/// `base_url`; without one the standard `/shop/product/<id>` route is used.
pub fn product_link(base_url: &str, website_url: Option<&str>, id: SourceId) -> String {
    let base = base_url.trim_end_matches('/');
    match website_url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => url.to_string(),
        Some(path) => format!("{base}/{}", path.trim_start_matches('/')),
        None => format!("{base}/shop/product/{id}"),
    }
}

/// Odoo's public image route for a product template.
pub fn image_link(base_url: &str, id: SourceId) -> String {
    format!(
        "{}/web/image/product.template/{id}/image_1920",
        base_url.trim_end_matches('/')
    )
}
