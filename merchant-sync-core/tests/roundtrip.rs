//! Roundtrip serialisation tests for `TargetPayload`.
//!
//! Each `#[case]` is isolated; no shared state.

use merchant_sync_core::types::{
    Availability, Condition, OfferId, Price, ProductAttributes, ShippingWeight, TargetPayload,
};
use rstest::rstest;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn price(micros: i64) -> Price {
    Price { amount_micros: micros, currency_code: "EUR".to_string() }
}

fn minimal_payload() -> TargetPayload {
    TargetPayload {
        offer_id: OfferId::from("odoo_1"),
        content_language: "es".to_string(),
        feed_label: "ES".to_string(),
        product_attributes: ProductAttributes {
            title: "Piano".to_string(),
            description: "Upright piano".to_string(),
            link: "https://shop.example/shop/product/1".to_string(),
            image_link: "https://shop.example/web/image/product.template/1/image_1920".to_string(),
            availability: Availability::InStock,
            condition: Condition::New,
            brand: None,
            price: price(10_000_000),
            sale_price: None,
            gtins: vec![],
            mpn: None,
            shipping_weight: None,
            google_product_category: None,
        },
    }
}

fn full_payload() -> TargetPayload {
    let mut payload = minimal_payload();
    let attrs = &mut payload.product_attributes;
    attrs.brand = Some("Acme".to_string());
    attrs.sale_price = Some(price(8_990_000));
    attrs.gtins = vec!["74801234567893".to_string()];
    attrs.mpn = Some("PN-001".to_string());
    attrs.shipping_weight = Some(ShippingWeight { value: 2.5, unit: "kg".to_string() });
    attrs.google_product_category = Some("1604".to_string());
    payload
}

fn unicode_payload() -> TargetPayload {
    let mut payload = minimal_payload();
    payload.product_attributes.title = "Guitarra española — «edición» 日本語".to_string();
    payload.product_attributes.description = "Ñandú & <b>émojis</b> 🎸".to_string();
    payload
}

// ---------------------------------------------------------------------------
// Parameterised roundtrip test
// ---------------------------------------------------------------------------

#[rstest]
#[case("minimal", minimal_payload())]
#[case("all_fields", full_payload())]
#[case("unicode_strings", unicode_payload())]
fn payload_roundtrip(#[case] label: &str, #[case] payload: TargetPayload) {
    let json = serde_json::to_string(&payload)
        .unwrap_or_else(|e| panic!("[{label}] serialize failed: {e}"));
    let back: TargetPayload = serde_json::from_str(&json)
        .unwrap_or_else(|e| panic!("[{label}] deserialize failed: {e}"));
    assert_eq!(payload, back, "[{label}] payload");
}

#[rstest]
#[case(Availability::InStock, "IN_STOCK")]
#[case(Availability::OutOfStock, "OUT_OF_STOCK")]
#[case(Availability::Preorder, "PREORDER")]
#[case(Availability::Backorder, "BACKORDER")]
fn availability_wire_names(#[case] availability: Availability, #[case] wire: &str) {
    let json = serde_json::to_value(availability).expect("serialize");
    assert_eq!(json, wire);
}
