use rust_decimal::Decimal;
use serde_json::Value;

use crate::domain::cart::CartItem;

pub const PACKING_WEIGHT_KEY: &str = "packingWeight";
pub const PRODUCT_WEIGHT_KEY: &str = "productWeight";
pub const VARIANT_WEIGHT_KEY: &str = "variantWeight";

const GRAMS_PER_KG: i64 = 1_000;

/// Parses a supplier weight in grams. Ranges such as `"100-200"` resolve to the upper bound.
pub fn parse_weight_grams(raw: &str) -> Option<Decimal> {
    let upper = raw.rsplit('-').next()?.trim();
    upper.parse::<Decimal>().ok().filter(|grams| *grams > Decimal::ZERO)
}

fn weight_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(raw) => parse_weight_grams(raw),
        Value::Number(number) => parse_weight_grams(&number.to_string()),
        _ => None,
    }
}

/// Unit weight in grams: packing weight, then product weight, then the variant weight
/// (only for items with a selected variant). Items without any usable weight weigh zero.
pub fn item_unit_weight_grams(item: &CartItem) -> Decimal {
    let payload = item.product.supplier_payload.as_ref();
    let from_payload =
        |key: &str| payload.and_then(|payload| payload.get(key)).and_then(weight_from_value);

    from_payload(PACKING_WEIGHT_KEY)
        .or_else(|| from_payload(PRODUCT_WEIGHT_KEY))
        .or_else(|| {
            item.variant
                .as_ref()
                .and_then(|variant| variant.metadata.as_ref())
                .and_then(|metadata| metadata.get(VARIANT_WEIGHT_KEY))
                .and_then(weight_from_value)
        })
        .unwrap_or_default()
}

pub fn cart_weight_kg<'a>(items: impl IntoIterator<Item = &'a CartItem>) -> Decimal {
    let grams: Decimal = items
        .into_iter()
        .map(|item| item_unit_weight_grams(item) * Decimal::from(item.quantity))
        .sum();
    grams / Decimal::from(GRAMS_PER_KG)
}
