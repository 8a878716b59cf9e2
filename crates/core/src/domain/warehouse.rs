use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WarehouseId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightTier {
    pub max_kg: Decimal,
    pub price: Decimal,
}

/// Operator-owned fulfillment location used for the weight-based domestic charge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub country_code: Option<String>,
    pub is_default: bool,
    pub carrier_name: String,
    pub weight_tiers: Vec<WeightTier>,
    pub extra_kg_price: Decimal,
}
