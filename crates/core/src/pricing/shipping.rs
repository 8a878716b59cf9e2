use rust_decimal::Decimal;

use crate::domain::warehouse::{Warehouse, WeightTier};

/// Price for `weight_kg` against ascending weight tiers.
///
/// The first tier whose `max_kg` covers the weight wins. Heavier parcels pay the last tier
/// plus `extra_kg_price` for every started kilogram above it. Zero weight ships free.
pub fn weight_tier_charge(weight_kg: Decimal, tiers: &[WeightTier], extra_kg_price: Decimal) -> Decimal {
    if weight_kg <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let mut sorted: Vec<&WeightTier> = tiers.iter().collect();
    sorted.sort_by(|left, right| left.max_kg.cmp(&right.max_kg));

    if let Some(tier) = sorted.iter().find(|tier| tier.max_kg >= weight_kg) {
        return tier.price;
    }

    match sorted.last() {
        Some(last) => last.price + extra_kg_price * (weight_kg - last.max_kg).ceil(),
        None => extra_kg_price * weight_kg.ceil(),
    }
}

impl Warehouse {
    pub fn shipping_charge(&self, weight_kg: Decimal) -> Decimal {
        weight_tier_charge(weight_kg, &self.weight_tiers, self.extra_kg_price)
    }
}
