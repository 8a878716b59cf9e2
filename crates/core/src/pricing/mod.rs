pub mod discount;
pub mod shipping;
pub mod weight;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::cart::{Cart, CartId};
use crate::pricing::discount::DiscountCandidate;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTrace {
    pub cart_id: CartId,
    pub currency: String,
    pub steps: Vec<PricingTraceStep>,
}

impl PricingTrace {
    fn step(&mut self, stage: &str, detail: impl Into<String>, amount: Decimal) {
        self.steps.push(PricingTraceStep { stage: stage.to_string(), detail: detail.into(), amount });
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub discount: Option<DiscountCandidate>,
    pub discount_total: Decimal,
    pub shipping_total: Decimal,
    pub grand_total: Decimal,
    pub trace: PricingTrace,
}

/// Combines the subtotal, the chosen discount and the shipping charge.
pub fn cart_totals_with_trace(
    cart: &Cart,
    discount: Option<DiscountCandidate>,
    shipping_total: Decimal,
) -> CartTotals {
    let subtotal = cart.subtotal();
    let discount_total = discount.as_ref().map(|candidate| candidate.amount).unwrap_or_default();
    let discounted = (subtotal - discount_total).max(Decimal::ZERO);
    let grand_total = discounted + shipping_total;

    let mut trace =
        PricingTrace { cart_id: cart.id, currency: cart.currency.clone(), steps: Vec::new() };
    trace.step("subtotal", "sum(unit_price * quantity)", subtotal);
    if let Some(candidate) = &discount {
        trace.step("discount", format!("{} ({})", candidate.label, candidate.source.as_str()), -discount_total);
    }
    trace.step("shipping", "sum(cart shipping logistic_price)", shipping_total);
    trace.step("grand_total", "max(subtotal - discount, 0) + shipping", grand_total);

    CartTotals { subtotal, discount, discount_total, shipping_total, grand_total, trace }
}
