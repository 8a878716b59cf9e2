use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::PromotionsConfig;
use crate::domain::cart::Cart;

/// Promotions carrying this intent suppress the first-order and high-value discounts.
pub const SHIPPING_SUPPORT_INTENT: &str = "shipping_support";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountSource {
    Promotion,
    FirstOrder,
    HighValue,
}

impl DiscountSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Promotion => "promotion",
            Self::FirstOrder => "first_order",
            Self::HighValue => "high_value",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPromotion {
    pub code: String,
    pub label: String,
    pub amount: Decimal,
    pub intent: Option<String>,
}

impl AppliedPromotion {
    pub fn is_shipping_support(&self) -> bool {
        self.intent.as_deref() == Some(SHIPPING_SUPPORT_INTENT)
    }
}

/// Output of a promotion-rules evaluator for one cart.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionEvaluation {
    pub applied: Vec<AppliedPromotion>,
}

impl PromotionEvaluation {
    pub fn total(&self) -> Decimal {
        self.applied.iter().map(|promotion| promotion.amount).sum()
    }

    pub fn label(&self) -> String {
        self.applied.iter().map(|promotion| promotion.label.as_str()).collect::<Vec<_>>().join(" + ")
    }

    pub fn has_shipping_support(&self) -> bool {
        self.applied.iter().any(AppliedPromotion::is_shipping_support)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCandidate {
    pub amount: Decimal,
    pub label: String,
    pub source: DiscountSource,
    pub breakdown: Vec<AppliedPromotion>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseHistory {
    pub paid_orders: u32,
}

impl PurchaseHistory {
    pub fn has_paid_order(&self) -> bool {
        self.paid_orders > 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscountPolicy {
    pub first_order_rate: Decimal,
    pub first_order_max: Decimal,
    pub high_value_rate: Decimal,
    pub high_value_max: Decimal,
    pub high_value_threshold: Decimal,
}

impl Default for DiscountPolicy {
    fn default() -> Self {
        Self {
            first_order_rate: Decimal::new(10, 2),
            first_order_max: Decimal::new(1_000, 2),
            high_value_rate: Decimal::new(5, 2),
            high_value_max: Decimal::new(1_500, 2),
            high_value_threshold: Decimal::new(5_000, 2),
        }
    }
}

impl From<&PromotionsConfig> for DiscountPolicy {
    fn from(config: &PromotionsConfig) -> Self {
        Self {
            first_order_max: config.first_order_max,
            high_value_max: config.high_value_max,
            high_value_threshold: config.high_value_threshold,
            ..Self::default()
        }
    }
}

/// Picks the single best discount for a cart.
#[derive(Clone, Debug, Default)]
pub struct CampaignManager {
    policy: DiscountPolicy,
}

impl CampaignManager {
    pub fn new(policy: DiscountPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DiscountPolicy {
        &self.policy
    }

    /// Largest positive candidate wins; exact ties keep the earlier candidate
    /// (promotion, then first order, then high value).
    pub fn best_for_cart(
        &self,
        subtotal: Decimal,
        history: &PurchaseHistory,
        promotions: &PromotionEvaluation,
    ) -> Option<DiscountCandidate> {
        let shipping_support = promotions.has_shipping_support();
        let candidates = [
            promotion_candidate(promotions),
            self.first_order_discount(subtotal, history, shipping_support),
            self.high_value_discount(subtotal, shipping_support),
        ];

        let mut best: Option<DiscountCandidate> = None;
        for candidate in candidates.into_iter().flatten() {
            if candidate.amount <= Decimal::ZERO {
                continue;
            }
            let better = best.as_ref().map(|current| candidate.amount > current.amount).unwrap_or(true);
            if better {
                best = Some(candidate);
            }
        }
        best
    }

    pub fn first_order_discount(
        &self,
        subtotal: Decimal,
        history: &PurchaseHistory,
        shipping_support: bool,
    ) -> Option<DiscountCandidate> {
        if history.has_paid_order() || shipping_support {
            return None;
        }
        let amount = (subtotal * self.policy.first_order_rate).min(self.policy.first_order_max);
        Some(DiscountCandidate {
            amount,
            label: "First order discount".to_string(),
            source: DiscountSource::FirstOrder,
            breakdown: Vec::new(),
        })
    }

    pub fn high_value_discount(
        &self,
        subtotal: Decimal,
        shipping_support: bool,
    ) -> Option<DiscountCandidate> {
        if subtotal < self.policy.high_value_threshold || shipping_support {
            return None;
        }
        let amount = (subtotal * self.policy.high_value_rate).min(self.policy.high_value_max);
        Some(DiscountCandidate {
            amount,
            label: "High-value order discount".to_string(),
            source: DiscountSource::HighValue,
            breakdown: Vec::new(),
        })
    }
}

fn promotion_candidate(promotions: &PromotionEvaluation) -> Option<DiscountCandidate> {
    if promotions.applied.is_empty() {
        return None;
    }
    Some(DiscountCandidate {
        amount: promotions.total(),
        label: promotions.label(),
        source: DiscountSource::Promotion,
        breakdown: promotions.applied.clone(),
    })
}

pub trait PromotionEngine: Send + Sync {
    fn evaluate(&self, cart: &Cart) -> PromotionEvaluation;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PromotionKind {
    Percent(Decimal),
    Fixed(Decimal),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRule {
    pub code: String,
    pub label: String,
    pub kind: PromotionKind,
    pub minimum_subtotal: Decimal,
    pub intent: Option<String>,
}

/// Applies every rule whose minimum subtotal is met. Amounts never exceed the subtotal.
#[derive(Clone, Debug, Default)]
pub struct RulePromotionEngine {
    rules: Vec<PromotionRule>,
}

impl RulePromotionEngine {
    pub fn new(rules: Vec<PromotionRule>) -> Self {
        Self { rules }
    }
}

impl PromotionEngine for RulePromotionEngine {
    fn evaluate(&self, cart: &Cart) -> PromotionEvaluation {
        let subtotal = cart.subtotal();
        let applied = self
            .rules
            .iter()
            .filter(|rule| subtotal >= rule.minimum_subtotal)
            .map(|rule| {
                let raw = match rule.kind {
                    PromotionKind::Percent(percent) => subtotal * percent / Decimal::ONE_HUNDRED,
                    PromotionKind::Fixed(amount) => amount,
                };
                AppliedPromotion {
                    code: rule.code.clone(),
                    label: rule.label.clone(),
                    amount: raw.min(subtotal).round_dp(2),
                    intent: rule.intent.clone(),
                }
            })
            .filter(|promotion| promotion.amount > Decimal::ZERO || promotion.is_shipping_support())
            .collect();
        PromotionEvaluation { applied }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        AppliedPromotion, CampaignManager, DiscountSource, PromotionEngine, PromotionEvaluation,
        PromotionKind, PromotionRule, PurchaseHistory, RulePromotionEngine,
        SHIPPING_SUPPORT_INTENT,
    };
    use crate::domain::cart::{Cart, CartId, CartItem, CartItemId};
    use crate::domain::customer::CustomerId;
    use crate::domain::product::{Product, ProductId};

    fn dec(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    fn promotion(label: &str, amount: &str, intent: Option<&str>) -> AppliedPromotion {
        AppliedPromotion {
            code: label.to_ascii_uppercase(),
            label: label.to_string(),
            amount: dec(amount),
            intent: intent.map(str::to_string),
        }
    }

    const NEW_CUSTOMER: PurchaseHistory = PurchaseHistory { paid_orders: 0 };
    const RETURNING: PurchaseHistory = PurchaseHistory { paid_orders: 2 };

    #[test]
    fn first_order_discount_is_ten_percent_capped() {
        let manager = CampaignManager::default();
        for (subtotal, expected) in [("12.34", "1.234"), ("99.99", "9.999"), ("250", "10.00")] {
            let candidate = manager
                .first_order_discount(dec(subtotal), &NEW_CUSTOMER, false)
                .expect("new customers qualify");
            assert_eq!(candidate.amount, dec(expected));
        }
        assert!(manager.first_order_discount(dec("40"), &RETURNING, false).is_none());
    }

    #[test]
    fn high_value_discount_requires_threshold() {
        let manager = CampaignManager::default();
        assert!(manager.high_value_discount(dec("49.99"), false).is_none());
        assert_eq!(
            manager.high_value_discount(dec("50"), false).map(|candidate| candidate.amount),
            Some(dec("2.50"))
        );
        assert_eq!(
            manager.high_value_discount(dec("1000"), false).map(|candidate| candidate.amount),
            Some(dec("15.00"))
        );
    }

    #[test]
    fn largest_candidate_wins() {
        let manager = CampaignManager::default();
        let promotions = PromotionEvaluation { applied: vec![promotion("Spring sale", "3.00", None)] };

        let best = manager.best_for_cart(dec("80"), &NEW_CUSTOMER, &promotions).expect("discount");
        assert_eq!(best.source, DiscountSource::FirstOrder);
        assert_eq!(best.amount, dec("8.00"));

        let best = manager.best_for_cart(dec("80"), &RETURNING, &promotions).expect("discount");
        assert_eq!(best.source, DiscountSource::HighValue);
        assert_eq!(best.amount, dec("4.00"));
    }

    #[test]
    fn ties_keep_declaration_order() {
        let manager = CampaignManager::default();
        let promotions = PromotionEvaluation { applied: vec![promotion("Welcome", "8.00", None)] };

        let best = manager.best_for_cart(dec("80"), &NEW_CUSTOMER, &promotions).expect("discount");
        assert_eq!(best.source, DiscountSource::Promotion);
    }

    #[test]
    fn promotion_labels_are_joined() {
        let manager = CampaignManager::default();
        let promotions = PromotionEvaluation {
            applied: vec![promotion("Spring sale", "6.00", None), promotion("Bundle", "5.00", None)],
        };

        let best = manager.best_for_cart(dec("40"), &RETURNING, &promotions).expect("discount");
        assert_eq!(best.label, "Spring sale + Bundle");
        assert_eq!(best.amount, dec("11.00"));
        assert_eq!(best.breakdown.len(), 2);
    }

    #[test]
    fn shipping_support_promotion_blocks_other_discounts() {
        let manager = CampaignManager::default();
        let promotions = PromotionEvaluation {
            applied: vec![promotion("Free shipping help", "0", Some(SHIPPING_SUPPORT_INTENT))],
        };

        assert!(manager.best_for_cart(dec("200"), &NEW_CUSTOMER, &promotions).is_none());
    }

    #[test]
    fn zero_subtotal_yields_no_discount() {
        let manager = CampaignManager::default();
        assert!(manager
            .best_for_cart(Decimal::ZERO, &NEW_CUSTOMER, &PromotionEvaluation::default())
            .is_none());
    }

    #[test]
    fn rule_engine_applies_rules_meeting_minimum_subtotal() {
        let engine = RulePromotionEngine::new(vec![
            PromotionRule {
                code: "TEN".to_string(),
                label: "10% off".to_string(),
                kind: PromotionKind::Percent(dec("10")),
                minimum_subtotal: dec("30"),
                intent: None,
            },
            PromotionRule {
                code: "BIG".to_string(),
                label: "$20 off".to_string(),
                kind: PromotionKind::Fixed(dec("20")),
                minimum_subtotal: dec("150"),
                intent: None,
            },
        ]);
        let cart = Cart {
            id: CartId(1),
            customer_id: CustomerId("cus-1".to_string()),
            currency: "USD".to_string(),
            items: vec![CartItem {
                id: CartItemId(1),
                product: Product {
                    id: ProductId(1),
                    sku: "BAG".to_string(),
                    name: "Bag".to_string(),
                    selling_price: dec("45.50"),
                    supplier_pid: None,
                    supplier_payload: None,
                    active: true,
                },
                variant: None,
                fulfillment_provider_id: None,
                quantity: 1,
            }],
        };

        let evaluation = engine.evaluate(&cart);
        assert_eq!(evaluation.applied.len(), 1);
        assert_eq!(evaluation.applied[0].amount, dec("4.55"));
        assert!(!evaluation.has_shipping_support());
    }
}
