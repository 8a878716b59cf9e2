use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::order::Order;

pub const ORDER_KEYWORDS: [&str; 6] = ["order", "track", "delivery", "payment", "charged", "refund"];
pub const SNAPSHOT_LIMIT: usize = 5;

pub const GENERIC_ORDER_PROMPT: &str =
    "Could you share a bit more detail or your order number? I'll check it for you right away.";

const NO_ORDERS_REPLY: &str =
    "I couldn't find any orders on your account yet. Please share your order number so I can check it for you.";
const TRACKING_GUIDANCE: &str =
    "I can help track your order. Please share your order number (for example DS-0000000001) and I'll look up the latest delivery status.";
const REFUND_GUIDANCE: &str =
    "I can help with refunds and returns. Please share your order number and tell me which item you'd like to return or get refunded.";
const PAYMENT_GUIDANCE: &str =
    "I can help with payment questions. Please share your order number so I can check the payment status for you.";

fn order_number_patterns() -> &'static [(Regex, bool)] {
    static PATTERNS: OnceLock<Vec<(Regex, bool)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        // (pattern, value is in capture group 1)
        [(r"(?i)\bDS-[A-Z0-9]+", false), (r"(?i)\b[A-Z]{2,6}-\d{4,}", false), (r"(?i)#([A-Z0-9]{6,})", true)]
            .into_iter()
            .filter_map(|(pattern, grouped)| Regex::new(pattern).ok().map(|regex| (regex, grouped)))
            .collect()
    })
}

/// Finds an order reference in free text, upper-cased. `#ABC123` yields `ABC123`.
pub fn extract_order_number(text: &str) -> Option<String> {
    order_number_patterns().iter().find_map(|(regex, grouped)| {
        let captures = regex.captures(text)?;
        let matched = if *grouped { captures.get(1) } else { captures.get(0) }?;
        Some(matched.as_str().to_uppercase())
    })
}

pub fn is_order_payment_query(input: &str, order_number: Option<&str>) -> bool {
    let lowered = input.to_lowercase();
    order_number.is_some() || ORDER_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

/// Exact number match when a reference was given, else the most recently placed order.
pub fn resolve_order<'a>(order_number: Option<&str>, orders: &'a [Order]) -> Option<&'a Order> {
    match order_number {
        Some(number) => orders.iter().find(|order| order.number.eq_ignore_ascii_case(number)),
        None => orders.iter().max_by_key(|order| order.placed_at),
    }
}

/// Deterministic order/payment answer, or `None` when the input is not about orders.
pub fn build_order_payment_reply(
    input: &str,
    order_number: Option<&str>,
    orders: &[Order],
) -> Option<String> {
    if !is_order_payment_query(input, order_number) {
        return None;
    }

    let Some(order) = resolve_order(order_number, orders) else {
        return Some(match order_number {
            Some(number) => format!(
                "I couldn't find order {number} on your account. Please double-check the order number and send it again."
            ),
            None => NO_ORDERS_REPLY.to_string(),
        });
    };

    let mut reply = format!(
        "Latest update for order {}: {}. Payment: {}",
        order.number,
        order.display_status(),
        order.payment_status
    );
    if let Some(reference) = order
        .latest_payment()
        .and_then(|payment| payment.reference.as_deref())
        .filter(|reference| !reference.trim().is_empty())
    {
        reply.push_str(&format!(", Ref: {reference}"));
    }
    reply.push_str(&format!(". Tracking: {}", order.tracking_status()));
    if let Some(tracking_number) =
        order.tracking_number.as_deref().filter(|number| !number.trim().is_empty())
    {
        reply.push_str(&format!(" (No: {tracking_number})"));
    }
    reply.push_str(&format!(". Total: {:.2} {}.", order.grand_total, order.currency));
    Some(reply)
}

/// Fixed guidance for tracking, refund and payment questions.
pub fn generic_keyword_reply(input: &str) -> Option<&'static str> {
    let lowered = input.to_lowercase();
    if lowered.contains("track") || lowered.contains("where is my order") {
        Some(TRACKING_GUIDANCE)
    } else if lowered.contains("refund") || lowered.contains("return") {
        Some(REFUND_GUIDANCE)
    } else if lowered.contains("payment") || lowered.contains("charged") {
        Some(PAYMENT_GUIDANCE)
    } else {
        None
    }
}

/// Order reply first, generic guidance second.
pub fn rule_based_reply(input: &str, orders: &[Order]) -> Option<String> {
    let order_number = extract_order_number(input);
    build_order_payment_reply(input, order_number.as_deref(), orders)
        .or_else(|| generic_keyword_reply(input).map(str::to_string))
}

/// Reply used when the assistant must answer without a model.
pub fn fallback_reply(input: &str, orders: &[Order]) -> String {
    rule_based_reply(input, orders).unwrap_or_else(|| GENERIC_ORDER_PROMPT.to_string())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    pub provider: String,
    pub status: String,
    pub amount: String,
    pub currency: String,
    pub paid_at: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_number: String,
    pub status: String,
    pub status_label: String,
    pub payment_status: String,
    pub currency: String,
    pub grand_total: String,
    pub placed_at: Option<String>,
    pub supplier_order_status: Option<String>,
    pub supplier_payment_status: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_status: String,
    pub tracking_url: Option<String>,
    pub latest_payment: Option<PaymentSnapshot>,
}

impl From<&Order> for OrderSnapshot {
    fn from(order: &Order) -> Self {
        Self {
            order_number: order.number.clone(),
            status: order.status.clone(),
            status_label: order.status_label.clone(),
            payment_status: order.payment_status.clone(),
            currency: order.currency.clone(),
            grand_total: format!("{:.2}", order.grand_total),
            placed_at: order.placed_at.map(|placed_at| placed_at.to_rfc3339()),
            supplier_order_status: order.supplier_order_status.clone(),
            supplier_payment_status: order.supplier_payment_status.clone(),
            tracking_number: order.tracking_number.clone(),
            tracking_status: order.tracking_status().to_string(),
            tracking_url: order.tracking_url.clone(),
            latest_payment: order.latest_payment().map(|payment| PaymentSnapshot {
                provider: payment.provider.clone(),
                status: payment.status.clone(),
                amount: format!("{:.2}", payment.amount),
                currency: payment.currency.clone(),
                paid_at: payment.paid_at.map(|paid_at| paid_at.to_rfc3339()),
                reference: payment.reference.clone(),
            }),
        }
    }
}

/// Up to five most recent orders; the referenced order, if any, comes first.
pub fn build_order_context_snapshot(orders: &[Order], order_number: Option<&str>) -> Vec<OrderSnapshot> {
    let mut sorted: Vec<&Order> = orders.iter().collect();
    sorted.sort_by(|left, right| right.placed_at.cmp(&left.placed_at));
    if let Some(number) = order_number {
        sorted.sort_by_key(|order| !order.number.eq_ignore_ascii_case(number));
    }
    sorted.into_iter().take(SNAPSHOT_LIMIT).map(OrderSnapshot::from).collect()
}
