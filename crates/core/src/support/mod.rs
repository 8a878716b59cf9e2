pub mod handoff;
pub mod order_context;

pub use handoff::{requests_human, resolve_agent_kind, welcome_text};
pub use order_context::{
    build_order_context_snapshot, build_order_payment_reply, extract_order_number,
    fallback_reply, rule_based_reply, OrderSnapshot,
};
