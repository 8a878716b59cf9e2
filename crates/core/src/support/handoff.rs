use crate::config::SupportSettings;
use crate::domain::conversation::{AgentKind, RequestedAgent};

pub const HANDOFF_KEYWORDS: [&str; 5] =
    ["human", "agent", "representative", "real person", "support team"];

pub const REASON_CUSTOMER_REQUEST: &str = "Customer requested a human agent.";
pub const REASON_KEYWORD: &str = "Customer asked to talk to a human.";
pub const REASON_AI_UNAVAILABLE: &str = "AI unavailable or fallback required";

pub const DEFAULT_HANDOFF_ACK: &str =
    "Thanks for your patience. A human support agent has been notified and will join this chat shortly.";
pub const AI_UNAVAILABLE_ACK: &str =
    "Thanks for your message. A support agent will review this shortly.";
pub const RESOLUTION_NOTICE: &str =
    "This support session is now resolved. If you need anything else, please start a new support session.";

const WELCOME_AI: &str =
    "Hi! I'm the store assistant. Ask me about your orders, payments, delivery or returns.";
const WELCOME_AI_ONLY: &str =
    "Hi! I'm the store assistant and I'm here to help with orders, payments, delivery and returns.";
const WELCOME_HUMAN: &str =
    "Hi! A member of our support team will be with you shortly. Feel free to describe your issue.";

/// Case-insensitive match against the hand-off keywords.
pub fn requests_human(input: &str) -> bool {
    let lowered = input.to_lowercase();
    HANDOFF_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

pub fn resolve_agent_kind(requested: RequestedAgent, settings: &SupportSettings) -> AgentKind {
    if settings.ai_only_mode {
        return AgentKind::Ai;
    }
    match requested {
        RequestedAgent::Human => AgentKind::Human,
        RequestedAgent::Ai | RequestedAgent::Auto if settings.ai_configured => AgentKind::Ai,
        RequestedAgent::Ai | RequestedAgent::Auto => AgentKind::Human,
    }
}

pub fn welcome_text(agent: AgentKind, ai_only_mode: bool) -> &'static str {
    match agent {
        AgentKind::Ai if ai_only_mode => WELCOME_AI_ONLY,
        AgentKind::Ai => WELCOME_AI,
        AgentKind::Human => WELCOME_HUMAN,
    }
}
