use serde::{Deserialize, Serialize};

use crate::domain::conversation::{AgentKind, ConversationStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowEvent {
    CustomerMessageReceived,
    /// Explicit "human" request when (re)opening a session.
    HumanRequested,
    /// Keyword, fallback or operator initiated hand-off.
    HandoffRequested,
    AiTakeover,
    AgentReplied,
    Resolved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowContext {
    pub active_agent: AgentKind,
    pub ai_only_mode: bool,
}

impl FlowContext {
    pub fn new(active_agent: AgentKind, ai_only_mode: bool) -> Self {
        Self { active_agent, ai_only_mode }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: ConversationStatus,
    pub to: ConversationStatus,
    pub event: FlowEvent,
}
