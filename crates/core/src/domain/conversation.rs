use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::customer::{CustomerId, UserId};
use crate::domain::Metadata;
use crate::flows::{FlowDefinition, FlowEvent, SupportFlow, TransitionOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Open,
    PendingAgent,
    PendingCustomer,
    Resolved,
    Closed,
}

impl ConversationStatus {
    pub const ACTIVE: [ConversationStatus; 3] =
        [ConversationStatus::Open, ConversationStatus::PendingAgent, ConversationStatus::PendingCustomer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::PendingAgent => "pending_agent",
            Self::PendingCustomer => "pending_customer",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "pending_agent" => Some(Self::PendingAgent),
            "pending_customer" => Some(Self::PendingCustomer),
            "resolved" => Some(Self::Resolved),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

/// What the customer asked for when opening the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestedAgent {
    Auto,
    Ai,
    Human,
}

impl RequestedAgent {
    /// Unknown or blank values fall back to `Auto`.
    pub fn normalize(value: &str) -> Self {
        Self::parse(value).unwrap_or(Self::Auto)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "ai" => Some(Self::Ai),
            "human" => Some(Self::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Ai => "ai",
            Self::Human => "human",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Ai,
    Human,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Human => "human",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ai" => Some(Self::Ai),
            "human" => Some(Self::Human),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub uuid: Uuid,
    pub customer_id: CustomerId,
    pub channel: String,
    pub status: ConversationStatus,
    pub requested_agent: RequestedAgent,
    pub active_agent: AgentKind,
    pub ai_enabled: bool,
    pub handoff_requested: bool,
    pub assigned_user: Option<UserId>,
    pub topic: Option<String>,
    pub tags: Option<Vec<String>>,
    pub context: Metadata,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_customer_message_at: Option<DateTime<Utc>>,
    pub last_agent_message_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation payload; the repository assigns the id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewConversation {
    pub uuid: Uuid,
    pub customer_id: CustomerId,
    pub channel: String,
    pub status: ConversationStatus,
    pub requested_agent: RequestedAgent,
    pub active_agent: AgentKind,
    pub ai_enabled: bool,
    pub handoff_requested: bool,
    pub context: Metadata,
    pub created_at: DateTime<Utc>,
}

impl NewConversation {
    pub fn for_agent(
        customer_id: CustomerId,
        channel: impl Into<String>,
        requested_agent: RequestedAgent,
        agent: AgentKind,
        context: Metadata,
        now: DateTime<Utc>,
    ) -> Self {
        let human = agent == AgentKind::Human;
        Self {
            uuid: Uuid::new_v4(),
            customer_id,
            channel: channel.into(),
            status: SupportFlow.initial_state(agent),
            requested_agent,
            active_agent: agent,
            ai_enabled: !human,
            handoff_requested: human,
            context,
            created_at: now,
        }
    }

    pub fn into_conversation(self, id: ConversationId) -> Conversation {
        Conversation {
            id,
            uuid: self.uuid,
            customer_id: self.customer_id,
            channel: self.channel,
            status: self.status,
            requested_agent: self.requested_agent,
            active_agent: self.active_agent,
            ai_enabled: self.ai_enabled,
            handoff_requested: self.handoff_requested,
            assigned_user: None,
            topic: None,
            tags: None,
            context: self.context,
            last_message_at: None,
            last_customer_message_at: None,
            last_agent_message_at: None,
            resolved_at: None,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

impl Conversation {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_human_driven(&self) -> bool {
        self.active_agent == AgentKind::Human
    }

    pub fn is_ai_driven(&self) -> bool {
        self.active_agent == AgentKind::Ai && self.ai_enabled && !self.handoff_requested
    }

    /// Applies the field changes that accompany a flow transition.
    pub fn apply_transition(&mut self, outcome: &TransitionOutcome, now: DateTime<Utc>) {
        match outcome.event {
            FlowEvent::CustomerMessageReceived => {
                self.last_message_at = Some(now);
                self.last_customer_message_at = Some(now);
                self.resolved_at = None;
            }
            FlowEvent::HumanRequested | FlowEvent::HandoffRequested => {
                self.requested_agent = RequestedAgent::Human;
                self.active_agent = AgentKind::Human;
                self.ai_enabled = false;
                self.handoff_requested = true;
                self.resolved_at = None;
            }
            FlowEvent::AiTakeover => {
                self.requested_agent = RequestedAgent::Ai;
                self.active_agent = AgentKind::Ai;
                self.ai_enabled = true;
                self.handoff_requested = false;
                self.resolved_at = None;
            }
            FlowEvent::AgentReplied => {
                self.active_agent = AgentKind::Human;
                self.ai_enabled = false;
                self.last_message_at = Some(now);
                self.last_agent_message_at = Some(now);
            }
            FlowEvent::Resolved => {
                self.resolved_at = Some(now);
                self.handoff_requested = false;
            }
        }
        self.status = outcome.to;
        self.updated_at = now;
    }

    /// Bookkeeping for AI and system messages, which do not move the status.
    pub fn record_outbound_message(&mut self, now: DateTime<Utc>) {
        self.last_message_at = Some(now);
        self.last_agent_message_at = Some(now);
        self.updated_at = now;
    }

    pub fn assign_to(&mut self, user: &UserId) {
        self.assigned_user = Some(user.clone());
    }
}
