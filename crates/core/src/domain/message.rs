use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::ConversationId;
use crate::domain::customer::{CustomerId, UserId};
use crate::domain::Metadata;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    Customer,
    Agent,
    Ai,
    System,
}

impl SenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Agent => "agent",
            Self::Ai => "ai",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" => Some(Self::Customer),
            "agent" => Some(Self::Agent),
            "ai" => Some(Self::Ai),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    pub fn is_staff_side(&self) -> bool {
        !matches!(self, Self::Customer)
    }
}

/// Who authored a message. The customer and staff references are mutually exclusive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Sender {
    Customer(CustomerId),
    Agent(UserId),
    Ai,
    System(Option<UserId>),
}

impl Sender {
    pub fn sender_type(&self) -> SenderType {
        match self {
            Self::Customer(_) => SenderType::Customer,
            Self::Agent(_) => SenderType::Agent,
            Self::Ai => SenderType::Ai,
            Self::System(_) => SenderType::System,
        }
    }

    pub fn customer_id(&self) -> Option<&CustomerId> {
        match self {
            Self::Customer(id) => Some(id),
            Self::Agent(_) | Self::Ai | Self::System(_) => None,
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Agent(id) => Some(id),
            Self::System(id) => id.as_ref(),
            Self::Customer(_) | Self::Ai => None,
        }
    }

    /// Rebuilds a sender from its stored columns.
    pub fn from_parts(
        sender_type: SenderType,
        customer_id: Option<CustomerId>,
        user_id: Option<UserId>,
    ) -> Option<Self> {
        match sender_type {
            SenderType::Customer => customer_id.map(Self::Customer),
            SenderType::Agent => user_id.map(Self::Agent),
            SenderType::Ai => Some(Self::Ai),
            SenderType::System => Some(Self::System(user_id)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    File,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

/// Values stored under the `event` metadata key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportEvent {
    ChatStarted,
    HandoffRequested,
    AiOnlyMode,
    SessionResolved,
    AiSummary,
}

impl SupportEvent {
    pub const METADATA_KEY: &'static str = "event";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatStarted => "chat_started",
            Self::HandoffRequested => "handoff_requested",
            Self::AiOnlyMode => "ai_only_mode",
            Self::SessionResolved => "session_resolved",
            Self::AiSummary => "ai_summary",
        }
    }
}

/// Values stored under the `source` metadata key for AI-sender replies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Rule,
    Deepseek,
    Fallback,
}

impl ReplySource {
    pub const METADATA_KEY: &'static str = "source";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Deepseek => "deepseek",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: Sender,
    pub message_type: MessageType,
    pub body: String,
    pub metadata: Option<Metadata>,
    pub is_internal_note: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn sender_type(&self) -> SenderType {
        self.sender.sender_type()
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref().and_then(|metadata| metadata.get(key)).and_then(|value| value.as_str())
    }

    pub fn event_tag(&self) -> Option<&str> {
        self.metadata_str(SupportEvent::METADATA_KEY)
    }

    pub fn has_event(&self, event: SupportEvent) -> bool {
        self.event_tag() == Some(event.as_str())
    }

    pub fn is_customer_visible(&self) -> bool {
        !self.is_internal_note
    }
}

const RESERVED_METADATA_KEYS: [&str; 3] =
    [SupportEvent::METADATA_KEY, ReplySource::METADATA_KEY, "reason"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub sender: Sender,
    pub message_type: MessageType,
    pub body: String,
    pub metadata: Option<Metadata>,
    pub is_internal_note: bool,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn text(conversation_id: ConversationId, sender: Sender, body: impl Into<String>) -> Self {
        Self {
            conversation_id,
            sender,
            message_type: MessageType::Text,
            body: body.into(),
            metadata: None,
            is_internal_note: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.get_or_insert_with(Metadata::new).insert(key.to_string(), value.into());
        self
    }

    pub fn with_event(self, event: SupportEvent) -> Self {
        self.with_metadata(SupportEvent::METADATA_KEY, event.as_str())
    }

    pub fn with_source(self, source: ReplySource) -> Self {
        self.with_metadata(ReplySource::METADATA_KEY, source.as_str())
    }

    /// Adds caller supplied metadata. Keys the support flow tags messages with are dropped.
    pub fn merge_metadata(mut self, extra: Option<Metadata>) -> Self {
        if let Some(extra) = extra {
            let metadata = self.metadata.get_or_insert_with(Metadata::new);
            for (key, value) in extra {
                if !RESERVED_METADATA_KEYS.contains(&key.as_str()) {
                    metadata.insert(key, value);
                }
            }
        }
        self
    }

    pub fn internal(mut self) -> Self {
        self.is_internal_note = true;
        self
    }

    pub fn into_message(self, id: MessageId) -> Message {
        Message {
            id,
            conversation_id: self.conversation_id,
            sender: self.sender,
            message_type: self.message_type,
            body: self.body,
            metadata: self.metadata,
            is_internal_note: self.is_internal_note,
            read_at: None,
            created_at: self.created_at,
        }
    }
}
