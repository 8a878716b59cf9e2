//! Outbound ports: realtime message events and staff/customer notifications.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use storefront_core::domain::conversation::{Conversation, ConversationId};
use storefront_core::domain::customer::StaffUser;
use storefront_core::domain::message::{Message, MessageId, MessageType, SenderType};
use storefront_core::domain::Metadata;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Realtime payload published on the conversation's channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageBroadcast {
    pub conversation_uuid: Uuid,
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_type: SenderType,
    pub body: String,
    pub message_type: MessageType,
    pub metadata: Option<Metadata>,
    pub is_internal_note: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MessageBroadcast {
    pub fn new(conversation: &Conversation, message: &Message) -> Self {
        Self {
            conversation_uuid: conversation.uuid,
            id: message.id,
            conversation_id: message.conversation_id,
            sender_type: message.sender_type(),
            body: message.body.clone(),
            message_type: message.message_type,
            metadata: message.metadata.clone(),
            is_internal_note: message.is_internal_note,
            read_at: message.read_at,
            created_at: message.created_at,
        }
    }

    pub fn channel(&self) -> String {
        format!("support.conversation.{}", self.conversation_uuid)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SupportNotification {
    /// A conversation is waiting for a human. Sent to every support-capable staff member.
    AgentNeeded { conversation: Conversation, reason: String, recipients: Vec<StaffUser> },
    /// Staff answered. Sent to the conversation's customer.
    CustomerReplied { conversation: Conversation, message: Message },
}

#[async_trait]
pub trait RealtimeBroadcaster: Send + Sync {
    async fn broadcast(&self, event: MessageBroadcast) -> Result<(), NotifyError>;
}

#[async_trait]
pub trait SupportNotifier: Send + Sync {
    async fn notify(&self, notification: SupportNotification) -> Result<(), NotifyError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopBroadcaster;

#[async_trait]
impl RealtimeBroadcaster for NoopBroadcaster {
    async fn broadcast(&self, _event: MessageBroadcast) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl SupportNotifier for NoopNotifier {
    async fn notify(&self, _notification: SupportNotification) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryBroadcaster {
    events: Arc<Mutex<Vec<MessageBroadcast>>>,
}

impl InMemoryBroadcaster {
    pub fn events(&self) -> Vec<MessageBroadcast> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl RealtimeBroadcaster for InMemoryBroadcaster {
    async fn broadcast(&self, event: MessageBroadcast) -> Result<(), NotifyError> {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    notifications: Arc<Mutex<Vec<SupportNotification>>>,
}

impl InMemoryNotifier {
    pub fn notifications(&self) -> Vec<SupportNotification> {
        match self.notifications.lock() {
            Ok(notifications) => notifications.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn agent_needed_reasons(&self) -> Vec<String> {
        self.notifications()
            .into_iter()
            .filter_map(|notification| match notification {
                SupportNotification::AgentNeeded { reason, .. } => Some(reason),
                SupportNotification::CustomerReplied { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl SupportNotifier for InMemoryNotifier {
    async fn notify(&self, notification: SupportNotification) -> Result<(), NotifyError> {
        match self.notifications.lock() {
            Ok(mut notifications) => notifications.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
        Ok(())
    }
}
