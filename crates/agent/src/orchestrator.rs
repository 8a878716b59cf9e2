//! Support conversation orchestrator.
//!
//! Every mutating operation runs under a per-conversation lock so two requests
//! for the same conversation never interleave status updates. Reply selection is
//! evaluated in a fixed order: hand-off keywords, rule-based order answers, the
//! AI model, the AI-only fallback and finally a human hand-off.

use std::collections::HashMap;
use std::sync::{Arc, MutexGuard, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use storefront_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink,
};
use storefront_core::config::SupportSettings;
use storefront_core::domain::conversation::{
    AgentKind, Conversation, ConversationId, NewConversation, RequestedAgent,
};
use storefront_core::domain::customer::{Customer, StaffUser};
use storefront_core::domain::message::{
    Message, MessageId, MessageType, NewMessage, ReplySource, Sender, SenderType, SupportEvent,
};
use storefront_core::domain::order::Order;
use storefront_core::domain::Metadata;
use storefront_core::errors::{ApplicationError, DomainError};
use storefront_core::flows::{FlowContext, FlowEngine, FlowEvent, SupportFlow, TransitionOutcome};
use storefront_core::support::handoff::{
    requests_human, resolve_agent_kind, welcome_text, AI_UNAVAILABLE_ACK, DEFAULT_HANDOFF_ACK,
    REASON_AI_UNAVAILABLE, REASON_CUSTOMER_REQUEST, REASON_KEYWORD, RESOLUTION_NOTICE,
};
use storefront_core::support::order_context::{
    build_order_context_snapshot, extract_order_number, fallback_reply, rule_based_reply,
    SNAPSHOT_LIMIT,
};
use storefront_db::repositories::{
    ConversationRepository, MessageRepository, OrderRepository, StaffRepository,
};

use crate::llm::{ChatClient, LlmError};
use crate::notify::{
    MessageBroadcast, NoopBroadcaster, NoopNotifier, RealtimeBroadcaster, SupportNotification,
    SupportNotifier,
};
use crate::prompt::{
    fallback_summary, reply_or_generic, summary_messages, ReplyPrompt, REPLY_HISTORY_LIMIT,
    REPLY_TEMPERATURE, SUMMARY_HISTORY_LIMIT, SUMMARY_TEMPERATURE,
};
use crate::rate_limit::SlidingWindowLimiter;

pub const MAX_PAGE_SIZE: u32 = 100;

const IMAGE_PLACEHOLDER: &str = "Customer shared an image.";
const FILE_PLACEHOLDER: &str = "Customer shared a file.";

#[derive(Clone)]
pub struct SupportRepositories {
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub staff: Arc<dyn StaffRepository>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StartedConversation {
    pub conversation: Conversation,
    pub agent_type: AgentKind,
    pub welcome: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SupportReply {
    pub agent_type: AgentKind,
    pub reply: String,
    /// The recorded customer message followed by the response.
    pub messages: Vec<Message>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    File,
}

impl AttachmentKind {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Image => MessageType::Image,
            Self::File => MessageType::File,
        }
    }

    fn placeholder(&self) -> &'static str {
        match self {
            Self::Image => IMAGE_PLACEHOLDER,
            Self::File => FILE_PLACEHOLDER,
        }
    }
}

/// Uploaded file already stored elsewhere.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub mime: String,
    pub kind: AttachmentKind,
    pub size: u64,
    pub name: Option<String>,
}

impl Attachment {
    fn metadata(&self, caption: Option<&str>) -> Metadata {
        let mut attachment = Metadata::new();
        attachment.insert("url".to_string(), self.url.clone().into());
        attachment.insert("mime".to_string(), self.mime.clone().into());
        attachment.insert("type".to_string(), self.kind.message_type().as_str().into());
        attachment.insert("size".to_string(), self.size.into());
        if let Some(name) = &self.name {
            attachment.insert("name".to_string(), name.clone().into());
        }
        if let Some(caption) = caption {
            attachment.insert("caption".to_string(), caption.into());
        }

        let mut metadata = Metadata::new();
        metadata.insert("attachment".to_string(), serde_json::Value::Object(attachment));
        metadata
    }
}

/// One async mutex per conversation. An entry lives only while someone holds or awaits it.
#[derive(Default)]
pub struct ConversationLocks {
    locks: std::sync::Mutex<HashMap<ConversationId, Arc<Mutex<()>>>>,
}

/// Releases the conversation lock and prunes its entry on drop.
pub struct ConversationGuard<'a> {
    locks: &'a ConversationLocks,
    id: ConversationId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ConversationLocks {
    pub async fn acquire(&self, id: ConversationId) -> ConversationGuard<'_> {
        let lock = {
            let mut table = self.table();
            table.entry(id).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        ConversationGuard { locks: self, id, guard: Some(guard) }
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<ConversationId, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, id: ConversationId) {
        let mut table = self.table();
        if table.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            table.remove(&id);
        }
    }
}

impl Drop for ConversationGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(self.id);
    }
}

pub struct SupportOrchestrator {
    repositories: SupportRepositories,
    chat: Arc<dyn ChatClient>,
    settings: SupportSettings,
    notifier: Arc<dyn SupportNotifier>,
    broadcaster: Arc<dyn RealtimeBroadcaster>,
    audit: Arc<dyn AuditSink>,
    limiter: SlidingWindowLimiter,
    flow: FlowEngine<SupportFlow>,
    locks: ConversationLocks,
}

impl SupportOrchestrator {
    pub fn new(
        repositories: SupportRepositories,
        chat: Arc<dyn ChatClient>,
        settings: SupportSettings,
    ) -> Self {
        Self {
            repositories,
            chat,
            notifier: Arc::new(NoopNotifier),
            broadcaster: Arc::new(NoopBroadcaster),
            audit: Arc::new(NoopAuditSink),
            limiter: SlidingWindowLimiter::new(
                settings.ai_rate_limit_attempts,
                settings.ai_rate_limit_period,
            ),
            settings,
            flow: FlowEngine::default(),
            locks: ConversationLocks::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn SupportNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn RealtimeBroadcaster>) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn settings(&self) -> &SupportSettings {
        &self.settings
    }

    pub async fn start_conversation(
        &self,
        customer: &Customer,
        requested_agent: &str,
        channel: &str,
        context: Metadata,
    ) -> Result<StartedConversation, ApplicationError> {
        let requested = RequestedAgent::normalize(requested_agent);
        let agent = resolve_agent_kind(requested, &self.settings);
        let draft = NewConversation::for_agent(
            customer.id.clone(),
            channel,
            requested,
            agent,
            context,
            Utc::now(),
        );

        let (created, was_created) =
            self.repositories.conversations.find_or_create_active(draft).await?;
        let _guard = self.locks.acquire(created.id).await;
        let mut conversation = self.load(created.id).await?;
        let audit = self.audit_context(conversation.id, &actor_customer(customer));

        let mut pending_notification = None;
        if was_created {
            if conversation.handoff_requested {
                pending_notification = Some(match requested {
                    RequestedAgent::Human => REASON_CUSTOMER_REQUEST,
                    RequestedAgent::Ai | RequestedAgent::Auto => REASON_AI_UNAVAILABLE,
                });
            }
            self.audit.emit(
                AuditEvent::from_context(
                    &audit,
                    "support.conversation_started",
                    AuditCategory::Support,
                    AuditOutcome::Success,
                )
                .with_metadata("agent", agent.as_str())
                .with_metadata("channel", channel),
            );
        } else if self.settings.ai_only_mode {
            if !conversation.is_ai_driven() {
                self.transition(&mut conversation, FlowEvent::AiTakeover, &audit)?;
                self.repositories.conversations.save(conversation.clone()).await?;
            }
        } else if requested == RequestedAgent::Human && !conversation.is_human_driven() {
            self.transition(&mut conversation, FlowEvent::HumanRequested, &audit)?;
            self.repositories.conversations.save(conversation.clone()).await?;
            pending_notification = Some(REASON_CUSTOMER_REQUEST);
        }

        let agent_type = conversation.active_agent;
        let welcome = welcome_text(agent_type, self.settings.ai_only_mode).to_string();

        if self.repositories.messages.count(conversation.id).await? == 0 {
            let message = self
                .repositories
                .messages
                .create(
                    NewMessage::text(conversation.id, Sender::System(None), welcome.clone())
                        .with_event(SupportEvent::ChatStarted),
                )
                .await?;
            self.broadcast(&conversation, &message).await;
        }

        if let Some(reason) = pending_notification {
            self.notify_staff(&conversation, reason).await?;
        }

        let conversation = self.load(conversation.id).await?;
        Ok(StartedConversation { conversation, agent_type, welcome })
    }

    pub async fn receive_customer_message(
        &self,
        conversation_id: ConversationId,
        customer: &Customer,
        body: &str,
        metadata: Option<Metadata>,
        message_type: MessageType,
    ) -> Result<Message, ApplicationError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let mut conversation = self.load_owned(conversation_id, customer).await?;
        self.record_customer_message(&mut conversation, customer, body, metadata, message_type)
            .await
    }

    pub async fn reply_to_customer(
        &self,
        conversation_id: ConversationId,
        customer: &Customer,
        input: &str,
    ) -> Result<SupportReply, ApplicationError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let mut conversation = self.load_owned(conversation_id, customer).await?;
        let customer_message = self
            .record_customer_message(&mut conversation, customer, input, None, MessageType::Text)
            .await?;
        let trigger = customer_message.body.clone();
        self.respond(&mut conversation, customer, customer_message, &trigger).await
    }

    pub async fn forward_attachment_to_human(
        &self,
        conversation_id: ConversationId,
        customer: &Customer,
        attachment: &Attachment,
        caption: Option<&str>,
    ) -> Result<SupportReply, ApplicationError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let mut conversation = self.load_owned(conversation_id, customer).await?;

        let caption = caption.map(str::trim).filter(|caption| !caption.is_empty());
        let trigger = caption.unwrap_or(attachment.kind.placeholder()).to_string();
        let customer_message = self
            .record_customer_message(
                &mut conversation,
                customer,
                &trigger,
                Some(attachment.metadata(caption)),
                attachment.kind.message_type(),
            )
            .await?;
        self.respond(&mut conversation, customer, customer_message, &trigger).await
    }

    pub async fn request_human_handoff(
        &self,
        conversation_id: ConversationId,
        reason: &str,
        ack_text: Option<&str>,
    ) -> Result<Message, ApplicationError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let mut conversation = self.load(conversation_id).await?;
        self.hand_off(&mut conversation, reason, ack_text).await
    }

    pub async fn add_admin_reply(
        &self,
        conversation_id: ConversationId,
        staff: &StaffUser,
        body: &str,
        internal: bool,
    ) -> Result<Message, ApplicationError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let mut conversation = self.load(conversation_id).await?;
        self.post_staff_message(&mut conversation, staff, body.trim(), None, MessageType::Text, internal)
            .await
    }

    pub async fn add_admin_attachment_reply(
        &self,
        conversation_id: ConversationId,
        staff: &StaffUser,
        attachment: &Attachment,
        caption: Option<&str>,
        internal: bool,
    ) -> Result<Message, ApplicationError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let mut conversation = self.load(conversation_id).await?;

        let caption = caption.map(str::trim).filter(|caption| !caption.is_empty());
        let body = caption.unwrap_or_default();
        self.post_staff_message(
            &mut conversation,
            staff,
            body,
            Some(attachment.metadata(caption)),
            attachment.kind.message_type(),
            internal,
        )
        .await
    }

    /// Resolves the conversation. The resolution notice is posted at most once in a row.
    pub async fn mark_resolved(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Conversation, ApplicationError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let mut conversation = self.load(conversation_id).await?;
        let audit = self.audit_context(conversation_id, "system");

        self.transition(&mut conversation, FlowEvent::Resolved, &audit)?;
        self.repositories.conversations.save(conversation.clone()).await?;

        let already_noticed = self
            .repositories
            .messages
            .latest(conversation_id)
            .await?
            .is_some_and(|latest| latest.has_event(SupportEvent::SessionResolved));
        if !already_noticed {
            let notice = self
                .repositories
                .messages
                .create(
                    NewMessage::text(conversation_id, Sender::System(None), RESOLUTION_NOTICE)
                        .with_event(SupportEvent::SessionResolved),
                )
                .await?;
            self.broadcast(&conversation, &notice).await;
        }

        self.audit.emit(AuditEvent::from_context(
            &audit,
            "support.conversation_resolved",
            AuditCategory::Support,
            AuditOutcome::Success,
        ));
        Ok(conversation)
    }

    /// Customer has seen everything sent by staff, the assistant and the system.
    pub async fn mark_messages_read_by_customer(
        &self,
        conversation_id: ConversationId,
    ) -> Result<u64, ApplicationError> {
        let _guard = self.locks.acquire(conversation_id).await;
        Ok(self
            .repositories
            .messages
            .mark_read(
                conversation_id,
                &[SenderType::Agent, SenderType::Ai, SenderType::System],
                Utc::now(),
            )
            .await?)
    }

    pub async fn mark_messages_read_by_admin(
        &self,
        conversation_id: ConversationId,
    ) -> Result<u64, ApplicationError> {
        let _guard = self.locks.acquire(conversation_id).await;
        Ok(self
            .repositories
            .messages
            .mark_read(conversation_id, &[SenderType::Customer], Utc::now())
            .await?)
    }

    /// Customer-visible page after `after_id`. The limit is clamped to `1..=100`.
    pub async fn get_messages(
        &self,
        conversation_id: ConversationId,
        after_id: Option<MessageId>,
        limit: u32,
    ) -> Result<Vec<Message>, ApplicationError> {
        Ok(self
            .repositories
            .messages
            .list_visible(conversation_id, after_id, limit.clamp(1, MAX_PAGE_SIZE))
            .await?)
    }

    pub async fn add_ai_summary_internal_note(
        &self,
        conversation_id: ConversationId,
        staff: Option<&StaffUser>,
    ) -> Result<Message, ApplicationError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let conversation = self.load(conversation_id).await?;
        let history =
            self.repositories.messages.recent_visible(conversation_id, SUMMARY_HISTORY_LIMIT).await?;

        let mut source = ReplySource::Fallback;
        let mut body = None;
        if self.settings.ai_configured {
            match self
                .chat
                .chat(&summary_messages(&conversation, &history), SUMMARY_TEMPERATURE)
                .await
            {
                Ok(summary) if !summary.trim().is_empty() => {
                    source = ReplySource::Deepseek;
                    body = Some(summary.trim().to_string());
                }
                Ok(_) => {
                    warn!(
                        event_name = "support.ai_summary_empty",
                        conversation_id = conversation_id.0,
                        "summary model returned no text"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "support.ai_summary_failed",
                        conversation_id = conversation_id.0,
                        error = %error,
                        "summary generation failed, using template"
                    );
                }
            }
        }
        let body = body.unwrap_or_else(|| fallback_summary(&conversation, &history));

        let note = self
            .repositories
            .messages
            .create(
                NewMessage::text(
                    conversation_id,
                    Sender::System(staff.map(|staff| staff.id.clone())),
                    body,
                )
                .with_event(SupportEvent::AiSummary)
                .with_source(source)
                .internal(),
            )
            .await?;
        Ok(note)
    }

    async fn respond(
        &self,
        conversation: &mut Conversation,
        customer: &Customer,
        customer_message: Message,
        trigger: &str,
    ) -> Result<SupportReply, ApplicationError> {
        if !self.settings.ai_only_mode && requests_human(trigger) {
            let ack = self.hand_off(conversation, REASON_KEYWORD, None).await?;
            return Ok(reply(AgentKind::Human, customer_message, ack));
        }

        let order_number = extract_order_number(trigger);
        let orders = self.customer_orders(customer, order_number.as_deref()).await?;

        if let Some(body) = rule_based_reply(trigger, &orders) {
            let answer = self.post_ai_message(conversation, body, ReplySource::Rule).await?;
            return Ok(reply(AgentKind::Ai, customer_message, answer));
        }

        if self.ai_usable(conversation, customer).await {
            let history: Vec<Message> = self
                .repositories
                .messages
                .recent_visible(conversation.id, REPLY_HISTORY_LIMIT as u32 + 1)
                .await?
                .into_iter()
                .filter(|message| message.id != customer_message.id)
                .collect();
            match self.ai_reply(conversation, customer, &history, trigger, &orders).await {
                Ok(body) => {
                    let answer =
                        self.post_ai_message(conversation, body, ReplySource::Deepseek).await?;
                    return Ok(reply(AgentKind::Ai, customer_message, answer));
                }
                Err(error) => {
                    warn!(
                        event_name = "support.ai_reply_failed",
                        conversation_id = conversation.id.0,
                        error = %error,
                        "AI reply failed, falling back"
                    );
                    self.audit.emit(
                        AuditEvent::from_context(
                            &self.audit_context(conversation.id, "assistant"),
                            "support.ai_reply_failed",
                            AuditCategory::Support,
                            AuditOutcome::Failed,
                        )
                        .with_metadata("error", error.to_string()),
                    );
                }
            }
        }

        if self.settings.ai_only_mode {
            let body = fallback_reply(trigger, &orders);
            let answer = self.post_ai_message(conversation, body, ReplySource::Fallback).await?;
            return Ok(reply(AgentKind::Ai, customer_message, answer));
        }

        let ack = self.hand_off(conversation, REASON_AI_UNAVAILABLE, Some(AI_UNAVAILABLE_ACK)).await?;
        Ok(reply(AgentKind::Human, customer_message, ack))
    }

    async fn ai_usable(&self, conversation: &Conversation, customer: &Customer) -> bool {
        if !self.settings.ai_configured
            || !conversation.ai_enabled
            || conversation.active_agent == AgentKind::Human
        {
            return false;
        }
        let allowed = self.limiter.try_acquire(&format!("support-ai:{}", customer.id.0)).await;
        if !allowed {
            warn!(
                event_name = "support.ai_rate_limited",
                conversation_id = conversation.id.0,
                "AI reply skipped by rate limit"
            );
        }
        allowed
    }

    async fn ai_reply(
        &self,
        conversation: &Conversation,
        customer: &Customer,
        history: &[Message],
        trigger: &str,
        orders: &[Order],
    ) -> Result<String, LlmError> {
        let order_number = extract_order_number(trigger);
        let snapshot = build_order_context_snapshot(orders, order_number.as_deref());

        let messages = ReplyPrompt {
            customer,
            channel: &conversation.channel,
            orders: &snapshot,
            history,
            input: trigger,
            ai_only_mode: self.settings.ai_only_mode,
        }
        .into_messages();

        let raw = self.chat.chat(&messages, REPLY_TEMPERATURE).await?;
        Ok(reply_or_generic(&raw))
    }

    async fn customer_orders(
        &self,
        customer: &Customer,
        order_number: Option<&str>,
    ) -> Result<Vec<Order>, ApplicationError> {
        let mut orders = self
            .repositories
            .orders
            .recent_for_customer(&customer.id, SNAPSHOT_LIMIT as u32)
            .await?;

        if let Some(number) = order_number {
            let known = orders.iter().any(|order| order.number.eq_ignore_ascii_case(number));
            if !known {
                if let Some(order) = self
                    .repositories
                    .orders
                    .find_by_number_for_customer(&customer.id, number)
                    .await?
                {
                    orders.insert(0, order);
                }
            }
        }
        Ok(orders)
    }

    async fn record_customer_message(
        &self,
        conversation: &mut Conversation,
        customer: &Customer,
        body: &str,
        metadata: Option<Metadata>,
        message_type: MessageType,
    ) -> Result<Message, ApplicationError> {
        let audit = self.audit_context(conversation.id, &actor_customer(customer));
        self.transition(conversation, FlowEvent::CustomerMessageReceived, &audit)?;
        self.repositories.conversations.save(conversation.clone()).await?;

        let message = self
            .repositories
            .messages
            .create(
                NewMessage::text(conversation.id, Sender::Customer(customer.id.clone()), body.trim())
                    .with_type(message_type)
                    .merge_metadata(metadata),
            )
            .await?;
        self.broadcast(conversation, &message).await;
        Ok(message)
    }

    async fn post_ai_message(
        &self,
        conversation: &mut Conversation,
        body: String,
        source: ReplySource,
    ) -> Result<Message, ApplicationError> {
        let message = self
            .repositories
            .messages
            .create(NewMessage::text(conversation.id, Sender::Ai, body).with_source(source))
            .await?;
        conversation.record_outbound_message(message.created_at);
        self.repositories.conversations.save(conversation.clone()).await?;
        self.broadcast(conversation, &message).await;
        Ok(message)
    }

    async fn hand_off(
        &self,
        conversation: &mut Conversation,
        reason: &str,
        ack_text: Option<&str>,
    ) -> Result<Message, ApplicationError> {
        let audit = self.audit_context(conversation.id, "system");

        if self.settings.ai_only_mode {
            let ack = self
                .repositories
                .messages
                .create(
                    NewMessage::text(
                        conversation.id,
                        Sender::Ai,
                        self.settings.ai_only_ack_text.clone(),
                    )
                    .with_event(SupportEvent::AiOnlyMode)
                    .with_metadata("reason", reason),
                )
                .await?;
            conversation.record_outbound_message(ack.created_at);
            self.repositories.conversations.save(conversation.clone()).await?;
            self.broadcast(conversation, &ack).await;
            self.audit.emit(
                AuditEvent::from_context(
                    &audit,
                    "support.handoff_suppressed",
                    AuditCategory::Support,
                    AuditOutcome::Rejected,
                )
                .with_metadata("reason", reason),
            );
            return Ok(ack);
        }

        self.transition(conversation, FlowEvent::HandoffRequested, &audit)?;
        self.repositories.conversations.save(conversation.clone()).await?;

        let ack = self
            .repositories
            .messages
            .create(
                NewMessage::text(
                    conversation.id,
                    Sender::System(None),
                    ack_text.unwrap_or(DEFAULT_HANDOFF_ACK),
                )
                .with_event(SupportEvent::HandoffRequested)
                .with_metadata("reason", reason),
            )
            .await?;
        self.broadcast(conversation, &ack).await;

        info!(
            event_name = "support.handoff_requested",
            conversation_id = conversation.id.0,
            reason,
            "conversation handed to human support"
        );
        self.audit.emit(
            AuditEvent::from_context(
                &audit,
                "support.handoff_requested",
                AuditCategory::Support,
                AuditOutcome::Success,
            )
            .with_metadata("reason", reason),
        );
        self.notify_staff(conversation, reason).await?;
        Ok(ack)
    }

    async fn post_staff_message(
        &self,
        conversation: &mut Conversation,
        staff: &StaffUser,
        body: &str,
        metadata: Option<Metadata>,
        message_type: MessageType,
        internal: bool,
    ) -> Result<Message, ApplicationError> {
        let draft = if internal {
            NewMessage::text(conversation.id, Sender::System(Some(staff.id.clone())), body)
                .internal()
        } else {
            let audit = self.audit_context(conversation.id, &format!("staff:{}", staff.id.0));
            self.transition(conversation, FlowEvent::AgentReplied, &audit)?;
            conversation.assign_to(&staff.id);
            self.repositories.conversations.save(conversation.clone()).await?;
            NewMessage::text(conversation.id, Sender::Agent(staff.id.clone()), body)
        };

        let message = self
            .repositories
            .messages
            .create(draft.with_type(message_type).merge_metadata(metadata))
            .await?;

        if !internal {
            let notification = SupportNotification::CustomerReplied {
                conversation: conversation.clone(),
                message: message.clone(),
            };
            if let Err(error) = self.notifier.notify(notification).await {
                warn!(
                    event_name = "support.customer_notification_failed",
                    conversation_id = conversation.id.0,
                    error = %error,
                    "failed to notify customer"
                );
            }
            self.broadcast(conversation, &message).await;
        }

        self.repositories
            .messages
            .mark_read(conversation.id, &[SenderType::Customer], Utc::now())
            .await?;
        Ok(message)
    }

    fn transition(
        &self,
        conversation: &mut Conversation,
        event: FlowEvent,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let context = FlowContext::new(conversation.active_agent, self.settings.ai_only_mode);
        let outcome = self
            .flow
            .apply_with_audit(&conversation.status, &event, &context, self.audit.as_ref(), audit)
            .map_err(DomainError::from)?;
        conversation.apply_transition(&outcome, Utc::now());
        Ok(outcome)
    }

    async fn notify_staff(
        &self,
        conversation: &Conversation,
        reason: &str,
    ) -> Result<(), ApplicationError> {
        let recipients = self.repositories.staff.support_staff().await?;
        let notification = SupportNotification::AgentNeeded {
            conversation: conversation.clone(),
            reason: reason.to_string(),
            recipients,
        };
        if let Err(error) = self.notifier.notify(notification).await {
            warn!(
                event_name = "support.staff_notification_failed",
                conversation_id = conversation.id.0,
                error = %error,
                "failed to notify support staff"
            );
        }
        Ok(())
    }

    async fn broadcast(&self, conversation: &Conversation, message: &Message) {
        if !self.settings.realtime_enabled || message.is_internal_note {
            return;
        }
        if let Err(error) =
            self.broadcaster.broadcast(MessageBroadcast::new(conversation, message)).await
        {
            warn!(
                event_name = "support.broadcast_failed",
                conversation_id = conversation.id.0,
                message_id = message.id.0,
                error = %error,
                "realtime broadcast failed"
            );
        }
    }

    async fn load(&self, id: ConversationId) -> Result<Conversation, ApplicationError> {
        self.repositories
            .conversations
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::ConversationNotFound(id.0).into())
    }

    /// Loads a conversation the customer may write into.
    ///
    /// A resolved thread can be reopened only while the customer has no other
    /// active conversation; otherwise nothing is written.
    async fn load_owned(
        &self,
        id: ConversationId,
        customer: &Customer,
    ) -> Result<Conversation, ApplicationError> {
        let conversation = self.load(id).await?;
        if conversation.customer_id != customer.id {
            return Err(DomainError::ConversationOwnership {
                conversation_id: id.0,
                customer_id: customer.id.0.clone(),
            }
            .into());
        }

        if !conversation.is_active() {
            if let Some(active) =
                self.repositories.conversations.find_active_for_customer(&customer.id).await?
            {
                if active.id != conversation.id {
                    warn!(
                        event_name = "support.conversation_superseded",
                        conversation_id = id.0,
                        active_id = active.id.0,
                        "customer wrote into a superseded conversation"
                    );
                    return Err(DomainError::ConversationSuperseded {
                        conversation_id: id.0,
                        active_id: active.id.0,
                    }
                    .into());
                }
            }
        }
        Ok(conversation)
    }

    fn audit_context(&self, conversation_id: ConversationId, actor: &str) -> AuditContext {
        AuditContext::for_conversation(conversation_id, Uuid::new_v4().to_string(), actor)
    }
}

fn actor_customer(customer: &Customer) -> String {
    format!("customer:{}", customer.id.0)
}

fn reply(agent_type: AgentKind, customer_message: Message, response: Message) -> SupportReply {
    SupportReply { agent_type, reply: response.body.clone(), messages: vec![customer_message, response] }
}
