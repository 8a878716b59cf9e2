use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use storefront_agent::llm::{ChatClient, ChatMessage, ChatRole, LlmError};
use storefront_agent::notify::{InMemoryBroadcaster, InMemoryNotifier, SupportNotification};
use storefront_agent::orchestrator::{
    Attachment, AttachmentKind, SupportOrchestrator, SupportRepositories,
};
use storefront_core::audit::InMemoryAuditSink;
use storefront_core::config::SupportSettings;
use storefront_core::domain::conversation::{AgentKind, ConversationId, ConversationStatus};
use storefront_core::domain::customer::{Customer, CustomerId, StaffUser, UserId};
use storefront_core::domain::message::{
    MessageType, ReplySource, Sender, SenderType, SupportEvent,
};
use storefront_core::domain::order::{Order, OrderId, Payment};
use storefront_core::domain::Metadata;
use storefront_core::errors::{ApplicationError, DomainError};
use storefront_core::support::handoff::{
    AI_UNAVAILABLE_ACK, REASON_AI_UNAVAILABLE, REASON_CUSTOMER_REQUEST, REASON_KEYWORD,
};
use storefront_core::support::order_context::GENERIC_ORDER_PROMPT;
use storefront_db::repositories::{
    ConversationRepository, InMemoryConversationRepository, InMemoryMessageRepository,
    InMemoryOrderRepository, InMemoryStaffRepository, MessageRepository,
};

struct ScriptedChat {
    reply: Result<String, LlmError>,
    calls: Mutex<Vec<(Vec<ChatMessage>, f32)>>,
}

impl ScriptedChat {
    fn calls(&self) -> Vec<(Vec<ChatMessage>, f32)> {
        self.calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<String, LlmError> {
        self.calls.lock().expect("lock").push((messages.to_vec(), temperature));
        self.reply.clone()
    }
}

struct Harness {
    orchestrator: SupportOrchestrator,
    conversations: Arc<InMemoryConversationRepository>,
    messages: Arc<InMemoryMessageRepository>,
    orders: Arc<InMemoryOrderRepository>,
    notifier: InMemoryNotifier,
    broadcaster: InMemoryBroadcaster,
    audit: InMemoryAuditSink,
    chat: Arc<ScriptedChat>,
}

async fn harness(
    ai_only_mode: bool,
    ai_configured: bool,
    reply: Result<String, LlmError>,
) -> Harness {
    harness_with(SupportSettings { ai_only_mode, ai_configured, ..SupportSettings::default() }, reply)
        .await
}

async fn harness_with(settings: SupportSettings, reply: Result<String, LlmError>) -> Harness {
    let conversations = Arc::new(InMemoryConversationRepository::default());
    let messages = Arc::new(InMemoryMessageRepository::default());
    let orders = Arc::new(InMemoryOrderRepository::default());
    let staff = Arc::new(InMemoryStaffRepository::default());
    staff.insert(support_agent()).await;
    staff
        .insert(StaffUser { id: UserId("u-2".into()), name: "Finance".into(), can_support: false })
        .await;

    let chat = Arc::new(ScriptedChat { reply, calls: Mutex::new(Vec::new()) });
    let notifier = InMemoryNotifier::default();
    let broadcaster = InMemoryBroadcaster::default();
    let audit = InMemoryAuditSink::default();

    let orchestrator = SupportOrchestrator::new(
        SupportRepositories {
            conversations: conversations.clone(),
            messages: messages.clone(),
            orders: orders.clone(),
            staff,
        },
        chat.clone(),
        settings,
    )
    .with_notifier(Arc::new(notifier.clone()))
    .with_broadcaster(Arc::new(broadcaster.clone()))
    .with_audit_sink(Arc::new(audit.clone()));

    Harness { orchestrator, conversations, messages, orders, notifier, broadcaster, audit, chat }
}

fn customer() -> Customer {
    Customer { id: CustomerId("cus-1".into()), name: "Ada".into(), email: None }
}

fn support_agent() -> StaffUser {
    StaffUser { id: UserId("u-1".into()), name: "Sam".into(), can_support: true }
}

fn order(number: &str, day: u32) -> Order {
    Order {
        id: OrderId(i64::from(day)),
        number: number.to_string(),
        customer_id: customer().id,
        status: "shipped".to_string(),
        status_label: "Shipped".to_string(),
        payment_status: "paid".to_string(),
        currency: "USD".to_string(),
        grand_total: Decimal::new(4_250, 2),
        placed_at: Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).single(),
        supplier_order_status: None,
        supplier_payment_status: None,
        tracking_number: Some("TRK123".to_string()),
        tracking_url: None,
        delivery: None,
        shipment: None,
        payments: vec![Payment {
            provider: "stripe".to_string(),
            status: "succeeded".to_string(),
            amount: Decimal::new(4_250, 2),
            currency: "USD".to_string(),
            paid_at: None,
            reference: Some("pi_1".to_string()),
        }],
    }
}

async fn start(h: &Harness, requested: &str) -> ConversationId {
    h.orchestrator
        .start_conversation(&customer(), requested, "mobile", Metadata::new())
        .await
        .expect("start")
        .conversation
        .id
}

#[tokio::test]
async fn ai_conversation_starts_open_with_a_single_welcome() {
    let h = harness(false, true, Ok("hi".into())).await;

    let started = h
        .orchestrator
        .start_conversation(&customer(), "robot", "mobile", Metadata::new())
        .await
        .expect("start");
    let again = h
        .orchestrator
        .start_conversation(&customer(), "auto", "mobile", Metadata::new())
        .await
        .expect("start again");

    assert_eq!(started.agent_type, AgentKind::Ai);
    assert_eq!(started.conversation.status, ConversationStatus::Open);
    assert_eq!(again.conversation.id, started.conversation.id);

    let messages = h.messages.list_visible(started.conversation.id, None, 100).await.expect("list");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].has_event(SupportEvent::ChatStarted));
    assert_eq!(messages[0].body, started.welcome);
    assert!(h.notifier.notifications().is_empty());
    assert_eq!(h.audit.events_of_type("support.conversation_started").len(), 1);
}

#[tokio::test]
async fn human_request_opens_pending_agent_and_notifies_support_staff() {
    let h = harness(false, true, Ok("hi".into())).await;

    let started = h
        .orchestrator
        .start_conversation(&customer(), "HUMAN", "web", Metadata::new())
        .await
        .expect("start");

    assert_eq!(started.agent_type, AgentKind::Human);
    assert_eq!(started.conversation.status, ConversationStatus::PendingAgent);
    assert!(!started.conversation.ai_enabled);

    let notifications = h.notifier.notifications();
    assert_eq!(notifications.len(), 1);
    match &notifications[0] {
        SupportNotification::AgentNeeded { reason, recipients, .. } => {
            assert_eq!(reason, REASON_CUSTOMER_REQUEST);
            assert_eq!(recipients, &vec![support_agent()]);
        }
        other => panic!("unexpected notification {other:?}"),
    }
}

#[tokio::test]
async fn unconfigured_ai_routes_auto_requests_to_humans() {
    let h = harness(false, false, Ok("hi".into())).await;

    let started = h
        .orchestrator
        .start_conversation(&customer(), "ai", "mobile", Metadata::new())
        .await
        .expect("start");

    assert_eq!(started.agent_type, AgentKind::Human);
    assert_eq!(h.notifier.agent_needed_reasons(), vec![REASON_AI_UNAVAILABLE.to_string()]);
}

#[tokio::test]
async fn explicit_human_request_switches_an_existing_ai_conversation() {
    let h = harness(false, true, Ok("hi".into())).await;
    let id = start(&h, "auto").await;

    let switched = h
        .orchestrator
        .start_conversation(&customer(), "human", "mobile", Metadata::new())
        .await
        .expect("switch");

    assert_eq!(switched.conversation.id, id);
    assert_eq!(switched.agent_type, AgentKind::Human);
    assert_eq!(switched.conversation.status, ConversationStatus::PendingAgent);
    assert!(switched.conversation.handoff_requested);
    assert_eq!(h.notifier.agent_needed_reasons(), vec![REASON_CUSTOMER_REQUEST.to_string()]);
}

#[tokio::test]
async fn ai_only_mode_takes_back_human_conversations() {
    let h = harness(false, true, Ok("hi".into())).await;
    let id = start(&h, "human").await;

    let ai_only = harness(true, true, Ok("hi".into())).await;
    let existing =
        h.conversations.find_by_id(id).await.expect("load").expect("conversation exists");
    ai_only.conversations.save(existing).await.expect("copy");

    let started = ai_only
        .orchestrator
        .start_conversation(&customer(), "human", "mobile", Metadata::new())
        .await
        .expect("start");

    assert_eq!(started.conversation.id, id);
    assert_eq!(started.agent_type, AgentKind::Ai);
    assert_eq!(started.conversation.status, ConversationStatus::Open);
    assert!(started.conversation.ai_enabled);
    assert!(!started.conversation.handoff_requested);
    assert!(ai_only.notifier.notifications().is_empty());
}

#[tokio::test]
async fn agent_keyword_hands_off_with_exactly_two_messages() {
    let h = harness(false, true, Ok("should not be used".into())).await;
    let id = start(&h, "auto").await;

    let reply = h
        .orchestrator
        .reply_to_customer(id, &customer(), "Can I talk to an AGENT please?")
        .await
        .expect("reply");

    assert_eq!(reply.agent_type, AgentKind::Human);
    assert_eq!(reply.messages.len(), 2);
    assert_eq!(reply.messages[0].sender_type(), SenderType::Customer);
    assert_eq!(reply.messages[1].sender, Sender::System(None));
    assert!(reply.messages[1].has_event(SupportEvent::HandoffRequested));
    assert_eq!(reply.reply, reply.messages[1].body);
    assert!(h.chat.calls().is_empty());

    let conversation = h.conversations.find_by_id(id).await.expect("load").expect("exists");
    assert_eq!(conversation.active_agent, AgentKind::Human);
    assert_eq!(conversation.status, ConversationStatus::PendingAgent);
    assert_eq!(h.notifier.agent_needed_reasons(), vec![REASON_KEYWORD.to_string()]);
}

#[tokio::test]
async fn order_questions_get_rule_based_answers_before_the_model() {
    let h = harness(false, false, Ok("unused".into())).await;
    let id = start(&h, "auto").await;

    let reply = h
        .orchestrator
        .reply_to_customer(id, &customer(), "where is my order")
        .await
        .expect("reply");

    assert_eq!(reply.agent_type, AgentKind::Ai);
    assert!(reply.reply.contains("share your order number"), "got: {}", reply.reply);
    assert_eq!(reply.messages[1].sender, Sender::Ai);
    assert_eq!(reply.messages[1].metadata_str("source"), Some(ReplySource::Rule.as_str()));
    assert!(h.chat.calls().is_empty());
}

#[tokio::test]
async fn order_number_in_message_selects_that_order() {
    let h = harness(false, true, Ok("unused".into())).await;
    for day in 1..=7 {
        h.orders.insert(order(&format!("DS-000000000{day}"), day)).await;
    }
    let id = start(&h, "auto").await;

    let reply = h
        .orchestrator
        .reply_to_customer(id, &customer(), "My order is ds-0000000001, please check")
        .await
        .expect("reply");

    assert_eq!(
        reply.reply,
        "Latest update for order DS-0000000001: Shipped. Payment: paid, Ref: pi_1. \
Tracking: shipped (No: TRK123). Total: 42.50 USD."
    );
}

#[tokio::test]
async fn model_reply_uses_context_and_is_tagged() {
    let h = harness(false, true, Ok("Happy to help!".into())).await;
    let id = start(&h, "auto").await;

    let reply =
        h.orchestrator.reply_to_customer(id, &customer(), "hello there").await.expect("reply");

    assert_eq!(reply.agent_type, AgentKind::Ai);
    assert_eq!(reply.reply, "Happy to help!");
    assert_eq!(reply.messages[1].metadata_str("source"), Some("deepseek"));

    let calls = h.chat.calls();
    assert_eq!(calls.len(), 1);
    let (messages, temperature) = &calls[0];
    assert_eq!(*temperature, 0.4_f32);
    assert_eq!(messages[0].role, ChatRole::System);
    // welcome message from history, then the new input exactly once
    assert_eq!(messages[3].role, ChatRole::Assistant);
    assert_eq!(messages.last().map(|m| m.content.as_str()), Some("hello there"));
    assert_eq!(messages.iter().filter(|m| m.content == "hello there").count(), 1);
}

#[tokio::test]
async fn empty_model_output_becomes_the_generic_question() {
    let h = harness(false, true, Ok("   ".into())).await;
    let id = start(&h, "auto").await;

    let reply =
        h.orchestrator.reply_to_customer(id, &customer(), "hello there").await.expect("reply");

    assert_eq!(reply.reply, GENERIC_ORDER_PROMPT);
}

#[tokio::test]
async fn model_failure_falls_back_to_a_human() {
    let h = harness(false, true, Err(LlmError::Status { status: 500, body: "down".into() })).await;
    let id = start(&h, "auto").await;

    let reply =
        h.orchestrator.reply_to_customer(id, &customer(), "hello there").await.expect("reply");

    assert_eq!(reply.agent_type, AgentKind::Human);
    assert_eq!(reply.reply, AI_UNAVAILABLE_ACK);
    assert_eq!(h.notifier.agent_needed_reasons(), vec![REASON_AI_UNAVAILABLE.to_string()]);
    assert_eq!(h.audit.events_of_type("support.ai_reply_failed").len(), 1);
}

#[tokio::test]
async fn model_failure_in_ai_only_mode_uses_the_fallback_reply() {
    let h = harness(true, true, Err(LlmError::Transport("timeout".into()))).await;
    let id = start(&h, "human").await;

    let reply =
        h.orchestrator.reply_to_customer(id, &customer(), "hello there").await.expect("reply");

    assert_eq!(reply.agent_type, AgentKind::Ai);
    assert_eq!(reply.reply, GENERIC_ORDER_PROMPT);
    assert_eq!(reply.messages[1].metadata_str("source"), Some("fallback"));
}

#[tokio::test]
async fn ai_only_mode_ignores_handoff_keywords() {
    let h = harness(true, false, Ok("unused".into())).await;
    let id = start(&h, "auto").await;

    let reply = h
        .orchestrator
        .reply_to_customer(id, &customer(), "I need a real person, an agent!")
        .await
        .expect("reply");

    assert_eq!(reply.agent_type, AgentKind::Ai);
    assert_eq!(reply.messages.len(), 2);
    assert_eq!(reply.messages[1].sender, Sender::Ai);
    assert!(h.notifier.notifications().is_empty());
}

#[tokio::test]
async fn rate_limited_customers_skip_the_model() {
    let settings = SupportSettings {
        ai_configured: true,
        ai_rate_limit_attempts: 0,
        ai_rate_limit_period: Duration::from_secs(60),
        ..SupportSettings::default()
    };
    let h = harness_with(settings, Ok("Happy to help!".into())).await;
    let id = start(&h, "auto").await;

    let reply =
        h.orchestrator.reply_to_customer(id, &customer(), "hello there").await.expect("reply");

    assert_eq!(reply.agent_type, AgentKind::Human);
    assert!(h.chat.calls().is_empty());
}

#[tokio::test]
async fn handoff_in_ai_only_mode_never_reaches_a_human() {
    let h = harness(true, true, Ok("unused".into())).await;
    let id = start(&h, "auto").await;

    let ack = h
        .orchestrator
        .request_human_handoff(id, "Refund dispute", Some("A human will join"))
        .await
        .expect("handoff");

    assert_eq!(ack.sender, Sender::Ai);
    assert!(ack.has_event(SupportEvent::AiOnlyMode));
    assert_eq!(ack.metadata_str("reason"), Some("Refund dispute"));
    assert_eq!(ack.body, SupportSettings::default().ai_only_ack_text);

    let conversation = h.conversations.find_by_id(id).await.expect("load").expect("exists");
    assert_eq!(conversation.active_agent, AgentKind::Ai);
    assert_eq!(conversation.status, ConversationStatus::Open);
    assert!(h.notifier.notifications().is_empty());
}

#[tokio::test]
async fn resolving_twice_posts_one_notice() {
    let h = harness(false, true, Ok("unused".into())).await;
    let id = start(&h, "auto").await;

    let resolved = h.orchestrator.mark_resolved(id).await.expect("resolve");
    h.orchestrator.mark_resolved(id).await.expect("resolve again");

    assert_eq!(resolved.status, ConversationStatus::Resolved);
    assert!(resolved.resolved_at.is_some());
    assert!(!resolved.handoff_requested);

    let notices = h
        .messages
        .list_visible(id, None, 100)
        .await
        .expect("list")
        .into_iter()
        .filter(|message| message.has_event(SupportEvent::SessionResolved))
        .count();
    assert_eq!(notices, 1);
}

#[tokio::test]
async fn message_pages_are_capped_and_hide_internal_notes() {
    let h = harness(false, false, Ok("unused".into())).await;
    let id = start(&h, "human").await;
    for index in 0..110 {
        h.orchestrator
            .receive_customer_message(id, &customer(), &format!("msg {index}"), None, MessageType::Text)
            .await
            .expect("receive");
    }
    h.orchestrator.add_admin_reply(id, &support_agent(), "check refund", true).await.expect("note");

    let page = h.orchestrator.get_messages(id, None, 500).await.expect("page");

    assert_eq!(page.len(), 100);
    assert!(page.iter().all(|message| !message.is_internal_note));
    assert!(page.windows(2).all(|pair| pair[0].id < pair[1].id));

    let tail = h.orchestrator.get_messages(id, Some(page[99].id), 0).await.expect("tail");
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].id.0, page[99].id.0 + 1);
}

#[tokio::test]
async fn customer_messages_are_trimmed_and_broadcast() {
    let h = harness(false, false, Ok("unused".into())).await;
    let id = start(&h, "human").await;

    let message = h
        .orchestrator
        .receive_customer_message(id, &customer(), "  hello  ", None, MessageType::Text)
        .await
        .expect("receive");

    assert_eq!(message.body, "hello");
    let conversation = h.conversations.find_by_id(id).await.expect("load").expect("exists");
    assert_eq!(conversation.status, ConversationStatus::PendingAgent);
    assert!(conversation.last_customer_message_at.is_some());
    assert!(h.broadcaster.events().iter().any(|event| event.id == message.id));
}

#[tokio::test]
async fn staff_replies_take_over_and_notify_but_notes_stay_private() {
    let h = harness(false, true, Ok("unused".into())).await;
    let id = start(&h, "auto").await;
    h.orchestrator
        .receive_customer_message(id, &customer(), "hello", None, MessageType::Text)
        .await
        .expect("receive");

    let note = h
        .orchestrator
        .add_admin_reply(id, &support_agent(), "VIP customer", true)
        .await
        .expect("note");
    assert_eq!(note.sender, Sender::System(Some(support_agent().id)));
    assert!(note.is_internal_note);
    assert!(h.broadcaster.events().iter().all(|event| event.id != note.id));
    assert!(h.notifier.notifications().is_empty());

    let answer = h
        .orchestrator
        .add_admin_reply(id, &support_agent(), "Hi Ada, checking now", false)
        .await
        .expect("reply");
    assert_eq!(answer.sender, Sender::Agent(support_agent().id));

    let conversation = h.conversations.find_by_id(id).await.expect("load").expect("exists");
    assert_eq!(conversation.status, ConversationStatus::PendingCustomer);
    assert_eq!(conversation.active_agent, AgentKind::Human);
    assert!(!conversation.ai_enabled);
    assert_eq!(conversation.assigned_user, Some(support_agent().id));

    assert!(matches!(
        h.notifier.notifications().as_slice(),
        [SupportNotification::CustomerReplied { .. }]
    ));
    let customer_messages = h.orchestrator.get_messages(id, None, 100).await.expect("list");
    assert!(customer_messages
        .iter()
        .filter(|message| message.sender_type() == SenderType::Customer)
        .all(|message| message.read_at.is_some()));
}

#[tokio::test]
async fn attachments_without_caption_use_a_placeholder_trigger() {
    let h = harness(false, false, Ok("unused".into())).await;
    let id = start(&h, "auto").await;
    let attachment = Attachment {
        url: "https://cdn.example.com/receipt.png".into(),
        mime: "image/png".into(),
        kind: AttachmentKind::Image,
        size: 2048,
        name: Some("receipt.png".into()),
    };

    let reply = h
        .orchestrator
        .forward_attachment_to_human(id, &customer(), &attachment, Some("   "))
        .await
        .expect("forward");

    let shared = &reply.messages[0];
    assert_eq!(shared.message_type, MessageType::Image);
    assert_eq!(shared.body, "Customer shared an image.");
    let metadata = shared.metadata.as_ref().expect("metadata");
    assert_eq!(metadata["attachment"]["url"], "https://cdn.example.com/receipt.png");
    assert_eq!(metadata["attachment"]["size"], 2048);
    assert_eq!(reply.agent_type, AgentKind::Human);
}

#[tokio::test]
async fn attachment_caption_drives_rule_replies() {
    let h = harness(false, false, Ok("unused".into())).await;
    h.orders.insert(order("DS-0000000009", 9)).await;
    let id = start(&h, "auto").await;
    let attachment = Attachment {
        url: "https://cdn.example.com/label.pdf".into(),
        mime: "application/pdf".into(),
        kind: AttachmentKind::File,
        size: 10,
        name: None,
    };

    let reply = h
        .orchestrator
        .forward_attachment_to_human(id, &customer(), &attachment, Some("tracking for my order?"))
        .await
        .expect("forward");

    assert_eq!(reply.messages[0].message_type, MessageType::File);
    assert_eq!(reply.agent_type, AgentKind::Ai);
    assert!(reply.reply.starts_with("Latest update for order DS-0000000009"));
}

#[tokio::test]
async fn summary_note_falls_back_to_template_without_model() {
    let h = harness(false, false, Ok("unused".into())).await;
    let id = start(&h, "human").await;
    h.orchestrator
        .receive_customer_message(id, &customer(), "Parcel arrived broken", None, MessageType::Text)
        .await
        .expect("receive");

    let note = h
        .orchestrator
        .add_ai_summary_internal_note(id, Some(&support_agent()))
        .await
        .expect("summary");

    assert!(note.is_internal_note);
    assert!(note.has_event(SupportEvent::AiSummary));
    assert!(note.body.contains("Last customer message: Parcel arrived broken"));
    assert!(h
        .orchestrator
        .get_messages(id, None, 100)
        .await
        .expect("list")
        .iter()
        .all(|message| message.id != note.id));
}

#[tokio::test]
async fn summary_uses_model_at_low_temperature_when_configured() {
    let h = harness(false, true, Ok("Issue: damaged parcel".into())).await;
    let id = start(&h, "auto").await;

    let note = h.orchestrator.add_ai_summary_internal_note(id, None).await.expect("summary");

    assert_eq!(note.body, "Issue: damaged parcel");
    assert_eq!(note.metadata_str("source"), Some("deepseek"));
    assert_eq!(h.chat.calls()[0].1, 0.2_f32);
}

#[tokio::test]
async fn read_cursors_are_independent() {
    let h = harness(false, true, Ok("Sure".into())).await;
    let id = start(&h, "auto").await;
    h.orchestrator.reply_to_customer(id, &customer(), "hello there").await.expect("reply");

    // welcome + AI reply
    assert_eq!(h.orchestrator.mark_messages_read_by_customer(id).await.expect("customer"), 2);
    assert_eq!(h.orchestrator.mark_messages_read_by_admin(id).await.expect("admin"), 1);
    assert_eq!(h.orchestrator.mark_messages_read_by_customer(id).await.expect("again"), 0);
}

#[tokio::test]
async fn customers_cannot_write_to_other_conversations() {
    let h = harness(false, true, Ok("unused".into())).await;
    let id = start(&h, "auto").await;
    let stranger = Customer { id: CustomerId("cus-2".into()), name: "Eve".into(), email: None };

    let error = h
        .orchestrator
        .reply_to_customer(id, &stranger, "hello")
        .await
        .expect_err("ownership");

    assert!(matches!(
        error,
        ApplicationError::Domain(DomainError::ConversationOwnership { .. })
    ));
}

#[tokio::test]
async fn resolved_thread_reopens_when_nothing_else_is_active() {
    let h = harness(false, true, Ok("Happy to help!".into())).await;
    let id = start(&h, "auto").await;
    h.orchestrator.mark_resolved(id).await.expect("resolve");

    let reply = h.orchestrator.reply_to_customer(id, &customer(), "hello again").await.expect("reply");

    assert_eq!(reply.agent_type, AgentKind::Ai);
    let conversation = h.conversations.find_by_id(id).await.expect("load").expect("exists");
    assert_eq!(conversation.status, ConversationStatus::Open);
    assert!(conversation.resolved_at.is_none());
}

#[tokio::test]
async fn superseded_thread_rejects_customer_writes_untouched() {
    let h = harness(false, true, Ok("Happy to help!".into())).await;
    let old = start(&h, "auto").await;
    h.orchestrator.mark_resolved(old).await.expect("resolve");
    let current = start(&h, "auto").await;
    assert_ne!(old, current);

    let error = h
        .orchestrator
        .reply_to_customer(old, &customer(), "where is my order")
        .await
        .expect_err("superseded");
    assert_eq!(
        error,
        ApplicationError::Domain(DomainError::ConversationSuperseded {
            conversation_id: old.0,
            active_id: current.0,
        })
    );

    let attachment = Attachment {
        url: "https://cdn.example.com/receipt.png".into(),
        mime: "image/png".into(),
        kind: AttachmentKind::Image,
        size: 2_048,
        name: None,
    };
    let error = h
        .orchestrator
        .forward_attachment_to_human(old, &customer(), &attachment, None)
        .await
        .expect_err("superseded attachment");
    assert!(matches!(
        error,
        ApplicationError::Domain(DomainError::ConversationSuperseded { .. })
    ));

    assert_eq!(h.messages.count(old).await.expect("count"), 2);
    let stale = h.conversations.find_by_id(old).await.expect("load").expect("exists");
    assert_eq!(stale.status, ConversationStatus::Resolved);
    assert!(h.chat.calls().is_empty());
}

#[tokio::test]
async fn customer_metadata_cannot_suppress_the_resolution_notice() {
    let h = harness(false, false, Ok("unused".into())).await;
    let id = start(&h, "human").await;
    let mut metadata = Metadata::new();
    metadata.insert("event".to_string(), "session_resolved".into());
    metadata.insert("app_version".to_string(), "4.2.0".into());

    let message = h
        .orchestrator
        .receive_customer_message(id, &customer(), "done, thanks", Some(metadata), MessageType::Text)
        .await
        .expect("receive");
    assert!(!message.has_event(SupportEvent::SessionResolved));
    assert_eq!(message.metadata_str("app_version"), Some("4.2.0"));

    h.orchestrator.mark_resolved(id).await.expect("resolve");

    let latest = h.messages.latest(id).await.expect("latest").expect("notice");
    assert_eq!(latest.sender, Sender::System(None));
    assert!(latest.has_event(SupportEvent::SessionResolved));
}

#[tokio::test]
async fn concurrent_replies_on_one_conversation_stay_serialized() {
    let h = harness(false, true, Ok("Happy to help!".into())).await;
    let id = start(&h, "auto").await;
    let ada = customer();

    let (first, second) = tokio::join!(
        h.orchestrator.reply_to_customer(id, &ada, "hello there"),
        h.orchestrator.reply_to_customer(id, &ada, "are you still there"),
    );
    let first = first.expect("first reply");
    let second = second.expect("second reply");

    for reply in [&first, &second] {
        assert_eq!(reply.agent_type, AgentKind::Ai);
        assert_eq!(reply.messages[1].id.0, reply.messages[0].id.0 + 1);
    }

    let thread = h.messages.list_visible(id, None, 100).await.expect("list");
    assert_eq!(thread.len(), 5);
    assert!(thread.windows(2).all(|pair| pair[0].id < pair[1].id));

    let conversation = h.conversations.find_by_id(id).await.expect("load").expect("exists");
    assert_eq!(conversation.status, ConversationStatus::Open);
    assert_eq!(conversation.active_agent, AgentKind::Ai);
    assert_eq!(h.chat.calls().len(), 2);
}
