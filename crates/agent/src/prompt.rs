//! Chat message assembly for replies, summaries and translation.

use storefront_core::domain::conversation::Conversation;
use storefront_core::domain::customer::Customer;
use storefront_core::domain::message::{Message, Sender, SenderType};
use storefront_core::support::order_context::{OrderSnapshot, GENERIC_ORDER_PROMPT};

use crate::llm::{ChatMessage, ChatRole};

pub const REPLY_TEMPERATURE: f32 = 0.4;
pub const SUMMARY_TEMPERATURE: f32 = 0.2;
pub const TRANSLATION_TEMPERATURE: f32 = 0.1;

pub const REPLY_HISTORY_LIMIT: usize = 8;
pub const SUMMARY_HISTORY_LIMIT: u32 = 20;
pub const SUMMARY_EXCERPT_CHARS: usize = 220;

const SYSTEM_PROMPT: &str = "You are the customer support assistant for an online store. \
Answer questions about orders, payments, delivery and returns using only the order context provided. \
Keep replies short, friendly and factual. Never invent order numbers, prices or tracking details. \
If the customer asks for a refund approval, disputes a payment or reports an account security problem, \
tell them you are handing the conversation to a human support agent.";

const AI_ONLY_SYSTEM_PROMPT: &str = "You are the customer support assistant for an online store. \
Answer questions about orders, payments, delivery and returns using only the order context provided. \
Keep replies short, friendly and factual. Never invent order numbers, prices or tracking details. \
You are the only support channel: never mention, offer or promise a hand-off to a human agent, \
and if you cannot resolve something, ask for the order number and the details you need.";

const SUMMARY_PROMPT: &str = "Summarize this support conversation for a support agent. \
Use exactly these sections, one line each:\n\
Issue: <one sentence>\n\
Key facts: <order numbers, amounts, dates>\n\
Risk level: <low|medium|high>\n\
Next action: <what the agent should do next>";

pub fn system_prompt(ai_only_mode: bool) -> &'static str {
    if ai_only_mode {
        AI_ONLY_SYSTEM_PROMPT
    } else {
        SYSTEM_PROMPT
    }
}

pub fn role_for(sender: &Sender) -> ChatRole {
    match sender {
        Sender::Customer(_) => ChatRole::User,
        Sender::Agent(_) | Sender::Ai | Sender::System(_) => ChatRole::Assistant,
    }
}

pub struct ReplyPrompt<'a> {
    pub customer: &'a Customer,
    pub channel: &'a str,
    pub orders: &'a [OrderSnapshot],
    /// Earlier conversation messages, oldest first, excluding the new input.
    pub history: &'a [Message],
    pub input: &'a str,
    pub ai_only_mode: bool,
}

impl ReplyPrompt<'_> {
    pub fn into_messages(self) -> Vec<ChatMessage> {
        let mut messages = vec![
            ChatMessage::system(system_prompt(self.ai_only_mode)),
            ChatMessage::user(format!(
                "Customer name: {}. Channel: {}.",
                self.customer.display_name(),
                self.channel
            )),
        ];

        let snapshot = serde_json::to_string(self.orders).unwrap_or_else(|_| "[]".to_string());
        messages.push(ChatMessage::user(format!("Customer order context (JSON): {snapshot}")));

        let visible: Vec<&Message> =
            self.history.iter().filter(|message| message.is_customer_visible()).collect();
        let skip = visible.len().saturating_sub(REPLY_HISTORY_LIMIT);
        messages.extend(visible.into_iter().skip(skip).map(|message| ChatMessage {
            role: role_for(&message.sender),
            content: message.body.clone(),
        }));

        messages.push(ChatMessage::user(self.input));
        messages
    }
}

/// Model output, or the generic follow-up question when the model said nothing.
pub fn reply_or_generic(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        GENERIC_ORDER_PROMPT.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn summary_messages(conversation: &Conversation, history: &[Message]) -> Vec<ChatMessage> {
    let transcript = history
        .iter()
        .filter(|message| message.is_customer_visible())
        .map(|message| format!("[{}] {}", message.sender_type().as_str(), message.body))
        .collect::<Vec<_>>()
        .join("\n");

    vec![
        ChatMessage::system(SUMMARY_PROMPT),
        ChatMessage::user(format!(
            "Topic: {}\nStatus: {}\nTranscript:\n{}",
            topic_or_default(conversation),
            conversation.status.as_str(),
            transcript
        )),
    ]
}

/// Deterministic summary used when the model is unavailable.
pub fn fallback_summary(conversation: &Conversation, history: &[Message]) -> String {
    let last_customer = last_body(history, |sender| sender == SenderType::Customer);
    let last_agent =
        last_body(history, |sender| matches!(sender, SenderType::Agent | SenderType::Ai));

    format!(
        "Summary (automatic)\nTopic: {}\nStatus: {}\nLast customer message: {}\nLast agent message: {}",
        topic_or_default(conversation),
        conversation.status.as_str(),
        last_customer.map(excerpt).unwrap_or_else(|| "(none)".to_string()),
        last_agent.map(excerpt).unwrap_or_else(|| "(none)".to_string()),
    )
}

pub fn translation_messages(text: &str, source: &str, target: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!(
            "You translate e-commerce content from {source} to {target}. \
Reply with the translated text only, keep formatting, numbers and brand names unchanged."
        )),
        ChatMessage::user(text),
    ]
}

fn topic_or_default(conversation: &Conversation) -> &str {
    conversation
        .topic
        .as_deref()
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
        .unwrap_or("General support")
}

fn last_body(history: &[Message], wanted: impl Fn(SenderType) -> bool) -> Option<&str> {
    history
        .iter()
        .rev()
        .filter(|message| message.is_customer_visible())
        .find(|message| wanted(message.sender_type()))
        .map(|message| message.body.as_str())
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= SUMMARY_EXCERPT_CHARS {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(SUMMARY_EXCERPT_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use storefront_core::domain::conversation::{
        AgentKind, Conversation, ConversationId, ConversationStatus, RequestedAgent,
    };
    use storefront_core::domain::customer::{Customer, CustomerId, UserId};
    use storefront_core::domain::message::{Message, MessageId, NewMessage, Sender};
    use storefront_core::domain::Metadata;
    use storefront_core::support::order_context::GENERIC_ORDER_PROMPT;

    use super::{
        fallback_summary, reply_or_generic, role_for, system_prompt, ReplyPrompt,
        REPLY_HISTORY_LIMIT,
    };
    use crate::llm::ChatRole;

    fn conversation() -> Conversation {
        let now = Utc::now();
        Conversation {
            id: ConversationId(1),
            uuid: Uuid::new_v4(),
            customer_id: CustomerId("cus-1".to_string()),
            channel: "mobile".to_string(),
            status: ConversationStatus::PendingAgent,
            requested_agent: RequestedAgent::Auto,
            active_agent: AgentKind::Human,
            ai_enabled: false,
            handoff_requested: true,
            assigned_user: None,
            topic: None,
            tags: None,
            context: Metadata::new(),
            last_message_at: None,
            last_customer_message_at: None,
            last_agent_message_at: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn message(id: i64, sender: Sender, body: &str) -> Message {
        NewMessage::text(ConversationId(1), sender, body).into_message(MessageId(id))
    }

    fn customer() -> Customer {
        Customer { id: CustomerId("cus-1".to_string()), name: "Ada".to_string(), email: None }
    }

    #[test]
    fn roles_follow_sender_side() {
        assert_eq!(role_for(&Sender::Customer(CustomerId("c".into()))), ChatRole::User);
        assert_eq!(role_for(&Sender::Agent(UserId("u".into()))), ChatRole::Assistant);
        assert_eq!(role_for(&Sender::Ai), ChatRole::Assistant);
        assert_eq!(role_for(&Sender::System(None)), ChatRole::Assistant);
    }

    #[test]
    fn ai_only_prompt_never_offers_handoff_instruction() {
        assert!(system_prompt(false).contains("handing the conversation to a human"));
        assert!(!system_prompt(true).contains("handing the conversation"));
    }

    #[test]
    fn reply_prompt_keeps_last_eight_visible_messages_in_order() {
        let mut history: Vec<Message> = (1..=12)
            .map(|id| {
                let sender = if id % 2 == 0 { Sender::Ai } else { Sender::Customer(customer().id) };
                message(id, sender, &format!("m{id}"))
            })
            .collect();
        let mut note = message(13, Sender::System(Some(UserId("staff".into()))), "secret note");
        note.is_internal_note = true;
        history.push(note);

        let customer = customer();
        let messages = ReplyPrompt {
            customer: &customer,
            channel: "mobile",
            orders: &[],
            history: &history,
            input: "where is it?",
            ai_only_mode: false,
        }
        .into_messages();

        // system + identity + order context + history + input
        assert_eq!(messages.len(), 3 + REPLY_HISTORY_LIMIT + 1);
        assert_eq!(messages[1].content, "Customer name: Ada. Channel: mobile.");
        assert_eq!(messages[2].content, "Customer order context (JSON): []");
        assert_eq!(messages[3].content, "m5");
        assert_eq!(messages[3].role, ChatRole::User);
        assert_eq!(messages[10].content, "m12");
        assert!(messages.iter().all(|m| m.content != "secret note"));
        assert_eq!(messages.last().map(|m| m.content.as_str()), Some("where is it?"));
    }

    #[test]
    fn empty_model_output_becomes_generic_prompt() {
        assert_eq!(reply_or_generic("   "), GENERIC_ORDER_PROMPT);
        assert_eq!(reply_or_generic(" Sure! "), "Sure!");
    }

    #[test]
    fn fallback_summary_truncates_long_bodies() {
        let long = "x".repeat(300);
        let history = vec![
            message(1, Sender::Customer(customer().id), &long),
            message(2, Sender::Agent(UserId("staff".into())), "Looking into it"),
        ];

        let summary = fallback_summary(&conversation(), &history);

        assert!(summary.contains("Topic: General support"));
        assert!(summary.contains("Status: pending_agent"));
        assert!(summary.contains(&format!("Last customer message: {}...", "x".repeat(217))));
        assert!(summary.contains("Last agent message: Looking into it"));
    }

    #[test]
    fn fallback_summary_handles_empty_history() {
        let summary = fallback_summary(&conversation(), &[]);

        assert!(summary.contains("Last customer message: (none)"));
        assert!(summary.contains("Last agent message: (none)"));
    }
}
