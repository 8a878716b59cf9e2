//! Support conversation runtime.
//!
//! The orchestrator decides who answers a customer (rule engine, AI model or a
//! human agent), keeps the conversation state machine in step and fans out
//! realtime events and staff notifications.
//!
//! The model is only ever a writer of reply text. Hand-off decisions, order
//! lookups and conversation state are deterministic.

pub mod llm;
pub mod notify;
pub mod orchestrator;
pub mod prompt;
pub mod rate_limit;
pub mod translation;

pub use llm::{ChatClient, ChatMessage, ChatRole, DeepSeekChatClient, LlmError};
pub use notify::{
    InMemoryBroadcaster, InMemoryNotifier, MessageBroadcast, NoopBroadcaster, NoopNotifier,
    NotifyError, RealtimeBroadcaster, SupportNotification, SupportNotifier,
};
pub use orchestrator::{
    Attachment, AttachmentKind, StartedConversation, SupportOrchestrator, SupportReply,
    SupportRepositories,
};
pub use rate_limit::SlidingWindowLimiter;
pub use translation::{looks_untranslated, translate_field, LlmTranslator, Translator};
