use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::conversation::{AgentKind, ConversationStatus};
use crate::flows::states::{FlowContext, FlowEvent, TransitionOutcome};

pub trait FlowDefinition {
    /// Status a new conversation starts in for the resolved agent.
    fn initial_state(&self, agent: AgentKind) -> ConversationStatus;
    fn transition(
        &self,
        current: &ConversationStatus,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Support conversation lifecycle shared by AI and human agents.
#[derive(Clone, Debug, Default)]
pub struct SupportFlow;

impl FlowDefinition for SupportFlow {
    fn initial_state(&self, agent: AgentKind) -> ConversationStatus {
        match agent {
            AgentKind::Human => ConversationStatus::PendingAgent,
            AgentKind::Ai => ConversationStatus::Open,
        }
    }

    fn transition(
        &self,
        current: &ConversationStatus,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_support(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn apply(
        &self,
        current: &ConversationStatus,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &ConversationStatus,
        event: &FlowEvent,
        context: &FlowContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "flow.transition_applied",
                        AuditCategory::Flow,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", outcome.from.as_str())
                    .with_metadata("to", outcome.to.as_str())
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "flow.transition_rejected",
                        AuditCategory::Flow,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<SupportFlow> {
    fn default() -> Self {
        Self::new(SupportFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("human hand-off is disabled while AI-only mode is on (state {state:?})")]
    HandoffDisabled { state: ConversationStatus },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: ConversationStatus, event: FlowEvent },
}

fn transition_support(
    current: &ConversationStatus,
    event: &FlowEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use ConversationStatus::{Closed, Open, PendingAgent, PendingCustomer, Resolved};

    if *current == Closed {
        return Err(FlowTransitionError::InvalidTransition { state: *current, event: *event });
    }

    let to = match event {
        FlowEvent::CustomerMessageReceived => match context.active_agent {
            AgentKind::Human => PendingAgent,
            AgentKind::Ai => Open,
        },
        FlowEvent::HumanRequested | FlowEvent::HandoffRequested if context.ai_only_mode => {
            return Err(FlowTransitionError::HandoffDisabled { state: *current });
        }
        FlowEvent::HumanRequested | FlowEvent::HandoffRequested => PendingAgent,
        FlowEvent::AiTakeover => Open,
        FlowEvent::AgentReplied => PendingCustomer,
        FlowEvent::Resolved => Resolved,
    };

    Ok(TransitionOutcome { from: *current, to, event: *event })
}
