use thiserror::Error;

use crate::flows::FlowTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("conversation {0} not found")]
    ConversationNotFound(i64),
    #[error("conversation {conversation_id} does not belong to customer {customer_id}")]
    ConversationOwnership { conversation_id: i64, customer_id: String },
    /// Customer wrote into a resolved thread while a newer one is active.
    #[error("conversation {conversation_id} was superseded by active conversation {active_id}")]
    ConversationSuperseded { conversation_id: i64, active_id: i64 },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use crate::domain::conversation::ConversationStatus;
    use crate::errors::{ApplicationError, DomainError};
    use crate::flows::FlowTransitionError;

    #[test]
    fn flow_errors_convert_into_domain_errors() {
        let error: DomainError =
            FlowTransitionError::HandoffDisabled { state: ConversationStatus::Open }.into();

        assert!(matches!(error, DomainError::FlowTransition(_)));
        assert!(error.to_string().contains("AI-only mode"));
    }

    #[test]
    fn superseded_conversation_names_the_active_thread() {
        let error = ApplicationError::from(DomainError::ConversationSuperseded {
            conversation_id: 1,
            active_id: 2,
        });

        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::ConversationSuperseded { active_id: 2, .. })
        ));
        assert_eq!(error.to_string(), "conversation 1 was superseded by active conversation 2");
    }
}
