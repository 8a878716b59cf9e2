pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod lease;
pub mod pricing;
pub mod support;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use config::{AppConfig, SupportSettings};
pub use errors::{ApplicationError, DomainError};
pub use flows::{FlowEngine, FlowEvent, SupportFlow};
