//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod rules;
pub mod tagging;

pub use rules::{ImportResult, RuleEnvelope, RuleEnvelopeEntry, RuleLifecycleService};
pub use tagging::{TaggingService, TaggingStats};
