//! SecurityLog port - the dedicated sink for security-relevant engine events
//! (§6, §7): CEL compile/evaluation failures and legacy-script rejections.
//!
//! Kept as a port rather than a direct `tracing` dependency in the
//! processors so the engine's dependency is on an interface, not a logging
//! framework (SPEC_FULL.md §6).

use serde_json::Value as JsonValue;

/// A single security-relevant event raised by a processor.
#[derive(Debug, Clone)]
pub struct SecurityEvent {
    pub event_type: &'static str,
    pub company_id: uuid::Uuid,
    pub rule_name: String,
    pub detail: JsonValue,
}

pub trait SecurityLog: Send + Sync {
    fn record(&self, event: &SecurityEvent);
}
