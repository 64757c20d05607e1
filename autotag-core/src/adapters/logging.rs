//! `SecurityLog` adapter backed by `tracing`.
//!
//! Emits structured events on a fixed `autotag::security` target so
//! operators can route them independently of ordinary operational logs,
//! without the core depending on `tracing` at any seam but this one.

use crate::ports::{SecurityEvent, SecurityLog};

pub struct TracingSecurityLog;

impl SecurityLog for TracingSecurityLog {
    fn record(&self, event: &SecurityEvent) {
        tracing::warn!(
            target: "autotag::security",
            event_type = event.event_type,
            company_id = %event.company_id,
            rule_name = %event.rule_name,
            detail = %event.detail,
            "security event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn record_does_not_panic() {
        TracingSecurityLog.record(&SecurityEvent {
            event_type: "cel_compile_error",
            company_id: Uuid::new_v4(),
            rule_name: "test".to_string(),
            detail: json!("boom"),
        });
    }
}
