//! The `ml` processor (§2, §4 Non-goals): a placeholder for a future
//! machine-learning tagger. Model training and inference are explicitly out
//! of scope; this processor always returns no tag so that rules of this
//! type are accepted by validation and dispatched by the engine without
//! special-casing, but never influence arbitration.

use serde_json::Value as JsonValue;

use crate::domain::{TaggingRule, Transaction};
use crate::ports::SecurityLog;

use super::{ProcessorOutcome, RuleProcessor};

pub struct MlProcessor;

impl RuleProcessor for MlProcessor {
    fn process(
        &self,
        _rule: &TaggingRule,
        _transaction: &Transaction,
        _metadata: &JsonValue,
        _security_log: &dyn SecurityLog,
    ) -> ProcessorOutcome {
        ProcessorOutcome::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use uuid::Uuid;

    struct NullSecurityLog;
    impl SecurityLog for NullSecurityLog {
        fn record(&self, _event: &crate::ports::SecurityEvent) {}
    }

    #[test]
    fn always_returns_no_tag() {
        let tx = Transaction::new(
            Uuid::new_v4(),
            "PROD_001",
            Decimal::new(150, 2),
            "debit",
            "online",
            "us",
        );
        let r = TaggingRule::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "ml rule",
            crate::domain::RuleType::Ml,
            100,
            json!({}),
        );
        let outcome = MlProcessor.process(&r, &tx, &json!({}), &NullSecurityLog);
        assert_eq!(outcome.tag_code, None);
    }
}
