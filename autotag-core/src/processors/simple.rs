//! The `simple` processor (§4.1): a direct field -> value -> tag mapping.
//!
//! `rule_config` is shaped as:
//! ```json
//! { "mappings": { "<field>": { "<stringified value>": "<tag>" } } }
//! ```
//! `<field>` is either one of the four transaction fields recognized by
//! [`Transaction::field`], checked by bare name, or any other name, read
//! directly off metadata under that same bare name (no `metadata.` prefix
//! here — unlike the `conditional` processor and the per-rule guard, the
//! `simple` processor's mapping keys are never prefixed). Fields are
//! checked in the order serde_json preserves them in, but transaction
//! fields are always checked before metadata fields regardless of their
//! position in the mapping (§9's design note on precedence). The first
//! field whose stringified actual value has an entry in its map wins.

use serde_json::Value as JsonValue;

use crate::conditions::stringify;
use crate::domain::{TaggingRule, Transaction};
use crate::ports::SecurityLog;

use super::{ProcessorOutcome, RuleProcessor};

pub struct SimpleProcessor;

impl RuleProcessor for SimpleProcessor {
    fn process(
        &self,
        rule: &TaggingRule,
        transaction: &Transaction,
        metadata: &JsonValue,
        _security_log: &dyn SecurityLog,
    ) -> ProcessorOutcome {
        let Some(mappings) = rule
            .rule_config
            .get("mappings")
            .and_then(JsonValue::as_object)
        else {
            return ProcessorOutcome::none();
        };

        let mut transaction_fields = Vec::new();
        let mut metadata_fields = Vec::new();
        for (field, value_map) in mappings.iter() {
            if transaction.field(field).is_some() {
                transaction_fields.push((field, value_map));
            } else {
                metadata_fields.push((field, value_map));
            }
        }

        for (field, value_map) in transaction_fields.into_iter().chain(metadata_fields) {
            if let Some(outcome) = self.match_field(transaction, metadata, field, value_map) {
                return outcome;
            }
        }

        ProcessorOutcome::none()
    }
}

impl SimpleProcessor {
    fn match_field(
        &self,
        transaction: &Transaction,
        metadata: &JsonValue,
        field: &str,
        value_map: &JsonValue,
    ) -> Option<ProcessorOutcome> {
        let value_map = value_map.as_object()?;

        let actual = match transaction.field(field) {
            Some(s) => JsonValue::String(s.to_string()),
            None => metadata.get(field).cloned()?,
        };

        let key = stringify(&actual);
        value_map
            .get(&key)
            .and_then(JsonValue::as_str)
            .map(|tag| ProcessorOutcome::tag(tag, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use uuid::Uuid;

    fn txn() -> Transaction {
        Transaction::new(
            Uuid::new_v4(),
            "PROD_001",
            Decimal::new(150, 2),
            "debit",
            "online",
            "us",
        )
    }

    fn rule(rule_config: JsonValue) -> TaggingRule {
        TaggingRule::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "simple rule",
            crate::domain::RuleType::Simple,
            100,
            rule_config,
        )
    }

    struct NullSecurityLog;
    impl SecurityLog for NullSecurityLog {
        fn record(&self, _event: &crate::ports::SecurityEvent) {}
    }

    #[test]
    fn matches_transaction_field_mapping() {
        let r = rule(json!({"mappings": {"product_code": {"PROD_001": "WIDGET"}}}));
        let outcome = SimpleProcessor.process(&r, &txn(), &json!({}), &NullSecurityLog);
        assert_eq!(outcome.tag_code, Some("WIDGET".to_string()));
        assert_eq!(outcome.confidence, 1.0);
    }

    #[test]
    fn transaction_fields_take_precedence_over_metadata() {
        let r = rule(json!({
            "mappings": {
                "category": {"debit": "WRONG"},
                "ledger_type": {"debit": "RIGHT"}
            }
        }));
        let outcome = SimpleProcessor.process(&r, &txn(), &json!({"category": "debit"}), &NullSecurityLog);
        assert_eq!(outcome.tag_code, Some("RIGHT".to_string()));
    }

    #[test]
    fn no_match_returns_none() {
        let r = rule(json!({"mappings": {"product_code": {"PROD_999": "WIDGET"}}}));
        let outcome = SimpleProcessor.process(&r, &txn(), &json!({}), &NullSecurityLog);
        assert_eq!(outcome.tag_code, None);
    }

    #[test]
    fn metadata_field_matches_by_bare_name_when_no_transaction_field_matches() {
        let r = rule(json!({"mappings": {"category": {"premium": "GOLD"}}}));
        let outcome = SimpleProcessor.process(&r, &txn(), &json!({"category": "premium"}), &NullSecurityLog);
        assert_eq!(outcome.tag_code, Some("GOLD".to_string()));
    }
}
