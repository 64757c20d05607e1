//! The `conditional` processor (§4.2): an ordered list of condition trees,
//! each carrying the tag it produces when true. `rule_config` is shaped as:
//! ```json
//! { "conditions": [ { "field": "...", "operator": "...", "value": ..., "tag": "..." }, ... ] }
//! ```
//! where each entry is either a leaf clause or a compound clause (nested
//! under a `conditions` array), parsed by [`crate::conditions::TaggedClause`].
//! Entries are evaluated in order; the first whose clause is true wins.
//! This is the same evaluator the engine's per-rule `conditions` guard uses
//! (§4.4 step 4a) — both read through [`crate::conditions`].

use serde_json::Value as JsonValue;

use crate::conditions::TaggedClause;
use crate::domain::{TaggingRule, Transaction};
use crate::ports::SecurityLog;

use super::{ProcessorOutcome, RuleProcessor};

pub struct ConditionalProcessor;

impl RuleProcessor for ConditionalProcessor {
    fn process(
        &self,
        rule: &TaggingRule,
        transaction: &Transaction,
        metadata: &JsonValue,
        _security_log: &dyn SecurityLog,
    ) -> ProcessorOutcome {
        let Some(clauses) = rule.rule_config.get("conditions").and_then(JsonValue::as_array) else {
            return ProcessorOutcome::none();
        };

        for clause in clauses {
            let tagged = TaggedClause::parse(clause);
            if tagged.node.evaluate(transaction, metadata) {
                if let Some(tag) = tagged.tag {
                    return ProcessorOutcome::tag(tag, 1.0);
                }
            }
        }

        ProcessorOutcome::none()
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

    struct NullSecurityLog;
    impl SecurityLog for NullSecurityLog {
        fn record(&self, _event: &crate::ports::SecurityEvent) {}
    }

    fn rule(rule_config: JsonValue) -> TaggingRule {
        TaggingRule::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "conditional rule",
            crate::domain::RuleType::Conditional,
            100,
            rule_config,
        )
    }

    #[test]
    fn first_matching_clause_wins() {
        let r = rule(json!({"conditions": [
            {"field": "source", "operator": "equals", "value": "pos", "tag": "NOT_IT"},
            {"field": "source", "operator": "equals", "value": "online", "tag": "IT"}
        ]}));
        let outcome = ConditionalProcessor.process(&r, &txn(), &json!({}), &NullSecurityLog);
        assert_eq!(outcome.tag_code, Some("IT".to_string()));
    }

    #[test]
    fn nested_compound_clause_evaluates() {
        let r = rule(json!({"conditions": [
            {
                "conditions": [
                    {"field": "source", "operator": "equals", "value": "online"},
                    {"field": "metadata.amount", "operator": "greater_than", "value": 500}
                ],
                "operator": "and",
                "tag": "BIG_ONLINE"
            }
        ]}));
        let outcome = ConditionalProcessor.process(&r, &txn(), &json!({"amount": 800}), &NullSecurityLog);
        assert_eq!(outcome.tag_code, Some("BIG_ONLINE".to_string()));
    }

    #[test]
    fn no_clause_matches_returns_none() {
        let r = rule(json!({"conditions": [
            {"field": "source", "operator": "equals", "value": "pos", "tag": "X"}
        ]}));
        let outcome = ConditionalProcessor.process(&r, &txn(), &json!({}), &NullSecurityLog);
        assert_eq!(outcome.tag_code, None);
    }
}
