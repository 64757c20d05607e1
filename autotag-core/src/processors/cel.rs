//! The `cel` processor (§4.3), also reached via the legacy `script` rule
//! type (§9's `script` is an alias for `cel`, not a distinct language).
//!
//! Two config shapes (§4.3):
//! - single-expression: `{ "expression": "<cel>", "default_tag": "<str|null>" }`
//! - conditions: `{ "conditions": [ { "expression": "<cel>", "tag": "<str>" }, ... ], "default_tag": "<str|null>" }`
//!
//! `script` is a legacy alias for `expression` in single-expression mode,
//! unless it looks like imperative-language source (`def `/`return`), in
//! which case the processor refuses to evaluate and logs `legacy_python_script`.
//!
//! The transaction's six attributes, `metadata`, and `now` (current wall
//! clock as an ISO-8601 string) are bound into the CEL context. Programs
//! are compiled once per distinct expression text and cached (§9); a fresh
//! [`cel_interpreter::Context`] is built per call since CEL contexts borrow
//! their bound variables and cannot be reused across calls with different
//! transactions.

use std::collections::HashMap;
use std::sync::Mutex;

use cel_interpreter::objects::{Key as CelKey, Map as CelMap};
use cel_interpreter::{Context, Program, Value as CelValue};
use serde_json::Value as JsonValue;

use crate::domain::{TaggingRule, Transaction};
use crate::ports::{SecurityEvent, SecurityLog};

use super::{ProcessorOutcome, RuleProcessor};

/// Transaction attributes bound into every CEL evaluation context.
const TRANSACTION_FIELDS: &[&str] = &[
    "id",
    "product_code",
    "produce_rate",
    "ledger_type",
    "source",
    "jurisdiction",
    "created_at",
];

pub struct CelProcessor {
    compiled: Mutex<HashMap<String, Program>>,
}

impl CelProcessor {
    pub fn new() -> Self {
        Self {
            compiled: Mutex::new(HashMap::new()),
        }
    }

    fn is_legacy_script(text: &str) -> bool {
        text.contains("def ") || text.contains("return")
    }

    fn compiled_program(&self, text: &str) -> Result<Program, String> {
        let mut cache = self.compiled.lock().expect("cel program cache poisoned");
        if let Some(program) = cache.get(text) {
            return Ok(program.clone());
        }
        let program = Program::compile(text).map_err(|e| e.to_string())?;
        cache.insert(text.to_string(), program.clone());
        Ok(program)
    }

    fn build_context(transaction: &Transaction, metadata: &JsonValue) -> Option<Context<'static>> {
        let mut context = Context::default();
        let mut transaction_map = HashMap::new();
        for field in TRANSACTION_FIELDS {
            if let Some(value) = transaction.attribute(field) {
                transaction_map.insert(CelKey::String(std::sync::Arc::new(field.to_string())), json_to_cel(&value));
            }
        }
        let transaction_value = CelValue::Map(CelMap {
            map: std::sync::Arc::new(transaction_map),
        });

        context.add_variable("transaction", transaction_value).ok()?;
        context.add_variable("metadata", json_to_cel(metadata)).ok()?;
        context
            .add_variable("now", CelValue::String(std::sync::Arc::new(chrono::Utc::now().to_rfc3339())))
            .ok()?;
        Some(context)
    }

    /// Single-expression mode (§4.3): compile and evaluate; a non-empty
    /// string result is the tag, anything else (including an error) falls
    /// back to `default_tag`.
    fn evaluate_single(
        &self,
        rule: &TaggingRule,
        text: &str,
        context: &Context,
        default_tag: Option<String>,
        security_log: &dyn SecurityLog,
    ) -> ProcessorOutcome {
        let program = match self.compiled_program(text) {
            Ok(program) => program,
            Err(err) => {
                security_log.record(&SecurityEvent {
                    event_type: "cel_compile_error",
                    company_id: rule.company_id,
                    rule_name: rule.name.clone(),
                    detail: JsonValue::String(err),
                });
                return outcome_for_default(default_tag);
            }
        };

        match program.execute(context) {
            Ok(CelValue::String(tag)) if !tag.trim().is_empty() => ProcessorOutcome::tag(tag.to_string(), 1.0),
            Ok(_) => outcome_for_default(default_tag),
            Err(err) => {
                security_log.record(&SecurityEvent {
                    event_type: "cel_eval_error",
                    company_id: rule.company_id,
                    rule_name: rule.name.clone(),
                    detail: JsonValue::String(err.to_string()),
                });
                outcome_for_default(default_tag)
            }
        }
    }

    /// Conditions mode (§4.3): evaluate each `{expression, tag}` entry in
    /// order, skipping entries missing either field or whose expression
    /// fails to compile/evaluate; the first truthy match wins.
    fn evaluate_conditions(
        &self,
        rule: &TaggingRule,
        entries: &[JsonValue],
        context: &Context,
        default_tag: Option<String>,
        security_log: &dyn SecurityLog,
    ) -> ProcessorOutcome {
        for entry in entries {
            let (Some(expression), Some(tag)) = (
                entry.get("expression").and_then(JsonValue::as_str),
                entry.get("tag").and_then(JsonValue::as_str),
            ) else {
                continue;
            };

            let program = match self.compiled_program(expression) {
                Ok(program) => program,
                Err(err) => {
                    security_log.record(&SecurityEvent {
                        event_type: "cel_compile_error",
                        company_id: rule.company_id,
                        rule_name: rule.name.clone(),
                        detail: JsonValue::String(err),
                    });
                    continue;
                }
            };

            match program.execute(context) {
                Ok(value) if is_truthy(&value) => return ProcessorOutcome::tag(tag, 1.0),
                Ok(_) => continue,
                Err(err) => {
                    security_log.record(&SecurityEvent {
                        event_type: "cel_eval_error",
                        company_id: rule.company_id,
                        rule_name: rule.name.clone(),
                        detail: JsonValue::String(err.to_string()),
                    });
                    continue;
                }
            }
        }

        outcome_for_default(default_tag)
    }
}

impl Default for CelProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleProcessor for CelProcessor {
    fn process(
        &self,
        rule: &TaggingRule,
        transaction: &Transaction,
        metadata: &JsonValue,
        security_log: &dyn SecurityLog,
    ) -> ProcessorOutcome {
        let default_tag = rule
            .rule_config
            .get("default_tag")
            .and_then(JsonValue::as_str)
            .map(str::to_string);

        let Some(context) = Self::build_context(transaction, metadata) else {
            return outcome_for_default(default_tag);
        };

        if let Some(entries) = rule.rule_config.get("conditions").and_then(JsonValue::as_array) {
            return self.evaluate_conditions(rule, entries, &context, default_tag, security_log);
        }

        if let Some(expr) = rule.rule_config.get("expression").and_then(JsonValue::as_str) {
            return self.evaluate_single(rule, expr, &context, default_tag, security_log);
        }

        if let Some(script) = rule.rule_config.get("script").and_then(JsonValue::as_str) {
            if Self::is_legacy_script(script) {
                security_log.record(&SecurityEvent {
                    event_type: "legacy_python_script",
                    company_id: rule.company_id,
                    rule_name: rule.name.clone(),
                    detail: JsonValue::String(script.to_string()),
                });
                return ProcessorOutcome::none();
            }
            return self.evaluate_single(rule, script, &context, default_tag, security_log);
        }

        outcome_for_default(default_tag)
    }
}

fn outcome_for_default(default_tag: Option<String>) -> ProcessorOutcome {
    match default_tag {
        Some(tag) => ProcessorOutcome::tag(tag, 1.0),
        None => ProcessorOutcome::none(),
    }
}

/// CEL truthiness for the `conditions` mode's match test, mirroring Python's
/// `if result_value:` in the original implementation: booleans as
/// themselves, numbers non-zero, strings/lists/maps non-empty, null false.
fn is_truthy(value: &CelValue) -> bool {
    match value {
        CelValue::Bool(b) => *b,
        CelValue::Int(i) => *i != 0,
        CelValue::UInt(u) => *u != 0,
        CelValue::Float(f) => *f != 0.0,
        CelValue::String(s) => !s.is_empty(),
        CelValue::Bytes(b) => !b.is_empty(),
        CelValue::List(l) => !l.is_empty(),
        CelValue::Map(m) => !m.map.is_empty(),
        CelValue::Null => false,
        _ => false,
    }
}

/// Explicit, auditable JSON -> CEL value conversion (§4.3: "no host
/// escape"). There is deliberately no generic `From` impl: every path a
/// JSON value can take into the sandbox is visible here.
fn json_to_cel(value: &JsonValue) -> CelValue {
    match value {
        JsonValue::Null => CelValue::Null,
        JsonValue::Bool(b) => CelValue::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CelValue::Int(i)
            } else {
                CelValue::Float(n.as_f64().unwrap_or_default())
            }
        }
        JsonValue::String(s) => CelValue::String(std::sync::Arc::new(s.clone())),
        JsonValue::Array(items) => {
            CelValue::List(std::sync::Arc::new(items.iter().map(json_to_cel).collect()))
        }
        JsonValue::Object(entries) => {
            let mut map = HashMap::new();
            for (k, v) in entries {
                map.insert(CelKey::String(std::sync::Arc::new(k.clone())), json_to_cel(v));
            }
            CelValue::Map(CelMap {
                map: std::sync::Arc::new(map),
            })
        }
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
        fn record(&self, _event: &SecurityEvent) {}
    }

    struct RecordingSecurityLog(Mutex<Vec<String>>);
    impl SecurityLog for RecordingSecurityLog {
        fn record(&self, event: &SecurityEvent) {
            self.0.lock().unwrap().push(event.event_type.to_string());
        }
    }

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
            "cel rule",
            crate::domain::RuleType::Cel,
            100,
            rule_config,
        )
    }

    #[test]
    fn ternary_expression_produces_tag() {
        let r = rule(json!({
            "expression": "transaction.source == \"online\" ? \"ONLINE\" : null"
        }));
        let outcome = CelProcessor::new().process(&r, &txn(), &json!({}), &NullSecurityLog);
        assert_eq!(outcome.tag_code, Some("ONLINE".to_string()));
    }

    #[test]
    fn null_result_means_no_tag() {
        let r = rule(json!({"expression": "transaction.source == \"pos\" ? \"POS\" : null"}));
        let outcome = CelProcessor::new().process(&r, &txn(), &json!({}), &NullSecurityLog);
        assert_eq!(outcome.tag_code, None);
    }

    #[test]
    fn legacy_python_script_is_rejected_and_reported() {
        let r = rule(json!({"script": "def tag(tx):\n    return 'X'"}));
        let log = RecordingSecurityLog(Mutex::new(Vec::new()));
        let outcome = CelProcessor::new().process(&r, &txn(), &json!({}), &log);
        assert_eq!(outcome.tag_code, None);
        assert_eq!(log.0.lock().unwrap().as_slice(), ["legacy_python_script"]);
    }

    #[test]
    fn compile_error_is_reported_and_yields_no_tag() {
        let r = rule(json!({"expression": "transaction.source ==="}));
        let log = RecordingSecurityLog(Mutex::new(Vec::new()));
        let outcome = CelProcessor::new().process(&r, &txn(), &json!({}), &log);
        assert_eq!(outcome.tag_code, None);
        assert_eq!(log.0.lock().unwrap().as_slice(), ["cel_compile_error"]);
    }

    #[test]
    fn metadata_fields_are_readable_from_cel() {
        let r = rule(json!({"expression": "metadata.tier == \"gold\" ? \"GOLD\" : null"}));
        let outcome = CelProcessor::new().process(&r, &txn(), &json!({"tier": "gold"}), &NullSecurityLog);
        assert_eq!(outcome.tag_code, Some("GOLD".to_string()));
    }
}
