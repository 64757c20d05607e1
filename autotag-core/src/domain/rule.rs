//! Tagging rule domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// The processor family a rule dispatches to.
///
/// `Script` is the legacy alias for `Cel` (§4.3): both route to the same
/// sandboxed evaluator. Unknown strings round-trip as `Unknown` so storage
/// can hold forward-compatible rule types the engine simply skips (§7),
/// rather than failing to deserialize the row at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Simple,
    Conditional,
    Cel,
    Script,
    Ml,
    #[serde(other)]
    Unknown,
}

impl RuleType {
    /// Parse a `rule_type` string exactly as stored.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "simple" => RuleType::Simple,
            "conditional" => RuleType::Conditional,
            "cel" => RuleType::Cel,
            "script" => RuleType::Script,
            "ml" => RuleType::Ml,
            _ => RuleType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Simple => "simple",
            RuleType::Conditional => "conditional",
            RuleType::Cel => "cel",
            RuleType::Script => "script",
            RuleType::Ml => "ml",
            RuleType::Unknown => "unknown",
        }
    }
}

/// A named, prioritized, per-company unit of tagging logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggingRule {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub rule_type: RuleType,
    /// Lower numbers are evaluated first.
    pub priority: i32,
    /// Free-form JSON whose shape depends on `rule_type` (§4.1–§4.3, §4.6).
    pub rule_config: JsonValue,
    /// Optional guard tree, same grammar as the `conditional` processor's
    /// body (§4.2), evaluated as a single top-level clause before the rule
    /// body runs at all.
    pub conditions: Option<JsonValue>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaggingRule {
    pub fn new(
        id: Uuid,
        company_id: Uuid,
        name: impl Into<String>,
        rule_type: RuleType,
        priority: i32,
        rule_config: JsonValue,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            company_id,
            name: name.into(),
            rule_type,
            priority,
            rule_config,
            conditions: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_and_cel_are_distinct_variants_but_same_family() {
        assert_eq!(RuleType::parse("script"), RuleType::Script);
        assert_eq!(RuleType::parse("cel"), RuleType::Cel);
        assert_ne!(RuleType::Script, RuleType::Cel);
    }

    #[test]
    fn unknown_rule_types_round_trip_without_failing() {
        assert_eq!(RuleType::parse("quantum"), RuleType::Unknown);
    }
}
