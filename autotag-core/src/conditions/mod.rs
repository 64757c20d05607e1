//! The boolean condition DSL shared by the `conditional` processor (§4.2)
//! and the per-rule `conditions` guard evaluated by the engine (§4.4 step
//! 4a). Parsing happens once, at rule load, into a [`Node`] tree; evaluation
//! is then a straightforward recursion (§9's design note), with no
//! re-parsing of JSON on the hot path.

use rust_decimal::prelude::ToPrimitive;
use serde_json::Value as JsonValue;

use crate::domain::Transaction;

/// A leaf comparison operator. Any operator string this crate does not
/// recognize parses to `Unknown`, which always evaluates to `false` (§4.2:
/// "Any unknown operator ⇒ false").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    Regex,
    Unknown,
}

impl Operator {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("equals") => Operator::Equals,
            Some("not_equals") => Operator::NotEquals,
            Some("greater_than") => Operator::GreaterThan,
            Some("less_than") => Operator::LessThan,
            Some("contains") => Operator::Contains,
            Some("regex") => Operator::Regex,
            _ => Operator::Unknown,
        }
    }
}

/// A compound boolean combinator. Present-but-unrecognized combinators
/// parse to `Never` (§4.2: "any other compound operator ⇒ false"); an
/// absent `operator` key defaults to `And`, matching the original
/// implementation's `condition.get('operator', 'and')`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Never,
}

impl LogicalOp {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => LogicalOp::And,
            Some("and") => LogicalOp::And,
            Some("or") => LogicalOp::Or,
            Some(_) => LogicalOp::Never,
        }
    }
}

/// A parsed node of the condition tree.
#[derive(Debug, Clone)]
pub enum Node {
    Leaf {
        field: String,
        operator: Operator,
        value: JsonValue,
    },
    Compound {
        operator: LogicalOp,
        children: Vec<Node>,
    },
}

impl Node {
    /// Parse a single clause object. A compound clause is recognized by the
    /// presence of a `conditions` array; anything else is parsed as a leaf,
    /// with missing `field`/`operator` defaulting to values that always
    /// evaluate to `false` rather than panicking on malformed input.
    pub fn parse(value: &JsonValue) -> Node {
        if let Some(children) = value.get("conditions").and_then(JsonValue::as_array) {
            Node::Compound {
                operator: LogicalOp::parse(value.get("operator").and_then(JsonValue::as_str)),
                children: children.iter().map(Node::parse).collect(),
            }
        } else {
            Node::Leaf {
                field: value
                    .get("field")
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .to_string(),
                operator: Operator::parse(value.get("operator").and_then(JsonValue::as_str)),
                value: value.get("value").cloned().unwrap_or(JsonValue::Null),
            }
        }
    }

    /// Evaluate this node against a transaction and its metadata.
    pub fn evaluate(&self, transaction: &Transaction, metadata: &JsonValue) -> bool {
        match self {
            Node::Leaf {
                field,
                operator,
                value,
            } => {
                let actual = resolve_field(field, transaction, metadata);
                evaluate_leaf(&actual, *operator, value)
            }
            Node::Compound { operator, children } => match operator {
                LogicalOp::And => children.iter().all(|c| c.evaluate(transaction, metadata)),
                LogicalOp::Or => children.iter().any(|c| c.evaluate(transaction, metadata)),
                LogicalOp::Never => false,
            },
        }
    }
}

/// A top-level clause paired with the tag it produces when true. Only
/// top-level clauses carry a `tag` — clauses nested inside a `conditions`
/// array omit it (§4.2).
#[derive(Debug, Clone)]
pub struct TaggedClause {
    pub node: Node,
    pub tag: Option<String>,
}

impl TaggedClause {
    pub fn parse(value: &JsonValue) -> TaggedClause {
        TaggedClause {
            node: Node::parse(value),
            tag: value
                .get("tag")
                .and_then(JsonValue::as_str)
                .map(str::to_string),
        }
    }
}

/// The resolved value of a field path: either present (a JSON value) or
/// absent. Absent is a distinct sentinel, not an empty string or `null`
/// (§9's design note): it compares unequal to everything under `equals`,
/// never satisfies a relational operator, and stringifies to `""`.
enum Actual<'a> {
    Present(std::borrow::Cow<'a, JsonValue>),
    Absent,
}

/// `metadata.<name>` reads from metadata; any other path reads the named
/// transaction attribute (§4.2). This covers the same six attributes the
/// CEL processor binds (§4.3), so both DSLs see one consistent view of a
/// transaction.
fn resolve_field<'a>(field: &str, transaction: &Transaction, metadata: &'a JsonValue) -> Actual<'a> {
    if let Some(name) = field.strip_prefix("metadata.") {
        match metadata.get(name) {
            Some(v) => Actual::Present(std::borrow::Cow::Borrowed(v)),
            None => Actual::Absent,
        }
    } else {
        match transaction_attribute(transaction, field) {
            Some(v) => Actual::Present(std::borrow::Cow::Owned(v)),
            None => Actual::Absent,
        }
    }
}

/// Reflective access to the transaction's attributes, by name.
pub fn transaction_attribute(transaction: &Transaction, name: &str) -> Option<JsonValue> {
    match name {
        "id" => Some(JsonValue::String(transaction.id.to_string())),
        "product_code" => Some(JsonValue::String(transaction.product_code.clone())),
        "produce_rate" => transaction
            .produce_rate
            .to_f64()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number),
        "ledger_type" => Some(JsonValue::String(transaction.ledger_type.clone())),
        "source" => Some(JsonValue::String(transaction.source.clone())),
        "jurisdiction" => Some(JsonValue::String(transaction.jurisdiction.clone())),
        "created_at" => Some(JsonValue::String(transaction.created_at.to_rfc3339())),
        _ => None,
    }
}

/// Stringify a JSON value the way the `simple` and `conditional` processors
/// both do: `null` -> "None", booleans -> "True"/"False", numbers via their
/// canonical decimal text, strings verbatim (§4.1).
pub fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "None".to_string(),
        JsonValue::Bool(true) => "True".to_string(),
        JsonValue::Bool(false) => "False".to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn stringify_actual(actual: &Actual) -> String {
    match actual {
        Actual::Absent => String::new(),
        Actual::Present(v) => stringify(v),
    }
}

fn to_f64(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn evaluate_leaf(actual: &Actual, operator: Operator, expected: &JsonValue) -> bool {
    match operator {
        Operator::Unknown => false,
        Operator::Equals => match actual {
            Actual::Absent => false,
            Actual::Present(v) => v.as_ref() == expected,
        },
        Operator::NotEquals => match actual {
            Actual::Absent => true,
            Actual::Present(v) => v.as_ref() != expected,
        },
        Operator::GreaterThan | Operator::LessThan => {
            let Actual::Present(actual_value) = actual else {
                return false;
            };
            let is_greater = operator == Operator::GreaterThan;
            match (to_f64(actual_value), to_f64(expected)) {
                (Some(a), Some(e)) => {
                    if is_greater {
                        a > e
                    } else {
                        a < e
                    }
                }
                _ => {
                    let a_s = stringify(actual_value);
                    let e_s = stringify(expected);
                    if is_greater {
                        a_s > e_s
                    } else {
                        a_s < e_s
                    }
                }
            }
        }
        Operator::Contains => {
            let actual_s = stringify_actual(actual);
            let expected_s = stringify(expected);
            actual_s.contains(&expected_s)
        }
        Operator::Regex => {
            let actual_s = stringify_actual(actual);
            let pattern = stringify(expected);
            regex::Regex::new(&pattern)
                .map(|re| re.is_match(&actual_s))
                .unwrap_or(false)
        }
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

    #[test]
    fn equals_matches_on_transaction_field() {
        let node = Node::parse(&json!({"field": "source", "operator": "equals", "value": "online"}));
        assert!(node.evaluate(&txn(), &json!({})));
    }

    #[test]
    fn absent_field_fails_equals_and_relational_but_not_not_equals() {
        let tx = txn();
        let meta = json!({});
        assert!(!Node::parse(&json!({"field": "metadata.tier", "operator": "equals", "value": "gold"})).evaluate(&tx, &meta));
        assert!(Node::parse(&json!({"field": "metadata.tier", "operator": "not_equals", "value": "gold"})).evaluate(&tx, &meta));
        assert!(!Node::parse(&json!({"field": "metadata.amount", "operator": "greater_than", "value": 5})).evaluate(&tx, &meta));
    }

    #[test]
    fn numeric_fallback_to_lexicographic_compare_is_surprising_by_design() {
        // "10" < "2" lexicographically, even though 10 > 2 numerically,
        // because both sides here fail float coercion (non-numeric strings).
        let node = Node::parse(&json!({"field": "metadata.v", "operator": "less_than", "value": "2x"}));
        assert!(node.evaluate(&txn(), &json!({"v": "10x"})));
    }

    #[test]
    fn numeric_comparison_preferred_when_both_sides_coerce() {
        let node = Node::parse(&json!({"field": "metadata.amount", "operator": "greater_than", "value": 500}));
        assert!(node.evaluate(&txn(), &json!({"amount": 800})));
        assert!(!node.evaluate(&txn(), &json!({"amount": 100})));
    }

    #[test]
    fn unknown_operator_is_always_false() {
        let node = Node::parse(&json!({"field": "source", "operator": "exists", "value": null}));
        assert!(!node.evaluate(&txn(), &json!({})));
    }

    #[test]
    fn nested_and_or_combine_as_expected() {
        let node = Node::parse(&json!({
            "conditions": [
                {"field": "source", "operator": "equals", "value": "online"},
                {"field": "metadata.amount", "operator": "greater_than", "value": 500}
            ],
            "operator": "and"
        }));
        assert!(node.evaluate(&txn(), &json!({"amount": 800})));
        assert!(!node.evaluate(&txn(), &json!({"amount": 100})));
    }

    #[test]
    fn compound_defaults_to_and_when_operator_missing() {
        let node = Node::parse(&json!({
            "conditions": [
                {"field": "source", "operator": "equals", "value": "online"},
                {"field": "ledger_type", "operator": "equals", "value": "debit"}
            ]
        }));
        assert!(node.evaluate(&txn(), &json!({})));
    }

    #[test]
    fn compound_unrecognized_operator_is_always_false() {
        let node = Node::parse(&json!({
            "conditions": [{"field": "source", "operator": "equals", "value": "online"}],
            "operator": "xor"
        }));
        assert!(!node.evaluate(&txn(), &json!({})));
    }

    #[test]
    fn contains_tests_substring_of_stringified_operands() {
        let node = Node::parse(&json!({"field": "metadata.category", "operator": "contains", "value": "premium"}));
        assert!(node.evaluate(&txn(), &json!({"category": "premium-plus"})));
        assert!(!node.evaluate(&txn(), &json!({"category": "basic"})));
    }

    #[test]
    fn regex_partial_matches_stringified_actual() {
        let node = Node::parse(&json!({"field": "product_code", "operator": "regex", "value": "^PROD_0\\d+$"}));
        assert!(node.evaluate(&txn(), &json!({})));
    }

    #[test]
    fn tagged_clause_extracts_tag_alongside_node() {
        let clause = TaggedClause::parse(&json!({"field": "source", "operator": "equals", "value": "online", "tag": "ONLINE"}));
        assert_eq!(clause.tag.as_deref(), Some("ONLINE"));
        assert!(clause.node.evaluate(&txn(), &json!({})));
    }
}
