//! Rule processors - the four families a `TaggingRule` can dispatch to
//! (§4.1-§4.3): `simple`, `conditional`, `cel` (aliased `script`), and `ml`.

mod cel;
mod conditional;
mod ml;
mod simple;

pub use cel::CelProcessor;
pub use conditional::ConditionalProcessor;
pub use ml::MlProcessor;
pub use simple::SimpleProcessor;

use serde_json::Value as JsonValue;

use crate::domain::{RuleType, TaggingRule, Transaction};
use crate::ports::SecurityLog;

/// The outcome of running one rule's processor against one transaction.
#[derive(Debug, Clone)]
pub struct ProcessorOutcome {
    pub tag_code: Option<String>,
    pub confidence: f64,
}

impl ProcessorOutcome {
    pub fn none() -> Self {
        Self {
            tag_code: None,
            confidence: 0.0,
        }
    }

    pub fn tag(code: impl Into<String>, confidence: f64) -> Self {
        Self {
            tag_code: Some(code.into()),
            confidence,
        }
    }
}

/// A processor evaluates one rule's `rule_config` against one transaction
/// and its metadata, producing at most one tag. A processor never fails the
/// caller's transaction or batch (§7): any internal error is swallowed and
/// reported as `ProcessorOutcome::none()`, with detail (if any) reported
/// through the `SecurityLog` port by the processor itself.
pub trait RuleProcessor {
    fn process(
        &self,
        rule: &TaggingRule,
        transaction: &Transaction,
        metadata: &JsonValue,
        security_log: &dyn SecurityLog,
    ) -> ProcessorOutcome;
}

/// One instance of each processor family, built once per engine and reused
/// across every rule evaluation (§9: "processor instances are stateless
/// apart from the CEL environment and expression cache... share one
/// instance per process"). Sharing the `CelProcessor` specifically is what
/// makes its compiled-expression cache (§9) actually amortize across calls;
/// a fresh processor per rule evaluation would defeat it.
pub struct ProcessorRegistry {
    simple: SimpleProcessor,
    conditional: ConditionalProcessor,
    cel: CelProcessor,
    ml: MlProcessor,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            simple: SimpleProcessor,
            conditional: ConditionalProcessor,
            cel: CelProcessor::new(),
            ml: MlProcessor,
        }
    }

    /// Look up the processor for a rule's type. `Script` aliases `Cel`
    /// (§4.3). Any `Unknown` rule type has no processor and is skipped
    /// entirely by the engine (§7); `Ml` has a processor (always a no-op)
    /// so unit tests and the `test-rule` CLI command can exercise it
    /// directly even though it never wins arbitration.
    pub fn processor_for(&self, rule_type: &RuleType) -> Option<&dyn RuleProcessor> {
        match rule_type {
            RuleType::Simple => Some(&self.simple),
            RuleType::Conditional => Some(&self.conditional),
            RuleType::Cel | RuleType::Script => Some(&self.cel),
            RuleType::Ml => Some(&self.ml),
            RuleType::Unknown => None,
        }
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
