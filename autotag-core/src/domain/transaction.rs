//! Transaction domain model
//!
//! The transaction itself is immutable for the engine (§3): it arrives from
//! an upstream system and is never mutated by tagging.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A single financial transaction the engine may tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub product_code: String,
    /// Fixed-point decimal rate, e.g. a fee or rebate rate associated with
    /// the transaction's product.
    pub produce_rate: Decimal,
    pub ledger_type: String,
    pub source: String,
    pub jurisdiction: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        id: Uuid,
        product_code: impl Into<String>,
        produce_rate: Decimal,
        ledger_type: impl Into<String>,
        source: impl Into<String>,
        jurisdiction: impl Into<String>,
    ) -> Self {
        Self {
            id,
            product_code: product_code.into(),
            produce_rate,
            ledger_type: ledger_type.into(),
            source: source.into(),
            jurisdiction: jurisdiction.into(),
            created_at: Utc::now(),
        }
    }

    /// Read one of the four transaction-field names the `simple` processor
    /// recognizes. Returns `None` for any other field name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "product_code" => Some(&self.product_code),
            "ledger_type" => Some(&self.ledger_type),
            "source" => Some(&self.source),
            "jurisdiction" => Some(&self.jurisdiction),
            _ => None,
        }
    }

    /// Broader reflective access used by the `conditional` processor and the
    /// CEL context (§4.2, §4.3): every attribute `field()` exposes, plus
    /// `id`, `produce_rate`, and `created_at`, each as a JSON value rather
    /// than a borrowed string.
    pub fn attribute(&self, name: &str) -> Option<JsonValue> {
        crate::conditions::transaction_attribute(self, name)
    }
}

/// Opaque per-transaction metadata supplied by upstream systems.
///
/// Absence (no row for a transaction) is treated as an empty object, never
/// as an error — every caller that resolves metadata does so through
/// [`ExternalMetadata::metadata_or_empty`] rather than unwrapping an
/// `Option` itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalMetadata {
    pub transaction_id: Uuid,
    pub metadata: JsonValue,
}

impl ExternalMetadata {
    /// Resolve metadata for a transaction, defaulting to `{}` when absent.
    pub fn metadata_or_empty(metadata: Option<&ExternalMetadata>) -> JsonValue {
        metadata
            .map(|m| m.metadata.clone())
            .unwrap_or_else(|| JsonValue::Object(Default::default()))
    }
}
