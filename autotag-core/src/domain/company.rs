//! Company (tenant) domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A tenant that owns a set of tagging rules and sees its own tags on every
/// transaction. `code` is the stable external handle (`(company, name)` and
/// `(transaction, company)` uniqueness elsewhere in the model are both keyed
/// off this tenant, not off `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    /// Globally unique short handle, e.g. "ACME".
    pub code: String,
    pub name: String,
    /// Optional JSON Schema describing the shape of this company's
    /// per-transaction metadata. Informational unless a caller opts into
    /// `RuleLifecycleService::validate_metadata`.
    pub metadata_schema: Option<JsonValue>,
    /// Inactive companies are invisible to the engine: `tag_one`/`tag_many`
    /// treat them as if they did not exist.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    pub fn new(id: Uuid, code: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            code: code.into(),
            name: name.into(),
            metadata_schema: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
