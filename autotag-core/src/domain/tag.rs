//! Transaction tag domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The engine's verdict for one (transaction, company) pair. At most one
/// row exists per pair (§3); re-tagging updates it in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionTag {
    pub transaction_id: Uuid,
    pub company_id: Uuid,
    pub tag_code: Option<String>,
    pub confidence_score: f64,
    /// Tags set by a human operator. The engine currently overwrites these
    /// on re-tagging — see `config::ManualOverridePolicy` and DESIGN.md's
    /// Open Questions for why this is preserved rather than fixed.
    pub is_manual_override: bool,
    /// Newline-joined audit trail of which rules fired or failed.
    pub processing_notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionTag {
    pub fn untagged(transaction_id: Uuid, company_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            transaction_id,
            company_id,
            tag_code: None,
            confidence_score: 0.0,
            is_manual_override: false,
            processing_notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
