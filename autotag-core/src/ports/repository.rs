//! Repository port - storage abstraction for the five relations of §6:
//! companies, tagging rules, transaction tags, transactions, external data.
//!
//! The engine is synchronous and CPU-bound (§5), and the reference DuckDB
//! adapter's driver is itself blocking, so this port is a plain synchronous
//! trait rather than `async_trait` — there is no suspension point to model.

use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{Company, ExternalMetadata, TaggingRule, Transaction, TransactionTag};

/// Storage abstraction over the engine's five relations.
pub trait Repository: Send + Sync {
    // === Companies ===

    fn get_company_by_code(&self, code: &str) -> Result<Option<Company>>;
    fn get_company_by_id(&self, id: Uuid) -> Result<Option<Company>>;
    fn create_company(&self, company: &Company) -> Result<()>;
    fn list_active_companies(&self) -> Result<Vec<Company>>;

    // === Tagging rules ===

    /// Active rules for a company, ordered by ascending priority (§4.4 step 1).
    fn active_rules_for_company(&self, company_id: Uuid) -> Result<Vec<TaggingRule>>;
    /// Every rule for a company regardless of `is_active`, used by
    /// `export_rules` (§4.6): export is not restricted to active rules,
    /// only the engine's read path is.
    fn all_rules_for_company(&self, company_id: Uuid) -> Result<Vec<TaggingRule>>;
    fn get_rule_by_name(&self, company_id: Uuid, name: &str) -> Result<Option<TaggingRule>>;
    fn upsert_rule(&self, rule: &TaggingRule) -> Result<()>;
    fn delete_rules_for_company(&self, company_id: Uuid) -> Result<()>;

    // === Transactions ===

    fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>>;
    fn get_transactions(&self, ids: &[Uuid]) -> Result<Vec<Transaction>>;
    /// All transactions for a company's jurisdiction of interest, used by
    /// `retag_company` and `tag_many --all` (§4.5).
    fn all_transaction_ids(&self) -> Result<Vec<Uuid>>;

    // === External metadata ===

    fn get_external_metadata(&self, transaction_id: Uuid) -> Result<Option<ExternalMetadata>>;

    // === Transaction tags ===

    fn get_tag(&self, transaction_id: Uuid, company_id: Uuid) -> Result<Option<TransactionTag>>;
    fn upsert_tag(&self, tag: &TransactionTag) -> Result<()>;
    /// Every already-tagged transaction for a company, used by `retag_company`.
    fn tagged_transaction_ids(&self, company_id: Uuid) -> Result<Vec<Uuid>>;
    /// Tag rows for a company, used by `stats` (§4.5).
    fn tags_for_company(&self, company_id: Uuid) -> Result<Vec<TransactionTag>>;
}
