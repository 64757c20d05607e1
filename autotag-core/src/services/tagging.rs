//! Batch tagging service (§4.5): `tag_one`, `tag_many`, `retag_company`,
//! `stats`.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Company, TaggingRule, TransactionTag};
use crate::engine::{Engine, RuleTestOutcome};
use crate::ports::Repository;

/// Tagging statistics for one company (§4.5). `total_transactions` counts
/// `TransactionTag` rows, not the full transaction universe — an
/// intentionally preserved misnomer (§9 Open Questions): a company that has
/// never been tagged has no denominator to report against, and re-deriving
/// it from the global transaction table would silently change what this
/// number has always meant to callers of the original system.
#[derive(Debug, Clone)]
pub struct TaggingStats {
    pub total_transactions: usize,
    pub tagged_transactions: usize,
    pub tagging_rate: f64,
    pub top_tags: Vec<(String, usize)>,
    pub active_rules: usize,
}

pub struct TaggingService {
    repository: Arc<dyn Repository>,
    engine: Engine,
    batch_size: usize,
}

impl TaggingService {
    pub fn new(repository: Arc<dyn Repository>, engine: Engine, batch_size: usize) -> Self {
        Self {
            repository,
            engine,
            batch_size,
        }
    }

    pub fn tag_one(&self, company: &Company, transaction_id: Uuid) -> Result<TransactionTag> {
        self.engine.tag_transaction(company, transaction_id)
    }

    /// Tag many transactions, batching in fixed-size chunks. One
    /// transaction's failure never aborts the batch (§7): a failed
    /// transaction is simply absent from the returned vector.
    pub fn tag_many(&self, company: &Company, transaction_ids: &[Uuid]) -> Vec<TransactionTag> {
        self.tag_many_with_batch_size(company, transaction_ids, self.batch_size)
    }

    /// Same as `tag_many`, with an explicit chunk size overriding the
    /// service's default (the CLI's `--batch-size` flag, §6).
    pub fn tag_many_with_batch_size(
        &self,
        company: &Company,
        transaction_ids: &[Uuid],
        batch_size: usize,
    ) -> Vec<TransactionTag> {
        let batch_size = batch_size.max(1);
        transaction_ids
            .chunks(batch_size)
            .flat_map(|chunk| {
                chunk
                    .iter()
                    .filter_map(|id| self.tag_one(company, *id).ok())
            })
            .collect()
    }

    /// Re-tag every transaction that already carries a tag for this company.
    pub fn retag_company(&self, company: &Company) -> Result<Vec<TransactionTag>> {
        let ids = self.repository.tagged_transaction_ids(company.id)?;
        Ok(self.tag_many(company, &ids))
    }

    pub fn stats(&self, company: &Company) -> Result<TaggingStats> {
        let tags = self.repository.tags_for_company(company.id)?;
        let total_transactions = tags.len();
        let tagged_transactions = tags.iter().filter(|t| t.tag_code.is_some()).count();
        let tagging_rate = if total_transactions == 0 {
            0.0
        } else {
            tagged_transactions as f64 / total_transactions as f64
        };

        let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for tag in &tags {
            if let Some(code) = &tag.tag_code {
                *counts.entry(code.clone()).or_insert(0) += 1;
            }
        }
        let mut top_tags: Vec<(String, usize)> = counts.into_iter().collect();
        top_tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_tags.truncate(10);

        let active_rules = self.repository.active_rules_for_company(company.id)?.len();

        Ok(TaggingStats {
            total_transactions,
            tagged_transactions,
            tagging_rate,
            top_tags,
            active_rules,
        })
    }

    /// Resolve a company by its external code, treating an inactive company
    /// the same as a missing one (§4.5, §7: "inactive-or-missing company ->
    /// return none/empty; no exception").
    pub fn resolve_company(&self, code: &str) -> Result<Company> {
        self.repository
            .get_company_by_code(code)?
            .filter(|company| company.is_active)
            .ok_or_else(|| Error::not_found(format!("company {code}")))
    }

    /// Evaluate one rule against one transaction, outside the normal
    /// multi-rule arbitration — the `test-rule` CLI command's entry point.
    pub fn test_rule(&self, rule: &TaggingRule, transaction_id: Uuid) -> Result<RuleTestOutcome> {
        self.engine.evaluate_rule(rule, transaction_id)
    }

    /// Upsert a tag directly, bypassing arbitration — used by `test-rule`
    /// when it is not a dry run, matching the original command's direct
    /// `TransactionTag.objects.update_or_create` write.
    pub fn record_manual_test_tag(&self, tag: &TransactionTag) -> Result<()> {
        self.repository.upsert_tag(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::logging::TracingSecurityLog;
    use crate::adapters::memory::InMemoryRepository;
    use crate::config::EngineConfig;
    use crate::domain::{RuleType, TaggingRule};
    use rust_decimal::Decimal;
    use serde_json::json;

    fn service() -> (TaggingService, Arc<InMemoryRepository>, Company) {
        let repo = Arc::new(InMemoryRepository::new());
        let company = Company::new(Uuid::new_v4(), "ACME", "Acme Corp");
        repo.create_company(&company).unwrap();
        let engine = Engine::new(repo.clone(), Arc::new(TracingSecurityLog), EngineConfig::default());
        (TaggingService::new(repo.clone(), engine, 50), repo, company)
    }

    #[test]
    fn tag_many_skips_missing_transactions_without_failing_the_batch() {
        let (service, repo, company) = service();
        let existing_id = Uuid::new_v4();
        repo.put_transaction(crate::domain::Transaction::new(
            existing_id,
            "PROD_001",
            Decimal::new(150, 2),
            "debit",
            "online",
            "us",
        ));
        repo.upsert_rule(&TaggingRule::new(
            Uuid::new_v4(),
            company.id,
            "rule",
            RuleType::Simple,
            100,
            json!({"mappings": {"source": {"online": "TAG"}}}),
        ))
        .unwrap();

        let missing_id = Uuid::new_v4();
        let results = service.tag_many(&company, &[existing_id, missing_id]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tag_code, Some("TAG".to_string()));
    }

    #[test]
    fn stats_counts_tag_rows_not_the_global_transaction_universe() {
        let (service, repo, company) = service();
        let tx_id = Uuid::new_v4();
        repo.put_transaction(crate::domain::Transaction::new(
            tx_id,
            "PROD_001",
            Decimal::new(150, 2),
            "debit",
            "online",
            "us",
        ));
        repo.upsert_rule(&TaggingRule::new(
            Uuid::new_v4(),
            company.id,
            "rule",
            RuleType::Simple,
            100,
            json!({"mappings": {"source": {"online": "TAG"}}}),
        ))
        .unwrap();
        service.tag_one(&company, tx_id).unwrap();

        let stats = service.stats(&company).unwrap();
        assert_eq!(stats.total_transactions, 1);
        assert_eq!(stats.tagged_transactions, 1);
        assert_eq!(stats.tagging_rate, 1.0);
        assert_eq!(stats.top_tags, vec![("TAG".to_string(), 1)]);
    }

    #[test]
    fn resolve_company_treats_an_inactive_company_as_missing() {
        let (service, repo, mut company) = service();
        company.is_active = false;
        repo.create_company(&company).unwrap();

        assert!(service.resolve_company(&company.code).is_err());
    }
}
