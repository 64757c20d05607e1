//! In-process `Repository` implementation.
//!
//! Used by the test suite and suitable for embedding the engine in a
//! process that keeps its own data elsewhere and only wants tagging
//! decisions, without provisioning a database.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{Company, ExternalMetadata, TaggingRule, Transaction, TransactionTag};
use crate::ports::Repository;

#[derive(Default)]
struct State {
    companies: HashMap<Uuid, Company>,
    companies_by_code: HashMap<String, Uuid>,
    rules: HashMap<Uuid, TaggingRule>,
    transactions: HashMap<Uuid, Transaction>,
    external_metadata: HashMap<Uuid, ExternalMetadata>,
    tags: HashMap<(Uuid, Uuid), TransactionTag>,
}

pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn put_transaction(&self, transaction: Transaction) {
        let mut state = self.state.lock().unwrap();
        state.transactions.insert(transaction.id, transaction);
    }

    pub fn put_external_metadata(&self, metadata: ExternalMetadata) {
        let mut state = self.state.lock().unwrap();
        state.external_metadata.insert(metadata.transaction_id, metadata);
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for InMemoryRepository {
    fn get_company_by_code(&self, code: &str) -> Result<Option<Company>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .companies_by_code
            .get(code)
            .and_then(|id| state.companies.get(id))
            .cloned())
    }

    fn get_company_by_id(&self, id: Uuid) -> Result<Option<Company>> {
        let state = self.state.lock().unwrap();
        Ok(state.companies.get(&id).cloned())
    }

    fn create_company(&self, company: &Company) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.companies_by_code.insert(company.code.clone(), company.id);
        state.companies.insert(company.id, company.clone());
        Ok(())
    }

    fn list_active_companies(&self) -> Result<Vec<Company>> {
        let state = self.state.lock().unwrap();
        Ok(state.companies.values().filter(|c| c.is_active).cloned().collect())
    }

    fn active_rules_for_company(&self, company_id: Uuid) -> Result<Vec<TaggingRule>> {
        let state = self.state.lock().unwrap();
        let mut rules: Vec<TaggingRule> = state
            .rules
            .values()
            .filter(|r| r.company_id == company_id && r.is_active)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.priority);
        Ok(rules)
    }

    fn all_rules_for_company(&self, company_id: Uuid) -> Result<Vec<TaggingRule>> {
        let state = self.state.lock().unwrap();
        let mut rules: Vec<TaggingRule> = state
            .rules
            .values()
            .filter(|r| r.company_id == company_id)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.priority);
        Ok(rules)
    }

    fn get_rule_by_name(&self, company_id: Uuid, name: &str) -> Result<Option<TaggingRule>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .rules
            .values()
            .find(|r| r.company_id == company_id && r.name == name)
            .cloned())
    }

    fn upsert_rule(&self, rule: &TaggingRule) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.rules.insert(rule.id, rule.clone());
        Ok(())
    }

    fn delete_rules_for_company(&self, company_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.rules.retain(|_, r| r.company_id != company_id);
        Ok(())
    }

    fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        let state = self.state.lock().unwrap();
        Ok(state.transactions.get(&id).cloned())
    }

    fn get_transactions(&self, ids: &[Uuid]) -> Result<Vec<Transaction>> {
        let state = self.state.lock().unwrap();
        Ok(ids.iter().filter_map(|id| state.transactions.get(id).cloned()).collect())
    }

    fn all_transaction_ids(&self) -> Result<Vec<Uuid>> {
        let state = self.state.lock().unwrap();
        Ok(state.transactions.keys().copied().collect())
    }

    fn get_external_metadata(&self, transaction_id: Uuid) -> Result<Option<ExternalMetadata>> {
        let state = self.state.lock().unwrap();
        Ok(state.external_metadata.get(&transaction_id).cloned())
    }

    fn get_tag(&self, transaction_id: Uuid, company_id: Uuid) -> Result<Option<TransactionTag>> {
        let state = self.state.lock().unwrap();
        Ok(state.tags.get(&(transaction_id, company_id)).cloned())
    }

    fn upsert_tag(&self, tag: &TransactionTag) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .tags
            .insert((tag.transaction_id, tag.company_id), tag.clone());
        Ok(())
    }

    fn tagged_transaction_ids(&self, company_id: Uuid) -> Result<Vec<Uuid>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tags
            .values()
            .filter(|t| t.company_id == company_id && t.tag_code.is_some())
            .map(|t| t.transaction_id)
            .collect())
    }

    fn tags_for_company(&self, company_id: Uuid) -> Result<Vec<TransactionTag>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tags
            .values()
            .filter(|t| t.company_id == company_id)
            .cloned()
            .collect())
    }
}
