//! The tagging engine (§4.4): evaluates one transaction against a
//! company's active rules and produces a single [`TransactionTag`].

use std::sync::Arc;

use uuid::Uuid;

use crate::config::{EngineConfig, ManualOverridePolicy};
use crate::conditions::Node;
use crate::domain::result::{Error, Result};
use crate::domain::{Company, ExternalMetadata, TaggingRule, TransactionTag};
use crate::ports::{Repository, SecurityLog};
use crate::processors::{ProcessorOutcome, ProcessorRegistry};

pub struct Engine {
    repository: Arc<dyn Repository>,
    security_log: Arc<dyn SecurityLog>,
    config: EngineConfig,
    processors: ProcessorRegistry,
}

impl Engine {
    pub fn new(
        repository: Arc<dyn Repository>,
        security_log: Arc<dyn SecurityLog>,
        config: EngineConfig,
    ) -> Self {
        Self {
            repository,
            security_log,
            config,
            processors: ProcessorRegistry::new(),
        }
    }

    /// Tag one transaction for one company, per the five-step algorithm:
    /// load active rules ordered by priority ascending, evaluate each rule's
    /// guard then processor, keep the highest-confidence tag seen so far,
    /// early-exit on a confident low-priority-number match, and upsert the
    /// result with a processing-notes trail.
    pub fn tag_transaction(&self, company: &Company, transaction_id: Uuid) -> Result<TransactionTag> {
        let existing = self.repository.get_tag(transaction_id, company.id)?;
        if let Some(existing) = &existing {
            if existing.is_manual_override
                && self.config.manual_override_policy == ManualOverridePolicy::Preserve
            {
                return Ok(existing.clone());
            }
        }

        let transaction = self
            .repository
            .get_transaction(transaction_id)?
            .ok_or_else(|| Error::not_found(format!("transaction {transaction_id}")))?;
        let metadata = ExternalMetadata::metadata_or_empty(
            self.repository.get_external_metadata(transaction_id)?.as_ref(),
        );
        let rules = self.repository.active_rules_for_company(company.id)?;

        let mut best: Option<(i32, ProcessorOutcome)> = None;
        let mut notes = Vec::new();

        for rule in &rules {
            if let Some(guard) = &rule.conditions {
                let node = Node::parse(guard);
                if !node.evaluate(&transaction, &metadata) {
                    notes.push(format!("{}: guard not satisfied, skipped", rule.name));
                    continue;
                }
            }

            let Some(processor) = self.processors.processor_for(&rule.rule_type) else {
                notes.push(format!("{}: unknown rule type, skipped", rule.name));
                continue;
            };

            let outcome = processor.process(rule, &transaction, &metadata, self.security_log.as_ref());

            match &outcome.tag_code {
                Some(tag) => {
                    notes.push(format!(
                        "{}: matched, tag={tag}, confidence={:.2}",
                        rule.name, outcome.confidence
                    ));
                    let is_better = match &best {
                        Some((_, current)) => outcome.confidence > current.confidence,
                        None => true,
                    };
                    if is_better {
                        best = Some((rule.priority, outcome.clone()));
                    }

                    if rule.priority < self.config.early_exit_priority_threshold
                        && outcome.confidence > self.config.early_exit_confidence_threshold
                    {
                        notes.push(format!("{}: early exit", rule.name));
                        break;
                    }
                }
                None => {
                    notes.push(format!("{}: no match", rule.name));
                }
            }
        }

        let mut tag = existing.unwrap_or_else(|| TransactionTag::untagged(transaction_id, company.id));
        tag.processing_notes = notes.join("\n");
        tag.updated_at = chrono::Utc::now();

        let Some((_, outcome)) = best else {
            return Ok(tag);
        };
        tag.tag_code = outcome.tag_code;
        tag.confidence_score = outcome.confidence;
        tag.is_manual_override = false;

        self.repository.upsert_tag(&tag)?;
        Ok(tag)
    }

    /// Evaluate a single rule against a single transaction, outside the
    /// multi-rule arbitration of `tag_transaction` (used by the `test-rule`
    /// CLI command to exercise one rule in isolation, same as the original
    /// `test_rule` management command did against one processor at a time).
    pub fn evaluate_rule(&self, rule: &TaggingRule, transaction_id: Uuid) -> Result<RuleTestOutcome> {
        let transaction = self
            .repository
            .get_transaction(transaction_id)?
            .ok_or_else(|| Error::not_found(format!("transaction {transaction_id}")))?;
        let metadata = ExternalMetadata::metadata_or_empty(
            self.repository.get_external_metadata(transaction_id)?.as_ref(),
        );

        if let Some(guard) = &rule.conditions {
            let node = Node::parse(guard);
            if !node.evaluate(&transaction, &metadata) {
                return Ok(RuleTestOutcome {
                    transaction,
                    guard_passed: false,
                    outcome: ProcessorOutcome::none(),
                });
            }
        }

        let Some(processor) = self.processors.processor_for(&rule.rule_type) else {
            return Ok(RuleTestOutcome {
                transaction,
                guard_passed: true,
                outcome: ProcessorOutcome::none(),
            });
        };
        let outcome = processor.process(rule, &transaction, &metadata, self.security_log.as_ref());
        Ok(RuleTestOutcome { transaction, guard_passed: true, outcome })
    }
}

/// Result of `Engine::evaluate_rule`: the transaction it ran against, whether
/// the rule's guard let evaluation proceed, and the processor's outcome.
pub struct RuleTestOutcome {
    pub transaction: crate::domain::Transaction,
    pub guard_passed: bool,
    pub outcome: ProcessorOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryRepository;
    use crate::adapters::logging::TracingSecurityLog;
    use crate::domain::RuleType;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn setup() -> (Engine, Arc<InMemoryRepository>, Company) {
        let repo = Arc::new(InMemoryRepository::new());
        let company = Company::new(Uuid::new_v4(), "ACME", "Acme Corp");
        repo.create_company(&company).unwrap();
        let engine = Engine::new(repo.clone(), Arc::new(TracingSecurityLog), EngineConfig::default());
        (engine, repo, company)
    }

    #[test]
    fn highest_priority_rule_with_a_match_wins_when_not_early_exiting() {
        let (engine, repo, company) = setup();
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
            "lower priority number, wins by priority order",
            RuleType::Simple,
            200,
            json!({"mappings": {"source": {"online": "FIRST"}}}),
        ))
        .unwrap();

        let tag = engine.tag_transaction(&company, tx_id).unwrap();
        assert_eq!(tag.tag_code, Some("FIRST".to_string()));
    }

    #[test]
    fn guard_skips_rule_whose_conditions_are_not_satisfied() {
        let (engine, repo, company) = setup();
        let tx_id = Uuid::new_v4();
        repo.put_transaction(crate::domain::Transaction::new(
            tx_id,
            "PROD_001",
            Decimal::new(150, 2),
            "debit",
            "online",
            "us",
        ));

        let mut rule = TaggingRule::new(
            Uuid::new_v4(),
            company.id,
            "guarded",
            RuleType::Simple,
            100,
            json!({"mappings": {"source": {"online": "GUARDED"}}}),
        );
        rule.conditions = Some(json!({"field": "jurisdiction", "operator": "equals", "value": "uk"}));
        repo.upsert_rule(&rule).unwrap();

        let tag = engine.tag_transaction(&company, tx_id).unwrap();
        assert_eq!(tag.tag_code, None);
        assert!(tag.processing_notes.contains("guard not satisfied"));
        assert!(repo.get_tag(tx_id, company.id).unwrap().is_none());
    }

    #[test]
    fn early_exit_stops_evaluating_lower_priority_rules() {
        let (engine, repo, company) = setup();
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
            "early",
            RuleType::Simple,
            10,
            json!({"mappings": {"source": {"online": "EARLY"}}}),
        ))
        .unwrap();
        repo.upsert_rule(&TaggingRule::new(
            Uuid::new_v4(),
            company.id,
            "later",
            RuleType::Simple,
            20,
            json!({"mappings": {"source": {"online": "LATER"}}}),
        ))
        .unwrap();

        let tag = engine.tag_transaction(&company, tx_id).unwrap();
        assert_eq!(tag.tag_code, Some("EARLY".to_string()));
        assert!(!tag.processing_notes.contains("LATER"));
    }

    #[test]
    fn manual_override_is_preserved_when_policy_says_so() {
        let repo = Arc::new(InMemoryRepository::new());
        let company = Company::new(Uuid::new_v4(), "ACME", "Acme Corp");
        repo.create_company(&company).unwrap();
        let tx_id = Uuid::new_v4();
        repo.put_transaction(crate::domain::Transaction::new(
            tx_id,
            "PROD_001",
            Decimal::new(150, 2),
            "debit",
            "online",
            "us",
        ));
        let mut tag = TransactionTag::untagged(tx_id, company.id);
        tag.tag_code = Some("MANUAL".to_string());
        tag.is_manual_override = true;
        repo.upsert_tag(&tag).unwrap();

        let mut config = EngineConfig::default();
        config.manual_override_policy = ManualOverridePolicy::Preserve;
        let engine = Engine::new(repo.clone(), Arc::new(TracingSecurityLog), config);

        let result = engine.tag_transaction(&company, tx_id).unwrap();
        assert_eq!(result.tag_code, Some("MANUAL".to_string()));
        assert!(result.is_manual_override);
    }

    #[test]
    fn evaluate_rule_reports_guard_failure_without_running_the_processor() {
        let (engine, repo, company) = setup();
        let tx_id = Uuid::new_v4();
        repo.put_transaction(crate::domain::Transaction::new(
            tx_id,
            "PROD_001",
            Decimal::new(150, 2),
            "debit",
            "online",
            "us",
        ));

        let mut rule = TaggingRule::new(
            Uuid::new_v4(),
            company.id,
            "guarded",
            RuleType::Simple,
            100,
            json!({"mappings": {"source": {"online": "GUARDED"}}}),
        );
        rule.conditions = Some(json!({"field": "jurisdiction", "operator": "equals", "value": "uk"}));

        let result = engine.evaluate_rule(&rule, tx_id).unwrap();
        assert!(!result.guard_passed);
        assert_eq!(result.outcome.tag_code, None);
    }

    #[test]
    fn evaluate_rule_runs_the_processor_in_isolation() {
        let (engine, repo, company) = setup();
        let tx_id = Uuid::new_v4();
        repo.put_transaction(crate::domain::Transaction::new(
            tx_id,
            "PROD_001",
            Decimal::new(150, 2),
            "debit",
            "online",
            "us",
        ));

        let rule = TaggingRule::new(
            Uuid::new_v4(),
            company.id,
            "standalone",
            RuleType::Simple,
            100,
            json!({"mappings": {"source": {"online": "STANDALONE"}}}),
        );

        let result = engine.evaluate_rule(&rule, tx_id).unwrap();
        assert!(result.guard_passed);
        assert_eq!(result.outcome.tag_code, Some("STANDALONE".to_string()));
    }
}
