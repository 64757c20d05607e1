//! Rule lifecycle service (§4.6): validation, import/export envelope, and
//! sample rule generation. Also carries the optional metadata-schema
//! validation of §4.7, supplemented from the original implementation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Company, RuleType, TaggingRule};
use crate::ports::Repository;

/// One rule in the import/export envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEnvelopeEntry {
    pub name: String,
    pub rule_type: String,
    pub priority: i32,
    pub rule_config: JsonValue,
    #[serde(default)]
    pub conditions: Option<JsonValue>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// The top-level import/export JSON shape (§4.6): `{ company_code,
/// company_name, rules }`, pretty-printed on export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEnvelope {
    pub company_code: String,
    pub company_name: String,
    pub rules: Vec<RuleEnvelopeEntry>,
}

/// Outcome of importing an envelope: rules that imported cleanly, and
/// per-rule errors that did not abort the rest of the import (§7: one bad
/// rule never fails the whole import).
#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub imported: usize,
    pub errors: Vec<String>,
}

pub struct RuleLifecycleService {
    repository: Arc<dyn Repository>,
}

impl RuleLifecycleService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Validate a rule's `rule_config` against the shape its `rule_type`
    /// requires (§4.6). The `script`/`cel` check is intentionally
    /// lightweight: non-empty expression text, and a rejection of the same
    /// imperative-language markers the CEL processor itself checks at
    /// evaluation time, so validation and evaluation never disagree about
    /// what counts as a legacy script.
    pub fn validate_rule_config(&self, rule_type: &RuleType, rule_config: &JsonValue) -> Result<()> {
        match rule_type {
            RuleType::Simple => {
                let mappings = rule_config
                    .get("mappings")
                    .and_then(JsonValue::as_object)
                    .ok_or_else(|| Error::validation("simple rule requires a non-empty mappings object"))?;
                if mappings.is_empty() {
                    return Err(Error::validation("simple rule requires at least one field mapping"));
                }
                Ok(())
            }
            RuleType::Conditional => {
                let rules = rule_config
                    .get("conditions")
                    .and_then(JsonValue::as_array)
                    .ok_or_else(|| Error::validation("conditional rule requires a non-empty rules array"))?;
                if rules.is_empty() {
                    return Err(Error::validation("conditional rule requires at least one clause"));
                }
                Ok(())
            }
            RuleType::Cel | RuleType::Script => {
                let text = rule_config
                    .get("expression")
                    .or_else(|| rule_config.get("script"))
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| Error::validation("cel rule requires a non-empty expression"))?;
                if text.trim().is_empty() {
                    return Err(Error::validation("cel rule requires a non-empty expression"));
                }
                if text.contains("def ") || text.contains("return") {
                    return Err(Error::validation(
                        "expression looks like an imperative script and will never evaluate (contains 'def '/'return')",
                    ));
                }
                Ok(())
            }
            RuleType::Ml => Ok(()),
            RuleType::Unknown => Err(Error::validation("unknown rule type")),
        }
    }

    /// Export every rule (active or not — §4.6 does not restrict export to
    /// active rules, only the engine's read path does) owned by a company,
    /// in the literal envelope shape of §4.6.
    pub fn export_rules(&self, company: &Company) -> Result<RuleEnvelope> {
        let rules = self.repository.all_rules_for_company(company.id)?;
        Ok(RuleEnvelope {
            company_code: company.code.clone(),
            company_name: company.name.clone(),
            rules: rules
                .into_iter()
                .map(|r| RuleEnvelopeEntry {
                    name: r.name,
                    rule_type: r.rule_type.as_str().to_string(),
                    priority: r.priority,
                    rule_config: r.rule_config,
                    conditions: r.conditions,
                    is_active: r.is_active,
                })
                .collect(),
        })
    }

    /// Resolve an envelope's `company_code` to an existing company (§4.6:
    /// "require `company_code` to resolve to an existing company"),
    /// optionally creating it when absent (the CLI's `--create-company`
    /// flag, §6). This is the envelope-level failure point: an unresolved
    /// company with `create_if_missing = false` is fatal to the whole
    /// import, distinct from the per-rule errors `import_rules` collects.
    pub fn resolve_envelope_company(&self, envelope: &RuleEnvelope, create_if_missing: bool) -> Result<Company> {
        if let Some(company) = self.repository.get_company_by_code(&envelope.company_code)? {
            return Ok(company);
        }
        if !create_if_missing {
            return Err(Error::not_found(format!("company {}", envelope.company_code)));
        }
        let company = Company::new(Uuid::new_v4(), envelope.company_code.clone(), envelope.company_name.clone());
        self.repository.create_company(&company)?;
        Ok(company)
    }

    /// Import an envelope's rules into a company. Per-rule validation or
    /// storage failures are collected into `errors` rather than aborting
    /// the import (§4.6, §7) — only envelope-level failure (resolving
    /// `company_code`, via `resolve_envelope_company`) is fatal.
    pub fn import_rules(&self, company: &Company, envelope: &RuleEnvelope) -> Result<ImportResult> {
        let mut imported = 0;
        let mut errors = Vec::new();

        for entry in &envelope.rules {
            let rule_type = RuleType::parse(&entry.rule_type);
            if let Err(e) = self.validate_rule_config(&rule_type, &entry.rule_config) {
                errors.push(format!("{}: {e}", entry.name));
                continue;
            }

            let existing = self.repository.get_rule_by_name(company.id, &entry.name)?;
            let rule = match existing {
                Some(mut rule) => {
                    rule.rule_type = rule_type;
                    rule.priority = entry.priority;
                    rule.rule_config = entry.rule_config.clone();
                    rule.conditions = entry.conditions.clone();
                    rule.is_active = entry.is_active;
                    rule.updated_at = chrono::Utc::now();
                    rule
                }
                None => {
                    let mut rule = TaggingRule::new(
                        Uuid::new_v4(),
                        company.id,
                        entry.name.clone(),
                        rule_type,
                        entry.priority,
                        entry.rule_config.clone(),
                    );
                    rule.conditions = entry.conditions.clone();
                    rule.is_active = entry.is_active;
                    rule
                }
            };

            match self.repository.upsert_rule(&rule) {
                Ok(()) => imported += 1,
                Err(e) => errors.push(format!("{}: {e}", entry.name)),
            }
        }

        Ok(ImportResult { imported, errors })
    }

    /// Generate one sample rule per processor family, for a company getting
    /// started (§4.6).
    pub fn generate_sample_rules(&self, company_id: Uuid) -> Vec<TaggingRule> {
        vec![
            TaggingRule::new(
                Uuid::new_v4(),
                company_id,
                "sample simple mapping",
                RuleType::Simple,
                100,
                serde_json::json!({"mappings": {"source": {"online": "ONLINE_SALE"}}}),
            ),
            TaggingRule::new(
                Uuid::new_v4(),
                company_id,
                "sample conditional rule",
                RuleType::Conditional,
                150,
                serde_json::json!({"conditions": [
                    {"field": "metadata.amount", "operator": "greater_than", "value": 1000, "tag": "HIGH_VALUE"}
                ]}),
            ),
            TaggingRule::new(
                Uuid::new_v4(),
                company_id,
                "sample cel rule",
                RuleType::Cel,
                200,
                serde_json::json!({"expression": "transaction.jurisdiction == \"eu\" ? \"EU_TRANSACTION\" : null"}),
            ),
            TaggingRule::new(
                Uuid::new_v4(),
                company_id,
                "sample script rule",
                RuleType::Script,
                250,
                serde_json::json!({
                    "conditions": [
                        {"expression": "transaction.ledger_type == \"credit\"", "tag": "CREDIT"}
                    ],
                    "default_tag": "UNCLASSIFIED"
                }),
            ),
        ]
    }

    /// A ready-to-write envelope containing one sample rule per processor
    /// family, for `autotag import-rules --generate-sample` (§4.6).
    pub fn generate_sample_envelope(&self, company_code: &str, company_name: &str) -> RuleEnvelope {
        let rules = self
            .generate_sample_rules(Uuid::new_v4())
            .into_iter()
            .map(|r| RuleEnvelopeEntry {
                name: r.name,
                rule_type: r.rule_type.as_str().to_string(),
                priority: r.priority,
                rule_config: r.rule_config,
                conditions: r.conditions,
                is_active: r.is_active,
            })
            .collect();
        RuleEnvelope {
            company_code: company_code.to_string(),
            company_name: company_name.to_string(),
            rules,
        }
    }

    /// Validate a metadata object against `company.metadata_schema`, a
    /// no-op when no schema is declared (§4.7). Not wired into the
    /// engine's hot path; available to callers that want to validate
    /// upstream data before accepting it.
    pub fn validate_metadata(&self, company: &Company, metadata: &JsonValue) -> Result<()> {
        let Some(schema) = &company.metadata_schema else {
            return Ok(());
        };

        let validator = jsonschema::JSONSchema::compile(schema)
            .map_err(|e| Error::validation(format!("invalid metadata_schema: {e}")))?;

        if let Err(errors) = validator.validate(metadata) {
            let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
            return Err(Error::validation(messages.join("; ")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryRepository;
    use serde_json::json;

    fn service() -> (RuleLifecycleService, Arc<InMemoryRepository>, Company) {
        let repo = Arc::new(InMemoryRepository::new());
        let company = Company::new(Uuid::new_v4(), "ACME", "Acme Corp");
        repo.create_company(&company).unwrap();
        (RuleLifecycleService::new(repo.clone()), repo, company)
    }

    #[test]
    fn simple_rule_requires_mappings() {
        let (service, _repo, _company) = service();
        assert!(service
            .validate_rule_config(&RuleType::Simple, &json!({}))
            .is_err());
        assert!(service
            .validate_rule_config(&RuleType::Simple, &json!({"mappings": {"a": {"b": "C"}}}))
            .is_ok());
    }

    #[test]
    fn cel_rule_rejects_legacy_script_markers_at_validation_time() {
        let (service, _repo, _company) = service();
        let err = service
            .validate_rule_config(&RuleType::Cel, &json!({"expression": "def f():\n    return 1"}))
            .unwrap_err();
        assert!(err.to_string().contains("imperative script"));
    }

    #[test]
    fn import_collects_per_rule_errors_without_aborting() {
        let (service, _repo, company) = service();
        let envelope = RuleEnvelope {
            company_code: company.code.clone(),
            company_name: company.name.clone(),
            rules: vec![
                RuleEnvelopeEntry {
                    name: "good".to_string(),
                    rule_type: "simple".to_string(),
                    priority: 100,
                    rule_config: json!({"mappings": {"source": {"online": "X"}}}),
                    conditions: None,
                    is_active: true,
                },
                RuleEnvelopeEntry {
                    name: "bad".to_string(),
                    rule_type: "simple".to_string(),
                    priority: 100,
                    rule_config: json!({}),
                    conditions: None,
                    is_active: true,
                },
            ],
        };
        let result = service.import_rules(&company, &envelope).unwrap();
        assert_eq!(result.imported, 1);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn export_then_import_round_trips_rule_config() {
        let (service, repo, company) = service();
        repo.upsert_rule(&TaggingRule::new(
            Uuid::new_v4(),
            company.id,
            "roundtrip",
            RuleType::Simple,
            100,
            json!({"mappings": {"source": {"online": "X"}}}),
        ))
        .unwrap();

        let exported = service.export_rules(&company).unwrap();
        assert_eq!(exported.rules.len(), 1);
        assert_eq!(exported.company_code, "ACME");

        let other_company = Company::new(Uuid::new_v4(), "OTHER", "Other Co");
        repo.create_company(&other_company).unwrap();
        let result = service.import_rules(&other_company, &exported).unwrap();
        assert_eq!(result.imported, 1);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn export_rules_includes_inactive_rules() {
        let (service, repo, company) = service();
        let mut disabled = TaggingRule::new(
            Uuid::new_v4(),
            company.id,
            "disabled",
            RuleType::Simple,
            100,
            json!({"mappings": {"source": {"online": "X"}}}),
        );
        disabled.is_active = false;
        repo.upsert_rule(&disabled).unwrap();
        assert!(repo.active_rules_for_company(company.id).unwrap().is_empty());

        let exported = service.export_rules(&company).unwrap();
        assert_eq!(exported.rules.len(), 1);
        assert!(!exported.rules[0].is_active);
    }

    #[test]
    fn resolve_envelope_company_creates_when_missing_and_allowed() {
        let (service, repo, _company) = service();
        let envelope = RuleEnvelope {
            company_code: "NEWCO".to_string(),
            company_name: "New Co".to_string(),
            rules: vec![],
        };

        assert!(service.resolve_envelope_company(&envelope, false).is_err());

        let created = service.resolve_envelope_company(&envelope, true).unwrap();
        assert_eq!(created.code, "NEWCO");
        assert!(repo.get_company_by_code("NEWCO").unwrap().is_some());
    }

    #[test]
    fn validate_metadata_is_a_no_op_without_a_schema() {
        let (service, _repo, company) = service();
        service.validate_metadata(&company, &json!({"anything": true})).unwrap();
    }

    #[test]
    fn validate_metadata_enforces_declared_schema() {
        let (service, repo, mut company) = service();
        company.metadata_schema = Some(json!({
            "type": "object",
            "required": ["tier"],
            "properties": {"tier": {"type": "string"}}
        }));
        repo.create_company(&company).unwrap();

        assert!(service.validate_metadata(&company, &json!({"tier": "gold"})).is_ok());
        assert!(service.validate_metadata(&company, &json!({})).is_err());
    }
}
