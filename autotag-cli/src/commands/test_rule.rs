//! `autotag test-rule` - exercise one rule against one transaction or a
//! sample, outside the engine's multi-rule arbitration (§6).

use anyhow::{bail, Context, Result};
use autotag_core::{ExternalMetadata, TransactionTag};
use uuid::Uuid;

use crate::commands;
use crate::output;

pub fn run(
    company_code: &str,
    rule_name: &str,
    transaction_id: Option<String>,
    sample_size: usize,
    dry_run: bool,
) -> Result<()> {
    let context = commands::get_context()?;
    let company = context.tagging.resolve_company(company_code)?;
    let rule = context
        .repository
        .get_rule_by_name(company.id, rule_name)?
        .with_context(|| format!("rule '{rule_name}' not found for company '{company_code}'"))?;

    println!("\nTesting rule: {rule_name}");
    println!("Rule type: {}", rule.rule_type.as_str());
    println!("Priority: {}", rule.priority);
    println!("Active: {}", rule.is_active);

    println!("\nRule configuration:");
    println!("{}", serde_json::to_string_pretty(&rule.rule_config)?);
    if let Some(conditions) = &rule.conditions {
        println!("\nRule conditions:");
        println!("{}", serde_json::to_string_pretty(conditions)?);
    }

    let transaction_ids: Vec<Uuid> = match transaction_id {
        Some(raw) => {
            let id = Uuid::parse_str(&raw).with_context(|| format!("invalid transaction id '{raw}'"))?;
            if context.repository.get_transaction(id)?.is_none() {
                bail!("transaction {id} not found");
            }
            vec![id]
        }
        None => context
            .repository
            .all_transaction_ids()?
            .into_iter()
            .take(sample_size)
            .collect(),
    };

    println!("\nTesting against {} transaction(s):", transaction_ids.len());
    println!("{}", "-".repeat(60));

    let mut matches = 0;
    for id in &transaction_ids {
        let result = context.tagging.test_rule(&rule, *id)?;

        if !result.guard_passed {
            println!("\nTransaction {id}: Conditions not met");
            continue;
        }

        match &result.outcome.tag_code {
            Some(tag_code) => {
                matches += 1;
                output::success(&format!("\nTransaction {id}: MATCHED -> {tag_code}"));
                println!("  Product: {}", result.transaction.product_code);
                println!("  Source: {}", result.transaction.source);
                println!("  Jurisdiction: {}", result.transaction.jurisdiction);
                println!("  Produce rate: {}", result.transaction.produce_rate);

                let metadata = ExternalMetadata::metadata_or_empty(
                    context.repository.get_external_metadata(*id)?.as_ref(),
                );
                if let Some(fields) = metadata.as_object() {
                    if !fields.is_empty() {
                        println!("  Metadata:");
                        for (key, value) in fields {
                            println!("    {key}: {value}");
                        }
                    }
                }

                if !dry_run {
                    let mut tag = TransactionTag::untagged(*id, company.id);
                    tag.tag_code = Some(tag_code.clone());
                    tag.confidence_score = 1.0;
                    tag.processing_notes = format!("Tagged by rule '{rule_name}' (test)");
                    context.tagging.record_manual_test_tag(&tag)?;
                    println!("  -> Tag saved");
                }
            }
            None => println!("\nTransaction {id}: No match"),
        }
    }

    println!("{}", "-".repeat(60));
    output::success(&format!("\nMatches: {matches}/{}", transaction_ids.len()));
    if dry_run {
        println!("\n(Dry run - no changes saved)");
    }

    Ok(())
}
