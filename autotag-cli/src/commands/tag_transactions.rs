//! `autotag tag-transactions` - drive the tagging service against a company's
//! transactions (§4.5, §6). Exactly one of `--transaction-ids`, `--all`,
//! `--retag` is required.

use anyhow::{bail, Result};
use uuid::Uuid;

use crate::commands;
use crate::output;

pub fn run(
    company_code: &str,
    transaction_ids: Vec<String>,
    all: bool,
    retag: bool,
    batch_size: Option<usize>,
) -> Result<()> {
    let modes_selected = [!transaction_ids.is_empty(), all, retag]
        .iter()
        .filter(|&&selected| selected)
        .count();
    if modes_selected != 1 {
        bail!("specify exactly one of --transaction-ids, --all, or --retag");
    }

    let context = commands::get_context()?;
    let company = context.tagging.resolve_company(company_code)?;
    let batch_size = batch_size.unwrap_or(context.config.default_batch_size);

    println!("Starting tagging process for company: {company_code}");
    let started = std::time::Instant::now();

    if retag {
        let ids = context.repository.tagged_transaction_ids(company.id)?;
        let tags = context.tagging.tag_many_with_batch_size(&company, &ids, batch_size);
        output::success(&format!("Re-tagged {} transactions", tags.len()));
    } else if !transaction_ids.is_empty() {
        let ids = parse_ids(&transaction_ids)?;
        let tags = context.tagging.tag_many_with_batch_size(&company, &ids, batch_size);
        output::success(&format!("Tagged {}/{} transactions", tags.len(), ids.len()));
        for id in &ids {
            match tags.iter().find(|t| &t.transaction_id == id) {
                Some(tag) if tag.tag_code.is_some() => {
                    println!("  Transaction {id}: {}", tag.tag_code.as_deref().unwrap());
                }
                _ => output::warning(&format!("  Transaction {id}: No tag assigned")),
            }
        }
    } else {
        debug_assert!(all);
        let tagged = context.repository.tagged_transaction_ids(company.id)?;
        let untagged: Vec<Uuid> = context
            .repository
            .all_transaction_ids()?
            .into_iter()
            .filter(|id| !tagged.contains(id))
            .collect();
        if untagged.is_empty() {
            println!("No untagged transactions found");
            return Ok(());
        }
        let tags = context.tagging.tag_many_with_batch_size(&company, &untagged, batch_size);
        output::success(&format!("Tagged {}/{} transactions", tags.len(), untagged.len()));
    }

    let stats = context.tagging.stats(&company)?;
    println!("\nTagging Statistics:");
    println!("  Total transactions: {}", stats.total_transactions);
    println!("  Tagged: {}", stats.tagged_transactions);
    println!("  Untagged: {}", stats.total_transactions - stats.tagged_transactions);
    println!("  Tagging rate: {:.1}%", stats.tagging_rate * 100.0);
    if !stats.top_tags.is_empty() {
        println!("\n  Top tags:");
        for (tag, count) in &stats.top_tags {
            println!("    {tag}: {count}");
        }
    }

    println!("\nCompleted in {:.2} seconds", started.elapsed().as_secs_f64());
    Ok(())
}

fn parse_ids(raw: &[String]) -> Result<Vec<Uuid>> {
    raw.iter()
        .map(|s| Uuid::parse_str(s).map_err(|e| anyhow::anyhow!("invalid transaction id '{s}': {e}")))
        .collect()
}
