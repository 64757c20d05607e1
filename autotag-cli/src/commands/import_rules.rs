//! `autotag import-rules` - load a rule envelope from disk, or write a
//! sample one out (§4.6, §6).

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use autotag_core::RuleEnvelope;

use crate::{commands, output};

pub fn run(file_path: PathBuf, create_company: bool, generate_sample: bool) -> Result<()> {
    if generate_sample {
        return generate(&file_path);
    }
    import(&file_path, create_company)
}

fn generate(file_path: &PathBuf) -> Result<()> {
    let context = commands::get_context()?;
    let envelope = context
        .rules
        .generate_sample_envelope("SAMPLE_CO", "Sample Company");

    let json = serde_json::to_string_pretty(&envelope)?;
    std::fs::write(file_path, json).with_context(|| format!("error creating sample file: {:?}", file_path))?;

    output::success(&format!("Sample rules file created at: {:?}", file_path));
    output::info("\nSample contains:");
    for rule in &envelope.rules {
        println!("  - {} ({})", rule.name, rule.rule_type);
    }
    Ok(())
}

fn import(file_path: &PathBuf, create_company: bool) -> Result<()> {
    if !file_path.exists() {
        bail!("file not found: {:?}", file_path);
    }
    let json_data = std::fs::read_to_string(file_path)
        .with_context(|| format!("error reading file: {:?}", file_path))?;
    let envelope: RuleEnvelope =
        serde_json::from_str(&json_data).with_context(|| "invalid rule envelope JSON")?;
    if envelope.company_code.is_empty() {
        bail!("envelope must contain a non-empty company_code");
    }

    let context = commands::get_context()?;
    let company = context
        .rules
        .resolve_envelope_company(&envelope, create_company)
        .with_context(|| format!("company '{}' not found", envelope.company_code))?;

    println!("Importing rules for company: {}", envelope.company_code);
    let result = context.rules.import_rules(&company, &envelope)?;

    output::success(&format!("Successfully imported {} rules", result.imported));
    if !result.errors.is_empty() {
        output::warning("\nErrors encountered:");
        for error in &result.errors {
            println!("  - {error}");
        }
    }

    let total_rules = context.repository.active_rules_for_company(company.id)?.len();
    println!("\nCompany '{}' now has {} active rule(s)", envelope.company_code, total_rules);

    Ok(())
}
