//! Autotag CLI - administrative commands for the per-tenant tagging engine

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

/// autotag - administrative CLI for the transaction tagging rule engine
#[derive(Parser)]
#[command(name = "autotag", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import tagging rules from a JSON envelope, or write a sample one out
    ImportRules {
        /// Path to the rule envelope JSON file
        file_path: PathBuf,
        /// Create the company if its code is not already known
        #[arg(long)]
        create_company: bool,
        /// Write a sample rules file to `file_path` instead of importing
        #[arg(long)]
        generate_sample: bool,
    },

    /// Tag transactions for a company
    TagTransactions {
        /// Company code to tag transactions for
        company_code: String,
        /// Specific transaction IDs to tag
        #[arg(long, value_delimiter = ',')]
        transaction_ids: Vec<String>,
        /// Tag every currently-untagged transaction
        #[arg(long)]
        all: bool,
        /// Re-tag every transaction already tagged for this company
        #[arg(long)]
        retag: bool,
        /// Batch size for processing
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Test a single rule against a transaction or a sample
    TestRule {
        /// Company code
        company_code: String,
        /// Name of the rule to test
        rule_name: String,
        /// Specific transaction ID to test against
        #[arg(long)]
        transaction_id: Option<String>,
        /// Number of sample transactions to test when no transaction id is given
        #[arg(long, default_value_t = 10)]
        sample_size: usize,
        /// Test without saving results
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{e:?}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::ImportRules { file_path, create_company, generate_sample } => {
            commands::import_rules::run(file_path, create_company, generate_sample)
        }
        Commands::TagTransactions { company_code, transaction_ids, all, retag, batch_size } => {
            commands::tag_transactions::run(&company_code, transaction_ids, all, retag, batch_size)
        }
        Commands::TestRule { company_code, rule_name, transaction_id, sample_size, dry_run } => {
            commands::test_rule::run(&company_code, &rule_name, transaction_id, sample_size, dry_run)
        }
    }
}
