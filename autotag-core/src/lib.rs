//! Autotag Core - the per-tenant transaction tagging rule engine
//!
//! This crate implements the core engine following hexagonal architecture:
//!
//! - **domain**: core entities (`Company`, `TaggingRule`, `TransactionTag`, `Transaction`)
//! - **conditions**: the boolean condition DSL shared by the `conditional`
//!   processor and the per-rule guard
//! - **processors**: the four rule processor families
//! - **engine**: orchestration that picks a winning tag per transaction
//! - **services**: the tagging service and the rule lifecycle service
//! - **ports**: trait definitions for external dependencies (`Repository`, `SecurityLog`)
//! - **adapters**: concrete implementations (DuckDB, in-memory, tracing)
//! - **config**: engine-tunable knobs

pub mod adapters;
pub mod conditions;
pub mod config;
pub mod domain;
pub mod engine;
pub mod ports;
pub mod processors;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbRepository;
use adapters::logging::TracingSecurityLog;
use config::EngineConfig;
use engine::Engine;
use ports::{Repository, SecurityLog};
use services::{RuleLifecycleService, TaggingService};

pub use domain::result::Error;
pub use domain::{Company, ExternalMetadata, RuleType, TaggingRule, Transaction, TransactionTag};
pub use engine::RuleTestOutcome;
pub use services::{ImportResult, RuleEnvelope, RuleEnvelopeEntry, TaggingStats};

/// The primary entry point for embedding the engine in a process: a DuckDB
/// repository, a tracing-backed security log, and the two services built on
/// top of them, wired with configuration loaded from `<data_dir>/settings.json`.
pub struct AutotagContext {
    pub config: EngineConfig,
    pub repository: Arc<DuckDbRepository>,
    pub tagging: TaggingService,
    pub rules: RuleLifecycleService,
}

impl AutotagContext {
    /// Open (creating if absent) a DuckDB database under `data_dir` and wire
    /// up the engine and service layer around it.
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let config = EngineConfig::load(data_dir)?;

        let db_path = data_dir.join("autotag.duckdb");
        let repository = Arc::new(DuckDbRepository::new(&db_path)?);
        let security_log: Arc<dyn SecurityLog> = Arc::new(TracingSecurityLog);

        let engine = Engine::new(
            Arc::clone(&repository) as Arc<dyn Repository>,
            security_log,
            config.clone(),
        );
        let tagging = TaggingService::new(
            Arc::clone(&repository) as Arc<dyn Repository>,
            engine,
            config.default_batch_size,
        );
        let rules = RuleLifecycleService::new(Arc::clone(&repository) as Arc<dyn Repository>);

        Ok(Self {
            config,
            repository,
            tagging,
            rules,
        })
    }
}
