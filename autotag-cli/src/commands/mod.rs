//! CLI command implementations

pub mod import_rules;
pub mod tag_transactions;
pub mod test_rule;

use std::path::PathBuf;

use anyhow::{Context, Result};
use autotag_core::AutotagContext;

/// Get the autotag data directory from environment or default (`~/.autotag`).
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AUTOTAG_DATA_DIR") {
        PathBuf::from(dir)
    } else {
        dirs::home_dir()
            .expect("could not find home directory")
            .join(".autotag")
    }
}

/// Open (creating if absent) the engine context for this process.
pub fn get_context() -> Result<AutotagContext> {
    let data_dir = get_data_dir();
    AutotagContext::new(&data_dir)
        .with_context(|| format!("failed to initialize autotag context at {:?}", data_dir))
}
