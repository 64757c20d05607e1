//! Engine configuration
//!
//! Tunable knobs the distilled rule engine leaves as constants or open
//! questions: the early-exit priority/confidence thresholds of §4.4, and
//! the manual-override overwrite policy of §9. Loaded from an optional JSON
//! settings file with environment-variable overrides, in the same shape as
//! the teacher's `Config::load`.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Raw settings.json structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    engine: EngineSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineSettings {
    #[serde(default = "default_early_exit_priority_threshold")]
    early_exit_priority_threshold: i32,
    #[serde(default = "default_early_exit_confidence_threshold")]
    early_exit_confidence_threshold: f64,
    #[serde(default)]
    manual_override_policy: ManualOverridePolicy,
    #[serde(default = "default_batch_size")]
    default_batch_size: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            early_exit_priority_threshold: default_early_exit_priority_threshold(),
            early_exit_confidence_threshold: default_early_exit_confidence_threshold(),
            manual_override_policy: ManualOverridePolicy::default(),
            default_batch_size: default_batch_size(),
        }
    }
}

fn default_early_exit_priority_threshold() -> i32 {
    50
}

fn default_early_exit_confidence_threshold() -> f64 {
    0.9
}

fn default_batch_size() -> usize {
    100
}

/// What `retag_company` and `tag_one`/`tag_many` do when a transaction
/// already carries a manually-set tag (§9 Open Questions: the engine
/// currently overwrites manual overrides on re-tagging; this is preserved
/// rather than fixed, and surfaced here as an explicit, documented knob).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualOverridePolicy {
    /// Re-tagging replaces a manual override, same as an automatic one.
    #[default]
    Overwrite,
    /// Re-tagging skips any transaction currently carrying a manual override.
    Preserve,
}

/// Engine-tunable configuration (§2 item 10 of SPEC_FULL.md).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Rules with `priority` below this threshold are eligible for the
    /// early-exit short-circuit in step 4.e of the engine algorithm.
    pub early_exit_priority_threshold: i32,
    /// ...and only when the winning tag's confidence exceeds this threshold.
    pub early_exit_confidence_threshold: f64,
    pub manual_override_policy: ManualOverridePolicy,
    /// Default chunk size for `TaggingService::tag_many` when the caller
    /// does not specify one.
    pub default_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            early_exit_priority_threshold: default_early_exit_priority_threshold(),
            early_exit_confidence_threshold: default_early_exit_confidence_threshold(),
            manual_override_policy: ManualOverridePolicy::default(),
            default_batch_size: default_batch_size(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `<config_dir>/settings.json`, falling back to
    /// defaults when the file is absent or malformed, with environment
    /// variables taking precedence over either.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let settings_path = config_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        let mut config = Self {
            early_exit_priority_threshold: raw.engine.early_exit_priority_threshold,
            early_exit_confidence_threshold: raw.engine.early_exit_confidence_threshold,
            manual_override_policy: raw.engine.manual_override_policy,
            default_batch_size: raw.engine.default_batch_size,
        };

        if let Some(value) = env_parsed::<i32>("AUTOTAG_EARLY_EXIT_PRIORITY_THRESHOLD") {
            config.early_exit_priority_threshold = value;
        }
        if let Some(value) = env_parsed::<f64>("AUTOTAG_EARLY_EXIT_CONFIDENCE_THRESHOLD") {
            config.early_exit_confidence_threshold = value;
        }
        if let Some(value) = env_parsed::<usize>("AUTOTAG_DEFAULT_BATCH_SIZE") {
            config.default_batch_size = value;
        }
        if let Ok(raw_policy) = std::env::var("AUTOTAG_MANUAL_OVERRIDE_POLICY") {
            config.manual_override_policy = match raw_policy.as_str() {
                "preserve" => ManualOverridePolicy::Preserve,
                "overwrite" => ManualOverridePolicy::Overwrite,
                _ => config.manual_override_policy,
            };
        }

        Ok(config)
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_engine_algorithm_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.early_exit_priority_threshold, 50);
        assert_eq!(config.early_exit_confidence_threshold, 0.9);
        assert_eq!(config.manual_override_policy, ManualOverridePolicy::Overwrite);
    }

    #[test]
    fn load_falls_back_to_defaults_when_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(dir.path()).unwrap();
        assert_eq!(config.early_exit_priority_threshold, 50);
    }

    #[test]
    fn load_reads_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"engine": {"earlyExitPriorityThreshold": 10, "manualOverridePolicy": "preserve"}}"#,
        )
        .unwrap();
        let config = EngineConfig::load(dir.path()).unwrap();
        assert_eq!(config.early_exit_priority_threshold, 10);
        assert_eq!(config.manual_override_policy, ManualOverridePolicy::Preserve);
    }
}
