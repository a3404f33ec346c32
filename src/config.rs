//! User configuration (`.grove/config.toml`).
//!
//! A missing file yields defaults; missing fields default individually so
//! configs written by older versions keep loading. Unknown keys are ignored
//! for the same reason. Parse errors here are fatal — unlike the state file,
//! a broken config cannot be regenerated from Git.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::atomic_write;

pub const DEFAULT_SLOT_COUNT: usize = 5;
pub const DEFAULT_ARCHIVE_AFTER_DAYS: i64 = 7;
pub const DEFAULT_FETCH_COOLDOWN_MINUTES: i64 = 10;

/// One template rule: `source` under `.grove/templates/`, `target` relative
/// to each slot root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRule {
    pub source: String,
    pub target: String,
}

/// Files and directories fanned out into every slot as symlinks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedConfig {
    pub directories: Vec<String>,
    pub files: Vec<String>,
}

impl SharedConfig {
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub slot_count: usize,
    pub archive_after_days: i64,
    pub fetch_cooldown_minutes: i64,
    pub shared: SharedConfig,
    // Omitted from output when empty so users can append [[templates]]
    // tables by hand without fighting the writer.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<TemplateRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            archive_after_days: DEFAULT_ARCHIVE_AFTER_DAYS,
            fetch_cooldown_minutes: DEFAULT_FETCH_COOLDOWN_MINUTES,
            shared: SharedConfig::default(),
            templates: Vec::new(),
        }
    }
}

impl Config {
    /// Load from `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).context("failed to serialize config")?;
        atomic_write(path, &contents)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.slot_count >= 1,
            "slot_count must be at least 1 (got {})",
            self.slot_count
        );
        Ok(())
    }
}
