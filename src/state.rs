//! Persisted container state (`.grove/state.toml`).
//!
//! State is a cache of ground truth, not the source of it: the reconciler
//! can rebuild the slot table from Git's worktree registry and the
//! filesystem. A state file that fails to parse is therefore not fatal —
//! the loader warns and returns defaults.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::styling::warning_message;
use crate::utils::atomic_write;

/// Per-slot record. A vacant slot (detached HEAD on disk) has no `branch`
/// and the key is omitted from the serialized table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub last_used_at: DateTime<Utc>,
    #[serde(default)]
    pub pinned: bool,
}

impl SlotRecord {
    pub fn vacant(now: DateTime<Utc>) -> Self {
        Self {
            branch: None,
            last_used_at: now,
            pinned: false,
        }
    }

    pub fn is_vacant(&self) -> bool {
        self.branch.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub branch: String,
    pub last_checkout_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fetch_at: Option<DateTime<Utc>>,
    /// Slot table in insertion order; order is meaningful (vacant-slot
    /// selection walks it front to back).
    pub slots: IndexMap<String, SlotRecord>,
    /// Most recent first, at most one entry per branch.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub branch_history: Vec<HistoryEntry>,
}

impl State {
    /// Load from `path`. Missing file or parse failure yields defaults;
    /// a parse failure additionally warns (reconciliation repopulates the
    /// slot table from Git).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        match toml::from_str(&contents) {
            Ok(state) => Ok(state),
            Err(e) => {
                eprintln!(
                    "{}",
                    warning_message(format!(
                        "State file {} is unreadable ({}); starting from scratch",
                        path.display(),
                        e.message()
                    ))
                );
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize state")?;
        atomic_write(path, &contents)
    }

    /// Slot currently holding `branch`, if any.
    pub fn slot_for_branch(&self, branch: &str) -> Option<&str> {
        self.slots
            .iter()
            .find(|(_, slot)| slot.branch.as_deref() == Some(branch))
            .map(|(name, _)| name.as_str())
    }

    /// Whether the user has checked this branch out through grove before.
    ///
    /// This is the first-encounter signal; the ref database cannot provide
    /// it because a bare clone pre-populates `refs/heads/*`.
    pub fn branch_in_history(&self, branch: &str) -> bool {
        self.branch_history.iter().any(|e| e.branch == branch)
    }

    /// Record a checkout of `branch`: dedupe and unshift a fresh entry.
    pub fn record_checkout(&mut self, branch: &str, now: DateTime<Utc>) {
        self.branch_history.retain(|e| e.branch != branch);
        self.branch_history.insert(
            0,
            HistoryEntry {
                branch: branch.to_string(),
                last_checkout_at: now,
            },
        );
    }
}
