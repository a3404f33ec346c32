//! Container discovery and layout.
//!
//! A container is the directory holding the hidden control plane `.grove/`
//! plus one sibling directory per slot:
//!
//! ```text
//! ./
//!   .grove/
//!     repo/                  bare repository
//!     state.toml  config.toml  lock
//!     stashes/*.toml  stashes/archive/*.patch(.zst)
//!     shared/**  templates/**  hooks/post-checkout
//!   amber-fox-glen/          slot
//!   briar-owl-mesa/          slot
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::GroveError;

/// Name of the hidden control-plane directory.
pub const CONTROL_DIR: &str = ".grove";

#[derive(Debug, Clone)]
pub struct Container {
    root: PathBuf,
}

impl Container {
    /// Locate the container by walking up from `start`.
    pub fn locate(start: &Path) -> Result<Self> {
        let start = dunce::canonicalize(start)
            .with_context(|| format!("failed to resolve {}", start.display()))?;
        for dir in start.ancestors() {
            if dir.join(CONTROL_DIR).is_dir() {
                return Ok(Self {
                    root: dir.to_path_buf(),
                });
            }
        }
        Err(GroveError::NotInContainer.into())
    }

    /// Wrap an existing container root without searching.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn control_dir(&self) -> PathBuf {
        self.root.join(CONTROL_DIR)
    }

    pub fn repo_dir(&self) -> PathBuf {
        self.control_dir().join("repo")
    }

    pub fn state_path(&self) -> PathBuf {
        self.control_dir().join("state.toml")
    }

    pub fn config_path(&self) -> PathBuf {
        self.control_dir().join("config.toml")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.control_dir().join("lock")
    }

    pub fn stashes_dir(&self) -> PathBuf {
        self.control_dir().join("stashes")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.stashes_dir().join("archive")
    }

    pub fn shared_dir(&self) -> PathBuf {
        self.control_dir().join("shared")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.control_dir().join("templates")
    }

    pub fn hooks_dir(&self) -> PathBuf {
        self.control_dir().join("hooks")
    }

    pub fn slot_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Fail with [`GroveError::ContainerCorrupted`] if the bare repository
    /// is gone.
    pub fn verify(&self) -> Result<()> {
        let repo = self.repo_dir();
        if !repo.is_dir() {
            return Err(GroveError::ContainerCorrupted {
                missing: format!("{}/repo", CONTROL_DIR),
            }
            .into());
        }
        Ok(())
    }

    /// Names of sibling directories that could be slots: directories only,
    /// dot-entries (including the control plane) excluded.
    pub fn slot_candidates(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("failed to list {}", self.root.display()))?;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            names.push(name.to_string());
        }
        names.sort();
        Ok(names)
    }
}
