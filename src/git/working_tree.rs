//! Per-slot git operations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::GroveError;
use crate::exec::{path_context, Cmd};

use super::Repository;

/// Outcome of applying a stash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StashApply {
    Applied,
    /// Exit code 1: the apply left conflict markers; the stash is intact.
    Conflict,
}

/// A borrowed handle for running git inside one slot directory.
#[derive(Debug)]
#[must_use]
pub struct WorkingTree<'a> {
    #[allow(dead_code)]
    repo: &'a Repository,
    path: PathBuf,
}

impl<'a> WorkingTree<'a> {
    pub(super) fn new(repo: &'a Repository, path: PathBuf) -> Self {
        Self { repo, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn logging_context(&self) -> String {
        path_context(&self.path)
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Cmd::new("git")
            .args(args.iter().copied())
            .current_dir(&self.path)
            .context(self.logging_context())
            .run()
            .with_context(|| format!("failed to execute: git {}", args.join(" ")))?;
        if !output.status.success() {
            return Err(GroveError::GitExit {
                code: output.status.code().unwrap_or(1),
                stderr: None,
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run_check(&self, args: &[&str]) -> Result<bool> {
        let output = Cmd::new("git")
            .args(args.iter().copied())
            .current_dir(&self.path)
            .context(self.logging_context())
            .quiet()
            .run()
            .with_context(|| format!("failed to execute: git {}", args.join(" ")))?;
        Ok(output.status.success())
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Checked-out branch, or `None` for detached HEAD.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let stdout = self.run(&["branch", "--show-current"])?;
        let branch = stdout.trim();
        Ok(if branch.is_empty() {
            None
        } else {
            Some(branch.to_string())
        })
    }

    pub fn current_commit(&self) -> Result<String> {
        Ok(self.run(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    pub fn status_porcelain(&self) -> Result<String> {
        self.run(&["status", "--porcelain"])
    }

    pub fn is_dirty(&self) -> Result<bool> {
        Ok(!self.status_porcelain()?.trim().is_empty())
    }

    /// Whether `path` (relative to the slot root) is tracked on the current
    /// branch. Exit code only; git's "did not match" noise never reaches
    /// the user.
    pub fn is_tracked(&self, path: &Path) -> Result<bool> {
        let path_str = path
            .to_str()
            .with_context(|| format!("path is not UTF-8: {}", path.display()))?;
        self.run_check(&["ls-files", "--error-unmatch", "--", path_str])
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Plain `git checkout <branch>` with stderr captured.
    ///
    /// This is the probe in the checkout fallback chain: on failure the
    /// caller either falls back to a tracking checkout or replays the
    /// captured stderr verbatim. Success chatter ("Switched to branch…")
    /// is dropped; grove prints its own summary.
    pub fn checkout(&self, branch: &str) -> Result<()> {
        let output = Cmd::new("git")
            .args(["checkout", branch])
            .current_dir(&self.path)
            .context(self.logging_context())
            .capture_stderr()
            .run()
            .context("failed to execute git checkout")?;
        if !output.status.success() {
            return Err(GroveError::GitExit {
                code: output.status.code().unwrap_or(1),
                stderr: Some(String::from_utf8_lossy(&output.stderr).into_owned()),
            }
            .into());
        }
        Ok(())
    }

    pub fn checkout_detach(&self) -> Result<()> {
        self.run(&["checkout", "--detach"])?;
        Ok(())
    }

    pub fn checkout_create(&self, branch: &str, start_point: &str) -> Result<()> {
        self.run(&["checkout", "-b", branch, start_point])?;
        Ok(())
    }

    /// Create a local branch tracking `origin/<branch>` and check it out.
    pub fn checkout_track(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", "--track", &format!("origin/{branch}")])?;
        Ok(())
    }

    // =========================================================================
    // Working-tree surgery
    // =========================================================================

    pub fn hard_reset(&self) -> Result<()> {
        self.run(&["reset", "--hard"])?;
        Ok(())
    }

    pub fn clean_untracked(&self) -> Result<()> {
        self.run(&["clean", "-fd"])?;
        Ok(())
    }

    /// Capture the dirty state (tracked and untracked) as a stash commit
    /// and clean the working tree, returning the commit hash.
    ///
    /// `stash push --include-untracked` is the only variant that does both
    /// atomically; the `stash create` family neither cleans the tree nor
    /// reliably includes untracked files. The entry is immediately dropped
    /// from the stash stack — the caller anchors the commit with its own
    /// ref, and the stack must not grow.
    pub fn stash_push_untracked(&self) -> Result<String> {
        self.run(&["stash", "push", "--include-untracked"])?;
        let hash = self.run(&["rev-parse", "refs/stash"])?.trim().to_string();
        self.run(&["stash", "drop"])?;
        Ok(hash)
    }

    /// Apply a stash commit, distinguishing conflicts (exit code 1) from
    /// other failures.
    pub fn stash_apply(&self, stash_ref: &str) -> Result<StashApply> {
        let output = Cmd::new("git")
            .args(["stash", "apply", stash_ref])
            .current_dir(&self.path)
            .context(self.logging_context())
            .run()
            .context("failed to execute git stash apply")?;
        match output.status.code() {
            Some(0) => Ok(StashApply::Applied),
            Some(1) => Ok(StashApply::Conflict),
            code => Err(GroveError::GitExit {
                code: code.unwrap_or(1),
                stderr: None,
            }
            .into()),
        }
    }
}
