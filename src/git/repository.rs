//! Repository-level git operations (run inside the container's bare repo).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::GroveError;
use crate::exec::{path_context, Cmd};

use super::{WorkingTree, WorktreeInfo};

/// Handle on the container's bare repository.
#[derive(Debug, Clone)]
pub struct Repository {
    dir: PathBuf,
}

impl Repository {
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A worktree handle for one slot directory.
    pub fn worktree(&self, path: impl Into<PathBuf>) -> WorkingTree<'_> {
        WorkingTree::new(self, path.into())
    }

    /// Clone `url` as a bare repository at `dest` and wire up the
    /// remote-tracking namespace a plain `--bare` clone omits.
    pub fn clone_bare(url: &str, dest: &Path) -> Result<Self> {
        let parent = dest
            .parent()
            .with_context(|| format!("{} has no parent directory", dest.display()))?;
        let output = Cmd::new("git")
            .args(["clone", "--bare", url])
            .arg(dest)
            .current_dir(parent)
            .context(path_context(parent))
            .run()
            .context("failed to execute git clone")?;
        if !output.status.success() {
            return Err(GroveError::GitExit {
                code: output.status.code().unwrap_or(1),
                stderr: None,
            }
            .into());
        }

        let repo = Self::at(dest);
        repo.set_config("remote.origin.fetch", "+refs/heads/*:refs/remotes/origin/*")?;
        Ok(repo)
    }

    // =========================================================================
    // Command plumbing
    // =========================================================================

    fn logging_context(&self) -> String {
        path_context(&self.dir)
    }

    /// Run git and return stdout. Stderr streams to the user; a non-zero
    /// exit becomes [`GroveError::GitExit`] with no added text.
    pub(crate) fn run(&self, args: &[&str]) -> Result<String> {
        let output = Cmd::new("git")
            .args(args.iter().copied())
            .current_dir(&self.dir)
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

    /// Run git with stderr discarded and report only whether it succeeded.
    /// For probes whose failure is an expected answer, not an error.
    fn run_check(&self, args: &[&str]) -> Result<bool> {
        let output = Cmd::new("git")
            .args(args.iter().copied())
            .current_dir(&self.dir)
            .context(self.logging_context())
            .quiet()
            .run()
            .with_context(|| format!("failed to execute: git {}", args.join(" ")))?;
        Ok(output.status.success())
    }

    /// Like [`run`](Self::run) but with stderr discarded, for probes whose
    /// stdout matters and whose failure is expected.
    fn run_quiet(&self, args: &[&str]) -> Result<Option<String>> {
        let output = Cmd::new("git")
            .args(args.iter().copied())
            .current_dir(&self.dir)
            .context(self.logging_context())
            .quiet()
            .run()
            .with_context(|| format!("failed to execute: git {}", args.join(" ")))?;
        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
        } else {
            Ok(None)
        }
    }

    // =========================================================================
    // Remote operations
    // =========================================================================

    pub fn fetch(&self) -> Result<()> {
        self.run(&["fetch", "--all", "--prune"])?;
        Ok(())
    }

    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.run(&["config", key, value])?;
        Ok(())
    }

    /// Point `refs/remotes/origin/HEAD` at whatever the remote calls its
    /// default branch.
    pub fn remote_set_head_auto(&self) -> Result<()> {
        self.run(&["remote", "set-head", "origin", "--auto"])?;
        Ok(())
    }

    // =========================================================================
    // Worktree registry
    // =========================================================================

    /// Register a new detached worktree at `path`.
    pub fn worktree_add_detached(&self, path: &Path, commit: &str) -> Result<()> {
        let path_str = path
            .to_str()
            .with_context(|| format!("worktree path is not UTF-8: {}", path.display()))?;
        self.run(&["worktree", "add", "--detach", path_str, commit])?;
        Ok(())
    }

    pub fn worktree_remove(&self, path: &Path) -> Result<()> {
        let path_str = path
            .to_str()
            .with_context(|| format!("worktree path is not UTF-8: {}", path.display()))?;
        self.run(&["worktree", "remove", "--force", path_str])?;
        Ok(())
    }

    pub fn worktree_prune(&self) -> Result<()> {
        self.run(&["worktree", "prune"])?;
        Ok(())
    }

    /// List registered worktrees, excluding the bare entry itself.
    pub fn list_worktrees(&self) -> Result<Vec<WorktreeInfo>> {
        let stdout = self.run(&["worktree", "list", "--porcelain"])?;
        let all = WorktreeInfo::parse_porcelain_list(&stdout)?;
        Ok(all.into_iter().filter(|wt| !wt.bare).collect())
    }

    // =========================================================================
    // Refs
    // =========================================================================

    pub fn ref_exists(&self, name: &str) -> Result<bool> {
        self.run_check(&["show-ref", "--verify", "--quiet", name])
    }

    pub fn branch_exists(&self, branch: &str) -> Result<bool> {
        self.ref_exists(&format!("refs/heads/{branch}"))
    }

    pub fn remote_branch_exists(&self, branch: &str) -> Result<bool> {
        self.ref_exists(&format!("refs/remotes/origin/{branch}"))
    }

    /// Whether `rev` resolves to anything.
    pub fn verify_revision(&self, rev: &str) -> Result<bool> {
        self.run_check(&["rev-parse", "--verify", "--quiet", rev])
    }

    pub fn update_ref(&self, name: &str, hash: &str) -> Result<()> {
        self.run(&["update-ref", name, hash])?;
        Ok(())
    }

    /// Delete a ref, ignoring absence.
    pub fn delete_ref(&self, name: &str) -> Result<()> {
        self.run_check(&["update-ref", "-d", name])?;
        Ok(())
    }

    /// Resolve `<rev>^3`, the untracked-files parent a stash commit has
    /// when untracked files were captured.
    pub fn third_parent(&self, rev: &str) -> Result<Option<String>> {
        Ok(self
            .run_quiet(&["rev-parse", "--verify", "--quiet", &format!("{rev}^3")])?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    /// The default branch: `origin/HEAD` symref, then `main`, then
    /// `master`, then the first remote-tracking branch.
    pub fn default_branch(&self) -> Result<String> {
        if let Some(symref) = self.run_quiet(&["symbolic-ref", "refs/remotes/origin/HEAD"])? {
            if let Some(branch) = symref.trim().strip_prefix("refs/remotes/origin/") {
                if !branch.is_empty() {
                    return Ok(branch.to_string());
                }
            }
        }

        for candidate in ["main", "master"] {
            if self.branch_exists(candidate)? {
                return Ok(candidate.to_string());
            }
        }

        let refs = self.run(&[
            "for-each-ref",
            "--format=%(refname:strip=3)",
            "refs/remotes/origin",
        ])?;
        refs.lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && *line != "HEAD")
            .map(String::from)
            .context("repository has no branches to use as a default")
    }

    // =========================================================================
    // Diff exports (for stash archival)
    // =========================================================================

    /// Binary patch between two commits. Runs against the bare repository —
    /// `stash show` would not, it needs a working tree.
    pub fn diff_binary(&self, from: &str, to: &str) -> Result<String> {
        self.run(&["diff", "--binary", from, to])
    }

    /// Patch of a root commit's full tree (`--root` because a stash's
    /// untracked parent has no parents of its own).
    pub fn diff_tree_root(&self, rev: &str) -> Result<String> {
        self.run(&[
            "diff-tree",
            "--root",
            "-r",
            "-p",
            "--binary",
            "--no-commit-id",
            rev,
        ])
    }

}
