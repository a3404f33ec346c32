//! Typed wrapper over the subset of git the slot engine uses.
//!
//! Two handle types mirror git's own split: [`Repository`] runs commands in
//! the container's bare repository, [`WorkingTree`] runs them inside one
//! slot. Every invocation sets its working directory explicitly.

use std::path::PathBuf;

use anyhow::Result;

mod repository;
mod working_tree;

pub use repository::Repository;
pub use working_tree::{StashApply, WorkingTree};

/// One entry of `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub head: String,
    /// Checked-out branch; `None` for detached HEAD (and for the bare entry).
    pub branch: Option<String>,
    pub bare: bool,
    pub detached: bool,
}

impl WorktreeInfo {
    pub(crate) fn parse_porcelain_list(output: &str) -> Result<Vec<Self>> {
        let mut worktrees = Vec::new();
        let mut current: Option<WorktreeInfo> = None;

        for line in output.lines() {
            if line.is_empty() {
                if let Some(wt) = current.take() {
                    worktrees.push(wt);
                }
                continue;
            }

            let (key, value) = match line.split_once(' ') {
                Some((k, v)) => (k, Some(v)),
                None => (line, None),
            };

            match key {
                "worktree" => {
                    if let Some(wt) = current.take() {
                        worktrees.push(wt);
                    }
                    let path = value
                        .ok_or_else(|| anyhow::anyhow!("worktree line missing path"))?;
                    current = Some(WorktreeInfo {
                        path: PathBuf::from(path),
                        head: String::new(),
                        branch: None,
                        bare: false,
                        detached: false,
                    });
                }
                key => match (key, current.as_mut()) {
                    ("HEAD", Some(wt)) => {
                        wt.head = value
                            .ok_or_else(|| anyhow::anyhow!("HEAD line missing SHA"))?
                            .to_string();
                    }
                    ("branch", Some(wt)) => {
                        let branch_ref =
                            value.ok_or_else(|| anyhow::anyhow!("branch line missing ref"))?;
                        wt.branch = Some(
                            branch_ref
                                .strip_prefix("refs/heads/")
                                .unwrap_or(branch_ref)
                                .to_string(),
                        );
                    }
                    ("bare", Some(wt)) => wt.bare = true,
                    ("detached", Some(wt)) => wt.detached = true,
                    // locked/prunable and future attributes are irrelevant here
                    _ => {}
                },
            }
        }

        if let Some(wt) = current {
            worktrees.push(wt);
        }

        Ok(worktrees)
    }
}
