//! Reconciliation of state, git's worktree registry, and the filesystem.
//!
//! Slots can be mutated behind grove's back: a user `rm -rf`s a slot's
//! contents, a crash leaves state half-written, an external `git worktree`
//! call registers or prunes paths. Every top-level operation re-enters
//! through [`reconcile`], which repairs the known drift cases in one pass
//! and persists the result. It is silent except for orphan-directory
//! warnings.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::container::Container;
use crate::git::{Repository, WorktreeInfo};
use crate::slots::base_commit;
use crate::state::{SlotRecord, State};
use crate::styling::warning_message;

/// Bring `state` into agreement with ground truth and persist it.
pub fn reconcile(repo: &Repository, container: &Container, state: &mut State) -> Result<()> {
    let container_root = dunce::canonicalize(container.root())
        .unwrap_or_else(|_| container.root().to_path_buf());

    // Registered sibling worktrees, keyed by directory name.
    let mut registered: HashMap<String, WorktreeInfo> = HashMap::new();
    for wt in repo.list_worktrees()? {
        let parent_matches = wt
            .path
            .parent()
            .and_then(|p| dunce::canonicalize(p).ok())
            .map(|p| p == container_root)
            .unwrap_or(false);
        if !parent_matches {
            continue;
        }
        if let Some(name) = wt.path.file_name().and_then(|n| n.to_str()) {
            registered.insert(name.to_string(), wt);
        }
    }

    let on_disk = container.slot_candidates()?;
    let mut prune_needed = false;

    for name in &on_disk {
        let dir = container.slot_dir(name);
        let is_registered = registered.contains_key(name);
        let known = is_registered || state.slots.contains_key(name);
        let has_pointer = dir.join(".git").exists();

        if known && !has_pointer {
            // Corrupted slot: its contents (including the .git pointer)
            // were deleted. Rebuild it as a fresh vacant worktree.
            if repair_slot(repo, container, name).is_ok() {
                let entry = state
                    .slots
                    .entry(name.clone())
                    .or_insert_with(|| SlotRecord::vacant(epoch()));
                entry.branch = None;
            } else {
                state.slots.shift_remove(name);
            }
            continue;
        }

        match registered.get(name) {
            Some(info) => {
                // Disk and registry agree; state follows git's HEAD while
                // pinned and last_used_at survive from the old entry.
                let branch = if info.detached { None } else { info.branch.clone() };
                let entry = state
                    .slots
                    .entry(name.clone())
                    .or_insert_with(|| SlotRecord::vacant(epoch()));
                entry.branch = branch;
            }
            None => {
                eprintln!(
                    "{}",
                    warning_message(format!(
                        "{} is not a registered worktree; leaving it alone",
                        dir.display()
                    ))
                );
                state.slots.shift_remove(name);
            }
        }
    }

    // State entries and registrations whose directory is gone.
    let stale: Vec<String> = state
        .slots
        .keys()
        .filter(|name| !on_disk.contains(*name))
        .cloned()
        .collect();
    for name in stale {
        state.slots.shift_remove(&name);
    }
    for name in registered.keys() {
        if !on_disk.contains(name) {
            prune_needed = true;
        }
    }

    if prune_needed {
        repo.worktree_prune()?;
    }

    state.save(&container.state_path())
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// Replace a gutted slot directory with a fresh vacant worktree.
///
/// Only an empty directory is removed; anything else fails the repair and
/// the caller drops the slot from state instead.
fn repair_slot(repo: &Repository, container: &Container, name: &str) -> Result<()> {
    let dir = container.slot_dir(name);
    std::fs::remove_dir(&dir)?;
    repo.worktree_prune()?;
    let commit = base_commit(repo)?;
    repo.worktree_add_detached(&dir, &commit)?;
    Ok(())
}
