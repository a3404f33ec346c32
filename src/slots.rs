//! Slot lifecycle: creation, selection, eviction, count adjustment.

use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;

use crate::config::Config;
use crate::container::Container;
use crate::error::GroveError;
use crate::git::Repository;
use crate::names;
use crate::overlay;
use crate::state::{SlotRecord, State};
use crate::stash;
use crate::templates;

/// The commit new vacant slots start from: the remote default branch when
/// its tracking ref exists, otherwise whatever HEAD points at.
pub fn base_commit(repo: &Repository) -> Result<String> {
    if let Ok(default) = repo.default_branch() {
        if repo.remote_branch_exists(&default)? {
            return Ok(format!("origin/{default}"));
        }
    }
    Ok("HEAD".to_string())
}

/// Pick the slot a checkout should land in.
///
/// Priority: the first vacant slot in state order, then the least recently
/// used non-pinned slot. Pinned slots are never evicted; if nothing else
/// remains the operation fails.
pub fn select_slot_for_checkout(state: &State) -> Result<String> {
    if let Some((name, _)) = state.slots.iter().find(|(_, slot)| slot.is_vacant()) {
        return Ok(name.clone());
    }

    state
        .slots
        .iter()
        .filter(|(_, slot)| !slot.pinned)
        .min_by_key(|(_, slot)| slot.last_used_at)
        .map(|(name, _)| name.clone())
        .ok_or_else(|| GroveError::AllPinned.into())
}

/// Create `count` fresh detached worktrees, returning their names.
pub fn create_slots(
    repo: &Repository,
    container: &Container,
    count: usize,
    commit: &str,
    forbidden: &mut HashSet<String>,
) -> Result<Vec<String>> {
    let mut created = Vec::with_capacity(count);
    for _ in 0..count {
        let name = names::fresh_name(forbidden)?;
        repo.worktree_add_detached(&container.slot_dir(&name), commit)?;
        forbidden.insert(name.clone());
        created.push(name);
    }
    Ok(created)
}

/// Grow or shrink the slot set to match `config.slot_count`.
pub fn adjust_slot_count(
    repo: &Repository,
    container: &Container,
    state: &mut State,
    config: &Config,
) -> Result<()> {
    let current = state.slots.len();
    let target = config.slot_count;

    if target == current {
        return Ok(());
    }

    if target > current {
        grow(repo, container, state, config, target - current)
    } else {
        shrink(repo, container, state, config, current - target)
    }
}

fn grow(
    repo: &Repository,
    container: &Container,
    state: &mut State,
    config: &Config,
    count: usize,
) -> Result<()> {
    let commit = base_commit(repo)?;
    let mut forbidden: HashSet<String> = state.slots.keys().cloned().collect();
    forbidden.extend(container.slot_candidates()?);

    let created = create_slots(repo, container, count, &commit, &mut forbidden)?;
    let now = Utc::now();
    for name in created {
        state.slots.insert(name.clone(), SlotRecord::vacant(now));
        templates::expand_all(
            &container.templates_dir(),
            &config.templates,
            &container.slot_dir(&name),
            &name,
            None,
        )?;
        let wt = repo.worktree(container.slot_dir(&name));
        overlay::establish(&wt, &container.shared_dir(), &config.shared)?;
    }
    Ok(())
}

fn shrink(
    repo: &Repository,
    container: &Container,
    state: &mut State,
    config: &Config,
    count: usize,
) -> Result<()> {
    let target = config.slot_count;
    let pinned = state.slots.values().filter(|slot| slot.pinned).count();
    if pinned > target {
        return Err(GroveError::SlotCountTooLow { pinned, target }.into());
    }

    // Evict coldest first; among equal timestamps (fresh init) vacant slots
    // go before the one that has been checked out into.
    let mut evictable: Vec<(String, SlotRecord)> = state
        .slots
        .iter()
        .filter(|(_, slot)| !slot.pinned)
        .map(|(name, slot)| (name.clone(), slot.clone()))
        .collect();
    evictable.sort_by_key(|(_, slot)| (slot.last_used_at, !slot.is_vacant()));

    for (name, slot) in evictable.into_iter().take(count) {
        if let Some(branch) = &slot.branch {
            let saved = stash::save(repo, container, &config.shared, branch, &name)?;
            if saved {
                let wt = repo.worktree(container.slot_dir(&name));
                wt.hard_reset()?;
                wt.clean_untracked()?;
            }
        }
        repo.worktree_remove(&container.slot_dir(&name))?;
        state.slots.shift_remove(&name);
    }
    Ok(())
}
