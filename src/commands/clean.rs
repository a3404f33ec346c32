//! Container housekeeping.
//!
//! Repairs drift (reconcile + prune), removes dangling overlay links, and
//! deletes stash metadata that no longer points at anything restorable.

use anyhow::Result;
use color_print::cformat;

use crate::config::Config;
use crate::container::Container;
use crate::git::Repository;
use crate::lock::Lock;
use crate::overlay;
use crate::reconcile::reconcile;
use crate::state::State;
use crate::stash::{self, StashStatus};
use crate::styling::success_message;

pub fn handle_clean() -> Result<()> {
    let container = Container::locate(&std::env::current_dir()?)?;
    container.verify()?;
    let _lock = Lock::acquire(&container.lock_path())?;

    let repo = Repository::at(container.repo_dir());
    let config = Config::load(&container.config_path())?;
    let mut state = State::load(&container.state_path())?;

    reconcile(&repo, &container, &mut state)?;
    repo.worktree_prune()?;

    let mut dangling = 0;
    for name in state.slots.keys() {
        dangling += overlay::clean_dangling(&container.slot_dir(name), &config.shared)?;
    }

    // A stash record is only worth keeping while something can be restored
    // from it: the anchor ref for active records, the patch file for
    // archived ones.
    let mut dropped = Vec::new();
    for record in stash::list_records(&container)? {
        let restorable = match record.status {
            StashStatus::Active => repo.ref_exists(&stash::anchor_ref(&record.branch))?,
            StashStatus::Archived => record
                .archive_path
                .as_ref()
                .map(|p| std::path::Path::new(p).exists())
                .unwrap_or(false),
        };
        if !restorable {
            stash::drop(&repo, &container, &record.branch)?;
            dropped.push(record.branch);
        }
    }

    let mut parts = Vec::new();
    if dangling > 0 {
        parts.push(format!("{dangling} dangling links"));
    }
    if !dropped.is_empty() {
        parts.push(format!("{} dead stash records", dropped.len()));
    }
    let summary = if parts.is_empty() {
        "Nothing to clean".to_string()
    } else {
        cformat!("Removed {}", parts.join(" and "))
    };
    eprintln!("{}", success_message(summary));
    Ok(())
}
