//! Slot and stash listing.
//!
//! Read-only: no lock is taken. Dirty checks are independent per slot and
//! fan out in parallel.

use anyhow::Result;
use chrono::Utc;
use color_print::cformat;
use rayon::prelude::*;

use crate::container::Container;
use crate::git::Repository;
use crate::state::State;
use crate::stash::{self, StashStatus};
use crate::styling::{humanize_age, DIM, PINNED};

pub fn handle_list() -> Result<()> {
    let container = Container::locate(&std::env::current_dir()?)?;
    container.verify()?;
    let repo = Repository::at(container.repo_dir());
    let state = State::load(&container.state_path())?;
    let now = Utc::now();

    let cwd = std::env::current_dir()
        .ok()
        .and_then(|p| dunce::canonicalize(p).ok());

    let entries: Vec<(String, crate::state::SlotRecord)> = state
        .slots
        .iter()
        .map(|(name, slot)| (name.clone(), slot.clone()))
        .collect();

    let dirty_flags: Vec<bool> = entries
        .par_iter()
        .map(|(name, slot)| {
            if slot.is_vacant() {
                return false;
            }
            repo.worktree(container.slot_dir(name))
                .is_dirty()
                .unwrap_or(false)
        })
        .collect();

    for ((name, slot), dirty) in entries.iter().zip(dirty_flags) {
        let here = cwd
            .as_deref()
            .map(|c| c.starts_with(container.slot_dir(name)))
            .unwrap_or(false);
        let marker = if here { "@" } else { " " };
        let pin = if slot.pinned {
            format!(" {PINNED}[pinned]{PINNED:#}")
        } else {
            String::new()
        };
        let branch = match &slot.branch {
            Some(branch) if dirty => cformat!("<bold>{branch}</> <yellow>*</>"),
            Some(branch) => cformat!("<bold>{branch}</>"),
            None => cformat!("<dim>(vacant)</>"),
        };
        println!(
            "{marker} {name:<24} {branch}{pin}  {DIM}{}{DIM:#}",
            humanize_age(now - slot.last_used_at)
        );
    }

    let records = stash::list_records(&container)?;
    if !records.is_empty() {
        println!();
        println!("{}", cformat!("<cyan>STASHES</>"));
        for record in records {
            let status = match record.status {
                StashStatus::Active => cformat!("<green>active</>"),
                StashStatus::Archived => cformat!("<dim>archived</>"),
            };
            println!(
                "  {:<24} {status}  {}",
                record.branch,
                cformat!(
                    "<bright-black>saved {}, used {}</>",
                    humanize_age(now - record.created_at),
                    humanize_age(now - record.last_used_at)
                )
            );
        }
    }

    Ok(())
}
