//! The end-to-end checkout flow.
//!
//! Order matters and is observable: reconcile, adjust, fetch, archive scan,
//! eviction, checkout, restore, templates, symlinks, state persist, nav
//! file. Everything runs under the container lock; the lock is released by
//! drop on every exit path.

use anyhow::{bail, Result};
use chrono::Utc;
use color_print::{ceprintln, cformat};

use crate::config::Config;
use crate::container::Container;
use crate::error::GroveError;
use crate::git::Repository;
use crate::lock::Lock;
use crate::overlay;
use crate::reconcile::reconcile;
use crate::slots;
use crate::state::State;
use crate::stash;
use crate::styling::{error_message, hint_message, humanize_age, success_message, warning_message};
use crate::shell;
use crate::templates;

#[derive(Debug)]
pub struct CheckoutArgs {
    pub branch: String,
    /// `-b`: create the branch instead of checking out an existing one.
    pub create: bool,
    /// Optional start point for `-b`; defaults to the remote default branch.
    pub start_point: Option<String>,
    /// `--no-restore` clears this.
    pub restore: bool,
}

pub fn handle_checkout(args: &CheckoutArgs) -> Result<()> {
    let container = Container::locate(&std::env::current_dir()?)?;
    container.verify()?;
    let _lock = Lock::acquire(&container.lock_path())?;

    let repo = Repository::at(container.repo_dir());
    let config = Config::load(&container.config_path())?;
    let mut state = State::load(&container.state_path())?;

    reconcile(&repo, &container, &mut state)?;
    if state.slots.len() != config.slot_count {
        slots::adjust_slot_count(&repo, &container, &mut state, &config)?;
    }

    maybe_fetch(&repo, &mut state, &config);
    // Adjustment and fetch are real side effects; persist them now so a
    // failing pre-check below cannot strand them outside the state file.
    state.save(&container.state_path())?;

    // Never archive the stash we are about to restore.
    match stash::archive_scan(
        &repo,
        &container,
        config.archive_after_days,
        Some(&args.branch),
    ) {
        Ok(report) if !report.archived.is_empty() => {
            ceprintln!(
                "<dim>Archived stashes for: {}</>",
                report.archived.join(", ")
            );
        }
        Err(e) => eprintln!("{}", warning_message(format!("Archive scan failed: {e:#}"))),
        _ => {}
    }

    let now = Utc::now();

    // Fast path: the branch is already in a slot.
    if !args.create {
        if let Some(slot_name) = state.slot_for_branch(&args.branch).map(String::from) {
            stash::touch(&container, &args.branch, now)?;
            if let Some(slot) = state.slots.get_mut(&slot_name) {
                slot.last_used_at = now;
            }
            state.record_checkout(&args.branch, now);
            state.save(&container.state_path())?;
            return finish(&container, &slot_name, &args.branch, &[]);
        }
    }

    // Pre-checks: everything that can fail does so before any slot is
    // touched.
    let branch_seen_before;
    if args.create {
        if repo.branch_exists(&args.branch)? {
            return Err(GroveError::BranchExists {
                branch: args.branch.clone(),
            }
            .into());
        }
        if let Some(start) = &args.start_point {
            if !repo.verify_revision(start)? {
                bail!(
                    "{}",
                    error_message(cformat!("Start point <bold>{start}</> does not exist"))
                );
            }
        }
        branch_seen_before = true; // irrelevant for -b; suppresses DWIM report
    } else {
        let local = repo.branch_exists(&args.branch)?;
        let remote = repo.remote_branch_exists(&args.branch)?;
        if !local && !remote {
            return Err(GroveError::BranchNotFound {
                branch: args.branch.clone(),
            }
            .into());
        }
        // The bare clone pre-populates refs/heads/* for every remote
        // branch, so the ref check cannot tell a first encounter from a
        // repeat; branch history can.
        branch_seen_before = state.branch_in_history(&args.branch);
    }

    let slot_name = slots::select_slot_for_checkout(&state)?;
    let slot_dir = container.slot_dir(&slot_name);
    let wt = repo.worktree(&slot_dir);
    let mut notes: Vec<String> = Vec::new();

    // Eviction.
    let previous = state.slots.get(&slot_name).and_then(|s| s.branch.clone());
    if let Some(prev_branch) = previous {
        let saved = stash::save(&repo, &container, &config.shared, &prev_branch, &slot_name)?;
        if saved {
            wt.hard_reset()?;
            wt.clean_untracked()?;
            notes.push(cformat!(
                "Stashed dirty state of <bold>{prev_branch}</>; it will be restored with the branch"
            ));
        }
        wt.checkout_detach()?;
        if let Some(slot) = state.slots.get_mut(&slot_name) {
            slot.branch = None;
        }
    }

    // Overlay off before git touches the tree.
    overlay::remove(&slot_dir, &container.shared_dir(), &config.shared)?;

    // Git checkout.
    if args.create {
        let start = match &args.start_point {
            Some(start) => start.clone(),
            None => slots::base_commit(&repo)?,
        };
        wt.checkout_create(&args.branch, &start)?;
        notes.push(cformat!("Created <bold>{}</> from {start}", args.branch));
    } else {
        match wt.checkout(&args.branch) {
            Ok(()) => {
                if !branch_seen_before && repo.remote_branch_exists(&args.branch)? {
                    notes.push(cformat!(
                        "New local branch tracking <bold>origin/{}</>",
                        args.branch
                    ));
                }
            }
            Err(original) => {
                if repo.remote_branch_exists(&args.branch)? {
                    wt.checkout_track(&args.branch)?;
                    notes.push(cformat!(
                        "New local branch tracking <bold>origin/{}</>",
                        args.branch
                    ));
                } else {
                    // Not a tracking miss: surface git's own error, unwrapped.
                    return Err(original);
                }
            }
        }
    }

    // Stash restore.
    if args.restore {
        match stash::load_record(&container, &args.branch)? {
            Some(record) if !record.is_active() => {
                notes.push(cformat!(
                    "A stash for <bold>{}</> was archived {}; see 'grove stash show {}'",
                    args.branch,
                    humanize_age(now - record.archived_at.unwrap_or(record.created_at)),
                    args.branch
                ));
            }
            _ => match stash::restore(&repo, &container, &args.branch, &slot_name)? {
                stash::Restore::Restored { created_at } => {
                    notes.push(cformat!(
                        "Restored stashed changes from {}",
                        humanize_age(now - created_at)
                    ));
                }
                stash::Restore::Conflict => {
                    notes.push(cformat!(
                        "<yellow>Stash applied with conflicts; see messages above</>"
                    ));
                }
                stash::Restore::None => {}
            },
        }
    }

    templates::expand_all(
        &container.templates_dir(),
        &config.templates,
        &slot_dir,
        &slot_name,
        Some(&args.branch),
    )?;
    overlay::establish(&wt, &container.shared_dir(), &config.shared)?;

    if let Some(slot) = state.slots.get_mut(&slot_name) {
        slot.branch = Some(args.branch.clone());
        slot.last_used_at = now;
    }
    state.record_checkout(&args.branch, now);
    state.save(&container.state_path())?;

    finish(&container, &slot_name, &args.branch, &notes)
}

/// Fetch at most once per cool-down window. Failure is non-fatal: the
/// network may simply be down, and local state is enough to proceed.
fn maybe_fetch(repo: &Repository, state: &mut State, config: &Config) {
    let now = Utc::now();
    let due = match state.last_fetch_at {
        Some(last) => now - last >= chrono::Duration::minutes(config.fetch_cooldown_minutes),
        None => true,
    };
    if !due {
        return;
    }
    match repo.fetch() {
        Ok(()) => state.last_fetch_at = Some(now),
        Err(e) => {
            eprintln!(
                "{}",
                warning_message(format!("Fetch failed; continuing with local refs ({e:#})"))
            );
        }
    }
}

/// Write the nav file and emit the summary lines.
fn finish(container: &Container, slot_name: &str, branch: &str, notes: &[String]) -> Result<()> {
    let slot_dir = container.slot_dir(slot_name);
    shell::write_nav_file(&slot_dir)?;

    for note in notes {
        eprintln!("{note}");
    }
    eprintln!(
        "{}",
        success_message(cformat!(
            "<bold>{branch}</> is in slot <bold>{slot_name}</>"
        ))
    );
    if !shell::integration_active() {
        eprintln!(
            "{}",
            hint_message(cformat!("cd {}", slot_dir.display()))
        );
    }
    Ok(())
}
