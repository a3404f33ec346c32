//! The `grove stash` subcommands.

use anyhow::{bail, Result};
use chrono::Utc;
use color_print::cformat;

use crate::container::Container;
use crate::exec::Cmd;
use crate::git::Repository;
use crate::lock::Lock;
use crate::stash::{self, Restore, StashStatus};
use crate::styling::{error_message, hint_message, humanize_age, success_message};

pub fn handle_stash_list() -> Result<()> {
    let container = Container::locate(&std::env::current_dir()?)?;
    let now = Utc::now();

    let records = stash::list_records(&container)?;
    if records.is_empty() {
        println!("No stashes");
        return Ok(());
    }
    for record in records {
        let status = match record.status {
            StashStatus::Active => cformat!("<green>active</>"),
            StashStatus::Archived => cformat!("<dim>archived</>"),
        };
        println!(
            "{:<24} {status}  {}",
            record.branch,
            cformat!(
                "<bright-black>saved {}, used {}</>",
                humanize_age(now - record.created_at),
                humanize_age(now - record.last_used_at)
            )
        );
    }
    Ok(())
}

pub fn handle_stash_apply(branch: &str) -> Result<()> {
    let container = Container::locate(&std::env::current_dir()?)?;
    container.verify()?;
    let _lock = Lock::acquire(&container.lock_path())?;

    let repo = Repository::at(container.repo_dir());
    let state = crate::state::State::load(&container.state_path())?;

    let Some(slot_name) = state.slot_for_branch(branch).map(String::from) else {
        bail!(
            "{}\n{}",
            error_message(cformat!("Branch <bold>{branch}</> is not in any slot")),
            hint_message(cformat!("Check it out first: grove checkout {branch}"))
        );
    };

    match stash::restore(&repo, &container, branch, &slot_name)? {
        Restore::Restored { created_at } => {
            eprintln!(
                "{}",
                success_message(cformat!(
                    "Applied stash from {} into <bold>{slot_name}</>",
                    humanize_age(Utc::now() - created_at)
                ))
            );
            Ok(())
        }
        // The engine already printed the follow-up commands.
        Restore::Conflict => Ok(()),
        Restore::None => {
            bail!(
                "{}",
                error_message(cformat!("No active stash for <bold>{branch}</>"))
            );
        }
    }
}

pub fn handle_stash_show(branch: &str) -> Result<()> {
    let container = Container::locate(&std::env::current_dir()?)?;
    container.verify()?;
    let repo = Repository::at(container.repo_dir());

    let Some(record) = stash::load_record(&container, branch)? else {
        bail!(
            "{}",
            error_message(cformat!("No stash for <bold>{branch}</>"))
        );
    };

    match record.status {
        StashStatus::Active => {
            // Same composition the archive writes: tracked diff, then the
            // untracked third-parent tree when there is one.
            print!("{}", repo.diff_binary(&record.commit, &record.stash_ref)?);
            if repo.third_parent(&record.stash_ref)?.is_some() {
                println!("{}", stash::UNTRACKED_MARKER);
                print!(
                    "{}",
                    repo.diff_tree_root(&format!("{}^3", record.stash_ref))?
                );
            }
        }
        StashStatus::Archived => {
            let Some(path) = &record.archive_path else {
                bail!(
                    "{}",
                    error_message(cformat!(
                        "Stash for <bold>{branch}</> is archived but has no archive file"
                    ))
                );
            };
            if path.ends_with(".zst") {
                let output = Cmd::new("zstd").args(["-dc"]).arg(path).run()?;
                if !output.status.success() {
                    bail!(
                        "{}",
                        error_message(format!("zstd failed to read {path}"))
                    );
                }
                print!("{}", String::from_utf8_lossy(&output.stdout));
            } else {
                print!("{}", std::fs::read_to_string(path)?);
            }
        }
    }
    Ok(())
}

pub fn handle_stash_drop(branch: &str) -> Result<()> {
    let container = Container::locate(&std::env::current_dir()?)?;
    container.verify()?;
    let _lock = Lock::acquire(&container.lock_path())?;

    let repo = Repository::at(container.repo_dir());
    stash::drop(&repo, &container, branch)?;
    eprintln!(
        "{}",
        success_message(cformat!("Dropped stash for <bold>{branch}</>"))
    );
    Ok(())
}
