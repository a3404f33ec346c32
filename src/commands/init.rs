//! Container bootstrap.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use color_print::cformat;

use crate::config::Config;
use crate::container::Container;
use crate::exec::{path_context, Cmd};
use crate::git::Repository;
use crate::lock::Lock;
use crate::shell;
use crate::slots;
use crate::state::{SlotRecord, State};
use crate::styling::{error_message, hint_message, success_message};

pub fn handle_init(url: Option<String>) -> Result<()> {
    let cwd = std::env::current_dir()?;

    if let Ok(existing) = Container::locate(&cwd) {
        bail!(
            "{}\n{}",
            error_message(cformat!(
                "Already inside a grove container at <bold>{}</>",
                existing.root().display()
            )),
            hint_message("Pick an empty directory for a new container")
        );
    }

    let url = match url {
        Some(url) => url,
        None => origin_url_of(&cwd).context(
            "no URL given and the current directory has no git remote named origin",
        )?,
    };

    let container = Container::at(&cwd);
    std::fs::create_dir_all(container.control_dir())
        .with_context(|| format!("failed to create {}", container.control_dir().display()))?;
    let _lock = Lock::acquire(&container.lock_path())?;

    eprintln!("Cloning {url}...");
    let repo = Repository::clone_bare(&url, &container.repo_dir())?;
    // Populate refs/remotes/origin/* (a plain bare clone has none) and
    // point origin/HEAD at the remote's default branch.
    repo.fetch()?;
    repo.remote_set_head_auto()?;

    let config = Config::default();
    config.save(&container.config_path())?;
    std::fs::create_dir_all(container.stashes_dir())?;
    std::fs::create_dir_all(container.shared_dir())?;
    std::fs::create_dir_all(container.templates_dir())?;
    std::fs::create_dir_all(container.hooks_dir())?;

    let default = repo.default_branch()?;
    let commit = slots::base_commit(&repo)?;
    let mut forbidden = HashSet::new();
    let created = slots::create_slots(&repo, &container, config.slot_count, &commit, &mut forbidden)?;

    let now = Utc::now();
    let mut state = State::default();
    for name in &created {
        state.slots.insert(name.clone(), SlotRecord::vacant(now));
    }

    // The default branch lands in the first slot.
    let first = &created[0];
    let wt = repo.worktree(container.slot_dir(first));
    wt.checkout(&default)?;
    if let Some(slot) = state.slots.get_mut(first) {
        slot.branch = Some(default.clone());
    }
    state.record_checkout(&default, now);
    state.last_fetch_at = Some(now);
    state.save(&container.state_path())?;

    shell::write_nav_file(&container.slot_dir(first))?;
    eprintln!(
        "{}",
        success_message(cformat!(
            "Container ready: {} slots, <bold>{default}</> in <bold>{first}</>",
            created.len()
        ))
    );
    if !shell::integration_active() {
        eprintln!(
            "{}",
            hint_message(cformat!("cd {}", container.slot_dir(first).display()))
        );
    }
    Ok(())
}

/// `remote.origin.url` of a repository at `dir`, if there is one.
fn origin_url_of(dir: &std::path::Path) -> Result<String> {
    let output = Cmd::new("git")
        .args(["config", "--get", "remote.origin.url"])
        .current_dir(dir)
        .context(path_context(dir))
        .quiet()
        .run()
        .context("failed to execute git config")?;
    if !output.status.success() {
        bail!("git config returned nothing");
    }
    let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
    anyhow::ensure!(!url.is_empty(), "git config returned nothing");
    Ok(url)
}
