//! Shared-file synchronization across all slots.

use anyhow::Result;

use crate::config::Config;
use crate::container::Container;
use crate::git::Repository;
use crate::lock::Lock;
use crate::overlay;
use crate::reconcile::reconcile;
use crate::state::State;
use crate::styling::success_message;
use crate::templates;

pub fn handle_sync() -> Result<()> {
    let container = Container::locate(&std::env::current_dir()?)?;
    container.verify()?;
    let _lock = Lock::acquire(&container.lock_path())?;

    let repo = Repository::at(container.repo_dir());
    let config = Config::load(&container.config_path())?;
    let mut state = State::load(&container.state_path())?;
    reconcile(&repo, &container, &mut state)?;

    let slot_dirs: Vec<_> = state
        .slots
        .keys()
        .map(|name| container.slot_dir(name))
        .collect();
    overlay::sync_all(&repo, &container.shared_dir(), &slot_dirs, &config.shared)?;

    for (name, slot) in &state.slots {
        templates::expand_all(
            &container.templates_dir(),
            &config.templates,
            &container.slot_dir(name),
            name,
            slot.branch.as_deref(),
        )?;
    }

    eprintln!(
        "{}",
        success_message(format!("Synced shared files across {} slots", state.slots.len()))
    );
    Ok(())
}
