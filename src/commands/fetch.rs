//! Forced fetch, bypassing the cool-down.

use anyhow::Result;
use chrono::Utc;

use crate::container::Container;
use crate::git::Repository;
use crate::lock::Lock;
use crate::state::State;
use crate::styling::success_message;

pub fn handle_fetch() -> Result<()> {
    let container = Container::locate(&std::env::current_dir()?)?;
    container.verify()?;
    let _lock = Lock::acquire(&container.lock_path())?;

    let repo = Repository::at(container.repo_dir());
    repo.fetch()?;

    let mut state = State::load(&container.state_path())?;
    state.last_fetch_at = Some(Utc::now());
    state.save(&container.state_path())?;

    eprintln!("{}", success_message("Fetched origin"));
    Ok(())
}
