//! Pinning slots so eviction never takes them.

use anyhow::Result;
use color_print::cformat;

use crate::container::Container;
use crate::error::GroveError;
use crate::lock::Lock;
use crate::state::State;
use crate::styling::success_message;

pub fn handle_pin(slot: &str, pinned: bool) -> Result<()> {
    let container = Container::locate(&std::env::current_dir()?)?;
    container.verify()?;
    let _lock = Lock::acquire(&container.lock_path())?;

    let mut state = State::load(&container.state_path())?;
    // Pinning a vacant slot is allowed; it just protects an empty seat.
    match state.slots.get_mut(slot) {
        Some(record) => record.pinned = pinned,
        None => {
            return Err(GroveError::SlotNotFound {
                name: slot.to_string(),
            }
            .into());
        }
    }
    state.save(&container.state_path())?;

    let verb = if pinned { "Pinned" } else { "Unpinned" };
    eprintln!("{}", success_message(cformat!("{verb} <bold>{slot}</>")));
    Ok(())
}
