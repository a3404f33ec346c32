//! Command handlers, one module per CLI surface.

mod checkout;
mod clean;
mod fetch;
mod init;
mod list;
mod pin;
mod stash;
mod sync;

pub use checkout::{handle_checkout, CheckoutArgs};
pub use clean::handle_clean;
pub use fetch::handle_fetch;
pub use init::handle_init;
pub use list::handle_list;
pub use pin::handle_pin;
pub use stash::{handle_stash_apply, handle_stash_drop, handle_stash_list, handle_stash_show};
pub use sync::handle_sync;
