//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use grove::shell::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "grove",
    version,
    about = "Bounded, reusable Git worktree slots for one clone",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Run as if started in this directory
    #[arg(short = 'C', long = "directory", global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Log every git invocation with timing
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a container here: bare clone plus a set of worktree slots
    Init {
        /// Clone URL; defaults to this directory's origin remote
        url: Option<String>,
    },
    /// Check a branch out into a slot, evicting the coldest one if needed
    Checkout {
        /// Create the branch instead of checking out an existing one
        #[arg(short = 'b', long = "create")]
        create: bool,
        /// Branch to check out
        branch: String,
        /// Start point for -b (defaults to the remote default branch)
        start_point: Option<String>,
        /// Skip restoring the branch's saved stash
        #[arg(long)]
        no_restore: bool,
    },
    /// Show slots, their branches, and saved stashes
    List,
    /// Fetch origin now, ignoring the cool-down
    Fetch,
    /// Inspect and manage per-branch stashes
    Stash {
        #[command(subcommand)]
        command: StashCommands,
    },
    /// Repair drift and remove leftovers nothing points at
    Clean,
    /// Protect a slot from eviction
    Pin { slot: String },
    /// Allow eviction of a slot again
    Unpin { slot: String },
    /// Re-propagate shared files and templates into every slot
    Sync,
    /// Print the shell wrapper function for bash, zsh, or fish
    ShellInit { shell: Shell },
}

#[derive(Debug, Subcommand)]
pub enum StashCommands {
    /// List stash records
    List,
    /// Apply a branch's stash into the slot holding it
    Apply { branch: String },
    /// Print a stash as a patch
    Show { branch: String },
    /// Delete a stash record, its anchor ref, and any archive
    Drop { branch: String },
}
