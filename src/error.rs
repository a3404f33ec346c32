//! Error types and exit-code mapping.

use std::path::PathBuf;

use crate::styling::{ERROR_EMOJI, HINT_EMOJI};

/// Errors surfaced to the user.
///
/// Git subprocess failures are special: git's own stderr has already reached
/// the terminal (or is carried verbatim in [`GroveError::GitExit`]), so their
/// `Display` adds no wrapping text and `main` exits with git's code.
#[derive(Debug)]
pub enum GroveError {
    /// No container found walking up from the working directory
    NotInContainer,
    /// Container exists but a required piece is missing
    ContainerCorrupted { missing: String },
    /// Another process holds the container lock
    Locked { path: PathBuf, pid: Option<u32> },
    /// Every slot is pinned; nothing can be evicted
    AllPinned,
    /// Branch not found locally or on the remote
    BranchNotFound { branch: String },
    /// Branch already exists (when trying to create)
    BranchExists { branch: String },
    /// Slot-name generator ran out of attempts
    NameExhaustion,
    /// No slot with the given name
    SlotNotFound { name: String },
    /// Cannot shrink below the number of pinned slots
    SlotCountTooLow { pinned: usize, target: usize },
    /// Git exited non-zero. `stderr` is `Some` only when the invocation ran
    /// with captured stderr (probe commands); it must be re-emitted raw.
    GitExit { code: i32, stderr: Option<String> },
}

impl std::fmt::Display for GroveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use color_print::cwrite;

        match self {
            GroveError::NotInContainer => {
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>Not inside a grove container</>\n\n{HINT_EMOJI} <dim>Run 'grove init URL' to create one</>"
                )
            }
            GroveError::ContainerCorrupted { missing } => {
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>Container is corrupted: <bold>{missing}</> is missing</>"
                )
            }
            GroveError::Locked { path, pid } => {
                cwrite!(f, "{ERROR_EMOJI} <red>Container is locked by another grove process</>")?;
                if let Some(pid) = pid {
                    cwrite!(f, " <red>(pid {pid})</>")?;
                }
                cwrite!(
                    f,
                    "\n\n{HINT_EMOJI} <dim>If no other grove is running, remove the stale lock: rm {}</>",
                    path.display()
                )
            }
            GroveError::AllPinned => {
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>All slots are pinned; nothing can be evicted</>\n\n{HINT_EMOJI} <dim>Unpin a slot with 'grove unpin SLOT' or raise slot_count in config</>"
                )
            }
            GroveError::BranchNotFound { branch } => {
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>Branch <bold>{branch}</> not found locally or on origin</>\n\n{HINT_EMOJI} <dim>Create it with 'grove checkout -b {branch}'</>"
                )
            }
            GroveError::BranchExists { branch } => {
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>Branch <bold>{branch}</> already exists</>\n\n{HINT_EMOJI} <dim>Drop the -b flag to check it out</>"
                )
            }
            GroveError::NameExhaustion => {
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>Could not draw a fresh slot name after 100 attempts</>"
                )
            }
            GroveError::SlotNotFound { name } => {
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>No slot named <bold>{name}</></>\n\n{HINT_EMOJI} <dim>Run 'grove list' to see slot names</>"
                )
            }
            GroveError::SlotCountTooLow { pinned, target } => {
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>Cannot shrink to {target} slots: {pinned} slots are pinned</>\n\n{HINT_EMOJI} <dim>Unpin slots first or raise slot_count</>"
                )
            }
            // Raw passthrough: git already reported the failure on stderr,
            // or the captured output is replayed by main. Never wrap it.
            GroveError::GitExit { stderr, .. } => match stderr {
                Some(text) => write!(f, "{}", text.trim_end()),
                None => Ok(()),
            },
        }
    }
}

impl std::error::Error for GroveError {}

/// Map an error chain to a process exit code.
///
/// Git failures surface git's own exit code; everything else exits 1.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<GroveError>() {
        Some(GroveError::GitExit { code, .. }) => *code,
        _ => 1,
    }
}

/// True when the error's message is already on the user's terminal and
/// `Display` would print nothing (uncaptured git failure).
pub fn is_silent(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<GroveError>(),
        Some(GroveError::GitExit { stderr: None, .. })
    )
}
