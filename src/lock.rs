//! Container lock.
//!
//! One advisory lock file serializes every operation that may mutate state
//! or the slot set. Acquisition is an exclusive create; the holder's pid is
//! written into the file so a `Locked` error can name it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::GroveError;

#[derive(Debug)]
pub struct Lock {
    path: PathBuf,
    held: bool,
}

impl Lock {
    /// Acquire the lock, failing with [`GroveError::Locked`] if it is held.
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        match options.open(path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())
                    .with_context(|| format!("failed to write pid to {}", path.display()))?;
                Ok(Self {
                    path: path.to_path_buf(),
                    held: true,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let pid = std::fs::read_to_string(path)
                    .ok()
                    .and_then(|s| s.trim().parse().ok());
                Err(GroveError::Locked {
                    path: path.to_path_buf(),
                    pid,
                }
                .into())
            }
            Err(e) => Err(e).with_context(|| format!("failed to create {}", path.display())),
        }
    }

    /// Release explicitly. Dropping the lock releases it too; this exists
    /// for call sites that want the unlink error surfaced.
    pub fn release(mut self) -> Result<()> {
        self.held = false;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", self.path.display())),
        }
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        if self.held {
            // Absence is fine: someone cleaned up a stale lock for us.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
