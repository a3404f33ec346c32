//! Shell integration.
//!
//! A child process cannot change its parent shell's directory, so `grove
//! checkout` writes the target slot's path to a **nav file** at a
//! per-shell-pid location. The wrapper function (emitted by
//! `grove shell-init`) invokes the real binary, reads and deletes the nav
//! file, `cd`s into it, and runs `.grove/hooks/post-checkout` when present.
//!
//! The wrapper exports [`SENTINEL_VAR`]; when the binary does not see it,
//! it prints a `cd` hint instead of relying on the wrapper.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Set by the wrapper so the binary knows navigation will happen.
pub const SENTINEL_VAR: &str = "GROVE_SHELL_INTEGRATION";

/// Supported shells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

impl Shell {
    /// The static wrapper script for this shell.
    pub fn init_script(&self) -> String {
        match self {
            // zsh runs the bash wrapper unchanged; both use $$ and POSIX test
            Shell::Bash | Shell::Zsh => POSIX_WRAPPER.to_string(),
            Shell::Fish => FISH_WRAPPER.to_string(),
        }
    }
}

const POSIX_WRAPPER: &str = r#"# grove shell integration
# The function shadows the binary; `command grove` reaches through it.
grove() {
    command grove "$@"
    local rc=$?
    local nav="${TMPDIR:-/tmp}/grove-nav-$$"
    if [ -f "$nav" ]; then
        local dest
        dest=$(cat "$nav")
        rm -f "$nav"
        if [ -d "$dest" ]; then
            cd "$dest" || return $rc
            local hook="$dest/../.grove/hooks/post-checkout"
            if [ -x "$hook" ]; then
                local branch
                branch=$(git -C "$dest" branch --show-current 2>/dev/null)
                "$hook" "$dest" "$branch"
            fi
        fi
    fi
    return $rc
}
export GROVE_SHELL_INTEGRATION=1
"#;

const FISH_WRAPPER: &str = r#"# grove shell integration
function grove
    command grove $argv
    set -l rc $status
    set -l tmp /tmp
    if set -q TMPDIR
        set tmp $TMPDIR
    end
    set -l nav "$tmp/grove-nav-$fish_pid"
    if test -f "$nav"
        set -l dest (cat "$nav")
        rm -f "$nav"
        if test -d "$dest"
            cd "$dest"
            set -l hook "$dest/../.grove/hooks/post-checkout"
            if test -x "$hook"
                set -l branch (git -C "$dest" branch --show-current 2>/dev/null)
                "$hook" "$dest" "$branch"
            end
        end
    end
    return $rc
end
set -gx GROVE_SHELL_INTEGRATION 1
"#;

/// Nav file path for a given shell pid.
pub fn nav_file_path(shell_pid: u32) -> PathBuf {
    std::env::temp_dir().join(format!("grove-nav-{shell_pid}"))
}

#[cfg(unix)]
fn shell_pid() -> u32 {
    // The wrapper function runs in the shell itself, so the binary's parent
    // is the process whose $$ the wrapper used.
    std::os::unix::process::parent_id()
}

#[cfg(not(unix))]
fn shell_pid() -> u32 {
    std::process::id()
}

/// Whether the wrapper is active in the invoking shell.
pub fn integration_active() -> bool {
    std::env::var_os(SENTINEL_VAR).is_some()
}

/// Write the nav file for the invoking shell: one line, the absolute slot
/// path.
pub fn write_nav_file(slot_dir: &Path) -> Result<PathBuf> {
    let path = nav_file_path(shell_pid());
    std::fs::write(&path, format!("{}\n", slot_dir.display()))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
