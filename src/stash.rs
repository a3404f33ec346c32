//! Per-branch stash preservation and archival.
//!
//! When an occupied slot is evicted with dirty state, that state is saved
//! under the evicted branch and restored the next time the branch lands in
//! a slot. A stash record is two things:
//!
//! - a metadata file `.grove/stashes/<encoded>.toml`, and
//! - an anchor ref `refs/wt/stashes/<encoded>` in the bare repository that
//!   keeps the stash commit out of garbage collection.
//!
//! Stashes whose branch is gone from the remote and unused for long enough
//! are exported to a patch file under `.grove/stashes/archive/` and the
//! anchor ref is dropped.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use color_print::cprintln;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::config::SharedConfig;
use crate::container::Container;
use crate::exec::Cmd;
use crate::git::{Repository, StashApply};
use crate::overlay;
use crate::styling::warning_message;
use crate::utils::atomic_write;

/// Ref namespace anchoring stash commits in the bare repository.
pub const ANCHOR_NAMESPACE: &str = "refs/wt/stashes";

/// Marker line separating the tracked patch from the untracked segment in
/// archived patches.
pub const UNTRACKED_MARKER: &str = "# ---- untracked (third parent) ----";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StashStatus {
    Active,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StashRecord {
    pub branch: String,
    /// HEAD of the slot at eviction time; the diff base for archival.
    pub commit: String,
    /// The stash commit hash.
    pub stash_ref: String,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every grove-driven checkout of the branch; recently
    /// used stashes resist archival.
    pub last_used_at: DateTime<Utc>,
    pub status: StashStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<String>,
}

impl StashRecord {
    pub fn is_active(&self) -> bool {
        self.status == StashStatus::Active
    }
}

/// Outcome of [`restore`].
#[derive(Debug, Clone, PartialEq)]
pub enum Restore {
    /// Applied cleanly; the record is gone.
    Restored { created_at: DateTime<Utc> },
    /// Apply hit conflicts; the record and anchor ref are retained.
    Conflict,
    /// No active record for the branch.
    None,
}

/// Result of an archive scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub archived: Vec<String>,
    pub skipped: Vec<String>,
}

pub fn anchor_ref(branch: &str) -> String {
    format!("{ANCHOR_NAMESPACE}/{}", codec::encode(branch))
}

pub fn metadata_path(container: &Container, branch: &str) -> PathBuf {
    container
        .stashes_dir()
        .join(format!("{}.toml", codec::encode(branch)))
}

pub fn load_record(container: &Container, branch: &str) -> Result<Option<StashRecord>> {
    let path = metadata_path(container, branch);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let record = toml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(record))
}

pub fn save_record(container: &Container, record: &StashRecord) -> Result<()> {
    let path = metadata_path(container, &record.branch);
    let dir = container.stashes_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let contents = toml::to_string_pretty(record).context("failed to serialize stash record")?;
    atomic_write(&path, &contents)
}

/// All stash records, in no particular order. Unreadable files warn and
/// are skipped.
pub fn list_records(container: &Container) -> Result<Vec<StashRecord>> {
    let dir = container.stashes_dir();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut records = Vec::new();
    for entry in std::fs::read_dir(&dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        match toml::from_str::<StashRecord>(&contents) {
            Ok(record) => records.push(record),
            Err(e) => eprintln!(
                "{}",
                warning_message(format!(
                    "Skipping unreadable stash metadata {} ({})",
                    path.display(),
                    e.message()
                ))
            ),
        }
    }
    Ok(records)
}

/// Save a slot's dirty state under `branch` before eviction.
///
/// Overlay links come off first: they are infrastructure, not user state,
/// and a stash carrying them fails to restore once the links exist again.
/// Returns `false` when the tree was clean and nothing was saved.
///
/// The caller must follow a `true` return with a hard reset and untracked
/// clean so the next checkout starts from a pristine tree.
pub fn save(
    repo: &Repository,
    container: &Container,
    shared: &SharedConfig,
    branch: &str,
    slot_name: &str,
) -> Result<bool> {
    let slot_dir = container.slot_dir(slot_name);
    overlay::remove(&slot_dir, &container.shared_dir(), shared)?;

    let wt = repo.worktree(&slot_dir);
    if !wt.is_dirty()? {
        return Ok(false);
    }

    let commit = wt.current_commit()?;
    let stash_hash = wt.stash_push_untracked()?;
    repo.update_ref(&anchor_ref(branch), &stash_hash)?;

    let now = Utc::now();
    save_record(
        container,
        &StashRecord {
            branch: branch.to_string(),
            commit,
            stash_ref: stash_hash,
            created_at: now,
            last_used_at: now,
            status: StashStatus::Active,
            archived_at: None,
            archive_path: None,
        },
    )?;
    Ok(true)
}

/// Restore `branch`'s stash into the slot that now holds it.
pub fn restore(
    repo: &Repository,
    container: &Container,
    branch: &str,
    slot_name: &str,
) -> Result<Restore> {
    let record = match load_record(container, branch)? {
        Some(record) if record.is_active() => record,
        _ => return Ok(Restore::None),
    };

    let wt = repo.worktree(container.slot_dir(slot_name));
    match wt.stash_apply(&record.stash_ref)? {
        StashApply::Applied => {
            repo.delete_ref(&anchor_ref(branch))?;
            remove_metadata(container, branch)?;
            Ok(Restore::Restored {
                created_at: record.created_at,
            })
        }
        StashApply::Conflict => {
            cprintln!(
                "<yellow>Stash for <bold>{branch}</> applied with conflicts; resolve them, then:</>"
            );
            cprintln!("  <bright-black>grove stash drop {branch}</>   <dim>once resolved</>");
            cprintln!("  <bright-black>grove stash show {branch}</>   <dim>to inspect the saved changes</>");
            Ok(Restore::Conflict)
        }
    }
}

/// Delete a branch's stash record: anchor ref, archive file, and metadata.
/// Every piece is allowed to be already gone.
pub fn drop(repo: &Repository, container: &Container, branch: &str) -> Result<()> {
    repo.delete_ref(&anchor_ref(branch))?;

    if let Some(record) = load_record(container, branch)? {
        if let Some(archive) = &record.archive_path {
            match std::fs::remove_file(archive) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to remove {archive}"));
                }
            }
        }
    }

    remove_metadata(container, branch)
}

fn remove_metadata(container: &Container, branch: &str) -> Result<()> {
    let path = metadata_path(container, branch);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

/// Refresh `last_used_at` so a branch the user keeps returning to resists
/// archival.
pub fn touch(container: &Container, branch: &str, now: DateTime<Utc>) -> Result<()> {
    if let Some(mut record) = load_record(container, branch)? {
        record.last_used_at = now;
        save_record(container, &record)?;
    }
    Ok(())
}

/// Export an active stash to a patch file and drop its anchor ref.
pub fn archive(repo: &Repository, container: &Container, record: &StashRecord) -> Result<()> {
    if !record.is_active() {
        return Ok(());
    }

    // Tracked changes, diffed against the bare repo. `stash show` would
    // need a working tree and fails on bare repos.
    let mut patch = repo.diff_binary(&record.commit, &record.stash_ref)?;

    // A third parent exists when `stash push --include-untracked` captured
    // untracked files; it is a root commit, hence --root.
    if repo.third_parent(&record.stash_ref)?.is_some() {
        patch.push_str(UNTRACKED_MARKER);
        patch.push('\n');
        patch.push_str(&repo.diff_tree_root(&format!("{}^3", record.stash_ref))?);
    }

    let archive_dir = container.archive_dir();
    std::fs::create_dir_all(&archive_dir)
        .with_context(|| format!("failed to create {}", archive_dir.display()))?;
    let plain_path = archive_dir.join(format!("{}.patch", codec::encode(&record.branch)));
    atomic_write(&plain_path, &patch)?;

    let archive_path = compress_if_available(&plain_path)?;

    repo.delete_ref(&anchor_ref(&record.branch))?;

    let mut archived = record.clone();
    archived.status = StashStatus::Archived;
    archived.archived_at = Some(Utc::now());
    archived.archive_path = Some(archive_path.to_string_lossy().into_owned());
    save_record(container, &archived)
}

/// Compress the patch in place with zstd when the binary is around;
/// otherwise keep the plain file and warn once.
fn compress_if_available(plain_path: &std::path::Path) -> Result<PathBuf> {
    if which::which("zstd").is_err() {
        eprintln!(
            "{}",
            warning_message("zstd not found; storing the archive uncompressed")
        );
        return Ok(plain_path.to_path_buf());
    }

    let output = Cmd::new("zstd")
        .args(["-q", "-f", "--rm"])
        .arg(plain_path)
        .run()
        .context("failed to execute zstd")?;
    if !output.status.success() {
        eprintln!(
            "{}",
            warning_message("zstd failed; storing the archive uncompressed")
        );
        return Ok(plain_path.to_path_buf());
    }

    let mut compressed = plain_path.as_os_str().to_owned();
    compressed.push(".zst");
    Ok(PathBuf::from(compressed))
}

/// Archive every overdue stash, per the policy:
///
/// - the target branch of the operation in flight is never archived
///   (it is about to be restored),
/// - recently used stashes are kept,
/// - stashes whose branch still exists on the remote are kept.
pub fn archive_scan(
    repo: &Repository,
    container: &Container,
    archive_after_days: i64,
    exclude_branch: Option<&str>,
) -> Result<ScanReport> {
    let now = Utc::now();
    let mut report = ScanReport::default();

    for record in list_records(container)? {
        if !record.is_active() {
            continue;
        }
        if exclude_branch == Some(record.branch.as_str()) {
            report.skipped.push(record.branch);
            continue;
        }
        if now - record.last_used_at < Duration::days(archive_after_days) {
            report.skipped.push(record.branch);
            continue;
        }
        if repo.remote_branch_exists(&record.branch)? {
            report.skipped.push(record.branch);
            continue;
        }
        archive(repo, container, &record)?;
        report.archived.push(record.branch);
    }

    Ok(report)
}
