//! Shared-file symlink overlay.
//!
//! Selected files (credentials, IDE config, caches) live once under
//! `.grove/shared/` and appear in every slot as relative symlinks. Git never
//! sees per-branch copies, and a checkout in one slot cannot fork the
//! content seen by another.
//!
//! The overlay must come off before a branch checkout: git refuses to check
//! out a branch that would overwrite an existing path with a tracked file.
//! The orchestrator calls [`remove`] before `checkout` and [`establish`]
//! after.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::config::SharedConfig;
use crate::git::{Repository, WorkingTree};
use crate::styling::warning_message;

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// The relative link content for a slot-side path pointing at its canonical
/// counterpart.
fn relative_target(canonical: &Path, slot_path: &Path) -> Result<PathBuf> {
    let parent = slot_path
        .parent()
        .with_context(|| format!("{} has no parent", slot_path.display()))?;
    pathdiff::diff_paths(canonical, parent).with_context(|| {
        format!(
            "cannot relativize {} against {}",
            canonical.display(),
            parent.display()
        )
    })
}

/// `(canonical, slot_side)` pairs for everything currently present under the
/// canonical tree, per the shared config.
fn canonical_pairs(
    shared_dir: &Path,
    slot_dir: &Path,
    shared: &SharedConfig,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut pairs = Vec::new();

    for dir in &shared.directories {
        let canonical_root = shared_dir.join(dir);
        if !canonical_root.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&canonical_root) {
            let entry = entry.context("failed to walk shared directory")?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&canonical_root)
                .expect("walkdir yields paths under its root");
            pairs.push((
                entry.path().to_path_buf(),
                slot_dir.join(dir).join(rel),
            ));
        }
    }

    for file in &shared.files {
        let canonical = shared_dir.join(file);
        if canonical.is_file() {
            pairs.push((canonical, slot_dir.join(file)));
        }
    }

    Ok(pairs)
}

/// Slot-side paths covered by the shared config that currently exist,
/// walked on the slot side (for removal, migration, and cleanup).
fn slot_side_paths(slot_dir: &Path, shared: &SharedConfig) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for dir in &shared.directories {
        let root = slot_dir.join(dir);
        if !root.exists() && root.symlink_metadata().is_err() {
            continue;
        }
        for entry in WalkDir::new(&root) {
            let entry = entry.context("failed to walk slot directory")?;
            let file_type = entry.file_type();
            if file_type.is_file() || file_type.is_symlink() {
                paths.push(entry.path().to_path_buf());
            }
        }
    }

    for file in &shared.files {
        let path = slot_dir.join(file);
        if path.symlink_metadata().is_ok() {
            paths.push(path);
        }
    }

    Ok(paths)
}

/// Place one link, per the establish rules.
fn link_into_slot(wt: &WorkingTree, canonical: &Path, slot_path: &Path) -> Result<()> {
    let rel_in_slot = slot_path
        .strip_prefix(wt.path())
        .expect("slot path is under the slot root");

    if wt.is_tracked(rel_in_slot)? {
        eprintln!(
            "{}",
            warning_message(format!(
                "{} is tracked by git on this branch; not overlaying it",
                rel_in_slot.display()
            ))
        );
        return Ok(());
    }

    let expected = relative_target(canonical, slot_path)?;

    match slot_path.symlink_metadata() {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = slot_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            symlink(&expected, slot_path)
                .with_context(|| format!("failed to link {}", slot_path.display()))?;
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to stat {}", slot_path.display()));
        }
        Ok(meta) if meta.file_type().is_symlink() => {
            let current = std::fs::read_link(slot_path)
                .with_context(|| format!("failed to read link {}", slot_path.display()))?;
            if current != expected {
                std::fs::remove_file(slot_path)
                    .with_context(|| format!("failed to remove {}", slot_path.display()))?;
                symlink(&expected, slot_path)
                    .with_context(|| format!("failed to link {}", slot_path.display()))?;
            }
        }
        // A real file: leave it, the sync pass migrates it.
        Ok(_) => {}
    }

    Ok(())
}

/// Fan the canonical tree out into one slot as relative symlinks.
pub fn establish(wt: &WorkingTree, shared_dir: &Path, shared: &SharedConfig) -> Result<()> {
    for (canonical, slot_path) in canonical_pairs(shared_dir, wt.path(), shared)? {
        link_into_slot(wt, &canonical, &slot_path)?;
    }
    Ok(())
}

/// Remove overlay links from a slot.
///
/// Only links pointing exactly at their expected canonical target are
/// touched; user-made links survive.
pub fn remove(slot_dir: &Path, shared_dir: &Path, shared: &SharedConfig) -> Result<()> {
    for slot_path in slot_side_paths(slot_dir, shared)? {
        let meta = match slot_path.symlink_metadata() {
            Ok(meta) => meta,
            Err(_) => continue,
        };
        if !meta.file_type().is_symlink() {
            continue;
        }
        let rel = slot_path
            .strip_prefix(slot_dir)
            .expect("slot-side paths are under the slot root");
        let canonical = shared_dir.join(rel);
        let expected = relative_target(&canonical, &slot_path)?;
        let current = match std::fs::read_link(&slot_path) {
            Ok(link) => link,
            Err(_) => continue,
        };
        if current == expected {
            std::fs::remove_file(&slot_path)
                .with_context(|| format!("failed to remove {}", slot_path.display()))?;
        }
    }
    Ok(())
}

/// Remove dangling overlay links in one slot (the sync pass's clean phase,
/// usable on its own for `grove clean`). Returns how many links went away.
pub fn clean_dangling(slot_dir: &Path, shared: &SharedConfig) -> Result<usize> {
    let mut removed = 0;
    for slot_path in slot_side_paths(slot_dir, shared)? {
        let meta = match slot_path.symlink_metadata() {
            Ok(meta) => meta,
            Err(_) => continue,
        };
        if meta.file_type().is_symlink() && !slot_path.exists() {
            std::fs::remove_file(&slot_path)
                .with_context(|| format!("failed to remove {}", slot_path.display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Three-phase synchronization across all slots.
///
/// 1. migrate: real, untracked files under configured paths move to the
///    canonical tree (first mover wins; later copies are dropped) and are
///    replaced by links;
/// 2. propagate: [`establish`] in every slot;
/// 3. clean: dangling links under configured paths are removed.
///
/// The pass is idempotent; running it twice changes nothing the second time.
pub fn sync_all(
    repo: &Repository,
    shared_dir: &Path,
    slot_dirs: &[PathBuf],
    shared: &SharedConfig,
) -> Result<()> {
    // Phase 1: migrate
    for slot_dir in slot_dirs {
        let wt = repo.worktree(slot_dir.clone());
        for slot_path in slot_side_paths(slot_dir, shared)? {
            let meta = match slot_path.symlink_metadata() {
                Ok(meta) => meta,
                Err(_) => continue,
            };
            if !meta.file_type().is_file() {
                continue;
            }
            let rel = slot_path
                .strip_prefix(slot_dir)
                .expect("slot-side paths are under the slot root");
            if wt.is_tracked(rel)? {
                continue;
            }

            let canonical = shared_dir.join(rel);
            if canonical.exists() {
                // A slot already contributed this file; this copy loses.
                std::fs::remove_file(&slot_path)
                    .with_context(|| format!("failed to remove {}", slot_path.display()))?;
            } else {
                if let Some(parent) = canonical.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
                std::fs::rename(&slot_path, &canonical).with_context(|| {
                    format!(
                        "failed to migrate {} to {}",
                        slot_path.display(),
                        canonical.display()
                    )
                })?;
            }
            let expected = relative_target(&canonical, &slot_path)?;
            symlink(&expected, &slot_path)
                .with_context(|| format!("failed to link {}", slot_path.display()))?;
        }
    }

    // Phase 2: propagate
    for slot_dir in slot_dirs {
        let wt = repo.worktree(slot_dir.clone());
        establish(&wt, shared_dir, shared)?;
    }

    // Phase 3: clean dangling links
    for slot_dir in slot_dirs {
        clean_dangling(slot_dir, shared)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SharedConfig;
    use std::process::Command;

    /// Minimal real repo so `is_tracked` has an index to consult.
    fn init_slot(dir: &Path) {
        let run = |args: &[&str]| {
            let status = Command::new("git")
                .args(args)
                .current_dir(dir)
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status()
                .expect("git runs");
            assert!(status.success(), "git {args:?} failed");
        };
        run(&["init", "-q"]);
        std::fs::write(dir.join("tracked.txt"), "tracked\n").unwrap();
        run(&["add", "tracked.txt"]);
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        shared_dir: PathBuf,
        slot: PathBuf,
        repo: Repository,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let shared_dir = dir.path().join("shared");
        let slot = dir.path().join("slot");
        std::fs::create_dir_all(&shared_dir).unwrap();
        std::fs::create_dir_all(&slot).unwrap();
        init_slot(&slot);
        let repo = Repository::at(&slot);
        Fixture {
            _dir: dir,
            shared_dir,
            slot,
            repo,
        }
    }

    fn shared_config() -> SharedConfig {
        SharedConfig {
            directories: vec![".idea".to_string()],
            files: vec![".env".to_string()],
        }
    }

    #[test]
    fn establish_links_files_and_directories_relatively() {
        let f = fixture();
        std::fs::create_dir_all(f.shared_dir.join(".idea/inner")).unwrap();
        std::fs::write(f.shared_dir.join(".idea/inner/a.xml"), "a").unwrap();
        std::fs::write(f.shared_dir.join(".env"), "SECRET=1").unwrap();

        let wt = f.repo.worktree(f.slot.clone());
        establish(&wt, &f.shared_dir, &shared_config()).unwrap();

        let link = f.slot.join(".idea/inner/a.xml");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        let target = std::fs::read_link(&link).unwrap();
        assert!(target.is_relative(), "link target {target:?} is absolute");
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "a");
        assert_eq!(
            std::fs::read_to_string(f.slot.join(".env")).unwrap(),
            "SECRET=1"
        );
    }

    #[test]
    fn establish_then_remove_is_identity() {
        let f = fixture();
        std::fs::write(f.shared_dir.join(".env"), "x").unwrap();

        let wt = f.repo.worktree(f.slot.clone());
        establish(&wt, &f.shared_dir, &shared_config()).unwrap();
        assert!(f.slot.join(".env").symlink_metadata().is_ok());

        remove(&f.slot, &f.shared_dir, &shared_config()).unwrap();
        assert!(f.slot.join(".env").symlink_metadata().is_err());
    }

    #[test]
    fn remove_spares_user_made_links() {
        let f = fixture();
        std::fs::write(f.slot.join("elsewhere"), "user data").unwrap();
        symlink(Path::new("elsewhere"), &f.slot.join(".env")).unwrap();

        remove(&f.slot, &f.shared_dir, &shared_config()).unwrap();
        assert!(f.slot.join(".env").symlink_metadata().is_ok());
    }

    #[test]
    fn establish_skips_tracked_files() {
        let f = fixture();
        let shared = SharedConfig {
            directories: vec![],
            files: vec!["tracked.txt".to_string()],
        };
        std::fs::write(f.shared_dir.join("tracked.txt"), "canonical").unwrap();

        let wt = f.repo.worktree(f.slot.clone());
        establish(&wt, &f.shared_dir, &shared).unwrap();

        // Still the real tracked file, not a link
        let meta = f.slot.join("tracked.txt").symlink_metadata().unwrap();
        assert!(meta.file_type().is_file());
        assert_eq!(
            std::fs::read_to_string(f.slot.join("tracked.txt")).unwrap(),
            "tracked\n"
        );
    }

    #[test]
    fn sync_migrates_first_copy_and_discards_later_ones() {
        let dir = tempfile::tempdir().unwrap();
        let shared_dir = dir.path().join("shared");
        std::fs::create_dir_all(&shared_dir).unwrap();
        let slot_a = dir.path().join("slot-a");
        let slot_b = dir.path().join("slot-b");
        for slot in [&slot_a, &slot_b] {
            std::fs::create_dir_all(slot).unwrap();
            init_slot(slot);
        }
        std::fs::write(slot_a.join(".env"), "from-a").unwrap();
        std::fs::write(slot_b.join(".env"), "from-b").unwrap();

        let repo = Repository::at(&slot_a);
        let shared = SharedConfig {
            directories: vec![],
            files: vec![".env".to_string()],
        };
        let slots = vec![slot_a.clone(), slot_b.clone()];
        sync_all(&repo, &shared_dir, &slots, &shared).unwrap();

        // First mover won; both slots now link to it
        assert_eq!(
            std::fs::read_to_string(shared_dir.join(".env")).unwrap(),
            "from-a"
        );
        for slot in [&slot_a, &slot_b] {
            let meta = slot.join(".env").symlink_metadata().unwrap();
            assert!(meta.file_type().is_symlink());
            assert_eq!(std::fs::read_to_string(slot.join(".env")).unwrap(), "from-a");
        }

        // Idempotence: a second pass changes nothing
        sync_all(&repo, &shared_dir, &slots, &shared).unwrap();
        assert_eq!(
            std::fs::read_to_string(shared_dir.join(".env")).unwrap(),
            "from-a"
        );
    }

    #[test]
    fn sync_cleans_dangling_links() {
        let f = fixture();
        std::fs::write(f.shared_dir.join(".env"), "x").unwrap();
        let wt = f.repo.worktree(f.slot.clone());
        establish(&wt, &f.shared_dir, &shared_config()).unwrap();

        // Canonical file disappears; the link is now dangling
        std::fs::remove_file(f.shared_dir.join(".env")).unwrap();
        sync_all(
            &f.repo,
            &f.shared_dir,
            &[f.slot.clone()],
            &shared_config(),
        )
        .unwrap();
        assert!(f.slot.join(".env").symlink_metadata().is_err());
    }
}
