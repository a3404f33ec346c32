//! End-to-end scenarios against the real binary and real git.

mod common;

use common::{git_output, git_stdout, TestContainer};

fn set_slot_count(c: &TestContainer, n: usize) {
    std::fs::write(
        c.control().join("config.toml"),
        format!("slot_count = {n}\n"),
    )
    .unwrap();
}

fn anchor_resolves(c: &TestContainer, token: &str) -> bool {
    git_output(
        &c.repo(),
        &[
            "rev-parse",
            "--verify",
            "--quiet",
            &format!("refs/wt/stashes/{token}"),
        ],
    )
    .status
    .success()
}

fn stash_metadata(c: &TestContainer, token: &str) -> Option<String> {
    std::fs::read_to_string(c.control().join("stashes").join(format!("{token}.toml"))).ok()
}

/// Backdate a stash so the archive policy sees it as overdue.
fn age_stash(c: &TestContainer, token: &str) {
    let path = c.control().join("stashes").join(format!("{token}.toml"));
    let text = std::fs::read_to_string(&path).unwrap();
    let doctored: Vec<String> = text
        .lines()
        .map(|line| {
            if line.starts_with("last_used_at") {
                r#"last_used_at = "2020-01-01T00:00:00Z""#.to_string()
            } else {
                line.to_string()
            }
        })
        .collect();
    std::fs::write(&path, doctored.join("\n")).unwrap();
}

#[test]
fn init_builds_a_full_container() {
    let c = TestContainer::init("develop");

    assert!(c.repo().is_dir());
    assert!(c.control().join("config.toml").is_file());

    let slots = c.slot_names();
    assert_eq!(slots.len(), 5, "expected 5 slots, got {slots:?}");
    for slot in &slots {
        assert!(c.path().join(slot).join(".git").exists());
    }

    // refs/remotes/origin/* exist in the bare clone
    assert!(git_output(
        &c.repo(),
        &["rev-parse", "--verify", "--quiet", "refs/remotes/origin/develop"]
    )
    .status
    .success());

    // develop landed in exactly one slot; the rest are detached
    let holder = c.slot_holding("develop").expect("develop is in a slot");
    let detached = slots.iter().filter(|s| **s != holder).count();
    assert_eq!(detached, 4);

    let state = grove::state::State::load(&c.control().join("state.toml")).unwrap();
    assert_eq!(state.slots.len(), 5);
    let occupied: Vec<_> = state
        .slots
        .values()
        .filter(|slot| !slot.is_vacant())
        .collect();
    assert_eq!(occupied.len(), 1);
    assert_eq!(occupied[0].branch.as_deref(), Some("develop"));
    assert_eq!(state.branch_history.len(), 1);
    assert_eq!(state.branch_history[0].branch, "develop");
    assert!(state.last_fetch_at.is_some());

    // Nav file points at the slot holding develop
    let nav = c.nav_target().expect("init wrote a nav file");
    assert_eq!(nav, c.path().join(&holder).display().to_string());
}

#[test]
fn checkout_of_resident_branch_reuses_its_slot() {
    let c = TestContainer::init("main");
    let holder = c.slot_holding("main").unwrap();

    c.grove_ok(&["checkout", "main"]);

    assert_eq!(c.slot_holding("main").unwrap(), holder);
    let nav = c.nav_target().unwrap();
    assert_eq!(nav, c.path().join(&holder).display().to_string());
    // Slot mapping is unchanged, only timestamps moved
    let state = grove::state::State::load(&c.control().join("state.toml")).unwrap();
    assert_eq!(state.slot_for_branch("main"), Some(holder.as_str()));
    assert_eq!(
        state.slots.values().filter(|s| !s.is_vacant()).count(),
        1
    );
}

#[test]
fn shrink_prefers_vacant_slots_then_checkout_uses_remote_branch() {
    let c = TestContainer::init("main");
    c.remote.add_branch("feature/one");
    c.grove_ok(&["fetch"]);

    set_slot_count(&c, 2);
    c.grove_ok(&["checkout", "feature/one"]);

    // Shrink evicted the vacant slots; main survived alongside the new branch
    let slots = c.slot_names();
    assert_eq!(slots.len(), 2, "expected 2 slots, got {slots:?}");
    assert!(c.slot_holding("main").is_some());
    assert!(c.slot_holding("feature/one").is_some());
}

#[test]
fn eviction_stashes_dirty_state_and_checkout_restores_it() {
    let c = TestContainer::init("main");
    c.remote.add_branch("feature/one");
    c.remote.add_branch("feature/two");
    c.grove_ok(&["fetch"]);
    set_slot_count(&c, 2);

    c.grove_ok(&["checkout", "feature/one"]);

    // Dirty the main slot: tracked modification plus an untracked file
    let main_slot = c.slot_holding("main").unwrap();
    let main_dir = c.path().join(&main_slot);
    std::fs::write(main_dir.join("src.txt"), "line one\nlocal edit\n").unwrap();
    std::fs::write(main_dir.join("scratch.txt"), "untracked work\n").unwrap();

    // main is the least recently used slot; this evicts it
    c.grove_ok(&["checkout", "feature/two"]);
    assert_eq!(c.slot_holding("feature/two").unwrap(), main_slot);

    let metadata = stash_metadata(&c, "main").expect("stash record for main");
    assert!(metadata.contains("status = \"active\""));
    assert!(anchor_resolves(&c, "main"));
    // Untracked capture means the stash commit has a third parent
    assert!(git_output(
        &c.repo(),
        &["rev-parse", "--verify", "--quiet", "refs/wt/stashes/main^3"]
    )
    .status
    .success());

    // The evicted slot was left pristine for its new branch
    assert_eq!(
        git_stdout(&main_dir, &["status", "--porcelain"]),
        "",
        "evicted slot should be clean"
    );

    // Checking main out again restores both kinds of dirty state
    c.grove_ok(&["checkout", "main"]);
    let new_dir = c.path().join(c.slot_holding("main").unwrap());
    assert_eq!(
        std::fs::read_to_string(new_dir.join("src.txt")).unwrap(),
        "line one\nlocal edit\n"
    );
    assert_eq!(
        std::fs::read_to_string(new_dir.join("scratch.txt")).unwrap(),
        "untracked work\n"
    );
    assert!(stash_metadata(&c, "main").is_none(), "record consumed");
    assert!(!anchor_resolves(&c, "main"));
}

#[test]
fn no_restore_leaves_the_stash_in_place() {
    let c = TestContainer::init("main");
    c.remote.add_branch("other");
    c.grove_ok(&["fetch"]);
    set_slot_count(&c, 1);

    let slot = c.slot_holding("main").unwrap();
    std::fs::write(c.path().join(&slot).join("scratch.txt"), "wip").unwrap();

    c.grove_ok(&["checkout", "other"]);
    assert!(stash_metadata(&c, "main").is_some());

    c.grove_ok(&["checkout", "main", "--no-restore"]);
    let dir = c.path().join(c.slot_holding("main").unwrap());
    assert!(!dir.join("scratch.txt").exists());
    assert!(stash_metadata(&c, "main").is_some(), "stash kept for later");
}

#[test]
fn archive_scan_archives_remoteless_stale_stashes_only() {
    let c = TestContainer::init("main");
    c.remote.add_branch("stale/branch");
    c.remote.add_branch("keeper");
    c.grove_ok(&["fetch"]);
    set_slot_count(&c, 1);

    // Build a stash for stale/branch
    c.grove_ok(&["checkout", "stale/branch"]);
    let slot = c.slot_holding("stale/branch").unwrap();
    std::fs::write(c.path().join(&slot).join("wip.txt"), "stale wip").unwrap();
    c.grove_ok(&["checkout", "main"]);
    assert!(anchor_resolves(&c, "stale--branch"));

    // Build a stash for keeper
    c.grove_ok(&["checkout", "keeper"]);
    let slot = c.slot_holding("keeper").unwrap();
    std::fs::write(c.path().join(&slot).join("wip.txt"), "keeper wip").unwrap();
    c.grove_ok(&["checkout", "main"]);

    // Both stashes look old, but only stale/branch is gone from the remote
    age_stash(&c, "stale--branch");
    age_stash(&c, "keeper");
    c.remote.delete_branch("stale/branch");
    c.grove_ok(&["fetch"]);

    // Any checkout triggers the scan; main is excluded as the target
    c.grove_ok(&["checkout", "main"]);

    let stale = stash_metadata(&c, "stale--branch").unwrap();
    assert!(stale.contains("status = \"archived\""));
    assert!(stale.contains("archive_path"));
    assert!(!anchor_resolves(&c, "stale--branch"));
    let archive_dir = c.control().join("stashes/archive");
    let archived: Vec<_> = std::fs::read_dir(&archive_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().into_string().unwrap())
        .collect();
    assert!(
        archived
            .iter()
            .any(|name| name.starts_with("stale--branch.patch")),
        "archive file missing: {archived:?}"
    );

    let keeper = stash_metadata(&c, "keeper").unwrap();
    assert!(keeper.contains("status = \"active\""));
    assert!(anchor_resolves(&c, "keeper"));
}

#[test]
fn archive_scan_never_archives_the_checkout_target() {
    let c = TestContainer::init("main");
    c.remote.add_branch("other");
    c.grove_ok(&["fetch"]);
    set_slot_count(&c, 1);

    c.grove_ok(&["checkout", "other"]);
    let slot = c.slot_holding("other").unwrap();
    std::fs::write(c.path().join(&slot).join("wip.txt"), "target wip").unwrap();
    c.grove_ok(&["checkout", "main"]);

    // The stash is overdue and its branch is gone from the remote: prime
    // archive material, except that we are about to check it out.
    age_stash(&c, "other");
    c.remote.delete_branch("other");
    c.grove_ok(&["fetch"]);

    c.grove_ok(&["checkout", "other"]);

    // Restored, not archived
    let dir = c.path().join(c.slot_holding("other").unwrap());
    assert_eq!(
        std::fs::read_to_string(dir.join("wip.txt")).unwrap(),
        "target wip"
    );
    assert!(stash_metadata(&c, "other").is_none());
}

#[test]
fn checkout_of_missing_branch_fails_before_evicting() {
    let c = TestContainer::init("main");
    set_slot_count(&c, 1);
    c.grove_ok(&["checkout", "main"]);

    let slot = c.slot_holding("main").unwrap();
    std::fs::write(c.path().join(&slot).join("precious.txt"), "untouched").unwrap();

    let output = c.grove(&["checkout", "nosuchbranch"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not found"), "stderr was: {stderr}");

    // Nothing was evicted, nothing was stashed
    assert_eq!(c.slot_holding("main").unwrap(), slot);
    assert!(c.path().join(&slot).join("precious.txt").exists());
    assert!(stash_metadata(&c, "main").is_none());
}

#[test]
fn create_flag_makes_a_branch_and_rejects_duplicates() {
    let c = TestContainer::init("main");

    c.grove_ok(&["checkout", "-b", "topic"]);
    assert!(c.slot_holding("topic").is_some());

    let output = c.grove(&["checkout", "-b", "topic"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already exists"), "stderr was: {stderr}");

    // Explicit bad start point fails cleanly too
    let output = c.grove(&["checkout", "-b", "topic2", "does-not-exist"]);
    assert!(!output.status.success());
}

#[test]
fn reconcile_repairs_an_emptied_slot() {
    let c = TestContainer::init("main");
    let holder = c.slot_holding("main").unwrap();
    let vacant = c
        .slot_names()
        .into_iter()
        .find(|name| *name != holder)
        .unwrap();

    // Simulate `rm -rf slot/*` (the directory itself stays)
    let dir = c.path().join(&vacant);
    for entry in std::fs::read_dir(&dir).unwrap().flatten() {
        let path = entry.path();
        if path.is_dir() {
            std::fs::remove_dir_all(path).unwrap();
        } else {
            std::fs::remove_file(path).unwrap();
        }
    }

    c.grove_ok(&["clean"]);

    assert!(dir.join(".git").exists(), "slot was rebuilt");
    assert!(git_output(&dir, &["status", "--porcelain"]).status.success());
    // Still vacant: detached HEAD
    assert_eq!(git_stdout(&dir, &["branch", "--show-current"]), "");
}

#[test]
fn reconcile_without_external_change_is_a_no_op() {
    let c = TestContainer::init("main");
    c.grove_ok(&["clean"]);
    let first = c.state_text();
    c.grove_ok(&["clean"]);
    assert_eq!(c.state_text(), first);
}

#[test]
fn pinned_slots_are_never_evicted() {
    let c = TestContainer::init("main");
    c.remote.add_branch("other");
    c.grove_ok(&["fetch"]);
    set_slot_count(&c, 1);
    c.grove_ok(&["checkout", "main"]);

    let slot = c.slot_holding("main").unwrap();
    c.grove_ok(&["pin", &slot]);

    let output = c.grove(&["checkout", "other"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pinned"), "stderr was: {stderr}");

    c.grove_ok(&["unpin", &slot]);
    c.grove_ok(&["checkout", "other"]);
    assert!(c.slot_holding("other").is_some());
}

#[test]
fn stash_drop_removes_record_ref_and_listing() {
    let c = TestContainer::init("main");
    c.remote.add_branch("other");
    c.grove_ok(&["fetch"]);
    set_slot_count(&c, 1);

    let slot = c.slot_holding("main").unwrap();
    std::fs::write(c.path().join(&slot).join("wip.txt"), "x").unwrap();
    c.grove_ok(&["checkout", "other"]);
    assert!(anchor_resolves(&c, "main"));

    let output = c.grove_ok(&["stash", "list"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("main"));

    c.grove_ok(&["stash", "drop", "main"]);
    assert!(stash_metadata(&c, "main").is_none());
    assert!(!anchor_resolves(&c, "main"));

    let output = c.grove_ok(&["stash", "list"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("No stashes"));
}

#[test]
fn stash_show_prints_the_patch() {
    let c = TestContainer::init("main");
    c.remote.add_branch("other");
    c.grove_ok(&["fetch"]);
    set_slot_count(&c, 1);

    let slot = c.slot_holding("main").unwrap();
    std::fs::write(
        c.path().join(&slot).join("src.txt"),
        "line one\nstashed edit\n",
    )
    .unwrap();
    c.grove_ok(&["checkout", "other"]);

    let output = c.grove_ok(&["stash", "show", "main"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("stashed edit"), "stdout was: {stdout}");
}

#[test]
fn lock_blocks_concurrent_operations() {
    let c = TestContainer::init("main");
    std::fs::write(c.control().join("lock"), "12345\n").unwrap();

    let output = c.grove(&["fetch"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("locked"), "stderr was: {stderr}");

    std::fs::remove_file(c.control().join("lock")).unwrap();
    c.grove_ok(&["fetch"]);
}

#[test]
fn fetch_cooldown_skips_the_second_fetch() {
    let c = TestContainer::init("main");
    c.remote.add_branch("late/arrival");

    // Within the cool-down window (init just fetched), a plain checkout
    // does not see the new remote branch...
    let output = c.grove(&["checkout", "late/arrival"]);
    assert!(!output.status.success());

    // ...but a forced fetch does
    c.grove_ok(&["fetch"]);
    c.grove_ok(&["checkout", "late/arrival"]);
    assert!(c.slot_holding("late/arrival").is_some());
}

#[test]
fn sync_propagates_shared_files_between_slots() {
    let c = TestContainer::init("main");
    std::fs::write(
        c.control().join("config.toml"),
        "slot_count = 5\n\n[shared]\nfiles = [\".env\"]\n",
    )
    .unwrap();

    let holder = c.slot_holding("main").unwrap();
    std::fs::write(c.path().join(&holder).join(".env"), "SECRET=1").unwrap();

    c.grove_ok(&["sync"]);

    assert!(c.control().join("shared/.env").is_file());
    for slot in c.slot_names() {
        let link = c.path().join(&slot).join(".env");
        let meta = link.symlink_metadata().unwrap();
        assert!(
            meta.file_type().is_symlink(),
            "{slot}/.env should be a symlink"
        );
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "SECRET=1");
    }

    // Idempotent: a second run leaves everything in place
    c.grove_ok(&["sync"]);
    assert_eq!(
        std::fs::read_to_string(c.control().join("shared/.env")).unwrap(),
        "SECRET=1"
    );
}

#[test]
fn list_shows_slots_branches_and_stashes() {
    let c = TestContainer::init("main");
    let output = c.grove_ok(&["list"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("main"), "stdout was: {stdout}");
    assert!(stdout.contains("(vacant)"), "stdout was: {stdout}");
}

#[test]
fn shell_init_emits_the_wrapper() {
    let c = TestContainer::init("main");
    for shell in ["bash", "zsh", "fish"] {
        let output = c.grove_ok(&["shell-init", shell]);
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("command grove"), "{shell}: {stdout}");
        assert!(stdout.contains("GROVE_SHELL_INTEGRATION"), "{shell}");
        assert!(stdout.contains("post-checkout"), "{shell}");
    }
}

#[test]
fn checkout_outside_a_container_fails_with_a_hint() {
    let c = TestContainer::init("main");
    let outside = tempfile::tempdir().unwrap();
    let output = c.grove_in(outside.path(), &["checkout", "main"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Not inside"), "stderr was: {stderr}");
}
