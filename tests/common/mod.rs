#![allow(dead_code)]

//! Test fixtures: an isolated "remote" repository and a grove container
//! cloned from it.
//!
//! Git runs with a scrubbed environment (no user/global config, fixed
//! author) so tests behave the same on any machine. The grove binary gets a
//! per-fixture TMPDIR so nav files from concurrently running tests cannot
//! collide.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

/// Run git with an isolated environment, asserting success.
pub fn git(cwd: &Path, args: &[&str]) {
    let output = git_output(cwd, args);
    assert!(
        output.status.success(),
        "git {:?} failed in {}:\n{}",
        args,
        cwd.display(),
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn git_output(cwd: &Path, args: &[&str]) -> Output {
    Command::new("git")
        .args(args)
        .current_dir(cwd)
        .env_remove("GIT_DIR")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_CONFIG_SYSTEM", "/dev/null")
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .stdin(Stdio::null())
        .output()
        .expect("git is installed")
}

pub fn git_stdout(cwd: &Path, args: &[&str]) -> String {
    let output = git_output(cwd, args);
    assert!(
        output.status.success(),
        "git {:?} failed:\n{}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A bare "remote" repository plus a work clone used to seed it.
pub struct TestRemote {
    pub dir: TempDir,
    pub default_branch: String,
}

impl TestRemote {
    pub fn new(default_branch: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        std::fs::create_dir(&work).unwrap();

        git(&work, &["init", "-q", "-b", default_branch]);
        std::fs::write(work.join("README.md"), "# fixture\n").unwrap();
        std::fs::write(work.join("src.txt"), "line one\n").unwrap();
        git(&work, &["add", "."]);
        git(&work, &["commit", "-q", "-m", "initial"]);

        let remote = dir.path().join("remote.git");
        git(dir.path(), &["init", "-q", "--bare", "remote.git"]);
        git(
            &remote,
            &[
                "symbolic-ref",
                "HEAD",
                &format!("refs/heads/{default_branch}"),
            ],
        );
        git(&work, &["remote", "add", "origin", remote.to_str().unwrap()]);
        git(&work, &["push", "-q", "origin", default_branch]);

        Self {
            dir,
            default_branch: default_branch.to_string(),
        }
    }

    pub fn url(&self) -> String {
        self.dir.path().join("remote.git").display().to_string()
    }

    fn work(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    /// Create and push a branch with one extra commit.
    pub fn add_branch(&self, name: &str) {
        let work = self.work();
        git(&work, &["checkout", "-q", "-b", name]);
        std::fs::write(work.join(format!("{}.txt", name.replace('/', "_"))), name).unwrap();
        git(&work, &["add", "."]);
        git(&work, &["commit", "-q", "-m", name]);
        git(&work, &["push", "-q", "origin", name]);
        git(&work, &["checkout", "-q", &self.default_branch]);
    }

    /// Delete a branch on the remote.
    pub fn delete_branch(&self, name: &str) {
        git(&self.work(), &["push", "-q", "origin", "--delete", name]);
    }
}

/// A container initialized from a [`TestRemote`].
pub struct TestContainer {
    pub remote: TestRemote,
    pub root: TempDir,
    /// Private TMPDIR handed to the binary (nav files land here).
    pub tmp: TempDir,
}

impl TestContainer {
    pub fn init(default_branch: &str) -> Self {
        let remote = TestRemote::new(default_branch);
        let root = tempfile::tempdir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let fixture = Self { remote, root, tmp };
        let output = fixture.grove(&["init", &fixture.remote.url()]);
        assert!(
            output.status.success(),
            "grove init failed:\n{}",
            String::from_utf8_lossy(&output.stderr)
        );
        fixture
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Run the grove binary inside the container.
    pub fn grove(&self, args: &[&str]) -> Output {
        self.grove_in(self.path(), args)
    }

    pub fn grove_in(&self, cwd: &Path, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_grove"))
            .args(args)
            .current_dir(cwd)
            .env("TMPDIR", self.tmp.path())
            .env("GIT_CONFIG_GLOBAL", "/dev/null")
            .env("GIT_CONFIG_SYSTEM", "/dev/null")
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .env_remove("GROVE_SHELL_INTEGRATION")
            .stdin(Stdio::null())
            .output()
            .expect("grove binary exists")
    }

    pub fn grove_ok(&self, args: &[&str]) -> Output {
        let output = self.grove(args);
        assert!(
            output.status.success(),
            "grove {:?} failed:\n{}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        output
    }

    pub fn control(&self) -> PathBuf {
        self.path().join(".grove")
    }

    pub fn repo(&self) -> PathBuf {
        self.control().join("repo")
    }

    pub fn state_text(&self) -> String {
        std::fs::read_to_string(self.control().join("state.toml")).unwrap()
    }

    /// Slot directory names, sorted.
    pub fn slot_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| !n.starts_with('.'))
            .collect();
        names.sort();
        names
    }

    /// The slot whose git HEAD is on `branch`, if any.
    pub fn slot_holding(&self, branch: &str) -> Option<String> {
        self.slot_names().into_iter().find(|name| {
            git_stdout(&self.path().join(name), &["branch", "--show-current"]) == branch
        })
    }

    /// Read the nav file the last grove invocation wrote.
    pub fn nav_target(&self) -> Option<String> {
        let entries = std::fs::read_dir(self.tmp.path()).ok()?;
        for entry in entries.flatten() {
            let name = entry.file_name().into_string().ok()?;
            if name.starts_with("grove-nav-") {
                return Some(
                    std::fs::read_to_string(entry.path())
                        .ok()?
                        .trim()
                        .to_string(),
                );
            }
        }
        None
    }
}
