//! Subprocess execution with timing and debug logging.
//!
//! All external commands go through [`Cmd`] so every invocation is logged
//! the same way:
//!
//! ```text
//! $ git fetch --all --prune [repo]
//! [grove-trace] context=repo cmd="git fetch --all --prune" dur=412.8ms ok=true
//! ```
//!
//! Stdout is always captured. Stderr is **inherited** by default so git's
//! own diagnostics reach the user unchanged; probe commands whose failure is
//! expected (ref existence checks, the checkout fallback) opt into
//! [`Cmd::quiet`] or [`Cmd::capture_stderr`] instead.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Instant;

/// What to do with the child's stderr stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StderrMode {
    /// Stream to the parent's stderr (default; git errors reach the user raw)
    Inherit,
    /// Discard (probes where failure is an expected answer)
    Quiet,
    /// Capture into the returned [`Output`] (probe-then-replay)
    Capture,
}

/// Builder for a single logged subprocess invocation.
#[derive(Debug)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    context: Option<String>,
    stderr: StderrMode,
}

impl Cmd {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            context: None,
            stderr: StderrMode::Inherit,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Working directory; grove never runs git with an ambient cwd.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Short display name used in the debug log, typically the slot name.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Discard stderr entirely.
    pub fn quiet(mut self) -> Self {
        self.stderr = StderrMode::Quiet;
        self
    }

    /// Capture stderr into the returned `Output` instead of streaming it.
    pub fn capture_stderr(mut self) -> Self {
        self.stderr = StderrMode::Capture;
        self
    }

    /// Run the command, capturing stdout.
    pub fn run(self) -> std::io::Result<Output> {
        let cmd_str = self.display_string();
        match &self.context {
            Some(ctx) => log::debug!("$ {cmd_str} [{ctx}]"),
            None => log::debug!("$ {cmd_str}"),
        }

        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null()).stdout(Stdio::piped());
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        command.stderr(match self.stderr {
            StderrMode::Inherit => Stdio::inherit(),
            StderrMode::Quiet => Stdio::null(),
            StderrMode::Capture => Stdio::piped(),
        });

        let t0 = Instant::now();
        let result = command.output();
        let dur_ms = t0.elapsed().as_secs_f64() * 1000.0;

        match (&result, &self.context) {
            (Ok(output), Some(ctx)) => log::debug!(
                "[grove-trace] context={ctx} cmd=\"{cmd_str}\" dur={dur_ms:.1}ms ok={}",
                output.status.success()
            ),
            (Ok(output), None) => log::debug!(
                "[grove-trace] cmd=\"{cmd_str}\" dur={dur_ms:.1}ms ok={}",
                output.status.success()
            ),
            (Err(e), Some(ctx)) => {
                log::debug!("[grove-trace] context={ctx} cmd=\"{cmd_str}\" dur={dur_ms:.1}ms err=\"{e}\"")
            }
            (Err(e), None) => {
                log::debug!("[grove-trace] cmd=\"{cmd_str}\" dur={dur_ms:.1}ms err=\"{e}\"")
            }
        }

        result
    }

    fn display_string(&self) -> String {
        let mut s = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            s.push(' ');
            s.push_str(&arg.to_string_lossy());
        }
        s
    }
}

/// Short display name for a path, used as logging context.
pub fn path_context(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(".")
        .to_string()
}
