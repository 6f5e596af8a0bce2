//! Cross-platform subprocess execution with timeout and cooperative
//! cancellation.
//!
//! Generalizes `shipper-process::run_command_with_timeout` (spawn, poll
//! with a short sleep, kill-on-deadline) into the primitive the source
//! provisioner uses for `git fetch`/`git worktree add` and the workflow
//! engine's `atmos`/`shell` step handlers use for dispatching subprocesses.
//! Unlike the teacher's version, callers pass an explicit [`Cancellation`]
//! token rather than only a timeout, so a context-cancelled workflow run
//! can abort an in-flight subprocess the same way a deadline does: a
//! cancelled context causes the current phase to abort.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use atmos_errors::{AtmosError, ErrorKind};

/// A cooperative cancellation flag. Cloning shares the same underlying
/// flag; [`Cancellation::cancel`] from any clone aborts every command
/// still polling on it.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The result of running a subprocess to completion, to a timeout, or to
/// cancellation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub cancelled: bool,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out && !self.cancelled
    }

    /// Turn a non-zero/timed-out/cancelled result into `Err(ErrTimeout |
    /// ErrNetwork-flavored AtmosError)`, otherwise pass `self` through.
    pub fn into_result(self, program: &str) -> Result<Self> {
        if self.timed_out {
            return Err(AtmosError::new(
                ErrorKind::Timeout,
                format!("{program} timed out after {}", humantime::format_duration(self.duration)),
            )
            .with_context("stderr", truncate(&self.stderr))
            .into());
        }
        if self.cancelled {
            return Err(AtmosError::new(ErrorKind::Timeout, format!("{program} was cancelled")).into());
        }
        if self.exit_code != 0 {
            return Err(AtmosError::new(
                ErrorKind::NotFound,
                format!("{program} exited with status {}", self.exit_code),
            )
            .with_context("stderr", truncate(&self.stderr))
            .into());
        }
        Ok(self)
    }
}

fn truncate(s: &str) -> String {
    const MAX: usize = 2000;
    if s.len() <= MAX {
        s.to_string()
    } else {
        format!("{}… ({} bytes total)", &s[..MAX], s.len())
    }
}

/// Options for one subprocess invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub working_dir: Option<std::path::PathBuf>,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    pub cancellation: Option<Cancellation>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }
}

/// Run `program args…` to completion, honoring an optional timeout and
/// cancellation token. Polls every 50ms rather than blocking on `wait()` so
/// the deadline/cancellation check can fire promptly.
#[tracing::instrument(skip(opts), fields(program = %program))]
pub fn run(program: &str, args: &[&str], opts: &RunOptions) -> Result<CommandOutput> {
    let start = Instant::now();
    let mut command = Command::new(program);
    command.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
    if let Some(dir) = &opts.working_dir {
        command.current_dir(dir);
    }
    for (k, v) in &opts.env {
        command.env(k, v);
    }

    let mut child: Child = command
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;

    let deadline = opts.timeout.map(|t| Instant::now() + t);
    loop {
        if let Some(status) = child
            .try_wait()
            .with_context(|| format!("failed to poll {program}"))?
        {
            return Ok(CommandOutput {
                exit_code: status.code().unwrap_or(-1),
                stdout: read_pipe(child.stdout.take()),
                stderr: read_pipe(child.stderr.take()),
                timed_out: false,
                cancelled: false,
                duration: start.elapsed(),
            });
        }

        let cancelled = opts.cancellation.as_ref().is_some_and(Cancellation::is_cancelled);
        let expired = deadline.is_some_and(|d| Instant::now() >= d);
        if cancelled || expired {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(CommandOutput {
                exit_code: -1,
                stdout: read_pipe(child.stdout.take()),
                stderr: read_pipe(child.stderr.take()),
                timed_out: expired && !cancelled,
                cancelled,
                duration: start.elapsed(),
            });
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

/// Convenience wrapper: run and immediately convert failure into an error.
pub fn run_checked(program: &str, args: &[&str], opts: &RunOptions) -> Result<CommandOutput> {
    run(program, args, opts)?.into_result(program)
}

fn read_pipe<R: Read>(stream: Option<R>) -> String {
    let mut buffer = Vec::new();
    if let Some(mut s) = stream {
        let _ = s.read_to_end(&mut buffer);
    }
    String::from_utf8_lossy(&buffer).to_string()
}

/// Whether `program` is resolvable on `PATH`.
pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_captures_stdout() {
        let out = run("echo", &["hello"], &RunOptions::new()).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn run_reports_nonzero_exit() {
        let out = run("sh", &["-c", "exit 3"], &RunOptions::new()).unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(!out.success());
    }

    #[test]
    fn run_honors_timeout() {
        let opts = RunOptions::new().with_timeout(Duration::from_millis(100));
        let out = run("sleep", &["5"], &opts).unwrap();
        assert!(out.timed_out);
        assert!(!out.success());
    }

    #[test]
    fn run_honors_cancellation() {
        let cancellation = Cancellation::new();
        let token = cancellation.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            token.cancel();
        });
        let opts = RunOptions::new().with_cancellation(cancellation);
        let out = run("sleep", &["5"], &opts).unwrap();
        assert!(out.cancelled);
    }

    #[test]
    fn into_result_errs_on_timeout() {
        let opts = RunOptions::new().with_timeout(Duration::from_millis(50));
        let err = run("sleep", &["5"], &opts).unwrap().into_result("sleep").unwrap_err();
        let atmos_err = AtmosError::downcast(&err).expect("sentinel");
        assert_eq!(atmos_err.kind, ErrorKind::Timeout);
    }

    #[test]
    fn command_exists_for_sh() {
        assert!(command_exists("sh"));
        assert!(!command_exists("this-does-not-exist-xyz"));
    }
}
