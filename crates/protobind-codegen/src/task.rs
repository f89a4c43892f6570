//! Blocking external-process execution with timeout and cancellation.
//!
//! A [`CompilerTask`] captures both output streams, waits for the child up
//! to a deadline, and reports a structured [`TaskOutput`]. Whether a
//! non-zero exit is fatal is left to the caller.
//!
//! On Unix the child leads its own process group, so a timeout or cancel
//! also kills the plugins it spawned. Stream capture is bounded too: a
//! descendant that keeps a pipe open cannot hold up the caller.

use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{CodegenError, Result};

/// Default upper bound on a single compiler invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long captured streams may stay open after the child was killed.
const READER_GRACE: Duration = Duration::from_millis(200);

const READ_CHUNK: usize = 8 * 1024;

/// Shared flag used to abort running and pending invocations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// The process exited with this code.
    Exited(i32),
    /// The process was terminated by a signal.
    Signaled,
    /// The deadline passed and the process was killed.
    TimedOut,
    /// The cancel token was set and the process was killed.
    Cancelled,
}

/// Structured result of one external invocation.
#[derive(Debug, Clone)]
pub struct TaskOutput {
    pub program: PathBuf,
    pub status: TaskStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
    pub timeout: Duration,
}

impl TaskOutput {
    pub fn success(&self) -> bool {
        self.status == TaskStatus::Exited(0)
    }

    /// Surface captured output regardless of outcome.
    pub fn log_streams(&self) {
        let program = self.program.display();
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            info!(%program, "compiler stdout: {stdout}");
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            warn!(%program, "compiler stderr: {stderr}");
        }
    }

    /// Convert anything but a zero exit into an error carrying stderr.
    pub fn require_success(self) -> Result<Self> {
        match self.status {
            TaskStatus::Exited(0) => Ok(self),
            TaskStatus::Exited(code) => Err(CodegenError::CompilerFailed {
                program: self.program,
                code: Some(code),
                stderr: self.stderr,
            }),
            TaskStatus::Signaled => Err(CodegenError::CompilerFailed {
                program: self.program,
                code: None,
                stderr: self.stderr,
            }),
            TaskStatus::TimedOut => Err(CodegenError::Timeout {
                program: self.program,
                timeout: self.timeout,
            }),
            TaskStatus::Cancelled => Err(CodegenError::Cancelled {
                program: self.program,
            }),
        }
    }
}

/// A single external compiler invocation.
#[derive(Debug, Clone)]
pub struct CompilerTask {
    program: PathBuf,
    args: Vec<OsString>,
    search_path_prefix: Option<PathBuf>,
    timeout: Duration,
    cancel: CancelToken,
}

impl CompilerTask {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            search_path_prefix: None,
            timeout: DEFAULT_TIMEOUT,
            cancel: CancelToken::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Prepend `dir` to `PATH` in the child's environment only.
    ///
    /// Lets the compiler find plugins installed next to it without
    /// touching this process's environment.
    pub fn search_path_prefix(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_path_prefix = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Run to completion, timeout, or cancellation.
    pub fn run(&self) -> Result<TaskOutput> {
        if self.cancel.is_cancelled() {
            return Err(CodegenError::Cancelled {
                program: self.program.clone(),
            });
        }

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        if let Some(dir) = &self.search_path_prefix {
            command.env("PATH", prepend_search_path(dir)?);
        }
        debug!(program = %self.program.display(), args = ?self.args, "spawning compiler");

        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| CodegenError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait(&mut child, start)?;

        let deadline = match status {
            TaskStatus::TimedOut | TaskStatus::Cancelled => Instant::now() + READER_GRACE,
            _ => (start + self.timeout).max(Instant::now() + READER_GRACE),
        };
        let (stdout, stdout_done) = collect(&stdout, deadline);
        let (stderr, stderr_done) = collect(&stderr, deadline);
        if !(stdout_done && stderr_done) {
            warn!(
                program = %self.program.display(),
                "compiler output still open after exit; killing leftover processes"
            );
            kill_process_group(&child);
        }

        Ok(TaskOutput {
            program: self.program.clone(),
            status,
            stdout,
            stderr,
            elapsed: start.elapsed(),
            timeout: self.timeout,
        })
    }

    fn wait(&self, child: &mut Child, start: Instant) -> Result<TaskStatus> {
        loop {
            let polled = child
                .try_wait()
                .map_err(|e| CodegenError::io(&self.program, e))?;
            if let Some(status) = polled {
                return Ok(exit_status(status));
            }
            let interrupted = if self.cancel.is_cancelled() {
                Some(TaskStatus::Cancelled)
            } else if start.elapsed() >= self.timeout {
                Some(TaskStatus::TimedOut)
            } else {
                None
            };
            if let Some(status) = interrupted {
                kill_process_group(child);
                // The child may exit between the poll and the kill.
                let _ = child.kill();
                child.wait().map_err(|e| CodegenError::io(&self.program, e))?;
                return Ok(status);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn exit_status(status: ExitStatus) -> TaskStatus {
    match status.code() {
        Some(code) => TaskStatus::Exited(code),
        None => TaskStatus::Signaled,
    }
}

/// Kill every process in the child's group: the compiler and its plugins.
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: kill(2) only takes integer arguments. The child was spawned
    // with process_group(0), so its pid is also its group id.
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

/// Forward a pipe's contents in chunks until EOF.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let Some(mut pipe) = pipe else {
            return;
        };
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

/// Gather chunks until the pipe closes or `deadline` passes.
///
/// Returns the text and whether the pipe reached EOF.
fn collect(rx: &Receiver<Vec<u8>>, deadline: Instant) -> (String, bool) {
    let mut bytes = Vec::new();
    let closed = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => break true,
            Err(RecvTimeoutError::Timeout) => break false,
        }
    };
    (String::from_utf8_lossy(&bytes).into_owned(), closed)
}

fn prepend_search_path(dir: &Path) -> Result<OsString> {
    let existing = std::env::var_os("PATH").unwrap_or_default();
    let entries = std::iter::once(dir.to_path_buf()).chain(std::env::split_paths(&existing));
    std::env::join_paths(entries).map_err(|_| CodegenError::SearchPath {
        dir: dir.to_path_buf(),
    })
}
