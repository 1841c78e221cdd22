// src/executor/runner.rs

//! Command execution capability
//!
//! Build steps and native repository queries run external programs through
//! a [`CommandRunner`]. [`SystemCommandRunner`] spawns real processes; tests
//! substitute a recording runner.
//!
//! Long-running commands can be stopped two ways: a per-command timeout, and
//! a shared [`CancellationToken`] (which may carry a deadline). Either one
//! kills the child's whole process group, so `make` and the compilers it
//! started go down with it.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// How often a running child is checked for cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long captured output is still collected after a kill
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Shared cancellation signal with an optional deadline
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    /// A token that is only cancelled explicitly
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also expires at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// A token that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// A command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new<I, S>(argv: I, cwd: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command line for diagnostics
    pub fn display(&self) -> String {
        self.argv.join(" ")
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Why a command produced no output
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("Failed to spawn {command}: {message}")]
    Spawn { command: String, message: String },

    #[error("{command} timed out after {} seconds", .timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },

    #[error("{command} was cancelled")]
    Cancelled { command: String },

    #[error("I/O error while running {command}: {message}")]
    Io { command: String, message: String },
}

/// Capability to run external commands
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &CommandSpec, cancel: &CancellationToken) -> Result<CommandOutput, RunError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for Arc<R> {
    fn run(&self, command: &CommandSpec, cancel: &CancellationToken) -> Result<CommandOutput, RunError> {
        (**self).run(command, cancel)
    }
}

/// Runs commands as child processes
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buf);
        }
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Put the child in a process group of its own
#[cfg(unix)]
fn isolate(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_command: &mut Command) {}

/// Kill the child and everything it started
#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let group = Pid::from_raw(child.id() as i32);
    if let Err(e) = killpg(group, Signal::SIGKILL) {
        debug!("killpg({}) failed: {}", group, e);
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, command: &CommandSpec, cancel: &CancellationToken) -> Result<CommandOutput, RunError> {
        let command_line = command.display();
        let (program, args) = command.argv.split_first().ok_or_else(|| RunError::Spawn {
            command: command_line.clone(),
            message: "empty command line".to_string(),
        })?;

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled { command: command_line });
        }

        debug!("Running {} in {}", command_line, command.cwd.display());

        let mut process = Command::new(program);
        isolate(&mut process);
        let mut child = process
            .args(args)
            .current_dir(&command.cwd)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RunError::Spawn {
                command: command_line.clone(),
                message: e.to_string(),
            })?;

        // Drain pipes on separate threads so a chatty child cannot block
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let started = Instant::now();
        let io_error = |e: std::io::Error| RunError::Io {
            command: command_line.clone(),
            message: e.to_string(),
        };

        let status = loop {
            if let Some(status) = child.wait_timeout(POLL_INTERVAL).map_err(io_error)? {
                break status;
            }
            let timed_out = command.timeout.is_some_and(|t| started.elapsed() >= t);
            if timed_out || cancel.is_cancelled() {
                let reason = if timed_out { "timeout" } else { "cancelled" };
                warn!("Killing {} ({})", command_line, reason);
                kill_tree(&mut child);
                let _ = child.wait();
                // A process that left the group may still hold the pipes
                let _ = stdout.recv_timeout(DRAIN_GRACE);
                let _ = stderr.recv_timeout(DRAIN_GRACE);
                return Err(match command.timeout.filter(|_| timed_out) {
                    Some(timeout) => RunError::TimedOut {
                        command: command_line.clone(),
                        timeout,
                    },
                    None => RunError::Cancelled {
                        command: command_line.clone(),
                    },
                });
            }
        };

        let stdout = stdout.recv().unwrap_or_default();
        let stderr = stderr.recv().unwrap_or_default();

        Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}
