// src/executor/mod.rs

//! Build plan execution
//!
//! The [`Executor`] runs a [`BuildPlan`] against a working directory:
//!
//! 1. every program the plan invokes is looked up on `PATH` (optional),
//! 2. the working directory is locked for the duration of the run,
//! 3. steps run strictly in plan order, one at a time,
//! 4. every expected artifact must exist once the last step finishes.
//!
//! The first failing step aborts the plan; later steps never run. Nothing
//! is rolled back or cleaned up: generated files and partial build output
//! stay in place for inspection.
//!
//! A [`CancellationToken`] stops the run between steps and kills the
//! command in flight.

mod lock;
mod patch;
mod runner;

pub use lock::{WorkdirLock, LOCK_FILE_NAME};
pub use patch::apply_patch;
pub use runner::{
    CancellationToken, CommandOutput, CommandRunner, CommandSpec, RunError, SystemCommandRunner,
};

use crate::config::ExecutorConfig;
use crate::error::{Error, Result};
use crate::plan::{template, BuildPlan, BuildStep, PatchSource};
use crate::progress::{ProgressTracker, SilentProgress};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Placeholder in command arguments replaced by the absolute working directory
pub const WORKDIR_PLACEHOLDER: &str = "%(workdir)s";

/// A build step that did not succeed
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Build step {step_index} ({command}) failed: {reason}")]
pub struct BuildStepFailure {
    /// Zero-based index of the step in the plan
    pub step_index: usize,
    /// Command line that was run
    pub command: String,
    /// Exit code; `None` when the command never exited normally
    pub exit_code: Option<i32>,
    pub reason: String,
    pub stdout: String,
    pub stderr: String,
}

/// Outcome of a successful plan run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// Absolute working directory the plan ran in
    pub working_dir: PathBuf,
    /// Absolute paths of the produced artifacts, in plan order
    pub artifacts: Vec<PathBuf>,
    pub steps_run: usize,
}

/// Runs build plans
pub struct Executor {
    runner: Arc<dyn CommandRunner>,
    config: ExecutorConfig,
    progress: Arc<dyn ProgressTracker>,
}

impl Executor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            config: ExecutorConfig::default(),
            progress: Arc::new(SilentProgress::new()),
        }
    }

    /// Executor spawning real processes
    pub fn system() -> Self {
        Self::new(Arc::new(SystemCommandRunner::new()))
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `plan` in `working_dir`
    pub fn execute(&self, plan: &BuildPlan, working_dir: &Path) -> Result<BuildResult> {
        self.execute_with_cancel(plan, working_dir, &CancellationToken::new())
    }

    /// Run `plan` in `working_dir`, stopping when `cancel` fires
    pub fn execute_with_cancel(
        &self,
        plan: &BuildPlan,
        working_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<BuildResult> {
        if self.config.check_tools {
            check_tools(plan)?;
        }

        let root = std::path::absolute(working_dir)?;
        let _lock = if self.config.wait_for_lock {
            WorkdirLock::acquire(&root)?
        } else {
            WorkdirLock::try_acquire(&root)?.ok_or_else(|| {
                Error::IoError(format!(
                    "Working directory {} is in use by another build",
                    root.display()
                ))
            })?
        };

        info!("Executing {} build steps in {}", plan.len(), root.display());
        self.progress.set_length(plan.len() as u64);

        for (index, step) in plan.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                self.progress.finish_with_error("cancelled");
                return Err(Error::Cancelled { step_index: index });
            }
            info!("Step {}/{}: {}", index + 1, plan.len(), step);
            self.progress.step_started(index, &step.to_string());

            if let Err(e) = self.run_step(index, step, &root, cancel) {
                warn!("Step {} failed: {}", index, e);
                self.progress.finish_with_error(&e.to_string());
                return Err(e);
            }
            self.progress.increment(1);
        }

        let missing: Vec<PathBuf> = plan
            .artifacts
            .iter()
            .filter(|a| !root.join(a).exists())
            .cloned()
            .collect();
        if !missing.is_empty() {
            self.progress.finish_with_error("expected artifacts are missing");
            return Err(Error::MissingArtifacts(missing));
        }

        let artifacts: Vec<PathBuf> = plan.artifacts.iter().map(|a| root.join(a)).collect();
        self.progress
            .finish_with_message(&format!("built {} artifacts", artifacts.len()));
        info!("Build complete: {} artifacts", artifacts.len());

        Ok(BuildResult {
            working_dir: root,
            artifacts,
            steps_run: plan.len(),
        })
    }

    fn run_step(&self, index: usize, step: &BuildStep, root: &Path, cancel: &CancellationToken) -> Result<()> {
        match step {
            BuildStep::GenerateFile { path, template, bindings } => {
                let content = template::render(template, bindings)?;
                write_generated(&root.join(path), &content)
            }
            BuildStep::ApplyPatch { dir, patch, strip } => {
                let text = match patch {
                    PatchSource::Inline { content, .. } => content.clone(),
                    PatchSource::File(path) => fs::read_to_string(root.join(path)).map_err(|e| {
                        Error::PatchError(format!("cannot read {}: {}", path.display(), e))
                    })?,
                };
                apply_patch(&root.join(dir), &text, *strip)?;
                Ok(())
            }
            BuildStep::RunCommand { argv, cwd, expected_exit_codes } => {
                self.run_command(index, argv, &root.join(cwd), expected_exit_codes, root, cancel)
            }
        }
    }

    fn run_command(
        &self,
        index: usize,
        argv: &[String],
        cwd: &Path,
        expected: &[i32],
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let workdir = root.display().to_string();
        let argv: Vec<String> = argv
            .iter()
            .map(|arg| arg.replace(WORKDIR_PLACEHOLDER, &workdir))
            .collect();
        let mut command = CommandSpec::new(argv, cwd).with_timeout(self.config.command_timeout());
        for (key, value) in &self.config.env {
            command = command.with_env(key.clone(), value.clone());
        }
        let command_line = command.display();

        let output = match self.runner.run(&command, cancel) {
            Ok(output) => output,
            Err(RunError::Cancelled { .. }) => return Err(Error::Cancelled { step_index: index }),
            Err(e) => {
                return Err(BuildStepFailure {
                    step_index: index,
                    command: command_line,
                    exit_code: None,
                    reason: e.to_string(),
                    stdout: String::new(),
                    stderr: String::new(),
                }
                .into());
            }
        };

        let program = command.argv.first().map(String::as_str).unwrap_or_default();
        for line in output.stderr.lines() {
            warn!("{}: {}", program, line);
        }

        match output.exit_code {
            Some(code) if expected.contains(&code) => {
                debug!("{} exited with {}", command_line, code);
                Ok(())
            }
            code => Err(BuildStepFailure {
                step_index: index,
                command: command_line,
                exit_code: code,
                reason: match code {
                    Some(code) => format!("exited with code {}", code),
                    None => "terminated by a signal".to_string(),
                },
                stdout: output.stdout,
                stderr: output.stderr,
            }
            .into()),
        }
    }
}

/// Run `plan` in `working_dir` with real processes and default settings
pub fn execute(plan: &BuildPlan, working_dir: &Path) -> Result<BuildResult> {
    Executor::system().execute(plan, working_dir)
}

/// Every program the plan invokes must be installed
fn check_tools(plan: &BuildPlan) -> Result<()> {
    for tool in plan.tools() {
        if which::which(&tool).is_err() {
            return Err(Error::ToolNotFound(tool));
        }
    }
    Ok(())
}

/// Write through a temporary file in the target directory, then rename
fn write_generated(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::IoError(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content.as_bytes())?;

    if content.starts_with("#!") {
        mark_executable(tmp.as_file())?;
    }

    tmp.persist(path)
        .map_err(|e| Error::IoError(format!("Failed to write {}: {}", path.display(), e.error)))?;
    debug!("Generated {}", path.display());
    Ok(())
}

#[cfg(unix)]
fn mark_executable(file: &fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn mark_executable(_file: &fs::File) -> std::io::Result<()> {
    Ok(())
}
