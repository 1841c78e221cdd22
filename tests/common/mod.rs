// tests/common/mod.rs

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use distpack::executor::{CancellationToken, CommandOutput, CommandRunner, CommandSpec, RunError};
use distpack::spec::parse_spec;
use distpack::{Constraint, PackageCandidate, PackageSpec, Requirement, VersionId};
use std::fs;
use std::sync::Mutex;

pub fn req(name: &str, constraint: &str) -> Requirement {
    Requirement::new(name, Constraint::parse(constraint).unwrap())
}

pub fn native(name: &str, version: &str) -> PackageCandidate {
    PackageCandidate::native(name, VersionId::parse(version).unwrap(), name)
}

/// Specification text with runtime requirements
pub fn spec_text(name: &str, version: &str, runtime: &[&str]) -> String {
    let runtime: Vec<String> = runtime.iter().map(|r| format!("\"{}\"", r)).collect();
    format!(
        "[package]\nname = \"{}\"\nversion = \"{}\"\n\n[requires]\nruntime = [{}]\n",
        name,
        version,
        runtime.join(", ")
    )
}

pub fn spec(name: &str, version: &str, runtime: &[&str]) -> PackageSpec {
    parse_spec(&spec_text(name, version, runtime)).unwrap()
}

pub fn bundled(name: &str, version: &str, runtime: &[&str]) -> PackageCandidate {
    PackageCandidate::bundled(spec(name, version, runtime)).unwrap()
}

/// Command runner that records every command instead of spawning it
///
/// `sh build.sh` writes the tarball the generic layout expects into the
/// package directory; a command whose program is listed in `failing` exits 1.
#[derive(Default)]
pub struct RecordingRunner {
    pub log: Mutex<Vec<String>>,
    pub failing: Vec<String>,
}

impl RecordingRunner {
    pub fn failing_on(program: &str) -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            failing: vec![program.to_string()],
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &CommandSpec, _cancel: &CancellationToken) -> Result<CommandOutput, RunError> {
        let dir = command
            .cwd
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.log
            .lock()
            .unwrap()
            .push(format!("{}: {}", dir, command.display()));

        if self.failing.iter().any(|p| p == &command.argv[0]) {
            return Ok(CommandOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: format!("{} failed\n", command.argv[0]),
            });
        }
        if command.argv == ["sh", "build.sh"] {
            fs::write(command.cwd.join(format!("{}.tar.gz", dir)), b"tarball").unwrap();
        }
        Ok(CommandOutput {
            exit_code: Some(0),
            ..Default::default()
        })
    }
}
