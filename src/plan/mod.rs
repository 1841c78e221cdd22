// src/plan/mod.rs

//! Build plans
//!
//! A [`BuildPlan`] is the declarative output of synthesis: an ordered list
//! of [`BuildStep`]s and the artifact paths the plan must leave behind. All
//! paths are relative to the working directory the plan is executed in.
//!
//! Sources are not fetched by the plan. Each bundled package's sources are
//! expected in its directory (`name-version/`, at the adapter's source
//! location) before execution starts.
//!
//! Plans are plain data: they serialize to JSON, compare by value and have
//! a content [`digest`](BuildPlan::digest) so identical inputs can be
//! recognized without re-running a build.

mod synth;
pub mod template;

pub use synth::{synthesize, Synthesizer};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// Where a patch's text comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchSource {
    /// Patch text embedded in the plan
    Inline { name: String, content: String },
    /// Patch file on disk, relative to the working directory unless absolute
    File(PathBuf),
}

impl PatchSource {
    pub fn name(&self) -> String {
        match self {
            PatchSource::Inline { name, .. } => name.clone(),
            PatchSource::File(path) => path.display().to_string(),
        }
    }
}

/// Kind of a build step, for logs and progress reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum StepKind {
    GenerateFile,
    ApplyPatch,
    RunCommand,
}

/// One step of a build plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum BuildStep {
    /// Render `template` with `bindings` and write it to `path`
    GenerateFile {
        path: PathBuf,
        template: String,
        bindings: BTreeMap<String, String>,
    },
    /// Apply a unified diff inside `dir`, stripping `strip` path components
    ApplyPatch {
        dir: PathBuf,
        patch: PatchSource,
        strip: u32,
    },
    /// Run a command; any exit code outside `expected_exit_codes` fails the plan
    RunCommand {
        argv: Vec<String>,
        cwd: PathBuf,
        expected_exit_codes: Vec<i32>,
    },
}

impl BuildStep {
    pub fn kind(&self) -> StepKind {
        match self {
            BuildStep::GenerateFile { .. } => StepKind::GenerateFile,
            BuildStep::ApplyPatch { .. } => StepKind::ApplyPatch,
            BuildStep::RunCommand { .. } => StepKind::RunCommand,
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStep::GenerateFile { path, .. } => write!(f, "generate {}", path.display()),
            BuildStep::ApplyPatch { dir, patch, strip } => {
                write!(f, "apply {} in {} (-p{})", patch.name(), dir.display(), strip)
            }
            BuildStep::RunCommand { argv, cwd, .. } => {
                write!(f, "run `{}` in {}", argv.join(" "), cwd.display())
            }
        }
    }
}

/// Ordered build steps plus the artifacts they must produce
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub steps: Vec<BuildStep>,
    pub artifacts: Vec<PathBuf>,
}

impl BuildPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: BuildStep) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps of one kind
    pub fn steps_of(&self, kind: StepKind) -> impl Iterator<Item = &BuildStep> {
        self.steps.iter().filter(move |s| s.kind() == kind)
    }

    /// Programs invoked by the plan's commands, sorted
    pub fn tools(&self) -> BTreeSet<String> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                BuildStep::RunCommand { argv, .. } => argv.first().cloned(),
                _ => None,
            })
            .collect()
    }

    /// Canonical JSON form
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::IoError(format!("Failed to serialize build plan: {}", e)))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::IoError(format!("Failed to parse build plan: {}", e)))
    }

    /// SHA-256 of the canonical JSON form, hex encoded
    pub fn digest(&self) -> Result<String> {
        let json = self.to_json()?;
        Ok(hex::encode(Sha256::digest(json.as_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BuildPlan {
        let mut plan = BuildPlan::new();
        plan.push(BuildStep::GenerateFile {
            path: PathBuf::from("app-1.0/build.sh"),
            template: "echo %(name)s\n".to_string(),
            bindings: BTreeMap::from([("name".to_string(), "app".to_string())]),
        });
        plan.push(BuildStep::ApplyPatch {
            dir: PathBuf::from("app-1.0"),
            patch: PatchSource::Inline {
                name: "fix.patch".to_string(),
                content: String::new(),
            },
            strip: 1,
        });
        plan.push(BuildStep::RunCommand {
            argv: vec!["sh".to_string(), "build.sh".to_string()],
            cwd: PathBuf::from("app-1.0"),
            expected_exit_codes: vec![0],
        });
        plan.artifacts.push(PathBuf::from("app-1.0/app-1.0.tar.gz"));
        plan
    }

    #[test]
    fn test_digest_stable() {
        let plan = sample();
        let digest = plan.digest().unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(sample().digest().unwrap(), digest);

        let mut changed = sample();
        changed.artifacts.clear();
        assert_ne!(changed.digest().unwrap(), digest);
    }

    #[test]
    fn test_json_roundtrip() {
        let plan = sample();
        let json = plan.to_json().unwrap();
        assert!(json.contains("\"step\":\"generate_file\""));
        assert_eq!(BuildPlan::from_json(&json).unwrap(), plan);
    }

    #[test]
    fn test_queries() {
        let plan = sample();
        assert_eq!(plan.steps_of(StepKind::RunCommand).count(), 1);
        assert_eq!(plan.tools().into_iter().collect::<Vec<_>>(), vec!["sh".to_string()]);
        assert_eq!(plan.steps[1].to_string(), "apply fix.patch in app-1.0 (-p1)");
        assert_eq!(StepKind::GenerateFile.to_string(), "generate-file");
    }
}
