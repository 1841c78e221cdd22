// src/platform/mod.rs

//! Platform adapters
//!
//! One [`PlatformAdapter`] per target family knows how that family names
//! packages, which files describe a native build, how the native build tool
//! is invoked and where it leaves its output. The synthesizer only talks to
//! the trait; it never looks at the [`TargetFamily`] tag itself.
//!
//! Paths returned by adapters are relative: artifact paths to the plan's
//! working directory, script paths to the package's own directory.

mod deb;
mod generic;
mod rpm;

pub use deb::DebAdapter;
pub use generic::GenericAdapter;
pub use rpm::RpmAdapter;

use crate::config::PlatformConfig;
use crate::error::Result;
use crate::graph::BuildOrder;
use crate::plan::template;
use crate::provider::{NativeScheme, Origin, PackageCandidate};
use crate::spec::{DependencyKind, PackageSpec};
use crate::version::VersionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Target family tag
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TargetFamily {
    /// Fedora, RHEL and derivatives, openSUSE
    Rpm,
    /// Debian, Ubuntu and derivatives
    Deb,
    /// Plain tarball built by a shell script
    #[default]
    Generic,
}

impl TargetFamily {
    /// Map `/etc/os-release` content to a family using `ID` and `ID_LIKE`
    pub fn from_os_release(content: &str) -> Option<Self> {
        let mut ids = Vec::new();
        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            if key.trim() == "ID" || key.trim() == "ID_LIKE" {
                let value = value.trim().trim_matches('"').trim_matches('\'');
                ids.extend(value.split_whitespace().map(str::to_ascii_lowercase));
            }
        }

        ids.iter().find_map(|id| match id.as_str() {
            "debian" | "ubuntu" | "linuxmint" | "raspbian" | "pop" => Some(TargetFamily::Deb),
            "fedora" | "rhel" | "centos" | "rocky" | "almalinux" | "amzn" | "ol" | "suse"
            | "opensuse" | "sles" => Some(TargetFamily::Rpm),
            _ => None,
        })
    }

    /// Detect the family of the running system, falling back to generic
    pub fn detect() -> Self {
        let family = std::fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|content| Self::from_os_release(&content))
            .unwrap_or_default();
        debug!("Detected target family: {}", family);
        family
    }

    /// Version syntax of the family's package manager
    pub fn native_scheme(&self) -> NativeScheme {
        match self {
            TargetFamily::Rpm => NativeScheme::Rpm,
            TargetFamily::Deb => NativeScheme::Debian,
            TargetFamily::Generic => NativeScheme::Plain,
        }
    }
}

/// A resolved dependency as it is declared in generated metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredDependency {
    /// Name in the resolved graph
    pub name: String,
    /// Name to write into the build description
    pub declared_name: String,
    pub version: VersionId,
    pub origin: Origin,
    pub kind: DependencyKind,
}

/// One package to be built, with its resolved dependencies
#[derive(Debug, Clone)]
pub struct BuildTarget<'a> {
    pub candidate: &'a PackageCandidate,
    pub spec: &'a PackageSpec,
    pub dependencies: Vec<DeclaredDependency>,
    /// Package directory, relative to the plan working directory
    pub dir: PathBuf,
}

impl BuildTarget<'_> {
    pub fn name(&self) -> &str {
        &self.candidate.name
    }

    /// Dependencies of one kind, in declaration order
    pub fn dependencies_of(&self, kind: DependencyKind) -> impl Iterator<Item = &DeclaredDependency> {
        self.dependencies.iter().filter(move |d| d.kind == kind)
    }
}

/// Directory a bundled package is built in: `name-version`
pub fn package_dir(candidate: &PackageCandidate) -> PathBuf {
    PathBuf::from(format!("{}-{}", candidate.name, candidate.version))
}

/// A build description file to generate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    /// Path relative to the package directory
    pub path: PathBuf,
    pub template: String,
    pub bindings: BTreeMap<String, String>,
}

/// Per-family build knowledge
pub trait PlatformAdapter: Send + Sync {
    fn family(&self) -> TargetFamily;

    /// System package name for an abstract name
    fn system_name(&self, name: &str) -> String;

    /// Abstract-to-system name table, for native repository lookups
    fn name_map(&self) -> BTreeMap<String, String>;

    /// Where the unpacked sources live, relative to the package directory
    fn source_dir(&self, target: &BuildTarget<'_>) -> PathBuf;

    /// Files the native build produces, relative to the plan working directory
    fn artifact_layout(&self, target: &BuildTarget<'_>) -> Vec<PathBuf>;

    /// Build description files for one package
    fn render_build_script(&self, order: &BuildOrder<'_>, target: &BuildTarget<'_>) -> Result<Vec<ScriptFile>>;

    /// Command that runs the native build
    ///
    /// `working_dir` is the command's directory relative to the plan working
    /// directory. Arguments may contain `%(workdir)s`, which the executor
    /// replaces with the absolute plan working directory.
    fn native_build_command(&self, target: &BuildTarget<'_>, working_dir: &Path) -> Vec<String>;
}

/// Create the adapter for a family
pub fn adapter_for(family: TargetFamily, config: &PlatformConfig) -> Box<dyn PlatformAdapter> {
    match family {
        TargetFamily::Rpm => Box::new(RpmAdapter::new(config.clone())),
        TargetFamily::Deb => Box::new(DebAdapter::new(config.clone())),
        TargetFamily::Generic => Box::new(GenericAdapter::new(config.clone())),
    }
}

/// Built-in names merged with configured overrides
fn build_name_map(table: &[(&str, &str)], config: &PlatformConfig) -> BTreeMap<String, String> {
    let mut names: BTreeMap<String, String> = table
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    names.extend(config.package_names.clone());
    names
}

/// Bindings shared by every family
///
/// Starts from the specification's own variables, fills in the configured
/// maintainer and `destdir`, then renders the three build phases into
/// `configure`, `build` and `install`. Each phase line is prefixed with
/// `line_prefix`. The install phase also copies service files from
/// `top` (the package directory as the build tool sees it) into `destdir`.
fn base_bindings(
    target: &BuildTarget<'_>,
    config: &PlatformConfig,
    top: &str,
    destdir: &str,
    line_prefix: &str,
) -> Result<BTreeMap<String, String>> {
    let spec = target.spec;
    let mut vars = spec.bindings();
    if spec.package.maintainer.is_none() && !spec.variables.contains_key("maintainer") {
        vars.insert("maintainer".to_string(), config.maintainer.clone());
    }
    vars.entry("destdir".to_string())
        .or_insert_with(|| destdir.to_string());

    for (phase, command) in spec.build.phases() {
        let mut rendered = template::render(&command, &vars)?;
        if phase == "install" {
            for line in service_install_lines(target, top, destdir) {
                rendered.push('\n');
                rendered.push_str(&line);
            }
        }
        let key = if phase == "make" { "build" } else { phase };
        vars.insert(key.to_string(), prefix_lines(&rendered, line_prefix));
    }
    Ok(vars)
}

/// Directory service files are generated into, inside the package directory
const SERVICES_DIR: &str = "services";

/// Service files of a package, generated under `services/`
///
/// The content is a template over the package's own variables.
fn service_files(target: &BuildTarget<'_>) -> Vec<ScriptFile> {
    let bindings = target.spec.bindings();
    target
        .spec
        .scripts
        .services
        .iter()
        .map(|(path, content)| ScriptFile {
            path: PathBuf::from(format!("{}{}", SERVICES_DIR, path)),
            template: content.clone(),
            bindings: bindings.clone(),
        })
        .collect()
}

fn service_install_lines(target: &BuildTarget<'_>, top: &str, destdir: &str) -> Vec<String> {
    target
        .spec
        .scripts
        .services
        .iter()
        .map(|(path, content)| {
            let mode = if content.starts_with("#!") { "0755" } else { "0644" };
            format!(
                "install -D -m {} \"{}/{}{}\" \"{}{}\"",
                mode, top, SERVICES_DIR, path, destdir, path
            )
        })
        .collect()
}

/// Packaged paths: the include list (or `fallback`) plus service files
/// not already listed
fn packaged_paths(spec: &PackageSpec, fallback: &[&str]) -> Vec<String> {
    let mut paths: Vec<String> = if spec.files.include.is_empty() {
        fallback.iter().map(|p| p.to_string()).collect()
    } else {
        spec.files.include.clone()
    };
    for path in spec.scripts.services.keys() {
        if !paths.contains(path) {
            paths.push(path.clone());
        }
    }
    paths
}

/// Prefix every line of `text`
fn prefix_lines(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}
