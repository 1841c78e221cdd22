// src/spec/format.rs

//! Package specification file format
//!
//! A specification is a TOML file describing a package that may be built
//! from source as part of a run: its metadata, its runtime and build
//! requirements, patches to apply and the shell fragments that build it.

use crate::error::{Error, Result};
use crate::spec::requirement::{DependencyKind, Marker, Requirement};
use crate::version::{Constraint, VersionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A complete package specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Package metadata
    pub package: PackageSection,

    /// Dependencies (optional)
    #[serde(default)]
    pub requires: RequiresSection,

    /// Patches applied to the unpacked source, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<PatchInfo>,

    /// Build instructions
    #[serde(default)]
    pub build: BuildSection,

    /// Variables for substitution (optional)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    /// Install/removal hooks and service files
    #[serde(default, skip_serializing_if = "ScriptsSection::is_empty")]
    pub scripts: ScriptsSection,

    /// Which staged files end up in the package
    #[serde(default, skip_serializing_if = "FilesSection::is_empty")]
    pub files: FilesSection,

    /// Empty packages built alongside this one that only carry dependencies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta_packages: Vec<MetaPackage>,
}

impl PackageSpec {
    /// Parsed package version
    pub fn version_id(&self) -> Result<VersionId> {
        Ok(VersionId::parse(&self.package.version)?)
    }

    /// Runtime requirements followed by build requirements
    pub fn requirements(&self) -> Result<Vec<Requirement>> {
        let runtime = self
            .requires
            .runtime
            .iter()
            .map(|entry| entry.to_requirement(DependencyKind::Runtime));
        let build = self
            .requires
            .build
            .iter()
            .map(|entry| entry.to_requirement(DependencyKind::Build));
        runtime.chain(build).collect()
    }

    /// Release number, defaulting to 1
    pub fn release(&self) -> &str {
        self.package.release.as_deref().unwrap_or("1")
    }

    /// Directory name of the unpacked source: `name-version`
    pub fn source_dir_name(&self) -> String {
        format!("{}-{}", self.package.name, self.package.version)
    }

    /// Variables visible to templates rendered for this package
    ///
    /// Built-in variables (`name`, `version`, `release`, `summary`, ...) are
    /// overridden by entries in the `[variables]` table.
    pub fn bindings(&self) -> BTreeMap<String, String> {
        let pkg = &self.package;
        let mut vars = BTreeMap::new();
        vars.insert("name".to_string(), pkg.name.clone());
        vars.insert("version".to_string(), pkg.version.clone());
        vars.insert("release".to_string(), self.release().to_string());
        vars.insert(
            "summary".to_string(),
            pkg.summary.clone().unwrap_or_else(|| pkg.name.clone()),
        );
        vars.insert(
            "description".to_string(),
            pkg.description
                .clone()
                .or_else(|| pkg.summary.clone())
                .unwrap_or_else(|| pkg.name.clone()),
        );
        vars.insert(
            "license".to_string(),
            pkg.license.clone().unwrap_or_else(|| "unknown".to_string()),
        );
        vars.insert("url".to_string(), pkg.url.clone().unwrap_or_default());
        vars.insert(
            "maintainer".to_string(),
            pkg.maintainer
                .clone()
                .unwrap_or_else(|| "distpack <distpack@localhost>".to_string()),
        );
        vars.insert("srcdir".to_string(), self.source_dir_name());
        for (key, value) in &self.variables {
            vars.insert(key.clone(), value.clone());
        }
        vars
    }
}

/// Package metadata section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSection {
    pub name: String,
    pub version: String,

    /// Packaging release number (optional, defaults to 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// `Name <email>` used in generated changelogs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,

    /// Virtual packages this one provides
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<ProvidedPackage>,

    /// Packages that cannot be installed at the same time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
}

/// A provided package name, optionally at its own version
///
/// `"libfoo-compat"` provides at the package's own version;
/// `{ name = "libfoo1", version = "1.9" }` names it explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProvidedPackage {
    Name(String),
    Versioned { name: String, version: String },
}

impl ProvidedPackage {
    pub fn name(&self) -> &str {
        match self {
            ProvidedPackage::Name(name) | ProvidedPackage::Versioned { name, .. } => name,
        }
    }

    /// Provided version, falling back to `default`
    pub fn version_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self {
            ProvidedPackage::Name(_) => default,
            ProvidedPackage::Versioned { version, .. } => version,
        }
    }
}

/// Dependency lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiresSection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtime: Vec<RequirementEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build: Vec<RequirementEntry>,
}

/// A requirement as written in a specification file
///
/// Either a string (`"zlib (>= 1.2)"`) or a table
/// (`{ name = "zlib", version = ">= 1.2", marker = "native-only" }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequirementEntry {
    Text(String),
    Table {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        marker: Option<Marker>,
        /// Admit pre-release versions
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        prereleases: bool,
    },
}

impl RequirementEntry {
    pub fn to_requirement(&self, kind: DependencyKind) -> Result<Requirement> {
        let req = match self {
            RequirementEntry::Text(text) => Requirement::parse(text)?,
            RequirementEntry::Table {
                name,
                version,
                marker,
                prereleases,
            } => {
                if name.trim().is_empty() {
                    return Err(Error::InvalidSpec(
                        "requirement table has an empty name".to_string(),
                    ));
                }
                let mut constraint = match version {
                    Some(text) => Constraint::parse(text)?,
                    None => Constraint::any(),
                };
                if *prereleases {
                    constraint = constraint.allowing_prereleases();
                }
                Requirement::new(name.trim(), constraint).with_marker(marker.unwrap_or_default())
            }
        };
        Ok(req.with_kind(kind))
    }
}

/// A patch to apply to the unpacked source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchInfo {
    /// Patch file path, relative to the specification file
    pub file: String,

    /// Leading path components to strip (`patch -pN`)
    #[serde(default = "default_strip")]
    pub strip: u32,

    /// Inline patch text; filled in when the specification is loaded from disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

fn default_strip() -> u32 {
    1
}

/// Build instructions
///
/// Each command runs in the unpacked source directory. `%(name)s` style
/// variables are substituted before the command is written into the
/// platform build description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSection {
    /// Configure command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configure: Option<String>,

    /// Build command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,

    /// Install command; `%(destdir)s` is the staging directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<String>,

    /// Environment variables exported before every command
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

/// Package manager hook points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptHook {
    BeforeInstall,
    AfterInstall,
    BeforeRemove,
    AfterRemove,
}

/// Maintainer scripts and service files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_install: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_install: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_remove: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_remove: Option<String>,

    /// Absolute install path to file content, e.g. systemd units
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub services: BTreeMap<String, String>,
}

impl ScriptsSection {
    pub fn is_empty(&self) -> bool {
        self.hooks().next().is_none() && self.services.is_empty()
    }

    /// Hooks that have a script, in install-then-remove order
    pub fn hooks(&self) -> impl Iterator<Item = (ScriptHook, &str)> {
        [
            (ScriptHook::BeforeInstall, &self.before_install),
            (ScriptHook::AfterInstall, &self.after_install),
            (ScriptHook::BeforeRemove, &self.before_remove),
            (ScriptHook::AfterRemove, &self.after_remove),
        ]
        .into_iter()
        .filter_map(|(hook, script)| script.as_deref().map(|s| (hook, s)))
    }
}

/// Install and no-install file lists
///
/// Entries are absolute paths or shell globs (`/usr/bin/*`). An empty
/// `include` list packages everything the install phase staged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesSection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl FilesSection {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// A dependency-only package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaPackage {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// System package names the meta package depends on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

impl BuildSection {
    /// Commands in execution order with defaults for omitted phases
    pub fn phases(&self) -> [(&'static str, String); 3] {
        [
            (
                "configure",
                self.configure
                    .clone()
                    .unwrap_or_else(|| "./configure --prefix=/usr".to_string()),
            ),
            ("make", self.make.clone().unwrap_or_else(|| "make".to_string())),
            (
                "install",
                self.install
                    .clone()
                    .unwrap_or_else(|| "make install DESTDIR=%(destdir)s".to_string()),
            ),
        ]
    }
}
