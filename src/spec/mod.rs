// src/spec/mod.rs

//! Package specifications
//!
//! Bundled packages are described by TOML specification files. This module
//! defines that format, parses it, and parses the requirement strings used
//! both in specifications and in root requirement sets.
//!
//! # Example
//!
//! ```toml
//! [package]
//! name = "libfoo"
//! version = "1.2.0"
//! summary = "Foo library"
//!
//! [requires]
//! runtime = ["zlib (>= 1.2)"]
//! build = ["pkg-config; native-only"]
//!
//! [[patches]]
//! file = "fix-build.patch"
//!
//! [build]
//! configure = "./configure --prefix=/usr --disable-static"
//! ```

mod format;
mod parser;
mod requirement;

pub use format::{
    BuildSection, FilesSection, MetaPackage, PackageSection, PackageSpec, PatchInfo, ProvidedPackage,
    RequirementEntry, RequiresSection, ScriptHook, ScriptsSection,
};
pub use parser::{parse_spec, parse_spec_file, validate_spec};
pub use requirement::{DependencyKind, Marker, Requirement};
