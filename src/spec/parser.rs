// src/spec/parser.rs

//! Specification file parsing

use crate::error::{Error, Result};
use crate::spec::format::PackageSpec;
use crate::version::VersionId;
use std::path::{Component, Path};

/// Parse a specification from a TOML string
pub fn parse_spec(content: &str) -> Result<PackageSpec> {
    let spec: PackageSpec = toml::from_str(content)
        .map_err(|e| Error::InvalidSpec(format!("Invalid specification: {}", e)))?;
    validate_spec(&spec)?;
    Ok(spec)
}

/// Parse a specification from a file
///
/// Patch files are read relative to the specification's directory and
/// stored inline, so the result no longer depends on the file's location.
pub fn parse_spec_file(path: &Path) -> Result<PackageSpec> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::IoError(format!(
            "Failed to read specification {}: {}",
            path.display(),
            e
        ))
    })?;

    let mut spec = parse_spec(&content)?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for patch in &mut spec.patches {
        if patch.content.is_some() {
            continue;
        }
        let patch_path = base.join(&patch.file);
        let text = std::fs::read_to_string(&patch_path).map_err(|e| {
            Error::IoError(format!(
                "Failed to read patch {}: {}",
                patch_path.display(),
                e
            ))
        })?;
        patch.content = Some(text);
    }

    Ok(spec)
}

/// Check a specification for structural problems
///
/// Returns warnings for missing optional metadata.
pub fn validate_spec(spec: &PackageSpec) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if spec.package.name.is_empty() {
        return Err(Error::InvalidSpec(
            "Package name cannot be empty".to_string(),
        ));
    }
    check_name(&spec.package.name)?;
    VersionId::parse(&spec.package.version)?;

    for name in spec
        .package
        .provides
        .iter()
        .map(|p| p.name())
        .chain(spec.package.conflicts.iter().map(String::as_str))
    {
        check_name(name)?;
    }
    for meta in &spec.meta_packages {
        check_name(&meta.name)?;
        if meta.name == spec.package.name {
            return Err(Error::InvalidSpec(format!(
                "Meta package {} has the same name as its parent",
                meta.name
            )));
        }
        for dep in &meta.depends {
            check_name(dep)?;
        }
    }
    for path in spec.scripts.services.keys() {
        check_install_path(path, false)?;
    }
    for pattern in spec.files.include.iter().chain(&spec.files.exclude) {
        check_install_path(pattern, true)?;
    }

    // Requirement text is validated eagerly so errors name the spec
    spec.requirements()?;

    for patch in &spec.patches {
        if patch.file.is_empty() {
            return Err(Error::InvalidSpec(format!(
                "Package {} declares a patch with no file name",
                spec.package.name
            )));
        }
    }

    if spec.package.summary.is_none() {
        warnings.push("Missing package summary".to_string());
    }
    if spec.package.license.is_none() {
        warnings.push("Missing package license".to_string());
    }

    Ok(warnings)
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(|c| !(c.is_ascii_alphanumeric() || "-_.+".contains(c))) {
        return Err(Error::InvalidSpec(format!(
            "Package name '{}' contains invalid characters",
            name
        )));
    }
    Ok(())
}

/// Paths and patterns end up unquoted in generated shell and make
/// fragments, so they must be absolute, stay below `/` and be plain text
fn check_install_path(path: &str, glob: bool) -> Result<()> {
    let plain = |c: char| c.is_ascii_alphanumeric() || "/-_.+@:".contains(c) || (glob && "*?[]".contains(c));
    let inside = Path::new(path)
        .components()
        .all(|c| matches!(c, Component::RootDir | Component::Normal(_)));
    if !path.starts_with('/') || path == "/" || !inside || !path.chars().all(plain) {
        return Err(Error::InvalidSpec(format!("Invalid install path '{}'", path)));
    }
    Ok(())
}
