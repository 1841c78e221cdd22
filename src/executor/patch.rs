// src/executor/patch.rs

//! In-process unified diff application
//!
//! A patch may touch several files. It is split into per-file sections
//! (everything between the `---`/`+++` header and the end of its last
//! hunk; `diff --git` and `index` preamble lines are skipped), each section
//! is parsed and applied with `diffy`, and the result is written back.
//! Paths have `strip` leading components removed, like `patch -pN`.
//!
//! Every section is applied in memory before anything is written, so a
//! patch that fails part way leaves the tree untouched.

use crate::error::{Error, Result};
use regex::Regex;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static HUNK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@@ -\d+(?:,(\d+))? \+\d+(?:,(\d+))? @@").unwrap());

const DEV_NULL: &str = "/dev/null";

/// One file's change, ready to be written
#[derive(Debug)]
enum FileChange {
    Write { path: PathBuf, content: String },
    Delete { path: PathBuf },
}

impl FileChange {
    fn path(&self) -> &Path {
        match self {
            FileChange::Write { path, .. } | FileChange::Delete { path } => path,
        }
    }
}

/// Apply `patch` inside `dir`, stripping `strip` leading path components
///
/// Returns the files that were modified, created or deleted. Sections that
/// touch the same file apply in order, each on top of the previous result.
pub fn apply_patch(dir: &Path, patch: &str, strip: u32) -> Result<Vec<PathBuf>> {
    let sections = split_sections(patch)?;
    if sections.is_empty() {
        return Err(Error::PatchError("patch contains no file changes".to_string()));
    }

    let mut changes: Vec<FileChange> = Vec::with_capacity(sections.len());
    for section in &sections {
        let change = prepare(dir, section, strip, &changes)?;
        match changes.iter_mut().find(|c| c.path() == change.path()) {
            Some(existing) => *existing = change,
            None => changes.push(change),
        }
    }

    let mut touched = Vec::with_capacity(changes.len());
    for change in changes {
        match change {
            FileChange::Write { path, content } => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, content)?;
                touched.push(path);
            }
            FileChange::Delete { path } => {
                // Created and removed within the same patch
                if path.exists() {
                    fs::remove_file(&path)?;
                }
                touched.push(path);
            }
        }
    }
    debug!("Patched {} files in {}", touched.len(), dir.display());
    Ok(touched)
}

fn prepare(dir: &Path, section: &str, strip: u32, staged: &[FileChange]) -> Result<FileChange> {
    let parsed = diffy::Patch::from_str(section).map_err(|e| Error::PatchError(e.to_string()))?;
    let original = parsed.original().map(header_path);
    let modified = parsed.modified().map(header_path);

    let (name, creating, deleting) = match (original, modified) {
        (Some(DEV_NULL), Some(new)) => (new, true, false),
        (Some(old), Some(DEV_NULL)) => (old, false, true),
        (Some(old), _) => (old, false, false),
        (None, Some(new)) => (new, false, false),
        (None, None) => {
            return Err(Error::PatchError("file section without a file name".to_string()));
        }
    };
    let path = dir.join(strip_path(name, strip)?);

    let base = match staged.iter().find(|c| c.path() == path) {
        _ if creating => String::new(),
        Some(FileChange::Write { content, .. }) => content.clone(),
        Some(FileChange::Delete { .. }) => {
            return Err(Error::PatchError(format!(
                "{} was deleted earlier in the patch",
                path.display()
            )));
        }
        None => fs::read_to_string(&path)
            .map_err(|e| Error::PatchError(format!("cannot read {}: {}", path.display(), e)))?,
    };
    let content = diffy::apply(&base, &parsed)
        .map_err(|e| Error::PatchError(format!("{} does not apply: {}", path.display(), e)))?;

    Ok(if deleting {
        FileChange::Delete { path }
    } else {
        FileChange::Write { path, content }
    })
}

/// File name from a `---`/`+++` header, without any trailing timestamp
fn header_path(raw: &str) -> &str {
    raw.split('\t').next().unwrap_or(raw).trim()
}

/// Remove `strip` leading components; the rest must stay inside the tree
fn strip_path(name: &str, strip: u32) -> Result<PathBuf> {
    let parts: Vec<&str> = name.split('/').filter(|p| !p.is_empty()).collect();
    let strip = strip as usize;
    if parts.len() <= strip {
        return Err(Error::PatchError(format!(
            "cannot strip {} components from {}",
            strip, name
        )));
    }
    let path: PathBuf = parts[strip..].iter().collect();
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(Error::PatchError(format!("path {} escapes the source tree", name)));
    }
    Ok(path)
}

fn hunk_lengths(header: &str) -> Result<(usize, usize)> {
    let caps = HUNK_RE
        .captures(header)
        .ok_or_else(|| Error::PatchError(format!("malformed hunk header: {}", header.trim_end())))?;
    let len = |i: usize| {
        caps.get(i)
            .map_or(Ok(1), |m| m.as_str().parse::<usize>())
            .map_err(|e| Error::PatchError(e.to_string()))
    };
    Ok((len(1)?, len(2)?))
}

/// Split a multi-file patch into single-file sections
fn split_sections(patch: &str) -> Result<Vec<String>> {
    let lines: Vec<&str> = patch.split_inclusive('\n').collect();
    let mut sections = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let is_header = lines[i].starts_with("--- ")
            && lines.get(i + 1).is_some_and(|l| l.starts_with("+++ "));
        if !is_header {
            i += 1;
            continue;
        }

        let mut section = String::new();
        section.push_str(lines[i]);
        section.push_str(lines[i + 1]);
        i += 2;

        while i < lines.len() && lines[i].starts_with("@@ ") {
            let (mut old, mut new) = hunk_lengths(lines[i])?;
            section.push_str(lines[i]);
            i += 1;

            while i < lines.len() && (old > 0 || new > 0) {
                let line = lines[i];
                match line.as_bytes().first() {
                    Some(b' ') | Some(b'\n') => {
                        old = old.saturating_sub(1);
                        new = new.saturating_sub(1);
                    }
                    Some(b'-') => old = old.saturating_sub(1),
                    Some(b'+') => new = new.saturating_sub(1),
                    Some(b'\\') => {}
                    _ => break,
                }
                section.push_str(line);
                i += 1;
            }
            while i < lines.len() && lines[i].starts_with('\\') {
                section.push_str(lines[i]);
                i += 1;
            }
        }
        sections.push(section);
    }
    Ok(sections)
}
