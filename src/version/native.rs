// src/version/native.rs

//! Translation of native Debian and RPM version strings
//!
//! Native package managers report versions such as `1:1.1.1f-1ubuntu2.16`
//! or `1.1.1k-7.el8`. These are mapped onto [`VersionId`] so native and
//! bundled candidates can be compared with the same constraints:
//!
//! - each leading numeric run of an upstream segment becomes a release segment
//! - letters directly after it become release segments holding their code points
//! - anything else, and the packaging revision, becomes the local label
//!
//! The Debian epoch is kept; the RPM epoch is dropped because distributions
//! bump it for packaging reasons unrelated to the upstream version.

use super::{ParseError, VersionId};
use regex::Regex;
use std::sync::LazyLock;

static NATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<epoch>\d+):)?(?P<upstream>[^-]+)(?:-(?P<revision>.*))?$").unwrap()
});

static SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<num>[0-9]*)(?P<alpha>[A-Za-z]*)(?P<rest>.*)$").unwrap());

/// Parse a Debian package version
pub fn from_debian(text: &str) -> Result<VersionId, ParseError> {
    translate(text, true, "Debian")
}

/// Parse an RPM `[epoch:]version-release` string
pub fn from_rpm(text: &str) -> Result<VersionId, ParseError> {
    translate(text, false, "RPM")
}

fn local_label(text: &str) -> String {
    text.chars()
        .map(|c| if matches!(c, '+' | '-' | '~') { '.' } else { c })
        .collect()
}

fn translate(text: &str, keep_epoch: bool, scheme: &'static str) -> Result<VersionId, ParseError> {
    let invalid = || ParseError::InvalidNativeVersion {
        scheme,
        text: text.to_string(),
    };

    let caps = NATIVE_RE.captures(text.trim()).ok_or_else(invalid)?;

    let mut version = String::new();
    if let Some(epoch) = caps.name("epoch").filter(|_| keep_epoch) {
        version.push_str(epoch.as_str());
        version.push('!');
    }

    let mut in_local = false;
    for (i, part) in caps["upstream"].split('.').enumerate() {
        if in_local {
            version.push('.');
            version.push_str(&local_label(part));
            continue;
        }

        let seg = SEGMENT_RE.captures(part).ok_or_else(invalid)?;
        let num = &seg["num"];
        if !num.is_empty() {
            if i > 0 {
                version.push('.');
            }
            version.push_str(num);
        }
        for c in seg["alpha"].chars() {
            version.push_str(&format!(".{}", c as u32));
        }
        let rest = &seg["rest"];
        if !rest.is_empty() {
            let rest = rest.strip_prefix(['+', '-', '~']).unwrap_or(rest);
            version.push('+');
            version.push_str(&local_label(rest));
            in_local = true;
        }
    }

    if let Some(revision) = caps.name("revision") {
        version.push(if in_local { '.' } else { '+' });
        version.push_str(&local_label(revision.as_str()));
    }

    VersionId::parse(&version).map_err(|_| invalid())
}
