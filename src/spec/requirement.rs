// src/spec/requirement.rs

//! Package requirements
//!
//! A requirement names a package, a version constraint, an optional origin
//! marker and whether it is needed at build time or at run time. The text
//! form is `name (constraint) [; marker]`, e.g. `zlib (>= 1.2, < 2.0); native-only`.

use crate::provider::Origin;
use crate::version::{Constraint, ParseError, VersionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Restriction on which origin may satisfy a requirement
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Marker {
    /// Either origin
    #[default]
    Any,
    /// Must be provided by the platform package manager
    NativeOnly,
    /// Must be built from source in this run
    BundledOnly,
}

impl Marker {
    pub fn admits(&self, origin: Origin) -> bool {
        match self {
            Marker::Any => true,
            Marker::NativeOnly => origin == Origin::Native,
            Marker::BundledOnly => origin == Origin::Bundled,
        }
    }
}

/// When a dependency is needed
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DependencyKind {
    #[default]
    Runtime,
    Build,
}

/// A dependency on another package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,
    #[serde(default)]
    pub constraint: Constraint,
    #[serde(default)]
    pub marker: Marker,
    #[serde(default)]
    pub kind: DependencyKind,
}

impl Requirement {
    /// Runtime requirement with any origin
    pub fn new(name: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            name: name.into(),
            constraint,
            marker: Marker::Any,
            kind: DependencyKind::Runtime,
        }
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.marker = marker;
        self
    }

    pub fn with_kind(mut self, kind: DependencyKind) -> Self {
        self.kind = kind;
        self
    }

    /// Parse `name (constraint) [; marker]`
    ///
    /// The parentheses are optional: `zlib >= 1.2` is accepted too. A bare
    /// name requires any final release.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let invalid = |reason: &str| ParseError::InvalidRequirement {
            text: text.to_string(),
            reason: reason.to_string(),
        };

        let (body, marker) = match text.split_once(';') {
            Some((body, marker)) => {
                let marker = Marker::from_str(marker.trim())
                    .map_err(|_| invalid(&format!("unknown marker '{}'", marker.trim())))?;
                (body.trim(), marker)
            }
            None => (text.trim(), Marker::Any),
        };

        let name_end = body
            .find(|c: char| c.is_whitespace() || "(<>=!~[".contains(c))
            .unwrap_or(body.len());
        let name = &body[..name_end];
        if name.is_empty() {
            return Err(invalid("missing package name"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.+".contains(c))
        {
            return Err(invalid("package name contains invalid characters"));
        }

        let rest = body[name_end..].trim();
        let constraint_text = match rest.strip_prefix('(') {
            Some(inner) => inner
                .strip_suffix(')')
                .ok_or_else(|| invalid("unbalanced parentheses"))?,
            None => rest,
        };

        let constraint = if constraint_text.trim().is_empty() {
            Constraint::any()
        } else {
            Constraint::parse(constraint_text)?
        };

        Ok(Self {
            name: name.to_string(),
            constraint,
            marker,
            kind: DependencyKind::Runtime,
        })
    }

    /// Whether a candidate's origin and version meet this requirement
    pub fn admits(&self, origin: Origin, version: &VersionId) -> bool {
        self.marker.admits(origin) && self.constraint.satisfies(version)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        let constraint = self.constraint.to_string();
        if constraint != "*" {
            write!(f, " ({})", constraint)?;
        }
        if self.marker != Marker::Any {
            write!(f, "; {}", self.marker)?;
        }
        Ok(())
    }
}

impl FromStr for Requirement {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_name() {
        let req = Requirement::parse("zlib").unwrap();
        assert_eq!(req.name, "zlib");
        assert!(req.constraint.is_any());
        assert_eq!(req.marker, Marker::Any);
    }

    #[test]
    fn test_parse_parenthesized() {
        let req = Requirement::parse("openssl (>= 1.1, < 3.0)").unwrap();
        assert_eq!(req.name, "openssl");
        assert!(req.constraint.satisfies(&VersionId::parse("1.1.1").unwrap()));
        assert!(!req.constraint.satisfies(&VersionId::parse("3.0").unwrap()));
    }

    #[test]
    fn test_parse_unparenthesized_with_marker() {
        let req = Requirement::parse("libffi-dev >= 3.2; native-only").unwrap();
        assert_eq!(req.name, "libffi-dev");
        assert_eq!(req.marker, Marker::NativeOnly);
        assert!(!req.admits(Origin::Bundled, &VersionId::parse("3.3").unwrap()));
        assert!(req.admits(Origin::Native, &VersionId::parse("3.3").unwrap()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Requirement::parse("").is_err());
        assert!(Requirement::parse("(>= 1.0)").is_err());
        assert!(Requirement::parse("foo (>= 1.0").is_err());
        assert!(Requirement::parse("foo; sometimes").is_err());
        assert!(Requirement::parse("foo (>= banana)").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for text in ["zlib", "zlib (>= 1.2)", "a (>= 1.0, < 2.0); bundled-only"] {
            let req = Requirement::parse(text).unwrap();
            assert_eq!(req.to_string(), text);
            assert_eq!(Requirement::parse(&req.to_string()).unwrap(), req);
        }
    }
}
