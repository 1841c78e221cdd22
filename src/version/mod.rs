// src/version/mod.rs

//! Version handling and constraint satisfaction for package dependencies
//!
//! Versions follow the familiar `[epoch!]release[pre][.postN][.devN][+local]`
//! shape. Native Debian and RPM version strings are translated into the same
//! model by [`native`].
//!
//! Constraints are conjunctions of clauses. Each clause is one parsed
//! comparison group (`>= 1.0, < 2.0`) and carries its own pre-release policy:
//! a pre-release version only satisfies a clause that explicitly allows
//! pre-releases or that names a pre-release version in one of its bounds.

pub mod native;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Errors from parsing version, constraint and requirement text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid version '{0}'")]
    InvalidVersion(String),

    #[error("Invalid version constraint '{text}': {reason}")]
    InvalidConstraint { text: String, reason: String },

    #[error("Invalid requirement '{text}': {reason}")]
    InvalidRequirement { text: String, reason: String },

    #[error("Invalid {scheme} package version '{text}'")]
    InvalidNativeVersion { scheme: &'static str, text: String },
}

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^\s*v?
        (?:(?P<epoch>[0-9]+)!)?
        (?P<release>[0-9]+(?:\.[0-9]+)*)
        (?:[-_.]?(?P<pre_l>alpha|a|beta|b|preview|pre|c|rc)[-_.]?(?P<pre_n>[0-9]+)?)?
        (?:-(?P<post_n1>[0-9]+)|[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>[0-9]+)?)?
        (?:[-_.]?(?P<dev_l>dev)[-_.]?(?P<dev_n>[0-9]+)?)?
        (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
        \s*$",
    )
    .unwrap()
});

/// Pre-release phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreKind {
    Alpha,
    Beta,
    Rc,
}

impl PreKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Alpha => "a",
            Self::Beta => "b",
            Self::Rc => "rc",
        }
    }
}

/// One segment of a local version label (`+deb11u1.2`)
///
/// Numeric segments sort above alphanumeric ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum LocalSegment {
    Alpha(String),
    Num(u64),
}

/// A parsed, totally ordered version identifier
///
/// Equality follows ordering: `1.0` and `1.0.0` are the same version. The
/// original text is kept for display.
#[derive(Debug, Clone)]
pub struct VersionId {
    text: String,
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreKind, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Vec<LocalSegment>,
}

impl VersionId {
    /// Parse a version string
    ///
    /// Examples: `1.2.3`, `2!1.0`, `1.0rc1`, `1.0.post2`, `1.0.dev3`,
    /// `1.1.1.102+1ubuntu2`.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let caps = VERSION_RE
            .captures(s)
            .ok_or_else(|| ParseError::InvalidVersion(s.to_string()))?;

        let number = |text: &str| -> Result<u64, ParseError> {
            text.parse::<u64>()
                .map_err(|_| ParseError::InvalidVersion(s.to_string()))
        };

        let epoch = match caps.name("epoch") {
            Some(m) => number(m.as_str())?,
            None => 0,
        };

        let release = caps["release"]
            .split('.')
            .map(number)
            .collect::<Result<Vec<_>, _>>()?;

        let pre = match caps.name("pre_l") {
            Some(label) => {
                let kind = match label.as_str().to_ascii_lowercase().as_str() {
                    "a" | "alpha" => PreKind::Alpha,
                    "b" | "beta" => PreKind::Beta,
                    _ => PreKind::Rc,
                };
                let n = match caps.name("pre_n") {
                    Some(m) => number(m.as_str())?,
                    None => 0,
                };
                Some((kind, n))
            }
            None => None,
        };

        let post = if let Some(m) = caps.name("post_n1") {
            Some(number(m.as_str())?)
        } else if caps.name("post_l").is_some() {
            match caps.name("post_n2") {
                Some(m) => Some(number(m.as_str())?),
                None => Some(0),
            }
        } else {
            None
        };

        let dev = match caps.name("dev_l") {
            Some(_) => match caps.name("dev_n") {
                Some(m) => Some(number(m.as_str())?),
                None => Some(0),
            },
            None => None,
        };

        let local = match caps.name("local") {
            Some(m) => m
                .as_str()
                .split(['.', '-', '_'])
                .map(|seg| match seg.parse::<u64>() {
                    Ok(n) if seg.bytes().all(|b| b.is_ascii_digit()) => LocalSegment::Num(n),
                    _ => LocalSegment::Alpha(seg.to_ascii_lowercase()),
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            text: s.trim().to_string(),
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    /// Build a plain release version such as `1.2.0`
    pub fn from_release(segments: &[u64]) -> Self {
        let text = segments
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".");
        Self {
            text,
            epoch: 0,
            release: segments.to_vec(),
            pre: None,
            post: None,
            dev: None,
            local: Vec::new(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Numeric release segments as written
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    /// The text this version was parsed from
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Pre-releases and development releases
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    pub fn is_postrelease(&self) -> bool {
        self.post.is_some()
    }

    /// Canonical spelling (`1.0rc1` for `1.0-RC.1`), used for hashing and
    /// generated metadata
    pub fn normalized(&self) -> String {
        let mut out = String::new();
        if self.epoch > 0 {
            out.push_str(&format!("{}!", self.epoch));
        }
        out.push_str(
            &self
                .release
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join("."),
        );
        if let Some((kind, n)) = self.pre {
            out.push_str(&format!("{}{}", kind.as_str(), n));
        }
        if let Some(n) = self.post {
            out.push_str(&format!(".post{}", n));
        }
        if let Some(n) = self.dev {
            out.push_str(&format!(".dev{}", n));
        }
        if !self.local.is_empty() {
            let local = self
                .local
                .iter()
                .map(|seg| match seg {
                    LocalSegment::Alpha(s) => s.clone(),
                    LocalSegment::Num(n) => n.to_string(),
                })
                .collect::<Vec<_>>()
                .join(".");
            out.push('+');
            out.push_str(&local);
        }
        out
    }

    /// Release segments without trailing zeros, so `1.0` and `1.0.0` agree
    fn trimmed_release(&self) -> &[u64] {
        let end = self
            .release
            .iter()
            .rposition(|&n| n != 0)
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.release[..end]
    }

    /// Sort key for the pre-release position: dev-only < pre < final
    fn pre_key(&self) -> (u8, Option<PreKind>, u64) {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => (0, None, 0),
            (Some((kind, n)), _, _) => (1, Some(kind), n),
            _ => (2, None, 0),
        }
    }

    fn post_key(&self) -> (u8, u64) {
        match self.post {
            None => (0, 0),
            Some(n) => (1, n),
        }
    }

    fn dev_key(&self) -> (u8, u64) {
        match self.dev {
            Some(n) => (0, n),
            None => (1, 0),
        }
    }

    /// Compare two versions
    pub fn compare(&self, other: &VersionId) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.trimmed_release().cmp(other.trimmed_release()))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post_key().cmp(&other.post_key()))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| self.local.cmp(&other.local))
    }

    /// Whether the release segments start with `prefix`, padding with zeros
    fn release_starts_with(&self, prefix: &[u64]) -> bool {
        prefix
            .iter()
            .enumerate()
            .all(|(i, n)| self.release.get(i).copied().unwrap_or(0) == *n)
    }
}

impl PartialEq for VersionId {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for VersionId {}

impl Hash for VersionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        self.trimmed_release().hash(state);
        self.pre_key().hash(state);
        self.post_key().hash(state);
        self.dev_key().hash(state);
        self.local.hash(state);
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl FromStr for VersionId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for VersionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for VersionId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// One end of an interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: VersionId,
    pub inclusive: bool,
}

/// A primitive comparison against a version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `= v` / `== v`
    Exact(VersionId),
    /// `!= v`
    NotEqual(VersionId),
    /// `> v`
    GreaterThan(VersionId),
    /// `>= v`
    GreaterOrEqual(VersionId),
    /// `< v`
    LessThan(VersionId),
    /// `<= v`
    LessOrEqual(VersionId),
    /// `[1.0,2.0)` style interval; a missing end is unbounded
    Range {
        lower: Option<Bound>,
        upper: Option<Bound>,
    },
    /// `~= 1.4.2`: `>= 1.4.2` and same release prefix minus the last segment
    Compatible(VersionId),
    /// `= 1.4.*`: any version whose release starts with `1.4`
    Prefix(VersionId),
}

impl Predicate {
    /// Check a version against this comparison (no pre-release policy)
    pub fn matches(&self, version: &VersionId) -> bool {
        match self {
            Predicate::Exact(v) => version == v,
            Predicate::NotEqual(v) => version != v,
            Predicate::GreaterThan(v) => version > v,
            Predicate::GreaterOrEqual(v) => version >= v,
            Predicate::LessThan(v) => version < v,
            Predicate::LessOrEqual(v) => version <= v,
            Predicate::Range { lower, upper } => {
                let above = lower.as_ref().is_none_or(|b| {
                    if b.inclusive {
                        version >= &b.version
                    } else {
                        version > &b.version
                    }
                });
                let below = upper.as_ref().is_none_or(|b| {
                    if b.inclusive {
                        version <= &b.version
                    } else {
                        version < &b.version
                    }
                });
                above && below
            }
            Predicate::Compatible(v) => {
                let prefix = &v.release[..v.release.len().saturating_sub(1)];
                version >= v && version.epoch == v.epoch && version.release_starts_with(prefix)
            }
            Predicate::Prefix(v) => version.epoch == v.epoch && version.release_starts_with(&v.release),
        }
    }

    /// Whether any bound of this comparison is itself a pre-release
    pub fn names_prerelease(&self) -> bool {
        match self {
            Predicate::Exact(v)
            | Predicate::NotEqual(v)
            | Predicate::GreaterThan(v)
            | Predicate::GreaterOrEqual(v)
            | Predicate::LessThan(v)
            | Predicate::LessOrEqual(v)
            | Predicate::Compatible(v)
            | Predicate::Prefix(v) => v.is_prerelease(),
            Predicate::Range { lower, upper } => lower
                .iter()
                .chain(upper.iter())
                .any(|b| b.version.is_prerelease()),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Exact(v) => write!(f, "= {}", v),
            Predicate::NotEqual(v) => write!(f, "!= {}", v),
            Predicate::GreaterThan(v) => write!(f, "> {}", v),
            Predicate::GreaterOrEqual(v) => write!(f, ">= {}", v),
            Predicate::LessThan(v) => write!(f, "< {}", v),
            Predicate::LessOrEqual(v) => write!(f, "<= {}", v),
            Predicate::Range { lower, upper } => {
                match lower {
                    Some(b) if b.inclusive => write!(f, "[{}", b.version)?,
                    Some(b) => write!(f, "({}", b.version)?,
                    None => write!(f, "(")?,
                }
                write!(f, ";")?;
                match upper {
                    Some(b) if b.inclusive => write!(f, "{}]", b.version),
                    Some(b) => write!(f, "{})", b.version),
                    None => write!(f, ")"),
                }
            }
            Predicate::Compatible(v) => write!(f, "~= {}", v),
            Predicate::Prefix(v) => write!(f, "= {}.*", v),
        }
    }
}

/// A group of comparisons parsed together, sharing one pre-release policy
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Clause {
    pub predicates: Vec<Predicate>,
    pub allow_prereleases: bool,
}

impl Clause {
    fn admits(&self, version: &VersionId) -> bool {
        if version.is_prerelease()
            && !self.allow_prereleases
            && !self.predicates.iter().any(Predicate::names_prerelease)
        {
            return false;
        }
        self.predicates.iter().all(|p| p.matches(version))
    }

    fn parse(text: &str) -> Result<Self, ParseError> {
        let invalid = |reason: &str| ParseError::InvalidConstraint {
            text: text.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = text.trim();
        if trimmed.starts_with('[') || trimmed.starts_with('(') {
            let close = trimmed
                .find([']', ')'])
                .ok_or_else(|| invalid("interval must end with ']' or ')'"))?;
            let (interval, rest) = trimmed.split_at(close + 1);
            let allow_prereleases = match rest.trim() {
                "" => false,
                tail if tail.trim_start_matches(',').trim() == "pre" => true,
                _ => return Err(invalid("unexpected text after interval")),
            };
            return Ok(Self {
                predicates: vec![parse_interval(interval).map_err(|r| invalid(&r))?],
                allow_prereleases,
            });
        }

        let mut clause = Clause::default();
        for item in trimmed.split(',').map(str::trim) {
            match item {
                "" if trimmed.is_empty() => {}
                "" => return Err(invalid("empty comparison")),
                "*" => {}
                "pre" => clause.allow_prereleases = true,
                _ => clause
                    .predicates
                    .push(parse_predicate(item).map_err(|r| invalid(&r))?),
            }
        }
        Ok(clause)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.predicates.is_empty() {
            write!(f, "*")?;
        } else {
            let parts: Vec<String> = self.predicates.iter().map(|p| p.to_string()).collect();
            write!(f, "{}", parts.join(", "))?;
        }
        if self.allow_prereleases {
            write!(f, ", pre")?;
        }
        Ok(())
    }
}

fn parse_predicate(item: &str) -> Result<Predicate, String> {
    let version = |rest: &str| VersionId::parse(rest.trim()).map_err(|e| e.to_string());

    if let Some(rest) = item.strip_prefix("~=") {
        let v = version(rest)?;
        if v.release.len() < 2 {
            return Err("'~=' needs at least two release segments".to_string());
        }
        Ok(Predicate::Compatible(v))
    } else if let Some(rest) = item.strip_prefix(">=") {
        Ok(Predicate::GreaterOrEqual(version(rest)?))
    } else if let Some(rest) = item.strip_prefix("<=") {
        Ok(Predicate::LessOrEqual(version(rest)?))
    } else if let Some(rest) = item.strip_prefix("!=") {
        Ok(Predicate::NotEqual(version(rest)?))
    } else if let Some(rest) = item.strip_prefix("==").or_else(|| item.strip_prefix('=')) {
        let rest = rest.trim();
        match rest.strip_suffix(".*") {
            Some(prefix) => Ok(Predicate::Prefix(version(prefix)?)),
            None => Ok(Predicate::Exact(version(rest)?)),
        }
    } else if let Some(rest) = item.strip_prefix('>') {
        Ok(Predicate::GreaterThan(version(rest)?))
    } else if let Some(rest) = item.strip_prefix('<') {
        Ok(Predicate::LessThan(version(rest)?))
    } else {
        // No operator means exact match
        Ok(Predicate::Exact(version(item)?))
    }
}

/// Parse `[1.0;2.0)`, `(1.0,]` and friends
fn parse_interval(text: &str) -> Result<Predicate, String> {
    let lower_inclusive = text.starts_with('[');
    let upper_inclusive = match text.chars().last() {
        Some(']') => true,
        Some(')') => false,
        _ => return Err("interval must end with ']' or ')'".to_string()),
    };
    let inner = &text[1..text.len() - 1];
    let (lo, hi) = inner
        .split_once(';')
        .or_else(|| inner.split_once(','))
        .ok_or_else(|| "interval needs two ends separated by ';' or ','".to_string())?;

    let bound = |s: &str, inclusive: bool| -> Result<Option<Bound>, String> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        let version = VersionId::parse(s).map_err(|e| e.to_string())?;
        Ok(Some(Bound { version, inclusive }))
    };

    Ok(Predicate::Range {
        lower: bound(lo, lower_inclusive)?,
        upper: bound(hi, upper_inclusive)?,
    })
}

/// A pure predicate over versions: the conjunction of its clauses
///
/// A constraint that no version satisfies is valid; the resolver reports it
/// when it runs out of candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    clauses: Vec<Clause>,
}

impl Constraint {
    /// Matches every final release
    pub fn any() -> Self {
        Self {
            clauses: vec![Clause::default()],
        }
    }

    /// Parse a constraint string
    ///
    /// Examples:
    /// - `">= 1.0, < 2.0"` one clause with two comparisons
    /// - `"~= 1.4"` compatible release
    /// - `"[1.0;2.0)"` half-open interval
    /// - `">= 1.0 && != 1.3"` two clauses
    /// - `">= 2.0a1"` admits pre-releases because the bound is one
    /// - `">= 1.0, pre"` explicitly admits pre-releases
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let clauses = s
            .split("&&")
            .map(Clause::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { clauses })
    }

    /// Single-comparison constraint
    pub fn from_predicate(predicate: Predicate) -> Self {
        Self {
            clauses: vec![Clause {
                predicates: vec![predicate],
                allow_prereleases: false,
            }],
        }
    }

    /// Exact version
    pub fn exact(version: VersionId) -> Self {
        Self::from_predicate(Predicate::Exact(version))
    }

    /// Half-open range `[lower, upper)`
    pub fn range(lower: VersionId, upper: VersionId) -> Self {
        Self::from_predicate(Predicate::Range {
            lower: Some(Bound {
                version: lower,
                inclusive: true,
            }),
            upper: Some(Bound {
                version: upper,
                inclusive: false,
            }),
        })
    }

    /// Same constraint, but every clause admits pre-releases
    pub fn allowing_prereleases(mut self) -> Self {
        for clause in &mut self.clauses {
            clause.allow_prereleases = true;
        }
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// True when this is the unconstrained `*`
    pub fn is_any(&self) -> bool {
        self.clauses.iter().all(|c| c.predicates.is_empty())
    }

    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &VersionId) -> bool {
        self.clauses.iter().all(|c| c.admits(version))
    }

    /// Conjunction of two constraints
    ///
    /// The result is not simplified; it is satisfied exactly by the versions
    /// that satisfy both inputs.
    pub fn intersect(&self, other: &Constraint) -> Constraint {
        let mut clauses = self.clauses.clone();
        clauses.extend(other.clauses.iter().cloned());
        Constraint { clauses }
    }
}

impl Default for Constraint {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.clauses.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(" && "))
    }
}

impl FromStr for Constraint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Constraint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Constraint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Parse a version string
pub fn parse(text: &str) -> Result<VersionId, ParseError> {
    VersionId::parse(text)
}

/// Compare two versions
pub fn compare(a: &VersionId, b: &VersionId) -> Ordering {
    a.compare(b)
}

/// Check a version against a constraint
pub fn satisfies(version: &VersionId, constraint: &Constraint) -> bool {
    constraint.satisfies(version)
}

/// Conjunction of two constraints
pub fn intersect(c1: &Constraint, c2: &Constraint) -> Constraint {
    c1.intersect(c2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> VersionId {
        VersionId::parse(s).unwrap()
    }

    fn c(s: &str) -> Constraint {
        Constraint::parse(s).unwrap()
    }

    #[test]
    fn test_version_parse_simple() {
        let ver = v("1.2.3");
        assert_eq!(ver.epoch(), 0);
        assert_eq!(ver.release(), &[1, 2, 3]);
        assert!(!ver.is_prerelease());
    }

    #[test]
    fn test_version_parse_full() {
        let ver = v("2!1.0rc1.post2.dev3+ubuntu.4");
        assert_eq!(ver.epoch(), 2);
        assert!(ver.is_prerelease());
        assert!(ver.is_postrelease());
        assert_eq!(ver.normalized(), "2!1.0rc1.post2.dev3+ubuntu.4");
    }

    #[test]
    fn test_version_parse_rejects_garbage() {
        assert!(VersionId::parse("").is_err());
        assert!(VersionId::parse("abc").is_err());
        assert!(VersionId::parse("1.0-").is_err());
        assert!(VersionId::parse("1..0").is_err());
    }

    #[test]
    fn test_version_trailing_zeros_equal() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1.0").compare(&v("1")), Ordering::Equal);
        assert_eq!(v("1.0.0").to_string(), "1.0.0");
    }

    #[test]
    fn test_version_ordering_phases() {
        let ordered = [
            "1.0.dev1", "1.0a1", "1.0a2", "1.0b1", "1.0rc1", "1.0", "1.0+local", "1.0.post1",
            "1.1",
        ];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_version_compare_epochs() {
        assert!(v("1!0.1") > v("9.9"));
    }

    #[test]
    fn test_version_local_segments() {
        assert!(v("1.0+abc") < v("1.0+5"));
        assert!(v("1.0+1ubuntu1") < v("1.0+1ubuntu1.1"));
    }

    #[test]
    fn test_constraint_parse_greater_or_equal() {
        let con = c(">= 1.2.0");
        assert!(con.satisfies(&v("1.2.0")));
        assert!(con.satisfies(&v("1.3.0")));
        assert!(!con.satisfies(&v("1.1.0")));
    }

    #[test]
    fn test_constraint_conjunction_group() {
        let con = c(">=1.0,<2.0");
        assert!(con.satisfies(&v("1.5")));
        assert!(!con.satisfies(&v("2.0")));
        assert!(!con.satisfies(&v("0.9")));
    }

    #[test]
    fn test_constraint_no_operator_is_exact() {
        let con = c("1.2.3");
        assert!(con.satisfies(&v("1.2.3")));
        assert!(!con.satisfies(&v("1.2.4")));
    }

    #[test]
    fn test_constraint_any() {
        let con = c("*");
        assert!(con.is_any());
        assert!(con.satisfies(&v("99.99.99")));
        assert!(!con.satisfies(&v("99.99.99a1")));
    }

    #[test]
    fn test_constraint_compatible() {
        let con = c("~= 1.4.2");
        assert!(con.satisfies(&v("1.4.2")));
        assert!(con.satisfies(&v("1.4.9")));
        assert!(!con.satisfies(&v("1.5.0")));
        assert!(!con.satisfies(&v("1.4.1")));
        assert!(Constraint::parse("~= 1").is_err());
    }

    #[test]
    fn test_constraint_prefix() {
        let con = c("== 1.4.*");
        assert!(con.satisfies(&v("1.4")));
        assert!(con.satisfies(&v("1.4.7")));
        assert!(!con.satisfies(&v("1.5")));
    }

    #[test]
    fn test_constraint_interval() {
        let con = c("[1.0;2.0)");
        assert!(con.satisfies(&v("1.0")));
        assert!(!con.satisfies(&v("2.0")));
        let open = c("(1.0,]");
        assert!(!open.satisfies(&v("1.0")));
        assert!(open.satisfies(&v("100")));
    }

    #[test]
    fn test_prerelease_policy() {
        assert!(!c(">= 1.0").satisfies(&v("2.0a1")));
        assert!(c(">= 1.0, pre").satisfies(&v("2.0a1")));
        assert!(c(">= 2.0a1").satisfies(&v("2.0b1")));
        assert!(c("< 2.0a5, >= 1.0").satisfies(&v("2.0a1")));
        assert!(c(">= 1.0").allowing_prereleases().satisfies(&v("2.0a1")));
    }

    #[test]
    fn test_unsatisfiable_constraint_is_valid() {
        let con = c(">= 2.0, < 1.0");
        assert!(!con.satisfies(&v("1.5")));
        assert!(!con.satisfies(&v("0.5")));
        assert!(!con.satisfies(&v("2.5")));
    }

    #[test]
    fn test_intersect_matches_both() {
        let constraints = [
            c(">= 1.0"),
            c("< 2.0"),
            c("!= 1.5"),
            c("~= 1.4"),
            c(">= 2.0a1"),
            c("[1.0;1.6]"),
            c("*"),
            c("= 1.*"),
        ];
        let versions = [
            "0.9", "1.0", "1.4", "1.5", "1.6", "1.9", "2.0a1", "2.0", "2.1", "1.5rc1",
        ];
        for c1 in &constraints {
            for c2 in &constraints {
                let both = intersect(c1, c2);
                for text in versions {
                    let ver = v(text);
                    assert_eq!(
                        satisfies(&ver, &both),
                        satisfies(&ver, c1) && satisfies(&ver, c2),
                        "{} vs ({}) && ({})",
                        text,
                        c1,
                        c2
                    );
                }
            }
        }
    }

    #[test]
    fn test_constraint_display_roundtrip() {
        for text in [
            ">= 1.2.0",
            ">= 1.0, < 2.0",
            "~= 1.4 && != 1.4.3",
            "*, pre",
            "[1.0;2.0)",
            "[1.0;2.0), pre",
        ] {
            let con = c(text);
            let again = c(&con.to_string());
            assert_eq!(con, again, "{}", text);
        }
        assert_eq!(c(">= 1.0.0, < 2.0.0").to_string(), ">= 1.0.0, < 2.0.0");
    }

    #[test]
    fn test_constraint_parse_errors() {
        assert!(Constraint::parse(">= ").is_err());
        assert!(Constraint::parse(">= 1.0,,< 2").is_err());
        assert!(Constraint::parse("[1.0;2.0").is_err());
    }

    #[test]
    fn test_version_serde_as_string() {
        let ver = v("1.0rc1");
        let json = serde_json::to_string(&ver).unwrap();
        assert_eq!(json, "\"1.0rc1\"");
        let back: VersionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ver);
    }
}
