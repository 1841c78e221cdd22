// src/config.rs

//! Configuration for resolution, caching, platform output and execution
//!
//! Every section has defaults, so an empty file is a valid configuration:
//!
//! ```toml
//! [resolver]
//! preference = "native-first"
//! tie_break = "prefer-native"
//!
//! [cache]
//! max_entries = 1024
//!
//! [platform]
//! target = "deb"
//! build_date = "2024-01-01T00:00:00Z"
//!
//! [executor]
//! command_timeout_secs = 3600
//! ```

use crate::error::{Error, Result};
use crate::platform::TargetFamily;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Which candidates the resolver tries first
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
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CandidatePreference {
    /// All native candidates (highest first), then bundled ones
    #[default]
    NativeFirst,
    /// Highest version first regardless of origin
    NewestFirst,
}

/// Order of a native and a bundled candidate with the same version
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
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OriginTieBreak {
    #[default]
    PreferNative,
    PreferBundled,
}

/// Resolver settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub preference: CandidatePreference,
    pub tie_break: OriginTieBreak,
}

impl ResolverConfig {
    pub fn with_preference(mut self, preference: CandidatePreference) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_tie_break(mut self, tie_break: OriginTieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }
}

/// Metadata cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of package names held
    pub max_entries: usize,
    /// Seconds before an entry is re-fetched (unset = never)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            ttl_secs: None,
        }
    }
}

impl CacheConfig {
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = Some(ttl_secs);
        self
    }
}

/// Settings that shape generated build descriptions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Target family; detected from `/etc/os-release` by callers when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetFamily>,
    /// Timestamp written into changelogs and archive metadata
    pub build_date: DateTime<Utc>,
    /// Packager identity used when a specification names none
    pub maintainer: String,
    /// Debian distribution name for changelog entries
    pub distribution: String,
    /// Machine architecture as reported by the toolchain (`x86_64`, `aarch64`)
    pub architecture: String,
    /// Extra abstract-to-system package names, overriding the built-in tables
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub package_names: BTreeMap<String, String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            target: None,
            // Fixed so plans are reproducible unless a date is configured
            build_date: DateTime::<Utc>::UNIX_EPOCH,
            maintainer: "distpack <distpack@localhost>".to_string(),
            distribution: "unstable".to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            package_names: BTreeMap::new(),
        }
    }
}

impl PlatformConfig {
    pub fn with_target(mut self, target: TargetFamily) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_build_date(mut self, date: DateTime<Utc>) -> Self {
        self.build_date = date;
        self
    }

    pub fn with_maintainer(mut self, maintainer: impl Into<String>) -> Self {
        self.maintainer = maintainer.into();
        self
    }

    pub fn with_architecture(mut self, architecture: impl Into<String>) -> Self {
        self.architecture = architecture.into();
        self
    }

    pub fn with_package_name(mut self, name: impl Into<String>, system_name: impl Into<String>) -> Self {
        self.package_names.insert(name.into(), system_name.into());
        self
    }
}

/// Build executor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Per-command timeout in seconds (unset = no limit)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
    /// Verify every command's program exists before running anything
    pub check_tools: bool,
    /// Wait for a busy working directory instead of failing
    pub wait_for_lock: bool,
    /// Extra environment for every command
    pub env: BTreeMap<String, String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: None,
            check_tools: true,
            wait_for_lock: false,
            env: BTreeMap::new(),
        }
    }
}

impl ExecutorConfig {
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    pub fn with_check_tools(mut self, check: bool) -> Self {
        self.check_tools = check;
        self
    }

    pub fn with_wait_for_lock(mut self, wait: bool) -> Self {
        self.wait_for_lock = wait;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistpackConfig {
    pub resolver: ResolverConfig,
    pub cache: CacheConfig,
    pub platform: PlatformConfig,
    pub executor: ExecutorConfig,
}

impl DistpackConfig {
    /// Parse configuration text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(format!("Failed to serialize configuration: {}", e)))
    }
}
