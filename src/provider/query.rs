// src/provider/query.rs

//! Repository query backends for apt and yum/dnf
//!
//! Both backends shell out through a [`CommandRunner`] and parse the
//! human-readable listing the tool prints. Failing to run the tool is a
//! metadata source failure; a package the tool does not know is an empty
//! version list.

use super::native::{NativeScheme, RepositoryQuery};
use super::MetadataError;
use crate::executor::{CancellationToken, CommandRunner, CommandSpec};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::debug;

/// Default time allowed for a single query command
const QUERY_TIMEOUT: Duration = Duration::from_secs(120);

static INDENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([\s*]*)(.*)$").unwrap());

/// One package block from `apt-cache policy`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyEntry {
    pub name: String,
    pub installed: Option<String>,
    pub candidate: Option<String>,
    /// Versions from the version table, in listing order
    pub versions: Vec<String>,
}

/// Parse `apt-cache policy` output
///
/// The output holds one block per matching package:
///
/// ```text
/// zlib1g:
///   Installed: 1:1.2.11.dfsg-2
///   Candidate: 1:1.2.11.dfsg-2
///   Version table:
///  *** 1:1.2.11.dfsg-2 500
///         500 http://deb.debian.org/debian bullseye/main amd64 Packages
/// ```
pub fn parse_apt_policy(output: &str) -> Result<Vec<PolicyEntry>, String> {
    let mut entries = Vec::new();
    let mut current: Option<PolicyEntry> = None;
    let mut in_table = false;
    let mut version_indent: Option<usize> = None;

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let caps = INDENT_RE
            .captures(line)
            .ok_or_else(|| format!("cannot parse line: {}", line))?;
        let indent = caps[1].len();
        let content = caps[2].trim_end();

        if indent == 0 {
            let name = content
                .strip_suffix(':')
                .ok_or_else(|| format!("expected package header, found: {}", line))?;
            entries.extend(current.take());
            current = Some(PolicyEntry {
                name: name.to_string(),
                ..PolicyEntry::default()
            });
            in_table = false;
            version_indent = None;
            continue;
        }

        let entry = current
            .as_mut()
            .ok_or_else(|| format!("version data before package header: {}", line))?;

        if in_table {
            // Version lines share the shallowest indent; source lines are deeper
            let is_version = match version_indent {
                None => {
                    version_indent = Some(indent);
                    true
                }
                Some(v) => indent <= v,
            };
            if is_version {
                if let Some(version) = content.split_whitespace().next() {
                    entry.versions.push(version.to_string());
                }
            }
            continue;
        }

        let (key, value) = content.split_once(':').unwrap_or((content, ""));
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "version table" => in_table = true,
            "installed" if value != "(none)" => entry.installed = Some(value.to_string()),
            "candidate" if value != "(none)" => entry.candidate = Some(value.to_string()),
            _ => {}
        }
    }

    entries.extend(current);
    Ok(entries)
}

/// Parse `yum --showduplicates list` output
///
/// Versions are collected from the "Installed Packages" and "Available
/// Packages" sections, deduplicated, in listing order.
pub fn parse_yum_list(output: &str) -> Vec<String> {
    let mut versions: Vec<String> = Vec::new();
    let mut in_listing = false;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed == "Installed Packages" || trimmed == "Available Packages" {
            in_listing = true;
            continue;
        }
        if !in_listing || trimmed.is_empty() {
            continue;
        }
        let cols: Vec<&str> = trimmed.split_whitespace().collect();
        if cols.len() < 2 {
            continue;
        }
        if !versions.iter().any(|v| v == cols[1]) {
            versions.push(cols[1].to_string());
        }
    }

    versions
}

/// Debian/Ubuntu backend using `apt-cache policy`
pub struct AptCachePolicy {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl AptCachePolicy {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            timeout: QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl RepositoryQuery for AptCachePolicy {
    fn available_versions(&self, system_name: &str) -> Result<Vec<String>, MetadataError> {
        let cmd = CommandSpec::new(["apt-cache", "policy", system_name], "/")
            .with_timeout(Some(self.timeout));
        let output = self
            .runner
            .run(&cmd, &CancellationToken::new())
            .map_err(|e| MetadataError::unavailable("apt-cache", e.to_string()))?;

        if !output.success() {
            return Err(MetadataError::unavailable(
                "apt-cache",
                format!("apt-cache policy {} failed: {}", system_name, output.stderr.trim()),
            ));
        }

        let entries = parse_apt_policy(&output.stdout).map_err(|message| MetadataError::Malformed {
            source_name: "apt-cache".to_string(),
            package: system_name.to_string(),
            message,
        })?;

        let mut versions: Vec<String> = Vec::new();
        for entry in entries {
            for version in entry.versions {
                if !versions.contains(&version) {
                    versions.push(version);
                }
            }
        }
        debug!("apt-cache policy {}: {} versions", system_name, versions.len());
        Ok(versions)
    }

    fn scheme(&self) -> NativeScheme {
        NativeScheme::Debian
    }

    fn source_name(&self) -> &str {
        "apt-cache"
    }
}

/// RHEL/Fedora backend using `yum --showduplicates list`
pub struct YumList {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
    program: String,
}

impl YumList {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            timeout: QUERY_TIMEOUT,
            program: "yum".to_string(),
        }
    }

    /// Use another yum-compatible program, e.g. `dnf`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl RepositoryQuery for YumList {
    fn available_versions(&self, system_name: &str) -> Result<Vec<String>, MetadataError> {
        let cmd = CommandSpec::new(
            [self.program.as_str(), "--showduplicates", "list", system_name],
            "/",
        )
        .with_timeout(Some(self.timeout));
        let output = self
            .runner
            .run(&cmd, &CancellationToken::new())
            .map_err(|e| MetadataError::unavailable(self.program.clone(), e.to_string()))?;

        if !output.success() {
            // yum exits 1 when nothing matches
            if output.stderr.contains("No matching Packages") {
                return Ok(Vec::new());
            }
            return Err(MetadataError::unavailable(
                self.program.clone(),
                format!("{} list {} failed: {}", self.program, system_name, output.stderr.trim()),
            ));
        }

        let versions = parse_yum_list(&output.stdout);
        debug!("{} list {}: {} versions", self.program, system_name, versions.len());
        Ok(versions)
    }

    fn scheme(&self) -> NativeScheme {
        NativeScheme::Rpm
    }

    fn source_name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{CommandOutput, RunError};

    const APT_OUTPUT: &str = "\
zlib1g:
  Installed: 1:1.2.11.dfsg-2
  Candidate: 1:1.2.13.dfsg-1
  Version table:
     1:1.2.13.dfsg-1 500
        500 http://deb.debian.org/debian bookworm/main amd64 Packages
 *** 1:1.2.11.dfsg-2 100
        100 /var/lib/dpkg/status
libicu72:
  Installed: (none)
  Candidate: 72.1-3
  Version table:
     72.1-3 500
        500 http://deb.debian.org/debian bookworm/main amd64 Packages
";

    const YUM_OUTPUT: &str = "\
Last metadata expiration check: 0:10:00 ago.
Installed Packages
zlib.x86_64                 1.2.11-17.el8               @baseos
Available Packages
zlib.i686                   1.2.11-17.el8               baseos
zlib.x86_64                 1.2.11-18.el8               baseos
";

    struct FixedRunner(Result<CommandOutput, RunError>);

    impl CommandRunner for FixedRunner {
        fn run(&self, _: &CommandSpec, _: &CancellationToken) -> Result<CommandOutput, RunError> {
            self.0.clone()
        }
    }

    fn ok(stdout: &str) -> Arc<dyn CommandRunner> {
        Arc::new(FixedRunner(Ok(CommandOutput {
            exit_code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })))
    }

    #[test]
    fn test_parse_apt_policy() {
        let entries = parse_apt_policy(APT_OUTPUT).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "zlib1g");
        assert_eq!(entries[0].versions, vec!["1:1.2.13.dfsg-1", "1:1.2.11.dfsg-2"]);
        assert_eq!(entries[0].installed.as_deref(), Some("1:1.2.11.dfsg-2"));
        assert_eq!(entries[1].installed, None);
        assert_eq!(entries[1].versions, vec!["72.1-3"]);
    }

    #[test]
    fn test_parse_apt_policy_empty() {
        assert!(parse_apt_policy("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_apt_policy_garbage() {
        assert!(parse_apt_policy("not a header\n").is_err());
    }

    #[test]
    fn test_parse_yum_list() {
        assert_eq!(parse_yum_list(YUM_OUTPUT), vec!["1.2.11-17.el8", "1.2.11-18.el8"]);
        assert!(parse_yum_list("Error: No matching Packages to list\n").is_empty());
    }

    #[test]
    fn test_apt_backend() {
        let query = AptCachePolicy::new(ok(APT_OUTPUT));
        let versions = query.available_versions("zlib1g").unwrap();
        assert_eq!(versions.len(), 3);
        assert_eq!(query.scheme(), NativeScheme::Debian);
    }

    #[test]
    fn test_yum_backend_no_match() {
        let runner = Arc::new(FixedRunner(Ok(CommandOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "Error: No matching Packages to list".to_string(),
        })));
        let query = YumList::new(runner);
        assert!(query.available_versions("nothing").unwrap().is_empty());
    }

    #[test]
    fn test_spawn_failure_is_unavailable() {
        let runner = Arc::new(FixedRunner(Err(RunError::Spawn {
            command: "apt-cache".to_string(),
            message: "not found".to_string(),
        })));
        let query = AptCachePolicy::new(runner);
        assert!(matches!(
            query.available_versions("zlib1g"),
            Err(MetadataError::Unavailable { .. })
        ));
    }
}
