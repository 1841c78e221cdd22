// src/platform/rpm.rs

//! RPM family adapter
//!
//! Each package directory is an rpmbuild top directory:
//!
//! ```text
//! name-version/
//!   SPECS/name.spec
//!   BUILD/name-version/     unpacked sources, patched in place
//!   RPMS/<arch>/...         binary packages
//!   SRPMS/...               source package
//! ```

use super::{
    base_bindings, build_name_map, packaged_paths, service_files, BuildTarget, DeclaredDependency, PlatformAdapter,
    ScriptFile, TargetFamily,
};
use crate::config::PlatformConfig;
use crate::error::Result;
use crate::graph::BuildOrder;
use crate::provider::Origin;
use crate::spec::{DependencyKind, PackageSpec, ScriptHook};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const PACKAGE_NAMES: &[(&str, &str)] = &[
    ("icu", "libicu"),
    ("icu-dev", "libicu-devel"),
    ("zlib", "zlib"),
    ("zlib-dev", "zlib-devel"),
    ("libxslt-dev", "libxslt-devel"),
    ("pam-dev", "pam-devel"),
    ("python", "python3"),
    ("uuid", "libuuid"),
    ("uuid-dev", "libuuid-devel"),
    ("systemd-dev", "systemd-devel"),
    ("openssl-dev", "openssl-devel"),
    ("libffi-dev", "libffi-devel"),
    ("libpcre2", "pcre2"),
    ("libpcre2-dev", "pcre2-devel"),
    ("libxml2-dev", "libxml2-devel"),
    ("libexpat", "expat"),
    ("libexpat-dev", "expat-devel"),
    ("libsqlite3", "sqlite-libs"),
    ("libsqlite3-dev", "sqlite-devel"),
    ("protoc-c", "protobuf-c-compiler"),
];

const SPEC_TEMPLATE: &str = "\
Name: %(name)s
Version: %(version)s
Release: %(release)s
Summary: %(summary)s
License: %(license)s
URL: %(url)s
%(requires)s
%(relations)s
%(file_policy)s

%description
%(description)s
%(subpackages)s

%prep

%build
cd %(srcdir)s
%(environment)s
%(configure)s
%(build)s

%install
cd %(srcdir)s
%(environment)s
%(install)s

%(scriptlets)s
%files
%(files)s
%(subpackage_files)s

%changelog
* %(changelog_date)s %(maintainer)s - %(version)s-%(release)s
- Built by distpack.
";

/// Adapter for rpmbuild-based distributions
#[derive(Debug, Clone)]
pub struct RpmAdapter {
    config: PlatformConfig,
    names: BTreeMap<String, String>,
}

impl RpmAdapter {
    pub fn new(config: PlatformConfig) -> Self {
        let names = build_name_map(PACKAGE_NAMES, &config);
        Self { config, names }
    }

    fn spec_path(target: &BuildTarget<'_>) -> PathBuf {
        PathBuf::from("SPECS").join(format!("{}.spec", target.name()))
    }

    fn nevr(target: &BuildTarget<'_>) -> String {
        Self::nevr_of(target.name(), target.spec)
    }

    fn nevr_of(name: &str, spec: &PackageSpec) -> String {
        format!("{}-{}-{}", name, spec.package.version, spec.release())
    }
}

fn hook_section(hook: ScriptHook) -> &'static str {
    match hook {
        ScriptHook::BeforeInstall => "%pre",
        ScriptHook::AfterInstall => "%post",
        ScriptHook::BeforeRemove => "%preun",
        ScriptHook::AfterRemove => "%postun",
    }
}

/// `Provides:` and `Conflicts:` tags
fn relations(spec: &PackageSpec) -> String {
    let version = &spec.package.version;
    spec.package
        .provides
        .iter()
        .map(|p| format!("Provides: {} = {}", p.name(), p.version_or(version)))
        .chain(spec.package.conflicts.iter().map(|c| format!("Conflicts: {}", c)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `%package` blocks for meta packages
fn subpackages(spec: &PackageSpec, summary: &str) -> String {
    spec.meta_packages
        .iter()
        .map(|meta| {
            let description = meta.description.as_deref().unwrap_or(summary);
            let mut block = format!("\n%package -n {}\nSummary: {}\n", meta.name, description);
            for dep in &meta.depends {
                block.push_str(&format!("Requires: {}\n", dep));
            }
            block.push_str(&format!("\n%description -n {}\n{}\n", meta.name, description));
            block
        })
        .collect()
}

/// `%pre`/`%post`/`%preun`/`%postun` sections
fn scriptlets(spec: &PackageSpec) -> String {
    spec.scripts
        .hooks()
        .map(|(hook, script)| format!("{}\n{}\n", hook_section(hook), script.trim_end()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn declaration(tag: &str, dep: &DeclaredDependency) -> String {
    match dep.origin {
        Origin::Native => format!("{}: {}", tag, dep.declared_name),
        Origin::Bundled => format!("{}: {} = {}", tag, dep.declared_name, dep.version),
    }
}

impl PlatformAdapter for RpmAdapter {
    fn family(&self) -> TargetFamily {
        TargetFamily::Rpm
    }

    fn system_name(&self, name: &str) -> String {
        self.names.get(name).cloned().unwrap_or_else(|| name.to_string())
    }

    fn name_map(&self) -> BTreeMap<String, String> {
        self.names.clone()
    }

    fn source_dir(&self, target: &BuildTarget<'_>) -> PathBuf {
        PathBuf::from("BUILD").join(target.spec.source_dir_name())
    }

    fn artifact_layout(&self, target: &BuildTarget<'_>) -> Vec<PathBuf> {
        let arch = &self.config.architecture;
        let nevr = Self::nevr(target);
        let rpms = target.dir.join("RPMS").join(arch);

        let mut artifacts = vec![rpms.join(format!("{}.{}.rpm", nevr, arch))];
        for meta in &target.spec.meta_packages {
            let meta_nevr = Self::nevr_of(&meta.name, target.spec);
            artifacts.push(rpms.join(format!("{}.{}.rpm", meta_nevr, arch)));
        }
        artifacts.push(target.dir.join("SRPMS").join(format!("{}.src.rpm", nevr)));
        artifacts
    }

    fn render_build_script(&self, _order: &BuildOrder<'_>, target: &BuildTarget<'_>) -> Result<Vec<ScriptFile>> {
        let spec = target.spec;
        let mut bindings = base_bindings(target, &self.config, "%{_topdir}", "%{buildroot}", "")?;

        let requires: Vec<String> = target
            .dependencies_of(DependencyKind::Build)
            .map(|d| declaration("BuildRequires", d))
            .chain(
                target
                    .dependencies_of(DependencyKind::Runtime)
                    .map(|d| declaration("Requires", d)),
            )
            .collect();
        bindings.insert("requires".to_string(), requires.join("\n"));

        let environment: Vec<String> = target
            .spec
            .build
            .environment
            .iter()
            .map(|(k, v)| format!("export {}=\"{}\"", k, v))
            .collect();
        bindings.insert("environment".to_string(), environment.join("\n"));
        bindings.insert("relations".to_string(), relations(spec));
        bindings.insert("scriptlets".to_string(), scriptlets(spec));

        // A narrowed include list leaves staged files unpackaged on purpose
        let file_policy = if spec.files.include.is_empty() {
            String::new()
        } else {
            "%global _unpackaged_files_terminate_build 0".to_string()
        };
        bindings.insert("file_policy".to_string(), file_policy);

        if !bindings.contains_key("files") {
            let files: Vec<String> = packaged_paths(spec, &["/usr/*"])
                .into_iter()
                .chain(spec.files.exclude.iter().map(|p| format!("%exclude {}", p)))
                .collect();
            bindings.insert("files".to_string(), files.join("\n"));
        }

        let summary = bindings.get("summary").cloned().unwrap_or_default();
        bindings.insert("subpackages".to_string(), subpackages(spec, &summary));
        let subpackage_files: Vec<String> = spec
            .meta_packages
            .iter()
            .map(|meta| format!("\n%files -n {}", meta.name))
            .collect();
        bindings.insert("subpackage_files".to_string(), subpackage_files.concat());
        bindings.insert(
            "changelog_date".to_string(),
            self.config.build_date.format("%a %b %d %Y").to_string(),
        );

        let mut files = vec![ScriptFile {
            path: Self::spec_path(target),
            template: SPEC_TEMPLATE.to_string(),
            bindings,
        }];
        files.extend(service_files(target));
        Ok(files)
    }

    fn native_build_command(&self, target: &BuildTarget<'_>, working_dir: &Path) -> Vec<String> {
        vec![
            "rpmbuild".to_string(),
            "-ba".to_string(),
            "--define".to_string(),
            format!("_topdir %(workdir)s/{}", working_dir.display()),
            Self::spec_path(target).display().to_string(),
        ]
    }
}
