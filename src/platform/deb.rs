// src/platform/deb.rs

//! Debian family adapter
//!
//! The package directory is the unpacked source tree; a `debian/` directory
//! is generated inside it and `dpkg-buildpackage` writes the `.deb` next to
//! the tree, in the plan working directory.

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
    ("icu-dev", "libicu-dev"),
    ("zlib", "zlib1g"),
    ("zlib-dev", "zlib1g-dev"),
    ("libxslt-dev", "libxslt1-dev"),
    ("pam", "libpam0g"),
    ("pam-dev", "libpam0g-dev"),
    ("python", "python3"),
    ("uuid", "libuuid1"),
    ("uuid-dev", "uuid-dev"),
    ("systemd-dev", "libsystemd-dev"),
    ("ncurses", "ncurses-bin"),
    ("libffi-dev", "libffi-dev"),
    ("openssl-dev", "libssl-dev"),
    ("protoc-c", "protobuf-c-compiler"),
];

const CONTROL_TEMPLATE: &str = "\
Source: %(name)s
Section: misc
Priority: optional
Maintainer: %(maintainer)s
Build-Depends: debhelper-compat (= 13)%(build_depends)s
Standards-Version: 4.6.2

Package: %(name)s
Architecture: any
Depends: ${shlibs:Depends}, ${misc:Depends}%(depends)s
%(relations)sDescription: %(summary)s
%(long_description)s
%(meta_stanzas)s";

const CHANGELOG_TEMPLATE: &str = "\
%(name)s (%(version)s-%(release)s) %(distribution)s; urgency=medium

  * Built by distpack.

 -- %(maintainer)s  %(changelog_date)s
";

const RULES_TEMPLATE: &str = "\
#!/usr/bin/make -f

%(environment)s

%:
\tdh $@

override_dh_auto_configure:
%(configure)s

override_dh_auto_build:
%(build)s

override_dh_auto_install:
%(install)s
%(install_overrides)s";

const MAINTAINER_SCRIPT_TEMPLATE: &str = "\
#!/bin/sh
set -e

%(script)s

#DEBHELPER#
";

/// Adapter for dpkg-based distributions
#[derive(Debug, Clone)]
pub struct DebAdapter {
    config: PlatformConfig,
    names: BTreeMap<String, String>,
}

impl DebAdapter {
    pub fn new(config: PlatformConfig) -> Self {
        let names = build_name_map(PACKAGE_NAMES, &config);
        Self { config, names }
    }

    /// Debian architecture name for the configured machine architecture
    pub fn architecture(&self) -> &str {
        match self.config.architecture.as_str() {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" | "i686" => "i386",
            "arm" => "armhf",
            "powerpc64" => "ppc64el",
            other => other,
        }
    }
}

/// `, a, b (= 1.0)` or empty
fn dependency_list<'a>(deps: impl Iterator<Item = &'a DeclaredDependency>) -> String {
    deps.map(|d| match d.origin {
        Origin::Native => format!(", {}", d.declared_name),
        Origin::Bundled => format!(", {} (= {})", d.declared_name, d.version),
    })
    .collect()
}

fn hook_file(hook: ScriptHook) -> &'static str {
    match hook {
        ScriptHook::BeforeInstall => "preinst",
        ScriptHook::AfterInstall => "postinst",
        ScriptHook::BeforeRemove => "prerm",
        ScriptHook::AfterRemove => "postrm",
    }
}

/// `Provides:`, `Conflicts:` and `Replaces:` fields, each ending in a newline
///
/// A conflicting package is also replaced, so upgrades from it go through.
fn relations(spec: &PackageSpec) -> String {
    let version = &spec.package.version;
    let mut fields = String::new();
    if !spec.package.provides.is_empty() {
        let provides: Vec<String> = spec
            .package
            .provides
            .iter()
            .map(|p| format!("{} (= {})", p.name(), p.version_or(version)))
            .collect();
        fields.push_str(&format!("Provides: {}\n", provides.join(", ")));
    }
    if !spec.package.conflicts.is_empty() {
        let conflicts = spec.package.conflicts.join(", ");
        fields.push_str(&format!("Conflicts: {}\nReplaces: {}\n", conflicts, conflicts));
    }
    fields
}

/// Binary package stanzas for meta packages
fn meta_stanzas(spec: &PackageSpec, summary: &str) -> String {
    spec.meta_packages
        .iter()
        .map(|meta| {
            let depends: Vec<&str> = meta
                .depends
                .iter()
                .map(String::as_str)
                .chain(["${misc:Depends}"])
                .collect();
            format!(
                "\nPackage: {}\nArchitecture: any\nDepends: {}\nDescription: {}\n",
                meta.name,
                depends.join(", "),
                meta.description.as_deref().unwrap_or(summary)
            )
        })
        .collect()
}

/// Continuation lines of a control-file description
fn long_description(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                " .".to_string()
            } else {
                format!(" {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl PlatformAdapter for DebAdapter {
    fn family(&self) -> TargetFamily {
        TargetFamily::Deb
    }

    fn system_name(&self, name: &str) -> String {
        self.names.get(name).cloned().unwrap_or_else(|| name.to_string())
    }

    fn name_map(&self) -> BTreeMap<String, String> {
        self.names.clone()
    }

    fn source_dir(&self, _target: &BuildTarget<'_>) -> PathBuf {
        PathBuf::from(".")
    }

    fn artifact_layout(&self, target: &BuildTarget<'_>) -> Vec<PathBuf> {
        let parent = target.dir.parent().unwrap_or(Path::new(""));
        let spec = target.spec;
        std::iter::once(target.name())
            .chain(spec.meta_packages.iter().map(|m| m.name.as_str()))
            .map(|name| {
                parent.join(format!(
                    "{}_{}-{}_{}.deb",
                    name,
                    spec.package.version,
                    spec.release(),
                    self.architecture()
                ))
            })
            .collect()
    }

    fn render_build_script(&self, _order: &BuildOrder<'_>, target: &BuildTarget<'_>) -> Result<Vec<ScriptFile>> {
        let spec = target.spec;
        let name = target.name();
        // An install list makes dh_install pick files out of debian/tmp
        let destdir = if spec.files.include.is_empty() {
            format!("$(CURDIR)/debian/{}", name)
        } else {
            "$(CURDIR)/debian/tmp".to_string()
        };
        let mut bindings = base_bindings(target, &self.config, "$(CURDIR)", &destdir, "\t")?;

        bindings.insert(
            "build_depends".to_string(),
            dependency_list(target.dependencies_of(DependencyKind::Build)),
        );
        bindings.insert(
            "depends".to_string(),
            dependency_list(target.dependencies_of(DependencyKind::Runtime)),
        );
        let description = bindings
            .get("description")
            .map(|d| long_description(d))
            .unwrap_or_default();
        bindings.insert("long_description".to_string(), description);
        bindings.insert("relations".to_string(), relations(spec));
        let summary = bindings.get("summary").cloned().unwrap_or_default();
        bindings.insert("meta_stanzas".to_string(), meta_stanzas(spec, &summary));

        let mut install_overrides = String::new();
        if !spec.files.exclude.is_empty() {
            install_overrides.push_str("\noverride_dh_install:\n\tdh_install\n");
            for pattern in &spec.files.exclude {
                install_overrides.push_str(&format!("\trm -rf debian/{}{}\n", name, pattern));
            }
        }
        if !spec.files.include.is_empty() {
            // Files staged but not listed are left out deliberately
            install_overrides.push_str("\noverride_dh_missing:\n\tdh_missing --list-missing\n");
        }
        bindings.insert("install_overrides".to_string(), install_overrides);

        let environment: Vec<String> = target
            .spec
            .build
            .environment
            .iter()
            .map(|(k, v)| format!("export {} = {}", k, v))
            .collect();
        bindings.insert("environment".to_string(), environment.join("\n"));
        bindings
            .entry("distribution".to_string())
            .or_insert_with(|| self.config.distribution.clone());
        bindings.insert(
            "changelog_date".to_string(),
            self.config.build_date.format("%a, %d %b %Y %H:%M:%S +0000").to_string(),
        );

        let file = |path: &str, template: &str| ScriptFile {
            path: PathBuf::from(path),
            template: template.to_string(),
            bindings: bindings.clone(),
        };
        let mut files = vec![
            file("debian/control", CONTROL_TEMPLATE),
            file("debian/changelog", CHANGELOG_TEMPLATE),
            file("debian/rules", RULES_TEMPLATE),
            ScriptFile {
                path: PathBuf::from("debian/source/format"),
                template: "1.0\n".to_string(),
                bindings: BTreeMap::new(),
            },
        ];

        if !spec.files.include.is_empty() {
            let entries: Vec<String> = packaged_paths(spec, &[])
                .iter()
                .map(|p| p.trim_start_matches('/').to_string())
                .collect();
            files.push(ScriptFile {
                path: PathBuf::from(format!("debian/{}.install", name)),
                template: format!("{}\n", entries.join("\n")),
                bindings: BTreeMap::new(),
            });
        }
        for (hook, script) in spec.scripts.hooks() {
            files.push(ScriptFile {
                path: PathBuf::from(format!("debian/{}.{}", name, hook_file(hook))),
                template: MAINTAINER_SCRIPT_TEMPLATE.to_string(),
                bindings: BTreeMap::from([("script".to_string(), script.trim_end().to_string())]),
            });
        }
        files.extend(service_files(target));
        Ok(files)
    }

    fn native_build_command(&self, _target: &BuildTarget<'_>, _working_dir: &Path) -> Vec<String> {
        ["dpkg-buildpackage", "-us", "-uc", "-b"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{order, DependencyGraph};
    use crate::plan::template::render;
    use crate::provider::PackageCandidate;
    use crate::spec::parse_spec;
    use crate::version::VersionId;
    use chrono::{TimeZone, Utc};

    fn candidate() -> PackageCandidate {
        let spec = parse_spec(
            r#"
[package]
name = "myapp"
version = "2.1"
summary = "My application"
description = "First line.\n\nSecond paragraph."

[build]
configure = "./configure --prefix=/usr\n./fixup.sh"
"#,
        )
        .unwrap();
        PackageCandidate::bundled(spec).unwrap()
    }

    #[test]
    fn test_debian_directory() {
        let candidate = candidate();
        let target = BuildTarget {
            candidate: &candidate,
            spec: candidate.spec.as_deref().unwrap(),
            dependencies: vec![DeclaredDependency {
                name: "zlib-dev".to_string(),
                declared_name: "zlib1g-dev".to_string(),
                version: VersionId::parse("1.2.13").unwrap(),
                origin: Origin::Native,
                kind: DependencyKind::Build,
            }],
            dir: PathBuf::from("myapp-2.1"),
        };
        let config = PlatformConfig::default()
            .with_build_date(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap());
        let adapter = DebAdapter::new(config);
        let graph = DependencyGraph::new();
        let files = adapter.render_build_script(&order(&graph).unwrap(), &target).unwrap();

        let paths: Vec<_> = files.iter().map(|f| f.path.display().to_string()).collect();
        assert_eq!(
            paths,
            vec!["debian/control", "debian/changelog", "debian/rules", "debian/source/format"]
        );

        let control = render(&files[0].template, &files[0].bindings).unwrap();
        assert!(control.contains("Build-Depends: debhelper-compat (= 13), zlib1g-dev\n"));
        assert!(control.contains("Depends: ${shlibs:Depends}, ${misc:Depends}\n"));
        assert!(control.contains("Description: My application\n First line.\n .\n Second paragraph.\n"));

        let changelog = render(&files[1].template, &files[1].bindings).unwrap();
        assert!(changelog.starts_with("myapp (2.1-1) unstable; urgency=medium"));
        assert!(changelog.contains(" -- distpack <distpack@localhost>  Fri, 01 Mar 2024 12:30:00 +0000"));

        let rules = render(&files[2].template, &files[2].bindings).unwrap();
        assert!(rules.contains("override_dh_auto_configure:\n\t./configure --prefix=/usr\n\t./fixup.sh\n"));
        assert!(rules.contains("\tmake install DESTDIR=$(CURDIR)/debian/myapp\n"));
    }

    #[test]
    fn test_layout_and_command() {
        let candidate = candidate();
        let target = BuildTarget {
            candidate: &candidate,
            spec: candidate.spec.as_deref().unwrap(),
            dependencies: Vec::new(),
            dir: PathBuf::from("myapp-2.1"),
        };
        let adapter = DebAdapter::new(PlatformConfig::default().with_architecture("aarch64"));
        assert_eq!(adapter.artifact_layout(&target), vec![PathBuf::from("myapp_2.1-1_arm64.deb")]);
        assert_eq!(adapter.source_dir(&target), PathBuf::from("."));
        assert_eq!(
            adapter.native_build_command(&target, Path::new("myapp-2.1")),
            vec!["dpkg-buildpackage", "-us", "-uc", "-b"]
        );
    }

    #[test]
    fn test_name_map() {
        let adapter = DebAdapter::new(PlatformConfig::default());
        assert_eq!(adapter.system_name("zlib-dev"), "zlib1g-dev");
        assert_eq!(adapter.system_name("openssl-dev"), "libssl-dev");
        assert_eq!(adapter.name_map()["pam"], "libpam0g");
    }

    #[test]
    fn test_packaging_metadata() {
        let spec = parse_spec(
            r#"
[package]
name = "myapp"
version = "2.1"
summary = "My application"
provides = ["myapp-compat", { name = "oldapp", version = "1.9" }]
conflicts = ["oldapp"]

[scripts]
after_install = "adduser --system myapp\n"

[scripts.services]
"/lib/systemd/system/myapp.service" = "[Service]\nExecStart=/usr/bin/myapp\n"

[files]
include = ["/usr/bin/*"]
exclude = ["/usr/bin/myapp-debug"]

[[meta_packages]]
name = "myapp-full"
depends = ["myapp", "myapp-plugins"]
"#,
        )
        .unwrap();
        let candidate = PackageCandidate::bundled(spec).unwrap();
        let target = BuildTarget {
            candidate: &candidate,
            spec: candidate.spec.as_deref().unwrap(),
            dependencies: Vec::new(),
            dir: PathBuf::from("myapp-2.1"),
        };
        let adapter = DebAdapter::new(PlatformConfig::default().with_architecture("x86_64"));
        let files = adapter
            .render_build_script(&order(&DependencyGraph::new()).unwrap(), &target)
            .unwrap();
        let rendered = |path: &str| {
            let file = files.iter().find(|f| f.path == Path::new(path)).unwrap();
            render(&file.template, &file.bindings).unwrap()
        };

        let control = rendered("debian/control");
        assert!(control.contains(
            "Provides: myapp-compat (= 2.1), oldapp (= 1.9)\nConflicts: oldapp\nReplaces: oldapp\nDescription: My application\n"
        ));
        assert!(control.contains(
            "\nPackage: myapp-full\nArchitecture: any\nDepends: myapp, myapp-plugins, ${misc:Depends}\nDescription: My application\n"
        ));

        assert_eq!(
            rendered("debian/myapp.install"),
            "usr/bin/*\nlib/systemd/system/myapp.service\n"
        );
        assert_eq!(
            rendered("debian/myapp.postinst"),
            "#!/bin/sh\nset -e\n\nadduser --system myapp\n\n#DEBHELPER#\n"
        );
        assert!(files.iter().all(|f| f.path != Path::new("debian/myapp.preinst")));

        let rules = rendered("debian/rules");
        assert!(rules.contains("\tmake install DESTDIR=$(CURDIR)/debian/tmp\n"));
        assert!(rules.contains(
            "\tinstall -D -m 0644 \"$(CURDIR)/services/lib/systemd/system/myapp.service\" \"$(CURDIR)/debian/tmp/lib/systemd/system/myapp.service\"\n"
        ));
        assert!(rules.contains("override_dh_install:\n\tdh_install\n\trm -rf debian/myapp/usr/bin/myapp-debug\n"));
        assert!(rules.contains("override_dh_missing:\n\tdh_missing --list-missing\n"));
        assert!(files
            .iter()
            .any(|f| f.path == Path::new("services/lib/systemd/system/myapp.service")));

        assert_eq!(
            adapter.artifact_layout(&target),
            vec![
                PathBuf::from("myapp_2.1-1_amd64.deb"),
                PathBuf::from("myapp-full_2.1-1_amd64.deb"),
            ]
        );
    }
}
