// src/platform/generic.rs

//! Generic tarball adapter
//!
//! For systems without a supported package manager: a `build.sh` script
//! runs the build phases, stages the install into `image/` and packs it as
//! `name-version.tar.gz`. Bundled packages built earlier in the plan are
//! exposed through `PKG_CONFIG_PATH`, `CPATH` and `LIBRARY_PATH`.
//!
//! A tarball has no install hooks or package relations; only service files
//! and the include/exclude lists apply.

use super::{
    base_bindings, package_dir, packaged_paths, service_files, BuildTarget, PlatformAdapter, ScriptFile, TargetFamily,
};
use crate::config::PlatformConfig;
use crate::error::Result;
use crate::graph::BuildOrder;
use crate::provider::Origin;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const SCRIPT_TEMPLATE: &str = "\
#!/bin/sh
set -e
cd \"$(dirname \"$0\")\"
TOP=\"$(pwd)\"
DESTDIR=\"$TOP/image\"
export DESTDIR
%(prefixes)s
%(environment)s
%(configure)s
%(build)s
%(install)s
%(prune)s
cd \"$DESTDIR\"
tar -czf \"$TOP/%(name)s-%(version)s.tar.gz\" %(contents)s
";

/// Adapter producing plain tarballs
#[derive(Debug, Clone)]
pub struct GenericAdapter {
    config: PlatformConfig,
}

impl GenericAdapter {
    pub fn new(config: PlatformConfig) -> Self {
        Self { config }
    }
}

impl PlatformAdapter for GenericAdapter {
    fn family(&self) -> TargetFamily {
        TargetFamily::Generic
    }

    fn system_name(&self, name: &str) -> String {
        self.config
            .package_names
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn name_map(&self) -> BTreeMap<String, String> {
        self.config.package_names.clone()
    }

    fn source_dir(&self, _target: &BuildTarget<'_>) -> PathBuf {
        PathBuf::from(".")
    }

    fn artifact_layout(&self, target: &BuildTarget<'_>) -> Vec<PathBuf> {
        vec![target.dir.join(format!(
            "{}-{}.tar.gz",
            target.name(),
            target.spec.package.version
        ))]
    }

    fn render_build_script(&self, order: &BuildOrder<'_>, target: &BuildTarget<'_>) -> Result<Vec<ScriptFile>> {
        let spec = target.spec;
        let mut bindings = base_bindings(target, &self.config, "$TOP", "$DESTDIR", "")?;

        // Images of bundled packages already built in this plan
        let images: Vec<String> = order
            .iter()
            .take_while(|c| c.name != target.name())
            .filter(|c| c.origin == Origin::Bundled)
            .map(|c| format!("$TOP/../{}/image/usr", package_dir(c).display()))
            .collect();
        let prefixes = if images.is_empty() {
            String::new()
        } else {
            let join = |suffix: &str| {
                images
                    .iter()
                    .map(|p| format!("{}{}", p, suffix))
                    .collect::<Vec<_>>()
                    .join(":")
            };
            format!(
                "export PKG_CONFIG_PATH=\"{}\"\nexport CPATH=\"{}\"\nexport LIBRARY_PATH=\"{}\"",
                join("/lib/pkgconfig"),
                join("/include"),
                join("/lib")
            )
        };
        bindings.insert("prefixes".to_string(), prefixes);

        let environment: Vec<String> = target
            .spec
            .build
            .environment
            .iter()
            .map(|(k, v)| format!("export {}=\"{}\"", k, v))
            .collect();
        bindings.insert("environment".to_string(), environment.join("\n"));

        let prune: Vec<String> = spec
            .files
            .exclude
            .iter()
            .map(|p| format!("rm -rf \"$DESTDIR\"{}", p))
            .collect();
        bindings.insert("prune".to_string(), prune.join("\n"));
        let contents = if spec.files.include.is_empty() {
            ".".to_string()
        } else {
            packaged_paths(spec, &[])
                .iter()
                .map(|p| format!(".{}", p))
                .collect::<Vec<_>>()
                .join(" ")
        };
        bindings.insert("contents".to_string(), contents);

        if spec.scripts.hooks().next().is_some() || !spec.package.provides.is_empty() {
            debug!("{}: install hooks and provides do not apply to tarballs", target.name());
        }

        let mut files = vec![ScriptFile {
            path: PathBuf::from("build.sh"),
            template: SCRIPT_TEMPLATE.to_string(),
            bindings,
        }];
        files.extend(service_files(target));
        Ok(files)
    }

    fn native_build_command(&self, _target: &BuildTarget<'_>, _working_dir: &Path) -> Vec<String> {
        vec!["sh".to_string(), "build.sh".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{order, DependencyGraph, Edge};
    use crate::plan::template::render;
    use crate::provider::PackageCandidate;
    use crate::spec::parse_spec;
    use crate::version::Constraint;

    fn bundled(name: &str, version: &str) -> PackageCandidate {
        let text = format!("[package]\nname = \"{}\"\nversion = \"{}\"\n", name, version);
        PackageCandidate::bundled(parse_spec(&text).unwrap()).unwrap()
    }

    #[test]
    fn test_script_exposes_earlier_images() {
        let mut graph = DependencyGraph::new();
        graph.add_node(bundled("libfoo", "1.0"));
        graph.add_node(bundled("myapp", "2.1"));
        graph.add_edge(
            "myapp",
            Edge {
                to: "libfoo".to_string(),
                constraint: Constraint::any(),
                kind: Default::default(),
            },
        );
        let ordered = order(&graph).unwrap();
        let app = graph.node("myapp").unwrap();
        let target = BuildTarget {
            candidate: app,
            spec: app.spec.as_deref().unwrap(),
            dependencies: Vec::new(),
            dir: package_dir(app),
        };

        let adapter = GenericAdapter::new(PlatformConfig::default());
        let files = adapter.render_build_script(&ordered, &target).unwrap();
        assert_eq!(files[0].path, PathBuf::from("build.sh"));

        let script = render(&files[0].template, &files[0].bindings).unwrap();
        assert!(script.contains("export PKG_CONFIG_PATH=\"$TOP/../libfoo-1.0/image/usr/lib/pkgconfig\""));
        assert!(script.contains("make install DESTDIR=$DESTDIR"));
        assert!(script.contains("-czf \"$TOP/myapp-2.1.tar.gz\""));

        assert_eq!(adapter.artifact_layout(&target), vec![PathBuf::from("myapp-2.1/myapp-2.1.tar.gz")]);
        assert_eq!(adapter.native_build_command(&target, &target.dir), vec!["sh", "build.sh"]);
    }

    #[test]
    fn test_file_lists_and_services() {
        let spec = parse_spec(
            r#"
[package]
name = "tool"
version = "0.3"

[scripts.services]
"/etc/tool.conf" = "level = 1\n"

[files]
include = ["/usr/bin/*"]
exclude = ["/usr/bin/tool-debug"]
"#,
        )
        .unwrap();
        let candidate = PackageCandidate::bundled(spec).unwrap();
        let target = BuildTarget {
            candidate: &candidate,
            spec: candidate.spec.as_deref().unwrap(),
            dependencies: Vec::new(),
            dir: package_dir(&candidate),
        };
        let adapter = GenericAdapter::new(PlatformConfig::default());
        let files = adapter
            .render_build_script(&order(&DependencyGraph::new()).unwrap(), &target)
            .unwrap();

        assert_eq!(files[1].path, PathBuf::from("services/etc/tool.conf"));
        let script = render(&files[0].template, &files[0].bindings).unwrap();
        assert!(script.contains("install -D -m 0644 \"$TOP/services/etc/tool.conf\" \"$DESTDIR/etc/tool.conf\"\n"));
        assert!(script.contains("rm -rf \"$DESTDIR\"/usr/bin/tool-debug\n"));
        assert!(script.ends_with("tar -czf \"$TOP/tool-0.3.tar.gz\" ./usr/bin/* ./etc/tool.conf\n"));
    }
}
