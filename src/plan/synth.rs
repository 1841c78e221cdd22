// src/plan/synth.rs

//! Build plan synthesis
//!
//! Walks a [`BuildOrder`] and asks a [`PlatformAdapter`] how to build each
//! bundled package. For every bundled package, in order, and finally for the
//! root specification, the plan gets:
//!
//! 1. one `GenerateFile` step per build description file,
//! 2. one `ApplyPatch` step per declared patch,
//! 3. one `RunCommand` step running the native build tool.
//!
//! Native packages get no steps; they appear only as dependency
//! declarations in the generated files of packages that need them.

use super::{template, BuildPlan, BuildStep, PatchSource};
use crate::error::{Error, Result};
use crate::graph::{BuildOrder, DependencyGraph};
use crate::platform::{package_dir, BuildTarget, DeclaredDependency, PlatformAdapter};
use crate::provider::{Origin, PackageCandidate};
use crate::spec::{DependencyKind, PackageSpec};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Turns ordered graphs into build plans for one platform
pub struct Synthesizer<'a> {
    adapter: &'a dyn PlatformAdapter,
}

impl<'a> Synthesizer<'a> {
    pub fn new(adapter: &'a dyn PlatformAdapter) -> Self {
        Self { adapter }
    }

    /// Build plan for `root` on top of its resolved, ordered dependencies
    pub fn synthesize(&self, order: &BuildOrder<'_>, root: &PackageSpec) -> Result<BuildPlan> {
        let mut plan = BuildPlan::new();
        let graph = order.graph();
        let root_name = root.package.name.as_str();

        for candidate in order.iter() {
            if candidate.origin != Origin::Bundled || candidate.name == root_name {
                continue;
            }
            let spec = candidate.spec.as_deref().ok_or_else(|| {
                Error::InvalidSpec(format!("Bundled package {} has no build description", candidate))
            })?;
            let edges = graph
                .dependencies(&candidate.name)
                .iter()
                .map(|e| (e.to.as_str(), e.kind));
            let target = BuildTarget {
                candidate,
                spec,
                dependencies: self.declare(graph, &candidate.name, edges)?,
                dir: package_dir(candidate),
            };
            self.emit(order, &target, &mut plan)?;
        }

        let root_candidate = PackageCandidate::bundled(root.clone())?;
        let edges = root_candidate
            .requirements
            .iter()
            .map(|r| (r.name.as_str(), r.kind));
        let dependencies = self.declare(graph, root_name, edges)?;
        let target = BuildTarget {
            candidate: &root_candidate,
            spec: root,
            dependencies,
            dir: package_dir(&root_candidate),
        };
        self.emit(order, &target, &mut plan)?;

        info!(
            "Synthesized {} build steps for {} ({} artifacts)",
            plan.len(),
            root_candidate,
            plan.artifacts.len()
        );
        Ok(plan)
    }

    /// Resolve dependency names to declarations
    fn declare<'e>(
        &self,
        graph: &DependencyGraph,
        from: &str,
        edges: impl Iterator<Item = (&'e str, DependencyKind)>,
    ) -> Result<Vec<DeclaredDependency>> {
        edges
            .map(|(to, kind)| {
                let node = graph.node(to).ok_or_else(|| Error::UnresolvedReference {
                    from: from.to_string(),
                    to: to.to_string(),
                })?;
                let declared_name = match node.origin {
                    Origin::Native => match &node.system_name {
                        Some(system) if system != &node.name => system.clone(),
                        _ => self.adapter.system_name(&node.name),
                    },
                    Origin::Bundled => node.name.clone(),
                };
                Ok(DeclaredDependency {
                    name: node.name.clone(),
                    declared_name,
                    version: node.version.clone(),
                    origin: node.origin,
                    kind,
                })
            })
            .collect()
    }

    fn emit(&self, order: &BuildOrder<'_>, target: &BuildTarget<'_>, plan: &mut BuildPlan) -> Result<()> {
        let before = plan.len();

        for file in self.adapter.render_build_script(order, target)? {
            // Surface unbound variables now rather than mid-build
            template::render(&file.template, &file.bindings)?;
            plan.push(BuildStep::GenerateFile {
                path: join_relative(&target.dir, &file.path),
                template: file.template,
                bindings: file.bindings,
            });
        }

        let source_dir = join_relative(&target.dir, &self.adapter.source_dir(target));
        for patch in &target.spec.patches {
            let source = match &patch.content {
                Some(content) => PatchSource::Inline {
                    name: patch.file.clone(),
                    content: content.clone(),
                },
                None => PatchSource::File(PathBuf::from(&patch.file)),
            };
            plan.push(BuildStep::ApplyPatch {
                dir: source_dir.clone(),
                patch: source,
                strip: patch.strip,
            });
        }

        plan.push(BuildStep::RunCommand {
            argv: self.adapter.native_build_command(target, &target.dir),
            cwd: target.dir.clone(),
            expected_exit_codes: vec![0],
        });
        plan.artifacts.extend(self.adapter.artifact_layout(target));

        debug!(
            "Planned {} steps for {} ({} dependencies)",
            plan.len() - before,
            target.candidate,
            target.dependencies.len()
        );
        Ok(())
    }
}

/// Join two relative paths, dropping `.` components
fn join_relative(base: &Path, rel: &Path) -> PathBuf {
    let mut out = base.to_path_buf();
    for component in rel.components() {
        if component != Component::CurDir {
            out.push(component);
        }
    }
    out
}

/// Synthesize a plan with the given adapter
pub fn synthesize(order: &BuildOrder<'_>, root: &PackageSpec, adapter: &dyn PlatformAdapter) -> Result<BuildPlan> {
    Synthesizer::new(adapter).synthesize(order, root)
}
