// src/resolver/mod.rs

//! Dependency resolution
//!
//! The resolver turns a set of root requirements into a [`DependencyGraph`]
//! in which every package has exactly one version and every requirement is
//! met, or reports a [`Conflict`].
//!
//! # Algorithm
//!
//! Requirements are processed from a work queue. The first requirement on a
//! package opens a decision point listing the admissible candidates in
//! preference order; the first one is assigned and its own requirements are
//! queued. A later requirement the assigned version does not meet is a
//! conflict. The resolver then jumps straight to the most recent decision
//! that contributed to it (the package's own decision or one that
//! introduced a requirement on it) and tries that decision's next
//! alternative. An exhausted decision falls back to the one before it; an
//! empty stack ends the run with the most informative conflict seen.
//!
//! Every conflict also records a rejection for the alternative being
//! abandoned, tied to the other decisions involved. While those decisions
//! stand, the rejected `(package, version)` pair is never tried again.

mod conflict;
mod state;

pub use conflict::{BlamedRequirement, Conflict};
pub use state::{FrameStatus, ResolutionState, ResolutionStats};

use crate::config::{CandidatePreference, OriginTieBreak, ResolverConfig};
use crate::error::Result;
use crate::graph::{DependencyGraph, Edge};
use crate::provider::{MetadataProvider, Origin, PackageCandidate};
use crate::spec::Requirement;
use conflict::{jointly_satisfiable, minimize};
use rayon::prelude::*;
use state::{Assignment, Nogood, Pending};
use std::sync::Arc;
use tracing::{debug, info};

/// Conflicts seen during one run, kept for the final report
#[derive(Default)]
struct ConflictLog {
    last: Option<Conflict>,
    last_intrinsic: Option<Conflict>,
}

impl ConflictLog {
    fn record(&mut self, conflict: Conflict) {
        if conflict.is_intrinsic() {
            self.last_intrinsic = Some(conflict.clone());
        }
        self.last = Some(conflict);
    }

    /// Prefer a set that is unsatisfiable on its own over one that only
    /// failed because of an earlier choice
    fn into_report(self, fallback_package: &str) -> Conflict {
        self.last_intrinsic
            .or(self.last)
            .unwrap_or_else(|| Conflict::MissingPackage {
                package: fallback_package.to_string(),
                required_by: Vec::new(),
            })
    }

    fn take_report(&mut self, package: &str) -> Conflict {
        std::mem::take(self).into_report(package)
    }
}

/// Backtracking dependency resolver
pub struct Resolver<'a> {
    provider: &'a dyn MetadataProvider,
    config: ResolverConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(provider: &'a dyn MetadataProvider) -> Self {
        Self {
            provider,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve root requirements into a dependency graph
    pub fn resolve(&self, roots: &[Requirement]) -> Result<DependencyGraph> {
        let mut state = ResolutionState::default();
        self.resolve_with_state(roots, &mut state)
    }

    /// Resolve using caller-owned state, which stays inspectable afterwards
    ///
    /// The state is reset and seeded with `roots` first.
    pub fn resolve_with_state(
        &self,
        roots: &[Requirement],
        state: &mut ResolutionState,
    ) -> Result<DependencyGraph> {
        *state = ResolutionState::new(roots);
        let mut log = ConflictLog::default();

        while let Some(pending) = state.queue.pop_front() {
            let name = pending.requirement.name.clone();
            state
                .applied
                .entry(name.clone())
                .or_default()
                .push(pending.clone());

            if let Some(assignment) = state.assignments.get(&name) {
                let chosen = &assignment.candidate;
                if pending.requirement.admits(chosen.origin, &chosen.version) {
                    continue;
                }
                debug!(
                    "{} rejects assigned {}",
                    pending.blamed(),
                    chosen
                );
                self.recover(state, &name, &mut log)?;
                continue;
            }

            let candidates = self.fetch(state, &name)?;
            let alternatives: Vec<Arc<PackageCandidate>> = self
                .order(&candidates)
                .into_iter()
                .filter(|c| state.admits(c))
                .collect();

            if alternatives.is_empty() {
                debug!("No admissible candidate for {}", name);
                self.recover(state, &name, &mut log)?;
                continue;
            }

            let index = state.push_frame(&name, alternatives);
            if self.advance(state, index) {
                continue;
            }

            // Every alternative was a learned rejection: fall back chronologically
            state.stack.pop();
            if state.stack.is_empty() {
                return Err(log.into_report(&name).into());
            }
            let top = state.stack.len() - 1;
            self.unwind(state, top, &mut log, &name)?;
        }

        state.confirm_all();
        let graph = build_graph(roots, state);

        let stats = state.stats();
        info!(
            "Resolved {} packages ({} native, {} bundled) with {} decisions and {} backtracks",
            graph.len(),
            graph.count_origin(Origin::Native),
            graph.count_origin(Origin::Bundled),
            stats.decisions,
            stats.backtracks
        );
        Ok(graph)
    }

    /// Resolve several independent root sets in parallel
    ///
    /// Each run owns its own state; results are in input order.
    pub fn resolve_batch(&self, root_sets: &[Vec<Requirement>]) -> Vec<Result<DependencyGraph>> {
        root_sets.par_iter().map(|roots| self.resolve(roots)).collect()
    }

    /// Candidates for a package, fetched at most once per run
    fn fetch(&self, state: &mut ResolutionState, name: &str) -> Result<Vec<Arc<PackageCandidate>>> {
        if let Some(list) = state.fetched.get(name) {
            return Ok(list.clone());
        }
        let list = self.provider.candidates(name)?;
        debug!(
            "{} offers {} candidates for {}",
            self.provider.source_name(),
            list.len(),
            name
        );
        state.fetched.insert(name.to_string(), list.clone());
        Ok(list)
    }

    /// Apply the configured preference to a candidate list
    fn order(&self, candidates: &[Arc<PackageCandidate>]) -> Vec<Arc<PackageCandidate>> {
        let mut list = candidates.to_vec();
        let tie_rank = |origin: Origin| match (self.config.tie_break, origin) {
            (OriginTieBreak::PreferNative, Origin::Native)
            | (OriginTieBreak::PreferBundled, Origin::Bundled) => 0,
            _ => 1,
        };
        match self.config.preference {
            CandidatePreference::NativeFirst => list.sort_by(|a, b| {
                (a.origin != Origin::Native)
                    .cmp(&(b.origin != Origin::Native))
                    .then_with(|| b.version.cmp(&a.version))
            }),
            CandidatePreference::NewestFirst => list.sort_by(|a, b| {
                b.version
                    .cmp(&a.version)
                    .then_with(|| tie_rank(a.origin).cmp(&tie_rank(b.origin)))
            }),
        }
        list
    }

    /// Assign the next usable alternative of the frame at `index`
    ///
    /// Restores the frame's snapshot first. Returns false when the frame has
    /// no alternatives left.
    fn advance(&self, state: &mut ResolutionState, index: usize) -> bool {
        let snapshot = state.stack[index].snapshot.clone();
        state.restore(&snapshot);

        loop {
            let frame = &mut state.stack[index];
            frame.current = None;
            if frame.next >= frame.alternatives.len() {
                return false;
            }
            let alt = frame.next;
            frame.next += 1;
            let candidate = frame.alternatives[alt].clone();

            if state.is_nogood(&candidate) {
                debug!("Skipping previously rejected {}", candidate);
                state.stats.nogood_skips += 1;
                continue;
            }
            if !state.admits(&candidate) {
                continue;
            }

            let frame = &mut state.stack[index];
            frame.current = Some(alt);
            frame.status = FrameStatus::Committed;
            let remaining = frame.remaining();

            debug!(
                "Decision {}: {} ({} alternatives left)",
                index, candidate, remaining
            );

            for requirement in &candidate.requirements {
                state.queue.push_back(Pending {
                    requirement: requirement.clone(),
                    required_by: Some(candidate.name.clone()),
                    introduced_at: Some(index),
                });
            }
            state.assignments.insert(
                candidate.name.clone(),
                Assignment {
                    candidate,
                    frame: index,
                },
            );
            return true;
        }
    }

    /// Handle a conflict on `package`: record it, learn from it and jump to
    /// the most recent decision involved
    fn recover(&self, state: &mut ResolutionState, package: &str, log: &mut ConflictLog) -> Result<()> {
        state.stats.conflicts += 1;
        log.record(explain(state, package));

        let mut implicated: Vec<usize> = state
            .applied
            .get(package)
            .map(|reqs| reqs.iter().filter_map(|p| p.introduced_at).collect())
            .unwrap_or_default();
        if let Some(assignment) = state.assignments.get(package) {
            implicated.push(assignment.frame);
        }
        implicated.sort_unstable();
        implicated.dedup();

        let Some(&target) = implicated.last() else {
            // Only root requirements are involved; nothing can change
            return Err(log.take_report(package).into());
        };

        let premises: Vec<(u64, usize)> = implicated[..implicated.len() - 1]
            .iter()
            .filter_map(|&i| state.premise(i))
            .collect();
        let frame = &state.stack[target];
        if let Some(alt) = frame.current {
            let rejected = &frame.alternatives[alt];
            let nogood = Nogood {
                package: rejected.name.clone(),
                version: rejected.version.clone(),
                origin: rejected.origin,
                premises,
            };
            state.learn(nogood);
        }

        self.unwind(state, target, log, package)
    }

    /// Retry the frame at `index`, falling back to earlier frames until one
    /// has an alternative left
    fn unwind(
        &self,
        state: &mut ResolutionState,
        mut index: usize,
        log: &mut ConflictLog,
        package: &str,
    ) -> Result<()> {
        loop {
            state.truncate(index);
            state.stats.backtracks += 1;
            debug!(
                "Backtracking to decision {} ({})",
                index, state.stack[index].package
            );

            if self.advance(state, index) {
                return Ok(());
            }

            state.stack.pop();
            if index == 0 {
                return Err(log.take_report(package).into());
            }
            index -= 1;
        }
    }
}

/// Describe why the requirements on `package` failed
fn explain(state: &ResolutionState, package: &str) -> Conflict {
    let applied: Vec<BlamedRequirement> = state
        .applied
        .get(package)
        .map(|reqs| reqs.iter().map(Pending::blamed).collect())
        .unwrap_or_default();
    let candidates = state.fetched.get(package).cloned().unwrap_or_default();

    if candidates.is_empty() {
        let mut required_by: Vec<String> = applied.iter().map(|r| r.requirer().to_string()).collect();
        required_by.dedup();
        return Conflict::MissingPackage {
            package: package.to_string(),
            required_by,
        };
    }

    let all: Vec<&BlamedRequirement> = applied.iter().collect();
    if !jointly_satisfiable(&candidates, &all) {
        let mut available: Vec<String> = candidates.iter().map(|c| c.version.to_string()).collect();
        available.dedup();
        return Conflict::ConflictingConstraints {
            package: package.to_string(),
            requirements: minimize(&candidates, applied),
            available,
        };
    }

    let chosen_version = state
        .assignments
        .get(package)
        .map(|a| a.candidate.version.to_string())
        .unwrap_or_default();
    // The newest requirement is the one the assignment failed
    match applied.into_iter().last() {
        Some(requirement) => Conflict::UnsatisfiableConstraint {
            package: package.to_string(),
            chosen_version,
            requirement,
        },
        None => Conflict::MissingPackage {
            package: package.to_string(),
            required_by: Vec::new(),
        },
    }
}

fn build_graph(roots: &[Requirement], state: &ResolutionState) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for root in roots {
        graph.add_root(root.clone());
    }
    for assignment in state.assignments.values() {
        graph.add_node(assignment.candidate.as_ref().clone());
    }
    for (name, assignment) in &state.assignments {
        for requirement in &assignment.candidate.requirements {
            graph.add_edge(
                name,
                Edge {
                    to: requirement.name.clone(),
                    constraint: requirement.constraint.clone(),
                    kind: requirement.kind,
                },
            );
        }
    }
    graph
}

/// Resolve with the default configuration
pub fn resolve(roots: &[Requirement], provider: &dyn MetadataProvider) -> Result<DependencyGraph> {
    Resolver::new(provider).resolve(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::provider::{MemoryProvider, MetadataError};
    use crate::spec::{parse_spec, Marker};
    use crate::version::{Constraint, VersionId};

    fn req(name: &str, constraint: &str) -> Requirement {
        Requirement::new(name, Constraint::parse(constraint).unwrap())
    }

    fn native(name: &str, version: &str) -> PackageCandidate {
        PackageCandidate::native(name, VersionId::parse(version).unwrap(), name)
    }

    fn bundled(name: &str, version: &str, requires: &[&str]) -> PackageCandidate {
        let runtime: Vec<String> = requires.iter().map(|r| format!("\"{}\"", r)).collect();
        let text = format!(
            "[package]\nname = \"{}\"\nversion = \"{}\"\n[requires]\nruntime = [{}]\n",
            name,
            version,
            runtime.join(", ")
        );
        PackageCandidate::bundled(parse_spec(&text).unwrap()).unwrap()
    }

    fn conflict_of(result: Result<DependencyGraph>) -> Conflict {
        match result {
            Err(Error::Conflict(conflict)) => *conflict,
            other => panic!("expected conflict, got {:?}", other.map(|g| g.len())),
        }
    }

    #[test]
    fn test_single_native() {
        let provider = MemoryProvider::new().with_candidate(native("a", "1.5"));
        let graph = resolve(&[req("a", ">= 1.0, < 2.0")], &provider).unwrap();
        let a = graph.node("a").unwrap();
        assert_eq!(a.version.to_string(), "1.5");
        assert_eq!(a.origin, Origin::Native);
    }

    #[test]
    fn test_native_preferred_over_newer_bundled() {
        let provider = MemoryProvider::new()
            .with_candidate(native("a", "1.5"))
            .with_candidate(bundled("a", "1.8", &[]));
        let graph = resolve(&[req("a", ">= 1.0")], &provider).unwrap();
        assert_eq!(graph.node("a").unwrap().origin, Origin::Native);

        let newest = Resolver::new(&provider)
            .with_config(ResolverConfig::default().with_preference(CandidatePreference::NewestFirst))
            .resolve(&[req("a", ">= 1.0")])
            .unwrap();
        assert_eq!(newest.node("a").unwrap().version.to_string(), "1.8");
    }

    #[test]
    fn test_tie_break_policy() {
        let provider = MemoryProvider::new()
            .with_candidate(native("a", "1.5"))
            .with_candidate(bundled("a", "1.5", &[]));
        let newest = ResolverConfig::default().with_preference(CandidatePreference::NewestFirst);

        let graph = Resolver::new(&provider)
            .with_config(newest.clone())
            .resolve(&[req("a", "*")])
            .unwrap();
        assert_eq!(graph.node("a").unwrap().origin, Origin::Native);

        let graph = Resolver::new(&provider)
            .with_config(newest.with_tie_break(OriginTieBreak::PreferBundled))
            .resolve(&[req("a", "*")])
            .unwrap();
        assert_eq!(graph.node("a").unwrap().origin, Origin::Bundled);
    }

    #[test]
    fn test_marker_restricts_origin() {
        let provider = MemoryProvider::new()
            .with_candidate(native("a", "1.5"))
            .with_candidate(bundled("a", "1.0", &[]));
        let graph = resolve(&[req("a", "*").with_marker(Marker::BundledOnly)], &provider).unwrap();
        assert_eq!(graph.node("a").unwrap().origin, Origin::Bundled);
    }

    #[test]
    fn test_backtracks_to_older_version() {
        let provider = MemoryProvider::new()
            .with_candidate(native("a", "1.5"))
            .with_candidate(native("a", "0.9"))
            .with_candidate(bundled("b", "1.0", &["a (< 1.0)"]));

        let mut state = ResolutionState::new(&[]);
        let roots = [req("a", ">= 0.5"), req("b", ">= 1.0")];
        let graph = Resolver::new(&provider)
            .resolve_with_state(&roots, &mut state)
            .unwrap();

        assert_eq!(graph.node("a").unwrap().version.to_string(), "0.9");
        assert!(state.stats().backtracks >= 1);
        assert!(state
            .decisions()
            .iter()
            .all(|(_, status)| *status == FrameStatus::Confirmed));
    }

    #[test]
    fn test_transitive_conflict_reported() {
        let provider = MemoryProvider::new()
            .with_candidate(native("a", "1.5"))
            .with_candidate(native("a", "0.9"))
            .with_candidate(bundled("b", "1.0", &["a (< 1.0)"]));
        let conflict = conflict_of(resolve(&[req("a", ">= 1.0"), req("b", ">= 1.0")], &provider));

        assert_eq!(conflict.package(), "a");
        let blamed = conflict.requirements();
        assert_eq!(blamed.len(), 2);
        assert!(blamed.iter().any(|r| r.required_by.is_none()));
        assert!(blamed.iter().any(|r| r.required_by.as_deref() == Some("b")));
    }

    #[test]
    fn test_no_satisfying_version() {
        let provider = MemoryProvider::new().with_candidate(native("a", "1.9"));
        let conflict = conflict_of(resolve(&[req("a", ">= 2.0")], &provider));
        match conflict {
            Conflict::ConflictingConstraints {
                package,
                requirements,
                available,
            } => {
                assert_eq!(package, "a");
                assert_eq!(requirements.len(), 1);
                assert_eq!(requirements[0].requirement.constraint.to_string(), ">= 2.0");
                assert_eq!(available, vec!["1.9".to_string()]);
            }
            other => panic!("unexpected conflict {:?}", other),
        }
    }

    #[test]
    fn test_missing_package() {
        let provider = MemoryProvider::new().with_candidate(bundled("app", "1.0", &["ghost"]));
        let conflict = conflict_of(resolve(&[req("app", "*")], &provider));
        assert_eq!(
            conflict,
            Conflict::MissingPackage {
                package: "ghost".to_string(),
                required_by: vec!["app".to_string()],
            }
        );
    }

    #[test]
    fn test_deep_backtracking() {
        // c-2.0 needs d >= 2 which does not exist; c-1.0 needs d-1
        let provider = MemoryProvider::new()
            .with_candidate(bundled("app", "1.0", &["b", "c"]))
            .with_candidate(bundled("b", "1.0", &[]))
            .with_candidate(bundled("c", "2.0", &["d (>= 2.0)"]))
            .with_candidate(bundled("c", "1.0", &["d (< 2.0)"]))
            .with_candidate(native("d", "1.0"));
        let graph = resolve(&[req("app", "*")], &provider).unwrap();
        assert_eq!(graph.node("c").unwrap().version.to_string(), "1.0");
        assert_eq!(graph.node("d").unwrap().version.to_string(), "1.0");
    }

    #[test]
    fn test_thrashing_guard_skips_rejected_pairs() {
        // a-2.0 clashes with b alone. After a runs out of versions the search
        // falls back to y, and the recreated a frame must skip a-2.0 without
        // trying it again while b keeps its choice.
        let provider = MemoryProvider::new()
            .with_candidate(bundled("b", "1.0", &["a (< 2.0)"]))
            .with_candidate(bundled("y", "2.0", &["a (>= 1.5)"]))
            .with_candidate(bundled("y", "1.0", &[]))
            .with_candidate(bundled("a", "2.0", &[]))
            .with_candidate(bundled("a", "1.0", &[]));
        let roots = [req("b", "*"), req("y", "*"), req("a", "*")];

        let mut state = ResolutionState::new(&[]);
        let graph = Resolver::new(&provider)
            .resolve_with_state(&roots, &mut state)
            .unwrap();

        assert_eq!(graph.node("a").unwrap().version.to_string(), "1.0");
        assert_eq!(graph.node("y").unwrap().version.to_string(), "1.0");
        assert_eq!(graph.node("b").unwrap().version.to_string(), "1.0");
        assert!(state.stats().nogood_skips >= 1);
        assert_eq!(resolve(&roots, &provider).unwrap(), graph);
    }

    #[test]
    fn test_edges_satisfy_requirements() {
        let provider = MemoryProvider::new()
            .with_candidate(bundled("app", "1.0", &["lib (>= 1.0)", "util"]))
            .with_candidate(bundled("lib", "1.2", &["util (< 3.0)"]))
            .with_candidate(native("util", "2.5"))
            .with_candidate(native("util", "3.1"));
        let graph = resolve(&[req("app", "*")], &provider).unwrap();
        for (from, edge) in graph.edges() {
            let target = graph.node(&edge.to).unwrap();
            assert!(edge.constraint.satisfies(&target.version), "{} -> {}", from, edge.to);
        }
        assert_eq!(graph.node("util").unwrap().version.to_string(), "2.5");
    }

    #[test]
    fn test_deterministic() {
        let provider = MemoryProvider::new()
            .with_candidate(bundled("app", "1.0", &["lib", "util"]))
            .with_candidate(bundled("lib", "1.0", &["util (< 3.0)"]))
            .with_candidate(native("util", "2.5"))
            .with_candidate(native("util", "3.1"));
        let first = resolve(&[req("app", "*")], &provider).unwrap();
        for _ in 0..5 {
            assert_eq!(resolve(&[req("app", "*")], &provider).unwrap(), first);
        }
    }

    #[test]
    fn test_metadata_failure_aborts() {
        struct Offline;
        impl MetadataProvider for Offline {
            fn candidates(&self, _: &str) -> std::result::Result<Vec<Arc<PackageCandidate>>, MetadataError> {
                Err(MetadataError::unavailable("offline", "mirror unreachable"))
            }
            fn source_name(&self) -> &str {
                "offline"
            }
        }
        let result = resolve(&[req("a", "*")], &Offline);
        assert!(matches!(result, Err(Error::MetadataUnavailable(_))));
    }

    #[test]
    fn test_resolve_batch() {
        let provider = MemoryProvider::new()
            .with_candidate(native("a", "1.0"))
            .with_candidate(native("b", "2.0"));
        let results = Resolver::new(&provider).resolve_batch(&[
            vec![req("a", "*")],
            vec![req("b", ">= 3.0")],
            vec![req("a", "*"), req("b", "*")],
        ]);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().len(), 1);
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_roots() {
        let provider = MemoryProvider::new();
        assert!(resolve(&[], &provider).unwrap().is_empty());
    }
}
