// tests/scenarios.rs

//! End-to-end scenarios: resolve, order and plan a root specification.

mod common;

use common::{bundled, native, req, spec};
use distpack::config::PlatformConfig;
use distpack::plan::StepKind;
use distpack::provider::MemoryProvider;
use distpack::resolver::ResolutionState;
use distpack::{
    adapter_for, order, synthesize, BuildStep, Conflict, Error, MetadataProvider, Origin, Resolver,
    TargetFamily,
};
use std::path::Path;

fn conflict_of<T: std::fmt::Debug>(result: distpack::Result<T>) -> Conflict {
    match result {
        Err(Error::Conflict(conflict)) => *conflict,
        other => panic!("expected a conflict, got {:?}", other),
    }
}

/// Whether some known version of the conflicting package meets every
/// requirement except the one at `skip`
fn satisfiable_without(conflict: &Conflict, provider: &dyn MetadataProvider, skip: Option<usize>) -> bool {
    let candidates = provider.candidates(conflict.package()).unwrap();
    let blamed = conflict.requirements();
    candidates.iter().any(|c| {
        blamed
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .all(|(_, r)| r.requirement.admits(c.origin, &c.version))
    })
}

fn assert_minimal(conflict: &Conflict, provider: &dyn MetadataProvider) {
    assert!(!conflict.requirements().is_empty());
    assert!(!satisfiable_without(conflict, provider, None), "{}", conflict);
    for i in 0..conflict.requirements().len() {
        assert!(
            satisfiable_without(conflict, provider, Some(i)),
            "dropping {} still leaves {} unsatisfiable",
            conflict.requirements()[i],
            conflict.package()
        );
    }
}

#[test]
fn test_native_dependency_needs_no_build_files() {
    let provider = MemoryProvider::new().with_candidate(native("A", "1.5"));
    let root = spec("app", "1.0", &["A (>= 1.0, < 2.0)"]);
    let roots = root.requirements().unwrap();

    let graph = distpack::resolve(&roots, &provider).unwrap();
    let a = graph.node("A").unwrap();
    assert_eq!(a.version.to_string(), "1.5");
    assert_eq!(a.origin, Origin::Native);

    let ordered = order(&graph).unwrap();
    let adapter = adapter_for(TargetFamily::Rpm, &PlatformConfig::default());
    let plan = synthesize(&ordered, &root, adapter.as_ref()).unwrap();

    let generated_for_a = plan.steps.iter().any(|step| match step {
        BuildStep::GenerateFile { path, .. } => path.starts_with("A-1.5"),
        _ => false,
    });
    assert!(!generated_for_a);
    assert_eq!(plan.steps_of(StepKind::RunCommand).count(), 1);

    let spec_file = plan
        .steps
        .iter()
        .find_map(|step| match step {
            BuildStep::GenerateFile { path, template, bindings }
                if path == Path::new("app-1.0/SPECS/app.spec") =>
            {
                Some(distpack::plan::template::render(template, bindings).unwrap())
            }
            _ => None,
        })
        .unwrap();
    assert!(spec_file.contains("Requires: A"));
}

#[test]
fn test_unsatisfiable_transitive_constraint() {
    // Root wants A >= 1.0 while B needs A < 1.0: no assignment works
    let provider = MemoryProvider::new()
        .with_candidate(native("A", "1.5"))
        .with_candidate(native("A", "0.9"))
        .with_candidate(bundled("B", "1.0", &["A (< 1.0)"]));

    let conflict = conflict_of(distpack::resolve(&[req("A", ">= 1.0"), req("B", "*")], &provider));
    assert_eq!(conflict.package(), "A");
    let constraints: Vec<String> = conflict
        .requirements()
        .iter()
        .map(|r| r.requirement.constraint.to_string())
        .collect();
    assert!(constraints.contains(&">= 1.0".to_string()));
    assert!(constraints.contains(&"< 1.0".to_string()));
}

#[test]
fn test_backtracking_picks_older_native() {
    let provider = MemoryProvider::new()
        .with_candidate(native("A", "1.5"))
        .with_candidate(native("A", "0.9"))
        .with_candidate(bundled("B", "1.0", &["A (< 1.0)"]));

    let mut state = ResolutionState::default();
    let graph = Resolver::new(&provider)
        .resolve_with_state(&[req("A", "*"), req("B", "*")], &mut state)
        .unwrap();

    assert_eq!(graph.node("A").unwrap().version.to_string(), "0.9");
    assert_eq!(graph.node("B").unwrap().origin, Origin::Bundled);
    assert!(state.stats().backtracks >= 1);

    let ordered = order(&graph).unwrap();
    assert_eq!(ordered.names(), vec!["A", "B"]);
}

#[test]
fn test_no_version_new_enough() {
    let provider = MemoryProvider::new().with_candidate(native("A", "1.9"));
    let root = spec("app", "1.0", &["A (>= 2.0)"]);

    let conflict = conflict_of(distpack::resolve(&root.requirements().unwrap(), &provider));
    assert_eq!(conflict.package(), "A");
    let blamed = conflict.requirements();
    assert_eq!(blamed.len(), 1);
    assert_eq!(blamed[0].requirement.constraint.to_string(), ">= 2.0");
    assert!(conflict.to_string().contains("A"));
}

#[test]
fn test_bundled_only_marker_without_bundled_version() {
    let provider = MemoryProvider::new().with_candidate(native("A", "1.5"));
    let conflict = conflict_of(distpack::resolve(
        &[distpack::Requirement::parse("A (>= 1.0); bundled-only").unwrap()],
        &provider,
    ));
    assert_eq!(conflict.package(), "A");
}

#[test]
fn test_cycle_reported_by_ordering() {
    let provider = MemoryProvider::new()
        .with_candidate(bundled("X", "1.0", &["Y"]))
        .with_candidate(bundled("Y", "1.0", &["X"]));

    let graph = distpack::resolve(&[req("X", "*")], &provider).unwrap();
    match order(&graph) {
        Err(Error::Cycle(cycle)) => {
            let mut members = cycle.members.clone();
            members.sort();
            assert_eq!(members, vec!["X".to_string(), "Y".to_string()]);
        }
        other => panic!("expected a cycle, got {:?}", other.map(|o| o.names())),
    }
}

#[test]
fn test_bundled_chain_planned_in_dependency_order() {
    let provider = MemoryProvider::new()
        .with_candidate(bundled("libbar", "2.0", &[]))
        .with_candidate(bundled("libfoo", "1.2", &["libbar (>= 2.0)"]))
        .with_candidate(native("zlib", "1.2.13"));
    let root = spec("app", "3.0", &["libfoo", "zlib"]);

    let graph = distpack::resolve(&root.requirements().unwrap(), &provider).unwrap();
    let ordered = order(&graph).unwrap();
    let adapter = adapter_for(TargetFamily::Generic, &PlatformConfig::default());
    let plan = synthesize(&ordered, &root, adapter.as_ref()).unwrap();

    let dirs: Vec<String> = plan
        .steps
        .iter()
        .filter_map(|step| match step {
            BuildStep::RunCommand { cwd, .. } => Some(cwd.display().to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(dirs, vec!["libbar-2.0", "libfoo-1.2", "app-3.0"]);
    assert_eq!(plan.artifacts.len(), 3);
}

#[test]
fn test_reported_conflicts_are_minimal() {
    // c's constraint on A is redundant and must not be blamed
    let provider = MemoryProvider::new()
        .with_candidate(native("A", "1.5"))
        .with_candidate(native("A", "0.9"))
        .with_candidate(bundled("B", "1.0", &["A (< 1.0)"]))
        .with_candidate(bundled("C", "1.0", &["A (>= 0.5)"]));

    let conflict = conflict_of(distpack::resolve(
        &[req("A", ">= 1.0"), req("C", "*"), req("B", "*")],
        &provider,
    ));
    assert_eq!(conflict.package(), "A");
    assert_eq!(conflict.requirements().len(), 2);
    assert!(!conflict.packages().contains(&"C".to_string()));
    assert_minimal(&conflict, &provider);

    let conflict = conflict_of(distpack::resolve(&[req("A", ">= 1.0"), req("B", "*")], &provider));
    assert_minimal(&conflict, &provider);

    let conflict = conflict_of(distpack::resolve(&[req("A", ">= 2.0")], &provider));
    assert_minimal(&conflict, &provider);
}
