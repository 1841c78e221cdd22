// src/resolver/state.rs

//! Mutable search state for one resolution run
//!
//! The decision stack is an arena of frames addressed by index. Every frame
//! keeps a snapshot of the search state taken just before its package was
//! assigned, so unwinding to any frame is a single restore rather than a
//! walk back through intermediate frames.

use super::conflict::BlamedRequirement;
use crate::provider::{Origin, PackageCandidate};
use crate::spec::Requirement;
use crate::version::{Constraint, VersionId};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

/// A requirement waiting to be processed or already applied to a package
#[derive(Debug, Clone)]
pub(crate) struct Pending {
    pub requirement: Requirement,
    pub required_by: Option<String>,
    /// Stack index of the frame whose choice introduced this requirement
    pub introduced_at: Option<usize>,
}

impl Pending {
    pub fn root(requirement: Requirement) -> Self {
        Self {
            requirement,
            required_by: None,
            introduced_at: None,
        }
    }

    pub fn blamed(&self) -> BlamedRequirement {
        BlamedRequirement {
            required_by: self.required_by.clone(),
            requirement: self.requirement.clone(),
        }
    }
}

/// A tentative choice for one package
#[derive(Debug, Clone)]
pub(crate) struct Assignment {
    pub candidate: Arc<PackageCandidate>,
    /// Stack index of the frame that made the choice
    pub frame: usize,
}

/// The parts of the state a frame restores when it is revisited
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    pub queue: VecDeque<Pending>,
    pub assignments: BTreeMap<String, Assignment>,
    pub applied: BTreeMap<String, Vec<Pending>>,
}

/// Lifecycle of a decision point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Created, no alternative chosen yet
    Open,
    /// An alternative is tentatively assigned
    Committed,
    /// Part of a successful resolution
    Confirmed,
    /// Removed by backtracking
    Backtracked,
}

/// A decision point on the stack
#[derive(Debug, Clone)]
pub(crate) struct DecisionFrame {
    /// Unique within a run; stack indexes are reused, ids are not
    pub id: u64,
    pub package: String,
    /// Candidates admissible when the frame was created, in preference order
    pub alternatives: Vec<Arc<PackageCandidate>>,
    /// Index of the next untried alternative
    pub next: usize,
    /// Index of the assigned alternative
    pub current: Option<usize>,
    pub status: FrameStatus,
    pub snapshot: Snapshot,
}

impl DecisionFrame {
    pub fn remaining(&self) -> usize {
        self.alternatives.len().saturating_sub(self.next)
    }
}

/// A learned rejection: `package` at `version` fails whenever every premise
/// frame still holds the alternative it held when the rejection was learned
#[derive(Debug, Clone)]
pub(crate) struct Nogood {
    pub package: String,
    pub version: VersionId,
    pub origin: Origin,
    pub premises: Vec<(u64, usize)>,
}

/// Search state of one resolution run
///
/// Created per run and dropped when the run ends; never shared.
#[derive(Debug, Default)]
pub struct ResolutionState {
    pub(crate) queue: VecDeque<Pending>,
    pub(crate) assignments: BTreeMap<String, Assignment>,
    /// Requirements already checked against each package
    pub(crate) applied: BTreeMap<String, Vec<Pending>>,
    pub(crate) stack: Vec<DecisionFrame>,
    pub(crate) nogoods: Vec<Nogood>,
    /// Candidate lists fetched during this run
    pub(crate) fetched: HashMap<String, Vec<Arc<PackageCandidate>>>,
    next_frame_id: u64,
    pub(crate) stats: ResolutionStats,
}

/// Counters describing how much work a run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub decisions: usize,
    pub backtracks: usize,
    pub conflicts: usize,
    pub nogood_skips: usize,
}

impl ResolutionState {
    pub fn new(roots: &[Requirement]) -> Self {
        Self {
            queue: roots.iter().cloned().map(Pending::root).collect(),
            ..Self::default()
        }
    }

    pub fn stats(&self) -> ResolutionStats {
        self.stats
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Package and status of every frame on the stack, bottom first
    pub fn decisions(&self) -> Vec<(&str, FrameStatus)> {
        self.stack
            .iter()
            .map(|f| (f.package.as_str(), f.status))
            .collect()
    }

    /// Currently assigned version of a package
    pub fn assigned(&self, name: &str) -> Option<&PackageCandidate> {
        self.assignments.get(name).map(|a| a.candidate.as_ref())
    }

    /// Conjunction of every constraint applied to a package so far
    pub fn effective_constraint(&self, name: &str) -> Constraint {
        self.applied
            .get(name)
            .map(|reqs| {
                reqs.iter()
                    .fold(Constraint::any(), |acc, p| acc.intersect(&p.requirement.constraint))
            })
            .unwrap_or_default()
    }

    /// Whether a candidate meets every requirement applied to its package
    pub(crate) fn admits(&self, candidate: &PackageCandidate) -> bool {
        let effective = self.effective_constraint(&candidate.name);
        let markers_ok = self
            .applied
            .get(&candidate.name)
            .is_none_or(|reqs| reqs.iter().all(|p| p.requirement.marker.admits(candidate.origin)));
        markers_ok && effective.satisfies(&candidate.version)
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            queue: self.queue.clone(),
            assignments: self.assignments.clone(),
            applied: self.applied.clone(),
        }
    }

    pub(crate) fn restore(&mut self, snapshot: &Snapshot) {
        self.queue = snapshot.queue.clone();
        self.assignments = snapshot.assignments.clone();
        self.applied = snapshot.applied.clone();
    }

    /// Push a new open frame and return its index
    pub(crate) fn push_frame(&mut self, package: &str, alternatives: Vec<Arc<PackageCandidate>>) -> usize {
        let frame = DecisionFrame {
            id: self.next_frame_id,
            package: package.to_string(),
            alternatives,
            next: 0,
            current: None,
            status: FrameStatus::Open,
            snapshot: self.snapshot(),
        };
        self.next_frame_id += 1;
        self.stack.push(frame);
        self.stats.decisions += 1;
        self.stack.len() - 1
    }

    /// Drop every frame above `index`
    pub(crate) fn truncate(&mut self, index: usize) {
        for frame in self.stack.iter_mut().skip(index + 1) {
            frame.status = FrameStatus::Backtracked;
        }
        self.stack.truncate(index + 1);
    }

    /// Whether a premise `(frame id, alternative)` still holds
    fn premise_live(&self, premise: (u64, usize)) -> bool {
        self.stack
            .iter()
            .any(|f| f.id == premise.0 && f.current == Some(premise.1))
    }

    /// Whether a learned rejection currently excludes this candidate
    pub(crate) fn is_nogood(&self, candidate: &PackageCandidate) -> bool {
        self.nogoods.iter().any(|n| {
            n.package == candidate.name
                && n.origin == candidate.origin
                && n.version == candidate.version
                && n.premises.iter().all(|p| self.premise_live(*p))
        })
    }

    pub(crate) fn learn(&mut self, nogood: Nogood) {
        self.nogoods.push(nogood);
    }

    /// Frame premise for the alternative currently held at `index`
    pub(crate) fn premise(&self, index: usize) -> Option<(u64, usize)> {
        let frame = self.stack.get(index)?;
        Some((frame.id, frame.current?))
    }

    pub(crate) fn confirm_all(&mut self) {
        for frame in &mut self.stack {
            frame.status = FrameStatus::Confirmed;
        }
    }
}
