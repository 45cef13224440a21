//! Merge-base (best common ancestor) computation.
//!
//! §1 places commit-ancestor computation out of scope as an external
//! collaborator: the orchestrator only ever consumes a `MergeBaseProvider`.
//! This module supplies that trait plus one concrete adapter — a priority-
//! queue walk over an in-memory parent graph, flagging each commit with
//! which side(s) have reached it so a common ancestor is recognised once
//! both sides touch it and subsumed ancestors are marked stale — so the
//! crate has something runnable behind the trait for tests and for callers
//! with a small enough history to hold in memory; callers with a real
//! ODB-backed commit graph are expected to implement the trait directly
//! against it instead.

use crate::error::{MergeError, MergeResult};
use crate::oid::Oid;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A commit's parent OIDs. Inline capacity 2 covers the overwhelming
/// majority of commits (roots and ordinary commits have 0/1, ordinary
/// merges have 2); only octopus merges spill to the heap.
pub type Parents = SmallVec<[Oid; 2]>;

/// External collaborator (§1): resolves the best common ancestor of two
/// commits.
pub trait MergeBaseProvider {
    type Error: std::error::Error + Send + Sync + 'static;

    fn merge_base(&self, ours: Oid, theirs: Oid) -> Result<Option<Oid>, Self::Error>;
}

bitflags::bitflags! {
    /// Which side(s) of the walk have reached a commit, and whether it has
    /// been subsumed by a more-recent common ancestor already found.
    struct NodeFlags: u8 {
        const PARENT1 = 1 << 0;
        const PARENT2 = 1 << 1;
        const RESULT = 1 << 2;
        const STALE = 1 << 3;
    }
}

impl NodeFlags {
    fn both_parents(self) -> bool {
        self.contains(NodeFlags::PARENT1) && self.contains(NodeFlags::PARENT2)
    }
}

/// A parent-pointer commit graph held entirely in memory, keyed by OID.
#[derive(Debug, Default)]
pub struct CommitGraph {
    parents: FxHashMap<Oid, Parents>,
    timestamps: FxHashMap<Oid, i64>,
}

impl CommitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_commit(&mut self, oid: Oid, timestamp: i64, parents: impl Into<Parents>) {
        self.timestamps.insert(oid, timestamp);
        self.parents.insert(oid, parents.into());
    }

    fn timestamp(&self, oid: Oid) -> i64 {
        self.timestamps.get(&oid).copied().unwrap_or(0)
    }

    fn parents_of(&self, oid: Oid) -> &[Oid] {
        self.parents.get(&oid).map(SmallVec::as_slice).unwrap_or(&[])
    }
}

#[derive(Eq, PartialEq)]
struct QueueEntry {
    timestamp: i64,
    oid: Oid,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // newest-first: a max-heap on timestamp, oid as a tiebreaker so the
        // ordering is total even when two commits share a timestamp.
        self.timestamp.cmp(&other.timestamp).then_with(|| self.oid.cmp(&other.oid))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Walks commits newest-timestamp-first from both heads, same as
/// `git merge-base`'s generation-number-free algorithm: a commit is a
/// common ancestor once it has been reached from both sides, and any of
/// *its* ancestors are then known stale (subsumed) rather than additional
/// merge bases.
impl MergeBaseProvider for CommitGraph {
    type Error = std::convert::Infallible;

    fn merge_base(&self, ours: Oid, theirs: Oid) -> Result<Option<Oid>, Self::Error> {
        debug!("CommitGraph::merge_base({}, {})", ours, theirs);
        if ours == theirs {
            return Ok(Some(ours));
        }

        let mut flags: FxHashMap<Oid, NodeFlags> = FxHashMap::default();
        let mut queue = BinaryHeap::new();
        let mut seen = FxHashSet::default();

        for (oid, flag) in [(ours, NodeFlags::PARENT1), (theirs, NodeFlags::PARENT2)] {
            flags.insert(oid, flag);
            queue.push(QueueEntry { timestamp: self.timestamp(oid), oid });
            seen.insert(oid);
        }

        let mut best: Option<Oid> = None;

        while let Some(QueueEntry { oid, .. }) = queue.pop() {
            let current_flags = flags.get(&oid).copied().unwrap_or(NodeFlags::empty());

            if current_flags.both_parents() && !current_flags.contains(NodeFlags::STALE) {
                if best.is_none() {
                    best = Some(oid);
                }
                flags.insert(oid, current_flags | NodeFlags::RESULT);
            }

            let propagate = if current_flags.contains(NodeFlags::RESULT) {
                current_flags | NodeFlags::STALE
            } else {
                current_flags
            };

            for &parent in self.parents_of(oid) {
                let parent_flags = flags.entry(parent).or_insert_with(NodeFlags::empty);
                let merged = *parent_flags | propagate;
                if merged != *parent_flags || seen.insert(parent) {
                    *parent_flags = merged;
                    queue.push(QueueEntry { timestamp: self.timestamp(parent), oid: parent });
                }
            }
        }

        Ok(best)
    }
}

/// Thin wrapper turning any [`MergeBaseProvider`] into the `MergeResult`
/// the orchestrator expects, surfacing a missing merge base as
/// [`MergeError::NotFound`].
pub fn require_merge_base<P: MergeBaseProvider>(provider: &P, ours: Oid, theirs: Oid) -> MergeResult<Oid>
where
    P::Error: Into<anyhow::Error>,
{
    provider
        .merge_base(ours, theirs)
        .map_err(|e| MergeError::ObjectStore(e.into()))?
        .ok_or(MergeError::NotFound { ours, theirs })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(byte: u8) -> Oid {
        Oid::hash_bytes([byte])
    }

    #[test]
    fn straight_line_history_finds_common_ancestor() {
        let mut graph = CommitGraph::new();
        let root = oid(0);
        let a = oid(1);
        let b = oid(2);
        graph.add_commit(root, 0, smallvec![]);
        graph.add_commit(a, 10, smallvec![root]);
        graph.add_commit(b, 20, smallvec![root]);

        assert_eq!(graph.merge_base(a, b).unwrap(), Some(root));
    }

    #[test]
    fn identical_heads_are_their_own_base() {
        let mut graph = CommitGraph::new();
        let c = oid(5);
        graph.add_commit(c, 0, smallvec![]);
        assert_eq!(graph.merge_base(c, c).unwrap(), Some(c));
    }

    #[test]
    fn one_side_is_ancestor_of_the_other() {
        let mut graph = CommitGraph::new();
        let root = oid(0);
        let child = oid(1);
        graph.add_commit(root, 0, smallvec![]);
        graph.add_commit(child, 10, smallvec![root]);

        assert_eq!(graph.merge_base(root, child).unwrap(), Some(root));
    }

    #[test]
    fn disconnected_histories_have_no_base() {
        let mut graph = CommitGraph::new();
        let a = oid(1);
        let b = oid(2);
        graph.add_commit(a, 0, smallvec![]);
        graph.add_commit(b, 0, smallvec![]);

        assert_eq!(graph.merge_base(a, b).unwrap(), None);
    }

    #[test]
    fn require_merge_base_errors_when_missing() {
        let mut graph = CommitGraph::new();
        let a = oid(1);
        let b = oid(2);
        graph.add_commit(a, 0, smallvec![]);
        graph.add_commit(b, 0, smallvec![]);

        let err = require_merge_base(&graph, a, b).unwrap_err();
        assert!(matches!(err, MergeError::NotFound { .. }));
    }
}
