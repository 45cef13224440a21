//! Octopus (n-way, ≥2 theirs heads) structural diff and trivial resolution
//! (§4.6).
//!
//! Generalizes [`crate::delta::DeltaBuilder`] and the trivial-resolution
//! bullet of [`crate::resolve::Resolver`] from "one ours side, one theirs
//! side" to "one ours side, `K` theirs sides", reusing
//! [`crate::delta::classify_side`] and the same D/F shadowing scan
//! unmodified. What it does not generalize is automerge or
//! mark-unresolved: per this crate's spec, octopus conflict resolution
//! beyond trivial is out of scope, so a delta that needs more than that
//! is reported as [`crate::error::MergeError::Unimplemented`] rather than
//! staged or automerged.

use crate::arena::{PathArena, PathId};
use crate::delta::{classify_side, DfConflict, Side, Status};
use crate::error::{MergeError, MergeResult};
use crate::mode::FileMode;
use crate::oid::Oid;
use crate::path::is_parent_path;
use crate::resolve::{IndexStore, ReucEntry};
use crate::tree::{TreeEntry, TreeIterator};
use crate::walk::{Step, WalkOpts, Walker};

/// One path's delta across the ancestor, ours, and every theirs head.
#[derive(Debug, Clone)]
pub struct OctopusDelta {
    path: PathId,
    pub ancestor: Option<TreeEntry>,
    pub ours: Side,
    pub theirs: Vec<Side>,
    pub df_conflict: DfConflict,
}

/// Mirrors [`crate::delta::DeltaList`], widened to `K` theirs sides.
pub struct OctopusDeltaList {
    arena: PathArena,
    deltas: Vec<OctopusDelta>,
}

impl OctopusDeltaList {
    pub fn path(&self, delta: &OctopusDelta) -> &str {
        self.arena.resolve(delta.path)
    }

    pub fn deltas(&self) -> &[OctopusDelta] {
        &self.deltas
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

pub struct OctopusDeltaBuilder;

impl OctopusDeltaBuilder {
    pub fn build<I: TreeIterator>(
        ancestor: I,
        ours: I,
        theirs: Vec<I>,
        opts: WalkOpts,
    ) -> MergeResult<OctopusDeltaList>
    where
        I::Error: Into<anyhow::Error>,
    {
        debug!("OctopusDeltaBuilder::build(theirs: {})", theirs.len());
        let theirs_count = theirs.len();
        let mut iters = Vec::with_capacity(2 + theirs_count);
        iters.push(ancestor);
        iters.push(ours);
        iters.extend(theirs);
        let walker = Walker::new(iters, opts)?;

        let mut arena = PathArena::new();
        let mut deltas: Vec<OctopusDelta> = Vec::new();

        let mut df_path: Option<String> = None;
        let mut prev: Option<(String, bool)> = None;

        walker.for_each(|slots| {
            debug_assert_eq!(slots.len(), 2 + theirs_count);
            let mut slots = slots.into_iter();
            let ancestor = slots.next().unwrap();
            let ours = slots.next().unwrap();
            let theirs: Vec<Option<TreeEntry>> = slots.collect();

            let path = ancestor
                .as_ref()
                .or(ours.as_ref())
                .or_else(|| theirs.iter().flatten().next())
                .expect("at least one side present")
                .path
                .clone();

            let ours_status = classify_side(ancestor.as_ref(), ours.as_ref());
            let theirs_status: Vec<Status> =
                theirs.iter().map(|t| classify_side(ancestor.as_ref(), t.as_ref())).collect();

            let mut df_conflict = DfConflict::None;
            match &df_path {
                Some(dp) if is_parent_path(dp, &path) => df_conflict = DfConflict::Child,
                _ => df_path = None,
            }

            let added_or_modified = matches!(ours_status, Status::Added | Status::Modified)
                || theirs_status.iter().any(|s| matches!(s, Status::Added | Status::Modified));

            if let Some((prev_path, prev_added_or_modified)) = &prev {
                if *prev_added_or_modified && added_or_modified && is_parent_path(prev_path, &path)
                {
                    df_conflict = DfConflict::Child;
                    if let Some(last) = deltas.last_mut() {
                        last.df_conflict = DfConflict::DirectoryFile;
                    }
                    df_path = Some(prev_path.clone());
                }
            }

            trace!("OctopusDeltaBuilder::build: `{}` df_conflict: {:?}", path, df_conflict);
            let path_id = arena.intern(&path);
            deltas.push(OctopusDelta {
                path: path_id,
                ancestor,
                ours: Side { entry: ours, status: ours_status },
                theirs: theirs
                    .into_iter()
                    .zip(theirs_status)
                    .map(|(entry, status)| Side { entry, status })
                    .collect(),
                df_conflict,
            });

            prev = Some((path, added_or_modified));
            Ok(Step::Continue)
        })?;

        Ok(OctopusDeltaList { arena, deltas })
    }
}

/// A changed side's resolved value: `None` means the side deleted the
/// path relative to the ancestor.
type Resolved = Option<(FileMode, Oid, Option<u64>)>;

fn resolved_value(entry: Option<&TreeEntry>) -> Resolved {
    entry.map(|e| (e.mode, e.oid, e.size))
}

pub struct OctopusResolver;

impl OctopusResolver {
    /// Trivial-only resolution (§4.6): a delta resolves without automerge
    /// either when exactly one side changed relative to the ancestor, or
    /// when every side that changed agrees on the same resulting value.
    /// Anything else, plus any directory/file shadowing conflict, makes
    /// the whole merge call report [`MergeError::Unimplemented`] naming
    /// every such path, the same way a real octopus merge bails rather
    /// than leaving the index half-staged across more than three stages.
    pub fn run<X: IndexStore>(deltas: &OctopusDeltaList, index: &mut X, ours_name: &str) -> MergeResult<usize> {
        debug!("OctopusResolver::run(deltas: {})", deltas.len());
        let mut resolved_count = 0;
        let mut unresolved: Vec<String> = Vec::new();

        for delta in deltas.deltas() {
            let path = deltas.path(delta);

            if delta.df_conflict == DfConflict::DirectoryFile {
                trace!("OctopusResolver::run: `{}` directory/file conflict", path);
                unresolved.push(path.to_owned());
                continue;
            }

            let mut changed: Vec<Resolved> = Vec::new();
            if delta.ours.status != Status::Unmodified {
                changed.push(resolved_value(delta.ours.entry.as_ref()));
            }
            for side in &delta.theirs {
                if side.status != Status::Unmodified {
                    changed.push(resolved_value(side.entry.as_ref()));
                }
            }

            let value = match changed.as_slice() {
                [] => continue,
                [only] => *only,
                [first, rest @ ..] if rest.iter().all(|v| v == first) => *first,
                _ => {
                    trace!("OctopusResolver::run: `{}` disagreeing sides, unresolved", path);
                    unresolved.push(path.to_owned());
                    continue;
                }
            };

            match value {
                Some((mode, oid, size)) => index.upsert(path, mode, oid, size).map_err(MergeError::index)?,
                None => {
                    index.remove(path).map_err(MergeError::index)?;
                    let (ancestor_mode, ancestor_oid) = delta
                        .ancestor
                        .as_ref()
                        .map(|e| (e.mode.as_u32(), e.oid))
                        .unwrap_or((0, Oid::ZERO));
                    let (ours_mode, ours_oid) = delta
                        .ours
                        .entry
                        .as_ref()
                        .map(|e| (e.mode.as_u32(), e.oid))
                        .unwrap_or((0, Oid::ZERO));
                    index
                        .add_reuc(ReucEntry {
                            path: path.to_owned(),
                            ancestor_mode,
                            ours_mode,
                            // an octopus deletion agreed across every
                            // theirs head (otherwise it would not have
                            // reached this branch), so the REUC row has no
                            // single "theirs" side to record.
                            theirs_mode: 0,
                            ancestor_oid,
                            ours_oid,
                            theirs_oid: Oid::ZERO,
                        })
                        .map_err(MergeError::index)?;
                }
            }
            resolved_count += 1;
        }

        if !unresolved.is_empty() {
            info!("OctopusResolver::run: {} path(s) need resolution beyond trivial", unresolved.len());
            return Err(MergeError::Unimplemented(format!(
                "octopus conflict resolution beyond trivial for {}'s merge at: {}",
                ours_name,
                unresolved.join(", ")
            )));
        }

        Ok(resolved_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::test_support::InMemoryIndex;
    use crate::tree::test_support::VecTreeIterator;

    fn entry(path: &str, mode: FileMode, byte: u8) -> TreeEntry {
        TreeEntry::new(path, mode, Oid::hash_bytes([byte]), Some(1))
    }

    #[test]
    fn single_side_changed_resolves_trivially() {
        let base = vec![entry("f", FileMode::Regular, 1)];
        let ours = vec![entry("f", FileMode::Regular, 2)];
        let theirs = vec![vec![entry("f", FileMode::Regular, 1)], vec![entry("f", FileMode::Regular, 1)]];

        let deltas = OctopusDeltaBuilder::build(
            VecTreeIterator::new(base),
            VecTreeIterator::new(ours),
            theirs.into_iter().map(VecTreeIterator::new).collect(),
            WalkOpts::default(),
        )
        .unwrap();

        assert_eq!(deltas.len(), 1);
        let mut index = InMemoryIndex::default();
        let resolved = OctopusResolver::run(&deltas, &mut index, "HEAD").unwrap();
        assert_eq!(resolved, 1);
        let (_, oid, _) = index.resolved["f"];
        assert_eq!(oid, Oid::hash_bytes([2]));
    }

    #[test]
    fn all_changed_sides_agreeing_resolves_trivially() {
        let base = vec![entry("f", FileMode::Regular, 1)];
        let ours = vec![entry("f", FileMode::Regular, 1)]; // unmodified
        let theirs = vec![vec![entry("f", FileMode::Regular, 2)], vec![entry("f", FileMode::Regular, 2)]];

        let deltas = OctopusDeltaBuilder::build(
            VecTreeIterator::new(base),
            VecTreeIterator::new(ours),
            theirs.into_iter().map(VecTreeIterator::new).collect(),
            WalkOpts::default(),
        )
        .unwrap();

        let mut index = InMemoryIndex::default();
        let resolved = OctopusResolver::run(&deltas, &mut index, "HEAD").unwrap();
        assert_eq!(resolved, 1);
        let (_, oid, _) = index.resolved["f"];
        assert_eq!(oid, Oid::hash_bytes([2]));
    }

    #[test]
    fn disagreeing_changed_sides_is_unimplemented() {
        let base = vec![entry("f", FileMode::Regular, 1)];
        let ours = vec![entry("f", FileMode::Regular, 2)];
        let theirs = vec![vec![entry("f", FileMode::Regular, 3)], vec![entry("f", FileMode::Regular, 1)]];

        let deltas = OctopusDeltaBuilder::build(
            VecTreeIterator::new(base),
            VecTreeIterator::new(ours),
            theirs.into_iter().map(VecTreeIterator::new).collect(),
            WalkOpts::default(),
        )
        .unwrap();

        let mut index = InMemoryIndex::default();
        let err = OctopusResolver::run(&deltas, &mut index, "HEAD").unwrap_err();
        assert!(matches!(err, MergeError::Unimplemented(msg) if msg.contains('f')));
    }

    #[test]
    fn directory_file_conflict_is_unimplemented_without_touching_the_index() {
        let base: Vec<TreeEntry> = vec![];
        let ours = vec![entry("dir", FileMode::Regular, 1)];
        let theirs = vec![vec![entry("dir/child.txt", FileMode::Regular, 2)]];

        let deltas = OctopusDeltaBuilder::build(
            VecTreeIterator::new(base),
            VecTreeIterator::new(ours),
            theirs.into_iter().map(VecTreeIterator::new).collect(),
            WalkOpts::default(),
        )
        .unwrap();

        assert_eq!(deltas.len(), 2);
        let mut index = InMemoryIndex::default();
        let err = OctopusResolver::run(&deltas, &mut index, "HEAD").unwrap_err();
        assert!(matches!(err, MergeError::Unimplemented(_)));
        assert!(index.resolved.is_empty());
    }

    #[test]
    fn three_theirs_heads_all_untouched_resolves_to_ours() {
        let base = vec![entry("f", FileMode::Regular, 1)];
        let ours = vec![entry("f", FileMode::Regular, 9)];
        let theirs = vec![
            vec![entry("f", FileMode::Regular, 1)],
            vec![entry("f", FileMode::Regular, 1)],
            vec![entry("f", FileMode::Regular, 1)],
        ];

        let deltas = OctopusDeltaBuilder::build(
            VecTreeIterator::new(base),
            VecTreeIterator::new(ours),
            theirs.into_iter().map(VecTreeIterator::new).collect(),
            WalkOpts::default(),
        )
        .unwrap();

        let mut index = InMemoryIndex::default();
        let resolved = OctopusResolver::run(&deltas, &mut index, "HEAD").unwrap();
        assert_eq!(resolved, 1);
        let (_, oid, _) = index.resolved["f"];
        assert_eq!(oid, Oid::hash_bytes([9]));
    }
}
