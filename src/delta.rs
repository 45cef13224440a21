//! The three-way delta builder (§4.2).
//!
//! Wraps [`crate::walk::Walker`] with a callback that classifies each side
//! against the ancestor, derives the delta's `conflict` kind, and runs the
//! single linear directory/file shadowing scan: one pass over the walker's
//! emitted groups builds the whole output list.
//!
//! Three inconsistencies noted as open questions in §9 are corrected here
//! rather than reproduced (see `DESIGN.md`): per-side status is computed as
//! ancestor-vs-this-side (not a side compared against itself), and status
//! is a plain assignment per case rather than accumulated with `|=`.

use crate::arena::{PathArena, PathId};
use crate::mode::FileMode;
use crate::oid::Oid;
use crate::path::is_parent_path;
use crate::tree::{TreeEntry, TreeIterator};
use crate::walk::{Step, WalkOpts, Walker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Unmodified,
    Added,
    Deleted,
    TypeChange,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    None,
    BothAdded,
    BothModified,
    BothDeleted,
    ModifyDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfConflict {
    None,
    DirectoryFile,
    Child,
}

/// One side (ours or theirs) of a delta: the tree entry present there, if
/// any, and its status relative to the ancestor.
#[derive(Debug, Clone)]
pub struct Side {
    pub entry: Option<TreeEntry>,
    pub status: Status,
}

impl Side {
    pub fn is_present(&self) -> bool {
        self.entry.is_some()
    }

    pub fn mode(&self) -> Option<FileMode> {
        self.entry.as_ref().map(|e| e.mode)
    }

    pub fn oid(&self) -> Option<Oid> {
        self.entry.as_ref().map(|e| e.oid)
    }

    pub fn path(&self) -> Option<&str> {
        self.entry.as_ref().map(|e| e.path.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Delta {
    path: PathId,
    pub ancestor: Option<TreeEntry>,
    pub ours: Side,
    pub theirs: Side,
    pub conflict: Conflict,
    pub df_conflict: DfConflict,
}

impl Delta {
    pub fn is_unresolved_conflict(&self) -> bool {
        self.conflict != Conflict::None
    }
}

/// The output of the delta builder: an ordered sequence of deltas plus the
/// arena their paths are interned in. §9: the arena is owned by the list;
/// deltas reference it through a [`PathId`], never a raw pointer.
pub struct DeltaList {
    arena: PathArena,
    deltas: Vec<Delta>,
}

impl DeltaList {
    pub fn path(&self, delta: &Delta) -> &str {
        self.arena.resolve(delta.path)
    }

    pub fn deltas(&self) -> &[Delta] {
        &self.deltas
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Delta> {
        self.deltas.iter()
    }
}

fn nature(entry: &TreeEntry) -> (bool, bool) {
    (entry.mode.is_dir(), entry.mode.is_symlink())
}

/// Per-side status table (§4.2). Corrected per §9 open question #3: the
/// ancestor is compared against *this* side's entry, never against itself.
/// `pub(crate)`: `crate::octopus` reuses this for each theirs head.
pub(crate) fn classify_side(ancestor: Option<&TreeEntry>, side: Option<&TreeEntry>) -> Status {
    match (ancestor, side) {
        (None, None) => Status::Unmodified,
        (None, Some(_)) => Status::Added,
        (Some(_), None) => Status::Deleted,
        (Some(anc), Some(side)) =>
            if nature(anc) != nature(side) {
                Status::TypeChange
            } else if anc.mode == side.mode && anc.oid == side.oid {
                Status::Unmodified
            } else {
                // corrected per §9 open question #4: assignment, not `|=`
                Status::Modified
            },
    }
}

fn classify_conflict(ours: Status, theirs: Status) -> Conflict {
    use Status::*;
    match (ours, theirs) {
        (Added, Added) => Conflict::BothAdded,
        (Modified, Modified) => Conflict::BothModified,
        (Deleted, Deleted) => Conflict::BothDeleted,
        (Modified, Deleted) | (Deleted, Modified) => Conflict::ModifyDelete,
        _ => Conflict::None,
    }
}

pub struct DeltaBuilder;

impl DeltaBuilder {
    pub fn build<I: TreeIterator>(
        ancestor: I,
        ours: I,
        theirs: I,
        opts: WalkOpts,
    ) -> crate::error::MergeResult<DeltaList>
    where
        I::Error: Into<anyhow::Error>,
    {
        debug!("DeltaBuilder::build()");
        let walker = Walker::new(vec![ancestor, ours, theirs], opts)?;
        let mut arena = PathArena::new();
        let mut deltas: Vec<Delta> = Vec::new();

        // D/F scan state (§4.2): the open directory causing a shadowing
        // conflict, and the previous delta's path/added-or-modified flag.
        let mut df_path: Option<String> = None;
        let mut prev: Option<(String, bool)> = None;

        walker.for_each(|mut slots| {
            debug_assert_eq!(slots.len(), 3);
            let theirs = slots.pop().unwrap();
            let ours = slots.pop().unwrap();
            let ancestor = slots.pop().unwrap();

            let path = ancestor
                .as_ref()
                .or(ours.as_ref())
                .or(theirs.as_ref())
                .expect("at least one side present")
                .path
                .clone();

            let ours_status = classify_side(ancestor.as_ref(), ours.as_ref());
            let theirs_status = classify_side(ancestor.as_ref(), theirs.as_ref());
            let conflict = classify_conflict(ours_status, theirs_status);

            let mut df_conflict = DfConflict::None;
            match &df_path {
                Some(dp) if is_parent_path(dp, &path) => df_conflict = DfConflict::Child,
                _ => df_path = None,
            }

            let added_or_modified = matches!(ours_status, Status::Added | Status::Modified)
                || matches!(theirs_status, Status::Added | Status::Modified);

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

            trace!("DeltaBuilder::build: `{}` conflict: {:?} df_conflict: {:?}", path, conflict, df_conflict);
            let path_id = arena.intern(&path);
            deltas.push(Delta {
                path: path_id,
                ancestor,
                ours: Side { entry: ours, status: ours_status },
                theirs: Side { entry: theirs, status: theirs_status },
                conflict,
                df_conflict,
            });

            prev = Some((path, added_or_modified));
            Ok(Step::Continue)
        })?;

        Ok(DeltaList { arena, deltas })
    }
}
