//! The conflict resolver (§4.4).
//!
//! Walks a [`crate::delta::DeltaList`] in path order and runs the
//! trivial → removed → automerge → mark-unresolved cascade against two
//! external collaborators: an object store (read/write blobs) and an index
//! store (stage resolved/conflicting entries and the REUC log), against the
//! abbreviated 14-case table this crate's spec calls out.
//!
//! The trivial-resolution bullets as given name no presence requirement on
//! the side chosen, which would let a deletion resolve silently (no REUC)
//! before "removed resolution" ever runs — contradicting the worked
//! examples (E3/E4 expect a REUC entry for a clean one-sided deletion).
//! Reading the bullets as implicitly requiring the chosen side to still be
//! *present* (i.e. "trivial" only covers modifications, never deletions)
//! resolves the conflict with the worked examples; see `DESIGN.md`.

use crate::delta::{Delta, DeltaList, DfConflict, Side, Status};
use crate::error::{MergeError, MergeResult};
use crate::mode::FileMode;
use crate::oid::Oid;
use crate::tree::TreeEntry;
use crate::xdiff3::{self, ConflictStyle, Favor};

bitflags::bitflags! {
    /// §6 "Resolve" option flags.
    pub struct ResolveOpts: u8 {
        const NO_REMOVED = 1 << 0;
        const NO_AUTOMERGE = 1 << 1;
        const FAVOR_OURS = 1 << 2;
        const FAVOR_THEIRS = 1 << 3;
    }
}

impl Default for ResolveOpts {
    fn default() -> Self {
        ResolveOpts::empty()
    }
}

impl ResolveOpts {
    fn favor(self) -> Favor {
        if self.contains(ResolveOpts::FAVOR_OURS) {
            Favor::Ours
        } else if self.contains(ResolveOpts::FAVOR_THEIRS) {
            Favor::Theirs
        } else {
            Favor::None
        }
    }
}

/// Index staging stage (§6): conflicting entries occupy 1/2/3, resolved
/// entries occupy 0. Named for what each stage holds rather than a bare
/// ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStage {
    Resolved = 0,
    Ancestor = 1,
    Ours = 2,
    Theirs = 3,
}

/// One row of the resolved-undo cache (§4.4.2). Absence on a side is
/// encoded as `mode = 0` and the zero OID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReucEntry {
    pub path: String,
    pub ancestor_mode: u32,
    pub ours_mode: u32,
    pub theirs_mode: u32,
    pub ancestor_oid: Oid,
    pub ours_oid: Oid,
    pub theirs_oid: Oid,
}

impl ReucEntry {
    fn build(path: &str, ancestor: Option<&TreeEntry>, ours: Option<&TreeEntry>, theirs: Option<&TreeEntry>) -> Self {
        fn parts(entry: Option<&TreeEntry>) -> (u32, Oid) {
            entry.map(|e| (e.mode.as_u32(), e.oid)).unwrap_or((0, Oid::ZERO))
        }
        let (ancestor_mode, ancestor_oid) = parts(ancestor);
        let (ours_mode, ours_oid) = parts(ours);
        let (theirs_mode, theirs_oid) = parts(theirs);
        Self {
            path: path.to_owned(),
            ancestor_mode,
            ours_mode,
            theirs_mode,
            ancestor_oid,
            ours_oid,
            theirs_oid,
        }
    }
}

/// External collaborator: blob storage, out of scope per §1; this is the
/// contract the resolver and worktree writer consume.
pub trait ObjectStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn read_blob(&self, oid: Oid) -> Result<Vec<u8>, Self::Error>;
    fn write_blob(&mut self, content: &[u8]) -> Result<Oid, Self::Error>;
}

/// External collaborator: the staged index. `remove` is a no-op (not an
/// error) when the path has no stage-0 entry.
pub trait IndexStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn upsert(&mut self, path: &str, mode: FileMode, oid: Oid, size: Option<u64>) -> Result<(), Self::Error>;
    fn remove(&mut self, path: &str) -> Result<(), Self::Error>;
    fn stage_conflict(&mut self, path: &str, stage: MergeStage, mode: FileMode, oid: Oid) -> Result<(), Self::Error>;
    fn add_reuc(&mut self, entry: ReucEntry) -> Result<(), Self::Error>;
}

/// A delta that reached the end of the cascade unresolved (§4.4 post-pass),
/// carried forward for the worktree writer (§4.5).
#[derive(Debug, Clone)]
pub struct UnresolvedConflict {
    pub path: String,
    pub ancestor: Option<TreeEntry>,
    pub ours: Option<TreeEntry>,
    pub theirs: Option<TreeEntry>,
    /// Whether the underlying delta was itself the shadowing entry of a
    /// directory/file conflict (§4.2 `DfConflict::DirectoryFile`), not
    /// merely a descendant (`Child`). The worktree writer (§4.5) rejects
    /// diff3 for these the same way the resolver does.
    pub df_conflict: bool,
}

enum Trivial<'d> {
    Ours(&'d TreeEntry),
    Theirs(&'d TreeEntry),
}

pub struct Resolver;

impl Resolver {
    pub fn run<O: ObjectStore, X: IndexStore>(
        deltas: &DeltaList,
        objects: &mut O,
        index: &mut X,
        opts: ResolveOpts,
        ours_name: &str,
        theirs_name: &str,
    ) -> MergeResult<Vec<UnresolvedConflict>> {
        debug!("Resolver::run(deltas: {}, opts: {:?})", deltas.len(), opts);
        let mut conflicts = Vec::new();
        for delta in deltas.iter() {
            let path = deltas.path(delta);
            let resolved = Self::resolve_one(path, delta, objects, index, opts, ours_name, theirs_name)?;
            if !resolved {
                conflicts.push(UnresolvedConflict {
                    path: path.to_owned(),
                    ancestor: delta.ancestor.clone(),
                    ours: delta.ours.entry.clone(),
                    theirs: delta.theirs.entry.clone(),
                    df_conflict: delta.df_conflict == DfConflict::DirectoryFile,
                });
            }
        }
        Ok(conflicts)
    }

    fn resolve_one<O: ObjectStore, X: IndexStore>(
        path: &str,
        delta: &Delta,
        objects: &mut O,
        index: &mut X,
        opts: ResolveOpts,
        ours_name: &str,
        theirs_name: &str,
    ) -> MergeResult<bool> {
        if delta.df_conflict == DfConflict::DirectoryFile {
            trace!("Resolver::resolve_one: `{}` directory/file conflict, unresolved", path);
            Self::mark_unresolved(path, delta, index)?;
            return Ok(false);
        }

        if let Some(trivial) = Self::trivial(delta) {
            let entry = match trivial {
                Trivial::Ours(e) => e,
                Trivial::Theirs(e) => e,
            };
            debug!("Resolver::resolve_one: `{}` trivially resolved", path);
            index.upsert(path, entry.mode, entry.oid, entry.size).map_err(MergeError::index)?;
            return Ok(true);
        }

        if !opts.contains(ResolveOpts::NO_REMOVED) && Self::removed(delta) {
            debug!("Resolver::resolve_one: `{}` resolved by removal", path);
            index.remove(path).map_err(MergeError::index)?;
            index
                .add_reuc(ReucEntry::build(
                    path,
                    delta.ancestor.as_ref(),
                    delta.ours.entry.as_ref(),
                    delta.theirs.entry.as_ref(),
                ))
                .map_err(MergeError::index)?;
            return Ok(true);
        }

        if !opts.contains(ResolveOpts::NO_AUTOMERGE) && Self::automerge_applicable(delta) {
            if let Some((mode, content)) = Self::try_automerge(delta, objects, opts, ours_name, theirs_name)? {
                debug!("Resolver::resolve_one: `{}` automerged", path);
                let oid = objects.write_blob(&content).map_err(MergeError::object_store)?;
                index.upsert(path, mode, oid, Some(content.len() as u64)).map_err(MergeError::index)?;
                index
                    .add_reuc(ReucEntry::build(
                        path,
                        delta.ancestor.as_ref(),
                        delta.ours.entry.as_ref(),
                        delta.theirs.entry.as_ref(),
                    ))
                    .map_err(MergeError::index)?;
                return Ok(true);
            }
        }

        info!("Resolver::resolve_one: `{}` left unresolved", path);
        Self::mark_unresolved(path, delta, index)?;
        Ok(false)
    }

    /// §4.4 step 1. See the module doc comment for the presence caveat.
    fn trivial(delta: &Delta) -> Option<Trivial<'_>> {
        let ours_changed = delta.ours.status != Status::Unmodified;
        let theirs_changed = delta.theirs.status != Status::Unmodified;
        let sides_equal = delta.ours.mode() == delta.theirs.mode() && delta.ours.oid() == delta.theirs.oid();
        let ours_theirs_differ = ours_changed && theirs_changed && !sides_equal;

        if let Some(entry) = &delta.ours.entry {
            if ours_changed && !ours_theirs_differ {
                return Some(Trivial::Ours(entry));
            }
        }
        if let Some(entry) = &delta.theirs.entry {
            if theirs_changed && !ours_changed {
                return Some(Trivial::Theirs(entry));
            }
        }
        None
    }

    /// §4.4 step 2.
    fn removed(delta: &Delta) -> bool {
        let ours_changed = delta.ours.status != Status::Unmodified;
        let theirs_changed = delta.theirs.status != Status::Unmodified;
        let ours_absent = !delta.ours.is_present();
        let theirs_absent = !delta.theirs.is_present();

        (ours_absent && theirs_absent && ours_changed)
            || (ours_absent && !theirs_changed)
            || (theirs_absent && !ours_changed)
    }

    /// §4.4 step 3 preconditions, minus the ODB read. The symlink/file
    /// mismatch check runs unconditionally, same as `worktree.rs`'s
    /// identical concern: an absent ancestor (a `BothAdded` delta) defaults
    /// to "not a symlink", it is never a reason to skip the check.
    fn automerge_applicable(delta: &Delta) -> bool {
        if !delta.ours.is_present() || !delta.theirs.is_present() {
            return false;
        }
        let anc_is_symlink = delta.ancestor.as_ref().map_or(false, |e| e.mode.is_symlink());
        if delta.ours.mode().map_or(false, |m| m.is_symlink() != anc_is_symlink) {
            return false;
        }
        if delta.theirs.mode().map_or(false, |m| m.is_symlink() != anc_is_symlink) {
            return false;
        }
        Self::best(delta).is_some()
    }

    fn best(delta: &Delta) -> Option<(FileMode, ())> {
        let ancestor_path = delta.ancestor.as_ref().map(|e| e.path.as_str());
        let best_path = xdiff3::best_path(ancestor_path, delta.ours.path()?, delta.theirs.path()?);
        let ancestor_mode = delta.ancestor.as_ref().map(|e| e.mode);
        let best_mode = xdiff3::best_mode(ancestor_mode, delta.ours.mode()?, delta.theirs.mode()?);
        best_path?;
        Some((best_mode?, ()))
    }

    fn try_automerge<O: ObjectStore>(
        delta: &Delta,
        objects: &mut O,
        opts: ResolveOpts,
        ours_name: &str,
        theirs_name: &str,
    ) -> MergeResult<Option<(FileMode, Vec<u8>)>> {
        let Some((mode, ())) = Self::best(delta) else { return Ok(None) };

        let ancestor_bytes = match &delta.ancestor {
            Some(e) => objects.read_blob(e.oid).map_err(MergeError::object_store)?,
            None => Vec::new(),
        };
        let ours_bytes = objects.read_blob(delta.ours.oid().expect("checked present")).map_err(MergeError::object_store)?;
        let theirs_bytes =
            objects.read_blob(delta.theirs.oid().expect("checked present")).map_err(MergeError::object_store)?;

        let outcome = xdiff3::merge(
            opts.favor(),
            ConflictStyle::Merge,
            ours_name,
            theirs_name,
            &ancestor_bytes,
            &ours_bytes,
            &theirs_bytes,
        );

        Ok(outcome.automergeable.then_some((mode, outcome.content)))
    }

    /// §4.4 step 4.
    fn mark_unresolved<X: IndexStore>(path: &str, delta: &Delta, index: &mut X) -> MergeResult<()> {
        index.remove(path).map_err(MergeError::index)?;
        if let Some(e) = &delta.ancestor {
            index.stage_conflict(path, MergeStage::Ancestor, e.mode, e.oid).map_err(MergeError::index)?;
        }
        if let Some(e) = &delta.ours.entry {
            index.stage_conflict(path, MergeStage::Ours, e.mode, e.oid).map_err(MergeError::index)?;
        }
        if let Some(e) = &delta.theirs.entry {
            index.stage_conflict(path, MergeStage::Theirs, e.mode, e.oid).map_err(MergeError::index)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::HashMap;
    use std::convert::Infallible;

    #[derive(Default)]
    pub struct InMemoryObjects {
        blobs: HashMap<Oid, Vec<u8>>,
    }

    impl InMemoryObjects {
        pub fn put(&mut self, content: &[u8]) -> Oid {
            let oid = Oid::hash_bytes(content);
            self.blobs.insert(oid, content.to_vec());
            oid
        }
    }

    impl ObjectStore for InMemoryObjects {
        type Error = Infallible;

        fn read_blob(&self, oid: Oid) -> Result<Vec<u8>, Self::Error> {
            Ok(self.blobs.get(&oid).cloned().unwrap_or_default())
        }

        fn write_blob(&mut self, content: &[u8]) -> Result<Oid, Self::Error> {
            Ok(self.put(content))
        }
    }

    #[derive(Default)]
    pub struct InMemoryIndex {
        pub resolved: HashMap<String, (FileMode, Oid, Option<u64>)>,
        pub conflicts: HashMap<String, [Option<(FileMode, Oid)>; 3]>,
        pub reuc: Vec<ReucEntry>,
    }

    impl IndexStore for InMemoryIndex {
        type Error = Infallible;

        fn upsert(&mut self, path: &str, mode: FileMode, oid: Oid, size: Option<u64>) -> Result<(), Self::Error> {
            self.conflicts.remove(path);
            self.resolved.insert(path.to_owned(), (mode, oid, size));
            Ok(())
        }

        fn remove(&mut self, path: &str) -> Result<(), Self::Error> {
            self.resolved.remove(path);
            Ok(())
        }

        fn stage_conflict(&mut self, path: &str, stage: MergeStage, mode: FileMode, oid: Oid) -> Result<(), Self::Error> {
            let slot = self.conflicts.entry(path.to_owned()).or_insert([None, None, None]);
            slot[stage as usize - 1] = Some((mode, oid));
            Ok(())
        }

        fn add_reuc(&mut self, entry: ReucEntry) -> Result<(), Self::Error> {
            self.reuc.push(entry);
            Ok(())
        }
    }
}
