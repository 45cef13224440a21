//! Orchestrator (§4.6): ties ref resolution, the walker, the resolver, and
//! the worktree writer together into one merge call.
//!
//! The overall sequencing is resolve heads → detect up-to-date/fast-forward
//! → diff → resolve → persist → checkout → materialize conflicts, using the
//! same ports-and-adapters split the rest of this crate already uses: every
//! collaborator §1 calls out of scope is a trait parameter here, not a
//! concrete type.

use crate::delta::DeltaBuilder;
use crate::error::{MergeError, MergeResult};
use crate::message::Head;
use crate::mergebase::{self, MergeBaseProvider};
use crate::octopus::{OctopusDeltaBuilder, OctopusResolver};
use crate::oid::Oid;
use crate::resolve::{IndexStore, ObjectStore, ResolveOpts, Resolver, UnresolvedConflict};
use crate::setup::{self, SetupFiles};
use crate::tree::TreeIterator;
use crate::walk::WalkOpts;
use crate::worktree::{WorktreeIo, WorktreeWriteError, WorktreeWriter, WriteOpts};

bitflags::bitflags! {
    /// §6 "Merge" option flags.
    pub struct MergeOpts: u8 {
        const NO_FASTFORWARD = 1 << 0;
    }
}

impl Default for MergeOpts {
    fn default() -> Self {
        MergeOpts::empty()
    }
}

/// One side of a merge: a resolved commit OID plus its branch name, if any
/// (used for display names and the message-format quirk).
#[derive(Debug, Clone)]
pub struct MergeHead {
    pub oid: Oid,
    pub branch: Option<String>,
}

impl MergeHead {
    pub fn name(&self) -> String {
        self.branch.clone().unwrap_or_else(|| self.oid.to_hex())
    }

    fn as_message_head(&self) -> Head {
        match &self.branch {
            Some(name) => Head::Branch(name.clone()),
            None => Head::Commit(self.oid),
        }
    }
}

/// §4.6: whether conflict resolution runs to completion, or the call is an
/// octopus (≥2 theirs heads) where resolution beyond the structural diff is
/// out of scope.
pub enum Strategy {
    Resolve(ResolveOpts),
    Octopus,
}

#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub is_uptodate: bool,
    pub is_fastforward: bool,
    pub ff_oid: Option<Oid>,
    pub delta_count: usize,
    pub conflicts: Vec<UnresolvedConflict>,
}

/// External collaborator: loads a commit's root tree and reports whether
/// the repository is bare.
pub trait TreeSource {
    type Error: std::error::Error + Send + Sync + 'static;
    type Iter: TreeIterator;

    fn is_bare(&self) -> bool;
    fn tree(&self, commit: Oid) -> Result<Self::Iter, Self::Error>;
}

/// External collaborator: flushes the staged index to storage.
pub trait IndexPersist {
    type Error: std::error::Error + Send + Sync + 'static;

    fn persist(&mut self) -> Result<(), Self::Error>;
}

/// External collaborator: materializes the persisted index to the
/// worktree.
pub trait Checkout {
    type Error: std::error::Error + Send + Sync + 'static;

    fn checkout(&mut self) -> Result<(), Self::Error>;
}

pub struct Orchestrator;

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn merge<T, O, X, W, S, M, C>(
        trees: &T,
        objects: &mut O,
        index: &mut X,
        worktree: &mut W,
        setup_files: &mut S,
        merge_base: &M,
        checkout: &mut C,
        ours: &MergeHead,
        theirs: &[MergeHead],
        strategy: Strategy,
        opts: MergeOpts,
    ) -> MergeResult<MergeOutcome>
    where
        T: TreeSource,
        T::Error: Into<anyhow::Error>,
        O: ObjectStore,
        O::Error: Into<anyhow::Error>,
        X: IndexStore + IndexPersist,
        <X as IndexStore>::Error: Into<anyhow::Error>,
        <X as IndexPersist>::Error: Into<anyhow::Error>,
        W: WorktreeIo,
        W::Error: Into<anyhow::Error>,
        S: SetupFiles,
        S::Error: Into<anyhow::Error>,
        M: MergeBaseProvider,
        M::Error: Into<anyhow::Error>,
        C: Checkout,
        C::Error: Into<anyhow::Error>,
    {
        debug!("Orchestrator::merge(ours: {}, theirs: {:?})", ours.oid, theirs.iter().map(|h| h.oid).collect::<Vec<_>>());
        if theirs.is_empty() {
            return Err(MergeError::invalid_input("merge requires at least one theirs head"));
        }
        if trees.is_bare() {
            return Err(MergeError::invalid_input("cannot merge into a bare repository"));
        }

        let resolve_opts = match strategy {
            Strategy::Resolve(opts) => opts,
            Strategy::Octopus => {
                if theirs.len() < 2 {
                    return Err(MergeError::invalid_input("octopus merge requires at least two theirs heads"));
                }
                return Self::merge_octopus(trees, index, setup_files, merge_base, checkout, ours, theirs, opts);
            }
        };

        let theirs_head = &theirs[0];

        if ours.oid == theirs_head.oid {
            info!("Orchestrator::merge: {} is already up to date with {}", ours.oid, theirs_head.oid);
            return Ok(MergeOutcome { is_uptodate: true, ..Default::default() });
        }

        let base_oid = mergebase::require_merge_base(merge_base, ours.oid, theirs_head.oid)?;

        if base_oid == ours.oid && !opts.contains(MergeOpts::NO_FASTFORWARD) {
            info!("Orchestrator::merge: fast-forwarding {} to {}", ours.oid, theirs_head.oid);
            return Ok(MergeOutcome {
                is_fastforward: true,
                ff_oid: Some(theirs_head.oid),
                ..Default::default()
            });
        }

        let message_heads: Vec<Head> = theirs.iter().map(MergeHead::as_message_head).collect();
        setup::write_all(
            setup_files,
            ours.oid,
            &theirs.iter().map(|h| h.oid).collect::<Vec<_>>(),
            &message_heads,
            opts.contains(MergeOpts::NO_FASTFORWARD),
        )
        .map_err(MergeError::object_store)?;

        let ancestor_tree = trees.tree(base_oid).map_err(MergeError::object_store)?;
        let ours_tree = trees.tree(ours.oid).map_err(MergeError::object_store)?;
        let theirs_tree = trees.tree(theirs_head.oid).map_err(MergeError::object_store)?;

        let deltas = DeltaBuilder::build(ancestor_tree, ours_tree, theirs_tree, WalkOpts::default())?;
        let delta_count = deltas.len();

        let ours_name = ours.name();
        let theirs_name = theirs_head.name();

        let conflicts = Resolver::run(&deltas, objects, index, resolve_opts, &ours_name, &theirs_name)?;
        info!("Orchestrator::merge: {} deltas, {} unresolved conflicts", delta_count, conflicts.len());

        index.persist().map_err(MergeError::index)?;
        checkout.checkout().map_err(MergeError::object_store)?;

        let write_opts = WriteOpts::default();
        for conflict in &conflicts {
            WorktreeWriter::write(conflict, objects, worktree, write_opts, &ours_name, &theirs_name).map_err(
                |e| match e {
                    WorktreeWriteError::ObjectStore(e) => MergeError::object_store(e),
                    WorktreeWriteError::Worktree(e) => {
                        MergeError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.into()))
                    }
                },
            )?;
        }

        Ok(MergeOutcome { delta_count, conflicts, ..Default::default() })
    }

    /// §4.6 octopus path: structural n-way diff against every theirs head
    /// plus trivial-only resolution. Up-to-date and fast-forward are
    /// two-head-only concepts (§4.6) and do not apply here; an octopus
    /// call always runs the full diff.
    ///
    /// `MergeBaseProvider` is pairwise, so the single ancestor this walks
    /// against is obtained by folding `merge_base` across ours and every
    /// theirs head in turn (`base = merge_base(base, next_head)`), not by
    /// the recursive multi-ancestor algorithm this crate's spec excludes —
    /// see `DESIGN.md`.
    #[allow(clippy::too_many_arguments)]
    fn merge_octopus<T, X, S, M, C>(
        trees: &T,
        index: &mut X,
        setup_files: &mut S,
        merge_base: &M,
        checkout: &mut C,
        ours: &MergeHead,
        theirs: &[MergeHead],
        opts: MergeOpts,
    ) -> MergeResult<MergeOutcome>
    where
        T: TreeSource,
        T::Error: Into<anyhow::Error>,
        X: IndexStore + IndexPersist,
        <X as IndexStore>::Error: Into<anyhow::Error>,
        <X as IndexPersist>::Error: Into<anyhow::Error>,
        S: SetupFiles,
        S::Error: Into<anyhow::Error>,
        M: MergeBaseProvider,
        M::Error: Into<anyhow::Error>,
        C: Checkout,
        C::Error: Into<anyhow::Error>,
    {
        debug!("Orchestrator::merge_octopus(ours: {}, theirs: {:?})", ours.oid, theirs.iter().map(|h| h.oid).collect::<Vec<_>>());

        let mut base_oid = mergebase::require_merge_base(merge_base, ours.oid, theirs[0].oid)?;
        for head in &theirs[1..] {
            base_oid = mergebase::require_merge_base(merge_base, base_oid, head.oid)?;
        }

        let message_heads: Vec<Head> = theirs.iter().map(MergeHead::as_message_head).collect();
        setup::write_all(
            setup_files,
            ours.oid,
            &theirs.iter().map(|h| h.oid).collect::<Vec<_>>(),
            &message_heads,
            opts.contains(MergeOpts::NO_FASTFORWARD),
        )
        .map_err(MergeError::object_store)?;

        let ancestor_tree = trees.tree(base_oid).map_err(MergeError::object_store)?;
        let ours_tree = trees.tree(ours.oid).map_err(MergeError::object_store)?;
        let theirs_trees = theirs
            .iter()
            .map(|h| trees.tree(h.oid))
            .collect::<Result<Vec<_>, _>>()
            .map_err(MergeError::object_store)?;

        let deltas = OctopusDeltaBuilder::build(ancestor_tree, ours_tree, theirs_trees, WalkOpts::default())?;
        let delta_count = deltas.len();

        let ours_name = ours.name();
        let resolved = OctopusResolver::run(&deltas, index, &ours_name)?;
        info!("Orchestrator::merge_octopus: {} deltas, {} trivially resolved", delta_count, resolved);

        index.persist().map_err(MergeError::index)?;
        checkout.checkout().map_err(MergeError::object_store)?;

        Ok(MergeOutcome { delta_count, ..Default::default() })
    }
}
