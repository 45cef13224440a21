//! Tree entries and the tree-iteration seam.
//!
//! Tree iteration is an external collaborator: something yields `(path,
//! mode, oid, size)` entries in a stable path order, and `TreeIterator` is
//! the contract that states it rather than implements it. Narrowed to just
//! what the n-way walker needs: pull entries one at a time in canonical
//! order, and be able to skip over a subtree when the caller already knows
//! it is identical on every side.

use crate::mode::FileMode;
use crate::oid::Oid;

/// One entry of a tree, as yielded by a [`TreeIterator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub mode: FileMode,
    pub oid: Oid,
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn new(path: impl Into<String>, mode: FileMode, oid: Oid, size: Option<u64>) -> Self {
        Self { path: path.into(), mode, oid, size }
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }
}

/// External collaborator: yields the flattened entries of a single tree in
/// the canonical path order of [`crate::path::path_cmp_explicit`]. The
/// walker (§4.1) does not recurse into subtrees itself — whatever sits
/// behind this trait is expected to have already flattened the tree (or to
/// flatten lazily, entry by entry, as `next` is called) so that `(path,
/// mode, oid, size)` tuples for every blob and every directory placeholder
/// come out in one monotonically increasing stream.
pub trait TreeIterator {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the next entry in canonical path order, or `None` when the
    /// tree is exhausted.
    fn next(&mut self) -> Result<Option<TreeEntry>, Self::Error>;

    /// Called by the walker when it has determined this iterator's current
    /// entry is a directory identical on every side: skip past the whole
    /// subtree without descending into it. The default implementation just
    /// calls `next`, i.e. "no shortcut available" — callers that can do
    /// better (e.g. by comparing OIDs and not recursing) should override.
    fn over(&mut self) -> Result<Option<TreeEntry>, Self::Error> {
        self.next()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::convert::Infallible;

    /// An in-memory [`TreeIterator`] over a pre-flattened, pre-sorted list
    /// of entries — used throughout the unit tests in `walk`/`delta` so
    /// they don't need a real object store.
    pub struct VecTreeIterator {
        entries: std::vec::IntoIter<TreeEntry>,
    }

    impl VecTreeIterator {
        pub fn new(mut entries: Vec<TreeEntry>) -> Self {
            entries.sort_by(|a, b| {
                crate::path::path_cmp_explicit(&a.path, a.is_dir(), &b.path, b.is_dir())
            });
            Self { entries: entries.into_iter() }
        }
    }

    impl TreeIterator for VecTreeIterator {
        type Error = Infallible;

        fn next(&mut self) -> Result<Option<TreeEntry>, Self::Error> {
            Ok(self.entries.next())
        }
    }
}
