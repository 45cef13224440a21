//! The n-way lock-step tree walker (§4.1).
//!
//! Primes one iterator per tree, repeatedly picks the lexicographically
//! smallest present head under the canonical comparator, gathers every
//! iterator currently sitting on that path into a slot group, decides
//! whether the group looks modified, and advances (or skips past, via
//! `over`) whichever iterators contributed to the group. Implements
//! `fallible_iterator::FallibleIterator` directly rather than exposing its
//! own callback-driving method: `next` yields one slot group at a time, and
//! `for_each` is the trait's own combinator, adapted to the
//! `Step::{Continue,Abort}` callback contract this crate's walker exposes.
//!
//! `N` is a genuine run-time parameter, not merely "three trees spelled
//! generically": the three-way case (`crate::delta`) and the octopus case
//! (`crate::octopus`, ancestor + ours + however many theirs heads the
//! caller passed) both drive the same walker over a `Vec<I>` whose length
//! isn't known until the merge call is made.

use crate::error::{MergeError, MergeResult};
use crate::path::path_cmp_explicit;
use crate::tree::{TreeEntry, TreeIterator};
use fallible_iterator::FallibleIterator;
use std::cmp::Ordering;

bitflags::bitflags! {
    /// §6 "Walker" option flags.
    pub struct WalkOpts: u8 {
        /// Emit slot groups even when every present side is identical.
        const RETURN_UNMODIFIED = 1 << 0;
    }
}

impl Default for WalkOpts {
    fn default() -> Self {
        WalkOpts::empty()
    }
}

/// What a walker callback asks for after handling one slot group.
pub enum Step {
    Continue,
    Abort,
}

/// Drives `N` [`TreeIterator`]s in lock-step, in the canonical path order.
/// Each emitted slot group has exactly `iters.len()` entries, in the same
/// order the iterators were supplied in.
pub struct Walker<I: TreeIterator> {
    iters: Vec<I>,
    heads: Vec<Option<TreeEntry>>,
    opts: WalkOpts,
}

impl<I: TreeIterator> Walker<I>
where
    I::Error: Into<anyhow::Error>,
{
    pub fn new(mut iters: Vec<I>, opts: WalkOpts) -> MergeResult<Self> {
        assert!(iters.len() >= 2, "n-way walker requires at least two trees");
        debug!("Walker::new(n: {}, opts: {:?})", iters.len(), opts);
        let mut heads = Vec::with_capacity(iters.len());
        for iter in iters.iter_mut() {
            heads.push(iter.next().map_err(|e| MergeError::ObjectStore(e.into()))?);
        }
        Ok(Self { iters, heads, opts })
    }

    fn best_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, head) in self.heads.iter().enumerate() {
            let Some(entry) = head else { continue };
            best = Some(match best {
                None => i,
                Some(b) => {
                    let cur = self.heads[b].as_ref().unwrap();
                    match path_cmp_explicit(&entry.path, entry.is_dir(), &cur.path, cur.is_dir()) {
                        Ordering::Less => i,
                        _ => b,
                    }
                }
            });
        }
        best
    }

    /// Runs `f` on every emitted slot group until the walker is exhausted,
    /// `f` asks to abort, or an iterator errors. A thin adapter over
    /// [`FallibleIterator::for_each`].
    pub fn for_each<F>(self, mut f: F) -> MergeResult<()>
    where
        F: FnMut(Vec<Option<TreeEntry>>) -> MergeResult<Step>,
    {
        FallibleIterator::for_each(self, move |slots| match f(slots)? {
            Step::Continue => Ok(()),
            Step::Abort => Err(MergeError::UserAborted),
        })
    }
}

impl<I: TreeIterator> FallibleIterator for Walker<I>
where
    I::Error: Into<anyhow::Error>,
{
    type Item = Vec<Option<TreeEntry>>;
    type Error = MergeError;

    fn next(&mut self) -> MergeResult<Option<Self::Item>> {
        let n = self.heads.len();
        while let Some(best_idx) = self.best_index() {
            let best = self.heads[best_idx].clone().unwrap();

            let mut matched = vec![false; n];
            for i in 0..n {
                if let Some(entry) = &self.heads[i] {
                    if path_cmp_explicit(&entry.path, entry.is_dir(), &best.path, best.is_dir())
                        == Ordering::Equal
                    {
                        matched[i] = true;
                    }
                }
            }

            let present_count = matched.iter().filter(|&&m| m).count();
            let present: Vec<&TreeEntry> =
                (0..n).filter(|&i| matched[i]).map(|i| self.heads[i].as_ref().unwrap()).collect();
            let all_trees = present.iter().all(|e| e.mode.is_tree());

            // a directory placeholder is never itself "modified": a
            // differing subtree is discovered by recursing into it, not by
            // comparing its oid at this level. non-tree entries still
            // compare mode and oid directly.
            let modified = present_count < n
                || (!all_trees && {
                    let first = present[0];
                    present[1..].iter().any(|e| e.mode != first.mode || e.oid != first.oid)
                });

            // trees identical on every present side are placeholders that
            // recurse separately; let the iterator skip the whole subtree
            // instead of stepping onto its first child. trees present
            // everywhere but differing in oid must still be descended into.
            let is_same_tree = present_count == n && all_trees && best.mode.is_tree() && {
                let first_oid = present[0].oid;
                present[1..].iter().all(|e| e.oid == first_oid)
            };

            let emit = modified || self.opts.contains(WalkOpts::RETURN_UNMODIFIED);
            let slots: Option<Vec<Option<TreeEntry>>> = emit.then(|| {
                (0..n).map(|i| if matched[i] { self.heads[i].clone() } else { None }).collect()
            });

            for i in 0..n {
                if matched[i] {
                    self.heads[i] = if is_same_tree {
                        self.iters[i].over()
                    } else {
                        self.iters[i].next()
                    }
                    .map_err(|e| MergeError::ObjectStore(e.into()))?;
                }
            }

            if let Some(slots) = slots {
                trace!("Walker::next: emit `{}` (modified: {})", best.path, modified);
                return Ok(Some(slots));
            }
        }
        Ok(None)
    }
}
