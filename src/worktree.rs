//! The worktree conflict writer (§4.5).
//!
//! For each delta the resolver left unresolved, either writes a diff3
//! conflict file at the entry's own path, or falls back to `<path>~<name>`
//! side files (`~<branch-or-oid>`, ancestor never materialized).
//!
//! `write` only materializes side files when the diff3 attempt did not
//! produce output — the two are mutually exclusive outcomes for a given
//! conflict, never both.

use crate::mode::FileMode;
use crate::oid::Oid;
use crate::resolve::{ObjectStore, UnresolvedConflict};
use crate::xdiff3::{self, ConflictStyle};

bitflags::bitflags! {
    /// §6 "Conflict materialization" option flags.
    pub struct WriteOpts: u8 {
        /// Skip the diff3 attempt and go straight to side files.
        const NO_DIFF3 = 1 << 0;
    }
}

impl Default for WriteOpts {
    fn default() -> Self {
        WriteOpts::empty()
    }
}

/// External collaborator: the worktree, out of scope per §1; this is the
/// contract the writer consumes. `write_file` must behave as
/// exclusive-create-truncate (§6).
pub trait WorktreeIo {
    type Error: std::error::Error + Send + Sync + 'static;

    fn write_file(&mut self, path: &str, content: &[u8], mode: FileMode) -> Result<(), Self::Error>;
}

pub struct WorktreeWriter;

impl WorktreeWriter {
    /// Writes one unresolved conflict. `head_name`/`theirs_name` label the
    /// diff3 markers and the side-file suffixes; `theirs_oid_hex` is the
    /// fallback label when `theirs_name` has no branch (§6: "`<name>` is the
    /// branch name, else the 40-hex OID of the head").
    pub fn write<O: ObjectStore, W: WorktreeIo>(
        conflict: &UnresolvedConflict,
        objects: &O,
        worktree: &mut W,
        opts: WriteOpts,
        ours_name: &str,
        theirs_name: &str,
    ) -> Result<(), WorktreeWriteError<O::Error, W::Error>> {
        trace!("WorktreeWriter::write(`{}`)", conflict.path);

        let mut conflict_written = false;

        if !opts.contains(WriteOpts::NO_DIFF3) && !conflict.df_conflict {
            if let (Some(ours), Some(theirs)) = (&conflict.ours, &conflict.theirs) {
                // §4.3/§4.4: reject link/file conflicts by comparing each
                // side against the ancestor, not ours against theirs directly
                // (two sides that both turned a regular file into a symlink
                // are not a clash).
                let anc_is_symlink = conflict.ancestor.as_ref().map_or(false, |e| e.mode.is_symlink());
                let symlink_clash =
                    ours.mode.is_symlink() != anc_is_symlink || theirs.mode.is_symlink() != anc_is_symlink;
                let ancestor_path = conflict.ancestor.as_ref().map(|e| e.path.as_str());
                let best_path = xdiff3::best_path(ancestor_path, &ours.path, &theirs.path);
                let ancestor_mode = conflict.ancestor.as_ref().map(|e| e.mode);
                let best_mode = xdiff3::best_mode(ancestor_mode, ours.mode, theirs.mode);

                if !symlink_clash {
                    if let (Some(path), Some(mode)) = (best_path, best_mode) {
                        let ancestor_bytes = match &conflict.ancestor {
                            Some(e) => objects.read_blob(e.oid).map_err(WorktreeWriteError::ObjectStore)?,
                            None => Vec::new(),
                        };
                        let ours_bytes = objects.read_blob(ours.oid).map_err(WorktreeWriteError::ObjectStore)?;
                        let theirs_bytes = objects.read_blob(theirs.oid).map_err(WorktreeWriteError::ObjectStore)?;

                        let outcome = xdiff3::merge(
                            xdiff3::Favor::None,
                            ConflictStyle::Merge,
                            ours_name,
                            theirs_name,
                            &ancestor_bytes,
                            &ours_bytes,
                            &theirs_bytes,
                        );

                        worktree
                            .write_file(path, &outcome.content, mode)
                            .map_err(WorktreeWriteError::Worktree)?;
                        conflict_written = true;
                    }
                }
            }
        }

        if !conflict_written {
            debug!("WorktreeWriter::write: `{}` falling back to side files", conflict.path);
            for (entry, name) in [(&conflict.ours, ours_name), (&conflict.theirs, theirs_name)] {
                if let Some(entry) = entry {
                    let content = objects.read_blob(entry.oid).map_err(WorktreeWriteError::ObjectStore)?;
                    let side_path = format!("{}~{}", conflict.path, name);
                    worktree.write_file(&side_path, &content, entry.mode).map_err(WorktreeWriteError::Worktree)?;
                }
            }
        }

        Ok(())
    }

    /// The 40-hex OID fallback for a head with no branch name (§6).
    pub fn head_label(branch: Option<&str>, oid: Oid) -> String {
        branch.map(str::to_owned).unwrap_or_else(|| oid.to_hex())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorktreeWriteError<O, W> {
    #[error("object store error")]
    ObjectStore(O),
    #[error("worktree i/o error")]
    Worktree(W),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::test_support::InMemoryObjects;
    use crate::tree::TreeEntry;
    use std::collections::HashMap;
    use std::convert::Infallible;

    #[derive(Default)]
    struct InMemoryWorktree {
        files: HashMap<String, (Vec<u8>, FileMode)>,
    }

    impl WorktreeIo for InMemoryWorktree {
        type Error = Infallible;

        fn write_file(&mut self, path: &str, content: &[u8], mode: FileMode) -> Result<(), Self::Error> {
            self.files.insert(path.to_owned(), (content.to_vec(), mode));
            Ok(())
        }
    }

    fn blob_entry(path: &str, objects: &mut InMemoryObjects, content: &[u8]) -> TreeEntry {
        TreeEntry::new(path, FileMode::Regular, objects.put(content), Some(content.len() as u64))
    }

    #[test]
    fn e2_writes_diff3_markers_at_the_entrys_own_path() {
        let mut objects = InMemoryObjects::default();
        let ancestor = blob_entry("conflicting.txt", &mut objects, b"one\n");
        let ours = blob_entry("conflicting.txt", &mut objects, b"ours\n");
        let theirs = blob_entry("conflicting.txt", &mut objects, b"theirs\n");

        let conflict = UnresolvedConflict {
            path: "conflicting.txt".to_owned(),
            ancestor: Some(ancestor),
            ours: Some(ours),
            theirs: Some(theirs),
            df_conflict: false,
        };

        let mut worktree = InMemoryWorktree::default();
        WorktreeWriter::write(&conflict, &objects, &mut worktree, WriteOpts::default(), "HEAD", "theirs").unwrap();

        let (content, _) = &worktree.files["conflicting.txt"];
        let text = String::from_utf8(content.clone()).unwrap();
        assert!(text.contains("<<<<<<< HEAD"));
        assert!(text.contains(">>>>>>> theirs"));
        assert!(!worktree.files.contains_key("conflicting.txt~HEAD"));
    }

    #[test]
    fn e6_no_diff3_falls_back_to_side_files() {
        let mut objects = InMemoryObjects::default();
        let ancestor = blob_entry("conflicting.txt", &mut objects, b"one\n");
        let ours = blob_entry("conflicting.txt", &mut objects, b"ours\n");
        let theirs = blob_entry("conflicting.txt", &mut objects, b"theirs\n");

        let conflict = UnresolvedConflict {
            path: "conflicting.txt".to_owned(),
            ancestor: Some(ancestor),
            ours: Some(ours),
            theirs: Some(theirs),
            df_conflict: false,
        };

        let mut worktree = InMemoryWorktree::default();
        WorktreeWriter::write(&conflict, &objects, &mut worktree, WriteOpts::NO_DIFF3, "HEAD", "theirs-hex").unwrap();

        assert!(!worktree.files.contains_key("conflicting.txt"));
        assert_eq!(worktree.files["conflicting.txt~HEAD"].0, b"ours\n");
        assert_eq!(worktree.files["conflicting.txt~theirs-hex"].0, b"theirs\n");
    }

    #[test]
    fn directory_file_conflict_skips_diff3_even_with_both_sides_present() {
        // a delta flagged as the shadowing entry of a D/F conflict (§4.2)
        // must never get diff3 treatment, matching the original's
        // "reject D/F conflicts" check in `merge_conflict_write_diff3` --
        // it always falls through to side files instead.
        let mut objects = InMemoryObjects::default();
        let ancestor = blob_entry("dir", &mut objects, b"one\n");
        let ours = blob_entry("dir", &mut objects, b"ours\n");
        let theirs = blob_entry("dir", &mut objects, b"theirs\n");

        let conflict = UnresolvedConflict {
            path: "dir".to_owned(),
            ancestor: Some(ancestor),
            ours: Some(ours),
            theirs: Some(theirs),
            df_conflict: true,
        };

        let mut worktree = InMemoryWorktree::default();
        WorktreeWriter::write(&conflict, &objects, &mut worktree, WriteOpts::default(), "HEAD", "theirs").unwrap();

        assert!(!worktree.files.contains_key("dir"));
        assert_eq!(worktree.files["dir~HEAD"].0, b"ours\n");
        assert_eq!(worktree.files["dir~theirs"].0, b"theirs\n");
    }

    #[test]
    fn symlink_clash_is_checked_against_the_ancestor_not_ours_vs_theirs() {
        // both sides turning a regular file into a symlink is not a clash;
        // the original compares ancestor-vs-ours and ancestor-vs-theirs
        // independently, never ours directly against theirs.
        let mut objects = InMemoryObjects::default();
        let ancestor = blob_entry("link", &mut objects, b"target-a\n");
        let ours = TreeEntry::new("link", FileMode::Symlink, objects.put(b"target-b\n"), Some(9));
        let theirs = TreeEntry::new("link", FileMode::Symlink, objects.put(b"target-c\n"), Some(9));

        let conflict = UnresolvedConflict {
            path: "link".to_owned(),
            ancestor: Some(ancestor),
            ours: Some(ours),
            theirs: Some(theirs),
            df_conflict: false,
        };

        let mut worktree = InMemoryWorktree::default();
        WorktreeWriter::write(&conflict, &objects, &mut worktree, WriteOpts::default(), "HEAD", "theirs").unwrap();

        assert!(worktree.files.contains_key("link"));
        assert!(!worktree.files.contains_key("link~HEAD"));
    }
}
