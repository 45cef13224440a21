//! The file-level three-way merger (§4.3).
//!
//! Wraps `diffy::MergeOptions` to produce either an automerged buffer or a
//! diff3-conflict-marked one, via `set_conflict_style`/`set_ours_marker`/
//! `set_theirs_marker`/`merge_bytes`.

use crate::mode::FileMode;

pub use diffy::ConflictStyle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Favor {
    None,
    Ours,
    Theirs,
}

pub struct MergeOutcome {
    pub content: Vec<u8>,
    pub automergeable: bool,
}

/// Runs the byte-level three-way merge. `diffy` doesn't expose a per-hunk
/// "favor" option, so `Favor::Ours`/`Favor::Theirs` are applied here as a
/// whole-buffer fallback: diff3 still runs first, and only a result that
/// would otherwise conflict is replaced by the favored side, which keeps
/// `automergeable = true` "by convention" as §4.3 specifies. This is
/// coarser than resolving favor per-hunk; recorded as a design decision in
/// `DESIGN.md`.
pub fn merge(
    favor: Favor,
    conflict_style: ConflictStyle,
    ours_marker: &str,
    theirs_marker: &str,
    ancestor: &[u8],
    ours: &[u8],
    theirs: &[u8],
) -> MergeOutcome {
    let result = diffy::MergeOptions::new()
        .set_conflict_style(conflict_style)
        .set_ours_marker(ours_marker.to_owned())
        .set_theirs_marker(theirs_marker.to_owned())
        .merge_bytes(ancestor, ours, theirs);

    match result {
        Ok(merged) => MergeOutcome { content: merged, automergeable: true },
        Err(conflicted) => match favor {
            Favor::None => MergeOutcome { content: conflicted, automergeable: false },
            Favor::Ours => MergeOutcome { content: ours.to_vec(), automergeable: true },
            Favor::Theirs => MergeOutcome { content: theirs.to_vec(), automergeable: true },
        },
    }
}

/// The merged entry's path (§4.3): if the ancestor is absent, ours and
/// theirs must agree; otherwise whichever side differs from the ancestor
/// wins (a rename target). `None` when this is ambiguous (both sides
/// renamed to different names) — the caller should reject the merge.
pub fn best_path<'p>(ancestor: Option<&'p str>, ours: &'p str, theirs: &'p str) -> Option<&'p str> {
    match ancestor {
        None => (ours == theirs).then_some(ours),
        Some(anc) => match (ours != anc, theirs != anc) {
            (true, false) => Some(ours),
            (false, true) => Some(theirs),
            (false, false) => Some(anc),
            (true, true) => (ours == theirs).then_some(ours),
        },
    }
}

/// The merged entry's mode (§4.3): analogous to `best_path`, except the
/// no-ancestor case picks executable if either side is executable.
pub fn best_mode(ancestor: Option<FileMode>, ours: FileMode, theirs: FileMode) -> Option<FileMode> {
    match ancestor {
        None => Some(if ours == FileMode::Executable || theirs == FileMode::Executable {
            FileMode::Executable
        } else {
            FileMode::Regular
        }),
        Some(anc) => match (ours != anc, theirs != anc) {
            (true, false) => Some(ours),
            (false, true) => Some(theirs),
            (false, false) => Some(anc),
            (true, true) => (ours == theirs).then_some(ours),
        },
    }
}

/// Display names for the two sides of a conflict marker (§4.3). When the
/// merged path is the same on both sides, the plain head names are used;
/// otherwise each gets `<name>:<path>` to disambiguate the rename.
pub fn side_names(
    ours_name: &str,
    theirs_name: &str,
    ours_path: &str,
    theirs_path: &str,
) -> (String, String) {
    if ours_path == theirs_path {
        (ours_name.to_owned(), theirs_name.to_owned())
    } else {
        (format!("{}:{}", ours_name, ours_path), format!("{}:{}", theirs_name, theirs_path))
    }
}
