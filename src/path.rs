//! The canonical tree-entry path comparator.
//!
//! Implements the same rule git's `name_compare` (readcache.c) uses to sort
//! tree entries: a byte-wise comparison of the path, with the one wrinkle
//! that a directory entry sorts as though its name had a trailing `/`. This
//! is the comparator §4.1 calls "the same comparator used to serialize
//! trees" — it is load-bearing, so it lives as a single pure function
//! reused by the walker, the D/F scan, and any test that builds expected
//! orderings by hand.

use std::cmp::Ordering;

/// Compares two paths the way tree entries are ordered, given whether each
/// path denotes a directory. Files and directories with the same prefix
/// sort the file first: at the point one name runs out of bytes, a
/// directory contributes `/` (0x2F) and a file contributes `\0`, which
/// sorts below every other byte a path can contain.
pub fn path_cmp_explicit(a: &str, a_is_dir: bool, b: &str, b_is_dir: bool) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let min_len = a.len().min(b.len());

    a[..min_len].cmp(&b[..min_len]).then_with(|| {
        let x = if a.len() == min_len {
            if a_is_dir { b'/' } else { b'\0' }
        } else {
            a[min_len]
        };
        let y = if b.len() == min_len {
            if b_is_dir { b'/' } else { b'\0' }
        } else {
            b[min_len]
        };
        x.cmp(&y)
    })
}

/// `path_cmp_explicit` for two paths that are already known to carry a
/// trailing slash on every directory component (i.e. both have already
/// been through [`sort_key`]). Equivalent to a plain byte-wise compare with
/// length as a tiebreaker.
pub fn path_cmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let min_len = a.len().min(b.len());
    a[..min_len].cmp(&b[..min_len]).then_with(|| a.len().cmp(&b.len()))
}

/// Returns the path used as a sort key: directories get a trailing slash
/// appended so that `path_cmp` alone is sufficient once all keys have been
/// through this function.
pub fn sort_key(path: &str, is_dir: bool) -> std::borrow::Cow<'_, str> {
    if is_dir && !path.ends_with('/') {
        std::borrow::Cow::Owned(format!("{}/", path))
    } else {
        std::borrow::Cow::Borrowed(path)
    }
}

/// Whether `parent` is a strict prefix of `child` at a path-component
/// boundary, i.e. `child` starts with `parent` followed by `/`. Used by the
/// directory/file shadowing scan (§4.2) to decide whether one delta's path
/// sits inside another's.
pub fn is_parent_path(parent: &str, child: &str) -> bool {
    child.len() > parent.len() && child.starts_with(parent) && child.as_bytes()[parent.len()] == b'/'
}
