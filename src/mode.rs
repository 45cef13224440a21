//! File modes for tree entries.
//!
//! Variant declaration order, not numeric value, drives `Ord` here — trees
//! must sort after the file variants so the n-way walker's minimum-path
//! selection prefers a file over a same-named directory when both are
//! present at a boundary. Submodule/gitlink entries are out of scope.

use std::fmt::{self, Debug, Display, Formatter};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileMode {
    Regular,
    Executable,
    Symlink,
    Tree,
}

impl FileMode {
    pub fn as_u32(self) -> u32 {
        match self {
            FileMode::Regular => 0o100644,
            FileMode::Executable => 0o100755,
            FileMode::Symlink => 0o120000,
            FileMode::Tree => 0o40000,
        }
    }

    pub fn from_u32(mode: u32) -> Option<Self> {
        Some(match mode {
            0o100644 => FileMode::Regular,
            0o100755 => FileMode::Executable,
            0o120000 => FileMode::Symlink,
            0o40000 => FileMode::Tree,
            _ => return None,
        })
    }

    pub fn is_symlink(self) -> bool {
        matches!(self, FileMode::Symlink)
    }

    pub fn is_tree(self) -> bool {
        matches!(self, FileMode::Tree)
    }

    pub fn is_blob(self) -> bool {
        matches!(self, FileMode::Regular | FileMode::Executable | FileMode::Symlink)
    }

    /// whether this mode would be considered a directory by `S_ISDIR`
    pub fn is_dir(self) -> bool {
        self.is_tree()
    }
}

impl Display for FileMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:06o}", self.as_u32())
    }
}

impl Debug for FileMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
