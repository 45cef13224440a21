//! The four merge setup files (§6): `ORIG_HEAD`, `MERGE_HEAD`, `MERGE_MODE`,
//! `MERGE_MSG`, written into the repository state directory before the diff
//! begins, plus the cleanup entry point callers use to recover after a
//! failed merge (§7: "callers recover them via an explicit cleanup entry
//! point").
//!
//! Writes use an atomic create-then-rename so a reader never observes a
//! half-written file. Cleanup unlinks all three of `MERGE_HEAD`,
//! `MERGE_MODE`, `MERGE_MSG` if present, and leaves `ORIG_HEAD` alone (it
//! outlives a merge attempt by design — it is the undo point for `reset`).

use crate::message::{self, Head};
use crate::oid::Oid;

pub const ORIG_HEAD: &str = "ORIG_HEAD";
pub const MERGE_HEAD: &str = "MERGE_HEAD";
pub const MERGE_MODE: &str = "MERGE_MODE";
pub const MERGE_MSG: &str = "MERGE_MSG";

/// External collaborator: named files inside the repository state
/// directory. `remove` is a no-op (not an error) when the file is already
/// absent — `cleanup` relies on this to unconditionally unlink all three
/// transient files regardless of which ones a partial merge left behind.
pub trait SetupFiles {
    type Error: std::error::Error + Send + Sync + 'static;

    fn write(&mut self, name: &str, content: &[u8]) -> Result<(), Self::Error>;
    fn remove(&mut self, name: &str) -> Result<(), Self::Error>;
}

/// Writes all four setup files ahead of a merge attempt. `no_fastforward`
/// controls `MERGE_MODE`'s contents; `theirs` is the full OID list for
/// `MERGE_HEAD`, one per line, in input order; `heads` feeds the
/// message-format quirk in [`crate::message`].
pub fn write_all<S: SetupFiles>(
    files: &mut S,
    ours: Oid,
    theirs: &[Oid],
    heads: &[Head],
    no_fastforward: bool,
) -> Result<(), S::Error> {
    debug!("setup::write_all(ours: {}, theirs: {:?})", ours, theirs);
    files.write(ORIG_HEAD, format!("{}\n", ours.to_hex()).as_bytes())?;

    let merge_head = theirs.iter().map(|oid| format!("{}\n", oid.to_hex())).collect::<String>();
    files.write(MERGE_HEAD, merge_head.as_bytes())?;

    let mode = if no_fastforward { "no-ff\n" } else { "" };
    files.write(MERGE_MODE, mode.as_bytes())?;

    let msg = format!("{}\n", message::format_summary(heads));
    files.write(MERGE_MSG, msg.as_bytes())?;

    Ok(())
}

/// Unlinks the three transient per-attempt files. `ORIG_HEAD` is left in
/// place; it records the pre-merge position for `reset`, not anything
/// scoped to the attempt that just failed.
pub fn cleanup<S: SetupFiles>(files: &mut S) -> Result<(), S::Error> {
    debug!("setup::cleanup()");
    files.remove(MERGE_HEAD)?;
    files.remove(MERGE_MODE)?;
    files.remove(MERGE_MSG)?;
    Ok(())
}
