#![deny(rust_2018_idioms)]

//! A three-way tree-merge engine for a content-addressed version-control
//! object model (commits, trees, blobs; 40-hex object identifiers).
//!
//! The object database, index persistence, working-tree I/O, and commit
//! ancestry are all external collaborators, reached only through the traits
//! each module defines (`tree::TreeIterator`, `resolve::ObjectStore`/
//! `IndexStore`, `worktree::WorktreeIo`, `mergebase::MergeBaseProvider`,
//! `setup::SetupFiles`, `orchestrator::TreeSource`/`IndexPersist`/
//! `Checkout`) — this crate owns the merge algorithm, not the repository.

#[macro_use]
extern crate log;

#[macro_use]
extern crate smallvec;

#[macro_use]
extern crate bitflags;

#[cfg(test)]
extern crate quickcheck;

#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

pub mod arena;
pub mod delta;
pub mod error;
pub mod mergebase;
pub mod message;
pub mod mode;
pub mod octopus;
pub mod oid;
pub mod orchestrator;
pub mod path;
pub mod resolve;
pub mod setup;
pub mod tree;
pub mod walk;
pub mod worktree;
pub mod xdiff3;
