//! Error types for the merge engine.
//!
//! Follows the usual two-layer shape (a generic carrier plus a closed enum
//! for cases callers match on) but, because the enum here *is* the public
//! contract rather than an internal convenience, it is the crate's single
//! error type instead of something downcast out of an `anyhow::Error`.

use crate::oid::Oid;
use thiserror::Error;

pub type MergeResult<T> = Result<T, MergeError>;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no merge base found between {ours} and {theirs}")]
    NotFound { ours: Oid, theirs: Oid },

    #[error("object store error")]
    ObjectStore(#[source] anyhow::Error),

    #[error("index error")]
    Index(#[source] anyhow::Error),

    #[error("i/o error")]
    Io(#[from] std::io::Error),

    #[error("three-way merge failed: {0}")]
    MergeFailed(String),

    #[error("merge aborted by caller")]
    UserAborted,

    #[error("not implemented: {0}")]
    Unimplemented(String),
}

impl MergeError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn object_store(err: impl Into<anyhow::Error>) -> Self {
        Self::ObjectStore(err.into())
    }

    pub fn index(err: impl Into<anyhow::Error>) -> Self {
        Self::Index(err.into())
    }
}
