//! Error types.
//!
//! None of these errors are meant to interrupt editing. Range errors are recovered by clamping,
//! missing blocks drop the offending command, oracle failures skip a page for one flow pass, and
//! persistence failures only change the save status.

use thiserror::Error;

use crate::block::BlockId;

/// Errors produced while applying an editing command to the document tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// Character offsets outside the addressed block.
    #[error("invalid range {start}..{end} for block of length {len}")]
    InvalidRange {
        /// Requested start offset (chars).
        start: usize,
        /// Requested end offset (chars, exclusive).
        end: usize,
        /// Length of the addressed block (chars).
        len: usize,
    },

    /// The command references a block id that no longer exists.
    #[error("block not found: {0}")]
    MissingBlock(BlockId),

    /// The command tried to edit the text of a page-break sentinel.
    #[error("block {0} is a page break and cannot hold text")]
    NotEditable(BlockId),
}

/// Errors reported by a [`HeightOracle`](crate::oracle::HeightOracle).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The height of `block` cannot be measured right now.
    #[error("height unavailable for block {block}: {reason}")]
    Unavailable {
        /// Block that could not be measured.
        block: BlockId,
        /// Human readable cause.
        reason: String,
    },
}

/// Errors produced by a [`DocumentStore`](crate::persist::DocumentStore) or while encoding a
/// document for storage.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The backing store rejected the operation.
    #[error("store error: {0}")]
    Store(String),

    /// No document with this id exists in the store.
    #[error("document not found: {0}")]
    NotFound(String),

    /// JSON encoding/decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Crate-level error aggregating every concern.
#[derive(Debug, Error)]
pub enum Error {
    /// See [`EditError`].
    #[error(transparent)]
    Edit(#[from] EditError),

    /// See [`OracleError`].
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// See [`PersistError`].
    #[error(transparent)]
    Persist(#[from] PersistError),
}
