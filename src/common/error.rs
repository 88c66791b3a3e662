//! Error types for the index.

use thiserror::Error;

use crate::common::config::PAGE_SIZE;
use crate::common::PersistenceId;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors raised by the index.
///
/// Every failure is detected before the tree is mutated, so an `Err` never
/// leaves a partially applied operation behind.
#[derive(Debug, Error)]
pub enum Error {
    /// `insert` was called with a key that is already stored.
    #[error("Duplicate key")]
    DuplicateKey,

    /// `delete` or `query_single` was called with a key that is not stored.
    #[error("Key not found")]
    KeyNotFound,

    /// A structural invariant does not hold.
    ///
    /// This indicates a bug - correct split/merge logic never produces it.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The tree degree is too small to keep nodes balanced.
    #[error("Invalid degree {degree}: must be at least {min}")]
    InvalidDegree { degree: usize, min: usize },

    /// A node of this degree and key width cannot be encoded into one page.
    #[error(
        "Node of degree {degree} with {key_len}-byte keys does not fit in a {page_size}-byte page",
        page_size = PAGE_SIZE
    )]
    NodeTooLarge { degree: usize, key_len: usize },

    /// Encoding was requested while the persistence numbering is stale.
    #[error("Tree has not been numbered since its last modification")]
    NotNumbered,

    /// A node page failed checksum verification.
    #[error("Checksum mismatch on node page {0}")]
    ChecksumMismatch(PersistenceId),

    /// A checksummed node page describes more entries than a page can hold.
    #[error("Corrupt node page {0}: entries overrun the page")]
    CorruptNode(PersistenceId),

    /// A page does not hold a B+ tree node.
    #[error("Invalid page type: {0}")]
    InvalidPageType(u8),

    /// The page manager could not resolve a record offset.
    #[error("Offset resolution failed: {0}")]
    OffsetResolution(String),
}
