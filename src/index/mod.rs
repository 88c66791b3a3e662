//! Index structures.
//!
//! - [`btree`] - The B+ tree and its node page encoding
//! - [`SharedIndex`] - Coarse-lock handle for multi-threaded callers

pub mod btree;
mod shared;

pub use shared::SharedIndex;
