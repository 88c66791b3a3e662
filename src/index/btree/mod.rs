//! B+ tree index implementation.
//!
//! # Components
//! - [`BPlusTree`] - The tree: traversal, insertion, deletion, queries
//! - [`Node`] - A leaf or internal node in the tree's arena
//! - [`OffsetResolver`] - The page manager hook used by the numbering pass
//! - [`codec`] - Node page encoding for numbered trees

pub mod codec;
mod delete;
mod node;
mod persist;
mod query;
mod tree;
mod validate;

pub use codec::{decode_node, encode_tree, KeyCodec, NodeImage};
pub use node::Node;
pub use persist::{OffsetResolver, RecordPosition, SaveSummary, SequentialLayout};
pub use query::{Iter, Range};
pub use tree::BPlusTree;
