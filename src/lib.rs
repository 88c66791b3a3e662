//! bptindex - the B+ tree index core of a relational storage engine.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Storage engine (caller)                    │
//! │      SQL layer · catalog · record heap · page manager           │
//! └─────────────────────────────────────────────────────────────────┘
//!            │ insert / delete / query            ▲ pages
//!            ▼                                    │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │          Index Layer (index/)                            │   │
//! │  │   SharedIndex ──▶ BPlusTree ──▶ Node arena               │   │
//! │  │   split · borrow · merge · leaf-chain range scans        │   │
//! │  │   before_save: pre-order numbering + OffsetResolver      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │          Storage Layer (storage/)                        │   │
//! │  │      Page + PageHeader (CRC32) node page format          │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (NodeId, PersistenceId, Error, config)
//! - [`index`] - The B+ tree and its coarse-lock handle
//! - [`storage`] - Node page format
//!
//! # Quick Start
//! ```
//! use bptindex::{encode_tree, BPlusTree, IndexConfig, SequentialLayout};
//!
//! let config = IndexConfig::new("orders", "orders_pk").with_degree(4);
//! let mut tree = BPlusTree::new(config).unwrap();
//!
//! for id in [10i64, 20, 5, 15, 25, 30] {
//!     tree.insert(id, id as u32).unwrap();
//! }
//! tree.delete(&20).unwrap();
//! assert_eq!(tree.query_range(&5, &25), vec![5, 10, 15, 25]);
//!
//! // Number the nodes, then encode one page per node.
//! tree.before_save(&mut SequentialLayout::new(0, 128)).unwrap();
//! let pages = encode_tree(&tree).unwrap();
//! assert_eq!(pages.len(), tree.node_count());
//! ```

pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{IndexConfig, DEFAULT_DEGREE, MIN_DEGREE, PAGE_SIZE};
pub use common::{Error, NodeId, PersistenceId, Result};

pub use index::btree::{
    decode_node, encode_tree, BPlusTree, KeyCodec, Node, NodeImage, OffsetResolver, RecordPosition,
    SaveSummary, SequentialLayout,
};
pub use index::SharedIndex;
pub use storage::page::{Page, PageHeader, PageType};
