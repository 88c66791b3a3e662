//! Node page encoding.
//!
//! Turns a numbered tree into one [`Page`] per node, with links written as
//! persistence ids. The page manager decides where pages go on disk; page
//! `i` of [`encode_tree`] holds the node numbered `i`.
//!
//! # Node page layout
//! ```text
//! Offset          Size            Field
//! ------          ----            -----
//! 0               9               PageHeader (type, checksum, persistence id)
//! 9               1               flags (bit 0: root)
//! 10              2               key_count (little-endian)
//! 12              4               next leaf persistence id (INVALID if none)
//! 16              n * K           keys
//! 16 + n * K      n * 8           leaf: record offsets (u64)
//!                 (n + 1) * 4     internal: child persistence ids (u32)
//! ```

use tracing::debug;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PersistenceId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

use super::node::Node;
use super::tree::BPlusTree;

const OFFSET_FLAGS: usize = PageHeader::SIZE;
const OFFSET_KEY_COUNT: usize = OFFSET_FLAGS + 1;
const OFFSET_NEXT_LEAF: usize = OFFSET_KEY_COUNT + 2;
const OFFSET_KEYS: usize = OFFSET_NEXT_LEAF + 4;

const FLAG_ROOT: u8 = 0x01;

/// Fixed-width key encoding for node pages.
pub trait KeyCodec: Sized {
    /// Encoded width in bytes.
    const ENCODED_LEN: usize;

    /// Write the key into `out[..ENCODED_LEN]`.
    fn encode_into(&self, out: &mut [u8]);

    /// Read a key from `bytes[..ENCODED_LEN]`.
    fn decode_from(bytes: &[u8]) -> Self;
}

macro_rules! impl_key_codec {
    ($($ty:ty),*) => {
        $(
            impl KeyCodec for $ty {
                const ENCODED_LEN: usize = std::mem::size_of::<$ty>();

                fn encode_into(&self, out: &mut [u8]) {
                    out[..Self::ENCODED_LEN].copy_from_slice(&self.to_le_bytes());
                }

                fn decode_from(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(&bytes[..Self::ENCODED_LEN]);
                    <$ty>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_key_codec!(i16, i32, i64, u16, u32, u64);

/// A node as read back from its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeImage<K> {
    pub persistence_id: PersistenceId,
    pub is_leaf: bool,
    pub is_root: bool,
    pub keys: Vec<K>,
    /// Leaf only: record offset per key.
    pub record_offsets: Vec<u64>,
    /// Internal only: child persistence ids.
    pub children: Vec<PersistenceId>,
    /// Leaf only: next leaf in key order.
    pub next_leaf: Option<PersistenceId>,
}

/// Bytes needed by the fullest node of the given degree.
pub fn max_encoded_len<K: KeyCodec>(degree: usize) -> usize {
    let max_keys = degree - 1;
    let leaf_links = max_keys * 8;
    let internal_links = degree * 4;
    OFFSET_KEYS + max_keys * K::ENCODED_LEN + leaf_links.max(internal_links)
}

/// Encode every node of a numbered tree, in persistence-id order.
///
/// # Errors
/// - `Error::NotNumbered` if `before_save` has not run since the last mutation
/// - `Error::NodeTooLarge` if a full node of this degree cannot fit a page
pub fn encode_tree<K, R>(tree: &BPlusTree<K, R>) -> Result<Vec<Page>>
where
    K: KeyCodec,
{
    if !tree.is_numbered() {
        return Err(Error::NotNumbered);
    }
    if max_encoded_len::<K>(tree.degree()) > PAGE_SIZE {
        return Err(Error::NodeTooLarge {
            degree: tree.degree(),
            key_len: K::ENCODED_LEN,
        });
    }

    let pages: Vec<Page> = tree
        .preorder()
        .into_iter()
        .map(|id| tree.node_ref(id))
        .map(encode_node)
        .collect();

    debug!(
        table = tree.table_name(),
        index = tree.index_name(),
        pages = pages.len(),
        "encoded tree pages"
    );
    Ok(pages)
}

/// Encode one numbered node into a checksummed page.
fn encode_node<K: KeyCodec, R>(node: &Node<K, R>) -> Page {
    let mut page = Page::new();
    let page_type = if node.is_leaf() {
        PageType::BTreeLeaf
    } else {
        PageType::BTreeInternal
    };
    page.set_header(&PageHeader::new(page_type, node.persistence_id()));

    let data = page.as_mut_slice();
    data[OFFSET_FLAGS] = if node.is_root() { FLAG_ROOT } else { 0 };
    data[OFFSET_KEY_COUNT..OFFSET_KEY_COUNT + 2]
        .copy_from_slice(&(node.key_count() as u16).to_le_bytes());
    data[OFFSET_NEXT_LEAF..OFFSET_NEXT_LEAF + 4]
        .copy_from_slice(&node.next_persistence_id().0.to_le_bytes());

    let mut cursor = OFFSET_KEYS;
    for key in node.keys() {
        key.encode_into(&mut data[cursor..]);
        cursor += K::ENCODED_LEN;
    }

    if node.is_leaf() {
        for offset in node.record_offsets() {
            data[cursor..cursor + 8].copy_from_slice(&offset.to_le_bytes());
            cursor += 8;
        }
    } else {
        for child in node.child_persistence_ids() {
            data[cursor..cursor + 4].copy_from_slice(&child.0.to_le_bytes());
            cursor += 4;
        }
    }

    page.update_checksum();
    page
}

/// Decode a node page written by [`encode_tree`].
///
/// # Errors
/// - `Error::ChecksumMismatch` if the page is corrupt
/// - `Error::InvalidPageType` if the page does not hold a node
/// - `Error::CorruptNode` if the key count overruns the page
pub fn decode_node<K: KeyCodec>(page: &Page) -> Result<NodeImage<K>> {
    let header = page.header();
    if !page.verify_checksum() {
        return Err(Error::ChecksumMismatch(header.persistence_id));
    }
    let is_leaf = match header.page_type {
        PageType::BTreeLeaf => true,
        PageType::BTreeInternal => false,
        PageType::Invalid => {
            return Err(Error::InvalidPageType(page.as_slice()[PageHeader::OFFSET_PAGE_TYPE]))
        }
    };

    let data = page.as_slice();
    let key_count =
        u16::from_le_bytes([data[OFFSET_KEY_COUNT], data[OFFSET_KEY_COUNT + 1]]) as usize;
    let next_leaf = PersistenceId::new(read_u32(data, OFFSET_NEXT_LEAF));

    let link_bytes = if is_leaf {
        key_count * 8
    } else {
        (key_count + 1) * 4
    };
    if OFFSET_KEYS + key_count * K::ENCODED_LEN + link_bytes > PAGE_SIZE {
        return Err(Error::CorruptNode(header.persistence_id));
    }

    let mut cursor = OFFSET_KEYS;
    let mut keys = Vec::with_capacity(key_count);
    for _ in 0..key_count {
        keys.push(K::decode_from(&data[cursor..]));
        cursor += K::ENCODED_LEN;
    }

    let mut record_offsets = Vec::new();
    let mut children = Vec::new();
    if is_leaf {
        for _ in 0..key_count {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&data[cursor..cursor + 8]);
            record_offsets.push(u64::from_le_bytes(buf));
            cursor += 8;
        }
    } else {
        for _ in 0..=key_count {
            children.push(PersistenceId::new(read_u32(data, cursor)));
            cursor += 4;
        }
    }

    Ok(NodeImage {
        persistence_id: header.persistence_id,
        is_leaf,
        is_root: data[OFFSET_FLAGS] & FLAG_ROOT != 0,
        keys,
        record_offsets,
        children,
        next_leaf: if is_leaf { next_leaf.valid() } else { None },
    })
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}
