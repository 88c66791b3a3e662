//! B+ tree node representation.
//!
//! A [`Node`] is either a leaf (keys paired with record locators, plus a link
//! to the next leaf) or an internal node (keys separating `key_count + 1`
//! children). Links to other nodes are [`NodeId`]s into the owning tree's
//! arena, so parent and leaf-chain links never own what they point at.

use crate::common::{NodeId, PersistenceId};

/// Leaf or internal payload of a node.
#[derive(Debug, Clone)]
pub(crate) enum NodeKind<R> {
    /// `records[i]` is the locator for `keys[i]`.
    Leaf {
        records: Vec<R>,
        next: Option<NodeId>,
    },
    /// `children[i]` holds keys in `[keys[i-1], keys[i])`.
    Internal { children: Vec<NodeId> },
}

/// A node of the tree.
#[derive(Debug, Clone)]
pub struct Node<K, R> {
    pub(crate) keys: Vec<K>,
    pub(crate) kind: NodeKind<R>,
    pub(crate) is_root: bool,
    pub(crate) parent: Option<NodeId>,

    // Populated by the numbering pass only.
    pub(crate) persistence_id: PersistenceId,
    pub(crate) child_persistence_ids: Vec<PersistenceId>,
    pub(crate) next_persistence_id: PersistenceId,
    pub(crate) record_offsets: Vec<u64>,
}

impl<K, R> Node<K, R> {
    /// Create an empty leaf with room for one overflow key.
    pub(crate) fn new_leaf(degree: usize) -> Self {
        Self::with_kind(
            Vec::with_capacity(degree),
            NodeKind::Leaf {
                records: Vec::with_capacity(degree),
                next: None,
            },
        )
    }

    /// Create an internal node from already split-off keys and children.
    pub(crate) fn new_internal(degree: usize, keys: Vec<K>, children: Vec<NodeId>) -> Self {
        let mut node_keys = Vec::with_capacity(degree);
        node_keys.extend(keys);
        let mut node_children = Vec::with_capacity(degree + 1);
        node_children.extend(children);
        Self::with_kind(
            node_keys,
            NodeKind::Internal {
                children: node_children,
            },
        )
    }

    /// Create a leaf from already split-off keys and records.
    pub(crate) fn leaf_from(
        degree: usize,
        keys: Vec<K>,
        records: Vec<R>,
        next: Option<NodeId>,
    ) -> Self {
        let mut node = Self::new_leaf(degree);
        node.keys.extend(keys);
        if let NodeKind::Leaf {
            records: slots,
            next: link,
        } = &mut node.kind
        {
            slots.extend(records);
            *link = next;
        }
        node
    }

    fn with_kind(keys: Vec<K>, kind: NodeKind<R>) -> Self {
        Self {
            keys,
            kind,
            is_root: false,
            parent: None,
            persistence_id: PersistenceId::INVALID,
            child_persistence_ids: Vec::new(),
            next_persistence_id: PersistenceId::INVALID,
            record_offsets: Vec::new(),
        }
    }

    /// Whether this node holds records rather than children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Whether this node is the current root.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Number of valid keys.
    #[inline]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// The keys, strictly increasing.
    #[inline]
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Parent node, `None` for the root.
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children of an internal node; empty for a leaf.
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Internal { children } => children,
            NodeKind::Leaf { .. } => &[],
        }
    }

    /// Record locators of a leaf, parallel to `keys()`; empty for an internal node.
    pub fn records(&self) -> &[R] {
        match &self.kind {
            NodeKind::Leaf { records, .. } => records,
            NodeKind::Internal { .. } => &[],
        }
    }

    /// Next leaf in key order.
    pub fn next_leaf(&self) -> Option<NodeId> {
        match &self.kind {
            NodeKind::Leaf { next, .. } => *next,
            NodeKind::Internal { .. } => None,
        }
    }

    /// Id assigned by the last numbering pass.
    #[inline]
    pub fn persistence_id(&self) -> PersistenceId {
        self.persistence_id
    }

    /// Persistence ids of the children, in child order (internal nodes).
    #[inline]
    pub fn child_persistence_ids(&self) -> &[PersistenceId] {
        &self.child_persistence_ids
    }

    /// Persistence id of the next leaf, `INVALID` for the last leaf.
    #[inline]
    pub fn next_persistence_id(&self) -> PersistenceId {
        self.next_persistence_id
    }

    /// Record offsets resolved by the page manager, parallel to `keys()` (leaves).
    #[inline]
    pub fn record_offsets(&self) -> &[u64] {
        &self.record_offsets
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<NodeId> {
        match &mut self.kind {
            NodeKind::Internal { children } => children,
            NodeKind::Leaf { .. } => panic!("expected internal node"),
        }
    }

    pub(crate) fn records_mut(&mut self) -> &mut Vec<R> {
        match &mut self.kind {
            NodeKind::Leaf { records, .. } => records,
            NodeKind::Internal { .. } => panic!("expected leaf node"),
        }
    }

    pub(crate) fn set_next_leaf(&mut self, link: Option<NodeId>) {
        match &mut self.kind {
            NodeKind::Leaf { next, .. } => *next = link,
            NodeKind::Internal { .. } => panic!("expected leaf node"),
        }
    }

    /// Position of `child` among this node's children.
    pub(crate) fn position_of(&self, child: NodeId) -> usize {
        self.children()
            .iter()
            .position(|&c| c == child)
            .unwrap_or_else(|| panic!("{child} is not a child of this node"))
    }
}

impl<K: Ord, R> Node<K, R> {
    /// Index of the child to descend into for `key`.
    ///
    /// The first `i` with `key < keys[i]`, or `key_count` if there is none.
    #[inline]
    pub fn child_index(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k <= key)
    }

    /// Exact-match search: `Ok(slot)` if present, `Err(insert_at)` otherwise.
    #[inline]
    pub fn search(&self, key: &K) -> Result<usize, usize> {
        self.keys.binary_search(key)
    }
}
