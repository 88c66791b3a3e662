//! The B+ tree: arena, traversal, insertion and split propagation.
//!
//! Deletion lives in `delete.rs`, lookups in `query.rs` and the numbering
//! pass in `persist.rs`; all of them are `impl` blocks on [`BPlusTree`].

use std::fmt;

use tracing::trace;

use crate::common::config::IndexConfig;
use crate::common::{Error, NodeId, Result};

use super::node::{Node, NodeKind};

/// A B+ tree mapping unique keys to record locators.
///
/// # Architecture
/// ```text
/// nodes: Vec<Option<Node>>         root ──▶ [ 15 | 25 ]
///   Slot(0) leaf  {5, 10}                 /     |     \
///   Slot(1) leaf  {15, 20}          {5,10} ─▶ {15,20} ─▶ {25,30}
///   Slot(2) root  [15 | 25]               leaf chain
///   Slot(3) leaf  {25, 30}
/// ```
/// Every node lives in an arena slot and is owned by the tree alone. Child
/// lists are the ownership edges; parent links and the leaf chain are plain
/// [`NodeId`]s. Slots freed by merges are reused by later splits.
///
/// # Invariants
/// - All leaves are at the same depth.
/// - Every non-root node holds `ceil(degree/2) - 1 ..= degree - 1` keys.
/// - `keys[i]` of an internal node is the smallest key under `children[i+1]`.
/// - The leaf chain visits all leaves in key order.
///
/// [`validate`](BPlusTree::validate) checks all of them.
///
/// # Example
/// ```
/// use bptindex::{BPlusTree, IndexConfig};
///
/// let mut tree = BPlusTree::new(IndexConfig::new("users", "users_pk")).unwrap();
/// for key in [10, 20, 5, 15] {
///     tree.insert(key, key as u64 * 100).unwrap();
/// }
///
/// assert_eq!(tree.root().keys(), &[15]);
/// assert_eq!(tree.query_single(&20).unwrap(), 2000);
/// assert_eq!(tree.query_range(&6, &20), vec![1000, 1500, 2000]);
/// ```
pub struct BPlusTree<K, R> {
    /// Node arena; `None` marks a free slot.
    pub(crate) nodes: Vec<Option<Node<K, R>>>,
    /// Free slots, reused LIFO.
    pub(crate) free_slots: Vec<NodeId>,
    pub(crate) root: NodeId,
    pub(crate) degree: usize,
    pub(crate) len: usize,
    /// True while the last numbering pass still describes the tree.
    pub(crate) numbered: bool,
    table_name: String,
    index_name: String,
}

impl<K, R> BPlusTree<K, R> {
    /// Create an empty tree: a single empty leaf acting as root.
    ///
    /// # Errors
    /// Returns `Error::InvalidDegree` if the configured degree is below 3.
    pub fn new(config: IndexConfig) -> Result<Self> {
        config.validate()?;

        let mut root = Node::new_leaf(config.degree);
        root.is_root = true;

        Ok(Self {
            nodes: vec![Some(root)],
            free_slots: Vec::new(),
            root: NodeId::new(0),
            degree: config.degree,
            len: 0,
            numbered: false,
            table_name: config.table_name,
            index_name: config.index_name,
        })
    }

    /// Create an anonymous tree with the given degree.
    pub fn with_degree(degree: usize) -> Result<Self> {
        Self::new(IndexConfig::default().with_degree(degree))
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Table the index belongs to.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Name of the index.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Maximum number of children per internal node.
    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Maximum keys per node.
    #[inline]
    pub fn max_keys(&self) -> usize {
        self.degree - 1
    }

    /// Minimum keys per non-root node.
    #[inline]
    pub fn min_keys(&self) -> usize {
        self.degree.div_ceil(2) - 1
    }

    /// Number of stored keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree stores no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free_slots.len()
    }

    /// Number of levels, 1 for a lone leaf root.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut id = self.root;
        while let Some(&child) = self.node_ref(id).children().first() {
            height += 1;
            id = child;
        }
        height
    }

    /// Whether the last `before_save` still describes the tree.
    #[inline]
    pub fn is_numbered(&self) -> bool {
        self.numbered
    }

    // ========================================================================
    // Node access
    // ========================================================================

    /// Id of the root node.
    #[inline]
    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// The root node.
    pub fn root(&self) -> &Node<K, R> {
        self.node_ref(self.root)
    }

    /// Look up a node by id; `None` for a free or unknown slot.
    pub fn node(&self, id: NodeId) -> Option<&Node<K, R>> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    /// Leftmost leaf, the head of the leaf chain.
    pub fn first_leaf(&self) -> NodeId {
        let mut id = self.root;
        while let Some(&child) = self.node_ref(id).children().first() {
            id = child;
        }
        id
    }

    /// Node ids in pre-order (node, then children left to right).
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.node_count());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.node_ref(id).children().iter().rev());
        }
        order
    }

    // ========================================================================
    // Internal: arena
    // ========================================================================

    pub(crate) fn node_ref(&self, id: NodeId) -> &Node<K, R> {
        self.nodes[id.0]
            .as_ref()
            .unwrap_or_else(|| panic!("dangling node id {id}"))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node<K, R> {
        self.nodes[id.0]
            .as_mut()
            .unwrap_or_else(|| panic!("dangling node id {id}"))
    }

    /// Place a node in a free slot (or a new one).
    pub(crate) fn alloc(&mut self, node: Node<K, R>) -> NodeId {
        match self.free_slots.pop() {
            Some(id) => {
                self.nodes[id.0] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                NodeId::new(self.nodes.len() - 1)
            }
        }
    }

    /// Take a node out of the arena, freeing its slot.
    pub(crate) fn release(&mut self, id: NodeId) -> Node<K, R> {
        let node = self.nodes[id.0]
            .take()
            .unwrap_or_else(|| panic!("double release of node id {id}"));
        self.free_slots.push(id);
        node
    }

    /// Debug-build check that a node's key count is within bounds.
    #[inline]
    pub(crate) fn debug_check_occupancy(&self, id: NodeId) {
        if cfg!(debug_assertions) {
            let node = self.node_ref(id);
            assert!(
                node.key_count() <= self.max_keys(),
                "{id} overflows: {} keys",
                node.key_count()
            );
            assert!(
                node.is_root || node.key_count() >= self.min_keys(),
                "{id} underflows: {} keys",
                node.key_count()
            );
        }
    }
}

impl<K: Ord + Clone, R: Clone> BPlusTree<K, R> {
    // ========================================================================
    // Traversal
    // ========================================================================

    /// Find the leaf that holds `key`, or where it would be inserted.
    pub fn find(&self, key: &K) -> &Node<K, R> {
        self.node_ref(self.find_leaf(key))
    }

    /// Id of the leaf that holds `key`, or where it would be inserted.
    pub fn find_leaf(&self, key: &K) -> NodeId {
        let mut id = self.root;
        loop {
            let node = self.node_ref(id);
            match &node.kind {
                NodeKind::Leaf { .. } => return id,
                NodeKind::Internal { children } => id = children[node.child_index(key)],
            }
        }
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Insert a key and its record locator.
    ///
    /// # Errors
    /// Returns `Error::DuplicateKey` if `key` is already stored; the tree is
    /// left untouched.
    pub fn insert(&mut self, key: K, record: R) -> Result<()> {
        let leaf = self.find_leaf(&key);
        let slot = match self.node_ref(leaf).search(&key) {
            Ok(_) => return Err(Error::DuplicateKey),
            Err(slot) => slot,
        };

        let node = self.node_mut(leaf);
        node.keys.insert(slot, key);
        node.records_mut().insert(slot, record);

        self.len += 1;
        self.numbered = false;

        if self.node_ref(leaf).key_count() == self.degree {
            self.split(leaf);
        }
        Ok(())
    }

    /// Split an overflowing node, propagating upward until a parent has room
    /// or a new root is created.
    fn split(&mut self, mut id: NodeId) {
        let mid = self.degree / 2;

        while self.node_ref(id).key_count() == self.degree {
            let degree = self.degree;
            let node = self.node_mut(id);
            let parent = node.parent;
            let mut right_keys = node.keys.split_off(mid);

            let (separator, mut sibling) = match &mut node.kind {
                NodeKind::Leaf { records, next } => {
                    // Leaf separators stay in the right half.
                    let right_records = records.split_off(mid);
                    let separator = right_keys[0].clone();
                    (
                        separator,
                        Node::leaf_from(degree, right_keys, right_records, *next),
                    )
                }
                NodeKind::Internal { children } => {
                    // Internal separators move up and leave both halves.
                    let separator = right_keys.remove(0);
                    let right_children = children.split_off(mid + 1);
                    (
                        separator,
                        Node::new_internal(degree, right_keys, right_children),
                    )
                }
            };
            sibling.parent = parent;
            let is_leaf = sibling.is_leaf();
            let moved: Vec<NodeId> = sibling.children().to_vec();

            let sibling_id = self.alloc(sibling);
            if is_leaf {
                self.node_mut(id).set_next_leaf(Some(sibling_id));
            }
            for child in moved {
                self.node_mut(child).parent = Some(sibling_id);
            }

            trace!(node = %id, sibling = %sibling_id, is_leaf, "split node");
            self.debug_check_occupancy(sibling_id);

            match parent {
                None => {
                    self.grow_root(id, separator, sibling_id);
                    return;
                }
                Some(parent_id) => {
                    self.debug_check_occupancy(id);
                    let parent = self.node_mut(parent_id);
                    let slot = parent.position_of(id);
                    parent.keys.insert(slot, separator);
                    parent.children_mut().insert(slot + 1, sibling_id);
                    id = parent_id;
                }
            }
        }
    }

    /// Replace the split root with a new root over its two halves.
    fn grow_root(&mut self, left: NodeId, separator: K, right: NodeId) {
        let mut root = Node::new_internal(self.degree, vec![separator], vec![left, right]);
        root.is_root = true;
        let root_id = self.alloc(root);

        self.node_mut(left).is_root = false;
        self.node_mut(left).parent = Some(root_id);
        self.node_mut(right).parent = Some(root_id);
        self.root = root_id;

        trace!(root = %root_id, height = self.height(), "tree grew a level");
    }
}

impl<K: fmt::Display, R> fmt::Display for BPlusTree<K, R> {
    /// Depth-indented dump of every node's key count and keys.
    ///
    /// Diagnostic output only; the format is not stable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}.{} (degree {}, {} keys)",
            self.table_name, self.index_name, self.degree, self.len
        )?;

        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = self.node_ref(id);
            let indent = "  ".repeat(depth);
            let kind = if node.is_leaf() { "leaf" } else { "internal" };
            write!(f, "{indent}{kind} ({} keys):", node.key_count())?;
            for key in &node.keys {
                write!(f, " {key}")?;
            }
            writeln!(f)?;
            for &child in node.children().iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with(degree: usize, keys: &[i32]) -> BPlusTree<i32, u64> {
        let mut tree = BPlusTree::with_degree(degree).unwrap();
        for &key in keys {
            tree.insert(key, key as u64).unwrap();
        }
        tree
    }

    fn leaf_keys(tree: &BPlusTree<i32, u64>) -> Vec<Vec<i32>> {
        let mut leaves = vec![];
        let mut next = Some(tree.first_leaf());
        while let Some(id) = next {
            let node = tree.node(id).unwrap();
            leaves.push(node.keys().to_vec());
            next = node.next_leaf();
        }
        leaves
    }

    #[test]
    fn test_new_tree_is_single_empty_leaf() {
        let tree: BPlusTree<i32, u64> = BPlusTree::with_degree(4).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 1);
        assert!(tree.root().is_leaf());
        assert!(tree.root().is_root());
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_invalid_degree() {
        assert!(BPlusTree::<i32, u64>::with_degree(2).is_err());
    }

    #[test]
    fn test_insert_without_split() {
        let tree = tree_with(4, &[3, 1, 2]);
        assert_eq!(tree.root().keys(), &[1, 2, 3]);
        assert_eq!(tree.root().records(), &[1, 2, 3]);
        assert_eq!(tree.height(), 1);
    }

    #[test]
    fn test_duplicate_insert_leaves_tree_unchanged() {
        let mut tree = tree_with(4, &[1, 2]);
        assert!(matches!(tree.insert(2, 99), Err(Error::DuplicateKey)));
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.root().records(), &[1, 2]);
    }

    #[test]
    fn test_leaf_root_split() {
        let tree = tree_with(4, &[10, 20, 5, 15]);

        assert_eq!(tree.height(), 2);
        assert_eq!(tree.root().keys(), &[15]);
        assert!(!tree.root().is_leaf());
        assert_eq!(leaf_keys(&tree), vec![vec![5, 10], vec![15, 20]]);

        for &child in tree.root().children() {
            assert_eq!(tree.node(child).unwrap().parent(), Some(tree.root_id()));
            assert!(!tree.node(child).unwrap().is_root());
        }
    }

    #[test]
    fn test_second_leaf_split_adds_separator() {
        let tree = tree_with(4, &[10, 20, 5, 15, 25, 30]);

        assert_eq!(tree.height(), 2);
        assert_eq!(tree.root().keys(), &[15, 25]);
        assert_eq!(
            leaf_keys(&tree),
            vec![vec![5, 10], vec![15, 20], vec![25, 30]]
        );
    }

    #[test]
    fn test_internal_split_promotes_middle_key() {
        // Degree 3: leaves hold at most 2 keys, so the root splits quickly.
        let tree = tree_with(3, &[1, 2, 3, 4, 5]);

        assert_eq!(tree.height(), 3);
        assert_eq!(tree.root().keys(), &[3]);

        let children = tree.root().children();
        assert_eq!(tree.node(children[0]).unwrap().keys(), &[2]);
        assert_eq!(tree.node(children[1]).unwrap().keys(), &[4]);
        assert_eq!(leaf_keys(&tree), vec![vec![1], vec![2], vec![3], vec![4, 5]]);
        tree.validate().unwrap();
    }

    #[test]
    fn test_find_returns_target_leaf() {
        let tree = tree_with(4, &[10, 20, 5, 15, 25, 30]);

        assert_eq!(tree.find(&7).keys(), &[5, 10]);
        assert_eq!(tree.find(&15).keys(), &[15, 20]);
        assert_eq!(tree.find(&1000).keys(), &[25, 30]);
        assert!(tree.find(&-1).is_leaf());
    }

    #[test]
    fn test_preorder_starts_at_root() {
        let tree = tree_with(4, &[10, 20, 5, 15, 25, 30]);
        let order = tree.preorder();

        assert_eq!(order.len(), 4);
        assert_eq!(order[0], tree.root_id());
        assert_eq!(&order[1..], tree.root().children());
    }

    #[test]
    fn test_display_dump() {
        let tree = tree_with(4, &[10, 20, 5, 15]);
        let dump = tree.to_string();

        assert!(dump.contains("internal (1 keys): 15"));
        assert!(dump.contains("  leaf (2 keys): 5 10"));
        assert!(dump.contains("  leaf (2 keys): 15 20"));
    }
}
