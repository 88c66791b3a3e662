//! Deletion and underflow handling.
//!
//! After a key leaves a leaf, an underflowing node first tries to borrow
//! from its richer adjacent sibling, rotating a key through the parent
//! separator. If neither sibling can spare a key the node is merged with
//! one of them and the parent loses a separator, which may underflow the
//! parent in turn. A root left with no keys and one child is replaced by
//! that child.

use std::mem;

use tracing::trace;

use crate::common::{Error, NodeId, Result};

use super::node::NodeKind;
use super::tree::BPlusTree;

impl<K: Ord + Clone, R: Clone> BPlusTree<K, R> {
    /// Remove `key`, returning its record locator.
    ///
    /// # Errors
    /// Returns `Error::KeyNotFound` if `key` is not stored; the tree is left
    /// untouched.
    pub fn delete(&mut self, key: &K) -> Result<R> {
        let leaf = self.find_leaf(key);
        let slot = self
            .node_ref(leaf)
            .search(key)
            .map_err(|_| Error::KeyNotFound)?;

        let node = self.node_mut(leaf);
        let removed = node.keys.remove(slot);
        let record = node.records_mut().remove(slot);

        self.len -= 1;
        self.numbered = false;

        self.rebalance(leaf);

        // Only a leaf's first key is ever used as a separator.
        if slot == 0 {
            self.refresh_separator(&removed);
        }
        Ok(record)
    }

    /// Restore occupancy from `id` upward.
    fn rebalance(&mut self, mut id: NodeId) {
        let min = self.min_keys();

        loop {
            let node = self.node_ref(id);
            if node.is_root {
                if !node.is_leaf() && node.keys.is_empty() {
                    self.collapse_root();
                }
                return;
            }
            if node.key_count() >= min {
                return;
            }

            let parent_id = node
                .parent
                .unwrap_or_else(|| panic!("non-root node {id} has no parent"));
            let parent = self.node_ref(parent_id);
            let slot = parent.position_of(id);
            let siblings = parent.children();
            let left = slot.checked_sub(1).map(|s| siblings[s]);
            let right = siblings.get(slot + 1).copied();

            let left_len = left.map_or(0, |s| self.node_ref(s).key_count());
            let right_len = right.map_or(0, |s| self.node_ref(s).key_count());

            if left_len.max(right_len) > min {
                if left.is_some() && left_len >= right_len {
                    self.borrow_from_left(parent_id, slot);
                } else {
                    self.borrow_from_right(parent_id, slot);
                }
                return;
            }

            match (left, right) {
                (Some(_), _) => self.merge(parent_id, slot - 1),
                (None, Some(_)) => self.merge(parent_id, slot),
                (None, None) => panic!("non-root node {id} has no siblings"),
            }
            id = parent_id;
        }
    }

    /// Move the last entry of `children[slot - 1]` into `children[slot]`.
    fn borrow_from_left(&mut self, parent_id: NodeId, slot: usize) {
        let parent = self.node_ref(parent_id);
        let left = parent.children()[slot - 1];
        let node = parent.children()[slot];

        let lender = self.node_mut(left);
        let key = lender.keys.pop().unwrap_or_else(|| panic!("empty lender {left}"));

        match &mut lender.kind {
            NodeKind::Leaf { records, .. } => {
                let record = records.pop().unwrap_or_else(|| panic!("empty lender {left}"));
                self.node_mut(parent_id).keys[slot - 1] = key.clone();
                let borrower = self.node_mut(node);
                borrower.keys.insert(0, key);
                borrower.records_mut().insert(0, record);
            }
            NodeKind::Internal { children } => {
                let child = children.pop().unwrap_or_else(|| panic!("empty lender {left}"));
                let separator = mem::replace(&mut self.node_mut(parent_id).keys[slot - 1], key);
                let borrower = self.node_mut(node);
                borrower.keys.insert(0, separator);
                borrower.children_mut().insert(0, child);
                self.node_mut(child).parent = Some(node);
            }
        }

        trace!(from = %left, to = %node, "borrowed from left sibling");
        self.debug_check_occupancy(left);
        self.debug_check_occupancy(node);
    }

    /// Move the first entry of `children[slot + 1]` into `children[slot]`.
    fn borrow_from_right(&mut self, parent_id: NodeId, slot: usize) {
        let parent = self.node_ref(parent_id);
        let node = parent.children()[slot];
        let right = parent.children()[slot + 1];

        let lender = self.node_mut(right);
        let key = lender.keys.remove(0);

        match &mut lender.kind {
            NodeKind::Leaf { records, .. } => {
                let record = records.remove(0);
                let new_first = lender.keys[0].clone();
                self.node_mut(parent_id).keys[slot] = new_first;
                let borrower = self.node_mut(node);
                borrower.keys.push(key);
                borrower.records_mut().push(record);
            }
            NodeKind::Internal { children } => {
                let child = children.remove(0);
                let separator = mem::replace(&mut self.node_mut(parent_id).keys[slot], key);
                let borrower = self.node_mut(node);
                borrower.keys.push(separator);
                borrower.children_mut().push(child);
                self.node_mut(child).parent = Some(node);
            }
        }

        trace!(from = %right, to = %node, "borrowed from right sibling");
        self.debug_check_occupancy(right);
        self.debug_check_occupancy(node);
    }

    /// Merge `children[slot + 1]` into `children[slot]` and drop the
    /// separator between them.
    fn merge(&mut self, parent_id: NodeId, slot: usize) {
        let parent = self.node_mut(parent_id);
        let separator = parent.keys.remove(slot);
        let right = parent.children_mut().remove(slot + 1);
        let left = parent.children()[slot];

        let absorbed = self.release(right);
        let survivor = self.node_mut(left);

        match absorbed.kind {
            NodeKind::Leaf { records, next } => {
                survivor.keys.extend(absorbed.keys);
                survivor.records_mut().extend(records);
                survivor.set_next_leaf(next);
            }
            NodeKind::Internal { children } => {
                survivor.keys.push(separator);
                survivor.keys.extend(absorbed.keys);
                survivor.children_mut().extend(children.iter().copied());
                for child in children {
                    self.node_mut(child).parent = Some(left);
                }
            }
        }

        trace!(into = %left, absorbed = %right, "merged siblings");
        self.debug_check_occupancy(left);
    }

    /// Replace an empty internal root by its only child.
    fn collapse_root(&mut self) {
        let old_root = self.root;
        let old = self.release(old_root);
        let child = match old.kind {
            NodeKind::Internal { children } if children.len() == 1 => children[0],
            _ => panic!("collapsing root {old_root} must have exactly one child"),
        };

        let new_root = self.node_mut(child);
        new_root.is_root = true;
        new_root.parent = None;
        self.root = child;

        trace!(root = %child, height = self.height(), "tree lost a level");
    }

    /// Replace the separator equal to a removed key with the new smallest key
    /// of the subtree to its right.
    ///
    /// At most one internal node still names the removed key, and it lies on
    /// the search path for that key.
    fn refresh_separator(&mut self, removed: &K) {
        let mut id = self.root;
        loop {
            let node = self.node_ref(id);
            let children = match &node.kind {
                NodeKind::Leaf { .. } => return,
                NodeKind::Internal { children } => children,
            };
            match node.keys.binary_search(removed) {
                Ok(slot) => {
                    let successor = self.leftmost_key(children[slot + 1]).clone();
                    self.node_mut(id).keys[slot] = successor;
                    return;
                }
                Err(slot) => id = children[slot],
            }
        }
    }

    /// Smallest key stored under `id`.
    pub(crate) fn leftmost_key(&self, mut id: NodeId) -> &K {
        loop {
            let node = self.node_ref(id);
            match node.children().first() {
                Some(&child) => id = child,
                None => {
                    return node
                        .keys
                        .first()
                        .unwrap_or_else(|| panic!("empty non-root leaf {id}"))
                }
            }
        }
    }
}
