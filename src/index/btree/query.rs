//! Point and range queries.
//!
//! Range scans descend once to the leaf holding the lower bound and then
//! follow the leaf chain, so they never re-descend from the root.

use crate::common::{Error, NodeId, Result};

use super::tree::BPlusTree;

impl<K: Ord + Clone, R: Clone> BPlusTree<K, R> {
    /// Look up the record locator of `key`.
    ///
    /// # Errors
    /// Returns `Error::KeyNotFound` if `key` is not stored.
    pub fn query_single(&self, key: &K) -> Result<R> {
        self.get(key).cloned().ok_or(Error::KeyNotFound)
    }

    /// Borrow the record locator of `key`, if stored.
    pub fn get(&self, key: &K) -> Option<&R> {
        let leaf = self.find(key);
        leaf.search(key).ok().map(|slot| &leaf.records()[slot])
    }

    /// Whether `key` is stored.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Record locators of all keys in `[low, high]`, in ascending key order.
    ///
    /// Returns an empty vector when `low > high`.
    pub fn query_range(&self, low: &K, high: &K) -> Vec<R> {
        self.range(low, high).map(|(_, record)| record.clone()).collect()
    }

    /// Iterate over `(key, locator)` pairs with `low <= key <= high`.
    pub fn range<'a>(&'a self, low: &K, high: &'a K) -> Range<'a, K, R> {
        let leaf = self.find_leaf(low);
        let slot = self.node_ref(leaf).keys().partition_point(|k| k < low);
        Range {
            iter: Iter {
                tree: self,
                leaf: Some(leaf),
                slot,
            },
            high,
        }
    }

    /// Iterate over all `(key, locator)` pairs in key order.
    pub fn iter(&self) -> Iter<'_, K, R> {
        Iter {
            tree: self,
            leaf: Some(self.first_leaf()),
            slot: 0,
        }
    }
}

/// Leaf-chain iterator over `(key, locator)` pairs.
pub struct Iter<'a, K, R> {
    tree: &'a BPlusTree<K, R>,
    leaf: Option<NodeId>,
    slot: usize,
}

impl<'a, K, R> Iterator for Iter<'a, K, R> {
    type Item = (&'a K, &'a R);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.leaf {
            let node = self.tree.node_ref(id);
            if self.slot < node.key_count() {
                let slot = self.slot;
                self.slot += 1;
                return Some((&node.keys()[slot], &node.records()[slot]));
            }
            self.leaf = node.next_leaf();
            self.slot = 0;
        }
        None
    }
}

/// Leaf-chain iterator bounded above by an inclusive key.
pub struct Range<'a, K, R> {
    iter: Iter<'a, K, R>,
    high: &'a K,
}

impl<'a, K: Ord, R> Iterator for Range<'a, K, R> {
    type Item = (&'a K, &'a R);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, record) = self.iter.next()?;
        if key > self.high {
            self.iter.leaf = None;
            return None;
        }
        Some((key, record))
    }
}
