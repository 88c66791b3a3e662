//! Coarse-lock handle over a single tree.
//!
//! The tree itself has no internal locking. [`SharedIndex`] is the single
//! lock the storage engine puts around it so several threads can use one
//! index: lookups share the lock, mutations and the numbering pass take it
//! exclusively.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::Result;
use crate::index::btree::{BPlusTree, OffsetResolver, SaveSummary};

/// Cloneable, thread-safe handle to one [`BPlusTree`].
///
/// # Example
/// ```
/// use bptindex::{BPlusTree, SharedIndex};
///
/// let index = SharedIndex::new(BPlusTree::with_degree(4).unwrap());
/// index.insert(7, "row-7").unwrap();
///
/// let reader = index.clone();
/// assert_eq!(reader.query_single(&7).unwrap(), "row-7");
/// ```
pub struct SharedIndex<K, R> {
    inner: Arc<RwLock<BPlusTree<K, R>>>,
}

impl<K, R> Clone for SharedIndex<K, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Ord + Clone, R: Clone> SharedIndex<K, R> {
    /// Wrap a tree.
    pub fn new(tree: BPlusTree<K, R>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(tree)),
        }
    }

    /// Shared access for multi-step reads.
    pub fn read(&self) -> RwLockReadGuard<'_, BPlusTree<K, R>> {
        self.inner.read()
    }

    /// Exclusive access for multi-step updates.
    pub fn write(&self) -> RwLockWriteGuard<'_, BPlusTree<K, R>> {
        self.inner.write()
    }

    /// Insert under the exclusive lock.
    pub fn insert(&self, key: K, record: R) -> Result<()> {
        self.inner.write().insert(key, record)
    }

    /// Delete under the exclusive lock, returning the removed locator.
    pub fn delete(&self, key: &K) -> Result<R> {
        self.inner.write().delete(key)
    }

    /// Point lookup under the shared lock.
    pub fn query_single(&self, key: &K) -> Result<R> {
        self.inner.read().query_single(key)
    }

    /// Inclusive range scan under the shared lock.
    pub fn query_range(&self, low: &K, high: &K) -> Vec<R> {
        self.inner.read().query_range(low, high)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the index stores no keys.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Run the numbering pass under the exclusive lock.
    pub fn before_save<O: OffsetResolver<K>>(&self, resolver: &mut O) -> Result<SaveSummary> {
        self.inner.write().before_save(resolver)
    }
}
