//! Persistence numbering pass.
//!
//! Before the page manager writes a tree out, [`BPlusTree::before_save`]
//! gives every node a sequential [`PersistenceId`] and records, per node,
//! the ids of the nodes it links to. An encoder can then write links as
//! integers instead of in-memory handles.
//!
//! # Passes
//! 1. Pre-order numbering from the root (root is 0).
//! 2. Leaf-chain walk asking the [`OffsetResolver`] for each key's record
//!    offset.
//! 3. Pre-order walk filling `child_persistence_ids` (internal nodes) and
//!    `next_persistence_id` (leaves).

use tracing::debug;

use crate::common::{Error, NodeId, PersistenceId, Result};

use super::tree::BPlusTree;

/// Where a record sits in key order, as seen by the page manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPosition {
    /// Persistence id of the leaf holding the key.
    pub leaf: PersistenceId,
    /// Slot of the key within that leaf.
    pub slot: usize,
    /// Zero-based rank of the key across the whole index.
    pub ordinal: u64,
}

/// The page manager's side of the numbering pass: computes the on-disk byte
/// offset of each indexed record.
///
/// Closures of the shape `FnMut(&K, RecordPosition) -> Result<u64>`
/// implement it directly.
pub trait OffsetResolver<K> {
    /// Offset of the record stored under `key`.
    fn record_offset(&mut self, key: &K, position: RecordPosition) -> Result<u64>;
}

impl<K, F> OffsetResolver<K> for F
where
    F: FnMut(&K, RecordPosition) -> Result<u64>,
{
    fn record_offset(&mut self, key: &K, position: RecordPosition) -> Result<u64> {
        self(key, position)
    }
}

/// Fixed-size records stored back to back in key order.
///
/// The record with ordinal `n` lives at `base + n * record_size`. An offset
/// past `u64::MAX` fails with `Error::OffsetResolution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequentialLayout {
    pub base: u64,
    pub record_size: u64,
}

impl SequentialLayout {
    pub fn new(base: u64, record_size: u64) -> Self {
        Self { base, record_size }
    }
}

impl<K> OffsetResolver<K> for SequentialLayout {
    fn record_offset(&mut self, _key: &K, position: RecordPosition) -> Result<u64> {
        position
            .ordinal
            .checked_mul(self.record_size)
            .and_then(|distance| distance.checked_add(self.base))
            .ok_or_else(|| {
                Error::OffsetResolution(format!(
                    "record {} of {} bytes past base {} overflows u64",
                    position.ordinal, self.record_size, self.base
                ))
            })
    }
}

/// Counts produced by a numbering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveSummary {
    /// Nodes numbered (ids `0..nodes`).
    pub nodes: u32,
    /// Leaves visited by the offset pass.
    pub leaves: u32,
    /// Record offsets resolved.
    pub records: u64,
}

impl<K: Ord + Clone, R: Clone> BPlusTree<K, R> {
    /// Number every node and resolve record offsets ahead of a save.
    ///
    /// Does not restructure the tree. Re-running it without an intervening
    /// mutation assigns the same ids. Any successful insert or delete marks
    /// the numbering stale.
    ///
    /// # Errors
    /// Propagates the resolver's error; the numbering then stays stale.
    pub fn before_save<O: OffsetResolver<K>>(&mut self, resolver: &mut O) -> Result<SaveSummary> {
        self.numbered = false;

        let mut next_id = 0u32;
        self.assign_persistence_ids(self.root, &mut next_id);

        let (leaves, records) = self.resolve_record_offsets(resolver)?;
        self.link_persistence_ids(self.root);

        self.numbered = true;
        let summary = SaveSummary {
            nodes: next_id,
            leaves,
            records,
        };
        debug!(
            table = self.table_name(),
            index = self.index_name(),
            nodes = summary.nodes,
            leaves = summary.leaves,
            records = summary.records,
            "numbered tree for save"
        );
        Ok(summary)
    }

    fn assign_persistence_ids(&mut self, id: NodeId, next_id: &mut u32) {
        self.node_mut(id).persistence_id = PersistenceId::new(*next_id);
        *next_id += 1;

        for slot in 0..self.node_ref(id).children().len() {
            let child = self.node_ref(id).children()[slot];
            self.assign_persistence_ids(child, next_id);
        }
    }

    fn resolve_record_offsets<O: OffsetResolver<K>>(
        &mut self,
        resolver: &mut O,
    ) -> Result<(u32, u64)> {
        let mut leaves = 0u32;
        let mut ordinal = 0u64;
        let mut cursor = Some(self.first_leaf());

        while let Some(id) = cursor {
            let node = self.node_ref(id);
            let mut offsets = Vec::with_capacity(node.key_count());
            for (slot, key) in node.keys().iter().enumerate() {
                let position = RecordPosition {
                    leaf: node.persistence_id,
                    slot,
                    ordinal,
                };
                offsets.push(resolver.record_offset(key, position)?);
                ordinal += 1;
            }
            cursor = node.next_leaf();

            self.node_mut(id).record_offsets = offsets;
            leaves += 1;
        }
        Ok((leaves, ordinal))
    }

    fn link_persistence_ids(&mut self, id: NodeId) {
        let node = self.node_ref(id);
        let child_ids: Vec<PersistenceId> = node
            .children()
            .iter()
            .map(|&child| self.node_ref(child).persistence_id)
            .collect();
        let next_id = node
            .next_leaf()
            .map_or(PersistenceId::INVALID, |next| self.node_ref(next).persistence_id);
        let children = node.children().to_vec();

        let node = self.node_mut(id);
        node.child_persistence_ids = child_ids;
        node.next_persistence_id = next_id;

        for child in children {
            self.link_persistence_ids(child);
        }
    }
}
