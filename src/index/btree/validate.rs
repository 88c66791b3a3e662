//! Structural validation.
//!
//! [`BPlusTree::validate`] walks the whole tree and reports the first
//! broken invariant. Tests call it after every mutation; the storage engine
//! may call it after loading a tree.

use std::fmt::Debug;

use crate::common::{Error, NodeId, Result};

use super::tree::BPlusTree;

/// Running state of one validation walk.
struct Walk {
    leaves: Vec<NodeId>,
    leaf_depth: Option<usize>,
    keys: usize,
    nodes: usize,
}

fn violation(message: String) -> Error {
    Error::InvariantViolation(message)
}

impl<K: Ord + Clone + Debug, R: Clone> BPlusTree<K, R> {
    /// Check every structural invariant.
    ///
    /// # Errors
    /// Returns `Error::InvariantViolation` describing the first violation.
    pub fn validate(&self) -> Result<()> {
        let root = self.node(self.root).ok_or_else(|| violation("root slot is free".into()))?;
        if !root.is_root || root.parent.is_some() {
            return Err(violation(format!("root {} is not flagged as root", self.root)));
        }

        let mut walk = Walk {
            leaves: Vec::new(),
            leaf_depth: None,
            keys: 0,
            nodes: 0,
        };
        self.validate_node(self.root, 0, None, None, &mut walk)?;

        if walk.keys != self.len {
            return Err(violation(format!(
                "tree reports {} keys but holds {}",
                self.len, walk.keys
            )));
        }
        if walk.nodes != self.node_count() {
            return Err(violation(format!(
                "{} live nodes but only {} reachable",
                self.node_count(),
                walk.nodes
            )));
        }
        self.validate_leaf_chain(&walk.leaves)
    }

    fn validate_node(
        &self,
        id: NodeId,
        depth: usize,
        lower: Option<&K>,
        upper: Option<&K>,
        walk: &mut Walk,
    ) -> Result<()> {
        let node = self
            .node(id)
            .ok_or_else(|| violation(format!("{id} is a free slot")))?;
        walk.nodes += 1;

        if id != self.root && node.is_root {
            return Err(violation(format!("non-root {id} is flagged as root")));
        }
        if node.key_count() > self.max_keys() {
            return Err(violation(format!("{id} holds {} keys", node.key_count())));
        }
        if id != self.root && node.key_count() < self.min_keys() {
            return Err(violation(format!(
                "{id} holds {} keys, minimum is {}",
                node.key_count(),
                self.min_keys()
            )));
        }
        if node.keys.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(violation(format!("{id} keys not sorted: {:?}", node.keys)));
        }
        if let (Some(low), Some(first)) = (lower, node.keys.first()) {
            if first < low {
                return Err(violation(format!("{id} key {first:?} below bound {low:?}")));
            }
        }
        if let (Some(high), Some(last)) = (upper, node.keys.last()) {
            if last >= high {
                return Err(violation(format!("{id} key {last:?} not below bound {high:?}")));
            }
        }

        if node.is_leaf() {
            if node.records().len() != node.key_count() {
                return Err(violation(format!("{id} has mismatched records")));
            }
            match walk.leaf_depth {
                Some(expected) if expected != depth => {
                    return Err(violation(format!(
                        "leaf {id} at depth {depth}, expected {expected}"
                    )))
                }
                _ => walk.leaf_depth = Some(depth),
            }
            walk.keys += node.key_count();
            walk.leaves.push(id);
            return Ok(());
        }

        let children = node.children();
        if children.len() != node.key_count() + 1 {
            return Err(violation(format!(
                "{id} has {} keys but {} children",
                node.key_count(),
                children.len()
            )));
        }
        for (slot, &child) in children.iter().enumerate() {
            let child_node = self
                .node(child)
                .ok_or_else(|| violation(format!("{id} links free slot {child}")))?;
            if child_node.parent != Some(id) {
                return Err(violation(format!("{child} does not point back to {id}")));
            }
            let low = if slot == 0 { lower } else { Some(&node.keys[slot - 1]) };
            let high = node.keys.get(slot).or(upper);
            self.validate_node(child, depth + 1, low, high, walk)?;

            if slot > 0 {
                let separator = &node.keys[slot - 1];
                match self.smallest_key_under(child) {
                    Some(smallest) if smallest == separator => {}
                    Some(_) => {
                        return Err(violation(format!(
                            "{id} separator {separator:?} is not the smallest key under {child}"
                        )))
                    }
                    None => {
                        return Err(violation(format!(
                            "{id} separator {separator:?} bounds an empty subtree {child}"
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    /// Smallest key under `id`, or `None` if the leftmost path runs into an
    /// empty or missing node.
    fn smallest_key_under(&self, mut id: NodeId) -> Option<&K> {
        loop {
            let node = self.node(id)?;
            match node.children().first() {
                Some(&child) => id = child,
                None => return node.keys.first(),
            }
        }
    }

    fn validate_leaf_chain(&self, leaves: &[NodeId]) -> Result<()> {
        let mut cursor = Some(self.first_leaf());
        for &expected in leaves {
            match cursor {
                Some(id) if id == expected => cursor = self.node_ref(id).next_leaf(),
                other => {
                    return Err(violation(format!(
                        "leaf chain reached {other:?}, expected {expected}"
                    )))
                }
            }
        }
        if let Some(extra) = cursor {
            return Err(violation(format!("leaf chain continues past last leaf to {extra}")));
        }
        Ok(())
    }
}
