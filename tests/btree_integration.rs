//! Integration tests for the B+ tree index.
//!
//! These tests drive the public API end to end: bulk loads and drains,
//! the numbering pass feeding the page encoder, and the shared handle.

use bptindex::{
    decode_node, encode_tree, BPlusTree, Error, IndexConfig, NodeImage, PersistenceId,
    RecordPosition, SequentialLayout, SharedIndex,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::thread;

fn tree_with(degree: usize, keys: impl IntoIterator<Item = u64>) -> BPlusTree<u64, u64> {
    let mut tree = BPlusTree::with_degree(degree).unwrap();
    for key in keys {
        tree.insert(key, key * 10).unwrap();
    }
    tree
}

fn keys_of(tree: &BPlusTree<u64, u64>) -> Vec<u64> {
    tree.iter().map(|(key, _)| *key).collect()
}

/// Insert 10, 20, 5, 15, 25, 30 at degree 4, then drain from the left.
#[test]
fn test_small_tree_lifecycle() {
    let mut tree = BPlusTree::new(IndexConfig::new("orders", "orders_pk")).unwrap();

    for key in [10u64, 20, 5] {
        tree.insert(key, key).unwrap();
    }
    assert_eq!(tree.height(), 1);

    // Fourth key overflows the root leaf.
    tree.insert(15, 15).unwrap();
    assert_eq!(tree.height(), 2);
    assert_eq!(tree.root().keys(), &[15]);
    let leaves: Vec<Vec<u64>> = tree
        .root()
        .children()
        .iter()
        .map(|&id| tree.node(id).unwrap().keys().to_vec())
        .collect();
    assert_eq!(leaves, vec![vec![5, 10], vec![15, 20]]);

    tree.insert(25, 25).unwrap();
    tree.insert(30, 30).unwrap();
    assert_eq!(tree.root().keys(), &[15, 25]);
    tree.validate().unwrap();

    // {5} is still at minimum occupancy.
    tree.delete(&10).unwrap();
    assert_eq!(tree.root().keys(), &[15, 25]);
    tree.validate().unwrap();

    // Emptying the first leaf borrows from its right sibling.
    tree.delete(&5).unwrap();
    assert_eq!(tree.root().keys(), &[20, 25]);
    tree.validate().unwrap();

    assert_eq!(tree.query_range(&0, &100), vec![15, 20, 25, 30]);
    assert!(matches!(tree.query_single(&10), Err(Error::KeyNotFound)));
}

#[test]
fn test_sequential_load_and_drain() {
    for degree in [3, 4, 7, 64] {
        let mut tree = tree_with(degree, 0..5_000);
        tree.validate().unwrap();
        assert_eq!(tree.len(), 5_000);
        assert_eq!(keys_of(&tree), (0..5_000).collect::<Vec<_>>());

        for key in (0..5_000).step_by(2) {
            assert_eq!(tree.delete(&key).unwrap(), key * 10);
        }
        tree.validate().unwrap();
        assert_eq!(keys_of(&tree), (1..5_000).step_by(2).collect::<Vec<_>>());

        for key in (1..5_000).step_by(2) {
            tree.delete(&key).unwrap();
        }
        tree.validate().unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.node_count(), 1);
    }
}

#[test]
fn test_reverse_load() {
    let tree = tree_with(5, (0..2_000).rev());
    tree.validate().unwrap();
    assert_eq!(keys_of(&tree), (0..2_000).collect::<Vec<_>>());
    assert_eq!(
        tree.query_range(&1_990, &5_000),
        (1_990..2_000).map(|k| k * 10).collect::<Vec<_>>()
    );
}

#[test]
fn test_interleaved_workload_matches_btreemap() {
    let mut tree = BPlusTree::with_degree(4).unwrap();
    let mut oracle = BTreeMap::new();

    // Fixed seed so failures reproduce.
    let mut rng = ChaCha8Rng::seed_from_u64(0xBEEF_F00D);

    for _ in 0..20_000 {
        let key = rng.gen_range(0..1_000u64);
        if rng.gen_ratio(1, 3) {
            let expected = oracle.remove(&key);
            match tree.delete(&key) {
                Ok(record) => assert_eq!(Some(record), expected),
                Err(Error::KeyNotFound) => assert_eq!(expected, None),
                Err(e) => panic!("unexpected error: {e}"),
            }
        } else {
            let fresh = !oracle.contains_key(&key);
            match tree.insert(key, key + 1) {
                Ok(()) => {
                    assert!(fresh);
                    oracle.insert(key, key + 1);
                }
                Err(Error::DuplicateKey) => assert!(!fresh),
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
    }

    tree.validate().unwrap();
    assert_eq!(tree.len(), oracle.len());
    let actual: Vec<(u64, u64)> = tree.iter().map(|(k, r)| (*k, *r)).collect();
    let expected: Vec<(u64, u64)> = oracle.into_iter().collect();
    assert_eq!(actual, expected);
}

/// Rebuild `key -> record offset` by walking decoded pages from the root.
fn walk_pages(images: &[NodeImage<u64>], id: PersistenceId, out: &mut Vec<(u64, u64)>) {
    let image = &images[id.0 as usize];
    assert_eq!(image.persistence_id, id);
    if image.is_leaf {
        out.extend(image.keys.iter().copied().zip(image.record_offsets.iter().copied()));
    } else {
        assert_eq!(image.children.len(), image.keys.len() + 1);
        for &child in &image.children {
            walk_pages(images, child, out);
        }
    }
}

#[test]
fn test_save_and_encode_pipeline() {
    let mut tree = tree_with(6, (0..500).map(|k| k * 3));
    for key in (0..500).map(|k| k * 3).filter(|k| k % 4 == 0) {
        tree.delete(&key).unwrap();
    }

    assert!(matches!(encode_tree(&tree), Err(Error::NotNumbered)));

    let summary = tree.before_save(&mut SequentialLayout::new(8192, 32)).unwrap();
    assert_eq!(summary.nodes as usize, tree.node_count());
    assert_eq!(summary.records as usize, tree.len());

    let pages = encode_tree(&tree).unwrap();
    assert_eq!(pages.len(), tree.node_count());

    let images: Vec<NodeImage<u64>> = pages
        .iter()
        .map(|page| decode_node::<u64>(page).unwrap())
        .collect();
    assert!(images[0].is_root);
    assert!(images[1..].iter().all(|image| !image.is_root));

    let mut decoded = Vec::new();
    walk_pages(&images, PersistenceId::new(0), &mut decoded);
    let expected: Vec<(u64, u64)> = keys_of(&tree)
        .into_iter()
        .enumerate()
        .map(|(ordinal, key)| (key, 8192 + ordinal as u64 * 32))
        .collect();
    assert_eq!(decoded, expected);

    // The next-leaf links alone also visit every key in order.
    let first_leaf = images.iter().position(|image| image.is_leaf).unwrap();
    let mut chained = Vec::new();
    let mut cursor = Some(PersistenceId::new(first_leaf as u32));
    while let Some(id) = cursor {
        let image = &images[id.0 as usize];
        chained.extend(image.keys.iter().copied());
        cursor = image.next_leaf;
    }
    assert_eq!(chained, keys_of(&tree));
}

#[test]
fn test_corrupt_page_is_rejected() {
    let mut tree = tree_with(4, 0..20);
    tree.before_save(&mut SequentialLayout::new(0, 8)).unwrap();
    let mut pages = encode_tree(&tree).unwrap();

    pages[2].as_mut_slice()[40] ^= 0xFF;
    assert!(matches!(
        decode_node::<u64>(&pages[2]),
        Err(Error::ChecksumMismatch(id)) if id == PersistenceId::new(2)
    ));
    assert!(decode_node::<u64>(&pages[1]).is_ok());
}

#[test]
fn test_oversized_degree_cannot_encode() {
    let mut tree: BPlusTree<u64, u64> = BPlusTree::with_degree(1_000).unwrap();
    tree.insert(1, 1).unwrap();
    tree.before_save(&mut SequentialLayout::new(0, 8)).unwrap();
    assert!(matches!(
        encode_tree(&tree),
        Err(Error::NodeTooLarge { degree: 1_000, key_len: 8 })
    ));
}

#[test]
fn test_resolver_can_consult_a_record_heap() {
    let mut tree = tree_with(4, [40, 10, 30, 20]);
    let heap: BTreeMap<u64, u64> = [(10, 700), (20, 100), (30, 400), (40, 0)]
        .into_iter()
        .collect();

    let mut resolver = |key: &u64, _: RecordPosition| -> bptindex::Result<u64> {
        heap.get(key)
            .copied()
            .ok_or_else(|| Error::OffsetResolution(format!("no record for key {key}")))
    };
    tree.before_save(&mut resolver).unwrap();

    let offsets: Vec<u64> = tree
        .root()
        .children()
        .iter()
        .flat_map(|&leaf| tree.node(leaf).unwrap().record_offsets().to_vec())
        .collect();
    assert_eq!(offsets, vec![700, 100, 400, 0]);
}

#[test]
fn test_shared_index_readers_and_writers() {
    let index = SharedIndex::new(BPlusTree::with_degree(8).unwrap());
    for key in 0..1_000u64 {
        index.insert(key, key).unwrap();
    }

    let mut handles = vec![];
    for t in 0..2u64 {
        let index = index.clone();
        handles.push(thread::spawn(move || {
            // Writers remove disjoint halves of the upper range.
            for key in (500..1_000).filter(|k| k % 2 == t) {
                index.delete(&key).unwrap();
            }
        }));
    }
    for _ in 0..2 {
        let index = index.clone();
        handles.push(thread::spawn(move || {
            // Readers only touch keys no writer removes.
            for key in 0..500u64 {
                assert_eq!(index.query_single(&key).unwrap(), key);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(index.len(), 500);
    index.read().validate().unwrap();

    let summary = index.before_save(&mut SequentialLayout::new(0, 16)).unwrap();
    assert_eq!(summary.records, 500);
    assert!(index.read().is_numbered());
}
