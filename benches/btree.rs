//! Micro benchmarks for the in-memory B+ tree.

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use bptindex::{BPlusTree, SequentialLayout};

const INSERT_COUNT: u64 = 32_768;
const LOOKUP_SAMPLES: usize = 4_096;
const RANGE_WIDTH: u64 = 512;

/// Keys `0..n` in a fixed pseudo-random order.
fn shuffled_keys(n: u64, seed: u64) -> Vec<u64> {
    let mut keys: Vec<u64> = (0..n).collect();
    keys.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
    keys
}

fn loaded_tree(degree: usize, count: u64) -> BPlusTree<u64, u64> {
    let mut tree = BPlusTree::with_degree(degree).unwrap();
    for key in 0..count {
        tree.insert(key, key).unwrap();
    }
    tree
}

fn micro_btree(c: &mut Criterion) {
    let mut group = c.benchmark_group("micro/btree");
    group.sample_size(30);

    let random_keys = shuffled_keys(INSERT_COUNT, 0xBEEF_F00D);

    for degree in [4, 32, 128] {
        group.throughput(Throughput::Elements(INSERT_COUNT));
        group.bench_with_input(
            BenchmarkId::new("sequential_insert", degree),
            &degree,
            |b, &degree| {
                b.iter_batched(
                    || BPlusTree::<u64, u64>::with_degree(degree).unwrap(),
                    |mut tree| {
                        for key in 0..INSERT_COUNT {
                            tree.insert(key, key).unwrap();
                        }
                        black_box(tree.height());
                    },
                    BatchSize::SmallInput,
                );
            },
        );

        group.bench_with_input(
            BenchmarkId::new("random_insert", degree),
            &degree,
            |b, &degree| {
                b.iter_batched(
                    || BPlusTree::<u64, u64>::with_degree(degree).unwrap(),
                    |mut tree| {
                        for &key in &random_keys {
                            tree.insert(key, key).unwrap();
                        }
                        black_box(tree.height());
                    },
                    BatchSize::SmallInput,
                );
            },
        );

        group.bench_with_input(
            BenchmarkId::new("delete_random", degree),
            &degree,
            |b, &degree| {
                b.iter_batched(
                    || loaded_tree(degree, INSERT_COUNT),
                    |mut tree| {
                        for key in &random_keys {
                            tree.delete(key).unwrap();
                        }
                        black_box(tree.len());
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    let tree = loaded_tree(64, INSERT_COUNT);
    let lookups = &random_keys[..LOOKUP_SAMPLES];

    group.throughput(Throughput::Elements(LOOKUP_SAMPLES as u64));
    group.bench_function(BenchmarkId::new("point_lookup", LOOKUP_SAMPLES), |b| {
        b.iter(|| {
            for key in lookups {
                black_box(tree.query_single(key).unwrap());
            }
        });
    });

    group.throughput(Throughput::Elements(RANGE_WIDTH));
    group.bench_function(BenchmarkId::new("range_scan", RANGE_WIDTH), |b| {
        let low = INSERT_COUNT / 2;
        let high = low + RANGE_WIDTH - 1;
        b.iter(|| black_box(tree.query_range(&low, &high)));
    });

    group.throughput(Throughput::Elements(INSERT_COUNT));
    group.bench_function("before_save", |b| {
        b.iter_batched(
            || loaded_tree(64, INSERT_COUNT),
            |mut tree| black_box(tree.before_save(&mut SequentialLayout::new(0, 64)).unwrap()),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, micro_btree);
criterion_main!(benches);
