// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Block and Cache Microbenchmarks
//!
//! Run with: `cargo bench --bench block_bench`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use emberdb_storage::sstable::{Block, BlockBuilder, BlockContents};
use emberdb_storage::{BytewiseComparator, Comparator, ShardedLruCache};

const ENTRIES: usize = 1024;

fn comparator() -> Arc<dyn Comparator> {
    Arc::new(BytewiseComparator)
}

fn sample_block() -> Block {
    let mut builder = BlockBuilder::new(16, comparator());
    for i in 0..ENTRIES {
        let key = format!("user:{i:08}");
        let value = format!("value-{i}");
        builder.add(key.as_bytes(), value.as_bytes());
    }
    Block::new(BlockContents::owned(builder.finish().to_vec())).unwrap()
}

fn bench_block_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("block/build");
    group.throughput(Throughput::Elements(ENTRIES as u64));
    group.bench_function("1k_entries", |b| {
        let cmp = comparator();
        b.iter(|| {
            let mut builder = BlockBuilder::new(16, Arc::clone(&cmp));
            for i in 0..ENTRIES {
                let key = format!("user:{i:08}");
                let value = format!("value-{i}");
                builder.add(key.as_bytes(), value.as_bytes());
            }
            black_box(builder.finish().len())
        });
    });
    group.finish();
}

fn bench_block_seek(c: &mut Criterion) {
    let block = sample_block();
    let cmp = comparator();

    let mut group = c.benchmark_group("block/seek");
    group.throughput(Throughput::Elements(1));
    group.bench_function("hit", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let key = format!("user:{:08}", i % ENTRIES);
            i = i.wrapping_add(7);
            let mut iter = block.iter(Arc::clone(&cmp));
            iter.seek(key.as_bytes());
            black_box(iter.valid())
        });
    });
    group.finish();
}

fn bench_cache_lookup(c: &mut Criterion) {
    let cache: ShardedLruCache<u64> = ShardedLruCache::new(1 << 20);
    for i in 0..4096u64 {
        let key = format!("blk{i:06}");
        drop(cache.insert(key.as_bytes(), i, 1));
    }

    let mut group = c.benchmark_group("cache/lookup");
    group.throughput(Throughput::Elements(1));
    group.bench_function("hit", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("blk{:06}", i % 4096);
            i = i.wrapping_add(13);
            black_box(cache.lookup(key.as_bytes()).is_some())
        });
    });
    group.finish();
}

criterion_group!(benches, bench_block_build, bench_block_seek, bench_cache_lookup);
criterion_main!(benches);
