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

//! EmberDB Storage Substrate
//!
//! The on-disk layer of a log-structured key-value engine: the physical
//! block format of immutable sorted tables, write-ahead-log framing, and
//! the shared LRU block cache that fronts table reads.
//!
//! ## Read path
//!
//! ```text
//! lookup ──► cache ──miss──► read_block ──► Block ──► BlockIter
//!               ▲                │
//!               └── insert ◄─────┘ (cacheable blocks only)
//! ```
//!
//! On a miss the caller loads the block through [`sstable::read_block`],
//! which verifies the trailer checksum and undoes compression, then hands
//! the bytes to [`sstable::Block`] for restart-array iteration. Writes go
//! the other way: [`sstable::BlockBuilder`] produces blocks that are
//! persisted with checksummed trailers and later located through the
//! table footer. The [`wal`] writer is an independent path that makes
//! mutations durable before they are sorted into tables.
//!
//! Higher layers — memtable, version set, compaction, the public API —
//! live elsewhere and consume this crate through the capability traits in
//! [`env`], [`comparator`], and [`filter`].

// Core utilities
pub mod arena;
pub mod cache;
pub mod coding;
pub mod comparator;
pub mod crc32c;
pub mod env;
pub mod error;
pub mod filter;

// File formats
pub mod sstable;
pub mod wal;

// Re-exports of the surface most callers need
pub use cache::{CacheHandle, ShardedLruCache};
pub use comparator::{BytewiseComparator, Comparator};
pub use env::{
    FileReader, FileWriter, MappedSlice, MmapFile, RandomAccessFile, ReadResult, SequentialFile,
    StdRandomAccessFile, WritableFile,
};
pub use error::{Error, Result};
pub use filter::{BloomFilterPolicy, FilterPolicy};
pub use sstable::{
    read_block, Block, BlockBuilder, BlockContents, BlockHandle, BlockIter, CompressionType,
    Footer, ReadOptions,
};
pub use wal::{LogReader, LogWriter};
