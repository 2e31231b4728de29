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

//! Filter Block
//!
//! The filter block is a table sidecar holding one filter per fixed-width
//! range of data-block offsets, so a reader can locate the right filter
//! from a block's file offset alone, regardless of variable block sizes:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ filter 0 │ filter 1 │ ... │ filter N-1                        │
//! ├───────────────────────────────────────────────────────────────┤
//! │ offsets[N]: u32 LE │ array_offset: u32 LE │ base_lg: u8       │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Filter `i` covers keys of every data block whose offset lies in
//! `[i << base_lg, (i + 1) << base_lg)`. With `base_lg = 11`, a new
//! filter starts every 2 KiB of data-block space.

use std::sync::Arc;

use crate::coding::{decode_fixed32, put_fixed32};
use crate::filter::FilterPolicy;

/// log2 of the offset stride covered by one filter.
pub const FILTER_BASE_LG: u8 = 11;

const FILTER_BASE: u64 = 1 << FILTER_BASE_LG;

/// Catch-up is driven by data-block offsets; anything near this bound
/// means the caller handed us a wild offset.
const MAX_FILTER_INDEX: u64 = u32::MAX as u64;

// =============================================================================
// Builder
// =============================================================================

/// Accumulates per-block key sets and emits the filter block.
///
/// Call sequence: `(start_block add_key*)* finish`, with `start_block`
/// offsets non-decreasing.
pub struct FilterBlockBuilder {
    policy: Arc<dyn FilterPolicy>,
    /// Flattened key bytes for the filter under construction.
    keys: Vec<u8>,
    /// Start offset of each key in `keys`.
    start: Vec<usize>,
    /// Filter bytes emitted so far.
    result: Vec<u8>,
    /// Start offset of each emitted filter in `result`.
    filter_offsets: Vec<u32>,
}

impl FilterBlockBuilder {
    pub fn new(policy: Arc<dyn FilterPolicy>) -> Self {
        FilterBlockBuilder {
            policy,
            keys: Vec::new(),
            start: Vec::new(),
            result: Vec::new(),
            filter_offsets: Vec::new(),
        }
    }

    /// Note that a data block begins at `block_offset`; emits filters for
    /// every stride boundary crossed since the previous call.
    pub fn start_block(&mut self, block_offset: u64) {
        let filter_index = block_offset / FILTER_BASE;
        assert!(filter_index >= self.filter_offsets.len() as u64);
        assert!(filter_index <= MAX_FILTER_INDEX);
        // Cannot loop forever: the bound is a non-decreasing function of
        // the caller's offset and every pass appends one offset entry.
        while filter_index > self.filter_offsets.len() as u64 {
            self.generate_filter();
        }
    }

    /// Add a key of the current data block.
    pub fn add_key(&mut self, key: &[u8]) {
        self.start.push(self.keys.len());
        self.keys.extend_from_slice(key);
    }

    /// Emit any pending filter and the self-locating trailer; returns the
    /// complete filter block.
    pub fn finish(mut self) -> Vec<u8> {
        if !self.start.is_empty() {
            self.generate_filter();
        }

        let array_offset = self.result.len() as u32;
        for i in 0..self.filter_offsets.len() {
            let offset = self.filter_offsets[i];
            put_fixed32(&mut self.result, offset);
        }
        put_fixed32(&mut self.result, array_offset);
        self.result.push(FILTER_BASE_LG);
        self.result
    }

    /// Build one filter from the pending keys (possibly zero of them).
    fn generate_filter(&mut self) {
        let num_keys = self.start.len();
        self.filter_offsets.push(self.result.len() as u32);
        if num_keys == 0 {
            // Empty stride: a zero-length filter that matches nothing.
            return;
        }

        self.start.push(self.keys.len());
        let key_slices: Vec<&[u8]> = (0..num_keys)
            .map(|i| &self.keys[self.start[i]..self.start[i + 1]])
            .collect();
        self.policy.create_filter(&key_slices, &mut self.result);

        self.keys.clear();
        self.start.clear();
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Queries a finished filter block.
pub struct FilterBlockReader {
    policy: Arc<dyn FilterPolicy>,
    /// Whole filter block; empty when the trailer failed to parse.
    data: Vec<u8>,
    /// Offset of the offsets array within `data`.
    array_offset: usize,
    /// Number of filters.
    num: usize,
    base_lg: u8,
}

impl FilterBlockReader {
    /// Parse the trailer. Malformed contents yield a reader that answers
    /// "may match" for everything; filters only ever suppress reads.
    pub fn new(policy: Arc<dyn FilterPolicy>, contents: Vec<u8>) -> Self {
        let mut reader = FilterBlockReader {
            policy,
            data: Vec::new(),
            array_offset: 0,
            num: 0,
            base_lg: 0,
        };
        let n = contents.len();
        if n < 5 {
            return reader;
        }
        let base_lg = contents[n - 1];
        let array_offset = decode_fixed32(&contents[n - 5..]) as usize;
        if array_offset > n - 5 {
            return reader;
        }
        reader.num = (n - 5 - array_offset) / 4;
        reader.array_offset = array_offset;
        reader.base_lg = base_lg;
        reader.data = contents;
        reader
    }

    /// Whether `key` may be present in the data block at `block_offset`.
    pub fn key_may_match(&self, block_offset: u64, key: &[u8]) -> bool {
        let index = (block_offset >> self.base_lg) as usize;
        if self.data.is_empty() || index >= self.num {
            // Out of range or unparseable: err on the side of reading.
            return true;
        }

        let start = decode_fixed32(&self.data[self.array_offset + index * 4..]) as usize;
        let limit = if index + 1 < self.num {
            decode_fixed32(&self.data[self.array_offset + (index + 1) * 4..]) as usize
        } else {
            self.array_offset
        };

        if start == limit {
            // Empty filter covers no keys.
            return false;
        }
        if start > limit || limit > self.array_offset {
            // Damaged offsets are treated as potential matches.
            return true;
        }
        self.policy
            .key_may_match(key, &self.data[start..limit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::BloomFilterPolicy;

    fn policy() -> Arc<dyn FilterPolicy> {
        Arc::new(BloomFilterPolicy::new(10))
    }

    #[test]
    fn test_empty_builder() {
        let builder = FilterBlockBuilder::new(policy());
        let block = builder.finish();
        // No filters: just array_offset (0) and base_lg.
        assert_eq!(block, vec![0, 0, 0, 0, FILTER_BASE_LG]);

        let reader = FilterBlockReader::new(policy(), block);
        assert!(reader.key_may_match(0, b"foo"));
        assert!(reader.key_may_match(100_000, b"foo"));
    }

    #[test]
    fn test_single_stride() {
        let mut builder = FilterBlockBuilder::new(policy());
        builder.start_block(100);
        builder.add_key(b"foo");
        builder.add_key(b"bar");
        builder.start_block(200);
        builder.add_key(b"box");
        builder.start_block(300);
        builder.add_key(b"hello");
        let block = builder.finish();

        // All three blocks sit in stride 0.
        let reader = FilterBlockReader::new(policy(), block);
        assert!(reader.key_may_match(100, b"foo"));
        assert!(reader.key_may_match(100, b"bar"));
        assert!(reader.key_may_match(100, b"box"));
        assert!(reader.key_may_match(100, b"hello"));
        assert!(!reader.key_may_match(100, b"missing"));
        assert!(!reader.key_may_match(100, b"other"));
    }

    #[test]
    fn test_multiple_strides_partition_keys() {
        let mut builder = FilterBlockBuilder::new(policy());
        // Data block at offset 0 holds x and y; block at 4096 holds z.
        builder.start_block(0);
        builder.add_key(b"x");
        builder.add_key(b"y");
        builder.start_block(4096);
        builder.add_key(b"z");
        let block = builder.finish();

        let reader = FilterBlockReader::new(policy(), block);
        assert!(reader.key_may_match(0, b"x"));
        assert!(reader.key_may_match(0, b"y"));
        assert!(reader.key_may_match(4096, b"z"));
        // Keys do not leak across strides.
        assert!(!reader.key_may_match(0, b"z"));
        assert!(!reader.key_may_match(4096, b"x"));
    }

    #[test]
    fn test_catch_up_emits_empty_filters() {
        let mut builder = FilterBlockBuilder::new(policy());
        builder.start_block(0);
        builder.add_key(b"alpha");
        // Jump several strides ahead; the gap gets empty filters.
        builder.start_block(9 * 4096);
        builder.add_key(b"omega");
        let block = builder.finish();

        let reader = FilterBlockReader::new(policy(), block);
        assert!(reader.key_may_match(0, b"alpha"));
        assert!(reader.key_may_match(9 * 4096, b"omega"));
        // Empty filters in the gap match nothing at all.
        for stride in 1..18u64 {
            assert!(!reader.key_may_match(stride * 2048, b"alpha"));
            assert!(!reader.key_may_match(stride * 2048, b"anything"));
        }
    }

    #[test]
    fn test_out_of_range_offset_matches() {
        let mut builder = FilterBlockBuilder::new(policy());
        builder.start_block(0);
        builder.add_key(b"k");
        let block = builder.finish();

        let reader = FilterBlockReader::new(policy(), block);
        // Beyond the last filter: conservatively a match.
        assert!(reader.key_may_match(1 << 30, b"whatever"));
    }

    #[test]
    fn test_malformed_contents_match_everything() {
        for bad in [vec![], vec![1, 2, 3, 4], vec![0xff; 5]] {
            let reader = FilterBlockReader::new(policy(), bad);
            assert!(reader.key_may_match(0, b"anything"));
        }
    }
}
