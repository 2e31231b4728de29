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

//! Block Encoding with Restart Points
//!
//! A block is a contiguous buffer of sorted key-value entries followed by
//! a restart-offset array:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ Entry 0: [shared][non_shared][value_len][key_delta][value]       │
//! │ Entry 1: ...                                                     │
//! │ Entry N-1                                                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ restarts: u32 LE × num_restarts │ num_restarts: u32 LE           │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are prefix-compressed against their predecessor: `shared` bytes
//! are reused, `non_shared` follow inline. Every `restart_interval`
//! entries compression resets (`shared == 0`, full key stored) and the
//! entry's offset is recorded in the restart array, which seek uses for
//! binary search. A larger interval saves space (fewer repeated keys) at
//! the cost of a longer linear scan after each probe.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::coding::{decode_fixed32, put_fixed32, put_varint32};
use crate::comparator::Comparator;
use crate::error::{Error, Result};

use super::format::BlockContents;

/// Default number of entries between restart points.
pub const DEFAULT_RESTART_INTERVAL: usize = 16;

// =============================================================================
// Block Builder
// =============================================================================

/// Builds a prefix-compressed sorted block.
pub struct BlockBuilder {
    restart_interval: usize,
    comparator: Arc<dyn Comparator>,
    /// Serialized entries.
    buffer: Vec<u8>,
    /// Offsets of restart-point entries; restarts[0] is always 0.
    restarts: Vec<u32>,
    /// Entries emitted since the last restart point.
    counter: usize,
    finished: bool,
    last_key: Vec<u8>,
}

impl BlockBuilder {
    pub fn new(restart_interval: usize, comparator: Arc<dyn Comparator>) -> Self {
        assert!(restart_interval >= 1);
        BlockBuilder {
            restart_interval,
            comparator,
            buffer: Vec::new(),
            restarts: vec![0],
            counter: 0,
            finished: false,
            last_key: Vec::new(),
        }
    }

    /// Append a key-value pair.
    ///
    /// Requires `key` to be strictly greater than every key added since
    /// the last `reset`, and `finish` not to have been called.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        assert!(!self.finished);
        assert!(self.counter <= self.restart_interval);
        assert!(
            self.buffer.is_empty()
                || self.comparator.compare(key, &self.last_key) == Ordering::Greater,
            "keys must be added in strictly increasing order"
        );

        let shared = if self.counter < self.restart_interval {
            shared_prefix_len(&self.last_key, key)
        } else {
            // Restart compression: full key, new binary-search anchor.
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
            0
        };
        let non_shared = key.len() - shared;

        put_varint32(&mut self.buffer, shared as u32);
        put_varint32(&mut self.buffer, non_shared as u32);
        put_varint32(&mut self.buffer, value.len() as u32);
        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(value);

        self.last_key.truncate(shared);
        self.last_key.extend_from_slice(&key[shared..]);
        debug_assert_eq!(self.last_key, key);
        self.counter += 1;
    }

    /// Append the restart array and return the finished block bytes.
    ///
    /// `add` is not legal again until `reset`.
    pub fn finish(&mut self) -> &[u8] {
        for i in 0..self.restarts.len() {
            let restart = self.restarts[i];
            put_fixed32(&mut self.buffer, restart);
        }
        put_fixed32(&mut self.buffer, self.restarts.len() as u32);
        self.finished = true;
        &self.buffer
    }

    /// Size of the block `finish` would currently produce.
    pub fn current_size_estimate(&self) -> usize {
        self.buffer.len() + self.restarts.len() * 4 + 4
    }

    /// Clear all state for building a fresh block.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.restarts.clear();
        self.restarts.push(0);
        self.counter = 0;
        self.finished = false;
        self.last_key.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    let min_len = a.len().min(b.len());
    let mut shared = 0;
    while shared < min_len && a[shared] == b[shared] {
        shared += 1;
    }
    shared
}

// =============================================================================
// Block
// =============================================================================

/// An immutable, parsed block ready for iteration.
pub struct Block {
    contents: BlockContents,
    /// Offset where the restart array begins.
    restart_offset: usize,
    num_restarts: usize,
}

impl Block {
    /// Validate the restart trailer and take ownership of the contents.
    pub fn new(contents: BlockContents) -> Result<Block> {
        let data = contents.data();
        if data.len() < 4 {
            return Err(Error::corruption("bad block contents"));
        }
        let num_restarts = decode_fixed32(&data[data.len() - 4..]) as usize;
        let max_restarts = (data.len() - 4) / 4;
        if num_restarts > max_restarts {
            return Err(Error::corruption("bad block contents"));
        }
        let restart_offset = data.len() - 4 - num_restarts * 4;
        Ok(Block {
            contents,
            restart_offset,
            num_restarts,
        })
    }

    /// Raw block bytes, including the restart trailer.
    pub fn data(&self) -> &[u8] {
        self.contents.data()
    }

    /// Whether a cache layer should hold on to this block.
    pub fn cacheable(&self) -> bool {
        self.contents.cacheable
    }

    /// Approximate memory charge for cache accounting.
    pub fn charge(&self) -> usize {
        self.contents.data().len()
    }

    pub fn iter(&self, comparator: Arc<dyn Comparator>) -> BlockIter<'_> {
        BlockIter {
            block: self,
            comparator,
            current: self.restart_offset,
            next_offset: self.restart_offset,
            restart_index: self.num_restarts,
            key: Vec::new(),
            value_start: 0,
            value_len: 0,
            status: None,
        }
    }

    fn restart_point(&self, index: usize) -> usize {
        debug_assert!(index < self.num_restarts);
        decode_fixed32(&self.data()[self.restart_offset + index * 4..]) as usize
    }
}

// =============================================================================
// Block Iterator
// =============================================================================

/// Cursor over the logical entries of a [`Block`], in key order.
///
/// Returned keys and values borrow the block's buffer (the key is
/// materialized locally because of prefix compression); the iterator
/// cannot outlive the block.
pub struct BlockIter<'b> {
    block: &'b Block,
    comparator: Arc<dyn Comparator>,
    /// Offset of the current entry; `restart_offset` when invalid.
    current: usize,
    /// Offset just past the current entry, where `next` resumes.
    next_offset: usize,
    /// Restart region containing the current entry.
    restart_index: usize,
    /// Reconstructed key of the current entry.
    key: Vec<u8>,
    value_start: usize,
    value_len: usize,
    /// First corruption seen; sticky until the iterator is re-seeked.
    status: Option<Error>,
}

impl<'b> BlockIter<'b> {
    pub fn valid(&self) -> bool {
        self.status.is_none() && self.current < self.block.restart_offset
    }

    /// Corruption encountered while parsing, if any.
    pub fn status(&self) -> Result<()> {
        match &self.status {
            None => Ok(()),
            Some(Error::Corruption(msg)) => Err(Error::Corruption(msg.clone())),
            // Parsing only ever produces corruption errors.
            Some(_) => unreachable!(),
        }
    }

    pub fn key(&self) -> &[u8] {
        debug_assert!(self.valid());
        &self.key
    }

    pub fn value(&self) -> &'b [u8] {
        debug_assert!(self.valid());
        &self.block.data()[self.value_start..self.value_start + self.value_len]
    }

    pub fn seek_to_first(&mut self) {
        if self.num_restarts() == 0 {
            self.mark_exhausted();
            return;
        }
        self.status = None;
        self.seek_to_restart_point(0);
        self.parse_next_entry();
    }

    pub fn seek_to_last(&mut self) {
        if self.num_restarts() == 0 {
            self.mark_exhausted();
            return;
        }
        self.status = None;
        self.seek_to_restart_point(self.num_restarts() - 1);
        // Walk forward to the final entry of the final restart region.
        while self.parse_next_entry() && self.next_offset < self.block.restart_offset {}
    }

    /// Position at the first entry with key >= `target`, or become invalid
    /// if every key is smaller.
    pub fn seek(&mut self, target: &[u8]) {
        if self.num_restarts() == 0 {
            self.mark_exhausted();
            return;
        }
        self.status = None;

        // Binary search over restart points for the last one whose key is
        // strictly less than the target.
        let mut left = 0usize;
        let mut right = self.num_restarts() - 1;
        while left < right {
            let mid = (left + right + 1) / 2;
            match self.restart_key_cmp(mid, target) {
                Ok(Ordering::Less) => left = mid,
                Ok(_) => right = mid - 1,
                Err(e) => {
                    self.corrupt(e);
                    return;
                }
            }
        }

        // Linear scan forward from that restart point.
        self.seek_to_restart_point(left);
        loop {
            if !self.parse_next_entry() {
                return;
            }
            if self.comparator.compare(&self.key, target) != Ordering::Less {
                return;
            }
        }
    }

    pub fn next(&mut self) {
        debug_assert!(self.valid());
        self.parse_next_entry();
    }

    /// Step to the entry preceding the current one, or become invalid at
    /// the front of the block.
    pub fn prev(&mut self) {
        debug_assert!(self.valid());
        let original = self.current;

        // Back up to the last restart point before the current entry,
        // then scan forward to the entry just short of it.
        while self.block.restart_point(self.restart_index) >= original {
            if self.restart_index == 0 {
                self.mark_exhausted();
                return;
            }
            self.restart_index -= 1;
        }
        self.seek_to_restart_point(self.restart_index);
        while self.parse_next_entry() && self.next_offset < original {}
    }

    fn num_restarts(&self) -> usize {
        self.block.num_restarts
    }

    /// Compare the full key stored at restart point `index` with `target`.
    fn restart_key_cmp(&self, index: usize, target: &[u8]) -> Result<Ordering> {
        let data = self.block.data();
        let offset = self.block.restart_point(index);
        let (shared, non_shared, _value_len, header_len) =
            decode_entry(&data[..self.block.restart_offset], offset)?;
        if shared != 0 {
            // Restart-pointed entries must carry the full key.
            return Err(Error::corruption("bad entry in block"));
        }
        let key_start = offset + header_len;
        let key = &data[key_start..key_start + non_shared];
        Ok(self.comparator.compare(key, target))
    }

    fn seek_to_restart_point(&mut self, index: usize) {
        self.key.clear();
        self.restart_index = index;
        self.next_offset = self.block.restart_point(index);
        self.current = self.next_offset;
        self.value_start = self.next_offset;
        self.value_len = 0;
    }

    /// Parse the entry at `next_offset`; returns false at the end of the
    /// entry region or on corruption.
    fn parse_next_entry(&mut self) -> bool {
        self.current = self.next_offset;
        if self.current >= self.block.restart_offset {
            self.mark_exhausted();
            return false;
        }

        let data = self.block.data();
        let entries = &data[..self.block.restart_offset];
        let (shared, non_shared, value_len, header_len) =
            match decode_entry(entries, self.current) {
                Ok(parts) => parts,
                Err(e) => {
                    self.corrupt(e);
                    return false;
                }
            };
        if shared > self.key.len() {
            self.corrupt(Error::corruption("bad entry in block"));
            return false;
        }

        let key_start = self.current + header_len;
        self.key.truncate(shared);
        self.key
            .extend_from_slice(&data[key_start..key_start + non_shared]);
        self.value_start = key_start + non_shared;
        self.value_len = value_len;
        self.next_offset = self.value_start + value_len;

        // Track which restart region the entry belongs to, for prev().
        while self.restart_index + 1 < self.num_restarts()
            && self.block.restart_point(self.restart_index + 1) < self.current
        {
            self.restart_index += 1;
        }
        true
    }

    fn mark_exhausted(&mut self) {
        self.current = self.block.restart_offset;
        self.next_offset = self.block.restart_offset;
        self.restart_index = self.num_restarts();
    }

    fn corrupt(&mut self, e: Error) {
        self.mark_exhausted();
        self.key.clear();
        self.status = Some(e);
    }
}

/// Decode one entry header at `offset`, returning
/// `(shared, non_shared, value_len, header_len)` after bounds checks.
fn decode_entry(entries: &[u8], offset: usize) -> Result<(usize, usize, usize, usize)> {
    if offset > entries.len() {
        return Err(Error::corruption("bad entry in block"));
    }
    let mut input = &entries[offset..];
    let before = input.len();
    let shared = crate::coding::get_varint32(&mut input)? as usize;
    let non_shared = crate::coding::get_varint32(&mut input)? as usize;
    let value_len = crate::coding::get_varint32(&mut input)? as usize;
    let header_len = before - input.len();
    if input.len() < non_shared + value_len {
        return Err(Error::corruption("bad entry in block"));
    }
    Ok((shared, non_shared, value_len, header_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytewiseComparator;

    fn comparator() -> Arc<dyn Comparator> {
        Arc::new(BytewiseComparator)
    }

    fn build_block(interval: usize, entries: &[(&[u8], &[u8])]) -> Block {
        let mut builder = BlockBuilder::new(interval, comparator());
        for (k, v) in entries {
            builder.add(k, v);
        }
        let data = builder.finish().to_vec();
        Block::new(BlockContents::owned(data)).unwrap()
    }

    #[test]
    fn test_empty_block() {
        let block = build_block(16, &[]);
        let mut iter = block.iter(comparator());
        assert!(!iter.valid());
        iter.seek_to_first();
        assert!(!iter.valid());
        iter.seek_to_last();
        assert!(!iter.valid());
        iter.seek(b"anything");
        assert!(!iter.valid());
        assert!(iter.status().is_ok());
    }

    #[test]
    fn test_iterate_forward() {
        let entries: Vec<(Vec<u8>, Vec<u8>)> = (0..100)
            .map(|i| {
                (
                    format!("key{i:04}").into_bytes(),
                    format!("value{i}").into_bytes(),
                )
            })
            .collect();
        let refs: Vec<(&[u8], &[u8])> = entries
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
            .collect();
        let block = build_block(4, &refs);

        let mut iter = block.iter(comparator());
        iter.seek_to_first();
        for (k, v) in &entries {
            assert!(iter.valid());
            assert_eq!(iter.key(), k.as_slice());
            assert_eq!(iter.value(), v.as_slice());
            iter.next();
        }
        assert!(!iter.valid());
        assert!(iter.status().is_ok());
    }

    #[test]
    fn test_iterate_backward() {
        let entries: Vec<(Vec<u8>, Vec<u8>)> = (0..57)
            .map(|i| (format!("k{i:03}").into_bytes(), vec![i as u8]))
            .collect();
        let refs: Vec<(&[u8], &[u8])> = entries
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
            .collect();
        let block = build_block(5, &refs);

        let mut iter = block.iter(comparator());
        iter.seek_to_last();
        for (k, v) in entries.iter().rev() {
            assert!(iter.valid());
            assert_eq!(iter.key(), k.as_slice());
            assert_eq!(iter.value(), v.as_slice());
            iter.prev();
        }
        assert!(!iter.valid());
    }

    #[test]
    fn test_seek_every_key_every_interval() {
        let entries: Vec<(Vec<u8>, Vec<u8>)> = (0..40)
            .map(|i| (format!("key{:02}", i * 2).into_bytes(), vec![i as u8]))
            .collect();
        let refs: Vec<(&[u8], &[u8])> = entries
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
            .collect();

        for interval in [1usize, 2, 3, 16, 128] {
            let block = build_block(interval, &refs);
            let mut iter = block.iter(comparator());

            for (k, v) in &entries {
                // Exact key.
                iter.seek(k);
                assert!(iter.valid());
                assert_eq!(iter.key(), k.as_slice());
                assert_eq!(iter.value(), v.as_slice());
                // Seek is idempotent.
                iter.seek(k);
                assert!(iter.valid());
                assert_eq!(iter.key(), k.as_slice());
            }

            // Between keys: lands on the next larger one.
            iter.seek(b"key01");
            assert!(iter.valid());
            assert_eq!(iter.key(), b"key02");

            // Before all keys.
            iter.seek(b"a");
            assert!(iter.valid());
            assert_eq!(iter.key(), b"key00");

            // Past all keys.
            iter.seek(b"zzz");
            assert!(!iter.valid());
        }
    }

    #[test]
    fn test_restart_array_layout() {
        // With restart_interval = 2, the third entry restarts compression.
        let block = build_block(
            2,
            &[
                (b"aaaa", b"1"),
                (b"aaab", b"2"),
                (b"aaac", b"3"),
                (b"aabb", b"4"),
            ],
        );
        assert_eq!(block.num_restarts, 2);
        assert_eq!(block.restart_point(0), 0);

        // The second restart points at "aaac": a full key, shared == 0.
        let off = block.restart_point(1);
        let entries = &block.data()[..block.restart_offset];
        let (shared, non_shared, _vlen, header_len) = decode_entry(entries, off).unwrap();
        assert_eq!(shared, 0);
        assert_eq!(&entries[off + header_len..off + header_len + non_shared], b"aaac");

        let mut iter = block.iter(comparator());
        iter.seek(b"aaab");
        assert!(iter.valid());
        assert_eq!(iter.value(), b"2");
        iter.seek(b"aaba");
        assert!(iter.valid());
        assert_eq!(iter.value(), b"4");
        iter.seek(b"zzz");
        assert!(!iter.valid());
    }

    #[test]
    fn test_prefix_compression_saves_space() {
        let keys: Vec<Vec<u8>> = (0..64)
            .map(|i| format!("user:1000:attribute:{i:04}").into_bytes())
            .collect();
        let refs: Vec<(&[u8], &[u8])> = keys.iter().map(|k| (k.as_slice(), &b"v"[..])).collect();

        let compressed = build_block(16, &refs);
        let uncompressed = build_block(1, &refs);
        assert!(compressed.data().len() < uncompressed.data().len());
    }

    #[test]
    fn test_size_estimate_tracks_finish() {
        let mut builder = BlockBuilder::new(3, comparator());
        assert_eq!(builder.current_size_estimate(), 8); // one restart + count
        for i in 0..10 {
            builder.add(format!("key{i:02}").as_bytes(), b"value");
        }
        let estimate = builder.current_size_estimate();
        assert_eq!(builder.finish().len(), estimate);
    }

    #[test]
    fn test_reset_reuses_builder() {
        let mut builder = BlockBuilder::new(16, comparator());
        builder.add(b"zebra", b"1");
        let first = builder.finish().to_vec();

        builder.reset();
        assert!(builder.is_empty());
        // After reset, smaller keys are legal again.
        builder.add(b"apple", b"2");
        let second = builder.finish().to_vec();

        let block = Block::new(BlockContents::owned(second)).unwrap();
        let mut iter = block.iter(comparator());
        iter.seek_to_first();
        assert_eq!(iter.key(), b"apple");
        assert_ne!(first, block.data());
    }

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn test_out_of_order_add_panics() {
        let mut builder = BlockBuilder::new(16, comparator());
        builder.add(b"b", b"1");
        builder.add(b"a", b"2");
    }

    #[test]
    fn test_corrupt_trailer_rejected() {
        // Too short to hold a restart count.
        assert!(Block::new(BlockContents::owned(vec![0, 1, 2])).is_err());

        // Restart count larger than the block could hold.
        let mut data = Vec::new();
        put_fixed32(&mut data, 1_000_000);
        assert!(Block::new(BlockContents::owned(data)).is_err());
    }

    #[test]
    fn test_corrupt_entry_sets_status() {
        // A block whose entry region is garbage but whose trailer parses.
        let mut data = vec![0xffu8; 16];
        put_fixed32(&mut data, 0); // restarts[0] = 0
        put_fixed32(&mut data, 1); // num_restarts = 1
        let block = Block::new(BlockContents::owned(data)).unwrap();

        let mut iter = block.iter(comparator());
        iter.seek_to_first();
        assert!(!iter.valid());
        assert!(iter.status().is_err());
    }
}
