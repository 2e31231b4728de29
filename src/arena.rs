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

//! Bump Arena
//!
//! A bump allocator over a growing list of owned chunks. Allocations are
//! never freed individually; every pointer handed out stays valid until
//! the arena itself is dropped. This serves callers that create many small
//! nodes with identical lifetime (the memtable skiplist) and want neither
//! per-node allocator traffic nor per-node ownership.
//!
//! The arena is single-owner and not synchronized.

use std::ptr::NonNull;

/// Size of a standard arena chunk.
const CHUNK_SIZE: usize = 4096;

/// Requests larger than this get a dedicated chunk so the tail of the
/// current chunk is not wasted.
const LARGE_ALLOC: usize = CHUNK_SIZE / 4;

pub struct Arena {
    /// Owned chunks; boxed so growth of the vector never moves chunk data.
    chunks: Vec<Box<[u8]>>,
    /// Bump cursor into the current chunk.
    alloc_ptr: *mut u8,
    /// Bytes left after the cursor in the current chunk.
    alloc_bytes_remaining: usize,
    /// Total bytes owned by chunks.
    chunks_memory: usize,
}

// The arena owns all of its memory; pointers handed out alias it, but the
// caller contract (single owner, pointers die with the arena) makes moves
// of the Arena value itself safe.
unsafe impl Send for Arena {}

impl Arena {
    pub fn new() -> Self {
        Arena {
            chunks: Vec::new(),
            alloc_ptr: std::ptr::null_mut(),
            alloc_bytes_remaining: 0,
            chunks_memory: 0,
        }
    }

    /// Allocate `bytes` with no alignment guarantee beyond 1.
    ///
    /// The returned pointer is valid for writes of `bytes` bytes until the
    /// arena is dropped. `bytes` must be non-zero.
    pub fn allocate(&mut self, bytes: usize) -> NonNull<u8> {
        assert!(bytes > 0);
        if bytes <= self.alloc_bytes_remaining {
            let result = self.alloc_ptr;
            // SAFETY: the cursor stays within the current chunk because
            // `bytes <= alloc_bytes_remaining`.
            self.alloc_ptr = unsafe { self.alloc_ptr.add(bytes) };
            self.alloc_bytes_remaining -= bytes;
            return NonNull::new(result).unwrap();
        }
        self.allocate_fallback(bytes)
    }

    /// Allocate `bytes` aligned to `size_of::<usize>()`.
    pub fn allocate_aligned(&mut self, bytes: usize) -> NonNull<u8> {
        assert!(bytes > 0);
        let align = std::mem::size_of::<usize>();
        debug_assert!(align.is_power_of_two());

        let current_mod = self.alloc_ptr as usize & (align - 1);
        let slop = if current_mod == 0 { 0 } else { align - current_mod };
        let needed = bytes + slop;

        let result = if needed <= self.alloc_bytes_remaining {
            // SAFETY: slop + bytes fit in the current chunk.
            let ptr = unsafe { self.alloc_ptr.add(slop) };
            self.alloc_ptr = unsafe { self.alloc_ptr.add(needed) };
            self.alloc_bytes_remaining -= needed;
            NonNull::new(ptr).unwrap()
        } else {
            // Fresh chunks come from the global allocator and are always
            // at least pointer-aligned.
            self.allocate_fallback(bytes)
        };
        debug_assert_eq!(result.as_ptr() as usize & (align - 1), 0);
        result
    }

    /// Total memory owned by the arena: chunk bytes plus the bookkeeping
    /// vector's capacity.
    pub fn memory_usage(&self) -> usize {
        self.chunks_memory + self.chunks.capacity() * std::mem::size_of::<Box<[u8]>>()
    }

    /// Number of chunks allocated so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn allocate_fallback(&mut self, bytes: usize) -> NonNull<u8> {
        if bytes > LARGE_ALLOC {
            // Dedicated chunk; the current chunk's tail stays usable.
            return self.allocate_new_chunk(bytes);
        }

        // Discard the remainder of the current chunk and start a new one.
        let chunk = self.allocate_new_chunk(CHUNK_SIZE);
        // SAFETY: bytes <= LARGE_ALLOC < CHUNK_SIZE.
        self.alloc_ptr = unsafe { chunk.as_ptr().add(bytes) };
        self.alloc_bytes_remaining = CHUNK_SIZE - bytes;
        chunk
    }

    fn allocate_new_chunk(&mut self, chunk_bytes: usize) -> NonNull<u8> {
        let mut chunk = vec![0u8; chunk_bytes].into_boxed_slice();
        let ptr = NonNull::new(chunk.as_mut_ptr()).unwrap();
        self.chunks_memory += chunk_bytes;
        self.chunks.push(chunk);
        ptr
    }
}

impl Default for Arena {
    fn default() -> Self {
        Arena::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Write a recognizable pattern through an arena pointer and read it back.
    unsafe fn fill(ptr: NonNull<u8>, len: usize, seed: u8) {
        for i in 0..len {
            ptr.as_ptr().add(i).write(seed.wrapping_add(i as u8));
        }
    }

    unsafe fn check(ptr: NonNull<u8>, len: usize, seed: u8) {
        for i in 0..len {
            assert_eq!(ptr.as_ptr().add(i).read(), seed.wrapping_add(i as u8));
        }
    }

    #[test]
    fn test_empty_arena() {
        let arena = Arena::new();
        assert_eq!(arena.chunk_count(), 0);
        assert_eq!(arena.memory_usage(), 0);
    }

    #[test]
    fn test_small_allocations_pack() {
        let mut arena = Arena::new();
        let mut ptrs = Vec::new();
        for i in 0..100 {
            let p = arena.allocate(100);
            unsafe { fill(p, 100, i as u8) };
            ptrs.push(p);
        }
        // 100 * 100 bytes packs into three 4096-byte chunks.
        assert!(arena.chunk_count() <= 3, "used {} chunks", arena.chunk_count());
        assert!(arena.memory_usage() >= 100 * 100);

        // Earlier allocations survive later chunk growth.
        for (i, p) in ptrs.iter().enumerate() {
            unsafe { check(*p, 100, i as u8) };
        }
    }

    #[test]
    fn test_large_allocation_gets_dedicated_chunk() {
        let mut arena = Arena::new();
        arena.allocate(16);
        let before = arena.chunk_count();
        let p = arena.allocate(5000);
        unsafe { fill(p, 5000, 7) };
        assert_eq!(arena.chunk_count(), before + 1);
        // The first chunk's tail is still usable: a small follow-up does
        // not open another chunk.
        arena.allocate(16);
        assert_eq!(arena.chunk_count(), before + 1);
        unsafe { check(p, 5000, 7) };
    }

    #[test]
    fn test_aligned_allocation() {
        let mut arena = Arena::new();
        let align = std::mem::size_of::<usize>();
        // Misalign the cursor first.
        arena.allocate(1);
        for _ in 0..50 {
            let p = arena.allocate_aligned(24);
            assert_eq!(p.as_ptr() as usize % align, 0);
            arena.allocate(3);
        }
    }

    #[test]
    fn test_mixed_sizes() {
        let mut arena = Arena::new();
        let mut total = 0usize;
        let mut allocs = Vec::new();
        for i in 0..2000usize {
            let size = match i % 7 {
                0 => 1,
                1 => 16,
                2 => 100,
                3 => 300,
                4 => 1023,
                5 => 1025,
                _ => 2048,
            };
            let p = arena.allocate(size);
            unsafe { fill(p, size, i as u8) };
            allocs.push((p, size, i as u8));
            total += size;
        }
        assert!(arena.memory_usage() >= total);
        for (p, size, seed) in allocs {
            unsafe { check(p, size, seed) };
        }
    }
}
