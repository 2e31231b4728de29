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

//! Shared LRU Cache
//!
//! A sharded, capacity-bounded cache mapping byte-string keys to values,
//! used for data blocks and open table handles. Requests are routed to one
//! of 16 shards by the high bits of the key hash; each shard serializes
//! its mutations through its own mutex, so threads working on different
//! shards never contend.
//!
//! Within a shard:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ HandleTable: open chaining, power-of-two buckets,          │
//! │              doubled when entries exceed bucket count      │
//! ├────────────────────────────────────────────────────────────┤
//! │ LRU list: circular, intrusive; sentinel.prev = newest,     │
//! │           sentinel.next = oldest                           │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entry is reference counted: one reference belongs to the cache,
//! one to each outstanding [`CacheHandle`]. Eviction unlinks an entry from
//! both structures and drops the cache's reference, but the value is freed
//! only when the count reaches zero — a pinned handle keeps an evicted
//! value alive. Handles release on drop, so a reference can be neither
//! leaked nor released twice.

use std::ops::Deref;
use std::ptr::{self, NonNull};

use parking_lot::Mutex;

/// log2 of the shard count.
const NUM_SHARD_BITS: u32 = 4;
const NUM_SHARDS: usize = 1 << NUM_SHARD_BITS;

fn hash_key(key: &[u8]) -> u32 {
    twox_hash::xxh3::hash64(key) as u32
}

fn shard_of(hash: u32) -> usize {
    (hash >> (32 - NUM_SHARD_BITS)) as usize
}

// =============================================================================
// Entry
// =============================================================================

/// One cache entry, allocated individually so its address is stable for
/// the intrusive links and outstanding handles.
struct LruEntry<T> {
    /// `None` only in the per-shard sentinel.
    value: Option<T>,
    key: Vec<u8>,
    hash: u32,
    charge: usize,
    /// One reference held by the cache while the entry is in its
    /// structures, plus one per outstanding handle.
    refs: u32,
    /// Collision chain of the hash table.
    next_hash: *mut LruEntry<T>,
    /// Circular LRU links.
    next: *mut LruEntry<T>,
    prev: *mut LruEntry<T>,
}

// =============================================================================
// Hash table
// =============================================================================

/// Open-chaining table over entry pointers. Buckets double once the entry
/// count passes the bucket count, keeping chains at one element on
/// average.
struct HandleTable<T> {
    buckets: Vec<*mut LruEntry<T>>,
    elems: usize,
}

impl<T> HandleTable<T> {
    fn new() -> Self {
        HandleTable {
            buckets: vec![ptr::null_mut(); 4],
            elems: 0,
        }
    }

    /// Slot that points at the entry matching `key`/`hash`, or at the null
    /// end of its chain if absent.
    ///
    /// # Safety
    /// Every pointer reachable from `buckets` must be live.
    unsafe fn find_slot(&mut self, key: &[u8], hash: u32) -> *mut *mut LruEntry<T> {
        let index = (hash as usize) & (self.buckets.len() - 1);
        let mut slot: *mut *mut LruEntry<T> = &mut self.buckets[index];
        while !(*slot).is_null() && ((**slot).hash != hash || (**slot).key != key) {
            slot = &mut (**slot).next_hash;
        }
        slot
    }

    unsafe fn lookup(&mut self, key: &[u8], hash: u32) -> *mut LruEntry<T> {
        *self.find_slot(key, hash)
    }

    /// Link `entry` into the table; returns the displaced entry with the
    /// same key, if any.
    unsafe fn insert(&mut self, entry: *mut LruEntry<T>) -> *mut LruEntry<T> {
        let slot = self.find_slot(&(*entry).key, (*entry).hash);
        let old = *slot;
        (*entry).next_hash = if old.is_null() {
            ptr::null_mut()
        } else {
            (*old).next_hash
        };
        *slot = entry;
        if old.is_null() {
            self.elems += 1;
            if self.elems > self.buckets.len() {
                self.resize();
            }
        }
        old
    }

    /// Unlink and return the entry for `key`, or null.
    unsafe fn remove(&mut self, key: &[u8], hash: u32) -> *mut LruEntry<T> {
        let slot = self.find_slot(key, hash);
        let entry = *slot;
        if !entry.is_null() {
            *slot = (*entry).next_hash;
            self.elems -= 1;
        }
        entry
    }

    unsafe fn resize(&mut self) {
        let mut new_len = 4;
        while new_len < self.elems {
            new_len *= 2;
        }
        let mut new_buckets: Vec<*mut LruEntry<T>> = vec![ptr::null_mut(); new_len];
        for i in 0..self.buckets.len() {
            let mut entry = self.buckets[i];
            while !entry.is_null() {
                let next = (*entry).next_hash;
                let index = ((*entry).hash as usize) & (new_len - 1);
                (*entry).next_hash = new_buckets[index];
                new_buckets[index] = entry;
                entry = next;
            }
        }
        self.buckets = new_buckets;
    }
}

// =============================================================================
// Shard
// =============================================================================

struct Shard<T> {
    inner: Mutex<ShardInner<T>>,
}

struct ShardInner<T> {
    capacity: usize,
    /// Sum of charges of entries whose cache reference is still alive.
    usage: usize,
    table: HandleTable<T>,
    /// Sentinel of the circular LRU list.
    lru: *mut LruEntry<T>,
}

impl<T> Shard<T> {
    fn new(capacity: usize) -> Self {
        let sentinel = Box::into_raw(Box::new(LruEntry::<T> {
            value: None,
            key: Vec::new(),
            hash: 0,
            charge: 0,
            refs: 0,
            next_hash: ptr::null_mut(),
            next: ptr::null_mut(),
            prev: ptr::null_mut(),
        }));
        unsafe {
            (*sentinel).next = sentinel;
            (*sentinel).prev = sentinel;
        }
        Shard {
            inner: Mutex::new(ShardInner {
                capacity,
                usage: 0,
                table: HandleTable::new(),
                lru: sentinel,
            }),
        }
    }
}

impl<T> ShardInner<T> {
    /// Unlink from the LRU list.
    unsafe fn lru_remove(&mut self, e: *mut LruEntry<T>) {
        (*(*e).next).prev = (*e).prev;
        (*(*e).prev).next = (*e).next;
    }

    /// Link at the newest position, just before the sentinel.
    unsafe fn lru_append(&mut self, e: *mut LruEntry<T>) {
        (*e).next = self.lru;
        (*e).prev = (*self.lru).prev;
        (*(*e).prev).next = e;
        (*(*e).next).prev = e;
    }

    /// Drop one reference; frees the entry (and its value) at zero.
    unsafe fn unref(&mut self, e: *mut LruEntry<T>) {
        debug_assert!((*e).refs > 0);
        (*e).refs -= 1;
        if (*e).refs == 0 {
            self.usage -= (*e).charge;
            drop(Box::from_raw(e));
        }
    }

    unsafe fn lookup(&mut self, key: &[u8], hash: u32) -> *mut LruEntry<T> {
        let e = self.table.lookup(key, hash);
        if !e.is_null() {
            // A hit is an access: pin and move to the newest position.
            (*e).refs += 1;
            self.lru_remove(e);
            self.lru_append(e);
        }
        e
    }

    unsafe fn insert(
        &mut self,
        key: &[u8],
        hash: u32,
        value: T,
        charge: usize,
    ) -> *mut LruEntry<T> {
        let e = Box::into_raw(Box::new(LruEntry {
            value: Some(value),
            key: key.to_vec(),
            hash,
            charge,
            // One for the cache, one for the returned handle.
            refs: 2,
            next_hash: ptr::null_mut(),
            next: ptr::null_mut(),
            prev: ptr::null_mut(),
        }));
        self.lru_append(e);
        self.usage += charge;

        let old = self.table.insert(e);
        if !old.is_null() {
            // Same key: the previous entry leaves the cache now.
            self.lru_remove(old);
            self.unref(old);
        }

        // Trim oldest-first until back under capacity. An entry pinned by
        // callers leaves the structures here but stays allocated until the
        // last handle goes away.
        while self.usage > self.capacity && (*self.lru).next != self.lru {
            let oldest = (*self.lru).next;
            self.lru_remove(oldest);
            self.table.remove(&(*oldest).key, (*oldest).hash);
            self.unref(oldest);
        }

        e
    }

    unsafe fn erase(&mut self, key: &[u8], hash: u32) {
        let e = self.table.remove(key, hash);
        if !e.is_null() {
            self.lru_remove(e);
            self.unref(e);
        }
    }
}

impl<T> Drop for ShardInner<T> {
    fn drop(&mut self) {
        unsafe {
            let mut e = (*self.lru).next;
            while e != self.lru {
                let next = (*e).next;
                // A handle outliving the cache is impossible: handles
                // borrow the cache.
                debug_assert_eq!((*e).refs, 1);
                drop(Box::from_raw(e));
                e = next;
            }
            drop(Box::from_raw(self.lru));
        }
    }
}

// =============================================================================
// Sharded cache
// =============================================================================

/// Capacity-bounded cache shared between all tables of a database.
///
/// `capacity` is a charge budget, not an entry count; each insert declares
/// its own charge (typically the block size in bytes).
pub struct ShardedLruCache<T> {
    shards: Vec<Shard<T>>,
    last_id: Mutex<u64>,
}

// Entries are reachable from multiple threads through the shard mutexes,
// and handle holders read values concurrently.
unsafe impl<T: Send> Send for ShardedLruCache<T> {}
unsafe impl<T: Send + Sync> Sync for ShardedLruCache<T> {}

impl<T> ShardedLruCache<T> {
    pub fn new(capacity: usize) -> Self {
        let per_shard = capacity.div_ceil(NUM_SHARDS);
        ShardedLruCache {
            shards: (0..NUM_SHARDS).map(|_| Shard::new(per_shard)).collect(),
            last_id: Mutex::new(0),
        }
    }

    fn shard(&self, hash: u32) -> &Shard<T> {
        &self.shards[shard_of(hash)]
    }

    /// Insert `key -> value` with the given charge, displacing any prior
    /// entry for the key. The returned handle pins the value.
    pub fn insert(&self, key: &[u8], value: T, charge: usize) -> CacheHandle<'_, T> {
        let hash = hash_key(key);
        let shard = self.shard(hash);
        let entry = unsafe { shard.inner.lock().insert(key, hash, value, charge) };
        CacheHandle {
            shard,
            entry: NonNull::new(entry).unwrap(),
        }
    }

    /// Look up `key`, pinning the entry on a hit.
    pub fn lookup(&self, key: &[u8]) -> Option<CacheHandle<'_, T>> {
        let hash = hash_key(key);
        let shard = self.shard(hash);
        let entry = unsafe { shard.inner.lock().lookup(key, hash) };
        NonNull::new(entry).map(|entry| CacheHandle { shard, entry })
    }

    /// Remove `key` from the cache. Outstanding handles stay valid.
    pub fn erase(&self, key: &[u8]) {
        let hash = hash_key(key);
        unsafe { self.shard(hash).inner.lock().erase(key, hash) };
    }

    /// A token no other `new_id` call on this cache will return. Callers
    /// that share the cache partition their key space with it.
    pub fn new_id(&self) -> u64 {
        let mut last_id = self.last_id.lock();
        *last_id += 1;
        *last_id
    }

    /// Combined charge of all resident entries.
    pub fn total_charge(&self) -> usize {
        self.shards.iter().map(|s| s.inner.lock().usage).sum()
    }
}

// =============================================================================
// Handle
// =============================================================================

/// A pinned reference to a cache entry.
///
/// The value stays alive — even across eviction or [`ShardedLruCache::erase`] —
/// until the handle is dropped, which releases the reference.
pub struct CacheHandle<'c, T> {
    shard: &'c Shard<T>,
    entry: NonNull<LruEntry<T>>,
}

unsafe impl<T: Send + Sync> Send for CacheHandle<'_, T> {}
unsafe impl<T: Send + Sync> Sync for CacheHandle<'_, T> {}

impl<T> CacheHandle<'_, T> {
    pub fn value(&self) -> &T {
        // The pin guarantees the entry is alive, and values are immutable
        // after insert.
        unsafe { (*self.entry.as_ptr()).value.as_ref().unwrap() }
    }

    pub fn key(&self) -> &[u8] {
        unsafe { &(*self.entry.as_ptr()).key }
    }
}

impl<T> Deref for CacheHandle<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value()
    }
}

impl<T> Drop for CacheHandle<'_, T> {
    fn drop(&mut self) {
        unsafe {
            self.shard.inner.lock().unref(self.entry.as_ptr());
        }
    }
}
