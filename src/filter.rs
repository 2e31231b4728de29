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

//! Pluggable Filter Policy
//!
//! A filter is an opaque byte string produced from a set of keys that can
//! later answer "might this key be in the set?" with no false negatives.
//! Tables consult filters before touching data blocks, turning most
//! negative lookups into zero-I/O answers.
//!
//! The policy is a capability passed in at construction: two operations,
//! no subclassing. [`BloomFilterPolicy`] is the standard implementation.

/// Filter construction and query capability.
pub trait FilterPolicy: Send + Sync {
    /// Name of the policy. A filter produced under one name must never be
    /// queried under another.
    fn name(&self) -> &'static str;

    /// Append a filter summarizing `keys` to `dst`.
    fn create_filter(&self, keys: &[&[u8]], dst: &mut Vec<u8>);

    /// Whether `key` may be in the set `filter` was built from.
    ///
    /// Must return `true` for every key passed to the originating
    /// `create_filter` call; should usually return `false` otherwise.
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool;
}

/// Bloom filter policy with a configurable space budget.
#[derive(Debug, Clone, Copy)]
pub struct BloomFilterPolicy {
    bits_per_key: usize,
    /// Number of probes per key; ~bits_per_key * ln 2, clamped to [1, 30].
    k: usize,
}

impl BloomFilterPolicy {
    pub fn new(bits_per_key: usize) -> Self {
        let k = ((bits_per_key as f64) * 0.69).round() as usize;
        BloomFilterPolicy {
            bits_per_key,
            k: k.clamp(1, 30),
        }
    }
}

/// Double-hashing probe sequence seeded from one 64-bit hash of the key.
fn bloom_hash(key: &[u8]) -> (u64, u64) {
    let h = twox_hash::xxh3::hash64(key);
    let delta = h.rotate_right(17) | 1;
    (h, delta)
}

impl FilterPolicy for BloomFilterPolicy {
    fn name(&self) -> &'static str {
        "emberdb.BuiltinBloomFilter"
    }

    fn create_filter(&self, keys: &[&[u8]], dst: &mut Vec<u8>) {
        // Round up to a byte and enforce a floor so tiny key sets do not
        // produce filters with pathological false positive rates.
        let bits = (keys.len() * self.bits_per_key).max(64);
        let bytes = bits.div_ceil(8);
        let bits = bytes * 8;

        let start = dst.len();
        dst.resize(start + bytes, 0);
        for key in keys {
            let (mut h, delta) = bloom_hash(key);
            for _ in 0..self.k {
                let bit = (h % bits as u64) as usize;
                dst[start + bit / 8] |= 1 << (bit % 8);
                h = h.wrapping_add(delta);
            }
        }
        // Probe count rides along as the last byte so readers built with a
        // different bits_per_key still query correctly.
        dst.push(self.k as u8);
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        if filter.len() < 2 {
            return false;
        }
        let bits = (filter.len() - 1) * 8;
        let k = filter[filter.len() - 1] as usize;
        if k > 30 {
            // Reserved for future encodings; treat as a match.
            return true;
        }

        let (mut h, delta) = bloom_hash(key);
        for _ in 0..k {
            let bit = (h % bits as u64) as usize;
            if filter[bit / 8] & (1 << (bit % 8)) == 0 {
                return false;
            }
            h = h.wrapping_add(delta);
        }
        true
    }
}
