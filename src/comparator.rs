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

//! Key Ordering Capability
//!
//! Blocks and tables are sorted by a caller-supplied total order over byte
//! strings. The comparator is passed in at construction rather than
//! subclassed; a table must always be read with the comparator it was
//! written with.

use std::cmp::Ordering;

/// A total order over byte strings.
pub trait Comparator: Send + Sync {
    /// Name of the ordering. Persisted by higher layers to detect a table
    /// being opened with the wrong comparator.
    fn name(&self) -> &'static str;

    /// Three-way comparison of two keys.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// The default ordering: plain lexicographic byte comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn name(&self) -> &'static str {
        "emberdb.BytewiseComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytewise_order() {
        let cmp = BytewiseComparator;
        assert_eq!(cmp.compare(b"a", b"a"), Ordering::Equal);
        assert_eq!(cmp.compare(b"a", b"b"), Ordering::Less);
        assert_eq!(cmp.compare(b"b", b"a"), Ordering::Greater);
        // Prefixes sort first.
        assert_eq!(cmp.compare(b"app", b"apple"), Ordering::Less);
        // Comparison is unsigned bytewise.
        assert_eq!(cmp.compare(&[0x7f], &[0x80]), Ordering::Less);
    }
}
