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

//! Masked CRC32C Checksums
//!
//! All checksums stored on disk by this crate are Castagnoli CRCs run
//! through a masking transform. Masking exists because we sometimes store
//! a CRC inside data whose CRC is later computed; storing the raw value
//! would create degenerate fixed points.
//!
//! Writers store `mask(crc)`; readers recover the raw value with
//! [`unmask`] before comparing.

use crc::{Crc, CRC_32_ISCSI};

/// Castagnoli polynomial engine (the ISCSI parameter set).
const CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

const MASK_DELTA: u32 = 0xa282_ead8;

/// CRC32C of `data`.
pub fn value(data: &[u8]) -> u32 {
    CASTAGNOLI.checksum(data)
}

/// CRC32C of the concatenation of `parts`, computed without materializing it.
pub fn value_of_parts(parts: &[&[u8]]) -> u32 {
    let mut digest = CASTAGNOLI.digest();
    for part in parts {
        digest.update(part);
    }
    digest.finalize()
}

/// Transform `crc` into a value safe to store alongside its own input.
pub fn mask(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}

/// Inverse of [`mask`].
pub fn unmask(masked: u32) -> u32 {
    masked.wrapping_sub(MASK_DELTA).rotate_left(15)
}
