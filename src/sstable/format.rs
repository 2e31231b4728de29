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

//! Table Container Format
//!
//! A table file is a sequence of data blocks, a meta-index block, an index
//! block, and a fixed-size footer:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │ data block 0 │ trailer │ data block 1 │ trailer │ ...          │
//! ├────────────────────────────────────────────────────────────────┤
//! │ meta-index block │ trailer │ index block │ trailer             │
//! ├────────────────────────────────────────────────────────────────┤
//! │ Footer (48 bytes):                                             │
//! │   metaindex_handle │ index_handle │ zero padding │ magic:u64LE │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every block on disk is followed by a 5-byte trailer,
//! `compression_type:u8 | masked_crc32c:u32LE`, covering the payload plus
//! the type byte. [`read_block`] fetches one block through a
//! [`RandomAccessFile`], verifies the trailer, and undoes compression.

use byteorder::{ByteOrder, LittleEndian};

use crate::coding::{get_varint64, put_fixed32, put_varint64};
use crate::crc32c;
use crate::env::{MappedSlice, RandomAccessFile, ReadResult};
use crate::error::{Error, Result};

/// Magic number at the very end of every table file.
pub const TABLE_MAGIC: u64 = 0xdb47_7524_8b80_fb57;

/// Trailer after each block: one type byte plus a masked CRC.
pub const BLOCK_TRAILER_SIZE: usize = 5;

/// Per-block compression marker stored in the trailer.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None = 0,
    Snappy = 1,
}

/// Options controlling a single block read.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Verify the trailer checksum against the payload.
    pub verify_checksums: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            verify_checksums: true,
        }
    }
}

// =============================================================================
// Block Handle
// =============================================================================

/// Pointer to a block inside a table file: (offset, size), varint-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHandle {
    offset: u64,
    size: u64,
}

impl BlockHandle {
    /// Upper bound on the encoded length (two 10-byte varints).
    pub const MAX_ENCODED_LENGTH: usize = 10 + 10;

    pub fn new(offset: u64, size: u64) -> Self {
        BlockHandle { offset, size }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        put_varint64(dst, self.offset);
        put_varint64(dst, self.size);
    }

    /// Decode from the front of `input`, advancing past the handle.
    pub fn decode_from(input: &mut &[u8]) -> Result<BlockHandle> {
        let offset = get_varint64(input).map_err(|_| Error::corruption("bad block handle"))?;
        let size = get_varint64(input).map_err(|_| Error::corruption("bad block handle"))?;
        Ok(BlockHandle { offset, size })
    }
}

// =============================================================================
// Footer
// =============================================================================

/// Fixed-size trailer locating the meta-index and index blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub metaindex_handle: BlockHandle,
    pub index_handle: BlockHandle,
}

impl Footer {
    /// Encoded length: two maximal handles of padding space plus the magic.
    pub const ENCODED_LENGTH: usize = 2 * BlockHandle::MAX_ENCODED_LENGTH + 8;

    /// Append exactly [`Footer::ENCODED_LENGTH`] bytes to `dst`.
    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        let start = dst.len();
        self.metaindex_handle.encode_to(dst);
        self.index_handle.encode_to(dst);
        dst.resize(start + 2 * BlockHandle::MAX_ENCODED_LENGTH, 0);
        put_fixed32(dst, (TABLE_MAGIC & 0xffff_ffff) as u32);
        put_fixed32(dst, (TABLE_MAGIC >> 32) as u32);
        debug_assert_eq!(dst.len() - start, Self::ENCODED_LENGTH);
    }

    /// Decode a footer from exactly its trailing bytes.
    pub fn decode_from(input: &[u8]) -> Result<Footer> {
        if input.len() < Self::ENCODED_LENGTH {
            return Err(Error::corruption("footer too short"));
        }
        let magic_ptr = &input[Self::ENCODED_LENGTH - 8..];
        let magic_lo = LittleEndian::read_u32(magic_ptr) as u64;
        let magic_hi = LittleEndian::read_u32(&magic_ptr[4..]) as u64;
        let magic = (magic_hi << 32) | magic_lo;
        if magic != TABLE_MAGIC {
            return Err(Error::InvalidArgument(
                "not an sstable (bad magic number)".to_string(),
            ));
        }

        let mut handles = &input[..Self::ENCODED_LENGTH - 8];
        let metaindex_handle = BlockHandle::decode_from(&mut handles)?;
        let index_handle = BlockHandle::decode_from(&mut handles)?;
        // The remainder is padding.
        Ok(Footer {
            metaindex_handle,
            index_handle,
        })
    }
}

// =============================================================================
// Block Contents
// =============================================================================

/// The bytes of one loaded block.
#[derive(Debug)]
pub enum BlockData {
    /// Heap-allocated, exclusively owned.
    Owned(Vec<u8>),
    /// Zero-copy view of a memory-mapped table file.
    Mapped(MappedSlice),
}

impl BlockData {
    fn as_slice(&self) -> &[u8] {
        match self {
            BlockData::Owned(v) => v,
            BlockData::Mapped(m) => m.as_ref(),
        }
    }
}

/// A loaded block plus its caching disposition.
#[derive(Debug)]
pub struct BlockContents {
    pub data: BlockData,
    /// False when the data is backed by file-resident pages; caching those
    /// would hold the same bytes twice.
    pub cacheable: bool,
}

impl BlockContents {
    /// Owned, cacheable contents (the common path).
    pub fn owned(data: Vec<u8>) -> Self {
        BlockContents {
            data: BlockData::Owned(data),
            cacheable: true,
        }
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }
}

// =============================================================================
// Block Loader
// =============================================================================

/// Read the block identified by `handle` from `file`, verifying and
/// stripping its trailer and undoing compression.
pub fn read_block(
    file: &dyn RandomAccessFile,
    options: ReadOptions,
    handle: &BlockHandle,
) -> Result<BlockContents> {
    let n = handle.size() as usize;
    let mut scratch = Vec::new();
    let read = match file.read(handle.offset(), n + BLOCK_TRAILER_SIZE, &mut scratch) {
        Ok(r) => r,
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(Error::corruption("truncated block read"));
        }
        Err(e) => return Err(e),
    };

    match read {
        ReadResult::Mapped(view) => {
            let ty = check_trailer(view.as_ref(), n, options)?;
            match ty {
                CompressionType::None => {
                    // File handed back its own mapped pages: expose them
                    // without copying and tell the cache layer not to
                    // double-cache file-resident bytes.
                    Ok(BlockContents {
                        data: BlockData::Mapped(view.slice(0, n)),
                        cacheable: false,
                    })
                }
                CompressionType::Snappy => decompress_snappy(&view.as_ref()[..n]),
            }
        }
        ReadResult::Copied => {
            let ty = check_trailer(&scratch, n, options)?;
            match ty {
                CompressionType::None => {
                    scratch.truncate(n);
                    Ok(BlockContents::owned(scratch))
                }
                CompressionType::Snappy => decompress_snappy(&scratch[..n]),
            }
        }
    }
}

/// Validate length, checksum, and type byte of `payload | type | crc`,
/// returning the compression type.
fn check_trailer(raw: &[u8], n: usize, options: ReadOptions) -> Result<CompressionType> {
    if raw.len() != n + BLOCK_TRAILER_SIZE {
        return Err(Error::corruption("truncated block read"));
    }
    if options.verify_checksums {
        let stored = crc32c::unmask(LittleEndian::read_u32(&raw[n + 1..]));
        let actual = crc32c::value(&raw[..n + 1]);
        if stored != actual {
            return Err(Error::corruption("block checksum mismatch"));
        }
    }
    match raw[n] {
        0 => Ok(CompressionType::None),
        1 => Ok(CompressionType::Snappy),
        _ => Err(Error::corruption("bad block type")),
    }
}

fn decompress_snappy(compressed: &[u8]) -> Result<BlockContents> {
    let decompressed = snap::raw::Decoder::new()
        .decompress_vec(compressed)
        .map_err(|_| Error::corruption("corrupted compressed block contents"))?;
    Ok(BlockContents::owned(decompressed))
}
