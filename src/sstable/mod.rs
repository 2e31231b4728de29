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

//! Sorted-Table File Format
//!
//! The physical format of immutable sorted tables (SSTs):
//!
//! - `block.rs`: prefix-compressed block builder and reader with restart
//!   points
//! - `filter_block.rs`: per-table filter sidecar, one filter per 2 KiB of
//!   data-block offsets
//! - `format.rs`: block handles, the 48-byte footer, and the checksummed
//!   block loader

pub mod block;
pub mod filter_block;
pub mod format;

pub use block::{Block, BlockBuilder, BlockIter, DEFAULT_RESTART_INTERVAL};
pub use filter_block::{FilterBlockBuilder, FilterBlockReader, FILTER_BASE_LG};
pub use format::{
    read_block, BlockContents, BlockData, BlockHandle, CompressionType, Footer, ReadOptions,
    BLOCK_TRAILER_SIZE, TABLE_MAGIC,
};
