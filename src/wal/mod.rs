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

//! Write-Ahead Log Framing
//!
//! The log is a stream of fixed-size 32 KiB physical blocks. Each block
//! holds zero or more records with a 7-byte header:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │ masked_crc: u32 LE │ length: u16 LE │ type: u8      │
//! ├─────────────────────────────────────────────────────┤
//! │ payload[length]                                     │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! A record larger than the space left in a block is split into
//! FIRST/MIDDLE/LAST fragments; a record that fits whole is FULL. Block
//! tails shorter than a header are zero-filled and skipped on read. The
//! CRC covers the type byte and the payload, masked for storage.
//!
//! - `writer`: fragments records into blocks
//! - `reader`: reassembles records, skipping damaged blocks

pub mod reader;
pub mod writer;

pub use reader::LogReader;
pub use writer::LogWriter;

/// Size of one physical log block.
pub const BLOCK_SIZE: usize = 32 * 1024;

/// Bytes of framing before each fragment's payload.
pub const HEADER_SIZE: usize = 7;

/// Fragment type stored in the record header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// A whole record in one fragment.
    Full = 1,
    /// First fragment of a split record.
    First = 2,
    /// Interior fragment of a split record.
    Middle = 3,
    /// Final fragment of a split record.
    Last = 4,
}

impl RecordType {
    pub(crate) fn from_u8(value: u8) -> Option<RecordType> {
        match value {
            1 => Some(RecordType::Full),
            2 => Some(RecordType::First),
            3 => Some(RecordType::Middle),
            4 => Some(RecordType::Last),
            _ => None,
        }
    }
}
