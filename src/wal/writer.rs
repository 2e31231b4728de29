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

//! Log Writer

use byteorder::{ByteOrder, LittleEndian};

use crate::crc32c;
use crate::env::WritableFile;
use crate::error::Result;

use super::{RecordType, BLOCK_SIZE, HEADER_SIZE};

/// Appends framed records to a log file. Single writer per log.
pub struct LogWriter<W: WritableFile> {
    dest: W,
    /// Write position within the current 32 KiB block, in `[0, BLOCK_SIZE)`.
    block_offset: usize,
}

impl<W: WritableFile> LogWriter<W> {
    /// Writer for a fresh log file.
    pub fn new(dest: W) -> Self {
        LogWriter {
            dest,
            block_offset: 0,
        }
    }

    /// Writer resuming a log whose current length is `dest_length`, e.g.
    /// after reopening for append.
    pub fn with_offset(dest: W, dest_length: u64) -> Self {
        LogWriter {
            dest,
            block_offset: (dest_length % BLOCK_SIZE as u64) as usize,
        }
    }

    /// Append one record; it is flushed to the OS before returning.
    ///
    /// An empty payload is legal and produces a zero-length FULL fragment.
    pub fn add_record(&mut self, payload: &[u8]) -> Result<()> {
        let mut left = payload;
        let mut begin = true;

        // Emit at least one fragment even for an empty record.
        loop {
            let leftover = BLOCK_SIZE - self.block_offset;
            if leftover < HEADER_SIZE {
                // Too little room for a header: zero-fill and start a new
                // block. Readers skip these tails.
                if leftover > 0 {
                    const ZEROES: [u8; HEADER_SIZE - 1] = [0; HEADER_SIZE - 1];
                    self.dest.append(&ZEROES[..leftover])?;
                }
                self.block_offset = 0;
            }
            debug_assert!(BLOCK_SIZE - self.block_offset >= HEADER_SIZE);

            let avail = BLOCK_SIZE - self.block_offset - HEADER_SIZE;
            let fragment_length = left.len().min(avail);
            let end = fragment_length == left.len();
            let record_type = match (begin, end) {
                (true, true) => RecordType::Full,
                (true, false) => RecordType::First,
                (false, true) => RecordType::Last,
                (false, false) => RecordType::Middle,
            };

            let (fragment, rest) = left.split_at(fragment_length);
            self.emit_physical_record(record_type, fragment)?;
            left = rest;
            begin = false;
            if left.is_empty() {
                return Ok(());
            }
        }
    }

    /// Force everything written so far to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.dest.sync()
    }

    fn emit_physical_record(&mut self, ty: RecordType, fragment: &[u8]) -> Result<()> {
        debug_assert!(fragment.len() <= u16::MAX as usize);
        debug_assert!(self.block_offset + HEADER_SIZE + fragment.len() <= BLOCK_SIZE);

        let crc = crc32c::value_of_parts(&[&[ty as u8], fragment]);

        let mut header = [0u8; HEADER_SIZE];
        LittleEndian::write_u32(&mut header[0..4], crc32c::mask(crc));
        LittleEndian::write_u16(&mut header[4..6], fragment.len() as u16);
        header[6] = ty as u8;

        self.dest.append(&header)?;
        self.dest.append(fragment)?;
        self.dest.flush()?;
        self.block_offset += HEADER_SIZE + fragment.len();
        Ok(())
    }
}
