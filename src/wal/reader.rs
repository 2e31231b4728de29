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

//! Log Reader
//!
//! Reassembles the records written by [`super::LogWriter`]. Unlike every
//! other reader in this crate, the log reader tolerates corruption: a bad
//! checksum, length, or fragment sequence is logged and skipped — the log
//! is the one file that is routinely torn by a crash mid-write — and
//! reading continues at the next intact record.

use byteorder::{ByteOrder, LittleEndian};
use tracing::warn;

use crate::crc32c;
use crate::env::SequentialFile;
use crate::error::Result;

use super::{RecordType, BLOCK_SIZE, HEADER_SIZE};

/// Outcome of reading one physical fragment.
enum Physical {
    Fragment(RecordType, Vec<u8>),
    /// Zero-filled block tail or damaged fragment; skipped.
    Bad,
    Eof,
}

/// Reads records back from a log file in write order.
pub struct LogReader<F: SequentialFile> {
    file: F,
    verify_checksums: bool,
    /// Bytes of the current block not yet consumed.
    buffer: Vec<u8>,
    /// Consumption cursor into `buffer`.
    pos: usize,
    /// The file is exhausted (last read returned a short block).
    eof: bool,
}

impl<F: SequentialFile> LogReader<F> {
    pub fn new(file: F, verify_checksums: bool) -> Self {
        LogReader {
            file,
            verify_checksums,
            buffer: Vec::new(),
            pos: 0,
            eof: false,
        }
    }

    /// Next complete record, or `None` at end of log.
    ///
    /// Damaged fragments are reported through `tracing` and skipped; only
    /// I/O errors from the underlying file surface as `Err`.
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut assembling = false;
        let mut record = Vec::new();

        loop {
            match self.read_physical_record()? {
                Physical::Fragment(RecordType::Full, fragment) => {
                    if assembling {
                        warn!("partial record without end; dropping fragments");
                    }
                    return Ok(Some(fragment));
                }
                Physical::Fragment(RecordType::First, fragment) => {
                    if assembling {
                        warn!("partial record without end; dropping fragments");
                    }
                    record = fragment;
                    assembling = true;
                }
                Physical::Fragment(RecordType::Middle, fragment) => {
                    if !assembling {
                        warn!("missing start of fragmented record; skipping");
                    } else {
                        record.extend_from_slice(&fragment);
                    }
                }
                Physical::Fragment(RecordType::Last, fragment) => {
                    if !assembling {
                        warn!("missing start of fragmented record; skipping");
                    } else {
                        record.extend_from_slice(&fragment);
                        return Ok(Some(record));
                    }
                }
                Physical::Bad => {
                    if assembling {
                        warn!("error mid-record; dropping fragments");
                        assembling = false;
                        record.clear();
                    }
                }
                Physical::Eof => {
                    // A record cut off by EOF means the writer crashed
                    // mid-write; the tail is silently discarded.
                    return Ok(None);
                }
            }
        }
    }

    fn read_physical_record(&mut self) -> Result<Physical> {
        loop {
            if self.buffer.len() - self.pos < HEADER_SIZE {
                if self.eof {
                    // The leftover is a truncated header from a torn write.
                    self.buffer.clear();
                    self.pos = 0;
                    return Ok(Physical::Eof);
                }
                // Skipped block tail; refill with the next block.
                self.buffer.resize(BLOCK_SIZE, 0);
                self.pos = 0;
                let mut filled = 0;
                while filled < BLOCK_SIZE {
                    let n = self.file.read(&mut self.buffer[filled..])?;
                    if n == 0 {
                        self.eof = true;
                        break;
                    }
                    filled += n;
                }
                self.buffer.truncate(filled);
                continue;
            }

            let header = &self.buffer[self.pos..];
            let masked_crc = LittleEndian::read_u32(&header[0..4]);
            let length = LittleEndian::read_u16(&header[4..6]) as usize;
            let type_byte = header[6];

            if HEADER_SIZE + length > self.buffer.len() - self.pos {
                let had_eof = self.eof;
                self.buffer.clear();
                self.pos = 0;
                if !had_eof {
                    warn!(length, "bad record length; skipping block");
                    return Ok(Physical::Bad);
                }
                // Length field points past a truncated final block.
                return Ok(Physical::Eof);
            }

            if type_byte == 0 && length == 0 {
                // Zero-filled region (pre-allocated space); skip the rest
                // of this block without logging.
                self.buffer.clear();
                self.pos = 0;
                return Ok(Physical::Bad);
            }

            let payload_start = self.pos + HEADER_SIZE;
            let payload = &self.buffer[payload_start..payload_start + length];

            if self.verify_checksums {
                let expected = crc32c::unmask(masked_crc);
                let actual = crc32c::value_of_parts(&[&[type_byte], payload]);
                if expected != actual {
                    // The length field itself may be damaged, hiding the
                    // real fragment boundaries; drop the whole block.
                    self.buffer.clear();
                    self.pos = 0;
                    warn!("checksum mismatch; skipping block");
                    return Ok(Physical::Bad);
                }
            }

            let Some(record_type) = RecordType::from_u8(type_byte) else {
                self.buffer.clear();
                self.pos = 0;
                warn!(type_byte, "unknown record type; skipping block");
                return Ok(Physical::Bad);
            };

            let fragment = payload.to_vec();
            self.pos += HEADER_SIZE + length;
            return Ok(Physical::Fragment(record_type, fragment));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::LogWriter;
    use super::*;
    use crate::env::WritableFile;

    #[derive(Default)]
    struct VecFile {
        data: Vec<u8>,
    }

    impl WritableFile for &mut VecFile {
        fn append(&mut self, data: &[u8]) -> Result<()> {
            self.data.extend_from_slice(data);
            Ok(())
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
        fn sync(&mut self) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct SliceFile<'a> {
        data: &'a [u8],
    }

    impl SequentialFile for SliceFile<'_> {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let n = buf.len().min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
        fn skip(&mut self, n: u64) -> Result<()> {
            self.data = &self.data[(n as usize).min(self.data.len())..];
            Ok(())
        }
    }

    fn write_log(records: &[&[u8]]) -> Vec<u8> {
        let mut file = VecFile::default();
        let mut writer = LogWriter::new(&mut file);
        for r in records {
            writer.add_record(r).unwrap();
        }
        file.data
    }

    fn read_all(data: &[u8]) -> Vec<Vec<u8>> {
        let mut reader = LogReader::new(SliceFile { data }, true);
        let mut out = Vec::new();
        while let Some(record) = reader.read_record().unwrap() {
            out.push(record);
        }
        out
    }

    #[test]
    fn test_roundtrip_simple() {
        let records: Vec<&[u8]> = vec![b"foo", b"bar", b"", b"xyzzy"];
        let log = write_log(&records);
        assert_eq!(read_all(&log), records);
    }

    #[test]
    fn test_roundtrip_boundary_straddle() {
        let big = vec![b'b'; 32760];
        let records: Vec<&[u8]> = vec![&[b'a'; 10], &big, &[b'c'; 5]];
        let log = write_log(&records);
        let out = read_all(&log);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], &[b'a'; 10][..]);
        assert_eq!(out[1], big);
        assert_eq!(out[2], &[b'c'; 5][..]);
    }

    #[test]
    fn test_roundtrip_many_sizes() {
        let payloads: Vec<Vec<u8>> = (0..40)
            .map(|i| {
                let len = (i * 3331) % (BLOCK_SIZE * 2);
                (0..len).map(|j| (i + j) as u8).collect()
            })
            .collect();
        let refs: Vec<&[u8]> = payloads.iter().map(|p| p.as_slice()).collect();
        let log = write_log(&refs);
        assert_eq!(read_all(&log), payloads);
    }

    #[test]
    fn test_reopened_log_resumes_mid_block() {
        let mut file = VecFile::default();
        {
            let mut writer = LogWriter::new(&mut file);
            writer.add_record(b"before close").unwrap();
        }
        let len = file.data.len() as u64;
        {
            let mut writer = LogWriter::with_offset(&mut file, len);
            writer.add_record(b"after reopen").unwrap();
        }
        let out = read_all(&file.data);
        assert_eq!(out, vec![b"before close".to_vec(), b"after reopen".to_vec()]);
    }

    #[test]
    fn test_truncated_tail_is_dropped() {
        let log = write_log(&[b"keep", &[b'x'; 40000]]);
        // Cut the log mid-way through the second record's LAST fragment.
        let cut = &log[..BLOCK_SIZE + 100];
        assert_eq!(read_all(cut), vec![b"keep".to_vec()]);
    }

    #[test]
    fn test_corrupt_block_is_skipped() {
        // Two records exactly filling block 1, one more in block 2.
        let filler = vec![b'f'; BLOCK_SIZE - 2 * HEADER_SIZE - b"doomed".len()];
        let mut log = write_log(&[b"doomed", &filler, b"survivor"]);
        // Damage the first record's payload.
        log[HEADER_SIZE] ^= 0x01;

        // The whole first block is dropped, the second survives.
        assert_eq!(read_all(&log), vec![b"survivor".to_vec()]);
    }

    #[test]
    fn test_zero_tail_skipped_silently() {
        // A log whose final block is all zeros (pre-allocated space).
        let mut log = write_log(&[b"only"]);
        log.resize(BLOCK_SIZE * 2, 0);
        assert_eq!(read_all(&log), vec![b"only".to_vec()]);
    }
}
