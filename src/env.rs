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

//! File Capabilities
//!
//! The storage substrate consumes three narrow file interfaces rather than
//! a filesystem: an append-only writable file (log and table output), a
//! sequential reader (log input), and a random-access reader (table
//! input). Each has a std-fs implementation here; the random-access
//! capability additionally has a memory-mapped implementation that hands
//! out zero-copy views.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(windows)]
use std::os::windows::fs::FileExt;

use memmap2::Mmap;

use crate::error::{Error, Result};

/// An append-only file. A log or table file has exactly one writer.
pub trait WritableFile {
    /// Append `data` at the current end of file.
    fn append(&mut self, data: &[u8]) -> Result<()>;
    /// Push buffered bytes to the OS.
    fn flush(&mut self) -> Result<()>;
    /// Force written bytes to stable storage.
    fn sync(&mut self) -> Result<()>;
    /// Flush and close. The file must not be used afterwards.
    fn close(&mut self) -> Result<()>;
}

/// A file read front to back, used by the log reader.
pub trait SequentialFile {
    /// Read up to `buf.len()` bytes, returning the count; 0 means EOF.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    /// Skip `n` bytes without reading them.
    fn skip(&mut self, n: u64) -> Result<()>;
}

/// Outcome of a random-access read.
pub enum ReadResult {
    /// The requested bytes were copied into the caller's scratch buffer.
    Copied,
    /// The file returned a zero-copy view of its memory mapping; the
    /// scratch buffer was not touched.
    Mapped(MappedSlice),
}

/// A shared view into a memory-mapped file region.
///
/// Cloning is cheap; the mapping stays alive as long as any view does.
#[derive(Debug, Clone)]
pub struct MappedSlice {
    map: Arc<Mmap>,
    offset: usize,
    len: usize,
}

impl MappedSlice {
    pub fn slice(&self, offset: usize, len: usize) -> MappedSlice {
        assert!(offset + len <= self.len);
        MappedSlice {
            map: Arc::clone(&self.map),
            offset: self.offset + offset,
            len,
        }
    }
}

impl AsRef<[u8]> for MappedSlice {
    fn as_ref(&self) -> &[u8] {
        &self.map[self.offset..self.offset + self.len]
    }
}

/// A file read at arbitrary offsets. Tables are immutable once written, so
/// many readers may share one instance.
pub trait RandomAccessFile: Send + Sync {
    /// Read exactly `n` bytes starting at `offset`.
    ///
    /// On success either fills `scratch[..n]` and returns
    /// [`ReadResult::Copied`], or returns a zero-copy
    /// [`ReadResult::Mapped`] view. Reads past end of file fail.
    fn read(&self, offset: u64, n: usize, scratch: &mut Vec<u8>) -> Result<ReadResult>;
}

/// Buffered append-only writer over a std file.
pub struct FileWriter {
    file: BufWriter<File>,
}

impl FileWriter {
    /// Create (or truncate) `path` for writing.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(FileWriter {
            file: BufWriter::new(file),
        })
    }

    /// Open `path` for appending, keeping existing contents.
    pub fn append_to<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(FileWriter {
            file: BufWriter::new(file),
        })
    }
}

impl WritableFile for FileWriter {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_data()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

/// Sequential reader over a std file.
pub struct FileReader {
    file: File,
}

impl FileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(FileReader {
            file: File::open(path)?,
        })
    }
}

impl SequentialFile for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf)?)
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        self.file.seek(SeekFrom::Current(n as i64))?;
        Ok(())
    }
}

/// Positional-read implementation backed by pread; no shared cursor, so it
/// is safe under concurrent readers.
pub struct StdRandomAccessFile {
    file: File,
}

impl StdRandomAccessFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(StdRandomAccessFile {
            file: File::open(path)?,
        })
    }
}

impl RandomAccessFile for StdRandomAccessFile {
    fn read(&self, offset: u64, n: usize, scratch: &mut Vec<u8>) -> Result<ReadResult> {
        scratch.resize(n, 0);
        #[cfg(unix)]
        self.file.read_exact_at(&mut scratch[..n], offset)?;
        #[cfg(windows)]
        {
            let mut done = 0;
            while done < n {
                let r = self.file.seek_read(&mut scratch[done..n], offset + done as u64)?;
                if r == 0 {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "short read",
                    )));
                }
                done += r;
            }
        }
        Ok(ReadResult::Copied)
    }
}

/// Memory-mapped implementation; reads are zero-copy views into the map.
pub struct MmapFile {
    map: Arc<Mmap>,
}

impl MmapFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: table files are immutable once finalized; the map is
        // never written through and outlives every view via the Arc.
        let map = unsafe { Mmap::map(&file)? };
        Ok(MmapFile { map: Arc::new(map) })
    }

    /// File length in bytes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.len() == 0
    }
}

impl RandomAccessFile for MmapFile {
    fn read(&self, offset: u64, n: usize, _scratch: &mut Vec<u8>) -> Result<ReadResult> {
        let offset = offset as usize;
        if offset + n > self.map.len() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read past end of mapped file",
            )));
        }
        Ok(ReadResult::Mapped(MappedSlice {
            map: Arc::clone(&self.map),
            offset,
            len: n,
        }))
    }
}
