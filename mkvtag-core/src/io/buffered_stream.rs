// MkvTag
// Copyright (c) 2024 The Project MkvTag Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp;
use std::fs::{File, OpenOptions};
use std::io;
use std::io::SeekFrom;
use std::path::Path;

use crate::errors::{seek_error, Error, Result};

use super::{underrun_error, MediaSource, ReadBytes};

/// `BufferedStreamOptions` specifies the buffering behaviour of a
/// [`BufferedStream`].
pub struct BufferedStreamOptions {
    /// The read buffer size in bytes. Must be > 0.
    pub buffer_len: usize,
}

impl Default for BufferedStreamOptions {
    fn default() -> Self {
        BufferedStreamOptions { buffer_len: 8 * 1024 }
    }
}

/// `BufferedStream` is the reader and writer for all Matroska I/O in mkvtag.
///
/// It wraps a [`MediaSource`] with a single read buffer described by the
/// triple (`buf_offset`, `buf_len`, `buf_pos`): `buf_offset` is the absolute
/// file position of byte 0 of the buffer, `buf_len` the number of valid bytes,
/// and `buf_pos` the cursor within them. The logical stream position is always
/// `buf_offset + buf_pos`.
///
/// Seeks whose target lands inside the buffered window only move `buf_pos`;
/// no system call is issued. Structure scans hop between nearby element
/// headers constantly, so coalescing those seeks is the main win over reading
/// the source directly.
///
/// Before any write the underlying source is realigned to the logical
/// position, the write is issued in full, and the read buffer is invalidated
/// since its contents may be stale.
pub struct BufferedStream {
    /// The source medium.
    inner: Box<dyn MediaSource>,
    /// Whether writes are permitted.
    writable: bool,
    /// Tracked length of the medium, extended by writes past the end.
    file_len: u64,
    /// The read buffer.
    buf: Box<[u8]>,
    /// Absolute position of byte 0 of the buffer.
    buf_offset: u64,
    /// Number of valid bytes in the buffer.
    buf_len: usize,
    /// Cursor within the valid bytes, `0 <= buf_pos <= buf_len`.
    buf_pos: usize,
}

impl BufferedStream {
    /// Instantiates a new `BufferedStream` over `source`.
    pub fn new(source: Box<dyn MediaSource>, writable: bool, options: BufferedStreamOptions) -> Self {
        assert!(options.buffer_len > 0);

        let file_len = source.byte_len().unwrap_or(0);

        BufferedStream {
            inner: source,
            writable,
            file_len,
            buf: vec![0u8; options.buffer_len].into_boxed_slice(),
            buf_offset: 0,
            buf_len: 0,
            buf_pos: 0,
        }
    }

    /// Opens the file at `path` read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<BufferedStream> {
        let file = File::open(path)?;
        Ok(BufferedStream::new(Box::new(file), false, Default::default()))
    }

    /// Opens the file at `path` for reading and writing.
    pub fn open_rw<P: AsRef<Path>>(path: P) -> Result<BufferedStream> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(BufferedStream::new(Box::new(file), true, Default::default()))
    }

    /// Returns whether this stream permits writes.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Returns whether the underlying source is seekable.
    pub fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    /// Returns the tracked length of the medium in bytes.
    pub fn byte_len(&self) -> u64 {
        self.file_len
    }

    /// Seeks the stream. A target within the buffered window adjusts only the
    /// buffer cursor; any other target invalidates the buffer and seeks the
    /// source. A negative resolved target is a seek error.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(delta) => self.pos() as i64 + delta,
            SeekFrom::End(delta) => self.file_len as i64 + delta,
        };

        if target < 0 {
            return seek_error();
        }

        let target = target as u64;
        let buf_end = self.buf_offset + self.buf_len as u64;

        if target >= self.buf_offset && target <= buf_end {
            self.buf_pos = (target - self.buf_offset) as usize;
        }
        else {
            log::trace!("seek to {} outside buffered window", target);
            self.inner.seek(SeekFrom::Start(target)).map_err(|_| Error::SeekFailed)?;
            self.buf_offset = target;
            self.buf_len = 0;
            self.buf_pos = 0;
        }

        Ok(target)
    }

    /// Reads `buf.len()` bytes without advancing the stream position. Returns
    /// the number of bytes actually available.
    pub fn peek_buf(&mut self, buf: &mut [u8]) -> Result<usize> {
        let pos = self.pos();
        let read = self.read_buf(buf)?;
        self.seek(SeekFrom::Start(pos))?;
        Ok(read)
    }

    /// Writes all of `data` at the current position, extending the medium if
    /// the write passes its end. The stream position advances past the write.
    pub fn write_buf(&mut self, data: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(Error::ReadOnly);
        }

        // The source position trails the logical position by however much of
        // the read buffer is unconsumed. Realign before writing.
        let pos = self.pos();
        self.inner.seek(SeekFrom::Start(pos)).map_err(|_| Error::SeekFailed)?;
        self.inner.write_all(data).map_err(|_| Error::WriteFailed)?;

        // The buffered bytes may no longer match the medium.
        self.buf_offset = pos + data.len() as u64;
        self.buf_len = 0;
        self.buf_pos = 0;

        if self.buf_offset > self.file_len {
            self.file_len = self.buf_offset;
        }

        Ok(())
    }

    /// Flushes buffered writes and issues a durability barrier.
    pub fn flush(&mut self) -> Result<()> {
        if self.writable {
            self.inner.flush()?;
            self.inner.sync()?;
        }
        Ok(())
    }

    /// If the buffer is exhausted, refill it from the source at the logical
    /// position. A short fill is not an error; `buf_len == 0` afterwards
    /// means end of medium.
    fn fill_buf(&mut self) -> Result<()> {
        if self.buf_pos < self.buf_len {
            return Ok(());
        }

        let pos = self.pos();
        self.inner.seek(SeekFrom::Start(pos)).map_err(|_| Error::SeekFailed)?;

        self.buf_offset = pos;
        self.buf_pos = 0;
        self.buf_len = 0;

        loop {
            match self.inner.read(&mut self.buf) {
                Ok(count) => {
                    self.buf_len = count;
                    break;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}

impl ReadBytes for BufferedStream {
    #[inline(always)]
    fn read_byte(&mut self) -> Result<u8> {
        if self.buf_pos >= self.buf_len {
            self.fill_buf()?;
            if self.buf_len == 0 {
                return underrun_error();
            }
        }

        let byte = self.buf[self.buf_pos];
        self.buf_pos += 1;

        Ok(byte)
    }

    fn read_buf(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut read = 0;

        while read < buf.len() {
            if self.buf_pos >= self.buf_len {
                self.fill_buf()?;
                if self.buf_len == 0 {
                    break;
                }
            }

            let available = self.buf_len - self.buf_pos;
            let count = cmp::min(buf.len() - read, available);

            buf[read..read + count].copy_from_slice(&self.buf[self.buf_pos..self.buf_pos + count]);
            self.buf_pos += count;
            read += count;
        }

        if read == 0 && !buf.is_empty() {
            return underrun_error();
        }

        Ok(read)
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let len = buf.len();

        if len == 0 {
            return Ok(());
        }

        let read = self.read_buf(buf)?;

        // A short read signals truncation to the caller.
        if read != len {
            return underrun_error();
        }

        Ok(())
    }

    fn ignore_bytes(&mut self, count: u64) -> Result<()> {
        self.seek(SeekFrom::Current(count as i64))?;
        Ok(())
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        self.buf_offset + self.buf_pos as u64
    }
}
