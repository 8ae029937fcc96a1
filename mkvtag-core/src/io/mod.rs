// MkvTag
// Copyright (c) 2024 The Project MkvTag Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module implements byte-level I/O over seekable media.
//!
//! A [`MediaSource`] is any seekable byte medium a Matroska file may live on: a
//! real file, or an in-memory buffer in tests. [`BufferedStream`] wraps a
//! `MediaSource` with a small read buffer and lazy seek coalescing, and is the
//! only reader/writer the rest of the library uses. [`BufReader`] consumes a
//! `&[u8]` and exists so byte-level decoders can be exercised without a stream.

use std::fs::File;
use std::io;

use crate::errors::{end_of_stream_error, Result};

mod buf_reader;
mod buffered_stream;

pub use buf_reader::BufReader;
pub use buffered_stream::{BufferedStream, BufferedStreamOptions};

/// `MediaSource` is a composite trait of [`std::io::Read`], [`std::io::Write`]
/// and [`std::io::Seek`]. A source *must* implement this trait to be used by
/// [`BufferedStream`].
///
/// Writing is an optional capability: sources backing a read-only open are
/// never written to, so a source may implement `Write` by failing.
pub trait MediaSource: io::Read + io::Write + io::Seek + Send + Sync {
    /// Returns if the source is seekable. This may be an expensive operation.
    fn is_seekable(&self) -> bool;

    /// Returns the length in bytes, if available. This may be an expensive
    /// operation.
    fn byte_len(&self) -> Option<u64>;

    /// Issues a durability barrier: any bytes written so far reach the
    /// underlying medium before this returns.
    fn sync(&mut self) -> io::Result<()>;
}

impl MediaSource for File {
    /// Returns if the `File` backing the `MediaSource` is seekable.
    ///
    /// Note: This operation involves querying the underlying file descriptor
    /// for information and may be moderately expensive. Therefore it is
    /// recommended to cache this value if used often.
    fn is_seekable(&self) -> bool {
        // If the file's metadata is available, and the file is a regular file
        // (i.e., not a FIFO, etc.), then the MediaSource will be seekable.
        // Otherwise assume it is not. Note that metadata() follows symlinks.
        match self.metadata() {
            Ok(metadata) => metadata.is_file(),
            _ => false,
        }
    }

    /// Returns the length in bytes of the `File` backing the `MediaSource`.
    fn byte_len(&self) -> Option<u64> {
        match self.metadata() {
            Ok(metadata) => Some(metadata.len()),
            _ => None,
        }
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

impl MediaSource for io::Cursor<Vec<u8>> {
    /// Always returns true since a `io::Cursor<Vec<u8>>` is always seekable.
    fn is_seekable(&self) -> bool {
        true
    }

    /// Returns the length in bytes of the `io::Cursor<Vec<u8>>` backing the
    /// `MediaSource`.
    fn byte_len(&self) -> Option<u64> {
        Some(self.get_ref().len() as u64)
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// `ReadBytes` provides methods to read bytes from a stream or buffer.
pub trait ReadBytes {
    /// Reads a single byte and returns it or an error.
    fn read_byte(&mut self) -> Result<u8>;

    /// Reads up-to the number of bytes required to fill `buf`, returning the
    /// number actually read. A read of 0 bytes into a non-empty buffer is an
    /// end-of-stream error.
    fn read_buf(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Reads exactly the number of bytes required to fill `buf` or returns an
    /// error.
    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Reads exactly the number of bytes requested, and returns a boxed slice
    /// of the data or an error.
    fn read_boxed_slice_exact(&mut self, len: usize) -> Result<Box<[u8]>> {
        let mut buf = vec![0u8; len];
        self.read_buf_exact(&mut buf)?;
        Ok(buf.into_boxed_slice())
    }

    /// Ignores the specified number of bytes or returns an error.
    fn ignore_bytes(&mut self, count: u64) -> Result<()>;

    /// Gets the position of the stream.
    fn pos(&self) -> u64;
}

impl<R: ReadBytes> ReadBytes for &mut R {
    #[inline(always)]
    fn read_byte(&mut self) -> Result<u8> {
        (*self).read_byte()
    }

    #[inline(always)]
    fn read_buf(&mut self, buf: &mut [u8]) -> Result<usize> {
        (*self).read_buf(buf)
    }

    #[inline(always)]
    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        (*self).read_buf_exact(buf)
    }

    #[inline(always)]
    fn ignore_bytes(&mut self, count: u64) -> Result<()> {
        (*self).ignore_bytes(count)
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        (**self).pos()
    }
}

pub(crate) fn underrun_error<T>() -> Result<T> {
    end_of_stream_error()
}
