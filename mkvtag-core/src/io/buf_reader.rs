// MkvTag
// Copyright (c) 2024 The Project MkvTag Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp;

use crate::errors::Result;

use super::{underrun_error, ReadBytes};

/// A `BufReader` reads bytes from a byte buffer.
pub struct BufReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BufReader<'a> {
    /// Instantiates a new `BufReader` with a given byte buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        BufReader { buf, pos: 0 }
    }

    /// The number of bytes available for reading.
    pub fn bytes_available(&self) -> u64 {
        (self.buf.len() - self.pos) as u64
    }
}

impl<'a> ReadBytes for BufReader<'a> {
    #[inline(always)]
    fn read_byte(&mut self) -> Result<u8> {
        if self.buf.len() - self.pos < 1 {
            return underrun_error();
        }

        self.pos += 1;

        Ok(self.buf[self.pos - 1])
    }

    fn read_buf(&mut self, buf: &mut [u8]) -> Result<usize> {
        let len = cmp::min(self.buf.len() - self.pos, buf.len());

        if len == 0 && !buf.is_empty() {
            return underrun_error();
        }

        buf[..len].copy_from_slice(&self.buf[self.pos..self.pos + len]);
        self.pos += len;

        Ok(len)
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let len = buf.len();

        if self.buf.len() - self.pos < len {
            return underrun_error();
        }

        buf.copy_from_slice(&self.buf[self.pos..self.pos + len]);
        self.pos += len;

        Ok(())
    }

    fn ignore_bytes(&mut self, count: u64) -> Result<()> {
        if self.bytes_available() < count {
            return underrun_error();
        }

        self.pos += count as usize;

        Ok(())
    }

    fn pos(&self) -> u64 {
        self.pos as u64
    }
}

#[cfg(test)]
mod tests {
    use super::{BufReader, ReadBytes};

    #[test]
    fn verify_buf_reader() {
        let data = [0x1A, 0x45, 0xDF, 0xA3, 0x80, 0x00];

        let mut reader = BufReader::new(&data);

        assert_eq!(reader.read_byte().unwrap(), 0x1A);
        assert_eq!(reader.pos(), 1);

        let mut quad = [0u8; 4];
        reader.read_buf_exact(&mut quad).unwrap();
        assert_eq!(quad, [0x45, 0xDF, 0xA3, 0x80]);

        reader.ignore_bytes(1).unwrap();
        assert_eq!(reader.bytes_available(), 0);
        assert!(reader.read_byte().is_err());
    }
}
