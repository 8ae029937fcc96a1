// MkvTag
// Copyright (c) 2024 The Project MkvTag Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! EBML serialization into in-memory byte vectors. Elements are assembled
//! bottom-up: leaf writers append `ID || size VINT || content`, master writers
//! append only the header and leave the content to the caller.

use mkvtag_core::errors::{Error, Result};

use crate::element_ids;
use crate::ebml::{vint_max, vint_size};

/// Encoded width of an element ID. IDs retain their marker bits, so the width
/// is simply the number of significant bytes.
pub(crate) fn id_len(id: u32) -> u8 {
    if id <= 0xFF {
        1
    }
    else if id <= 0xFFFF {
        2
    }
    else if id <= 0xFF_FFFF {
        3
    }
    else {
        4
    }
}

/// Appends a raw element ID.
pub(crate) fn write_id(buf: &mut Vec<u8>, id: u32) {
    let len = id_len(id);
    for i in (0..len).rev() {
        buf.push((id >> (8 * i)) as u8);
    }
}

/// Encodes `value` as a VINT of exactly `length` bytes into `out`. Errors if
/// the value does not fit that width.
pub(crate) fn vint_encode_fixed(value: u64, length: u8, out: &mut [u8; 8]) -> Result<()> {
    if length < 1 || length > 8 {
        return Err(Error::InvalidArg);
    }

    if value > vint_max(length) {
        return Err(Error::VintOverflow);
    }

    let mut v = value;
    for i in (0..length as usize).rev() {
        out[i] = (v & 0xFF) as u8;
        v >>= 8;
    }

    out[0] |= 0x80 >> (length - 1);

    Ok(())
}

/// Appends a minimum-length size VINT.
pub(crate) fn write_size(buf: &mut Vec<u8>, size: u64) -> Result<()> {
    let length = vint_size(size);
    if length == 0 {
        return Err(Error::VintOverflow);
    }

    let mut bytes = [0u8; 8];
    vint_encode_fixed(size, length, &mut bytes)?;
    buf.extend_from_slice(&bytes[..length as usize]);

    Ok(())
}

/// Appends a master element header: ID and content-size VINT only.
pub(crate) fn write_master_header(buf: &mut Vec<u8>, id: u32, content_size: u64) -> Result<()> {
    write_id(buf, id);
    write_size(buf, content_size)
}

fn unsigned_data_len(value: u64) -> u8 {
    if value == 0 {
        0
    }
    else {
        ((64 - value.leading_zeros() + 7) / 8) as u8
    }
}

/// Appends an unsigned integer element in minimum big-endian bytes. A zero
/// value is still written with one data byte so defaulted fields that must be
/// present stay present.
pub(crate) fn write_unsigned(buf: &mut Vec<u8>, id: u32, value: u64) -> Result<()> {
    let len = unsigned_data_len(value).max(1);

    write_id(buf, id);
    write_size(buf, u64::from(len))?;

    for i in (0..len).rev() {
        buf.push((value >> (8 * i)) as u8);
    }

    Ok(())
}

fn signed_data_len(value: i64) -> u8 {
    // Smallest width whose two's-complement range covers the value.
    for len in 1..8u8 {
        let bound = 1i64 << (8 * len - 1);
        if value >= -bound && value < bound {
            return len;
        }
    }
    8
}

/// Appends a signed integer element in the minimum bytes that preserve the
/// two's-complement value.
pub(crate) fn write_signed(buf: &mut Vec<u8>, id: u32, value: i64) -> Result<()> {
    let len = signed_data_len(value);

    write_id(buf, id);
    write_size(buf, u64::from(len))?;

    for i in (0..len).rev() {
        buf.push((value >> (8 * i)) as u8);
    }

    Ok(())
}

/// Appends a UTF-8 string element. No terminator is written.
pub(crate) fn write_string(buf: &mut Vec<u8>, id: u32, value: &str) -> Result<()> {
    write_id(buf, id);
    write_size(buf, value.len() as u64)?;
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Appends a binary element.
pub(crate) fn write_binary(buf: &mut Vec<u8>, id: u32, data: &[u8]) -> Result<()> {
    write_id(buf, id);
    write_size(buf, data.len() as u64)?;
    buf.extend_from_slice(data);
    Ok(())
}

/// Appends a Void element whose total span, header included, is exactly
/// `total_size` bytes. The minimum Void is 2 bytes (1 byte ID + 1 byte size).
///
/// A given content size can be reached with more than one size-VINT width, so
/// the width is searched upward: a width whose minimum encoding matches is
/// used directly, and a width longer than the minimum pads the VINT up to
/// consume the slot exactly.
pub(crate) fn write_void(buf: &mut Vec<u8>, total_size: u64) -> Result<()> {
    if total_size < 2 {
        return Err(Error::InvalidArg);
    }

    buf.push(element_ids::VOID as u8);

    for size_len in 1..=8u8 {
        let content_size = match total_size.checked_sub(1 + u64::from(size_len)) {
            Some(size) => size,
            None => break,
        };

        if vint_size(content_size) <= size_len {
            let mut bytes = [0u8; 8];
            vint_encode_fixed(content_size, size_len, &mut bytes)?;
            buf.extend_from_slice(&bytes[..size_len as usize]);
            buf.resize(buf.len() + content_size as usize, 0);
            return Ok(());
        }
    }

    Err(Error::VintOverflow)
}

/// Total encoded span of an unsigned integer element.
pub(crate) fn unsigned_element_len(id: u32, value: u64) -> u64 {
    let data_len = u64::from(unsigned_data_len(value).max(1));
    u64::from(id_len(id)) + u64::from(vint_size(data_len)) + data_len
}

/// Total encoded span of a string element.
pub(crate) fn string_element_len(id: u32, value: &str) -> u64 {
    let data_len = value.len() as u64;
    u64::from(id_len(id)) + u64::from(vint_size(data_len)) + data_len
}

/// Encoded span of a master element header for the given content size.
pub(crate) fn master_header_len(id: u32, content_size: u64) -> u64 {
    u64::from(id_len(id)) + u64::from(vint_size(content_size))
}

/// Appends a complete `Seek` entry pointing `element_id` at a position
/// relative to the start of the Segment data.
pub(crate) fn write_seek_entry(
    buf: &mut Vec<u8>,
    element_id: u32,
    segment_relative_pos: u64,
) -> Result<()> {
    let mut inner = Vec::new();

    let mut id_bytes = Vec::new();
    write_id(&mut id_bytes, element_id);

    write_binary(&mut inner, element_ids::SEEK_ID, &id_bytes)?;
    write_unsigned(&mut inner, element_ids::SEEK_POSITION, segment_relative_pos)?;

    write_master_header(buf, element_ids::SEEK, inner.len() as u64)?;
    buf.extend_from_slice(&inner);

    Ok(())
}

#[cfg(test)]
mod tests {
    use mkvtag_core::io::BufReader;

    use super::*;
    use crate::ebml::{read_element_id, read_vint, vint_is_unknown};

    #[test]
    fn vint_round_trip() {
        // Values at and around every width boundary.
        let values = [
            0u64,
            1,
            126,
            127,
            128,
            16382,
            16383,
            (1 << 21) - 2,
            (1 << 21) - 1,
            (1 << 28) - 2,
            (1 << 35) - 2,
            (1 << 42) - 2,
            (1 << 49) - 2,
            (1 << 56) - 2,
        ];

        for value in values.iter() {
            let mut buf = Vec::new();
            write_size(&mut buf, *value).unwrap();

            let (decoded, len) = read_vint(BufReader::new(&buf)).unwrap();
            assert_eq!(decoded, *value);
            assert_eq!(len, vint_size(*value));
            assert_eq!(len as usize, buf.len());
            assert!(!vint_is_unknown(decoded, len));
        }
    }

    #[test]
    fn vint_fixed_widths() {
        // Every value re-encodes at any width from its minimum up to 8 bytes.
        let values = [0u64, 1, 126, 127, 300, 16383, 1 << 30];

        for value in values.iter() {
            for width in vint_size(*value)..=8 {
                let mut bytes = [0u8; 8];
                vint_encode_fixed(*value, width, &mut bytes).unwrap();

                let (decoded, len) = read_vint(BufReader::new(&bytes[..width as usize])).unwrap();
                assert_eq!(decoded, *value);
                assert_eq!(len, width);
            }
        }

        // Values never fit below their minimum width.
        let mut bytes = [0u8; 8];
        assert!(vint_encode_fixed(127, 1, &mut bytes).is_err());
        assert!(vint_encode_fixed(1 << 56, 8, &mut bytes).is_err());
    }

    #[test]
    fn element_id_round_trip() {
        for id in [0xEC_u32, 0x4DBB, 0x2AD7B1, 0x1A45DFA3].iter() {
            let mut buf = Vec::new();
            write_id(&mut buf, *id);
            assert_eq!(buf.len(), id_len(*id) as usize);

            let (decoded, len) = read_element_id(BufReader::new(&buf)).unwrap();
            assert_eq!(decoded, *id);
            assert_eq!(len, id_len(*id));
        }
    }

    #[test]
    fn unsigned_element_zero_still_one_byte() {
        let mut buf = Vec::new();
        write_unsigned(&mut buf, 0x4484, 0).unwrap();
        assert_eq!(buf, [0x44, 0x84, 0x81, 0x00]);
        assert_eq!(unsigned_element_len(0x4484, 0), buf.len() as u64);
    }

    #[test]
    fn unsigned_element_minimum_bytes() {
        let mut buf = Vec::new();
        write_unsigned(&mut buf, 0x68CA, 50).unwrap();
        assert_eq!(buf, [0x68, 0xCA, 0x81, 50]);

        let mut buf = Vec::new();
        write_unsigned(&mut buf, 0x68CA, 0x0102).unwrap();
        assert_eq!(buf, [0x68, 0xCA, 0x82, 0x01, 0x02]);
    }

    #[test]
    fn signed_element_minimum_bytes() {
        let mut buf = Vec::new();
        write_signed(&mut buf, 0xFB, -2).unwrap();
        assert_eq!(buf, [0xFB, 0x81, 0xFE]);

        let mut buf = Vec::new();
        write_signed(&mut buf, 0xFB, 128).unwrap();
        assert_eq!(buf, [0xFB, 0x82, 0x00, 0x80]);

        let mut buf = Vec::new();
        write_signed(&mut buf, 0xFB, -129).unwrap();
        assert_eq!(buf, [0xFB, 0x82, 0xFF, 0x7F]);
    }

    #[test]
    fn string_element() {
        let mut buf = Vec::new();
        write_string(&mut buf, 0x4282, "webm").unwrap();
        assert_eq!(buf, [0x42, 0x82, 0x84, b'w', b'e', b'b', b'm']);
        assert_eq!(string_element_len(0x4282, "webm"), buf.len() as u64);
    }

    #[test]
    fn void_element_exact_total_sizes() {
        // Every requested total from the 2 byte minimum through sizes that
        // straddle the 1/2 byte VINT boundary must come out exact.
        let mut totals: Vec<u64> = (2..=20).collect();
        totals.extend_from_slice(&[126, 127, 128, 129, 130, 1000, 4096, 65536]);

        for total in totals.iter() {
            let mut buf = Vec::new();
            write_void(&mut buf, *total).unwrap();
            assert_eq!(buf.len() as u64, *total, "total {}", total);
            assert_eq!(buf[0], 0xEC);

            // The declared content size must match the padding written.
            let (content, size_len) = read_vint(BufReader::new(&buf[1..])).unwrap();
            assert_eq!(1 + u64::from(size_len) + content, *total);
        }

        let mut buf = Vec::new();
        assert!(write_void(&mut buf, 0).is_err());
        let mut buf = Vec::new();
        assert!(write_void(&mut buf, 1).is_err());
    }

    #[test]
    fn seek_entry_layout() {
        let mut buf = Vec::new();
        write_seek_entry(&mut buf, 0x1254C367, 0x1000).unwrap();

        // Seek { SeekID { 12 54 C3 67 } SeekPosition { 10 00 } }
        assert_eq!(
            buf,
            [
                0x4D, 0xBB, 0x8C, 0x53, 0xAB, 0x84, 0x12, 0x54, 0xC3, 0x67, 0x53, 0xAC, 0x82,
                0x10, 0x00
            ]
        );
    }
}
