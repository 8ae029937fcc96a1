// MkvTag
// Copyright (c) 2024 The Project MkvTag Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The tag-placement planner. Given a serialized Tags element it mutates the
//! file with the smallest possible shift of bytes, trying three strategies in
//! order and committing the first that fits:
//!
//! 1. rewrite the existing Tags slot, absorbing a Void element that
//!    immediately follows it;
//! 2. claim the largest Void recorded in the Segment prologue;
//! 3. append to the end of the Segment, patching the Segment's declared size
//!    in place and voiding out the old Tags element.
//!
//! A `NoSpace` from strategy 1 or 2 only means "try the next strategy"; any
//! other failure surfaces immediately. Strategy 3 issues several independent
//! writes and is not crash-atomic.

use std::io::SeekFrom;

use mkvtag_core::errors::{corrupt_error, Error, Result};
use mkvtag_core::io::{BufferedStream, ReadBytes};

use crate::ebml::{self, at_element_end, ElementHeader};
use crate::element_ids;
use crate::structure::MkvStructure;
use crate::tags::TagCollection;
use crate::writer;

/// Serializes `tags` and commits it to the file, updating the structure
/// record to match. Ends with a durability barrier.
pub(crate) fn write_tags(
    stream: &mut BufferedStream,
    structure: &mut MkvStructure,
    tags: &TagCollection,
) -> Result<()> {
    let tags_buf = tags.serialize()?;

    if structure.tags_pos.is_some() {
        match replace_existing_tags(stream, structure, &tags_buf) {
            Ok(()) => {
                log::debug!("tags rewritten in place");
                return stream.flush();
            }
            Err(Error::NoSpace) => (),
            Err(err) => return Err(err),
        }
    }

    match replace_void(stream, structure, &tags_buf) {
        Ok(()) => {
            log::debug!("tags written into a Void slot");
            return stream.flush();
        }
        Err(Error::NoSpace) => (),
        Err(err) => return Err(err),
    }

    append_tags(stream, structure, &tags_buf)?;
    log::debug!("tags appended to the Segment");

    stream.flush()
}

/// Writes the serialized Tags element at `pos` into a slot of `slot_len` total
/// bytes, filling the remainder with a Void of that exact span. A 1 byte
/// remainder cannot hold a Void and is filled with a single zero byte.
fn write_tags_at(
    stream: &mut BufferedStream,
    pos: u64,
    slot_len: u64,
    tags_buf: &[u8],
) -> Result<()> {
    if (tags_buf.len() as u64) > slot_len {
        return Err(Error::NoSpace);
    }

    stream.seek(SeekFrom::Start(pos))?;
    stream.write_buf(tags_buf)?;

    let remaining = slot_len - tags_buf.len() as u64;

    if remaining >= 2 {
        let mut void_buf = Vec::new();
        writer::write_void(&mut void_buf, remaining)?;
        stream.write_buf(&void_buf)?;
    }
    else if remaining == 1 {
        stream.write_buf(&[0])?;
    }

    Ok(())
}

/// Strategy 1: reuse the slot of the existing Tags element plus a Void that
/// immediately follows it.
fn replace_existing_tags(
    stream: &mut BufferedStream,
    structure: &mut MkvStructure,
    tags_buf: &[u8],
) -> Result<()> {
    let tags_pos = match structure.tags_pos {
        Some(pos) => pos,
        None => return Err(Error::NoSpace),
    };

    stream.seek(SeekFrom::Start(tags_pos))?;
    let existing = ElementHeader::read(stream)?;

    if existing.id != element_ids::TAGS {
        return corrupt_error("mkv: recorded Tags offset does not frame a Tags element");
    }

    let mut slot_len = existing.total_len();

    // Adjacent padding extends the slot.
    stream.seek(SeekFrom::Start(existing.end_pos))?;
    if let Ok(next) = ElementHeader::peek(stream) {
        if next.id == element_ids::VOID {
            slot_len += next.total_len();
        }
    }

    write_tags_at(stream, tags_pos, slot_len, tags_buf)?;

    // The recorded Void may have been absorbed into the rewritten span.
    if let Some(void) = structure.largest_void {
        if void.pos >= tags_pos && void.pos < tags_pos + slot_len {
            structure.largest_void = None;
        }
    }

    update_seek_head_tags(stream, structure, tags_pos)
}

/// Strategy 2: claim the largest Void recorded in the Segment prologue.
fn replace_void(
    stream: &mut BufferedStream,
    structure: &mut MkvStructure,
    tags_buf: &[u8],
) -> Result<()> {
    let slot = match structure.largest_void {
        Some(slot) => slot,
        None => return Err(Error::NoSpace),
    };

    write_tags_at(stream, slot.pos, slot.total_len, tags_buf)?;

    structure.tags_pos = Some(slot.pos);
    structure.largest_void = None;

    update_seek_head_tags(stream, structure, slot.pos)
}

/// Strategy 3: append after the last Segment byte. A known Segment size is
/// re-encoded in place at its existing VINT width first; if the grown size no
/// longer fits that width the whole write fails with `NoSpace` before any
/// byte changes. The old Tags element, if any, is voided out afterwards so
/// readers do not see two live copies.
fn append_tags(
    stream: &mut BufferedStream,
    structure: &mut MkvStructure,
    tags_buf: &[u8],
) -> Result<()> {
    let segment_end = structure.segment_end(stream);

    if !structure.segment_size_unknown {
        let size_pos = structure.segment_pos + u64::from(writer::id_len(element_ids::SEGMENT));

        stream.seek(SeekFrom::Start(size_pos))?;
        let size_len = ebml::vint_length(stream.read_byte()?);
        if size_len == 0 {
            return corrupt_error("mkv: invalid Segment size encoding");
        }

        let new_size = structure.segment_size + tags_buf.len() as u64;

        let mut encoded = [0u8; 8];
        if writer::vint_encode_fixed(new_size, size_len, &mut encoded).is_err() {
            // The header slot cannot express the grown size; resizing the
            // Segment header would shift the whole file.
            return Err(Error::NoSpace);
        }

        stream.seek(SeekFrom::Start(size_pos))?;
        stream.write_buf(&encoded[..size_len as usize])?;

        structure.segment_size = new_size;
    }

    stream.seek(SeekFrom::Start(segment_end))?;
    stream.write_buf(tags_buf)?;

    // Barrier between the append and the old-Tags rewrite: if the void-out
    // below is lost, the file still holds one complete new Tags element.
    stream.flush()?;

    if let Some(old_pos) = structure.tags_pos {
        stream.seek(SeekFrom::Start(old_pos))?;
        if let Ok(old) = ElementHeader::read(stream) {
            let old_total = old.total_len();
            if old_total >= 2 {
                let mut void_buf = Vec::new();
                if writer::write_void(&mut void_buf, old_total).is_ok() {
                    stream.seek(SeekFrom::Start(old_pos))?;
                    stream.write_buf(&void_buf)?;
                }
            }
        }
    }

    structure.tags_pos = Some(segment_end);

    update_seek_head_tags(stream, structure, segment_end)
}

/// Rewrites the SeekPosition of an existing Tags entry in the SeekHead,
/// preserving its encoded byte width. The update is skipped silently when no
/// SeekHead or no Tags entry exists, or when the new position does not fit
/// the entry's width; readers then fall back to the prologue scan.
fn update_seek_head_tags(
    stream: &mut BufferedStream,
    structure: &MkvStructure,
    tags_pos: u64,
) -> Result<()> {
    let seek_head_pos = match structure.seek_head_pos {
        Some(pos) => pos,
        None => return Ok(()),
    };

    stream.seek(SeekFrom::Start(seek_head_pos))?;

    let seek_head = match ElementHeader::read(stream) {
        Ok(header) if header.id == element_ids::SEEK_HEAD => header,
        _ => return Ok(()),
    };

    while !at_element_end(stream, &seek_head) {
        let seek = match ElementHeader::read(stream) {
            Ok(header) => header,
            Err(_) => break,
        };

        if seek.id != element_ids::SEEK {
            if seek.skip(stream).is_err() {
                break;
            }
            continue;
        }

        let mut seek_id = 0u32;
        let mut position_element = None;

        while !at_element_end(stream, &seek) {
            let child = match ElementHeader::read(stream) {
                Ok(header) => header,
                Err(_) => return Ok(()),
            };

            match child.id {
                element_ids::SEEK_ID => {
                    let data = ebml::read_binary(stream, &child)?;
                    if !data.is_empty() && data.len() <= 4 {
                        seek_id = data.iter().fold(0u32, |id, byte| (id << 8) | u32::from(*byte));
                    }
                }
                element_ids::SEEK_POSITION => {
                    position_element = Some(child);
                }
                _ => (),
            }

            child.skip(stream)?;
        }

        if seek_id == element_ids::TAGS {
            if let Some(element) = position_element {
                let width = element.size as usize;
                if width == 0 || width > 8 {
                    return Ok(());
                }

                let relative = structure.to_segment_relative(tags_pos);

                // The slot width is fixed; a position too large for it is
                // left stale rather than shifting the SeekHead.
                if width < 8 && relative >= 1u64 << (8 * width) {
                    log::debug!("seek position does not fit its slot, leaving it stale");
                    return Ok(());
                }

                let bytes = relative.to_be_bytes();
                stream.seek(SeekFrom::Start(element.data_pos))?;
                stream.write_buf(&bytes[8 - width..])?;

                return Ok(());
            }
        }
    }

    Ok(())
}
