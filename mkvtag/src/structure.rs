// MkvTag
// Copyright (c) 2024 The Project MkvTag Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::SeekFrom;

use mkvtag_core::errors::{Error, Result};
use mkvtag_core::io::{BufferedStream, ReadBytes};

use crate::ebml::{self, at_element_end, ElementHeader};
use crate::element_ids::{self, ElementType};

/// Upper bound on the element position cache.
const MAX_CACHED_ELEMENTS: usize = 16;

/// A Void element usable as a write slot: its offset and total span, header
/// included.
#[derive(Copy, Clone, Debug)]
pub(crate) struct VoidSlot {
    pub pos: u64,
    pub total_len: u64,
}

/// Fields of the EBML header. Version fields default to 1 when absent.
#[derive(Debug)]
pub(crate) struct EbmlHeaderInfo {
    pub version: u64,
    pub read_version: u64,
    pub doctype: String,
    pub doctype_version: u64,
    pub doctype_read_version: u64,
}

#[derive(Copy, Clone, Debug)]
struct CachedPosition {
    id: u32,
    pos: u64,
    size: u64,
}

/// The parsed coarse structure of a Matroska file: EBML header fields, the
/// Segment bounds, absolute offsets of the top-level elements of interest,
/// and the largest Void seen in the Segment prologue.
#[derive(Debug)]
pub(crate) struct MkvStructure {
    pub ebml: EbmlHeaderInfo,

    pub segment_pos: u64,
    pub segment_data_pos: u64,
    pub segment_size: u64,
    pub segment_size_unknown: bool,

    pub seek_head_pos: Option<u64>,
    pub info_pos: Option<u64>,
    pub tracks_pos: Option<u64>,
    pub cues_pos: Option<u64>,
    pub tags_pos: Option<u64>,
    pub chapters_pos: Option<u64>,
    pub attachments_pos: Option<u64>,
    pub first_cluster_pos: Option<u64>,

    pub largest_void: Option<VoidSlot>,

    cache: Vec<CachedPosition>,
}

impl MkvStructure {
    /// Parses the file structure from the start of the stream: EBML header,
    /// Segment, prologue scan, then SeekHead resolution.
    pub(crate) fn read(stream: &mut BufferedStream) -> Result<MkvStructure> {
        let ebml = read_ebml_header(stream)?;

        // The Segment must be the next top-level element.
        let segment = ElementHeader::read(stream).map_err(|_| Error::NotMkv)?;
        if segment.etype != ElementType::Segment {
            return Err(Error::NotMkv);
        }

        let mut structure = MkvStructure {
            ebml,
            segment_pos: segment.pos,
            segment_data_pos: segment.data_pos,
            segment_size: segment.size,
            segment_size_unknown: segment.size_unknown,
            seek_head_pos: None,
            info_pos: None,
            tracks_pos: None,
            cues_pos: None,
            tags_pos: None,
            chapters_pos: None,
            attachments_pos: None,
            first_cluster_pos: None,
            largest_void: None,
            cache: Vec::new(),
        };

        structure.scan_prologue(stream)?;

        if let Some(pos) = structure.seek_head_pos {
            structure.resolve_seek_head(stream, pos)?;
        }

        Ok(structure)
    }

    /// Offset one past the Segment content.
    pub(crate) fn segment_end(&self, stream: &BufferedStream) -> u64 {
        if self.segment_size_unknown {
            stream.byte_len()
        }
        else {
            self.segment_data_pos + self.segment_size
        }
    }

    /// Converts a Segment-relative position to an absolute file offset.
    pub(crate) fn to_absolute(&self, relative: u64) -> u64 {
        self.segment_data_pos + relative
    }

    /// Converts an absolute file offset to a Segment-relative position.
    pub(crate) fn to_segment_relative(&self, absolute: u64) -> u64 {
        absolute - self.segment_data_pos
    }

    /// Scans Segment children in file order, recording top-level offsets and
    /// the largest Void. Stops at the first Cluster so media data is never
    /// read.
    fn scan_prologue(&mut self, stream: &mut BufferedStream) -> Result<()> {
        stream.seek(SeekFrom::Start(self.segment_data_pos))?;
        let end = self.segment_end(stream);

        while stream.pos() < end {
            let header = match ElementHeader::read(stream) {
                Ok(header) => header,
                Err(_) => break,
            };

            self.record_offset(header.etype, header.pos);

            if header.etype == ElementType::Void {
                let keep = match self.largest_void {
                    Some(void) => header.total_len() > void.total_len,
                    None => true,
                };
                if keep {
                    self.largest_void =
                        Some(VoidSlot { pos: header.pos, total_len: header.total_len() });
                }
            }

            if header.etype == ElementType::Cluster {
                break;
            }

            if header.skip(stream).is_err() {
                break;
            }
        }

        Ok(())
    }

    /// Parses the SeekHead and stores the absolute offset of every referenced
    /// top-level element, overwriting scan results. This is how elements
    /// stored after the first Cluster are found without reading media data.
    fn resolve_seek_head(&mut self, stream: &mut BufferedStream, pos: u64) -> Result<()> {
        stream.seek(SeekFrom::Start(pos))?;

        let seek_head = match ElementHeader::read(stream) {
            Ok(header) if header.etype == ElementType::SeekHead => header,
            _ => return Ok(()),
        };

        while !at_element_end(stream, &seek_head) {
            let seek = match ElementHeader::read(stream) {
                Ok(header) => header,
                Err(_) => break,
            };

            if seek.etype != ElementType::Seek {
                if seek.skip(stream).is_err() {
                    break;
                }
                continue;
            }

            let mut seek_id = 0u32;
            let mut seek_position = None;

            while !at_element_end(stream, &seek) {
                let child = match ElementHeader::read(stream) {
                    Ok(header) => header,
                    Err(_) => return Ok(()),
                };

                match child.etype {
                    ElementType::SeekId => {
                        // The SeekID payload is the raw bytes of an element ID.
                        let data = ebml::read_binary(stream, &child)?;
                        if !data.is_empty() && data.len() <= 4 {
                            seek_id = data.iter().fold(0u32, |id, byte| (id << 8) | u32::from(*byte));
                        }
                    }
                    ElementType::SeekPosition => {
                        seek_position = Some(ebml::read_unsigned(stream, &child)?);
                    }
                    other => {
                        log::warn!("mkv: unexpected element {:?} in seek entry", other);
                    }
                }

                child.skip(stream)?;
            }

            if seek_id != 0 {
                if let Some(position) = seek_position {
                    let absolute = self.to_absolute(position);
                    self.record_offset(element_ids::element_type(seek_id), absolute);
                    self.cache_position(seek_id, absolute, 0);
                }
            }
        }

        Ok(())
    }

    /// Stores the absolute offset for a known top-level element. Only the
    /// first Cluster is kept; everything else takes the latest value so the
    /// SeekHead can overwrite the prologue scan.
    fn record_offset(&mut self, etype: ElementType, pos: u64) {
        match etype {
            ElementType::SeekHead => self.seek_head_pos = Some(pos),
            ElementType::Info => self.info_pos = Some(pos),
            ElementType::Tracks => self.tracks_pos = Some(pos),
            ElementType::Cues => self.cues_pos = Some(pos),
            ElementType::Tags => self.tags_pos = Some(pos),
            ElementType::Chapters => self.chapters_pos = Some(pos),
            ElementType::Attachments => self.attachments_pos = Some(pos),
            ElementType::Cluster => {
                if self.first_cluster_pos.is_none() {
                    self.first_cluster_pos = Some(pos);
                }
            }
            _ => (),
        }
    }

    /// Remembers an element position in the bounded cache. A duplicate ID
    /// overwrites its previous entry.
    pub(crate) fn cache_position(&mut self, id: u32, pos: u64, size: u64) {
        for entry in self.cache.iter_mut() {
            if entry.id == id {
                entry.pos = pos;
                entry.size = size;
                return;
            }
        }

        if self.cache.len() < MAX_CACHED_ELEMENTS {
            self.cache.push(CachedPosition { id, pos, size });
        }
    }

    /// Looks up a cached element position.
    pub(crate) fn lookup_position(&self, id: u32) -> Option<(u64, u64)> {
        self.cache.iter().find(|entry| entry.id == id).map(|entry| (entry.pos, entry.size))
    }

    /// Streams the children of `parent` and returns the first element with the
    /// given raw ID. Clusters of known size are stepped over with a single
    /// seek, so media data is never read.
    pub(crate) fn find_element(
        &self,
        stream: &mut BufferedStream,
        parent: &ElementHeader,
        target_id: u32,
    ) -> Result<ElementHeader> {
        stream.seek(SeekFrom::Start(parent.data_pos))?;

        while !at_element_end(stream, parent) {
            let element = ElementHeader::read(stream)?;

            if element.id == target_id {
                return Ok(element);
            }

            element.skip(stream)?;
        }

        Err(Error::TagNotFound)
    }
}

/// Validates and parses the EBML header at the start of the stream.
fn read_ebml_header(stream: &mut BufferedStream) -> Result<EbmlHeaderInfo> {
    stream.seek(SeekFrom::Start(0))?;

    let header = match ElementHeader::read(stream) {
        Ok(header) if header.etype == ElementType::Ebml => header,
        _ => return Err(Error::NotEbml),
    };

    let mut info = EbmlHeaderInfo {
        version: 1,
        read_version: 1,
        doctype: String::new(),
        doctype_version: 1,
        doctype_read_version: 1,
    };

    while !at_element_end(stream, &header) {
        let child = match ElementHeader::read(stream) {
            Ok(child) => child,
            Err(_) => break,
        };

        match child.etype {
            ElementType::EbmlVersion => {
                info.version = ebml::read_unsigned(stream, &child)?;
            }
            ElementType::EbmlReadVersion => {
                info.read_version = ebml::read_unsigned(stream, &child)?;
            }
            ElementType::DocType => {
                // A DocType is a short ASCII token; anything oversized is
                // treated as absent and fails the check below.
                let mut buf = [0u8; 32];
                match ebml::read_string_buf(stream, &child, &mut buf) {
                    Ok(len) => {
                        info.doctype = String::from_utf8_lossy(&buf[..len]).into_owned();
                    }
                    Err(_) => {
                        log::warn!("mkv: oversized DocType ignored");
                    }
                }
            }
            ElementType::DocTypeVersion => {
                info.doctype_version = ebml::read_unsigned(stream, &child)?;
            }
            ElementType::DocTypeReadVersion => {
                info.doctype_read_version = ebml::read_unsigned(stream, &child)?;
            }
            _ => (),
        }

        if child.skip(stream).is_err() {
            break;
        }
    }

    if info.doctype != "matroska" && info.doctype != "webm" {
        return Err(Error::NotMkv);
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use mkvtag_core::errors::Error;
    use mkvtag_core::io::BufferedStream;

    use super::MkvStructure;
    use crate::element_ids;
    use crate::writer;

    fn ebml_header(doctype: &str) -> Vec<u8> {
        let mut content = Vec::new();
        writer::write_unsigned(&mut content, element_ids::EBML_VERSION, 1).unwrap();
        writer::write_unsigned(&mut content, element_ids::EBML_READ_VERSION, 1).unwrap();
        writer::write_string(&mut content, element_ids::DOC_TYPE, doctype).unwrap();
        writer::write_unsigned(&mut content, element_ids::DOC_TYPE_VERSION, 4).unwrap();
        writer::write_unsigned(&mut content, element_ids::DOC_TYPE_READ_VERSION, 2).unwrap();

        let mut buf = Vec::new();
        writer::write_master_header(&mut buf, element_ids::EBML, content.len() as u64).unwrap();
        buf.extend_from_slice(&content);
        buf
    }

    fn make_stream(data: Vec<u8>) -> BufferedStream {
        BufferedStream::new(Box::new(Cursor::new(data)), false, Default::default())
    }

    #[test]
    fn structure_of_minimal_file() {
        let mut file = ebml_header("matroska");

        let mut segment = Vec::new();
        writer::write_master_header(&mut segment, element_ids::INFO, 0).unwrap();
        writer::write_void(&mut segment, 64).unwrap();
        let info_rel = 0u64;
        let void_rel = (segment.len() - 64) as u64;

        let segment_pos = file.len() as u64;
        writer::write_master_header(&mut file, element_ids::SEGMENT, segment.len() as u64)
            .unwrap();
        let segment_data_pos = file.len() as u64;
        file.extend_from_slice(&segment);

        let mut stream = make_stream(file);
        let structure = MkvStructure::read(&mut stream).unwrap();

        assert_eq!(structure.ebml.doctype, "matroska");
        assert_eq!(structure.ebml.version, 1);
        assert_eq!(structure.ebml.read_version, 1);
        assert_eq!(structure.ebml.doctype_version, 4);
        assert_eq!(structure.ebml.doctype_read_version, 2);
        assert_eq!(structure.segment_pos, segment_pos);
        assert_eq!(structure.segment_data_pos, segment_data_pos);
        assert!(!structure.segment_size_unknown);

        assert_eq!(structure.info_pos, Some(segment_data_pos + info_rel));
        assert_eq!(structure.tags_pos, None);
        assert_eq!(structure.seek_head_pos, None);
        assert_eq!(structure.tracks_pos, None);
        assert_eq!(structure.cues_pos, None);
        assert_eq!(structure.chapters_pos, None);
        assert_eq!(structure.attachments_pos, None);
        assert_eq!(structure.first_cluster_pos, None);

        let void = structure.largest_void.unwrap();
        assert_eq!(void.pos, segment_data_pos + void_rel);
        assert_eq!(void.total_len, 64);
    }

    #[test]
    fn rejects_non_ebml() {
        let mut stream = make_stream(b"plain text, not a matroska file".to_vec());
        match MkvStructure::read(&mut stream) {
            Err(Error::NotEbml) | Err(Error::NotMkv) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn rejects_foreign_doctype() {
        let mut file = ebml_header("quicktime");
        writer::write_master_header(&mut file, element_ids::SEGMENT, 0).unwrap();

        let mut stream = make_stream(file);
        match MkvStructure::read(&mut stream) {
            Err(Error::NotMkv) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn find_element_skips_clusters() {
        use std::io::SeekFrom;

        use crate::ebml::ElementHeader;

        // Segment: Info, a Cluster of dummy media, then Tags after the media.
        // The prologue scan stops at the Cluster, but find_element steps over
        // it to reach the Tags element.
        let mut file = ebml_header("matroska");

        let mut segment = Vec::new();
        writer::write_master_header(&mut segment, element_ids::INFO, 0).unwrap();

        let media = vec![0x55u8; 2048];
        writer::write_master_header(&mut segment, element_ids::CLUSTER, media.len() as u64)
            .unwrap();
        segment.extend_from_slice(&media);

        let tags_rel = segment.len() as u64;
        writer::write_master_header(&mut segment, element_ids::TAGS, 0).unwrap();

        let ebml_len = file.len() as u64;
        writer::write_master_header(&mut file, element_ids::SEGMENT, segment.len() as u64)
            .unwrap();
        file.extend_from_slice(&segment);

        let mut stream = make_stream(file);
        let structure = MkvStructure::read(&mut stream).unwrap();

        // The scan stopped at the Cluster, so Tags was not recorded.
        assert!(structure.first_cluster_pos.is_some());
        assert_eq!(structure.tags_pos, None);

        // Re-read the Segment header and search its children.
        stream.seek(SeekFrom::Start(ebml_len)).unwrap();
        let segment_header = ElementHeader::read(&mut stream).unwrap();

        let tags = structure
            .find_element(&mut stream, &segment_header, element_ids::TAGS)
            .unwrap();
        assert_eq!(tags.pos, structure.to_absolute(tags_rel));

        match structure.find_element(&mut stream, &segment_header, element_ids::CUES) {
            Err(_) => (),
            Ok(_) => panic!("found an element that is not present"),
        }
    }

    #[test]
    fn position_cache_is_bounded() {
        let mut file = ebml_header("webm");
        writer::write_master_header(&mut file, element_ids::SEGMENT, 0).unwrap();

        let mut stream = make_stream(file);
        let mut structure = MkvStructure::read(&mut stream).unwrap();

        for id in 0..40u32 {
            structure.cache_position(0x4000 + id, u64::from(id), 0);
        }

        assert_eq!(structure.lookup_position(0x4000), Some((0, 0)));
        assert_eq!(structure.lookup_position(0x4000 + 39), None);

        structure.cache_position(0x4000, 777, 9);
        assert_eq!(structure.lookup_position(0x4000), Some((777, 9)));
    }
}
