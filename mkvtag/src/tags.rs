// MkvTag
// Copyright (c) 2024 The Project MkvTag Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The in-memory tag model and its codec: parsing a Tags element into a
//! collection, and serializing a collection back to bytes in canonical order.

use mkvtag_core::errors::{Error, Result};
use mkvtag_core::io::BufferedStream;

use crate::ebml::{self, at_element_end, ElementHeader};
use crate::element_ids::{self, ElementType};
use crate::writer;

/// TargetTypeValue for an entire collection of works (e.g. a movie series).
pub const TARGET_TYPE_COLLECTION: u64 = 70;
/// TargetTypeValue for an edition, issue, volume or opus.
pub const TARGET_TYPE_EDITION: u64 = 60;
/// TargetTypeValue for an album, opera, concert, movie or episode. This is the
/// default level, and the one the convenience API operates on.
pub const TARGET_TYPE_ALBUM: u64 = 50;
/// TargetTypeValue for a part or session.
pub const TARGET_TYPE_PART: u64 = 40;
/// TargetTypeValue for a track, song or chapter.
pub const TARGET_TYPE_TRACK: u64 = 30;
/// TargetTypeValue for a subtrack, movement or scene.
pub const TARGET_TYPE_SUBTRACK: u64 = 20;
/// TargetTypeValue for a shot.
pub const TARGET_TYPE_SHOT: u64 = 10;

/// A name/value pair with an optional language and nested children.
#[derive(Clone, Debug)]
pub struct SimpleTag {
    /// The tag name. Required; a simple tag with an empty name does not
    /// serialize.
    pub name: String,
    /// The UTF-8 string value, if any.
    pub value: Option<String>,
    /// The binary value, if any.
    pub binary: Option<Box<[u8]>>,
    /// The language code (e.g. "und", "eng"). When absent the element is not
    /// written and readers assume "und".
    pub language: Option<String>,
    /// Whether this is the default variant for its language. True by default;
    /// written only when false.
    pub is_default: bool,
    /// Nested simple tags.
    pub nested: Vec<SimpleTag>,
}

impl SimpleTag {
    pub fn new<N: Into<String>>(name: N, value: Option<&str>) -> SimpleTag {
        SimpleTag {
            name: name.into(),
            value: value.map(|v| v.to_string()),
            binary: None,
            language: None,
            is_default: true,
            nested: Vec::new(),
        }
    }

    /// Sets the language code.
    pub fn set_language<L: Into<String>>(&mut self, language: L) {
        self.language = Some(language.into());
    }

    /// Appends a nested simple tag and returns a reference to it.
    pub fn add_nested<N: Into<String>>(&mut self, name: N, value: Option<&str>) -> &mut SimpleTag {
        self.nested.push(SimpleTag::new(name, value));
        self.nested.last_mut().unwrap()
    }
}

/// A tag: a targets descriptor plus an ordered list of simple tags.
#[derive(Clone, Debug)]
pub struct Tag {
    /// The TargetTypeValue. 50 (album) when the file does not say otherwise.
    pub target_type: u64,
    /// The free-form TargetType string, if any.
    pub target_type_name: Option<String>,
    /// UIDs of the tracks this tag applies to.
    pub track_uids: Vec<u64>,
    /// UIDs of the editions this tag applies to.
    pub edition_uids: Vec<u64>,
    /// UIDs of the chapters this tag applies to.
    pub chapter_uids: Vec<u64>,
    /// UIDs of the attachments this tag applies to.
    pub attachment_uids: Vec<u64>,
    /// The simple tags, in file/insertion order.
    pub simple_tags: Vec<SimpleTag>,
}

impl Tag {
    pub fn new(target_type: u64) -> Tag {
        Tag {
            target_type,
            target_type_name: None,
            track_uids: Vec::new(),
            edition_uids: Vec::new(),
            chapter_uids: Vec::new(),
            attachment_uids: Vec::new(),
            simple_tags: Vec::new(),
        }
    }

    /// Appends a simple tag and returns a reference to it.
    pub fn add_simple<N: Into<String>>(&mut self, name: N, value: Option<&str>) -> &mut SimpleTag {
        self.simple_tags.push(SimpleTag::new(name, value));
        self.simple_tags.last_mut().unwrap()
    }

    /// Adds a track UID to the targets descriptor.
    pub fn add_track_uid(&mut self, uid: u64) {
        self.track_uids.push(uid);
    }
}

/// An ordered collection of tags; the in-memory form of one Tags element.
#[derive(Clone, Debug, Default)]
pub struct TagCollection {
    pub tags: Vec<Tag>,
}

impl TagCollection {
    pub fn new() -> TagCollection {
        TagCollection { tags: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Appends a tag with the given target type and returns a reference to it.
    pub fn add_tag(&mut self, target_type: u64) -> &mut Tag {
        self.tags.push(Tag::new(target_type));
        self.tags.last_mut().unwrap()
    }

    /// Parses the children of a Tags element into a collection. Unknown
    /// children are skipped; `Tag` children are kept in file order.
    pub(crate) fn parse(
        stream: &mut BufferedStream,
        tags_element: &ElementHeader,
    ) -> Result<TagCollection> {
        let mut collection = TagCollection::new();

        stream.seek(std::io::SeekFrom::Start(tags_element.data_pos))?;

        while !at_element_end(stream, tags_element) {
            let child = match ElementHeader::read(stream) {
                Ok(child) => child,
                Err(_) => break,
            };

            if child.etype == ElementType::Tag {
                collection.tags.push(parse_tag(stream, &child)?);
            }

            child.skip(stream)?;
        }

        Ok(collection)
    }

    /// Serializes the collection into a complete Tags element, header
    /// included.
    pub(crate) fn serialize(&self) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        self.serialize_content(&mut content)?;

        let mut buf = Vec::new();
        writer::write_master_header(&mut buf, element_ids::TAGS, content.len() as u64)?;
        buf.extend_from_slice(&content);

        Ok(buf)
    }

    /// Serializes only the Tags content: the sequence of Tag elements.
    pub(crate) fn serialize_content(&self, buf: &mut Vec<u8>) -> Result<()> {
        for tag in &self.tags {
            serialize_tag(tag, buf)?;
        }
        Ok(())
    }

    /// The total encoded span of the Tags element this collection serializes
    /// to, header included.
    pub fn total_size(&self) -> Result<u64> {
        let mut content = Vec::new();
        self.serialize_content(&mut content)?;

        let content_size = content.len() as u64;
        Ok(writer::master_header_len(element_ids::TAGS, content_size) + content_size)
    }
}

fn parse_targets(stream: &mut BufferedStream, targets: &ElementHeader, tag: &mut Tag) -> Result<()> {
    stream.seek(std::io::SeekFrom::Start(targets.data_pos))?;

    while !at_element_end(stream, targets) {
        let child = match ElementHeader::read(stream) {
            Ok(child) => child,
            Err(_) => break,
        };

        match child.etype {
            ElementType::TargetTypeValue => {
                tag.target_type = ebml::read_unsigned(stream, &child)?;
            }
            ElementType::TargetType => {
                tag.target_type_name = Some(ebml::read_string(stream, &child)?);
            }
            ElementType::TagTrackUid => {
                tag.track_uids.push(ebml::read_unsigned(stream, &child)?);
            }
            ElementType::TagEditionUid => {
                tag.edition_uids.push(ebml::read_unsigned(stream, &child)?);
            }
            ElementType::TagChapterUid => {
                tag.chapter_uids.push(ebml::read_unsigned(stream, &child)?);
            }
            ElementType::TagAttachmentUid => {
                tag.attachment_uids.push(ebml::read_unsigned(stream, &child)?);
            }
            _ => (),
        }

        child.skip(stream)?;
    }

    Ok(())
}

fn parse_simple_tag(stream: &mut BufferedStream, simple: &ElementHeader) -> Result<SimpleTag> {
    let mut tag = SimpleTag::new(String::new(), None);

    stream.seek(std::io::SeekFrom::Start(simple.data_pos))?;

    while !at_element_end(stream, simple) {
        let child = match ElementHeader::read(stream) {
            Ok(child) => child,
            Err(_) => break,
        };

        match child.etype {
            ElementType::TagName => {
                tag.name = ebml::read_string(stream, &child)?;
            }
            ElementType::TagString => {
                tag.value = Some(ebml::read_string(stream, &child)?);
            }
            ElementType::TagBinary => {
                tag.binary = Some(ebml::read_binary(stream, &child)?);
            }
            // Whichever language element appears last wins.
            ElementType::TagLanguage | ElementType::TagLanguageBcp47 => {
                tag.language = Some(ebml::read_string(stream, &child)?);
            }
            ElementType::TagDefault => {
                tag.is_default = ebml::read_unsigned(stream, &child)? != 0;
            }
            ElementType::SimpleTag => {
                tag.nested.push(parse_simple_tag(stream, &child)?);
            }
            _ => (),
        }

        child.skip(stream)?;
    }

    Ok(tag)
}

fn parse_tag(stream: &mut BufferedStream, tag_element: &ElementHeader) -> Result<Tag> {
    let mut tag = Tag::new(TARGET_TYPE_ALBUM);

    stream.seek(std::io::SeekFrom::Start(tag_element.data_pos))?;

    while !at_element_end(stream, tag_element) {
        let child = match ElementHeader::read(stream) {
            Ok(child) => child,
            Err(_) => break,
        };

        match child.etype {
            ElementType::Targets => {
                parse_targets(stream, &child, &mut tag)?;
            }
            ElementType::SimpleTag => {
                tag.simple_tags.push(parse_simple_tag(stream, &child)?);
            }
            _ => (),
        }

        child.skip(stream)?;
    }

    Ok(tag)
}

fn serialize_simple_tag(tag: &SimpleTag, buf: &mut Vec<u8>) -> Result<()> {
    if tag.name.is_empty() {
        return Err(Error::InvalidArg);
    }

    let mut content = Vec::new();

    writer::write_string(&mut content, element_ids::TAG_NAME, &tag.name)?;

    if let Some(language) = &tag.language {
        writer::write_string(&mut content, element_ids::TAG_LANGUAGE, language)?;
    }

    if !tag.is_default {
        writer::write_unsigned(&mut content, element_ids::TAG_DEFAULT, 0)?;
    }

    if let Some(value) = &tag.value {
        writer::write_string(&mut content, element_ids::TAG_STRING, value)?;
    }

    if let Some(binary) = &tag.binary {
        if !binary.is_empty() {
            writer::write_binary(&mut content, element_ids::TAG_BINARY, binary)?;
        }
    }

    for nested in &tag.nested {
        serialize_simple_tag(nested, &mut content)?;
    }

    writer::write_master_header(buf, element_ids::SIMPLE_TAG, content.len() as u64)?;
    buf.extend_from_slice(&content);

    Ok(())
}

fn serialize_targets(tag: &Tag, buf: &mut Vec<u8>) -> Result<()> {
    let mut content = Vec::new();

    writer::write_unsigned(&mut content, element_ids::TARGET_TYPE_VALUE, tag.target_type)?;

    if let Some(name) = &tag.target_type_name {
        writer::write_string(&mut content, element_ids::TARGET_TYPE, name)?;
    }

    for uid in &tag.track_uids {
        writer::write_unsigned(&mut content, element_ids::TAG_TRACK_UID, *uid)?;
    }
    for uid in &tag.edition_uids {
        writer::write_unsigned(&mut content, element_ids::TAG_EDITION_UID, *uid)?;
    }
    for uid in &tag.chapter_uids {
        writer::write_unsigned(&mut content, element_ids::TAG_CHAPTER_UID, *uid)?;
    }
    for uid in &tag.attachment_uids {
        writer::write_unsigned(&mut content, element_ids::TAG_ATTACHMENT_UID, *uid)?;
    }

    writer::write_master_header(buf, element_ids::TARGETS, content.len() as u64)?;
    buf.extend_from_slice(&content);

    Ok(())
}

fn serialize_tag(tag: &Tag, buf: &mut Vec<u8>) -> Result<()> {
    let mut content = Vec::new();

    serialize_targets(tag, &mut content)?;

    for simple in &tag.simple_tags {
        serialize_simple_tag(simple, &mut content)?;
    }

    writer::write_master_header(buf, element_ids::TAG, content.len() as u64)?;
    buf.extend_from_slice(&content);

    Ok(())
}
