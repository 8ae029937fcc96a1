// MkvTag
// Copyright (c) 2024 The Project MkvTag Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;

use lazy_static::lazy_static;

// Raw element IDs, with VINT marker bits retained, as they appear on disk.
// Only the elements this library observes are listed; everything else is
// handled as an unknown element and skipped.

pub(crate) const EBML: u32 = 0x1A45DFA3;
pub(crate) const EBML_VERSION: u32 = 0x4286;
pub(crate) const EBML_READ_VERSION: u32 = 0x42F7;
pub(crate) const EBML_MAX_ID_LENGTH: u32 = 0x42F2;
pub(crate) const EBML_MAX_SIZE_LENGTH: u32 = 0x42F3;
pub(crate) const DOC_TYPE: u32 = 0x4282;
pub(crate) const DOC_TYPE_VERSION: u32 = 0x4287;
pub(crate) const DOC_TYPE_READ_VERSION: u32 = 0x4285;

pub(crate) const CRC32: u32 = 0xBF;
pub(crate) const VOID: u32 = 0xEC;

pub(crate) const SEGMENT: u32 = 0x18538067;
pub(crate) const SEEK_HEAD: u32 = 0x114D9B74;
pub(crate) const SEEK: u32 = 0x4DBB;
pub(crate) const SEEK_ID: u32 = 0x53AB;
pub(crate) const SEEK_POSITION: u32 = 0x53AC;
pub(crate) const INFO: u32 = 0x1549A966;
pub(crate) const TRACKS: u32 = 0x1654AE6B;
pub(crate) const CLUSTER: u32 = 0x1F43B675;
pub(crate) const CUES: u32 = 0x1C53BB6B;
pub(crate) const CHAPTERS: u32 = 0x1043A770;
pub(crate) const ATTACHMENTS: u32 = 0x1941A469;

pub(crate) const TAGS: u32 = 0x1254C367;
pub(crate) const TAG: u32 = 0x7373;
pub(crate) const TARGETS: u32 = 0x63C0;
pub(crate) const TARGET_TYPE_VALUE: u32 = 0x68CA;
pub(crate) const TARGET_TYPE: u32 = 0x63CA;
pub(crate) const TAG_TRACK_UID: u32 = 0x63C5;
pub(crate) const TAG_EDITION_UID: u32 = 0x63C9;
pub(crate) const TAG_CHAPTER_UID: u32 = 0x63C4;
pub(crate) const TAG_ATTACHMENT_UID: u32 = 0x63C6;
pub(crate) const SIMPLE_TAG: u32 = 0x67C8;
pub(crate) const TAG_NAME: u32 = 0x45A3;
pub(crate) const TAG_LANGUAGE: u32 = 0x447A;
pub(crate) const TAG_LANGUAGE_BCP47: u32 = 0x447B;
pub(crate) const TAG_DEFAULT: u32 = 0x4484;
pub(crate) const TAG_STRING: u32 = 0x4487;
pub(crate) const TAG_BINARY: u32 = 0x4485;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Type {
    Master,
    Unsigned,
    Binary,
    String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ElementType {
    Ebml,
    EbmlVersion,
    EbmlReadVersion,
    EbmlMaxIdLength,
    EbmlMaxSizeLength,
    DocType,
    DocTypeVersion,
    DocTypeReadVersion,
    Crc32,
    Void,
    Segment,
    SeekHead,
    Seek,
    SeekId,
    SeekPosition,
    Info,
    Tracks,
    Cluster,
    Cues,
    Chapters,
    Attachments,
    Tags,
    Tag,
    Targets,
    TargetTypeValue,
    TargetType,
    TagTrackUid,
    TagEditionUid,
    TagChapterUid,
    TagAttachmentUid,
    SimpleTag,
    TagName,
    TagLanguage,
    TagLanguageBcp47,
    TagDefault,
    TagString,
    TagBinary,
    /// Special type for unknown tags.
    Unknown,
}

/// Looks up the element type for a raw element ID.
pub(crate) fn element_type(id: u32) -> ElementType {
    ELEMENTS.get(&id).map_or(ElementType::Unknown, |(_, etype)| *etype)
}

lazy_static! {
    pub(crate) static ref ELEMENTS: HashMap<u32, (Type, ElementType)> = {
        let mut elems = HashMap::new();
        elems.insert(EBML, (Type::Master, ElementType::Ebml));
        elems.insert(EBML_VERSION, (Type::Unsigned, ElementType::EbmlVersion));
        elems.insert(EBML_READ_VERSION, (Type::Unsigned, ElementType::EbmlReadVersion));
        elems.insert(EBML_MAX_ID_LENGTH, (Type::Unsigned, ElementType::EbmlMaxIdLength));
        elems.insert(EBML_MAX_SIZE_LENGTH, (Type::Unsigned, ElementType::EbmlMaxSizeLength));
        elems.insert(DOC_TYPE, (Type::String, ElementType::DocType));
        elems.insert(DOC_TYPE_VERSION, (Type::Unsigned, ElementType::DocTypeVersion));
        elems.insert(DOC_TYPE_READ_VERSION, (Type::Unsigned, ElementType::DocTypeReadVersion));
        elems.insert(CRC32, (Type::Binary, ElementType::Crc32));
        elems.insert(VOID, (Type::Binary, ElementType::Void));
        elems.insert(SEGMENT, (Type::Master, ElementType::Segment));
        elems.insert(SEEK_HEAD, (Type::Master, ElementType::SeekHead));
        elems.insert(SEEK, (Type::Master, ElementType::Seek));
        elems.insert(SEEK_ID, (Type::Binary, ElementType::SeekId));
        elems.insert(SEEK_POSITION, (Type::Unsigned, ElementType::SeekPosition));
        elems.insert(INFO, (Type::Master, ElementType::Info));
        elems.insert(TRACKS, (Type::Master, ElementType::Tracks));
        elems.insert(CLUSTER, (Type::Master, ElementType::Cluster));
        elems.insert(CUES, (Type::Master, ElementType::Cues));
        elems.insert(CHAPTERS, (Type::Master, ElementType::Chapters));
        elems.insert(ATTACHMENTS, (Type::Master, ElementType::Attachments));
        elems.insert(TAGS, (Type::Master, ElementType::Tags));
        elems.insert(TAG, (Type::Master, ElementType::Tag));
        elems.insert(TARGETS, (Type::Master, ElementType::Targets));
        elems.insert(TARGET_TYPE_VALUE, (Type::Unsigned, ElementType::TargetTypeValue));
        elems.insert(TARGET_TYPE, (Type::String, ElementType::TargetType));
        elems.insert(TAG_TRACK_UID, (Type::Unsigned, ElementType::TagTrackUid));
        elems.insert(TAG_EDITION_UID, (Type::Unsigned, ElementType::TagEditionUid));
        elems.insert(TAG_CHAPTER_UID, (Type::Unsigned, ElementType::TagChapterUid));
        elems.insert(TAG_ATTACHMENT_UID, (Type::Unsigned, ElementType::TagAttachmentUid));
        elems.insert(SIMPLE_TAG, (Type::Master, ElementType::SimpleTag));
        elems.insert(TAG_NAME, (Type::String, ElementType::TagName));
        elems.insert(TAG_LANGUAGE, (Type::String, ElementType::TagLanguage));
        elems.insert(TAG_LANGUAGE_BCP47, (Type::String, ElementType::TagLanguageBcp47));
        elems.insert(TAG_DEFAULT, (Type::Unsigned, ElementType::TagDefault));
        elems.insert(TAG_STRING, (Type::String, ElementType::TagString));
        elems.insert(TAG_BINARY, (Type::Binary, ElementType::TagBinary));
        elems
    };
}
