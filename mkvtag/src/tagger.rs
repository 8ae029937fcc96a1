// MkvTag
// Copyright (c) 2024 The Project MkvTag Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::SeekFrom;
use std::path::Path;

use mkvtag_core::errors::{corrupt_error, Error, Result};
use mkvtag_core::io::{BufferedStream, MediaSource};

use crate::ebml::ElementHeader;
use crate::element_ids;
use crate::planner;
use crate::structure::MkvStructure;
use crate::tags::{TagCollection, TARGET_TYPE_ALBUM};

/// `MkvTagger` reads and edits the Tags metadata of one Matroska file.
///
/// A tagger owns at most one open file at a time. Opening parses the file
/// structure up front; the tag collection itself is parsed lazily on the first
/// read and cached until the next write or close.
///
/// A `MkvTagger` is not meant to be shared between threads without external
/// mutual exclusion.
pub struct MkvTagger {
    stream: Option<BufferedStream>,
    structure: Option<MkvStructure>,
    cached_tags: Option<TagCollection>,
}

impl MkvTagger {
    /// Creates a tagger with no file open.
    pub fn new() -> MkvTagger {
        MkvTagger { stream: None, structure: None, cached_tags: None }
    }

    /// Opens the file at `path` read-only and parses its structure.
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if self.stream.is_some() {
            return Err(Error::AlreadyOpen);
        }
        self.attach(BufferedStream::open(path)?)
    }

    /// Opens the file at `path` for reading and writing and parses its
    /// structure.
    pub fn open_rw<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if self.stream.is_some() {
            return Err(Error::AlreadyOpen);
        }
        self.attach(BufferedStream::open_rw(path)?)
    }

    /// Opens an arbitrary [`MediaSource`], e.g. an in-memory buffer.
    pub fn open_source(&mut self, source: Box<dyn MediaSource>, writable: bool) -> Result<()> {
        if self.stream.is_some() {
            return Err(Error::AlreadyOpen);
        }
        self.attach(BufferedStream::new(source, writable, Default::default()))
    }

    fn attach(&mut self, mut stream: BufferedStream) -> Result<()> {
        if !stream.is_seekable() {
            return Err(Error::SeekFailed);
        }

        let structure = MkvStructure::read(&mut stream)?;

        self.stream = Some(stream);
        self.structure = Some(structure);
        self.cached_tags = None;

        Ok(())
    }

    /// Closes the open file, if any, discarding the cached tag collection.
    pub fn close(&mut self) {
        self.cached_tags = None;
        self.structure = None;
        self.stream = None;
    }

    /// Returns whether a file is open.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// The DocType of the open file ("matroska" or "webm").
    pub fn doctype(&self) -> Option<&str> {
        self.structure.as_ref().map(|s| s.ebml.doctype.as_str())
    }

    /// Returns the tag collection of the open file, parsing it on first use.
    /// The reference is valid until the next write or close.
    pub fn read_tags(&mut self) -> Result<&TagCollection> {
        if self.stream.is_none() {
            return Err(Error::NotOpen);
        }

        if self.cached_tags.is_none() {
            self.cached_tags = Some(self.parse_tags()?);
        }

        Ok(self.cached_tags.as_ref().unwrap())
    }

    fn parse_tags(&mut self) -> Result<TagCollection> {
        let stream = self.stream.as_mut().unwrap();
        let structure = self.structure.as_ref().unwrap();

        let tags_pos = structure.tags_pos.ok_or(Error::NoTags)?;

        stream.seek(SeekFrom::Start(tags_pos))?;
        let header = ElementHeader::read(stream)?;

        if header.id != element_ids::TAGS {
            return corrupt_error("mkv: recorded Tags offset does not frame a Tags element");
        }

        TagCollection::parse(stream, &header)
    }

    /// Looks up a simple tag by name, case-insensitively, across all tags at
    /// every target level, and returns the first string value found.
    pub fn read_tag_string(&mut self, name: &str) -> Result<String> {
        let tags = self.read_tags()?;

        for tag in &tags.tags {
            for simple in &tag.simple_tags {
                if simple.name.eq_ignore_ascii_case(name) {
                    if let Some(value) = &simple.value {
                        return Ok(value.clone());
                    }
                }
            }
        }

        Err(Error::TagNotFound)
    }

    /// Replaces the file's Tags element with the serialized form of `tags`.
    /// The cached collection is invalidated before the write.
    pub fn write_tags(&mut self, tags: &TagCollection) -> Result<()> {
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return Err(Error::NotOpen),
        };

        if !stream.is_writable() {
            return Err(Error::ReadOnly);
        }

        self.cached_tags = None;

        planner::write_tags(stream, self.structure.as_mut().unwrap(), tags)
    }

    /// Sets, replaces or removes an album-level simple tag by name.
    ///
    /// With `Some(value)`, every album-level simple tag whose name matches
    /// case-insensitively is updated; when none matches the tag is added to
    /// the first album-level tag, creating one if the file has none. With
    /// `None`, every album-level match is removed; matches at other target
    /// levels are never touched.
    pub fn set_tag_string(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        match self.stream.as_ref() {
            Some(stream) if !stream.is_writable() => return Err(Error::ReadOnly),
            Some(_) => (),
            None => return Err(Error::NotOpen),
        }

        let mut working = match self.read_tags() {
            Ok(tags) => tags.clone(),
            Err(Error::NoTags) => TagCollection::new(),
            Err(err) => return Err(err),
        };

        match value {
            Some(value) => {
                let mut matched = false;

                for tag in working.tags.iter_mut() {
                    if tag.target_type != TARGET_TYPE_ALBUM {
                        continue;
                    }
                    for simple in tag.simple_tags.iter_mut() {
                        if simple.name.eq_ignore_ascii_case(name) {
                            simple.value = Some(value.to_string());
                            matched = true;
                        }
                    }
                }

                if !matched {
                    match working
                        .tags
                        .iter_mut()
                        .find(|tag| tag.target_type == TARGET_TYPE_ALBUM)
                    {
                        Some(tag) => {
                            tag.add_simple(name, Some(value));
                        }
                        None => {
                            working.add_tag(TARGET_TYPE_ALBUM).add_simple(name, Some(value));
                        }
                    }
                }
            }
            None => {
                for tag in working.tags.iter_mut() {
                    if tag.target_type == TARGET_TYPE_ALBUM {
                        tag.simple_tags.retain(|simple| !simple.name.eq_ignore_ascii_case(name));
                    }
                }
            }
        }

        self.write_tags(&working)
    }

    /// Removes every album-level simple tag with the given name. Equivalent
    /// to `set_tag_string(name, None)`.
    pub fn remove_tag(&mut self, name: &str) -> Result<()> {
        self.set_tag_string(name, None)
    }
}

impl Default for MkvTagger {
    fn default() -> Self {
        MkvTagger::new()
    }
}
