// MkvTag
// Copyright (c) 2024 The Project MkvTag Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! mkvtag reads and edits the metadata tags inside Matroska container files
//! (`.mkv`, `.mka`, `.webm`) without rewriting the media payload.
//!
//! The container is a tree of EBML elements in which media Clusters dominate
//! the file size. mkvtag locates the metadata region through the SeekHead
//! index and a scan of the Segment prologue, and commits edits with the
//! smallest possible shift of bytes: rewriting the existing Tags slot,
//! claiming Void padding, or appending to the Segment.
//!
//! ```no_run
//! use mkvtag::MkvTagger;
//!
//! # fn main() -> mkvtag::Result<()> {
//! let mut tagger = MkvTagger::new();
//! tagger.open_rw("movie.mkv")?;
//! tagger.set_tag_string("TITLE", Some("A Better Title"))?;
//! println!("{}", tagger.read_tag_string("TITLE")?);
//! # Ok(())
//! # }
//! ```

mod ebml;
mod element_ids;
mod planner;
mod structure;
mod tagger;
mod tags;
mod writer;

pub use mkvtag_core as core;
pub use mkvtag_core::errors::{strerror, Error, Result};

pub use crate::tagger::MkvTagger;
pub use crate::tags::{
    SimpleTag, Tag, TagCollection, TARGET_TYPE_ALBUM, TARGET_TYPE_COLLECTION, TARGET_TYPE_EDITION,
    TARGET_TYPE_PART, TARGET_TYPE_SHOT, TARGET_TYPE_SUBTRACK, TARGET_TYPE_TRACK,
};

/// The library version string.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
