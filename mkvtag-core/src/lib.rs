// MkvTag
// Copyright (c) 2024 The Project MkvTag Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `mkvtag-core` is the support library for the mkvtag project. It provides
//! the common error type with its stable numeric codes, and buffered seekable
//! I/O over any byte medium a Matroska file may live on.
//!
//! This crate has no public-facing tag functionality; see the `mkvtag` crate.

pub mod errors;
pub mod io;
