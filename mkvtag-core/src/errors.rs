// MkvTag
// Copyright (c) 2024 The Project MkvTag Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type and its stable numeric codes.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by mkvtag.
#[derive(Debug)]
pub enum Error {
    /// An argument passed to an operation was invalid for that operation.
    InvalidArg,
    /// A heap allocation failed. Not raised by this implementation (the global
    /// allocator aborts on failure); retained so every stable code has a variant.
    NoMemory,
    /// An IO error occurred while reading, writing, or seeking the stream.
    IoError(io::Error),
    /// The operation requires an open file, but the context is closed.
    NotOpen,
    /// The context already has an open file.
    AlreadyOpen,
    /// A write was attempted on a file opened read-only.
    ReadOnly,
    /// The stream does not start with an EBML header.
    NotEbml,
    /// The stream is EBML, but its DocType is neither `matroska` nor `webm`.
    NotMkv,
    /// The stream contained malformed data and could not be decoded.
    Corrupt(&'static str),
    /// The stream ended before the expected amount of data could be read.
    Truncated,
    /// A variable-length integer had an invalid leading byte.
    InvalidVint,
    /// A value does not fit the requested variable-length integer width.
    VintOverflow,
    /// The file has no Tags element.
    NoTags,
    /// No simple tag with the requested name exists.
    TagNotFound,
    /// The element content does not fit the caller's buffer.
    TagTooLarge,
    /// No placement strategy could fit the serialized Tags element.
    NoSpace,
    /// A write to the underlying stream failed or was short.
    WriteFailed,
    /// A seek was rejected by the underlying stream.
    SeekFailed,
}

impl Error {
    /// Returns the stable numeric code for this error. Codes are negative;
    /// 0 is reserved for success.
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidArg => -1,
            Error::NoMemory => -2,
            Error::IoError(_) => -3,
            Error::NotOpen => -4,
            Error::AlreadyOpen => -5,
            Error::ReadOnly => -6,
            Error::NotEbml => -10,
            Error::NotMkv => -11,
            Error::Corrupt(_) => -12,
            Error::Truncated => -13,
            Error::InvalidVint => -14,
            Error::VintOverflow => -15,
            Error::NoTags => -20,
            Error::TagNotFound => -21,
            Error::TagTooLarge => -22,
            Error::NoSpace => -30,
            Error::WriteFailed => -31,
            Error::SeekFailed => -32,
        }
    }
}

/// Returns a human-readable message for a stable numeric code. Every defined
/// code, and any unknown code, yields a non-empty static string.
pub fn strerror(code: i32) -> &'static str {
    match code {
        0 => "Success",
        -1 => "Invalid argument",
        -2 => "Out of memory",
        -3 => "I/O error",
        -4 => "File not open",
        -5 => "File already open",
        -6 => "File is read-only",
        -10 => "Not a valid EBML file",
        -11 => "Not a Matroska file",
        -12 => "File is corrupted",
        -13 => "Unexpected end of file",
        -14 => "Invalid VINT encoding",
        -15 => "VINT value too large",
        -20 => "No Tags element found",
        -21 => "Tag not found",
        -22 => "Tag data too large for buffer",
        -30 => "Not enough space to write tags",
        -31 => "Write operation failed",
        -32 => "Seek operation failed",
        _ => "Unknown error",
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidArg => write!(f, "invalid argument"),
            Error::NoMemory => write!(f, "out of memory"),
            Error::IoError(ref err) => write!(f, "io error: {}", err),
            Error::NotOpen => write!(f, "file not open"),
            Error::AlreadyOpen => write!(f, "file already open"),
            Error::ReadOnly => write!(f, "file is read-only"),
            Error::NotEbml => write!(f, "not a valid EBML file"),
            Error::NotMkv => write!(f, "not a Matroska file"),
            Error::Corrupt(msg) => write!(f, "malformed stream: {}", msg),
            Error::Truncated => write!(f, "unexpected end of file"),
            Error::InvalidVint => write!(f, "invalid VINT encoding"),
            Error::VintOverflow => write!(f, "VINT value too large"),
            Error::NoTags => write!(f, "no Tags element found"),
            Error::TagNotFound => write!(f, "tag not found"),
            Error::TagTooLarge => write!(f, "tag data too large for buffer"),
            Error::NoSpace => write!(f, "not enough space to write tags"),
            Error::WriteFailed => write!(f, "write operation failed"),
            Error::SeekFailed => write!(f, "seek operation failed"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::Truncated,
            _ => Error::IoError(err),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a corrupt-stream error.
pub fn corrupt_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::Corrupt(desc))
}

/// Convenience function to create an end-of-stream error.
pub fn end_of_stream_error<T>() -> Result<T> {
    Err(Error::Truncated)
}

/// Convenience function to create a seek error.
pub fn seek_error<T>() -> Result<T> {
    Err(Error::SeekFailed)
}
