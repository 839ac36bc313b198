// gitodb - Git Object Database for Rust
// Copyright (C) 2025 gitodb Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! Error types and utilities for object database operations

use std::io;
use thiserror::Error;

/// Result type alias for object database operations
pub type OdbResult<T> = Result<T, OdbError>;

/// Errors that can occur while reading or writing objects
#[derive(Error, Debug)]
pub enum OdbError {
    /// Identifier absent from both the loose and packed backends
    #[error("object not found: {0}")]
    NotFound(String),

    /// A hex prefix matched more than one identifier
    #[error("ambiguous abbreviation: {0}")]
    AmbiguousPrefix(String),

    /// A loose or packed serialization failed to parse
    #[error("corrupt object: {0}")]
    Corrupt(String),

    /// Declared size does not match the bytes actually produced
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Size declared by the envelope or entry header
        expected: u64,
        /// Size observed after decode/inflate/delta
        actual: u64,
    },

    /// A trailing pack/index digest or a per-entry CRC-32 did not match
    #[error("checksum mismatch: {0}")]
    ChecksumMismatch(String),

    /// A delta chain could not be resolved to a base object
    #[error("unresolved delta: {0}")]
    UnresolvedDelta(String),

    /// Malformed caller input (bad hex, wrong identifier width, short prefix)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Underlying filesystem failure, cause preserved
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl OdbError {
    /// Create a NotFound error for the given identifier or prefix
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        OdbError::NotFound(what.into())
    }

    /// Create an AmbiguousPrefix error
    pub fn ambiguous<S: Into<String>>(prefix: S) -> Self {
        OdbError::AmbiguousPrefix(prefix.into())
    }

    /// Create a Corrupt error with context
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        OdbError::Corrupt(msg.into())
    }

    /// Create a ChecksumMismatch error with context
    pub fn checksum<S: Into<String>>(msg: S) -> Self {
        OdbError::ChecksumMismatch(msg.into())
    }

    /// Create an UnresolvedDelta error with context
    pub fn unresolved_delta<S: Into<String>>(msg: S) -> Self {
        OdbError::UnresolvedDelta(msg.into())
    }

    /// Create an InvalidArgument error with context
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        OdbError::InvalidArgument(msg.into())
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, OdbError::NotFound(_))
    }

    /// Check if this is an AmbiguousPrefix error
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, OdbError::AmbiguousPrefix(_))
    }

    /// Check if this is a Corrupt error
    pub fn is_corrupt(&self) -> bool {
        matches!(self, OdbError::Corrupt(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = OdbError::not_found("deadbeef");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "object not found: deadbeef");
    }

    #[test]
    fn test_ambiguous_error() {
        let err = OdbError::ambiguous("ab12");
        assert!(err.is_ambiguous());
        assert_eq!(err.to_string(), "ambiguous abbreviation: ab12");
    }

    #[test]
    fn test_size_mismatch_display() {
        let err = OdbError::SizeMismatch {
            expected: 10,
            actual: 7,
        };
        assert_eq!(err.to_string(), "size mismatch: expected 10 bytes, got 7");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "read failed");
        let odb_err = OdbError::from(io_err);
        assert!(matches!(odb_err, OdbError::Io(_)));
    }
}
