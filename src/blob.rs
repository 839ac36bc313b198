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

//! Blob object: an opaque byte sequence
//!
//! The canonical payload is the bytes verbatim; large blobs are better
//! streamed through the database's loose reader/writer than decoded here.

use crate::error::{OdbError, OdbResult};
use std::io::{Read, Write};

/// Blob object holding arbitrary binary content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob {
    /// The content, verbatim
    pub contents: Vec<u8>,
}

impl Blob {
    /// Create a blob from bytes
    pub fn new(contents: Vec<u8>) -> Self {
        Blob { contents }
    }

    /// Decode a blob payload of exactly `declared_size` bytes
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` when the stream ends short of the declared size
    pub fn decode<R: Read>(reader: &mut R, declared_size: u64) -> OdbResult<(u64, Self)> {
        let mut contents = Vec::with_capacity(declared_size.min(64 * 1024 * 1024) as usize);
        let read = reader
            .by_ref()
            .take(declared_size)
            .read_to_end(&mut contents)? as u64;
        if read != declared_size {
            return Err(OdbError::SizeMismatch {
                expected: declared_size,
                actual: read,
            });
        }
        Ok((read, Blob { contents }))
    }

    /// Write the payload, returning the bytes written
    pub fn encode<W: Write>(&self, writer: &mut W) -> OdbResult<u64> {
        writer.write_all(&self.contents)?;
        Ok(self.contents.len() as u64)
    }

    /// Content length in bytes
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    /// Check whether the blob is empty
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}
