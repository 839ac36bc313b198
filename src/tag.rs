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

//! Annotated tag object
//!
//! Field order on the wire is `object`, `type`, `tag`, `tagger`, extra
//! headers, a blank line, then the message. Very old repositories contain
//! tags without a tagger, so that field is optional on decode.

use crate::error::{OdbError, OdbResult};
use crate::hash::HashAlgorithm;
use crate::headers::{self, ExtraHeader};
use crate::object::ObjectKind;
use crate::oid::Oid;
use std::io::{BufReader, Read, Write};

/// Annotated tag object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Identifier of the tagged object
    pub object: Oid,
    /// Kind of the tagged object
    pub target_kind: ObjectKind,
    /// Tag name, raw bytes
    pub name: Vec<u8>,
    /// Raw tagger line value, absent in historic tags
    pub tagger: Option<Vec<u8>>,
    /// Unrecognized headers in insertion order
    pub extra_headers: Vec<ExtraHeader>,
    /// Message bytes without the final terminator newline
    pub message: Vec<u8>,
}

impl Tag {
    /// Create a tag with no extra headers
    pub fn new(
        object: Oid,
        target_kind: ObjectKind,
        name: impl Into<Vec<u8>>,
        tagger: impl Into<Vec<u8>>,
        message: impl Into<Vec<u8>>,
    ) -> Self {
        Tag {
            object,
            target_kind,
            name: name.into(),
            tagger: Some(tagger.into()),
            extra_headers: Vec::new(),
            message: message.into(),
        }
    }

    /// Decode a tag payload of exactly `declared_size` bytes
    ///
    /// # Errors
    ///
    /// `Corrupt` when the `object`, `type`, or `tag` headers are missing or
    /// malformed
    pub fn decode<R: Read>(
        reader: &mut R,
        declared_size: u64,
        algo: HashAlgorithm,
    ) -> OdbResult<(u64, Self)> {
        let mut consumed = 0u64;
        let mut limited = BufReader::new(reader.by_ref().take(declared_size));

        let mut object: Option<Oid> = None;
        let mut target_kind: Option<ObjectKind> = None;
        let mut name: Option<Vec<u8>> = None;
        let mut tagger: Option<Vec<u8>> = None;
        let mut extra_headers = Vec::new();

        for (key, value) in headers::read_header_block(&mut limited, &mut consumed)? {
            match key.as_slice() {
                b"object" => object = Some(Oid::from_header_hex(algo, &value)?),
                b"type" => target_kind = Some(ObjectKind::parse(&value)?),
                b"tag" => name = Some(value),
                b"tagger" => tagger = Some(value),
                _ => extra_headers.push(ExtraHeader { name: key, value }),
            }
        }

        let message = headers::read_message(&mut limited, &mut consumed)?;

        let object = object.ok_or_else(|| OdbError::corrupt("tag missing object header"))?;
        let target_kind =
            target_kind.ok_or_else(|| OdbError::corrupt("tag missing type header"))?;
        let name = name.ok_or_else(|| OdbError::corrupt("tag missing tag header"))?;

        Ok((
            consumed,
            Tag {
                object,
                target_kind,
                name,
                tagger,
                extra_headers,
                message,
            },
        ))
    }

    /// Write the canonical payload, returning the bytes written
    pub fn encode<W: Write>(&self, writer: &mut W) -> OdbResult<u64> {
        let mut written = 0u64;
        written += headers::write_header(writer, b"object", self.object.to_hex().as_bytes())?;
        written +=
            headers::write_header(writer, b"type", self.target_kind.as_str().as_bytes())?;
        written += headers::write_header(writer, b"tag", &self.name)?;
        if let Some(tagger) = &self.tagger {
            written += headers::write_header(writer, b"tagger", tagger)?;
        }
        for header in &self.extra_headers {
            written += headers::write_header(writer, &header.name, &header.value)?;
        }
        written += headers::write_message(writer, &self.message)?;
        Ok(written)
    }
}
