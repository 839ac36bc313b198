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

//! Commit object: a tree snapshot with parents, signatures, and a message
//!
//! Author and committer lines are preserved as raw bytes so that decoding
//! and re-encoding a canonical commit is bit-exact even for inputs a typed
//! signature could not represent; [`Signature`] is the formatting helper for
//! building well-formed lines.

use crate::error::{OdbError, OdbResult};
use crate::hash::HashAlgorithm;
use crate::headers::{self, ExtraHeader};
use crate::oid::Oid;
use std::fmt;
use std::io::{BufReader, Read, Write};

/// Author or committer identity with timestamp and zone, e.g.
/// `Pat Doe <pdoe@example.org> 1337892984 -0700`
///
/// # Examples
///
/// ```
/// use gitodb::Signature;
///
/// let sig = Signature::new("Pat Doe", "pdoe@example.org", 1337892984, "-0700");
/// assert_eq!(sig.to_string(), "Pat Doe <pdoe@example.org> 1337892984 -0700");
/// let parsed = Signature::parse(sig.to_string().as_bytes()).unwrap();
/// assert_eq!(parsed, sig);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Display name, possibly empty
    pub name: String,
    /// Email address without the angle brackets
    pub email: String,
    /// Seconds since the Unix epoch
    pub when: i64,
    /// Zone offset in `±HHMM` form, preserved verbatim
    pub tz: String,
}

impl Signature {
    /// Create a signature from its parts
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        when: i64,
        tz: impl Into<String>,
    ) -> Self {
        Signature {
            name: name.into(),
            email: email.into(),
            when,
            tz: tz.into(),
        }
    }

    /// Parse a signature line of the form `Name <email> seconds ±HHMM`
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` when the angle brackets or trailing fields are
    /// missing or malformed
    pub fn parse(raw: &[u8]) -> OdbResult<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|_| OdbError::corrupt("signature is not valid UTF-8"))?;

        let open = text
            .find('<')
            .ok_or_else(|| OdbError::corrupt(format!("signature missing '<': {}", text)))?;
        let close = text[open..]
            .find('>')
            .map(|i| open + i)
            .ok_or_else(|| OdbError::corrupt(format!("signature missing '>': {}", text)))?;

        let name = text[..open].trim_end().to_string();
        let email = text[open + 1..close].to_string();

        let mut rest = text[close + 1..].split_ascii_whitespace();
        let when = rest
            .next()
            .ok_or_else(|| OdbError::corrupt("signature missing timestamp"))?
            .parse::<i64>()
            .map_err(|e| OdbError::corrupt(format!("bad signature timestamp: {}", e)))?;
        let tz = rest
            .next()
            .ok_or_else(|| OdbError::corrupt("signature missing zone offset"))?
            .to_string();

        if tz.len() != 5 || !(tz.starts_with('+') || tz.starts_with('-')) {
            return Err(OdbError::corrupt(format!("bad zone offset: {}", tz)));
        }

        Ok(Signature {
            name,
            email,
            when,
            tz,
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "<{}> {} {}", self.email, self.when, self.tz)
        } else {
            write!(f, "{} <{}> {} {}", self.name, self.email, self.when, self.tz)
        }
    }
}

/// Commit object
///
/// Field order on the wire is canonical: `tree`, `parent`s in order,
/// `author`, `committer`, extra headers in insertion order, a blank line,
/// then the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Identifier of the tree snapshot
    pub tree: Oid,
    /// Parent commit identifiers, in wire order
    pub parents: Vec<Oid>,
    /// Raw author line value
    pub author: Vec<u8>,
    /// Raw committer line value
    pub committer: Vec<u8>,
    /// Unrecognized headers in insertion order (gpgsig, mergetag, ...)
    pub extra_headers: Vec<ExtraHeader>,
    /// Message bytes without the final terminator newline
    pub message: Vec<u8>,
}

impl Commit {
    /// Create a commit with no parents and no extra headers
    pub fn new(
        tree: Oid,
        author: impl Into<Vec<u8>>,
        committer: impl Into<Vec<u8>>,
        message: impl Into<Vec<u8>>,
    ) -> Self {
        Commit {
            tree,
            parents: Vec::new(),
            author: author.into(),
            committer: committer.into(),
            extra_headers: Vec::new(),
            message: message.into(),
        }
    }

    /// Check if this is an initial commit (no parents)
    pub fn is_initial(&self) -> bool {
        self.parents.is_empty()
    }

    /// Check if this is a merge commit (multiple parents)
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// First line of the message
    pub fn summary(&self) -> &[u8] {
        self.message
            .split(|&b| b == b'\n')
            .next()
            .unwrap_or(&self.message)
    }

    /// Decode a commit payload of exactly `declared_size` bytes
    ///
    /// Headers may appear in any order; the blank line is the sole
    /// terminator of the header block, so message lines that merely look
    /// like headers are never re-parsed.
    ///
    /// # Errors
    ///
    /// `Corrupt` for malformed headers, bad hex, a missing `tree`, or a
    /// continuation line with no preceding header
    pub fn decode<R: Read>(
        reader: &mut R,
        declared_size: u64,
        algo: HashAlgorithm,
    ) -> OdbResult<(u64, Self)> {
        let mut consumed = 0u64;
        let mut limited = BufReader::new(reader.by_ref().take(declared_size));

        let mut tree: Option<Oid> = None;
        let mut parents = Vec::new();
        let mut author = Vec::new();
        let mut committer = Vec::new();
        let mut extra_headers = Vec::new();

        for (key, value) in headers::read_header_block(&mut limited, &mut consumed)? {
            match key.as_slice() {
                b"tree" => tree = Some(Oid::from_header_hex(algo, &value)?),
                b"parent" => parents.push(Oid::from_header_hex(algo, &value)?),
                b"author" => author = value,
                b"committer" => committer = value,
                _ => extra_headers.push(ExtraHeader { name: key, value }),
            }
        }

        let message = headers::read_message(&mut limited, &mut consumed)?;

        let tree = tree.ok_or_else(|| OdbError::corrupt("commit missing tree header"))?;

        Ok((
            consumed,
            Commit {
                tree,
                parents,
                author,
                committer,
                extra_headers,
                message,
            },
        ))
    }

    /// Write the canonical payload, returning the bytes written
    pub fn encode<W: Write>(&self, writer: &mut W) -> OdbResult<u64> {
        let mut written = 0u64;
        written += headers::write_header(writer, b"tree", self.tree.to_hex().as_bytes())?;
        for parent in &self.parents {
            written += headers::write_header(writer, b"parent", parent.to_hex().as_bytes())?;
        }
        written += headers::write_header(writer, b"author", &self.author)?;
        written += headers::write_header(writer, b"committer", &self.committer)?;
        for header in &self.extra_headers {
            written += headers::write_header(writer, &header.name, &header.value)?;
        }
        written += headers::write_message(writer, &self.message)?;
        Ok(written)
    }
}
