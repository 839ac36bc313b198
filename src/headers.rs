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

//! Line-oriented header block shared by commit and tag codecs
//!
//! A header is `<key> SP <value>\n`. A continuation line begins with a
//! single space and appends to the previous header's value, joined with a
//! newline and without the leading space. The blank line is the sole
//! terminator of the block; everything after it is the message, verbatim.

use crate::error::{OdbError, OdbResult};
use std::io::{BufRead, Read, Write};

/// A header preserved in insertion order, key and value as raw bytes
///
/// Multi-line values are stored with embedded newlines; the wire's leading
/// continuation spaces are stripped on decode and restored on encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraHeader {
    /// Header key, the bytes before the first space
    pub name: Vec<u8>,
    /// Header value, possibly multi-line
    pub value: Vec<u8>,
}

impl ExtraHeader {
    /// Create a header from raw key and value bytes
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        ExtraHeader {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Read headers until the blank line (or end of input), in wire order
///
/// Returns raw `(key, value)` pairs; callers extract the kind-specific
/// fields and keep the rest as extra headers. `consumed` is advanced by
/// every byte read, including the terminating blank line.
pub(crate) fn read_header_block<R: BufRead>(
    reader: &mut R,
    consumed: &mut u64,
) -> OdbResult<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut headers: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            // Input ended without a blank line; the header block is all
            // there was.
            break;
        }
        *consumed += n as u64;

        if line.last() == Some(&b'\n') {
            line.pop();
        }
        if line.is_empty() {
            break;
        }

        if line[0] == b' ' {
            let Some(last) = headers.last_mut() else {
                return Err(OdbError::corrupt(
                    "continuation line before any header".to_string(),
                ));
            };
            last.1.push(b'\n');
            last.1.extend_from_slice(&line[1..]);
            continue;
        }

        match line.iter().position(|&b| b == b' ') {
            Some(sp) => headers.push((line[..sp].to_vec(), line[sp + 1..].to_vec())),
            None => headers.push((line.clone(), Vec::new())),
        }
    }

    Ok(headers)
}

/// Read the message: the remainder verbatim, minus one final newline
pub(crate) fn read_message<R: Read>(reader: &mut R, consumed: &mut u64) -> OdbResult<Vec<u8>> {
    let mut message = Vec::new();
    let n = reader.read_to_end(&mut message)?;
    *consumed += n as u64;
    if message.last() == Some(&b'\n') {
        message.pop();
    }
    Ok(message)
}

/// Write one header, emitting continuation lines for embedded newlines
pub(crate) fn write_header<W: Write>(
    writer: &mut W,
    key: &[u8],
    value: &[u8],
) -> OdbResult<u64> {
    let mut written = 0u64;
    writer.write_all(key)?;
    writer.write_all(b" ")?;
    written += key.len() as u64 + 1;

    let mut first = true;
    for line in value.split(|&b| b == b'\n') {
        if !first {
            writer.write_all(b" ")?;
            written += 1;
        }
        writer.write_all(line)?;
        writer.write_all(b"\n")?;
        written += line.len() as u64 + 1;
        first = false;
    }
    Ok(written)
}

/// Write the blank separator and the message
///
/// A final newline is appended iff the message is non-empty and does not
/// already end in one.
pub(crate) fn write_message<W: Write>(writer: &mut W, message: &[u8]) -> OdbResult<u64> {
    writer.write_all(b"\n")?;
    writer.write_all(message)?;
    let mut written = 1 + message.len() as u64;
    if !message.is_empty() && message.last() != Some(&b'\n') {
        writer.write_all(b"\n")?;
        written += 1;
    }
    Ok(written)
}
