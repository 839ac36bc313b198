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

//! Loose object backend: one zlib-compressed file per object
//!
//! Layout: identifier `h0h1h2...` lives at `objects/h0h1/h2h3...`. The
//! plaintext is `<kind> SP <decimal-size> NUL <payload>`. Reads stream the
//! payload; writes stream through the hasher and compressor into a
//! temporary file that is atomically renamed to the canonical path.

use crate::error::{OdbError, OdbResult};
use crate::hash::HashAlgorithm;
use crate::object::ObjectKind;
use crate::oid::Oid;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Chunk size for streaming reads through the hasher and compressor
const WRITE_CHUNK: usize = 64 * 1024;

/// Streaming reader over one loose object's payload
///
/// Created by [`LooseBackend::open`]; the envelope has already been consumed
/// and the remaining bytes are exactly the payload. The backing file handle
/// is released when this reader is dropped.
#[derive(Debug)]
pub struct LooseReader {
    kind: ObjectKind,
    size: u64,
    inner: BufReader<ZlibDecoder<File>>,
}

impl LooseReader {
    /// Kind declared by the envelope
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Payload size declared by the envelope
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read the entire payload, enforcing the declared size
    pub fn read_payload(mut self) -> OdbResult<Vec<u8>> {
        let mut payload = Vec::with_capacity(self.size.min(64 * 1024 * 1024) as usize);
        self.inner.read_to_end(&mut payload)?;
        if payload.len() as u64 != self.size {
            return Err(OdbError::SizeMismatch {
                expected: self.size,
                actual: payload.len() as u64,
            });
        }
        Ok(payload)
    }
}

impl Read for LooseReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Loose object storage rooted at an `objects/` directory
#[derive(Debug, Clone)]
pub struct LooseBackend {
    root: PathBuf,
    algo: HashAlgorithm,
}

impl LooseBackend {
    /// Create a backend over the given objects directory
    pub fn new(root: impl Into<PathBuf>, algo: HashAlgorithm) -> Self {
        LooseBackend {
            root: root.into(),
            algo,
        }
    }

    /// The objects directory this backend reads and writes
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, oid: &Oid) -> PathBuf {
        self.root.join(oid.to_path())
    }

    /// Check whether a loose file exists for the identifier
    pub fn contains(&self, oid: &Oid) -> bool {
        self.object_path(oid).is_file()
    }

    /// Open an object for streaming: decode the envelope, leave the payload
    ///
    /// # Errors
    ///
    /// `NotFound` when no loose file exists; `Corrupt` for a malformed
    /// envelope
    pub fn open(&self, oid: &Oid) -> OdbResult<LooseReader> {
        let path = self.object_path(oid);
        let file = File::open(&path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                OdbError::not_found(oid.to_hex())
            } else {
                OdbError::Io(err)
            }
        })?;

        let mut inner = BufReader::new(ZlibDecoder::new(file));
        let (kind, size) = read_envelope(&mut inner)?;
        Ok(LooseReader { kind, size, inner })
    }

    /// Write an object from an in-memory payload
    ///
    /// Returns the identifier and whether the object was newly stored.
    pub fn write(&self, kind: ObjectKind, payload: &[u8]) -> OdbResult<(Oid, bool)> {
        self.write_stream(kind, payload.len() as u64, &mut &payload[..])
    }

    /// Write an object by streaming `size` payload bytes from a reader
    ///
    /// The envelope and payload stream through the configured hasher and a
    /// zlib encoder in parallel; the compressed bytes land in a temporary
    /// file that is renamed into place once the identifier is known. If the
    /// destination already exists the bytes are already present and the
    /// temporary file is discarded.
    ///
    /// # Errors
    ///
    /// `SizeMismatch` when the reader yields other than `size` bytes
    pub fn write_stream<R: Read>(
        &self,
        kind: ObjectKind,
        size: u64,
        payload: &mut R,
    ) -> OdbResult<(Oid, bool)> {
        fs::create_dir_all(&self.root)?;
        let temp = NamedTempFile::new_in(&self.root)?;
        let mut encoder = ZlibEncoder::new(temp, Compression::new(6));
        let mut hasher = self.algo.hasher();

        let envelope = format!("{} {}\0", kind.as_str(), size);
        hasher.update(envelope.as_bytes());
        encoder.write_all(envelope.as_bytes())?;

        let mut remaining = size;
        let mut chunk = [0u8; WRITE_CHUNK];
        while remaining > 0 {
            let want = remaining.min(WRITE_CHUNK as u64) as usize;
            let got = payload.read(&mut chunk[..want])?;
            if got == 0 {
                return Err(OdbError::SizeMismatch {
                    expected: size,
                    actual: size - remaining,
                });
            }
            hasher.update(&chunk[..got]);
            encoder.write_all(&chunk[..got])?;
            remaining -= got as u64;
        }
        // The payload must be exactly `size` bytes; one more byte is too many.
        if payload.read(&mut chunk[..1])? != 0 {
            return Err(OdbError::SizeMismatch {
                expected: size,
                actual: size + 1,
            });
        }

        let temp = encoder.finish()?;
        let oid = hasher.finalize();
        let path = self.object_path(&oid);

        if path.is_file() {
            debug!(oid = %oid, "object already exists (deduplicated)");
            return Ok((oid, false));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        temp.persist(&path).map_err(|err| OdbError::Io(err.error))?;
        debug!(oid = %oid, kind = %kind, size, "stored loose object");
        Ok((oid, true))
    }

    /// Enumerate all loose identifiers, sorted
    ///
    /// Entries that are not two-hex-digit fan directories or whose names do
    /// not form a well-formed identifier are skipped with a warning.
    pub fn iter(&self) -> OdbResult<Vec<Oid>> {
        let mut oids = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(oids),
            Err(err) => return Err(OdbError::Io(err)),
        };

        for entry in entries {
            let entry = entry?;
            let fan = entry.file_name();
            let Some(fan) = fan.to_str() else { continue };
            if fan.len() != 2 || !fan.bytes().all(|b| b.is_ascii_hexdigit()) {
                continue;
            }
            if !entry.file_type()?.is_dir() {
                continue;
            }

            for object in fs::read_dir(entry.path())? {
                let object = object?;
                let rest = object.file_name();
                let Some(rest) = rest.to_str() else { continue };
                let hex = format!("{}{}", fan, rest);
                if hex.len() != self.algo.hex_width() {
                    warn!(path = %object.path().display(), "skipping non-identifier file");
                    continue;
                }
                match Oid::from_hex(&hex) {
                    Ok(oid) => oids.push(oid),
                    Err(_) => {
                        warn!(path = %object.path().display(), "skipping non-identifier file");
                    }
                }
            }
        }

        oids.sort();
        Ok(oids)
    }
}

/// Parse the `<kind> SP <decimal-size> NUL` envelope
fn read_envelope<R: BufRead>(reader: &mut R) -> OdbResult<(ObjectKind, u64)> {
    let mut kind_raw = Vec::new();
    reader.read_until(b' ', &mut kind_raw)?;
    if kind_raw.last() != Some(&b' ') {
        return Err(OdbError::corrupt("envelope truncated before size"));
    }
    kind_raw.pop();
    let kind = ObjectKind::parse(&kind_raw)?;

    let mut size_raw = Vec::new();
    reader.read_until(b'\0', &mut size_raw)?;
    if size_raw.last() != Some(&b'\0') {
        return Err(OdbError::corrupt("envelope truncated before payload"));
    }
    size_raw.pop();
    let size = parse_decimal_size(&size_raw)?;

    Ok((kind, size))
}

/// Parse the envelope size: ASCII digits, no leading zeros except `0`
fn parse_decimal_size(raw: &[u8]) -> OdbResult<u64> {
    if raw.is_empty() {
        return Err(OdbError::corrupt("envelope has empty size"));
    }
    if raw.len() > 1 && raw[0] == b'0' {
        return Err(OdbError::corrupt("envelope size has leading zero"));
    }

    let mut size: u64 = 0;
    for &b in raw {
        if !b.is_ascii_digit() {
            return Err(OdbError::corrupt(format!(
                "envelope size is not decimal: {:?}",
                String::from_utf8_lossy(raw)
            )));
        }
        size = size
            .checked_mul(10)
            .and_then(|s| s.checked_add(u64::from(b - b'0')))
            .ok_or_else(|| OdbError::corrupt("envelope size overflows"))?;
    }
    Ok(size)
}
