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

//! Object Identifier (OID) for content-addressable storage
//!
//! An OID is the cryptographic hash of an object's hashed form, providing:
//! - Unique identification of objects
//! - Automatic content deduplication
//! - Content verification capability
//!
//! Identifiers are stored raw; hex conversion happens only at interface
//! edges and within commit/tag header parsing.

use crate::error::{OdbError, OdbResult};
use crate::hash::HashAlgorithm;
use crate::object::ObjectKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum raw identifier width across supported digest families
pub const MAX_HASH_WIDTH: usize = 32;

/// Object Identifier - the digest of an object's envelope plus payload
///
/// Stored in a fixed buffer wide enough for the largest family; bytes past
/// the family's width are always zero, so derived equality and ordering are
/// bytewise over the meaningful prefix.
///
/// # Examples
///
/// ```
/// use gitodb::{HashAlgorithm, Oid};
///
/// let oid = Oid::hash(HashAlgorithm::Sha1, b"some content");
/// assert_eq!(oid.to_hex().len(), 40);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Oid {
    algo: HashAlgorithm,
    bytes: [u8; MAX_HASH_WIDTH],
}

impl Oid {
    /// Create an OID by hashing raw bytes with the given family
    ///
    /// This hashes the bytes verbatim; object identity additionally covers
    /// the `<kind> SP <size> NUL` envelope, see [`Oid::for_object`].
    pub fn hash(algo: HashAlgorithm, data: &[u8]) -> Self {
        let mut hasher = algo.hasher();
        hasher.update(data);
        hasher.finalize()
    }

    /// Compute the identifier of an object from its kind and payload
    ///
    /// The hashed form is `<kind> SP <decimal-size> NUL <payload>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use gitodb::{HashAlgorithm, ObjectKind, Oid};
    ///
    /// // The well-known empty blob identifier.
    /// let oid = Oid::for_object(HashAlgorithm::Sha1, ObjectKind::Blob, b"");
    /// assert_eq!(oid.to_hex(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    /// ```
    pub fn for_object(algo: HashAlgorithm, kind: ObjectKind, payload: &[u8]) -> Self {
        let mut hasher = algo.hasher();
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b" ");
        hasher.update(payload.len().to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(payload);
        hasher.finalize()
    }

    /// Create an OID from raw bytes of exactly the family's width
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the slice width does not match
    pub fn from_bytes(algo: HashAlgorithm, bytes: &[u8]) -> OdbResult<Self> {
        if bytes.len() != algo.width() {
            return Err(OdbError::invalid_argument(format!(
                "identifier must be {} bytes for {}, got {}",
                algo.width(),
                algo,
                bytes.len()
            )));
        }

        let mut buf = [0u8; MAX_HASH_WIDTH];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Oid { algo, bytes: buf })
    }

    /// Create an OID from a lowercase hex string
    ///
    /// The family is inferred from the length: 40 characters for SHA-1,
    /// 64 for SHA-256.
    ///
    /// # Examples
    ///
    /// ```
    /// use gitodb::Oid;
    ///
    /// let oid = Oid::from_hex("e69de29bb2d1d6434b8b29ae775ad8c2e48c5391").unwrap();
    /// assert_eq!(oid.to_hex(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    /// assert!(Oid::from_hex("abcd").is_err());
    /// ```
    pub fn from_hex(s: &str) -> OdbResult<Self> {
        let algo = match s.len() {
            40 => HashAlgorithm::Sha1,
            64 => HashAlgorithm::Sha256,
            n => {
                return Err(OdbError::invalid_argument(format!(
                    "identifier hex must be 40 or 64 characters, got {}",
                    n
                )))
            }
        };

        let bytes = hex::decode(s)
            .map_err(|e| OdbError::invalid_argument(format!("invalid hex: {}", e)))?;
        Oid::from_bytes(algo, &bytes)
    }

    /// Parse a hex identifier appearing inside an object header
    ///
    /// Unlike [`Oid::from_hex`] the expected family is known, and a width or
    /// digit error means the surrounding object is corrupt.
    pub(crate) fn from_header_hex(algo: HashAlgorithm, raw: &[u8]) -> OdbResult<Self> {
        if raw.len() != algo.hex_width() {
            return Err(OdbError::corrupt(format!(
                "identifier in header must be {} hex characters, got {}",
                algo.hex_width(),
                raw.len()
            )));
        }
        let bytes = hex::decode(raw)
            .map_err(|e| OdbError::corrupt(format!("invalid hex in header: {}", e)))?;
        Oid::from_bytes(algo, &bytes)
    }

    /// The reserved all-zero "none" identifier for the given family
    pub fn zero(algo: HashAlgorithm) -> Self {
        Oid {
            algo,
            bytes: [0u8; MAX_HASH_WIDTH],
        }
    }

    /// Check whether this is the all-zero sentinel
    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }

    /// The digest family this identifier belongs to
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    /// Get the raw bytes, exactly the family's width
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.algo.width()]
    }

    /// First byte of the raw identifier, the pack-index fanout key
    pub fn first_byte(&self) -> u8 {
        self.bytes[0]
    }

    /// Convert to the lowercase hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Relative loose-object path: `{first2hex}/{rest}`
    ///
    /// # Examples
    ///
    /// ```
    /// use gitodb::{HashAlgorithm, Oid};
    ///
    /// let oid = Oid::hash(HashAlgorithm::Sha1, b"x");
    /// let path = oid.to_path();
    /// assert_eq!(path.split('/').next().unwrap().len(), 2);
    /// ```
    pub fn to_path(&self) -> String {
        let hex = self.to_hex();
        format!("{}/{}", &hex[..2], &hex[2..])
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.to_hex())
    }
}
