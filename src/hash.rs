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

//! Hash abstraction parameterizing object identity over a digest family
//!
//! Git repositories today are addressed with SHA-1; the SHA-256 transition
//! uses the same object model with a wider identifier. The database is
//! parameterized over one [`HashAlgorithm`] chosen at construction, and all
//! identifiers it produces or accepts carry that family's width.

use crate::error::{OdbError, OdbResult};
use crate::oid::Oid;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::fmt;
use std::io;

/// Supported digest families for object identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-1, 20-byte identifiers (Git's historical default)
    Sha1,
    /// SHA-256, 32-byte identifiers (the transition format)
    Sha256,
}

impl HashAlgorithm {
    /// Width of a raw identifier in bytes
    ///
    /// # Examples
    ///
    /// ```
    /// use gitodb::HashAlgorithm;
    ///
    /// assert_eq!(HashAlgorithm::Sha1.width(), 20);
    /// assert_eq!(HashAlgorithm::Sha256.width(), 32);
    /// ```
    pub fn width(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
        }
    }

    /// Width of the lowercase hex form, twice the raw width
    pub fn hex_width(&self) -> usize {
        self.width() * 2
    }

    /// Get the algorithm name as used by Git's `extensions.objectformat`
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
        }
    }

    /// Parse an algorithm name
    pub fn parse(s: &str) -> OdbResult<Self> {
        match s {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            _ => Err(OdbError::invalid_argument(format!(
                "unknown hash algorithm: {}",
                s
            ))),
        }
    }

    /// Create a streaming hasher for this family
    pub fn hasher(&self) -> Hasher {
        match self {
            HashAlgorithm::Sha1 => Hasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Streaming digester over the configured family
///
/// Implements [`io::Write`] so it can sit in a tee while bytes stream to a
/// compressor or a file.
pub enum Hasher {
    /// SHA-1 state
    Sha1(Sha1),
    /// SHA-256 state
    Sha256(Sha256),
}

impl Hasher {
    /// Feed bytes into the digest
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
        }
    }

    /// Consume the hasher and produce the identifier
    pub fn finalize(self) -> Oid {
        match self {
            Hasher::Sha1(h) => {
                let digest = h.finalize();
                Oid::from_bytes(HashAlgorithm::Sha1, &digest)
                    .expect("sha1 digest has identifier width")
            }
            Hasher::Sha256(h) => {
                let digest = h.finalize();
                Oid::from_bytes(HashAlgorithm::Sha256, &digest)
                    .expect("sha256 digest has identifier width")
            }
        }
    }

    /// The family this hasher belongs to
    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            Hasher::Sha1(_) => HashAlgorithm::Sha1,
            Hasher::Sha256(_) => HashAlgorithm::Sha256,
        }
    }
}

impl io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hasher({})", self.algorithm())
    }
}
