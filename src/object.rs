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

//! Object kinds and the decoded object sum type
//!
//! Git's object set is closed by design, so decoded objects are a sum over
//! {blob, tree, commit, tag} rather than an open trait hierarchy. The shared
//! surface is `kind`, `encode`, and `id`.

use crate::blob::Blob;
use crate::commit::Commit;
use crate::error::{OdbError, OdbResult};
use crate::hash::HashAlgorithm;
use crate::oid::Oid;
use crate::tag::Tag;
use crate::tree::Tree;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Object kinds in the Git object database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Blob - arbitrary binary data
    Blob,
    /// Tree - one directory level, entries referencing blobs and trees
    Tree,
    /// Commit - snapshot metadata with parent references
    Commit,
    /// Tag - annotated reference to another object
    Tag,
}

impl ObjectKind {
    /// Get the kind as the identifier used in envelopes and headers
    ///
    /// # Examples
    ///
    /// ```
    /// use gitodb::ObjectKind;
    ///
    /// assert_eq!(ObjectKind::Blob.as_str(), "blob");
    /// assert_eq!(ObjectKind::Tag.as_str(), "tag");
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }

    /// Parse an object kind from envelope or header bytes
    pub fn parse(raw: &[u8]) -> OdbResult<Self> {
        match raw {
            b"blob" => Ok(ObjectKind::Blob),
            b"tree" => Ok(ObjectKind::Tree),
            b"commit" => Ok(ObjectKind::Commit),
            b"tag" => Ok(ObjectKind::Tag),
            _ => Err(OdbError::corrupt(format!(
                "unknown object kind: {:?}",
                String::from_utf8_lossy(raw)
            ))),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A decoded object of any kind
///
/// Backends return fresh decoded values owned by the caller.
///
/// # Examples
///
/// ```
/// use gitodb::{HashAlgorithm, Object, ObjectKind};
///
/// let object = Object::decode(ObjectKind::Blob, b"payload", HashAlgorithm::Sha1).unwrap();
/// assert_eq!(object.kind(), ObjectKind::Blob);
///
/// let mut out = Vec::new();
/// let n = object.encode(&mut out).unwrap();
/// assert_eq!(out, b"payload");
/// assert_eq!(n, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    /// A decoded blob
    Blob(Blob),
    /// A decoded tree
    Tree(Tree),
    /// A decoded commit
    Commit(Commit),
    /// A decoded tag
    Tag(Tag),
}

impl Object {
    /// The kind of this object
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Commit(_) => ObjectKind::Commit,
            Object::Tag(_) => ObjectKind::Tag,
        }
    }

    /// Decode an object of the given kind from its canonical payload
    ///
    /// The whole payload must be consumed; trailing bytes mean the declared
    /// envelope size did not match the serialization.
    pub fn decode(kind: ObjectKind, payload: &[u8], algo: HashAlgorithm) -> OdbResult<Self> {
        let declared = payload.len() as u64;
        let mut reader = payload;
        let (consumed, object) = match kind {
            ObjectKind::Blob => {
                let (n, blob) = Blob::decode(&mut reader, declared)?;
                (n, Object::Blob(blob))
            }
            ObjectKind::Tree => {
                let (n, tree) = Tree::decode(&mut reader, declared, algo)?;
                (n, Object::Tree(tree))
            }
            ObjectKind::Commit => {
                let (n, commit) = Commit::decode(&mut reader, declared, algo)?;
                (n, Object::Commit(commit))
            }
            ObjectKind::Tag => {
                let (n, tag) = Tag::decode(&mut reader, declared, algo)?;
                (n, Object::Tag(tag))
            }
        };

        if consumed != declared {
            return Err(OdbError::SizeMismatch {
                expected: declared,
                actual: consumed,
            });
        }
        Ok(object)
    }

    /// Write the canonical payload, returning the bytes written
    pub fn encode<W: Write>(&self, writer: &mut W) -> OdbResult<u64> {
        match self {
            Object::Blob(blob) => blob.encode(writer),
            Object::Tree(tree) => tree.encode(writer),
            Object::Commit(commit) => commit.encode(writer),
            Object::Tag(tag) => tag.encode(writer),
        }
    }

    /// Encode the canonical payload into a fresh buffer
    pub fn encode_to_vec(&self) -> OdbResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Compute the identifier of this object under the given family
    pub fn id(&self, algo: HashAlgorithm) -> OdbResult<Oid> {
        let payload = self.encode_to_vec()?;
        Ok(Oid::for_object(algo, self.kind(), &payload))
    }
}
