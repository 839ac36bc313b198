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

//! Read and write Git's content-addressed object store
//!
//! A Git repository stores immutable objects of four kinds - blob, tree,
//! commit, tag - each identified by the hash of its canonical serialization.
//! Objects live either as individually compressed files ("loose") or
//! consolidated into packfiles with binary indices and delta compression
//! ("packed"). This crate exposes a uniform view over both forms and keeps
//! the hash-to-bytes relationship bit-exact in both directions.
//!
//! # Architecture
//!
//! - **Codecs**: canonical encode/decode for the four object kinds,
//!   including multi-line commit/tag headers and Git's tree sort order
//! - **Loose backend**: streaming envelope decode and atomic, hashing writes
//! - **Pack reader**: index v1/v2 lookup, entry decoding, and iterative
//!   delta-chain reconstruction with a bounded cache
//! - **Database**: loose-first resolution, prefix abbreviation, enumeration
//!
//! Everything is synchronous and in-process: no refs, no network, no
//! history traversal - a faithful codec and random-access reader.
//!
//! # Examples
//!
//! ```no_run
//! use gitodb::{HashAlgorithm, Object, ObjectDatabase, ObjectKind};
//!
//! fn main() -> anyhow::Result<()> {
//!     let db = ObjectDatabase::from_git_dir("/repo/.git", HashAlgorithm::Sha1)?;
//!
//!     let oid = db.write(ObjectKind::Blob, b"Hello, World!")?;
//!     assert!(db.exists(&oid));
//!
//!     match db.read(&oid)? {
//!         Object::Blob(blob) => assert_eq!(blob.contents, b"Hello, World!"),
//!         other => panic!("expected a blob, found {}", other.kind()),
//!     }
//!
//!     let abbreviated = db.resolve_prefix(&oid.to_hex()[..8])?;
//!     assert_eq!(abbreviated, oid);
//!     Ok(())
//! }
//! ```

mod blob;
mod cache;
mod commit;
mod config;
mod delta;
mod error;
mod hash;
mod headers;
mod loose;
mod metrics;
mod object;
mod odb;
mod oid;
mod pack;
mod pack_index;
mod tag;
mod tree;

pub use blob::Blob;
pub use commit::{Commit, Signature};
pub use config::OdbOptions;
pub use error::{OdbError, OdbResult};
pub use hash::{HashAlgorithm, Hasher};
pub use headers::ExtraHeader;
pub use loose::{LooseBackend, LooseReader};
pub use metrics::OdbMetrics;
pub use object::{Object, ObjectKind};
pub use odb::ObjectDatabase;
pub use oid::{Oid, MAX_HASH_WIDTH};
pub use pack_index::{IndexVersion, PackIndex};
pub use tag::Tag;
pub use tree::{Tree, TreeEntry};
