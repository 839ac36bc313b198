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

//! Object Database (ODB) - unified lookup over loose and packed storage
//!
//! The database resolves an identifier by consulting the loose backend
//! first, then each discovered pack. Pack hits walk delta chains with a
//! bounded depth and a byte-budgeted cache of reconstructed objects. Writes
//! always produce loose objects; an identifier that already exists is a
//! successful no-op.
//!
//! Operations are synchronous and blocking. The database is safe for
//! concurrent readers; the pack set only changes through [`ObjectDatabase::reload`].

use crate::cache::DeltaBaseCache;
use crate::config::OdbOptions;
use crate::error::{OdbError, OdbResult};
use crate::hash::HashAlgorithm;
use crate::loose::{LooseBackend, LooseReader};
use crate::metrics::OdbMetrics;
use crate::object::{Object, ObjectKind};
use crate::oid::Oid;
use crate::pack::Pack;
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Object database over one `objects/` directory
///
/// # Examples
///
/// ```no_run
/// use gitodb::{HashAlgorithm, ObjectDatabase, ObjectKind};
///
/// fn main() -> anyhow::Result<()> {
///     let db = ObjectDatabase::open("/repo/.git/objects", HashAlgorithm::Sha1)?;
///
///     let oid = db.write(ObjectKind::Blob, b"Hello, World!")?;
///     let object = db.read(&oid)?;
///     assert_eq!(object.kind(), ObjectKind::Blob);
///
///     Ok(())
/// }
/// ```
pub struct ObjectDatabase {
    root: PathBuf,
    algo: HashAlgorithm,
    options: OdbOptions,
    loose: LooseBackend,
    packs: RwLock<Vec<Arc<Pack>>>,
    cache: DeltaBaseCache,
    metrics: Mutex<OdbMetrics>,
}

impl ObjectDatabase {
    /// Open a database over an objects directory with default options
    pub fn open(root: impl AsRef<Path>, algo: HashAlgorithm) -> OdbResult<Self> {
        Self::with_options(root, algo, OdbOptions::default())
    }

    /// Open a database with explicit options
    pub fn with_options(
        root: impl AsRef<Path>,
        algo: HashAlgorithm,
        options: OdbOptions,
    ) -> OdbResult<Self> {
        let root = root.as_ref().to_path_buf();
        let packs = discover_packs(&root, algo)?;

        info!(
            root = %root.display(),
            algo = %algo,
            packs = packs.len(),
            cache_bytes = options.cache_bytes,
            "opened object database"
        );

        Ok(ObjectDatabase {
            loose: LooseBackend::new(&root, algo),
            cache: DeltaBaseCache::new(options.cache_bytes),
            metrics: Mutex::new(OdbMetrics::new()),
            packs: RwLock::new(packs),
            root,
            algo,
            options,
        })
    }

    /// Open the database of a `.git` directory (or a bare repository)
    pub fn from_git_dir(git_dir: impl AsRef<Path>, algo: HashAlgorithm) -> OdbResult<Self> {
        Self::open(git_dir.as_ref().join("objects"), algo)
    }

    /// The objects directory this database serves
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The digest family identifiers use
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    /// Number of packs currently known
    pub fn pack_count(&self) -> usize {
        self.packs().len()
    }

    /// Re-scan `objects/pack/` after a repack or fetch
    ///
    /// Between calls the pack set is immutable. Cache entries are keyed by
    /// pack checksum, so entries for surviving packs stay valid.
    pub fn reload(&self) -> OdbResult<()> {
        let packs = discover_packs(&self.root, self.algo)?;
        info!(packs = packs.len(), "reloaded pack set");
        match self.packs.write() {
            Ok(mut guard) => *guard = packs,
            Err(poisoned) => *poisoned.into_inner() = packs,
        }
        Ok(())
    }

    fn packs(&self) -> Vec<Arc<Pack>> {
        match self.packs.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn with_metrics(&self, update: impl FnOnce(&mut OdbMetrics)) {
        match self.metrics.lock() {
            Ok(mut guard) => update(&mut guard),
            Err(poisoned) => update(&mut poisoned.into_inner()),
        }
    }

    fn check_family(&self, oid: &Oid) -> OdbResult<()> {
        if oid.algorithm() != self.algo {
            return Err(OdbError::invalid_argument(format!(
                "identifier is {} but this database uses {}",
                oid.algorithm(),
                self.algo
            )));
        }
        Ok(())
    }

    /// Check whether an object exists in any backend
    pub fn exists(&self, oid: &Oid) -> bool {
        if oid.algorithm() != self.algo {
            return false;
        }
        self.loose.contains(oid)
            || self
                .packs()
                .iter()
                .any(|pack| pack.index().find(oid).is_some())
    }

    /// Read and decode an object
    ///
    /// # Errors
    ///
    /// `NotFound` when no backend holds the identifier; decode errors
    /// propagate from the codec for the object's kind
    pub fn read(&self, oid: &Oid) -> OdbResult<Object> {
        let (kind, payload) = self.read_raw(oid)?;
        Object::decode(kind, &payload, self.algo)
    }

    /// Read an object's kind and undecoded payload
    pub fn read_raw(&self, oid: &Oid) -> OdbResult<(ObjectKind, Vec<u8>)> {
        self.check_family(oid)?;
        self.read_raw_with_budget(oid, self.options.max_delta_depth)
    }

    fn read_raw_with_budget(
        &self,
        oid: &Oid,
        budget: usize,
    ) -> OdbResult<(ObjectKind, Vec<u8>)> {
        match self.loose.open(oid) {
            Ok(reader) => {
                self.with_metrics(|m| m.record_loose_read());
                let kind = reader.kind();
                return Ok((kind, reader.read_payload()?));
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        for pack in self.packs() {
            let Some(offset) = pack.index().lookup(oid) else {
                continue;
            };
            let cached = self.cache.get(pack.cache_key(), offset);
            self.with_metrics(|m| m.record_pack_read(cached.is_some()));
            if let Some(hit) = cached {
                return Ok((hit.0, hit.1.clone()));
            }

            debug!(oid = %oid, pack = %pack.path().display(), offset, "reading packed object");
            let resolver =
                |base: &Oid, remaining: usize| self.read_raw_with_budget(base, remaining);
            return pack.resolve_at(offset, budget, &self.cache, &resolver);
        }

        Err(OdbError::not_found(oid.to_hex()))
    }

    /// Open a loose object for streaming payload access
    ///
    /// Packed objects have no streaming form; use [`ObjectDatabase::read_raw`]
    /// for those.
    pub fn open_loose(&self, oid: &Oid) -> OdbResult<LooseReader> {
        self.check_family(oid)?;
        self.loose.open(oid)
    }

    /// Write an object, returning its identifier
    ///
    /// Writing bytes that already exist is a successful no-op.
    pub fn write(&self, kind: ObjectKind, payload: &[u8]) -> OdbResult<Oid> {
        self.write_stream(kind, payload.len() as u64, &mut &payload[..])
    }

    /// Write an object by streaming `size` payload bytes from a reader
    pub fn write_stream<R: Read>(
        &self,
        kind: ObjectKind,
        size: u64,
        payload: &mut R,
    ) -> OdbResult<Oid> {
        let (oid, is_new) = self.loose.write_stream(kind, size, payload)?;
        self.with_metrics(|m| m.record_write(size, is_new));
        if is_new {
            debug!(oid = %oid, kind = %kind, size, "wrote object");
        }
        Ok(oid)
    }

    /// Re-read an object and check its bytes still hash to its identifier
    ///
    /// Returns `Ok(false)` when the object is missing or unreadable.
    pub fn verify(&self, oid: &Oid) -> OdbResult<bool> {
        match self.read_raw(oid) {
            Ok((kind, payload)) => {
                let actual = Oid::for_object(self.algo, kind, &payload);
                if actual != *oid {
                    warn!(expected = %oid, computed = %actual, "object integrity check failed");
                }
                Ok(actual == *oid)
            }
            Err(_) => Ok(false),
        }
    }

    /// Enumerate loose identifiers, sorted
    pub fn iter_loose(&self) -> OdbResult<impl Iterator<Item = Oid>> {
        Ok(self.loose.iter()?.into_iter())
    }

    /// Enumerate packed identifiers across all packs, sorted and deduplicated
    pub fn iter_packed(&self) -> OdbResult<impl Iterator<Item = Oid>> {
        let mut oids = BTreeSet::new();
        for pack in self.packs() {
            for (oid, _) in pack.index().iter() {
                oids.insert(oid);
            }
        }
        Ok(oids.into_iter())
    }

    /// Resolve a hex prefix of length >= 2 to a unique identifier
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a malformed prefix, `NotFound` when nothing
    /// matches, `AmbiguousPrefix` when more than one identifier does
    pub fn resolve_prefix(&self, prefix: &str) -> OdbResult<Oid> {
        if prefix.len() < 2 || prefix.len() > self.algo.hex_width() {
            return Err(OdbError::invalid_argument(format!(
                "prefix must be 2..={} hex characters: {:?}",
                self.algo.hex_width(),
                prefix
            )));
        }
        if !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(OdbError::invalid_argument(format!(
                "prefix is not hex: {:?}",
                prefix
            )));
        }
        let needle = prefix.to_ascii_lowercase();

        let mut matches: BTreeSet<Oid> = BTreeSet::new();
        for oid in self.loose.iter()? {
            if oid.to_hex().starts_with(&needle) {
                matches.insert(oid);
            }
        }
        for pack in self.packs() {
            for (oid, _) in pack.index().iter() {
                if oid.to_hex().starts_with(&needle) {
                    matches.insert(oid);
                }
            }
        }

        let mut found = matches.into_iter();
        match (found.next(), found.next()) {
            (None, _) => Err(OdbError::not_found(needle)),
            (Some(oid), None) => Ok(oid),
            (Some(_), Some(_)) => Err(OdbError::ambiguous(needle)),
        }
    }

    /// Verify every pack's trailing checksum and entry CRCs
    pub fn verify_packs(&self) -> OdbResult<()> {
        for pack in self.packs() {
            pack.index().verify()?;
            pack.verify()?;
        }
        Ok(())
    }

    /// Snapshot of the database's counters
    pub fn metrics(&self) -> OdbMetrics {
        match self.metrics.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Enumerate `objects/pack/pack-*.idx` files paired with `.pack` data
fn discover_packs(root: &Path, algo: HashAlgorithm) -> OdbResult<Vec<Arc<Pack>>> {
    let pack_dir = root.join("pack");
    let entries = match fs::read_dir(&pack_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(OdbError::Io(err)),
    };

    let mut index_paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("idx") {
            index_paths.push(path);
        }
    }
    index_paths.sort();

    let mut packs = Vec::new();
    for index_path in index_paths {
        let pack_path = index_path.with_extension("pack");
        if !pack_path.is_file() {
            warn!(index = %index_path.display(), "index has no pack file, skipping");
            continue;
        }
        match Pack::open(&pack_path, &index_path, algo) {
            Ok(pack) => packs.push(Arc::new(pack)),
            Err(err) => {
                warn!(pack = %pack_path.display(), error = %err, "failed to open pack, skipping");
            }
        }
    }
    Ok(packs)
}
