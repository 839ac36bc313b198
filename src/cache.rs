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

//! Bounded cache for reconstructed pack objects
//!
//! Delta chains make pack reads super-linear without a cache of recently
//! reconstructed bases. Entries are keyed by `(pack, offset)` where the pack
//! key derives from the pack's trailing checksum, so entries stay valid
//! across a pack-set reload. Correctness never depends on cache contents.

use crate::object::ObjectKind;
use moka::sync::Cache;
use std::sync::Arc;

/// A cached reconstructed object: its effective kind and payload
pub(crate) type CachedObject = Arc<(ObjectKind, Vec<u8>)>;

/// Byte-budgeted cache of reconstructed pack objects
///
/// Weighted by payload size; a zero budget disables caching entirely.
pub(crate) struct DeltaBaseCache {
    inner: Option<Cache<(u64, u64), CachedObject>>,
}

impl DeltaBaseCache {
    /// Create a cache holding at most `budget_bytes` of payload
    pub(crate) fn new(budget_bytes: u64) -> Self {
        let inner = (budget_bytes > 0).then(|| {
            Cache::builder()
                .max_capacity(budget_bytes)
                .weigher(|_key: &(u64, u64), value: &CachedObject| {
                    u32::try_from(value.1.len()).unwrap_or(u32::MAX)
                })
                .build()
        });
        DeltaBaseCache { inner }
    }

    /// Fetch a reconstructed object by pack key and offset
    pub(crate) fn get(&self, pack: u64, offset: u64) -> Option<CachedObject> {
        self.inner.as_ref()?.get(&(pack, offset))
    }

    /// Store a reconstructed object
    pub(crate) fn insert(&self, pack: u64, offset: u64, kind: ObjectKind, payload: Vec<u8>) {
        if let Some(cache) = &self.inner {
            cache.insert((pack, offset), Arc::new((kind, payload)));
        }
    }
}
