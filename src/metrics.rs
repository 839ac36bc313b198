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

//! Metrics tracking for object database operations

use serde::{Deserialize, Serialize};

/// Counters for reads, writes, and cache behavior
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OdbMetrics {
    /// Reads satisfied by the loose backend
    pub loose_reads: u64,

    /// Reads satisfied by a pack
    pub pack_reads: u64,

    /// Pack reads that hit the reconstructed-object cache
    pub cache_hits: u64,

    /// Pack reads that had to decode pack bytes
    pub cache_misses: u64,

    /// Total write operations, including deduplicated ones
    pub total_writes: u64,

    /// Writes that stored a new loose object
    pub unique_objects: u64,

    /// Payload bytes presented to the write path
    pub bytes_written: u64,

    /// Payload bytes that resulted in new storage
    pub bytes_stored: u64,
}

impl OdbMetrics {
    /// Create new metrics with zero values
    pub fn new() -> Self {
        Self::default()
    }

    /// Ratio of cache hits to all pack reads
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Ratio of written bytes saved by deduplication
    pub fn dedup_ratio(&self) -> f64 {
        if self.bytes_written == 0 {
            0.0
        } else {
            (self.bytes_written - self.bytes_stored) as f64 / self.bytes_written as f64
        }
    }

    /// Record a read served by the loose backend
    pub(crate) fn record_loose_read(&mut self) {
        self.loose_reads += 1;
    }

    /// Record a read served by a pack, and whether the cache answered it
    pub(crate) fn record_pack_read(&mut self, cache_hit: bool) {
        self.pack_reads += 1;
        if cache_hit {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
    }

    /// Record a write of `size` payload bytes
    pub(crate) fn record_write(&mut self, size: u64, is_new: bool) {
        self.total_writes += 1;
        self.bytes_written += size;
        if is_new {
            self.unique_objects += 1;
            self.bytes_stored += size;
        }
    }
}
