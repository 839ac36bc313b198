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

//! Pack index reader for the v1 and v2 on-disk formats
//!
//! Both versions start from a 256-entry cumulative fanout keyed by the
//! identifier's first byte. v1 stores `{4-byte offset, raw-id}` entries;
//! v2 (magic `\xfftOc`) stores sorted identifiers, per-entry CRC-32s, and
//! 4-byte offsets whose high bit indirects into an 8-byte table for large
//! packs. The file ends with the owning pack's checksum and the index's own
//! trailing checksum.

use crate::error::{OdbError, OdbResult};
use crate::hash::HashAlgorithm;
use crate::oid::Oid;
use memmap2::Mmap;
use std::cmp::Ordering;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic bytes opening a v2 index
const V2_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];
/// Fanout table size in bytes
const FANOUT_BYTES: usize = 256 * 4;
/// High bit marking an indirect offset in v2
const LARGE_OFFSET_FLAG: u32 = 1 << 31;

/// On-disk index version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexVersion {
    /// Legacy format without magic, CRCs, or large offsets
    V1,
    /// Current format with CRCs and 8-byte offset spillover
    V2,
}

/// Memory-mapped pack index
///
/// The file is read once on open, validated (fanout monotonicity, exact
/// length, indirect offset bounds), and then serves lookups by binary search
/// within the fanout bucket of the identifier's first byte.
pub struct PackIndex {
    path: PathBuf,
    map: Mmap,
    algo: HashAlgorithm,
    version: IndexVersion,
    fanout: [u32; 256],
    count: usize,
    /// v2 only: number of 8-byte entries in the large offset table
    large_count: usize,
}

impl PackIndex {
    /// Open and validate an index file
    ///
    /// # Errors
    ///
    /// `Corrupt` for a bad magic/version, a non-monotone fanout, a length
    /// that does not match the entry count, or an indirect offset pointing
    /// outside the large table
    pub fn open(path: &Path, algo: HashAlgorithm) -> OdbResult<Self> {
        let file = File::open(path)?;
        let map = unsafe { Mmap::map(&file)? };
        let width = algo.width();

        let version = if map.len() >= 8 && map[0..4] == V2_MAGIC {
            let v = be32(&map, 4);
            if v != 2 {
                return Err(OdbError::corrupt(format!(
                    "unsupported pack index version {} in {}",
                    v,
                    path.display()
                )));
            }
            IndexVersion::V2
        } else {
            IndexVersion::V1
        };

        let fanout_start = match version {
            IndexVersion::V1 => 0,
            IndexVersion::V2 => 8,
        };
        if map.len() < fanout_start + FANOUT_BYTES + 2 * width {
            return Err(OdbError::corrupt(format!(
                "pack index too short: {}",
                path.display()
            )));
        }

        let mut fanout = [0u32; 256];
        for (i, slot) in fanout.iter_mut().enumerate() {
            *slot = be32(&map, fanout_start + i * 4);
        }
        if fanout.windows(2).any(|w| w[0] > w[1]) {
            return Err(OdbError::corrupt(format!(
                "pack index fanout is not monotone: {}",
                path.display()
            )));
        }
        let count = fanout[255] as usize;

        let large_count = match version {
            IndexVersion::V1 => {
                let expected = FANOUT_BYTES + count * (4 + width) + 2 * width;
                if map.len() != expected {
                    return Err(OdbError::corrupt(format!(
                        "pack index length {} does not match {} entries: {}",
                        map.len(),
                        count,
                        path.display()
                    )));
                }
                0
            }
            IndexVersion::V2 => {
                let fixed = 8 + FANOUT_BYTES + count * (width + 8);
                let trailer_start = map.len() - 2 * width;
                if trailer_start < fixed || (trailer_start - fixed) % 8 != 0 {
                    return Err(OdbError::corrupt(format!(
                        "pack index length {} does not match {} entries: {}",
                        map.len(),
                        count,
                        path.display()
                    )));
                }
                (trailer_start - fixed) / 8
            }
        };

        let index = PackIndex {
            path: path.to_path_buf(),
            map,
            algo,
            version,
            fanout,
            count,
            large_count,
        };

        // Every indirect offset must land inside the large table.
        if version == IndexVersion::V2 {
            for i in 0..count {
                let raw = be32(&index.map, index.offsets_start() + i * 4);
                if raw & LARGE_OFFSET_FLAG != 0 {
                    let slot = (raw & !LARGE_OFFSET_FLAG) as usize;
                    if slot >= index.large_count {
                        return Err(OdbError::corrupt(format!(
                            "pack index large offset {} out of range: {}",
                            slot,
                            path.display()
                        )));
                    }
                }
            }
        }

        debug!(
            path = %path.display(),
            version = ?index.version,
            entries = count,
            "opened pack index"
        );
        Ok(index)
    }

    /// The on-disk format version
    pub fn version(&self) -> IndexVersion {
        self.version
    }

    /// Number of objects in the index (and the owning pack)
    pub fn count(&self) -> usize {
        self.count
    }

    /// The index file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn oids_start(&self) -> usize {
        8 + FANOUT_BYTES
    }

    fn crcs_start(&self) -> usize {
        self.oids_start() + self.count * self.algo.width()
    }

    fn offsets_start(&self) -> usize {
        self.crcs_start() + self.count * 4
    }

    fn large_start(&self) -> usize {
        self.offsets_start() + self.count * 4
    }

    fn oid_bytes_at(&self, index: usize) -> &[u8] {
        let width = self.algo.width();
        let start = match self.version {
            IndexVersion::V1 => FANOUT_BYTES + index * (4 + width) + 4,
            IndexVersion::V2 => self.oids_start() + index * width,
        };
        &self.map[start..start + width]
    }

    /// Identifier of the entry at the given position
    pub fn oid_at(&self, index: usize) -> Oid {
        Oid::from_bytes(self.algo, self.oid_bytes_at(index))
            .expect("index slice has identifier width")
    }

    /// Pack offset of the entry at the given position
    pub fn offset_at(&self, index: usize) -> u64 {
        match self.version {
            IndexVersion::V1 => {
                let width = self.algo.width();
                u64::from(be32(&self.map, FANOUT_BYTES + index * (4 + width)))
            }
            IndexVersion::V2 => {
                let raw = be32(&self.map, self.offsets_start() + index * 4);
                if raw & LARGE_OFFSET_FLAG != 0 {
                    // Bounds were validated on open.
                    let slot = (raw & !LARGE_OFFSET_FLAG) as usize;
                    be64(&self.map, self.large_start() + slot * 8)
                } else {
                    u64::from(raw)
                }
            }
        }
    }

    /// CRC-32 over the entry's pack bytes; absent in v1 indices
    pub fn crc32_at(&self, index: usize) -> Option<u32> {
        match self.version {
            IndexVersion::V1 => None,
            IndexVersion::V2 => Some(be32(&self.map, self.crcs_start() + index * 4)),
        }
    }

    /// Position of the identifier, if present
    pub fn find(&self, oid: &Oid) -> Option<usize> {
        let first = oid.first_byte() as usize;
        let mut lo = if first == 0 {
            0
        } else {
            self.fanout[first - 1] as usize
        };
        let mut hi = self.fanout[first] as usize;
        let target = oid.as_bytes();

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.oid_bytes_at(mid).cmp(target) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Some(mid),
            }
        }
        None
    }

    /// Pack offset for the identifier, if present
    pub fn lookup(&self, oid: &Oid) -> Option<u64> {
        self.find(oid).map(|i| self.offset_at(i))
    }

    /// Iterate `(identifier, pack offset)` pairs in identifier order
    pub fn iter(&self) -> impl Iterator<Item = (Oid, u64)> + '_ {
        (0..self.count).map(|i| (self.oid_at(i), self.offset_at(i)))
    }

    /// Checksum of the owning pack, as recorded in the index
    pub fn pack_checksum(&self) -> Oid {
        let width = self.algo.width();
        let start = self.map.len() - 2 * width;
        Oid::from_bytes(self.algo, &self.map[start..start + width])
            .expect("trailer slice has identifier width")
    }

    /// Recompute the trailing checksum over all prior bytes and compare
    ///
    /// # Errors
    ///
    /// `ChecksumMismatch` when the recorded digest does not match
    pub fn verify(&self) -> OdbResult<()> {
        let width = self.algo.width();
        let boundary = self.map.len() - width;
        let mut hasher = self.algo.hasher();
        hasher.update(&self.map[..boundary]);
        let actual = hasher.finalize();

        let recorded = Oid::from_bytes(self.algo, &self.map[boundary..])
            .expect("trailer slice has identifier width");
        if actual != recorded {
            return Err(OdbError::checksum(format!(
                "pack index trailer digest mismatch: {}",
                self.path.display()
            )));
        }
        Ok(())
    }
}

fn be32(data: &[u8], start: usize) -> u32 {
    u32::from_be_bytes(data[start..start + 4].try_into().expect("4-byte slice"))
}

fn be64(data: &[u8], start: usize) -> u64 {
    u64::from_be_bytes(data[start..start + 8].try_into().expect("8-byte slice"))
}
