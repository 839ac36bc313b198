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

//! Pack data reader: entry decoding and delta chain reconstruction
//!
//! A pack is `PACK`, a version (2 or 3), an entry count, the entries, and a
//! trailing checksum of all prior bytes. Each entry opens with a
//! variable-length `(type, uncompressed-size)` header: three type bits in
//! bits 6-4 of the first byte, the low four size bits, and seven more size
//! bits per continuation byte, least-significant first. Delta entries
//! prepend either a negative in-pack offset (big-endian groups with a +1
//! carry) or the base's raw identifier; the body is always a zlib stream.
//!
//! Chains are resolved iteratively: layer positions are collected walking
//! to the base, then deltas apply base-first. Ofs-delta bases sit at
//! strictly smaller offsets, so cycles are impossible within one pack;
//! ref-delta chains are bounded by a depth budget instead.

use crate::cache::DeltaBaseCache;
use crate::delta;
use crate::error::{OdbError, OdbResult};
use crate::hash::HashAlgorithm;
use crate::object::ObjectKind;
use crate::oid::Oid;
use crate::pack_index::PackIndex;
use flate2::read::ZlibDecoder;
use flate2::Crc;
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Pack file signature
const PACK_SIGNATURE: &[u8; 4] = b"PACK";
/// Pack header length: signature, version, entry count
const PACK_HEADER_LEN: usize = 12;

/// Entry header: what sits at one pack offset
#[derive(Debug)]
pub(crate) enum EntryHeader {
    /// A non-delta object stored as a zlib stream of `size` payload bytes
    Base {
        /// Effective object kind
        kind: ObjectKind,
        /// Uncompressed payload size
        size: u64,
        /// Byte position of the zlib stream
        data_start: usize,
    },
    /// Delta whose base lives earlier in the same pack
    OfsDelta {
        /// Absolute offset of the base entry, strictly smaller
        base_offset: u64,
        /// Uncompressed delta stream size
        size: u64,
        /// Byte position of the zlib stream
        data_start: usize,
    },
    /// Delta whose base is named by identifier, possibly in another pack
    RefDelta {
        /// Identifier of the base object
        base: Oid,
        /// Uncompressed delta stream size
        size: u64,
        /// Byte position of the zlib stream
        data_start: usize,
    },
}

/// Resolver for ref-delta bases that are not in this pack's own index
///
/// The second argument is the remaining delta depth budget.
pub(crate) type RefBaseResolver<'a> =
    &'a dyn Fn(&Oid, usize) -> OdbResult<(ObjectKind, Vec<u8>)>;

/// One pack data file paired with its index
pub(crate) struct Pack {
    path: PathBuf,
    data: Mmap,
    index: PackIndex,
    algo: HashAlgorithm,
    /// Cache key derived from the trailing checksum
    key: u64,
}

impl Pack {
    /// Open a pack, validating the header against its index
    ///
    /// # Errors
    ///
    /// `Corrupt` for a bad signature/version or an entry count that
    /// disagrees with the index; `ChecksumMismatch` when the trailer does
    /// not match the checksum recorded in the index
    pub(crate) fn open(
        pack_path: &Path,
        index_path: &Path,
        algo: HashAlgorithm,
    ) -> OdbResult<Self> {
        let index = PackIndex::open(index_path, algo)?;
        let file = File::open(pack_path)?;
        let data = unsafe { Mmap::map(&file)? };
        let width = algo.width();

        if data.len() < PACK_HEADER_LEN + width {
            return Err(OdbError::corrupt(format!(
                "pack too short: {}",
                pack_path.display()
            )));
        }
        if &data[0..4] != PACK_SIGNATURE {
            return Err(OdbError::corrupt(format!(
                "bad pack signature: {}",
                pack_path.display()
            )));
        }
        let version = u32::from_be_bytes(data[4..8].try_into().expect("4-byte slice"));
        if version != 2 && version != 3 {
            return Err(OdbError::corrupt(format!(
                "unsupported pack version {}: {}",
                version,
                pack_path.display()
            )));
        }
        let count = u32::from_be_bytes(data[8..12].try_into().expect("4-byte slice"));
        if count as usize != index.count() {
            return Err(OdbError::corrupt(format!(
                "pack declares {} entries but index has {}: {}",
                count,
                index.count(),
                pack_path.display()
            )));
        }

        let trailer_start = data.len() - width;
        let trailer = Oid::from_bytes(algo, &data[trailer_start..])
            .expect("trailer slice has identifier width");
        if trailer != index.pack_checksum() {
            return Err(OdbError::checksum(format!(
                "pack checksum does not match its index: {}",
                pack_path.display()
            )));
        }

        let mut key_bytes = [0u8; 8];
        key_bytes.copy_from_slice(&trailer.as_bytes()[..8]);

        debug!(path = %pack_path.display(), entries = count, version, "opened pack");
        Ok(Pack {
            path: pack_path.to_path_buf(),
            data,
            index,
            algo,
            key: u64::from_be_bytes(key_bytes),
        })
    }

    /// The paired index
    pub(crate) fn index(&self) -> &PackIndex {
        &self.index
    }

    /// The pack file path
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Cache key shared by all entries of this pack
    pub(crate) fn cache_key(&self) -> u64 {
        self.key
    }

    fn byte_at(&self, pos: usize) -> OdbResult<u8> {
        let boundary = self.data.len() - self.algo.width();
        if pos >= boundary {
            return Err(OdbError::corrupt(format!(
                "pack entry runs into trailer: {}",
                self.path.display()
            )));
        }
        Ok(self.data[pos])
    }

    /// Decode the entry header at an offset
    pub(crate) fn entry_at(&self, offset: u64) -> OdbResult<EntryHeader> {
        let mut pos = usize::try_from(offset)
            .map_err(|_| OdbError::corrupt("pack offset overflows"))?;
        if pos < PACK_HEADER_LEN {
            return Err(OdbError::corrupt(format!(
                "pack offset {} inside header: {}",
                offset,
                self.path.display()
            )));
        }

        // Type-and-size varint: 3 type bits, 4 size bits, then 7 size bits
        // per continuation byte, least-significant group first.
        let mut byte = self.byte_at(pos)?;
        pos += 1;
        let type_code = (byte >> 4) & 0x7;
        let mut size = u64::from(byte & 0x0f);
        let mut shift = 4u32;
        while byte & 0x80 != 0 {
            byte = self.byte_at(pos)?;
            pos += 1;
            if shift >= 64 {
                return Err(OdbError::corrupt("pack entry size varint too large"));
            }
            size |= u64::from(byte & 0x7f) << shift;
            shift += 7;
        }

        match type_code {
            1 => Ok(EntryHeader::Base {
                kind: ObjectKind::Commit,
                size,
                data_start: pos,
            }),
            2 => Ok(EntryHeader::Base {
                kind: ObjectKind::Tree,
                size,
                data_start: pos,
            }),
            3 => Ok(EntryHeader::Base {
                kind: ObjectKind::Blob,
                size,
                data_start: pos,
            }),
            4 => Ok(EntryHeader::Base {
                kind: ObjectKind::Tag,
                size,
                data_start: pos,
            }),
            6 => {
                // Offset encoding: big-endian 7-bit groups with a +1 carry
                // between bytes, so no value has two encodings.
                let mut byte = self.byte_at(pos)?;
                pos += 1;
                let mut distance = u64::from(byte & 0x7f);
                while byte & 0x80 != 0 {
                    byte = self.byte_at(pos)?;
                    pos += 1;
                    distance = distance
                        .checked_add(1)
                        .and_then(|d| d.checked_mul(128))
                        .ok_or_else(|| OdbError::corrupt("ofs-delta distance overflows"))?
                        | u64::from(byte & 0x7f);
                }

                // Bases sit strictly earlier in the pack.
                let base_offset = offset
                    .checked_sub(distance)
                    .filter(|_| distance > 0)
                    .ok_or_else(|| {
                        OdbError::corrupt(format!(
                            "ofs-delta at {} references offset before pack start",
                            offset
                        ))
                    })?;
                Ok(EntryHeader::OfsDelta {
                    base_offset,
                    size,
                    data_start: pos,
                })
            }
            7 => {
                let width = self.algo.width();
                let boundary = self.data.len() - width;
                if pos + width > boundary {
                    return Err(OdbError::corrupt("ref-delta base identifier truncated"));
                }
                let base = Oid::from_bytes(self.algo, &self.data[pos..pos + width])
                    .expect("slice has identifier width");
                Ok(EntryHeader::RefDelta {
                    base,
                    size,
                    data_start: pos + width,
                })
            }
            other => Err(OdbError::corrupt(format!(
                "invalid pack entry type {} at offset {}",
                other, offset
            ))),
        }
    }

    /// Inflate the zlib stream at `data_start` into exactly `size` bytes
    fn inflate(&self, data_start: usize, size: u64) -> OdbResult<Vec<u8>> {
        let boundary = self.data.len() - self.algo.width();
        if data_start > boundary {
            return Err(OdbError::corrupt("pack entry data outside pack"));
        }
        let mut decoder = ZlibDecoder::new(&self.data[data_start..boundary]);
        let mut payload = Vec::with_capacity(size.min(64 * 1024 * 1024) as usize);
        decoder
            .read_to_end(&mut payload)
            .map_err(|e| OdbError::corrupt(format!("bad zlib stream in pack: {}", e)))?;
        if payload.len() as u64 != size {
            return Err(OdbError::SizeMismatch {
                expected: size,
                actual: payload.len() as u64,
            });
        }
        Ok(payload)
    }

    /// Reconstruct the object stored at an offset
    ///
    /// Walks the delta chain iteratively, consulting the cache at every hop,
    /// then applies the collected layers base-first. `budget` bounds the
    /// total number of delta layers, counting those the ref-base resolver
    /// itself may traverse.
    pub(crate) fn resolve_at(
        &self,
        offset: u64,
        budget: usize,
        cache: &DeltaBaseCache,
        resolve_ref: RefBaseResolver<'_>,
    ) -> OdbResult<(ObjectKind, Vec<u8>)> {
        // Layers from outermost to innermost: (entry offset, stream, size).
        let mut layers: Vec<(u64, usize, u64)> = Vec::new();
        let mut cursor = offset;

        let (kind, mut payload) = loop {
            if !layers.is_empty() {
                if let Some(hit) = cache.get(self.key, cursor) {
                    break (hit.0, hit.1.clone());
                }
            }

            match self.entry_at(cursor)? {
                EntryHeader::Base {
                    kind,
                    size,
                    data_start,
                } => break (kind, self.inflate(data_start, size)?),
                EntryHeader::OfsDelta {
                    base_offset,
                    size,
                    data_start,
                } => {
                    if layers.len() >= budget {
                        return Err(OdbError::unresolved_delta(format!(
                            "delta chain deeper than {} at offset {} in {}",
                            budget,
                            offset,
                            self.path.display()
                        )));
                    }
                    layers.push((cursor, data_start, size));
                    cursor = base_offset;
                }
                EntryHeader::RefDelta {
                    base,
                    size,
                    data_start,
                } => {
                    if layers.len() >= budget {
                        return Err(OdbError::unresolved_delta(format!(
                            "delta chain deeper than {} at offset {} in {}",
                            budget,
                            offset,
                            self.path.display()
                        )));
                    }
                    layers.push((cursor, data_start, size));
                    let remaining = budget - layers.len();
                    let (kind, payload) = resolve_ref(&base, remaining).map_err(|err| {
                        if err.is_not_found() {
                            OdbError::unresolved_delta(format!(
                                "ref-delta base {} not present in any backend",
                                base
                            ))
                        } else {
                            err
                        }
                    })?;
                    break (kind, payload);
                }
            }
        };

        for &(entry_offset, data_start, size) in layers.iter().rev() {
            let delta_stream = self.inflate(data_start, size)?;
            payload = delta::apply(&payload, &delta_stream)?;
            cache.insert(self.key, entry_offset, kind, payload.clone());
        }
        if layers.is_empty() {
            cache.insert(self.key, offset, kind, payload.clone());
        }

        Ok((kind, payload))
    }

    /// Verify the trailing checksum and, for v2 indices, every entry CRC
    ///
    /// The CRC-32 recorded per entry covers the raw pack bytes from the
    /// entry header up to the next entry (or the trailer).
    pub(crate) fn verify(&self) -> OdbResult<()> {
        let width = self.algo.width();
        let boundary = self.data.len() - width;

        let mut hasher = self.algo.hasher();
        hasher.update(&self.data[..boundary]);
        let actual = hasher.finalize();
        let recorded = Oid::from_bytes(self.algo, &self.data[boundary..])
            .expect("trailer slice has identifier width");
        if actual != recorded {
            return Err(OdbError::checksum(format!(
                "pack trailer digest mismatch: {}",
                self.path.display()
            )));
        }

        let mut extents: Vec<(u64, usize)> = (0..self.index.count())
            .map(|i| (self.index.offset_at(i), i))
            .collect();
        extents.sort_unstable();

        for (pos, &(start, entry)) in extents.iter().enumerate() {
            let Some(expected) = self.index.crc32_at(entry) else {
                break;
            };
            let end = extents
                .get(pos + 1)
                .map(|&(next, _)| next)
                .unwrap_or(boundary as u64);
            let (start, end) = (start as usize, end as usize);
            if start >= end || end > boundary {
                return Err(OdbError::corrupt(format!(
                    "pack entry extent {}..{} out of bounds: {}",
                    start,
                    end,
                    self.path.display()
                )));
            }

            let mut crc = Crc::new();
            crc.update(&self.data[start..end]);
            if crc.sum() != expected {
                return Err(OdbError::checksum(format!(
                    "CRC-32 mismatch for entry at offset {} in {}",
                    start,
                    self.path.display()
                )));
            }
        }

        Ok(())
    }
}
