//! Shared fixtures: build well-formed packs and indices byte by byte
//!
//! These helpers produce the real on-disk formats - pack v2 entry headers,
//! ofs/ref delta encodings, index v1/v2 with fanout and CRCs - so the
//! readers are exercised against files a Git client could have written.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::{Compression, Crc};
use gitodb::{HashAlgorithm, ObjectKind, Oid};
use std::io::Write;
use std::path::{Path, PathBuf};

/// High bit marking an indirect offset in an idx v2 offset word
const LARGE_OFFSET_FLAG: u32 = 1 << 31;

pub fn pack_type_code(kind: ObjectKind) -> u8 {
    match kind {
        ObjectKind::Commit => 1,
        ObjectKind::Tree => 2,
        ObjectKind::Blob => 3,
        ObjectKind::Tag => 4,
    }
}

/// Variable-length `(type, size)` entry header: 3 type bits, 4 size bits,
/// then 7 size bits per continuation byte, least-significant first.
pub fn entry_header(type_code: u8, mut size: u64) -> Vec<u8> {
    let mut out = Vec::new();
    let mut byte = (type_code << 4) | (size & 0x0f) as u8;
    size >>= 4;
    while size > 0 {
        out.push(byte | 0x80);
        byte = (size & 0x7f) as u8;
        size >>= 7;
    }
    out.push(byte);
    out
}

/// Ofs-delta distance: big-endian 7-bit groups with a +1 carry.
pub fn ofs_encoding(mut distance: u64) -> Vec<u8> {
    let mut bytes = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance > 0 {
        distance -= 1;
        bytes.push(0x80 | (distance & 0x7f) as u8);
        distance >>= 7;
    }
    bytes.reverse();
    bytes
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(6));
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Delta-stream size varint: 7 bits per byte, least-significant first.
pub fn delta_varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return out;
        }
    }
}

pub fn delta_insert(out: &mut Vec<u8>, data: &[u8]) {
    for chunk in data.chunks(127) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
}

pub fn delta_copy(out: &mut Vec<u8>, offset: u64, size: u64) {
    assert!(size > 0 && size <= 0xffffff);
    let mut opcode = 0x80u8;
    let mut operands = Vec::new();
    for i in 0..4 {
        let byte = (offset >> (8 * i)) & 0xff;
        if byte != 0 {
            opcode |= 1 << i;
            operands.push(byte as u8);
        }
    }
    for i in 0..3 {
        let byte = (size >> (8 * i)) & 0xff;
        if byte != 0 {
            opcode |= 1 << (4 + i);
            operands.push(byte as u8);
        }
    }
    out.push(opcode);
    out.extend_from_slice(&operands);
}

/// A delta stream reconstructing `target` from `base`: copy the shared
/// prefix, insert the rest.
pub fn simple_delta(base: &[u8], target: &[u8]) -> Vec<u8> {
    let mut stream = delta_varint(base.len() as u64);
    stream.extend(delta_varint(target.len() as u64));

    let shared = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if shared > 0 {
        delta_copy(&mut stream, 0, shared as u64);
    }
    if shared < target.len() {
        delta_insert(&mut stream, &target[shared..]);
    }
    stream
}

enum Entry {
    Base {
        oid: Oid,
        kind: ObjectKind,
        payload: Vec<u8>,
    },
    OfsDelta {
        oid: Oid,
        base_index: usize,
        delta: Vec<u8>,
    },
    RefDelta {
        oid: Oid,
        base: Oid,
        delta: Vec<u8>,
    },
}

/// Builds a pack and a paired index, tracking each entry's reconstructed
/// object so tests can assert on the exact bytes the reader must produce.
pub struct PackBuilder {
    algo: HashAlgorithm,
    entries: Vec<Entry>,
}

impl PackBuilder {
    pub fn new(algo: HashAlgorithm) -> Self {
        PackBuilder {
            algo,
            entries: Vec::new(),
        }
    }

    /// Add a non-delta entry; returns its position and identifier.
    pub fn add_base(&mut self, kind: ObjectKind, payload: &[u8]) -> (usize, Oid) {
        let oid = Oid::for_object(self.algo, kind, payload);
        self.entries.push(Entry::Base {
            oid,
            kind,
            payload: payload.to_vec(),
        });
        (self.entries.len() - 1, oid)
    }

    /// Add an ofs-delta against an earlier entry; returns position and id.
    pub fn add_ofs_delta(
        &mut self,
        base_index: usize,
        kind: ObjectKind,
        base_payload: &[u8],
        payload: &[u8],
    ) -> (usize, Oid) {
        assert!(base_index < self.entries.len());
        let oid = Oid::for_object(self.algo, kind, payload);
        self.entries.push(Entry::OfsDelta {
            oid,
            base_index,
            delta: simple_delta(base_payload, payload),
        });
        (self.entries.len() - 1, oid)
    }

    /// Add a ref-delta whose base may live anywhere; returns position and id.
    pub fn add_ref_delta(
        &mut self,
        base: Oid,
        kind: ObjectKind,
        base_payload: &[u8],
        payload: &[u8],
    ) -> (usize, Oid) {
        let oid = Oid::for_object(self.algo, kind, payload);
        self.entries.push(Entry::RefDelta {
            oid,
            base,
            delta: simple_delta(base_payload, payload),
        });
        (self.entries.len() - 1, oid)
    }

    /// Add a ref-delta with a hand-picked identifier and raw delta stream,
    /// for unresolvable-chain scenarios.
    pub fn add_raw_ref_delta(&mut self, oid: Oid, base: Oid, delta: Vec<u8>) -> usize {
        self.entries.push(Entry::RefDelta { oid, base, delta });
        self.entries.len() - 1
    }

    fn entry_oid(&self, index: usize) -> Oid {
        match &self.entries[index] {
            Entry::Base { oid, .. }
            | Entry::OfsDelta { oid, .. }
            | Entry::RefDelta { oid, .. } => *oid,
        }
    }

    /// Serialize the pack; returns the bytes and each entry's
    /// `(oid, offset)` in insertion order.
    pub fn build_pack(&self) -> (Vec<u8>, Vec<(Oid, u64)>) {
        let mut pack = Vec::new();
        pack.extend_from_slice(b"PACK");
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());

        let mut offsets = Vec::new();
        let mut positions = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            let offset = pack.len() as u64;
            positions.push(offset);
            offsets.push((self.entry_oid(index), offset));

            match entry {
                Entry::Base { kind, payload, .. } => {
                    pack.extend(entry_header(pack_type_code(*kind), payload.len() as u64));
                    pack.extend(zlib(payload));
                }
                Entry::OfsDelta {
                    base_index, delta, ..
                } => {
                    pack.extend(entry_header(6, delta.len() as u64));
                    pack.extend(ofs_encoding(offset - positions[*base_index]));
                    pack.extend(zlib(delta));
                }
                Entry::RefDelta { base, delta, .. } => {
                    pack.extend(entry_header(7, delta.len() as u64));
                    pack.extend_from_slice(base.as_bytes());
                    pack.extend(zlib(delta));
                }
            }
        }

        let mut hasher = self.algo.hasher();
        hasher.update(&pack);
        let trailer = hasher.finalize();
        pack.extend_from_slice(trailer.as_bytes());

        (pack, offsets)
    }

    /// Build the v2 index for previously built pack bytes.
    pub fn build_index_v2(&self, pack: &[u8], offsets: &[(Oid, u64)]) -> Vec<u8> {
        let width = self.algo.width();
        let boundary = pack.len() - width;

        let mut sorted: Vec<(Oid, u64)> = offsets.to_vec();
        sorted.sort();

        let mut out = Vec::new();
        out.extend_from_slice(&[0xff, b't', b'O', b'c']);
        out.extend_from_slice(&2u32.to_be_bytes());

        let mut fanout = [0u32; 256];
        for (oid, _) in &sorted {
            fanout[oid.first_byte() as usize] += 1;
        }
        for i in 1..256 {
            fanout[i] += fanout[i - 1];
        }
        for bucket in fanout {
            out.extend_from_slice(&bucket.to_be_bytes());
        }

        for (oid, _) in &sorted {
            out.extend_from_slice(oid.as_bytes());
        }

        // CRC-32 over each entry's raw pack bytes, up to the next entry.
        let mut extents: Vec<u64> = offsets.iter().map(|(_, off)| *off).collect();
        extents.sort_unstable();
        for (_, offset) in &sorted {
            let position = extents.binary_search(offset).unwrap();
            let end = extents
                .get(position + 1)
                .copied()
                .unwrap_or(boundary as u64);
            let mut crc = Crc::new();
            crc.update(&pack[*offset as usize..end as usize]);
            out.extend_from_slice(&crc.sum().to_be_bytes());
        }

        let mut large = Vec::new();
        for (_, offset) in &sorted {
            if *offset < u64::from(LARGE_OFFSET_FLAG) {
                out.extend_from_slice(&(*offset as u32).to_be_bytes());
            } else {
                let slot = large.len() as u32;
                out.extend_from_slice(&(slot | LARGE_OFFSET_FLAG).to_be_bytes());
                large.push(*offset);
            }
        }
        for offset in large {
            out.extend_from_slice(&offset.to_be_bytes());
        }

        out.extend_from_slice(&pack[boundary..]);
        let mut hasher = self.algo.hasher();
        hasher.update(&out);
        let trailer = hasher.finalize();
        out.extend_from_slice(trailer.as_bytes());
        out
    }

    /// Build the legacy v1 index for previously built pack bytes.
    pub fn build_index_v1(&self, pack: &[u8], offsets: &[(Oid, u64)]) -> Vec<u8> {
        let width = self.algo.width();
        let boundary = pack.len() - width;

        let mut sorted: Vec<(Oid, u64)> = offsets.to_vec();
        sorted.sort();

        let mut out = Vec::new();
        let mut fanout = [0u32; 256];
        for (oid, _) in &sorted {
            fanout[oid.first_byte() as usize] += 1;
        }
        for i in 1..256 {
            fanout[i] += fanout[i - 1];
        }
        for bucket in fanout {
            out.extend_from_slice(&bucket.to_be_bytes());
        }
        for (oid, offset) in &sorted {
            out.extend_from_slice(&(*offset as u32).to_be_bytes());
            out.extend_from_slice(oid.as_bytes());
        }

        out.extend_from_slice(&pack[boundary..]);
        let mut hasher = self.algo.hasher();
        hasher.update(&out);
        let trailer = hasher.finalize();
        out.extend_from_slice(trailer.as_bytes());
        out
    }

    /// Write `pack-<trailer>.pack` and `.idx` under `objects/pack/`.
    pub fn write_into(&self, objects_dir: &Path, v1_index: bool) -> (PathBuf, Vec<(Oid, u64)>) {
        let (pack, offsets) = self.build_pack();
        let index = if v1_index {
            self.build_index_v1(&pack, &offsets)
        } else {
            self.build_index_v2(&pack, &offsets)
        };

        let width = self.algo.width();
        let name = hex::encode(&pack[pack.len() - width..]);
        let pack_dir = objects_dir.join("pack");
        std::fs::create_dir_all(&pack_dir).unwrap();

        let pack_path = pack_dir.join(format!("pack-{}.pack", name));
        std::fs::write(&pack_path, &pack).unwrap();
        std::fs::write(pack_dir.join(format!("pack-{}.idx", name)), &index).unwrap();
        (pack_path, offsets)
    }
}
