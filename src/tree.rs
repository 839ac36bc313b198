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

//! Tree object: one directory level of named, mode-tagged entries
//!
//! Wire form per entry: `<octal-mode> SP <name> NUL <raw-id>`. Entries are
//! stored in Git's sort order: names compare bytewise, but tree entries
//! compare as though their name had a trailing `/`. Decode preserves the
//! order found on the wire; the encoder sorts canonically before writing.

use crate::error::{OdbError, OdbResult};
use crate::hash::HashAlgorithm;
use crate::oid::Oid;
use std::cmp::Ordering;
use std::io::{BufRead, BufReader, Read, Write};

/// Mode bits marking a tree (directory) entry
const MODE_TREE: u32 = 0o040000;
/// Mask for the entry type bits within a mode
const MODE_TYPE_MASK: u32 = 0o170000;

/// Entry in a tree: mode, name, and target identifier
///
/// # Examples
///
/// ```
/// use gitodb::{HashAlgorithm, Oid, TreeEntry};
///
/// let entry = TreeEntry::new(0o100644, "README.md", Oid::zero(HashAlgorithm::Sha1));
/// assert!(!entry.is_tree());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// File mode, rendered in octal without leading zeros on the wire
    pub mode: u32,
    /// Entry name: non-empty bytes, no NUL, no `/`
    pub name: Vec<u8>,
    /// Identifier of the referenced blob or tree
    pub oid: Oid,
}

impl TreeEntry {
    /// Create a tree entry
    pub fn new(mode: u32, name: impl Into<Vec<u8>>, oid: Oid) -> Self {
        TreeEntry {
            mode,
            name: name.into(),
            oid,
        }
    }

    /// Check if this entry points to a tree (directory)
    pub fn is_tree(&self) -> bool {
        self.mode & MODE_TYPE_MASK == MODE_TREE
    }

    /// Compare two entries in Git's canonical order
    ///
    /// Tree entries compare as though their name carried a trailing `/`.
    pub fn canonical_cmp(&self, other: &TreeEntry) -> Ordering {
        let common = self.name.len().min(other.name.len());
        match self.name[..common].cmp(&other.name[..common]) {
            Ordering::Equal => {}
            ord => return ord,
        }

        let next = |entry: &TreeEntry| -> u8 {
            match entry.name.get(common) {
                Some(&b) => b,
                None if entry.is_tree() => b'/',
                None => 0,
            }
        };
        next(self).cmp(&next(other))
    }
}

/// Tree object holding entries in the order they appear on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    /// Entries exactly as decoded; canonical order is not enforced here
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Create an empty tree
    pub fn new() -> Self {
        Tree {
            entries: Vec::new(),
        }
    }

    /// Check whether the entries are already in canonical order
    pub fn is_sorted(&self) -> bool {
        self.entries
            .windows(2)
            .all(|w| w[0].canonical_cmp(&w[1]) != Ordering::Greater)
    }

    /// Look up an entry by name
    pub fn entry(&self, name: &[u8]) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the tree has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode a tree payload of exactly `declared_size` bytes
    ///
    /// Entries are not reordered; the order found is the order kept.
    ///
    /// # Errors
    ///
    /// `Corrupt` for bad octal (non-digits, leading zeros), an empty name, a
    /// name containing `/`, or input truncated mid-entry
    pub fn decode<R: Read>(
        reader: &mut R,
        declared_size: u64,
        algo: HashAlgorithm,
    ) -> OdbResult<(u64, Self)> {
        let mut consumed = 0u64;
        let mut limited = BufReader::new(reader.by_ref().take(declared_size));
        let mut entries = Vec::new();
        let mut field = Vec::new();

        loop {
            field.clear();
            let n = limited.read_until(b' ', &mut field)?;
            if n == 0 {
                break;
            }
            consumed += n as u64;
            if field.last() != Some(&b' ') {
                return Err(OdbError::corrupt("tree entry truncated in mode"));
            }
            field.pop();
            let mode = parse_octal_mode(&field)?;

            field.clear();
            let n = limited.read_until(b'\0', &mut field)?;
            consumed += n as u64;
            if field.last() != Some(&b'\0') {
                return Err(OdbError::corrupt("tree entry truncated in name"));
            }
            field.pop();
            if field.is_empty() {
                return Err(OdbError::corrupt("tree entry has empty name"));
            }
            if field.contains(&b'/') {
                return Err(OdbError::corrupt(format!(
                    "tree entry name contains '/': {:?}",
                    String::from_utf8_lossy(&field)
                )));
            }
            let name = field.clone();

            let mut raw = vec![0u8; algo.width()];
            limited.read_exact(&mut raw).map_err(|_| {
                OdbError::corrupt("tree entry truncated in identifier".to_string())
            })?;
            consumed += raw.len() as u64;
            let oid = Oid::from_bytes(algo, &raw)?;

            entries.push(TreeEntry { mode, name, oid });
        }

        Ok((consumed, Tree { entries }))
    }

    /// Write the canonical payload, returning the bytes written
    ///
    /// Entries are sorted into canonical order before writing, so encoding a
    /// canonically-decoded tree reproduces its bytes exactly and encoding a
    /// hand-built tree always produces the canonical serialization.
    pub fn encode<W: Write>(&self, writer: &mut W) -> OdbResult<u64> {
        let mut ordered: Vec<&TreeEntry> = self.entries.iter().collect();
        ordered.sort_by(|a, b| a.canonical_cmp(b));

        let mut written = 0u64;
        for entry in ordered {
            let mode = format!("{:o}", entry.mode);
            writer.write_all(mode.as_bytes())?;
            writer.write_all(b" ")?;
            writer.write_all(&entry.name)?;
            writer.write_all(b"\0")?;
            writer.write_all(entry.oid.as_bytes())?;
            written +=
                mode.len() as u64 + 1 + entry.name.len() as u64 + 1 + entry.oid.as_bytes().len() as u64;
        }
        Ok(written)
    }
}

/// Parse an octal mode field: no leading zeros except the literal `0`
fn parse_octal_mode(raw: &[u8]) -> OdbResult<u32> {
    if raw.is_empty() {
        return Err(OdbError::corrupt("tree entry has empty mode"));
    }
    if raw.len() > 1 && raw[0] == b'0' {
        return Err(OdbError::corrupt(format!(
            "tree entry mode has leading zero: {:?}",
            String::from_utf8_lossy(raw)
        )));
    }

    let mut mode: u32 = 0;
    for &b in raw {
        if !(b'0'..=b'7').contains(&b) {
            return Err(OdbError::corrupt(format!(
                "tree entry mode is not octal: {:?}",
                String::from_utf8_lossy(raw)
            )));
        }
        mode = mode
            .checked_mul(8)
            .and_then(|m| m.checked_add((b - b'0') as u32))
            .ok_or_else(|| OdbError::corrupt("tree entry mode overflows"))?;
    }
    Ok(mode)
}
