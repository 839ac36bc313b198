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

//! Delta application: reconstruct an object from a base and a delta stream
//!
//! A delta stream is `source-size` and `target-size` varints followed by
//! instructions. An opcode with the high bit set is a COPY: the remaining
//! seven bits are a presence mask selecting which of four offset bytes and
//! three length bytes follow, little-endian, with a zero length meaning
//! 0x10000. An opcode with the high bit clear and a non-zero value is an
//! INSERT of that many literal bytes. Opcode 0 is reserved and invalid.
//! Only decoding is implemented; generating deltas is a packer's job.

use crate::error::{OdbError, OdbResult};

/// COPY instruction marker bit
const COPY_FLAG: u8 = 0x80;
/// Number of potential offset bytes in a COPY instruction
const COPY_OFFSET_BYTES: u8 = 4;
/// Number of potential length bytes in a COPY instruction
const COPY_SIZE_BYTES: u8 = 3;
/// A COPY length of zero means this many bytes
const COPY_ZERO_SIZE: u64 = 0x10000;

/// Apply one delta stream to one base buffer
///
/// # Errors
///
/// - `SizeMismatch` when the source size does not match the base length, or
///   the output does not reach the target size
/// - `Corrupt` for a reserved opcode, a truncated stream, or a copy range
///   outside the base
pub(crate) fn apply(base: &[u8], delta: &[u8]) -> OdbResult<Vec<u8>> {
    let mut pos = 0usize;

    let source_size = read_varint(delta, &mut pos)?;
    if source_size != base.len() as u64 {
        return Err(OdbError::SizeMismatch {
            expected: source_size,
            actual: base.len() as u64,
        });
    }

    let target_size = read_varint(delta, &mut pos)?;
    let mut result = Vec::with_capacity(target_size.min(64 * 1024 * 1024) as usize);

    while pos < delta.len() {
        let opcode = delta[pos];
        pos += 1;

        if opcode & COPY_FLAG != 0 {
            let mut mask = opcode;
            let offset = read_partial_int(delta, &mut pos, COPY_OFFSET_BYTES, &mut mask)?;
            let mut size = read_partial_int(delta, &mut pos, COPY_SIZE_BYTES, &mut mask)?;
            if size == 0 {
                size = COPY_ZERO_SIZE;
            }

            let start = usize::try_from(offset)
                .map_err(|_| OdbError::corrupt("delta copy offset overflows"))?;
            let end = start
                .checked_add(size as usize)
                .filter(|&e| e <= base.len())
                .ok_or_else(|| OdbError::corrupt("delta copy range outside base"))?;
            result.extend_from_slice(&base[start..end]);
        } else if opcode != 0 {
            let count = opcode as usize;
            let end = pos
                .checked_add(count)
                .filter(|&e| e <= delta.len())
                .ok_or_else(|| OdbError::corrupt("delta insert runs past stream end"))?;
            result.extend_from_slice(&delta[pos..end]);
            pos = end;
        } else {
            return Err(OdbError::corrupt("delta instruction opcode 0 is reserved"));
        }
    }

    if result.len() as u64 != target_size {
        return Err(OdbError::SizeMismatch {
            expected: target_size,
            actual: result.len() as u64,
        });
    }
    Ok(result)
}

/// Read the size varint used by delta streams: 7 bits per byte,
/// least-significant group first, high bit marks continuation
pub(crate) fn read_varint(data: &[u8], pos: &mut usize) -> OdbResult<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *data
            .get(*pos)
            .ok_or_else(|| OdbError::corrupt("varint truncated"))?;
        *pos += 1;

        if shift >= 64 {
            return Err(OdbError::corrupt("varint too large"));
        }
        value |= u64::from(byte & 0x7f) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
}

/// Read the mask-selected little-endian bytes of a COPY operand
fn read_partial_int(
    data: &[u8],
    pos: &mut usize,
    bytes: u8,
    mask: &mut u8,
) -> OdbResult<u64> {
    let mut value: u64 = 0;
    for index in 0..bytes {
        if *mask & 1 != 0 {
            let byte = *data
                .get(*pos)
                .ok_or_else(|| OdbError::corrupt("delta copy operand truncated"))?;
            *pos += 1;
            value |= u64::from(byte) << (index * 8);
        }
        *mask >>= 1;
    }
    Ok(value)
}
