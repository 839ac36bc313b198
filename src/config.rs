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

//! Tunables for the object database

use serde::{Deserialize, Serialize};

/// Options controlling database resource use
///
/// # Examples
///
/// ```
/// use gitodb::OdbOptions;
///
/// let options = OdbOptions::default();
/// assert_eq!(options.max_delta_depth, 50);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdbOptions {
    /// Byte budget for the reconstructed-object cache; zero disables it
    #[serde(default = "default_cache_bytes")]
    pub cache_bytes: u64,

    /// Maximum delta layers tolerated while resolving one object
    ///
    /// Ofs-delta chains cannot cycle, but ref-deltas can in principle form
    /// one across packs; the budget turns that into an unresolved-delta
    /// error instead of a hang.
    #[serde(default = "default_max_delta_depth")]
    pub max_delta_depth: usize,
}

impl Default for OdbOptions {
    fn default() -> Self {
        Self {
            cache_bytes: default_cache_bytes(),
            max_delta_depth: default_max_delta_depth(),
        }
    }
}

impl OdbOptions {
    /// Options with caching disabled
    ///
    /// Useful for audits where every read should hit the pack bytes.
    pub fn uncached() -> Self {
        Self {
            cache_bytes: 0,
            ..Self::default()
        }
    }
}

fn default_cache_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_max_delta_depth() -> usize {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = OdbOptions::default();
        assert_eq!(options.cache_bytes, 64 * 1024 * 1024);
        assert_eq!(options.max_delta_depth, 50);
    }

    #[test]
    fn test_uncached() {
        let options = OdbOptions::uncached();
        assert_eq!(options.cache_bytes, 0);
        assert_eq!(options.max_delta_depth, 50);
    }
}
