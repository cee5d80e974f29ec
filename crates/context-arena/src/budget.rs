// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Arena budget configuration and parsing.

use crate::ArenaError;
use std::fmt;

const KB: usize = 1024;
const MB: usize = 1024 * 1024;

/// A hard ceiling on the bytes the context arena may commit.
///
/// # Parsing
/// Supports human-readable strings with binary suffixes:
/// - `"64K"` or `"64KB"` → 64 × 1024 bytes
/// - `"1M"` or `"1MB"` → 1024² bytes
/// - `"4096"` or `"4096B"` → raw byte count
///
/// # Examples
/// ```
/// use context_arena::ArenaBudget;
///
/// assert_eq!(ArenaBudget::parse("64K").unwrap().as_bytes(), 64 * 1024);
/// assert_eq!(ArenaBudget::from_kb(2).to_string(), "2 KB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ArenaBudget {
    bytes: usize,
}

impl ArenaBudget {
    /// Creates a budget from a byte count.
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    /// Creates a budget from kilobytes.
    pub fn from_kb(kb: usize) -> Self {
        Self { bytes: kb * KB }
    }

    /// Creates a budget from megabytes.
    pub fn from_mb(mb: usize) -> Self {
        Self { bytes: mb * MB }
    }

    /// Returns the budget in bytes.
    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Parses a human-readable budget string. Case-insensitive.
    pub fn parse(s: &str) -> Result<Self, ArenaError> {
        let s = s.trim();
        let invalid = |detail: &str| ArenaError::InvalidBudget {
            input: s.to_string(),
            detail: detail.to_string(),
        };

        if s.is_empty() {
            return Err(invalid("empty string"));
        }

        let upper = s.to_uppercase();
        let (num_str, multiplier) = if let Some(n) = upper.strip_suffix("MB") {
            (n, MB)
        } else if let Some(n) = upper.strip_suffix('M') {
            (n, MB)
        } else if let Some(n) = upper.strip_suffix("KB") {
            (n, KB)
        } else if let Some(n) = upper.strip_suffix('K') {
            (n, KB)
        } else if let Some(n) = upper.strip_suffix('B') {
            (n, 1)
        } else {
            (upper.as_str(), 1)
        };

        let value: usize = num_str
            .trim()
            .parse()
            .map_err(|_| invalid("expected a number followed by an optional suffix (K, M)"))?;
        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| invalid("overflow"))?;
        if bytes == 0 {
            return Err(invalid("budget must be non-zero"));
        }

        Ok(Self { bytes })
    }
}

impl fmt::Display for ArenaBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes >= MB && self.bytes % MB == 0 {
            write!(f, "{} MB", self.bytes / MB)
        } else if self.bytes >= KB && self.bytes % KB == 0 {
            write!(f, "{} KB", self.bytes / KB)
        } else {
            write!(f, "{} B", self.bytes)
        }
    }
}
