// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocation statistics for the context arena.

/// Cumulative statistics about context arena usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ArenaStats {
    /// Number of successful allocations.
    pub allocations: u64,
    /// Bytes committed by successful allocations.
    pub committed_bytes: usize,
    /// Number of allocation requests refused for lack of budget.
    pub refused: u64,
    /// Size of the largest single block handed out.
    pub largest_block: usize,
}

impl ArenaStats {
    pub(crate) fn record_allocation(&mut self, size: usize) {
        self.allocations += 1;
        self.committed_bytes += size;
        self.largest_block = self.largest_block.max(size);
    }

    pub(crate) fn record_refusal(&mut self) {
        self.refused += 1;
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Context arena: {} blocks, {} bytes committed, largest block {} bytes, {} refused",
            self.allocations, self.committed_bytes, self.largest_block, self.refused,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let s = ArenaStats::default();
        assert_eq!(s.allocations, 0);
        assert_eq!(s.committed_bytes, 0);
    }

    #[test]
    fn test_record() {
        let mut s = ArenaStats::default();
        s.record_allocation(64);
        s.record_allocation(16);
        s.record_refusal();
        assert_eq!(s.allocations, 2);
        assert_eq!(s.committed_bytes, 80);
        assert_eq!(s.largest_block, 64);
        assert_eq!(s.refused, 1);
    }

    #[test]
    fn test_summary() {
        let mut s = ArenaStats::default();
        s.record_allocation(48);
        let summary = s.summary();
        assert!(summary.contains("1 blocks"));
        assert!(summary.contains("48 bytes committed"));
    }
}
