// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Cache write-back / invalidate contract for the shared region.
//!
//! The shared region is not kept coherent by hardware. The master writes back
//! every span it produced before signalling the ready barrier; each worker
//! invalidates the same spans after the barrier releases it and before its
//! first read. Spans are widened to whole cache lines by the caller with
//! [`RegionSpan::aligned`].

use std::sync::atomic::{fence, Ordering};
use std::sync::Mutex;

/// A contiguous byte range of the shared region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionSpan {
    pub addr: usize,
    pub len: usize,
}

impl RegionSpan {
    /// Creates a span from a start address and a length.
    pub fn new(addr: usize, len: usize) -> Self {
        Self { addr, len }
    }

    /// The span occupied by `value`.
    pub fn of<T: ?Sized>(value: &T) -> Self {
        Self {
            addr: value as *const T as *const u8 as usize,
            len: std::mem::size_of_val(value),
        }
    }

    /// One past the last byte.
    pub fn end(&self) -> usize {
        self.addr + self.len
    }

    /// Widens the span to whole lines of `line_bytes` (a power of two).
    pub fn aligned(&self, line_bytes: usize) -> Self {
        debug_assert!(line_bytes.is_power_of_two());
        if self.len == 0 {
            return *self;
        }
        let mask = line_bytes - 1;
        let start = self.addr & !mask;
        let end = (self.end() + mask) & !mask;
        Self {
            addr: start,
            len: end - start,
        }
    }
}

/// Cache maintenance operations on the shared region.
pub trait CacheMaintenance: Send + Sync + std::fmt::Debug {
    /// Writes dirty lines covering `span` back to memory (master side).
    fn write_back(&self, span: RegionSpan);

    /// Discards cached lines covering `span` (worker side).
    fn invalidate(&self, span: RegionSpan);
}

/// Maintenance for hosts whose caches are coherent.
///
/// Write-back and invalidate reduce to release and acquire fences.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostCoherent;

impl CacheMaintenance for HostCoherent {
    fn write_back(&self, _span: RegionSpan) {
        fence(Ordering::Release);
    }

    fn invalidate(&self, _span: RegionSpan) {
        fence(Ordering::Acquire);
    }
}

/// A recorded maintenance operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOp {
    WriteBack(RegionSpan),
    Invalidate(RegionSpan),
}

/// Maintenance that records every operation, in order.
///
/// Used to verify the write-back / invalidate discipline and by the CLI's
/// simulation trace. Also fences like [`HostCoherent`].
#[derive(Debug, Default)]
pub struct CacheLog {
    ops: Mutex<Vec<CacheOp>>,
}

impl CacheLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded operations.
    pub fn ops(&self) -> Vec<CacheOp> {
        self.ops.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// Returns the spans written back, in order.
    pub fn write_backs(&self) -> Vec<RegionSpan> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                CacheOp::WriteBack(s) => Some(s),
                CacheOp::Invalidate(_) => None,
            })
            .collect()
    }

    /// Returns the spans invalidated, in order.
    pub fn invalidations(&self) -> Vec<RegionSpan> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                CacheOp::Invalidate(s) => Some(s),
                CacheOp::WriteBack(_) => None,
            })
            .collect()
    }

    fn record(&self, op: CacheOp) {
        if let Ok(mut ops) = self.ops.lock() {
            ops.push(op);
        }
    }
}

impl CacheMaintenance for CacheLog {
    fn write_back(&self, span: RegionSpan) {
        self.record(CacheOp::WriteBack(span));
        fence(Ordering::Release);
    }

    fn invalidate(&self, span: RegionSpan) {
        fence(Ordering::Acquire);
        self.record(CacheOp::Invalidate(span));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_of_value() {
        let data = [0u32; 10];
        let span = RegionSpan::of(&data);
        assert_eq!(span.len, 40);
        assert_eq!(span.addr, data.as_ptr() as usize);
        assert_eq!(span.end(), span.addr + 40);
    }

    #[test]
    fn test_span_of_slice() {
        let data = vec![0f32; 7];
        let span = RegionSpan::of(data.as_slice());
        assert_eq!(span.len, 28);
    }

    #[test]
    fn test_aligned() {
        let span = RegionSpan::new(70, 10).aligned(64);
        assert_eq!(span, RegionSpan::new(64, 64));

        let span = RegionSpan::new(60, 10).aligned(64);
        assert_eq!(span, RegionSpan::new(0, 128));

        let span = RegionSpan::new(128, 64).aligned(64);
        assert_eq!(span, RegionSpan::new(128, 64));
    }

    #[test]
    fn test_aligned_empty() {
        let span = RegionSpan::new(70, 0).aligned(64);
        assert_eq!(span.len, 0);
    }

    #[test]
    fn test_cache_log_order() {
        let log = CacheLog::new();
        log.write_back(RegionSpan::new(0, 64));
        log.invalidate(RegionSpan::new(0, 64));
        log.write_back(RegionSpan::new(64, 64));
        assert_eq!(
            log.ops(),
            vec![
                CacheOp::WriteBack(RegionSpan::new(0, 64)),
                CacheOp::Invalidate(RegionSpan::new(0, 64)),
                CacheOp::WriteBack(RegionSpan::new(64, 64)),
            ]
        );
        assert_eq!(log.write_backs().len(), 2);
        assert_eq!(log.invalidations(), vec![RegionSpan::new(0, 64)]);
    }

    #[test]
    fn test_host_coherent_is_object_safe() {
        let ops: Box<dyn CacheMaintenance> = Box::new(HostCoherent);
        ops.write_back(RegionSpan::new(0, 8));
        ops.invalidate(RegionSpan::new(0, 8));
    }
}
