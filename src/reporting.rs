//! Reporting decorator.
//!
//! Wraps any allocator, forwards every operation unchanged, and makes the
//! traffic observable: structured `tracing` events for each mutation and a
//! set of atomic counters cheap enough to leave on in production.

use core::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::block::Block;
use crate::error::AllocResult;
use crate::traits::Allocator;

/// Counters kept by [`ReportingAllocator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSnapshot {
    /// Successful `allocate` calls.
    pub allocations: u64,
    /// Successful `deallocate` calls.
    pub deallocations: u64,
    /// Successful `reallocate` calls.
    pub reallocations: u64,
    /// Failed operations of any kind.
    pub failures: u64,
    /// Total bytes handed out by successful allocations.
    pub bytes_allocated: u64,
    /// Total bytes returned by successful deallocations.
    pub bytes_deallocated: u64,
}

#[derive(Debug, Default)]
struct ReportStats {
    allocations: AtomicU64,
    deallocations: AtomicU64,
    reallocations: AtomicU64,
    failures: AtomicU64,
    bytes_allocated: AtomicU64,
    bytes_deallocated: AtomicU64,
}

/// Transparent wrapper that reports every operation of the inner allocator.
///
/// Thread-safe when the inner allocator is; the counters are atomic.
#[derive(Debug, Default)]
pub struct ReportingAllocator<A> {
    inner: A,
    stats: ReportStats,
}

impl<A> ReportingAllocator<A> {
    /// Wraps an allocator.
    pub fn new(inner: A) -> Self {
        Self { inner, stats: ReportStats::default() }
    }

    /// The wrapped allocator.
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Unwraps, discarding the counters.
    pub fn into_inner(self) -> A {
        self.inner
    }

    /// Current counter values.
    pub fn snapshot(&self) -> ReportSnapshot {
        ReportSnapshot {
            allocations: self.stats.allocations.load(Ordering::Relaxed),
            deallocations: self.stats.deallocations.load(Ordering::Relaxed),
            reallocations: self.stats.reallocations.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
            bytes_allocated: self.stats.bytes_allocated.load(Ordering::Relaxed),
            bytes_deallocated: self.stats.bytes_deallocated.load(Ordering::Relaxed),
        }
    }

    /// Live allocation count implied by the counters.
    pub fn outstanding(&self) -> u64 {
        let snap = self.snapshot();
        snap.allocations.saturating_sub(snap.deallocations)
    }
}

impl<A: Allocator> Allocator for ReportingAllocator<A> {
    fn allocate(&self, size: usize, align: usize) -> AllocResult<Block> {
        match self.inner.allocate(size, align) {
            Ok(block) => {
                self.stats.allocations.fetch_add(1, Ordering::Relaxed);
                self.stats.bytes_allocated.fetch_add(size as u64, Ordering::Relaxed);
                trace!(address = block.addr(), size, align, "allocated block");
                Ok(block)
            }
            Err(err) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                debug!(size, align, error = %err, "allocation failed");
                Err(err)
            }
        }
    }

    fn reallocate(&self, block: Block, new_size: usize, align: usize) -> AllocResult<Block> {
        match self.inner.reallocate(block, new_size, align) {
            Ok(moved) => {
                self.stats.reallocations.fetch_add(1, Ordering::Relaxed);
                trace!(
                    from = block.addr(),
                    old_size = block.size(),
                    to = moved.addr(),
                    new_size,
                    align,
                    "reallocated block"
                );
                Ok(moved)
            }
            Err(err) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                debug!(
                    address = block.addr(),
                    old_size = block.size(),
                    new_size,
                    align,
                    error = %err,
                    "reallocation failed"
                );
                Err(err)
            }
        }
    }

    fn deallocate(&self, block: Block) -> AllocResult<()> {
        match self.inner.deallocate(block) {
            Ok(()) => {
                self.stats.deallocations.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .bytes_deallocated
                    .fetch_add(block.size() as u64, Ordering::Relaxed);
                trace!(address = block.addr(), size = block.size(), "deallocated block");
                Ok(())
            }
            Err(err) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                debug!(
                    address = block.addr(),
                    size = block.size(),
                    error = %err,
                    "deallocation failed"
                );
                Err(err)
            }
        }
    }

    fn deallocate_all(&self) {
        self.inner.deallocate_all();
        debug!("deallocated all blocks");
    }

    fn max_size(&self) -> usize {
        self.inner.max_size()
    }

    fn owns(&self, block: Block) -> bool {
        self.inner.owns(block)
    }
}

/// Extension for wrapping any allocator in a reporter.
pub trait Report: Sized {
    /// Wraps `self` in a [`ReportingAllocator`].
    fn with_reporting(self) -> ReportingAllocator<Self>;
}

impl<A: Allocator> Report for A {
    fn with_reporting(self) -> ReportingAllocator<Self> {
        ReportingAllocator::new(self)
    }
}
