//! Size-threshold router over two child allocators.
//!
//! Requests of at most `THRESHOLD` bytes go to the `small` child, larger
//! ones to `large`. Because the rule is a pure function of the size, and a
//! block records its exact size, `deallocate` and `owns` route by
//! `block.size()` alone — no child needs to be queried to find the owner.

use core::ptr;

use crate::block::Block;
use crate::error::AllocResult;
use crate::traits::Allocator;

/// Router that segregates requests at a compile-time size threshold.
///
/// Stateless beyond its children, so it is thread-safe exactly when they
/// are.
#[derive(Debug, Default)]
pub struct SegregatingAllocator<const THRESHOLD: usize, Small, Large> {
    small: Small,
    large: Large,
}

impl<const THRESHOLD: usize, Small, Large> SegregatingAllocator<THRESHOLD, Small, Large> {
    /// Composes the two children, moving them in.
    pub fn new(small: Small, large: Large) -> Self {
        Self { small, large }
    }

    /// Child serving requests of at most `THRESHOLD` bytes.
    pub fn small(&self) -> &Small {
        &self.small
    }

    /// Child serving requests larger than `THRESHOLD` bytes.
    pub fn large(&self) -> &Large {
        &self.large
    }

    /// The routing threshold in bytes.
    pub const fn threshold(&self) -> usize {
        THRESHOLD
    }

    /// Splits the router back into its children.
    pub fn into_inner(self) -> (Small, Large) {
        (self.small, self.large)
    }
}

impl<const THRESHOLD: usize, Small, Large> Allocator
    for SegregatingAllocator<THRESHOLD, Small, Large>
where
    Small: Allocator,
    Large: Allocator,
{
    fn allocate(&self, size: usize, align: usize) -> AllocResult<Block> {
        if size <= THRESHOLD {
            self.small.allocate(size, align)
        } else {
            self.large.allocate(size, align)
        }
    }

    fn reallocate(&self, block: Block, new_size: usize, align: usize) -> AllocResult<Block> {
        let was_small = block.size() <= THRESHOLD;
        let stays_small = new_size <= THRESHOLD;

        match (was_small, stays_small) {
            // Same bucket: the owning child resizes.
            (true, true) => self.small.reallocate(block, new_size, align),
            (false, false) => self.large.reallocate(block, new_size, align),
            // Crossing the threshold: allocate in the destination bucket,
            // copy what fits, release from the source bucket.
            (true, false) => {
                let fresh = self.large.allocate(new_size, align)?;
                // SAFETY: block is live for block.size() bytes in small,
                // fresh for new_size >= block.size() bytes in large; the
                // children hand out disjoint memory.
                unsafe {
                    ptr::copy_nonoverlapping(block.as_ptr(), fresh.as_ptr(), block.size());
                }
                self.small.deallocate(block)?;
                Ok(fresh)
            }
            (false, true) => {
                let fresh = self.small.allocate(new_size, align)?;
                // SAFETY: As above, with new_size < block.size(), so only
                // the surviving prefix is copied.
                unsafe {
                    ptr::copy_nonoverlapping(block.as_ptr(), fresh.as_ptr(), new_size);
                }
                self.large.deallocate(block)?;
                Ok(fresh)
            }
        }
    }

    fn deallocate(&self, block: Block) -> AllocResult<()> {
        if block.size() <= THRESHOLD {
            self.small.deallocate(block)
        } else {
            self.large.deallocate(block)
        }
    }

    fn deallocate_all(&self) {
        self.large.deallocate_all();
        self.small.deallocate_all();
    }

    fn max_size(&self) -> usize {
        // The small side can never serve more than THRESHOLD bytes, so the
        // bound is whichever of the threshold and the large side is bigger.
        THRESHOLD.max(self.large.max_size())
    }

    fn owns(&self, block: Block) -> bool {
        if block.size() <= THRESHOLD {
            self.small.owns(block)
        } else {
            self.large.owns(block)
        }
    }
}
