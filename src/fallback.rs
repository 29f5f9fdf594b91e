//! Primary-then-secondary composition.
//!
//! Tries the primary allocator first and falls back to the secondary when —
//! and only when — the primary reports `OutOfMemory`. Every other failure
//! propagates untouched. Blocks originate in exactly one child, so the set
//! of owned blocks is the disjoint union of the children's sets.

use core::ptr;

use crate::block::Block;
use crate::error::{AllocError, AllocResult};
use crate::traits::Allocator;

/// Composition that serves from `primary` and spills into `secondary`.
///
/// Carries no lock of its own: it has no state beyond the children, and the
/// call graph is a static DAG (children never call back up), so it is
/// thread-safe exactly when both children are.
#[derive(Debug, Default)]
pub struct FallbackAllocator<P, S> {
    primary: P,
    secondary: S,
}

impl<P, S> FallbackAllocator<P, S> {
    /// Composes two allocators, moving them in.
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }

    /// The allocator consulted first.
    pub fn primary(&self) -> &P {
        &self.primary
    }

    /// The allocator consulted when the primary is out of memory.
    pub fn secondary(&self) -> &S {
        &self.secondary
    }

    /// Splits the composition back into its children.
    pub fn into_inner(self) -> (P, S) {
        (self.primary, self.secondary)
    }
}

impl<P: Allocator, S: Allocator> FallbackAllocator<P, S> {
    /// Moves a block's contents into a fresh allocation from `dst`, then
    /// releases the original from `src`.
    fn migrate<Src: Allocator, Dst: Allocator>(
        src: &Src,
        dst: &Dst,
        block: Block,
        new_size: usize,
        align: usize,
    ) -> AllocResult<Block> {
        let fresh = dst.allocate(new_size, align)?;
        let copy_len = new_size.min(block.size());
        // SAFETY: Copying between blocks of two different allocators.
        // - block is live for block.size() bytes in src
        // - fresh is live for new_size bytes in dst
        // - Distinct allocators hand out disjoint memory
        unsafe {
            ptr::copy_nonoverlapping(block.as_ptr(), fresh.as_ptr(), copy_len);
        }
        src.deallocate(block)?;
        Ok(fresh)
    }
}

impl<P: Allocator, S: Allocator> Allocator for FallbackAllocator<P, S> {
    fn allocate(&self, size: usize, align: usize) -> AllocResult<Block> {
        match self.primary.allocate(size, align) {
            Ok(block) => Ok(block),
            Err(err) if err.is_out_of_memory() => self.secondary.allocate(size, align),
            Err(err) => Err(err),
        }
    }

    fn reallocate(&self, block: Block, new_size: usize, align: usize) -> AllocResult<Block> {
        if self.primary.owns(block) {
            return match self.primary.reallocate(block, new_size, align) {
                Ok(moved) => Ok(moved),
                Err(err) if err.is_out_of_memory() => {
                    Self::migrate(&self.primary, &self.secondary, block, new_size, align)
                }
                Err(err) => Err(err),
            };
        }

        if self.secondary.owns(block) {
            return match self.secondary.reallocate(block, new_size, align) {
                Ok(moved) => Ok(moved),
                Err(err) if err.is_out_of_memory() => {
                    Self::migrate(&self.secondary, &self.primary, block, new_size, align)
                }
                Err(err) => Err(err),
            };
        }

        Err(AllocError::not_owned())
    }

    fn deallocate(&self, block: Block) -> AllocResult<()> {
        if self.primary.owns(block) {
            self.primary.deallocate(block)
        } else if self.secondary.owns(block) {
            self.secondary.deallocate(block)
        } else {
            Err(AllocError::not_owned())
        }
    }

    fn deallocate_all(&self) {
        self.primary.deallocate_all();
        self.secondary.deallocate_all();
    }

    fn max_size(&self) -> usize {
        self.primary.max_size().max(self.secondary.max_size())
    }

    fn owns(&self, block: Block) -> bool {
        self.primary.owns(block) || self.secondary.owns(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::GlobalAllocator;
    use crate::lock::NullLock;
    use crate::stack::StackAllocator;

    type Tiered = FallbackAllocator<StackAllocator<256>, GlobalAllocator<NullLock>>;

    fn tiered() -> Tiered {
        FallbackAllocator::new(StackAllocator::new(), GlobalAllocator::new())
    }

    #[test]
    fn primary_serves_until_exhausted() {
        let alloc = tiered();

        let x = alloc.allocate(200, 8).unwrap();
        assert!(alloc.primary().owns(x));
        assert!(!alloc.secondary().owns(x));

        let y = alloc.allocate(200, 8).unwrap();
        assert!(alloc.secondary().owns(y));
        assert!(!alloc.primary().owns(y));

        alloc.deallocate(x).unwrap();
        alloc.deallocate(y).unwrap();
        assert!(alloc.primary().is_empty());
        assert!(alloc.secondary().is_empty());
    }

    #[test]
    fn realloc_spills_with_contents() {
        let alloc = tiered();

        let block = alloc.allocate(200, 8).unwrap();
        assert!(alloc.primary().owns(block));
        // SAFETY: block is live for 200 bytes.
        unsafe {
            block.as_ptr().write_bytes(0xAB, 200);
        }

        // Growing past the arena forces a migration into the secondary.
        let grown = alloc.reallocate(block, 400, 8).unwrap();
        assert!(alloc.secondary().owns(grown));
        assert!(!alloc.primary().owns(grown));
        // SAFETY: grown is live for 400 bytes; first 200 copied over.
        unsafe {
            for i in 0..200 {
                assert_eq!(grown.as_ptr().add(i).read(), 0xAB);
            }
        }

        alloc.deallocate(grown).unwrap();
    }

    #[test]
    fn not_owned_propagates() {
        let alloc = tiered();
        // SAFETY: Identity value only; never dereferenced.
        let forged = unsafe { Block::from_raw_parts(0x40 as *mut u8, 8) };
        assert!(alloc.deallocate(forged).unwrap_err().is_not_owned());
        assert!(alloc.reallocate(forged, 16, 8).unwrap_err().is_not_owned());
    }

    #[test]
    fn max_size_is_the_larger_child() {
        let alloc = tiered();
        assert_eq!(alloc.max_size(), usize::MAX);
    }
}
