//! The allocator protocol.
//!
//! One trait, six operations. Every strategy in this crate — leaf or
//! composite — implements [`Allocator`], so strategies nest freely: a
//! fallback over a stack and the system heap, a pool backed by a global
//! allocator, a size router over both. Composites delegate to children
//! through this same interface.
//!
//! The trait is object-safe; `&dyn Allocator` is the type-erased handle the
//! container adapter wraps.

use crate::block::Block;
use crate::error::AllocResult;

/// Uniform contract shared by every allocation strategy.
///
/// # Contracts
///
/// - `allocate(size, align)` returns a block usable for reads and writes of
///   exactly `size` bytes, aligned to `align` (a power of two) as far as the
///   strategy's documented policy promises. While the block is live, no
///   other live block from the same allocator overlaps it.
/// - `deallocate` and `reallocate` signal [`NotOwned`] for blocks this
///   allocator did not produce, without freeing anything.
/// - `deallocate_all` releases every live block and is idempotent once the
///   allocator is empty.
/// - `max_size` is an informational upper bound on what a single `allocate`
///   could currently succeed with; smaller requests may still fail due to
///   fragmentation.
/// - `owns` never fails and never mutates observable state.
///
/// Writing through a returned block is `unsafe` at the use site and requires
/// the block to still be live in the allocator that produced it.
///
/// [`NotOwned`]: crate::error::AllocErrorKind::NotOwned
pub trait Allocator {
    /// Allocates a fresh block of exactly `size` bytes aligned to `align`.
    ///
    /// # Errors
    /// `OutOfMemory` when the strategy cannot satisfy the request.
    fn allocate(&self, size: usize, align: usize) -> AllocResult<Block>;

    /// Resizes `block` to `new_size` bytes.
    ///
    /// Resizes in place when the strategy permits; otherwise allocates a new
    /// block, copies `min(old, new)` bytes, and frees the old block. The
    /// returned block's contents up to `min(old, new)` bytes are preserved.
    /// On failure the original block remains live.
    ///
    /// # Errors
    /// `OutOfMemory` when no placement fits, `NotOwned` when `block` did not
    /// come from this allocator.
    fn reallocate(&self, block: Block, new_size: usize, align: usize) -> AllocResult<Block>;

    /// Releases a live block.
    ///
    /// # Errors
    /// `NotOwned` when `block` did not come from this allocator; nothing is
    /// freed in that case.
    fn deallocate(&self, block: Block) -> AllocResult<()>;

    /// Releases every live block owned by this allocator.
    ///
    /// Afterwards `owns(b)` is false for every previously handed-out `b`.
    fn deallocate_all(&self);

    /// Upper bound on the size a single `allocate` call could currently
    /// succeed with.
    fn max_size(&self) -> usize;

    /// Whether `block` is owned by this allocator (transitively, for
    /// composites).
    fn owns(&self, block: Block) -> bool;
}

/// Allows `&A` wherever an allocator value is expected, so composites can
/// borrow children instead of consuming them.
impl<A: Allocator + ?Sized> Allocator for &A {
    #[inline]
    fn allocate(&self, size: usize, align: usize) -> AllocResult<Block> {
        (**self).allocate(size, align)
    }

    #[inline]
    fn reallocate(&self, block: Block, new_size: usize, align: usize) -> AllocResult<Block> {
        (**self).reallocate(block, new_size, align)
    }

    #[inline]
    fn deallocate(&self, block: Block) -> AllocResult<()> {
        (**self).deallocate(block)
    }

    #[inline]
    fn deallocate_all(&self) {
        (**self).deallocate_all()
    }

    #[inline]
    fn max_size(&self) -> usize {
        (**self).max_size()
    }

    #[inline]
    fn owns(&self, block: Block) -> bool {
        (**self).owns(block)
    }
}

/// Allows boxed allocators — large arenas live on the heap — to slot into
/// compositions unchanged.
impl<A: Allocator + ?Sized> Allocator for Box<A> {
    #[inline]
    fn allocate(&self, size: usize, align: usize) -> AllocResult<Block> {
        (**self).allocate(size, align)
    }

    #[inline]
    fn reallocate(&self, block: Block, new_size: usize, align: usize) -> AllocResult<Block> {
        (**self).reallocate(block, new_size, align)
    }

    #[inline]
    fn deallocate(&self, block: Block) -> AllocResult<()> {
        (**self).deallocate(block)
    }

    #[inline]
    fn deallocate_all(&self) {
        (**self).deallocate_all()
    }

    #[inline]
    fn max_size(&self) -> usize {
        (**self).max_size()
    }

    #[inline]
    fn owns(&self, block: Block) -> bool {
        (**self).owns(block)
    }
}
