//! Typed handle for containers.
//!
//! Generic containers want to allocate `T`s, not byte blocks. The adapter
//! wraps a reference to any protocol allocator behind `&dyn Allocator` and
//! converts element counts to byte requests and returned pointers back to
//! blocks. Two adapters compare equal when they refer to the same
//! allocator, and rebinding the element type keeps that reference.

use core::marker::PhantomData;
use core::mem;
use core::ptr::NonNull;

use crate::block::Block;
use crate::error::{AllocError, AllocResult};
use crate::traits::Allocator;

/// Per-type façade over an allocator reference.
pub struct AllocatorAdapter<'a, T> {
    alloc: &'a dyn Allocator,
    _element: PhantomData<fn() -> T>,
}

impl<'a, T> AllocatorAdapter<'a, T> {
    /// Wraps an allocator reference.
    pub fn new(alloc: &'a dyn Allocator) -> Self {
        Self { alloc, _element: PhantomData }
    }

    /// Allocates room for `count` values of `T`.
    ///
    /// # Errors
    /// `OutOfMemory` when the underlying allocator cannot satisfy the
    /// request, or when `count * size_of::<T>()` overflows.
    pub fn allocate(&self, count: usize) -> AllocResult<NonNull<T>> {
        let size = mem::size_of::<T>()
            .checked_mul(count)
            .ok_or(AllocError::exhausted())?;
        let block = self.alloc.allocate(size, mem::align_of::<T>())?;
        // SAFETY: Live blocks have non-null addresses.
        Ok(unsafe { NonNull::new_unchecked(block.as_ptr().cast::<T>()) })
    }

    /// Returns `count` values' worth of storage at `ptr`.
    ///
    /// `ptr` and `count` must match a previous [`allocate`](Self::allocate)
    /// call on an adapter for the same allocator.
    ///
    /// # Errors
    /// `NotOwned` when the reconstructed block did not come from the
    /// underlying allocator.
    pub fn deallocate(&self, ptr: NonNull<T>, count: usize) -> AllocResult<()> {
        let size = mem::size_of::<T>() * count;
        // SAFETY: Reconstructing the identity of the allocation that
        // allocate() returned for this pointer and count.
        let block = unsafe { Block::from_raw_parts(ptr.as_ptr().cast::<u8>(), size) };
        self.alloc.deallocate(block)
    }

    /// Upper bound on how many `T`s a single allocation could hold.
    pub fn max_count(&self) -> usize {
        match mem::size_of::<T>() {
            0 => usize::MAX,
            size => self.alloc.max_size() / size,
        }
    }

    /// The wrapped allocator reference.
    pub fn allocator(&self) -> &'a dyn Allocator {
        self.alloc
    }

    /// Rebinds the element type, keeping the allocator reference.
    pub fn cast<U>(self) -> AllocatorAdapter<'a, U> {
        AllocatorAdapter { alloc: self.alloc, _element: PhantomData }
    }
}

impl<T> Clone for AllocatorAdapter<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AllocatorAdapter<'_, T> {}

impl<T, U> PartialEq<AllocatorAdapter<'_, U>> for AllocatorAdapter<'_, T> {
    fn eq(&self, other: &AllocatorAdapter<'_, U>) -> bool {
        // Reference identity of the underlying allocator; vtables are
        // irrelevant, so compare the thin data pointers.
        core::ptr::eq(
            self.alloc as *const dyn Allocator as *const (),
            other.alloc as *const dyn Allocator as *const (),
        )
    }
}

impl<T> Eq for AllocatorAdapter<'_, T> {}

impl<T> core::fmt::Debug for AllocatorAdapter<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AllocatorAdapter")
            .field("alloc", &(self.alloc as *const dyn Allocator as *const ()))
            .finish()
    }
}
