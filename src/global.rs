//! System-heap adapter with a registry of live blocks.
//!
//! Wraps `malloc`/`realloc`/`free` and remembers every block it has handed
//! out, which is what gives the system heap the protocol's `owns` and
//! `deallocate_all` semantics. Deallocation must not depend on the original
//! alignment, so the calls go through libc rather than `std::alloc` (whose
//! `dealloc` requires the allocation's layout).

use std::collections::HashSet;

use libc::c_void;
use lock_api::{Mutex, RawMutex};

use crate::block::Block;
use crate::error::{AllocError, AllocResult};
use crate::lock::NullLock;
use crate::traits::Allocator;

/// Adapter over the system heap that tracks outstanding blocks.
///
/// `owns` is registry membership; `deallocate_all` drains the registry and
/// frees every entry, and dropping the allocator does the same — clients
/// that never return their blocks cannot leak memory past the allocator's
/// lifetime.
///
/// Alignment requests are served at whatever the platform `malloc`
/// guarantees (16 bytes on 64-bit Linux); larger alignments are not
/// promised by this strategy.
///
/// Single-threaded by default (`R = NullLock`); [`SyncGlobalAllocator`]
/// substitutes a real mutex.
pub struct GlobalAllocator<R: RawMutex = NullLock> {
    blocks: Mutex<R, HashSet<Block>>,
}

/// Thread-safe global allocator.
pub type SyncGlobalAllocator = GlobalAllocator<parking_lot::RawMutex>;

impl<R: RawMutex> GlobalAllocator<R> {
    /// Creates an adapter with an empty registry.
    pub fn new() -> Self {
        Self { blocks: Mutex::new(HashSet::new()) }
    }

    /// Number of blocks currently outstanding.
    pub fn live_blocks(&self) -> usize {
        self.blocks.lock().len()
    }

    /// Whether no blocks are outstanding.
    pub fn is_empty(&self) -> bool {
        self.blocks.lock().is_empty()
    }
}

impl<R: RawMutex> Allocator for GlobalAllocator<R> {
    fn allocate(&self, size: usize, align: usize) -> AllocResult<Block> {
        debug_assert!(align.is_power_of_two());

        // SAFETY: malloc with any size is sound; a null return is handled.
        let ptr = unsafe { libc::malloc(size) }.cast::<u8>();
        if ptr.is_null() {
            return Err(AllocError::out_of_memory(size, align));
        }

        // SAFETY: ptr points at a fresh malloc allocation of `size` bytes.
        let block = unsafe { Block::from_raw_parts(ptr, size) };
        self.blocks.lock().insert(block);
        Ok(block)
    }

    fn reallocate(&self, block: Block, new_size: usize, align: usize) -> AllocResult<Block> {
        let mut blocks = self.blocks.lock();

        if !blocks.contains(&block) {
            return Err(AllocError::not_owned());
        }

        // SAFETY: block.as_ptr() came from malloc/realloc and is still
        // live (registry membership checked above).
        let moved = unsafe { libc::realloc(block.as_ptr().cast::<c_void>(), new_size) };
        if moved.is_null() {
            // The original allocation is untouched and stays registered.
            return Err(AllocError::out_of_memory(new_size, align));
        }

        blocks.remove(&block);
        // SAFETY: moved points at a live allocation of `new_size` bytes with
        // the first min(old, new) bytes preserved by realloc.
        let new_block = unsafe { Block::from_raw_parts(moved.cast::<u8>(), new_size) };
        blocks.insert(new_block);
        Ok(new_block)
    }

    fn deallocate(&self, block: Block) -> AllocResult<()> {
        let mut blocks = self.blocks.lock();

        if !blocks.remove(&block) {
            return Err(AllocError::not_owned());
        }

        // SAFETY: block was registered, so its address is a live
        // malloc/realloc result that has not been freed.
        unsafe { libc::free(block.as_ptr().cast::<c_void>()) };
        Ok(())
    }

    fn deallocate_all(&self) {
        let mut blocks = self.blocks.lock();
        for block in blocks.drain() {
            // SAFETY: Every registered block is a live malloc/realloc
            // result; draining removes it before the next operation sees it.
            unsafe { libc::free(block.as_ptr().cast::<c_void>()) };
        }
    }

    fn max_size(&self) -> usize {
        usize::MAX
    }

    fn owns(&self, block: Block) -> bool {
        self.blocks.lock().contains(&block)
    }
}

impl<R: RawMutex> Default for GlobalAllocator<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RawMutex> Drop for GlobalAllocator<R> {
    fn drop(&mut self) {
        self.deallocate_all();
    }
}
