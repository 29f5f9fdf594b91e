//! Dynamic collection of bump arenas, max-heap ordered by free capacity.
//!
//! Serves size-bounded requests from whichever sub-arena has the most room.
//! The arenas live in a vector arranged as a binary max-heap keyed by each
//! arena's remaining capacity: node `i` has children `2i+1` and `2i+2` and
//! parent `(i-1)/2`, and the root is always the emptiest arena. After an
//! operation changes one arena's capacity, only that node is repaired —
//! sift-down when capacity shrank, sift-up when it grew. Equal keys never
//! swap, and a full re-heapify is never needed.
//!
//! Preferring the emptiest arena maximizes the chance the next request
//! fits, and concentrating liveness lets arenas empty out and take the
//! stack strategy's whole-arena reset.
//!
//! # Safety
//!
//! Sub-arena storage is carved out of the backing allocator and the arenas
//! are constructed in place:
//! - Each `PoolEntry` exclusively owns its arena until the pool drops it
//! - Arena pointers stay stable for the entry's lifetime (the vector moves
//!   entries, not arenas)
//! - All entry access is mediated by the pool's mutex

use core::mem;
use core::ptr::{self, NonNull};

use lock_api::{Mutex, RawMutex};

use crate::block::Block;
use crate::error::{AllocError, AllocResult};
use crate::lock::NullLock;
use crate::stack::StackAllocator;
use crate::traits::Allocator;
use crate::utils::padding_needed;

/// Owning handle to one sub-arena and the backing block that stores it.
struct PoolEntry<const N: usize> {
    arena: NonNull<StackAllocator<N>>,
    storage: Block,
}

impl<const N: usize> PoolEntry<N> {
    fn arena(&self) -> &StackAllocator<N> {
        // SAFETY: arena points at a StackAllocator constructed by
        // create_pool and kept alive until the pool releases this entry.
        unsafe { self.arena.as_ref() }
    }
}

// SAFETY: PoolEntry is an owning handle, like Box.
// - It exclusively owns the arena allocation it points to
// - All access goes through the pool's mutex, which provides the
//   happens-before edges the NullLock sub-arenas do not
unsafe impl<const N: usize> Send for PoolEntry<N> {}

/// Growable pool of `StackAllocator<POOL_SIZE>` sub-arenas.
///
/// Requests larger than `POOL_SIZE` are rejected outright — this strategy
/// is for size-bounded workloads. Arena storage is allocated from the
/// backing allocator `A`; the pool owns its arenas directly and returns
/// their storage to the backing when dropped.
///
/// Single-threaded by default (`R = NullLock`); [`SyncPoolAllocator`]
/// substitutes a real mutex. Sub-arenas themselves stay null-locked: the
/// pool's own mutex is held across every operation that touches them.
pub struct PoolAllocator<const POOL_SIZE: usize, A: Allocator, R: RawMutex = NullLock> {
    backing: A,
    pools: Mutex<R, Vec<PoolEntry<POOL_SIZE>>>,
}

/// Thread-safe pool allocator.
pub type SyncPoolAllocator<const POOL_SIZE: usize, A> =
    PoolAllocator<POOL_SIZE, A, parking_lot::RawMutex>;

impl<const POOL_SIZE: usize, A: Allocator, R: RawMutex> PoolAllocator<POOL_SIZE, A, R> {
    /// Creates an empty pool over the given backing allocator.
    pub fn with_backing(backing: A) -> Self {
        Self { backing, pools: Mutex::new(Vec::new()) }
    }

    /// Creates an empty pool over a default-constructed backing allocator.
    pub fn new() -> Self
    where
        A: Default,
    {
        Self::with_backing(A::default())
    }

    /// The allocator sub-arena storage is carved from.
    pub fn backing(&self) -> &A {
        &self.backing
    }

    /// Number of sub-arenas currently alive.
    pub fn pool_count(&self) -> usize {
        self.pools.lock().len()
    }

    /// Byte capacity of each sub-arena.
    pub const fn pool_capacity(&self) -> usize {
        POOL_SIZE
    }

    /// Remaining capacity of the root (emptiest) sub-arena, if any.
    pub fn root_capacity(&self) -> Option<usize> {
        let pools = self.pools.lock();
        pools.first().map(|entry| entry.arena().max_size())
    }

    /// Remaining capacity of every sub-arena, in heap order.
    pub fn arena_capacities(&self) -> Vec<usize> {
        let pools = self.pools.lock();
        pools.iter().map(|entry| entry.arena().max_size()).collect()
    }

    /// Allocates storage from the backing, constructs a fresh arena in it,
    /// and appends the entry at the leaf position.
    fn create_pool(&self, pools: &mut Vec<PoolEntry<POOL_SIZE>>) -> AllocResult<()> {
        let size = mem::size_of::<StackAllocator<POOL_SIZE>>();
        let align = mem::align_of::<StackAllocator<POOL_SIZE>>();

        // Backing allocators are not required to honor the arena's 64-byte
        // alignment, so over-allocate and round up inside the block.
        let storage = self.backing.allocate(size + align - 1, align)?;
        let offset = padding_needed(storage.addr(), align);

        // SAFETY: offset < align and the block spans size + align - 1
        // bytes, so the aligned slot lies entirely inside it.
        let slot = unsafe { storage.as_ptr().add(offset) }.cast::<StackAllocator<POOL_SIZE>>();
        // SAFETY: slot is aligned to align_of::<StackAllocator<POOL_SIZE>>()
        // and valid for size bytes of fresh, exclusively owned storage.
        unsafe { StackAllocator::init_in_place(slot) };

        tracing::debug!(
            pools = pools.len() + 1,
            pool_bytes = POOL_SIZE,
            "created pool arena"
        );

        pools.push(PoolEntry {
            // SAFETY: slot is derived from a live allocation, hence non-null.
            arena: unsafe { NonNull::new_unchecked(slot) },
            storage,
        });
        Ok(())
    }

    /// Allocation path shared by `allocate` and the reallocation spill.
    /// Assumes `size <= POOL_SIZE` and that the lock is held.
    fn allocate_locked(
        &self,
        pools: &mut Vec<PoolEntry<POOL_SIZE>>,
        size: usize,
        align: usize,
    ) -> AllocResult<Block> {
        if pools.is_empty() {
            self.create_pool(pools)?;
            return pools[0].arena().allocate(size, align);
        }

        match pools[0].arena().allocate(size, align) {
            Ok(block) => {
                // The root's capacity shrank; push it down to its place.
                Self::sift_down(pools, 0);
                Ok(block)
            }
            Err(err) if err.is_out_of_memory() => {
                // The emptiest arena could not fit the request, so no arena
                // can. Grow the pool set and serve from the fresh arena.
                self.create_pool(pools)?;
                let leaf = pools.len() - 1;
                let result = pools[leaf].arena().allocate(size, align);
                // Restore heap order whether or not the fresh arena could
                // serve the request (padding can defeat it).
                Self::sift_up(pools, leaf);
                result
            }
            Err(err) => Err(err),
        }
    }

    fn owner_index(pools: &[PoolEntry<POOL_SIZE>], block: Block) -> Option<usize> {
        pools.iter().position(|entry| entry.arena().owns(block))
    }

    /// Repairs the heap downward from `i`; returns the node's final index.
    fn sift_down(pools: &mut [PoolEntry<POOL_SIZE>], mut i: usize) -> usize {
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut largest = i;

            if left < pools.len()
                && pools[left].arena().max_size() > pools[largest].arena().max_size()
            {
                largest = left;
            }
            if right < pools.len()
                && pools[right].arena().max_size() > pools[largest].arena().max_size()
            {
                largest = right;
            }

            if largest == i {
                return i;
            }
            pools.swap(i, largest);
            i = largest;
        }
    }

    /// Repairs the heap upward from `i`; returns the node's final index.
    fn sift_up(pools: &mut [PoolEntry<POOL_SIZE>], mut i: usize) -> usize {
        while i > 0 {
            let parent = (i - 1) / 2;
            if pools[parent].arena().max_size() < pools[i].arena().max_size() {
                pools.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
        i
    }
}

impl<const POOL_SIZE: usize, A: Allocator, R: RawMutex> Allocator
    for PoolAllocator<POOL_SIZE, A, R>
{
    fn allocate(&self, size: usize, align: usize) -> AllocResult<Block> {
        if size > POOL_SIZE {
            return Err(AllocError::out_of_memory(size, align));
        }

        let mut pools = self.pools.lock();
        self.allocate_locked(&mut pools, size, align)
    }

    fn reallocate(&self, block: Block, new_size: usize, align: usize) -> AllocResult<Block> {
        let mut pools = self.pools.lock();

        let idx = Self::owner_index(&pools, block).ok_or_else(AllocError::not_owned)?;

        match pools[idx].arena().reallocate(block, new_size, align) {
            Ok(moved) => {
                // In-place resize moved the arena's capacity in either
                // direction; one of the two repairs is a no-op.
                let i = Self::sift_down(&mut pools, idx);
                Self::sift_up(&mut pools, i);
                Ok(moved)
            }
            Err(err) if err.is_out_of_memory() => {
                if new_size > POOL_SIZE {
                    return Err(AllocError::out_of_memory(new_size, align));
                }

                // Spill into the pool at large; this may create a new arena
                // and shuffle the heap.
                let fresh = self.allocate_locked(&mut pools, new_size, align)?;
                let copy_len = new_size.min(block.size());
                // SAFETY: block is live for block.size() bytes, fresh for
                // new_size bytes; arenas hand out disjoint ranges.
                unsafe {
                    ptr::copy_nonoverlapping(block.as_ptr(), fresh.as_ptr(), copy_len);
                }

                // The shuffle above may have moved the owner; find it again.
                let idx =
                    Self::owner_index(&pools, block).ok_or_else(AllocError::not_owned)?;
                pools[idx].arena().deallocate(block)?;
                Self::sift_up(&mut pools, idx);
                Ok(fresh)
            }
            Err(err) => Err(err),
        }
    }

    fn deallocate(&self, block: Block) -> AllocResult<()> {
        let mut pools = self.pools.lock();

        let idx = Self::owner_index(&pools, block).ok_or_else(AllocError::not_owned)?;
        pools[idx].arena().deallocate(block)?;
        // The arena's free capacity grew (or it fully reset); float it up.
        Self::sift_up(&mut pools, idx);
        Ok(())
    }

    fn deallocate_all(&self) {
        let pools = self.pools.lock();
        for entry in pools.iter() {
            entry.arena().deallocate_all();
        }
        // All capacities are back to POOL_SIZE; heap order is trivial.
    }

    fn max_size(&self) -> usize {
        POOL_SIZE
    }

    fn owns(&self, block: Block) -> bool {
        let pools = self.pools.lock();
        pools.iter().any(|entry| entry.arena().owns(block))
    }
}

impl<const POOL_SIZE: usize, A: Allocator + Default, R: RawMutex> Default
    for PoolAllocator<POOL_SIZE, A, R>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const POOL_SIZE: usize, A: Allocator, R: RawMutex> Drop
    for PoolAllocator<POOL_SIZE, A, R>
{
    fn drop(&mut self) {
        let entries: Vec<PoolEntry<POOL_SIZE>> = self.pools.get_mut().drain(..).collect();
        for entry in entries {
            // SAFETY: The entry exclusively owns the arena; nothing can
            // reach it after it leaves the vector.
            unsafe { ptr::drop_in_place(entry.arena.as_ptr()) };
            let _ = self.backing.deallocate(entry.storage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::GlobalAllocator;
    use crate::lock::NullLock;

    type Pool = PoolAllocator<1024, GlobalAllocator<NullLock>>;

    #[test]
    fn first_allocation_creates_a_pool() {
        let pool = Pool::new();
        assert_eq!(pool.pool_count(), 0);

        let block = pool.allocate(100, 8).unwrap();
        assert_eq!(pool.pool_count(), 1);
        assert!(pool.owns(block));

        pool.deallocate(block).unwrap();
        assert_eq!(pool.root_capacity(), Some(1024));
    }

    #[test]
    fn oversized_requests_are_rejected() {
        let pool = Pool::new();
        let err = pool.allocate(1025, 8).unwrap_err();
        assert!(err.is_out_of_memory());
        assert_eq!(pool.pool_count(), 0);
    }

    #[test]
    fn root_is_always_the_emptiest_arena() {
        let pool = Pool::new();

        let a = pool.allocate(900, 8).unwrap();
        let b = pool.allocate(900, 8).unwrap();
        assert_eq!(pool.pool_count(), 2);

        pool.deallocate(b).unwrap();
        // The arena b came from is empty again and must sit at the root.
        assert_eq!(pool.root_capacity(), Some(1024));

        // The next allocation is served by that root arena: it lands at the
        // address b vacated.
        let c = pool.allocate(500, 8).unwrap();
        assert_eq!(pool.pool_count(), 2);
        assert_eq!(c.addr(), b.addr());
        assert_eq!(pool.root_capacity(), Some(1024 - 500));

        pool.deallocate(a).unwrap();
        pool.deallocate(c).unwrap();
    }

    #[test]
    fn deallocate_all_resets_every_arena() {
        let pool = Pool::new();
        let _a = pool.allocate(800, 8).unwrap();
        let _b = pool.allocate(800, 8).unwrap();
        let _c = pool.allocate(800, 8).unwrap();
        assert_eq!(pool.pool_count(), 3);

        pool.deallocate_all();
        assert_eq!(pool.pool_count(), 3);
        assert_eq!(pool.root_capacity(), Some(1024));
    }

    #[test]
    fn drop_returns_storage_to_backing() {
        let backing = GlobalAllocator::<NullLock>::new();
        {
            let pool: PoolAllocator<512, _> = PoolAllocator::with_backing(&backing);
            let _x = pool.allocate(400, 8).unwrap();
            let _y = pool.allocate(400, 8).unwrap();
            assert_eq!(backing.live_blocks(), 2);
        }
        assert!(backing.is_empty());
    }

    #[test]
    fn realloc_spills_to_another_arena() {
        let pool = Pool::new();

        let a = pool.allocate(600, 8).unwrap();
        let _hold = pool.allocate(300, 8).unwrap();
        // SAFETY: a is live for 600 bytes.
        unsafe { a.as_ptr().write_bytes(0x7E, 600) };

        // a sits below _hold, so in-place growth fails and the request
        // spills, creating a second arena.
        let grown = pool.reallocate(a, 1000, 8).unwrap();
        assert_eq!(pool.pool_count(), 2);
        assert!(pool.owns(grown));
        assert_ne!(grown.as_ptr(), a.as_ptr());
        // SAFETY: grown is live for 1000 bytes; first 600 copied.
        unsafe {
            for i in 0..600 {
                assert_eq!(grown.as_ptr().add(i).read(), 0x7E);
            }
        }
    }
}
