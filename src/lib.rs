//! # stratalloc
//!
//! Composable memory allocators: small building blocks that share one
//! allocation protocol and nest into application-specific strategies.
//!
//! Every strategy implements the [`Allocator`] trait — allocate,
//! reallocate, deallocate, deallocate-all, max-size, owns — over [`Block`]
//! values, so strategies are assembled by composition rather than
//! re-implementation:
//!
//! - [`StackAllocator`]: fixed-capacity bump arena with LIFO reuse
//! - [`GlobalAllocator`]: system heap with a registry of live blocks
//! - [`FallbackAllocator`]: primary-then-secondary composition
//! - [`SegregatingAllocator`]: size-threshold router over two children
//! - [`PoolAllocator`]: bump arenas kept in a max-heap by free capacity
//! - [`ReportingAllocator`]: decorator adding tracing events and counters
//!
//! Thread safety is opt-in per strategy through a `lock_api::RawMutex`
//! type parameter: the default [`NullLock`] costs nothing and keeps the
//! allocator single-threaded, while the `Sync*` aliases substitute a
//! parking_lot mutex.
//!
//! ## Quick start
//!
//! ```
//! use stratalloc::{Allocator, FallbackAllocator, GlobalAllocator, StackAllocator};
//!
//! // Serve from a fast fixed arena first; spill into the system heap.
//! let alloc: FallbackAllocator<StackAllocator<4096>, GlobalAllocator> =
//!     FallbackAllocator::new(StackAllocator::new(), GlobalAllocator::new());
//!
//! let block = alloc.allocate(256, 8)?;
//! assert_eq!(block.size(), 256);
//! assert!(alloc.owns(block));
//! alloc.deallocate(block)?;
//! # Ok::<(), stratalloc::AllocError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(rust_2018_idioms)]

pub mod adapter;
pub mod block;
pub mod error;
pub mod fallback;
pub mod global;
pub mod lock;
pub mod pool;
pub mod reporting;
pub mod segregating;
pub mod stack;
pub mod traits;
pub mod utils;

pub use adapter::AllocatorAdapter;
pub use block::Block;
pub use error::{AllocError, AllocErrorKind, AllocResult};
pub use fallback::FallbackAllocator;
pub use global::{GlobalAllocator, SyncGlobalAllocator};
pub use lock::NullLock;
pub use pool::{PoolAllocator, SyncPoolAllocator};
pub use reporting::{Report, ReportSnapshot, ReportingAllocator};
pub use segregating::SegregatingAllocator;
pub use stack::{StackAllocator, SyncStackAllocator, ARENA_ALIGN};
pub use traits::Allocator;

/// Convenient re-exports of the protocol trait and the common types.
pub mod prelude {
    pub use crate::adapter::AllocatorAdapter;
    pub use crate::block::Block;
    pub use crate::error::{AllocError, AllocErrorKind, AllocResult};
    pub use crate::fallback::FallbackAllocator;
    pub use crate::global::GlobalAllocator;
    pub use crate::lock::NullLock;
    pub use crate::pool::PoolAllocator;
    pub use crate::reporting::Report as _;
    pub use crate::segregating::SegregatingAllocator;
    pub use crate::stack::StackAllocator;
    pub use crate::traits::Allocator;
}
