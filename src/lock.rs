//! Opt-in locking for the stateful strategies.
//!
//! Every stateful allocator is generic over an [`lock_api::RawMutex`]. The
//! default, [`NullLock`], compiles to nothing and is deliberately `!Sync`,
//! so a single-threaded allocator can never be shared across threads by
//! accident. Substituting [`parking_lot::RawMutex`] makes the same strategy
//! thread-safe; the `Sync*` aliases exported next to each allocator do
//! exactly that.

use core::cell::Cell;
use core::marker::PhantomData;

use lock_api::{GuardSend, RawMutex};

/// Zero-cost stand-in for a mutex when single-threaded.
///
/// `lock` and `unlock` are no-ops. The `PhantomData<Cell<()>>` keeps the
/// type `Send` but `!Sync`: an allocator parameterized by `NullLock` can be
/// moved between threads, never shared between them, which is what makes
/// the no-op sound.
pub struct NullLock {
    _not_sync: PhantomData<Cell<()>>,
}

// SAFETY: NullLock never actually excludes anyone, which is sound only
// because it is !Sync — a mutex that cannot be reached from two threads
// needs no exclusion.
unsafe impl RawMutex for NullLock {
    const INIT: NullLock = NullLock { _not_sync: PhantomData };

    type GuardMarker = GuardSend;

    #[inline(always)]
    fn lock(&self) {}

    #[inline(always)]
    fn try_lock(&self) -> bool {
        true
    }

    #[inline(always)]
    unsafe fn unlock(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_lock_is_freely_acquirable() {
        let mutex: lock_api::Mutex<NullLock, u32> = lock_api::Mutex::new(7);
        {
            let mut guard = mutex.lock();
            *guard += 1;
        }
        assert!(mutex.try_lock().is_some());
        assert_eq!(*mutex.lock(), 8);
    }

    #[test]
    fn real_mutex_substitutes_cleanly() {
        let mutex: lock_api::Mutex<parking_lot::RawMutex, u32> =
            lock_api::Mutex::new(7);
        *mutex.lock() += 1;
        assert_eq!(*mutex.lock(), 8);
    }
}
