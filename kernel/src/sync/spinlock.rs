//! The one primitive safe to acquire from interrupt context (spec §4.3): a test-and-set
//! word combined with interrupt masking across the critical section. Every other
//! primitive in this module (mutex, condvar, semaphore, rwlock, memlock) and the
//! scheduler's ready/sleep queues are built on top of this.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU32, Ordering};

use crate::arch::active::intrinsics;

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;

/// An interrupt-masking test-and-set spinlock. Only for short critical sections — spec
/// §4.3 explicitly scopes this primitive to "short critical sections only", since it
/// never sleeps and holds interrupts off for its entire duration.
pub struct SpinLock<T> {
    word: AtomicU32,
    value: UnsafeCell<T>,
}

// SAFETY: `SpinLock<T>` only grants access to its `T` through a guard obtained by
// actually taking the lock, which provides the necessary exclusion for `T: Send`
// (not `Sync`) to be shared across "threads" (real OS threads on the host, or
// interrupt contexts vs. normal context on bare metal).
unsafe impl<T: Send> Sync for SpinLock<T> {}
unsafe impl<T: Send> Send for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            word: AtomicU32::new(UNLOCKED),
            value: UnsafeCell::new(value),
        }
    }

    /// Disable interrupts, then spin on the test-and-set word until it is acquired.
    /// Interrupts stay masked until the returned guard drops.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let was_enabled = intrinsics::disable_and_save();
        while intrinsics::atomic_xchg(&self.word, LOCKED) == LOCKED {
            core::hint::spin_loop();
        }
        SpinLockGuard {
            lock: self,
            was_enabled,
        }
    }

    /// Non-blocking acquire. On failure, interrupts are left exactly as found.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        let was_enabled = intrinsics::disable_and_save();
        if intrinsics::atomic_xchg(&self.word, LOCKED) == LOCKED {
            // SAFETY: restores the state `disable_and_save` just captured, since the
            // lock was not actually taken.
            unsafe { intrinsics::restore_interrupts(was_enabled) };
            return None;
        }
        Some(SpinLockGuard {
            lock: self,
            was_enabled,
        })
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
    was_enabled: bool,
}

impl<'a, T> Deref for SpinLockGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: holding the guard proves exclusive access to `value`.
        unsafe { &*self.lock.value.get() }
    }
}

impl<'a, T> DerefMut for SpinLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: see `Deref`.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<'a, T> Drop for SpinLockGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.word.store(UNLOCKED, Ordering::Release);
        // SAFETY: restores exactly the interrupt state observed when this guard's
        // `lock()`/`try_lock()` call disabled them.
        unsafe { intrinsics::restore_interrupts(self.was_enabled) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use std::thread;

    #[test]
    fn mutual_exclusion_under_contention() {
        let lock = Arc::new(SpinLock::new(0u64));
        let mut handles = alloc::vec::Vec::new();
        for _ in 0..8 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..10_000 {
                    *lock.lock() += 1;
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*lock.lock(), 80_000);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let lock = SpinLock::new(5);
        let guard = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }
}
