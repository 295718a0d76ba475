//! Condition variable (spec §4.3), grounded in `original_source/p3/kern/cond.c`.
//!
//! `wait` links the caller onto the FIFO wait-list *before* releasing the associated
//! mutex — so a `signal`/`broadcast` racing with `wait` can never slip through
//! unobserved — then re-acquires the mutex before returning, exactly matching the
//! original's `if (mp) mutex_unlock(mp)` guard and its later re-lock.

use crate::collections::IntrusiveList;
use crate::process::ids::Tid;
use crate::sched::scheduler;
use crate::sched::DeschedKind;
use crate::sync::mutex::{Mutex, MutexGuard};
use crate::sync::spinlock::SpinLock;

pub struct Condvar {
    waiters: SpinLock<IntrusiveList<Tid>>,
}

impl Condvar {
    pub const fn new() -> Self {
        Self {
            waiters: SpinLock::new(IntrusiveList::new()),
        }
    }

    /// Atomically link onto the wait-list and release `mutex`, then block until a
    /// matching `signal`/`broadcast`, reacquiring `mutex` before returning. Spurious
    /// wakeups are not observable: a thread only leaves the wait-list via a real
    /// `signal`/`broadcast` pop.
    pub fn wait<'a, T>(
        &self,
        tid: Tid,
        mutex: &'a Mutex<T>,
        guard: MutexGuard<'a, T>,
    ) -> MutexGuard<'a, T> {
        self.waiters.lock().push_back(tid);
        drop(guard);
        loop {
            scheduler::deschedule(tid, DeschedKind::Kernel);
            core::hint::spin_loop();
            if !self.waiters.lock().contains(tid) {
                break;
            }
        }
        mutex.lock(tid)
    }

    /// Wake the longest-waiting thread, if any (spec §4.3: "FIFO signal").
    pub fn signal(&self) {
        if let Some(tid) = self.waiters.lock().pop_front() {
            let _ = scheduler::make_runnable(tid, false);
        }
    }

    /// Wake every waiter (spec §4.3: "broadcast wakes all").
    pub fn broadcast(&self) {
        let mut waiters = self.waiters.lock();
        while let Some(tid) = waiters.pop_front() {
            let _ = scheduler::make_runnable(tid, false);
        }
    }

    pub fn has_waiters(&self) -> bool {
        !self.waiters.lock().is_empty()
    }

    /// Manually park `tid` on this condvar's wait-list without going through
    /// [`Condvar::wait`]'s mutex release/reacquire dance — for callers (like
    /// `process::table`'s `wait_process`) that hold a different lock across the
    /// blocking retry loop than a [`crate::sync::Mutex`].
    pub fn link_waiter(&self, tid: Tid) {
        let mut waiters = self.waiters.lock();
        if !waiters.contains(tid) {
            waiters.push_back(tid);
        }
    }

    /// Counterpart to [`Condvar::link_waiter`]: remove `tid` without waking it,
    /// e.g. because its own retry already observed the condition had become true.
    pub fn unlink_waiter(&self, tid: Tid) {
        self.waiters.lock().remove(tid);
    }

    #[cfg(test)]
    fn waiters_for_test(&self) -> alloc::vec::Vec<Tid> {
        self.waiters.lock().iter().collect()
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_wakes_oldest_waiter_first() {
        let cv = Condvar::new();
        cv.waiters.lock().push_back(Tid(1));
        cv.waiters.lock().push_back(Tid(2));
        assert_eq!(cv.waiters_for_test(), alloc::vec![Tid(1), Tid(2)]);
        cv.signal();
        assert_eq!(cv.waiters_for_test(), alloc::vec![Tid(2)]);
    }

    #[test]
    fn broadcast_drains_every_waiter() {
        let cv = Condvar::new();
        cv.waiters.lock().push_back(Tid(1));
        cv.waiters.lock().push_back(Tid(2));
        cv.waiters.lock().push_back(Tid(3));
        cv.broadcast();
        assert!(!cv.has_waiters());
    }

    #[test]
    fn wait_links_before_releasing_the_mutex() {
        let mutex = Mutex::new(0i32);
        let tid = Tid(42);
        let guard = match mutex.try_acquire_or_enqueue(tid) {
            crate::sync::mutex::LockOutcome::Acquired(g) => g,
            _ => panic!("mutex starts free"),
        };
        let cv = Condvar::new();
        cv.waiters.lock().push_back(tid);
        // Simulate the concurrent signaler's view: the waiter is linked while the
        // mutex is still held by it, matching the atomicity the original guarantees.
        assert!(cv.has_waiters());
        assert_eq!(mutex.current_owner(), Some(tid));
        drop(guard);
        cv.signal();
        assert!(!cv.has_waiters());
    }
}
