//! Counting semaphore (spec §4.3): "count ≥ 1 proceed, else condvar-wait on count
//! change", built directly on this module's own [`Mutex`]/[`Condvar`] rather than a
//! fresh wait-list, matching how the original kernel layers its synchronization
//! primitives on top of each other instead of reimplementing blocking from scratch.

use crate::process::ids::Tid;
use crate::sync::condvar::Condvar;
use crate::sync::mutex::{LockOutcome, Mutex};

pub struct Semaphore {
    count: Mutex<i32>,
    nonzero: Condvar,
}

impl Semaphore {
    pub const fn new(initial: i32) -> Self {
        Self {
            count: Mutex::new(initial),
            nonzero: Condvar::new(),
        }
    }

    /// Block until `count > 0`, then consume one unit.
    pub fn down(&self, tid: Tid) {
        let mut count = self.count.lock(tid);
        while *count <= 0 {
            count = self.nonzero.wait(tid, &self.count, count);
        }
        *count -= 1;
    }

    /// Non-blocking `down`: consume one unit only if already available.
    pub fn try_down(&self, tid: Tid) -> bool {
        match self.count.try_acquire_or_enqueue(tid) {
            LockOutcome::Acquired(mut guard) => {
                if *guard > 0 {
                    *guard -= 1;
                    true
                } else {
                    false
                }
            }
            LockOutcome::Enqueued => false,
        }
    }

    pub fn up(&self, tid: Tid) {
        let mut count = self.count.lock(tid);
        *count += 1;
        self.nonzero.signal();
    }

    pub fn value(&self, tid: Tid) -> i32 {
        *self.count.lock(tid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn down_blocks_until_a_unit_is_available() {
        let sem = Semaphore::new(0);
        assert!(!sem.try_down(Tid(1)));
        sem.up(Tid(2));
        assert_eq!(sem.value(Tid(3)), 1);
        sem.down(Tid(4));
        assert_eq!(sem.value(Tid(5)), 0);
    }

    #[test]
    fn producer_consumer_with_bounded_buffer() {
        const CAPACITY: i32 = 3;
        const ITEMS: usize = 300;

        let empty_slots = Arc::new(Semaphore::new(CAPACITY));
        let filled_slots = Arc::new(Semaphore::new(0));
        let produced = Arc::new(AtomicUsize::new(0));
        let consumed = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for worker in 0..3u32 {
            let empty_slots = Arc::clone(&empty_slots);
            let filled_slots = Arc::clone(&filled_slots);
            let produced = Arc::clone(&produced);
            handles.push(thread::spawn(move || {
                let tid = Tid(2000 + worker);
                loop {
                    let n = produced.fetch_add(1, Ordering::SeqCst);
                    if n >= ITEMS {
                        produced.fetch_sub(1, Ordering::SeqCst);
                        break;
                    }
                    empty_slots.down(tid);
                    filled_slots.up(tid);
                }
            }));
        }
        for worker in 0..3u32 {
            let empty_slots = Arc::clone(&empty_slots);
            let filled_slots = Arc::clone(&filled_slots);
            let consumed = Arc::clone(&consumed);
            handles.push(thread::spawn(move || {
                let tid = Tid(3000 + worker);
                loop {
                    // Claim a consumption ticket before calling `down`, mirroring the
                    // producer's claim-then-rollback pattern above, so the total
                    // number of `down` calls across every consumer is exactly
                    // `ITEMS` — never one more than the producers' total `up` calls,
                    // which would otherwise leave a straggler blocked forever.
                    let n = consumed.fetch_add(1, Ordering::SeqCst);
                    if n >= ITEMS {
                        consumed.fetch_sub(1, Ordering::SeqCst);
                        break;
                    }
                    filled_slots.down(tid);
                    empty_slots.up(tid);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(consumed.load(Ordering::SeqCst), ITEMS);
    }
}
