//! Cross-primitive synchronization integration tests, run against real OS threads the
//! same way each `sync::*` module's own `#[cfg(test)]` unit tests do. Those modules
//! already cover each primitive in isolation (FIFO mutex ordering, semaphore
//! producer/consumer, rwlock writer preference, condvar signal/broadcast, spinlock
//! mutual exclusion) — these exercise two primitives composed together, a shape none
//! of the per-module suites cover on their own.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use pebbles_kernel::process::ids::Tid;
use pebbles_kernel::sync::{MemLock, Mutex, Semaphore};

/// A fixed-size resource pool: a `Semaphore` counts free slots, a `Mutex` protects the
/// free-list itself. Every worker must observe at most `POOL_SIZE` resources checked
/// out at once, and every checkout must return a resource no other live checkout
/// currently holds — the classic semaphore-gates-admission / mutex-guards-state
/// composition, not exercised by either primitive's own standalone tests.
#[test]
fn semaphore_gated_mutex_pool_never_exceeds_capacity_or_double_issues() {
    const POOL_SIZE: i32 = 3;
    const WORKERS: u32 = 8;
    const ROUNDS: u32 = 25;

    let admission = Arc::new(Semaphore::new(POOL_SIZE));
    let free_list: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new((0..POOL_SIZE as u32).collect()));
    let concurrently_out = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for worker in 0..WORKERS {
        let admission = Arc::clone(&admission);
        let free_list = Arc::clone(&free_list);
        let concurrently_out = Arc::clone(&concurrently_out);
        let max_seen = Arc::clone(&max_seen);
        handles.push(thread::spawn(move || {
            let tid = Tid(20_000 + worker);
            for _ in 0..ROUNDS {
                admission.down(tid);
                let resource = {
                    let mut guard = free_list.lock(tid);
                    guard.pop().expect("semaphore guarantees a free slot is available")
                };

                let now_out = concurrently_out.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now_out, Ordering::SeqCst);
                thread::yield_now();
                concurrently_out.fetch_sub(1, Ordering::SeqCst);

                {
                    let mut guard = free_list.lock(tid);
                    debug_assert!(!guard.contains(&resource), "a resource must never be issued twice at once");
                    guard.push(resource);
                }
                admission.up(tid);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert!(max_seen.load(Ordering::SeqCst) as i32 <= POOL_SIZE, "pool must never exceed its capacity");
    assert_eq!(free_list.lock(Tid(29_999)).len(), POOL_SIZE as usize, "every resource must be returned");
}

/// `MemLock` wraps a writer-preferred `RwLock` per page behind a refcounted channel
/// table guarded by its own internal `Mutex`. Under real concurrent readers and a
/// writer on the *same* page, readers and the writer must never be inside their
/// critical sections at the same time, and the channel table must settle back to
/// empty once every guard has dropped.
#[test]
fn memlock_write_lock_excludes_concurrent_readers_under_real_contention() {
    const READERS: u32 = 6;
    const PAGE: u32 = 0x9000;

    let memlock = Arc::new(MemLock::new());
    let writer_active = Arc::new(AtomicBool::new(false));
    let violation = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::new();
    for i in 0..READERS {
        let memlock = Arc::clone(&memlock);
        let writer_active = Arc::clone(&writer_active);
        let violation = Arc::clone(&violation);
        handles.push(thread::spawn(move || {
            let tid = Tid(21_000 + i);
            for _ in 0..40 {
                let _guard = memlock.read_lock(tid, PAGE);
                if writer_active.load(Ordering::SeqCst) {
                    violation.store(true, Ordering::SeqCst);
                }
                thread::yield_now();
            }
        }));
    }

    let writer_memlock = Arc::clone(&memlock);
    let writer_flag = Arc::clone(&writer_active);
    let writer_violation = Arc::clone(&violation);
    handles.push(thread::spawn(move || {
        let tid = Tid(21_999);
        for _ in 0..40 {
            let _guard = writer_memlock.write_lock(tid, PAGE);
            writer_flag.store(true, Ordering::SeqCst);
            thread::yield_now();
            if !writer_flag.load(Ordering::SeqCst) {
                writer_violation.store(true, Ordering::SeqCst);
            }
            writer_flag.store(false, Ordering::SeqCst);
        }
    }));

    for h in handles {
        h.join().unwrap();
    }

    assert!(!violation.load(Ordering::SeqCst), "a reader observed the writer active inside its own critical section");
    assert_eq!(memlock.channel_count(Tid(29_998)), 0, "the page's channel must be reclaimed once every guard drops");
}
