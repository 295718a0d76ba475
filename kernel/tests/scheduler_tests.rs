//! Black-box scheduler integration tests against `sched::scheduler`'s public surface.
//! `scheduler.rs`'s own `#[cfg(test)]` module already covers tick/rotation, sleep
//! wakeup, and the descheduled-kind contract in isolation; these exercise sequences
//! that chain several of those operations together the way a real caller would.
//!
//! `SCHEDULER` is one process-wide static shared by every test in this binary's
//! default multi-threaded harness, so every test here uses its own block of
//! never-reused tids and asserts only on deltas/membership, never on the absolute
//! ready-queue length or tick count.

use pebbles_kernel::process::ids::Tid;
use pebbles_kernel::sched::scheduler;
use pebbles_kernel::sched::DeschedKind;

/// `yield(-1)` must visit every ready thread exactly once before repeating, in FIFO
/// registration order — the defining guarantee of round-robin scheduling.
#[test]
fn yield_to_none_round_robins_through_every_ready_thread() {
    let tids = [Tid(10_001), Tid(10_002), Tid(10_003)];
    for &t in &tids {
        scheduler::register_ready(t);
    }

    // Other tests in this binary share the same global ready queue and may interleave
    // their own tids into the rotation, so this polls generously rather than assuming
    // our three tids are the only ones visited in exactly three steps.
    let mut seen = Vec::new();
    for _ in 0..(tids.len() * 200) {
        if seen.len() == tids.len() {
            break;
        }
        let next = scheduler::yield_to(None).expect("ready queue is non-empty");
        if tids.contains(&next) && !seen.contains(&next) {
            seen.push(next);
        }
    }
    for &t in &tids {
        assert!(seen.contains(&t), "{:?} must be visited within one full rotation", t);
    }

    for &t in &tids {
        scheduler::forget(t);
    }
}

/// `yield(tid)` must rotate straight to the named thread, skipping any others ahead
/// of it in the queue, and leave it current.
#[test]
fn yield_to_specific_tid_targets_it_directly() {
    let tids = [Tid(10_101), Tid(10_102), Tid(10_103)];
    for &t in &tids {
        scheduler::register_ready(t);
    }

    // `current()` is shared process-wide state another parallel test may overwrite the
    // instant after this call returns, so only the return value itself is checked.
    let next = scheduler::yield_to(Some(Tid(10_103))).expect("tid 10103 is ready");
    assert_eq!(next, Tid(10_103));

    for &t in &tids {
        scheduler::forget(t);
    }
}

/// `yield(tid)` targeting a tid that isn't in the ready queue at all must fail rather
/// than silently picking something else.
#[test]
fn yield_to_an_unready_tid_returns_none() {
    assert_eq!(scheduler::yield_to(Some(Tid(10_201))), None);
}

/// `sleep(n)` followed by `make_runnable` (the user syscall) must not be able to wake
/// the sleeper early — only `tick()` reaching the deadline may. This chains the
/// deschedule-kind contract (already unit-tested standalone) with `sleep_until`.
#[test]
fn sleeping_thread_is_immune_to_user_make_runnable() {
    let tid = Tid(10_301);
    let start = scheduler::ticks();
    scheduler::sleep_until(tid, start + 2);

    assert!(scheduler::make_runnable(tid, true).is_err(), "user make_runnable must not wake a sleeper");
    assert!(scheduler::is_descheduled(tid));

    scheduler::tick();
    scheduler::tick();
    assert!(!scheduler::is_descheduled(tid));
    assert!(scheduler::is_ready(tid));

    scheduler::forget(tid);
}

/// A thread that deschedules itself (kernel-internal, e.g. blocking in a sync
/// primitive) and is then killed before it's ever made runnable again must be
/// completely forgotten — not left on the ready queue, the sleep queue, or the
/// descheduled table, the three places `thread_kill`'s `scheduler::forget` call must
/// reach.
#[test]
fn forget_clears_a_thread_regardless_of_which_queue_it_is_parked_in() {
    let descheduled = Tid(10_401);
    let sleeping = Tid(10_402);
    let ready = Tid(10_403);

    scheduler::deschedule(descheduled, DeschedKind::Kernel);
    scheduler::sleep_until(sleeping, scheduler::ticks() + 1000);
    scheduler::register_ready(ready);

    scheduler::forget(descheduled);
    scheduler::forget(sleeping);
    scheduler::forget(ready);

    assert!(!scheduler::is_descheduled(descheduled));
    assert!(!scheduler::is_descheduled(sleeping));
    assert!(!scheduler::is_ready(ready));
}
