//! The global scheduler (spec §4.4), grounded in `original_source/p3/kern/scheduler.c`.
//!
//! Data-structure transitions (ready/sleep membership, the descheduled-with-kind side
//! table) are target-independent and exercised directly by host tests. The actual CPU
//! suspension — `arch::x86::context::switch` — is only reachable on the bare-metal
//! target; see [`resume`] below.

use lazy_static::lazy_static;

use crate::collections::HashTable;
use crate::config::PROC_TABLE_BUCKETS;
use crate::process::ids::Tid;
use crate::sync::spinlock::SpinLock;

use super::queue::{ReadyQueue, SleepQueue};

/// Distinguishes a kernel-internal deschedule (only the issuing subsystem may wake it)
/// from a user-requested one (the `make_runnable` system call may also wake it).
/// Spec §4.3 "Descheduling contract" / §4.4 "kernel-internal flag".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeschedKind {
    User,
    Kernel,
}

struct Inner {
    ready: ReadyQueue,
    sleeping: SleepQueue,
    descheduled: HashTable<Tid, DeschedKind, PROC_TABLE_BUCKETS>,
    idle: Option<Tid>,
    current: Option<Tid>,
    ticks: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            ready: ReadyQueue::new(),
            sleeping: SleepQueue::new(),
            descheduled: HashTable::new(),
            idle: None,
            current: None,
            ticks: 0,
        }
    }
}

lazy_static! {
    static ref SCHEDULER: SpinLock<Inner> = SpinLock::new(Inner::new());
}

/// Register the system's idle thread — always runnable, never placed in the ready
/// queue, used as the fallback when the ready queue is empty (spec §4.4).
pub fn set_idle(tid: Tid) {
    SCHEDULER.lock().idle = Some(tid);
}

pub fn current() -> Option<Tid> {
    SCHEDULER.lock().current
}

pub fn set_current(tid: Tid) {
    SCHEDULER.lock().current = Some(tid);
}

pub fn ticks() -> u64 {
    SCHEDULER.lock().ticks
}

/// Called at thread birth (`new_process`/`new_thread`/`thread_fork`): the new thread
/// is immediately runnable.
pub fn register_ready(tid: Tid) {
    SCHEDULER.lock().ready.push_back(tid);
}

/// Called at `thread_kill`/reap: drop a tid from every queue it might still be on.
pub fn forget(tid: Tid) {
    let mut s = SCHEDULER.lock();
    s.ready.remove(tid);
    s.sleeping.remove(tid);
    s.descheduled.remove(&tid);
}

pub fn ready_len() -> usize {
    SCHEDULER.lock().ready.len()
}

pub fn is_ready(tid: Tid) -> bool {
    SCHEDULER.lock().ready.contains(tid)
}

pub fn is_descheduled(tid: Tid) -> bool {
    SCHEDULER.lock().descheduled.contains_key(&tid)
}

/// `yield(-1)`/`yield(tid)` (spec §4.4). `target = None` rotates to the next ready
/// thread; `Some(tid)` rotates to that specific thread if runnable. Returns the tid to
/// switch to, or `None` if the ready queue (and idle fallback) are both empty — which
/// should never happen once the idle thread is registered.
pub fn yield_to(target: Option<Tid>) -> Option<Tid> {
    let mut s = SCHEDULER.lock();
    let next = match target {
        None => s.ready.rotate().or(s.idle),
        Some(tid) => {
            if s.ready.rotate_to(tid) {
                s.ready.front()
            } else {
                return None;
            }
        }
    };
    s.current = next;
    next
}

/// Deschedule the calling thread with the given kind. The caller must already have
/// checked the `*flag != 0` short-circuit (spec §4.3) before calling — this function
/// performs only the unconditional removal-from-ready / record-as-descheduled half of
/// the contract, since `flag`'s user-memory dereference belongs to the syscall layer,
/// not the scheduler core.
pub fn deschedule(tid: Tid, kind: DeschedKind) {
    let mut s = SCHEDULER.lock();
    s.ready.remove(tid);
    s.descheduled.insert(tid, kind);
}

/// Wake a descheduled thread. `requested_by_user` distinguishes the `make_runnable`
/// system call (which must not be able to wake a kernel-internal sleeper, e.g. one
/// blocked inside `sleep` or a sync primitive) from an internal wake issued by the
/// subsystem that put it to sleep.
///
/// Returns `Err(LifecycleViolation)` if `tid` isn't currently descheduled, or if a user
/// caller tries to wake a kernel-internal sleeper.
pub fn make_runnable(tid: Tid, requested_by_user: bool) -> crate::KernelResult<()> {
    let mut s = SCHEDULER.lock();
    match s.descheduled.remove(&tid) {
        Some(DeschedKind::User) => {
            s.ready.push_back(tid);
            Ok(())
        }
        Some(DeschedKind::Kernel) if !requested_by_user => {
            s.ready.push_back(tid);
            Ok(())
        }
        Some(kind @ DeschedKind::Kernel) => {
            s.descheduled.insert(tid, kind);
            Err(crate::KernelError::LifecycleViolation)
        }
        None => Err(crate::KernelError::LifecycleViolation),
    }
}

/// `sleep(ticks)` (spec §4.4): inserts the thread into the sleep queue and deschedules
/// it with a kernel-internal flag so a user `make_runnable` cannot wake it early.
pub fn sleep_until(tid: Tid, wake_tick: u64) {
    let mut s = SCHEDULER.lock();
    s.sleeping.insert(tid, wake_tick);
    s.ready.remove(tid);
    s.descheduled.insert(tid, DeschedKind::Kernel);
}

/// The timer handler's per-tick work (spec §4.4): advance the clock, wake due
/// sleepers, rotate the ready queue. Returns the tid the caller should context-switch
/// to. Acknowledging the PIC and performing the actual switch is the bare-metal
/// interrupt handler's job, not this function's.
pub fn tick() -> Option<Tid> {
    let mut s = SCHEDULER.lock();
    s.ticks += 1;
    let now = s.ticks;
    let due = s.sleeping.drain_due(now);
    for tid in due {
        s.descheduled.remove(&tid);
        s.ready.push_back(tid);
    }
    let next = s.ready.rotate().or(s.idle);
    s.current = next;
    next
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod resume {
    //! Bare-metal-only dispatch: perform the real register-snapshot swap for a tid
    //! chosen by [`super::tick`]/[`super::yield_to`]. Kept in a submodule so host
    //! builds never reference `arch::x86::context::Regs`.

    use crate::process::ids::Tid;

    /// # Safety
    /// `prev`/`next` must be valid, live `Regs` belonging to threads with kernel
    /// stacks mapped in the currently active address space (or the address space
    /// `next` is about to switch into).
    pub unsafe fn switch_to(
        prev: &mut crate::arch::x86::context::Regs,
        next: &crate::arch::x86::context::Regs,
        next_tid: Tid,
    ) {
        super::set_current(next_tid);
        // SAFETY: forwarded to the caller's contract above.
        unsafe { crate::arch::x86::context::switch(prev, next) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_rotates_ready_queue_and_advances_clock() {
        // `SCHEDULER` is a single process-wide static, shared by every test in this
        // binary's default multi-threaded harness — assert only on monotonicity and
        // this test's own unique tids, never on an exact global tick delta.
        register_ready(Tid(901));
        register_ready(Tid(902));
        set_idle(Tid(900));
        let before = ticks();
        let next = tick();
        assert!(next.is_some());
        assert!(ticks() > before);
        forget(Tid(901));
        forget(Tid(902));
        forget(Tid(900));
    }

    #[test]
    fn sleep_then_tick_wakes_at_deadline() {
        let tid = Tid(101);
        let start = ticks();
        sleep_until(tid, start + 3);
        assert!(is_descheduled(tid));
        for _ in 0..3 {
            tick();
        }
        assert!(!is_descheduled(tid));
        assert!(is_ready(tid));
        forget(tid);
    }

    #[test]
    fn user_make_runnable_cannot_wake_kernel_internal_sleeper() {
        let tid = Tid(202);
        deschedule(tid, DeschedKind::Kernel);
        assert_eq!(
            make_runnable(tid, true),
            Err(crate::KernelError::LifecycleViolation)
        );
        assert!(make_runnable(tid, false).is_ok());
        forget(tid);
    }

    #[test]
    fn user_deschedule_is_wakeable_by_user_make_runnable() {
        let tid = Tid(303);
        deschedule(tid, DeschedKind::User);
        assert!(make_runnable(tid, true).is_ok());
        assert!(is_ready(tid));
        forget(tid);
    }
}
