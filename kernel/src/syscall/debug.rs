//! `halt`, `task_vanish`, `misbehave` (spec §4.5 "Debug/lifecycle glue") — honored
//! where meaningful, in the same spirit as the original tree's `MISBEHAVE_INT`/
//! `HALT_INT` trap gates (`original_source/p3/kern/interrupt.c`): real hardware
//! debugging aids the grading harness pokes at, not load-bearing kernel behavior.

use crate::error::KernelResult;
use crate::mm::FrameAllocator;
use crate::mm::PhysicalMemory;
use crate::process::ids::Pid;
use crate::process::table;
use core::sync::atomic::{AtomicI32, Ordering};

/// The last mode value passed to `misbehave`, for tests to observe. This crate's
/// scheduler is a deterministic FIFO round-robin (spec §5 "Ordering") and does not
/// implement the fault-injection/randomized-scheduling perturbation `misbehave` is
/// meant to drive — recording the requested mode is as far as "honored where
/// meaningful" goes here.
static MISBEHAVE_MODE: AtomicI32 = AtomicI32::new(0);

/// `halt()`: stops the machine. Never returns on success, matching the ABI table's
/// "does not return"; the caller (the dispatch loop on bare metal) is expected to
/// never resume a thread after this.
pub fn halt() -> ! {
    loop {
        crate::arch::active::intrinsics::halt();
    }
}

/// `task_vanish(status)`: kill every thread in the calling task, not just the caller
/// (contrast with plain `vanish`, which only ever decrements one thread). Each kill
/// goes through the same `thread_kill` path `vanish` uses, so the last one out still
/// zombifies the process and wakes the parent exactly as a sequence of individual
/// `vanish` calls would.
pub fn task_vanish(
    pid: Pid,
    status: i32,
    mem: &mut impl PhysicalMemory,
    frames: &mut FrameAllocator,
) -> KernelResult<()> {
    table::set_status(pid, status)?;
    for tid in table::threads_of(pid) {
        table::thread_kill(tid, mem, frames)?;
    }
    Ok(())
}

/// `misbehave(mode)`: record the requested perturbation mode. Always succeeds.
pub fn misbehave(mode: i32) {
    MISBEHAVE_MODE.store(mode, Ordering::Relaxed);
}

#[cfg(test)]
pub fn current_misbehave_mode() -> i32 {
    MISBEHAVE_MODE.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PAGE_SIZE, USER_MEM_START};
    use crate::mm::phys_mem::SimPhysicalMemory;

    const TOTAL_FRAMES: u32 = (USER_MEM_START / PAGE_SIZE) as u32 + 16;

    #[test]
    fn misbehave_records_the_requested_mode() {
        misbehave(7);
        assert_eq!(current_misbehave_mode(), 7);
        misbehave(0);
    }

    #[test]
    fn task_vanish_kills_every_thread_and_zombifies_the_process() {
        let mut mem = SimPhysicalMemory::new(TOTAL_FRAMES as usize);
        let mut frames = FrameAllocator::new(TOTAL_FRAMES);
        let (pid, _tid) = table::new_process(
            None,
            &mut mem,
            &mut frames,
            0x1000,
            crate::arch::active::context::Regs::default(),
        )
        .unwrap();
        table::new_thread(pid, 0x2000, crate::arch::active::context::Regs::default()).unwrap();
        table::new_thread(pid, 0x3000, crate::arch::active::context::Regs::default()).unwrap();
        assert_eq!(table::live_thread_count(pid), Some(3));

        task_vanish(pid, 42, &mut mem, &mut frames).unwrap();

        assert_eq!(table::live_thread_count(pid), Some(0));
        assert_eq!(table::is_zombie(pid), Some(true));
        assert!(table::threads_of(pid).is_empty());
    }
}
