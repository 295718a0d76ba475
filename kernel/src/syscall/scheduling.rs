//! `yield`/`deschedule`/`make_runnable`/`sleep`/`get_ticks` (spec §4.5 "Scheduling"),
//! thin wrappers over `sched::scheduler`. Named `scheduling` rather than `sched` so it
//! never collides with the module it wraps.

use crate::error::{KernelError, KernelResult};
use crate::mm::phys_mem::FrameNumber;
use crate::mm::vas::{copy_from_user, copy_to_user, AccessRequirement};
use crate::process::ids::{Pid, Tid};
use crate::process::table;
use crate::sched::scheduler;
use crate::sched::DeschedKind;

/// `yield(tid)` (spec §4.5): `tid == -1` (`None` here) rotates to the next ready
/// thread; a specific tid targets that thread if it's runnable.
pub fn yield_to(target: Option<Tid>) -> KernelResult<Tid> {
    scheduler::yield_to(target).ok_or(KernelError::NotFound)
}

/// `deschedule(flag)` (spec §4.3, §4.5): read the four-byte `flag` word out of user
/// memory; if it is already non-zero, the call is a no-op (the race the flag exists to
/// close). Otherwise the caller is descheduled with the user-wakeable kind.
///
/// Split into [`read_deschedule_flag`] and [`deschedule_after_flag_check`] so a caller
/// that holds a lock across `mem` (`bootstrap::MACHINE`, on bare metal) can drop it
/// between the two: `scheduler::deschedule` must never run while that lock is held,
/// since it disables interrupts for its entire scope.
pub fn deschedule(pid: Pid, tid: Tid, mem: &impl crate::mm::PhysicalMemory, flag_va: u32) -> KernelResult<()> {
    let flag = read_deschedule_flag(pid, mem, flag_va)?;
    deschedule_after_flag_check(tid, flag);
    Ok(())
}

/// Phase 1 of `deschedule`: read the flag word only. Never touches the scheduler.
pub fn read_deschedule_flag(pid: Pid, mem: &impl crate::mm::PhysicalMemory, flag_va: u32) -> KernelResult<u32> {
    let pd = page_directory_for(pid)?;
    read_flag(mem, pd, flag_va)
}

/// Phase 2 of `deschedule`: given the flag phase 1 already read, deschedule the
/// caller if it was clear.
pub fn deschedule_after_flag_check(tid: Tid, flag: u32) {
    if flag == 0 {
        scheduler::deschedule(tid, DeschedKind::User);
    }
}

/// `make_runnable(tid)` (spec §4.5): only ever wakes a `DeschedKind::User` sleeper —
/// see `scheduler::make_runnable`'s doc comment for why a kernel-internal sleeper is
/// off limits to this call.
pub fn make_runnable(tid: Tid) -> KernelResult<()> {
    scheduler::make_runnable(tid, true)
}

/// `sleep(ticks)` (spec §4.5 edge case: "a negative or zero `ticks` is rejected").
pub fn sleep(tid: Tid, ticks: i32) -> KernelResult<()> {
    if ticks <= 0 {
        return Err(KernelError::InvalidArgument);
    }
    let wake_tick = scheduler::ticks() + ticks as u64;
    scheduler::sleep_until(tid, wake_tick);
    Ok(())
}

/// `get_ticks()` (spec §4.5): ticks elapsed since boot, at `TIMER_HZ` resolution.
pub fn get_ticks() -> u64 {
    scheduler::ticks()
}

fn page_directory_for(pid: Pid) -> KernelResult<FrameNumber> {
    table::page_directory(pid)
}

fn read_flag(mem: &impl crate::mm::PhysicalMemory, pd: FrameNumber, va: u32) -> KernelResult<u32> {
    crate::mm::vas::validate_range(mem, pd, va, 4, &AccessRequirement::read())?;
    let mut bytes = [0u8; 4];
    copy_from_user(mem, pd, va, &mut bytes)?;
    Ok(u32::from_ne_bytes(bytes))
}

/// Write `value` into the user-owned `flag` word (spec §4.3: `deschedule` clears
/// nothing itself, but the caller convention zeroes the flag before the call and a
/// concurrent `make_runnable` racer sets it to signal "don't actually sleep").
pub fn write_flag(mem: &mut impl crate::mm::PhysicalMemory, pd: FrameNumber, va: u32, value: u32) -> KernelResult<()> {
    copy_to_user(mem, pd, va, &value.to_ne_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PAGE_SIZE, USER_MEM_START};
    use crate::mm::phys_mem::SimPhysicalMemory;
    use crate::mm::FrameAllocator;

    const TOTAL_FRAMES: u32 = (USER_MEM_START / PAGE_SIZE) as u32 + 16;

    fn fresh_process() -> (SimPhysicalMemory, FrameAllocator, Pid, Tid, u32) {
        let mut mem = SimPhysicalMemory::new(TOTAL_FRAMES as usize);
        let mut frames = FrameAllocator::new(TOTAL_FRAMES);
        let (pid, tid) = table::new_process(
            None,
            &mut mem,
            &mut frames,
            0x1000,
            crate::arch::active::context::Regs::default(),
        )
        .unwrap();
        let base = USER_MEM_START as u32;
        {
            let mut vas = table::checkout_address_space(pid).unwrap();
            vas.new_pages(&mut mem, &mut frames, base, PAGE_SIZE as u32, true).unwrap();
            table::checkin_address_space(pid, vas);
        }
        (mem, frames, pid, tid, base)
    }

    #[test]
    fn sleep_rejects_non_positive_ticks() {
        assert_eq!(sleep(Tid(501), 0).unwrap_err(), KernelError::InvalidArgument);
        assert_eq!(sleep(Tid(501), -5).unwrap_err(), KernelError::InvalidArgument);
    }

    #[test]
    fn deschedule_is_a_no_op_when_the_flag_is_already_set() {
        let (mut mem, _frames, pid, tid, base) = fresh_process();
        let pd = table::page_directory(pid).unwrap();
        write_flag(&mut mem, pd, base, 1).unwrap();
        deschedule(pid, tid, &mem, base).unwrap();
        assert!(!scheduler::is_descheduled(tid));
    }

    #[test]
    fn deschedule_then_make_runnable_round_trips() {
        let (mut mem, _frames, pid, tid, base) = fresh_process();
        let pd = table::page_directory(pid).unwrap();
        write_flag(&mut mem, pd, base, 0).unwrap();
        deschedule(pid, tid, &mem, base).unwrap();
        assert!(scheduler::is_descheduled(tid));
        make_runnable(tid).unwrap();
        assert!(scheduler::is_ready(tid));
        scheduler::forget(tid);
    }

    #[test]
    fn get_ticks_is_monotonic_across_a_tick() {
        let before = get_ticks();
        scheduler::tick();
        assert!(get_ticks() > before);
    }
}
