//! Per-vector syscall entry points (spec §6 "System-call ABI"), grounded in
//! `original_source/p3/kern/interrupt.c`'s `idt_add_desc(FORK_INT, fork_int, ...)`
//! table: this tree has one trap gate per call, not a Linux-style numbered dispatch,
//! so there is no single `match syscall_number` here either — each function below is
//! what the (not-yet-written) IDT installer wires to its own vector.
//!
//! Every function's contract is the same: decode `frame.eax` (a scalar argument, or a
//! user-space pointer to a packed argument list) using [`read_packet`] where needed,
//! call into the matching `syscall::*` wrapper, and convert its `KernelResult` to the
//! ABI's negative-`isize` convention via [`KernelError::to_syscall_errno`] (spec §7)
//! before writing it back into `frame.eax` — the only place in this crate that
//! conversion happens, per `error.rs`'s own doc comment.
//!
//! `fork`'s "0 to child, pid to parent" split is *not* implemented here: the
//! child thread's kernel stack is a byte range `process::kstack` hands out, never a
//! simulated buffer the way user memory is (unlike `mm::PhysicalMemory`, nothing in
//! this crate models kernel-stack contents) — patching a copied `TrapFrame`'s `eax`
//! to 0 on the child's stack is the same kind of asm trampoline work as the original's
//! `fork.c`, out of reach of the data structures here. `fork_int` below only ever
//! writes the *parent's* frame; the child eventually reads 0 from its own
//! independently-initialized first return the same way the original's copied stack
//! frame does, at the bootstrap/asm layer this crate does not model in Rust.

use alloc::vec::Vec;

use crate::error::{KernelError, KernelResult};
use crate::fs::ExecCatalogue;
use crate::mm::phys_mem::FrameNumber;
use crate::mm::vas::{copy_from_user, copy_to_user, validate_range, AccessRequirement};
use crate::mm::{FrameAllocator, PhysicalMemory};
use crate::process::ids::{Pid, Tid};
use crate::process::table;

use crate::arch::active::context::TrapFrame;

use super::console::{self, ConsoleDevice, KeyboardSource};
use super::debug;
use super::fs as fs_syscall;
use super::process as process_syscall;
use super::scheduling;
use super::swexn as swexn_syscall;

fn page_directory_for(pid: Pid) -> KernelResult<FrameNumber> {
    table::page_directory(pid)
}

/// Read `word_count` consecutive `u32`s out of the user-space argument packet at
/// `packet_va` (spec §6: "a pointer to an argument packet for multi-argument
/// calls"). Matches the 410kern convention of a tightly packed, natively-ordered
/// struct of scalar/pointer arguments.
fn read_packet(mem: &impl PhysicalMemory, pd: FrameNumber, packet_va: u32, word_count: usize) -> KernelResult<Vec<u32>> {
    let len = (word_count * 4) as u32;
    validate_range(mem, pd, packet_va, len, &AccessRequirement::read())?;
    let mut bytes = alloc::vec![0u8; len as usize];
    copy_from_user(mem, pd, packet_va, &mut bytes)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn finish<T>(frame: &mut TrapFrame, result: KernelResult<T>, ok: impl FnOnce(T) -> isize) {
    match result {
        Ok(value) => frame.set_return(ok(value)),
        Err(err) => frame.set_return(err.to_syscall_errno()),
    }
}

// ---- Life cycle ----------------------------------------------------------

pub fn fork_int(pid: Pid, tid: Tid, mem: &mut impl PhysicalMemory, frames: &mut FrameAllocator, frame: &mut TrapFrame) {
    let result = process_syscall::fork(tid, pid, mem, frames);
    finish(frame, result, |child| child.0 as isize);
}

pub fn thread_fork_int(pid: Pid, tid: Tid, frame: &mut TrapFrame) {
    let result = process_syscall::thread_fork(tid, pid);
    finish(frame, result, |child_tid| child_tid.0 as isize);
}

/// `exec(name*, argv**)`: `frame.eax` is a pointer to `{name_va, argv_va}`. `argv`
/// marshaling onto the new user stack is not implemented (see `syscall::process::exec`'s
/// doc comment); only `name_va` is consumed here.
///
/// Unlike every other call here, `exec` "does not return" on success (spec §6): there
/// is no return value to write into `frame.eax`, since the trap is never returned
/// from at all — the caller enters user mode directly at the returned `Regs`. On
/// failure this writes the negative errno into `frame` and returns `None`, same as
/// a normal trap return.
pub fn exec_int(
    pid: Pid,
    mem: &mut impl PhysicalMemory,
    frames: &mut FrameAllocator,
    catalogue: &impl ExecCatalogue,
    frame: &mut TrapFrame,
) -> Option<crate::arch::active::context::Regs> {
    let result = (|| {
        let pd = page_directory_for(pid)?;
        let packet = read_packet(mem, pd, frame.eax, 2)?;
        process_syscall::exec(pid, mem, frames, packet[0], catalogue)
    })();
    match result {
        Ok(regs) => Some(regs),
        Err(err) => {
            frame.set_return(err.to_syscall_errno());
            None
        }
    }
}

pub fn wait_int(pid: Pid, tid: Tid, mem: &mut impl PhysicalMemory, frame: &mut TrapFrame) {
    let result = process_syscall::wait(pid, tid).and_then(|(child_pid, status)| {
        if frame.eax != 0 {
            let pd = page_directory_for(pid)?;
            copy_to_user(mem, pd, frame.eax, &status.to_ne_bytes())?;
        }
        Ok(child_pid)
    });
    finish(frame, result, |child_pid| child_pid.0 as isize);
}

pub fn set_status_int(pid: Pid, frame: &mut TrapFrame) {
    let status = frame.eax as i32;
    let result = process_syscall::set_status(pid, status);
    finish(frame, result, |()| 0);
}

/// `vanish()`: never returns to the caller (spec §6), so there is no `TrapFrame` left
/// to write a return value into — the thread-reaper and scheduler take it from here.
pub fn vanish_int(tid: Tid, mem: &mut impl PhysicalMemory, frames: &mut FrameAllocator) {
    let _ = process_syscall::vanish(tid, mem, frames);
}

pub fn gettid_int(tid: Tid, frame: &mut TrapFrame) {
    frame.set_return(process_syscall::gettid(tid).0 as isize);
}

// ---- Scheduling -----------------------------------------------------------

pub fn yield_int(frame: &mut TrapFrame) {
    let target = if frame.eax == u32::MAX { None } else { Some(Tid(frame.eax)) };
    let result = scheduling::yield_to(target);
    finish(frame, result, |tid| tid.0 as isize);
}

/// Phase 1 of `deschedule` (spec §4.3, §4.5): read the flag word. Kept separate from
/// [`finish_deschedule`] so a caller holding a lock across `mem` can drop it before
/// phase 2 runs — see `scheduling::deschedule`'s doc comment for why.
pub fn deschedule_flag(pid: Pid, mem: &impl PhysicalMemory, flag_va: u32) -> KernelResult<u32> {
    scheduling::read_deschedule_flag(pid, mem, flag_va)
}

/// Phase 2 of `deschedule`: act on the flag phase 1 already read, and write the
/// syscall's return value.
pub fn finish_deschedule(tid: Tid, flag_result: KernelResult<u32>, frame: &mut TrapFrame) {
    let result = flag_result.map(|flag| scheduling::deschedule_after_flag_check(tid, flag));
    finish(frame, result, |()| 0);
}

pub fn make_runnable_int(frame: &mut TrapFrame) {
    let result = scheduling::make_runnable(Tid(frame.eax));
    finish(frame, result, |()| 0);
}

pub fn sleep_int(tid: Tid, frame: &mut TrapFrame) {
    let result = scheduling::sleep(tid, frame.eax as i32);
    finish(frame, result, |()| 0);
}

pub fn get_ticks_int(frame: &mut TrapFrame) {
    frame.set_return(scheduling::get_ticks() as isize);
}

// ---- Memory -----------------------------------------------------------------

pub fn new_pages_int(pid: Pid, tid: Tid, mem: &mut impl PhysicalMemory, frames: &mut FrameAllocator, frame: &mut TrapFrame) {
    let result = (|| {
        let pd = page_directory_for(pid)?;
        let packet = read_packet(mem, pd, frame.eax, 2)?;
        super::memory::new_pages(tid, pid, mem, frames, packet[0], packet[1])
    })();
    finish(frame, result, |()| 0);
}

pub fn remove_pages_int(pid: Pid, tid: Tid, mem: &mut impl PhysicalMemory, frames: &mut FrameAllocator, frame: &mut TrapFrame) {
    let result = super::memory::remove_pages(tid, pid, mem, frames, frame.eax);
    finish(frame, result, |()| 0);
}

// ---- Console and keyboard -----------------------------------------------

/// Only one thread may be in `readline`/`getchar` at a time (spec §4.5); this mutex
/// is that serialization point, scoped to this module since it exists purely to
/// order trap entries, not to protect any data the `console` module itself owns.
/// `Mutex` (not `SpinLock`) on purpose: it parks a contending thread on the scheduler
/// instead of spinning with interrupts off, so holding it across the retry loop below
/// doesn't itself reintroduce the deadlock [`try_readline`]'s doc comment describes.
static CONSOLE_ACCESS: crate::sync::Mutex<()> = crate::sync::Mutex::new(());

/// Acquire `readline`/`getchar`'s serialization point. Exposed so the bare-metal
/// caller can hold it across its whole retry loop — every attempt inside that loop
/// still only locks `bootstrap::MACHINE` briefly, never for the loop's full duration.
pub fn console_access(tid: Tid) -> crate::sync::MutexGuard<'static, ()> {
    CONSOLE_ACCESS.lock(tid)
}

/// Decode `readline`'s packet (spec §4.5: `len`, `buf`) once, up front — the decoded
/// `(len, buf_va)` pair is reused by every [`try_readline`] attempt that follows.
pub fn readline_packet(pid: Pid, mem: &impl PhysicalMemory, frame: &TrapFrame) -> KernelResult<(u32, u32)> {
    let pd = page_directory_for(pid)?;
    let packet = read_packet(mem, pd, frame.eax, 2)?;
    Ok((packet[0], packet[1]))
}

/// One non-blocking `readline` attempt (spec §4.5): drain whatever the keyboard ring
/// currently holds into `staging`, committing to user space only once a full line is
/// ready. `Ok(None)` means "not ready yet" — the caller must retry after dropping
/// whatever lock guards `mem`/`keyboard`/`console_dev` and giving some other interrupt
/// a chance to run first. Holding a lock that disables interrupts (`bootstrap::
/// MACHINE`'s `SpinLock`, on bare metal) across that retry would mask the very
/// keyboard IRQ the wait depends on and hang the machine forever — this function only
/// ever represents a single attempt for exactly that reason.
pub fn try_readline(
    pid: Pid,
    mem: &mut impl PhysicalMemory,
    len: u32,
    buf_va: u32,
    keyboard: &impl KeyboardSource,
    console_dev: &impl ConsoleDevice,
    staging: &mut Vec<u8>,
) -> KernelResult<Option<u32>> {
    console::readline(pid, mem, buf_va, len, keyboard, console_dev, staging)
}

/// One non-blocking `getchar` attempt (spec §4.5). See [`try_readline`]'s doc comment
/// for why this never loops or deschedules internally.
pub fn try_getchar(keyboard: &impl KeyboardSource) -> KernelResult<u8> {
    console::getchar(keyboard)
}

pub fn print_int(pid: Pid, mem: &impl PhysicalMemory, console_dev: &impl ConsoleDevice, frame: &mut TrapFrame) {
    let result = (|| {
        let pd = page_directory_for(pid)?;
        let packet = read_packet(mem, pd, frame.eax, 2)?;
        console::print(pid, mem, packet[1], packet[0], console_dev)
    })();
    finish(frame, result, |()| 0);
}

pub fn set_term_color_int(console_dev: &impl ConsoleDevice, frame: &mut TrapFrame) {
    let foreground = (frame.eax & 0xff) as u8;
    let background = ((frame.eax >> 8) & 0xff) as u8;
    let result = console::set_term_color(foreground, background, console_dev);
    finish(frame, result, |()| 0);
}

pub fn set_cursor_pos_int(pid: Pid, mem: &impl PhysicalMemory, console_dev: &impl ConsoleDevice, frame: &mut TrapFrame) {
    let result = (|| {
        let pd = page_directory_for(pid)?;
        let packet = read_packet(mem, pd, frame.eax, 2)?;
        console::set_cursor_pos(packet[0] as usize, packet[1] as usize, console_dev)
    })();
    finish(frame, result, |()| 0);
}

pub fn get_cursor_pos_int(
    pid: Pid,
    mem: &mut impl PhysicalMemory,
    console_dev: &impl ConsoleDevice,
    frame: &mut TrapFrame,
) {
    let result = (|| {
        let pd = page_directory_for(pid)?;
        let (row, col) = console::get_cursor_pos(console_dev);
        copy_to_user(mem, pd, frame.eax, &(row as u32).to_ne_bytes())?;
        copy_to_user(mem, pd, frame.eax + 4, &(col as u32).to_ne_bytes())
    })();
    finish(frame, result, |()| 0);
}

// ---- Filesystem -----------------------------------------------------------

pub fn readfile_int(pid: Pid, mem: &mut impl PhysicalMemory, catalogue: &impl ExecCatalogue, frame: &mut TrapFrame) {
    let result = (|| {
        let pd = page_directory_for(pid)?;
        let packet = read_packet(mem, pd, frame.eax, 4)?;
        fs_syscall::readfile(pid, mem, packet[0], packet[1], packet[2], packet[3], catalogue)
    })();
    finish(frame, result, |n| n as isize);
}

// ---- Software exceptions ---------------------------------------------------

/// `swexn(stack*, handler*, arg*, ureg*)`: like [`exec_int`], a validated non-null
/// `ureg*` jumps directly to the resumed context and never returns through `frame`
/// (original `kern_swexn`: "jmp_ureg(newureg)... return -2" is unreachable in
/// practice). A registration/deregistration-only call (`ureg* == NULL`) returns
/// normally with `0` or a negative errno.
pub fn swexn_int(
    pid: Pid,
    tid: Tid,
    mem: &mut impl PhysicalMemory,
    frame: &mut TrapFrame,
) -> Option<crate::arch::active::context::Regs> {
    let result = (|| {
        let pd = page_directory_for(pid)?;
        let packet = read_packet(mem, pd, frame.eax, 4)?;
        let resuming = packet[3] != 0;
        let regs = swexn_syscall::swexn(pid, tid, mem, packet[0], packet[1], packet[2], packet[3])?;
        Ok((resuming, regs))
    })();
    match result {
        Ok((true, regs)) => Some(regs),
        Ok((false, _)) => {
            frame.set_return(0);
            None
        }
        Err(err) => {
            frame.set_return(err.to_syscall_errno());
            None
        }
    }
}

// ---- Debug/lifecycle glue ---------------------------------------------------

/// `halt()`: never returns (spec §6).
pub fn halt_int() -> ! {
    debug::halt()
}

pub fn task_vanish_int(pid: Pid, mem: &mut impl PhysicalMemory, frames: &mut FrameAllocator, frame: &mut TrapFrame) {
    let status = frame.eax as i32;
    let _ = debug::task_vanish(pid, status, mem, frames);
}

pub fn misbehave_int(frame: &mut TrapFrame) {
    debug::misbehave(frame.eax as i32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PAGE_SIZE, USER_MEM_START};
    use crate::fs::BootCatalogue;
    use crate::mm::phys_mem::SimPhysicalMemory;

    const TOTAL_FRAMES: u32 = (USER_MEM_START / PAGE_SIZE) as u32 + 32;

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
            vas.new_pages(&mut mem, &mut frames, base, PAGE_SIZE as u32 * 2, true).unwrap();
            table::checkin_address_space(pid, vas);
        }
        (mem, frames, pid, tid, base)
    }

    #[test]
    fn gettid_writes_the_callers_tid() {
        let (_mem, _frames, _pid, tid, _base) = fresh_process();
        let mut frame = TrapFrame::default();
        gettid_int(tid, &mut frame);
        assert_eq!(frame.eax, tid.0);
    }

    #[test]
    fn set_status_then_get_ticks_round_trip_through_trapframes() {
        let (_mem, _frames, pid, _tid, _base) = fresh_process();
        let mut frame = TrapFrame::default();
        frame.eax = 7u32;
        set_status_int(pid, &mut frame);
        assert_eq!(frame.eax, 0);

        let mut frame = TrapFrame::default();
        get_ticks_int(&mut frame);
        assert_eq!(frame.eax as u64, scheduling::get_ticks());
    }

    #[test]
    fn new_pages_then_remove_pages_through_the_packet_convention() {
        let (mut mem, mut frames, pid, tid, base) = fresh_process();
        let packet_va = base + PAGE_SIZE as u32;
        let region_base = base + PAGE_SIZE as u32 * 4;
        copy_to_user(&mut mem, table::page_directory(pid).unwrap(), packet_va, &region_base.to_ne_bytes()).unwrap();
        copy_to_user(
            &mut mem,
            table::page_directory(pid).unwrap(),
            packet_va + 4,
            &(PAGE_SIZE as u32).to_ne_bytes(),
        )
        .unwrap();

        let mut frame = TrapFrame { eax: packet_va };
        new_pages_int(pid, tid, &mut mem, &mut frames, &mut frame);
        assert_eq!(frame.eax, 0);

        let mut frame = TrapFrame { eax: region_base };
        remove_pages_int(pid, tid, &mut mem, &mut frames, &mut frame);
        assert_eq!(frame.eax, 0);
    }

    #[test]
    fn readfile_int_reports_not_found_as_a_negative_errno() {
        let (mut mem, _frames, pid, _tid, base) = fresh_process();
        let pd = table::page_directory(pid).unwrap();
        let name_va = base;
        let packet_va = base + PAGE_SIZE as u32;
        copy_to_user(&mut mem, pd, name_va, b"nope\0").unwrap();
        copy_to_user(&mut mem, pd, packet_va, &name_va.to_ne_bytes()).unwrap();
        copy_to_user(&mut mem, pd, packet_va + 4, &0u32.to_ne_bytes()).unwrap();
        copy_to_user(&mut mem, pd, packet_va + 8, &10u32.to_ne_bytes()).unwrap();
        copy_to_user(&mut mem, pd, packet_va + 12, &0u32.to_ne_bytes()).unwrap();

        static ENTRIES: &[(&str, &[u8])] = &[];
        let catalogue = BootCatalogue::new(ENTRIES);
        let mut frame = TrapFrame { eax: packet_va };
        readfile_int(pid, &mut mem, &catalogue, &mut frame);
        assert_eq!(frame.eax as i32, KernelError::NotFound.to_syscall_errno() as i32);
    }

    #[test]
    fn misbehave_int_records_the_mode() {
        let mut frame = TrapFrame { eax: 3 };
        misbehave_int(&mut frame);
        assert_eq!(debug::current_misbehave_mode(), 3);
        debug::misbehave(0);
    }
}
