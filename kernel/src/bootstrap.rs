//! Boot sequence and the single entry point every trap/interrupt trampoline in
//! `arch::x86::syscall_entry` calls into.
//!
//! Two layers live here. The top half (`spawn_named`, `build_entry_regs`,
//! `init_world`, `reap_step`) is ordinary, host-testable logic: given a
//! [`PhysicalMemory`]/[`FrameAllocator`]/[`ExecCatalogue`] it builds a process the same
//! way `syscall::process::exec` does, so the same code spawns `init`/`idle` at boot and
//! is exercised directly by integration tests with [`crate::mm::phys_mem::SimPhysicalMemory`].
//! The bottom half (`boot`, `handle_trap`, `handle_fault`, `timer_tick`, `keyboard_tick`,
//! `abandon_and_resume_next`, `switch_to_next`) is the bare-metal-only glue that owns the
//! one [`Machine`] this kernel ever runs against and turns a raw vector number into the
//! matching `syscall::dispatch` call.

use crate::error::{KernelError, KernelResult};
use crate::fs::ExecCatalogue;
use crate::mm::{FrameAllocator, PhysicalMemory};
use crate::process::ids::{Pid, Tid};
use crate::process::kstack;
use crate::process::table;
use crate::sched::scheduler;
use crate::syscall::process as process_syscall;

use crate::arch::active::context::Regs;

#[cfg(all(target_arch = "x86", target_os = "none"))]
use crate::arch::active::context::{self, TrapFrame};
#[cfg(all(target_arch = "x86", target_os = "none"))]
use crate::arch::active::cr;
#[cfg(all(target_arch = "x86", target_os = "none"))]
use crate::arch::x86::intrinsics;
#[cfg(all(target_arch = "x86", target_os = "none"))]
use crate::arch::x86::{idt, keyboard, pic, pit, segments, syscall_entry};
#[cfg(all(target_arch = "x86", target_os = "none"))]
use crate::fs::BootCatalogue;
#[cfg(all(target_arch = "x86", target_os = "none"))]
use crate::mm::phys_mem::DirectMappedPhysicalMemory;
#[cfg(all(target_arch = "x86", target_os = "none"))]
use crate::sync::SpinLock;
#[cfg(all(target_arch = "x86", target_os = "none"))]
use crate::syscall::console;
#[cfg(all(target_arch = "x86", target_os = "none"))]
use crate::syscall::dispatch;
#[cfg(all(target_arch = "x86", target_os = "none"))]
use crate::syscall::swexn as swexn_syscall;
#[cfg(all(target_arch = "x86", target_os = "none"))]
use crate::sched::DeschedKind;
#[cfg(all(target_arch = "x86", target_os = "none"))]
use alloc::vec::Vec;

// ---- Boot catalogue -------------------------------------------------------------

/// Build the one placeholder `SimpleElf` image both `idle` and `init` boot from until a
/// real loader feeds this crate actual userland binaries: a 12-word header (spec §6's
/// `simple_elf_t` layout, see `syscall::process::parse_elf`) naming a single 4-byte
/// `.text` segment, entry at its very first byte.
///
/// The 4 bytes are `jmp $-2; nop; nop` — a tight infinite loop, not `hlt`, since `hlt`
/// is a ring-0-only instruction and would fault the moment either thread actually ran.
const fn build_placeholder_image() -> [u8; 52] {
    let entry = crate::config::USER_MEM_START as u32;
    let mut image = [0u8; 52];
    write_word(&mut image, 0, entry); // entry
    write_word(&mut image, 1, 48); // text.file_offset
    write_word(&mut image, 2, 4); // text.len
    write_word(&mut image, 3, entry); // text.start
    // words 4..=11 (rodata, data, bss) are left zero: no such segments.
    image[48] = 0xEB; // jmp $-2
    image[49] = 0xFE;
    image[50] = 0x90; // nop
    image[51] = 0x90; // nop
    image
}

const fn write_word(image: &mut [u8; 52], word_index: usize, value: u32) {
    let bytes = value.to_le_bytes();
    let o = word_index * 4;
    image[o] = bytes[0];
    image[o + 1] = bytes[1];
    image[o + 2] = bytes[2];
    image[o + 3] = bytes[3];
}

static PLACEHOLDER_IMAGE: [u8; 52] = build_placeholder_image();

/// Not cfg-gated to bare metal: [`crate::fs::BootCatalogue`] is a plain generic type,
/// so host-side integration tests can exercise `spawn_named`/`init_world` against this
/// same table without booting hardware.
static CATALOGUE_ENTRIES: &[(&str, &[u8])] = &[("idle", &PLACEHOLDER_IMAGE), ("init", &PLACEHOLDER_IMAGE)];

#[cfg(all(target_arch = "x86", target_os = "none"))]
static CATALOGUE: BootCatalogue<'static> = BootCatalogue::new(CATALOGUE_ENTRIES);

// ---- Generic, host-testable spawn helpers ----------------------------------------

/// Spawn a process from `name` in `catalogue`, the same `exec_by_name` path
/// `syscall::process::exec` uses, but for a process that has no parent and no running
/// caller to trap back into — `bootstrap`'s own use at boot, and any host test that
/// wants a real first process.
pub fn spawn_named(
    mem: &mut impl PhysicalMemory,
    frames: &mut FrameAllocator,
    catalogue: &impl ExecCatalogue,
    name: &str,
) -> KernelResult<(Pid, Tid)> {
    let kernel_stack_top = kstack::alloc()?;
    let (pid, tid) = match table::new_process(None, mem, frames, kernel_stack_top, Regs::default()) {
        Ok(ids) => ids,
        Err(err) => {
            kstack::free(kernel_stack_top);
            return Err(err);
        }
    };
    let user_regs = match process_syscall::exec_by_name(pid, mem, frames, name, catalogue) {
        Ok(regs) => regs,
        Err(err) => {
            // `new_process` already registered this tid with the scheduler; undo that
            // properly instead of just freeing the kernel stack out from under it.
            let _ = table::thread_kill(tid, mem, frames);
            return Err(err);
        }
    };
    let cr3 = table::page_directory(pid)?.phys_addr();
    let entry_regs = build_entry_regs(user_regs.eip, user_regs.esp, kernel_stack_top, cr3);
    table::with_thread_mut(tid, |t| t.regs = entry_regs).ok_or(KernelError::NotFound)?;
    Ok((pid, tid))
}

/// Build the `Regs` a freshly spawned thread's TCB starts with, so its first
/// `context::resume` lands in user mode at `eip`/`user_esp` without any special-casing
/// in the reschedule path (see [`Regs::fresh`]'s doc comment on the bare-metal target).
#[cfg(all(target_arch = "x86", target_os = "none"))]
fn build_entry_regs(eip: u32, user_esp: u32, kernel_stack_top: u32, cr3: u32) -> Regs {
    // SAFETY: `kernel_stack_top` was allocated by `spawn_named` immediately above and
    // is not yet visible to any other thread.
    unsafe { Regs::fresh(eip, user_esp, kernel_stack_top, cr3) }
}

/// The host target's `Regs::fresh` has a different shape (no fake switch frame, no
/// `user_esp`/`kernel_stack_top` split — see `arch::host_stub::context::Regs::fresh`),
/// since the host never actually resumes into one of these. Build the record directly
/// instead of reaching for a function that doesn't mean the same thing here.
#[cfg(not(all(target_arch = "x86", target_os = "none")))]
fn build_entry_regs(eip: u32, user_esp: u32, _kernel_stack_top: u32, cr3: u32) -> Regs {
    Regs { eip, esp: user_esp, cr3, ..Regs::default() }
}

/// Spawn the system's first two processes: `init` (so it claims `process::table`'s
/// "first call becomes init" slot) and `idle`, then register the latter with the
/// scheduler as its idle fallback.
pub fn init_world(
    mem: &mut impl PhysicalMemory,
    frames: &mut FrameAllocator,
    catalogue: &impl ExecCatalogue,
) -> KernelResult<(Pid, Tid)> {
    let (init_pid, init_tid) = spawn_named(mem, frames, catalogue, "init")?;
    let (_idle_pid, idle_tid) = spawn_named(mem, frames, catalogue, "idle")?;
    scheduler::set_idle(idle_tid);
    Ok((init_pid, init_tid))
}

/// One step of the thread-reaper's loop: reclaim one vanished thread's kernel stack, if
/// any are waiting. Returns whether anything was reaped, so a caller can loop until
/// idle.
pub fn reap_step() -> bool {
    match table::next_to_reap() {
        Some((_tid, kernel_stack_base)) => {
            if kernel_stack_base != 0 {
                kstack::free(kernel_stack_base);
            }
            true
        }
        None => false,
    }
}

// ---- Bare-metal machine state -----------------------------------------------------

/// Every piece of hardware-backed state this kernel touches, gathered into one
/// lock-protected aggregate rather than a scattering of individual `lazy_static`s
/// (spec §9's guidance on exposing global hardware state explicitly) — `mem` and
/// `frames` in particular must stay behind the same lock, since a syscall validating a
/// user pointer and the frame allocator backing it are never meaningfully separable.
#[cfg(all(target_arch = "x86", target_os = "none"))]
struct Machine {
    mem: DirectMappedPhysicalMemory,
    frames: FrameAllocator,
    catalogue: BootCatalogue<'static>,
    console: console::Vga,
    keyboard: console::Ps2Keyboard,
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
static MACHINE: SpinLock<Option<Machine>> = SpinLock::new(None);

// ---- Reschedule plumbing ----------------------------------------------------------

/// Give up the CPU for good (the calling thread has vanished or halted) and resume
/// whatever the scheduler picks next. Never returns.
#[cfg(all(target_arch = "x86", target_os = "none"))]
fn abandon_and_resume_next() -> ! {
    let next_tid = scheduler::yield_to(None).expect("ready queue and idle both empty");
    let next_regs = table::thread_regs(next_tid).expect("scheduled tid has no regs");
    let kernel_stack_top = table::kernel_stack_base(next_tid).expect("scheduled tid has no kernel stack");
    segments::set_kernel_stack(kernel_stack_top);
    // SAFETY: `next_regs` is either a suspended thread's saved context or a fresh
    // `Regs::fresh` fake frame, both valid `resume` targets; `next_tid`'s kernel stack
    // was just installed as `esp0` above.
    unsafe { context::resume(&next_regs) }
}

/// Context-switch from `prev_tid` to `next_tid`, persisting `prev_tid`'s saved state
/// back into its TCB once control returns here (some later switch names `prev_tid` as
/// its own `next`).
#[cfg(all(target_arch = "x86", target_os = "none"))]
fn switch_to_next(prev_tid: Tid, next_tid: Tid) {
    let next_regs = table::thread_regs(next_tid).expect("scheduled tid has no regs");
    let kernel_stack_top = table::kernel_stack_base(next_tid).expect("scheduled tid has no kernel stack");
    segments::set_kernel_stack(kernel_stack_top);
    let mut prev_regs = table::thread_regs(prev_tid).expect("current thread has no regs");
    // SAFETY: `prev_regs` belongs to the thread currently executing on this stack;
    // `next_regs`/`next_tid` were just validated above.
    unsafe { scheduler::resume::switch_to(&mut prev_regs, &next_regs, next_tid) };
    table::with_thread_mut(prev_tid, |t| t.regs = prev_regs);
}

// ---- Trap/interrupt handlers -------------------------------------------------------

/// Called by every `syscall_trampoline_for!` trampoline in `arch::x86::syscall_entry`
/// with the vector it was installed at and the trapping thread's `eax`. Decodes the
/// vector, calls the matching `syscall::dispatch` entry point, and returns the value to
/// write back into `eax` — except `EXEC_VECTOR`/`SWEXN_VECTOR`, `HALT_VECTOR`, and
/// `VANISH_VECTOR`/`TASK_VANISH_VECTOR`, none of which ever return to their trampoline
/// (spec §6: "exec/swexn (on resume)/halt/vanish/task_vanish do not return").
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub unsafe extern "C" fn handle_trap(vector: u32, eax: u32) -> u32 {
    let tid = scheduler::current().expect("syscall trap with no current thread");
    let pid = table::thread_pid(tid).expect("current thread has no process");
    let mut frame = TrapFrame { eax };

    let mut guard = MACHINE.lock();
    let machine = guard.as_mut().expect("machine not initialized");

    match vector as u8 {
        idt::FORK_VECTOR => dispatch::fork_int(pid, tid, &mut machine.mem, &mut machine.frames, &mut frame),
        idt::EXEC_VECTOR => {
            if let Some(regs) = dispatch::exec_int(pid, &mut machine.mem, &mut machine.frames, &machine.catalogue, &mut frame) {
                drop(guard);
                // SAFETY: `regs` is a fully built entry context for this same thread,
                // returned by a successful `exec`.
                unsafe {
                    cr::set_cr3(regs.cr3);
                    context::enter_user_mode(regs.eip, regs.esp)
                }
            }
        }
        idt::WAIT_VECTOR => dispatch::wait_int(pid, tid, &mut machine.mem, &mut frame),
        idt::SET_STATUS_VECTOR => dispatch::set_status_int(pid, &mut frame),
        idt::VANISH_VECTOR => {
            dispatch::vanish_int(tid, &mut machine.mem, &mut machine.frames);
            drop(guard);
            abandon_and_resume_next();
        }
        idt::GETTID_VECTOR => dispatch::gettid_int(tid, &mut frame),
        idt::YIELD_VECTOR => dispatch::yield_int(&mut frame),
        idt::DESCHEDULE_VECTOR => {
            // Phase 1 (reading the flag) is the only part that needs `machine.mem`;
            // phase 2 (possibly calling into `scheduler::deschedule`) must not run
            // while `guard` is held, since `MACHINE`'s `SpinLock` disables interrupts
            // for its entire scope and a descheduled thread's resumption can depend on
            // one (the same hazard `READLINE_VECTOR`/`GETCHAR_VECTOR` avoid below).
            let flag_result = dispatch::deschedule_flag(pid, &machine.mem, frame.eax);
            drop(guard);
            dispatch::finish_deschedule(tid, flag_result, &mut frame);
        }
        idt::MAKE_RUNNABLE_VECTOR => dispatch::make_runnable_int(&mut frame),
        idt::SLEEP_VECTOR => {
            // `sleep_int` never touches `machine` at all; drop the guard before
            // calling into `scheduler::sleep_until` for the same reason as above.
            drop(guard);
            dispatch::sleep_int(tid, &mut frame);
        }
        idt::GET_TICKS_VECTOR => dispatch::get_ticks_int(&mut frame),
        idt::NEW_PAGES_VECTOR => dispatch::new_pages_int(pid, tid, &mut machine.mem, &mut machine.frames, &mut frame),
        idt::REMOVE_PAGES_VECTOR => dispatch::remove_pages_int(pid, tid, &mut machine.mem, &mut machine.frames, &mut frame),
        idt::READLINE_VECTOR => {
            drop(guard);
            readline_blocking(pid, tid, &mut frame);
        }
        idt::GETCHAR_VECTOR => {
            drop(guard);
            getchar_blocking(tid, &mut frame);
        }
        idt::PRINT_VECTOR => dispatch::print_int(pid, &machine.mem, &machine.console, &mut frame),
        idt::SET_TERM_COLOR_VECTOR => dispatch::set_term_color_int(&machine.console, &mut frame),
        idt::SET_CURSOR_POS_VECTOR => dispatch::set_cursor_pos_int(pid, &machine.mem, &machine.console, &mut frame),
        idt::GET_CURSOR_POS_VECTOR => dispatch::get_cursor_pos_int(pid, &mut machine.mem, &machine.console, &mut frame),
        idt::THREAD_FORK_VECTOR => dispatch::thread_fork_int(pid, tid, &mut frame),
        idt::READFILE_VECTOR => dispatch::readfile_int(pid, &mut machine.mem, &machine.catalogue, &mut frame),
        idt::SWEXN_VECTOR => {
            if let Some(regs) = dispatch::swexn_int(pid, tid, &mut machine.mem, &mut frame) {
                drop(guard);
                // SAFETY: see the `EXEC_VECTOR` arm above; `swexn_int` only returns
                // `Some` for a caller-requested resume into a validated `newureg`.
                unsafe {
                    cr::set_cr3(regs.cr3);
                    context::enter_user_mode(regs.eip, regs.esp)
                }
            }
        }
        idt::MISBEHAVE_VECTOR => dispatch::misbehave_int(&mut frame),
        idt::HALT_VECTOR => {
            drop(guard);
            dispatch::halt_int();
        }
        idt::TASK_VANISH_VECTOR => {
            dispatch::task_vanish_int(pid, &mut machine.mem, &mut machine.frames, &mut frame);
            drop(guard);
            abandon_and_resume_next();
        }
        _ => frame.set_return(KernelError::InvalidArgument.to_syscall_errno()),
    }

    frame.eax
}

/// Drive `readline` to completion one non-blocking attempt at a time (spec §4.5),
/// never holding `MACHINE`'s guard across the wait between attempts.
///
/// `MACHINE` is a `SpinLock`, which masks interrupts for its entire hold (see
/// `sync::spinlock`'s doc comment) — if this loop kept it locked the way the rest of
/// `handle_trap`'s arms do, the keyboard IRQ this wait depends on could never fire,
/// and every other thread's very next syscall would hang forever on `MACHINE.lock()`
/// behind a thread that itself can only be woken by the IRQ its own lock is blocking.
/// Re-acquiring the lock fresh on each attempt, and dropping it again before
/// descheduling, keeps every hold short the way `sync::spinlock`'s "short critical
/// sections only" contract requires.
#[cfg(all(target_arch = "x86", target_os = "none"))]
fn readline_blocking(pid: Pid, tid: Tid, frame: &mut TrapFrame) {
    let _console_access = dispatch::console_access(tid);

    let (len, buf_va) = {
        let guard = MACHINE.lock();
        let machine = guard.as_ref().expect("machine not initialized");
        match dispatch::readline_packet(pid, &machine.mem, frame) {
            Ok(pair) => pair,
            Err(err) => {
                frame.set_return(err.to_syscall_errno());
                return;
            }
        }
    };

    let mut staging = Vec::new();
    loop {
        let mut guard = MACHINE.lock();
        let machine = guard.as_mut().expect("machine not initialized");
        let outcome = dispatch::try_readline(pid, &mut machine.mem, len, buf_va, &machine.keyboard, &machine.console, &mut staging);
        drop(guard);
        match outcome {
            Ok(Some(n)) => {
                frame.set_return(n as isize);
                return;
            }
            Ok(None) => {
                scheduler::deschedule(tid, DeschedKind::Kernel);
                core::hint::spin_loop();
            }
            Err(err) => {
                frame.set_return(err.to_syscall_errno());
                return;
            }
        }
    }
}

/// Drive `getchar` to completion one non-blocking attempt at a time. See
/// [`readline_blocking`]'s doc comment for why `MACHINE` is never held across the wait.
#[cfg(all(target_arch = "x86", target_os = "none"))]
fn getchar_blocking(tid: Tid, frame: &mut TrapFrame) {
    let _console_access = dispatch::console_access(tid);
    loop {
        let guard = MACHINE.lock();
        let machine = guard.as_ref().expect("machine not initialized");
        let outcome = dispatch::try_getchar(&machine.keyboard);
        drop(guard);
        match outcome {
            Ok(byte) => {
                frame.set_return(byte as isize);
                return;
            }
            Err(KernelError::WouldBlock) => {
                scheduler::deschedule(tid, DeschedKind::Kernel);
                core::hint::spin_loop();
            }
            Err(err) => {
                frame.set_return(err.to_syscall_errno());
                return;
            }
        }
    }
}

/// Called by every `fault_trampoline_*!` trampoline with the CPU exception vector and
/// its error code (`0` for vectors that don't push one). Delivers to the faulting
/// thread's registered `swexn` handler if it has one, otherwise kills it. Never returns
/// to its trampoline — either a handler resumes the thread or a different one replaces
/// it entirely.
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub unsafe extern "C" fn handle_fault(vector: u32, error_code: u32) -> ! {
    let _ = error_code;
    let tid = scheduler::current().expect("fault with no current thread");
    let pid = table::thread_pid(tid).expect("current thread has no process");
    // SAFETY: reading cr2 has no side effects; only meaningful for a page fault, but
    // harmless to read unconditionally.
    let cr2 = unsafe { cr::get_cr2() };

    let mut guard = MACHINE.lock();
    let machine = guard.as_mut().expect("machine not initialized");
    let result = swexn_syscall::deliver_fault(pid, tid, &mut machine.mem, vector, cr2);
    match result {
        Ok(regs) => {
            drop(guard);
            // SAFETY: `regs` is the handler's own entry context, delivered for this
            // same thread.
            unsafe {
                cr::set_cr3(regs.cr3);
                context::enter_user_mode(regs.eip, regs.esp)
            }
        }
        Err(_) => {
            let _ = table::thread_kill(tid, &mut machine.mem, &mut machine.frames);
            drop(guard);
            abandon_and_resume_next();
        }
    }
}

/// Timer IRQ handler: advance the clock and switch to whatever the scheduler rotates
/// to, if that differs from the thread that was just interrupted.
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub unsafe extern "C" fn timer_tick() {
    // SAFETY: called only from `syscall_entry::timer_entry`'s trampoline.
    unsafe { pic::acknowledge(0) };
    let prev_tid = scheduler::current();
    let next_tid = scheduler::tick();
    if let (Some(prev_tid), Some(next_tid)) = (prev_tid, next_tid) {
        if prev_tid != next_tid {
            switch_to_next(prev_tid, next_tid);
        }
    }
}

/// Keyboard IRQ handler: never reschedules, so `eax` passes straight through (see
/// `arch::x86::syscall_entry::keyboard_entry`'s doc comment).
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub unsafe extern "C" fn keyboard_tick(eax: u32) -> u32 {
    // SAFETY: called only from `syscall_entry::keyboard_entry`'s trampoline.
    unsafe { pic::acknowledge(1) };
    keyboard::handle_interrupt();
    eax
}

// ---- Boot ---------------------------------------------------------------------

/// Install every gate this kernel relies on: one DPL-3 trap gate per syscall vector,
/// one DPL-0 interrupt gate per CPU exception, and the timer/keyboard IRQ gates.
///
/// # Safety
/// Must run exactly once, before [`idt::load`].
#[cfg(all(target_arch = "x86", target_os = "none"))]
unsafe fn install_idt() {
    macro_rules! syscall_gate {
        ($vector:expr, $entry:path) => {
            // SAFETY: forwarded to this function's own contract.
            unsafe { idt::set_syscall_gate($vector, $entry as usize as u32) }
        };
    }
    macro_rules! interrupt_gate {
        ($vector:expr, $entry:path) => {
            // SAFETY: forwarded to this function's own contract.
            unsafe { idt::set_interrupt_gate($vector, $entry as usize as u32) }
        };
    }

    syscall_gate!(idt::FORK_VECTOR, syscall_entry::fork_entry);
    syscall_gate!(idt::EXEC_VECTOR, syscall_entry::exec_entry);
    syscall_gate!(idt::WAIT_VECTOR, syscall_entry::wait_entry);
    syscall_gate!(idt::YIELD_VECTOR, syscall_entry::yield_entry);
    syscall_gate!(idt::DESCHEDULE_VECTOR, syscall_entry::deschedule_entry);
    syscall_gate!(idt::MAKE_RUNNABLE_VECTOR, syscall_entry::make_runnable_entry);
    syscall_gate!(idt::GETTID_VECTOR, syscall_entry::gettid_entry);
    syscall_gate!(idt::NEW_PAGES_VECTOR, syscall_entry::new_pages_entry);
    syscall_gate!(idt::REMOVE_PAGES_VECTOR, syscall_entry::remove_pages_entry);
    syscall_gate!(idt::SLEEP_VECTOR, syscall_entry::sleep_entry);
    syscall_gate!(idt::READLINE_VECTOR, syscall_entry::readline_entry);
    syscall_gate!(idt::PRINT_VECTOR, syscall_entry::print_entry);
    syscall_gate!(idt::SET_TERM_COLOR_VECTOR, syscall_entry::set_term_color_entry);
    syscall_gate!(idt::SET_CURSOR_POS_VECTOR, syscall_entry::set_cursor_pos_entry);
    syscall_gate!(idt::GET_CURSOR_POS_VECTOR, syscall_entry::get_cursor_pos_entry);
    syscall_gate!(idt::THREAD_FORK_VECTOR, syscall_entry::thread_fork_entry);
    syscall_gate!(idt::GET_TICKS_VECTOR, syscall_entry::get_ticks_entry);
    syscall_gate!(idt::MISBEHAVE_VECTOR, syscall_entry::misbehave_entry);
    syscall_gate!(idt::HALT_VECTOR, syscall_entry::halt_entry);
    syscall_gate!(idt::SET_STATUS_VECTOR, syscall_entry::set_status_entry);
    syscall_gate!(idt::VANISH_VECTOR, syscall_entry::vanish_entry);
    syscall_gate!(idt::READFILE_VECTOR, syscall_entry::readfile_entry);
    syscall_gate!(idt::SWEXN_VECTOR, syscall_entry::swexn_entry);
    syscall_gate!(idt::GETCHAR_VECTOR, syscall_entry::getchar_entry);
    syscall_gate!(idt::TASK_VANISH_VECTOR, syscall_entry::task_vanish_entry);

    interrupt_gate!(idt::EXN_DIVIDE, syscall_entry::divide_entry);
    interrupt_gate!(idt::EXN_DEBUG, syscall_entry::debug_entry);
    interrupt_gate!(idt::EXN_BREAKPOINT, syscall_entry::breakpoint_entry);
    interrupt_gate!(idt::EXN_OVERFLOW, syscall_entry::overflow_entry);
    interrupt_gate!(idt::EXN_BOUNDCHECK, syscall_entry::boundcheck_entry);
    interrupt_gate!(idt::EXN_OPCODE, syscall_entry::opcode_entry);
    interrupt_gate!(idt::EXN_NOFPU, syscall_entry::nofpu_entry);
    interrupt_gate!(idt::EXN_SEGFAULT, syscall_entry::segfault_entry);
    interrupt_gate!(idt::EXN_STACKFAULT, syscall_entry::stackfault_entry);
    interrupt_gate!(idt::EXN_PROTFAULT, syscall_entry::protfault_entry);
    interrupt_gate!(idt::EXN_PAGEFAULT, syscall_entry::pagefault_entry);
    interrupt_gate!(idt::EXN_FPUFAULT, syscall_entry::fpufault_entry);

    interrupt_gate!(idt::TIMER_VECTOR, syscall_entry::timer_entry);
    interrupt_gate!(idt::KEYBOARD_VECTOR, syscall_entry::keyboard_entry);
}

/// Kernel entry point (called from `main.rs` once the heap is initialized): bring up
/// the GDT/TSS, IDT, PIC, and PIT, build the one [`Machine`] this kernel runs against,
/// spawn `init`/`idle`, and hand off to the scheduler. Never returns.
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub fn boot() -> ! {
    crate::logging::init();
    log::info!("pebbles_kernel booting");

    // SAFETY: boot-time, single-threaded, run exactly once before any ring-3
    // transition or interrupt delivery.
    unsafe {
        segments::init();
        install_idt();
        idt::load();
        // IRQ0-7 land on TIMER_VECTOR..+8, IRQ8-15 on the next 8 vectors (see
        // `pic::init`'s doc comment), so the slave offset is `TIMER_VECTOR + 8`, not
        // `KEYBOARD_VECTOR` (which only names IRQ1's vector on the master).
        pic::init(idt::TIMER_VECTOR, idt::TIMER_VECTOR + 8);
        pit::init(crate::config::TIMER_HZ);
    }

    // SAFETY: `TOTAL_PHYS_FRAMES` bounds the direct-mapped kernel window this boot
    // configuration provides, and this is the only handle ever constructed over it.
    let mut mem = unsafe { DirectMappedPhysicalMemory::new(crate::config::TOTAL_PHYS_FRAMES as usize) };
    let mut frames = FrameAllocator::new(crate::config::TOTAL_PHYS_FRAMES);

    init_world(&mut mem, &mut frames, &CATALOGUE).expect("failed to spawn init/idle");

    *MACHINE.lock() = Some(Machine {
        mem,
        frames,
        catalogue: BootCatalogue::new(CATALOGUE_ENTRIES),
        console: console::Vga,
        keyboard: console::Ps2Keyboard,
    });

    // SAFETY: every gate is installed, the PIC is remapped and masked to just the
    // timer/keyboard lines, and `MACHINE` is populated — it is now safe to take
    // interrupts.
    unsafe { intrinsics::enable_interrupts() };

    abandon_and_resume_next();
}
