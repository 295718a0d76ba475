//! Naked trap/interrupt-gate trampolines.
//!
//! Every vector `idt::load`'s table points at lands here first. Each trampoline's job
//! is the minimum amount of assembly needed to hand control to ordinary Rust: save
//! whatever the CPU doesn't save for us, call into `bootstrap`, and (for vectors that
//! return to the interrupted context at all) undo exactly what was pushed before
//! `iretd`.
//!
//! Three shapes, matching the three ways a vector here ever resumes:
//!
//! - **Syscall trap gates** (`idt::FORK_VECTOR`..`idt::TASK_VANISH_VECTOR`): `eax` in,
//!   `eax` out, same thread, same stack — a `call` and a plain `iretd`. No GPRs beyond
//!   `eax` cross the syscall ABI (spec §6), so nothing else needs saving.
//! - **The timer IRQ**: may hand the CPU to a *different* thread's kernel stack
//!   (`bootstrap::timer_tick` -> `sched::scheduler::resume::switch_to` ->
//!   `context::switch`), so every GPR the interrupted thread was using must survive
//!   the round trip — `pushad`/`popad` around the call.
//! - **CPU exceptions**: `bootstrap::handle_fault` never returns to its trampoline (it
//!   always ends in `enter_user_mode`, whether resuming a registered handler or a
//!   completely different thread after killing this one), so these trampolines have
//!   no epilogue at all. Two variants, since the CPU pushes an error code before
//!   `eip` for some vectors and not others (Intel SDM Vol. 3A Table 6-1).
//!
//! The keyboard IRQ never reschedules (`keyboard::handle_interrupt` only records a
//! scancode), so it gets the same "just `eax`" shape as a syscall even though it isn't
//! one — `eax` is unused on the way in and restored unchanged on the way out.

use core::arch::naked_asm;

// The vector each trampoline was installed at is baked in as a constant pushed ahead
// of `eax`, so `handle_trap` can tell which call fired without the IDT itself
// carrying any per-vector Rust state.
macro_rules! syscall_trampoline_for {
    ($name:ident, $vector:path) => {
        #[unsafe(naked)]
        pub unsafe extern "C" fn $name() {
            naked_asm!(
                "push eax",
                "push {vector}",
                "call {handler}",
                "add esp, 8",
                "iretd",
                vector = const $vector,
                handler = sym crate::bootstrap::handle_trap,
            )
        }
    };
}

syscall_trampoline_for!(fork_entry, super::idt::FORK_VECTOR);
syscall_trampoline_for!(exec_entry, super::idt::EXEC_VECTOR);
syscall_trampoline_for!(wait_entry, super::idt::WAIT_VECTOR);
syscall_trampoline_for!(yield_entry, super::idt::YIELD_VECTOR);
syscall_trampoline_for!(deschedule_entry, super::idt::DESCHEDULE_VECTOR);
syscall_trampoline_for!(make_runnable_entry, super::idt::MAKE_RUNNABLE_VECTOR);
syscall_trampoline_for!(gettid_entry, super::idt::GETTID_VECTOR);
syscall_trampoline_for!(new_pages_entry, super::idt::NEW_PAGES_VECTOR);
syscall_trampoline_for!(remove_pages_entry, super::idt::REMOVE_PAGES_VECTOR);
syscall_trampoline_for!(sleep_entry, super::idt::SLEEP_VECTOR);
syscall_trampoline_for!(readline_entry, super::idt::READLINE_VECTOR);
syscall_trampoline_for!(print_entry, super::idt::PRINT_VECTOR);
syscall_trampoline_for!(set_term_color_entry, super::idt::SET_TERM_COLOR_VECTOR);
syscall_trampoline_for!(set_cursor_pos_entry, super::idt::SET_CURSOR_POS_VECTOR);
syscall_trampoline_for!(get_cursor_pos_entry, super::idt::GET_CURSOR_POS_VECTOR);
syscall_trampoline_for!(thread_fork_entry, super::idt::THREAD_FORK_VECTOR);
syscall_trampoline_for!(get_ticks_entry, super::idt::GET_TICKS_VECTOR);
syscall_trampoline_for!(misbehave_entry, super::idt::MISBEHAVE_VECTOR);
syscall_trampoline_for!(halt_entry, super::idt::HALT_VECTOR);
syscall_trampoline_for!(set_status_entry, super::idt::SET_STATUS_VECTOR);
syscall_trampoline_for!(vanish_entry, super::idt::VANISH_VECTOR);
syscall_trampoline_for!(readfile_entry, super::idt::READFILE_VECTOR);
syscall_trampoline_for!(swexn_entry, super::idt::SWEXN_VECTOR);
syscall_trampoline_for!(getchar_entry, super::idt::GETCHAR_VECTOR);
syscall_trampoline_for!(task_vanish_entry, super::idt::TASK_VANISH_VECTOR);

/// Timer IRQ (`idt::TIMER_VECTOR`): may switch to a different thread's kernel stack,
/// so every GPR the interrupted thread was using has to survive the round trip.
#[unsafe(naked)]
pub unsafe extern "C" fn timer_entry() {
    naked_asm!("pushad", "call {handler}", "popad", "iretd", handler = sym crate::bootstrap::timer_tick,)
}

/// Keyboard IRQ (`idt::KEYBOARD_VECTOR`): never reschedules, so no GPRs besides `eax`
/// need saving, and `eax` itself is restored unchanged — this is the same shape as a
/// syscall trampoline with a handler that happens to ignore its input and always
/// "return" the value it was given.
#[unsafe(naked)]
pub unsafe extern "C" fn keyboard_entry() {
    naked_asm!(
        "push eax",
        "call {handler}",
        "add esp, 4",
        "pop eax",
        "iretd",
        handler = sym crate::bootstrap::keyboard_tick,
    )
}

macro_rules! fault_trampoline_no_error_code {
    ($name:ident, $vector:path) => {
        #[unsafe(naked)]
        pub unsafe extern "C" fn $name() {
            naked_asm!(
                "push 0",
                "push {vector}",
                "call {handler}",
                vector = const $vector,
                handler = sym crate::bootstrap::handle_fault,
            )
        }
    };
}

macro_rules! fault_trampoline_with_error_code {
    ($name:ident, $vector:path) => {
        #[unsafe(naked)]
        pub unsafe extern "C" fn $name() {
            // The CPU already pushed the error code below `eip`; `handle_fault` reads
            // it straight off the stack via its second argument, cdecl-style.
            naked_asm!(
                "push {vector}",
                "call {handler}",
                vector = const $vector,
                handler = sym crate::bootstrap::handle_fault,
            )
        }
    };
}

fault_trampoline_no_error_code!(divide_entry, super::idt::EXN_DIVIDE);
fault_trampoline_no_error_code!(debug_entry, super::idt::EXN_DEBUG);
fault_trampoline_no_error_code!(breakpoint_entry, super::idt::EXN_BREAKPOINT);
fault_trampoline_no_error_code!(overflow_entry, super::idt::EXN_OVERFLOW);
fault_trampoline_no_error_code!(boundcheck_entry, super::idt::EXN_BOUNDCHECK);
fault_trampoline_no_error_code!(opcode_entry, super::idt::EXN_OPCODE);
fault_trampoline_no_error_code!(nofpu_entry, super::idt::EXN_NOFPU);
fault_trampoline_no_error_code!(fpufault_entry, super::idt::EXN_FPUFAULT);
fault_trampoline_with_error_code!(segfault_entry, super::idt::EXN_SEGFAULT);
fault_trampoline_with_error_code!(stackfault_entry, super::idt::EXN_STACKFAULT);
fault_trampoline_with_error_code!(protfault_entry, super::idt::EXN_PROTFAULT);
fault_trampoline_with_error_code!(pagefault_entry, super::idt::EXN_PAGEFAULT);
