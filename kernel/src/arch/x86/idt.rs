//! Interrupt Descriptor Table.
//!
//! Grounded in `original_source/p3/kern/idt.c` / `idt_install.c` / `interrupt.c`: one
//! DPL-3 trap gate *per system call* (`idt_add_desc(FORK_INT, fork_int, ...)`,
//! `idt_add_desc(EXEC_INT, exec_int, ...)`, ...) rather than a single shared
//! numbered-dispatch vector, one interrupt gate per CPU exception (divide error, page
//! fault, GPF, ...) feeding `exception::swexn`'s delivery path, and two interrupt gates
//! for the PIC-remapped timer and keyboard IRQs. Per the open question in spec §9, this
//! module is the canonical "idt install" — the teacher's tree had two competing copies;
//! this crate keeps exactly one, written against the `swexn`/exception-registering
//! calling convention.

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct GateAccess: u8 {
        const PRESENT = 1 << 7;
        const DPL_3 = 0b0110_0000;
        const INTERRUPT_GATE_32 = 0b0000_1110;
        const TRAP_GATE_32 = 0b0000_1111;
    }
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    access: u8,
    offset_high: u16,
}

impl IdtEntry {
    const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            zero: 0,
            access: 0,
            offset_high: 0,
        }
    }

    fn new(handler: u32, selector: u16, access: GateAccess) -> Self {
        Self {
            offset_low: (handler & 0xFFFF) as u16,
            selector,
            zero: 0,
            access: access.bits(),
            offset_high: (handler >> 16) as u16,
        }
    }
}

const IDT_ENTRIES: usize = 256;

/// One DPL-3 trap-gate vector per `syscall::dispatch` entry point (spec §6), assigned
/// starting at 0x40 the way the original assigns `FORK_INT`, `EXEC_INT`, ... as a
/// contiguous run above the CPU exception vectors and the PIC-remapped IRQs. Bootstrap
/// installs each one with [`set_syscall_gate`] pointing at its own naked trampoline that
/// builds a [`super::context::TrapFrame`] and calls the matching `*_int` function.
pub const FORK_VECTOR: u8 = 0x40;
pub const EXEC_VECTOR: u8 = 0x41;
pub const WAIT_VECTOR: u8 = 0x42;
pub const YIELD_VECTOR: u8 = 0x43;
pub const DESCHEDULE_VECTOR: u8 = 0x44;
pub const MAKE_RUNNABLE_VECTOR: u8 = 0x45;
pub const GETTID_VECTOR: u8 = 0x46;
pub const NEW_PAGES_VECTOR: u8 = 0x47;
pub const REMOVE_PAGES_VECTOR: u8 = 0x48;
pub const SLEEP_VECTOR: u8 = 0x49;
pub const READLINE_VECTOR: u8 = 0x4A;
pub const PRINT_VECTOR: u8 = 0x4B;
pub const SET_TERM_COLOR_VECTOR: u8 = 0x4C;
pub const SET_CURSOR_POS_VECTOR: u8 = 0x4D;
pub const GET_CURSOR_POS_VECTOR: u8 = 0x4E;
pub const THREAD_FORK_VECTOR: u8 = 0x4F;
pub const GET_TICKS_VECTOR: u8 = 0x50;
pub const MISBEHAVE_VECTOR: u8 = 0x51;
pub const HALT_VECTOR: u8 = 0x52;
pub const SET_STATUS_VECTOR: u8 = 0x53;
pub const VANISH_VECTOR: u8 = 0x54;
pub const READFILE_VECTOR: u8 = 0x55;
pub const SWEXN_VECTOR: u8 = 0x56;
pub const GETCHAR_VECTOR: u8 = 0x57;
pub const TASK_VANISH_VECTOR: u8 = 0x58;

/// CPU exception vectors that feed `exception::swexn`'s delivery path (spec §4.6); the
/// vector number doubles as the `cause` code `Ureg::cause` carries, matching the
/// original's `SWEXN_CAUSE_*` constants being literal IDT vector numbers.
pub const EXN_DIVIDE: u8 = 0x00;
pub const EXN_DEBUG: u8 = 0x01;
pub const EXN_BREAKPOINT: u8 = 0x03;
pub const EXN_OVERFLOW: u8 = 0x04;
pub const EXN_BOUNDCHECK: u8 = 0x05;
pub const EXN_OPCODE: u8 = 0x06;
pub const EXN_NOFPU: u8 = 0x07;
pub const EXN_SEGFAULT: u8 = 0x0B;
pub const EXN_STACKFAULT: u8 = 0x0C;
pub const EXN_PROTFAULT: u8 = 0x0D;
pub const EXN_PAGEFAULT: u8 = 0x0E;
pub const EXN_FPUFAULT: u8 = 0x10;

/// Timer IRQ vector after PIC remapping.
pub const TIMER_VECTOR: u8 = 0x20;
/// Keyboard IRQ vector after PIC remapping.
pub const KEYBOARD_VECTOR: u8 = 0x21;

static mut IDT: [IdtEntry; IDT_ENTRIES] = [IdtEntry::missing(); IDT_ENTRIES];

#[repr(C, packed)]
struct DescriptorTablePointer {
    limit: u16,
    base: u32,
}

/// Install a handler at `vector` as a DPL-0 interrupt gate (used for CPU exceptions and
/// device IRQs, which always arrive from a context that should keep interrupts masked
/// until the handler explicitly re-enables them).
///
/// # Safety
/// `handler` must be the address of a function using the `x86-interrupt` calling
/// convention (or equivalent naked-function prologue) matching what the CPU pushes for
/// this vector (an error code is pushed for some exceptions but not others).
pub unsafe fn set_interrupt_gate(vector: u8, handler: u32) {
    let access = GateAccess::PRESENT | GateAccess::INTERRUPT_GATE_32;
    // SAFETY: single-threaded boot-time table write, not yet loaded via `lidt`.
    unsafe {
        IDT[vector as usize] = IdtEntry::new(handler, super::segments::kernel_code_selector(), access);
    }
}

/// Install a handler at `vector` as a DPL-3 trap gate — callable via `int $vector`
/// directly from ring 3, which is exactly the syscall entry point's requirement.
///
/// # Safety
/// Same contract as [`set_interrupt_gate`].
pub unsafe fn set_syscall_gate(vector: u8, handler: u32) {
    let access = GateAccess::PRESENT | GateAccess::DPL_3 | GateAccess::TRAP_GATE_32;
    // SAFETY: single-threaded boot-time table write, not yet loaded via `lidt`.
    unsafe {
        IDT[vector as usize] = IdtEntry::new(handler, super::segments::kernel_code_selector(), access);
    }
}

/// Load the IDT with `lidt`.
///
/// # Safety
/// Every vector this kernel relies on must already be installed via
/// [`set_interrupt_gate`]/[`set_syscall_gate`] before this runs.
pub unsafe fn load() {
    let pointer = DescriptorTablePointer {
        limit: (core::mem::size_of_val(&IDT) - 1) as u16,
        // SAFETY: taking the address of a static for `lidt`, not dereferencing it.
        base: unsafe { core::ptr::addr_of!(IDT) as u32 },
    };
    // SAFETY: `pointer` describes the table built above.
    unsafe {
        core::arch::asm!("lidt [{0}]", in(reg) &pointer, options(nostack));
    }
}
