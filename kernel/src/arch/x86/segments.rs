//! GDT and TSS construction.
//!
//! The teacher's `gdt.rs` builds its GDT/TSS through the `x86_64` crate's high-level
//! `GlobalDescriptorTable`/`TaskStateSegment` builders, which only exist for 64-bit
//! descriptors. On i386 this crate builds the eight-byte segment descriptors and the
//! 104-byte TSS by hand, the way every 32-bit teaching kernel (including the original
//! `410kern`) does, but keeps the teacher's shape: a `lazy_static` table of selectors,
//! an `init()` entry point, and typed selector accessors for the user segments.

use lazy_static::lazy_static;
use spin::Mutex;

/// One flat 4 GiB segment descriptor, plus the one populated TSS descriptor.
const GDT_ENTRIES: usize = 6;

const KERNEL_CODE_SELECTOR: u16 = 1 << 3;
const KERNEL_DATA_SELECTOR: u16 = 2 << 3;
const USER_CODE_SELECTOR: u16 = (3 << 3) | 3;
const USER_DATA_SELECTOR: u16 = (4 << 3) | 3;
const TSS_SELECTOR: u16 = 5 << 3;

/// A 32-bit flat Task State Segment. Only the fields this kernel actually uses
/// (`esp0`/`ss0` for ring transitions, `iomap_base` to disable the IO bitmap check) are
/// given names; the rest is padding matching the hardware layout.
#[repr(C, packed)]
struct TaskStateSegment {
    link: u16,
    _link_hi: u16,
    esp0: u32,
    ss0: u16,
    _ss0_hi: u16,
    esp1: u32,
    ss1: u16,
    _ss1_hi: u16,
    esp2: u32,
    ss2: u16,
    _ss2_hi: u16,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u16,
    _es_hi: u16,
    cs: u16,
    _cs_hi: u16,
    ss: u16,
    _ss_hi: u16,
    ds: u16,
    _ds_hi: u16,
    fs: u16,
    _fs_hi: u16,
    gs: u16,
    _gs_hi: u16,
    ldt: u16,
    _ldt_hi: u16,
    trap: u16,
    iomap_base: u16,
}

impl TaskStateSegment {
    const fn new() -> Self {
        Self {
            link: 0,
            _link_hi: 0,
            esp0: 0,
            ss0: KERNEL_DATA_SELECTOR,
            _ss0_hi: 0,
            esp1: 0,
            ss1: 0,
            _ss1_hi: 0,
            esp2: 0,
            ss2: 0,
            _ss2_hi: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            _es_hi: 0,
            cs: 0,
            _cs_hi: 0,
            ss: 0,
            _ss_hi: 0,
            ds: 0,
            _ds_hi: 0,
            fs: 0,
            _fs_hi: 0,
            gs: 0,
            _gs_hi: 0,
            ldt: 0,
            _ldt_hi: 0,
            trap: 0,
            iomap_base: core::mem::size_of::<TaskStateSegment>() as u16,
        }
    }
}

lazy_static! {
    static ref TSS: Mutex<TaskStateSegment> = Mutex::new(TaskStateSegment::new());
}

/// Raw 8-byte GDT descriptor.
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct Descriptor(u64);

impl Descriptor {
    const fn null() -> Self {
        Self(0)
    }

    const fn flat_code(dpl: u8) -> Self {
        Self::flat(0b1001_1010 | ((dpl as u64) << 5))
    }

    const fn flat_data(dpl: u8) -> Self {
        Self::flat(0b1001_0010 | ((dpl as u64) << 5))
    }

    /// A flat (base 0, limit 4 GiB, 4 KiB granularity, 32-bit) segment with the given
    /// access byte.
    const fn flat(access: u64) -> Self {
        let limit_low = 0xFFFFu64;
        let flags_limit_hi = 0b1100_1111u64; // G=1, D/B=1, limit[19:16]=0xF
        Self(limit_low | (access << 40) | (flags_limit_hi << 48))
    }

    const fn tss(base: u32) -> Self {
        let limit = (core::mem::size_of::<TaskStateSegment>() - 1) as u64;
        let base = base as u64;
        let access = 0x89u64; // present, DPL=0, 32-bit TSS (available)
        Self(
            (limit & 0xFFFF)
                | ((base & 0xFFFFFF) << 16)
                | (access << 40)
                | (((limit >> 16) & 0xF) << 48)
                | (((base >> 24) & 0xFF) << 56),
        )
    }
}

#[repr(C)]
struct GdtTable([Descriptor; GDT_ENTRIES]);

static mut GDT: GdtTable = GdtTable([Descriptor::null(); GDT_ENTRIES]);

#[repr(C, packed)]
struct DescriptorTablePointer {
    limit: u16,
    base: u32,
}

/// Build the GDT, load it, reload the segment registers, and load the TSS selector.
///
/// # Safety
/// Must run exactly once at boot, before any ring-3 transition and before any other
/// code assumes the flat kernel/user segments are in place.
pub unsafe fn init() {
    // SAFETY: single-threaded boot-time initialization of a `static mut` table that
    // nothing else observes until `lgdt` below publishes it.
    unsafe {
        GDT.0[1] = Descriptor::flat_code(0);
        GDT.0[2] = Descriptor::flat_data(0);
        GDT.0[3] = Descriptor::flat_code(3);
        GDT.0[4] = Descriptor::flat_data(3);
        GDT.0[5] = Descriptor::tss(core::ptr::addr_of!(*TSS.lock()) as u32);

        let pointer = DescriptorTablePointer {
            limit: (core::mem::size_of::<GdtTable>() - 1) as u16,
            base: core::ptr::addr_of!(GDT) as u32,
        };

        core::arch::asm!(
            "lgdt [{0}]",
            "mov ax, {1:x}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov ss, ax",
            "push {2:e}",
            "lea eax, [1f]",
            "push eax",
            "retf",
            "1:",
            "ltr {3:x}",
            in(reg) &pointer,
            in(reg) KERNEL_DATA_SELECTOR,
            in(reg) KERNEL_CODE_SELECTOR as u32,
            in(reg) TSS_SELECTOR,
            out("eax") _,
            options(nostack),
        );
    }
}

/// Update the TSS's `esp0` field — the kernel stack pointer the CPU loads on every
/// ring-3 → ring-0 transition (interrupt, exception, or `int` trap gate). The
/// scheduler calls this on every context switch so the *next* trap from user mode
/// lands on the incoming thread's kernel stack.
pub fn set_kernel_stack(esp0: u32) {
    TSS.lock().esp0 = esp0;
}

/// The flat, ring-0 code segment selector — the selector every interrupt/trap gate
/// must run handlers in, regardless of which ring trapped.
pub const fn kernel_code_selector() -> u16 {
    KERNEL_CODE_SELECTOR
}

/// The flat, ring-3 code segment selector used when constructing an iret frame to
/// enter user mode.
pub const fn user_code_selector() -> u16 {
    USER_CODE_SELECTOR | 3
}

/// The flat, ring-3 data segment selector used when constructing an iret frame to
/// enter user mode.
pub const fn user_data_selector() -> u16 {
    USER_DATA_SELECTOR | 3
}
