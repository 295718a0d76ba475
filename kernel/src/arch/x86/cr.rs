//! Control-register access (`cr0`/`cr2`/`cr3`/`cr4`) and TLB invalidation.
//!
//! Grounded in `original_source/p3/410kern/x86/cr.h`: `cr3` holds the physical address
//! of the active page directory, `cr2` the faulting address on the last page fault,
//! `cr0`'s paging bit and `cr4`'s PGE bit are set once at `vm_init` and never touched
//! again by this crate.

use core::arch::asm;

bitflags::bitflags! {
    /// Bits of `cr0` this crate inspects or sets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cr0Flags: u32 {
        /// Paging enable.
        const PAGING = 1 << 31;
    }
}

bitflags::bitflags! {
    /// Bits of `cr4` this crate inspects or sets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cr4Flags: u32 {
        /// Page Global Enable — lets PTEs marked `global` survive a `cr3` reload.
        const PAGE_GLOBAL_ENABLE = 1 << 7;
    }
}

/// Read `cr0`.
///
/// # Safety
/// Reading a control register is always safe on x86; marked `unsafe` for symmetry with
/// the rest of this module's raw-register access and to flag call sites as arch-level.
#[inline]
pub unsafe fn get_cr0() -> u32 {
    let value: u32;
    // SAFETY: reading cr0 has no side effects.
    unsafe {
        asm!("mov {}, cr0", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Write `cr0`.
///
/// # Safety
/// The caller must ensure the new value leaves paging, protection, and FPU state
/// consistent with what the kernel currently assumes.
#[inline]
pub unsafe fn set_cr0(value: u32) {
    // SAFETY: caller contract above.
    unsafe {
        asm!("mov cr0, {}", in(reg) value, options(nomem, nostack, preserves_flags));
    }
}

/// Read `cr2` (the faulting linear address after a page fault).
///
/// # Safety
/// Always safe to read; `unsafe` for consistency with this module.
#[inline]
pub unsafe fn get_cr2() -> u32 {
    let value: u32;
    // SAFETY: reading cr2 has no side effects.
    unsafe {
        asm!("mov {}, cr2", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Read `cr3` (the physical address of the active page directory).
///
/// # Safety
/// Always safe to read; `unsafe` for consistency with this module.
#[inline]
pub unsafe fn get_cr3() -> u32 {
    let value: u32;
    // SAFETY: reading cr3 has no side effects.
    unsafe {
        asm!("mov {}, cr3", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Write `cr3`, switching the active page directory and flushing the non-global TLB.
///
/// # Safety
/// `pd_phys` must be the physical address of a valid page directory with the kernel
/// window correctly direct-mapped, or the very next instruction fetch may fault with
/// no handler able to run.
#[inline]
pub unsafe fn set_cr3(pd_phys: u32) {
    // SAFETY: caller contract above.
    unsafe {
        asm!("mov cr3, {}", in(reg) pd_phys, options(nostack, preserves_flags));
    }
}

/// Read `cr4`.
///
/// # Safety
/// Always safe to read; `unsafe` for consistency with this module.
#[inline]
pub unsafe fn get_cr4() -> u32 {
    let value: u32;
    // SAFETY: reading cr4 has no side effects.
    unsafe {
        asm!("mov {}, cr4", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Write `cr4`.
///
/// # Safety
/// The caller must ensure the new value is compatible with the CPU's supported
/// feature set and the kernel's current paging configuration.
#[inline]
pub unsafe fn set_cr4(value: u32) {
    // SAFETY: caller contract above.
    unsafe {
        asm!("mov cr4, {}", in(reg) value, options(nomem, nostack, preserves_flags));
    }
}

/// Invalidate the single TLB entry covering `va` (the `invlpg` instruction).
///
/// Used by `mm::vas::map`/`unmap` instead of a full `cr3` reload when the modified
/// mapping belongs to the currently active address space.
///
/// # Safety
/// `va` should be page-aligned; invalidating a stale mapping that is still relied on
/// elsewhere is a logic error, not a memory-safety one, but callers should hold the
/// address space's lock across this call to avoid racing a concurrent mapper.
#[inline]
pub unsafe fn invalidate_page(va: u32) {
    // SAFETY: invlpg only affects TLB state, never memory.
    unsafe {
        asm!("invlpg [{}]", in(reg) va, options(nostack, preserves_flags));
    }
}
