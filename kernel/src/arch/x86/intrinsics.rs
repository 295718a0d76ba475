//! Atomic exchange and interrupt masking — the two L0 primitives every synchronization
//! type in `sync` is eventually built from.

use core::arch::asm;
use core::sync::atomic::{AtomicU32, Ordering};

/// Atomically store `new` into `word` and return the previous value (the `xchg`
/// instruction is implicitly locked on x86, so no explicit `lock` prefix is needed).
///
/// This is the test-and-set primitive `sync::spinlock::SpinLock` is built on.
#[inline]
pub fn atomic_xchg(word: &AtomicU32, new: u32) -> u32 {
    word.swap(new, Ordering::AcqRel)
}

/// Disable maskable interrupts (`cli`).
///
/// # Safety
/// Must be paired with [`enable_interrupts`] or [`restore_interrupts`]; leaving
/// interrupts permanently masked stalls the timer tick and keyboard IRQ.
#[inline]
pub unsafe fn disable_interrupts() {
    // SAFETY: cli has no memory effects the compiler needs to know about.
    unsafe { asm!("cli", options(nomem, nostack, preserves_flags)) }
}

/// Enable maskable interrupts (`sti`).
///
/// # Safety
/// Must only be called when the kernel's internal invariants (e.g. a spinlock held
/// across the masked region) have already been restored.
#[inline]
pub unsafe fn enable_interrupts() {
    // SAFETY: sti has no memory effects the compiler needs to know about.
    unsafe { asm!("sti", options(nomem, nostack, preserves_flags)) }
}

/// Read whether the interrupt flag is currently set, via `pushf`/`pop`.
#[inline]
pub fn interrupts_enabled() -> bool {
    let flags: u32;
    // SAFETY: pushf/pop only touch the stack and a general register.
    unsafe {
        asm!("pushfd", "pop {}", out(reg) flags, options(nomem, preserves_flags));
    }
    flags & (1 << 9) != 0
}

/// Disable interrupts and return whether they were enabled beforehand, so the caller
/// can restore exactly that state later via [`restore_interrupts`]. Unlike
/// [`without_interrupts`], the masked region need not be lexically scoped — this is
/// what `sync::spinlock::SpinLock`'s guard uses, since the region it protects spans
/// from `lock()` to the guard's `Drop`.
#[inline]
pub fn disable_and_save() -> bool {
    let was_enabled = interrupts_enabled();
    if was_enabled {
        // SAFETY: pairs with `restore_interrupts` at the matching guard's `Drop`.
        unsafe { disable_interrupts() };
    }
    was_enabled
}

/// Restore the interrupt state captured by [`disable_and_save`].
///
/// # Safety
/// Must be called at most once per `disable_and_save` call, after every invariant the
/// masked region protected has been restored.
#[inline]
pub unsafe fn restore_interrupts(was_enabled: bool) {
    if was_enabled {
        // SAFETY: caller contract above.
        unsafe { enable_interrupts() };
    }
}

/// Halt the CPU until the next interrupt (`hlt`). `syscall::debug::halt`'s idle loop
/// calls this in a `loop`, same as the scheduler's idle thread — each wake is just the
/// timer tick, which re-checks the loop condition and halts again.
#[inline]
pub fn halt() {
    // SAFETY: hlt has no memory effects the compiler needs to know about; it simply
    // suspends the core until the next unmasked interrupt.
    unsafe { asm!("hlt", options(nomem, nostack, preserves_flags)) }
}

/// Run `f` with interrupts disabled, restoring the caller's original interrupt state
/// on return (including on an early return via `?`, since this is a plain function
/// call, not an asm block the compiler could reorder around).
#[inline]
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let was_enabled = interrupts_enabled();
    if was_enabled {
        // SAFETY: pairs with the restore below.
        unsafe { disable_interrupts() };
    }
    let result = f();
    if was_enabled {
        // SAFETY: restores the interrupt state observed on entry, per this
        // function's contract.
        unsafe { enable_interrupts() };
    }
    result
}
