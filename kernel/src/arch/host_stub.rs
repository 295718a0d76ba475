//! Host-target stand-in for `arch::x86`.
//!
//! `cargo test` runs on the development host (x86_64/aarch64/whatever), not on bare
//! i386. This module gives every layer above `arch` the same call surface
//! (`intrinsics::without_interrupts`, atomic exchange) backed by ordinary atomics
//! instead of real interrupt flags and control registers, so the scheduler/process/sync
//! logic can be unit-tested without booting real hardware — the approach the teacher's
//! own `lib.rs` takes when it lets host builds "delegate to the system allocator so
//! test code... compiles and runs".

pub mod intrinsics {
    use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    static INTERRUPTS_ENABLED: AtomicBool = AtomicBool::new(true);

    /// Host stand-in for reading `eflags.IF`.
    pub fn interrupts_enabled() -> bool {
        INTERRUPTS_ENABLED.load(Ordering::SeqCst)
    }

    /// Run `f` with the host's simulated interrupt flag cleared, mirroring
    /// `arch::x86::intrinsics::without_interrupts`'s save/restore contract.
    ///
    /// This only models the *nesting discipline* tests rely on (a primitive that
    /// disables interrupts across a critical section and restores the caller's prior
    /// state on exit) — it provides no real cross-thread exclusion, since the host has
    /// no single hardware interrupt flag to share. Tests that need exclusion use the
    /// `sync` primitives directly instead of relying on this alone.
    pub fn without_interrupts<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let was_enabled = INTERRUPTS_ENABLED.swap(false, Ordering::SeqCst);
        let result = f();
        if was_enabled {
            INTERRUPTS_ENABLED.store(true, Ordering::SeqCst);
        }
        result
    }

    /// Host stand-in for the locked `xchg` instruction — on every real target this is
    /// a single atomic swap, so the host can use the same primitive directly.
    pub fn atomic_xchg(word: &AtomicU32, new: u32) -> u32 {
        word.swap(new, Ordering::AcqRel)
    }

    /// Host stand-in for `arch::x86::intrinsics::disable_and_save`. See that
    /// function's doc comment — this is the non-lexical counterpart to
    /// `without_interrupts`, used by `SpinLock`'s guard.
    pub fn disable_and_save() -> bool {
        INTERRUPTS_ENABLED.swap(false, Ordering::SeqCst)
    }

    /// # Safety
    /// No real hardware effect on the host; kept `unsafe` to match
    /// `arch::x86::intrinsics::restore_interrupts`'s signature so `sync::spinlock`
    /// doesn't need a `cfg` split.
    pub unsafe fn restore_interrupts(was_enabled: bool) {
        if was_enabled {
            INTERRUPTS_ENABLED.store(true, Ordering::SeqCst);
        }
    }

    /// Host stand-in for `arch::x86::intrinsics::halt`. There is no real interrupt to
    /// wait for on the host, so this just yields the thread's timeslice back to the
    /// OS scheduler — callers that spin on this in a loop (`syscall::debug::halt`)
    /// are never exercised by host tests.
    pub fn halt() {
        core::hint::spin_loop();
    }
}

/// Host stand-in for `arch::x86::cr`: there is no real `cr3`/TLB on the host, so `mm`
/// tests track the "active address space" as plain host state instead of a hardware
/// register, letting `mm::vas` call the same `set_cr3`/`invalidate_page` surface the
/// bare-metal target uses.
pub mod cr {
    use core::sync::atomic::{AtomicU32, Ordering};

    static ACTIVE_CR3: AtomicU32 = AtomicU32::new(0);

    /// # Safety
    /// No real hardware effect on the host; kept `unsafe` to match the bare-metal
    /// signature so callers don't need a `cfg` split.
    pub unsafe fn set_cr3(pd_phys: u32) {
        ACTIVE_CR3.store(pd_phys, Ordering::SeqCst);
    }

    /// # Safety
    /// See [`set_cr3`].
    pub unsafe fn get_cr3() -> u32 {
        ACTIVE_CR3.load(Ordering::SeqCst)
    }

    /// # Safety
    /// See [`set_cr3`].
    pub unsafe fn invalidate_page(_va: u32) {}
}

/// Host stand-in for `arch::x86::context`: the `Regs` field layout is mirrored so
/// `process::thread::Tcb` can hold one uncfg'd, but there is no real stack to switch
/// into on the host, so `switch`/`enter_user_mode` are unreachable here — host tests
/// exercise the scheduler's and process table's data-structure transitions only, never
/// an actual suspend/resume (see `sched::scheduler::resume`, which is bare-metal-only).
pub mod context {
    #[repr(C)]
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Regs {
        pub ebx: u32,
        pub esi: u32,
        pub edi: u32,
        pub esp: u32,
        pub ebp: u32,
        pub eip: u32,
        pub eflags: u32,
        pub cr2: u32,
        pub cr3: u32,
    }

    impl Regs {
        pub fn fresh(entry: u32, kernel_stack_top: u32, cr3: u32) -> Self {
            const EFLAGS_IF: u32 = 1 << 9;
            Self {
                ebx: 0,
                esi: 0,
                edi: 0,
                esp: kernel_stack_top,
                ebp: 0,
                eip: entry,
                eflags: EFLAGS_IF,
                cr2: 0,
                cr3,
            }
        }
    }

    /// Host stand-in for `arch::x86::context::TrapFrame` — see that type's doc
    /// comment. Never produced by a real trap on the host; `syscall::dispatch`'s
    /// tests construct one directly to exercise the return-value convention.
    #[repr(C)]
    #[derive(Debug, Clone, Copy, Default)]
    pub struct TrapFrame {
        pub eax: u32,
    }

    impl TrapFrame {
        pub fn set_return(&mut self, value: isize) {
            self.eax = value as u32;
        }
    }
}
