//! Thread control block (spec §3 "Thread (TCB)"), grounded in
//! `original_source/p3/kern/inc/thread.h`.
//!
//! The TCB does *not* carry its own ready/sleep-list node or a "kernel vs. user
//! deschedule" flag the way the original's intrusive struct does — those live in
//! [`crate::sched::scheduler`]'s own side tables instead, keyed by [`Tid`], so the
//! process layer and the scheduler stay decoupled (a TCB never needs to know which
//! queue it's on). This is a deliberate flattening, not a dropped field: the same fact
//! is recorded in exactly one place instead of two.

use crate::arch::active::context::Regs;
use crate::process::ids::{Pid, Tid};

/// A thread's one-shot software-exception registration (`swexn`, spec §4.6):
/// `{entry, stack, arg}`, named `SwexnHandler` to match
/// `original_source/p3/kern/inc/proc.h`'s `handler_t`.
#[derive(Debug, Clone, Copy)]
pub struct SwexnHandler {
    pub entry: u32,
    pub esp3: u32,
    pub arg: u32,
}

/// A faulting user register snapshot awaiting either an explicit `swexn(..., newureg)`
/// resume or a normal handler return (spec §4.6-added-detail). Kept as a per-thread
/// field rather than a second pid-keyed hashtable, since the teacher's own style folds
/// single-owner state straight into the owning struct (e.g. `swexn_handler` below).
#[derive(Debug, Clone, Copy)]
pub struct Ureg {
    pub cause: u32,
    pub cr2: u32,
    pub regs: Regs,
}

pub struct Thread {
    pub tid: Tid,
    pub pid: Pid,
    pub kernel_stack_base: u32,
    pub regs: Regs,
    pub swexn_handler: Option<SwexnHandler>,
    pub pending_ureg: Option<Ureg>,
}

impl Thread {
    pub fn new(tid: Tid, pid: Pid, kernel_stack_base: u32, regs: Regs) -> Self {
        Self {
            tid,
            pid,
            kernel_stack_base,
            regs,
            swexn_handler: None,
            pending_ureg: None,
        }
    }

    /// Register a one-shot handler, replacing any existing registration (spec §4.6:
    /// re-registration simply overwrites, it does not stack).
    pub fn register_swexn(&mut self, handler: SwexnHandler) {
        self.swexn_handler = Some(handler);
    }

    /// Consume the registration so a second, unhandled fault kills the thread instead
    /// of re-triggering the same handler (spec §4.6: "one-shot... the handler must
    /// re-register to receive another").
    pub fn take_swexn(&mut self) -> Option<SwexnHandler> {
        self.swexn_handler.take()
    }

    pub fn clear_swexn(&mut self) {
        self.swexn_handler = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swexn_registration_is_consumed_on_first_fault() {
        let mut thread = Thread::new(Tid(1), Pid(1), 0x1000, Regs::default());
        assert!(thread.take_swexn().is_none());
        thread.register_swexn(SwexnHandler {
            entry: 0x2000,
            esp3: 0x3000,
            arg: 0,
        });
        assert!(thread.take_swexn().is_some());
        // One-shot: a second fault with no re-registration finds nothing.
        assert!(thread.take_swexn().is_none());
    }
}
