//! `swexn(stack, entry, arg, newureg)` (spec §4.6), the thin syscall-surface wrapper
//! around `exception::swexn`'s registration/delivery/resume machinery. This module
//! owns exactly one thing beyond that: deciding, from the four raw pointer arguments,
//! whether the caller is registering a new handler, resuming a faulted context, both,
//! or neither (a bare deregistration).

use crate::error::{KernelError, KernelResult};
use crate::exception::swexn;
use crate::mm::PhysicalMemory;
use crate::process::ids::{Pid, Tid};
use crate::process::table;

/// A `0` value for `stack`/`entry` means "no new registration"; for `newureg` it means
/// "don't resume a prior context" (spec §4.6: "all four arguments may independently be
/// absent, signaled by a null pointer").
pub fn swexn(
    pid: Pid,
    tid: Tid,
    mem: &mut impl PhysicalMemory,
    stack_va: u32,
    entry_va: u32,
    arg: u32,
    newureg_va: u32,
) -> KernelResult<crate::arch::active::context::Regs> {
    let pd = table::page_directory(pid)?;

    if stack_va == 0 || entry_va == 0 {
        // Either pointer null deregisters (original `kern_swexn`: "esp3 == NULL ||
        // eip == NULL" removes the handler rather than rejecting the call).
        table::with_thread_mut(tid, |thread| thread.clear_swexn()).ok_or(KernelError::NotFound)?;
    } else {
        let mem_ref = &*mem;
        let registered = table::with_thread_mut(tid, |thread| {
            swexn::register_with_arg(thread, mem_ref, pd, stack_va, entry_va, arg)
        })
        .ok_or(KernelError::NotFound)?;
        registered?;
    }

    if newureg_va != 0 {
        let mem_ref = &*mem;
        let resumed = table::with_thread_mut(tid, |thread| swexn::resume(thread, mem_ref, pd, newureg_va))
            .ok_or(KernelError::NotFound)?;
        return resumed;
    }

    Ok(table::thread_regs(tid).unwrap_or_default())
}

/// Deliver a fault to `tid`'s registered handler, or report that none is registered
/// (spec §4.6 step 1: the fault path kills the thread when this returns
/// `LifecycleViolation`). Called from the fault-handling path, never directly by a
/// syscall dispatch.
pub fn deliver_fault(
    pid: Pid,
    tid: Tid,
    mem: &mut impl PhysicalMemory,
    cause: u32,
    cr2: u32,
) -> KernelResult<crate::arch::active::context::Regs> {
    let pd = table::page_directory(pid)?;
    table::with_thread_mut(tid, |thread| swexn::deliver(thread, mem, pd, cause, cr2))
        .ok_or(KernelError::NotFound)?
}
