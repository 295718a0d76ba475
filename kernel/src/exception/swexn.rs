//! One-shot software-exception registration, delivery, and resume (spec §4.6),
//! grounded in `original_source/p3/kern/exception.c`.
//!
//! The handler stack layout below `esp3` mirrors the original's cdecl call frame for
//! `void handler(void *arg, ureg_t *ureg)`: the `ureg_t` snapshot is written first (so
//! `ureg` points at stable memory below the frame the handler itself will push), then
//! the three words of a cdecl argument frame (`ureg` ptr, `arg`, a zero return address
//! the handler is never meant to execute past).

use crate::error::{KernelError, KernelResult};
use crate::mm::page_table;
use crate::mm::phys_mem::{FrameNumber, PhysicalMemory};
use crate::mm::vas::{validate_range, AccessRequirement};
use crate::process::thread::{SwexnHandler, Thread, Ureg};

/// Bytes in a serialized `Ureg`: `cause`, `cr2`, then the 9 `Regs` fields.
const UREG_WORDS: u32 = 2 + 9;
const UREG_BYTES: u32 = UREG_WORDS * 4;
/// `ureg` pointer, `arg`, zero return address.
const CALL_FRAME_WORDS: u32 = 3;
const CALL_FRAME_BYTES: u32 = CALL_FRAME_WORDS * 4;

/// Kernel-policy `eflags` bits a resumed `newureg` may never set (spec §4.6: "a user
/// cannot, e.g., clear the interrupt flag or elevate IOPL").
const EFLAGS_IF: u32 = 1 << 9;
const EFLAGS_IOPL: u32 = 0b11 << 12;

fn write_u32_to_user(
    mem: &mut impl PhysicalMemory,
    pd: FrameNumber,
    va: u32,
    value: u32,
) -> KernelResult<()> {
    let (frame, _) = page_table::translate(mem, pd, va).ok_or(KernelError::MemoryValidation)?;
    mem.write_u32(frame, (va as usize) % crate::config::PAGE_SIZE, value);
    Ok(())
}

fn read_u32_from_user(mem: &impl PhysicalMemory, pd: FrameNumber, va: u32) -> KernelResult<u32> {
    let (frame, _) = page_table::translate(mem, pd, va).ok_or(KernelError::MemoryValidation)?;
    Ok(mem.read_u32(frame, (va as usize) % crate::config::PAGE_SIZE))
}

/// `swexn(stack, entry, arg, newureg)` (spec §4.6), with `newureg` already split out as
/// [`resume`]. Registers `{entry, esp3, arg}`, replacing any prior registration —
/// re-registration is idempotent overwrite, not a stack.
pub fn register(
    thread: &mut Thread,
    mem: &impl PhysicalMemory,
    pd: FrameNumber,
    stack_top: u32,
    entry: u32,
) -> KernelResult<()> {
    validate_range(mem, pd, entry, 1, &AccessRequirement::read())?;
    // The handler stack must have room for the ureg snapshot and call frame this crate
    // writes into it on delivery.
    let needed = UREG_BYTES + CALL_FRAME_BYTES;
    let base = stack_top
        .checked_sub(needed)
        .ok_or(KernelError::MemoryValidation)?;
    validate_range(mem, pd, base, needed, &AccessRequirement::write())?;
    thread.register_swexn(SwexnHandler {
        entry,
        esp3: stack_top,
        arg: 0,
    });
    Ok(())
}

/// Register with an explicit `arg`, as the real syscall does; split from [`register`]
/// only so callers that don't care about `arg` (tests, `deliver`'s self-tests) can omit
/// it.
pub fn register_with_arg(
    thread: &mut Thread,
    mem: &impl PhysicalMemory,
    pd: FrameNumber,
    stack_top: u32,
    entry: u32,
    arg: u32,
) -> KernelResult<()> {
    register(thread, mem, pd, stack_top, entry)?;
    if let Some(h) = thread.swexn_handler.as_mut() {
        h.arg = arg;
    }
    Ok(())
}

/// Deliver a fault to the registered handler (spec §4.6 steps 1-4). Consumes the
/// registration (one-shot), writes the `ureg` snapshot and call frame onto the
/// handler's stack, and returns the `Regs` the thread should resume at — `eip =
/// entry`, `esp` pointing at the call frame. Returns `Err(LifecycleViolation)` if no
/// handler is registered, signaling the caller (the fault path) to kill the thread
/// instead.
pub fn deliver(
    thread: &mut Thread,
    mem: &mut impl PhysicalMemory,
    pd: FrameNumber,
    cause: u32,
    cr2: u32,
) -> KernelResult<crate::arch::active::context::Regs> {
    let handler = thread.take_swexn().ok_or(KernelError::LifecycleViolation)?;
    let faulting_regs = thread.regs;
    let ureg = Ureg {
        cause,
        cr2,
        regs: faulting_regs,
    };

    let ureg_base = handler.esp3 - UREG_BYTES;
    write_ureg(mem, pd, ureg_base, &ureg)?;

    let frame_base = ureg_base - CALL_FRAME_BYTES;
    write_u32_to_user(mem, pd, frame_base, 0)?; // return address: never executed
    write_u32_to_user(mem, pd, frame_base + 4, handler.arg)?;
    write_u32_to_user(mem, pd, frame_base + 8, ureg_base)?;

    thread.pending_ureg = Some(ureg);

    let mut resumed = faulting_regs;
    resumed.eip = handler.entry;
    resumed.esp = frame_base;
    Ok(resumed)
}

fn write_ureg(
    mem: &mut impl PhysicalMemory,
    pd: FrameNumber,
    base: u32,
    ureg: &Ureg,
) -> KernelResult<()> {
    write_u32_to_user(mem, pd, base, ureg.cause)?;
    write_u32_to_user(mem, pd, base + 4, ureg.cr2)?;
    let regs = &ureg.regs;
    let words = [
        regs.ebx, regs.esi, regs.edi, regs.esp, regs.ebp, regs.eip, regs.eflags, regs.cr2,
        regs.cr3,
    ];
    for (i, word) in words.iter().enumerate() {
        write_u32_to_user(mem, pd, base + 8 + (i as u32) * 4, *word)?;
    }
    Ok(())
}

/// `swexn(..., newureg)`'s resume half (spec §4.6): validate the pointer, read back
/// the register state the handler wants to iret to, and mask kernel-owned `eflags`
/// bits so a handler can't disable interrupts or elevate IOPL on resume.
pub fn resume(
    thread: &mut Thread,
    mem: &impl PhysicalMemory,
    pd: FrameNumber,
    newureg_va: u32,
) -> KernelResult<crate::arch::active::context::Regs> {
    validate_range(mem, pd, newureg_va, UREG_BYTES, &AccessRequirement::read())?;
    let _cause = read_u32_from_user(mem, pd, newureg_va)?;
    let _cr2 = read_u32_from_user(mem, pd, newureg_va + 4)?;
    let base = newureg_va + 8;
    let ebx = read_u32_from_user(mem, pd, base)?;
    let esi = read_u32_from_user(mem, pd, base + 4)?;
    let edi = read_u32_from_user(mem, pd, base + 8)?;
    let esp = read_u32_from_user(mem, pd, base + 12)?;
    let ebp = read_u32_from_user(mem, pd, base + 16)?;
    let eip = read_u32_from_user(mem, pd, base + 20)?;
    let mut eflags = read_u32_from_user(mem, pd, base + 24)?;
    let cr2 = read_u32_from_user(mem, pd, base + 28)?;
    let cr3 = read_u32_from_user(mem, pd, base + 32)?;

    eflags |= EFLAGS_IF;
    eflags &= !EFLAGS_IOPL;

    thread.pending_ureg = None;
    Ok(crate::arch::active::context::Regs {
        ebx,
        esi,
        edi,
        esp,
        ebp,
        eip,
        eflags,
        cr2,
        cr3,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PAGE_SIZE, USER_MEM_START};
    use crate::mm::frame_allocator::FrameAllocator;
    use crate::mm::phys_mem::SimPhysicalMemory;
    use crate::mm::vas::AddressSpace;
    use crate::process::ids::{Pid, Tid};

    const TOTAL_FRAMES: u32 = (USER_MEM_START / PAGE_SIZE) as u32 + 16;

    fn fresh() -> (SimPhysicalMemory, FrameAllocator, AddressSpace) {
        let mut mem = SimPhysicalMemory::new(TOTAL_FRAMES as usize);
        let mut frames = FrameAllocator::new(TOTAL_FRAMES);
        let vas = AddressSpace::new(&mut mem, &mut frames).unwrap();
        (mem, frames, vas)
    }

    fn map_region(
        vas: &mut AddressSpace,
        mem: &mut SimPhysicalMemory,
        frames: &mut FrameAllocator,
        base: u32,
        len: u32,
    ) {
        vas.new_pages(mem, frames, base, len, true).unwrap();
    }

    #[test]
    fn register_then_deliver_consumes_the_handler_and_points_at_entry() {
        let (mut mem, mut frames, mut vas) = fresh();
        let stack_base = USER_MEM_START as u32;
        let entry_base = stack_base + PAGE_SIZE as u32;
        map_region(&mut vas, &mut mem, &mut frames, stack_base, PAGE_SIZE as u32);
        map_region(&mut vas, &mut mem, &mut frames, entry_base, PAGE_SIZE as u32);

        let pd = vas.page_directory();
        let stack_top = stack_base + PAGE_SIZE as u32;
        let mut thread = Thread::new(Tid(1), Pid(1), 0x1000, crate::arch::active::context::Regs::default());

        register_with_arg(&mut thread, &mem, pd, stack_top, entry_base, 0xfeed).unwrap();
        assert!(thread.swexn_handler.is_some());

        let resumed = deliver(&mut thread, &mut mem, pd, 14, 0xbad_address).unwrap();
        assert_eq!(resumed.eip, entry_base);
        assert!(resumed.esp < stack_top);
        assert!(thread.swexn_handler.is_none(), "one-shot: registration consumed");
        assert!(thread.pending_ureg.is_some());

        // A second fault with no re-registration has nothing to deliver.
        assert_eq!(
            deliver(&mut thread, &mut mem, pd, 14, 0).unwrap_err(),
            KernelError::LifecycleViolation
        );
    }

    #[test]
    fn register_rejects_unmapped_stack_or_entry() {
        let (mem, _frames, vas) = fresh();
        let pd = vas.page_directory();
        let mut thread = Thread::new(Tid(1), Pid(1), 0x1000, crate::arch::active::context::Regs::default());
        let stack_top = USER_MEM_START as u32 + PAGE_SIZE as u32;
        assert_eq!(
            register(&mut thread, &mem, pd, stack_top, USER_MEM_START as u32).unwrap_err(),
            KernelError::MemoryValidation
        );
    }

    #[test]
    fn resume_masks_kernel_owned_eflags_bits() {
        let (mut mem, mut frames, mut vas) = fresh();
        let base = USER_MEM_START as u32;
        map_region(&mut vas, &mut mem, &mut frames, base, PAGE_SIZE as u32);
        let pd = vas.page_directory();

        let tampered = Ureg {
            cause: 0,
            cr2: 0,
            regs: crate::arch::active::context::Regs {
                eflags: 0, // attempts to clear IF and leave IOPL at 0, which is already masked
                ..crate::arch::active::context::Regs::default()
            },
        };
        write_ureg(&mut mem, pd, base, &tampered).unwrap();

        let mut thread = Thread::new(Tid(1), Pid(1), 0x1000, crate::arch::active::context::Regs::default());
        thread.pending_ureg = Some(tampered);
        let resumed = resume(&mut thread, &mem, pd, base).unwrap();
        assert_ne!(resumed.eflags & EFLAGS_IF, 0, "resume must force IF back on");
        assert_eq!(resumed.eflags & EFLAGS_IOPL, 0, "resume must clear IOPL");
        assert!(thread.pending_ureg.is_none());
    }
}
