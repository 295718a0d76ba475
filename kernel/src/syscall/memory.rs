//! `new_pages`/`remove_pages` (spec §4.1, §4.5), thin syscall-surface wrappers around
//! `mm::vas::AddressSpace`.

use crate::config::PAGE_SIZE;
use crate::error::{KernelError, KernelResult};
use crate::mm::{FrameAllocator, PhysicalMemory};
use crate::process::ids::{Pid, Tid};
use crate::process::table;

fn page_aligned(value: u32) -> bool {
    value % PAGE_SIZE as u32 == 0
}

/// `new_pages(base, len)`: `base` and `len` must be page-aligned and `len` non-zero
/// (spec §4.1 edge cases). Checks the caller's address space out from the table for
/// the duration, serialized against a concurrent `new_pages`/`remove_pages` on the
/// same process by `locks.new_pages`.
pub fn new_pages(
    tid: Tid,
    pid: Pid,
    mem: &mut impl PhysicalMemory,
    frames: &mut FrameAllocator,
    base: u32,
    len: u32,
) -> KernelResult<()> {
    if !page_aligned(base) || !page_aligned(len) || len == 0 {
        return Err(KernelError::InvalidArgument);
    }
    let locks = table::process_locks(pid)?;
    let _guard = locks.new_pages.lock(tid);
    let mut address_space = table::checkout_address_space(pid)?;
    let result = address_space.new_pages(mem, frames, base, len, true);
    table::checkin_address_space(pid, address_space);
    result
}

/// `remove_pages(base)`: `base` must exactly match a prior `new_pages` call (spec
/// §4.1 edge case: "a base not returned by `new_pages`... is rejected").
pub fn remove_pages(
    tid: Tid,
    pid: Pid,
    mem: &mut impl PhysicalMemory,
    frames: &mut FrameAllocator,
    base: u32,
) -> KernelResult<()> {
    if !page_aligned(base) {
        return Err(KernelError::InvalidArgument);
    }
    let locks = table::process_locks(pid)?;
    let _guard = locks.new_pages.lock(tid);
    let mut address_space = table::checkout_address_space(pid)?;
    let result = address_space.remove_pages(mem, frames, base, true);
    table::checkin_address_space(pid, address_space);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::USER_MEM_START;
    use crate::mm::phys_mem::SimPhysicalMemory;

    const TOTAL_FRAMES: u32 = (USER_MEM_START / PAGE_SIZE) as u32 + 32;

    fn fresh_backing() -> (SimPhysicalMemory, FrameAllocator) {
        (
            SimPhysicalMemory::new(TOTAL_FRAMES as usize),
            FrameAllocator::new(TOTAL_FRAMES),
        )
    }

    #[test]
    fn new_pages_then_remove_pages_round_trips() {
        let (mut mem, mut frames) = fresh_backing();
        let (pid, tid) = table::new_process(
            None,
            &mut mem,
            &mut frames,
            0x1000,
            crate::arch::active::context::Regs::default(),
        )
        .unwrap();
        let base = USER_MEM_START as u32 + 0x10_0000;
        new_pages(tid, pid, &mut mem, &mut frames, base, PAGE_SIZE as u32 * 2).unwrap();
        remove_pages(tid, pid, &mut mem, &mut frames, base).unwrap();
    }

    #[test]
    fn new_pages_rejects_unaligned_base() {
        let (mut mem, mut frames) = fresh_backing();
        let (pid, tid) = table::new_process(
            None,
            &mut mem,
            &mut frames,
            0x1000,
            crate::arch::active::context::Regs::default(),
        )
        .unwrap();
        let base = USER_MEM_START as u32 + 1;
        assert_eq!(
            new_pages(tid, pid, &mut mem, &mut frames, base, PAGE_SIZE as u32).unwrap_err(),
            KernelError::InvalidArgument
        );
    }
}
