//! `fork`/`thread_fork`/`exec`/`wait`/`set_status`/`vanish`/`gettid` (spec §4.5 "Life
//! cycle"), grounded in `original_source/p3/kern/fork.c` and
//! `original_source/p3/kern/proc.c`.
//!
//! `arch::active::context::Regs` only models the callee-saved context-switch frame
//! (spec-§3-grounded choice, see `process::thread`'s doc comment) — it carries no
//! syscall-return-value register. Placing `0` in the child's eax and the child's pid in
//! the parent's is therefore a dispatch/trampoline-level detail outside this module:
//! `fork` here just returns the new pid to its caller the same way every other syscall
//! wrapper returns its `KernelResult`, and the dispatch layer is the one outermost place
//! (spec §6, §7) where that value is written into a register at all.

use alloc::vec::Vec;

use crate::config::MAX_EXECNAME_LEN;
use crate::elf::SimpleElf;
use crate::error::{KernelError, KernelResult};
use crate::fs::ExecCatalogue;
use crate::mm::vas::{copy_from_user, validate_cstr};
use crate::mm::{AddressSpace, FrameAllocator, PhysicalMemory};
use crate::process::ids::{Pid, Tid};
use crate::process::kstack;
use crate::process::table;

use crate::arch::active::context::Regs;

/// `fork()` (spec §4.5 edge case: "a process with more than one live thread cannot
/// fork"). Deep-copies the caller's address space, allocates the child a fresh kernel
/// stack, and inserts it under `process::table` as a new PCB/TCB pair parented to the
/// caller. The child's `Regs` are a copy of the parent's — it resumes at the exact same
/// `eip`/`esp`, same as a real `fork` returning twice from one call site.
pub fn fork(
    parent_tid: Tid,
    parent_pid: Pid,
    mem: &mut impl PhysicalMemory,
    frames: &mut FrameAllocator,
) -> KernelResult<Pid> {
    if table::live_thread_count(parent_pid) != Some(1) {
        return Err(KernelError::LifecycleViolation);
    }
    let locks = table::process_locks(parent_pid)?;
    let _guard = locks.new_pages.lock(parent_tid);

    let parent_space = table::checkout_address_space(parent_pid)?;
    let clone_result = parent_space.clone_into(mem, frames);
    table::checkin_address_space(parent_pid, parent_space);
    let child_space = clone_result?;

    let parent_regs = table::thread_regs(parent_tid).ok_or(KernelError::NotFound)?;
    let child_stack = match kstack::alloc() {
        Ok(top) => top,
        Err(err) => {
            child_space.destroy(mem, frames);
            return Err(err);
        }
    };

    match table::fork_process(parent_pid, child_space, child_stack, parent_regs) {
        Ok((child_pid, _child_tid)) => Ok(child_pid),
        Err(err) => {
            kstack::free(child_stack);
            Err(err)
        }
    }
}

/// `thread_fork()` (spec §4.5): a new TCB sharing the caller's PCB and address space —
/// no memory is copied, unlike `fork`.
pub fn thread_fork(parent_tid: Tid, parent_pid: Pid) -> KernelResult<Tid> {
    let parent_regs = table::thread_regs(parent_tid).ok_or(KernelError::NotFound)?;
    let stack_top = kstack::alloc()?;
    match table::new_thread(parent_pid, stack_top, parent_regs) {
        Ok(tid) => Ok(tid),
        Err(err) => {
            kstack::free(stack_top);
            Err(err)
        }
    }
}

/// `exec(execname, argv)` (spec §4.5 edge case: "a process with more than one live
/// thread cannot exec"). Looks `execname` up in the boot/disk catalogue, validates the
/// loaded ELF, and replaces the caller's address space in place — the caller's pid and
/// parent linkage survive; only its memory and entry point change.
///
/// Argument marshaling (copying `argv`'s strings into the new stack) is intentionally
/// not modeled here: this crate's `Regs` has no user-stack-pointer-independent argument
/// area to write them into without also owning the loader's stack-layout convention,
/// which is `loader.c`/`bootstrap.rs` territory, not `syscall::process`'s.
pub fn exec(
    pid: Pid,
    mem: &mut impl PhysicalMemory,
    frames: &mut FrameAllocator,
    execname_va: u32,
    catalogue: &impl ExecCatalogue,
) -> KernelResult<Regs> {
    if table::live_thread_count(pid) != Some(1) {
        return Err(KernelError::LifecycleViolation);
    }
    let old_pd = table::page_directory(pid)?;
    let name_len = validate_cstr(mem, old_pd, execname_va, MAX_EXECNAME_LEN)?;
    let mut name_bytes = alloc::vec![0u8; name_len];
    copy_from_user(mem, old_pd, execname_va, &mut name_bytes)?;
    let name = core::str::from_utf8(&name_bytes).map_err(|_| KernelError::InvalidArgument)?;

    exec_by_name(pid, mem, frames, name, catalogue)
}

/// The shared body of [`exec`] and `bootstrap`'s first-process loading, split out so
/// the latter can load `init`/`idle` by their literal catalogue names without first
/// having to plant that name string somewhere in user memory just to satisfy a
/// user-pointer-validating entry point that doesn't apply to bootstrap's own calls.
pub(crate) fn exec_by_name(
    pid: Pid,
    mem: &mut impl PhysicalMemory,
    frames: &mut FrameAllocator,
    name: &str,
    catalogue: &impl ExecCatalogue,
) -> KernelResult<Regs> {
    let image = catalogue.lookup(name)?;
    let elf = parse_elf(&image)?;
    elf.validate()?;

    let mut new_space = AddressSpace::new(mem, frames)?;
    if let Err(err) = load_segments(&elf, &image, &mut new_space, mem, frames) {
        new_space.destroy(mem, frames);
        return Err(err);
    }
    let stack_base = crate::config::USER_STACK_TOP - crate::config::PAGE_SIZE as u32 + 1;
    if let Err(err) = new_space.new_pages(mem, frames, stack_base, crate::config::PAGE_SIZE as u32, false) {
        new_space.destroy(mem, frames);
        return Err(err);
    }

    let old_space = table::checkout_address_space(pid)?;
    old_space.destroy(mem, frames);
    table::checkin_address_space(pid, new_space);

    Ok(Regs {
        eip: elf.entry,
        esp: crate::config::USER_STACK_TOP,
        ..Regs::default()
    })
}

/// Parse the `simple_elf_t`-shaped header this crate's loader expects (spec §6: the
/// kernel trusts the catalogue's images are well-formed `SimpleElf` blobs, not raw ELF
/// files it must itself demangle — see `elf.rs`'s doc comment on scope).
fn parse_elf(image: &[u8]) -> KernelResult<SimpleElf> {
    const HEADER_WORDS: usize = 12;
    if image.len() < HEADER_WORDS * 4 {
        return Err(KernelError::InvalidArgument);
    }
    let word = |i: usize| -> u32 {
        let o = i * 4;
        u32::from_le_bytes([image[o], image[o + 1], image[o + 2], image[o + 3]])
    };
    Ok(SimpleElf {
        entry: word(0),
        text: crate::elf::Segment { file_offset: word(1), len: word(2), start: word(3) },
        rodata: crate::elf::Segment { file_offset: word(4), len: word(5), start: word(6) },
        data: crate::elf::Segment { file_offset: word(7), len: word(8), start: word(9) },
        bss_start: word(10),
        bss_len: word(11),
    })
}

/// Map each segment's pages directly via `AddressSpace::map` rather than
/// `new_pages` — a loaded image's segments are not user `new_pages` allocations (spec
/// §4.1's `remove_pages` must never touch them), so they are deliberately left out of
/// the `RegionMap`. Pages are mapped read-write long enough to copy the segment's file
/// bytes (or leave bss zeroed), then text/rodata are remapped read-only (spec §6:
/// "text/rodata read-only, data/bss writable").
fn load_segments(
    elf: &SimpleElf,
    image: &[u8],
    space: &mut AddressSpace,
    mem: &mut impl PhysicalMemory,
    frames: &mut FrameAllocator,
) -> KernelResult<()> {
    use crate::mm::page_table::{self, PageFlags};

    for seg in elf.segments() {
        let base_page_va = page_floor(seg.start);
        let page_count = page_span(seg.start, seg.len) / crate::config::PAGE_SIZE as u32;
        for p in 0..page_count {
            let va = base_page_va + p * crate::config::PAGE_SIZE as u32;
            let frame = frames.allocate(mem).map_err(KernelError::from)?;
            mem.zero_frame(frame);
            space.map(mem, frames, va, frame, PageFlags::user_rw(), false)?;
        }
        if let Some(file_offset) = seg.file_offset {
            let bytes = &image[file_offset as usize..(file_offset + seg.len) as usize];
            crate::mm::vas::copy_to_user(mem, space.page_directory(), seg.start, bytes)?;
        }
        if !seg.kind.writable() {
            for p in 0..page_count {
                let va = base_page_va + p * crate::config::PAGE_SIZE as u32;
                if let Some((frame, _)) = page_table::translate(mem, space.page_directory(), va) {
                    space.map(mem, frames, va, frame, PageFlags::user_ro(), false)?;
                }
            }
        }
    }
    Ok(())
}

fn page_floor(va: u32) -> u32 {
    va & !(crate::config::PAGE_SIZE as u32 - 1)
}

fn page_span(va: u32, len: u32) -> u32 {
    let end = va + len;
    let aligned_end = (end + crate::config::PAGE_SIZE as u32 - 1) & !(crate::config::PAGE_SIZE as u32 - 1);
    aligned_end - page_floor(va)
}

/// `wait(status_ptr)` (spec §4.5).
pub fn wait(pid: Pid, tid: Tid) -> KernelResult<(Pid, i32)> {
    table::wait_process(pid, tid)
}

/// `set_status(status)` (spec §4.5): recorded, not delivered anywhere, until the last
/// thread vanishes and the PCB zombifies.
pub fn set_status(pid: Pid, status: i32) -> KernelResult<()> {
    table::set_status(pid, status)
}

/// `vanish()` (spec §4.5): the calling thread's final act. Frees its own kernel stack's
/// bookkeeping is deliberately *not* done here — spec §4.2's "a thread cannot free its
/// own stack" means the reaper does that after this thread has fully stopped running on
/// it, not at the moment `vanish` is called.
pub fn vanish(tid: Tid, mem: &mut impl PhysicalMemory, frames: &mut FrameAllocator) -> KernelResult<()> {
    table::thread_kill(tid, mem, frames)
}

pub fn gettid(tid: Tid) -> Tid {
    tid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PAGE_SIZE, USER_MEM_START};
    use crate::fs::BootCatalogue;
    use crate::mm::phys_mem::SimPhysicalMemory;
    use crate::mm::vas::copy_to_user;

    const TOTAL_FRAMES: u32 = (USER_MEM_START / PAGE_SIZE) as u32 + 64;

    fn fresh_backing() -> (SimPhysicalMemory, FrameAllocator) {
        (
            SimPhysicalMemory::new(TOTAL_FRAMES as usize),
            FrameAllocator::new(TOTAL_FRAMES),
        )
    }

    #[test]
    fn fork_deep_copies_memory_and_parents_the_child() {
        let (mut mem, mut frames) = fresh_backing();
        let (parent, ptid) =
            table::new_process(None, &mut mem, &mut frames, kstack::alloc().unwrap(), Regs::default()).unwrap();
        let base = USER_MEM_START as u32;
        {
            let mut vas = table::checkout_address_space(parent).unwrap();
            vas.new_pages(&mut mem, &mut frames, base, PAGE_SIZE as u32, true).unwrap();
            table::checkin_address_space(parent, vas);
        }
        let pd = table::page_directory(parent).unwrap();
        copy_to_user(&mut mem, pd, base, b"parent-data").unwrap();

        let child = fork(ptid, parent, &mut mem, &mut frames).unwrap();
        let child_pd = table::page_directory(child).unwrap();
        let mut out = alloc::vec![0u8; 11];
        copy_from_user(&mem, child_pd, base, &mut out).unwrap();
        assert_eq!(&out, b"parent-data");

        copy_to_user(&mut mem, pd, base, b"mutated-xxx").unwrap();
        let mut child_out = alloc::vec![0u8; 11];
        copy_from_user(&mem, child_pd, base, &mut child_out).unwrap();
        assert_eq!(&child_out, b"parent-data", "child's copy must be independent");
    }

    #[test]
    fn fork_with_more_than_one_live_thread_is_rejected() {
        let (mut mem, mut frames) = fresh_backing();
        let (parent, ptid) =
            table::new_process(None, &mut mem, &mut frames, kstack::alloc().unwrap(), Regs::default()).unwrap();
        thread_fork(ptid, parent).unwrap();
        assert_eq!(
            fork(ptid, parent, &mut mem, &mut frames).unwrap_err(),
            KernelError::LifecycleViolation
        );
    }

    #[test]
    fn exec_loads_a_catalogue_image_and_replaces_the_address_space() {
        let (mut mem, mut frames) = fresh_backing();
        let (pid, _tid) =
            table::new_process(None, &mut mem, &mut frames, kstack::alloc().unwrap(), Regs::default()).unwrap();

        // A minimal well-formed image: a 12-word header followed by 4 bytes of
        // `.text`, entry at the very start of `.text`.
        let text_start = USER_MEM_START as u32;
        let mut image = Vec::new();
        image.extend_from_slice(&text_start.to_le_bytes()); // entry
        let text_file_offset = 12 * 4;
        image.extend_from_slice(&(text_file_offset as u32).to_le_bytes()); // text.file_offset
        image.extend_from_slice(&4u32.to_le_bytes()); // text.len
        image.extend_from_slice(&text_start.to_le_bytes()); // text.start
        image.extend_from_slice(&[0u8; 4 * 3]); // rodata (empty)
        image.extend_from_slice(&[0u8; 4 * 3]); // data (empty)
        image.extend_from_slice(&0u32.to_le_bytes()); // bss_start
        image.extend_from_slice(&0u32.to_le_bytes()); // bss_len
        image.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes()); // the 4 bytes of `.text`

        let entries: [(&str, &[u8]); 1] = [("prog", image.as_slice())];
        let catalogue = BootCatalogue::new(&entries);
        let pd = table::page_directory(pid).unwrap();
        let name_va = USER_MEM_START as u32 + 0x20_0000;
        {
            let mut vas = table::checkout_address_space(pid).unwrap();
            vas.new_pages(&mut mem, &mut frames, name_va, PAGE_SIZE as u32, true).unwrap();
            table::checkin_address_space(pid, vas);
        }
        copy_to_user(&mut mem, pd, name_va, b"prog\0").unwrap();

        let regs = exec(pid, &mut mem, &mut frames, name_va, &catalogue).unwrap();
        assert_eq!(regs.eip, text_start);
        assert_eq!(regs.esp, crate::config::USER_STACK_TOP);
    }

    #[test]
    fn wait_and_set_status_round_trip() {
        let (mut mem, mut frames) = fresh_backing();
        let (parent, _ptid) =
            table::new_process(None, &mut mem, &mut frames, kstack::alloc().unwrap(), Regs::default()).unwrap();
        let (child, ctid) = table::new_process(
            Some(parent),
            &mut mem,
            &mut frames,
            kstack::alloc().unwrap(),
            Regs::default(),
        )
        .unwrap();
        set_status(child, 7).unwrap();
        vanish(ctid, &mut mem, &mut frames).unwrap();
        let (reaped, status) = wait(parent, Tid(999_777)).unwrap();
        assert_eq!(reaped, child);
        assert_eq!(status, 7);
    }
}
