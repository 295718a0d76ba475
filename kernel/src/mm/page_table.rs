//! Two-level x86 page table manipulation over the [`PhysicalMemory`] abstraction.
//!
//! Constants and the 10-10-12 virtual-address split are taken directly from
//! `original_source/p3/kern/vm.c`'s macros (`PD_SIZE = PT_SIZE = PAGE_SIZE / 4`, a page
//! directory/table each holding 1024 four-byte entries). Typed [`PdIndex`]/[`PtIndex`]
//! replace the original's bit-twiddling macros.

use crate::config::PAGE_SIZE;
use crate::error::{FrameError, KernelError, KernelResult};

use super::frame_allocator::FrameAllocator;
use super::phys_mem::{FrameNumber, PhysicalMemory};

/// Entries per page directory / page table (`PAGE_SIZE / size_of::<u32>()`).
pub const ENTRIES_PER_TABLE: usize = PAGE_SIZE / 4;

bitflags::bitflags! {
    /// Page-table-entry flag bits this kernel cares about; bits 12-31 (frame address)
    /// are handled separately by [`PageTableEntry`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
        const GLOBAL = 1 << 8;
    }
}

impl PageFlags {
    /// Flags for the direct-mapped kernel window (spec §3): present, writable,
    /// global, and *not* user — supervisor-only.
    pub fn kernel_window() -> Self {
        PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::GLOBAL
    }

    /// Flags for a freshly allocated user page (`new_pages`, exec segment mapping
    /// overrides `WRITABLE` per section).
    pub fn user_rw() -> Self {
        PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER
    }

    pub fn user_ro() -> Self {
        PageFlags::PRESENT | PageFlags::USER
    }
}

/// One raw 32-bit page-table/directory entry: top 20 bits are a frame number, low 12
/// bits are [`PageFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableEntry(u32);

impl PageTableEntry {
    pub const EMPTY: Self = Self(0);

    pub fn new(frame: FrameNumber, flags: PageFlags) -> Self {
        Self((frame.phys_addr() & !0xFFF) | flags.bits())
    }

    pub fn is_present(self) -> bool {
        PageFlags::from_bits_truncate(self.0).contains(PageFlags::PRESENT)
    }

    pub fn flags(self) -> PageFlags {
        PageFlags::from_bits_truncate(self.0 & 0xFFF)
    }

    pub fn frame(self) -> FrameNumber {
        FrameNumber::from_phys_addr(self.0 & !0xFFF)
    }

    fn raw(self) -> u32 {
        self.0
    }

    fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

/// Index of an entry within a page directory (VA bits 31:22).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdIndex(pub u32);

/// Index of an entry within a page table (VA bits 21:12).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtIndex(pub u32);

/// Split a virtual address into its directory index, table index, and page offset.
pub fn split_va(va: u32) -> (PdIndex, PtIndex, u32) {
    (PdIndex(va >> 22), PtIndex((va >> 12) & 0x3FF), va & 0xFFF)
}

pub fn va_of(pd: PdIndex, pt: PtIndex) -> u32 {
    (pd.0 << 22) | (pt.0 << 12)
}

fn read_entry(mem: &impl PhysicalMemory, table: FrameNumber, index: u32) -> PageTableEntry {
    PageTableEntry::from_raw(mem.read_u32(table, index as usize * 4))
}

fn write_entry(mem: &mut impl PhysicalMemory, table: FrameNumber, index: u32, entry: PageTableEntry) {
    mem.write_u32(table, index as usize * 4, entry.raw());
}

/// Walk `pd` down to the page table covering `pd_index`, creating it (zeroed, present,
/// writable, supervisor) if it doesn't exist yet and `create` is `true`.
fn page_table_for(
    mem: &mut impl PhysicalMemory,
    frames: &mut FrameAllocator,
    pd: FrameNumber,
    pd_index: PdIndex,
    create: bool,
) -> KernelResult<Option<FrameNumber>> {
    let pde = read_entry(mem, pd, pd_index.0);
    if pde.is_present() {
        return Ok(Some(pde.frame()));
    }
    if !create {
        return Ok(None);
    }
    let table = frames.allocate(mem).map_err(KernelError::from)?;
    mem.zero_frame(table);
    write_entry(
        mem,
        pd,
        pd_index.0,
        PageTableEntry::new(table, PageFlags::PRESENT | PageFlags::WRITABLE),
    );
    Ok(Some(table))
}

/// Look up the mapping for `va`, if any, returning its backing frame and flags.
pub fn translate(mem: &impl PhysicalMemory, pd: FrameNumber, va: u32) -> Option<(FrameNumber, PageFlags)> {
    let (pd_index, pt_index, _) = split_va(va);
    let pde = read_entry(mem, pd, pd_index.0);
    if !pde.is_present() {
        return None;
    }
    let pte = read_entry(mem, pde.frame(), pt_index.0);
    if !pte.is_present() {
        return None;
    }
    Some((pte.frame(), pte.flags()))
}

/// Map `va` to physical frame `pa` with `flags`, creating the covering page table if
/// needed. Overwrites any existing mapping at `va`.
pub fn map(
    mem: &mut impl PhysicalMemory,
    frames: &mut FrameAllocator,
    pd: FrameNumber,
    va: u32,
    pa: FrameNumber,
    flags: PageFlags,
) -> KernelResult<()> {
    let (pd_index, pt_index, _) = split_va(va);
    let table = page_table_for(mem, frames, pd, pd_index, true)?.expect("create=true always yields a table");
    write_entry(mem, table, pt_index.0, PageTableEntry::new(pa, flags));
    Ok(())
}

/// Clear the present bit at `va`. Returns the frame that was mapped there, if any, so
/// the caller can decide whether to free it (callers in `vas.rs` only free frames in
/// the user physical range, per spec §4.1).
pub fn unmap(mem: &mut impl PhysicalMemory, pd: FrameNumber, va: u32) -> Option<FrameNumber> {
    let (pd_index, pt_index, _) = split_va(va);
    let pde = read_entry(mem, pd, pd_index.0);
    if !pde.is_present() {
        return None;
    }
    let table = pde.frame();
    let pte = read_entry(mem, table, pt_index.0);
    if !pte.is_present() {
        return None;
    }
    write_entry(mem, table, pt_index.0, PageTableEntry::EMPTY);
    Some(pte.frame())
}

/// `true` if every entry of the page table at `table` is empty — the caller can then
/// free the table frame itself and clear its directory entry.
pub fn page_table_is_empty(mem: &impl PhysicalMemory, table: FrameNumber) -> bool {
    (0..ENTRIES_PER_TABLE as u32).all(|index| !read_entry(mem, table, index).is_present())
}

pub fn clear_directory_entry(mem: &mut impl PhysicalMemory, pd: FrameNumber, pd_index: PdIndex) {
    write_entry(mem, pd, pd_index.0, PageTableEntry::EMPTY);
}

/// The page table frame installed at `pd_index`, if that directory slot is present.
pub fn directory_entry(mem: &impl PhysicalMemory, pd: FrameNumber, pd_index: PdIndex) -> Option<FrameNumber> {
    let pde = read_entry(mem, pd, pd_index.0);
    pde.is_present().then(|| pde.frame())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::USER_MEM_START;
    use crate::mm::phys_mem::SimPhysicalMemory;

    fn harness() -> (FrameAllocator, SimPhysicalMemory, FrameNumber) {
        let total = (USER_MEM_START / PAGE_SIZE) as u32 + 64;
        let mut frames = FrameAllocator::new(total);
        let mut mem = SimPhysicalMemory::new(total as usize);
        let pd = frames.allocate(&mut mem).unwrap();
        mem.zero_frame(pd);
        (frames, mem, pd)
    }

    #[test]
    fn map_then_translate_round_trips() {
        let (mut frames, mut mem, pd) = harness();
        let page = frames.allocate(&mut mem).unwrap();
        let va = USER_MEM_START as u32;
        map(&mut mem, &mut frames, pd, va, page, PageFlags::user_rw()).unwrap();
        let (frame, flags) = translate(&mem, pd, va).unwrap();
        assert_eq!(frame, page);
        assert!(flags.contains(PageFlags::WRITABLE | PageFlags::USER));
    }

    #[test]
    fn unmap_clears_presence_and_returns_frame() {
        let (mut frames, mut mem, pd) = harness();
        let page = frames.allocate(&mut mem).unwrap();
        let va = USER_MEM_START as u32;
        map(&mut mem, &mut frames, pd, va, page, PageFlags::user_rw()).unwrap();
        assert_eq!(unmap(&mut mem, pd, va), Some(page));
        assert_eq!(translate(&mem, pd, va), None);
        assert_eq!(unmap(&mut mem, pd, va), None);
    }

    #[test]
    fn page_table_is_empty_after_its_one_entry_is_unmapped() {
        let (mut frames, mut mem, pd) = harness();
        let page = frames.allocate(&mut mem).unwrap();
        let va = USER_MEM_START as u32;
        map(&mut mem, &mut frames, pd, va, page, PageFlags::user_rw()).unwrap();
        let (pd_index, _, _) = split_va(va);
        let table = read_entry(&mem, pd, pd_index.0).frame();
        unmap(&mut mem, pd, va);
        assert!(page_table_is_empty(&mem, table));
    }
}
