//! Per-process address space: page directory lifecycle, `new_pages`/`remove_pages`,
//! and user-pointer validation (spec §4.1).

use alloc::vec::Vec;

use crate::config::{PAGE_SIZE, USER_MEM_START};
use crate::error::{KernelError, KernelResult};

use super::frame_allocator::FrameAllocator;
use super::page_table::{self, PageFlags};
use super::phys_mem::{FrameNumber, PhysicalMemory};
use super::regions::RegionMap;

/// A page directory plus the allocated-region bookkeeping and process-scoped locks
/// that travel with it. Kernel entries `[0, USER_MEM_START)` are direct-mapped,
/// global, writable, supervisor-only (spec §3); everything at or above
/// `USER_MEM_START` is per-address-space.
pub struct AddressSpace {
    pd: FrameNumber,
    regions: RegionMap,
    ref_count: u32,
}

impl AddressSpace {
    pub fn page_directory(&self) -> FrameNumber {
        self.pd
    }

    pub fn regions_mut(&mut self) -> &mut RegionMap {
        &mut self.regions
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn retain(&mut self) {
        self.ref_count += 1;
    }

    /// Returns `true` once the caller's release was the last reference.
    pub fn release(&mut self) -> bool {
        self.ref_count -= 1;
        self.ref_count == 0
    }

    /// Create a brand-new address space: one fresh directory page, user entries
    /// clear, kernel window direct-mapped 1:1 (frame N maps VA N * PAGE_SIZE) with
    /// `writable | global | supervisor` flags.
    pub fn new(mem: &mut impl PhysicalMemory, frames: &mut FrameAllocator) -> KernelResult<Self> {
        let pd = frames.allocate(mem).map_err(KernelError::from)?;
        mem.zero_frame(pd);
        let kernel_pages = USER_MEM_START / PAGE_SIZE;
        for page in 0..kernel_pages as u32 {
            let va = page * PAGE_SIZE as u32;
            page_table::map(mem, frames, pd, va, FrameNumber(page), PageFlags::kernel_window())?;
        }
        Ok(Self {
            pd,
            regions: RegionMap::new(),
            ref_count: 1,
        })
    }

    /// Locate or create the page table for `va` and write `pa`/`flags` into it,
    /// invalidating the TLB entry if this is the currently active directory.
    pub fn map(
        &self,
        mem: &mut impl PhysicalMemory,
        frames: &mut FrameAllocator,
        va: u32,
        pa: FrameNumber,
        flags: PageFlags,
        active: bool,
    ) -> KernelResult<()> {
        page_table::map(mem, frames, self.pd, va, pa, flags)?;
        if active {
            // SAFETY: invalidating a single TLB entry for an address this call just
            // remapped; always sound regardless of what was previously cached there.
            unsafe {
                crate::arch::active::cr::invalidate_page(va);
            }
        }
        Ok(())
    }

    /// Unmap `va`. If the backing frame lies in the user physical range it is
    /// returned to the allocator; direct-mapped kernel frames never are. If the
    /// covering page table becomes empty, it too is freed and its directory entry
    /// cleared.
    pub fn unmap(&self, mem: &mut impl PhysicalMemory, frames: &mut FrameAllocator, va: u32, active: bool) {
        let Some(frame) = page_table::unmap(mem, self.pd, va) else {
            return;
        };
        if (frame.phys_addr() as usize) >= USER_MEM_START {
            frames.free(mem, frame);
        }
        let (pd_index, _, _) = page_table::split_va(va);
        if let Some(table) = page_table::directory_entry(mem, self.pd, pd_index) {
            if page_table::page_table_is_empty(mem, table) {
                frames.free(mem, table);
                page_table::clear_directory_entry(mem, self.pd, pd_index);
            }
        }
        if active {
            // SAFETY: see `map`.
            unsafe {
                crate::arch::active::cr::invalidate_page(va);
            }
        }
    }

    /// `new_pages(base, len)` (spec §4.1): validate and record the region, then
    /// allocate and map fresh frames as `user, writable`. On any failure partway
    /// through, every frame mapped so far is unwound and the record removed, leaving
    /// no partial allocation.
    pub fn new_pages(
        &mut self,
        mem: &mut impl PhysicalMemory,
        frames: &mut FrameAllocator,
        base: u32,
        len: u32,
        active: bool,
    ) -> KernelResult<()> {
        for page in 0..(len / PAGE_SIZE as u32) {
            let va = base + page * PAGE_SIZE as u32;
            if page_table::translate(mem, self.pd, va).is_some() {
                return Err(KernelError::Overlap);
            }
        }
        let page_count = self.regions.reserve(base, len)?;
        let mut mapped: Vec<u32> = Vec::with_capacity(page_count as usize);
        for page in 0..page_count {
            let va = base + page * PAGE_SIZE as u32;
            match frames.allocate(mem) {
                Ok(frame) => {
                    mem.zero_frame(frame);
                    if let Err(err) = self.map(mem, frames, va, frame, PageFlags::user_rw(), active) {
                        frames.free(mem, frame);
                        self.unwind_new_pages(mem, frames, base, &mapped, active);
                        self.regions.unreserve(base);
                        return Err(err);
                    }
                    mapped.push(va);
                }
                Err(err) => {
                    self.unwind_new_pages(mem, frames, base, &mapped, active);
                    self.regions.unreserve(base);
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    fn unwind_new_pages(&mut self, mem: &mut impl PhysicalMemory, frames: &mut FrameAllocator, _base: u32, mapped: &[u32], active: bool) {
        for &va in mapped {
            self.unmap(mem, frames, va, active);
        }
    }

    /// `remove_pages(base)` (spec §4.1): the base must exactly match a recorded
    /// allocation; the entire recorded length is then unmapped and freed.
    pub fn remove_pages(&mut self, mem: &mut impl PhysicalMemory, frames: &mut FrameAllocator, base: u32, active: bool) -> KernelResult<()> {
        let region = self.regions.take(base)?;
        for page in 0..(region.length / PAGE_SIZE as u32) {
            let va = region.base + page * PAGE_SIZE as u32;
            self.unmap(mem, frames, va, active);
        }
        Ok(())
    }

    /// Deep-copy into a fresh address space: a new directory, then for every present
    /// user page, a fresh frame mapped in the child and copied from the source via
    /// `PhysicalMemory::copy_frame`. The region map is copied verbatim since the
    /// layout of allocations is identical.
    pub fn clone_into(&self, mem: &mut impl PhysicalMemory, frames: &mut FrameAllocator) -> KernelResult<Self> {
        let mut child = Self::new(mem, frames)?;
        let source_regions: Vec<super::regions::AllocatedRegion> = self.regions.iter().map(|(_, region)| *region).collect();
        for region in &source_regions {
            for page in 0..(region.length / PAGE_SIZE as u32) {
                let va = region.base + page * PAGE_SIZE as u32;
                let Some((src_frame, flags)) = page_table::translate(mem, self.pd, va) else {
                    continue;
                };
                let dst_frame = match frames.allocate(mem) {
                    Ok(frame) => frame,
                    Err(err) => {
                        child.destroy(mem, frames);
                        return Err(err.into());
                    }
                };
                mem.copy_frame(src_frame, dst_frame);
                if let Err(err) = page_table::map(mem, frames, child.pd, va, dst_frame, flags) {
                    frames.free(mem, dst_frame);
                    child.destroy(mem, frames);
                    return Err(err);
                }
            }
            child.regions.reserve(region.base, region.length).expect("child region layout mirrors parent's");
        }
        Ok(child)
    }

    /// Free every present user frame and page table, then the directory page itself.
    /// Kernel-window frames are left untouched — they are shared global memory, not
    /// owned by this address space.
    pub fn destroy(self, mem: &mut impl PhysicalMemory, frames: &mut FrameAllocator) {
        let user_start_pd_index = (USER_MEM_START / PAGE_SIZE) as u32 >> 10;
        for pd_index_raw in user_start_pd_index..page_table::ENTRIES_PER_TABLE as u32 {
            let dir_index = page_table::PdIndex(pd_index_raw);
            let Some(table) = page_table::directory_entry(mem, self.pd, dir_index) else {
                continue;
            };
            for pt_index in 0..page_table::ENTRIES_PER_TABLE as u32 {
                let va = page_table::va_of(dir_index, page_table::PtIndex(pt_index));
                if let Some(frame) = page_table::unmap(mem, self.pd, va) {
                    if (frame.phys_addr() as usize) >= USER_MEM_START {
                        frames.free(mem, frame);
                    }
                }
            }
            frames.free(mem, table);
            page_table::clear_directory_entry(mem, self.pd, dir_index);
        }
        frames.free(mem, self.pd);
    }
}

/// `{required, forbidden}` flag pair a user access must satisfy (spec §4.1).
pub struct AccessRequirement {
    pub required: PageFlags,
    pub forbidden: PageFlags,
}

impl AccessRequirement {
    pub fn read() -> Self {
        Self {
            required: PageFlags::PRESENT | PageFlags::USER,
            forbidden: PageFlags::empty(),
        }
    }

    pub fn write() -> Self {
        Self {
            required: PageFlags::PRESENT | PageFlags::USER | PageFlags::WRITABLE,
            forbidden: PageFlags::empty(),
        }
    }
}

/// Validate that every page in `[va, va+len)` is present with `requirement.required`
/// set and none of `requirement.forbidden` set. Used before any kernel dereference of
/// a user-supplied pointer.
pub fn validate_range(mem: &impl PhysicalMemory, pd: FrameNumber, va: u32, len: u32, requirement: &AccessRequirement) -> KernelResult<()> {
    if len == 0 {
        return Err(KernelError::InvalidArgument);
    }
    // `u64`: a range may run up to the very top of the 32-bit address space, where
    // `va + len` as a `u32` would overflow even though every byte is in range.
    let end = va as u64 + len as u64;
    if (va as usize) < USER_MEM_START {
        return Err(KernelError::MemoryValidation);
    }
    let first_page = va / PAGE_SIZE as u32;
    let last_page = ((end - 1) / PAGE_SIZE as u64) as u32;
    for page in first_page..=last_page {
        let page_va = page * PAGE_SIZE as u32;
        match page_table::translate(mem, pd, page_va) {
            Some((_, flags)) if flags.contains(requirement.required) && !flags.intersects(requirement.forbidden) => {}
            _ => return Err(KernelError::MemoryValidation),
        }
    }
    Ok(())
}

/// Validate a NUL-terminated user string one page at a time, returning its length
/// (excluding the terminator) if a terminating byte is found before crossing out of
/// user space.
pub fn validate_cstr(mem: &impl PhysicalMemory, pd: FrameNumber, va: u32, max_len: usize) -> KernelResult<usize> {
    let mut offset = 0usize;
    while offset < max_len {
        let page_va = (va + offset as u32) & !((PAGE_SIZE as u32) - 1);
        validate_range(mem, pd, page_va, PAGE_SIZE as u32, &AccessRequirement::read())?;
        let byte_va = va + offset as u32;
        let (frame, _) = page_table::translate(mem, pd, byte_va).ok_or(KernelError::MemoryValidation)?;
        let word = mem.read_u32(frame, (byte_va as usize) % PAGE_SIZE & !0x3);
        let shift = ((byte_va as usize) % 4) * 8;
        let byte = ((word >> shift) & 0xFF) as u8;
        if byte == 0 {
            return Ok(offset);
        }
        offset += 1;
    }
    Err(KernelError::InvalidArgument)
}

/// Validate then copy `out.len()` bytes from user memory at `va` into `out`. The
/// general-purpose counterpart to [`validate_cstr`] for syscalls that read a
/// length-prefixed user buffer (`print`, argument packets) rather than a C string.
pub fn copy_from_user(mem: &impl PhysicalMemory, pd: FrameNumber, va: u32, out: &mut [u8]) -> KernelResult<()> {
    validate_range(mem, pd, va, out.len() as u32, &AccessRequirement::read())?;
    for (i, byte) in out.iter_mut().enumerate() {
        let byte_va = va + i as u32;
        let (frame, _) = page_table::translate(mem, pd, byte_va).ok_or(KernelError::MemoryValidation)?;
        let word = mem.read_u32(frame, (byte_va as usize) % PAGE_SIZE & !0x3);
        let shift = ((byte_va as usize) % 4) * 8;
        *byte = ((word >> shift) & 0xFF) as u8;
    }
    Ok(())
}

/// Validate then copy `data` into user memory at `va` (`readline`/`readfile`'s final
/// copy into the caller's buffer).
pub fn copy_to_user(mem: &mut impl PhysicalMemory, pd: FrameNumber, va: u32, data: &[u8]) -> KernelResult<()> {
    validate_range(mem, pd, va, data.len() as u32, &AccessRequirement::write())?;
    for (i, &byte) in data.iter().enumerate() {
        let byte_va = va + i as u32;
        let (frame, _) = page_table::translate(mem, pd, byte_va).ok_or(KernelError::MemoryValidation)?;
        let word_offset = (byte_va as usize) % PAGE_SIZE & !0x3;
        let word = mem.read_u32(frame, word_offset);
        let shift = ((byte_va as usize) % 4) * 8;
        let mask = 0xFFu32 << shift;
        let new_word = (word & !mask) | ((byte as u32) << shift);
        mem.write_u32(frame, word_offset, new_word);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::phys_mem::SimPhysicalMemory;

    fn harness() -> (FrameAllocator, SimPhysicalMemory) {
        let total = (USER_MEM_START / PAGE_SIZE) as u32 + 256;
        (FrameAllocator::new(total), SimPhysicalMemory::new(total as usize))
    }

    #[test]
    fn new_pages_then_remove_pages_is_idempotent_and_rereads_zero() {
        let (mut frames, mut mem) = harness();
        let mut vas = AddressSpace::new(&mut mem, &mut frames).unwrap();
        let base = USER_MEM_START as u32;
        vas.new_pages(&mut mem, &mut frames, base, PAGE_SIZE as u32 * 2, false).unwrap();
        let (frame, _) = page_table::translate(&mem, vas.page_directory(), base).unwrap();
        mem.write_u32(frame, 0, 0x1234_5678);
        vas.remove_pages(&mut mem, &mut frames, base, false).unwrap();
        assert!(page_table::translate(&mem, vas.page_directory(), base).is_none());
        vas.new_pages(&mut mem, &mut frames, base, PAGE_SIZE as u32, false).unwrap();
        let (fresh_frame, _) = page_table::translate(&mem, vas.page_directory(), base).unwrap();
        assert_eq!(mem.read_u32(fresh_frame, 0), 0);
    }

    #[test]
    fn overlapping_new_pages_fails_with_no_state_change() {
        let (mut frames, mut mem) = harness();
        let mut vas = AddressSpace::new(&mut mem, &mut frames).unwrap();
        let base = USER_MEM_START as u32;
        vas.new_pages(&mut mem, &mut frames, base, PAGE_SIZE as u32 * 2, false).unwrap();
        let err = vas
            .new_pages(&mut mem, &mut frames, base + PAGE_SIZE as u32, PAGE_SIZE as u32 * 2, false)
            .unwrap_err();
        assert_eq!(err, KernelError::Overlap);
        assert!(page_table::translate(&mem, vas.page_directory(), base).is_some());
        assert!(page_table::translate(&mem, vas.page_directory(), base + PAGE_SIZE as u32 * 2).is_none());
    }

    #[test]
    fn remove_pages_on_non_base_fails() {
        let (mut frames, mut mem) = harness();
        let mut vas = AddressSpace::new(&mut mem, &mut frames).unwrap();
        let base = USER_MEM_START as u32;
        vas.new_pages(&mut mem, &mut frames, base, PAGE_SIZE as u32 * 2, false).unwrap();
        let err = vas.remove_pages(&mut mem, &mut frames, base + PAGE_SIZE as u32, false).unwrap_err();
        assert_eq!(err, KernelError::LifecycleViolation);
    }

    #[test]
    fn clone_into_deep_copies_user_pages() {
        let (mut frames, mut mem) = harness();
        let mut parent = AddressSpace::new(&mut mem, &mut frames).unwrap();
        let base = USER_MEM_START as u32;
        parent.new_pages(&mut mem, &mut frames, base, PAGE_SIZE as u32, false).unwrap();
        let (parent_frame, _) = page_table::translate(&mem, parent.page_directory(), base).unwrap();
        mem.write_u32(parent_frame, 0, 0xCAFE_BABE);

        let child = parent.clone_into(&mut mem, &mut frames).unwrap();
        let (child_frame, _) = page_table::translate(&mem, child.page_directory(), base).unwrap();
        assert_ne!(child_frame, parent_frame);
        assert_eq!(mem.read_u32(child_frame, 0), 0xCAFE_BABE);

        mem.write_u32(parent_frame, 0, 0);
        assert_eq!(mem.read_u32(child_frame, 0), 0xCAFE_BABE);
    }

    #[test]
    fn validate_range_rejects_kernel_addresses_and_missing_pages() {
        let (mut frames, mut mem) = harness();
        let mut vas = AddressSpace::new(&mut mem, &mut frames).unwrap();
        assert_eq!(
            validate_range(&mem, vas.page_directory(), 0, PAGE_SIZE as u32, &AccessRequirement::read()),
            Err(KernelError::MemoryValidation)
        );
        let base = USER_MEM_START as u32;
        assert_eq!(
            validate_range(&mem, vas.page_directory(), base, PAGE_SIZE as u32, &AccessRequirement::read()),
            Err(KernelError::MemoryValidation)
        );
        vas.new_pages(&mut mem, &mut frames, base, PAGE_SIZE as u32, false).unwrap();
        assert!(validate_range(&mem, vas.page_directory(), base, PAGE_SIZE as u32, &AccessRequirement::write()).is_ok());
    }

    #[test]
    fn copy_to_user_then_copy_from_user_round_trips_unaligned_spans() {
        let (mut frames, mut mem) = harness();
        let mut vas = AddressSpace::new(&mut mem, &mut frames).unwrap();
        let base = USER_MEM_START as u32;
        vas.new_pages(&mut mem, &mut frames, base, PAGE_SIZE as u32, false).unwrap();
        let pd = vas.page_directory();

        let data: alloc::vec::Vec<u8> = (0u8..=250).collect();
        let va = base + 3; // deliberately unaligned
        copy_to_user(&mut mem, pd, va, &data).unwrap();

        let mut out = alloc::vec![0u8; data.len()];
        copy_from_user(&mem, pd, va, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn copy_from_user_rejects_unmapped_range() {
        let (mut frames, mut mem) = harness();
        let vas = AddressSpace::new(&mut mem, &mut frames).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(
            copy_from_user(&mem, vas.page_directory(), USER_MEM_START as u32, &mut out),
            Err(KernelError::MemoryValidation)
        );
    }
}
