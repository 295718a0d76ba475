//! Physical-frame allocator: bump pointer plus an in-place free list.
//!
//! Grounded in `original_source/p3/kern/vm.c`'s frame pool. The teacher's own
//! `mm::frame_allocator` reaches for a bitmap+buddy scheme sized for a 64-bit NUMA
//! target; this crate keeps the original 32-bit source's simpler design instead, since
//! that is what this spec actually describes: a bump pointer walking never-touched
//! frames above `USER_MEM_START`, backed by a free list whose next-pointer lives in
//! the first word of the free frame itself, so the allocator needs no auxiliary
//! storage.

use crate::config::{PAGE_SIZE, USER_MEM_START};
use crate::error::FrameError;

use super::phys_mem::{FrameNumber, PhysicalMemory};

/// Hands out and reclaims frames above `USER_MEM_START`. The free list's next-pointer
/// is stored as the first word of each free frame (`NIL = u32::MAX` marks list end).
pub struct FrameAllocator {
    next_unused: FrameNumber,
    total_frames: u32,
    free_head: Option<FrameNumber>,
    free_count: usize,
}

const NIL: u32 = u32::MAX;

impl FrameAllocator {
    /// `total_frames` bounds the bump pointer; frames below `USER_MEM_START / PAGE_SIZE`
    /// are never handed out — they belong to the direct-mapped kernel window.
    pub fn new(total_frames: u32) -> Self {
        Self {
            next_unused: FrameNumber((USER_MEM_START / PAGE_SIZE) as u32),
            total_frames,
            free_head: None,
            free_count: 0,
        }
    }

    pub fn free_count(&self) -> usize {
        self.free_count
    }

    /// Allocate one frame, preferring the free list over bumping the high-water mark.
    pub fn allocate(&mut self, mem: &mut impl PhysicalMemory) -> Result<FrameNumber, FrameError> {
        if let Some(frame) = self.free_head {
            let next = mem.read_u32(frame, 0);
            self.free_head = if next == NIL { None } else { Some(FrameNumber(next)) };
            self.free_count -= 1;
            return Ok(frame);
        }
        if self.next_unused.0 >= self.total_frames {
            return Err(FrameError::OutOfFrames);
        }
        let frame = self.next_unused;
        self.next_unused = FrameNumber(self.next_unused.0 + 1);
        Ok(frame)
    }

    /// Return `frame` to the free list. Only frames in the user physical range may be
    /// freed; the direct-mapped kernel window's frames are shared global memory and
    /// are never returned to this allocator (spec §4.1 address-space destroy).
    pub fn free(&mut self, mem: &mut impl PhysicalMemory, frame: FrameNumber) {
        debug_assert!(
            frame.0 >= (USER_MEM_START / PAGE_SIZE) as u32,
            "attempted to free a kernel-window frame"
        );
        let old_head = self.free_head.map(|f| f.0).unwrap_or(NIL);
        mem.write_u32(frame, 0, old_head);
        self.free_head = Some(frame);
        self.free_count += 1;
    }
}
