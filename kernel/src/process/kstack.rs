//! Kernel-stack slot allocator: hands out a fresh `esp0` for every thread born by
//! `new_process`/`thread_fork`/`fork` (spec §4.2), grounded in the bump-plus-free-list
//! shape of [`crate::mm::frame_allocator::FrameAllocator`] — the teacher's own simplest
//! allocator design, reused here since a kernel stack slot is exactly as fungible as a
//! physical frame: fixed size, no internal structure, freed in full or not at all.
//!
//! Unlike `FrameAllocator`, there is no physical backing store to thread a free-list
//! next-pointer through (`original_source/p3/kern/inc/proc.h`'s `KERNEL_STACK_SIZE`
//! stacks live in the direct-mapped kernel window, not in any `PhysicalMemory` this
//! crate models), so the free list is an ordinary `Vec<u32>` of reclaimed slot indices.

use alloc::vec::Vec;

use lazy_static::lazy_static;

use crate::config::{KERNEL_STACK_REGION_BASE, KERNEL_STACK_SIZE, MAX_THREADS};
use crate::error::{KernelError, KernelResult};
use crate::sync::SpinLock;

struct Inner {
    next_unused: u32,
    free_slots: Vec<u32>,
}

impl Inner {
    fn new() -> Self {
        Self {
            next_unused: 0,
            free_slots: Vec::new(),
        }
    }

    fn alloc(&mut self) -> KernelResult<u32> {
        let slot = if let Some(slot) = self.free_slots.pop() {
            slot
        } else if (self.next_unused as usize) < MAX_THREADS {
            let slot = self.next_unused;
            self.next_unused += 1;
            slot
        } else {
            return Err(KernelError::ResourceExhausted);
        };
        Ok(slot_top(slot))
    }

    fn free(&mut self, top: u32) {
        let slot = (top - KERNEL_STACK_REGION_BASE as u32) / KERNEL_STACK_SIZE as u32 - 1;
        debug_assert!(slot < self.next_unused, "freed a kernel stack slot never allocated");
        self.free_slots.push(slot);
    }
}

fn slot_top(slot: u32) -> u32 {
    KERNEL_STACK_REGION_BASE as u32 + (slot + 1) * KERNEL_STACK_SIZE as u32
}

lazy_static! {
    static ref KSTACKS: SpinLock<Inner> = SpinLock::new(Inner::new());
}

/// Allocate a fresh kernel stack, returning its top (`esp0` convention: the stack grows
/// down from the value returned, matching `original_source`'s `unsigned esp0`).
pub fn alloc() -> KernelResult<u32> {
    KSTACKS.lock().alloc()
}

/// Return a kernel stack slot to the allocator. Called by the thread-reaper once a
/// vanished thread's TCB has been fully removed (spec §4.2: "a thread cannot free its
/// own stack").
pub fn free(top: u32) {
    KSTACKS.lock().free(top)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_hands_out_distinct_non_overlapping_stacks() {
        let a = alloc().unwrap();
        let b = alloc().unwrap();
        assert_ne!(a, b);
        assert!(a.abs_diff(b) >= KERNEL_STACK_SIZE as u32);
        free(a);
        free(b);
    }

    #[test]
    fn free_list_is_preferred_over_the_bump_pointer() {
        let a = alloc().unwrap();
        let b = alloc().unwrap();
        free(a);
        let c = alloc().unwrap();
        assert_eq!(c, a);
        assert_ne!(c, b);
        free(b);
        free(c);
    }
}
