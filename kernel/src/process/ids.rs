//! Process and thread identifiers.
//!
//! Allocated from monotonically increasing counters (spec §4.2) and never recycled —
//! unlike the arena [`crate::collections::Handle`] type, which does recycle slots, a
//! pid/tid must keep naming the same logical process/thread forever so a stale
//! `wait`/`make_runnable` targeting a reaped id fails instead of silently hitting
//! whatever new process/thread was later given the same arena slot.

use core::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(pub u32);

/// A simple monotonic counter. One instance each for pid and tid allocation, held by
/// the process table so both counters are protected by the same lock as the tables
/// they index into.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU32,
}

impl IdAllocator {
    pub const fn new() -> Self {
        Self { next: AtomicU32::new(1) }
    }

    pub fn alloc(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
