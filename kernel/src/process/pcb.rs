//! Process control block (spec §3 "Process (PCB)"), grounded in
//! `original_source/p3/kern/inc/proc.h`.

use alloc::sync::Arc;

use crate::collections::IntrusiveList;
use crate::mm::AddressSpace;
use crate::process::ids::Pid;
use crate::sync::{Condvar, MemLock, Mutex, RwLock};

/// `locks_t` (spec §3.1-added-detail): the three process-scoped locks kept separate
/// rather than folded into one coarse process lock, matching the original's
/// intentionally fine-grained discipline (§5) — a `new_pages` racing a concurrent
/// `remove_pages` is a narrower conflict than either racing an unrelated `print`.
pub struct ProcessLocks {
    /// Serializes concurrent `new_pages`/`remove_pages` calls against each other
    /// within one address space.
    pub new_pages: Mutex<()>,
    /// Lets `remove_pages` exclude in-flight user-pointer dereferences of the pages
    /// it is about to unmap, while unrelated reads proceed concurrently.
    pub remove_pages: RwLock,
    /// Per-page locks guarding kernel dereferences of user memory against a
    /// concurrent unmap of that same page.
    pub memlock: MemLock,
}

impl ProcessLocks {
    pub fn new() -> Self {
        Self {
            new_pages: Mutex::new(()),
            remove_pages: RwLock::new(),
            memlock: MemLock::new(),
        }
    }
}

impl Default for ProcessLocks {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Process {
    pub pid: Pid,
    pub exit_status: i32,
    /// Weak in the sense that it names a pid, not an owning handle — the parent PCB
    /// may already have been reaped (freed) by the time this is read, at which point
    /// a `process::table` lookup simply returns `None`. Cleared and rewritten to the
    /// init pid when this process is re-parented (spec §4.2).
    pub parent: Option<Pid>,
    pub children: IntrusiveList<Pid>,
    pub zombie_children: IntrusiveList<Pid>,
    pub live_thread_count: u32,
    /// `None` once the process has zombified and its address space has been torn
    /// down — nothing will touch a zombie's user mappings again before reap, so
    /// there is no reason to keep paying for them.
    pub address_space: Option<AddressSpace>,
    pub wait_condvar: Condvar,
    /// Guards `exit_status`, `children`, `zombie_children`, `live_thread_count`, and
    /// `parent` — the PCB-level bookkeeping fields not already covered by `locks`.
    pub lock: Mutex<()>,
    /// `Arc`-wrapped so `process::table::process_locks` can hand a caller a cheap
    /// clone to block on (e.g. `locks.new_pages.lock(tid)`) after releasing the
    /// global table spinlock — the same reason `sync::MemLock` keeps its channels in
    /// `Arc`s.
    pub locks: Arc<ProcessLocks>,
}

impl Process {
    pub fn new(pid: Pid, parent: Option<Pid>, address_space: AddressSpace) -> Self {
        Self {
            pid,
            exit_status: 0,
            parent,
            children: IntrusiveList::new(),
            zombie_children: IntrusiveList::new(),
            live_thread_count: 1,
            address_space: Some(address_space),
            wait_condvar: Condvar::new(),
            lock: Mutex::new(()),
            locks: Arc::new(ProcessLocks::new()),
        }
    }

    /// A process's thread count reaches zero exactly once (spec §3 invariant), at
    /// which point it is zombified — computed rather than tracked as a separate flag,
    /// so there is exactly one source of truth.
    pub fn is_zombie(&self) -> bool {
        self.live_thread_count == 0
    }
}
