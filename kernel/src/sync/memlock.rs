//! Per-page memory lock (spec §4.3), grounded in `original_source/p3/kern/memlock.c`:
//! a mutex-protected hashtable of per-page channels, each wrapping a writer-preferred
//! [`RwLock`], created lazily on first touch and freed once its last holder drops —
//! exactly the channel/refcount dance the original performs, used by system calls
//! that dereference user pages to stop one thread unmapping a page another thread is
//! currently reading or writing without needing one VM-wide lock.

use core::sync::atomic::{AtomicU32, Ordering};

use alloc::sync::Arc;

use crate::collections::HashTable;
use crate::config::MEMLOCK_TABLE_BUCKETS;
use crate::process::ids::Tid;
use crate::sync::mutex::Mutex;
use crate::sync::rwlock::RwLock;

struct MemlockChannel {
    lock: RwLock,
    refcount: AtomicU32,
}

pub struct MemLock {
    channels: Mutex<HashTable<u32, Arc<MemlockChannel>, MEMLOCK_TABLE_BUCKETS>>,
}

impl MemLock {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashTable::new()),
        }
    }

    fn get_or_create_channel(&self, page_base: u32, tid: Tid) -> Arc<MemlockChannel> {
        let mut channels = self.channels.lock(tid);
        if let Some(existing) = channels.get(&page_base) {
            existing.refcount.fetch_add(1, Ordering::SeqCst);
            return Arc::clone(existing);
        }
        let channel = Arc::new(MemlockChannel {
            lock: RwLock::new(),
            refcount: AtomicU32::new(1),
        });
        channels.insert(page_base, Arc::clone(&channel));
        channel
    }

    /// Drop this holder's reference; once the last one is gone, remove the channel
    /// from the table entirely rather than let empty channels accumulate forever.
    fn release_channel(&self, page_base: u32, tid: Tid) {
        let mut channels = self.channels.lock(tid);
        let should_remove = channels
            .get(&page_base)
            .map(|channel| channel.refcount.fetch_sub(1, Ordering::SeqCst) == 1)
            .unwrap_or(false);
        if should_remove {
            channels.remove(&page_base);
        }
    }

    pub fn read_lock(&self, tid: Tid, page_base: u32) -> MemlockReadGuard<'_> {
        let channel = self.get_or_create_channel(page_base, tid);
        channel.lock.read_lock(tid);
        MemlockReadGuard {
            memlock: self,
            channel,
            page_base,
            tid,
        }
    }

    pub fn write_lock(&self, tid: Tid, page_base: u32) -> MemlockWriteGuard<'_> {
        let channel = self.get_or_create_channel(page_base, tid);
        channel.lock.write_lock(tid);
        MemlockWriteGuard {
            memlock: self,
            channel,
            page_base,
            tid,
        }
    }

    pub fn channel_count(&self, tid: Tid) -> usize {
        self.channels.lock(tid).len()
    }
}

impl Default for MemLock {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MemlockReadGuard<'a> {
    memlock: &'a MemLock,
    channel: Arc<MemlockChannel>,
    page_base: u32,
    tid: Tid,
}

impl Drop for MemlockReadGuard<'_> {
    fn drop(&mut self) {
        self.channel.lock.read_unlock(self.tid);
        self.memlock.release_channel(self.page_base, self.tid);
    }
}

pub struct MemlockWriteGuard<'a> {
    memlock: &'a MemLock,
    channel: Arc<MemlockChannel>,
    page_base: u32,
    tid: Tid,
}

impl Drop for MemlockWriteGuard<'_> {
    fn drop(&mut self) {
        self.channel.lock.write_unlock(self.tid);
        self.memlock.release_channel(self.page_base, self.tid);
    }
}
