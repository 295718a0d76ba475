//! Writer-preferred reader/writer lock (spec §4.3), grounded in
//! `original_source/p3/kern/inc/rwlock.h`: readers counted, writers serialized, a
//! writer blocks until the reader count drains, and once a writer is waiting no new
//! reader may join until it has run — preventing writer starvation under steady read
//! load. Supports downgrading a held write lock straight to a read lock.

use crate::process::ids::Tid;
use crate::sync::condvar::Condvar;
use crate::sync::mutex::Mutex;

struct RwState {
    readers: u32,
    writer_active: bool,
    writer_waiting: u32,
}

pub struct RwLock {
    state: Mutex<RwState>,
    /// Signaled when a writer releases (or downgrades), letting blocked readers
    /// re-check their condition.
    no_writer: Condvar,
    /// Signaled when the reader count reaches zero, letting a blocked writer proceed.
    no_readers: Condvar,
}

impl RwLock {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RwState {
                readers: 0,
                writer_active: false,
                writer_waiting: 0,
            }),
            no_writer: Condvar::new(),
            no_readers: Condvar::new(),
        }
    }

    pub fn read_lock(&self, tid: Tid) {
        let mut state = self.state.lock(tid);
        while state.writer_active || state.writer_waiting > 0 {
            state = self.no_writer.wait(tid, &self.state, state);
        }
        state.readers += 1;
    }

    pub fn read_unlock(&self, tid: Tid) {
        let mut state = self.state.lock(tid);
        debug_assert!(state.readers > 0, "read_unlock with no reader held");
        state.readers -= 1;
        if state.readers == 0 {
            drop(state);
            self.no_readers.signal();
        }
    }

    pub fn write_lock(&self, tid: Tid) {
        let mut state = self.state.lock(tid);
        state.writer_waiting += 1;
        while state.writer_active || state.readers > 0 {
            state = self.no_readers.wait(tid, &self.state, state);
        }
        state.writer_waiting -= 1;
        state.writer_active = true;
    }

    pub fn write_unlock(&self, tid: Tid) {
        let mut state = self.state.lock(tid);
        debug_assert!(state.writer_active, "write_unlock with no writer held");
        state.writer_active = false;
        drop(state);
        // A waiting writer takes priority; if none, let every blocked reader recheck.
        self.no_readers.signal();
        self.no_writer.broadcast();
    }

    /// Downgrade a held write lock directly to a read lock, without letting another
    /// writer acquire in between.
    pub fn downgrade_to_read(&self, tid: Tid) {
        let mut state = self.state.lock(tid);
        debug_assert!(state.writer_active, "downgrade with no writer held");
        state.writer_active = false;
        state.readers += 1;
        drop(state);
        self.no_writer.broadcast();
    }

    pub fn reader_count(&self, tid: Tid) -> u32 {
        self.state.lock(tid).readers
    }

    pub fn writer_active(&self, tid: Tid) -> bool {
        self.state.lock(tid).writer_active
    }
}

impl Default for RwLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_readers_proceed_concurrently() {
        let lock = RwLock::new();
        lock.read_lock(Tid(1));
        lock.read_lock(Tid(2));
        assert_eq!(lock.reader_count(Tid(3)), 2);
        lock.read_unlock(Tid(1));
        lock.read_unlock(Tid(2));
        assert_eq!(lock.reader_count(Tid(3)), 0);
    }

    #[test]
    fn writer_excludes_readers_and_other_writers() {
        let lock = RwLock::new();
        lock.write_lock(Tid(1));
        assert!(lock.writer_active(Tid(9)));
        lock.write_unlock(Tid(1));
        assert!(!lock.writer_active(Tid(9)));
    }

    #[test]
    fn pending_writer_blocks_new_readers() {
        let lock = RwLock::new();
        lock.read_lock(Tid(1));
        // Mark a writer as waiting directly (bypassing the blocking call, which would
        // hang in this single-threaded test with no one to wake it) to exercise the
        // writer-preference check a new reader must observe.
        {
            let mut state = lock.state.lock(Tid(2));
            state.writer_waiting += 1;
        }
        // A fresh reader arriving now must see `writer_waiting > 0` and block rather
        // than join — checked here at the state level since a real call would hang.
        let blocked = {
            let state = lock.state.lock(Tid(3));
            state.writer_active || state.writer_waiting > 0
        };
        assert!(blocked);
        lock.read_unlock(Tid(1));
    }

    #[test]
    fn downgrade_keeps_reader_count_consistent() {
        let lock = RwLock::new();
        lock.write_lock(Tid(1));
        lock.downgrade_to_read(Tid(1));
        assert!(!lock.writer_active(Tid(9)));
        assert_eq!(lock.reader_count(Tid(9)), 1);
        lock.read_unlock(Tid(1));
    }
}
