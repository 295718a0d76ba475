//! Synchronization primitives (spec §4.3), layered spinlock → mutex/condvar →
//! semaphore/rwlock → memlock, each grounded in the matching
//! `original_source/p3/kern/{mutex,cond,memlock}.c` file. Every primitive above the
//! spinlock calls directly into [`crate::sched::scheduler`] to deschedule/wake —
//! mirroring how the original's `mutex.c` calls straight into `scheduler.c` — rather
//! than routing through some intermediate blocking abstraction.

pub mod condvar;
pub mod memlock;
pub mod mutex;
pub mod rwlock;
pub mod semaphore;
pub mod spinlock;

pub use condvar::Condvar;
pub use memlock::MemLock;
pub use mutex::{Mutex, MutexGuard};
pub use rwlock::RwLock;
pub use semaphore::Semaphore;
pub use spinlock::SpinLock;
