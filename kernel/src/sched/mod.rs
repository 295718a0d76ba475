//! Scheduler (spec §4.4): ready queue, sleep queue, and the tid-indexed descheduled
//! set that implements the "kind"-tagged deschedule/make_runnable contract of §4.3.

pub mod queue;
pub mod scheduler;

pub use scheduler::DeschedKind;
