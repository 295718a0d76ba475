//! Process/thread registry (spec §3, §4.2): pid/tid allocation, the PCB and TCB
//! types, and the pid→PCB / tid→TCB tables with birth/death orchestration.

pub mod ids;
pub mod kstack;
pub mod pcb;
pub mod table;
pub mod thread;

pub use ids::{Pid, Tid};
pub use pcb::{Process, ProcessLocks};
pub use thread::{SwexnHandler, Thread, Ureg};
