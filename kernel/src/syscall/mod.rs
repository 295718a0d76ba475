//! System-call surface (spec §4.5, §4.6, §6): one module per syscall family holding
//! the validated, mechanism-level implementation, plus `dispatch`, which wires each
//! call's decoded arguments to its family function and converts the result back into
//! the ABI's register convention.

pub mod console;
pub mod debug;
pub mod dispatch;
pub mod fs;
pub mod memory;
pub mod process;
pub mod scheduling;
pub mod swexn;

pub use console::{ConsoleDevice, KeyboardSource};
pub use dispatch::*;
