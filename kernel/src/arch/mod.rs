//! Architecture abstraction layer (L0: intrinsics).
//!
//! Everything above this module talks to `arch::x86` only through the narrow surface
//! re-exported here: port I/O, atomic exchange, segment/TLB/CR register access, and the
//! iret trampoline used to enter and resume user mode. No other module reaches into
//! `core::arch::asm!` directly.

#[cfg(target_arch = "x86")]
pub mod x86;

#[cfg(target_arch = "x86")]
pub use x86 as active;

#[cfg(not(target_arch = "x86"))]
pub mod host_stub;

#[cfg(not(target_arch = "x86"))]
pub use host_stub as active;
