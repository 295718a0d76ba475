//! Pebbles kernel core library
//!
//! This library provides the process/thread lifecycle, virtual memory, scheduler,
//! synchronization primitives, and system-call surface of a preemptive x86-32 teaching
//! kernel, plus the P4 disk-backed filesystem lookup service. It exports the core as a
//! library so the logic can be exercised by host-side tests independently of the
//! `pebbles-kernel` boot binary.

#![no_std]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(feature = "alloc")]
extern crate alloc;

// Bare-metal targets use the kernel heap; the host target (used for `cargo test`)
// delegates to the system allocator so ordinary Vec/BTreeMap-based tests work.
#[cfg(all(target_arch = "x86", target_os = "none"))]
use linked_list_allocator::LockedHeap;

#[cfg(all(target_arch = "x86", target_os = "none"))]
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

#[cfg(not(target_os = "none"))]
extern crate std;
#[cfg(not(target_os = "none"))]
#[global_allocator]
static SYSTEM_ALLOCATOR: std::alloc::System = std::alloc::System;

/// Get a reference to the global kernel heap allocator.
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub fn get_allocator() -> &'static LockedHeap {
    &ALLOCATOR
}

#[macro_use]
pub mod print;

pub mod config;
pub mod error;
pub mod logging;

pub mod arch;
pub mod bootstrap;
pub mod collections;
pub mod elf;
pub mod exception;
pub mod fs;
pub mod mm;
pub mod process;
pub mod sched;
pub mod sync;
pub mod syscall;

pub use error::{KernelError, KernelResult};
