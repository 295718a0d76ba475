//! L2: physical-frame allocator, two-level page tables, and per-address-space
//! operations (spec §4.1).
//!
//! `phys_mem::PhysicalMemory` is the seam that keeps this whole layer host-testable:
//! every frame read/write goes through it instead of a raw direct-mapped pointer, so
//! `frame_allocator`, `page_table`, and `vas` exercise real logic against
//! `phys_mem::SimPhysicalMemory` in unit tests without booting hardware.

pub mod frame_allocator;
pub mod page_table;
pub mod phys_mem;
pub mod regions;
pub mod vas;

pub use frame_allocator::FrameAllocator;
pub use phys_mem::{FrameNumber, PhysicalMemory};
pub use vas::AddressSpace;
