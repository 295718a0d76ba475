//! Boot-time constants for the kernel core.
//!
//! Grouped the way the teacher groups `FRAME_SIZE`, `MAX_PROCESSES`, and
//! `MAX_THREADS_PER_PROCESS`: small `const` items rather than a runtime config file,
//! since nothing below the disk driver can read a config file before it is up.

/// Size of one physical frame / virtual page.
pub const PAGE_SIZE: usize = 4096;

/// Boundary between the direct-mapped kernel window and user-controlled address space.
pub const USER_MEM_START: usize = 0x0100_0000;

/// Size of a thread's kernel stack (two pages, matching `original_source`'s
/// `KERNEL_STACK_SIZE`).
pub const KERNEL_STACK_SIZE: usize = 2 * PAGE_SIZE;

/// Base of the kernel-stack region carved out of the direct-mapped kernel window,
/// below `USER_MEM_START`. `process::kstack` bump-allocates `KERNEL_STACK_SIZE`-sized
/// slots from here, one per live thread.
pub const KERNEL_STACK_REGION_BASE: usize = 0x0020_0000;

/// Start of the kernel heap `main` hands to `linked_list_allocator`, placed just past
/// where the kernel image itself is linked and ending exactly at
/// `KERNEL_STACK_REGION_BASE` so the two regions never overlap.
pub const KERNEL_HEAP_START: usize = 0x0010_0000;

/// Size of the kernel heap (1 MiB).
pub const KERNEL_HEAP_SIZE: usize = KERNEL_STACK_REGION_BASE - KERNEL_HEAP_START;

/// Timer frequency in Hz (PIT channel 0, square-wave mode).
pub const TIMER_HZ: u32 = 100;

/// Upper bound on live processes, sized generously for a teaching workload.
pub const MAX_PROCESSES: usize = 4096;

/// Upper bound on live threads across the whole system.
pub const MAX_THREADS: usize = 8192;

/// Bucket count for the pid/tid lookup hashtables.
pub const PROC_TABLE_BUCKETS: usize = 256;

/// Bucket count for a fresh per-address-space allocated-region map.
pub const REGION_TABLE_BUCKETS: usize = 64;

/// Bucket count for a fresh memlock channel table.
pub const MEMLOCK_TABLE_BUCKETS: usize = 128;

/// Capacity of the keyboard scancode ring buffer.
pub const KEYBOARD_RING_CAPACITY: usize = 256;

/// Maximum bytes accepted in one `print`/`readline` call, bounding the kernel staging
/// buffer used while a user pointer is validated and copied.
pub const MAX_CONSOLE_CHUNK: usize = 4096;

/// Disk partition type code identifying the P4 filesystem partition.
pub const FS_PARTITION_TYPE: u8 = 0xAA;

/// Bytes per disk sector (IDE_SECTOR_SIZE in `original_source`).
pub const SECTOR_SIZE: usize = 512;

/// Longest executable name the boot catalogue / on-disk file-node list will compare
/// (`MAX_EXECNAME_LEN` in `original_source`).
pub const MAX_EXECNAME_LEN: usize = 32;

/// Top of the user address range a freshly `exec`'d stack is built down from
/// (`USER_STACK_TOP` in `original_source/p3/kern/loader.c`).
pub const USER_STACK_TOP: u32 = 0xFFFF_FFFF;

/// Total physical frames `bootstrap` hands the frame allocator, standing in for the
/// original's `machine_phys_frames()` multiboot query (this crate has no multiboot
/// memory-map parser; the teaching kernel's QEMU target is always booted with a fixed
/// amount of RAM). 8192 frames is 32 MiB, comfortably above `USER_MEM_START`.
pub const TOTAL_PHYS_FRAMES: u32 = 8192;
