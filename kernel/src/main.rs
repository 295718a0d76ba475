//! Kernel boot binary: the thin `_start` GRUB/multiboot jumps to once it has loaded
//! this image and set up an initial stack, before any Rust code has run.
//!
//! Grounded in the teacher's own `main.rs` `_start`/panic-handler split: bring up the
//! heap, print a banner, and hand off to [`bootstrap::boot`]. Everything else (GDT,
//! IDT, PIC, PIT, the first processes) is `bootstrap`'s job, not this file's.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use pebbles_kernel::arch::x86::intrinsics;
use pebbles_kernel::config::{KERNEL_HEAP_SIZE, KERNEL_HEAP_START};
use pebbles_kernel::{bootstrap, println, serial_println};

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    println!("[KERNEL PANIC] {}", info);
    serial_println!("[KERNEL PANIC] {}", info);
    loop {
        intrinsics::halt();
    }
}

#[no_mangle]
pub extern "C" fn _start() -> ! {
    // SAFETY: called exactly once, before any other kernel code runs, and
    // `KERNEL_HEAP_START..KERNEL_HEAP_START + KERNEL_HEAP_SIZE` names a region the
    // loader reserves below `KERNEL_STACK_REGION_BASE` for exactly this purpose.
    unsafe {
        pebbles_kernel::get_allocator()
            .lock()
            .init(KERNEL_HEAP_START as *mut u8, KERNEL_HEAP_SIZE);
    }

    println!("pebbles-kernel v{}", env!("CARGO_PKG_VERSION"));
    bootstrap::boot();
}
