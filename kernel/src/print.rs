// Print macros for kernel output, following the teacher's print.rs split between a
// real x86 console path and a no-op stub for unsupported architectures.

#[cfg(target_arch = "x86")]
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::arch::x86::vga::_print(format_args!($($arg)*)));
}

#[cfg(target_arch = "x86")]
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

#[cfg(target_arch = "x86")]
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => ($crate::arch::x86::serial::_print(format_args!($($arg)*)));
}

#[cfg(target_arch = "x86")]
#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($($arg:tt)*) => ($crate::serial_print!("{}\n", format_args!($($arg)*)));
}

// Host builds have no serial UART; `logging`'s `KernelLogger` calls these
// unconditionally, so they need a stub here too.
#[cfg(not(target_arch = "x86"))]
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {};
}

#[cfg(not(target_arch = "x86"))]
#[macro_export]
macro_rules! serial_println {
    ($($arg:tt)*) => {};
}

#[cfg(not(target_arch = "x86"))]
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {};
}

#[cfg(not(target_arch = "x86"))]
#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {};
}
