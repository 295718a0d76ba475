//! Programmable Interval Timer — channel 0, square-wave mode, driving the scheduler
//! tick at [`crate::config::TIMER_HZ`].
//!
//! Grounded in `original_source/p3/kern/timer_driver.c`; the reload divisor computation
//! is the standard `1193182 / hz` PIT base-frequency division.

use super::port::outb;

const PIT_BASE_FREQUENCY: u32 = 1_193_182;
const PIT_CHANNEL0_DATA: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;
const PIT_SQUARE_WAVE_CHANNEL0: u8 = 0b0011_0110;

/// Program channel 0 for a periodic interrupt at `hz` Hz.
///
/// # Safety
/// Must run once at boot, before interrupts are enabled, so the first tick doesn't
/// race the scheduler's initialization.
pub unsafe fn init(hz: u32) {
    let divisor = (PIT_BASE_FREQUENCY / hz).clamp(1, u16::MAX as u32) as u16;
    // SAFETY: standard PIT programming sequence: command byte, then low/high reload
    // bytes on the selected channel's data port.
    unsafe {
        outb(PIT_COMMAND, PIT_SQUARE_WAVE_CHANNEL0);
        outb(PIT_CHANNEL0_DATA, (divisor & 0xFF) as u8);
        outb(PIT_CHANNEL0_DATA, (divisor >> 8) as u8);
    }
}
