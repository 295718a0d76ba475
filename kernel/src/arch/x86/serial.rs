//! 16550-compatible UART driver, port-mapped at COM1 (0x3F8).
//!
//! The teacher reaches for the `uart_16550` crate, which — like `pic8259` — is built
//! against `x86_64::instructions::port::Port` and isn't usable on an i386 target (see
//! DESIGN.md). This is a direct hand port of the same programming sequence against
//! `super::port`, kept to the subset this kernel needs: polled transmit, no receive
//! path (console input comes from the PS/2 keyboard, not the serial line).

use lazy_static::lazy_static;
use spin::Mutex;

use super::port::inb;
use super::port::outb;

const COM1_BASE: u16 = 0x3F8;

const DATA: u16 = COM1_BASE;
const INTERRUPT_ENABLE: u16 = COM1_BASE + 1;
const FIFO_CONTROL: u16 = COM1_BASE + 2;
const LINE_CONTROL: u16 = COM1_BASE + 3;
const MODEM_CONTROL: u16 = COM1_BASE + 4;
const LINE_STATUS: u16 = COM1_BASE + 5;

const LINE_STATUS_THR_EMPTY: u8 = 0x20;

struct SerialPort;

impl SerialPort {
    /// # Safety
    /// Must run once at boot; reprograms the UART's baud-rate divisor and line mode.
    unsafe fn init() -> Self {
        // SAFETY: standard 16550 initialization sequence — disable interrupts, set the
        // divisor latch, program 8N1, then enable the FIFO and assert DTR/RTS/OUT2.
        unsafe {
            outb(INTERRUPT_ENABLE, 0x00);
            outb(LINE_CONTROL, 0x80);
            outb(DATA, 0x03); // divisor low byte: 38400 baud
            outb(INTERRUPT_ENABLE, 0x00); // divisor high byte
            outb(LINE_CONTROL, 0x03); // 8 bits, no parity, one stop bit
            outb(FIFO_CONTROL, 0xC7);
            outb(MODEM_CONTROL, 0x0B);
        }
        Self
    }

    fn write_byte(&mut self, byte: u8) {
        // SAFETY: polling a read-only status bit before writing the data port, the
        // documented handshake for a 16550's transmit-holding register.
        unsafe {
            while inb(LINE_STATUS) & LINE_STATUS_THR_EMPTY == 0 {}
            outb(DATA, byte);
        }
    }
}

impl core::fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
        Ok(())
    }
}

lazy_static! {
    static ref SERIAL1: Mutex<SerialPort> = {
        // SAFETY: runs once, at first use, before any concurrent access is possible.
        Mutex::new(unsafe { SerialPort::init() })
    };
}

#[doc(hidden)]
pub fn _print(args: core::fmt::Arguments) {
    use core::fmt::Write;
    crate::arch::active::intrinsics::without_interrupts(|| {
        #[allow(clippy::unwrap_used)]
        SERIAL1.lock().write_fmt(args).unwrap();
    });
}
