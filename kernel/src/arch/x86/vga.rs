//! 80x25 VGA text-mode console.
//!
//! Shape follows the teacher's `vga_buffer` module (`JeromeCGithub-self_rust_os`):
//! a `lazy_static` `Mutex<Writer>` over a fixed physical window, a `_print` entry
//! point for the `print!`/`println!` macros, plus the kernel-owned cursor/color state
//! the syscall surface's `set_term_color`/`set_cursor_pos`/`get_cursor_pos` calls
//! mutate directly.

use core::fmt;

use lazy_static::lazy_static;
use spin::Mutex;

use super::port::outb;

const BUFFER_HEIGHT: usize = 25;
const BUFFER_WIDTH: usize = 80;
const VGA_PHYS_ADDR: usize = 0xB8000;

const CRTC_INDEX: u16 = 0x3D4;
const CRTC_DATA: u16 = 0x3D5;

bitflags::bitflags! {
    /// Foreground/background nibbles packed into the VGA attribute byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ColorCode: u8 {
        const BLACK = 0x0;
        const BLUE = 0x1;
        const GREEN = 0x2;
        const LIGHT_GRAY = 0x7;
        const WHITE = 0xF;
    }
}

impl ColorCode {
    /// Pack a foreground nibble and background nibble into one attribute byte.
    pub const fn new(foreground: u8, background: u8) -> u8 {
        (background << 4) | (foreground & 0xF)
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
struct ScreenChar {
    ascii: u8,
    color: u8,
}

#[repr(transparent)]
struct Buffer {
    chars: [[ScreenChar; BUFFER_WIDTH]; BUFFER_HEIGHT],
}

struct Writer {
    row: usize,
    col: usize,
    color: u8,
    buffer: *mut Buffer,
}

// SAFETY: the VGA text buffer is a fixed physical-memory window the BIOS/bootloader
// already direct-maps; only ever touched behind the `Mutex<Writer>` below.
unsafe impl Send for Writer {}

impl Writer {
    fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.new_line(),
            0x08 => self.backspace(),
            byte => {
                if self.col >= BUFFER_WIDTH {
                    self.new_line();
                }
                self.put(self.row, self.col, byte);
                self.col += 1;
            }
        }
        self.move_hardware_cursor();
    }

    fn backspace(&mut self) {
        if self.col > 0 {
            self.col -= 1;
        } else if self.row > 0 {
            self.row -= 1;
            self.col = BUFFER_WIDTH - 1;
        }
        self.put(self.row, self.col, b' ');
    }

    fn put(&mut self, row: usize, col: usize, byte: u8) {
        let color = self.color;
        // SAFETY: `row`/`col` are always kept within `BUFFER_HEIGHT`/`BUFFER_WIDTH`
        // by every caller in this module, and `self.buffer` is the fixed VGA window.
        unsafe {
            (*self.buffer).chars[row][col] = ScreenChar { ascii: byte, color };
        }
    }

    fn new_line(&mut self) {
        if self.row + 1 < BUFFER_HEIGHT {
            self.row += 1;
        } else {
            for row in 1..BUFFER_HEIGHT {
                for col in 0..BUFFER_WIDTH {
                    // SAFETY: indices are within bounds by construction of the loop.
                    let ch = unsafe { (*self.buffer).chars[row][col] };
                    self.put(row - 1, col, ch.ascii);
                }
            }
            let blank_row = BUFFER_HEIGHT - 1;
            for col in 0..BUFFER_WIDTH {
                self.put(blank_row, col, b' ');
            }
        }
        self.col = 0;
    }

    /// Move the hardware text-mode cursor to (row, col) via the CRTC index registers,
    /// the mechanism `get_cursor_pos`/`set_cursor_pos` expose to user space.
    fn move_hardware_cursor(&self) {
        let position = (self.row * BUFFER_WIDTH + self.col) as u16;
        // SAFETY: standard VGA CRTC cursor-location programming sequence.
        unsafe {
            outb(CRTC_INDEX, 0x0F);
            outb(CRTC_DATA, (position & 0xFF) as u8);
            outb(CRTC_INDEX, 0x0E);
            outb(CRTC_DATA, (position >> 8) as u8);
        }
    }
}

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
        Ok(())
    }
}

lazy_static! {
    static ref WRITER: Mutex<Writer> = Mutex::new(Writer {
        row: 0,
        col: 0,
        color: ColorCode::new(ColorCode::LIGHT_GRAY.bits(), ColorCode::BLACK.bits()),
        buffer: VGA_PHYS_ADDR as *mut Buffer,
    });
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use fmt::Write;
    // Disabling interrupts across the write keeps a timer tick from interleaving two
    // console writes and tearing a line in half — `print` (§4.5) is required to be
    // atomic from the caller's point of view.
    crate::arch::active::intrinsics::without_interrupts(|| {
        #[allow(clippy::unwrap_used)]
        WRITER.lock().write_fmt(args).unwrap();
    });
}

/// Set the foreground/background colors used by subsequent writes
/// (`set_term_color` syscall).
pub fn set_color(foreground: u8, background: u8) {
    WRITER.lock().color = ColorCode::new(foreground, background);
}

/// Move the cursor to an explicit row/column (`set_cursor_pos` syscall). Returns
/// `false` if the position is out of bounds.
pub fn set_cursor_pos(row: usize, col: usize) -> bool {
    if row >= BUFFER_HEIGHT || col >= BUFFER_WIDTH {
        return false;
    }
    let mut writer = WRITER.lock();
    writer.row = row;
    writer.col = col;
    writer.move_hardware_cursor();
    true
}

/// Read back the current cursor position (`get_cursor_pos` syscall).
pub fn cursor_pos() -> (usize, usize) {
    let writer = WRITER.lock();
    (writer.row, writer.col)
}
