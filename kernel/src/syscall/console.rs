//! `print`/`readline`/`getchar`/`set_term_color`/`set_cursor_pos`/`get_cursor_pos`
//! (spec §4.5 "Console and keyboard"), against the `ConsoleDevice`/`KeyboardSource`
//! traits spec §6.1 calls for — the VGA text driver and PS/2 scancode decoding are
//! out of scope as *drivers* (spec §1), so this module never names `arch::x86::vga`
//! or `arch::x86::keyboard` except inside the thin bare-metal adapters below.

use alloc::vec;
use alloc::vec::Vec;

use crate::config::MAX_CONSOLE_CHUNK;
use crate::error::{KernelError, KernelResult};
use crate::mm::phys_mem::FrameNumber;
use crate::mm::vas::{copy_from_user, copy_to_user};
use crate::mm::PhysicalMemory;
use crate::process::ids::Pid;
use crate::process::table;
use crate::sync::SpinLock;

/// The console as `print`/`set_term_color`/`set_cursor_pos`/`get_cursor_pos` see it.
pub trait ConsoleDevice {
    fn write(&self, bytes: &[u8]);
    fn set_color(&self, foreground: u8, background: u8);
    fn set_cursor_pos(&self, row: usize, col: usize) -> bool;
    fn cursor_pos(&self) -> (usize, usize);
}

/// The keyboard ring as `readline`/`getchar` see it: a non-blocking pop, since
/// blocking-until-available is this module's job (spec §4.5), not the driver's.
pub trait KeyboardSource {
    fn pop_byte(&self) -> Option<u8>;
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub struct Vga;

#[cfg(all(target_arch = "x86", target_os = "none"))]
impl ConsoleDevice for Vga {
    fn write(&self, bytes: &[u8]) {
        // User programs on this ABI write ASCII terminal text; byte-as-char is exact
        // for that range and keeps this adapter from needing its own VGA-buffer access.
        for &b in bytes {
            crate::arch::x86::vga::_print(format_args!("{}", b as char));
        }
    }

    fn set_color(&self, foreground: u8, background: u8) {
        crate::arch::x86::vga::set_color(foreground, background);
    }

    fn set_cursor_pos(&self, row: usize, col: usize) -> bool {
        crate::arch::x86::vga::set_cursor_pos(row, col)
    }

    fn cursor_pos(&self) -> (usize, usize) {
        crate::arch::x86::vga::cursor_pos()
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub struct Ps2Keyboard;

#[cfg(all(target_arch = "x86", target_os = "none"))]
impl KeyboardSource for Ps2Keyboard {
    fn pop_byte(&self) -> Option<u8> {
        crate::arch::x86::keyboard::pop_byte()
    }
}

/// In-memory stand-in good enough to exercise this module's logic in host tests
/// (spec §6.1) — records every write and tracks row/col the same way the real VGA
/// driver does, without touching any hardware port.
#[cfg(any(test, not(target_os = "none")))]
pub struct MockConsole {
    pub written: SpinLock<Vec<u8>>,
    pub color: SpinLock<(u8, u8)>,
    pub cursor: SpinLock<(usize, usize)>,
}

#[cfg(any(test, not(target_os = "none")))]
impl MockConsole {
    pub fn new() -> Self {
        Self {
            written: SpinLock::new(Vec::new()),
            color: SpinLock::new((7, 0)),
            cursor: SpinLock::new((0, 0)),
        }
    }
}

#[cfg(any(test, not(target_os = "none")))]
impl Default for MockConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, not(target_os = "none")))]
impl ConsoleDevice for MockConsole {
    fn write(&self, bytes: &[u8]) {
        self.written.lock().extend_from_slice(bytes);
    }

    fn set_color(&self, foreground: u8, background: u8) {
        *self.color.lock() = (foreground, background);
    }

    fn set_cursor_pos(&self, row: usize, col: usize) -> bool {
        if row >= 25 || col >= 80 {
            return false;
        }
        *self.cursor.lock() = (row, col);
        true
    }

    fn cursor_pos(&self) -> (usize, usize) {
        *self.cursor.lock()
    }
}

/// In-memory stand-in for the keyboard ring buffer.
#[cfg(any(test, not(target_os = "none")))]
pub struct MockKeyboard {
    pub queued: SpinLock<alloc::collections::VecDeque<u8>>,
}

#[cfg(any(test, not(target_os = "none")))]
impl MockKeyboard {
    pub fn new() -> Self {
        Self {
            queued: SpinLock::new(alloc::collections::VecDeque::new()),
        }
    }

    pub fn push(&self, byte: u8) {
        self.queued.lock().push_back(byte);
    }
}

#[cfg(any(test, not(target_os = "none")))]
impl Default for MockKeyboard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, not(target_os = "none")))]
impl KeyboardSource for MockKeyboard {
    fn pop_byte(&self) -> Option<u8> {
        self.queued.lock().pop_front()
    }
}

fn page_directory_for(pid: Pid) -> KernelResult<FrameNumber> {
    table::page_directory(pid)
}

/// `print(len, buf)` (spec §4.5): validate and copy the buffer to a kernel staging
/// area before writing it to the console atomically, so a faulting `buf` never
/// leaves the console half-written.
pub fn print(
    pid: Pid,
    mem: &impl PhysicalMemory,
    buf_va: u32,
    len: u32,
    console: &impl ConsoleDevice,
) -> KernelResult<()> {
    if len == 0 || len as usize > MAX_CONSOLE_CHUNK {
        return Err(KernelError::InvalidArgument);
    }
    let pd = page_directory_for(pid)?;
    let mut staging = vec![0u8; len as usize];
    copy_from_user(mem, pd, buf_va, &mut staging)?;
    console.write(&staging);
    Ok(())
}

/// `getchar` (spec §4.5): one character, no echo. Returns `WouldBlock` when the ring
/// is empty — the caller (syscall dispatch's suspension-point handling) retries after
/// a deschedule, the same pattern `sync` primitives use.
pub fn getchar(keyboard: &impl KeyboardSource) -> KernelResult<u8> {
    keyboard.pop_byte().ok_or(KernelError::WouldBlock)
}

/// `readline(len, buf)` (spec §4.5): accumulate into a kernel staging buffer, echoing
/// each character and honoring backspace, until a newline or `len` bytes are
/// collected, then copy the result into user space in one final copy. Returns
/// `WouldBlock` (rather than spinning here) when no newline has arrived yet and the
/// ring is currently empty — callers loop this the same way `sync` primitives loop
/// their try-or-enqueue half.
pub fn readline(
    pid: Pid,
    mem: &mut impl PhysicalMemory,
    buf_va: u32,
    len: u32,
    keyboard: &impl KeyboardSource,
    console: &impl ConsoleDevice,
    staging: &mut Vec<u8>,
) -> KernelResult<Option<u32>> {
    if len == 0 || len as usize > MAX_CONSOLE_CHUNK {
        return Err(KernelError::InvalidArgument);
    }
    loop {
        let Some(byte) = keyboard.pop_byte() else {
            return Ok(None); // caller reschedules and retries
        };
        match byte {
            b'\n' => {
                console.write(b"\n");
                staging.push(b'\n');
                break;
            }
            0x08 => {
                if staging.pop().is_some() {
                    console.write(&[0x08]);
                }
            }
            byte => {
                if (staging.len() as u32) < len {
                    staging.push(byte);
                    console.write(&[byte]);
                }
            }
        }
        if staging.len() as u32 >= len {
            break;
        }
    }
    let pd = page_directory_for(pid)?;
    copy_to_user(mem, pd, buf_va, staging)?;
    Ok(Some(staging.len() as u32))
}

pub fn set_term_color(foreground: u8, background: u8, console: &impl ConsoleDevice) -> KernelResult<()> {
    console.set_color(foreground, background);
    Ok(())
}

pub fn set_cursor_pos(row: usize, col: usize, console: &impl ConsoleDevice) -> KernelResult<()> {
    if console.set_cursor_pos(row, col) {
        Ok(())
    } else {
        Err(KernelError::InvalidArgument)
    }
}

pub fn get_cursor_pos(console: &impl ConsoleDevice) -> (usize, usize) {
    console.cursor_pos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PAGE_SIZE, USER_MEM_START};
    use crate::mm::phys_mem::SimPhysicalMemory;
    use crate::mm::FrameAllocator;

    const TOTAL_FRAMES: u32 = (USER_MEM_START / PAGE_SIZE) as u32 + 16;

    fn fresh_process() -> (SimPhysicalMemory, FrameAllocator, Pid, u32) {
        let mut mem = SimPhysicalMemory::new(TOTAL_FRAMES as usize);
        let mut frames = FrameAllocator::new(TOTAL_FRAMES);
        let (pid, _tid) = table::new_process(
            None,
            &mut mem,
            &mut frames,
            0x1000,
            crate::arch::active::context::Regs::default(),
        )
        .unwrap();
        let base = USER_MEM_START as u32;
        table::checkin_address_space(pid, {
            let mut vas = table::checkout_address_space(pid).unwrap();
            vas.new_pages(&mut mem, &mut frames, base, PAGE_SIZE as u32, true).unwrap();
            vas
        });
        (mem, frames, pid, base)
    }

    #[test]
    fn print_writes_the_validated_buffer_to_the_console() {
        let (mut mem, _frames, pid, base) = fresh_process();
        let pd = table::page_directory(pid).unwrap();
        copy_to_user(&mut mem, pd, base, b"hi").unwrap();
        let console = MockConsole::new();
        print(pid, &mem, base, 2, &console).unwrap();
        assert_eq!(*console.written.lock(), b"hi");
    }

    #[test]
    fn getchar_reports_would_block_on_an_empty_ring() {
        let keyboard = MockKeyboard::new();
        assert_eq!(getchar(&keyboard).unwrap_err(), KernelError::WouldBlock);
        keyboard.push(b'x');
        assert_eq!(getchar(&keyboard).unwrap(), b'x');
    }

    #[test]
    fn readline_echoes_and_honors_backspace() {
        let (mut mem, _frames, pid, base) = fresh_process();
        let keyboard = MockKeyboard::new();
        let console = MockConsole::new();
        for &b in b"hX\x08i\n" {
            keyboard.push(b);
        }
        let mut staging = Vec::new();
        let n = readline(pid, &mut mem, base, 16, &keyboard, &console, &mut staging)
            .unwrap()
            .unwrap();
        assert_eq!(n, 3); // "hi\n"
        let pd = table::page_directory(pid).unwrap();
        let mut out = vec![0u8; 3];
        copy_from_user(&mem, pd, base, &mut out).unwrap();
        assert_eq!(out, b"hi\n");
        assert_eq!(*console.written.lock(), b"hX\x08i\n");
    }

    #[test]
    fn readline_returns_none_when_no_newline_yet() {
        let (mut mem, _frames, pid, base) = fresh_process();
        let keyboard = MockKeyboard::new();
        let console = MockConsole::new();
        keyboard.push(b'h');
        let mut staging = Vec::new();
        assert!(readline(pid, &mut mem, base, 16, &keyboard, &console, &mut staging)
            .unwrap()
            .is_none());
    }

    #[test]
    fn set_cursor_pos_rejects_out_of_bounds() {
        let console = MockConsole::new();
        assert_eq!(
            set_cursor_pos(100, 0, &console).unwrap_err(),
            KernelError::InvalidArgument
        );
        assert!(set_cursor_pos(1, 1, &console).is_ok());
        assert_eq!(get_cursor_pos(&console), (1, 1));
    }
}
