//! PS/2 keyboard: scancode decoding via `pc-keyboard` (architecture-agnostic — kept
//! from the teacher's dependency set unchanged) feeding a fixed ring buffer that
//! `getchar`/`readline` drain.

use lazy_static::lazy_static;
use pc_keyboard::{layouts, DecodedKey, HandleControl, Keyboard, ScancodeSet1};
use spin::Mutex;

use crate::collections::RingBuffer;
use crate::config::KEYBOARD_RING_CAPACITY;

use super::port::inb;

const DATA_PORT: u16 = 0x60;

lazy_static! {
    static ref KEYBOARD: Mutex<Keyboard<layouts::Us104Key, ScancodeSet1>> = Mutex::new(Keyboard::new(
        ScancodeSet1::new(),
        layouts::Us104Key,
        HandleControl::Ignore,
    ));
    static ref LINE_BUFFER: Mutex<RingBuffer<u8, KEYBOARD_RING_CAPACITY>> = Mutex::new(RingBuffer::new());
}

/// Called from the keyboard IRQ handler (`idt::KEYBOARD_VECTOR`). Reads the scancode
/// byte, decodes it, and pushes any resulting ASCII byte onto the line buffer that
/// user-space `readline`/`getchar` calls drain. Overflow silently drops the byte,
/// matching the original kernel's fixed keyboard buffer (spec §6 edge case).
pub fn handle_interrupt() {
    // SAFETY: reading the PS/2 data port in response to its own IRQ.
    let scancode = unsafe { inb(DATA_PORT) };
    let mut keyboard = KEYBOARD.lock();
    if let Ok(Some(event)) = keyboard.add_byte(scancode) {
        if let Some(key) = keyboard.process_keyevent(event) {
            if let DecodedKey::Unicode(ch) = key {
                if ch.is_ascii() {
                    let _ = LINE_BUFFER.lock().push(ch as u8);
                }
            }
        }
    }
}

/// Pop one buffered byte, if any (`getchar`).
pub fn pop_byte() -> Option<u8> {
    LINE_BUFFER.lock().pop()
}
