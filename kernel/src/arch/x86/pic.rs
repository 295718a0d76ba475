//! 8259 PIC driver.
//!
//! The teacher depends on the `pic8259` crate, which is implemented against
//! `x86_64::instructions::port::Port` and therefore unavailable on an i386 target (see
//! DESIGN.md). This module is a direct, hand-rolled port of
//! `original_source/p3/410kern/x86/pic.c`'s remap-and-acknowledge sequence: two chained
//! 8259-compatible controllers, remapped so IRQ0-7 land on vectors 0x20-0x27 and
//! IRQ8-15 on 0x28-0x2F, matching `idt::TIMER_VECTOR`/`idt::KEYBOARD_VECTOR`.

use super::port::{inb, io_wait, outb};

const PIC1_COMMAND: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_COMMAND: u16 = 0xA0;
const PIC2_DATA: u16 = 0xA1;

const ICW1_INIT: u8 = 0x10;
const ICW1_ICW4: u8 = 0x01;
const ICW4_8086: u8 = 0x01;

const PIC_EOI: u8 = 0x20;

/// Remap both PICs so their interrupt vectors don't collide with CPU exceptions, then
/// mask every IRQ line except the timer and keyboard (IRQ0 and IRQ1).
///
/// # Safety
/// Must run once at boot, after the IDT's timer/keyboard gates are installed and before
/// interrupts are enabled.
pub unsafe fn init(offset1: u8, offset2: u8) {
    // SAFETY: standard 8259 remap sequence; each `outb` targets a documented PIC
    // command/data register in the order the hardware requires.
    unsafe {
        let mask1 = inb(PIC1_DATA);
        let mask2 = inb(PIC2_DATA);

        outb(PIC1_COMMAND, ICW1_INIT | ICW1_ICW4);
        io_wait();
        outb(PIC2_COMMAND, ICW1_INIT | ICW1_ICW4);
        io_wait();
        outb(PIC1_DATA, offset1);
        io_wait();
        outb(PIC2_DATA, offset2);
        io_wait();
        outb(PIC1_DATA, 4); // PIC2 is wired to IRQ2 of PIC1.
        io_wait();
        outb(PIC2_DATA, 2);
        io_wait();
        outb(PIC1_DATA, ICW4_8086);
        io_wait();
        outb(PIC2_DATA, ICW4_8086);
        io_wait();

        // Preserve the prior masks except unmask IRQ0 (timer) and IRQ1 (keyboard).
        let _ = mask2;
        outb(PIC1_DATA, mask1 & !0b0000_0011);
        outb(PIC2_DATA, 0xFF);
    }
}

/// Acknowledge an interrupt from the master PIC (and, transitively, the slave if the
/// IRQ came from it) so the controller delivers further interrupts.
///
/// # Safety
/// Must be called exactly once per serviced interrupt, from the corresponding
/// handler, with interrupts still masked.
pub unsafe fn acknowledge(irq: u8) {
    // SAFETY: EOI write to the documented command register.
    unsafe {
        if irq >= 8 {
            outb(PIC2_COMMAND, PIC_EOI);
        }
        outb(PIC1_COMMAND, PIC_EOI);
    }
}
