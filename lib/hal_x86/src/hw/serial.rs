/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! The 16550 UART behind the PC's COM ports. The kernel only ever transmits on it, to get its log out.

use super::port::Port;
use bit_field::BitField;

pub const COM1: u16 = 0x3f8;

/*
 * Register offsets from the port's base. While the divisor latch bit of the line control register is set, the
 * first two registers hold the low and high bytes of the baud divisor instead.
 */
const DATA: u16 = 0;
const INTERRUPT_ENABLE: u16 = 1;
const FIFO_CONTROL: u16 = 2;
const LINE_CONTROL: u16 = 3;
const MODEM_CONTROL: u16 = 4;
const LINE_STATUS: u16 = 5;

/// The UART's clock divided by 16. The divisor is this over the baud rate we want.
const CLOCK: u32 = 115_200;
pub const BAUD_RATE: u32 = 38_400;

const fn divisor(baud_rate: u32) -> u16 {
    (CLOCK / baud_rate) as u16
}

const _: () = assert!(divisor(BAUD_RATE) == 3 && CLOCK % BAUD_RATE == 0);

const DIVISOR_LATCH: usize = 7;
/// 8 data bits, no parity, one stop bit.
const EIGHT_N_ONE: u8 = 0b0000_0011;
/// Enable and clear both FIFOs, interrupting at 14 bytes.
const FIFO_SETUP: u8 = 0b1100_0111;
/// DTR, RTS, and OUT2.
const MODEM_SETUP: u8 = 0b0000_1011;
const TRANSMIT_EMPTY: usize = 5;

pub struct SerialPort {
    base: u16,
}

impl SerialPort {
    pub const unsafe fn new(base: u16) -> SerialPort {
        SerialPort { base }
    }

    fn register(&self, offset: u16) -> Port<u8> {
        unsafe { Port::new(self.base + offset) }
    }

    pub unsafe fn initialize(&mut self) {
        let [low, high] = divisor(BAUD_RATE).to_le_bytes();
        let mut line_control = EIGHT_N_ONE;

        unsafe {
            self.register(INTERRUPT_ENABLE).write(0x00);

            self.register(LINE_CONTROL).write(*line_control.set_bit(DIVISOR_LATCH, true));
            self.register(DATA).write(low);
            self.register(INTERRUPT_ENABLE).write(high);
            self.register(LINE_CONTROL).write(*line_control.set_bit(DIVISOR_LATCH, false));

            self.register(FIFO_CONTROL).write(FIFO_SETUP);
            self.register(MODEM_CONTROL).write(MODEM_SETUP);
        }
    }

    fn line_status(&self) -> u8 {
        unsafe { self.register(LINE_STATUS).read() }
    }

    /// Wait for the transmit holding register to drain, then send `value`.
    pub unsafe fn write(&mut self, value: u8) {
        while !self.line_status().get_bit(TRANSMIT_EMPTY) {
            core::hint::spin_loop();
        }
        unsafe {
            self.register(DATA).write(value);
        }
    }
}
