/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! The Motorola MC146818 real-time clock, which we only use for its periodic interrupt (IRQ 8).

use core::sync::atomic::{AtomicBool, Ordering};
use hal_x86::hw::port::Port;
use tracing::trace;

const INDEX_PORT: u16 = 0x70;
const DATA_PORT: u16 = 0x71;

/// Setting this bit of the index masks NMIs while we're halfway through talking to the chip.
const DISABLE_NMI: u8 = 0x80;
const REGISTER_A: u8 = 0x0a;
const REGISTER_B: u8 = 0x0b;
const REGISTER_C: u8 = 0x0c;

const PERIODIC_INTERRUPT_ENABLE: u8 = 1 << 6;
const DEFAULT_FREQUENCY: u32 = 2;

/// Set by the interrupt handler, and consumed by whichever `read` of the RTC is waiting for it.
static TICKED: AtomicBool = AtomicBool::new(false);

pub struct Rtc {
    index: Port<u8>,
    data: Port<u8>,
}

impl Rtc {
    pub const unsafe fn new() -> Rtc {
        Rtc { index: unsafe { Port::new(INDEX_PORT) }, data: unsafe { Port::new(DATA_PORT) } }
    }

    fn read_register(&mut self, register: u8) -> u8 {
        unsafe {
            self.index.write(DISABLE_NMI | register);
            self.data.read()
        }
    }

    fn write_register(&mut self, register: u8, value: u8) {
        unsafe {
            self.index.write(DISABLE_NMI | register);
            self.data.write(value);
        }
    }

    /// Turn on the periodic interrupt. It's left running for good; `read` just ignores ticks nobody asked for.
    pub fn enable_periodic_interrupt(&mut self) {
        let b = self.read_register(REGISTER_B);
        self.write_register(REGISTER_B, b | PERIODIC_INTERRUPT_ENABLE);
        self.set_rate(DEFAULT_FREQUENCY);
    }

    /// The chip divides 32768 Hz by `2^(rate - 1)`, so a power-of-two frequency maps straight onto a rate.
    fn set_rate(&mut self, frequency: u32) {
        let rate = 16 - frequency.trailing_zeros() as u8;
        let a = self.read_register(REGISTER_A);
        self.write_register(REGISTER_A, (a & 0xf0) | (rate & 0x0f));
        trace!("RTC running at {} Hz (rate {})", frequency, rate);
    }
}

impl kernel::Rtc for Rtc {
    fn open(&mut self) {
        self.set_rate(DEFAULT_FREQUENCY);
        TICKED.store(false, Ordering::Release);
    }

    fn set_frequency(&mut self, frequency: u32) {
        self.set_rate(frequency);
    }

    fn take_tick(&mut self) -> bool {
        TICKED.swap(false, Ordering::AcqRel)
    }

    fn close(&mut self) {}
}

/// Called from IRQ 8. Register C has to be read, or the chip won't raise the interrupt again.
pub fn handle_interrupt() {
    let mut rtc = unsafe { Rtc::new() };
    rtc.read_register(REGISTER_C);
    TICKED.store(true, Ordering::Release);
}
