/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use super::port::Port;

/// The frequency the PIT's oscillator runs at.
pub const BASE_FREQUENCY: u32 = 1_193_180;

/// Channel 0, access lobyte/hibyte, mode 3 (square wave), binary.
const SQUARE_WAVE_CHANNEL_0: u8 = 0x36;

pub struct Pit {
    channel_0: Port<u8>,
    command: Port<u8>,
}

impl Pit {
    pub const unsafe fn new() -> Pit {
        unsafe { Pit { channel_0: Port::new(0x40), command: Port::new(0x43) } }
    }

    /// Make channel 0 (connected to IRQ0) fire at `frequency` Hz.
    pub fn set_frequency(&mut self, frequency: u32) {
        let divisor = BASE_FREQUENCY / frequency;
        unsafe {
            self.command.write(SQUARE_WAVE_CHANNEL_0);
            self.channel_0.write(divisor as u8);
            self.channel_0.write((divisor >> 8) as u8);
        }
    }
}
