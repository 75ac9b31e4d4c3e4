/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! The PS/2 keyboard controller. Decoding happens in the core; we just hand it the bytes.

use hal_x86::hw::port::Port;
use kernel::{keyboard::ScancodeDecoder, terminal::Key};

const DATA_PORT: u16 = 0x60;

pub struct Keyboard {
    data: Port<u8>,
    decoder: ScancodeDecoder,
}

impl Keyboard {
    pub const unsafe fn new() -> Keyboard {
        Keyboard { data: unsafe { Port::new(DATA_PORT) }, decoder: ScancodeDecoder::new() }
    }

    /// Read the scancode that raised IRQ 1, and turn it into a key if it was a press we care about.
    pub fn read_key(&mut self) -> Option<Key> {
        let scancode = unsafe { self.data.read() };
        self.decoder.decode(scancode)
    }
}
