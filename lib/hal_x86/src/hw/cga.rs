/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use super::port::Port;

pub const COLUMNS: usize = 80;

/// The CRT controller of a CGA-compatible text-mode display. We only use it to move the hardware cursor.
pub struct CrtController {
    index: Port<u8>,
    data: Port<u8>,
}

impl CrtController {
    pub const unsafe fn new() -> CrtController {
        unsafe { CrtController { index: Port::new(0x3d4), data: Port::new(0x3d5) } }
    }

    pub fn set_cursor(&mut self, x: usize, y: usize) {
        let position = (y * COLUMNS + x) as u16;
        unsafe {
            self.index.write(0x0f);
            self.data.write(position as u8);
            self.index.write(0x0e);
            self.data.write((position >> 8) as u8);
        }
    }
}
