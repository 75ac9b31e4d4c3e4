/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! QEMU's `isa-debug-exit` device, so a kernel running under test can end the emulator with a status.

use super::port::Port;
use core::arch::asm;

/// Where the device is attached (`-device isa-debug-exit,iobase=0xf4,iosize=0x04`).
const DEBUG_EXIT: u16 = 0xf4;

/// QEMU exits with `(code << 1) | 1`, so these come out as `0x21` and `0x23`. Neither can be mistaken for QEMU
/// failing by itself, which exits with `1`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u32)]
pub enum ExitCode {
    Success = 0x10,
    Failed = 0x11,
}

pub struct ExitPort(Port<u32>);

impl ExitPort {
    pub unsafe fn new() -> ExitPort {
        ExitPort(unsafe { Port::new(DEBUG_EXIT) })
    }

    pub fn exit(mut self, code: ExitCode) -> ! {
        unsafe {
            self.0.write(code as u32);
        }

        // Without the device, the write does nothing
        loop {
            unsafe {
                asm!("cli", "hlt");
            }
        }
    }
}
