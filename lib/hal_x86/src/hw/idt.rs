/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use super::{
    gdt::{PrivilegeLevel, KERNEL_CODE_SELECTOR},
    DescriptorTablePointer,
};
use bit_field::BitField;
use core::{arch::asm, mem};

/*
 * `flags` looks like:
 *    7                           0
 *  +---+---+---+---+---+---+---+---+
 *  | P |  DPL  | 0 |    GateType   |
 *  +---+---+---+---+---+---+---+---+
 *
 *  P = Present
 *  DPL = Descriptor Privilege Level
 */
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct IdtEntry {
    address_0_15: u16,
    segment_selector: u16,
    _zero: u8,
    flags: u8,
    address_16_31: u16,
}

/// Handlers are entered by the processor, not called, so they're written in assembly.
pub type HandlerFunc = unsafe extern "C" fn();

impl IdtEntry {
    pub const fn missing() -> IdtEntry {
        IdtEntry { address_0_15: 0, segment_selector: 0, _zero: 0, flags: 0, address_16_31: 0 }
    }

    /// Install a 32-bit interrupt gate to `handler`. Interrupt gates clear `IF` on entry, so every handler starts
    /// with maskable interrupts disabled.
    pub fn set_handler(&mut self, handler: HandlerFunc) -> &mut Self {
        let address = handler as usize as u32;
        self.address_0_15 = address.get_bits(0..16) as u16;
        self.address_16_31 = address.get_bits(16..32) as u16;
        self.segment_selector = KERNEL_CODE_SELECTOR.0;

        let mut flags: u8 = 0;
        flags.set_bits(0..4, 0b1110);
        flags.set_bit(7, true);
        self.flags = flags;
        self
    }

    /// Set the lowest privilege level that can invoke this gate with `int`.
    pub fn set_privilege_level(&mut self, level: PrivilegeLevel) -> &mut Self {
        self.flags.set_bits(5..7, level as u8);
        self
    }
}

#[repr(C, align(8))]
pub struct Idt {
    entries: [IdtEntry; 256],
}

impl Idt {
    pub const fn empty() -> Idt {
        Idt { entries: [IdtEntry::missing(); 256] }
    }

    pub fn entry(&mut self, vector: u8) -> &mut IdtEntry {
        &mut self.entries[vector as usize]
    }

    /// Load this IDT. It must not move for as long as it is loaded.
    pub unsafe fn load(&self) {
        let pointer = DescriptorTablePointer {
            base: self as *const Idt as usize as u32,
            limit: (mem::size_of::<Idt>() - 1) as u16,
        };

        unsafe {
            asm!("lidt [{}]", in(reg) &pointer);
        }
    }
}
