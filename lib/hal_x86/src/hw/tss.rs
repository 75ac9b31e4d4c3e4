/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use core::mem;
use hal::memory::VAddr;

/// We don't use hardware task switching, so the TSS is only used to tell the processor which stack to switch to
/// when an interrupt or system call arrives from Ring 3 (`esp0` and `ss0`).
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct Tss {
    pub link: u32,
    pub esp0: u32,
    pub ss0: u32,
    pub esp1: u32,
    pub ss1: u32,
    pub esp2: u32,
    pub ss2: u32,
    pub cr3: u32,
    pub eip: u32,
    pub eflags: u32,
    pub general: [u32; 8],
    pub segments: [u32; 6],
    pub ldt: u32,
    pub trap: u16,
    pub iomap_base: u16,
}

impl Tss {
    pub const fn new(kernel_data_selector: u16) -> Tss {
        Tss {
            link: 0,
            esp0: 0,
            ss0: kernel_data_selector as u32,
            esp1: 0,
            ss1: 0,
            esp2: 0,
            ss2: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            general: [0; 8],
            segments: [0; 6],
            ldt: 0,
            trap: 0,
            iomap_base: mem::size_of::<Tss>() as u16,
        }
    }

    pub fn set_kernel_stack(&mut self, stack_pointer: VAddr) {
        self.esp0 = u32::from(stack_pointer);
    }
}
