/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

pub mod cga;
pub mod gdt;
pub mod i8259_pic;
pub mod idt;
pub mod pit;
pub mod port;
pub mod registers;
pub mod serial;
pub mod tlb;
pub mod tss;

#[cfg(feature = "qemu")]
pub mod qemu;

#[repr(C, packed)]
pub struct DescriptorTablePointer {
    /// `base + limit` is the last addressable byte of the descriptor table.
    pub limit: u16,

    /// Linear address of the start of the descriptor table.
    pub base: u32,
}
