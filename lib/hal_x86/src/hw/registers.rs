/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

/// Bit of `CR0` that enables paging.
pub const CR0_ENABLE_PAGING: u32 = 1 << 31;
/// Bit of `CR4` that allows page-directory entries to map 4 MiB pages.
pub const CR4_ENABLE_PAGE_SIZE_EXTENSION: u32 = 1 << 4;
/// Bit of `CR4` that enables global pages.
pub const CR4_ENABLE_GLOBAL_PAGES: u32 = 1 << 7;

/// Bit of `EFLAGS` that enables maskable interrupts.
pub const EFLAGS_INTERRUPT_ENABLE: u32 = 1 << 9;

#[macro_export]
macro_rules! read_control_reg {
    ($reg: ident) => {{
        let result: u32;
        unsafe {
            core::arch::asm!(concat!("mov {}, ", stringify!($reg)), out(reg) result);
        }
        result
    }};
}

/// Write to a control register. This is unsafe because the caller must make sure the new value leaves the
/// processor in a state it can keep executing in (e.g. loading a `CR3` that maps the running code).
#[macro_export]
macro_rules! write_control_reg {
    ($reg: ident, $value: expr) => {
        core::arch::asm!(concat!("mov ", stringify!($reg), ", {}"), in(reg) $value as u32)
    };
}

pub use crate::{read_control_reg, write_control_reg};

/// Read the current value of `EFLAGS`.
pub fn read_flags() -> u32 {
    let flags: u32;
    unsafe {
        core::arch::asm!("pushfd", "pop {}", out(reg) flags);
    }
    flags
}
