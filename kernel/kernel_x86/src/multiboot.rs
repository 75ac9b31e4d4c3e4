/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! Just enough of the Multiboot information structure to find the modules the bootloader loaded for us.

use bit_field::BitField;
use core::slice;

/// What the bootloader leaves in `eax` if it booted us with Multiboot.
pub const BOOTLOADER_MAGIC: u32 = 0x2bad_b002;

const MODULES_VALID: usize = 3;

#[repr(C)]
struct Info {
    flags: u32,
    mem_lower: u32,
    mem_upper: u32,
    boot_device: u32,
    command_line: u32,
    modules_count: u32,
    modules_address: u32,
}

#[repr(C)]
struct Module {
    start: u32,
    end: u32,
    string: u32,
    _reserved: u32,
}

/// The contents of the first module, which is the filesystem image. This must be called before paging is
/// enabled, because the information structure usually lives in low memory that we don't map.
///
/// ### Safety
/// `info_address` must be the address the bootloader passed in `ebx`, and the module must not be overwritten
/// for as long as the returned slice is alive.
pub unsafe fn first_module(info_address: u32) -> Option<&'static [u8]> {
    let info = unsafe { &*(info_address as usize as *const Info) };
    if !info.flags.get_bit(MODULES_VALID) || info.modules_count == 0 {
        return None;
    }

    let module = unsafe { &*(info.modules_address as usize as *const Module) };
    let length = module.end.checked_sub(module.start)? as usize;
    Some(unsafe { slice::from_raw_parts(module.start as usize as *const u8, length) })
}
