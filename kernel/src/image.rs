/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! Programs are flat images linked to run at `PROGRAM_IMAGE_ADDRESS`. We only look at enough of the ELF header
//! to check that a file is meant to be executed, and to find where to start it.

use crate::{memory::layout, syscall::ExecuteError};
use hal::memory::VAddr;

pub const MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ENTRY_POINT_OFFSET: usize = 24;
/// How much of the start of a file needs reading to find its entry point.
pub const HEADER_LENGTH: usize = ENTRY_POINT_OFFSET + 4;

/// Check the magic and extract the entry point from the start of an image.
pub fn entry_point(header: &[u8]) -> Result<VAddr, ExecuteError> {
    if header.len() < HEADER_LENGTH || header[0..4] != MAGIC {
        return Err(ExecuteError::NotExecutable);
    }

    let entry = &header[ENTRY_POINT_OFFSET..HEADER_LENGTH];
    Ok(VAddr::new(u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]) as usize))
}

/// Whether `entry` lands inside an image of `length` bytes loaded at the usual address.
pub fn entry_within_image(entry: VAddr, length: usize) -> bool {
    entry >= layout::PROGRAM_IMAGE_ADDRESS && entry < layout::PROGRAM_IMAGE_ADDRESS + length
}
