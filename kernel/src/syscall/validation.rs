/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! Pointers passed in from userspace are untrusted. Every access goes through the page tables to check that
//! the process could have made it itself, and is split at page boundaries so each piece is reached through a
//! single, checked translation.

use crate::{
    memory::{Access, AddressSpace, Mapping},
    Platform,
};
use hal::memory::{Page, Size4KiB, VAddr};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UserAccessError {
    /// Part of the range isn't mapped, or isn't accessible from userspace.
    NotMapped,
    /// Part of the range is mapped read-only.
    NotWritable,
    /// A string didn't end within the space allowed for it.
    TooLong,
}

/// A buffer in userspace, described by its address and length.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct UserSlice {
    address: VAddr,
    length: usize,
}

impl UserSlice {
    pub fn new(address: u32, length: usize) -> UserSlice {
        UserSlice { address: VAddr::new(address as usize), length }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The part of this slice starting `offset` bytes in, at most `length` long.
    pub fn subslice(&self, offset: usize, length: usize) -> UserSlice {
        let offset = usize::min(offset, self.length);
        UserSlice { address: self.address + offset, length: usize::min(length, self.length - offset) }
    }

    /// Split the slice into pieces that each lie within one page, translating each. Returns an error, and
    /// visits nothing, if any part of the slice fails to translate.
    fn for_each_piece<F>(&self, space: &AddressSpace, access: Access, mut f: F) -> Result<(), UserAccessError>
    where
        F: FnMut(usize, Mapping, usize),
    {
        self.validate(space, access)?;

        let mut done = 0;
        while done < self.length {
            let virt = self.address + done;
            let count = usize::min(Page::<Size4KiB>::contains(virt).remaining_after(virt), self.length - done);
            let mapping = space.translate(virt, access).ok_or(UserAccessError::NotMapped)?;
            f(done, mapping, count);
            done += count;
        }
        Ok(())
    }

    /// Check the whole slice can be accessed as `access`, without touching it.
    pub fn validate(&self, space: &AddressSpace, access: Access) -> Result<(), UserAccessError> {
        if self.length == 0 {
            return Ok(());
        }
        let last = self.address.checked_add(self.length - 1).ok_or(UserAccessError::NotMapped)?;

        let mut page = Page::<Size4KiB>::contains(self.address);
        loop {
            if space.translate(page.start, access).is_none() {
                return Err(match (access, space.translate(page.start, Access::UserRead)) {
                    (Access::UserWrite, Some(_)) => UserAccessError::NotWritable,
                    _ => UserAccessError::NotMapped,
                });
            }
            if page == Page::contains(last) {
                return Ok(());
            }
            page = page + 1;
        }
    }

    /// Copy the slice into `buffer`, which must be at least as long.
    pub fn read<P: Platform>(
        &self,
        space: &AddressSpace,
        platform: &P,
        buffer: &mut [u8],
    ) -> Result<(), UserAccessError> {
        assert!(buffer.len() >= self.length);
        self.for_each_piece(space, Access::UserRead, |offset, mapping, count| unsafe {
            platform.read_memory(mapping, &mut buffer[offset..(offset + count)]);
        })
    }

    /// Copy `data`, which must be no longer than the slice, into the start of the slice.
    pub fn write<P: Platform>(&self, space: &AddressSpace, platform: &mut P, data: &[u8]) -> Result<(), UserAccessError> {
        assert!(data.len() <= self.length);
        self.subslice(0, data.len()).for_each_piece(space, Access::UserWrite, |offset, mapping, count| unsafe {
            platform.write_memory(mapping, &data[offset..(offset + count)]);
        })
    }
}

/// A NUL-terminated string in userspace.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct UserString {
    address: VAddr,
}

impl UserString {
    pub fn new(address: u32) -> UserString {
        UserString { address: VAddr::new(address as usize) }
    }

    /// Copy the string, without its terminator, into `buffer`. Fails with `TooLong` if the terminator isn't
    /// within `buffer.len()` bytes.
    pub fn read<'b, P: Platform>(
        &self,
        space: &AddressSpace,
        platform: &P,
        buffer: &'b mut [u8],
    ) -> Result<&'b [u8], UserAccessError> {
        let mut done = 0;
        loop {
            let virt = self.address.checked_add(done).ok_or(UserAccessError::NotMapped)?;
            let mapping = space.translate(virt, Access::UserRead).ok_or(UserAccessError::NotMapped)?;
            let count = usize::min(Page::<Size4KiB>::contains(virt).remaining_after(virt), buffer.len() - done);
            if count == 0 {
                return Err(UserAccessError::TooLong);
            }

            unsafe {
                platform.read_memory(mapping, &mut buffer[done..(done + count)]);
            }
            if let Some(length) = buffer[done..(done + count)].iter().position(|&c| c == b'\0') {
                return Ok(&buffer[..(done + length)]);
            }
            done += count;
        }
    }
}
