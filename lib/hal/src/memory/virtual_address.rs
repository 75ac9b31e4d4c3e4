/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use bit_field::BitField;
use core::{
    fmt,
    ops::{Add, AddAssign, Sub, SubAssign},
};

/// Represents a 32-bit virtual address. Any 32-bit value is a valid virtual address, but values wider than that
/// are truncated, because the core sometimes runs on a 64-bit host.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
#[repr(transparent)]
pub struct VAddr(usize);

impl VAddr {
    pub const fn new(address: usize) -> VAddr {
        VAddr(address & (u32::MAX as usize))
    }

    pub const fn ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    pub const fn mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    /// The index of the page-directory entry that translates this address (bits 22..32).
    pub fn directory_index(self) -> usize {
        self.0.get_bits(22..32)
    }

    /// The index of the page-table entry that translates this address, if it is mapped by a 4 KiB page
    /// (bits 12..22).
    pub fn table_index(self) -> usize {
        self.0.get_bits(12..22)
    }

    /// Align this address to the given alignment, moving downwards if this is not already aligned. `align` must
    /// be `0` or a power-of-two.
    pub fn align_down(self, align: usize) -> VAddr {
        if align.is_power_of_two() {
            VAddr(self.0 & !(align - 1))
        } else {
            assert!(align == 0);
            self
        }
    }

    /// Align this address to the given alignment, moving upwards if this is not already aligned. `align` must be
    /// `0` or a power-of-two.
    pub fn align_up(self, align: usize) -> VAddr {
        VAddr::new(self.0 + align - 1).align_down(align)
    }

    pub fn is_aligned(self, align: usize) -> bool {
        self.0 % align == 0
    }

    pub fn checked_add(self, rhs: usize) -> Option<Self> {
        let sum = self.0.checked_add(rhs)?;
        if sum > u32::MAX as usize {
            return None;
        }
        Some(VAddr(sum))
    }

    pub fn checked_sub(self, rhs: usize) -> Option<Self> {
        Some(VAddr(self.0.checked_sub(rhs)?))
    }
}

impl fmt::LowerHex for VAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for VAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "VAddr({:#x})", self)
    }
}

impl From<VAddr> for usize {
    fn from(address: VAddr) -> usize {
        address.0
    }
}

impl From<VAddr> for u32 {
    fn from(address: VAddr) -> u32 {
        address.0 as u32
    }
}

impl<T> From<*const T> for VAddr {
    fn from(ptr: *const T) -> VAddr {
        VAddr::new(ptr as usize)
    }
}

impl<T> From<*mut T> for VAddr {
    fn from(ptr: *mut T) -> VAddr {
        VAddr::new(ptr as usize)
    }
}

impl Add<usize> for VAddr {
    type Output = VAddr;

    fn add(self, rhs: usize) -> Self::Output {
        match self.checked_add(rhs) {
            Some(address) => address,
            None => panic!("Virtual address arithmetic overflowed: {:#x} + {:#x}", self, rhs),
        }
    }
}

impl AddAssign<usize> for VAddr {
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}

impl Sub<usize> for VAddr {
    type Output = VAddr;

    fn sub(self, rhs: usize) -> Self::Output {
        match self.checked_sub(rhs) {
            Some(address) => address,
            None => panic!("Virtual address arithmetic underflowed: {:#x} - {:#x}", self, rhs),
        }
    }
}

impl SubAssign<usize> for VAddr {
    fn sub_assign(&mut self, rhs: usize) {
        *self = *self - rhs;
    }
}
