/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use core::{
    fmt,
    ops::{Add, AddAssign, Sub, SubAssign},
};

/// Represents a physical address. Without PAE, the processor can only address 4 GiB of physical memory, so
/// physical addresses must fit in 32 bits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
#[repr(transparent)]
pub struct PAddr(usize);

impl PAddr {
    const MAX: usize = u32::MAX as usize;

    /// Construct a new `PAddr`. Returns `None` if the address does not fit in 32 bits.
    pub const fn new(address: usize) -> Option<PAddr> {
        if address <= Self::MAX {
            Some(PAddr(address))
        } else {
            None
        }
    }

    /// Align this address to the given alignment, moving downwards if this is not already aligned.
    /// `align` must be `0` or a power-of-two.
    pub fn align_down(self, align: usize) -> PAddr {
        if align.is_power_of_two() {
            /*
             * E.g.
             *      align       =   0b00001000
             *      align-1     =   0b00000111
             *      !(align-1)  =   0b11111000
             *                             ^^^ Masks the address to the value below it with the
             *                                 correct alignment
             */
            PAddr(self.0 & !(align - 1))
        } else {
            assert!(align == 0);
            self
        }
    }

    pub fn align_up(self, align: usize) -> PAddr {
        PAddr(self.0 + align - 1).align_down(align)
    }

    pub fn is_aligned(self, align: usize) -> bool {
        self.0 % align == 0
    }

    pub fn checked_add(self, rhs: usize) -> Option<Self> {
        PAddr::new(self.0.checked_add(rhs)?)
    }

    pub fn checked_sub(self, rhs: usize) -> Option<Self> {
        PAddr::new(self.0.checked_sub(rhs)?)
    }
}

impl fmt::LowerHex for PAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for PAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PAddr({:#x})", self)
    }
}

impl From<PAddr> for usize {
    fn from(address: PAddr) -> usize {
        address.0
    }
}

impl From<PAddr> for u32 {
    fn from(address: PAddr) -> u32 {
        // `PAddr::new` guarantees the address fits
        address.0 as u32
    }
}

impl Add<usize> for PAddr {
    type Output = PAddr;

    fn add(self, rhs: usize) -> Self::Output {
        match self.checked_add(rhs) {
            Some(address) => address,
            None => panic!("Physical address arithmetic led to invalid address: {:#x} + {:#x}", self, rhs),
        }
    }
}

impl AddAssign<usize> for PAddr {
    fn add_assign(&mut self, rhs: usize) {
        // XXX: this ensures correctness as it goes through the `Add` implementation
        *self = *self + rhs;
    }
}

impl Sub<usize> for PAddr {
    type Output = PAddr;

    fn sub(self, rhs: usize) -> Self::Output {
        match self.checked_sub(rhs) {
            Some(address) => address,
            None => panic!("Physical address arithmetic led to invalid address: {:#x} - {:#x}", self, rhs),
        }
    }
}

impl SubAssign<usize> for PAddr {
    fn sub_assign(&mut self, rhs: usize) {
        *self = *self - rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::PAddr;

    #[test]
    fn construction() {
        assert!(PAddr::new(0xb8000).is_some());
        assert!(PAddr::new(0xffff_ffff).is_some());
        assert!(PAddr::new(0x1_0000_0000).is_none());
    }

    #[test]
    fn alignment() {
        let address = PAddr::new(0x0080_1234).unwrap();
        assert_eq!(address.align_down(0x1000), PAddr::new(0x0080_1000).unwrap());
        assert_eq!(address.align_up(0x1000), PAddr::new(0x0080_2000).unwrap());
        assert!(!address.is_aligned(0x1000));
        assert!(PAddr::new(0x0040_0000).unwrap().is_aligned(0x40_0000));
    }
}
