/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! Physical memory is split into frames, and virtual memory into pages. On 32-bit x86 with page-size extensions,
//! there are two sizes of each: 4 KiB, and 4 MiB (mapped directly by a page-directory entry).

mod frame;
mod page;
mod physical_address;
mod virtual_address;

pub use frame::Frame;
pub use page::Page;
pub use physical_address::PAddr;
pub use virtual_address::VAddr;

use core::fmt::Debug;

pub type Bytes = usize;
pub type Kibibytes = usize;
pub type Mebibytes = usize;

pub const fn kibibytes(kibibytes: Kibibytes) -> Bytes {
    kibibytes * 1024
}

pub const fn mebibytes(mebibytes: Mebibytes) -> Bytes {
    kibibytes(mebibytes * 1024)
}

/// This trait is implemented by a number of marker types, one for each size of frame and page.
pub trait FrameSize: Clone + Copy + PartialEq + Eq + PartialOrd + Ord + Debug {
    const SIZE: Bytes;

    fn frames_needed(bytes: Bytes) -> usize {
        (bytes / Self::SIZE) + if bytes % Self::SIZE > 0 { 1 } else { 0 }
    }
}

macro_rules! frame_size {
    ($name: ident, $size: expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
        pub enum $name {}

        impl FrameSize for $name {
            const SIZE: Bytes = $size;
        }
    };
}

frame_size!(Size4KiB, kibibytes(4));
frame_size!(Size4MiB, mebibytes(4));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(kibibytes(8), 0x2000);
        assert_eq!(mebibytes(4), 0x40_0000);
        assert_eq!(Size4KiB::frames_needed(0), 0);
        assert_eq!(Size4KiB::frames_needed(1), 1);
        assert_eq!(Size4KiB::frames_needed(4096), 1);
        assert_eq!(Size4KiB::frames_needed(4097), 2);
        assert_eq!(Size4MiB::frames_needed(mebibytes(9)), 3);
    }
}
