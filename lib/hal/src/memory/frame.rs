/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use super::{FrameSize, PAddr, Size4KiB};
use core::{marker::PhantomData, ops::Add};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Frame<S = Size4KiB>
where
    S: FrameSize,
{
    pub start: PAddr,
    _phantom: PhantomData<S>,
}

impl<S> Frame<S>
where
    S: FrameSize,
{
    pub fn starts_with(address: PAddr) -> Frame<S> {
        assert!(address.is_aligned(S::SIZE));
        Frame { start: address, _phantom: PhantomData }
    }

    pub fn contains(address: PAddr) -> Frame<S> {
        Frame { start: address.align_down(S::SIZE), _phantom: PhantomData }
    }
}

impl<S> Add<usize> for Frame<S>
where
    S: FrameSize,
{
    type Output = Frame<S>;

    fn add(self, num_frames: usize) -> Self::Output {
        Frame { start: self.start + num_frames * S::SIZE, _phantom: PhantomData }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Size4MiB;

    #[test]
    fn frames() {
        let frame = Frame::<Size4MiB>::starts_with(PAddr::new(0x0080_0000).unwrap());
        assert_eq!(frame.start, PAddr::new(0x0080_0000).unwrap());
        assert_eq!((frame + 3).start, PAddr::new(0x0140_0000).unwrap());
        assert_eq!(Frame::<Size4KiB>::contains(PAddr::new(0xb8123).unwrap()).start, PAddr::new(0xb8000).unwrap());
    }
}
