/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use super::{FrameSize, Size4KiB, VAddr};
use core::{marker::PhantomData, ops::Add};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Page<S: FrameSize = Size4KiB> {
    pub start: VAddr,
    _phantom: PhantomData<S>,
}

impl<S> Page<S>
where
    S: FrameSize,
{
    pub fn starts_with(address: VAddr) -> Page<S> {
        assert!(address.is_aligned(S::SIZE), "Address is not at the start of a page");
        Page { start: address, _phantom: PhantomData }
    }

    pub fn contains(address: VAddr) -> Page<S> {
        Page { start: address.align_down(S::SIZE), _phantom: PhantomData }
    }

    /// The number of bytes between `address` and the end of this page.
    pub fn remaining_after(&self, address: VAddr) -> usize {
        usize::from(self.start) + S::SIZE - usize::from(address)
    }
}

impl<S> Add<usize> for Page<S>
where
    S: FrameSize,
{
    type Output = Page<S>;

    fn add(self, num_pages: usize) -> Self::Output {
        Page::contains(self.start + num_pages * S::SIZE)
    }
}
