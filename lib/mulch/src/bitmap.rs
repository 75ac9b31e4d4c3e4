/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use bit_field::BitField;
use core::mem;
use num_traits::PrimInt;

/// This represents what a type needs to implement to be suitable to back a `Bitmap`.
pub trait BitmapStorage: PrimInt + BitField {}
impl<T> BitmapStorage for T where T: PrimInt + BitField {}

/// `Bitmap` wraps a backing integer type such as `u32` and represents an array of
/// individually-accessible bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bitmap<T: BitmapStorage>(T);

impl<T> Bitmap<T>
where
    T: BitmapStorage,
{
    pub const BITS: usize = 8 * mem::size_of::<T>();

    pub fn new(initial: T) -> Bitmap<T> {
        Bitmap(initial)
    }

    pub fn get(&self, bit: usize) -> bool {
        self.0.get_bit(bit)
    }

    pub fn set(&mut self, bit: usize, value: bool) {
        self.0.set_bit(bit, value);
    }

    /// The number of bits that are set.
    pub fn count(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Find `n` consecutive unset bits, set them and return the index of the first bit.
    pub fn alloc_n(&mut self, n: usize) -> Option<usize> {
        self.alloc_n_within(n, Self::BITS)
    }

    /// Like `alloc_n`, but only considers the first `limit` bits. This is how a bitmap wider than the resource
    /// it tracks is used for first-fit allocation.
    pub fn alloc_n_within(&mut self, n: usize, limit: usize) -> Option<usize> {
        assert!(n > 0 && limit <= Self::BITS);
        if n > limit {
            return None;
        }

        /*
         * For each position that still has `n` bits before `limit`, check whether all of the next `n` bits are
         * unset. If they are, we've found a run of `n` zeros, so we set them.
         */
        for i in 0..=(limit - n) {
            if (i..(i + n)).all(|bit| !self.0.get_bit(bit)) {
                for bit in i..(i + n) {
                    self.0.set_bit(bit, true);
                }
                return Some(i);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::Bitmap;

    #[test]
    fn alloc_n() {
        assert_eq!(Bitmap::new(0b10001u16).alloc_n(3), Some(1));
        assert_eq!(Bitmap::new(0b11_0000_1_000_111u16).alloc_n(4), Some(7));
        assert_eq!(Bitmap::new(0b1111_1111u8).alloc_n(1), None);
        assert_eq!(Bitmap::new(0b0111_1111u8).alloc_n(1), Some(7));
    }

    #[test]
    fn alloc_within_limit() {
        let mut bitmap = Bitmap::new(0u8);
        for expected in 0..6 {
            assert_eq!(bitmap.alloc_n_within(1, 6), Some(expected));
        }
        assert_eq!(bitmap.alloc_n_within(1, 6), None);
        assert_eq!(bitmap.count(), 6);

        bitmap.set(3, false);
        assert_eq!(bitmap.alloc_n_within(1, 6), Some(3));
        assert!(bitmap.get(3));
    }
}
