/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! Two-level 32-bit paging with page-size extensions: a page directory of 1024 entries, each of which either maps
//! a 4 MiB page directly (`HUGE_PAGE`) or points to a page table of 1024 entries mapping 4 KiB pages.

use bitflags::bitflags;
use core::{
    fmt,
    marker::PhantomData,
    ops::{Index, IndexMut},
};
use hal::memory::{FrameSize, PAddr, Size4KiB, Size4MiB};

/// All page directories and page tables have 1024 entries.
pub const ENTRY_COUNT: usize = 1024;

bitflags! {
    pub struct EntryFlags : u32 {
        const PRESENT           = 1 << 0;
        const WRITABLE          = 1 << 1;
        const USER_ACCESSIBLE   = 1 << 2;
        const WRITE_THROUGH     = 1 << 3;
        const NO_CACHE          = 1 << 4;
        const ACCESSED          = 1 << 5;
        const DIRTY             = 1 << 6;
        /// In a directory entry, this marks a 4 MiB page instead of a pointer to a page table.
        const HUGE_PAGE         = 1 << 7;
        const GLOBAL            = 1 << 8;
    }
}

impl Default for EntryFlags {
    fn default() -> EntryFlags {
        EntryFlags::PRESENT
    }
}

#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Entry(u32);

impl Entry {
    pub const fn unused() -> Entry {
        Entry(0)
    }

    pub fn is_unused(&self) -> bool {
        self.0 == 0
    }

    pub fn is_present(&self) -> bool {
        self.flags().contains(EntryFlags::PRESENT)
    }

    pub fn flags(&self) -> EntryFlags {
        EntryFlags::from_bits_truncate(self.0)
    }

    /// The physical address this entry points to, or `None` if it is not present. For 4 MiB pages, this is the
    /// start of the 4 MiB frame; otherwise it is the start of a 4 KiB frame or page table.
    pub fn address(&self) -> Option<PAddr> {
        if !self.is_present() {
            return None;
        }

        let mask = if self.flags().contains(EntryFlags::HUGE_PAGE) {
            !(Size4MiB::SIZE as u32 - 1)
        } else {
            !(Size4KiB::SIZE as u32 - 1)
        };
        PAddr::new((self.0 & mask) as usize)
    }

    pub fn set_unused(&mut self) {
        self.0 = 0;
    }

    /// Set an entry to a given address and set of flags. Cannot be used to set an entry as
    /// not-present (use `set_unused` instead), because we automatically add the `PRESENT` flag.
    pub fn set(&mut self, address: PAddr, flags: EntryFlags) {
        let alignment = if flags.contains(EntryFlags::HUGE_PAGE) { Size4MiB::SIZE } else { Size4KiB::SIZE };
        assert!(address.is_aligned(alignment), "Entry address {:#x} is not aligned to {:#x}", address, alignment);
        self.0 = u32::from(address) | (flags | EntryFlags::PRESENT).bits();
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address() {
            None => write!(f, "Not Present"),
            Some(address) if self.flags().contains(EntryFlags::HUGE_PAGE) => {
                write!(f, "[HUGE] Address: {:#x}, flags: {:?}", address, self.flags())
            }
            Some(address) => write!(f, "Address: {:#x}, flags: {:?}", address, self.flags()),
        }
    }
}

pub enum DirectoryLevel {}
pub enum TableLevel {}

pub trait Level {}
impl Level for DirectoryLevel {}
impl Level for TableLevel {}

/// A page directory or page table. Both are exactly one 4 KiB frame, and must be aligned to one.
#[repr(C, align(4096))]
pub struct Table<L: Level> {
    entries: [Entry; ENTRY_COUNT],
    _phantom: PhantomData<L>,
}

pub type PageDirectory = Table<DirectoryLevel>;
pub type PageTable = Table<TableLevel>;

impl<L> Table<L>
where
    L: Level,
{
    pub const fn new() -> Table<L> {
        Table { entries: [Entry::unused(); ENTRY_COUNT], _phantom: PhantomData }
    }

    pub fn zero(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.set_unused();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }
}

impl<L> Index<usize> for Table<L>
where
    L: Level,
{
    type Output = Entry;

    fn index(&self, index: usize) -> &Self::Output {
        &self.entries[index]
    }
}

impl<L> IndexMut<usize> for Table<L>
where
    L: Level,
{
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.entries[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem;

    #[test]
    fn table_layout() {
        assert_eq!(mem::size_of::<PageDirectory>(), 4096);
        assert_eq!(mem::align_of::<PageTable>(), 4096);
        assert!(PageDirectory::new().iter().all(Entry::is_unused));
    }

    #[test]
    fn small_entries() {
        let mut entry = Entry::unused();
        assert_eq!(entry.address(), None);

        entry.set(PAddr::new(0xb9000).unwrap(), EntryFlags::WRITABLE | EntryFlags::USER_ACCESSIBLE);
        assert!(entry.is_present());
        assert_eq!(entry.address(), PAddr::new(0xb9000));
        assert_eq!(entry.bits(), 0xb9007);
        assert!(entry.flags().contains(EntryFlags::USER_ACCESSIBLE));

        entry.set_unused();
        assert!(entry.is_unused());
        assert_eq!(entry.address(), None);
    }

    #[test]
    fn huge_entries() {
        let mut entry = Entry::unused();
        entry.set(PAddr::new(0x0080_0000).unwrap(), EntryFlags::HUGE_PAGE | EntryFlags::WRITABLE);
        assert_eq!(entry.address(), PAddr::new(0x0080_0000));
        assert_eq!(entry.bits(), 0x0080_0083);
    }

    #[test]
    #[should_panic]
    fn misaligned_huge_entry() {
        Entry::unused().set(PAddr::new(0x0080_1000).unwrap(), EntryFlags::HUGE_PAGE);
    }
}
