/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

pub mod layout;

use crate::{process::ProcessSlot, Platform};
use hal::memory::{FrameSize, PAddr, Page, Size4KiB, Size4MiB, VAddr};
use hal_x86::paging::{EntryFlags, PageDirectory, PageTable};
use tracing::trace;

/// A virtual address along with the physical address it currently translates to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Mapping {
    pub virt: VAddr,
    pub phys: PAddr,
}

impl Mapping {
    pub fn offset(self, bytes: usize) -> Mapping {
        Mapping { virt: self.virt + bytes, phys: self.phys + bytes }
    }
}

/// Who is asking for a translation. Userspace can only reach pages marked user-accessible (and writable, if it
/// wants to write); the kernel can reach anything that's present.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Access {
    Kernel,
    UserRead,
    UserWrite,
}

impl Access {
    fn permits(self, flags: EntryFlags) -> bool {
        match self {
            Access::Kernel => true,
            Access::UserRead => flags.contains(EntryFlags::USER_ACCESSIBLE),
            Access::UserWrite => flags.contains(EntryFlags::USER_ACCESSIBLE | EntryFlags::WRITABLE),
        }
    }
}

/// The single address space shared by the kernel and whichever process is running. It owns the page directory
/// and the two page tables that are ever in use: the one for the first 4 MiB, and the one holding the user
/// video page.
pub struct AddressSpace {
    directory: PageDirectory,
    low_table: PageTable,
    user_video_table: PageTable,
}

impl AddressSpace {
    pub const fn new() -> AddressSpace {
        AddressSpace { directory: PageDirectory::new(), low_table: PageTable::new(), user_video_table: PageTable::new() }
    }

    pub fn directory(&self) -> &PageDirectory {
        &self.directory
    }

    /// Build the fixed part of the address space: video memory and its windows, the background buffers, and the
    /// kernel's 4 MiB page.
    pub fn initialize<P: Platform>(&mut self, platform: &mut P) {
        self.directory.zero();
        self.low_table.zero();
        self.user_video_table.zero();

        self.low_table[layout::VIDEO_WINDOW.table_index()].set(layout::VIDEO_MEMORY, EntryFlags::WRITABLE);
        self.low_table[layout::VIDEO_ALIAS.table_index()].set(layout::VIDEO_MEMORY, EntryFlags::WRITABLE);
        for terminal in crate::terminal::TerminalId::all() {
            let buffer = layout::background_buffer(terminal);
            self.low_table[usize::from(buffer) / Size4KiB::SIZE].set(buffer, EntryFlags::WRITABLE);
        }

        let low_table_address = platform.table_address(&self.low_table);
        self.directory[0].set(low_table_address, EntryFlags::WRITABLE | EntryFlags::USER_ACCESSIBLE);
        self.directory[layout::KERNEL_BASE_VIRTUAL.directory_index()]
            .set(layout::KERNEL_BASE, EntryFlags::WRITABLE | EntryFlags::HUGE_PAGE | EntryFlags::GLOBAL);

        platform.flush_tlb();
    }

    /// Point the program window at `slot`'s physical region.
    pub fn map_program_image<P: Platform>(&mut self, slot: ProcessSlot, platform: &mut P) {
        trace!("Mapping program window to region of slot {}", slot.index());
        self.directory[layout::PROGRAM_WINDOW.directory_index()].set(
            slot.physical_region().start,
            EntryFlags::WRITABLE | EntryFlags::USER_ACCESSIBLE | EntryFlags::HUGE_PAGE,
        );
        platform.flush_tlb();
    }

    /// The slot whose region the program window currently points at.
    pub fn mapped_program_slot(&self) -> Option<ProcessSlot> {
        let region = self.directory[layout::PROGRAM_WINDOW.directory_index()].address()?;
        let index = usize::from(region.checked_sub(usize::from(layout::PROGRAM_REGIONS_BASE))?) / Size4MiB::SIZE;
        ProcessSlot::new(index)
    }

    pub fn map_video_window<P: Platform>(&mut self, target: PAddr, platform: &mut P) {
        let entry = &mut self.low_table[layout::VIDEO_WINDOW.table_index()];
        if entry.address() != Some(target) {
            entry.set(target, EntryFlags::WRITABLE);
            platform.flush_tlb();
        }
    }

    pub fn video_window_target(&self) -> Option<PAddr> {
        self.low_table[layout::VIDEO_WINDOW.table_index()].address()
    }

    /// Map the user video page to `target`. The table holding it is installed on first use.
    pub fn map_user_video<P: Platform>(&mut self, target: PAddr, platform: &mut P) {
        self.user_video_table[layout::USER_VIDEO.table_index()]
            .set(target, EntryFlags::WRITABLE | EntryFlags::USER_ACCESSIBLE);

        let table_address = platform.table_address(&self.user_video_table);
        self.directory[layout::USER_VIDEO.directory_index()]
            .set(table_address, EntryFlags::WRITABLE | EntryFlags::USER_ACCESSIBLE);
        platform.flush_tlb();
    }

    pub fn unmap_user_video<P: Platform>(&mut self, platform: &mut P) {
        self.user_video_table[layout::USER_VIDEO.table_index()].set_unused();
        self.directory[layout::USER_VIDEO.directory_index()].set_unused();
        platform.flush_tlb();
    }

    pub fn user_video_mapped(&self) -> bool {
        self.directory[layout::USER_VIDEO.directory_index()].is_present()
    }

    /// Translate `virt` as the page tables would for an access of the given kind, or `None` if it would fault.
    pub fn translate(&self, virt: VAddr, access: Access) -> Option<Mapping> {
        let directory_entry = self.directory[virt.directory_index()];
        if !directory_entry.is_present() || !access.permits(directory_entry.flags()) {
            return None;
        }

        if directory_entry.flags().contains(EntryFlags::HUGE_PAGE) {
            let offset = usize::from(virt) - usize::from(Page::<Size4MiB>::contains(virt).start);
            return Some(Mapping { virt, phys: directory_entry.address()? + offset });
        }

        /*
         * We only ever install two page tables, so rather than reading the table back through its physical
         * address, we can look at the one we own.
         */
        let table = match virt.directory_index() {
            0 => &self.low_table,
            index if index == layout::USER_VIDEO.directory_index() => &self.user_video_table,
            _ => return None,
        };
        let table_entry = table[virt.table_index()];
        if !table_entry.is_present() || !access.permits(table_entry.flags()) {
            return None;
        }

        let offset = usize::from(virt) - usize::from(Page::<Size4KiB>::contains(virt).start);
        Some(Mapping { virt, phys: table_entry.address()? + offset })
    }

    /// How the kernel reaches a physical screen page: real video memory through its fixed alias, and a
    /// background buffer through its identity mapping.
    pub fn kernel_view(&self, screen: PAddr) -> Mapping {
        if screen == layout::VIDEO_MEMORY {
            Mapping { virt: layout::VIDEO_ALIAS, phys: screen }
        } else {
            Mapping { virt: VAddr::new(usize::from(screen)), phys: screen }
        }
    }

    /// Save the visible screen into the background buffer of the terminal that's being hidden, and fill the
    /// visible screen from the buffer of the one being shown.
    pub fn swap_video_buffers<P: Platform>(&self, leaving: PAddr, entering: PAddr, platform: &mut P) {
        let video = self.kernel_view(layout::VIDEO_MEMORY);
        copy_page(platform, video, self.kernel_view(leaving));
        copy_page(platform, self.kernel_view(entering), video);
    }
}

/// Copy a 4 KiB page through the kernel's own mappings. This goes in chunks so it doesn't need a page-sized
/// buffer on an 8 KiB kernel stack.
pub fn copy_page<P: Platform>(platform: &mut P, from: Mapping, to: Mapping) {
    const CHUNK: usize = 256;
    let mut buffer = [0u8; CHUNK];

    for offset in (0..Size4KiB::SIZE).step_by(CHUNK) {
        unsafe {
            platform.read_memory(from.offset(offset), &mut buffer);
            platform.write_memory(to.offset(offset), &buffer);
        }
    }
}
