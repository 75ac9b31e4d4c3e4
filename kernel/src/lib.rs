/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! The architecture-independent core of the kernel: the process table, the address-space manager, the terminal
//! sessions, the round-robin scheduler, and the system-call dispatcher. It never touches hardware directly;
//! everything it needs from the machine goes through [`Platform`], and every transition that has to happen in
//! assembly (entering userspace, resuming a saved kernel context, swapping kernel stacks) is handed back to the
//! platform layer as a value describing what to do.

#![cfg_attr(not(test), no_std)]

pub mod file;
pub mod fs;
pub mod image;
pub mod keyboard;
pub mod memory;
pub mod process;
pub mod scheduler;
pub mod syscall;
pub mod terminal;

#[cfg(test)]
mod mock;

use fs::FileSystem;
use hal::memory::{PAddr, VAddr};
use hal_x86::paging::PageTable;
use memory::{layout, AddressSpace, Mapping};
use process::{Pcb, ProcessSlot, ProcessTable};
use scheduler::Scheduler;
use terminal::{TerminalId, Terminals};

/// The real-time clock, as seen by the core. Reads of an open RTC block until the next tick.
pub trait Rtc {
    /// Reset the rate to the default (2 Hz) and forget any pending tick.
    fn open(&mut self);

    /// `frequency` has already been checked to be a power of two between 2 and 1024 Hz.
    fn set_frequency(&mut self, frequency: u32);

    /// Returns `true`, and forgets it, if the RTC has ticked since this was last called.
    fn take_tick(&mut self) -> bool;

    fn close(&mut self);
}

pub trait Platform: Sized + 'static {
    type FileSystem: FileSystem;
    type Rtc: Rtc;

    fn file_system(&self) -> &Self::FileSystem;
    fn rtc(&mut self) -> &mut Self::Rtc;

    /// Invalidate all cached translations. Called after any change to the page directory or its tables.
    fn flush_tlb(&mut self);

    /// Set the stack the processor switches to when an interrupt or system call arrives from userspace.
    fn set_kernel_stack(&mut self, top: VAddr);

    /// Get the physical address of a page table owned by the kernel. The table must not move afterwards.
    fn table_address(&mut self, table: &PageTable) -> PAddr;

    /// Read `buffer.len()` bytes starting at `at`. The core has already checked that the translation is valid,
    /// and never asks for an access that crosses a 4 KiB boundary.
    unsafe fn read_memory(&self, at: Mapping, buffer: &mut [u8]);

    /// Write `data` starting at `at`. Carries the same guarantees as `read_memory`.
    unsafe fn write_memory(&mut self, at: Mapping, data: &[u8]);

    /// Move the hardware cursor of the physical display.
    fn set_cursor(&mut self, x: usize, y: usize);
}

/// Everything the kernel knows about the machine. This is created once at boot and lives for as long as the
/// kernel does; the platform layer keeps it somewhere it won't move (the page tables inside it are referred to
/// by physical address) and passes it by reference to the timer, keyboard, and system-call handlers.
pub struct KernelState<P>
where
    P: Platform,
{
    pub platform: P,
    pub address_space: AddressSpace,
    pub processes: ProcessTable,
    pub terminals: Terminals,
    pub scheduler: Scheduler,
}

impl<P> KernelState<P>
where
    P: Platform,
{
    pub fn new(platform: P) -> KernelState<P> {
        KernelState {
            platform,
            address_space: AddressSpace::new(),
            processes: ProcessTable::new(),
            terminals: Terminals::new(),
            scheduler: Scheduler::new(),
        }
    }

    /// Build the kernel's mappings. This must be called once the `KernelState` is in its final location, and
    /// before the page directory is loaded.
    pub fn initialize(&mut self) {
        self.address_space.initialize(&mut self.platform);
        tracing::info!("Kernel state initialized");
    }

    /// Blank the visible screen and every terminal's background buffer, and home the cursor. Screens are reached
    /// through the kernel's mappings, so this has to wait until paging is on.
    pub fn clear_screens(&mut self) {
        let visible = self.address_space.kernel_view(layout::VIDEO_MEMORY);
        self.terminals.get_mut(TerminalId::FIRST).clear(&mut self.platform, visible);
        for terminal in TerminalId::all() {
            let buffer = self.address_space.kernel_view(layout::background_buffer(terminal));
            self.terminals.get_mut(terminal).clear(&mut self.platform, buffer);
        }
        self.platform.set_cursor(0, 0);
    }

    /// The terminal whose process is currently on the CPU, if the scheduler has started any.
    pub fn running_terminal(&self) -> Option<TerminalId> {
        self.scheduler.running()
    }

    /// The slot of the process that is currently on the CPU.
    pub fn current_slot(&self) -> Option<ProcessSlot> {
        self.terminals.get(self.running_terminal()?).active
    }

    pub fn current_pcb(&self) -> Option<&Pcb> {
        self.processes.get(self.current_slot()?)
    }

    pub fn current_pcb_mut(&mut self) -> Option<&mut Pcb> {
        let slot = self.current_slot()?;
        self.processes.get_mut(slot)
    }

    /// The physical page that holds `terminal`'s screen: real video memory if it's the visible terminal, and its
    /// background buffer otherwise.
    pub fn video_target(&self, terminal: TerminalId) -> PAddr {
        if terminal == self.terminals.visible() {
            layout::VIDEO_MEMORY
        } else {
            layout::background_buffer(terminal)
        }
    }

    /// Point the video window at the running terminal's screen, and the user video page (if the running process
    /// asked for one) at the same place. Needed whenever the running process or the visible terminal changes.
    pub fn sync_video_mappings(&mut self) {
        let Some(terminal) = self.running_terminal() else {
            return;
        };

        let target = self.video_target(terminal);
        self.address_space.map_video_window(target, &mut self.platform);

        let wants_user_video = self.current_pcb().map_or(false, |pcb| pcb.user_video);
        if wants_user_video {
            self.address_space.map_user_video(target, &mut self.platform);
        } else if self.address_space.user_video_mapped() {
            self.address_space.unmap_user_video(&mut self.platform);
        }
    }

    /// Make `slot` the process whose image, kernel stack, and video mappings are installed.
    fn install_process(&mut self, slot: ProcessSlot) {
        self.address_space.map_program_image(slot, &mut self.platform);
        self.platform.set_kernel_stack(slot.kernel_stack().top);
        self.sync_video_mappings();
    }
}
