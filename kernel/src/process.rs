/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use crate::{
    file::FileTable,
    memory::layout,
    terminal::{TerminalId, LINE_BUFFER_SIZE},
    Platform,
};
use hal::memory::{Frame, FrameSize, Size4MiB, VAddr};
use mulch::Bitmap;

pub const MAX_PROCESSES: usize = 6;

/// The value a parent sees when its child is halted because of an exception. Normal exit statuses fit in a
/// byte, so this can't be confused with one.
pub const EXCEPTION_STATUS: u32 = 256;

/// Identifies one of the `MAX_PROCESSES` process slots. A slot decides where a process lives: its kernel stack
/// and the physical region its image is loaded into.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct ProcessSlot(u8);

impl ProcessSlot {
    pub fn new(index: usize) -> Option<ProcessSlot> {
        if index < MAX_PROCESSES {
            Some(ProcessSlot(index as u8))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn kernel_stack(self) -> KernelStack {
        let top = layout::KERNEL_STACKS_TOP - self.index() * layout::KERNEL_STACK_SIZE;
        KernelStack { top, bottom: top - layout::KERNEL_STACK_SIZE }
    }

    /// The 4 MiB frame this slot's image lives in.
    pub fn physical_region(self) -> Frame<Size4MiB> {
        Frame::starts_with(layout::PROGRAM_REGIONS_BASE + self.index() * Size4MiB::SIZE)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct KernelStack {
    pub top: VAddr,
    pub bottom: VAddr,
}

/// A kernel context that can be resumed later: the callee-saved registers, the stack and instruction pointers,
/// and the flags. The platform layer's assembly relies on this exact layout, so fields must not be reordered.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
#[repr(C)]
pub struct SavedContext {
    pub ebx: u32,
    pub esi: u32,
    pub edi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub eip: u32,
    pub eflags: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExitStatus {
    Code(u8),
    Exception,
}

impl ExitStatus {
    /// The value handed back to the parent as the result of its `execute` call.
    pub fn value(self) -> u32 {
        match self {
            ExitStatus::Code(code) => code as u32,
            ExitStatus::Exception => EXCEPTION_STATUS,
        }
    }
}

/// The argument string a process was executed with.
#[derive(Clone, Copy)]
pub struct Arguments {
    bytes: [u8; LINE_BUFFER_SIZE],
    length: usize,
}

impl Arguments {
    pub const fn empty() -> Arguments {
        Arguments { bytes: [0; LINE_BUFFER_SIZE], length: 0 }
    }

    /// Anything past the buffer's capacity is dropped.
    pub fn new(arguments: &[u8]) -> Arguments {
        let mut result = Arguments::empty();
        result.length = usize::min(arguments.len(), LINE_BUFFER_SIZE);
        result.bytes[..result.length].copy_from_slice(&arguments[..result.length]);
        result
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.length]
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

pub struct Pcb {
    pub slot: ProcessSlot,
    /// `None` for the root shell of a terminal.
    pub parent: Option<ProcessSlot>,
    pub terminal: TerminalId,
    /// The kernel context inside the parent's `execute` call, resumed with the exit status when this process
    /// halts.
    pub execute_context: SavedContext,
    /// Where this process's kernel context is saved when the scheduler switches away from it.
    pub scheduler_context: SavedContext,
    pub inode: u32,
    pub image_length: usize,
    pub files: FileTable,
    pub halt_status: Option<ExitStatus>,
    pub arguments: Arguments,
    pub user_video: bool,
}

/// The fixed arena of process control blocks. A slot is in use exactly when its bit in `slots` is set, and
/// exactly then does it hold a `Pcb`.
pub struct ProcessTable {
    slots: Bitmap<u8>,
    pcbs: [Option<Pcb>; MAX_PROCESSES],
}

impl ProcessTable {
    pub fn new() -> ProcessTable {
        ProcessTable { slots: Bitmap::new(0), pcbs: [None, None, None, None, None, None] }
    }

    /// Claim the lowest free slot, or return `None` if all are in use.
    pub fn allocate_slot(&mut self) -> Option<ProcessSlot> {
        self.slots.alloc_n_within(1, MAX_PROCESSES).and_then(ProcessSlot::new)
    }

    /// Give back a slot claimed by `allocate_slot` that never had a process created in it.
    pub fn release_slot(&mut self, slot: ProcessSlot) {
        assert!(self.pcbs[slot.index()].is_none(), "Releasing slot {} which still holds a process", slot.index());
        self.slots.set(slot.index(), false);
    }

    pub fn create(
        &mut self,
        slot: ProcessSlot,
        parent: Option<ProcessSlot>,
        terminal: TerminalId,
        inode: u32,
        image_length: usize,
        arguments: Arguments,
    ) -> &mut Pcb {
        assert!(self.slots.get(slot.index()), "Creating a process in slot {} which was not allocated", slot.index());
        assert!(self.pcbs[slot.index()].is_none());

        self.pcbs[slot.index()].insert(Pcb {
            slot,
            parent,
            terminal,
            execute_context: SavedContext::default(),
            scheduler_context: SavedContext::default(),
            inode,
            image_length,
            files: FileTable::new(),
            halt_status: None,
            arguments,
            user_video: false,
        })
    }

    /// Close everything the process in `slot` has open, free the slot, and hand back its PCB.
    pub fn destroy<P: Platform>(&mut self, slot: ProcessSlot, platform: &mut P) -> Option<Pcb> {
        let mut pcb = self.pcbs[slot.index()].take()?;
        pcb.files.close_all(platform);
        self.slots.set(slot.index(), false);
        Some(pcb)
    }

    pub fn get(&self, slot: ProcessSlot) -> Option<&Pcb> {
        self.pcbs[slot.index()].as_ref()
    }

    pub fn get_mut(&mut self, slot: ProcessSlot) -> Option<&mut Pcb> {
        self.pcbs[slot.index()].as_mut()
    }

    pub fn is_live(&self, slot: ProcessSlot) -> bool {
        self.slots.get(slot.index())
    }

    pub fn live_count(&self) -> usize {
        self.slots.count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pcb> {
        self.pcbs.iter().flatten()
    }
}
