/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! The kernel's view of the address space. The first 4 MiB is mapped with 4 KiB pages and holds video memory,
//! the three background screen buffers, and two windows onto video memory. The kernel itself is a single 4 MiB
//! page at 4 MiB. Every process image is linked to run inside the 4 MiB program window at 128 MiB, which is
//! re-pointed at the running process's own physical region on every switch.
//!
//! ```ignore
//!    0x0000_0000 ┌───────────────────────────┐
//!                │ Not present               │
//!    0x000b_8000 ├───────────────────────────┤
//!                │ Video window              │ → the running terminal's screen
//!    0x000b_9000 ├───────────────────────────┤
//!                │ Background buffers (1..3) │ identity-mapped
//!    0x000b_c000 ├───────────────────────────┤
//!                │ Video memory alias        │ → always real video memory
//!    0x0040_0000 ├───────────────────────────┤
//!                │ Kernel (4 MiB page)       │ identity-mapped, holds the kernel stacks
//!    0x0080_0000 ├───────────────────────────┤
//!                │ Not present               │
//!    0x0800_0000 ├───────────────────────────┤
//!                │ Program window (4 MiB)    │ → 8 MiB + slot * 4 MiB
//!    0x0840_0000 ├───────────────────────────┤
//!                │ Not present               │
//!    0x0882_2000 ├───────────────────────────┤
//!                │ User video page           │ → the process's terminal's screen, after vidmap
//!                └───────────────────────────┘
//! ```

use crate::terminal::TerminalId;
use hal::memory::{kibibytes, mebibytes, PAddr, VAddr};

const fn paddr(address: usize) -> PAddr {
    match PAddr::new(address) {
        Some(address) => address,
        None => panic!("Physical address out of range"),
    }
}

pub const VIDEO_MEMORY: PAddr = paddr(0xb8000);
pub const VIDEO_WINDOW: VAddr = VAddr::new(0xb8000);
/// The kernel's mapping of the real video memory. Unlike the video window, this never moves, so the kernel can
/// always reach the visible screen through it.
pub const VIDEO_ALIAS: VAddr = VAddr::new(0xbc000);

/// Background screens are identity-mapped, so the kernel can reach a non-visible terminal's screen directly.
pub const fn background_buffer(terminal: TerminalId) -> PAddr {
    paddr(0xb9000 + terminal.index() * kibibytes(4))
}

pub const KERNEL_BASE: PAddr = paddr(0x0040_0000);
pub const KERNEL_BASE_VIRTUAL: VAddr = VAddr::new(0x0040_0000);

/// Kernel stacks are carved downwards from the end of the kernel's 4 MiB page, one per process slot.
pub const KERNEL_STACKS_TOP: VAddr = VAddr::new(mebibytes(8));
pub const KERNEL_STACK_SIZE: usize = kibibytes(8);

pub const PROGRAM_WINDOW: VAddr = VAddr::new(0x0800_0000);
pub const PROGRAM_WINDOW_SIZE: usize = mebibytes(4);
/// Where an image is loaded within the program window. This is also the lowest address its entry point can be.
pub const PROGRAM_IMAGE_ADDRESS: VAddr = VAddr::new(0x0804_8000);
pub const MAX_IMAGE_SIZE: usize = 0x0840_0000 - 0x0804_8000;
/// The initial user stack pointer. The first push lands at the last word of the program window.
pub const USER_STACK_TOP: VAddr = VAddr::new(0x0840_0000);

/// Process regions start just after the kernel's 4 MiB page.
pub const PROGRAM_REGIONS_BASE: PAddr = paddr(mebibytes(8));

pub const USER_VIDEO: VAddr = VAddr::new(0x0882_2000);
