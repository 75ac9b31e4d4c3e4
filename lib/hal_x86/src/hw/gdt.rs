/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use super::{tss::Tss, DescriptorTablePointer};
use bit_field::BitField;
use core::{arch::asm, mem};
use spinning_top::Spinlock;

pub static GDT: Spinlock<Gdt> = Spinlock::new(Gdt::new());

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PrivilegeLevel {
    Ring0 = 0,
    Ring1 = 1,
    Ring2 = 2,
    Ring3 = 3,
}

/// An index into the GDT, specifying a particular segment. These are loaded into the segment
/// registers to reference segments.
#[derive(Clone, Copy, Debug)]
pub struct SegmentSelector(pub u16);

impl SegmentSelector {
    pub const fn new(index: u16, rpl: PrivilegeLevel) -> SegmentSelector {
        SegmentSelector(index << 3 | (rpl as u16))
    }
}

const ACCESSED: u64 = 1 << 40;
const READABLE_WRITABLE: u64 = 1 << 41;
const EXECUTABLE: u64 = 1 << 43;
const USER_SEGMENT: u64 = 1 << 44;
const PRESENT: u64 = 1 << 47;
const LIMIT_LOW: u64 = 0xffff;
const LIMIT_HIGH: u64 = 0xf << 48;
const DEFAULT_32_BIT: u64 = 1 << 54;
const GRANULARITY_4KIB: u64 = 1 << 55;

/// A flat segment covering the whole 4 GiB address space.
const fn flat_segment(ring: PrivilegeLevel, executable: bool) -> u64 {
    LIMIT_LOW
        | LIMIT_HIGH
        | ACCESSED
        | READABLE_WRITABLE
        | if executable { EXECUTABLE } else { 0 }
        | USER_SEGMENT
        | ((ring as u64) << 45)
        | PRESENT
        | DEFAULT_32_BIT
        | GRANULARITY_4KIB
}

fn tss_segment(tss: *const Tss) -> u64 {
    let base = tss as usize as u64;
    let mut descriptor = PRESENT;

    // Limit (`size_of::<Tss>() - 1` because `base + limit` is inclusive)
    descriptor.set_bits(0..16, (mem::size_of::<Tss>() - 1) as u64);
    descriptor.set_bits(16..40, base.get_bits(0..24));
    descriptor.set_bits(56..64, base.get_bits(24..32));

    // Type (0b1001 = available 32-bit TSS)
    descriptor.set_bits(40..44, 0b1001);
    descriptor
}

pub const KERNEL_CODE_SELECTOR: SegmentSelector = SegmentSelector::new(1, PrivilegeLevel::Ring0);
pub const KERNEL_DATA_SELECTOR: SegmentSelector = SegmentSelector::new(2, PrivilegeLevel::Ring0);
pub const USER_CODE_SELECTOR: SegmentSelector = SegmentSelector::new(3, PrivilegeLevel::Ring3);
pub const USER_DATA_SELECTOR: SegmentSelector = SegmentSelector::new(4, PrivilegeLevel::Ring3);
pub const TSS_SELECTOR: SegmentSelector = SegmentSelector::new(5, PrivilegeLevel::Ring0);

/// A GDT of flat 32-bit segments for the kernel and userspace, and a single TSS. The order of the segments
/// must match the selectors above.
#[repr(C, align(8))]
pub struct Gdt {
    null: u64,
    kernel_code: u64,
    kernel_data: u64,
    user_code: u64,
    user_data: u64,
    tss: u64,
}

impl Gdt {
    pub const fn new() -> Gdt {
        Gdt {
            null: 0,
            kernel_code: flat_segment(PrivilegeLevel::Ring0, true),
            kernel_data: flat_segment(PrivilegeLevel::Ring0, false),
            user_code: flat_segment(PrivilegeLevel::Ring3, true),
            user_data: flat_segment(PrivilegeLevel::Ring3, false),
            tss: 0,
        }
    }

    /// Install a TSS, which must stay at the same address for as long as this GDT is loaded.
    pub fn set_tss(&mut self, tss: *const Tss) -> SegmentSelector {
        self.tss = tss_segment(tss);
        TSS_SELECTOR
    }

    /// Load this GDT, reload every segment register with the new kernel segments, and load the task register
    /// if a TSS has been installed. The GDT must stay put for as long as it is loaded, which is why this is only
    /// reachable through the `GDT` static.
    pub unsafe fn load(&self) {
        let gdt_ptr = DescriptorTablePointer {
            base: self as *const Gdt as usize as u32,
            limit: (mem::size_of::<Gdt>() - 1) as u16,
        };

        unsafe {
            asm!("// Load the new GDT
                  lgdt [{ptr}]

                  // Load the new kernel data segment
                  mov ds, {data:x}
                  mov es, {data:x}
                  mov fs, {data:x}
                  mov gs, {data:x}
                  mov ss, {data:x}

                  // Switch to the new code segment
                  push {code}
                  lea {scratch}, [2f]
                  push {scratch}
                  retf
                  2:",
                ptr = in(reg) &gdt_ptr,
                data = in(reg) KERNEL_DATA_SELECTOR.0 as u32,
                code = in(reg) KERNEL_CODE_SELECTOR.0 as u32,
                scratch = out(reg) _,
            );

            if self.tss != 0 {
                asm!("ltr {0:x}", in(reg) TSS_SELECTOR.0);
            }
        }
    }
}
