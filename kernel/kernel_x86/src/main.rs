/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

#![no_std]
#![no_main]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

mod interrupts;
mod keyboard;
mod logger;
mod multiboot;
mod rtc;
mod task;

use core::{
    arch::global_asm,
    ptr::{self, addr_of_mut},
};
use hal::memory::{PAddr, VAddr};
use hal_x86::{
    hw::{
        cga::CrtController,
        gdt::{GDT, KERNEL_DATA_SELECTOR},
        pit::Pit,
        registers::{
            read_control_reg,
            write_control_reg,
            CR0_ENABLE_PAGING,
            CR4_ENABLE_GLOBAL_PAGES,
            CR4_ENABLE_PAGE_SIZE_EXTENSION,
        },
        tlb,
        tss::Tss,
    },
    paging::PageTable,
};
use kernel::{
    fs::ramdisk::Ramdisk,
    memory::{layout, Mapping},
    process::MAX_PROCESSES,
    scheduler::PIT_FREQUENCY,
    KernelState,
    Platform,
};
use linked_list_allocator::LockedHeap;
use mulch::InitGuard;
use spinning_top::Spinlock;
use tracing::info;

global_asm!(include_str!("boot.s"));

pub static KERNEL: InitGuard<Spinlock<KernelState<PlatformImpl>>> = InitGuard::uninit();

/// The CPU reads `esp0` from here when an interrupt or system call arrives from user mode. It is rewritten
/// every time a different process is installed.
static TSS: Spinlock<Tss> = Spinlock::new(Tss::new(KERNEL_DATA_SELECTOR.0));

/*
 * Nothing in the kernel allocates, but `tracing` is built against `alloc`, so it needs somewhere to get
 * memory from if it ever does.
 */
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();
const HEAP_SIZE: usize = 0x4000;
static mut HEAP: [u8; HEAP_SIZE] = [0; HEAP_SIZE];

pub struct PlatformImpl {
    file_system: Ramdisk<'static>,
    rtc: rtc::Rtc,
    crt: CrtController,
}

impl Platform for PlatformImpl {
    type FileSystem = Ramdisk<'static>;
    type Rtc = rtc::Rtc;

    fn file_system(&self) -> &Self::FileSystem {
        &self.file_system
    }

    fn rtc(&mut self) -> &mut Self::Rtc {
        &mut self.rtc
    }

    fn flush_tlb(&mut self) {
        tlb::flush();
    }

    fn set_kernel_stack(&mut self, top: VAddr) {
        TSS.lock().set_kernel_stack(top);
    }

    /// The kernel is identity-mapped, so the tables' virtual addresses are also their physical ones.
    fn table_address(&mut self, table: &PageTable) -> PAddr {
        let address = table as *const PageTable as usize;
        match PAddr::new(address) {
            Some(address) => address,
            None => panic!("Page table at {:#x} is not at a valid physical address", address),
        }
    }

    unsafe fn read_memory(&self, at: Mapping, buffer: &mut [u8]) {
        unsafe {
            ptr::copy(at.virt.ptr::<u8>(), buffer.as_mut_ptr(), buffer.len());
        }
    }

    unsafe fn write_memory(&mut self, at: Mapping, data: &[u8]) {
        unsafe {
            ptr::copy(data.as_ptr(), at.virt.mut_ptr::<u8>(), data.len());
        }
    }

    fn set_cursor(&mut self, x: usize, y: usize) {
        self.crt.set_cursor(x, y);
    }
}

#[no_mangle]
pub extern "C" fn kentry(magic: u32, info_address: u32) -> ! {
    logger::init();
    info!("Kernel is running");

    if magic != multiboot::BOOTLOADER_MAGIC {
        panic!("Not booted by a Multiboot bootloader (magic = {:#x})", magic);
    }

    unsafe {
        ALLOCATOR.lock().init(addr_of_mut!(HEAP) as *mut u8, HEAP_SIZE);
    }

    /*
     * Install the TSS and load the GDT. The TSS lives in a static, so the pointer the GDT takes stays valid even
     * though we don't hold the lock.
     */
    {
        let tss = &*TSS.lock() as *const Tss;
        let mut gdt = GDT.lock();
        gdt.set_tss(tss);
        unsafe {
            gdt.load();
        }
    }
    interrupts::init();

    /*
     * The filesystem image has to be found now, while the bootloader's structures in low memory are still
     * reachable. Once paging is on, only the kernel's 4 MiB page is identity-mapped, and the module has to be
     * inside it, below the kernel stacks.
     */
    let Some(image) = (unsafe { multiboot::first_module(info_address) }) else {
        panic!("Bootloader didn't load a filesystem image");
    };
    let image_start = image.as_ptr() as usize;
    let stacks_bottom = usize::from(layout::KERNEL_STACKS_TOP) - MAX_PROCESSES * layout::KERNEL_STACK_SIZE;
    if image_start < usize::from(layout::KERNEL_BASE) || image_start + image.len() > stacks_bottom {
        panic!("Filesystem image at {:#x}..{:#x} is outside the kernel page", image_start, image_start + image.len());
    }
    let file_system = match Ramdisk::new(image) {
        Ok(file_system) => file_system,
        Err(err) => panic!("Filesystem image is malformed: {:?}", err),
    };
    info!("Found filesystem image at {:#x} ({} bytes)", image_start, image.len());

    let platform = PlatformImpl { file_system, rtc: unsafe { rtc::Rtc::new() }, crt: unsafe { CrtController::new() } };
    KERNEL.initialize(Spinlock::new(KernelState::new(platform)));

    {
        let mut kernel = KERNEL.get().lock();
        kernel.initialize();

        let directory = kernel.address_space.directory() as *const _ as usize;
        unsafe {
            write_control_reg!(cr3, directory);
            write_control_reg!(cr4, read_control_reg!(cr4) | CR4_ENABLE_PAGE_SIZE_EXTENSION | CR4_ENABLE_GLOBAL_PAGES);
            write_control_reg!(cr0, read_control_reg!(cr0) | CR0_ENABLE_PAGING);
        }
        info!("Paging enabled with page directory at {:#x}", directory);
        kernel.clear_screens();
    }

    unsafe { Pit::new() }.set_frequency(PIT_FREQUENCY);
    interrupts::enable_irqs();

    /*
     * The first timer tick starts terminal 1's root shell, and this stack is abandoned. Until then, we just
     * wait.
     */
    info!("Waiting for the scheduler to start");
    loop {
        unsafe {
            core::arch::asm!("sti", "hlt");
        }
    }
}
