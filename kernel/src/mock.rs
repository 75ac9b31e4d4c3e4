/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! A `Platform` for running the core on the host. Physical memory is sparse and zero-filled; page tables are
//! given made-up physical addresses, since the core never reads them back through memory.

use crate::{
    fs::ramdisk::{Ramdisk, BLOCK_SIZE},
    memory::Mapping,
    process::SavedContext,
    scheduler::{Phase, TickAction},
    syscall::{validation::UserSlice, Launch},
    terminal::TerminalId,
    KernelState,
    Platform,
    Rtc,
};
use hal::memory::{PAddr, VAddr};
use hal_x86::paging::PageTable;
use std::collections::HashMap;

const PAGE_SIZE: usize = 4096;
const FAKE_TABLES_BASE: usize = 0xf000_0000;

#[derive(Default)]
pub struct MockRtc {
    pub open: bool,
    pub frequency: u32,
    pub pending_tick: bool,
}

impl Rtc for MockRtc {
    fn open(&mut self) {
        self.open = true;
        self.frequency = 2;
        self.pending_tick = false;
    }

    fn set_frequency(&mut self, frequency: u32) {
        self.frequency = frequency;
    }

    fn take_tick(&mut self) -> bool {
        core::mem::replace(&mut self.pending_tick, false)
    }

    fn close(&mut self) {
        self.open = false;
    }
}

pub struct MockPlatform {
    memory: HashMap<usize, Box<[u8; PAGE_SIZE]>>,
    file_system: Ramdisk<'static>,
    tables: Vec<usize>,
    pub rtc: MockRtc,
    pub tlb_flushes: usize,
    pub kernel_stack: Option<VAddr>,
    pub cursor: (usize, usize),
}

impl MockPlatform {
    pub fn new() -> MockPlatform {
        MockPlatform::with_ramdisk(default_ramdisk())
    }

    pub fn with_ramdisk(image: &'static [u8]) -> MockPlatform {
        MockPlatform {
            memory: HashMap::new(),
            file_system: Ramdisk::new(image).unwrap(),
            tables: Vec::new(),
            rtc: MockRtc::default(),
            tlb_flushes: 0,
            kernel_stack: None,
            cursor: (0, 0),
        }
    }

    pub fn read_physical(&self, address: PAddr, length: usize) -> Vec<u8> {
        (0..length)
            .map(|i| {
                let address = usize::from(address) + i;
                self.memory.get(&(address / PAGE_SIZE)).map_or(0, |page| page[address % PAGE_SIZE])
            })
            .collect()
    }

    pub fn fill_physical(&mut self, address: PAddr, length: usize, value: u8) {
        for i in 0..length {
            let address = usize::from(address) + i;
            self.page_mut(address)[address % PAGE_SIZE] = value;
        }
    }

    fn page_mut(&mut self, address: usize) -> &mut [u8; PAGE_SIZE] {
        self.memory.entry(address / PAGE_SIZE).or_insert_with(|| Box::new([0; PAGE_SIZE]))
    }
}

impl Platform for MockPlatform {
    type FileSystem = Ramdisk<'static>;
    type Rtc = MockRtc;

    fn file_system(&self) -> &Self::FileSystem {
        &self.file_system
    }

    fn rtc(&mut self) -> &mut Self::Rtc {
        &mut self.rtc
    }

    fn flush_tlb(&mut self) {
        self.tlb_flushes += 1;
    }

    fn set_kernel_stack(&mut self, top: VAddr) {
        self.kernel_stack = Some(top);
    }

    fn table_address(&mut self, table: &PageTable) -> PAddr {
        let pointer = table as *const PageTable as usize;
        let index = match self.tables.iter().position(|&known| known == pointer) {
            Some(index) => index,
            None => {
                self.tables.push(pointer);
                self.tables.len() - 1
            }
        };
        PAddr::new(FAKE_TABLES_BASE + index * PAGE_SIZE).unwrap()
    }

    unsafe fn read_memory(&self, at: Mapping, buffer: &mut [u8]) {
        let address = usize::from(at.phys);
        let offset = address % PAGE_SIZE;
        assert!(offset + buffer.len() <= PAGE_SIZE, "Access crosses a page boundary");
        match self.memory.get(&(address / PAGE_SIZE)) {
            Some(page) => buffer.copy_from_slice(&page[offset..(offset + buffer.len())]),
            None => buffer.fill(0),
        }
    }

    unsafe fn write_memory(&mut self, at: Mapping, data: &[u8]) {
        let address = usize::from(at.phys);
        let offset = address % PAGE_SIZE;
        assert!(offset + data.len() <= PAGE_SIZE, "Access crosses a page boundary");
        self.page_mut(address)[offset..(offset + data.len())].copy_from_slice(data);
    }

    fn set_cursor(&mut self, x: usize, y: usize) {
        self.cursor = (x, y);
    }
}

/// Builds a boot image in memory. The directory always starts with `.`.
pub struct RamdiskBuilder {
    entries: Vec<(Vec<u8>, u32, Option<Vec<u8>>)>,
}

impl RamdiskBuilder {
    pub fn new() -> RamdiskBuilder {
        RamdiskBuilder { entries: vec![(b".".to_vec(), 1, None)] }
    }

    pub fn file(mut self, name: &[u8], contents: &[u8]) -> RamdiskBuilder {
        self.entries.push((name.to_vec(), 2, Some(contents.to_vec())));
        self
    }

    pub fn rtc(mut self, name: &[u8]) -> RamdiskBuilder {
        self.entries.push((name.to_vec(), 0, None));
        self
    }

    pub fn build(self) -> &'static [u8] {
        let files: Vec<&Vec<u8>> = self.entries.iter().filter_map(|(_, _, contents)| contents.as_ref()).collect();
        let inodes = files.len();
        let data_blocks: usize = files.iter().map(|contents| (contents.len() + BLOCK_SIZE - 1) / BLOCK_SIZE).sum();
        let mut image = vec![0u8; (1 + inodes + data_blocks) * BLOCK_SIZE];

        let put_u32 = |image: &mut Vec<u8>, offset: usize, value: usize| {
            image[offset..(offset + 4)].copy_from_slice(&(value as u32).to_le_bytes());
        };
        put_u32(&mut image, 0, self.entries.len());
        put_u32(&mut image, 4, inodes);
        put_u32(&mut image, 8, data_blocks);

        let mut next_inode = 0;
        let mut next_block = 0;
        for (index, (name, file_type, contents)) in self.entries.iter().enumerate() {
            let entry = 64 + index * 64;
            image[entry..(entry + name.len())].copy_from_slice(name);
            put_u32(&mut image, entry + 32, *file_type as usize);

            if let Some(contents) = contents {
                put_u32(&mut image, entry + 36, next_inode);
                let inode = (1 + next_inode) * BLOCK_SIZE;
                put_u32(&mut image, inode, contents.len());

                for (i, block) in contents.chunks(BLOCK_SIZE).enumerate() {
                    put_u32(&mut image, inode + 4 + i * 4, next_block);
                    let start = (1 + inodes + next_block) * BLOCK_SIZE;
                    image[start..(start + block.len())].copy_from_slice(block);
                    next_block += 1;
                }
                next_inode += 1;
            }
        }

        Box::leak(image.into_boxed_slice())
    }
}

/// A minimal executable image. It's padded so that `entry` lands inside it.
pub fn program(entry: u32, body: &[u8]) -> Vec<u8> {
    let mut image = vec![0u8; 28];
    image[0..4].copy_from_slice(&crate::image::MAGIC);
    image[24..28].copy_from_slice(&entry.to_le_bytes());
    image.extend_from_slice(body);

    let minimum = entry.saturating_sub(0x0804_8000) as usize + 1;
    if image.len() < minimum {
        image.resize(minimum, 0);
    }
    image
}

pub const ENTRY_POINT: u32 = 0x0804_8020;

pub fn default_ramdisk() -> &'static [u8] {
    RamdiskBuilder::new()
        .file(b"shell", &program(ENTRY_POINT, b"shell body"))
        .file(b"testprint", &program(ENTRY_POINT, b"testprint body"))
        .file(b"counter", &program(ENTRY_POINT, b"counter body"))
        .file(b"frame0.txt", b"/\\/\\/\\ fish")
        .file(b"notes.txt", b"not a program, despite being a regular file")
        .rtc(b"rtc")
        .build()
}

pub fn booted_kernel() -> Box<KernelState<MockPlatform>> {
    let mut kernel = Box::new(KernelState::new(MockPlatform::new()));
    kernel.initialize();
    kernel.clear_screens();
    kernel
}

/// The `eip` the mock "launcher" for a terminal saves into a launch context, so tests can tell where a halt
/// resumed to.
pub fn launcher_eip(terminal: TerminalId) -> u32 {
    0xc0de_0000 + terminal.number() as u32
}

/// Start `terminal`'s root shell, saving a recognisable context as `enter_user_mode` would.
pub fn launch_root_shell(kernel: &mut KernelState<MockPlatform>, terminal: TerminalId) -> Launch {
    let launch = kernel.launch_root_shell(terminal).unwrap();
    unsafe {
        *launch.context = SavedContext { eip: launcher_eip(terminal), ..SavedContext::default() };
    }
    launch
}

/// Run the boot ticks, starting each root shell when asked, until the scheduler is rotating.
pub fn boot_to_round_robin() -> Box<KernelState<MockPlatform>> {
    let mut kernel = booted_kernel();
    while kernel.scheduler.phase() != Phase::RoundRobin {
        if let TickAction::LaunchRootShell { terminal, .. } = kernel.timer_tick() {
            launch_root_shell(&mut kernel, terminal);
        }
    }
    kernel
}

/// Store `data` in the running process's memory, as the process itself would.
pub fn write_user(kernel: &mut KernelState<MockPlatform>, address: u32, data: &[u8]) {
    UserSlice::new(address, data.len()).write(&kernel.address_space, &mut kernel.platform, data).unwrap();
}

pub fn read_user(kernel: &KernelState<MockPlatform>, address: u32, length: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; length];
    UserSlice::new(address, length).read(&kernel.address_space, &kernel.platform, &mut buffer).unwrap();
    buffer
}
