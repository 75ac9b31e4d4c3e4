/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use super::{
    validation::{UserSlice, UserString},
    SyscallError,
};
use crate::{
    file::{FileError, FileKind},
    fs::{FileSystem, FileType, MAX_NAME_LENGTH},
    memory::Access,
    process::ProcessSlot,
    terminal::LINE_BUFFER_SIZE,
    KernelState,
    Platform,
    Rtc,
};
use core::task::Poll;

const CHUNK_SIZE: usize = 512;

impl<P> KernelState<P>
where
    P: Platform,
{
    pub(super) fn read(&mut self, slot: ProcessSlot, descriptor: i32, buffer: UserSlice) -> Result<Poll<usize>, SyscallError> {
        let pcb = self.processes.get_mut(slot).ok_or(FileError::BadDescriptor)?;
        let terminal = pcb.terminal;
        let file = *pcb.files.get_mut(descriptor)?;

        let count = match file.kind {
            FileKind::Stdout => return Err(FileError::Unsupported.into()),
            FileKind::Stdin => {
                let buffer = buffer.subslice(0, LINE_BUFFER_SIZE);
                buffer.validate(&self.address_space, Access::UserWrite)?;
                // A finished line stays put until someone asks for at least one byte of it
                if buffer.is_empty() {
                    return Ok(Poll::Ready(0));
                }

                let mut line = [0u8; LINE_BUFFER_SIZE];
                match self.terminals.get_mut(terminal).take_line(&mut line[..buffer.len()]) {
                    Some(count) => {
                        buffer.write(&self.address_space, &mut self.platform, &line[..count])?;
                        count
                    }
                    None => return Ok(Poll::Pending),
                }
            }
            FileKind::RegularFile { inode } => {
                let mut chunk = [0u8; CHUNK_SIZE];
                let mut done = 0;
                while done < buffer.len() {
                    let want = usize::min(CHUNK_SIZE, buffer.len() - done);
                    let count = self.platform.file_system().read(inode, file.position + done, &mut chunk[..want])?;
                    if count == 0 {
                        break;
                    }
                    buffer.subslice(done, count).write(&self.address_space, &mut self.platform, &chunk[..count])?;
                    done += count;
                }
                done
            }
            // Reading nothing must not step past an entry
            FileKind::Directory if buffer.is_empty() => return Ok(Poll::Ready(0)),
            FileKind::Directory => match self.platform.file_system().entry_at(file.position) {
                Some(entry) => {
                    let mut name = [0u8; MAX_NAME_LENGTH];
                    let count = usize::min(entry.name().len(), buffer.len());
                    name[..count].copy_from_slice(&entry.name()[..count]);
                    buffer.write(&self.address_space, &mut self.platform, &name[..count])?;
                    count
                }
                None => 0,
            },
            FileKind::Rtc => {
                if !self.platform.rtc().take_tick() {
                    return Ok(Poll::Pending);
                }
                0
            }
        };

        let file = self.processes.get_mut(slot).ok_or(FileError::BadDescriptor)?.files.get_mut(descriptor)?;
        match file.kind {
            FileKind::RegularFile { .. } => file.position += count,
            FileKind::Directory => file.position += 1,
            _ => (),
        }
        Ok(Poll::Ready(count))
    }

    pub(super) fn write(&mut self, slot: ProcessSlot, descriptor: i32, buffer: UserSlice) -> Result<usize, SyscallError> {
        let pcb = self.processes.get_mut(slot).ok_or(FileError::BadDescriptor)?;
        let terminal = pcb.terminal;
        let file = *pcb.files.get_mut(descriptor)?;

        match file.kind {
            FileKind::Stdout => {
                buffer.validate(&self.address_space, Access::UserRead)?;

                let mut chunk = [0u8; LINE_BUFFER_SIZE];
                let mut done = 0;
                while done < buffer.len() {
                    let count = usize::min(chunk.len(), buffer.len() - done);
                    buffer.subslice(done, count).read(&self.address_space, &self.platform, &mut chunk[..count])?;
                    self.terminal_write(terminal, &chunk[..count]);
                    done += count;
                }
                Ok(done)
            }
            FileKind::Rtc => {
                if buffer.len() != 4 {
                    return Err(FileError::InvalidArgument.into());
                }
                let mut bytes = [0u8; 4];
                buffer.read(&self.address_space, &self.platform, &mut bytes)?;

                let frequency = u32::from_le_bytes(bytes);
                if !frequency.is_power_of_two() || !(2..=1024).contains(&frequency) {
                    return Err(FileError::InvalidArgument.into());
                }
                self.platform.rtc().set_frequency(frequency);
                Ok(0)
            }
            FileKind::Stdin | FileKind::RegularFile { .. } | FileKind::Directory => Err(FileError::Unsupported.into()),
        }
    }

    pub(super) fn open(&mut self, slot: ProcessSlot, name: UserString) -> Result<usize, SyscallError> {
        let mut buffer = [0u8; MAX_NAME_LENGTH + 1];
        let name = name.read(&self.address_space, &self.platform, &mut buffer)?;
        let entry = self.platform.file_system().resolve(name).ok_or(FileError::NotFound)?;

        let kind = match entry.file_type {
            FileType::Rtc => FileKind::Rtc,
            FileType::Directory => FileKind::Directory,
            FileType::Regular => FileKind::RegularFile { inode: entry.inode },
        };
        let pcb = self.processes.get_mut(slot).ok_or(FileError::BadDescriptor)?;
        Ok(pcb.files.install(kind, &mut self.platform)?)
    }

    pub(super) fn close(&mut self, slot: ProcessSlot, descriptor: i32) -> Result<(), SyscallError> {
        let pcb = self.processes.get_mut(slot).ok_or(FileError::BadDescriptor)?;
        Ok(pcb.files.close(descriptor, &mut self.platform)?)
    }
}
