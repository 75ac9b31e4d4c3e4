/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! The boot image is loaded by the bootloader as a module. It is made of 4 KiB blocks: a boot block holding
//! the counts and the directory, then one block per inode, then the data blocks.
//!
//! The boot block starts with the number of directory entries, inodes, and data blocks (each a `u32`), then 52
//! reserved bytes, then up to 63 directory entries of 64 bytes: a 32-byte name, the file type, the inode number,
//! and 24 reserved bytes. Each inode block starts with the length of the file in bytes, followed by the indices
//! of the data blocks that hold it, in order.

use super::{DirectoryEntry, FileSystem, FileType, FsError, MAX_NAME_LENGTH};
use tracing::info;

pub const BLOCK_SIZE: usize = 4096;
pub const MAX_DIRECTORY_ENTRIES: usize = 63;
const DIRECTORY_ENTRY_SIZE: usize = 64;
const DIRECTORY_OFFSET: usize = 64;
/// An inode block holds the length, then this many data block indices.
pub const MAX_FILE_BLOCKS: usize = BLOCK_SIZE / 4 - 1;

pub struct Ramdisk<'a> {
    image: &'a [u8],
    directory_entries: usize,
    inodes: usize,
    data_blocks: usize,
}

impl<'a> Ramdisk<'a> {
    pub fn new(image: &'a [u8]) -> Result<Ramdisk<'a>, FsError> {
        let mut ramdisk = Ramdisk { image, directory_entries: 0, inodes: 0, data_blocks: 0 };
        ramdisk.directory_entries = usize::min(ramdisk.read_u32(0)? as usize, MAX_DIRECTORY_ENTRIES);
        ramdisk.inodes = ramdisk.read_u32(4)? as usize;
        ramdisk.data_blocks = ramdisk.read_u32(8)? as usize;

        let size = ramdisk
            .inodes
            .checked_add(ramdisk.data_blocks)
            .and_then(|blocks| blocks.checked_add(1))
            .and_then(|blocks| blocks.checked_mul(BLOCK_SIZE))
            .ok_or(FsError::OutOfBounds)?;
        if image.len() < size {
            return Err(FsError::OutOfBounds);
        }

        info!(
            "Loaded ramdisk with {} files, {} inodes, and {} data blocks",
            ramdisk.directory_entries, ramdisk.inodes, ramdisk.data_blocks
        );
        Ok(ramdisk)
    }

    fn read_u32(&self, offset: usize) -> Result<u32, FsError> {
        let bytes = self.image.get(offset..(offset + 4)).ok_or(FsError::OutOfBounds)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn inode_block(&self, inode: u32) -> Result<usize, FsError> {
        if inode as usize >= self.inodes {
            return Err(FsError::NoSuchInode);
        }
        // Can't overflow once `new` has checked the image holds every inode block
        Ok((1 + inode as usize) * BLOCK_SIZE)
    }

    fn data_block(&self, index: u32) -> Result<&'a [u8], FsError> {
        if index as usize >= self.data_blocks {
            return Err(FsError::BadDataBlock);
        }
        let start = (1 + self.inodes + index as usize) * BLOCK_SIZE;
        self.image.get(start..(start + BLOCK_SIZE)).ok_or(FsError::OutOfBounds)
    }
}

impl<'a> FileSystem for Ramdisk<'a> {
    fn resolve(&self, name: &[u8]) -> Option<DirectoryEntry> {
        if name.is_empty() || name.len() > MAX_NAME_LENGTH {
            return None;
        }
        (0..self.directory_entries).filter_map(|index| self.entry_at(index)).find(|entry| entry.name() == name)
    }

    fn entry_at(&self, index: usize) -> Option<DirectoryEntry> {
        if index >= self.directory_entries {
            return None;
        }

        let offset = DIRECTORY_OFFSET + index * DIRECTORY_ENTRY_SIZE;
        let mut name = [0u8; MAX_NAME_LENGTH];
        name.copy_from_slice(self.image.get(offset..(offset + MAX_NAME_LENGTH))?);
        let file_type = FileType::from_raw(self.read_u32(offset + MAX_NAME_LENGTH).ok()?)?;
        let inode = self.read_u32(offset + MAX_NAME_LENGTH + 4).ok()?;

        Some(DirectoryEntry::new(name, file_type, inode))
    }

    fn length(&self, inode: u32) -> Result<usize, FsError> {
        Ok(self.read_u32(self.inode_block(inode)?)? as usize)
    }

    fn read(&self, inode: u32, offset: usize, buffer: &mut [u8]) -> Result<usize, FsError> {
        let inode_block = self.inode_block(inode)?;
        let length = self.read_u32(inode_block)? as usize;
        if offset >= length {
            return Ok(0);
        }

        let to_read = usize::min(buffer.len(), length - offset);
        let mut done = 0;
        while done < to_read {
            let position = offset + done;
            let index = position / BLOCK_SIZE;
            if index >= MAX_FILE_BLOCKS {
                return Err(FsError::OutOfBounds);
            }
            let block_number = self.read_u32(inode_block + 4 + index * 4)?;
            let block = self.data_block(block_number)?;

            let within = position % BLOCK_SIZE;
            let count = usize::min(BLOCK_SIZE - within, to_read - done);
            buffer[done..(done + count)].copy_from_slice(&block[within..(within + count)]);
            done += count;
        }

        Ok(done)
    }
}
