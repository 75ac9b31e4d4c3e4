/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

pub mod ramdisk;

/// Names are at most this long. A name of exactly this length is not NUL-terminated.
pub const MAX_NAME_LENGTH: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FsError {
    /// The inode number is past the end of the inode blocks.
    NoSuchInode,
    /// An inode refers to a data block that doesn't exist.
    BadDataBlock,
    /// The image is too short to hold the structures it claims to have.
    OutOfBounds,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FileType {
    Rtc,
    Directory,
    Regular,
}

impl FileType {
    pub fn from_raw(raw: u32) -> Option<FileType> {
        match raw {
            0 => Some(FileType::Rtc),
            1 => Some(FileType::Directory),
            2 => Some(FileType::Regular),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DirectoryEntry {
    name: [u8; MAX_NAME_LENGTH],
    pub file_type: FileType,
    pub inode: u32,
}

impl DirectoryEntry {
    pub fn new(name: [u8; MAX_NAME_LENGTH], file_type: FileType, inode: u32) -> DirectoryEntry {
        DirectoryEntry { name, file_type, inode }
    }

    pub fn name(&self) -> &[u8] {
        let length = self.name.iter().position(|&c| c == b'\0').unwrap_or(MAX_NAME_LENGTH);
        &self.name[..length]
    }
}

/// The read-only filesystem the kernel loads programs and data files from. There is a single flat directory.
pub trait FileSystem {
    fn resolve(&self, name: &[u8]) -> Option<DirectoryEntry>;

    /// The `index`th entry of the directory, for reading the directory in order.
    fn entry_at(&self, index: usize) -> Option<DirectoryEntry>;

    fn length(&self, inode: u32) -> Result<usize, FsError>;

    /// Read from a file starting at `offset`. Returns the number of bytes read, which is `0` at or past the end
    /// of the file.
    fn read(&self, inode: u32, offset: usize, buffer: &mut [u8]) -> Result<usize, FsError>;
}
