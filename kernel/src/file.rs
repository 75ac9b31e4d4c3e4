/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use crate::{Platform, Rtc};

/// Each process can have this many descriptors open, including standard input and output.
pub const MAX_FILES: usize = 8;

pub const STDIN: usize = 0;
pub const STDOUT: usize = 1;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FileError {
    /// The descriptor is out of range or isn't open.
    BadDescriptor,
    /// All of a process's descriptors are already open.
    NoFreeDescriptor,
    /// No directory entry has the given name.
    NotFound,
    /// The operation doesn't make sense for this kind of file, such as writing to a regular file or closing
    /// standard input.
    Unsupported,
    InvalidArgument,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FileKind {
    Stdin,
    Stdout,
    RegularFile { inode: u32 },
    Directory,
    Rtc,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct OpenFile {
    pub kind: FileKind,
    /// For regular files, a byte offset. For the directory, the index of the next entry to read.
    pub position: usize,
}

impl OpenFile {
    pub fn new(kind: FileKind) -> OpenFile {
        OpenFile { kind, position: 0 }
    }
}

pub struct FileTable {
    files: [Option<OpenFile>; MAX_FILES],
}

impl FileTable {
    /// A new table has standard input and output open, and nothing else.
    pub fn new() -> FileTable {
        let mut files = [None; MAX_FILES];
        files[STDIN] = Some(OpenFile::new(FileKind::Stdin));
        files[STDOUT] = Some(OpenFile::new(FileKind::Stdout));
        FileTable { files }
    }

    /// Open a file of the given kind in the lowest free descriptor.
    pub fn install<P: Platform>(&mut self, kind: FileKind, platform: &mut P) -> Result<usize, FileError> {
        let descriptor = self.files.iter().position(Option::is_none).ok_or(FileError::NoFreeDescriptor)?;
        if kind == FileKind::Rtc {
            platform.rtc().open();
        }
        self.files[descriptor] = Some(OpenFile::new(kind));
        Ok(descriptor)
    }

    pub fn get_mut(&mut self, descriptor: i32) -> Result<&mut OpenFile, FileError> {
        let index = usize::try_from(descriptor).map_err(|_| FileError::BadDescriptor)?;
        self.files.get_mut(index).and_then(Option::as_mut).ok_or(FileError::BadDescriptor)
    }

    pub fn close<P: Platform>(&mut self, descriptor: i32, platform: &mut P) -> Result<(), FileError> {
        let file = *self.get_mut(descriptor)?;
        if let FileKind::Stdin | FileKind::Stdout = file.kind {
            return Err(FileError::Unsupported);
        }

        if file.kind == FileKind::Rtc {
            platform.rtc().close();
        }
        self.files[descriptor as usize] = None;
        Ok(())
    }

    /// Close every descriptor other than standard input and output.
    pub fn close_all<P: Platform>(&mut self, platform: &mut P) {
        for descriptor in (STDOUT + 1)..MAX_FILES {
            if self.files[descriptor].is_some() {
                let _ = self.close(descriptor as i32, platform);
            }
        }
    }

    pub fn open_count(&self) -> usize {
        self.files.iter().flatten().count()
    }
}
