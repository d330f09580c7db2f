//! Shared memory region handles delivered by the transport.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// An opaque handle to a block of shared memory.
///
/// Wraps any mappable file (memfd, `/dev/shm` entry, regular file)
/// together with the byte length the peer claims it has.
#[derive(Debug)]
pub struct SharedMemoryRegion {
    file: File,
    len: usize,
}

impl SharedMemoryRegion {
    /// Wrap an already opened file
    pub fn new(file: File, len: usize) -> Self {
        Self { file, len }
    }

    /// Open a region by path for reading and writing
    pub fn open(path: impl AsRef<Path>, len: usize) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self::new(file, len))
    }

    /// Claimed length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes actually backing the handle
    pub(crate) fn backing_len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub(crate) fn file(&self) -> &File {
        &self.file
    }
}
