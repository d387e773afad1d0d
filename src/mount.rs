//! Mount glue: adapts [`PackageReader`] to the engine-facing virtual-file
//! contract — open a logical path, read byte ranges, query the size.
//!
//! A [`VirtualFile`] is a cheap handle (shared reader + copied table entry).
//! Clones are independent and may read from any thread; dropping the last
//! handle and the mount closes the archive.

use std::path::Path;
use std::sync::Arc;

use crate::error::PakResult;
use crate::layout::FileTableEntry;
use crate::reader::PackageReader;

#[derive(Clone)]
pub struct PackageMount {
    reader: Arc<PackageReader>,
}

impl PackageMount {
    pub fn new(reader: PackageReader) -> Self {
        Self {
            reader: Arc::new(reader),
        }
    }

    pub fn mount(path: impl AsRef<Path>) -> PakResult<Self> {
        Ok(Self::new(PackageReader::open(path)?))
    }

    pub fn mount_encrypted(path: impl AsRef<Path>, key_string: &str) -> PakResult<Self> {
        Ok(Self::new(PackageReader::open_encrypted(path, key_string)?))
    }

    /// Resolve a logical path to a file handle.
    pub fn open_logical(&self, path: &str) -> PakResult<VirtualFile> {
        let entry = *self.reader.find(path)?;
        Ok(VirtualFile {
            reader: Arc::clone(&self.reader),
            entry,
        })
    }

    pub fn reader(&self) -> &PackageReader {
        &self.reader
    }
}

#[derive(Clone)]
pub struct VirtualFile {
    reader: Arc<PackageReader>,
    entry: FileTableEntry,
}

impl VirtualFile {
    /// Uncompressed total size of the underlying entry.
    pub fn size(&self) -> u64 {
        self.entry.uncompressed_size as u64
    }

    pub fn read_at(&self, offset: u64, length: usize) -> PakResult<Vec<u8>> {
        self.reader.read(&self.entry, offset, length)
    }

    pub fn read_all(&self) -> PakResult<Vec<u8>> {
        self.reader.read_all(&self.entry)
    }
}
