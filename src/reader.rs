//! Package reader: opens an archive, indexes its file table, and serves
//! random-access reads by decoding only the blocks a range touches.
//!
//! The index is built once at open and never mutated, so `find` needs no
//! locking.  The underlying file handle has a single seek cursor shared by
//! all callers; every seek+read pair runs under one mutex.  Decoding happens
//! on the calling thread after the lock is released, so decompression and
//! decryption of different requests overlap freely.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use parking_lot::Mutex;

use crate::block::decode_block;
use crate::crypto::{derive_key, KEY_LEN};
use crate::error::{PakError, PakResult};
use crate::layout::{
    BlockHeader, FileTableEntry, PackageHeader, BLOCK_HEADER_SIZE, CHUNK_SIZE, ENTRY_SIZE,
};
use crate::pathkey::{key_of, normalize};

pub struct PackageReader {
    file: Mutex<File>,
    header: PackageHeader,
    index: HashMap<u32, FileTableEntry>,
    key: Option<[u8; KEY_LEN]>,
    archive_len: u64,
}

impl PackageReader {
    /// Open an unencrypted archive.
    pub fn open(path: impl AsRef<Path>) -> PakResult<Self> {
        Self::open_inner(path.as_ref(), None)
    }

    /// Open an archive whose blocks were encrypted at build time.
    pub fn open_encrypted(path: impl AsRef<Path>, key_string: &str) -> PakResult<Self> {
        Self::open_inner(path.as_ref(), Some(derive_key(key_string)?))
    }

    fn open_inner(path: &Path, key: Option<[u8; KEY_LEN]>) -> PakResult<Self> {
        let mut file = File::open(path)?;
        let archive_len = file.metadata()?.len();

        let header = PackageHeader::read(&mut file)?;
        header.validate(archive_len)?;

        file.seek(SeekFrom::Start(header.file_table_offset))?;
        let mut table = vec![0u8; header.num_files as usize * ENTRY_SIZE as usize];
        file.read_exact(&mut table)?;

        let mut cursor = Cursor::new(table.as_slice());
        let mut index = HashMap::with_capacity(header.num_files as usize);
        let mut any_encrypted = false;
        for _ in 0..header.num_files {
            let entry = FileTableEntry::read(&mut cursor)?;
            entry.validate(archive_len)?;
            any_encrypted |= entry.is_encrypted();
            if index.insert(entry.path_key, entry).is_some() {
                return Err(PakError::DuplicateKey {
                    key: entry.path_key,
                    detail: "repeated file table entry".into(),
                });
            }
        }
        if any_encrypted && key.is_none() {
            return Err(PakError::MissingKey);
        }

        Ok(Self {
            file: Mutex::new(file),
            header,
            index,
            key,
            archive_len,
        })
    }

    pub fn header(&self) -> &PackageHeader {
        &self.header
    }

    pub fn num_files(&self) -> usize {
        self.index.len()
    }

    /// Iterate the file table, for listing tools.  Order is unspecified.
    pub fn entries(&self) -> impl Iterator<Item = &FileTableEntry> {
        self.index.values()
    }

    /// Look up a logical path.  The path is normalized and hashed exactly as
    /// the builder did it.
    pub fn find(&self, path: &str) -> PakResult<&FileTableEntry> {
        let canonical = normalize(path);
        self.index
            .get(&key_of(&canonical))
            .ok_or(PakError::NotFound(canonical))
    }

    /// Read `length` logical bytes starting at `offset`, decoding only the
    /// blocks the range overlaps.  Ranges reaching past the end of the file
    /// are clamped; a fully out-of-range request yields an empty buffer.
    ///
    /// A corrupt block fails this call only; the handle and every other file
    /// in the archive stay readable.
    pub fn read(&self, entry: &FileTableEntry, offset: u64, length: usize) -> PakResult<Vec<u8>> {
        let file_size = entry.uncompressed_size as u64;
        if offset >= file_size || length == 0 {
            return Ok(Vec::new());
        }
        let length = length.min((file_size - offset) as usize);

        let chunk = CHUNK_SIZE as u64;
        let first_block = (offset / chunk) as u32;
        let last_block = ((offset + length as u64 - 1) / chunk) as u32;

        let raw = self.fetch_blocks(entry, first_block, last_block)?;

        // Decode outside the lock and slice out the requested sub-range.
        let mut out = Vec::with_capacity(length);
        let mut block_start = first_block as u64 * chunk;
        let range_end = offset + length as u64;
        for (i, (header, payload)) in raw.into_iter().enumerate() {
            let block_index = first_block + i as u32;
            let decoded = decode_block(
                &header,
                &payload,
                self.key.as_ref(),
                entry.path_key,
                block_index,
            )?;
            let block_end = block_start + decoded.len() as u64;
            let copy_from = offset.max(block_start);
            let copy_to = range_end.min(block_end);
            if copy_from < copy_to {
                out.extend_from_slice(
                    &decoded[(copy_from - block_start) as usize..(copy_to - block_start) as usize],
                );
            }
            block_start = block_end;
        }
        Ok(out)
    }

    /// Full contents of one entry.
    pub fn read_all(&self, entry: &FileTableEntry) -> PakResult<Vec<u8>> {
        self.read(entry, 0, entry.uncompressed_size as usize)
    }

    /// Walk block headers from the entry's data offset, skipping payloads of
    /// blocks before `first`, and return headers plus raw payloads for
    /// blocks `first..=last`.  Blocks are back-to-back on disk, so each
    /// block's position is the running sum of header size + compressed size.
    ///
    /// Seek+read runs as one atomic unit under the archive lock.
    fn fetch_blocks(
        &self,
        entry: &FileTableEntry,
        first: u32,
        last: u32,
    ) -> PakResult<Vec<(BlockHeader, Vec<u8>)>> {
        let mut blocks = Vec::with_capacity((last - first + 1) as usize);
        let mut header_buf = [0u8; BLOCK_HEADER_SIZE as usize];

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(entry.data_offset))?;
        let mut pos = entry.data_offset;

        for block_index in 0..=last {
            if pos + BLOCK_HEADER_SIZE > self.archive_len {
                return Err(PakError::CorruptBlock(format!(
                    "block {} of entry {:#010x} starts past end of archive",
                    block_index, entry.path_key
                )));
            }
            file.read_exact(&mut header_buf)?;
            let header = BlockHeader::read(Cursor::new(&header_buf))?;
            header.validate()?;

            let payload_len = header.compressed_size as u64;
            if pos + BLOCK_HEADER_SIZE + payload_len > self.archive_len {
                return Err(PakError::CorruptBlock(format!(
                    "block {} of entry {:#010x} extends past end of archive",
                    block_index, entry.path_key
                )));
            }

            if block_index >= first {
                let mut payload = vec![0u8; payload_len as usize];
                file.read_exact(&mut payload)?;
                blocks.push((header, payload));
            } else {
                file.seek(SeekFrom::Current(payload_len as i64))?;
            }
            pos += BLOCK_HEADER_SIZE + payload_len;
        }
        Ok(blocks)
    }
}
