//! On-disk shapes of the package format: header, file-table entry and block
//! header, plus their validation rules.
//!
//! All integers are little-endian.  This module owns no file handles; it
//! (de)serializes against `Read`/`Write` buffers supplied by the builder and
//! reader.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::{PakError, PakResult};

pub const MAGIC: &[u8; 4] = b"BPAK";
pub const VERSION: u8 = 1;

/// `signature:4 + version:1 + compressionLevel:1 + numFiles:4 + fileTableOffset:8`
pub const HEADER_SIZE: u64 = 18;
/// `pathKey:4 + dataOffset:8 + uncompressedSize:4 + numBlocks:2 + flags:2`
pub const ENTRY_SIZE: u64 = 20;
/// `uncompressedSize:4 + compressedSize:4 + flags:2`
pub const BLOCK_HEADER_SIZE: u64 = 10;

/// Maximum uncompressed bytes per block.  Fixed by the format: the reader
/// maps logical offsets to block indices by dividing by this constant.
pub const CHUNK_SIZE: usize = 8 * 1024;

pub const FLAG_COMPRESSED: u16 = 1 << 0;
pub const FLAG_ENCRYPTED: u16 = 1 << 1;

// ── Header ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct PackageHeader {
    pub version: u8,
    /// Compression level used at build time.  Informational only; each block
    /// carries its own compressed flag.
    pub compression_level: u8,
    pub num_files: u32,
    pub file_table_offset: u64,
}

impl PackageHeader {
    pub fn write<W: Write>(&self, mut writer: W) -> PakResult<()> {
        writer.write_all(MAGIC)?;
        writer.write_u8(self.version)?;
        writer.write_u8(self.compression_level)?;
        writer.write_u32::<LittleEndian>(self.num_files)?;
        writer.write_u64::<LittleEndian>(self.file_table_offset)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> PakResult<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(PakError::InvalidSignature);
        }
        let version = reader.read_u8()?;
        if version != VERSION {
            return Err(PakError::UnsupportedVersion(version));
        }
        Ok(Self {
            version,
            compression_level: reader.read_u8()?,
            num_files: reader.read_u32::<LittleEndian>()?,
            file_table_offset: reader.read_u64::<LittleEndian>()?,
        })
    }

    /// Check the header against the total archive length.
    pub fn validate(&self, archive_len: u64) -> PakResult<()> {
        if self.file_table_offset < HEADER_SIZE || self.file_table_offset > archive_len {
            return Err(PakError::CorruptTable(format!(
                "file table offset {} outside archive of {} bytes",
                self.file_table_offset, archive_len
            )));
        }
        let table_len = self.num_files as u64 * ENTRY_SIZE;
        if self.file_table_offset + table_len > archive_len {
            return Err(PakError::CorruptTable(format!(
                "file table of {} entries extends past end of archive",
                self.num_files
            )));
        }
        Ok(())
    }
}

// ── File table entry ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct FileTableEntry {
    pub path_key: u32,
    /// Absolute offset of this file's first block header.
    pub data_offset: u64,
    pub uncompressed_size: u32,
    pub num_blocks: u16,
    pub flags: u16,
}

impl FileTableEntry {
    pub fn write<W: Write>(&self, mut writer: W) -> PakResult<()> {
        writer.write_u32::<LittleEndian>(self.path_key)?;
        writer.write_u64::<LittleEndian>(self.data_offset)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.num_blocks)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> PakResult<Self> {
        Ok(Self {
            path_key: reader.read_u32::<LittleEndian>()?,
            data_offset: reader.read_u64::<LittleEndian>()?,
            uncompressed_size: reader.read_u32::<LittleEndian>()?,
            num_blocks: reader.read_u16::<LittleEndian>()?,
            flags: reader.read_u16::<LittleEndian>()?,
        })
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Block count implied by the uncompressed size (zero-length files have
    /// zero blocks).
    pub fn expected_blocks(uncompressed_size: u32) -> u64 {
        (uncompressed_size as u64).div_ceil(CHUNK_SIZE as u64)
    }

    pub fn validate(&self, archive_len: u64) -> PakResult<()> {
        if self.data_offset < HEADER_SIZE || self.data_offset > archive_len {
            return Err(PakError::CorruptTable(format!(
                "entry {:#010x}: data offset {} outside archive",
                self.path_key, self.data_offset
            )));
        }
        if Self::expected_blocks(self.uncompressed_size) != self.num_blocks as u64 {
            return Err(PakError::CorruptTable(format!(
                "entry {:#010x}: {} blocks inconsistent with size {}",
                self.path_key, self.num_blocks, self.uncompressed_size
            )));
        }
        // Each block is at least a header; the payload walk re-checks the
        // exact span against the archive length.
        if self.data_offset + self.num_blocks as u64 * BLOCK_HEADER_SIZE > archive_len {
            return Err(PakError::CorruptTable(format!(
                "entry {:#010x}: blocks extend past end of archive",
                self.path_key
            )));
        }
        Ok(())
    }
}

// ── Block header ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct BlockHeader {
    pub uncompressed_size: u32,
    /// On-disk payload length.  Equal to `uncompressed_size` when the
    /// compressed flag is clear, strictly smaller when it is set.
    pub compressed_size: u32,
    pub flags: u16,
}

impl BlockHeader {
    pub fn write<W: Write>(&self, mut writer: W) -> PakResult<()> {
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> PakResult<Self> {
        Ok(Self {
            uncompressed_size: reader.read_u32::<LittleEndian>()?,
            compressed_size: reader.read_u32::<LittleEndian>()?,
            flags: reader.read_u16::<LittleEndian>()?,
        })
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    pub fn validate(&self) -> PakResult<()> {
        if self.uncompressed_size as usize > CHUNK_SIZE {
            return Err(PakError::CorruptBlock(format!(
                "block claims {} uncompressed bytes, chunk limit is {}",
                self.uncompressed_size, CHUNK_SIZE
            )));
        }
        if self.is_compressed() {
            if self.compressed_size >= self.uncompressed_size {
                return Err(PakError::CorruptBlock(format!(
                    "compressed block of {} bytes not smaller than raw {}",
                    self.compressed_size, self.uncompressed_size
                )));
            }
        } else if self.compressed_size != self.uncompressed_size {
            return Err(PakError::CorruptBlock(format!(
                "raw block sizes disagree: {} on disk vs {} logical",
                self.compressed_size, self.uncompressed_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_roundtrip() {
        let header = PackageHeader {
            version: VERSION,
            compression_level: 6,
            num_files: 42,
            file_table_offset: 0x1234,
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, HEADER_SIZE);

        let back = PackageHeader::read(Cursor::new(&buf)).unwrap();
        assert_eq!(back.num_files, 42);
        assert_eq!(back.file_table_offset, 0x1234);
        assert_eq!(back.compression_level, 6);
    }

    #[test]
    fn bad_signature_is_rejected() {
        let mut buf = Vec::new();
        PackageHeader {
            version: VERSION,
            compression_level: 0,
            num_files: 0,
            file_table_offset: HEADER_SIZE,
        }
        .write(&mut buf)
        .unwrap();
        buf[0] = b'X';
        assert!(matches!(
            PackageHeader::read(Cursor::new(&buf)),
            Err(PakError::InvalidSignature)
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut buf = Vec::new();
        PackageHeader {
            version: VERSION,
            compression_level: 0,
            num_files: 0,
            file_table_offset: HEADER_SIZE,
        }
        .write(&mut buf)
        .unwrap();
        buf[4] = 99;
        assert!(matches!(
            PackageHeader::read(Cursor::new(&buf)),
            Err(PakError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn table_outside_archive_is_corrupt() {
        let header = PackageHeader {
            version: VERSION,
            compression_level: 0,
            num_files: 2,
            file_table_offset: 100,
        };
        assert!(matches!(
            header.validate(110),
            Err(PakError::CorruptTable(_))
        ));
        assert!(header.validate(100 + 2 * ENTRY_SIZE).is_ok());
    }

    #[test]
    fn entry_roundtrip_and_block_count_rule() {
        let entry = FileTableEntry {
            path_key: 0xdeadbeef,
            data_offset: HEADER_SIZE,
            uncompressed_size: 20000,
            num_blocks: 3,
            flags: FLAG_COMPRESSED,
        };
        let mut buf = Vec::new();
        entry.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, ENTRY_SIZE);

        let back = FileTableEntry::read(Cursor::new(&buf)).unwrap();
        assert_eq!(back.path_key, 0xdeadbeef);
        assert!(back.is_compressed());
        assert!(!back.is_encrypted());
        assert!(back.validate(1 << 20).is_ok());

        assert_eq!(FileTableEntry::expected_blocks(0), 0);
        assert_eq!(FileTableEntry::expected_blocks(8192), 1);
        assert_eq!(FileTableEntry::expected_blocks(8193), 2);
    }

    #[test]
    fn block_header_invariants() {
        let raw = BlockHeader {
            uncompressed_size: 100,
            compressed_size: 100,
            flags: 0,
        };
        assert!(raw.validate().is_ok());

        let expanded = BlockHeader {
            uncompressed_size: 100,
            compressed_size: 100,
            flags: FLAG_COMPRESSED,
        };
        assert!(matches!(
            expanded.validate(),
            Err(PakError::CorruptBlock(_))
        ));

        let oversized = BlockHeader {
            uncompressed_size: CHUNK_SIZE as u32 + 1,
            compressed_size: 10,
            flags: FLAG_COMPRESSED,
        };
        assert!(matches!(
            oversized.validate(),
            Err(PakError::CorruptBlock(_))
        ));

        let raw_mismatch = BlockHeader {
            uncompressed_size: 100,
            compressed_size: 90,
            flags: 0,
        };
        assert!(matches!(
            raw_mismatch.validate(),
            Err(PakError::CorruptBlock(_))
        ));
    }
}
