//! Package builder: registers input files, then packs them into one archive
//! in a single `build()` pass.
//!
//! The builder is an explicit value owning its registered-file list and
//! configuration; it is single-threaded by contract because every block
//! offset is assigned by the current stream position.  Files are processed
//! strictly in registration order.
//!
//! Builds are all-or-nothing: blocks and table are written into a temp file
//! next to the destination and the temp file is renamed over the output only
//! after the header has been finalized.  A failed build never clobbers a
//! previous archive at the output path.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::block::encode_block;
use crate::crypto::{derive_key, KEY_LEN};
use crate::error::{PakError, PakResult};
use crate::layout::{
    FileTableEntry, PackageHeader, CHUNK_SIZE, FLAG_COMPRESSED, FLAG_ENCRYPTED, HEADER_SIZE,
    VERSION,
};
use crate::pathkey::{join_mount, key_of, normalize};

/// Largest file the format can represent: `numBlocks` is a u16.
const MAX_FILE_SIZE: u64 = u16::MAX as u64 * CHUNK_SIZE as u64;

struct InputFile {
    source: PathBuf,
    archive_path: String,
}

/// Per-file outcome of a build, for tooling output.
#[derive(Debug, Clone)]
pub struct PackedFile {
    pub logical_path: String,
    pub path_key: u32,
    pub uncompressed_size: u32,
    /// Bytes of block payload written for this file (headers excluded).
    pub stored_size: u64,
    pub num_blocks: u16,
    pub compressed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub files: Vec<PackedFile>,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

#[derive(Default)]
pub struct PackageBuilder {
    inputs: Vec<InputFile>,
    mount_prefix: String,
    compression_level: u8,
    key: Option<[u8; KEY_LEN]>,
    /// Lower-case extensions (no dot) stored without a compression attempt.
    ignore_exts: Vec<String>,
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self {
            compression_level: 6,
            ..Self::default()
        }
    }

    /// Register one file under an explicit archive path.
    pub fn add_file(&mut self, source: impl Into<PathBuf>, archive_path: impl Into<String>) {
        self.inputs.push(InputFile {
            source: source.into(),
            archive_path: archive_path.into(),
        });
    }

    /// Register every file under `dir`; archive paths are the paths relative
    /// to `dir`.  Non-recursive mode takes only the directory's own files.
    pub fn add_directory(&mut self, dir: &Path, recursive: bool) -> PakResult<()> {
        let mut walker = WalkDir::new(dir).follow_links(false);
        if !recursive {
            walker = walker.max_depth(1);
        }
        for entry in walker {
            let entry = entry.map_err(|e| {
                let msg = e.to_string();
                let io = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, msg));
                PakError::Io(io)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(dir)
                .map_err(|_| {
                    PakError::Io(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("path escapes input dir: {}", entry.path().display()),
                    ))
                })?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            self.add_file(entry.path(), rel);
        }
        Ok(())
    }

    /// Prefix prepended to every archive path (already registered and yet to
    /// come) before normalization.
    pub fn set_mount_path(&mut self, prefix: impl Into<String>) {
        self.mount_prefix = prefix.into();
    }

    /// Level 0 stores everything raw; 1..9 trade speed for ratio.
    pub fn set_compression_level(&mut self, level: u8) {
        self.compression_level = level.min(9);
    }

    /// Encrypt every block with a key derived from `key_string`.
    pub fn set_encryption(&mut self, key_string: &str) -> PakResult<()> {
        self.key = Some(derive_key(key_string)?);
        Ok(())
    }

    /// Files with this extension are stored without a compression attempt —
    /// meant for already-compressed media (ogg, png, ...).
    pub fn add_ignore_compression_extension(&mut self, ext: &str) {
        self.ignore_exts
            .push(ext.trim_start_matches('.').to_ascii_lowercase());
    }

    fn compression_ignored(&self, canonical_path: &str) -> bool {
        match canonical_path.rsplit_once('.') {
            Some((_, ext)) => self.ignore_exts.iter().any(|e| e == ext),
            None => false,
        }
    }

    /// Pack all registered files into `output_path`.
    pub fn build(&self, output_path: &Path) -> PakResult<BuildReport> {
        // Resolve canonical paths and keys up front so a key collision
        // aborts before any output exists.
        let mut seen: HashMap<u32, String> = HashMap::new();
        let mut resolved: Vec<(u32, String)> = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let canonical = normalize(&join_mount(&self.mount_prefix, &input.archive_path));
            let key = key_of(&canonical);
            if let Some(first) = seen.insert(key, canonical.clone()) {
                return Err(PakError::DuplicateKey {
                    key,
                    detail: format!("{first} collides with {canonical}"),
                });
            }
            resolved.push((key, canonical));
        }

        let staging_dir = match output_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut staging = NamedTempFile::new_in(&staging_dir)?;
        let report = self.write_archive(staging.as_file_mut(), &resolved)?;
        staging
            .persist(output_path)
            .map_err(|e| PakError::Io(e.error))?;
        Ok(report)
    }

    fn write_archive(
        &self,
        file: &mut File,
        resolved: &[(u32, String)],
    ) -> PakResult<BuildReport> {
        let mut writer = BufWriter::new(file);
        // Reserve the header slot; finalized after the table is in place.
        writer.write_all(&[0u8; HEADER_SIZE as usize])?;

        let mut entries: Vec<FileTableEntry> = Vec::with_capacity(self.inputs.len());
        let mut report = BuildReport::default();

        for (input, (path_key, canonical)) in self.inputs.iter().zip(resolved) {
            let data = fs::read(&input.source)?;
            if data.len() as u64 > MAX_FILE_SIZE {
                return Err(PakError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "{}: {} bytes exceeds the format limit of {} bytes",
                        input.source.display(),
                        data.len(),
                        MAX_FILE_SIZE
                    ),
                )));
            }

            let allow_compress = !self.compression_ignored(canonical);
            let data_offset = writer.stream_position()?;
            let mut file_flags = if self.key.is_some() { FLAG_ENCRYPTED } else { 0 };
            let mut stored_size = 0u64;
            let mut num_blocks = 0u16;

            for (block_index, chunk) in data.chunks(CHUNK_SIZE).enumerate() {
                let (header, payload) = encode_block(
                    chunk,
                    self.compression_level,
                    allow_compress,
                    self.key.as_ref(),
                    *path_key,
                    block_index as u32,
                )?;
                header.write(&mut writer)?;
                writer.write_all(&payload)?;
                if header.is_compressed() {
                    file_flags |= FLAG_COMPRESSED;
                }
                stored_size += payload.len() as u64;
                num_blocks += 1;
            }

            entries.push(FileTableEntry {
                path_key: *path_key,
                data_offset,
                uncompressed_size: data.len() as u32,
                num_blocks,
                flags: file_flags,
            });
            report.bytes_in += data.len() as u64;
            report.bytes_out += stored_size;
            report.files.push(PackedFile {
                logical_path: canonical.clone(),
                path_key: *path_key,
                uncompressed_size: data.len() as u32,
                stored_size,
                num_blocks,
                compressed: file_flags & FLAG_COMPRESSED != 0,
            });
        }

        let file_table_offset = writer.stream_position()?;
        for entry in &entries {
            entry.write(&mut writer)?;
        }

        // Backpatch the header now that the table position and count are
        // known.
        writer.seek(SeekFrom::Start(0))?;
        PackageHeader {
            version: VERSION,
            compression_level: self.compression_level,
            num_files: entries.len() as u32,
            file_table_offset,
        }
        .write(&mut writer)?;
        writer.flush()?;

        Ok(report)
    }
}
