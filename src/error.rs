use std::io;
use thiserror::Error;

pub type PakResult<T> = Result<T, PakError>;

/// Every failure surfaced by the builder, reader and mount layer.
#[derive(Error, Debug)]
pub enum PakError {
    #[error("invalid package signature")]
    InvalidSignature,
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),
    #[error("corrupt file table: {0}")]
    CorruptTable(String),
    #[error("corrupt block: {0}")]
    CorruptBlock(String),
    #[error("no entry for path: {0}")]
    NotFound(String),
    #[error("duplicate path key {key:#010x}: {detail}")]
    DuplicateKey { key: u32, detail: String },
    #[error("package is encrypted but no key was provided")]
    MissingKey,
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
