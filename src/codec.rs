//! Block compression.
//!
//! The format knows a single compressor (Zstandard) behind a narrow trait so
//! the builder and reader never touch the backend directly.  The format's
//! level scale is 0..9 where 0 means "store"; 0 is handled above this trait
//! (a stored block simply skips the compressor), levels 1..9 are mapped onto
//! Zstd's wider range.

use crate::error::{PakError, PakResult};

/// One bounded-size chunk in, one bounded-size chunk out.
pub trait BlockCompressor: Send + Sync {
    fn compress(&self, data: &[u8], level: u8) -> PakResult<Vec<u8>>;

    /// Decompress a block payload.  Fails with `CorruptBlock` when the output
    /// does not come out at exactly `expected_size`.
    fn decompress(&self, data: &[u8], expected_size: usize) -> PakResult<Vec<u8>>;
}

pub struct Zstd;

/// Map the format's 1..9 scale onto Zstd levels 3..19.
fn zstd_level(level: u8) -> i32 {
    (level.clamp(1, 9) as i32) * 2 + 1
}

impl BlockCompressor for Zstd {
    fn compress(&self, data: &[u8], level: u8) -> PakResult<Vec<u8>> {
        zstd::encode_all(data, zstd_level(level)).map_err(PakError::Io)
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> PakResult<Vec<u8>> {
        let out = zstd::decode_all(data)
            .map_err(|e| PakError::CorruptBlock(format!("decompression failed: {e}")))?;
        if out.len() != expected_size {
            return Err(PakError::CorruptBlock(format!(
                "decompressed to {} bytes, expected {}",
                out.len(),
                expected_size
            )));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_at_every_level() {
        let data = b"the quick brown fox jumps over the lazy dog ".repeat(50);
        for level in 1..=9u8 {
            let packed = Zstd.compress(&data, level).unwrap();
            assert!(packed.len() < data.len());
            assert_eq!(Zstd.decompress(&packed, data.len()).unwrap(), data);
        }
    }

    #[test]
    fn size_mismatch_is_corrupt() {
        let packed = Zstd.compress(b"some data to pack", 3).unwrap();
        assert!(matches!(
            Zstd.decompress(&packed, 4),
            Err(PakError::CorruptBlock(_))
        ));
    }

    #[test]
    fn garbage_payload_is_corrupt() {
        assert!(matches!(
            Zstd.decompress(&[0x13, 0x37, 0x00, 0xff], 100),
            Err(PakError::CorruptBlock(_))
        ));
    }
}
