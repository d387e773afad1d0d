//! Encode and decode single blocks: compress-or-store, then the optional
//! keystream layer.
//!
//! The builder's decision rule lives here: every chunk is compressed first,
//! and the compressed form is kept only when it is strictly smaller than the
//! raw chunk.  A block that would expand is stored raw with the compressed
//! flag clear, so `compressedSize <= uncompressedSize` holds for every block
//! on disk.

use crate::codec::{BlockCompressor, Zstd};
use crate::crypto::{apply_keystream, KEY_LEN};
use crate::error::{PakError, PakResult};
use crate::layout::{BlockHeader, CHUNK_SIZE, FLAG_COMPRESSED, FLAG_ENCRYPTED};

/// Encode one chunk into a block header and its on-disk payload.
///
/// `allow_compress` is false for files matched by the builder's
/// ignore-compression extension list (and when the level is 0).
pub fn encode_block(
    chunk: &[u8],
    level: u8,
    allow_compress: bool,
    key: Option<&[u8; KEY_LEN]>,
    path_key: u32,
    block_index: u32,
) -> PakResult<(BlockHeader, Vec<u8>)> {
    debug_assert!(chunk.len() <= CHUNK_SIZE);

    let mut flags = 0u16;
    let mut payload = if allow_compress && level > 0 {
        let compressed = Zstd.compress(chunk, level)?;
        if compressed.len() < chunk.len() {
            flags |= FLAG_COMPRESSED;
            compressed
        } else {
            chunk.to_vec()
        }
    } else {
        chunk.to_vec()
    };

    if let Some(key) = key {
        apply_keystream(key, path_key, block_index, &mut payload);
        flags |= FLAG_ENCRYPTED;
    }

    let header = BlockHeader {
        uncompressed_size: chunk.len() as u32,
        compressed_size: payload.len() as u32,
        flags,
    };
    Ok((header, payload))
}

/// Decode one block payload back to its chunk: decrypt per the encrypted
/// flag, then decompress (or length-check a raw payload) per the compressed
/// flag.
pub fn decode_block(
    header: &BlockHeader,
    payload: &[u8],
    key: Option<&[u8; KEY_LEN]>,
    path_key: u32,
    block_index: u32,
) -> PakResult<Vec<u8>> {
    header.validate()?;
    if payload.len() != header.compressed_size as usize {
        return Err(PakError::CorruptBlock(format!(
            "payload of {} bytes, header records {}",
            payload.len(),
            header.compressed_size
        )));
    }

    let mut work = payload.to_vec();
    if header.is_encrypted() {
        let key = key.ok_or(PakError::MissingKey)?;
        apply_keystream(key, path_key, block_index, &mut work);
    }

    if header.is_compressed() {
        Zstd.decompress(&work, header.uncompressed_size as usize)
    } else {
        // Raw passthrough; validate() already pinned the length.
        Ok(work)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incompressible(len: usize) -> Vec<u8> {
        // Simple xorshift stream; zstd cannot shrink it.
        let mut state = 0x2545f4914f6cdd1du64;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state as u8
            })
            .collect()
    }

    #[test]
    fn compressible_chunk_roundtrips() {
        let chunk = vec![0xabu8; 4096];
        let (header, payload) = encode_block(&chunk, 6, true, None, 1, 0).unwrap();
        assert!(header.is_compressed());
        assert!((payload.len() as u32) < header.uncompressed_size);
        assert_eq!(decode_block(&header, &payload, None, 1, 0).unwrap(), chunk);
    }

    #[test]
    fn incompressible_chunk_is_stored_raw() {
        let chunk = incompressible(4096);
        let (header, payload) = encode_block(&chunk, 9, true, None, 1, 0).unwrap();
        assert!(!header.is_compressed());
        assert_eq!(header.compressed_size, header.uncompressed_size);
        assert_eq!(payload, chunk);
    }

    #[test]
    fn level_zero_stores_raw() {
        let chunk = vec![0u8; 2048];
        let (header, _) = encode_block(&chunk, 0, true, None, 1, 0).unwrap();
        assert!(!header.is_compressed());
    }

    #[test]
    fn encrypted_chunk_roundtrips_only_with_matching_context() {
        let key = crate::crypto::derive_key("pw").unwrap();
        let chunk = b"some compressible payload ".repeat(100);
        let (header, payload) = encode_block(&chunk, 6, true, Some(&key), 42, 3).unwrap();
        assert!(header.is_encrypted());

        assert_eq!(
            decode_block(&header, &payload, Some(&key), 42, 3).unwrap(),
            chunk
        );
        // Wrong block index yields a different keystream; the compressed
        // payload no longer parses.
        assert!(decode_block(&header, &payload, Some(&key), 42, 4).is_err());
        // No key at all is refused outright.
        assert!(matches!(
            decode_block(&header, &payload, None, 42, 3),
            Err(PakError::MissingKey)
        ));
    }

    #[test]
    fn flipped_payload_byte_is_detected() {
        let chunk = b"pattern ".repeat(512);
        let (header, mut payload) = encode_block(&chunk, 6, true, None, 9, 0).unwrap();
        let mid = payload.len() / 2;
        payload[mid] ^= 0x40;
        assert!(matches!(
            decode_block(&header, &payload, None, 9, 0),
            Err(PakError::CorruptBlock(_))
        ));
    }
}
