// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use bincode::{Decode, Encode};
use packet::{Direction, Generation, ServerRole};
use serde::{Deserialize, Serialize};

use crate::CaptureError;

pub const MAGIC: [u8; 4] = *b"MHFR";
pub const VERSION: u16 = 1;

/// Metadata always occupies at least this many bytes on disk so a later
/// [`crate::patch_metadata`] never has to move the records behind it.
pub const MIN_META_BLOCK: usize = 512;

/// Fixed 32-byte file header, big-endian. Kept private; the public face is
/// [`CaptureHeader`] with the reserved fields and tags resolved.
#[derive(Debug, PartialEq, Eq, Encode, Decode)]
pub(crate) struct FileHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub role: u8,
    pub generation: u8,
    pub started_at: u64,
    pub reserved0: u32,
    pub meta_len: u32,
    pub reserved1: u64,
}

impl FileHeader {
    pub const SIZE: usize = 32;
}

/// Per-record prefix: timestamp, direction tag, opcode, payload length.
#[derive(Debug, PartialEq, Eq, Encode, Decode)]
pub(crate) struct RecordHeader {
    pub timestamp: u64,
    pub direction: u8,
    pub opcode: u16,
    pub len: u32,
}

impl RecordHeader {
    pub const SIZE: usize = 15;
}

/// Descriptive part of a capture file's fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHeader {
    pub role: ServerRole,
    pub generation: Generation,
    /// Session start, nanoseconds since the epoch.
    pub started_at: u64,
}

/// One framed packet as it went over the wire, already decrypted.
/// The payload still carries its two leading opcode bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    pub timestamp: u64,
    pub direction: Direction,
    pub opcode: u16,
    pub payload: Vec<u8>,
}

/// Session facts attached to a capture. The identifiers are usually not
/// known until the session is underway and get patched in afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureMeta {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub char_id: u32,
    #[serde(default)]
    pub user_id: u32,
}

/// JSON-encode metadata, space-padded to at least `min_len`.
pub(crate) fn encode_meta(meta: &CaptureMeta, min_len: usize) -> Result<Vec<u8>, CaptureError> {
    let mut block = serde_json::to_vec(meta)?;
    if block.len() < min_len {
        block.resize(min_len, b' ');
    }
    Ok(block)
}

/// Decode a metadata block, ignoring the space padding after the JSON.
pub(crate) fn decode_meta(raw: &[u8]) -> Result<CaptureMeta, CaptureError> {
    let end = raw.iter().rposition(|b| *b != b' ').map_or(0, |p| p + 1);
    Ok(serde_json::from_slice(&raw[..end])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_block_roundtrip() {
        let meta = CaptureMeta {
            host: "127.0.0.1".into(),
            port: 54001,
            char_id: 42,
            user_id: 7,
        };
        let block = encode_meta(&meta, MIN_META_BLOCK).unwrap();
        assert_eq!(block.len(), MIN_META_BLOCK);
        assert!(block.ends_with(b" "));
        assert_eq!(decode_meta(&block).unwrap(), meta);
    }

    #[test]
    fn oversized_meta_is_not_padded() {
        let meta = CaptureMeta {
            host: "x".repeat(2 * MIN_META_BLOCK),
            ..Default::default()
        };
        let block = encode_meta(&meta, MIN_META_BLOCK).unwrap();
        assert!(block.len() > MIN_META_BLOCK);
        assert_eq!(decode_meta(&block).unwrap(), meta);
    }

    #[test]
    fn meta_tolerates_missing_identifiers() {
        let meta = decode_meta(br#"{"host":"10.0.0.1","port":53310}   "#).unwrap();
        assert_eq!(meta.char_id, 0);
        assert_eq!(meta.user_id, 0);
    }
}
