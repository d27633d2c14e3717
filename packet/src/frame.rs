// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use bincode::{
    config,
    error::{DecodeError, EncodeError},
    Decode, Encode,
};
use thiserror::Error;

use crate::types::Generation;

/// Fixed-size header preceding every encrypted frame, big-endian on the wire.
///
/// `declared_size` is the body length modulo the extension carried in the
/// high bits of `size_ext`; `prev_check` links this frame to the combined
/// checksum of the previous one in the same direction.
#[derive(Debug, Default, Clone, PartialEq, Eq, Encode, Decode)]
pub struct FrameHeader {
    pub size_ext: u8,
    pub key_rot_delta: u8,
    pub seq: u16,
    pub declared_size: u16,
    pub prev_check: u16,
    pub checks: [u16; 3],
}

impl FrameHeader {
    pub const SIZE: usize = 14;

    pub fn encode(&self, dst: &mut [u8]) -> Result<usize, EncodeError> {
        let len = bincode::encode_into_slice(self, dst, config::legacy().with_big_endian())?;
        debug_assert_eq!(len, Self::SIZE);
        Ok(len)
    }

    /// Only wire-length validation happens here; field semantics are the
    /// connection's business.
    pub fn decode(src: &[u8]) -> Result<Self, FrameDecodeError> {
        if src.len() < Self::SIZE {
            return Err(FrameDecodeError::Truncated { got: src.len() });
        }
        let (hdr, len) =
            bincode::decode_from_slice::<Self, _>(src, config::legacy().with_big_endian())?;
        debug_assert_eq!(len, Self::SIZE);
        Ok(hdr)
    }

    /// Body length announced by this header under the given generation.
    pub fn body_len(&self, generation: Generation) -> usize {
        let base = self.declared_size as usize;
        if generation.has_extended_size() {
            base + usize::from(self.size_ext).saturating_sub(3) * 4096
        } else {
            base
        }
    }

    /// High size bits plus the fixed low-order tag for a body of `len` bytes.
    pub fn size_ext_for(len: usize) -> u8 {
        ((len / 4096) as u8 & 0xf3) | 3
    }
}

#[derive(Error, Debug)]
pub enum FrameDecodeError {
    #[error("truncated header ({got} bytes, expected {})", FrameHeader::SIZE)]
    Truncated { got: usize },
    #[error("decoding failed ({0})")]
    Decode(#[from] DecodeError),
}
