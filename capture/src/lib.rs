// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use thiserror::Error;

pub mod filter;
mod format;
mod reader;
mod writer;

pub use format::*;
pub use reader::*;
pub use writer::*;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("invalid magic (expected {:?}, got {found:?})", MAGIC)]
    InvalidMagic { found: [u8; 4] },
    #[error("unsupported version {found} (expected {VERSION})")]
    UnsupportedVersion { found: u16 },
    #[error("unknown server role tag {0:#04x}")]
    InvalidRole(u8),
    #[error("unknown protocol generation tag {0:#04x}")]
    InvalidGeneration(u8),
    #[error("unknown direction tag {0:#04x}")]
    InvalidDirection(u8),
    #[error("truncated packet record")]
    TruncatedRecord,
    #[error("metadata does not fit the allocated block ({size} > {capacity})")]
    MetadataOverflow { size: usize, capacity: usize },
    #[error("bad metadata block ({0})")]
    Meta(#[from] serde_json::Error),
    #[error("record encoding failed ({0})")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("record decoding failed ({0})")]
    Decode(#[from] bincode::error::DecodeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
