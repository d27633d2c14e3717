// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use bincode::config;
use packet::{Direction, Generation, ServerRole};

use std::io::Read;

use crate::format::{decode_meta, FileHeader, RecordHeader};
use crate::{CaptureError, CaptureHeader, CaptureMeta, PacketRecord, MAGIC, VERSION};

/// Streams a capture file back out of any byte source.
#[derive(Debug)]
pub struct CaptureReader<R: Read> {
    source: R,
    pub header: CaptureHeader,
    pub meta: CaptureMeta,
}

impl<R: Read> CaptureReader<R> {
    pub fn new(mut source: R) -> Result<Self, CaptureError> {
        let mut buf = [0u8; FileHeader::SIZE];
        source.read_exact(&mut buf)?;
        let (hdr, len) =
            bincode::decode_from_slice::<FileHeader, _>(&buf, config::legacy().with_big_endian())?;
        debug_assert_eq!(len, FileHeader::SIZE);

        if hdr.magic != MAGIC {
            return Err(CaptureError::InvalidMagic { found: hdr.magic });
        }
        if hdr.version != VERSION {
            return Err(CaptureError::UnsupportedVersion { found: hdr.version });
        }
        let role = ServerRole::try_from(hdr.role).map_err(|_| CaptureError::InvalidRole(hdr.role))?;
        let generation = Generation::try_from(hdr.generation)
            .map_err(|_| CaptureError::InvalidGeneration(hdr.generation))?;

        let mut meta_raw = vec![0u8; hdr.meta_len as usize];
        source.read_exact(&mut meta_raw)?;
        let meta = decode_meta(&meta_raw)?;

        Ok(Self {
            source,
            header: CaptureHeader {
                role,
                generation,
                started_at: hdr.started_at,
            },
            meta,
        })
    }

    /// The next record, or `None` once the source ends at a record boundary.
    /// Running out of bytes anywhere inside a record is an error.
    pub fn read_packet(&mut self) -> Result<Option<PacketRecord>, CaptureError> {
        let mut buf = [0u8; RecordHeader::SIZE];
        let first = self.source.read(&mut buf)?;
        if first == 0 {
            return Ok(None);
        }
        self.source.read_exact(&mut buf[first..]).map_err(truncated)?;
        let (hdr, _) =
            bincode::decode_from_slice::<RecordHeader, _>(&buf, config::legacy().with_big_endian())?;

        let direction = Direction::try_from(hdr.direction)
            .map_err(|_| CaptureError::InvalidDirection(hdr.direction))?;

        let mut payload = vec![0u8; hdr.len as usize];
        self.source.read_exact(&mut payload).map_err(truncated)?;

        Ok(Some(PacketRecord {
            timestamp: hdr.timestamp,
            direction,
            opcode: hdr.opcode,
            payload,
        }))
    }
}

fn truncated(err: std::io::Error) -> CaptureError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        CaptureError::TruncatedRecord
    } else {
        CaptureError::Io(err)
    }
}
