// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use bincode::config;

use std::io::{Read, Seek, SeekFrom, Write};

use crate::format::{encode_meta, FileHeader, RecordHeader, MIN_META_BLOCK};
use crate::{CaptureError, CaptureHeader, CaptureMeta, PacketRecord, MAGIC, VERSION};

/// Streams a capture file into any byte sink. Records are appended as they
/// come; nothing is durable until [`CaptureWriter::flush`] (or the sink's
/// own close) has run.
#[derive(Debug)]
pub struct CaptureWriter<W: Write> {
    sink: W,
}

impl<W: Write> CaptureWriter<W> {
    pub fn new(mut sink: W, header: CaptureHeader, meta: &CaptureMeta) -> Result<Self, CaptureError> {
        let meta_block = encode_meta(meta, MIN_META_BLOCK)?;
        let hdr = FileHeader {
            magic: MAGIC,
            version: VERSION,
            role: header.role.into(),
            generation: header.generation.into(),
            started_at: header.started_at,
            reserved0: 0,
            meta_len: meta_block.len() as u32,
            reserved1: 0,
        };

        let mut buf = [0u8; FileHeader::SIZE];
        let len = bincode::encode_into_slice(&hdr, &mut buf, config::legacy().with_big_endian())?;
        debug_assert_eq!(len, FileHeader::SIZE);
        sink.write_all(&buf)?;
        sink.write_all(&meta_block)?;

        Ok(Self { sink })
    }

    pub fn write_packet(&mut self, record: &PacketRecord) -> Result<(), CaptureError> {
        let hdr = RecordHeader {
            timestamp: record.timestamp,
            direction: record.direction.into(),
            opcode: record.opcode,
            len: record.payload.len() as u32,
        };

        let mut buf = [0u8; RecordHeader::SIZE];
        let len = bincode::encode_into_slice(&hdr, &mut buf, config::legacy().with_big_endian())?;
        debug_assert_eq!(len, RecordHeader::SIZE);
        self.sink.write_all(&buf)?;
        self.sink.write_all(&record.payload)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), CaptureError> {
        Ok(self.sink.flush()?)
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

/// Rewrite the metadata block of an existing capture in place.
///
/// Fails without touching the file if the new metadata does not fit the
/// originally allocated block. The header, its stored metadata length and
/// every packet record stay byte-for-byte untouched.
pub fn patch_metadata<F: Read + Write + Seek>(
    file: &mut F,
    meta: &CaptureMeta,
) -> Result<(), CaptureError> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; FileHeader::SIZE];
    file.read_exact(&mut buf)?;
    let (hdr, _) =
        bincode::decode_from_slice::<FileHeader, _>(&buf, config::legacy().with_big_endian())?;

    if hdr.magic != MAGIC {
        return Err(CaptureError::InvalidMagic { found: hdr.magic });
    }
    if hdr.version != VERSION {
        return Err(CaptureError::UnsupportedVersion { found: hdr.version });
    }

    let capacity = hdr.meta_len as usize;
    let mut block = serde_json::to_vec(meta)?;
    if block.len() > capacity {
        return Err(CaptureError::MetadataOverflow {
            size: block.len(),
            capacity,
        });
    }
    block.resize(capacity, b' ');

    file.seek(SeekFrom::Start(FileHeader::SIZE as u64))?;
    file.write_all(&block)?;
    file.flush()?;
    Ok(())
}
