// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use crate::encrypted_stream::FramedStream;
use capture::{CaptureWriter, PacketRecord};
use log::warn;
use packet::Direction;

use std::collections::HashSet;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

/// Shared recording state behind a single lock. The two halves of a duplex
/// connection (or the proxy's two pump tasks) append through one of these,
/// holding the lock only for the duration of a single record.
pub struct Recorder<W: Write> {
    writer: Mutex<CaptureWriter<W>>,
    skip: HashSet<u16>,
}

impl<W: Write> Recorder<W> {
    pub fn new(writer: CaptureWriter<W>, skip: impl IntoIterator<Item = u16>) -> Arc<Self> {
        Arc::new(Self {
            writer: Mutex::new(writer),
            skip: skip.into_iter().collect(),
        })
    }

    /// Mirror one decrypted payload into the capture. Append failures are
    /// diagnostic-only and must not take the connection down with them.
    pub fn record(&self, direction: Direction, payload: &[u8]) {
        let opcode = record_opcode(payload);
        if self.skip.contains(&opcode) {
            return;
        }

        let record = PacketRecord {
            timestamp: now_nanos(),
            direction,
            opcode,
            payload: payload.to_vec(),
        };
        let mut writer = self.writer.lock().unwrap();
        if let Err(err) = writer.write_packet(&record) {
            warn!("capture append failed: {err}");
        }
    }

    pub fn flush(&self) {
        if let Err(err) = self.writer.lock().unwrap().flush() {
            warn!("capture flush failed: {err}");
        }
    }
}

/// Opcode lives in the first two payload bytes; anything shorter records as 0.
pub fn record_opcode(payload: &[u8]) -> u16 {
    match payload {
        [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
        _ => 0,
    }
}

pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Transparent decorator mirroring everything that passes through a framed
/// stream into a capture. Session logic on top cannot tell the difference:
/// errors come through unchanged, and a failed operation records nothing.
pub struct RecordingStream<T, W: Write> {
    inner: T,
    recorder: Arc<Recorder<W>>,
}

impl<T: FramedStream, W: Write> RecordingStream<T, W> {
    pub fn new(inner: T, recorder: Arc<Recorder<W>>) -> Self {
        Self { inner, recorder }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: FramedStream, W: Write> FramedStream for RecordingStream<T, W> {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.inner.send(data).await?;
        self.recorder.record(Direction::Outbound, data);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>> {
        let data = self.inner.recv().await?;
        self.recorder.record(Direction::Inbound, &data);
        Ok(data)
    }
}
