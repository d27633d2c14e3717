// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use crypto::rot;
use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use log::{debug, trace};
use packet::{FrameHeader, Generation};

use anyhow::{bail, Result};
use thiserror::Error;

/// Both sides start their rotating keys here and advance them in lockstep.
pub const INITIAL_KEY_ROT: u32 = 995117;
/// Rotation advance requested with every sent frame.
pub const SEND_KEY_ROT_DELTA: u8 = 3;

/// A frame whose checksums match neither the rotating key nor any candidate
/// in the recovery scan. The connection is beyond repair at this point;
/// reading on would only desynchronize it further.
#[derive(Error, Debug)]
#[error("frame checksum mismatch (header {expected:04x?}, payload {computed:04x?}); recovery scan exhausted")]
pub struct ChecksumMismatch {
    pub expected: [u16; 3],
    pub computed: [u16; 3],
}

/// The "send framed bytes / receive framed bytes" capability session logic
/// is written against. Payloads cross this boundary fully decrypted, with
/// their two leading opcode bytes in place.
#[allow(async_fn_in_trait)]
pub trait FramedStream {
    async fn send(&mut self, data: &[u8]) -> Result<()>;
    async fn recv(&mut self) -> Result<Vec<u8>>;
}

/// A wrapper that reads / writes encrypted frames to the underlying
/// reader / writer.
///
/// Key state is tracked per direction, so a stream built over just a read
/// half only ever touches the read side and vice versa - splitting a TCP
/// stream and wrapping each half separately is the intended duplex setup.
#[derive(Debug)]
pub struct EncryptedStream<T: Unpin> {
    pub stream: T,
    generation: Generation,
    read_key_rot: u32,
    send_key_rot: u32,
    sent_count: i32,
    prev_recv_check: u16,
    prev_send_check: u16,
    send_buf: Vec<u8>,
}

impl<T: Unpin> EncryptedStream<T> {
    pub fn new(stream: T, generation: Generation) -> Self {
        Self {
            stream,
            generation,
            read_key_rot: INITIAL_KEY_ROT,
            send_key_rot: INITIAL_KEY_ROT,
            sent_count: 0,
            prev_recv_check: 0,
            prev_send_check: 0,
            send_buf: Vec::new(),
        }
    }

    pub fn read_key_rot(&self) -> u32 {
        self.read_key_rot
    }

    pub fn send_key_rot(&self) -> u32 {
        self.send_key_rot
    }

    /// Combined checksum of the last frame received on this stream.
    pub fn prev_recv_check(&self) -> u16 {
        self.prev_recv_check
    }

    /// Combined checksum of the last frame sent on this stream.
    pub fn prev_send_check(&self) -> u16 {
        self.prev_send_check
    }
}

impl<T: Unpin + AsyncRead> EncryptedStream<T> {
    /// Receive one frame and return its decrypted payload.
    /// A short read anywhere is fatal to the connection.
    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        let mut hdr_buf = [0u8; FrameHeader::SIZE];
        self.stream.read_exact(&mut hdr_buf).await?;
        let hdr = FrameHeader::decode(&hdr_buf)?;

        let mut body = vec![0u8; hdr.body_len(self.generation)];
        self.stream.read_exact(&mut body).await?;

        // the sender advances its key before encrypting; mirror that here
        if hdr.key_rot_delta != 0 {
            self.read_key_rot =
                (hdr.key_rot_delta as u32).wrapping_mul(self.read_key_rot.wrapping_add(1));
        }

        let out = rot::transform(&body, self.read_key_rot, false, None);
        if out.checks == hdr.checks {
            self.prev_recv_check = out.combined;
            trace!("recv: seq {} len {}", hdr.seq, out.data.len());
            return Ok(out.data);
        }

        // Wrong key. Scan the whole single-byte key space; a hit applies to
        // this frame only and is never folded back into read_key_rot.
        for key in 0..=254u8 {
            let retry = rot::transform(&body, 0, false, Some(key));
            if retry.checks == hdr.checks {
                debug!("recv: key fell out of rotation, recovered with {key:#04x}");
                self.prev_recv_check = retry.combined;
                return Ok(retry.data);
            }
        }

        Err(ChecksumMismatch {
            expected: hdr.checks,
            computed: out.checks,
        }
        .into())
    }
}

impl<T: Unpin + AsyncWrite> EncryptedStream<T> {
    /// Send one payload as a single encrypted frame.
    /// This is cancellation-safe, although the frame might be sent
    /// incompletely, and further attempts to send will immediately fail.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.send_buf.is_empty() {
            bail!("One of the previous send operations was cancelled. Aborting");
        }

        let delta = SEND_KEY_ROT_DELTA;
        if delta != 0 {
            self.send_key_rot = (delta as u32).wrapping_mul(self.send_key_rot.wrapping_add(1));
        }
        let out = rot::transform(data, self.send_key_rot, true, None);

        let hdr = FrameHeader {
            size_ext: FrameHeader::size_ext_for(out.data.len()),
            key_rot_delta: delta,
            seq: self.sent_count as u16,
            declared_size: out.data.len() as u16,
            prev_check: self.prev_send_check,
            checks: out.checks,
        };

        self.send_buf.resize(FrameHeader::SIZE, 0u8);
        hdr.encode(&mut self.send_buf[..FrameHeader::SIZE])?;
        self.send_buf.extend_from_slice(&out.data);
        self.stream.write_all(&self.send_buf).await?;
        self.send_buf.clear();

        self.sent_count = self.sent_count.wrapping_add(1);
        self.prev_send_check = out.combined;
        trace!("sent: seq {} len {}", hdr.seq, out.data.len());
        Ok(())
    }
}

impl<T: Unpin + AsyncRead + AsyncWrite> FramedStream for EncryptedStream<T> {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        EncryptedStream::send(self, data).await
    }

    async fn recv(&mut self) -> Result<Vec<u8>> {
        EncryptedStream::recv(self).await
    }
}
