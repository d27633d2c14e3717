// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use crypto::handshake;
use futures::{AsyncReadExt, AsyncWriteExt};
use log::{debug, error, info};

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use anyhow::{bail, Result};
use smol::Async;

/// Channel directory entry announced to clients.
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct ChannelEntry {
    pub ip: [u8; 4],
    pub port: u16,
}

#[derive(clap::Args, Debug)]
pub struct EntranceArgs {
    /// port to serve the channel directory on
    #[clap(long = "entrance-port", default_value_t = 53310)]
    pub entrance_port: u16,

    /// channels to announce, as ip:port
    #[clap(long = "channel", value_parser = crate::args::parse_channel, value_delimiter = ',')]
    pub channels: Vec<ChannelEntry>,
}

pub struct Listener {
    tcp_listener: Async<TcpListener>,
    args: Arc<crate::args::Config>,
}

impl Listener {
    pub fn new(tcp_listener: Async<TcpListener>, args: Arc<crate::args::Config>) -> Self {
        Self { tcp_listener, args }
    }

    pub async fn listen(&mut self) -> Result<()> {
        info!(
            "Entrance: listening on {}",
            self.tcp_listener.get_ref().local_addr()?
        );

        loop {
            let (stream, peer) = self.tcp_listener.accept().await?;
            let conn = Connection {
                stream,
                args: self.args.clone(),
            };

            // Give the connection handler its own background task
            smol::spawn(async move {
                if let Err(err) = conn.handle().await {
                    error!("Entrance: {peer} error: {err}");
                }
            })
            .detach();
        }
    }
}

pub struct Connection {
    stream: Async<TcpStream>,
    args: Arc<crate::args::Config>,
}

impl Connection {
    /// One-shot directory exchange. This happens before any session key
    /// exists, so both bodies run over the handshake cipher, keyed by the
    /// byte the client leads with, and are checksummed with [`handshake::sum32`].
    ///
    /// Request:  `[u8 key][u16 len][u32 sum][len ciphertext bytes]`
    /// Response: `[u16 len][u32 sum][len ciphertext bytes]`
    pub async fn handle(mut self) -> Result<()> {
        let mut intro = [0u8; 7];
        self.stream.read_exact(&mut intro).await?;
        let key = intro[0];
        let len = u16::from_be_bytes([intro[1], intro[2]]) as usize;
        let sum = u32::from_be_bytes([intro[3], intro[4], intro[5], intro[6]]);

        let mut body = vec![0u8; len];
        self.stream.read_exact(&mut body).await?;
        if handshake::sum32(&body) != sum {
            bail!("directory request checksum mismatch");
        }

        let request = handshake::decrypt(&body, key as u32);
        debug!(
            "Entrance: request {:02x?}",
            &request[..request.len().min(16)]
        );

        let mut listing = Vec::new();
        bincode::encode_into_std_write(
            &self.args.entrance.channels,
            &mut listing,
            bincode::config::legacy().with_big_endian(),
        )?;
        let body = handshake::encrypt(&listing, key as u32);

        let mut reply = Vec::with_capacity(6 + body.len());
        reply.extend_from_slice(&(body.len() as u16).to_be_bytes());
        reply.extend_from_slice(&handshake::sum32(&body).to_be_bytes());
        reply.extend_from_slice(&body);
        self.stream.write_all(&reply).await?;
        Ok(())
    }
}
