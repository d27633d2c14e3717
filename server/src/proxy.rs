// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use crate::encrypted_stream::EncryptedStream;
use crate::recording::{now_nanos, record_opcode, Recorder};
use capture::{CaptureHeader, CaptureMeta, CaptureWriter};
use clap::Args;
use futures::{AsyncRead, AsyncReadExt, AsyncWrite};
use log::{error, info, trace};
use packet::Direction;
use rand::Rng;

use std::fs::File;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;

use anyhow::{Context, Result};
use smol::Async;

/// Man in the middle for a sign or channel server. Every frame is decrypted,
/// mirrored into a capture file, re-encrypted and forwarded. The capture's
/// session identifiers can be patched in later with capdump.
#[derive(Args, Debug)]
#[command(about, long_about, verbatim_doc_comment)]
pub struct ProxyArgs {
    /// port to accept game clients on
    #[clap(long = "proxy-port", default_value_t = 54001)]
    pub listen_port: u16,

    /// real server to forward to
    #[clap(long = "upstream", default_value = "127.0.0.1:54002")]
    pub upstream: String,

    /// role tag stamped into capture files
    #[clap(long = "proxy-role", default_value = "channel", value_parser = crate::args::parse_role)]
    pub role: packet::ServerRole,

    /// client protocol generation
    #[clap(long = "generation", default_value = "zenith", value_parser = crate::args::parse_generation)]
    pub generation: packet::Generation,

    /// opcodes to leave out of captures (e.g. keepalives)
    #[clap(long = "skip-opcode", value_delimiter = ',')]
    pub skip_opcodes: Vec<u16>,
}

pub struct Listener {
    tcp_listener: Async<TcpListener>,
    args: Arc<crate::args::Config>,
}

impl Listener {
    pub fn new(tcp_listener: Async<TcpListener>, args: &Arc<crate::args::Config>) -> Self {
        Self {
            tcp_listener,
            args: args.clone(),
        }
    }

    pub async fn listen(&mut self) -> Result<()> {
        info!(
            "Proxy: listening on {}",
            self.tcp_listener.get_ref().local_addr()?
        );
        let upstream_addr: SocketAddr = self
            .args
            .proxy
            .upstream
            .parse()
            .with_context(|| format!("bad upstream address {:?}", self.args.proxy.upstream))?;

        loop {
            let (client, peer) = self.tcp_listener.accept().await?;
            let args = self.args.clone();

            // Give the connection handler its own background task
            smol::spawn(async move {
                info!("Proxy: new connection from {peer}");
                if let Err(err) = run_session(client, peer, upstream_addr, args).await {
                    error!("Proxy: {peer} error: {err}");
                }
            })
            .detach();
        }
    }
}

async fn run_session(
    client: Async<TcpStream>,
    peer: SocketAddr,
    upstream_addr: SocketAddr,
    args: Arc<crate::args::Config>,
) -> Result<()> {
    let upstream = Async::<TcpStream>::connect(upstream_addr)
        .await
        .with_context(|| format!("cannot reach upstream {upstream_addr}"))?;

    let recorder = open_recorder(&args, peer)?;
    let generation = args.proxy.generation;

    let (client_r, client_w) = client.split();
    let (upstream_r, upstream_w) = upstream.split();

    let inbound = Pump {
        peer,
        direction: Direction::Inbound,
        from: EncryptedStream::new(client_r, generation),
        to: EncryptedStream::new(upstream_w, generation),
        recorder: recorder.clone(),
    };
    let outbound = Pump {
        peer,
        direction: Direction::Outbound,
        from: EncryptedStream::new(upstream_r, generation),
        to: EncryptedStream::new(client_w, generation),
        recorder,
    };

    // One task per direction; either side closing tears the session down
    // because its peer's reads start failing too.
    smol::spawn(inbound.run()).detach();
    smol::spawn(outbound.run()).detach();
    Ok(())
}

fn open_recorder(
    args: &crate::args::Config,
    peer: SocketAddr,
) -> Result<Arc<Recorder<File>>> {
    std::fs::create_dir_all(&args.capture_dir)?;

    let role = args.proxy.role;
    let started_at = now_nanos();
    let suffix: u32 = rand::thread_rng().gen();
    let name = format!("{role:?}_{started_at}_{suffix:08x}.mhfcap").to_lowercase();
    let path = args.capture_dir.join(name);

    let file = File::create(&path)?;
    let header = CaptureHeader {
        role,
        generation: args.proxy.generation,
        started_at,
    };
    let meta = CaptureMeta {
        host: peer.ip().to_string(),
        port: peer.port(),
        ..Default::default()
    };
    let writer = CaptureWriter::new(file, header, &meta)?;
    info!("Proxy: capturing {peer} to {path:?}");

    Ok(Recorder::new(writer, args.proxy.skip_opcodes.iter().copied()))
}

/// One direction of a proxied session.
struct Pump<R: Unpin + AsyncRead, W: Unpin + AsyncWrite> {
    peer: SocketAddr,
    direction: Direction,
    from: EncryptedStream<R>,
    to: EncryptedStream<W>,
    recorder: Arc<Recorder<File>>,
}

impl<R: Unpin + AsyncRead, W: Unpin + AsyncWrite> Pump<R, W> {
    async fn run(mut self) {
        if let Err(err) = self.pump().await {
            info!("Proxy: {} {} closed: {err}", self.peer, self.direction);
        }
        self.recorder.flush();
    }

    async fn pump(&mut self) -> Result<()> {
        loop {
            let payload = self.from.recv().await?;
            trace!(
                "Proxy: {} {} opcode {:#06x} len {}",
                self.peer,
                self.direction,
                record_opcode(&payload),
                payload.len()
            );
            self.recorder.record(self.direction, &payload);
            self.to.send(&payload).await?;
        }
    }
}
