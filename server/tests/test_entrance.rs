// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use crypto::handshake;
use server::entrance::{ChannelEntry, Listener};

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use futures::{AsyncReadExt, AsyncWriteExt};
use smol::{Async, Timer};

async fn connect_timeout(addr: std::net::SocketAddr) -> std::io::Result<Async<TcpStream>> {
    let mut attempts = 0;
    loop {
        let conn = Async::<TcpStream>::connect(addr).await;
        if conn.is_ok() {
            return conn;
        }

        attempts += 1;
        if attempts > 10 {
            return conn;
        }

        Timer::after(Duration::from_millis(75)).await;
    }
}

#[test]
fn directory_exchange() {
    server::setup_log(true);

    smol::block_on(async {
        let tcp_listener = Async::<TcpListener>::bind(([127, 0, 0, 1], 0)).unwrap();
        let addr = tcp_listener.get_ref().local_addr().unwrap();
        let args = Arc::new(server::args::parse_from_str(
            "-s entrance --channel 10.1.0.1:54001,10.1.0.2:54002",
        ));
        let mut listener = Listener::new(tcp_listener, args);
        let _server = smol::spawn(async move {
            let _ = listener.listen().await;
        });

        let mut conn = connect_timeout(addr).await.unwrap();

        let key = 0x5c_u8;
        let body = handshake::encrypt(b"HELLO ENTRANCE", key as u32);
        let mut request = vec![key];
        request.extend_from_slice(&(body.len() as u16).to_be_bytes());
        request.extend_from_slice(&handshake::sum32(&body).to_be_bytes());
        request.extend_from_slice(&body);
        conn.write_all(&request).await.unwrap();

        let mut reply_hdr = [0u8; 6];
        conn.read_exact(&mut reply_hdr).await.unwrap();
        let len = u16::from_be_bytes([reply_hdr[0], reply_hdr[1]]) as usize;
        let sum = u32::from_be_bytes([reply_hdr[2], reply_hdr[3], reply_hdr[4], reply_hdr[5]]);

        let mut body = vec![0u8; len];
        conn.read_exact(&mut body).await.unwrap();
        assert_eq!(handshake::sum32(&body), sum);

        let listing = handshake::decrypt(&body, key as u32);
        let (channels, read) = bincode::decode_from_slice::<Vec<ChannelEntry>, _>(
            &listing,
            bincode::config::legacy().with_big_endian(),
        )
        .unwrap();
        assert_eq!(read, listing.len());
        assert_eq!(
            channels,
            vec![
                ChannelEntry {
                    ip: [10, 1, 0, 1],
                    port: 54001
                },
                ChannelEntry {
                    ip: [10, 1, 0, 2],
                    port: 54002
                },
            ]
        );
    });
}
