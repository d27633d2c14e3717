// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use crypto::rot;
use packet::{FrameHeader, Generation};
use server::encrypted_stream::{
    ChecksumMismatch, EncryptedStream, INITIAL_KEY_ROT, SEND_KEY_ROT_DELTA,
};

use std::net::{TcpListener, TcpStream};

use futures::AsyncWriteExt;
use smol::Async;

async fn tcp_pair() -> (Async<TcpStream>, Async<TcpStream>) {
    let listener = Async::<TcpListener>::bind(([127, 0, 0, 1], 0)).unwrap();
    let addr = listener.get_ref().local_addr().unwrap();
    let (client, accepted) =
        futures::future::join(Async::<TcpStream>::connect(addr), listener.accept()).await;
    (client.unwrap(), accepted.unwrap().0)
}

#[test]
fn roundtrip_and_key_chain() {
    server::setup_log(true);

    smol::block_on(async {
        let (a, b) = tcp_pair().await;
        let mut client = EncryptedStream::new(a, Generation::Zenith);
        let mut srv = EncryptedStream::new(b, Generation::Zenith);

        client.send(&[0xde, 0xad, 0xbe, 0xef]).await.unwrap();
        assert_eq!(client.send_key_rot(), 3 * (995117 + 1));
        assert_eq!(srv.recv().await.unwrap(), [0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(srv.read_key_rot(), client.send_key_rot());

        let prior = client.send_key_rot();
        client.send(&[0x01]).await.unwrap();
        assert_eq!(
            client.send_key_rot(),
            SEND_KEY_ROT_DELTA as u32 * (prior + 1)
        );
        assert_eq!(srv.recv().await.unwrap(), [0x01]);

        // ten frames each way; both directions must stay in lockstep
        for i in 0..10u8 {
            let payload = vec![i; 32 + i as usize];
            client.send(&payload).await.unwrap();
            assert_eq!(srv.recv().await.unwrap(), payload);
            srv.send(&payload).await.unwrap();
            assert_eq!(client.recv().await.unwrap(), payload);
        }
        assert_eq!(srv.read_key_rot(), client.send_key_rot());
        assert_eq!(client.read_key_rot(), srv.send_key_rot());
        // the checksum chain stays linked in both directions too
        assert_eq!(srv.prev_recv_check(), client.prev_send_check());
        assert_eq!(client.prev_recv_check(), srv.prev_send_check());
    });
}

#[test]
fn extended_size_frames() {
    server::setup_log(true);

    smol::block_on(async {
        let (a, b) = tcp_pair().await;
        let mut client = EncryptedStream::new(a, Generation::Zenith);
        let mut srv = EncryptedStream::new(b, Generation::Zenith);

        // larger than the 16-bit size field; won't fit the socket buffers
        // either, so drive both ends at once
        let payload: Vec<u8> = (0..70_000u32).map(|i| i as u8).collect();
        let (sent, received) = futures::join!(client.send(&payload), srv.recv());
        sent.unwrap();
        assert_eq!(received.unwrap(), payload);

        let (sent, received) = futures::join!(srv.send(&payload), client.recv());
        sent.unwrap();
        assert_eq!(received.unwrap(), payload);
    });
}

#[test]
fn forward_generation_frames() {
    server::setup_log(true);

    smol::block_on(async {
        let (a, b) = tcp_pair().await;
        let mut client = EncryptedStream::new(a, Generation::Forward);
        let mut srv = EncryptedStream::new(b, Generation::Forward);

        let payload = vec![0x5a; 5000];
        client.send(&payload).await.unwrap();
        assert_eq!(srv.recv().await.unwrap(), payload);
    });
}

fn raw_frame(payload: &[u8], key_rot: u32, key_rot_delta: u8, override_key: Option<u8>) -> Vec<u8> {
    let out = rot::transform(payload, key_rot, true, override_key);
    let hdr = FrameHeader {
        size_ext: FrameHeader::size_ext_for(out.data.len()),
        key_rot_delta,
        seq: 0,
        declared_size: out.data.len() as u16,
        prev_check: 0,
        checks: out.checks,
    };
    let mut frame = vec![0u8; FrameHeader::SIZE];
    hdr.encode(&mut frame).unwrap();
    frame.extend_from_slice(&out.data);
    frame
}

#[test]
fn recovery_scan_rescues_a_mismatched_key() {
    server::setup_log(true);

    smol::block_on(async {
        let (mut a, b) = tcp_pair().await;
        let mut rx = EncryptedStream::new(b, Generation::Zenith);

        // encrypted under a key the receiver's rotation will never produce
        let plaintext = b"out of sync but recoverable";
        let frame = raw_frame(plaintext, 0, 0, Some(0x2a));
        a.write_all(&frame).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), plaintext);
        // recovery is single-shot; the rotating state stays where it was
        assert_eq!(rx.read_key_rot(), INITIAL_KEY_ROT);

        // a properly keyed frame right after must decrypt the normal way
        let key_rot = 3 * (INITIAL_KEY_ROT + 1);
        let frame = raw_frame(b"back in rotation", key_rot, 3, None);
        a.write_all(&frame).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), b"back in rotation");
        assert_eq!(rx.read_key_rot(), key_rot);
    });
}

#[test]
fn unmatchable_checksums_are_fatal() {
    server::setup_log(true);

    smol::block_on(async {
        let (mut a, b) = tcp_pair().await;
        let mut rx = EncryptedStream::new(b, Generation::Zenith);

        let mut frame = raw_frame(b"tampered in transit", 0, 0, Some(0x2a));
        // corrupt all three checksums in the header
        for b in &mut frame[8..14] {
            *b ^= 0xa5;
        }
        a.write_all(&frame).await.unwrap();

        let err = rx.recv().await.unwrap_err();
        assert!(err.downcast_ref::<ChecksumMismatch>().is_some(), "{err}");
    });
}
