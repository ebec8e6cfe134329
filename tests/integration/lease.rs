//! Lease expiry. A raw peer stands in for "B" so the test can do the
//! handshake, then simply stop sending anything — the closest honest
//! equivalent to halting peer B's outbound traffic without a graceful
//! `Close`, which would close A through the normal path instead of
//! through lease expiry.

use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use zenoh_protocol::codec::{self, peek_streamed_len, MAX_STREAMED_LEN};
use zenoh_protocol::config::TransportConfig;
use zenoh_protocol::msg::transport::{InitAck, OpenAck, TransportMessage};
use zenoh_protocol::msg::WhatAmI;
use zenoh_protocol::sn::{Sn, SnResolution};
use zenoh_protocol::zid::Zid;
use zenoh::UnicastState;

async fn write_msg(stream: &mut TcpStream, msg: &TransportMessage) {
    let bytes = codec::encode_streamed(msg).unwrap();
    stream.write_all(&bytes).await.unwrap();
}

async fn read_msg(stream: &mut TcpStream) -> TransportMessage {
    let mut prefix = [0u8; 2];
    stream.read_exact(&mut prefix).await.unwrap();
    let len = peek_streamed_len(&prefix).unwrap();
    assert!(len <= MAX_STREAMED_LEN);
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await.unwrap();
    codec::decode_streamed_body(&body).unwrap()
}

/// Complete the responder side of the handshake on `stream` and then do
/// nothing else — no keep-alives, no reads, just holding the socket
/// open. Mirrors `UnicastSession::accept` without ever running the
/// lease/keep-alive tasks that would keep a real session alive.
async fn silent_peer_handshake(mut stream: TcpStream, lease_millis: u64) {
    let init_syn = match read_msg(&mut stream).await {
        TransportMessage::InitSyn(m) => m,
        other => panic!("expected InitSyn, got {other:?}"),
    };
    let _ = init_syn;
    let cookie = vec![0xAB; 4];
    write_msg(
        &mut stream,
        &TransportMessage::InitAck(InitAck {
            version: zenoh_protocol::msg::transport::PROTOCOL_VERSION,
            whatami: WhatAmI::PEER,
            zid: Zid::rand(),
            sn_resolution: SnResolution::DEFAULT,
            mtu: 1500,
            qos: true,
            cookie: cookie.clone(),
        }),
    )
    .await;

    let open_syn = match read_msg(&mut stream).await {
        TransportMessage::OpenSyn(m) => m,
        other => panic!("expected OpenSyn, got {other:?}"),
    };
    let _ = open_syn;
    write_msg(
        &mut stream,
        &TransportMessage::OpenAck(OpenAck {
            lease_millis,
            initial_sn: Sn(0),
        }),
    )
    .await;

    // Hold the connection open, sending and reading nothing further.
    tokio::time::sleep(Duration::from_secs(10)).await;
}

#[tokio::test]
async fn session_closes_after_lease_expires_with_no_traffic() {
    let lease_millis = 500;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _peer) = listener.accept().await.unwrap();
        silent_peer_handshake(stream, lease_millis).await;
    });

    let cfg = TransportConfig {
        lease_millis,
        keep_alive_ratio: 4,
        ..TransportConfig::default()
    };
    let a = zenoh::Session::connect_tcp(addr, &cfg).await.unwrap();
    assert_eq!(a.state(), UnicastState::Open);

    let start = Instant::now();
    let mut closed_at = None;
    while start.elapsed() < Duration::from_secs(3) {
        if a.state() == UnicastState::Closed {
            closed_at = Some(start.elapsed());
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    let elapsed = closed_at.expect("session A never closed on lease expiry");
    assert!(
        elapsed >= Duration::from_millis(400),
        "closed suspiciously early: {elapsed:?}"
    );
    assert!(
        elapsed <= Duration::from_millis(1500),
        "closed too late for a 500ms lease: {elapsed:?}"
    );
}
