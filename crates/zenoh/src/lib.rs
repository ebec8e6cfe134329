//! Zenoh: a lightweight pub/sub/query client for one point-to-point
//! session. `Session` is the one type applications hold; everything else
//! in this crate exists to support it — codec and key expressions come
//! from `zenoh-protocol`, framing and the link state machine from
//! `zenoh-transport`, registries and dispatch from `zenoh-session`.

pub mod error;
pub mod inbound;
pub mod sample;
pub mod session;

pub use error::{Result, ZError};
pub use sample::{Query, QueryResponse, Reply, Sample, SampleKind};
pub use session::Session;

pub use zenoh_protocol::config::{
    AuthConfig, Locator, Mode, ScoutingConfig, TransportConfig, ZenohConfig,
};
pub use zenoh_protocol::keyexpr::{KeyExpr, KeyExprError};
pub use zenoh_protocol::msg::zenoh::{ConsolidationMode, QueryTarget};
pub use zenoh_protocol::zid::Zid;
pub use zenoh_session::registry::{EntityId, QueryId, ResourceId};
pub use zenoh_transport::UnicastState;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Mutex;

    async fn open_pair() -> (Session, Session) {
        let cfg = TransportConfig {
            lease_millis: 2_000,
            ..TransportConfig::default()
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_cfg = cfg.clone();
        let server_task = tokio::spawn(async move {
            let (stream, _peer) = listener.accept().await.unwrap();
            Session::from_tcp_stream(stream, &server_cfg, zenoh_protocol::msg::WhatAmI::PEER, false)
                .await
                .unwrap()
        });
        let client = Session::connect_tcp(addr, &cfg).await.unwrap();
        let server = server_task.await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn put_delivers_to_subscriber() {
        let (client, server) = open_pair().await;
        let received: std::sync::Arc<Mutex<Vec<Vec<u8>>>> = std::sync::Arc::new(Mutex::new(Vec::new()));
        let received2 = received.clone();
        server
            .declare_subscriber("demo/example", move |s: Sample| {
                let received = received2.clone();
                let payload = s.payload.clone();
                tokio::spawn(async move {
                    received.lock().await.push(payload);
                });
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.put("demo/example", b"hello".to_vec()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(received.lock().await.as_slice(), &[b"hello".to_vec()]);
    }

    #[tokio::test]
    async fn get_receives_reply_from_queryable() {
        let (client, server) = open_pair().await;
        server
            .declare_queryable("demo/example", true, |q: Query| {
                q.reply("demo/example", b"42".to_vec());
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let replies: std::sync::Arc<Mutex<Vec<Vec<u8>>>> = std::sync::Arc::new(Mutex::new(Vec::new()));
        let replies2 = replies.clone();
        client
            .get(
                "demo/example",
                "",
                QueryTarget::All,
                ConsolidationMode::None,
                Duration::from_secs(1),
                move |r: Reply| {
                    let replies = replies2.clone();
                    let payload = r.payload.clone();
                    tokio::spawn(async move {
                        replies.lock().await.push(payload);
                    });
                },
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(replies.lock().await.as_slice(), &[b"42".to_vec()]);
    }
}
