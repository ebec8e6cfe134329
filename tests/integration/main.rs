//! End-to-end scenarios, each exercising the public `zenoh` facade over
//! a real loopback TCP session pair rather than unit-testing individual
//! modules. One file per scenario, with a shared `main.rs` carrying the
//! common harness.

mod fragmentation;
mod keyexpr_table;
mod lease;
mod pubsub;
mod query;

use std::time::Duration;

use anyhow::Result;
use zenoh_protocol::config::TransportConfig;

/// Open a connected pair of sessions over loopback TCP: `client` dials
/// `server`, which accepted the one inbound connection. Both ends share
/// `cfg` (lease, keep-alive ratio, MTU).
pub async fn open_pair(cfg: &TransportConfig) -> Result<(zenoh::Session, zenoh::Session)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server_cfg = cfg.clone();
    let server_task = tokio::spawn(async move {
        let (stream, _peer) = listener.accept().await.unwrap();
        zenoh::Session::from_tcp_stream(stream, &server_cfg, zenoh_protocol::msg::WhatAmI::PEER, false)
            .await
            .unwrap()
    });
    let client = zenoh::Session::connect_tcp(addr, cfg).await?;
    let server = server_task.await?;
    Ok((client, server))
}

pub fn default_test_config() -> TransportConfig {
    TransportConfig {
        lease_millis: 5_000,
        ..TransportConfig::default()
    }
}

/// Poll `predicate` until it's true or `timeout` elapses, sleeping
/// `step` between checks. Avoids guessing one fixed sleep duration for
/// async delivery in every scenario.
pub async fn wait_until<F: Fn() -> bool>(predicate: F, timeout: Duration, step: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return predicate();
        }
        tokio::time::sleep(step).await;
    }
}
