//! z_pub — dial a TCP peer and publish one payload per second on a key
//! expression, counting up so a subscriber can verify delivery order.

use std::time::Duration;

use anyhow::{Context, Result};
use zenoh::{Session, TransportConfig};

fn print_usage() {
    println!("Usage: z_pub <connect-addr> <key-expr> [payload]");
    println!();
    println!("Examples:");
    println!("  z_pub 127.0.0.1:7447 demo/example/zenoh-rs-put Pub from zenoh-rs!");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        print_usage();
        anyhow::bail!("expected at least 2 arguments");
    }
    let addr = &args[0];
    let key = args[1].clone();
    let value = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| "Pub from zenoh-rs!".to_string());

    tracing::info!(addr, key, "connecting");
    let session = Session::connect_tcp(addr.as_str(), &TransportConfig::default())
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;
    tracing::info!(remote = %session.remote_zid(), "connected");

    session.declare_keyexpr(&key).await?;

    let mut idx: u64 = 0;
    loop {
        let payload = format!("[{idx:4}] {value}");
        session.put(&key, payload.clone().into_bytes()).await?;
        println!("Put {key:?}: {payload:?}");
        idx += 1;
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
