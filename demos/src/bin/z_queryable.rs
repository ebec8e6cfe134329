//! z_queryable — dial a TCP peer, declare a queryable on a key
//! expression, and answer every `get` with a fixed payload until the
//! session closes.

use anyhow::{Context, Result};
use zenoh::{Query, Session, TransportConfig};

fn print_usage() {
    println!("Usage: z_queryable <connect-addr> <key-expr> [payload]");
    println!();
    println!("Examples:");
    println!("  z_queryable 127.0.0.1:7447 demo/example/zenoh-rs-queryable Queryable from zenoh-rs!");
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
        .unwrap_or_else(|| "Queryable from zenoh-rs!".to_string());

    tracing::info!(addr, key, "connecting");
    let session = Session::connect_tcp(addr.as_str(), &TransportConfig::default())
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;
    tracing::info!(remote = %session.remote_zid(), "connected");

    session
        .declare_queryable(&key, true, move |query: Query| {
            println!(
                ">> Received Query '{}{}'",
                query.key,
                if query.parameters.is_empty() {
                    String::new()
                } else {
                    format!("?{}", query.parameters)
                }
            );
            query.reply(&query.key.clone(), value.clone().into_bytes());
        })
        .await?;

    tracing::info!("queryable declared, waiting for queries (ctrl-c to exit)");
    tokio::signal::ctrl_c().await?;
    session.close().await?;
    Ok(())
}
