//! z_get — dial a TCP peer and issue one query, printing every reply
//! until the query's deadline or final closure.

use std::time::Duration;

use anyhow::{Context, Result};
use zenoh::{ConsolidationMode, QueryTarget, Reply, Session, TransportConfig};

fn print_usage() {
    println!("Usage: z_get <connect-addr> <selector> [parameters]");
    println!();
    println!("Examples:");
    println!("  z_get 127.0.0.1:7447 demo/example/**");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        print_usage();
        anyhow::bail!("expected at least 1 argument");
    }
    let addr = &args[0];
    let selector = args.get(1).cloned().unwrap_or_else(|| "demo/example/**".to_string());
    let parameters = args.get(2).cloned().unwrap_or_default();

    tracing::info!(addr, selector, "connecting");
    let session = Session::connect_tcp(addr.as_str(), &TransportConfig::default())
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;
    tracing::info!(remote = %session.remote_zid(), "connected");

    println!("Sending Query '{selector}'");
    session
        .get(
            &selector,
            parameters,
            QueryTarget::All,
            ConsolidationMode::None,
            Duration::from_secs(10),
            move |reply: Reply| {
                if reply.is_err {
                    println!(">> Received (ERROR: '{}')", String::from_utf8_lossy(&reply.payload));
                } else {
                    println!(
                        ">> Received ('{}': '{}')",
                        reply.key,
                        String::from_utf8_lossy(&reply.payload)
                    );
                }
            },
        )
        .await?;

    tokio::time::sleep(Duration::from_secs(10)).await;
    session.close().await?;
    Ok(())
}
