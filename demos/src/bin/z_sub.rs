//! z_sub — listen for a TCP peer and print every sample matching a key
//! expression, one line per put/delete.

use anyhow::{Context, Result};
use zenoh::{Sample, SampleKind, Session, TransportConfig};

fn print_usage() {
    println!("Usage: z_sub <listen-addr> <key-expr>");
    println!();
    println!("Examples:");
    println!("  z_sub 127.0.0.1:7447 demo/**");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() != 2 {
        print_usage();
        anyhow::bail!("expected exactly 2 arguments");
    }
    let addr = &args[0];
    let key = args[1].clone();

    tracing::info!(addr, key, "waiting for a peer to connect");
    let (session, bound) = Session::listen_tcp(addr.as_str(), &TransportConfig::default())
        .await
        .with_context(|| format!("failed to listen on {addr}"))?;
    tracing::info!(%bound, remote = %session.remote_zid(), "peer connected");

    session
        .declare_subscriber(&key, move |s: Sample| {
            let kind = match s.kind {
                SampleKind::Put => "put",
                SampleKind::Delete => "delete",
            };
            println!("{kind} {} ({} bytes)", s.key, s.payload.len());
        })
        .await?;

    tokio::signal::ctrl_c().await?;
    session.close().await?;
    Ok(())
}
