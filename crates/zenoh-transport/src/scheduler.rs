//! The per-session task set: read loop, lease-expiry watchdog, and
//! keep-alive sender. Each is an independent `tokio::spawn`ed loop
//! selecting on the session's shutdown broadcast.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::error::TransportError;
use crate::unicast::{UnicastSession, UnicastState};

/// Repeatedly reads from the session's link and feeds bytes to
/// `handle_incoming`, until the link errors, the peer closes, or
/// shutdown fires.
pub async fn read_task(session: Arc<UnicastSession>, mut shutdown: broadcast::Receiver<()>) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!("read task shutting down");
                return;
            }
            result = session.link_read() => {
                match result {
                    Ok(bytes) => {
                        match session.handle_incoming(&bytes).await {
                            Ok(true) => {}
                            Ok(false) => return,
                            Err(e) => {
                                tracing::warn!(error = %e, "read task closing session on error");
                                let _ = session.send_close(
                                    zenoh_protocol::msg::transport::CloseReason::Invalid,
                                ).await;
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "link read failed, closing session");
                        return;
                    }
                }
            }
        }
    }
}

/// Closes the session if no frame or keep-alive has arrived within the
/// negotiated lease, checked every `lease / 4`.
pub async fn lease_task(session: Arc<UnicastSession>, mut shutdown: broadcast::Receiver<()>) {
    let lease = session.lease();
    let check_every = (lease / 4).max(Duration::from_millis(100));
    let mut interval = tokio::time::interval(check_every);
    loop {
        tokio::select! {
            _ = shutdown.recv() => return,
            _ = interval.tick() => {
                if session.state() != UnicastState::Open {
                    return;
                }
                let elapsed = session.millis_since_last_rx().await;
                if elapsed as u128 > lease.as_millis() {
                    tracing::warn!(elapsed, lease_ms = %lease.as_millis(), "lease expired");
                    let _ = session.send_close(
                        zenoh_protocol::msg::transport::CloseReason::Expired,
                    ).await;
                    return;
                }
            }
        }
    }
}

/// Sends a `KeepAlive` every `lease / keep_alive_ratio` so the peer's
/// lease watchdog never fires while this end is merely idle.
pub async fn keep_alive_task(
    session: Arc<UnicastSession>,
    keep_alive_ratio: u32,
    mut shutdown: broadcast::Receiver<()>,
) {
    let lease = session.lease();
    let period = lease / keep_alive_ratio.max(1);
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = shutdown.recv() => return,
            _ = interval.tick() => {
                if session.state() != UnicastState::Open {
                    return;
                }
                if let Err(e) = session.send_keep_alive().await {
                    tracing::warn!(error = %e, "failed to send keep-alive");
                    return;
                }
            }
        }
    }
}

/// Spawn the full read/lease/keep-alive set for a freshly opened
/// session, sharing one shutdown broadcast so closing any one of them
/// (or the session itself) tears the rest down too.
pub fn spawn_session_tasks(session: Arc<UnicastSession>, keep_alive_ratio: u32) {
    let read_shutdown = session.subscribe_shutdown();
    let lease_shutdown = session.subscribe_shutdown();
    let ka_shutdown = session.subscribe_shutdown();

    tokio::spawn(read_task(session.clone(), read_shutdown));
    tokio::spawn(lease_task(session.clone(), lease_shutdown));
    tokio::spawn(keep_alive_task(session, keep_alive_ratio, ka_shutdown));
}

impl UnicastSession {
    /// Thin wrapper so `read_task` can `.await` a link read without
    /// reaching into private fields from another module.
    pub(crate) async fn link_read(&self) -> Result<Vec<u8>, TransportError> {
        self.link_ref().read().await
    }
}
