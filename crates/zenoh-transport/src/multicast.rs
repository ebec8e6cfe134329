//! The multicast/peer transport: one shared link, many remote peers
//! tracked by a table keyed on ZID rather than one session object per
//! peer. A peer's entry expires on its own lease without tearing down
//! anyone else's subscriptions — a bare `Arc<DashMap<Zid, PeerEntry>>`
//! driven by `Join` messages rather than per-peer connection state.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use zenoh_protocol::msg::transport::Join;
use zenoh_protocol::msg::WhatAmI;
use zenoh_protocol::sn::{Sn, SnResolution};
use zenoh_protocol::zid::Zid;

use crate::channel::RxChannel;

/// One entry per peer heard from on the multicast link.
pub struct PeerEntry {
    pub whatami: WhatAmI,
    pub sn_resolution: SnResolution,
    pub lease: Duration,
    pub last_seen: Instant,
    pub rx_channels: Vec<RxChannel>,
}

impl PeerEntry {
    fn from_join(join: &Join, defrag_bound: usize) -> Self {
        let rx_channels = join
            .next_sn_reliable
            .iter()
            .map(|sn| RxChannel::new(*sn, join.sn_resolution, true, defrag_bound))
            .chain(
                join.next_sn_best_effort
                    .iter()
                    .map(|sn| RxChannel::new(*sn, join.sn_resolution, false, defrag_bound)),
            )
            .collect();
        PeerEntry {
            whatami: join.whatami,
            sn_resolution: join.sn_resolution,
            lease: Duration::from_millis(join.lease_millis),
            last_seen: Instant::now(),
            rx_channels,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.last_seen.elapsed() > self.lease
    }
}

pub type PeerTable = Arc<DashMap<Zid, PeerEntry>>;

pub fn new_peer_table() -> PeerTable {
    Arc::new(DashMap::new())
}

/// Handle an inbound `Join`: insert a new peer entry, or refresh
/// `last_seen` on an existing one without discarding its accumulated
/// rx/defrag state (a peer re-announcing mid-session shouldn't lose
/// in-flight fragment runs).
pub fn handle_join(table: &PeerTable, zid: Zid, join: &Join, defrag_bound: usize) {
    if let Some(mut entry) = table.get_mut(&zid) {
        entry.last_seen = Instant::now();
        entry.lease = Duration::from_millis(join.lease_millis);
        return;
    }
    table.insert(zid, PeerEntry::from_join(join, defrag_bound));
}

/// Remove every peer whose lease has elapsed since its last `Join` or
/// frame. Returns the removed ZIDs so the caller can tear down
/// subscriptions/queryables attributed to them.
pub fn expire_peers(table: &PeerTable) -> Vec<Zid> {
    let expired: Vec<Zid> = table
        .iter()
        .filter(|e| e.value().is_expired())
        .map(|e| *e.key())
        .collect();
    for zid in &expired {
        table.remove(zid);
    }
    expired
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_join() -> Join {
        Join {
            version: 9,
            whatami: WhatAmI::PEER,
            zid: Zid::rand(),
            lease_millis: 0, // immediately expirable for the expiry test
            sn_resolution: SnResolution::DEFAULT,
            next_sn_reliable: vec![Sn(0); 7],
            next_sn_best_effort: vec![Sn(0); 7],
        }
    }

    #[test]
    fn join_inserts_new_peer() {
        let table = new_peer_table();
        let zid = Zid::rand();
        handle_join(&table, zid, &sample_join(), 1024);
        assert!(table.contains_key(&zid));
    }

    #[test]
    fn repeated_join_refreshes_without_duplicating() {
        let table = new_peer_table();
        let zid = Zid::rand();
        let mut join = sample_join();
        join.lease_millis = 60_000;
        handle_join(&table, zid, &join, 1024);
        handle_join(&table, zid, &join, 1024);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn expire_peers_removes_stale_entries_only() {
        let table = new_peer_table();
        let stale = Zid::rand();
        let fresh = Zid::rand();
        handle_join(&table, stale, &sample_join(), 1024);
        let mut fresh_join = sample_join();
        fresh_join.lease_millis = 60_000;
        handle_join(&table, fresh, &fresh_join, 1024);

        std::thread::sleep(Duration::from_millis(5));
        let expired = expire_peers(&table);
        assert_eq!(expired, vec![stale]);
        assert!(table.contains_key(&fresh));
        assert!(!table.contains_key(&stale));
    }
}
