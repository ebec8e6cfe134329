//! Query/reply correlation: tracks one outstanding `get()` across however
//! many queryables it fans out to, and applies the requested
//! consolidation mode to the replies as they arrive.

use std::collections::HashMap;

use zenoh_protocol::keyexpr::KeyExpr;
use zenoh_protocol::msg::zenoh::{ConsolidationMode, QueryTarget};

use crate::callback::Callback;
use crate::registry::QueryId;

#[derive(Debug, Clone)]
pub struct ReplySample {
    pub key: KeyExpr,
    pub payload: Vec<u8>,
    pub timestamp: Option<u64>,
    /// `true` if this reply carries a `ZenohBody::Err` rather than a
    /// `Put`/`Reply` payload (a queryable's `reply_err`, or the
    /// synthetic "session closing"/"query timed out" reply sent before
    /// the drop callback runs).
    pub is_err: bool,
}

impl ReplySample {
    pub fn ok(key: KeyExpr, payload: Vec<u8>, timestamp: Option<u64>) -> Self {
        ReplySample {
            key,
            payload,
            timestamp,
            is_err: false,
        }
    }

    pub fn err(payload: Vec<u8>) -> Self {
        ReplySample {
            key: KeyExpr::canonicalize("**").expect("'**' is always a valid keyexpr"),
            payload,
            timestamp: None,
            is_err: true,
        }
    }
}

/// One query awaiting replies from `expected` queryables (`expected` is
/// only meaningful for `QueryTarget::AllComplete`; `BestMatching` closes
/// on the first reply, `All` closes when every reached queryable has
/// sent its `ResponseFinal`).
pub struct PendingQuery {
    pub id: QueryId,
    pub key: KeyExpr,
    pub consolidation: ConsolidationMode,
    pub target: QueryTarget,
    pub callback: Callback<ReplySample>,
    expected: usize,
    finals_received: usize,
    replies_received: usize,
    /// Best reply seen so far per response key, used by `Latest`
    /// consolidation to hold back delivery until the query closes.
    latest_by_key: HashMap<String, ReplySample>,
    /// Highest timestamp already delivered per response key, used by
    /// `Monotonic` consolidation to drop non-increasing replies.
    monotonic_high_water: HashMap<String, u64>,
}

impl PendingQuery {
    pub fn new(
        id: QueryId,
        key: KeyExpr,
        consolidation: ConsolidationMode,
        target: QueryTarget,
        expected: usize,
        callback: Callback<ReplySample>,
    ) -> Self {
        Self {
            id,
            key,
            consolidation,
            target,
            callback,
            expected,
            finals_received: 0,
            replies_received: 0,
            latest_by_key: HashMap::new(),
            monotonic_high_water: HashMap::new(),
        }
    }

    /// Feed one reply from a queryable. Returns `true` if this reply
    /// causes the query to close (so the caller can drop the
    /// `PendingQuery` from its table).
    pub fn on_reply(&mut self, reply: ReplySample) -> bool {
        self.replies_received += 1;
        match self.consolidation {
            ConsolidationMode::None => {
                (self.callback)(reply);
            }
            ConsolidationMode::Monotonic => {
                let key = reply.key.as_str().to_string();
                let strictly_newer = match (reply.is_err, reply.timestamp) {
                    (true, _) => true,
                    (false, None) => !self.monotonic_high_water.contains_key(&key),
                    (false, Some(ts)) => match self.monotonic_high_water.get(&key) {
                        Some(&prev) => ts > prev,
                        None => true,
                    },
                };
                if strictly_newer {
                    if let Some(ts) = reply.timestamp {
                        self.monotonic_high_water.insert(key, ts);
                    }
                    (self.callback)(reply);
                }
            }
            ConsolidationMode::Latest => {
                let key = reply.key.as_str().to_string();
                let better = match self.latest_by_key.get(&key) {
                    Some(existing) => reply.timestamp >= existing.timestamp,
                    None => true,
                };
                if better {
                    self.latest_by_key.insert(key, reply);
                }
            }
        }

        if self.target == QueryTarget::BestMatching {
            self.flush_latest();
            return true;
        }
        false
    }

    /// Feed one `ResponseFinal` from a queryable. Returns `true` once
    /// every targeted queryable has finalized (or, for `BestMatching`,
    /// immediately — that target never waits for more than one reply).
    pub fn on_final(&mut self) -> bool {
        self.finals_received += 1;
        let done = match self.target {
            QueryTarget::BestMatching => true,
            QueryTarget::All | QueryTarget::AllComplete => self.finals_received >= self.expected,
        };
        if done {
            self.flush_latest();
        }
        done
    }

    fn flush_latest(&mut self) {
        if self.consolidation == ConsolidationMode::Latest {
            for (_, reply) in self.latest_by_key.drain() {
                (self.callback)(reply);
            }
        }
    }

    pub fn replies_received(&self) -> usize {
        self.replies_received
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::callback;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ke(s: &str) -> KeyExpr {
        KeyExpr::new(s).unwrap()
    }

    fn sample(key: &str, ts: Option<u64>) -> ReplySample {
        ReplySample::ok(ke(key), vec![], ts)
    }

    #[test]
    fn none_consolidation_delivers_every_reply_immediately() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let mut q = PendingQuery::new(
            1,
            ke("a/**"),
            ConsolidationMode::None,
            QueryTarget::All,
            2,
            callback(move |_r| {
                count2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(!q.on_reply(sample("a/1", None)));
        assert!(!q.on_reply(sample("a/2", None)));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!q.on_final());
        assert!(q.on_final());
    }

    #[test]
    fn best_matching_closes_on_first_reply() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let mut q = PendingQuery::new(
            1,
            ke("a/**"),
            ConsolidationMode::None,
            QueryTarget::BestMatching,
            5,
            callback(move |_r| {
                count2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(q.on_reply(sample("a/1", None)));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn latest_consolidation_holds_back_until_final_and_keeps_newest() {
        let delivered = Arc::new(std::sync::Mutex::new(Vec::new()));
        let delivered2 = delivered.clone();
        let mut q = PendingQuery::new(
            1,
            ke("a/**"),
            ConsolidationMode::Latest,
            QueryTarget::All,
            1,
            callback(move |r: ReplySample| {
                delivered2.lock().unwrap().push(r.timestamp);
            }),
        );
        assert!(!q.on_reply(sample("a/1", Some(1))));
        assert!(!q.on_reply(sample("a/1", Some(5))));
        assert!(delivered.lock().unwrap().is_empty());
        assert!(q.on_final());
        assert_eq!(*delivered.lock().unwrap(), vec![Some(5)]);
    }

    #[test]
    fn monotonic_consolidation_drops_non_increasing_timestamps() {
        let delivered = Arc::new(std::sync::Mutex::new(Vec::new()));
        let delivered2 = delivered.clone();
        let mut q = PendingQuery::new(
            1,
            ke("a/**"),
            ConsolidationMode::Monotonic,
            QueryTarget::All,
            1,
            callback(move |r: ReplySample| {
                delivered2.lock().unwrap().push(r.timestamp);
            }),
        );
        assert!(!q.on_reply(sample("a/1", Some(5))));
        assert!(!q.on_reply(sample("a/1", Some(3)))); // stale, dropped
        assert!(!q.on_reply(sample("a/1", Some(5)))); // not strictly greater, dropped
        assert!(!q.on_reply(sample("a/1", Some(9)))); // strictly greater, delivered
        assert_eq!(*delivered.lock().unwrap(), vec![Some(5), Some(9)]);
    }

    #[test]
    fn all_complete_waits_for_every_expected_final() {
        let mut q = PendingQuery::new(
            1,
            ke("a/**"),
            ConsolidationMode::None,
            QueryTarget::AllComplete,
            3,
            callback(|_r: ReplySample| {}),
        );
        assert!(!q.on_final());
        assert!(!q.on_final());
        assert!(q.on_final());
    }
}
