//! Routing: matching an incoming key expression against the declared
//! subscriber/queryable tables and invoking their callbacks.
//!
//! Every dispatch snapshots the matching entries (cloning the `Arc`
//! callback, not the DashMap guard) before invoking anything, so a
//! callback that turns around and declares or undeclares another
//! subscriber never deadlocks against the table it was found in.

use zenoh_protocol::keyexpr::KeyExpr;

use crate::registry::{IncomingQuery, Sample, SampleKind, SessionRegistry};

/// Invoke every subscriber whose declared key intersects `key`. Returns
/// the number of subscribers notified.
pub fn dispatch_sample(
    registry: &SessionRegistry,
    key: &KeyExpr,
    payload: Vec<u8>,
    kind: SampleKind,
    timestamp: Option<u64>,
) -> usize {
    let matching: Vec<_> = registry
        .subscribers
        .iter()
        .filter(|s| s.key.intersects(key))
        .map(|s| s.callback.clone())
        .collect();

    let count = matching.len();
    tracing::trace!(key = %key, subscribers = count, "sample dispatched");
    for callback in matching {
        callback(Sample {
            key: key.clone(),
            payload: payload.clone(),
            kind,
            timestamp,
        });
    }
    count
}

/// Invoke every queryable whose declared key intersects `key`, per
/// `target`'s fan-out rule. `BestMatching` dispatches to the first
/// matching queryable found; `All`/`AllComplete` dispatch to all of
/// them. Returns the number of queryables actually dispatched to, which
/// the caller uses as the consolidator's `expected` count.
pub fn dispatch_query(
    registry: &SessionRegistry,
    key: &KeyExpr,
    query: IncomingQuery,
    best_matching_only: bool,
) -> usize {
    let matching: Vec<_> = registry
        .queryables
        .iter()
        .filter(|q| q.key.intersects(key))
        .map(|q| q.callback.clone())
        .collect();

    if matching.is_empty() {
        tracing::debug!(key = %key, "query matched no queryables");
        return 0;
    }

    if best_matching_only {
        matching[0](query);
        return 1;
    }

    let count = matching.len();
    tracing::trace!(key = %key, queryables = count, "query dispatched");
    for callback in matching {
        callback(query.clone());
    }
    count
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

    #[test]
    fn dispatch_sample_notifies_only_intersecting_subscribers() {
        let reg = SessionRegistry::new();
        let hit_a = Arc::new(AtomicUsize::new(0));
        let hit_a2 = hit_a.clone();
        reg.declare_subscriber(
            ke("a/**"),
            callback(move |_s| {
                hit_a2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let hit_b = Arc::new(AtomicUsize::new(0));
        let hit_b2 = hit_b.clone();
        reg.declare_subscriber(
            ke("b/**"),
            callback(move |_s| {
                hit_b2.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let notified = dispatch_sample(&reg, &ke("a/1"), b"x".to_vec(), SampleKind::Put, None);
        assert_eq!(notified, 1);
        assert_eq!(hit_a.load(Ordering::SeqCst), 1);
        assert_eq!(hit_b.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dispatch_query_best_matching_picks_one() {
        let reg = SessionRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count2 = count.clone();
            reg.declare_queryable(
                ke("q/**"),
                true,
                callback(move |_q| {
                    count2.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        let q = IncomingQuery {
            id: 1,
            key: ke("q/1"),
            parameters: String::new(),
            payload: None,
        };
        let dispatched = dispatch_query(&reg, &ke("q/1"), q, true);
        assert_eq!(dispatched, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatch_query_all_reaches_every_matching_queryable() {
        let reg = SessionRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count2 = count.clone();
            reg.declare_queryable(
                ke("q/**"),
                true,
                callback(move |_q| {
                    count2.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        let q = IncomingQuery {
            id: 1,
            key: ke("q/1"),
            parameters: String::new(),
            payload: None,
        };
        let dispatched = dispatch_query(&reg, &ke("q/1"), q, false);
        assert_eq!(dispatched, 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
