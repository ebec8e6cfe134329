//! Session-local state: the resource/subscription/queryable/interest
//! tables a session maintains about itself and its peers.
//!
//! Every table follows the same shape: a bare `Arc<DashMap<K, V>>` type
//! alias plus a `new_x()` constructor, so
//! cloning the registry handle is cheap and every accessor is lock-free
//! at the map level (DashMap shards internally; we never hold one of its
//! guards across an `.await`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use zenoh_protocol::keyexpr::KeyExpr;

use crate::callback::Callback;
use crate::query::PendingQuery;

pub type ResourceId = u64;
pub type EntityId = u64;
pub type QueryId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Put,
    Delete,
}

#[derive(Debug, Clone)]
pub struct Sample {
    pub key: KeyExpr,
    pub payload: Vec<u8>,
    pub kind: SampleKind,
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct IncomingQuery {
    pub id: QueryId,
    pub key: KeyExpr,
    pub parameters: String,
    pub payload: Option<Vec<u8>>,
}

pub struct Subscriber {
    pub id: EntityId,
    pub key: KeyExpr,
    pub callback: Callback<Sample>,
}

pub struct Queryable {
    pub id: EntityId,
    pub key: KeyExpr,
    pub complete: bool,
    pub callback: Callback<IncomingQuery>,
}

pub struct LivelinessToken {
    pub id: EntityId,
    pub key: KeyExpr,
}

pub struct Interest {
    pub id: EntityId,
    pub key: KeyExpr,
    pub flags: u8,
    pub current: bool,
    pub future: bool,
}

pub struct MatchingListener {
    pub id: EntityId,
    pub key: KeyExpr,
    /// Last status delivered, so a remote declare/undeclare only fires
    /// the callback when the answer actually flips.
    pub last_status: std::sync::atomic::AtomicBool,
    /// Invoked with whether at least one matching subscriber/queryable
    /// currently exists for `key`.
    pub callback: Callback<bool>,
}

pub type LocalResourceTable = Arc<DashMap<ResourceId, KeyExpr>>;
pub type RemoteResourceTable = Arc<DashMap<ResourceId, KeyExpr>>;
pub type SubscriberTable = Arc<DashMap<EntityId, Subscriber>>;
pub type QueryableTable = Arc<DashMap<EntityId, Queryable>>;
pub type PendingQueryTable = Arc<DashMap<QueryId, PendingQuery>>;
pub type InterestTable = Arc<DashMap<EntityId, Interest>>;
pub type LivelinessTokenTable = Arc<DashMap<EntityId, LivelinessToken>>;
pub type MatchingListenerTable = Arc<DashMap<EntityId, MatchingListener>>;
/// Remote subscriber/queryable declarations (keyed by the *remote* peer's
/// own entity id, carried verbatim in `DeclareSubscriber`/`DeclareQueryable`)
/// — used only to answer matching-listener queries ("does the peer have
/// anything that would receive what I publish?"), never for routing,
/// since this endpoint forwards every push to the one peer it holds a
/// session with regardless.
pub type RemoteSubscriberTable = Arc<DashMap<EntityId, KeyExpr>>;
pub type RemoteQueryableTable = Arc<DashMap<EntityId, KeyExpr>>;

fn new_resource_table() -> LocalResourceTable {
    Arc::new(DashMap::new())
}

fn new_subscriber_table() -> SubscriberTable {
    Arc::new(DashMap::new())
}

fn new_queryable_table() -> QueryableTable {
    Arc::new(DashMap::new())
}

fn new_pending_query_table() -> PendingQueryTable {
    Arc::new(DashMap::new())
}

fn new_interest_table() -> InterestTable {
    Arc::new(DashMap::new())
}

fn new_liveliness_table() -> LivelinessTokenTable {
    Arc::new(DashMap::new())
}

fn new_matching_listener_table() -> MatchingListenerTable {
    Arc::new(DashMap::new())
}

fn new_remote_subscriber_table() -> RemoteSubscriberTable {
    Arc::new(DashMap::new())
}

fn new_remote_queryable_table() -> RemoteQueryableTable {
    Arc::new(DashMap::new())
}

/// All of a session's declared and remotely-declared state. `resource_id`
/// starts at 1 (0 is reserved meaning "no mapping, use the full key"), as
/// do the entity and query id counters, matching zenoh-pico's allocator.
pub struct SessionRegistry {
    pub local_resources: LocalResourceTable,
    pub remote_resources: RemoteResourceTable,
    pub subscribers: SubscriberTable,
    pub queryables: QueryableTable,
    pub pending_queries: PendingQueryTable,
    pub interests: InterestTable,
    pub liveliness_tokens: LivelinessTokenTable,
    pub matching_listeners: MatchingListenerTable,
    pub remote_subscribers: RemoteSubscriberTable,
    pub remote_queryables: RemoteQueryableTable,

    next_resource_id: AtomicU64,
    next_entity_id: AtomicU64,
    next_query_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            local_resources: new_resource_table(),
            remote_resources: new_resource_table(),
            subscribers: new_subscriber_table(),
            queryables: new_queryable_table(),
            pending_queries: new_pending_query_table(),
            interests: new_interest_table(),
            liveliness_tokens: new_liveliness_table(),
            matching_listeners: new_matching_listener_table(),
            remote_subscribers: new_remote_subscriber_table(),
            remote_queryables: new_remote_queryable_table(),
            next_resource_id: AtomicU64::new(1),
            next_entity_id: AtomicU64::new(1),
            next_query_id: AtomicU64::new(1),
        })
    }

    pub fn alloc_resource_id(&self) -> ResourceId {
        self.next_resource_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn alloc_entity_id(&self) -> EntityId {
        self.next_entity_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn alloc_query_id(&self) -> QueryId {
        self.next_query_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn declare_local_resource(&self, key: KeyExpr) -> ResourceId {
        let id = self.alloc_resource_id();
        self.local_resources.insert(id, key);
        id
    }

    pub fn declare_subscriber(&self, key: KeyExpr, callback: Callback<Sample>) -> EntityId {
        let id = self.alloc_entity_id();
        tracing::debug!(entity_id = id, key = %key, "subscriber declared");
        self.subscribers.insert(
            id,
            Subscriber {
                id,
                key,
                callback,
            },
        );
        id
    }

    /// Remove and return the subscriber, dropping its callback exactly
    /// once as the returned value falls out of scope (or is discarded by
    /// the caller).
    pub fn undeclare_subscriber(&self, id: EntityId) -> Option<Subscriber> {
        let removed = self.subscribers.remove(&id).map(|(_, v)| v);
        tracing::debug!(entity_id = id, found = removed.is_some(), "subscriber undeclared");
        removed
    }

    pub fn declare_queryable(
        &self,
        key: KeyExpr,
        complete: bool,
        callback: Callback<IncomingQuery>,
    ) -> EntityId {
        let id = self.alloc_entity_id();
        tracing::debug!(entity_id = id, key = %key, complete, "queryable declared");
        self.queryables.insert(
            id,
            Queryable {
                id,
                key,
                complete,
                callback,
            },
        );
        id
    }

    pub fn undeclare_queryable(&self, id: EntityId) -> Option<Queryable> {
        let removed = self.queryables.remove(&id).map(|(_, v)| v);
        tracing::debug!(entity_id = id, found = removed.is_some(), "queryable undeclared");
        removed
    }

    pub fn declare_liveliness_token(&self, key: KeyExpr) -> EntityId {
        let id = self.alloc_entity_id();
        self.liveliness_tokens.insert(id, LivelinessToken { id, key });
        id
    }

    pub fn undeclare_liveliness_token(&self, id: EntityId) -> Option<LivelinessToken> {
        self.liveliness_tokens.remove(&id).map(|(_, v)| v)
    }

    pub fn declare_interest(
        &self,
        key: KeyExpr,
        flags: u8,
        current: bool,
        future: bool,
    ) -> EntityId {
        let id = self.alloc_entity_id();
        self.interests.insert(
            id,
            Interest {
                id,
                key,
                flags,
                current,
                future,
            },
        );
        id
    }

    pub fn undeclare_interest(&self, id: EntityId) -> Option<Interest> {
        self.interests.remove(&id).map(|(_, v)| v)
    }

    /// Declare a matching listener on `key` and fire it once immediately
    /// with the current status (mirrors zenoh-pico's behavior of
    /// reporting the initial state rather than only future flips).
    pub fn declare_matching_listener(&self, key: KeyExpr, callback: Callback<bool>) -> EntityId {
        let id = self.alloc_entity_id();
        let initial = self.has_remote_match(&key);
        callback(initial);
        self.matching_listeners.insert(
            id,
            MatchingListener {
                id,
                key,
                last_status: std::sync::atomic::AtomicBool::new(initial),
                callback,
            },
        );
        id
    }

    pub fn undeclare_matching_listener(&self, id: EntityId) -> Option<MatchingListener> {
        self.matching_listeners.remove(&id).map(|(_, v)| v)
    }

    /// Whether at least one subscriber currently intersects `key`.
    pub fn has_matching_subscriber(&self, key: &KeyExpr) -> bool {
        self.subscribers.iter().any(|s| s.key.intersects(key))
    }

    /// Whether at least one queryable currently intersects `key`.
    pub fn has_matching_queryable(&self, key: &KeyExpr) -> bool {
        self.queryables.iter().any(|q| q.key.intersects(key))
    }

    /// Whether the remote peer has declared any subscriber or queryable
    /// intersecting `key` — the question a matching listener answers.
    pub fn has_remote_match(&self, key: &KeyExpr) -> bool {
        self.remote_subscribers.iter().any(|s| s.value().intersects(key))
            || self.remote_queryables.iter().any(|q| q.value().intersects(key))
    }

    /// Re-evaluate every matching listener whose key could plausibly be
    /// affected and invoke its callback only on an actual flip. Called
    /// after any remote subscriber/queryable declare or undeclare.
    pub fn refresh_matching_listeners(&self) {
        for entry in self.matching_listeners.iter() {
            let listener = entry.value();
            let now = self.has_remote_match(&listener.key);
            let was = listener.last_status.swap(now, Ordering::SeqCst);
            if now != was {
                tracing::debug!(entity_id = listener.id, key = %listener.key, now, "matching listener flipped");
                (listener.callback)(now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::callback;
    use std::sync::atomic::AtomicUsize;

    fn ke(s: &str) -> KeyExpr {
        KeyExpr::new(s).unwrap()
    }

    #[test]
    fn resource_ids_start_at_one_and_increase() {
        let reg = SessionRegistry::new();
        let a = reg.declare_local_resource(ke("a"));
        let b = reg.declare_local_resource(ke("b"));
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn entity_and_query_ids_are_independent_counters() {
        let reg = SessionRegistry::new();
        let sub_id = reg.declare_subscriber(ke("a"), callback(|_s: Sample| {}));
        let query_id = reg.alloc_query_id();
        assert_eq!(sub_id, 1);
        assert_eq!(query_id, 1);
    }

    #[test]
    fn undeclare_subscriber_removes_it_and_drops_callback_once() {
        let reg = SessionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        let id = reg.declare_subscriber(
            ke("a"),
            callback(move |_s: Sample| {
                hits2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(reg.subscribers.contains_key(&id));
        let removed = reg.undeclare_subscriber(id);
        assert!(removed.is_some());
        assert!(!reg.subscribers.contains_key(&id));
        assert!(reg.undeclare_subscriber(id).is_none());
    }

    #[test]
    fn has_matching_subscriber_uses_keyexpr_intersection() {
        let reg = SessionRegistry::new();
        reg.declare_subscriber(ke("a/**"), callback(|_s: Sample| {}));
        assert!(reg.has_matching_subscriber(&ke("a/b/c")));
        assert!(!reg.has_matching_subscriber(&ke("x/y")));
    }

    #[test]
    fn matching_listener_fires_initial_status_then_only_on_flip() {
        let reg = SessionRegistry::new();
        let statuses = Arc::new(std::sync::Mutex::new(Vec::new()));
        let statuses2 = statuses.clone();
        reg.declare_matching_listener(
            ke("a/**"),
            callback(move |has_match: bool| {
                statuses2.lock().unwrap().push(has_match);
            }),
        );
        // Declaring with no remote match yet reports false once.
        assert_eq!(*statuses.lock().unwrap(), vec![false]);

        reg.remote_subscribers.insert(1, ke("a/b"));
        reg.refresh_matching_listeners();
        assert_eq!(*statuses.lock().unwrap(), vec![false, true]);

        // A second refresh with no change in remote state doesn't refire.
        reg.refresh_matching_listeners();
        assert_eq!(*statuses.lock().unwrap(), vec![false, true]);

        reg.remote_subscribers.remove(&1);
        reg.refresh_matching_listeners();
        assert_eq!(*statuses.lock().unwrap(), vec![false, true, false]);
    }
}
