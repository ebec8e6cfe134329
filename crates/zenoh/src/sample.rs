//! Public pub/sub/query types returned to callers of the [`crate::Session`]
//! API. These wrap `zenoh-session`'s internal types with the ergonomics
//! (a `reply`/`reply_err` method on `Query`, an owned `String` key) an
//! application expects rather than the wire-shaped internals.

use std::sync::Arc;

use zenoh_protocol::keyexpr::KeyExpr;
use zenoh_session::registry::{IncomingQuery, SampleKind as InnerSampleKind};
use zenoh_session::Sample as InnerSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Put,
    Delete,
}

impl From<InnerSampleKind> for SampleKind {
    fn from(k: InnerSampleKind) -> Self {
        match k {
            InnerSampleKind::Put => SampleKind::Put,
            InnerSampleKind::Delete => SampleKind::Delete,
        }
    }
}

/// A published value delivered to a subscriber callback.
#[derive(Debug, Clone)]
pub struct Sample {
    pub key: String,
    pub payload: Vec<u8>,
    pub kind: SampleKind,
    pub timestamp: Option<u64>,
}

impl From<InnerSample> for Sample {
    fn from(s: InnerSample) -> Self {
        Sample {
            key: s.key.as_str().to_string(),
            payload: s.payload,
            kind: s.kind.into(),
            timestamp: s.timestamp,
        }
    }
}

/// The outcome of replying to a query, handed back through the channel
/// the query's callback was given so the session can route the reply to
/// whoever asked.
#[derive(Debug, Clone)]
pub enum QueryResponse {
    Reply {
        key: KeyExpr,
        payload: Vec<u8>,
        timestamp: Option<u64>,
    },
    Err {
        payload: Vec<u8>,
    },
}

/// An incoming query delivered to a queryable callback. `reply`/`reply_err`
/// send a response back over `responder`; calling neither still finalizes
/// the query (from the asker's perspective, a queryable that never
/// replies is indistinguishable from one with no matching data).
#[derive(Clone)]
pub struct Query {
    pub key: String,
    pub parameters: String,
    pub payload: Option<Vec<u8>>,
    pub(crate) responder: Arc<dyn Fn(QueryResponse) + Send + Sync>,
}

impl Query {
    pub(crate) fn from_incoming(
        q: IncomingQuery,
        responder: Arc<dyn Fn(QueryResponse) + Send + Sync>,
    ) -> Self {
        Query {
            key: q.key.as_str().to_string(),
            parameters: q.parameters,
            payload: q.payload,
            responder,
        }
    }

    pub fn reply(&self, key: &str, payload: impl Into<Vec<u8>>) {
        if let Ok(key) = KeyExpr::new(key.to_string()) {
            (self.responder)(QueryResponse::Reply {
                key,
                payload: payload.into(),
                timestamp: None,
            });
        }
    }

    pub fn reply_err(&self, payload: impl Into<Vec<u8>>) {
        (self.responder)(QueryResponse::Err {
            payload: payload.into(),
        });
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("key", &self.key)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// A reply delivered to a `get()` caller's callback. `is_err` is set for
/// a queryable's `reply_err` and for the synthetic "session closing"
/// reply a pending query receives if the session is dropped before every
/// queryable has answered.
#[derive(Debug, Clone)]
pub struct Reply {
    pub key: String,
    pub payload: Vec<u8>,
    pub timestamp: Option<u64>,
    pub is_err: bool,
}
