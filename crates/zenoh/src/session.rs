//! The `Session` facade: the one type an application holds. It owns a
//! single point-to-point transport session plus the registries that turn
//! its deliveries into pub/sub/query callbacks — one handle, cheap to
//! clone, real work done by a background task it spawned at
//! construction.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;

use zenoh_protocol::config::{Mode, TransportConfig, ZenohConfig};
use zenoh_protocol::keyexpr::KeyExpr;
use zenoh_protocol::msg::declare::{
    DeclareInterest, DeclareKeyExpr, DeclareQueryable, DeclareSubscriber, DeclareToken, Declaration,
    UndeclareInterest, UndeclareQueryable, UndeclareSubscriber, UndeclareToken,
};
use zenoh_protocol::msg::network::{Declare, NetworkMessage, Push};
use zenoh_protocol::msg::transport::CloseReason;
use zenoh_protocol::msg::zenoh::{ConsolidationMode, Del, Encoding, Put, Query as WireQuery, QueryTarget, ZenohBody};
use zenoh_protocol::msg::{Priority, Reliability, WhatAmI};
use zenoh_protocol::sn::SnResolution;
use zenoh_protocol::zid::Zid;
use zenoh_transport::link::tcp::TcpLink;
use zenoh_transport::scheduler::spawn_session_tasks;
use zenoh_transport::unicast::{Delivery, OpenParams};
use zenoh_transport::{Link, UnicastSession, UnicastState};

use zenoh_session::registry::{EntityId, QueryId, ResourceId};
use zenoh_session::{callback, wire_form_for, PendingQuery, ReplySample, SessionRegistry};

use crate::error::{Result, ZError};
use crate::inbound::send_network;
use crate::sample::{Query, QueryResponse, Reply, Sample};

pub(crate) struct SessionInner {
    pub(crate) local_zid: Zid,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) transport: Arc<UnicastSession>,
    pub(crate) response_router: Arc<DashMap<QueryId, mpsc::UnboundedSender<QueryResponse>>>,
}

/// A single point-to-point Zenoh session. Cheap to clone — every clone
/// shares the same underlying transport and registries.
#[derive(Clone)]
pub struct Session(Arc<SessionInner>);

impl Session {
    /// Open a session per `config`: dial `config.connect`'s first locator
    /// if one is set, otherwise accept one inbound session on
    /// `config.listen`'s first locator. Only the `tcp` protocol is
    /// supported; other locators fail fast with `UnsupportedProtocol`.
    pub async fn open(config: &ZenohConfig) -> Result<Session> {
        let dial = config.connect.first();
        let accept = config.listen.first();
        match (config.mode, dial, accept) {
            (_, Some(locator), _) => {
                if locator.protocol != "tcp" {
                    return Err(ZError::UnsupportedProtocol(locator.protocol.clone()));
                }
                Session::connect_tcp(locator.address.as_str(), &config.transport).await
            }
            (Mode::Peer, None, Some(locator)) => {
                if locator.protocol != "tcp" {
                    return Err(ZError::UnsupportedProtocol(locator.protocol.clone()));
                }
                let (session, _addr) = Session::listen_tcp(locator.address.as_str(), &config.transport).await?;
                Ok(session)
            }
            _ => Err(ZError::NoLocator),
        }
    }

    /// Dial a TCP peer directly, bypassing `ZenohConfig` — handy for
    /// tests and demo binaries that already know the address.
    pub async fn connect_tcp(addr: impl ToSocketAddrs, cfg: &TransportConfig) -> Result<Session> {
        let stream = TcpStream::connect(addr).await?;
        Session::from_tcp_stream(stream, cfg, WhatAmI::CLIENT, true).await
    }

    /// Bind, accept exactly one inbound TCP session, and return it along
    /// with the address actually bound (useful when `addr` used port 0).
    pub async fn listen_tcp(
        addr: impl ToSocketAddrs,
        cfg: &TransportConfig,
    ) -> Result<(Session, std::net::SocketAddr)> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (stream, _peer) = listener.accept().await?;
        let session = Session::from_tcp_stream(stream, cfg, WhatAmI::PEER, false).await?;
        Ok((session, local_addr))
    }

    /// Run the handshake over an already-accepted or already-connected
    /// TCP stream. `listen_tcp` covers the common one-shot accept case;
    /// this is for callers running their own accept loop (a server
    /// taking more than one session on the same listener).
    pub async fn from_tcp_stream(
        stream: TcpStream,
        cfg: &TransportConfig,
        whatami: WhatAmI,
        initiator: bool,
    ) -> Result<Session> {
        let _ = stream.set_nodelay(true);
        let link: Arc<dyn Link> = TcpLink::new(stream, cfg.batch_size).into_arc();
        let (tx, rx) = mpsc::channel::<Delivery>(1024);

        let bits = cfg.sn_resolution_bits.min(63);
        let params = OpenParams {
            local_zid: Zid::rand(),
            whatami,
            sn_resolution: SnResolution(1u64 << bits),
            lease: Duration::from_millis(cfg.lease_millis),
        };

        let transport = if initiator {
            UnicastSession::open(link, params, tx).await?
        } else {
            UnicastSession::accept(link, params, tx).await?
        };
        spawn_session_tasks(transport.clone(), cfg.keep_alive_ratio);

        let inner = Arc::new(SessionInner {
            local_zid: transport.local_zid,
            registry: SessionRegistry::new(),
            transport,
            response_router: Arc::new(DashMap::new()),
        });
        tokio::spawn(crate::inbound::run(inner.clone(), rx));
        Ok(Session(inner))
    }

    pub fn local_zid(&self) -> Zid {
        self.0.local_zid
    }

    pub fn remote_zid(&self) -> Zid {
        self.0.transport.remote_zid
    }

    pub fn state(&self) -> UnicastState {
        self.0.transport.state()
    }

    /// Declare a numeric alias for `key` so future publications under it
    /// can use the smaller `id`-only wire form.
    pub async fn declare_keyexpr(&self, key: &str) -> Result<ResourceId> {
        let key = KeyExpr::canonicalize(key)?;
        let id = self.0.registry.declare_local_resource(key.clone());
        self.send_declare(vec![Declaration::DeclareKeyExpr(DeclareKeyExpr {
            id,
            key: zenoh_protocol::msg::declare::WireKeyExpr::Full(key.as_str().to_string()),
        })])
        .await?;
        Ok(id)
    }

    pub async fn put(&self, key: &str, payload: impl Into<Vec<u8>>) -> Result<()> {
        let key = KeyExpr::new(key.to_string())?;
        let wire_key = wire_form_for(&key, &self.0.registry.local_resources);
        let body = ZenohBody::Put(Put {
            payload: payload.into(),
            encoding: Encoding::EMPTY,
            timestamp: None,
        });
        let msg = NetworkMessage::Push(Push {
            key: wire_key,
            priority: Priority::Data,
            body,
        });
        send_network(&self.0.transport, Priority::Data, Reliability::Reliable, &msg).await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let key = KeyExpr::new(key.to_string())?;
        let wire_key = wire_form_for(&key, &self.0.registry.local_resources);
        let body = ZenohBody::Del(Del { timestamp: None });
        let msg = NetworkMessage::Push(Push {
            key: wire_key,
            priority: Priority::Data,
            body,
        });
        send_network(&self.0.transport, Priority::Data, Reliability::Reliable, &msg).await
    }

    /// Declare a subscriber on `key`; `callback` fires once per matching
    /// sample until [`Session::undeclare_subscriber`] is called.
    pub async fn declare_subscriber<F>(&self, key: &str, callback_fn: F) -> Result<EntityId>
    where
        F: Fn(Sample) + Send + Sync + 'static,
    {
        let key = KeyExpr::canonicalize(key)?;
        let inner_cb = callback(move |s: zenoh_session::Sample| callback_fn(Sample::from(s)));
        let id = self.0.registry.declare_subscriber(key.clone(), inner_cb);
        let wire_key = wire_form_for(&key, &self.0.registry.local_resources);
        self.send_declare(vec![Declaration::DeclareSubscriber(DeclareSubscriber {
            id,
            key: wire_key,
        })])
        .await?;
        Ok(id)
    }

    pub async fn undeclare_subscriber(&self, id: EntityId) -> Result<()> {
        self.0
            .registry
            .undeclare_subscriber(id)
            .ok_or(ZError::UnknownEntity(id))?;
        self.send_declare(vec![Declaration::UndeclareSubscriber(UndeclareSubscriber { id })])
            .await
    }

    /// Declare a queryable on `key`. `callback` receives each matching
    /// [`Query`]; reply via `Query::reply`/`Query::reply_err`, any number
    /// of times, before it drops.
    pub async fn declare_queryable<F>(&self, key: &str, complete: bool, callback_fn: F) -> Result<EntityId>
    where
        F: Fn(Query) + Send + Sync + 'static,
    {
        let key = KeyExpr::canonicalize(key)?;
        let router = self.0.response_router.clone();
        let inner_cb = callback(move |iq: zenoh_session::registry::IncomingQuery| {
            let Some(tx) = router.get(&iq.id).map(|e| e.value().clone()) else {
                return;
            };
            let responder: std::sync::Arc<dyn Fn(QueryResponse) + Send + Sync> =
                std::sync::Arc::new(move |resp| {
                    let _ = tx.send(resp);
                });
            callback_fn(Query::from_incoming(iq, responder));
        });
        let id = self.0.registry.declare_queryable(key.clone(), complete, inner_cb);
        let wire_key = wire_form_for(&key, &self.0.registry.local_resources);
        self.send_declare(vec![Declaration::DeclareQueryable(DeclareQueryable {
            id,
            key: wire_key,
            complete,
        })])
        .await?;
        Ok(id)
    }

    pub async fn undeclare_queryable(&self, id: EntityId) -> Result<()> {
        self.0
            .registry
            .undeclare_queryable(id)
            .ok_or(ZError::UnknownEntity(id))?;
        self.send_declare(vec![Declaration::UndeclareQueryable(UndeclareQueryable { id })])
            .await
    }

    /// Declare a liveliness token on `key`: a marker with no payload
    /// whose sole purpose is to exist while the declaring session is
    /// alive. Peers interested in liveliness declare a matching
    /// interest and watch for the corresponding token/undeclare-token
    /// pair; this session never interprets its own tokens, it only
    /// announces them.
    pub async fn declare_liveliness_token(&self, key: &str) -> Result<EntityId> {
        let key = KeyExpr::canonicalize(key)?;
        let id = self.0.registry.declare_liveliness_token(key.clone());
        let wire_key = wire_form_for(&key, &self.0.registry.local_resources);
        self.send_declare(vec![Declaration::DeclareToken(DeclareToken { id, key: wire_key })])
            .await?;
        Ok(id)
    }

    pub async fn undeclare_liveliness_token(&self, id: EntityId) -> Result<()> {
        self.0
            .registry
            .undeclare_liveliness_token(id)
            .ok_or(ZError::UnknownEntity(id))?;
        self.send_declare(vec![Declaration::UndeclareToken(UndeclareToken { id })])
            .await
    }

    /// Declare an interest in the peer's declarations matching `key`:
    /// `current` asks for a snapshot of what already exists, `future`
    /// asks to keep hearing about new declares/undeclares as they
    /// happen. `flags` selects which declaration kinds to report (key
    /// expressions / subscribers / queryables / tokens) via a bitmask.
    pub async fn declare_interest(&self, key: &str, flags: u8, current: bool, future: bool) -> Result<EntityId> {
        let key = KeyExpr::canonicalize(key)?;
        let id = self.0.registry.declare_interest(key.clone(), flags, current, future);
        let wire_key = wire_form_for(&key, &self.0.registry.local_resources);
        self.send_declare(vec![Declaration::DeclareInterest(DeclareInterest {
            id,
            key: wire_key,
            flags,
            current,
            future,
        })])
        .await?;
        Ok(id)
    }

    pub async fn undeclare_interest(&self, id: EntityId) -> Result<()> {
        self.0.registry.undeclare_interest(id).ok_or(ZError::UnknownEntity(id))?;
        self.send_declare(vec![Declaration::UndeclareInterest(UndeclareInterest { id })])
            .await
    }

    /// Declare a matching listener on `key`: `callback` fires
    /// immediately with the current answer to "does the peer have any
    /// subscriber or queryable that would receive what I publish under
    /// `key`?", then again every time that answer flips as the peer's
    /// own declarations come and go.
    pub fn declare_matching_listener<F>(&self, key: &str, callback_fn: F) -> Result<EntityId>
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let key = KeyExpr::canonicalize(key)?;
        let inner_cb = callback(callback_fn);
        Ok(self.0.registry.declare_matching_listener(key, inner_cb))
    }

    pub fn undeclare_matching_listener(&self, id: EntityId) -> Result<()> {
        self.0
            .registry
            .undeclare_matching_listener(id)
            .ok_or(ZError::UnknownEntity(id))?;
        Ok(())
    }

    /// Query `selector`, invoking `on_reply` for each reply the
    /// consolidation mode lets through and dropping it (after a final
    /// "session closing" error-reply) once the query closes, whichever
    /// of `timeout` or the peer's `ResponseFinal` happens first.
    ///
    /// This session connects to exactly one peer, so `target` only
    /// matters on *that* peer's side (how many of *its* local queryables
    /// it fans out to) — from the asker's perspective there is always
    /// exactly one `ResponseFinal` to wait for.
    pub async fn get<F>(
        &self,
        selector: &str,
        parameters: impl Into<String>,
        target: QueryTarget,
        consolidation: ConsolidationMode,
        timeout: Duration,
        on_reply: F,
    ) -> Result<()>
    where
        F: Fn(Reply) + Send + Sync + 'static,
    {
        let key = KeyExpr::canonicalize(selector)?;
        let query_id = self.0.registry.alloc_query_id();
        let inner_cb = callback(move |r: ReplySample| {
            on_reply(Reply {
                key: r.key.as_str().to_string(),
                payload: r.payload,
                timestamp: r.timestamp,
                is_err: r.is_err,
            });
        });
        self.0.registry.pending_queries.insert(
            query_id,
            PendingQuery::new(query_id, key.clone(), consolidation, target, 1, inner_cb),
        );
        spawn_query_deadline(self.0.registry.clone(), query_id, timeout);

        let wire_key = wire_form_for(&key, &self.0.registry.local_resources);
        let body = ZenohBody::Query(WireQuery {
            parameters: parameters.into(),
            consolidation,
            target,
            payload: None,
        });
        let msg = NetworkMessage::Request(zenoh_protocol::msg::network::Request {
            id: query_id,
            key: wire_key,
            priority: Priority::InteractiveHigh,
            body,
        });
        send_network(&self.0.transport, Priority::InteractiveHigh, Reliability::Reliable, &msg).await
    }

    /// Close the session: every still-pending query gets a "session
    /// closing" error-reply (its drop callback then fires exactly once,
    /// same as a normal completion), then the transport sends `Close`.
    pub async fn close(&self) -> Result<()> {
        let ids: Vec<QueryId> = self.0.registry.pending_queries.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, mut pq)) = self.0.registry.pending_queries.remove(&id) {
                pq.on_reply(ReplySample::err(b"session closing".to_vec()));
            }
        }
        self.0.transport.send_close(CloseReason::Generic).await?;
        Ok(())
    }

    async fn send_declare(&self, declarations: Vec<Declaration>) -> Result<()> {
        let msg = NetworkMessage::Declare(Declare { declarations });
        send_network(&self.0.transport, Priority::Data, Reliability::Reliable, &msg).await
    }
}

/// If nobody calls `on_final`/`on_reply` enough to close the query within
/// `timeout`, force it closed with a synthetic timeout error-reply. Races
/// harmlessly against the normal completion path: whichever side calls
/// `remove` first wins, the other finds nothing and does nothing, so the
/// drop callback still only fires once.
fn spawn_query_deadline(registry: Arc<SessionRegistry>, query_id: QueryId, timeout: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        if let Some((_, mut pq)) = registry.pending_queries.remove(&query_id) {
            pq.on_reply(ReplySample::err(b"query timed out".to_vec()));
        }
    });
}
