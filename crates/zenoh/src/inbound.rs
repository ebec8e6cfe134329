//! The session's inbound half: one task per open session draining the
//! transport's `Delivery` channel, decoding each payload as a
//! [`NetworkMessage`], and routing it into the registry or the query
//! correlator. Everything that needs to talk back over the wire (query
//! responses, `ResponseFinal`) happens right here rather than from
//! inside a registered callback, so a queryable callback stays a plain
//! synchronous `Fn`, with one task per connection owning both the
//! decode and the reply path.

use std::sync::Arc;

use tokio::sync::mpsc;

use zenoh_protocol::buffer::{RBuf, WBuf};
use zenoh_protocol::keyexpr::KeyExpr;
use zenoh_protocol::msg::declare::{Declaration, WireKeyExpr};
use zenoh_protocol::msg::network::{Declare, NetworkMessage, Push, Request, Response, ResponseFinal};
use zenoh_protocol::msg::zenoh::{Err as WireErr, QueryTarget, Reply as WireReply, ZenohBody};
use zenoh_protocol::msg::{Priority, Reliability};
use zenoh_transport::unicast::Delivery;
use zenoh_transport::UnicastSession;

use zenoh_session::dispatch::{dispatch_query, dispatch_sample};
use zenoh_session::registry::{IncomingQuery, SampleKind as InnerSampleKind};
use zenoh_session::{resolve_incoming, wire_form_for, ReplySample};

use crate::sample::QueryResponse;
use crate::SessionInner;

/// Drains `deliveries` until the transport shuts down or the channel
/// closes. Runs for the lifetime of one open session.
pub(crate) async fn run(inner: Arc<SessionInner>, mut deliveries: mpsc::Receiver<Delivery>) {
    let mut shutdown = inner.transport.subscribe_shutdown();
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!("inbound dispatch loop stopping: session shutdown");
                return;
            }
            delivery = deliveries.recv() => {
                let Some(delivery) = delivery else {
                    tracing::debug!("inbound dispatch loop stopping: delivery channel closed");
                    return;
                };
                if let Err(e) = handle_delivery(&inner, delivery).await {
                    tracing::warn!(error = %e, "failed to handle inbound network message");
                }
            }
        }
    }
}

async fn handle_delivery(inner: &Arc<SessionInner>, delivery: Delivery) -> Result<(), crate::ZError> {
    let mut r = RBuf::new(&delivery.payload);
    let msg = NetworkMessage::decode(&mut r)?;
    match msg {
        NetworkMessage::Push(p) => {
            handle_push(inner, p);
            Ok(())
        }
        NetworkMessage::Request(req) => handle_request(inner, req).await,
        NetworkMessage::Response(resp) => {
            handle_response(inner, resp);
            Ok(())
        }
        NetworkMessage::ResponseFinal(fin) => {
            handle_response_final(inner, fin);
            Ok(())
        }
        NetworkMessage::Declare(decl) => {
            handle_declare(inner, decl);
            Ok(())
        }
    }
}

fn unresolvable_key() -> KeyExpr {
    KeyExpr::canonicalize("**").expect("'**' is always a valid keyexpr")
}

fn handle_push(inner: &SessionInner, p: Push) {
    let Some(key) = resolve_incoming(&p.key, &inner.registry.remote_resources) else {
        tracing::debug!("dropping push with an unresolvable key expression");
        return;
    };
    let (kind, payload, timestamp) = match p.body {
        ZenohBody::Put(put) => (InnerSampleKind::Put, put.payload, put.timestamp),
        ZenohBody::Del(del) => (InnerSampleKind::Delete, Vec::new(), del.timestamp),
        _ => {
            tracing::debug!("dropping push carrying a non-put/del body");
            return;
        }
    };
    dispatch_sample(&inner.registry, &key, payload, kind, timestamp);
}

async fn handle_request(inner: &Arc<SessionInner>, req: Request) -> Result<(), crate::ZError> {
    let key = resolve_incoming(&req.key, &inner.registry.remote_resources).unwrap_or_else(unresolvable_key);
    let (parameters, payload, target) = match req.body {
        ZenohBody::Query(q) => (q.parameters, q.payload, q.target),
        _ => {
            tracing::debug!("dropping request carrying a non-query body");
            return Ok(());
        }
    };
    let incoming = IncomingQuery {
        id: req.id,
        key: key.clone(),
        parameters,
        payload,
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<QueryResponse>();
    inner.response_router.insert(req.id, tx);
    let best_matching = matches!(target, QueryTarget::BestMatching);
    dispatch_query(&inner.registry, &key, incoming, best_matching);
    inner.response_router.remove(&req.id);

    while let Ok(resp) = rx.try_recv() {
        let msg = match resp {
            QueryResponse::Reply { key, payload, timestamp } => NetworkMessage::Response(Response {
                request_id: req.id,
                key: wire_form_for(&key, &inner.registry.local_resources),
                body: ZenohBody::Reply(WireReply {
                    payload,
                    encoding: zenoh_protocol::msg::zenoh::Encoding::EMPTY,
                    timestamp,
                }),
            }),
            QueryResponse::Err { payload } => NetworkMessage::Response(Response {
                request_id: req.id,
                key: WireKeyExpr::Full(key.as_str().to_string()),
                body: ZenohBody::Err(WireErr {
                    payload,
                    encoding: zenoh_protocol::msg::zenoh::Encoding::EMPTY,
                }),
            }),
        };
        send_network(&inner.transport, Priority::Data, Reliability::Reliable, &msg).await?;
    }

    let fin = NetworkMessage::ResponseFinal(ResponseFinal { request_id: req.id });
    send_network(&inner.transport, Priority::Data, Reliability::Reliable, &fin).await
}

fn handle_response(inner: &SessionInner, resp: Response) {
    let reply = match resp.body {
        ZenohBody::Reply(r) => {
            let key = resolve_incoming(&resp.key, &inner.registry.remote_resources).unwrap_or_else(unresolvable_key);
            ReplySample::ok(key, r.payload, r.timestamp)
        }
        ZenohBody::Err(e) => ReplySample::err(e.payload),
        _ => {
            tracing::debug!("dropping response carrying an unexpected body");
            return;
        }
    };
    if let Some((_, mut pq)) = inner.registry.pending_queries.remove(&resp.request_id) {
        let closed = pq.on_reply(reply);
        if !closed {
            inner.registry.pending_queries.insert(resp.request_id, pq);
        }
    }
}

fn handle_response_final(inner: &SessionInner, fin: ResponseFinal) {
    if let Some((_, mut pq)) = inner.registry.pending_queries.remove(&fin.request_id) {
        let closed = pq.on_final();
        if !closed {
            inner.registry.pending_queries.insert(fin.request_id, pq);
        }
    }
}

fn handle_declare(inner: &SessionInner, decl: Declare) {
    let mut touched_matching = false;
    for d in decl.declarations {
        match d {
            Declaration::DeclareKeyExpr(dk) => {
                if let Some(key) = resolve_incoming(&dk.key, &inner.registry.remote_resources) {
                    inner.registry.remote_resources.insert(dk.id, key);
                }
            }
            Declaration::UndeclareKeyExpr(u) => {
                inner.registry.remote_resources.remove(&u.id);
            }
            // This session is an endpoint, not a router: the peer's own
            // subscriber/queryable declarations don't change anything we
            // forward, since every push already goes to the one peer
            // we're connected to and filtering happens entirely on the
            // receiving side's own tables. We still record them to
            // answer matching-listener queries.
            Declaration::DeclareSubscriber(ds) => {
                if let Some(key) = resolve_incoming(&ds.key, &inner.registry.remote_resources) {
                    inner.registry.remote_subscribers.insert(ds.id, key);
                    touched_matching = true;
                }
            }
            Declaration::UndeclareSubscriber(u) => {
                inner.registry.remote_subscribers.remove(&u.id);
                touched_matching = true;
            }
            Declaration::DeclareQueryable(dq) => {
                if let Some(key) = resolve_incoming(&dq.key, &inner.registry.remote_resources) {
                    inner.registry.remote_queryables.insert(dq.id, key);
                    touched_matching = true;
                }
            }
            Declaration::UndeclareQueryable(u) => {
                inner.registry.remote_queryables.remove(&u.id);
                touched_matching = true;
            }
            other => {
                tracing::debug!(?other, "declaration noted, no routing action taken");
            }
        }
    }
    if touched_matching {
        inner.registry.refresh_matching_listeners();
    }
}

pub(crate) async fn send_network(
    transport: &UnicastSession,
    priority: Priority,
    reliability: Reliability,
    msg: &NetworkMessage,
) -> Result<(), crate::ZError> {
    let mut w = WBuf::new();
    msg.encode(&mut w);
    transport.send(priority, reliability, &w.into_vec()).await?;
    Ok(())
}
