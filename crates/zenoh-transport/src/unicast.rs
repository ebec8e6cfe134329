//! The unicast session state machine: `Opening -> Open -> Closing -> Closed`.
//!
//! One `UnicastSession` wraps one [`Link`] plus the per-channel SN state
//! on top of it. The handshake (`InitSyn/InitAck/OpenSyn/OpenAck`) runs
//! once, synchronously, during construction; once `Open`, the session
//! exposes `send` and hands received frame payloads to a channel the
//! caller drains from its own read task. No lock is ever held across a
//! link write: the tx mutex protects channel bookkeeping only, not the
//! I/O itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::Instant;

use zenoh_protocol::codec;
use zenoh_protocol::msg::transport::{
    Close, CloseReason, Fragment, Frame, InitAck, InitSyn, OpenAck, OpenSyn, PROTOCOL_VERSION,
};
use zenoh_protocol::msg::{Priority, Reliability, TransportMessage, WhatAmI};
use zenoh_protocol::sn::{Sn, SnResolution};
use zenoh_protocol::zid::Zid;

use crate::channel::{RxChannel, RxOutcome, TxChannel};
use crate::defrag::FragmentOutcome;
use crate::error::TransportError;
use crate::link::Link;

/// Default max bytes a channel's fragment reassembly buffer will hold
/// before resetting, independent of link MTU.
const DEFAULT_DEFRAG_BOUND: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnicastState {
    Opening,
    Open,
    Closing,
    Closed,
}

impl UnicastState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => UnicastState::Opening,
            1 => UnicastState::Open,
            2 => UnicastState::Closing,
            _ => UnicastState::Closed,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            UnicastState::Opening => 0,
            UnicastState::Open => 1,
            UnicastState::Closing => 2,
            UnicastState::Closed => 3,
        }
    }

    fn name(self) -> &'static str {
        match self {
            UnicastState::Opening => "opening",
            UnicastState::Open => "open",
            UnicastState::Closing => "closing",
            UnicastState::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ChannelKey {
    reliability: Reliability,
    priority: Priority,
}

/// A payload delivered out of a completed frame or fragment run, tagged
/// with the channel it arrived on so the session layer can apply the
/// right routing/QoS treatment.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub priority: Priority,
    pub reliability: Reliability,
    pub payload: Vec<u8>,
}

pub struct UnicastSession {
    link: Arc<dyn Link>,
    state: AtomicU8,
    pub local_zid: Zid,
    pub remote_zid: Zid,
    sn_resolution: SnResolution,
    lease: Duration,
    tx_channels: Mutex<HashMap<ChannelKey, TxChannel>>,
    rx_channels: Mutex<HashMap<ChannelKey, RxChannel>>,
    last_rx: Mutex<Instant>,
    deliveries: mpsc::Sender<Delivery>,
    shutdown: broadcast::Sender<()>,
}

pub struct OpenParams {
    pub local_zid: Zid,
    pub whatami: WhatAmI,
    pub sn_resolution: SnResolution,
    pub lease: Duration,
}

impl UnicastSession {
    fn all_channel_keys() -> Vec<ChannelKey> {
        let priorities = [
            Priority::RealTime,
            Priority::InteractiveHigh,
            Priority::InteractiveLow,
            Priority::DataHigh,
            Priority::Data,
            Priority::DataLow,
            Priority::Background,
        ];
        let mut keys = Vec::with_capacity(priorities.len() * 2);
        for p in priorities {
            keys.push(ChannelKey {
                reliability: Reliability::Reliable,
                priority: p,
            });
            keys.push(ChannelKey {
                reliability: Reliability::BestEffort,
                priority: p,
            });
        }
        keys
    }

    /// Run the initiator side of the handshake over an already-connected
    /// link: `InitSyn -> InitAck -> OpenSyn -> OpenAck`.
    pub async fn open(
        link: Arc<dyn Link>,
        params: OpenParams,
        deliveries: mpsc::Sender<Delivery>,
    ) -> Result<Arc<Self>, TransportError> {
        let init_syn = TransportMessage::InitSyn(InitSyn {
            version: PROTOCOL_VERSION,
            whatami: params.whatami,
            zid: params.local_zid,
            sn_resolution: params.sn_resolution,
            mtu: link.mtu(),
            qos: true,
        });
        send_handshake_msg(&link, &init_syn).await?;

        let init_ack = match recv_handshake_msg(&link).await? {
            TransportMessage::InitAck(a) => a,
            _ => return Err(TransportError::HandshakeFailed("expected InitAck")),
        };
        if init_ack.version != PROTOCOL_VERSION {
            return Err(TransportError::HandshakeFailed("unsupported protocol version"));
        }

        let initial_sn = Sn(rand::random::<u64>() % init_ack.sn_resolution.0.max(1));
        let open_syn = TransportMessage::OpenSyn(OpenSyn {
            lease_millis: params.lease.as_millis() as u64,
            initial_sn,
            cookie: init_ack.cookie.clone(),
        });
        send_handshake_msg(&link, &open_syn).await?;

        let open_ack = match recv_handshake_msg(&link).await? {
            TransportMessage::OpenAck(a) => a,
            _ => return Err(TransportError::HandshakeFailed("expected OpenAck")),
        };

        Ok(Self::new_open(
            link,
            params.local_zid,
            init_ack.zid,
            init_ack.sn_resolution,
            Duration::from_millis(open_ack.lease_millis),
            open_ack.initial_sn,
            deliveries,
        ))
    }

    /// Run the responder side of the handshake on a freshly accepted
    /// link.
    pub async fn accept(
        link: Arc<dyn Link>,
        params: OpenParams,
        deliveries: mpsc::Sender<Delivery>,
    ) -> Result<Arc<Self>, TransportError> {
        let init_syn = match recv_handshake_msg(&link).await? {
            TransportMessage::InitSyn(m) => m,
            _ => return Err(TransportError::HandshakeFailed("expected InitSyn")),
        };
        if init_syn.version != PROTOCOL_VERSION {
            return Err(TransportError::HandshakeFailed("unsupported protocol version"));
        }

        let sn_resolution = SnResolution(init_syn.sn_resolution.0.min(params.sn_resolution.0));
        let cookie = zid_cookie(&init_syn.zid);
        let init_ack = TransportMessage::InitAck(InitAck {
            version: PROTOCOL_VERSION,
            whatami: params.whatami,
            zid: params.local_zid,
            sn_resolution,
            mtu: link.mtu(),
            qos: true,
            cookie: cookie.clone(),
        });
        send_handshake_msg(&link, &init_ack).await?;

        let open_syn = match recv_handshake_msg(&link).await? {
            TransportMessage::OpenSyn(m) => m,
            _ => return Err(TransportError::HandshakeFailed("expected OpenSyn")),
        };
        if open_syn.cookie != cookie {
            return Err(TransportError::HandshakeFailed("cookie mismatch"));
        }

        let initial_sn = Sn(rand::random::<u64>() % sn_resolution.0.max(1));
        let open_ack = TransportMessage::OpenAck(OpenAck {
            lease_millis: params.lease.as_millis() as u64,
            initial_sn,
        });
        send_handshake_msg(&link, &open_ack).await?;

        Ok(Self::new_open(
            link,
            params.local_zid,
            init_syn.zid,
            sn_resolution,
            params.lease,
            open_syn.initial_sn,
            deliveries,
        ))
    }

    fn new_open(
        link: Arc<dyn Link>,
        local_zid: Zid,
        remote_zid: Zid,
        sn_resolution: SnResolution,
        lease: Duration,
        remote_initial_sn: Sn,
        deliveries: mpsc::Sender<Delivery>,
    ) -> Arc<Self> {
        let mut tx_channels = HashMap::new();
        let mut rx_channels = HashMap::new();
        for key in Self::all_channel_keys() {
            tx_channels.insert(key, TxChannel::new(Sn::ZERO, sn_resolution));
            rx_channels.insert(
                key,
                RxChannel::new(
                    remote_initial_sn,
                    sn_resolution,
                    key.reliability == Reliability::Reliable,
                    DEFAULT_DEFRAG_BOUND,
                ),
            );
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        Arc::new(Self {
            link,
            state: AtomicU8::new(UnicastState::Open.to_u8()),
            local_zid,
            remote_zid,
            sn_resolution,
            lease,
            tx_channels: Mutex::new(tx_channels),
            rx_channels: Mutex::new(rx_channels),
            last_rx: Mutex::new(Instant::now()),
            deliveries,
            shutdown: shutdown_tx,
        })
    }

    pub fn state(&self) -> UnicastState {
        UnicastState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: UnicastState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Send a network-message payload on the given channel, fragmenting
    /// if it exceeds the link MTU.
    pub async fn send(
        &self,
        priority: Priority,
        reliability: Reliability,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        if self.state() != UnicastState::Open {
            return Err(TransportError::NotOpen(self.state().name()));
        }
        let key = ChannelKey {
            reliability,
            priority,
        };
        let mtu = self.link.mtu() as usize;
        let overhead = 16; // generous slack for headers/extensions
        let chunk_size = mtu.saturating_sub(overhead).max(1);

        if payload.len() <= chunk_size {
            let sn = {
                let mut tx = self.tx_channels.lock().await;
                tx.get_mut(&key).expect("all channel keys pre-populated").next_sn()
            };
            let msg = TransportMessage::Frame(Frame {
                sn,
                reliability,
                priority,
                payload: payload.to_vec(),
            });
            return self.write_msg(&msg).await;
        }

        for (i, chunk) in payload.chunks(chunk_size).enumerate() {
            let more = (i + 1) * chunk_size < payload.len();
            let sn = {
                let mut tx = self.tx_channels.lock().await;
                tx.get_mut(&key).expect("all channel keys pre-populated").next_sn()
            };
            let msg = TransportMessage::Fragment(Fragment {
                sn,
                reliability,
                priority,
                more,
                payload: chunk.to_vec(),
            });
            self.write_msg(&msg).await?;
        }
        Ok(())
    }

    async fn write_msg(&self, msg: &TransportMessage) -> Result<(), TransportError> {
        let bytes = if self.link.is_streamed() {
            codec::encode_streamed(msg)?
        } else {
            codec::encode_datagram(msg)
        };
        self.link.write(&bytes).await
    }

    pub async fn send_keep_alive(&self) -> Result<(), TransportError> {
        self.write_msg(&TransportMessage::KeepAlive).await
    }

    pub async fn send_close(&self, reason: CloseReason) -> Result<(), TransportError> {
        self.set_state(UnicastState::Closing);
        let result = self
            .write_msg(&TransportMessage::Close(Close {
                reason,
                session: true,
            }))
            .await;
        self.set_state(UnicastState::Closed);
        let _ = self.shutdown.send(());
        result
    }

    /// Process one inbound link read, dispatching completed payloads to
    /// the `deliveries` channel and returning whether the session should
    /// keep running.
    pub async fn handle_incoming(&self, bytes: &[u8]) -> Result<bool, TransportError> {
        let msg = if self.link.is_streamed() {
            codec::decode_streamed_body(bytes)?
        } else {
            codec::decode_datagram(bytes)?
        };
        *self.last_rx.lock().await = Instant::now();

        match msg {
            TransportMessage::KeepAlive => Ok(true),
            TransportMessage::Close(c) => {
                self.set_state(UnicastState::Closed);
                let _ = self.shutdown.send(());
                tracing::debug!(reason = ?c.reason, "peer closed session");
                Ok(false)
            }
            TransportMessage::Frame(f) => {
                self.deliver_frame(f).await?;
                Ok(true)
            }
            TransportMessage::Fragment(fr) => {
                self.deliver_fragment(fr).await?;
                Ok(true)
            }
            _ => Err(TransportError::HandshakeFailed(
                "unexpected message outside handshake",
            )),
        }
    }

    async fn deliver_frame(&self, f: Frame) -> Result<(), TransportError> {
        let key = ChannelKey {
            reliability: f.reliability,
            priority: f.priority,
        };
        let mut rx = self.rx_channels.lock().await;
        let chan = rx.get_mut(&key).expect("all channel keys pre-populated");
        let expected = chan.expected();
        match chan.classify(f.sn) {
            RxOutcome::Gap => {
                return Err(TransportError::ReliableSnGap {
                    expected: expected.0,
                    got: f.sn.0,
                })
            }
            RxOutcome::Duplicate => return Ok(()),
            RxOutcome::InOrder | RxOutcome::JumpForward => {}
        }
        drop(rx);
        let _ = self
            .deliveries
            .send(Delivery {
                priority: f.priority,
                reliability: f.reliability,
                payload: f.payload,
            })
            .await;
        Ok(())
    }

    async fn deliver_fragment(&self, fr: Fragment) -> Result<(), TransportError> {
        let key = ChannelKey {
            reliability: fr.reliability,
            priority: fr.priority,
        };
        let mut rx = self.rx_channels.lock().await;
        let chan = rx.get_mut(&key).expect("all channel keys pre-populated");
        let outcome = chan.defrag.push(fr.sn, fr.more, &fr.payload);
        let complete_payload = match outcome {
            FragmentOutcome::Pending => None,
            FragmentOutcome::Complete => Some(chan.defrag.take()),
            FragmentOutcome::Overflowed => {
                tracing::warn!(priority = ?key.priority, "fragment run overflowed defrag bound, reset");
                None
            }
        };
        drop(rx);
        if let Some(payload) = complete_payload {
            let _ = self
                .deliveries
                .send(Delivery {
                    priority: fr.priority,
                    reliability: fr.reliability,
                    payload,
                })
                .await;
        }
        Ok(())
    }

    pub async fn millis_since_last_rx(&self) -> u128 {
        self.last_rx.lock().await.elapsed().as_millis()
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    pub(crate) fn link_ref(&self) -> &Arc<dyn Link> {
        &self.link
    }
}

async fn send_handshake_msg(link: &Arc<dyn Link>, msg: &TransportMessage) -> Result<(), TransportError> {
    let bytes = if link.is_streamed() {
        codec::encode_streamed(msg)?
    } else {
        codec::encode_datagram(msg)
    };
    link.write(&bytes).await
}

async fn recv_handshake_msg(link: &Arc<dyn Link>) -> Result<TransportMessage, TransportError> {
    let bytes = link.read().await?;
    if link.is_streamed() {
        Ok(codec::decode_streamed_body(&bytes)?)
    } else {
        Ok(codec::decode_datagram(&bytes)?)
    }
}

/// A cheap, deterministic cookie so the responder can verify the
/// initiator echoed it back in `OpenSyn` without keeping server-side
/// handshake state between messages.
fn zid_cookie(zid: &Zid) -> Vec<u8> {
    zid.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_roundtrips_through_u8() {
        for s in [
            UnicastState::Opening,
            UnicastState::Open,
            UnicastState::Closing,
            UnicastState::Closed,
        ] {
            assert_eq!(UnicastState::from_u8(s.to_u8()), s);
        }
    }

    #[test]
    fn cookie_is_stable_for_same_zid() {
        let zid = Zid::new(&[1, 2, 3]);
        assert_eq!(zid_cookie(&zid), zid_cookie(&zid));
    }
}
