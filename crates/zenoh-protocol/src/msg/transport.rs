//! Transport messages: session lifecycle (Init/Open/Close/KeepAlive),
//! framing (Frame/Fragment), and multicast peer announcement (Join).

use crate::buffer::{RBuf, WBuf};
use crate::error::CodecError;
use crate::sn::{Sn, SnResolution};
use crate::zid::Zid;

use super::{Priority, Reliability, WhatAmI};

const ID_INIT_SYN: u8 = 0x10;
const ID_INIT_ACK: u8 = 0x11;
const ID_OPEN_SYN: u8 = 0x12;
const ID_OPEN_ACK: u8 = 0x13;
const ID_CLOSE: u8 = 0x14;
const ID_KEEP_ALIVE: u8 = 0x15;
const ID_FRAME: u8 = 0x16;
const ID_FRAGMENT: u8 = 0x17;
const ID_JOIN: u8 = 0x18;

pub const PROTOCOL_VERSION: u8 = 0x09;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitSyn {
    pub version: u8,
    pub whatami: WhatAmI,
    pub zid: Zid,
    pub sn_resolution: SnResolution,
    pub mtu: u16,
    pub qos: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitAck {
    pub version: u8,
    pub whatami: WhatAmI,
    pub zid: Zid,
    pub sn_resolution: SnResolution,
    pub mtu: u16,
    pub qos: bool,
    pub cookie: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSyn {
    pub lease_millis: u64,
    pub initial_sn: Sn,
    pub cookie: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAck {
    pub lease_millis: u64,
    pub initial_sn: Sn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Generic,
    Unsupported,
    MaxSessions,
    MaxLinks,
    Expired,
    Invalid,
}

impl CloseReason {
    fn from_wire(v: u8) -> Self {
        match v {
            1 => CloseReason::Unsupported,
            2 => CloseReason::MaxSessions,
            3 => CloseReason::MaxLinks,
            4 => CloseReason::Expired,
            5 => CloseReason::Invalid,
            _ => CloseReason::Generic,
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            CloseReason::Generic => 0,
            CloseReason::Unsupported => 1,
            CloseReason::MaxSessions => 2,
            CloseReason::MaxLinks => 3,
            CloseReason::Expired => 4,
            CloseReason::Invalid => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Close {
    pub reason: CloseReason,
    /// Whether the whole session (vs. just this link) should close.
    pub session: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sn: Sn,
    pub reliability: Reliability,
    pub priority: Priority,
    /// Serialized network messages carried by this frame, already
    /// concatenated; the caller decodes them with `NetworkMessage`.
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub sn: Sn,
    pub reliability: Reliability,
    pub priority: Priority,
    pub more: bool,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub version: u8,
    pub whatami: WhatAmI,
    pub zid: Zid,
    pub lease_millis: u64,
    pub sn_resolution: SnResolution,
    /// Next expected SN per priority band, reliable and best-effort.
    pub next_sn_reliable: Vec<Sn>,
    pub next_sn_best_effort: Vec<Sn>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMessage {
    InitSyn(InitSyn),
    InitAck(InitAck),
    OpenSyn(OpenSyn),
    OpenAck(OpenAck),
    Close(Close),
    KeepAlive,
    Frame(Frame),
    Fragment(Fragment),
    Join(Join),
}

fn write_reliability_priority(w: &mut WBuf, reliability: Reliability, priority: Priority) {
    let rel_bit = matches!(reliability, Reliability::Reliable) as u8;
    w.write_u8((rel_bit << 4) | priority.to_wire());
}

fn read_reliability_priority(r: &mut RBuf) -> Result<(Reliability, Priority), CodecError> {
    let byte = r.read_u8()?;
    let reliability = if byte & 0x10 != 0 {
        Reliability::Reliable
    } else {
        Reliability::BestEffort
    };
    let priority = Priority::from_wire(byte & 0x0f)
        .ok_or(CodecError::Malformed("invalid priority in frame header"))?;
    Ok((reliability, priority))
}

impl TransportMessage {
    pub fn encode(&self, w: &mut WBuf) {
        match self {
            TransportMessage::InitSyn(m) => {
                w.write_u8(ID_INIT_SYN);
                w.write_u8(m.version);
                w.write_u8(m.whatami.0);
                w.write_slice(m.zid.as_bytes());
                w.write_vle64(m.sn_resolution.0);
                w.write_bytes(&m.mtu.to_le_bytes());
                w.write_u8(m.qos as u8);
            }
            TransportMessage::InitAck(m) => {
                w.write_u8(ID_INIT_ACK);
                w.write_u8(m.version);
                w.write_u8(m.whatami.0);
                w.write_slice(m.zid.as_bytes());
                w.write_vle64(m.sn_resolution.0);
                w.write_bytes(&m.mtu.to_le_bytes());
                w.write_u8(m.qos as u8);
                w.write_slice(&m.cookie);
            }
            TransportMessage::OpenSyn(m) => {
                w.write_u8(ID_OPEN_SYN);
                w.write_vle64(m.lease_millis);
                w.write_vle64(m.initial_sn.0);
                w.write_slice(&m.cookie);
            }
            TransportMessage::OpenAck(m) => {
                w.write_u8(ID_OPEN_ACK);
                w.write_vle64(m.lease_millis);
                w.write_vle64(m.initial_sn.0);
            }
            TransportMessage::Close(m) => {
                w.write_u8(ID_CLOSE);
                w.write_u8(m.reason.to_wire());
                w.write_u8(m.session as u8);
            }
            TransportMessage::KeepAlive => {
                w.write_u8(ID_KEEP_ALIVE);
            }
            TransportMessage::Frame(m) => {
                w.write_u8(ID_FRAME);
                write_reliability_priority(w, m.reliability, m.priority);
                w.write_vle64(m.sn.0);
                w.write_slice(&m.payload);
            }
            TransportMessage::Fragment(m) => {
                w.write_u8(ID_FRAGMENT);
                write_reliability_priority(w, m.reliability, m.priority);
                w.write_u8(m.more as u8);
                w.write_vle64(m.sn.0);
                w.write_slice(&m.payload);
            }
            TransportMessage::Join(m) => {
                w.write_u8(ID_JOIN);
                w.write_u8(m.version);
                w.write_u8(m.whatami.0);
                w.write_slice(m.zid.as_bytes());
                w.write_vle64(m.lease_millis);
                w.write_vle64(m.sn_resolution.0);
                w.write_vle64(m.next_sn_reliable.len() as u64);
                for sn in &m.next_sn_reliable {
                    w.write_vle64(sn.0);
                }
                w.write_vle64(m.next_sn_best_effort.len() as u64);
                for sn in &m.next_sn_best_effort {
                    w.write_vle64(sn.0);
                }
            }
        }
    }

    pub fn decode(r: &mut RBuf) -> Result<Self, CodecError> {
        let id = r.read_u8()?;
        match id {
            ID_INIT_SYN => {
                let version = r.read_u8()?;
                let whatami = WhatAmI(r.read_u8()?);
                let zid = Zid::decode(r.read_slice()?)?;
                let sn_resolution = SnResolution(r.read_vle64()?);
                let mtu = u16::from_le_bytes(r.read_array::<2>()?);
                let qos = r.read_u8()? != 0;
                Ok(TransportMessage::InitSyn(InitSyn {
                    version,
                    whatami,
                    zid,
                    sn_resolution,
                    mtu,
                    qos,
                }))
            }
            ID_INIT_ACK => {
                let version = r.read_u8()?;
                let whatami = WhatAmI(r.read_u8()?);
                let zid = Zid::decode(r.read_slice()?)?;
                let sn_resolution = SnResolution(r.read_vle64()?);
                let mtu = u16::from_le_bytes(r.read_array::<2>()?);
                let qos = r.read_u8()? != 0;
                let cookie = r.read_slice()?.to_vec();
                Ok(TransportMessage::InitAck(InitAck {
                    version,
                    whatami,
                    zid,
                    sn_resolution,
                    mtu,
                    qos,
                    cookie,
                }))
            }
            ID_OPEN_SYN => {
                let lease_millis = r.read_vle64()?;
                let initial_sn = Sn(r.read_vle64()?);
                let cookie = r.read_slice()?.to_vec();
                Ok(TransportMessage::OpenSyn(OpenSyn {
                    lease_millis,
                    initial_sn,
                    cookie,
                }))
            }
            ID_OPEN_ACK => {
                let lease_millis = r.read_vle64()?;
                let initial_sn = Sn(r.read_vle64()?);
                Ok(TransportMessage::OpenAck(OpenAck {
                    lease_millis,
                    initial_sn,
                }))
            }
            ID_CLOSE => {
                let reason = CloseReason::from_wire(r.read_u8()?);
                let session = r.read_u8()? != 0;
                Ok(TransportMessage::Close(Close { reason, session }))
            }
            ID_KEEP_ALIVE => Ok(TransportMessage::KeepAlive),
            ID_FRAME => {
                let (reliability, priority) = read_reliability_priority(r)?;
                let sn = Sn(r.read_vle64()?);
                let payload = r.read_slice()?.to_vec();
                Ok(TransportMessage::Frame(Frame {
                    sn,
                    reliability,
                    priority,
                    payload,
                }))
            }
            ID_FRAGMENT => {
                let (reliability, priority) = read_reliability_priority(r)?;
                let more = r.read_u8()? != 0;
                let sn = Sn(r.read_vle64()?);
                let payload = r.read_slice()?.to_vec();
                Ok(TransportMessage::Fragment(Fragment {
                    sn,
                    reliability,
                    priority,
                    more,
                    payload,
                }))
            }
            ID_JOIN => {
                let version = r.read_u8()?;
                let whatami = WhatAmI(r.read_u8()?);
                let zid = Zid::decode(r.read_slice()?)?;
                let lease_millis = r.read_vle64()?;
                let sn_resolution = SnResolution(r.read_vle64()?);
                let n_rel = r.read_vle64()? as usize;
                let mut next_sn_reliable = Vec::with_capacity(n_rel);
                for _ in 0..n_rel {
                    next_sn_reliable.push(Sn(r.read_vle64()?));
                }
                let n_be = r.read_vle64()? as usize;
                let mut next_sn_best_effort = Vec::with_capacity(n_be);
                for _ in 0..n_be {
                    next_sn_best_effort.push(Sn(r.read_vle64()?));
                }
                Ok(TransportMessage::Join(Join {
                    version,
                    whatami,
                    zid,
                    lease_millis,
                    sn_resolution,
                    next_sn_reliable,
                    next_sn_best_effort,
                }))
            }
            _ => Err(CodecError::Malformed("unknown transport message id")),
        }
    }
}
