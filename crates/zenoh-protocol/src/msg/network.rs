//! Network messages: what's actually carried inside a transport `Frame`.
//! Each one pairs a wire key expression with routing metadata (mapping,
//! qos) and, where relevant, a [`ZenohBody`].

use crate::buffer::{RBuf, WBuf};
use crate::error::CodecError;

use super::declare::{Declaration, WireKeyExpr};
use super::zenoh::ZenohBody;
use super::Priority;

const ID_PUSH: u8 = 0x01;
const ID_REQUEST: u8 = 0x02;
const ID_RESPONSE: u8 = 0x03;
const ID_RESPONSE_FINAL: u8 = 0x04;
const ID_DECLARE: u8 = 0x05;
const ID_INTEREST_FINAL: u8 = 0x06;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Push {
    pub key: WireKeyExpr,
    pub priority: Priority,
    pub body: ZenohBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: u64,
    pub key: WireKeyExpr,
    pub priority: Priority,
    pub body: ZenohBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub request_id: u64,
    pub key: WireKeyExpr,
    pub body: ZenohBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFinal {
    pub request_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declare {
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMessage {
    Push(Push),
    Request(Request),
    Response(Response),
    ResponseFinal(ResponseFinal),
    Declare(Declare),
}

fn write_priority(w: &mut WBuf, priority: Priority) {
    w.write_u8(priority.to_wire());
}

fn read_priority(r: &mut RBuf) -> Result<Priority, CodecError> {
    Priority::from_wire(r.read_u8()?).ok_or(CodecError::Malformed("invalid priority"))
}

impl NetworkMessage {
    pub fn encode(&self, w: &mut WBuf) {
        match self {
            NetworkMessage::Push(m) => {
                w.write_u8(ID_PUSH);
                m.key.encode(w);
                write_priority(w, m.priority);
                m.body.encode(w);
            }
            NetworkMessage::Request(m) => {
                w.write_u8(ID_REQUEST);
                w.write_vle64(m.id);
                m.key.encode(w);
                write_priority(w, m.priority);
                m.body.encode(w);
            }
            NetworkMessage::Response(m) => {
                w.write_u8(ID_RESPONSE);
                w.write_vle64(m.request_id);
                m.key.encode(w);
                m.body.encode(w);
            }
            NetworkMessage::ResponseFinal(m) => {
                w.write_u8(ID_RESPONSE_FINAL);
                w.write_vle64(m.request_id);
            }
            NetworkMessage::Declare(m) => {
                w.write_u8(ID_DECLARE);
                w.write_vle64(m.declarations.len() as u64);
                for d in &m.declarations {
                    d.encode(w);
                }
            }
        }
    }

    pub fn decode(r: &mut RBuf) -> Result<Self, CodecError> {
        let id = r.read_u8()?;
        match id {
            ID_PUSH => {
                let key = WireKeyExpr::decode(r)?;
                let priority = read_priority(r)?;
                let body = ZenohBody::decode(r)?;
                Ok(NetworkMessage::Push(Push {
                    key,
                    priority,
                    body,
                }))
            }
            ID_REQUEST => {
                let id = r.read_vle64()?;
                let key = WireKeyExpr::decode(r)?;
                let priority = read_priority(r)?;
                let body = ZenohBody::decode(r)?;
                Ok(NetworkMessage::Request(Request {
                    id,
                    key,
                    priority,
                    body,
                }))
            }
            ID_RESPONSE => {
                let request_id = r.read_vle64()?;
                let key = WireKeyExpr::decode(r)?;
                let body = ZenohBody::decode(r)?;
                Ok(NetworkMessage::Response(Response {
                    request_id,
                    key,
                    body,
                }))
            }
            ID_RESPONSE_FINAL => Ok(NetworkMessage::ResponseFinal(ResponseFinal {
                request_id: r.read_vle64()?,
            })),
            ID_DECLARE => {
                let count = r.read_vle64()? as usize;
                let mut declarations = Vec::with_capacity(count);
                for _ in 0..count {
                    declarations.push(Declaration::decode(r)?);
                }
                Ok(NetworkMessage::Declare(Declare { declarations }))
            }
            ID_INTEREST_FINAL => Err(CodecError::Malformed(
                "interest-final carried outside declare is not supported",
            )),
            _ => Err(CodecError::Malformed("unknown network message id")),
        }
    }
}
