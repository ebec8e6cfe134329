//! Declarations: the bodies carried by `network::Declare`, establishing
//! and tearing down the shared state (resource mappings, subscriptions,
//! queryables, liveliness tokens, interests) that a session maintains
//! with its peers.

use crate::buffer::{RBuf, WBuf};
use crate::error::CodecError;

const ID_DECLARE_KEYEXPR: u8 = 0x01;
const ID_UNDECLARE_KEYEXPR: u8 = 0x02;
const ID_DECLARE_SUBSCRIBER: u8 = 0x03;
const ID_UNDECLARE_SUBSCRIBER: u8 = 0x04;
const ID_DECLARE_QUERYABLE: u8 = 0x05;
const ID_UNDECLARE_QUERYABLE: u8 = 0x06;
const ID_DECLARE_TOKEN: u8 = 0x07;
const ID_UNDECLARE_TOKEN: u8 = 0x08;
const ID_DECLARE_INTEREST: u8 = 0x09;
const ID_FINAL_INTEREST: u8 = 0x0a;
const ID_UNDECLARE_INTEREST: u8 = 0x0b;

/// A key expression as carried on the wire: either the full string, or a
/// reference to a previously declared resource id plus an optional
/// suffix, per §4.3's numeric-id/suffix resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireKeyExpr {
    Full(String),
    Mapped { rid: u64, suffix: Option<String> },
}

impl WireKeyExpr {
    fn encode(&self, w: &mut WBuf) {
        match self {
            WireKeyExpr::Full(s) => {
                w.write_u8(0);
                w.write_string(s);
            }
            WireKeyExpr::Mapped { rid, suffix } => {
                w.write_u8(1);
                w.write_vle64(*rid);
                match suffix {
                    Some(s) => {
                        w.write_u8(1);
                        w.write_string(s);
                    }
                    None => w.write_u8(0),
                }
            }
        }
    }

    fn decode(r: &mut RBuf) -> Result<Self, CodecError> {
        match r.read_u8()? {
            0 => Ok(WireKeyExpr::Full(r.read_string()?.to_string())),
            1 => {
                let rid = r.read_vle64()?;
                let suffix = match r.read_u8()? {
                    0 => None,
                    1 => Some(r.read_string()?.to_string()),
                    _ => return Err(CodecError::Malformed("bad keyexpr suffix presence flag")),
                };
                Ok(WireKeyExpr::Mapped { rid, suffix })
            }
            _ => Err(CodecError::Malformed("unknown wire keyexpr form")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclareKeyExpr {
    pub id: u64,
    pub key: WireKeyExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndeclareKeyExpr {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclareSubscriber {
    pub id: u64,
    pub key: WireKeyExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndeclareSubscriber {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclareQueryable {
    pub id: u64,
    pub key: WireKeyExpr,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndeclareQueryable {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclareToken {
    pub id: u64,
    pub key: WireKeyExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndeclareToken {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclareInterest {
    pub id: u64,
    pub key: WireKeyExpr,
    /// Bitmask of which declaration kinds the requester wants notified
    /// about (keyexprs, subscribers, queryables, tokens).
    pub flags: u8,
    pub current: bool,
    pub future: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalInterest {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndeclareInterest {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    DeclareKeyExpr(DeclareKeyExpr),
    UndeclareKeyExpr(UndeclareKeyExpr),
    DeclareSubscriber(DeclareSubscriber),
    UndeclareSubscriber(UndeclareSubscriber),
    DeclareQueryable(DeclareQueryable),
    UndeclareQueryable(UndeclareQueryable),
    DeclareToken(DeclareToken),
    UndeclareToken(UndeclareToken),
    DeclareInterest(DeclareInterest),
    FinalInterest(FinalInterest),
    UndeclareInterest(UndeclareInterest),
}

impl Declaration {
    pub fn encode(&self, w: &mut WBuf) {
        match self {
            Declaration::DeclareKeyExpr(d) => {
                w.write_u8(ID_DECLARE_KEYEXPR);
                w.write_vle64(d.id);
                d.key.encode(w);
            }
            Declaration::UndeclareKeyExpr(d) => {
                w.write_u8(ID_UNDECLARE_KEYEXPR);
                w.write_vle64(d.id);
            }
            Declaration::DeclareSubscriber(d) => {
                w.write_u8(ID_DECLARE_SUBSCRIBER);
                w.write_vle64(d.id);
                d.key.encode(w);
            }
            Declaration::UndeclareSubscriber(d) => {
                w.write_u8(ID_UNDECLARE_SUBSCRIBER);
                w.write_vle64(d.id);
            }
            Declaration::DeclareQueryable(d) => {
                w.write_u8(ID_DECLARE_QUERYABLE);
                w.write_vle64(d.id);
                d.key.encode(w);
                w.write_u8(d.complete as u8);
            }
            Declaration::UndeclareQueryable(d) => {
                w.write_u8(ID_UNDECLARE_QUERYABLE);
                w.write_vle64(d.id);
            }
            Declaration::DeclareToken(d) => {
                w.write_u8(ID_DECLARE_TOKEN);
                w.write_vle64(d.id);
                d.key.encode(w);
            }
            Declaration::UndeclareToken(d) => {
                w.write_u8(ID_UNDECLARE_TOKEN);
                w.write_vle64(d.id);
            }
            Declaration::DeclareInterest(d) => {
                w.write_u8(ID_DECLARE_INTEREST);
                w.write_vle64(d.id);
                d.key.encode(w);
                w.write_u8(d.flags);
                w.write_u8(d.current as u8);
                w.write_u8(d.future as u8);
            }
            Declaration::FinalInterest(d) => {
                w.write_u8(ID_FINAL_INTEREST);
                w.write_vle64(d.id);
            }
            Declaration::UndeclareInterest(d) => {
                w.write_u8(ID_UNDECLARE_INTEREST);
                w.write_vle64(d.id);
            }
        }
    }

    pub fn decode(r: &mut RBuf) -> Result<Self, CodecError> {
        let id_byte = r.read_u8()?;
        match id_byte {
            ID_DECLARE_KEYEXPR => {
                let id = r.read_vle64()?;
                let key = WireKeyExpr::decode(r)?;
                Ok(Declaration::DeclareKeyExpr(DeclareKeyExpr { id, key }))
            }
            ID_UNDECLARE_KEYEXPR => Ok(Declaration::UndeclareKeyExpr(UndeclareKeyExpr {
                id: r.read_vle64()?,
            })),
            ID_DECLARE_SUBSCRIBER => {
                let id = r.read_vle64()?;
                let key = WireKeyExpr::decode(r)?;
                Ok(Declaration::DeclareSubscriber(DeclareSubscriber { id, key }))
            }
            ID_UNDECLARE_SUBSCRIBER => Ok(Declaration::UndeclareSubscriber(UndeclareSubscriber {
                id: r.read_vle64()?,
            })),
            ID_DECLARE_QUERYABLE => {
                let id = r.read_vle64()?;
                let key = WireKeyExpr::decode(r)?;
                let complete = r.read_u8()? != 0;
                Ok(Declaration::DeclareQueryable(DeclareQueryable {
                    id,
                    key,
                    complete,
                }))
            }
            ID_UNDECLARE_QUERYABLE => Ok(Declaration::UndeclareQueryable(UndeclareQueryable {
                id: r.read_vle64()?,
            })),
            ID_DECLARE_TOKEN => {
                let id = r.read_vle64()?;
                let key = WireKeyExpr::decode(r)?;
                Ok(Declaration::DeclareToken(DeclareToken { id, key }))
            }
            ID_UNDECLARE_TOKEN => Ok(Declaration::UndeclareToken(UndeclareToken {
                id: r.read_vle64()?,
            })),
            ID_DECLARE_INTEREST => {
                let id = r.read_vle64()?;
                let key = WireKeyExpr::decode(r)?;
                let flags = r.read_u8()?;
                let current = r.read_u8()? != 0;
                let future = r.read_u8()? != 0;
                Ok(Declaration::DeclareInterest(DeclareInterest {
                    id,
                    key,
                    flags,
                    current,
                    future,
                }))
            }
            ID_FINAL_INTEREST => Ok(Declaration::FinalInterest(FinalInterest {
                id: r.read_vle64()?,
            })),
            ID_UNDECLARE_INTEREST => Ok(Declaration::UndeclareInterest(UndeclareInterest {
                id: r.read_vle64()?,
            })),
            _ => Err(CodecError::Malformed("unknown declaration id")),
        }
    }
}
