//! Scouting messages: connectionless UDP multicast/unicast discovery
//! exchanged before any session exists.

use crate::buffer::{RBuf, WBuf};
use crate::error::CodecError;
use crate::zid::Zid;

use super::WhatAmI;

const ID_SCOUT: u8 = 0x01;
const ID_HELLO: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scout {
    pub what: WhatAmI,
    pub zid: Option<Zid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub zid: Zid,
    pub whatami: WhatAmI,
    pub locators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoutingMessage {
    Scout(Scout),
    Hello(Hello),
}

impl ScoutingMessage {
    pub fn encode(&self, w: &mut WBuf) {
        match self {
            ScoutingMessage::Scout(s) => {
                w.write_u8(ID_SCOUT);
                w.write_u8(s.what.0);
                match &s.zid {
                    Some(zid) => {
                        w.write_u8(1);
                        w.write_slice(zid.as_bytes());
                    }
                    None => w.write_u8(0),
                }
            }
            ScoutingMessage::Hello(h) => {
                w.write_u8(ID_HELLO);
                w.write_slice(h.zid.as_bytes());
                w.write_u8(h.whatami.0);
                w.write_vle64(h.locators.len() as u64);
                for loc in &h.locators {
                    w.write_string(loc);
                }
            }
        }
    }

    pub fn decode(r: &mut RBuf) -> Result<Self, CodecError> {
        let id = r.read_u8()?;
        match id {
            ID_SCOUT => {
                let what = WhatAmI(r.read_u8()?);
                let has_zid = r.read_u8()?;
                let zid = match has_zid {
                    0 => None,
                    1 => Some(Zid::decode(r.read_slice()?)?),
                    _ => return Err(CodecError::Malformed("bad scout zid presence flag")),
                };
                Ok(ScoutingMessage::Scout(Scout { what, zid }))
            }
            ID_HELLO => {
                let zid = Zid::decode(r.read_slice()?)?;
                let whatami = WhatAmI(r.read_u8()?);
                let count = r.read_vle64()? as usize;
                let mut locators = Vec::with_capacity(count);
                for _ in 0..count {
                    locators.push(r.read_string()?.to_string());
                }
                Ok(ScoutingMessage::Hello(Hello {
                    zid,
                    whatami,
                    locators,
                }))
            }
            _ => Err(CodecError::Malformed("unknown scouting message id")),
        }
    }
}
