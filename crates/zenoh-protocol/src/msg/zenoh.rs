//! Zenoh bodies: the pub/sub/query payloads carried inside network
//! messages. These never appear on the wire on their own — always nested
//! inside a `Push`, `Request`, or `Response`.

use crate::buffer::{RBuf, WBuf};
use crate::error::CodecError;

const ID_PUT: u8 = 0x01;
const ID_DEL: u8 = 0x02;
const ID_QUERY: u8 = 0x03;
const ID_REPLY: u8 = 0x04;
const ID_ERR: u8 = 0x05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsolidationMode {
    None,
    Monotonic,
    Latest,
}

impl ConsolidationMode {
    fn from_wire(v: u8) -> Result<Self, CodecError> {
        match v {
            0 => Ok(ConsolidationMode::None),
            1 => Ok(ConsolidationMode::Monotonic),
            2 => Ok(ConsolidationMode::Latest),
            _ => Err(CodecError::Malformed("unknown consolidation mode")),
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            ConsolidationMode::None => 0,
            ConsolidationMode::Monotonic => 1,
            ConsolidationMode::Latest => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTarget {
    /// Reachable via at least one matching queryable.
    BestMatching,
    /// Every queryable whose interest intersects the query's key.
    All,
    /// Like `All`, but waits for every matching queryable to finish
    /// before delivering `ResponseFinal`.
    AllComplete,
}

impl QueryTarget {
    fn from_wire(v: u8) -> Result<Self, CodecError> {
        match v {
            0 => Ok(QueryTarget::BestMatching),
            1 => Ok(QueryTarget::All),
            2 => Ok(QueryTarget::AllComplete),
            _ => Err(CodecError::Malformed("unknown query target")),
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            QueryTarget::BestMatching => 0,
            QueryTarget::All => 1,
            QueryTarget::AllComplete => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    pub id: u16,
    pub schema: Option<String>,
}

impl Encoding {
    pub const EMPTY: Encoding = Encoding {
        id: 0,
        schema: None,
    };

    fn encode(&self, w: &mut WBuf) {
        w.write_vle64(self.id as u64);
        match &self.schema {
            Some(s) => {
                w.write_u8(1);
                w.write_string(s);
            }
            None => w.write_u8(0),
        }
    }

    fn decode(r: &mut RBuf) -> Result<Self, CodecError> {
        let id = r.read_vle64()? as u16;
        let has_schema = r.read_u8()?;
        let schema = match has_schema {
            0 => None,
            1 => Some(r.read_string()?.to_string()),
            _ => return Err(CodecError::Malformed("bad encoding schema presence flag")),
        };
        Ok(Encoding { id, schema })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Put {
    pub payload: Vec<u8>,
    pub encoding: Encoding,
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Del {
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub parameters: String,
    pub consolidation: ConsolidationMode,
    pub target: QueryTarget,
    pub payload: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub payload: Vec<u8>,
    pub encoding: Encoding,
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Err {
    pub payload: Vec<u8>,
    pub encoding: Encoding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZenohBody {
    Put(Put),
    Del(Del),
    Query(Query),
    Reply(Reply),
    Err(Err),
}

fn encode_timestamp(w: &mut WBuf, ts: &Option<u64>) {
    match ts {
        Some(t) => {
            w.write_u8(1);
            w.write_vle64(*t);
        }
        None => w.write_u8(0),
    }
}

fn decode_timestamp(r: &mut RBuf) -> Result<Option<u64>, CodecError> {
    match r.read_u8()? {
        0 => Ok(None),
        1 => Ok(Some(r.read_vle64()?)),
        _ => Err(CodecError::Malformed("bad timestamp presence flag")),
    }
}

impl ZenohBody {
    pub fn encode(&self, w: &mut WBuf) {
        match self {
            ZenohBody::Put(p) => {
                w.write_u8(ID_PUT);
                p.encoding.encode(w);
                encode_timestamp(w, &p.timestamp);
                w.write_slice(&p.payload);
            }
            ZenohBody::Del(d) => {
                w.write_u8(ID_DEL);
                encode_timestamp(w, &d.timestamp);
            }
            ZenohBody::Query(q) => {
                w.write_u8(ID_QUERY);
                w.write_string(&q.parameters);
                w.write_u8(q.consolidation.to_wire());
                w.write_u8(q.target.to_wire());
                match &q.payload {
                    Some(p) => {
                        w.write_u8(1);
                        w.write_slice(p);
                    }
                    None => w.write_u8(0),
                }
            }
            ZenohBody::Reply(rp) => {
                w.write_u8(ID_REPLY);
                rp.encoding.encode(w);
                encode_timestamp(w, &rp.timestamp);
                w.write_slice(&rp.payload);
            }
            ZenohBody::Err(e) => {
                w.write_u8(ID_ERR);
                e.encoding.encode(w);
                w.write_slice(&e.payload);
            }
        }
    }

    pub fn decode(r: &mut RBuf) -> Result<Self, CodecError> {
        let id = r.read_u8()?;
        match id {
            ID_PUT => {
                let encoding = Encoding::decode(r)?;
                let timestamp = decode_timestamp(r)?;
                let payload = r.read_slice()?.to_vec();
                Ok(ZenohBody::Put(Put {
                    payload,
                    encoding,
                    timestamp,
                }))
            }
            ID_DEL => {
                let timestamp = decode_timestamp(r)?;
                Ok(ZenohBody::Del(Del { timestamp }))
            }
            ID_QUERY => {
                let parameters = r.read_string()?.to_string();
                let consolidation = ConsolidationMode::from_wire(r.read_u8()?)?;
                let target = QueryTarget::from_wire(r.read_u8()?)?;
                let payload = match r.read_u8()? {
                    0 => None,
                    1 => Some(r.read_slice()?.to_vec()),
                    _ => return Err(CodecError::Malformed("bad query payload presence flag")),
                };
                Ok(ZenohBody::Query(Query {
                    parameters,
                    consolidation,
                    target,
                    payload,
                }))
            }
            ID_REPLY => {
                let encoding = Encoding::decode(r)?;
                let timestamp = decode_timestamp(r)?;
                let payload = r.read_slice()?.to_vec();
                Ok(ZenohBody::Reply(Reply {
                    payload,
                    encoding,
                    timestamp,
                }))
            }
            ID_ERR => {
                let encoding = Encoding::decode(r)?;
                let payload = r.read_slice()?.to_vec();
                Ok(ZenohBody::Err(Err { payload, encoding }))
            }
            _ => Err(CodecError::Malformed("unknown zenoh body id")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(body: ZenohBody) {
        let mut w = WBuf::new();
        body.encode(&mut w);
        let bytes = w.into_vec();
        let mut r = RBuf::new(&bytes);
        assert_eq!(ZenohBody::decode(&mut r).unwrap(), body);
    }

    #[test]
    fn put_roundtrip() {
        roundtrip(ZenohBody::Put(Put {
            payload: b"hello".to_vec(),
            encoding: Encoding {
                id: 1,
                schema: Some("text/plain".to_string()),
            },
            timestamp: Some(42),
        }));
    }

    #[test]
    fn del_roundtrip() {
        roundtrip(ZenohBody::Del(Del { timestamp: None }));
    }

    #[test]
    fn query_roundtrip() {
        roundtrip(ZenohBody::Query(Query {
            parameters: "limit=1".to_string(),
            consolidation: ConsolidationMode::Latest,
            target: QueryTarget::All,
            payload: Some(b"payload".to_vec()),
        }));
    }

    #[test]
    fn reply_and_err_roundtrip() {
        roundtrip(ZenohBody::Reply(Reply {
            payload: b"ok".to_vec(),
            encoding: Encoding::EMPTY,
            timestamp: None,
        }));
        roundtrip(ZenohBody::Err(Err {
            payload: b"bad request".to_vec(),
            encoding: Encoding::EMPTY,
        }));
    }
}
