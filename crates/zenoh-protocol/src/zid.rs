//! Zenoh identifiers: 1-16 opaque bytes identifying a session endpoint.

use std::fmt;

use rand::RngCore;

use crate::error::CodecError;

pub const ZID_MAX_LEN: usize = 16;

/// A Zenoh ID: between 1 and 16 bytes, stored right-padded to a fixed
/// buffer with an explicit length so short IDs don't allocate.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Zid {
    bytes: [u8; ZID_MAX_LEN],
    len: u8,
}

impl Zid {
    /// Build a ZID from up to 16 bytes. Panics if `bytes` is empty or
    /// longer than [`ZID_MAX_LEN`] — callers construct ZIDs from trusted
    /// local sources (`rand`) or from [`Zid::decode`], never directly from
    /// untrusted input.
    pub fn new(bytes: &[u8]) -> Self {
        assert!(!bytes.is_empty() && bytes.len() <= ZID_MAX_LEN);
        let mut buf = [0u8; ZID_MAX_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Zid {
            bytes: buf,
            len: bytes.len() as u8,
        }
    }

    /// A fresh random 16-byte ZID, the default when none is configured.
    pub fn rand() -> Self {
        let mut buf = [0u8; ZID_MAX_LEN];
        rand::thread_rng().fill_bytes(&mut buf);
        Zid {
            bytes: buf,
            len: ZID_MAX_LEN as u8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.is_empty() || bytes.len() > ZID_MAX_LEN {
            return Err(CodecError::Malformed("zid length out of range"));
        }
        Ok(Zid::new(bytes))
    }
}

impl fmt::Debug for Zid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Zid({})", hex::encode(self.as_bytes()))
    }
}

impl fmt::Display for Zid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rand_zid_is_full_length() {
        let z = Zid::rand();
        assert_eq!(z.len(), ZID_MAX_LEN);
    }

    #[test]
    fn decode_rejects_empty_and_oversized() {
        assert!(Zid::decode(&[]).is_err());
        assert!(Zid::decode(&[0u8; 17]).is_err());
    }

    #[test]
    fn decode_accepts_short_zid() {
        let z = Zid::decode(&[1, 2, 3]).unwrap();
        assert_eq!(z.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn display_is_hex() {
        let z = Zid::new(&[0xde, 0xad]);
        assert_eq!(format!("{z}"), "dead");
    }
}
