//! Read and write buffers.
//!
//! `RBuf` is a cursor into a byte slice: decoding never copies, it only
//! advances the cursor and reports [`CodecError::Truncated`] when a read
//! would run past the end. `WBuf` is a growable byte sink with a
//! reserve/patch-back mechanism so streamed-length framing (§4.1) can write
//! a message body before it knows how long that body is.

use crate::error::CodecError;
use crate::vle;

/// A cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct RBuf<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> RBuf<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// The unread tail of the buffer.
    pub fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| CodecError::truncated(1, self.remaining()))?;
        self.pos += 1;
        Ok(b)
    }

    /// Read exactly `n` bytes and advance the cursor.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::truncated(n, self.remaining()));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a fixed-size array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let slice = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// VLE-encoded u64.
    pub fn read_vle64(&mut self) -> Result<u64, CodecError> {
        let (value, consumed) = vle::decode_vle64(self.rest())?;
        self.pos += consumed;
        Ok(value)
    }

    /// VLE-length-prefixed byte slice.
    pub fn read_slice(&mut self) -> Result<&'a [u8], CodecError> {
        let (len, consumed) = vle::decode_vle_len(self.rest())?;
        self.pos += consumed;
        self.read_bytes(len)
    }

    /// VLE-length-prefixed UTF-8 string. Strings are not NUL-terminated
    /// on the wire.
    pub fn read_string(&mut self) -> Result<&'a str, CodecError> {
        let bytes = self.read_slice()?;
        std::str::from_utf8(bytes).map_err(|_| CodecError::Malformed("string is not valid utf-8"))
    }
}

/// A reservation made with [`WBuf::reserve`], redeemed with [`WBuf::patch`].
#[derive(Debug, Clone, Copy)]
pub struct Slot {
    offset: usize,
    len: usize,
}

/// A growable byte sink supporting reserve/patch-back for length prefixes.
#[derive(Debug, Clone, Default)]
pub struct WBuf {
    bytes: Vec<u8>,
}

impl WBuf {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    pub fn reset(&mut self) {
        self.bytes.clear();
    }

    pub fn write_u8(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    pub fn write_vle64(&mut self, value: u64) {
        vle::encode_vle64(value, &mut self.bytes);
    }

    pub fn write_slice(&mut self, data: &[u8]) {
        self.write_vle64(data.len() as u64);
        self.write_bytes(data);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_slice(s.as_bytes());
    }

    /// Reserve `len` bytes of zeroed space, to be filled in later via
    /// [`WBuf::patch`] once the caller knows the real contents (typically
    /// a streamed-length prefix measured after the body is serialized).
    pub fn reserve(&mut self, len: usize) -> Slot {
        let offset = self.bytes.len();
        self.bytes.resize(offset + len, 0);
        Slot { offset, len }
    }

    /// Overwrite the bytes reserved by `slot` with `data`.
    /// `data.len()` must equal the slot's reserved length.
    pub fn patch(&mut self, slot: Slot, data: &[u8]) {
        debug_assert_eq!(data.len(), slot.len);
        self.bytes[slot.offset..slot.offset + slot.len].copy_from_slice(data);
    }
}
