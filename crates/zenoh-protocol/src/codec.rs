//! Message framing.
//!
//! Three framings are defined, one per link shape:
//!
//! - **streamed**: a 2-byte little-endian length prefix ahead of one
//!   serialized [`TransportMessage`], used on TCP and other byte streams.
//!   The prefix caps a single frame at 65535 bytes; larger payloads are
//!   split into `Fragment` messages by the transport before they ever
//!   reach this layer.
//! - **datagram**: no framing at all — one message per UDP datagram, the
//!   socket boundary is the message boundary.
//! - **serial**: COBS-encoded, CRC32-checked, 0x00-delimited, for links
//!   with no inherent message boundary and a noisy byte channel.

use crc::{Crc, CRC_32_ISO_HDLC};

use crate::buffer::{RBuf, WBuf};
use crate::error::CodecError;
use crate::msg::TransportMessage;

pub const MAX_STREAMED_LEN: usize = u16::MAX as usize;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Serialize `msg` with a 2-byte LE length prefix. Fails if the encoded
/// body would exceed [`MAX_STREAMED_LEN`].
pub fn encode_streamed(msg: &TransportMessage) -> Result<Vec<u8>, CodecError> {
    let mut body = WBuf::new();
    msg.encode(&mut body);
    let body = body.into_vec();
    if body.len() > MAX_STREAMED_LEN {
        return Err(CodecError::Malformed("streamed frame exceeds 65535 bytes"));
    }
    let mut out = Vec::with_capacity(2 + body.len());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Read the 2-byte length prefix out of `input`, returning the prefix
/// value and the offset the body starts at. Does not require the body to
/// have arrived yet — callers (the read task) use this to know how many
/// more bytes to buffer before calling [`decode_streamed_body`].
pub fn peek_streamed_len(input: &[u8]) -> Result<usize, CodecError> {
    if input.len() < 2 {
        return Err(CodecError::truncated(2, input.len()));
    }
    let len = u16::from_le_bytes([input[0], input[1]]) as usize;
    Ok(len)
}

/// Decode one message out of `body`, which must be exactly the bytes
/// between the length prefix and the next frame (no trailing bytes).
pub fn decode_streamed_body(body: &[u8]) -> Result<TransportMessage, CodecError> {
    let mut r = RBuf::new(body);
    let msg = TransportMessage::decode(&mut r)?;
    if !r.is_empty() {
        return Err(CodecError::Malformed("trailing bytes after streamed message"));
    }
    Ok(msg)
}

/// Serialize `msg` for a datagram link: no prefix, the datagram boundary
/// is the message boundary.
pub fn encode_datagram(msg: &TransportMessage) -> Vec<u8> {
    let mut w = WBuf::new();
    msg.encode(&mut w);
    w.into_vec()
}

pub fn decode_datagram(input: &[u8]) -> Result<TransportMessage, CodecError> {
    let mut r = RBuf::new(input);
    let msg = TransportMessage::decode(&mut r)?;
    if !r.is_empty() {
        return Err(CodecError::Malformed("trailing bytes after datagram message"));
    }
    Ok(msg)
}

/// COBS-encode `data` (which must not itself contain the 0x00 delimiter
/// once encoded — COBS guarantees this by construction).
fn cobs_encode(data: &[u8], out: &mut Vec<u8>) {
    let mut code_pos = out.len();
    out.push(0); // placeholder, patched below
    let mut code = 1u8;
    for &byte in data {
        if byte == 0 {
            out[code_pos] = code;
            code_pos = out.len();
            out.push(0);
            code = 1;
        } else {
            out.push(byte);
            code += 1;
            if code == 0xff {
                out[code_pos] = code;
                code_pos = out.len();
                out.push(0);
                code = 1;
            }
        }
    }
    out[code_pos] = code;
}

fn cobs_decode(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0usize;
    while i < data.len() {
        let code = data[i] as usize;
        if code == 0 {
            return Err(CodecError::Malformed("cobs zero code byte"));
        }
        i += 1;
        let block_end = i + (code - 1);
        if block_end > data.len() {
            return Err(CodecError::Malformed("cobs block overruns input"));
        }
        out.extend_from_slice(&data[i..block_end]);
        i = block_end;
        if code != 0xff && i < data.len() {
            out.push(0);
        }
    }
    Ok(out)
}

/// Serial framing: `CRC32(msg) || msg`, COBS-encoded, terminated by a
/// literal 0x00 delimiter byte (which COBS output never produces
/// internally, so the delimiter is unambiguous).
pub fn encode_serial(msg: &TransportMessage) -> Vec<u8> {
    let mut body = WBuf::new();
    msg.encode(&mut body);
    let body = body.into_vec();
    let checksum = CRC32.checksum(&body);

    let mut payload = Vec::with_capacity(4 + body.len());
    payload.extend_from_slice(&checksum.to_le_bytes());
    payload.extend_from_slice(&body);

    let mut framed = Vec::with_capacity(payload.len() + payload.len() / 254 + 2);
    cobs_encode(&payload, &mut framed);
    framed.push(0x00);
    framed
}

/// Decode one COBS frame (without its trailing 0x00 delimiter, which the
/// caller strips while scanning the byte stream for frame boundaries).
pub fn decode_serial(frame: &[u8]) -> Result<TransportMessage, CodecError> {
    let payload = cobs_decode(frame)?;
    if payload.len() < 4 {
        return Err(CodecError::truncated(4, payload.len()));
    }
    let (crc_bytes, body) = payload.split_at(4);
    let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    let actual = CRC32.checksum(body);
    if expected != actual {
        return Err(CodecError::Malformed("serial frame crc mismatch"));
    }
    let mut r = RBuf::new(body);
    let msg = TransportMessage::decode(&mut r)?;
    if !r.is_empty() {
        return Err(CodecError::Malformed("trailing bytes after serial message"));
    }
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::TransportMessage;

    fn sample_msg() -> TransportMessage {
        TransportMessage::KeepAlive
    }

    #[test]
    fn streamed_roundtrip() {
        let msg = sample_msg();
        let framed = encode_streamed(&msg).unwrap();
        let len = peek_streamed_len(&framed).unwrap();
        let body = &framed[2..2 + len];
        assert_eq!(decode_streamed_body(body).unwrap(), msg);
    }

    #[test]
    fn datagram_roundtrip() {
        let msg = sample_msg();
        let bytes = encode_datagram(&msg);
        assert_eq!(decode_datagram(&bytes).unwrap(), msg);
    }

    #[test]
    fn cobs_roundtrip_with_embedded_zeros() {
        let data = vec![0u8, 1, 2, 0, 0, 3, 4, 5, 0];
        let mut out = Vec::new();
        cobs_encode(&data, &mut out);
        assert!(!out.contains(&0));
        let decoded = cobs_decode(&out).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn cobs_roundtrip_long_run_without_zeros() {
        let data: Vec<u8> = (1..=300u16).map(|v| (v % 255 + 1) as u8).collect();
        let mut out = Vec::new();
        cobs_encode(&data, &mut out);
        assert!(!out.contains(&0));
        assert_eq!(cobs_decode(&out).unwrap(), data);
    }

    #[test]
    fn serial_roundtrip() {
        let msg = sample_msg();
        let mut framed = encode_serial(&msg);
        assert_eq!(framed.pop(), Some(0x00));
        assert!(!framed.contains(&0x00));
        assert_eq!(decode_serial(&framed).unwrap(), msg);
    }

    #[test]
    fn serial_rejects_corrupted_crc() {
        let msg = sample_msg();
        let mut framed = encode_serial(&msg);
        framed.pop();
        // Flip a bit in the encoded body to corrupt the checksum.
        let last = framed.len() - 1;
        framed[last] ^= 0x01;
        assert!(decode_serial(&framed).is_err());
    }

    #[test]
    fn streamed_rejects_oversized_frame() {
        let msg = TransportMessage::Frame(crate::msg::transport::Frame {
            sn: crate::sn::Sn(0),
            reliability: crate::msg::Reliability::BestEffort,
            priority: crate::msg::Priority::Data,
            payload: vec![0u8; MAX_STREAMED_LEN + 10],
        });
        assert!(encode_streamed(&msg).is_err());
    }
}
