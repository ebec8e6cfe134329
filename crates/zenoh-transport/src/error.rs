//! Transport-level error taxonomy.

use thiserror::Error;
use zenoh_protocol::CodecError;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("i/o error on link: {0}")]
    Io(#[from] std::io::Error),

    #[error("handshake failed: {0}")]
    HandshakeFailed(&'static str),

    #[error("lease expired with no keep-alive or frame received")]
    LeaseExpired,

    #[error("peer closed the session (reason byte {0})")]
    PeerClosed(u8),

    #[error("session is not open (current state: {0})")]
    NotOpen(&'static str),

    #[error("reliable channel sequence gap: expected {expected}, got {got}")]
    ReliableSnGap { expected: u64, got: u64 },

    #[error("defragmentation buffer exceeded its bound and was reset")]
    DefragOverflow,
}
