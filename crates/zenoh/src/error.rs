//! Facade-level errors.
//!
//! Local misuse (returned to the caller with no impact on the session)
//! and the transport/I-O failures that can surface while opening or
//! closing a session are both represented here; remote-induced protocol
//! errors (malformed message, SN desync, lease expiry, ...) are a
//! [`zenoh_transport::TransportError`] wrapped unchanged — the session
//! that hit one is already closed by the time the caller sees it.

use thiserror::Error;

use zenoh_protocol::error::CodecError;
use zenoh_protocol::keyexpr::KeyExprError;
use zenoh_transport::TransportError;

#[derive(Debug, Error)]
pub enum ZError {
    #[error("invalid key expression: {0}")]
    InvalidKeyExpr(#[from] KeyExprError),

    #[error("unknown entity id {0}")]
    UnknownEntity(u64),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no connect/listen locator configured")]
    NoLocator,

    #[error("unsupported locator protocol: {0:?}")]
    UnsupportedProtocol(String),
}

pub type Result<T> = std::result::Result<T, ZError>;
