//! Wire-level error taxonomy.
//!
//! Every decode operation in this crate returns one of these variants
//! rather than panicking. Disposition (tear the session down vs. return to
//! the caller) is decided by `zenoh-transport`, not here — this crate only
//! describes what went wrong.

use thiserror::Error;

/// Errors raised while encoding or decoding wire bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Fewer bytes remain in the read buffer than the decode requires.
    #[error("truncated input: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// The bytes decoded but violate a wire-format invariant (bad VLE
    /// continuation, reserved bits set, invalid header, CRC mismatch, ...).
    #[error("malformed input: {0}")]
    Malformed(&'static str),

    /// An extension carried the mandatory bit and this decoder does not
    /// recognize its id.
    #[error("unknown mandatory extension id {0}")]
    ExtensionUnknownMandatory(u8),

    /// The write buffer has no room left for the requested bytes.
    #[error("out of space: needed {needed} bytes, {available} available")]
    OutOfSpace { needed: usize, available: usize },
}

impl CodecError {
    pub fn truncated(needed: usize, available: usize) -> Self {
        CodecError::Truncated { needed, available }
    }

    pub fn out_of_space(needed: usize, available: usize) -> Self {
        CodecError::OutOfSpace { needed, available }
    }
}
