//! Resolving a wire-shaped key expression against the resource tables,
//! and choosing the smallest wire form for an outgoing one.
//!
//! A key expression on the wire is either a bare suffix string, a
//! numeric resource id alone, or an id plus a suffix forming
//! `prefix(id) ⧺ suffix` (literal concatenation — the suffix carries its
//! own separator, if any). This module is the one place both directions
//! (decode-time resolution, encode-time minimization) go through.

use zenoh_protocol::keyexpr::KeyExpr;
use zenoh_protocol::msg::declare::WireKeyExpr;

use crate::registry::{LocalResourceTable, RemoteResourceTable};

/// Resolve an incoming [`WireKeyExpr`] to a canonical [`KeyExpr`] using
/// `table` (the remote-space resource table: ids assigned by
/// `DeclareKeyExpr` messages received from the peer).
pub fn resolve_incoming(
    key: &WireKeyExpr,
    table: &RemoteResourceTable,
) -> Option<KeyExpr> {
    match key {
        WireKeyExpr::Full(s) => KeyExpr::new(s.clone()).ok(),
        WireKeyExpr::Mapped { rid, suffix } => {
            let prefix = table.get(rid)?.as_str().to_string();
            let full = match suffix {
                Some(s) if !s.is_empty() => format!("{prefix}{s}"),
                _ => prefix,
            };
            KeyExpr::new(full).ok()
        }
    }
}

/// Choose the smallest wire form for an outgoing `key`: a bare resource
/// id if `table` already has one declared for this exact key, the full
/// suffix string otherwise. Declaring a resource ahead of time (and
/// reusing its id here) is how a session avoids re-sending the same long
/// key expression on every publication.
pub fn wire_form_for(key: &KeyExpr, table: &LocalResourceTable) -> WireKeyExpr {
    for entry in table.iter() {
        if entry.value() == key {
            return WireKeyExpr::Mapped {
                rid: *entry.key(),
                suffix: None,
            };
        }
    }
    WireKeyExpr::Full(key.as_str().to_string())
}
