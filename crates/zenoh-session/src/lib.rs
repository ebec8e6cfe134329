//! zenoh-session — the registries, query correlator, and dispatch logic
//! that turn raw transport deliveries into pub/sub/query semantics.
//!
//! This crate knows nothing about sockets; it is handed already-decoded
//! [`zenoh_protocol::msg::NetworkMessage`]s by whatever owns the
//! transport session (see the `zenoh` facade crate) and updates its
//! tables, invoking user callbacks as declarations and samples arrive.

pub mod callback;
pub mod dispatch;
pub mod query;
pub mod registry;
pub mod resolve;

pub use callback::{callback, Callback};
pub use query::{PendingQuery, ReplySample};
pub use registry::{IncomingQuery, Sample, SampleKind, SessionRegistry};
pub use resolve::{resolve_incoming, wire_form_for};
