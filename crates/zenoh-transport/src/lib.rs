//! zenoh-transport — links, sessions, and the tasks that drive them.
//!
//! This crate owns everything that touches a socket: the link
//! abstraction (§4.5/4.6's capability interface), per-session unicast
//! state machines, the multicast peer table, defragmentation, and the
//! read/lease/accept task scheduler. `zenoh-session` builds the
//! registries and routing on top of what this crate delivers.

pub mod channel;
pub mod defrag;
pub mod error;
pub mod link;
pub mod multicast;
pub mod qos;
pub mod scheduler;
pub mod unicast;

pub use error::TransportError;
pub use link::Link;
pub use unicast::{UnicastSession, UnicastState};
