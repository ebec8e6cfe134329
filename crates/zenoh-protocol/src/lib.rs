//! zenoh-protocol — wire format, key-expression engine, and locator/config
//! parsing shared by every other crate in this workspace.
//!
//! Nothing in this crate talks to a socket or spawns a task: it is the pure,
//! allocation-light layer that describes *what bytes mean*, not how they
//! travel. `zenoh-transport` and `zenoh-session` build the session state
//! machine and registries on top of it.

pub mod buffer;
pub mod codec;
pub mod config;
pub mod error;
pub mod ext;
pub mod keyexpr;
pub mod msg;
pub mod sn;
pub mod vle;
pub mod zid;

pub use buffer::{RBuf, WBuf};
pub use error::CodecError;
pub use keyexpr::{KeyExpr, KeyExprError};
pub use sn::{Sn, SnResolution};
pub use zid::Zid;
