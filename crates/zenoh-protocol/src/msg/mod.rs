//! Message families.
//!
//! Every message in the protocol belongs to one of four families, each
//! with its own module here: scouting (discovery, connectionless),
//! transport (session lifecycle and framing), network (routed messages
//! inside a frame), and zenoh (the pub/sub/query payload bodies carried
//! by network messages). `declare` holds the declaration bodies carried
//! by `network::Declare`.

pub mod declare;
pub mod network;
pub mod scouting;
pub mod transport;
pub mod zenoh;

pub use declare::Declaration;
pub use network::NetworkMessage;
pub use scouting::ScoutingMessage;
pub use transport::TransportMessage;
pub use zenoh::ZenohBody;

/// `WhatAmI` bitflags identifying the role a ZID is scouting for or
/// announcing as. Combinable in a `Scout` request to mean "any of these".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhatAmI(pub u8);

impl WhatAmI {
    pub const ROUTER: WhatAmI = WhatAmI(0x01);
    pub const PEER: WhatAmI = WhatAmI(0x02);
    pub const CLIENT: WhatAmI = WhatAmI(0x04);

    pub fn contains(self, other: WhatAmI) -> bool {
        self.0 & other.0 != 0
    }

    pub fn union(self, other: WhatAmI) -> WhatAmI {
        WhatAmI(self.0 | other.0)
    }
}

/// Reliability of a channel: best-effort frames may be dropped under
/// congestion, reliable frames must never be (the link layer enforces
/// backpressure instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reliability {
    BestEffort,
    Reliable,
}

/// Priority bands, ordered highest to lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    RealTime = 0,
    InteractiveHigh = 1,
    InteractiveLow = 2,
    DataHigh = 3,
    Data = 4,
    DataLow = 5,
    Background = 6,
}

impl Priority {
    pub const DEFAULT: Priority = Priority::Data;

    pub fn from_wire(v: u8) -> Option<Self> {
        match v {
            0 => Some(Priority::RealTime),
            1 => Some(Priority::InteractiveHigh),
            2 => Some(Priority::InteractiveLow),
            3 => Some(Priority::DataHigh),
            4 => Some(Priority::Data),
            5 => Some(Priority::DataLow),
            6 => Some(Priority::Background),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }
}
