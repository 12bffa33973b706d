//! Datagram transports for gossip traffic
//!
//! `UdpTransport` is the production implementation; `MemoryNetwork` wires
//! controllers together inside one process.
pub mod memory;
pub mod traits;
pub mod udp;

pub use memory::{MemoryNetwork, MemoryTransport, SentMessage};
pub use traits::{Inbound, Transport};
pub use udp::{TransportStats, UdpTransport};
