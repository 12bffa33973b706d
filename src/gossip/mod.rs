//! Gossip Protocol
//!
//! A SWIM-style membership protocol. Every round a member refreshes its own
//! heartbeat and advertises digests of everything it knows; peers answer
//! with what they know better (SYNC -> ACK -> ACK2), so all views converge
//! on the freshest heartbeat per member. A failure detector turns heartbeats
//! that stay stale for long enough into DOWN transitions.
pub mod controller;
pub mod detector;
pub mod dissemination;
pub mod handlers;
pub mod messages;
pub mod reconcile;

pub use controller::{controller_for, GossipController};
pub use detector::{FailureDetector, StatusReport};
pub use dissemination::{seed_send_probability, select_seed, select_target, RoundSummary};
pub use messages::{
    encode, Ack2Message, AckMessage, GossipDigest, GossipMessage, GossipPacket, MessageType,
};
pub use reconcile::apply_to_local_state;
