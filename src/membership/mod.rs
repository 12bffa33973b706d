//! Cluster membership: identities, heartbeats, the store that classifies
//! members as live or dead, and the listener hook for transitions.
pub mod events;
pub mod heartbeat;
pub mod member;
pub mod store;

pub use events::{ChannelListener, GossipEvent, GossipListener};
pub use heartbeat::{now_millis, CandidateState, HeartbeatState, Suspicion};
pub use member::{Member, MemberState};
pub use store::{MemberEntry, MembershipStore};
