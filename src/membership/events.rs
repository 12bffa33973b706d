//! Lifecycle notifications (JOIN/UP/DOWN) for embedding applications
use tokio::sync::mpsc;
use tracing::debug;

use super::member::{Member, MemberState};

/// Receives membership transitions.
///
/// Called synchronously while the store's write lock is held, so
/// implementations must return quickly and must not call back into the store.
pub trait GossipListener: Send + Sync {
    fn on_gossip_event(&self, member: &Member, state: MemberState);
}

impl<F> GossipListener for F
where
    F: Fn(&Member, MemberState) + Send + Sync,
{
    fn on_gossip_event(&self, member: &Member, state: MemberState) {
        self(member, state)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GossipEvent {
    pub member: Member,
    pub state: MemberState,
}

/// Forwards events into an unbounded channel for async consumers
#[derive(Clone, Debug)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<GossipEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<GossipEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl GossipListener for ChannelListener {
    fn on_gossip_event(&self, member: &Member, state: MemberState) {
        let event = GossipEvent {
            member: member.clone(),
            state,
        };
        if self.tx.send(event).is_err() {
            debug!("Gossip event receiver dropped; discarding {} {}", member, state);
        }
    }
}
