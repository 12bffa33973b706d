#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use murmur::gossip::{GossipController, GossipMessage, GossipPacket, MessageType};
use murmur::membership::{ChannelListener, GossipEvent, HeartbeatState, Member, MemberState};
use murmur::settings::Settings;
use murmur::transport::{MemoryNetwork, MemoryTransport};

pub const CLUSTER: &str = "alpha";

pub fn addr(port: u16) -> SocketAddr {
    format!("127.0.0.1:{}", port).parse().unwrap()
}

pub fn member(port: u16) -> Member {
    Member::new(CLUSTER, addr(port), format!("m{}", port))
}

pub fn settings(port: u16, seeds: &[u16]) -> Settings {
    Settings {
        cluster: CLUSTER.to_string(),
        member_id: Some(format!("m{}", port)),
        listen_port: port,
        seed_members: seeds.iter().map(|p| addr(*p)).collect(),
        ..Settings::default()
    }
}

/// A controller wired to an in-memory network, with its sent log and events
pub struct TestNode {
    pub controller: Arc<GossipController>,
    pub transport: Arc<MemoryTransport>,
    pub events: UnboundedReceiver<GossipEvent>,
}

impl TestNode {
    pub fn new(network: &MemoryNetwork, settings: Settings) -> Self {
        let transport = Arc::new(network.transport(settings.gossip_addr()));
        let (listener, events) = ChannelListener::new();
        let controller = Arc::new(
            GossipController::new(settings, transport.clone(), Some(Arc::new(listener))).unwrap(),
        );
        Self {
            controller,
            transport,
            events,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.controller.settings().gossip_addr()
    }

    pub fn member(&self) -> Member {
        self.controller.local_member().clone()
    }

    pub fn state_of(&self, member: &Member) -> Option<MemberState> {
        self.controller.member_state(member).unwrap()
    }

    /// Pretend `member` was learned through gossip and is alive
    pub fn knows_up(&self, member: &Member, heartbeat: HeartbeatState) {
        self.controller.store().put_heartbeat(member.clone(), heartbeat);
        self.controller.store().mark_up(member).unwrap();
    }

    pub fn drain_events(&mut self) -> Vec<GossipEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Type of every message sent to `target` so far
    pub fn sent_types_to(&self, target: SocketAddr) -> Vec<MessageType> {
        self.transport
            .sent_to(target)
            .iter()
            .map(|data| GossipPacket::deserialize(data).unwrap().message_type)
            .collect()
    }
}

pub fn decode(data: &[u8]) -> GossipMessage {
    GossipPacket::deserialize(data).unwrap().message().unwrap()
}

/// Hand every queued message to the node listening on its target until the
/// nodes stop talking. Messages to unknown addresses are dropped.
pub async fn pump(nodes: &[&TestNode]) -> usize {
    let mut delivered = 0;
    for _ in 0..16 {
        let mut quiet = true;
        for sender in nodes {
            for message in sender.transport.take_sent() {
                quiet = false;
                if let Some(receiver) = nodes.iter().find(|n| n.addr() == message.target) {
                    // handler errors are part of what some tests exercise
                    let _ = receiver
                        .controller
                        .handle_packet(&message.data, sender.addr())
                        .await;
                    delivered += 1;
                }
            }
        }
        if quiet {
            break;
        }
    }
    delivered
}
