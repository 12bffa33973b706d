//! Gossip Message Protocol
//!
//! Every packet is a JSON envelope naming the message type, the sender's
//! cluster and gossip address, and a type-specific payload:
//!
//! ```text
//! { "type": "SYNC", "cluster": "alpha", "from": "10.0.0.1:8512", "payload": [...] }
//! ```
//!
//! - SYNC carries digests (identity, heartbeat time, version) of everything the sender knows
//! - ACK answers a SYNC with the digests the responder wants and the entries it holds newer
//! - ACK2 completes the exchange with the entries the ACK asked for
//! - SHUTDOWN announces a graceful departure of the sender
use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{GossipError, Result};
use crate::membership::{HeartbeatState, Member, MemberEntry};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Sync,
    Ack,
    Ack2,
    Shutdown,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Sync => write!(f, "SYNC"),
            MessageType::Ack => write!(f, "ACK"),
            MessageType::Ack2 => write!(f, "ACK2"),
            MessageType::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}

/// Compact summary of what the sender knows about one member
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GossipDigest {
    pub id: String,
    pub ip: IpAddr,
    pub port: u16,
    pub heartbeat_time: i64,
    pub version: u64,
}

impl GossipDigest {
    pub fn new(member: &Member, heartbeat: HeartbeatState) -> Self {
        Self {
            id: member.id().to_string(),
            ip: member.ip(),
            port: member.port(),
            heartbeat_time: heartbeat.heartbeat_time,
            version: heartbeat.version,
        }
    }

    /// Digests travel without a cluster name; it comes from the envelope
    pub fn member(&self, cluster: &str) -> Member {
        Member::new(cluster, SocketAddr::new(self.ip, self.port), self.id.clone())
    }

    pub fn heartbeat(&self) -> HeartbeatState {
        HeartbeatState::new(self.heartbeat_time, self.version)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AckMessage {
    /// Digests for which the responder holds older data (or none at all)
    pub olders: Vec<GossipDigest>,
    /// Entries the responder holds newer than the SYNC sender
    pub newers: Vec<MemberEntry>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Ack2Message {
    pub endpoints: Vec<MemberEntry>,
}

/// Typed view of a packet payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GossipMessage {
    Sync(Vec<GossipDigest>),
    Ack(AckMessage),
    Ack2(Ack2Message),
    Shutdown(Member),
}

impl GossipMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            GossipMessage::Sync(_) => MessageType::Sync,
            GossipMessage::Ack(_) => MessageType::Ack,
            GossipMessage::Ack2(_) => MessageType::Ack2,
            GossipMessage::Shutdown(_) => MessageType::Shutdown,
        }
    }

    fn payload(&self) -> Result<serde_json::Value> {
        let value = match self {
            GossipMessage::Sync(digests) => serde_json::to_value(digests)?,
            GossipMessage::Ack(ack) => serde_json::to_value(ack)?,
            GossipMessage::Ack2(ack2) => serde_json::to_value(ack2)?,
            GossipMessage::Shutdown(member) => serde_json::to_value(member)?,
        };
        Ok(value)
    }
}

/// GossipPacket wraps messages for network transmission
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct GossipPacket {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub cluster: String,
    pub from: SocketAddr,
    pub payload: serde_json::Value,
}

impl GossipPacket {
    pub fn new(message: &GossipMessage, cluster: &str, from: SocketAddr) -> Result<Self> {
        Ok(Self {
            message_type: message.message_type(),
            cluster: cluster.to_string(),
            from,
            payload: message.payload()?,
        })
    }

    /// Decode the payload according to the envelope type
    pub fn message(&self) -> Result<GossipMessage> {
        let payload = self.payload.clone();
        let message = match self.message_type {
            MessageType::Sync => GossipMessage::Sync(serde_json::from_value(payload)?),
            MessageType::Ack => GossipMessage::Ack(serde_json::from_value(payload)?),
            MessageType::Ack2 => GossipMessage::Ack2(serde_json::from_value(payload)?),
            MessageType::Shutdown => GossipMessage::Shutdown(serde_json::from_value(payload)?),
        };
        Ok(message)
    }

    pub fn serialize(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| {
            GossipError::Message(format!("Undecodable gossip packet: {}", e)).into()
        })
    }
}

/// Build and serialize a packet in one step
pub fn encode(message: &GossipMessage, cluster: &str, from: SocketAddr) -> Result<Bytes> {
    GossipPacket::new(message, cluster, from)?.serialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::MemberState;

    fn member() -> Member {
        Member::new("alpha", "10.0.0.2:8512".parse().unwrap(), "b")
    }

    fn from() -> SocketAddr {
        "10.0.0.1:8512".parse().unwrap()
    }

    #[test]
    fn test_sync_wire_shape() {
        let digest = GossipDigest::new(&member(), HeartbeatState::new(1_700, 3));
        let data = encode(&GossipMessage::Sync(vec![digest]), "alpha", from()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&data).unwrap();

        assert_eq!(value["type"], "SYNC");
        assert_eq!(value["cluster"], "alpha");
        assert_eq!(value["from"], "10.0.0.1:8512");
        assert_eq!(value["payload"][0]["ip"], "10.0.0.2");
        assert_eq!(value["payload"][0]["port"], 8512);
        assert_eq!(value["payload"][0]["heartbeatTime"], 1_700);
        assert_eq!(value["payload"][0]["version"], 3);
        assert_eq!(value["payload"][0]["id"], "b");
    }

    #[test]
    fn test_ack_and_shutdown_decode_by_type() {
        let entry = MemberEntry {
            member: member(),
            state: MemberState::Up,
            heartbeat: HeartbeatState::new(42, 1),
        };
        let ack = GossipMessage::Ack(AckMessage {
            olders: vec![GossipDigest::new(&member(), HeartbeatState::default())],
            newers: vec![entry],
        });
        let packet = GossipPacket::deserialize(&encode(&ack, "alpha", from()).unwrap()).unwrap();
        assert_eq!(packet.message_type, MessageType::Ack);
        assert_eq!(packet.message().unwrap(), ack);

        let bye = GossipMessage::Shutdown(member());
        let packet = GossipPacket::deserialize(&encode(&bye, "alpha", from()).unwrap()).unwrap();
        assert_eq!(packet.message().unwrap(), bye);
    }

    #[test]
    fn test_ack2_wire_name() {
        let data = encode(&GossipMessage::Ack2(Ack2Message::default()), "alpha", from()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(value["type"], "ACK2");
        assert_eq!(value["payload"]["endpoints"], serde_json::json!([]));
    }

    #[test]
    fn test_digest_member_takes_envelope_cluster() {
        let digest = GossipDigest::new(&member(), HeartbeatState::new(1, 1));
        assert_eq!(digest.member("alpha"), member());
        assert_ne!(digest.member("beta"), member());
    }

    #[test]
    fn test_garbage_is_a_message_error() {
        let err = GossipPacket::deserialize(b"not json").unwrap_err();
        assert_eq!(err.error_type(), "gossip_error");

        let wrong_payload = serde_json::json!({
            "type": "SYNC",
            "cluster": "alpha",
            "from": "10.0.0.1:8512",
            "payload": {"unexpected": true}
        });
        let packet: GossipPacket = serde_json::from_value(wrong_payload).unwrap();
        assert!(packet.message().is_err());
    }
}
