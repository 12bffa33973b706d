use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

/// Identity of a cluster member.
///
/// Equality and hashing cover every field, and none of them change after
/// construction: liveness lives in the membership store, keyed by this value.
#[derive(
    Clone, Debug, Deserialize, Serialize, PartialEq, PartialOrd, Ord, Eq, Hash,
)]
pub struct Member {
    cluster: String,
    ip: IpAddr,
    port: u16,
    id: String,
}

impl Member {
    pub fn new(cluster: impl Into<String>, addr: SocketAddr, id: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            ip: addr.ip(),
            port: addr.port(),
            id: id.into(),
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl std::fmt::Display for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.socket_addr())
    }
}

/// Local belief about a member's liveness
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemberState {
    Join,
    Up,
    Down,
}

impl MemberState {
    /// JOIN and DOWN members are waiting to be (re)discovered
    pub fn is_discoverable(&self) -> bool {
        matches!(self, MemberState::Join | MemberState::Down)
    }

    pub fn is_alive(&self) -> bool {
        matches!(self, MemberState::Up)
    }
}

impl std::fmt::Display for MemberState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberState::Join => write!(f, "JOIN"),
            MemberState::Up => write!(f, "UP"),
            MemberState::Down => write!(f, "DOWN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_identity_is_structural() {
        let addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let a = Member::new("alpha", addr, "a");
        let same = Member::new("alpha", addr, "a");
        let other_id = Member::new("alpha", addr, "b");
        let other_cluster = Member::new("beta", addr, "a");

        assert_eq!(a, same);
        assert_ne!(a, other_id);
        assert_ne!(a, other_cluster);

        let set: HashSet<Member> = [a.clone(), same, other_id].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(a.to_string(), "a@127.0.0.1:9001");
    }

    #[test]
    fn test_state_wire_names() {
        assert_eq!(serde_json::to_string(&MemberState::Up).unwrap(), "\"UP\"");
        let state: MemberState = serde_json::from_str("\"DOWN\"").unwrap();
        assert_eq!(state, MemberState::Down);
        assert!(MemberState::Join.is_discoverable());
        assert!(!MemberState::Up.is_discoverable());
        assert!(MemberState::Up.is_alive());
    }
}
