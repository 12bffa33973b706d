//! murmur application settings
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::error::Result;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const STANDARD_PORT_HTTP: u16 = 8510;
pub const DEFAULT_PORT_HTTP: &str = "8510";
pub const STANDARD_PORT_GOSSIP: u16 = 8512;
pub const DEFAULT_PORT_GOSSIP: &str = "8512";

pub const DEFAULT_CLUSTER: &str = "murmur";
pub const DEFAULT_GOSSIP_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_NETWORK_DELAY_MS: u64 = 200;
pub const DEFAULT_EXECUTE_GOSSIP_TIME_MS: u64 = 500;

#[derive(Clone, Debug)]
pub struct Settings {
    // Name of the cluster; packets from other clusters are dropped
    pub cluster: String,

    // Stable member id; derived from the gossip address when absent
    pub member_id: Option<String>,

    // Server listen address
    pub listen_address: IpAddr,

    // UDP listen port for gossip
    pub listen_port: u16,

    // HTTP status API listen port
    pub listen_port_api: u16,

    // Gossip configuration
    pub gossip_interval_ms: u64,     // Round interval (default: 1000)
    pub network_delay_ms: u64,       // Estimated one-way network delay (default: 200)
    pub execute_gossip_time_ms: u64, // Estimated cost of handling one round (default: 500)

    // Bootstrap members
    pub seed_members: Vec<SocketAddr>,

    // Rounds a member may stay DOWN before it is purged (None = never)
    pub delete_threshold: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cluster: DEFAULT_CLUSTER.to_string(),
            member_id: None,
            listen_address: IpAddr::from([127, 0, 0, 1]),
            listen_port: STANDARD_PORT_GOSSIP,
            listen_port_api: STANDARD_PORT_HTTP,
            gossip_interval_ms: DEFAULT_GOSSIP_INTERVAL_MS,
            network_delay_ms: DEFAULT_NETWORK_DELAY_MS,
            execute_gossip_time_ms: DEFAULT_EXECUTE_GOSSIP_TIME_MS,
            seed_members: Vec::new(),
            delete_threshold: None,
        }
    }
}

impl Settings {
    pub fn gossip_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.listen_port)
    }

    pub fn api_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.listen_port_api)
    }

    pub fn gossip_interval(&self) -> Duration {
        Duration::from_millis(self.gossip_interval_ms)
    }

    pub fn member_id(&self) -> String {
        match &self.member_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => generate_member_id(self.gossip_addr()),
        }
    }

    pub fn is_seed(&self, addr: SocketAddr) -> bool {
        self.seed_members.contains(&addr)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cluster.trim().is_empty() {
            return Err(crate::config_error!("cluster name must not be empty"));
        }
        if self.gossip_interval_ms == 0 {
            return Err(crate::config_error!("gossip interval must be positive"));
        }
        if self.delete_threshold == Some(0) {
            return Err(crate::config_error!(
                "delete threshold must be positive when set"
            ));
        }
        Ok(())
    }
}

/// Derive a stable member id from a gossip address
pub fn generate_member_id(addr: SocketAddr) -> String {
    let mut s = std::collections::hash_map::DefaultHasher::new();
    addr.hash(&mut s);
    format!("{:08x}", s.finish() as u32)
}
