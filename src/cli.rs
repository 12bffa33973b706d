//! CLI for this application
//!
use std::net::{IpAddr, SocketAddr};

use crate::settings;

#[derive(Clone, Debug, clap::Parser)]
#[command(name = settings::APP_NAME, version = settings::APP_VERSION)]
pub struct Cli {
    // Cluster name
    #[clap(
        long,
        default_value = settings::DEFAULT_CLUSTER,
        env("MURMUR_CLUSTER"),
        help = "Name of the cluster to join"
    )]
    pub cluster: String,

    // Member id
    #[clap(
        long,
        env("MURMUR_MEMBER_ID"),
        help = "Stable member id (derived from the gossip address when omitted)"
    )]
    pub member_id: Option<String>,

    // Server listen address
    #[clap(
        long,
        default_value = "127.0.0.1",
        env("MURMUR_LISTEN_ADDRESS"),
        help = "IP Address to listen on"
    )]
    pub listen_address: IpAddr,

    // UDP listen port for gossip
    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_GOSSIP,
        env("MURMUR_GOSSIP_LISTEN_PORT"),
        help = "Port to bind the gossip UDP socket to"
    )]
    pub listen_port: u16,

    // HTTP API listen port
    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_HTTP,
        env("MURMUR_HTTP_LISTEN_PORT"),
        help = "Port to bind the HTTP status API to"
    )]
    pub listen_port_api: u16,

    #[clap(
        long,
        default_value = "1000",
        env("MURMUR_GOSSIP_INTERVAL_MS"),
        help = "Milliseconds between gossip rounds"
    )]
    pub gossip_interval_ms: u64,

    #[clap(
        long,
        default_value = "200",
        env("MURMUR_NETWORK_DELAY_MS"),
        help = "Estimated network delay in milliseconds"
    )]
    pub network_delay_ms: u64,

    #[clap(
        long,
        default_value = "500",
        env("MURMUR_EXECUTE_GOSSIP_TIME_MS"),
        help = "Estimated time to process one gossip round in milliseconds"
    )]
    pub execute_gossip_time_ms: u64,

    // Bootstrap members
    #[clap(
        long,
        env("MURMUR_SEEDS"),
        value_delimiter = ',',
        help = "Seed member gossip addresses (e.g., 10.0.0.1:8512,10.0.0.2:8512)"
    )]
    pub seeds: Vec<SocketAddr>,

    #[clap(
        long,
        env("MURMUR_DELETE_THRESHOLD"),
        help = "Gossip rounds a member may stay down before it is forgotten"
    )]
    pub delete_threshold: Option<u32>,
}

impl Cli {
    pub fn into_settings(self) -> settings::Settings {
        settings::Settings {
            cluster: self.cluster,
            member_id: self.member_id,
            listen_address: self.listen_address,
            listen_port: self.listen_port,
            listen_port_api: self.listen_port_api,
            gossip_interval_ms: self.gossip_interval_ms,
            network_delay_ms: self.network_delay_ms,
            execute_gossip_time_ms: self.execute_gossip_time_ms,
            seed_members: self.seeds,
            delete_threshold: self.delete_threshold,
        }
    }
}
