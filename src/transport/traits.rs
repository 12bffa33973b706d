//! Transport trait for the gossip protocol
//!
//! Gossip only needs fire-and-forget datagrams: no delivery or ordering
//! guarantee is expected from an implementation.
use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;

/// Datagrams received on the listening address, tagged with their source
pub type Inbound = mpsc::Receiver<(Bytes, SocketAddr)>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Start receiving on `addr`
    async fn listen(&self, addr: SocketAddr) -> Result<Inbound>;

    /// Stop receiving; the inbound channel closes
    async fn unlisten(&self) -> Result<()>;

    /// Send one message to `target`
    async fn send_message(&self, target: SocketAddr, data: &[u8]) -> Result<()>;
}
