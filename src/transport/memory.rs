//! In-process transport for simulations and tests.
//!
//! Every transport created from the same `MemoryNetwork` can reach the
//! others by address. Each transport records what it sent, and addresses can
//! be made unreachable to simulate partitions.
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::trace;

use super::traits::{Inbound, Transport};
use crate::error::Result;
use crate::{concurrency_error, transport_error};

const MAILBOX_SIZE: usize = 1000;

type Mailbox = mpsc::Sender<(Bytes, SocketAddr)>;

#[derive(Clone, Debug, Default)]
pub struct MemoryNetwork {
    mailboxes: Arc<DashMap<SocketAddr, Mailbox>>,
    unreachable: Arc<Mutex<HashSet<SocketAddr>>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub target: SocketAddr,
    pub data: Bytes,
}

#[derive(Debug)]
pub struct MemoryTransport {
    network: MemoryNetwork,
    addr: SocketAddr,
    listening: Mutex<Option<SocketAddr>>,
    sent: Mutex<Vec<SentMessage>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose messages appear to come from `addr`
    pub fn transport(&self, addr: SocketAddr) -> MemoryTransport {
        MemoryTransport {
            network: self.clone(),
            addr,
            listening: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Sends to `addr` fail until `set_reachable` is called
    pub fn set_unreachable(&self, addr: SocketAddr) {
        if let Ok(mut unreachable) = self.unreachable.lock() {
            unreachable.insert(addr);
        }
    }

    pub fn set_reachable(&self, addr: SocketAddr) {
        if let Ok(mut unreachable) = self.unreachable.lock() {
            unreachable.remove(&addr);
        }
    }

    fn is_unreachable(&self, addr: &SocketAddr) -> Result<bool> {
        self.unreachable
            .lock()
            .map(|set| set.contains(addr))
            .map_err(|e| concurrency_error!("Network lock poisoned: {}", e))
    }

    /// Drop the datagram silently when nobody listens or the mailbox is full
    fn deliver(&self, from: SocketAddr, to: SocketAddr, data: Bytes) {
        match self.mailboxes.get(&to) {
            Some(mailbox) => {
                if mailbox.try_send((data, from)).is_err() {
                    trace!("Mailbox of {} unavailable, dropping message", to);
                }
            }
            None => trace!("Nobody listens on {}, dropping message", to),
        }
    }
}

impl MemoryTransport {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, target: SocketAddr) -> Vec<Bytes> {
        self.sent()
            .into_iter()
            .filter(|m| m.target == target)
            .map(|m| m.data)
            .collect()
    }

    pub fn take_sent(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn listen(&self, addr: SocketAddr) -> Result<Inbound> {
        let mut listening = self
            .listening
            .lock()
            .map_err(|e| concurrency_error!("Listen lock poisoned: {}", e))?;
        if listening.is_some() {
            return Err(transport_error!("Already listening"));
        }
        if self.network.mailboxes.contains_key(&addr) {
            return Err(transport_error!("Address already in use: {}", addr));
        }
        let (tx, rx) = mpsc::channel(MAILBOX_SIZE);
        self.network.mailboxes.insert(addr, tx);
        *listening = Some(addr);
        Ok(rx)
    }

    async fn unlisten(&self) -> Result<()> {
        let listened = self
            .listening
            .lock()
            .map_err(|e| concurrency_error!("Listen lock poisoned: {}", e))?
            .take();
        if let Some(addr) = listened {
            self.network.mailboxes.remove(&addr);
        }
        Ok(())
    }

    async fn send_message(&self, target: SocketAddr, data: &[u8]) -> Result<()> {
        if self.network.is_unreachable(&target)? {
            return Err(transport_error!("{} is unreachable", target));
        }
        let data = Bytes::copy_from_slice(data);
        self.sent
            .lock()
            .map_err(|e| concurrency_error!("Sent log poisoned: {}", e))?
            .push(SentMessage {
                target,
                data: data.clone(),
            });
        self.network.deliver(self.addr, target, data);
        Ok(())
    }
}
