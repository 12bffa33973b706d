//! UDP Transport Implementation
//!
//! One listening socket per node. Outbound datagrams leave from the
//! listening socket when it is bound, so replies reach the gossip port.
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::traits::{Inbound, Transport};
use crate::error::Result;
use crate::transport_error;

const RECEIVE_BUFFER_SIZE: usize = 65536;
const INBOUND_CHANNEL_SIZE: usize = 1000;
const RECEIVE_BACKOFF_BASE_MS: u64 = 10;
const RECEIVE_BACKOFF_MAX_MS: u64 = 1000;

/// Pause before retrying after `consecutive` failed receives
fn receive_backoff(consecutive: u32) -> Duration {
    let factor = 1u64 << consecutive.saturating_sub(1).min(16);
    Duration::from_millis(
        RECEIVE_BACKOFF_BASE_MS
            .saturating_mul(factor)
            .min(RECEIVE_BACKOFF_MAX_MS),
    )
}

/// Statistics for the transport
#[derive(Debug, Default)]
pub struct TransportStats {
    pub messages_sent: AtomicU64,
    pub send_errors: AtomicU64,
    pub messages_received: AtomicU64,
    pub receive_errors: AtomicU64,
}

#[derive(Debug, Default)]
pub struct UdpTransport {
    listener: Mutex<Option<Listening>>,
    ephemeral: Mutex<Option<Arc<UdpSocket>>>,
    stats: Arc<TransportStats>,
}

#[derive(Debug)]
struct Listening {
    socket: Arc<UdpSocket>,
    receiver: JoinHandle<()>,
}

impl UdpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    /// Bound address while listening; useful when listening on port 0
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let listener = self.listener.lock().await;
        listener
            .as_ref()
            .and_then(|l| l.socket.local_addr().ok())
    }

    async fn outbound_socket(&self, target: SocketAddr) -> Result<Arc<UdpSocket>> {
        if let Some(listening) = self.listener.lock().await.as_ref() {
            return Ok(listening.socket.clone());
        }

        let mut ephemeral = self.ephemeral.lock().await;
        if let Some(socket) = ephemeral.as_ref() {
            return Ok(socket.clone());
        }
        let local_addr: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = Arc::new(
            UdpSocket::bind(local_addr)
                .await
                .map_err(|e| transport_error!("Socket creation failed: {}", e))?,
        );
        *ephemeral = Some(socket.clone());
        Ok(socket)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn listen(&self, addr: SocketAddr) -> Result<Inbound> {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return Err(transport_error!("Already listening"));
        }

        let socket = Arc::new(
            UdpSocket::bind(addr)
                .await
                .map_err(|e| transport_error!("Failed to bind {}: {}", addr, e))?,
        );
        let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_SIZE);
        let recv_socket = socket.clone();
        let stats = self.stats.clone();

        let receiver = tokio::spawn(async move {
            let mut buf = vec![0u8; RECEIVE_BUFFER_SIZE];
            let mut consecutive_errors = 0u32;
            loop {
                match recv_socket.recv_from(&mut buf).await {
                    Ok((len, source)) => {
                        consecutive_errors = 0;
                        stats.messages_received.fetch_add(1, Ordering::Relaxed);
                        let data = Bytes::copy_from_slice(&buf[..len]);
                        if tx.send((data, source)).await.is_err() {
                            debug!("Inbound channel closed, stopping UDP receiver");
                            break;
                        }
                    }
                    Err(e) => {
                        stats.receive_errors.fetch_add(1, Ordering::Relaxed);
                        consecutive_errors = consecutive_errors.saturating_add(1);
                        let pause = receive_backoff(consecutive_errors);
                        warn!(
                            "UDP receive error ({} in a row), retrying in {}ms: {}",
                            consecutive_errors,
                            pause.as_millis(),
                            e
                        );
                        tokio::time::sleep(pause).await;
                    }
                }
            }
        });

        debug!("UDP transport listening on {}", addr);
        *listener = Some(Listening { socket, receiver });
        Ok(rx)
    }

    async fn unlisten(&self) -> Result<()> {
        if let Some(listening) = self.listener.lock().await.take() {
            listening.receiver.abort();
            debug!("UDP transport stopped listening");
        }
        Ok(())
    }

    async fn send_message(&self, target: SocketAddr, data: &[u8]) -> Result<()> {
        let socket = self.outbound_socket(target).await?;
        match socket.send_to(data, target).await {
            Ok(_) => {
                self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                error!("Failed to send UDP data to {}: {}", target, e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_backoff_grows_and_caps() {
        assert_eq!(receive_backoff(1), Duration::from_millis(10));
        assert_eq!(receive_backoff(2), Duration::from_millis(20));
        assert_eq!(receive_backoff(4), Duration::from_millis(80));
        assert_eq!(receive_backoff(8), Duration::from_millis(1000));
        assert_eq!(receive_backoff(u32::MAX), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let receiver = UdpTransport::new();
        let mut inbound = receiver
            .listen("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = receiver.local_addr().await.unwrap();

        let sender = UdpTransport::new();
        sender.send_message(addr, b"hello").await.unwrap();

        let (data, _source) = tokio::time::timeout(Duration::from_secs(2), inbound.recv())
            .await
            .expect("datagram should arrive")
            .unwrap();
        assert_eq!(&data[..], b"hello");
        assert_eq!(sender.stats().messages_sent.load(Ordering::Relaxed), 1);
        assert_eq!(receiver.stats().messages_received.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_replies_leave_from_listening_port() {
        let a = UdpTransport::new();
        let _inbound_a = a.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpTransport::new();
        let mut inbound_b = b.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();

        let a_addr = a.local_addr().await.unwrap();
        a.send_message(b.local_addr().await.unwrap(), b"ping")
            .await
            .unwrap();

        let (_, source) = tokio::time::timeout(Duration::from_secs(2), inbound_b.recv())
            .await
            .expect("datagram should arrive")
            .unwrap();
        assert_eq!(source, a_addr);
    }

    #[tokio::test]
    async fn test_listen_twice_and_unlisten() {
        let transport = UdpTransport::new();
        let _inbound = transport
            .listen("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert!(transport
            .listen("127.0.0.1:0".parse().unwrap())
            .await
            .is_err());

        transport.unlisten().await.unwrap();
        assert!(transport.local_addr().await.is_none());
        // unlisten without a listener is a no-op
        transport.unlisten().await.unwrap();
    }
}
