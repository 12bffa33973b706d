//! Receive side of the SYNC -> ACK -> ACK2 handshake, plus SHUTDOWN
use std::collections::HashSet;
use std::net::SocketAddr;

use tracing::{debug, trace};

use super::controller::GossipController;
use super::messages::{Ack2Message, AckMessage, GossipDigest, GossipMessage, GossipPacket};
use super::reconcile::apply_to_local_state;
use crate::error::{GossipError, Result};
use crate::membership::{Member, MemberEntry};

impl GossipController {
    /// Decode one datagram and act on it. Replies go to the envelope's
    /// `from` address, not to the datagram source.
    pub async fn handle_packet(&self, data: &[u8], source: SocketAddr) -> Result<()> {
        let packet = GossipPacket::deserialize(data)?;
        if packet.cluster != self.cluster() {
            return Err(GossipError::ClusterMismatch {
                expected: self.cluster().to_string(),
                received: packet.cluster,
            }
            .into());
        }
        trace!(
            "[{}] {} from {} (datagram source {})",
            self.local_member(),
            packet.message_type,
            packet.from,
            source
        );

        match packet.message()? {
            GossipMessage::Sync(digests) => self.on_sync(packet.from, digests).await,
            GossipMessage::Ack(ack) => self.on_ack(packet.from, ack).await,
            GossipMessage::Ack2(ack2) => {
                let adopted = apply_to_local_state(&self.store, ack2.endpoints);
                debug!("[{}] ACK2 from {}: adopted {} entries", self.local_member(), packet.from, adopted);
                Ok(())
            }
            GossipMessage::Shutdown(member) => self.on_shutdown(member),
        }
    }

    /// Answer a SYNC with what we want from the sender and what we know better
    async fn on_sync(&self, from: SocketAddr, digests: Vec<GossipDigest>) -> Result<()> {
        let ack = self.build_ack(digests)?;
        debug!(
            "[{}] SYNC from {}: {} olders, {} newers",
            self.local_member(),
            from,
            ack.olders.len(),
            ack.newers.len()
        );
        let data = self.encode(&GossipMessage::Ack(ack))?;
        self.send_to(from, &data).await;
        Ok(())
    }

    pub(super) fn build_ack(&self, digests: Vec<GossipDigest>) -> Result<AckMessage> {
        let mut ack = AckMessage::default();
        let mut mentioned = HashSet::new();

        for digest in digests {
            let member = digest.member(self.cluster());
            let remote = digest.heartbeat();
            match self.store.heartbeat(&member) {
                Some(local) if local.is_newer_than(&remote) => {
                    if let Some(entry) = self.store.entry(&member)? {
                        ack.newers.push(entry);
                    }
                }
                Some(local) if !remote.is_newer_than(&local) => {}
                _ => ack.olders.push(digest),
            }
            mentioned.insert(member);
        }

        ack.newers.extend(
            self.store
                .entries()?
                .into_iter()
                .filter(|entry| !mentioned.contains(&entry.member)),
        );
        Ok(ack)
    }

    /// Merge the responder's newer entries, then ship what it asked for
    async fn on_ack(&self, from: SocketAddr, ack: AckMessage) -> Result<()> {
        let adopted = apply_to_local_state(&self.store, ack.newers);

        let mut endpoints: Vec<MemberEntry> = Vec::with_capacity(ack.olders.len());
        for digest in &ack.olders {
            if let Some(entry) = self.store.entry(&digest.member(self.cluster()))? {
                endpoints.push(entry);
            }
        }
        debug!(
            "[{}] ACK from {}: adopted {}, answering with {} entries",
            self.local_member(),
            from,
            adopted,
            endpoints.len()
        );

        let data = self.encode(&GossipMessage::Ack2(Ack2Message { endpoints }))?;
        self.send_to(from, &data).await;
        Ok(())
    }

    fn on_shutdown(&self, member: Member) -> Result<()> {
        if self.store.is_local(&member) {
            return Ok(());
        }
        if !self.store.contains(&member) {
            debug!("[{}] Ignoring shutdown of unknown {}", self.local_member(), member);
            return Ok(());
        }
        debug!("[{}] {} announced shutdown", self.local_member(), member);
        self.store.mark_down(&member)
    }
}
