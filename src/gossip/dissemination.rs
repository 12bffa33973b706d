//! The periodic gossip round: refresh our heartbeat, advertise digests to a
//! live member, a dead member and possibly a seed, then run failure
//! detection.
use std::net::SocketAddr;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, trace, warn};

use super::controller::GossipController;
use super::detector::StatusReport;
use super::messages::{GossipDigest, GossipMessage};
use crate::error::Result;
use crate::membership::{now_millis, Member, MemberState};

/// What one round did; mostly interesting to tests and trace logs
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub version: u64,
    pub digests: usize,
    pub live_target: Option<Member>,
    pub undiscoverable_target: Option<Member>,
    pub seed_target: Option<SocketAddr>,
    pub status: StatusReport,
    pub expired: Vec<Member>,
}

/// Pick `members[index]`, stepping to the next member when that is `local`.
/// A list holding only `local` yields nothing.
pub fn select_target<'a>(members: &'a [Member], index: usize, local: &Member) -> Option<&'a Member> {
    let target = members.get(index)?;
    if target != local {
        return Some(target);
    }
    if members.len() <= 1 {
        return None;
    }
    members.get((index + 1) % members.len())
}

/// Same self-avoidance rule for seed addresses
pub fn select_seed(seeds: &[SocketAddr], index: usize, local: SocketAddr) -> Option<SocketAddr> {
    let target = *seeds.get(index)?;
    if target != local {
        return Some(target);
    }
    if seeds.len() <= 1 {
        return None;
    }
    seeds.get((index + 1) % seeds.len()).copied()
}

/// Seeds are always contacted while we know at most one live member; past
/// that, seed traffic shrinks as `seeds / live`.
pub fn seed_send_probability(seed_count: usize, live_count: usize) -> f64 {
    if live_count <= 1 {
        1.0
    } else {
        seed_count as f64 / live_count as f64
    }
}

fn random_index(len: usize) -> Option<usize> {
    match len {
        0 => None,
        1 => Some(0),
        n => Some(rand::thread_rng().gen_range(0..n)),
    }
}

impl GossipController {
    pub async fn run_round(&self) -> Result<RoundSummary> {
        self.run_round_at(now_millis()).await
    }

    /// One gossip round as of `now` (unix millis)
    pub async fn run_round_at(&self, now: i64) -> Result<RoundSummary> {
        let local = self.local_member().clone();
        let mut summary = RoundSummary {
            version: self.store.beat_local(now),
            ..RoundSummary::default()
        };
        trace!("[{}] Now my heartbeat version is {}", local, summary.version);

        if matches!(
            self.store.state(&local)?,
            Some(MemberState::Join) | Some(MemberState::Down)
        ) {
            self.store.mark_up(&local)?;
        }

        let digests = self.random_digests();
        summary.digests = digests.len();
        if !digests.is_empty() {
            match self.encode(&GossipMessage::Sync(digests)) {
                Ok(data) => self.disseminate(&data, &mut summary).await,
                Err(e) => warn!("[{}] Failed to encode SYNC: {}", local, e),
            }
        }

        summary.status = self.detector.check_status_at(&self.store, now);

        if let Some(threshold) = self.settings.delete_threshold {
            match self.detector.expire_dead_at(&self.store, now, threshold) {
                Ok(expired) => summary.expired = expired,
                Err(e) => warn!("[{}] Failed to expire dead members: {}", local, e),
            }
        }

        if tracing::enabled!(tracing::Level::TRACE) {
            trace!("[{}] live members: {:?}", local, self.store.live_members().unwrap_or_default());
            trace!("[{}] dead members: {:?}", local, self.store.dead_members().unwrap_or_default());
        }
        Ok(summary)
    }

    /// Every known endpoint, in random order
    fn random_digests(&self) -> Vec<GossipDigest> {
        let mut endpoints = self.store.endpoints();
        endpoints.shuffle(&mut rand::thread_rng());
        endpoints
            .iter()
            .map(|(member, heartbeat)| GossipDigest::new(member, *heartbeat))
            .collect()
    }

    async fn disseminate(&self, data: &[u8], summary: &mut RoundSummary) {
        let live = self.store.live_members().unwrap_or_else(|e| {
            warn!("[{}] Could not read live members: {}", self.local_member(), e);
            Vec::new()
        });
        let dead = self.store.dead_members().unwrap_or_else(|e| {
            warn!("[{}] Could not read dead members: {}", self.local_member(), e);
            Vec::new()
        });

        let (live_target, sent_to_seed) = self.gossip_to_live_member(data, &live).await;
        summary.live_target = live_target;
        summary.undiscoverable_target = self.gossip_to_undiscoverable_member(data, &dead).await;

        if !sent_to_seed || live.len() <= self.settings.seed_members.len() {
            summary.seed_target = self.gossip_to_seed(data, live.len()).await;
        }
    }

    /// Returns the target and whether the delivered message reached a seed
    async fn gossip_to_live_member(&self, data: &[u8], live: &[Member]) -> (Option<Member>, bool) {
        let target = match random_index(live.len())
            .and_then(|index| select_target(live, index, self.local_member()))
        {
            Some(target) => target.clone(),
            None => return (None, false),
        };
        let delivered = self.send_to(target.socket_addr(), data).await;
        let is_seed = delivered && self.settings.is_seed(target.socket_addr());
        debug!("[{}] SYNC to live member {} (seed: {})", self.local_member(), target, is_seed);
        (Some(target), is_seed)
    }

    async fn gossip_to_undiscoverable_member(&self, data: &[u8], dead: &[Member]) -> Option<Member> {
        let target = random_index(dead.len())
            .and_then(|index| select_target(dead, index, self.local_member()))?
            .clone();
        debug!("[{}] SYNC to undiscoverable member {}", self.local_member(), target);
        self.send_to(target.socket_addr(), data).await;
        Some(target)
    }

    async fn gossip_to_seed(&self, data: &[u8], live_count: usize) -> Option<SocketAddr> {
        let seeds = &self.settings.seed_members;
        let local_addr = self.settings.gossip_addr();
        if seeds.is_empty() || (seeds.len() == 1 && seeds[0] == local_addr) {
            return None;
        }

        let (index, roll) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(0..seeds.len()), rng.gen::<f64>())
        };
        if roll >= seed_send_probability(seeds.len(), live_count) {
            return None;
        }

        let target = select_seed(seeds, index, local_addr)?;
        debug!("[{}] SYNC to seed {}", self.local_member(), target);
        self.send_to(target, data).await;
        Some(target)
    }
}
