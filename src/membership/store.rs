//! Membership Store
//!
//! Authoritative in-process view of every known member: one heartbeat record
//! per member in a concurrent map, plus the live/dead classification and the
//! cached liveness states behind a single read/write lock.
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::events::GossipListener;
use super::heartbeat::{CandidateState, HeartbeatState};
use super::member::{Member, MemberState};
use crate::concurrency_error;
use crate::error::Result;

/// Full knowledge about one member, as shipped in ACK/ACK2 payloads
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct MemberEntry {
    pub member: Member,
    pub state: MemberState,
    pub heartbeat: HeartbeatState,
}

#[derive(Debug, Default)]
struct MemberViews {
    live: Vec<Member>,
    dead: Vec<Member>,
    states: HashMap<Member, MemberState>,
}

pub struct MembershipStore {
    local: Member,
    endpoints: DashMap<Member, HeartbeatState>,
    candidates: DashMap<Member, CandidateState>,
    views: RwLock<MemberViews>,
    listener: Option<Arc<dyn GossipListener>>,
}

impl std::fmt::Debug for MembershipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipStore")
            .field("local", &self.local)
            .field("endpoints", &self.endpoints.len())
            .field("candidates", &self.candidates.len())
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl MembershipStore {
    /// Register the local member in JOIN state and announce it
    pub fn new(local: Member, now: i64, listener: Option<Arc<dyn GossipListener>>) -> Self {
        let endpoints = DashMap::new();
        endpoints.insert(local.clone(), HeartbeatState::starting_at(now));

        let mut views = MemberViews::default();
        views.states.insert(local.clone(), MemberState::Join);

        let store = Self {
            local,
            endpoints,
            candidates: DashMap::new(),
            views: RwLock::new(views),
            listener,
        };
        store.fire(&store.local, MemberState::Join);
        store
    }

    pub fn local(&self) -> &Member {
        &self.local
    }

    pub fn is_local(&self, member: &Member) -> bool {
        &self.local == member
    }

    fn read_views(&self) -> Result<RwLockReadGuard<'_, MemberViews>> {
        self.views
            .read()
            .map_err(|e| concurrency_error!("Membership read lock poisoned: {}", e))
    }

    fn write_views(&self) -> Result<RwLockWriteGuard<'_, MemberViews>> {
        self.views
            .write()
            .map_err(|e| concurrency_error!("Membership write lock poisoned: {}", e))
    }

    fn fire(&self, member: &Member, state: MemberState) {
        if let Some(listener) = &self.listener {
            listener.on_gossip_event(member, state);
        }
    }

    // Endpoint map

    pub fn heartbeat(&self, member: &Member) -> Option<HeartbeatState> {
        self.endpoints.get(member).map(|hb| *hb)
    }

    pub fn put_heartbeat(&self, member: Member, heartbeat: HeartbeatState) -> Option<HeartbeatState> {
        self.endpoints.insert(member, heartbeat)
    }

    pub fn remove_heartbeat(&self, member: &Member) -> Option<HeartbeatState> {
        self.endpoints.remove(member).map(|(_, hb)| hb)
    }

    pub fn contains(&self, member: &Member) -> bool {
        self.endpoints.contains_key(member)
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Snapshot of every known member and its heartbeat
    pub fn endpoints(&self) -> Vec<(Member, HeartbeatState)> {
        self.endpoints
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Refresh the local heartbeat at the start of a round
    pub fn beat_local(&self, now: i64) -> u64 {
        self.endpoints
            .entry(self.local.clone())
            .or_insert_with(|| HeartbeatState::starting_at(now))
            .beat(now)
    }

    // Classification

    pub fn state(&self, member: &Member) -> Result<Option<MemberState>> {
        Ok(self.read_views()?.states.get(member).copied())
    }

    pub fn live_members(&self) -> Result<Vec<Member>> {
        Ok(self.read_views()?.live.clone())
    }

    pub fn dead_members(&self) -> Result<Vec<Member>> {
        Ok(self.read_views()?.dead.clone())
    }

    /// Record a first sighting as JOIN; known members keep their state
    pub fn ensure_known(&self, member: &Member) -> Result<()> {
        let mut views = self.write_views()?;
        views
            .states
            .entry(member.clone())
            .or_insert(MemberState::Join);
        Ok(())
    }

    /// Idempotent; only a DOWN -> UP transition of a remote member is announced
    pub fn mark_up(&self, member: &Member) -> Result<()> {
        let mut views = self.write_views()?;
        views.states.insert(member.clone(), MemberState::Up);
        if !views.live.contains(member) {
            views.live.push(member.clone());
        }
        self.candidates.remove(member);
        if let Some(pos) = views.dead.iter().position(|m| m == member) {
            views.dead.remove(pos);
            info!("[{}] {} is up", self.local, member);
            if !self.is_local(member) {
                self.fire(member, MemberState::Up);
            }
        }
        Ok(())
    }

    /// Idempotent on the sets, but every call announces DOWN
    pub fn mark_down(&self, member: &Member) -> Result<()> {
        let mut views = self.write_views()?;
        views.states.insert(member.clone(), MemberState::Down);
        views.live.retain(|m| m != member);
        if !views.dead.contains(member) {
            views.dead.push(member.clone());
        }
        self.candidates.remove(member);
        info!("[{}] {} is down", self.local, member);
        self.fire(member, MemberState::Down);
        Ok(())
    }

    /// Drop every trace of a member; returns whether it was known
    pub fn forget(&self, member: &Member) -> Result<bool> {
        let mut views = self.write_views()?;
        views.live.retain(|m| m != member);
        views.dead.retain(|m| m != member);
        let had_state = views.states.remove(member).is_some();
        self.candidates.remove(member);
        let had_heartbeat = self.endpoints.remove(member).is_some();
        debug!("[{}] Forgot {}", self.local, member);
        Ok(had_state || had_heartbeat)
    }

    /// Full entries for members we hold a heartbeat for
    pub fn entries(&self) -> Result<Vec<MemberEntry>> {
        let views = self.read_views()?;
        let mut entries: Vec<MemberEntry> = self
            .endpoints
            .iter()
            .map(|entry| MemberEntry {
                member: entry.key().clone(),
                state: views
                    .states
                    .get(entry.key())
                    .copied()
                    .unwrap_or(MemberState::Join),
                heartbeat: *entry.value(),
            })
            .collect();
        entries.sort_by(|a, b| a.member.cmp(&b.member));
        Ok(entries)
    }

    pub fn entry(&self, member: &Member) -> Result<Option<MemberEntry>> {
        let heartbeat = match self.heartbeat(member) {
            Some(hb) => hb,
            None => return Ok(None),
        };
        let state = self.state(member)?.unwrap_or(MemberState::Join);
        Ok(Some(MemberEntry {
            member: member.clone(),
            state,
            heartbeat,
        }))
    }

    // Suspicion records

    pub fn candidate(&self, member: &Member) -> Option<CandidateState> {
        self.candidates.get(member).map(|c| *c)
    }

    pub fn put_candidate(&self, member: Member, candidate: CandidateState) {
        self.candidates.insert(member, candidate);
    }

    pub fn remove_candidate(&self, member: &Member) -> Option<CandidateState> {
        self.candidates.remove(member).map(|(_, c)| c)
    }

    pub fn candidates(&self) -> Vec<(Member, CandidateState)> {
        self.candidates
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}
