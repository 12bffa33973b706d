//! Failure Detector
//!
//! Converts heartbeat staleness into UP/DOWN decisions. The staleness
//! threshold grows with cluster size, and a stale member is only condemned
//! after as many rounds as a rumor needs to reach everyone.
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::membership::{CandidateState, HeartbeatState, Member, MemberState, MembershipStore, Suspicion};
use crate::settings::Settings;

/// What one status check changed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub suspected: Vec<Member>,
    pub recovered: Vec<Member>,
    pub condemned: Vec<Member>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FailureDetector {
    gossip_interval_ms: u64,
    network_delay_ms: u64,
    execute_gossip_time_ms: u64,
}

impl FailureDetector {
    pub fn new(gossip_interval_ms: u64, network_delay_ms: u64, execute_gossip_time_ms: u64) -> Self {
        Self {
            gossip_interval_ms,
            network_delay_ms,
            execute_gossip_time_ms,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.gossip_interval_ms,
            settings.network_delay_ms,
            settings.execute_gossip_time_ms,
        )
    }

    /// `floor(log10(n) + ln(n) + 1)`: rounds for a rumor to reach `n`
    /// members, and the stale observations needed before condemning one
    pub fn convergence_count(endpoints: usize) -> u32 {
        let n = endpoints.max(1) as f64;
        (n.log10() + n.ln() + 1.0).floor() as u32
    }

    /// Staleness threshold in milliseconds for a cluster of `endpoints`
    pub fn convicted_time(&self, endpoints: usize) -> i64 {
        let per_round = self.network_delay_ms * 3 + self.execute_gossip_time_ms;
        let threshold =
            u64::from(Self::convergence_count(endpoints)) * per_round * 2 + self.gossip_interval_ms;
        i64::try_from(threshold).unwrap_or(i64::MAX)
    }

    /// Evaluate every remote member's staleness, then condemn overdue suspects
    pub fn check_status_at(&self, store: &MembershipStore, now: i64) -> StatusReport {
        let endpoints = store.endpoint_count();
        let convicted_time = self.convicted_time(endpoints);
        let mut report = StatusReport::default();

        for (member, heartbeat) in store.endpoints() {
            if store.is_local(&member) {
                continue;
            }
            let duration = now.saturating_sub(heartbeat.heartbeat_time);
            trace!(
                "[{}] check {} heartbeat={:?} duration={} convicted_time={}",
                store.local(),
                member,
                heartbeat,
                duration,
                convicted_time
            );

            let state = match store.state(&member) {
                Ok(state) => state.unwrap_or(MemberState::Join),
                Err(e) => {
                    warn!("[{}] Could not read state of {}: {}", store.local(), member, e);
                    continue;
                }
            };

            if duration > convicted_time && state.is_alive() {
                self.downing(store, &member, &heartbeat);
                report.suspected.push(member);
            } else if duration <= convicted_time && state.is_discoverable() {
                match store.mark_up(&member) {
                    Ok(()) => report.recovered.push(member),
                    Err(e) => warn!("[{}] Failed to mark {} up: {}", store.local(), member, e),
                }
            }
        }

        report.condemned = self.check_candidates(store, endpoints);
        report
    }

    /// Record one stale observation for `member`
    fn downing(&self, store: &MembershipStore, member: &Member, heartbeat: &HeartbeatState) {
        match store.candidate(member) {
            Some(mut candidate) => match candidate.observe(heartbeat) {
                Suspicion::Accumulated(count) => {
                    debug!("[{}] {} stale for {} rounds", store.local(), member, count);
                    store.put_candidate(member.clone(), candidate);
                }
                Suspicion::Cleared => {
                    debug!("[{}] {} refreshed, suspicion cleared", store.local(), member);
                    store.remove_candidate(member);
                }
                Suspicion::Unchanged => {}
            },
            None => {
                debug!("[{}] {} is now a downing candidate", store.local(), member);
                store.put_candidate(member.clone(), CandidateState::new(heartbeat.heartbeat_time));
            }
        }
    }

    /// Condemn every suspect whose count reached the convergence count
    fn check_candidates(&self, store: &MembershipStore, endpoints: usize) -> Vec<Member> {
        let threshold = Self::convergence_count(endpoints);
        let mut condemned = Vec::new();

        for (member, candidate) in store.candidates() {
            if !candidate.is_condemned(threshold) {
                continue;
            }
            // a concurrent reconciliation may have moved it already
            let still_alive = matches!(store.state(&member), Ok(Some(MemberState::Up)));
            if !still_alive {
                store.remove_candidate(&member);
                continue;
            }
            match store.mark_down(&member) {
                Ok(()) => condemned.push(member),
                Err(e) => warn!("[{}] Failed to mark {} down: {}", store.local(), member, e),
            }
        }
        condemned
    }

    /// Forget members that stayed DOWN for `delete_threshold` more rounds
    /// than it took to condemn them
    pub fn expire_dead_at(
        &self,
        store: &MembershipStore,
        now: i64,
        delete_threshold: u32,
    ) -> Result<Vec<Member>> {
        let grace = i64::from(delete_threshold)
            .saturating_mul(i64::try_from(self.gossip_interval_ms).unwrap_or(i64::MAX));
        let limit = self
            .convicted_time(store.endpoint_count())
            .saturating_add(grace);

        let mut expired = Vec::new();
        for member in store.dead_members()? {
            let last_seen = store
                .heartbeat(&member)
                .map(|hb| hb.heartbeat_time)
                .unwrap_or(0);
            let silent_for = now.saturating_sub(last_seen);
            if silent_for > limit && store.forget(&member)? {
                info!(
                    "[{}] Expired {} after {}ms without a heartbeat",
                    store.local(),
                    member,
                    silent_for
                );
                expired.push(member);
            }
        }
        Ok(expired)
    }
}
