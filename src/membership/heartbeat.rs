//! Freshness records exchanged and compared during gossip
use serde::{Deserialize, Serialize};

/// Milliseconds since the unix epoch, the unit of every heartbeat time
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A member's freshness: wall-clock time of its last self-update plus a
/// version that only the owning member increments.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatState {
    pub heartbeat_time: i64,
    pub version: u64,
}

impl HeartbeatState {
    pub fn new(heartbeat_time: i64, version: u64) -> Self {
        Self {
            heartbeat_time,
            version,
        }
    }

    /// A fresh record for the local member
    pub fn starting_at(now: i64) -> Self {
        Self::new(now, 0)
    }

    /// Refresh the owner's record; returns the new version
    pub fn beat(&mut self, now: i64) -> u64 {
        self.heartbeat_time = now;
        self.version += 1;
        self.version
    }

    /// Later heartbeat time wins; equal times fall back to the version
    pub fn is_newer_than(&self, other: &HeartbeatState) -> bool {
        self.heartbeat_time > other.heartbeat_time
            || (self.heartbeat_time == other.heartbeat_time && self.version > other.version)
    }
}

/// Suspicion bookkeeping for one member that looked stale in a round.
///
/// Alive -> Suspect(count) -> Dead: every round that still sees the same
/// heartbeat time bumps the count; a newer time drops the record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CandidateState {
    pub heartbeat_time: i64,
    pub downing_count: u32,
}

/// Outcome of feeding one stale observation into a candidate record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Suspicion {
    /// Same heartbeat time again: the count grew to this value
    Accumulated(u32),
    /// The member published something newer since suspicion began
    Cleared,
    /// Heartbeat older than the recorded one; nothing changes
    Unchanged,
}

impl CandidateState {
    pub fn new(heartbeat_time: i64) -> Self {
        Self {
            heartbeat_time,
            downing_count: 0,
        }
    }

    pub fn observe(&mut self, heartbeat: &HeartbeatState) -> Suspicion {
        if heartbeat.heartbeat_time == self.heartbeat_time {
            self.downing_count += 1;
            Suspicion::Accumulated(self.downing_count)
        } else if heartbeat.heartbeat_time > self.heartbeat_time {
            Suspicion::Cleared
        } else {
            Suspicion::Unchanged
        }
    }

    pub fn is_condemned(&self, convergence_count: u32) -> bool {
        self.downing_count >= convergence_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recency_tie_break() {
        let base = HeartbeatState::new(1_000, 5);

        // equal time, greater version wins
        assert!(HeartbeatState::new(1_000, 6).is_newer_than(&base));
        assert!(!HeartbeatState::new(1_000, 5).is_newer_than(&base));
        assert!(!HeartbeatState::new(1_000, 4).is_newer_than(&base));

        // greater time wins regardless of version
        assert!(HeartbeatState::new(1_001, 0).is_newer_than(&base));
        assert!(!HeartbeatState::new(999, 100).is_newer_than(&base));
    }

    #[test]
    fn test_beat_advances_time_and_version() {
        let mut hb = HeartbeatState::starting_at(10);
        assert_eq!(hb.beat(20), 1);
        assert_eq!(hb.beat(30), 2);
        assert_eq!(hb, HeartbeatState::new(30, 2));
    }

    #[test]
    fn test_candidate_accumulates_then_clears() {
        let stale = HeartbeatState::new(500, 3);
        let mut candidate = CandidateState::new(stale.heartbeat_time);
        assert!(!candidate.is_condemned(1));

        assert_eq!(candidate.observe(&stale), Suspicion::Accumulated(1));
        assert_eq!(candidate.observe(&stale), Suspicion::Accumulated(2));
        assert!(candidate.is_condemned(2));
        assert!(!candidate.is_condemned(3));

        assert_eq!(
            candidate.observe(&HeartbeatState::new(400, 9)),
            Suspicion::Unchanged
        );
        assert_eq!(
            candidate.observe(&HeartbeatState::new(600, 0)),
            Suspicion::Cleared
        );
    }
}
