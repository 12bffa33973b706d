//! Anti-entropy merge of remote member entries into the local store
use tracing::{debug, error};

use crate::error::Result;
use crate::membership::{MemberEntry, MemberState, MembershipStore};

/// Adopt every remote entry that is fresher than what we hold.
///
/// A failure on one entry is logged and does not stop the rest of the batch.
/// Returns how many entries were adopted.
pub fn apply_to_local_state(store: &MembershipStore, entries: Vec<MemberEntry>) -> usize {
    let mut adopted = 0;
    for entry in entries {
        if store.is_local(&entry.member) {
            continue;
        }
        let member = entry.member.clone();
        match reconcile_entry(store, entry) {
            Ok(true) => adopted += 1,
            Ok(false) => {}
            Err(e) => error!("[{}] Failed to reconcile {}: {}", store.local(), member, e),
        }
    }
    adopted
}

fn reconcile_entry(store: &MembershipStore, entry: MemberEntry) -> Result<bool> {
    let remote_is_newer = match store.heartbeat(&entry.member) {
        Some(local) => entry.heartbeat.is_newer_than(&local),
        None => true,
    };
    if !remote_is_newer {
        return Ok(false);
    }

    debug!(
        "[{}] Adopting {} {} {:?}",
        store.local(),
        entry.member,
        entry.state,
        entry.heartbeat
    );
    match entry.state {
        MemberState::Up => store.mark_up(&entry.member)?,
        MemberState::Down => store.mark_down(&entry.member)?,
        MemberState::Join => store.ensure_known(&entry.member)?,
    }
    store.put_heartbeat(entry.member, entry.heartbeat);
    Ok(true)
}
