//! Peer registry: which nodes we have agreed to talk to.
//!
//! Two sets:
//! - active:    peers currently considered connected
//! - ever_seen: every peer that has ever been active
//!
//! `active ⊆ ever_seen` always holds. Both sets sit behind one mutex so any
//! operation touching both is atomic. The lock is never held across I/O or
//! an await point; callers get snapshot copies, never the live sets.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use peerlink_core::PeerAddress;

#[derive(Debug, Default)]
struct PeerSets {
    active: HashSet<PeerAddress>,
    ever_seen: HashSet<PeerAddress>,
}

/// Both sets as of one instant, sorted for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSnapshot {
    pub active: Vec<PeerAddress>,
    pub ever_seen: Vec<PeerAddress>,
}

/// Shared handle to the peer sets. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    sets: Arc<Mutex<PeerSets>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Nothing inside the lock can leave the sets half-updated, so a poisoned
    // lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, PeerSets> {
        self.sets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a peer active. Returns true if it was not already active.
    pub fn add_peer(&self, addr: &PeerAddress) -> bool {
        let added = {
            let mut sets = self.lock();
            sets.ever_seen.insert(addr.clone());
            sets.active.insert(addr.clone())
        };
        if added {
            tracing::info!(peer = %addr, "added peer");
        }
        added
    }

    /// Drop a peer from the active set. `ever_seen` is untouched.
    /// Returns true if it was active.
    pub fn remove_active(&self, addr: &PeerAddress) -> bool {
        let removed = self.lock().active.remove(addr);
        if removed {
            tracing::info!(peer = %addr, "removed active peer");
        }
        removed
    }

    /// Clear the active set, returning what it held.
    pub fn reset_active_to_empty(&self) -> HashSet<PeerAddress> {
        let drained = std::mem::take(&mut self.lock().active);
        tracing::info!(count = drained.len(), "cleared active peers");
        drained
    }

    pub fn list_active(&self) -> HashSet<PeerAddress> {
        self.lock().active.clone()
    }

    pub fn list_ever_seen(&self) -> HashSet<PeerAddress> {
        self.lock().ever_seen.clone()
    }

    /// Both sets under a single lock acquisition.
    pub fn snapshot(&self) -> PeerSnapshot {
        let (active, ever_seen) = {
            let sets = self.lock();
            (sets.active.clone(), sets.ever_seen.clone())
        };
        let mut active: Vec<_> = active.into_iter().collect();
        let mut ever_seen: Vec<_> = ever_seen.into_iter().collect();
        active.sort();
        ever_seen.sort();
        PeerSnapshot { active, ever_seen }
    }

    pub fn is_active(&self, addr: &PeerAddress) -> bool {
        self.lock().active.contains(addr)
    }

    pub fn active_len(&self) -> usize {
        self.lock().active.len()
    }

    pub fn ever_seen_len(&self) -> usize {
        self.lock().ever_seen.len()
    }
}
