//! Neighbor profile table (§4.D).
use crate::clock::{LocalDuration, LocalTime};
use crate::collections::HashMap;
use crate::message::NodeId;

/// A single neighbor's last-seen delivery profile.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Profile {
    delivery: f64,
    expires_at: LocalTime,
}

/// Tracks every neighbor's most recently announced `P_ij` value, expiring
/// entries that haven't refreshed within `profile_timeout`.
#[derive(Debug, Default)]
pub struct NeighborTable {
    profiles: HashMap<NodeId, Profile>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `Ping` from `peer` announcing `delivery`, resetting its
    /// expiry to `now + timeout`.
    pub fn on_ping(&mut self, peer: NodeId, delivery: f64, now: LocalTime, timeout: LocalDuration) {
        self.profiles.insert(
            peer,
            Profile {
                delivery,
                expires_at: now + timeout,
            },
        );
    }

    /// Drop every profile whose timer has expired as of `now`.
    pub fn expire(&mut self, now: LocalTime) {
        self.profiles.retain(|_, profile| profile.expires_at > now);
    }

    /// Current profile value for `peer`, if known.
    pub fn get(&self, peer: NodeId) -> Option<f64> {
        self.profiles.get(&peer).map(|profile| profile.delivery)
    }

    /// Neighbors whose profile value is at least `threshold`.
    pub fn at_least(&self, threshold: f64) -> impl Iterator<Item = NodeId> + '_ {
        self.profiles
            .iter()
            .filter(move |(_, profile)| profile.delivery >= threshold)
            .map(|(peer, _)| *peer)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn contains(&self, peer: NodeId) -> bool {
        self.profiles.contains_key(&peer)
    }
}
