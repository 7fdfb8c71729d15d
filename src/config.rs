//! Engine configuration (§6 "Configuration").
use crate::clock::LocalDuration;
use crate::engine::Role;

/// All recognized configuration options, with the defaults from the source
/// paper. Every field is optional to set explicitly; [`Config::default`]
/// matches §6 exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Initial role.
    pub role: Role,
    /// Minimum neighbor `P_ij` for that neighbor to receive a relayed
    /// message (σ).
    pub forwarding_threshold: f64,
    /// Minimum `P_ij` at which a non-replica will cache a received item in
    /// its buffer (τ).
    pub carrying_threshold: f64,
    /// Weight of the change-degree metric in `P_ij`.
    pub w_cdc: f64,
    /// Weight of the "replica in range" metric in `P_ij`.
    pub w_col: f64,
    /// TTL radius for `Ping` and local dissemination (h).
    pub neighborhood_hops: u8,
    /// TTL radius for election and role-change messages (h_r).
    pub election_neighborhood_hops: u8,
    /// How often to broadcast `Ping`.
    pub profile_delay: LocalDuration,
    /// How long to wait for a `Response` before failing a lookup.
    pub request_timeout: LocalDuration,
    /// How long without a `ReplicaAnnounce` before the replica watchdog
    /// fires.
    pub missing_replication_timeout: LocalDuration,
    /// How long a neighbor profile survives without a refreshing `Ping`.
    pub profile_timeout: LocalDuration,
    /// How long the `Collecting` election state waits for ballots.
    pub election_timeout: LocalDuration,
    /// Minimum time between two elections initiated by this node.
    pub election_cooldown: LocalDuration,
    /// Capacity of the durable replica store (component A).
    pub storage_capacity: usize,
    /// Capacity of the forwarding carry buffer (component B).
    pub buffer_capacity: usize,
    /// When a `Ping` arrives from a peer with higher `P_ij` than ours,
    /// immediately hand off the whole buffer to it and clear it.
    pub optional_carrier_forwarding: bool,
    /// Whether [`crate::lookup`] also checks the Buffer (in addition to
    /// Storage) for a self-hit before emitting any `Request`.
    pub optional_check_buffer: bool,
    /// Election fitness this node reports (§4.F: "the reference value is
    /// `0.0` with a clear extension point for richer metrics"). Tests and
    /// deployments that want a non-trivial metric set this explicitly.
    pub election_fitness: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            role: Role::NonReplicating,
            forwarding_threshold: 0.4,
            carrying_threshold: 0.6,
            w_cdc: 0.5,
            w_col: 0.5,
            neighborhood_hops: 2,
            election_neighborhood_hops: 4,
            profile_delay: LocalDuration::from_secs(6),
            request_timeout: LocalDuration::from_secs(5),
            missing_replication_timeout: LocalDuration::from_secs(5),
            profile_timeout: LocalDuration::from_secs(5),
            election_timeout: LocalDuration::from_secs(5),
            election_cooldown: LocalDuration::from_secs(1),
            storage_capacity: 16,
            buffer_capacity: 16,
            optional_carrier_forwarding: false,
            optional_check_buffer: true,
            election_fitness: 0.0,
        }
    }
}

impl Config {
    /// Clamp a weight or probability-like configuration value into `[0,1]`
    /// for use as a threshold (§4.F: "values outside [0,1] are accepted but
    /// should be clamped into that range for use as a broadcast
    /// threshold").
    pub fn clamp_unit(value: f64) -> f64 {
        value.clamp(0.0, 1.0)
    }
}
