//! Election state machine (§4.I).
//!
//! This module owns only the ballot bookkeeping and the `min_election_time`
//! rate limit; it has no knowledge of the network. The engine drives it
//! with events (`trigger`, `on_election`, `on_fitness`, `decide`) and is
//! responsible for issuing the broadcasts and timers each transition
//! implies.
use crate::clock::{LocalDuration, LocalTime};
use crate::collections::HashMap;
use crate::message::NodeId;

#[derive(Debug)]
enum Phase {
    Idle,
    Collecting { votes: HashMap<NodeId, f64> },
}

/// Outcome of an `election_decide` timer firing.
#[derive(Debug)]
pub struct Decision {
    /// Whether this node won the election it was collecting for.
    pub won: bool,
    /// Every vote received during the collecting phase (for diagnostics /
    /// tests; the engine doesn't need to retain these).
    pub votes: HashMap<NodeId, f64>,
}

/// Per-node election state.
#[derive(Debug)]
pub struct Election {
    phase: Phase,
    min_election_time: LocalTime,
}

impl Default for Election {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            min_election_time: LocalTime::from_secs(0),
        }
    }
}

impl Election {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self.phase, Phase::Collecting { .. })
    }

    pub fn min_election_time(&self) -> LocalTime {
        self.min_election_time
    }

    fn enter_collecting(&mut self, now: LocalTime, cooldown: LocalDuration) {
        // §4.I: "min_election_time is the only rate-limit on election
        // initiation" and (§3 invariant 5) is monotonically non-decreasing.
        self.min_election_time = self.min_election_time.max(now + cooldown);
        self.phase = Phase::Collecting {
            votes: HashMap::default(),
        };
    }

    /// `replicas` became empty, or the replica watchdog fired. Always
    /// starts an election from Idle; a second trigger while already
    /// Collecting is ignored (one election in flight at a time).
    ///
    /// Returns whether this call started a new election (i.e. the caller
    /// should broadcast `Election`, compute and broadcast its own
    /// `Fitness`, and schedule the decide timer).
    pub fn trigger(&mut self, now: LocalTime, cooldown: LocalDuration) -> bool {
        if matches!(self.phase, Phase::Idle) {
            self.enter_collecting(now, cooldown);
            true
        } else {
            false
        }
    }

    /// An `Election` message arrived from a neighbor. Starts collecting
    /// only if currently Idle and the cooldown has elapsed; otherwise the
    /// message is dropped (already collecting, or rate-limited).
    pub fn on_election(&mut self, now: LocalTime, cooldown: LocalDuration) -> bool {
        if matches!(self.phase, Phase::Idle) && now >= self.min_election_time {
            self.enter_collecting(now, cooldown);
            true
        } else {
            false
        }
    }

    /// A `Fitness` ballot arrived. No-op unless currently Collecting.
    pub fn on_fitness(&mut self, peer: NodeId, fitness: f64) {
        if let Phase::Collecting { votes } = &mut self.phase {
            votes.insert(peer, fitness);
        }
    }

    /// The `election_decide` timer fired. Computes the winner from the
    /// votes collected so far and returns to Idle.
    ///
    /// A tie (`self_fitness == max(votes)`) is won by the incumbent
    /// (currently-Replicating node); a challenger must strictly exceed
    /// every vote to win (§4.F: "a challenger must strictly exceed the
    /// incumbent").
    pub fn decide(&mut self, self_fitness: f64, incumbent: bool) -> Decision {
        let votes = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Collecting { votes } => votes,
            Phase::Idle => HashMap::default(),
        };
        let max_vote = votes.values().copied().fold(f64::NEG_INFINITY, f64::max);
        let won = if incumbent {
            self_fitness >= max_vote
        } else {
            self_fitness > max_vote
        };
        Decision { won, votes }
    }
}
