//! Semi-probabilistic dissemination (§4.H).
use crate::collections::HashSet;
use crate::message::NodeId;
use crate::neighbors::NeighborTable;
use crate::replicas::ReplicaSet;

/// Compute the unicast recipient set for a given envelope, per §4.H:
///
/// 1. Always every peer in `replicas`.
/// 2. Plus every neighbor whose profile value is ≥ `sigma`, excluding
///    replicas (already covered) and `exclude` (the peer a relayed
///    message arrived from, so it isn't echoed straight back).
pub fn recipients(
    replicas: &ReplicaSet,
    neighbors: &NeighborTable,
    sigma: f64,
    exclude: Option<NodeId>,
) -> Vec<NodeId> {
    let replica_set: HashSet<NodeId> = replicas.iter().collect();

    let mut out: Vec<NodeId> = replica_set
        .iter()
        .copied()
        .filter(|peer| Some(*peer) != exclude)
        .collect();

    out.extend(
        neighbors
            .at_least(sigma)
            .filter(|peer| !replica_set.contains(peer) && Some(*peer) != exclude),
    );
    out
}
