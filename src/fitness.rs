//! Delivery (`P_ij`) and election fitness calculation (§4.F).
use crate::config::Config;
use crate::engine::Role;

/// Inputs needed to compute this node's `P_ij`.
pub struct DeliveryContext<'a> {
    pub role: Role,
    pub config: &'a Config,
    /// Whether a known replica holder lies within the h-hop neighborhood.
    /// The engine approximates this as "the replica set is non-empty",
    /// since replica membership is itself only learned via hop-limited
    /// broadcast (§9: `U_cdc`/`U_col` are documented extension points).
    pub replica_in_range: bool,
}

/// Change-degree metric. The reference implementation always returns
/// `0.0`; computing a sliding-window neighbor-count change rate is the
/// extension point the spec calls out.
fn change_degree(_ctx: &DeliveryContext<'_>) -> f64 {
    0.0
}

fn replica_in_range(ctx: &DeliveryContext<'_>) -> f64 {
    if ctx.replica_in_range {
        1.0
    } else {
        0.0
    }
}

/// Compute this node's current delivery probability `P_ij`.
pub fn delivery_probability(ctx: &DeliveryContext<'_>) -> f64 {
    if ctx.role == Role::Replicating {
        return 1.0;
    }
    let u_cdc = change_degree(ctx);
    let u_col = replica_in_range(ctx);
    Config::clamp_unit(ctx.config.w_cdc * u_cdc + ctx.config.w_col * u_col)
}

/// Compute this node's election fitness. Per §4.F the algorithm doesn't
/// depend on the concrete formula, only on ties being rare; the reference
/// value is whatever [`Config::election_fitness`] was configured with.
pub fn election_fitness(config: &Config) -> f64 {
    config.election_fitness
}
