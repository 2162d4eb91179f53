/// Spatial hash population.
///
/// The hash is rebuilt from scratch every tick from current agent state.

use bevy::prelude::*;
use horde_macros::profile;

use crate::crowd::agent::Agent;
use crate::crowd::spatial_hash::{AgentSnapshot, SpatialHash};
use crate::profile_log;

use super::components::*;
use super::resources::*;

/// Clear the spatial hash and refill it from every agent, in parallel.
#[profile(1)]
pub fn populate_spatial_hash(
    mut spatial_hash: ResMut<SpatialHash>,
    agents: Query<(Entity, &SimPosition, &SimVelocity), With<Agent>>,
    #[allow(unused_variables)] tick: Res<SimTick>,
) {
    spatial_hash.clear();

    let hash: &SpatialHash = &spatial_hash;
    agents.par_iter().for_each(|(entity, pos, vel)| {
        hash.insert(AgentSnapshot {
            entity,
            position: pos.0,
            velocity: vel.0,
        });
    });

    spatial_hash.finalize();

    let skipped = spatial_hash.skipped();
    if skipped > 0 {
        trace!("[SPATIAL] {} agents outside the grid were not indexed", skipped);
    }
    profile_log!(
        tick,
        "[SPATIAL] {} agents in {} cells",
        spatial_hash.total_entries(),
        spatial_hash.non_empty_cells()
    );
}
