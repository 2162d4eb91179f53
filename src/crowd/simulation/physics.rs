/// Position integration.

use bevy::prelude::*;

use crate::crowd::agent::Agent;

use super::components::*;
use super::resources::*;

/// Apply velocity to position for every agent.
///
/// Only scheduled when `SimConfig::integrate_positions` is set.
pub fn integrate_positions(
    mut agents: Query<(&mut SimPosition, &SimVelocity), With<Agent>>,
    sim_config: Res<SimConfig>,
) {
    let delta = sim_config.tick_delta();
    agents.par_iter_mut().for_each(|(mut pos, vel)| {
        pos.0 += vel.0 * delta;
    });
}

/// Run condition for [`integrate_positions`].
pub fn positions_integrated(sim_config: Res<SimConfig>) -> bool {
    sim_config.integrate_positions
}
