mod components;
mod steering;

use bevy::prelude::*;
use crate::crowd::simulation::SimSet;

// Re-export public types
pub use components::{Agent, SteeringParams};
pub use steering::{compute_forces, steer_velocity, SteeringForces};

/// Plugin that steers agents along the flow field
pub struct AgentPlugin;

impl Plugin for AgentPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            steering::apply_flow_steering.in_set(SimSet::Steering),
        );
    }
}
