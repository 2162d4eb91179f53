use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::crowd::simulation::{SimPosition, SimVelocity};

/// Marks an entity as a crowd agent steered by the flow field.
#[derive(Component, Debug, Clone, Copy, Default)]
#[require(SimPosition, SimVelocity, SteeringParams)]
pub struct Agent;

/// Per-agent steering tunables.
///
/// Spawned with the defaults below; a loaded `SteeringConfig` asset
/// overwrites them on every agent.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteeringParams {
    pub separation_radius: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    pub avoidance_weight: f32,
    /// Seconds of current velocity projected ahead for the avoidance probe.
    pub look_ahead: f32,
    pub max_speed: f32,
    /// Blend rate toward the desired velocity, per second.
    pub turn_rate: f32,
}

impl Default for SteeringParams {
    fn default() -> Self {
        Self {
            separation_radius: 0.8,
            separation_weight: 0.8,
            alignment_weight: 0.1,
            cohesion_weight: 1.5,
            avoidance_weight: 0.5,
            look_ahead: 0.5,
            max_speed: 1.0,
            turn_rate: 2.0,
        }
    }
}
