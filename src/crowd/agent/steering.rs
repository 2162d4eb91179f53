use bevy::prelude::*;
use horde_macros::profile;

use crate::crowd::fields::{CostField, FlowField};
use crate::crowd::grid::Grid;
use crate::crowd::simulation::{SimConfig, SimPosition, SimTick, SimVelocity};
use crate::crowd::spatial_hash::{AgentSnapshot, SpatialHash};
use crate::profile_log;

use super::components::{Agent, SteeringParams};

/// Unweighted steering contributions for one agent. Every term is horizontal
/// and either unit length or zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringForces {
    pub separation: Vec3,
    pub alignment: Vec3,
    pub cohesion: Vec3,
    pub avoidance: Vec3,
    pub flow: Vec3,
    pub neighbors: usize,
}

impl SteeringForces {
    /// Desired horizontal velocity: the weighted sum, normalized, at `max_speed`.
    pub fn blend(&self, params: &SteeringParams) -> Vec3 {
        let sum = self.flow
            + self.separation * params.separation_weight
            + self.alignment * params.alignment_weight
            + self.cohesion * params.cohesion_weight
            + self.avoidance * params.avoidance_weight;
        sum.normalize_or_zero() * params.max_speed
    }
}

fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Gather the five steering terms for an agent at `position` moving at `velocity`.
///
/// `neighbors` may include the agent itself; it is skipped by entity.
#[allow(clippy::too_many_arguments)]
pub fn compute_forces<'a>(
    entity: Entity,
    position: Vec3,
    velocity: Vec3,
    params: &SteeringParams,
    neighbors: impl IntoIterator<Item = &'a AgentSnapshot>,
    grid: &Grid,
    flow: &FlowField,
    cost: &CostField,
) -> SteeringForces {
    let radius_sq = params.separation_radius * params.separation_radius;

    let mut separation = Vec3::ZERO;
    let mut velocity_sum = Vec3::ZERO;
    let mut position_sum = Vec3::ZERO;
    let mut count = 0usize;

    for other in neighbors {
        if other.entity == entity {
            continue;
        }
        // Squared compare, no sqrt.
        if position.distance_squared(other.position) >= radius_sq {
            continue;
        }
        separation += horizontal(position - other.position).normalize_or_zero();
        velocity_sum += other.velocity;
        position_sum += other.position;
        count += 1;
    }

    let (alignment, cohesion) = if count > 0 {
        let inv = 1.0 / count as f32;
        let average_velocity = velocity_sum * inv;
        let center = position_sum * inv;
        (
            horizontal(average_velocity).normalize_or_zero(),
            horizontal(center - position).normalize_or_zero(),
        )
    } else {
        (Vec3::ZERO, Vec3::ZERO)
    };

    let future = position + velocity * params.look_ahead;
    let avoidance = match grid.world_to_index(future) {
        Some(cell) if cost.is_impassable(cell) => horizontal(position - future).normalize_or_zero(),
        _ => Vec3::ZERO,
    };

    let flow_dir = flow.direction_at(position).unwrap_or(Vec2::ZERO);

    SteeringForces {
        separation,
        alignment,
        cohesion,
        avoidance,
        flow: Vec3::new(flow_dir.x, 0.0, flow_dir.y),
        neighbors: count,
    }
}

/// Blend `velocity` toward `desired` and clamp its horizontal speed.
///
/// The lerp factor is `turn_rate * dt` clamped to `[0, 1]`. Y is never touched.
pub fn steer_velocity(velocity: Vec3, desired: Vec3, params: &SteeringParams, dt: f32) -> Vec3 {
    let t = (params.turn_rate * dt).clamp(0.0, 1.0);
    let target = Vec3::new(desired.x, velocity.y, desired.z);
    let mut next = velocity.lerp(target, t);
    next.y = velocity.y;

    let flat = horizontal(next);
    if flat.length_squared() > params.max_speed * params.max_speed {
        let clamped = flat.normalize_or_zero() * params.max_speed;
        next.x = clamped.x;
        next.z = clamped.z;
    }
    next
}

/// Steer every agent inside the grid along the flow field.
///
/// Neighbors come from the snapshot taken when the spatial hash was populated
/// this tick, so each agent writes only its own velocity.
#[profile(2)]
pub(super) fn apply_flow_steering(
    mut agents: Query<(Entity, &SimPosition, &mut SimVelocity, &SteeringParams), With<Agent>>,
    hash: Res<SpatialHash>,
    grid: Res<Grid>,
    flow: Res<FlowField>,
    cost: Res<CostField>,
    sim_config: Res<SimConfig>,
    #[allow(unused_variables)] tick: Res<SimTick>,
) {
    let dt = sim_config.tick_delta();
    let radius = sim_config.neighbor_radius_cells;

    agents.par_iter_mut().for_each(|(entity, pos, mut vel, params)| {
        let Some(cell) = grid.world_to_index(pos.0) else {
            // Outside the grid: keep the previous velocity.
            return;
        };

        let forces = compute_forces(
            entity,
            pos.0,
            vel.0,
            params,
            hash.neighborhood(cell, radius),
            &grid,
            &flow,
            &cost,
        );
        let desired = forces.blend(params);
        vel.0 = steer_velocity(vel.0, desired, params, dt);
    });

    profile_log!(tick, "[STEERING] Agents: {}", agents.iter().len());
}

#[cfg(test)]
#[path = "steering_tests.rs"]
mod tests;
