/// Core simulation systems.
///
/// This module contains systems for:
/// - Tick management
/// - Obstacle registration and release
/// - Cost, integration and flow field maintenance

use bevy::prelude::*;
use horde_macros::profile;

use crate::crowd::error::CrowdError;
use crate::crowd::fields::{CostField, FlowField, IntegrationField, ObstacleRegistry};
use crate::crowd::grid::Grid;

use super::components::*;
use super::events::*;
use super::resources::*;

// ============================================================================
// Tick Management
// ============================================================================

/// Increment the global simulation tick counter.
///
/// Runs first in FixedUpdate so every later system sees the current tick.
pub fn increment_sim_tick(mut tick: ResMut<SimTick>) {
    tick.increment();
}

// ============================================================================
// Obstacle Lifecycle
// ============================================================================

/// Release the footprints of obstacles removed or despawned since the last tick.
///
/// Cells left with no occupant are reopened in the cost field right away.
/// The integration and flow fields are only marked dirty; one re-solve later
/// in the tick covers every removal.
pub fn release_obstacles(
    mut removed: RemovedComponents<Obstacle>,
    grid: Res<Grid>,
    mut registry: ResMut<ObstacleRegistry>,
    mut cost: ResMut<CostField>,
    mut footprints: ResMut<ObstacleFootprints>,
    mut state: ResMut<FieldRebuildState>,
) {
    for entity in removed.read() {
        let Some(footprint) = footprints.0.remove(&entity) else {
            warn!("[OBSTACLES] Removed obstacle {:?} has no recorded footprint", entity);
            continue;
        };

        registry.remove_obstacle(&footprint);
        let reopened = cost.reconcile_footprint(&grid, &registry, &footprint);
        if reopened > 0 {
            state.mark_dirty();
        }
        debug!(
            "[OBSTACLES] Released {:?}: {} cells, {} reopened",
            entity,
            footprint.cell_count(),
            reopened
        );
    }
}

/// Record footprints for newly added obstacles and block their cells.
pub fn register_obstacles(
    obstacles: Query<(Entity, &SimPosition, &Obstacle), Added<Obstacle>>,
    grid: Res<Grid>,
    sim_config: Res<SimConfig>,
    mut registry: ResMut<ObstacleRegistry>,
    mut footprints: ResMut<ObstacleFootprints>,
) {
    for (entity, pos, obstacle) in obstacles.iter() {
        let (min, max) =
            sim_config
                .footprint_rounding
                .cell_bounds(&grid, pos.0.xz(), obstacle.half_extents);
        let footprint = registry.add_obstacle(min, max);

        if footprint.is_empty() {
            debug!(
                "[OBSTACLES] {:?}: {}",
                entity,
                CrowdError::OutOfBounds { x: pos.0.x, z: pos.0.z }
            );
        }
        if let Some(previous) = footprints.0.insert(entity, footprint) {
            registry.remove_obstacle(&previous);
        }
    }
}

// ============================================================================
// Field Maintenance
// ============================================================================

/// Bring the cost field up to date and re-solve the navigation fields when needed.
///
/// A re-solve happens when obstacle changes or any other write altered the
/// cost field, or when the target moved beyond
/// `SimConfig::target_move_threshold`. Without a target
/// the previous fields stay in use; the very first solve falls back to the
/// grid center so there is always a field to steer by.
#[profile(2)]
#[allow(clippy::too_many_arguments)]
pub fn rebuild_fields(
    grid: Res<Grid>,
    mut registry: ResMut<ObstacleRegistry>,
    mut cost: ResMut<CostField>,
    mut integration: ResMut<IntegrationField>,
    mut flow: ResMut<FlowField>,
    mut state: ResMut<FieldRebuildState>,
    target: Option<Res<NavTarget>>,
    sim_config: Res<SimConfig>,
    tick: Res<SimTick>,
    mut rebuilt: MessageWriter<FieldsRebuilt>,
) {
    // Writes since the last run, such as a geometry bake, bypass the dirty set.
    if cost.is_changed() {
        state.mark_dirty();
    }
    if registry.has_dirty() {
        let dirty = registry.take_dirty();
        let changed = cost.rebuild_dirty(&registry, &dirty);
        if changed > 0 {
            debug!("[FIELDS] {} cost cells changed", changed);
            state.mark_dirty();
        }
    }

    let target_pos = target.and_then(|t| t.0);
    let target_cell = match target_pos {
        Some(pos) => {
            state.missing_target_reported = false;
            let needs_solve = !state.initialized
                || state.obstacles_dirty
                || state.target_moved(pos, sim_config.target_move_threshold);
            if !needs_solve {
                return;
            }
            let cell = grid.world_to_cell_unclamped(pos.x, pos.z);
            if !grid.contains(cell) {
                debug!(
                    "[FIELDS] {}; clamping target",
                    CrowdError::OutOfBounds { x: pos.x, z: pos.z }
                );
            }
            state.solved_target = Some(pos);
            Some(cell)
        }
        None => {
            if !state.missing_target_reported {
                warn!("[FIELDS] {}", CrowdError::MissingTarget);
                state.missing_target_reported = true;
            }
            if state.initialized {
                return;
            }
            None
        }
    };

    let report = integration.solve(&cost, target_cell);
    flow.extract(&integration);

    state.initialized = true;
    state.obstacles_dirty = false;
    state.solves += 1;

    debug!(
        "[FIELDS] Solved toward {:?} ({:?}): {} of {} cells reached",
        report.target,
        report.strategy,
        report.reached,
        grid.total_cells()
    );
    rebuilt.write(FieldsRebuilt::from_report(tick.0, &report));
}
