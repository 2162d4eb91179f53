/// Resource definitions for the simulation.
///
/// Runtime configuration, the tick counter, the navigation target and the
/// bookkeeping that decides when fields must be re-solved.

use bevy::prelude::*;
use rustc_hash::FxHashMap;

use crate::crowd::fields::{Footprint, FootprintRounding};

// ============================================================================
// Simulation Configuration
// ============================================================================

/// Runtime simulation settings, copied from `InitialConfig` at startup.
#[derive(Resource, Debug, Clone)]
pub struct SimConfig {
    pub tick_rate: f64,
    /// Distance (world units) the target must move before fields are re-solved.
    pub target_move_threshold: f32,
    pub footprint_rounding: FootprintRounding,
    /// Advance positions by velocity after steering. Off when the host owns physics.
    pub integrate_positions: bool,
    /// Spatial hash block radius used for neighbor queries.
    pub neighbor_radius_cells: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30.0,
            target_move_threshold: 1.0,
            footprint_rounding: FootprintRounding::Outer,
            integrate_positions: true,
            neighbor_radius_cells: 1,
        }
    }
}

impl SimConfig {
    /// Seconds per simulation tick.
    pub fn tick_delta(&self) -> f32 {
        (1.0 / self.tick_rate) as f32
    }
}

/// Monotonic simulation tick counter, bumped at the start of every FixedUpdate.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

// ============================================================================
// Navigation Target
// ============================================================================

/// Where the crowd is heading. Set by the host; `None` means no target this tick.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq)]
pub struct NavTarget(pub Option<Vec3>);

// ============================================================================
// Field Bookkeeping
// ============================================================================

/// Decides when the integration and flow fields need a re-solve.
#[derive(Resource, Debug, Clone, Default)]
pub struct FieldRebuildState {
    /// Target position the current fields were solved for.
    pub solved_target: Option<Vec3>,
    /// Set when obstacle changes touched the cost field since the last solve.
    pub obstacles_dirty: bool,
    /// False until the first solve; that one runs even without a target.
    pub initialized: bool,
    /// Suppresses repeated missing-target warnings until a target shows up again.
    pub missing_target_reported: bool,
    pub solves: u64,
}

impl FieldRebuildState {
    pub fn mark_dirty(&mut self) {
        self.obstacles_dirty = true;
    }

    /// True when `target` is far enough from the solved target to need a new field.
    pub fn target_moved(&self, target: Vec3, threshold: f32) -> bool {
        match self.solved_target {
            Some(solved) => solved.xz().distance_squared(target.xz()) > threshold * threshold,
            None => true,
        }
    }
}

/// Footprints recorded when obstacles were registered, keyed by entity.
///
/// Removal looks the footprint up here, so it outlives the entity.
#[derive(Resource, Debug, Default)]
pub struct ObstacleFootprints(pub FxHashMap<Entity, Footprint>);
