/// Component definitions for the simulation layer.
///
/// Kinematic state shared by agents and obstacles. Only X and Z take part in
/// grid logic; Y is carried through untouched.

use bevy::prelude::*;

// ============================================================================
// Kinematics
// ============================================================================

/// World-space position of an entity in the simulation.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct SimPosition(pub Vec3);

/// World-space velocity. Steering rewrites X and Z; Y belongs to the host.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct SimVelocity(pub Vec3);

// ============================================================================
// Obstacles
// ============================================================================

/// Axis-aligned box that blocks navigation cells while it exists.
///
/// Centered on the entity's [`SimPosition`]. The footprint is computed once
/// when the component is added; moving the entity afterwards does not move
/// the blocked cells.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
#[require(SimPosition)]
pub struct Obstacle {
    /// Half size on the X/Z plane (`x` is world X, `y` is world Z).
    pub half_extents: Vec2,
}

impl Obstacle {
    pub fn new(half_extents: Vec2) -> Self {
        Self { half_extents }
    }

    /// Square obstacle covering `size` world units per side.
    pub fn square(size: f32) -> Self {
        Self { half_extents: Vec2::splat(size * 0.5) }
    }
}
