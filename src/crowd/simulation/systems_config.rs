/// Configuration initialization systems
///
/// Builds the grid-sized resources from `InitialConfig` and keeps
/// `SimConfig` and the fixed timestep in sync with it.

use bevy::prelude::*;

use crate::crowd::config::InitialConfig;
use crate::crowd::fields::{bake_cost_field, CostField, CrowdFields, ObstacleRegistry, OverlapQuery};
use crate::crowd::grid::Grid;
use crate::crowd::spatial_hash::SpatialHash;

use super::components::*;
use super::resources::*;

impl From<&InitialConfig> for SimConfig {
    fn from(config: &InitialConfig) -> Self {
        Self {
            tick_rate: tick_rate_from_config(config),
            target_move_threshold: config.target_move_threshold,
            footprint_rounding: config.footprint_rounding,
            integrate_positions: config.integrate_positions,
            neighbor_radius_cells: config.neighbor_radius_cells,
        }
    }
}

/// Grid described by `config`, or the default grid when its size is invalid.
pub fn grid_from_config(config: &InitialConfig) -> Grid {
    match Grid::new(config.grid_width, config.grid_height) {
        Ok(grid) => grid,
        Err(e) => {
            let fallback = Grid::default();
            error!(
                "[CONFIG] {}; falling back to a {}x{} grid",
                e,
                fallback.width(),
                fallback.height()
            );
            fallback
        }
    }
}

/// Tick rate described by `config`, or the default rate when it is not a
/// positive finite number.
pub fn tick_rate_from_config(config: &InitialConfig) -> f64 {
    if config.tick_rate.is_finite() && config.tick_rate > 0.0 {
        return config.tick_rate;
    }
    let fallback = SimConfig::default().tick_rate;
    error!(
        "[CONFIG] tick_rate must be positive, got {}; falling back to {} Hz",
        config.tick_rate, fallback
    );
    fallback
}

/// Seed obstacle occupancy and costs from world geometry.
///
/// Wraps [`bake_cost_field`] for the grid-sized resources in `world`. The next
/// `rebuild_fields` run re-solves against the baked costs. Returns the number
/// of blocked cells.
pub fn bake_world_geometry(world: &mut World, query: &dyn OverlapQuery, layer_mask: u32) -> usize {
    let grid = *world.resource::<Grid>();
    let blocked = world.resource_scope(|world, mut registry: Mut<ObstacleRegistry>| {
        let mut cost = world.resource_mut::<CostField>();
        bake_cost_field(&grid, &mut registry, &mut cost, query, layer_mask)
    });
    world.resource_mut::<FieldRebuildState>().mark_dirty();
    blocked
}

/// Replace the grid and every resource sized from it.
///
/// Obstacles already in the world are registered again against the new
/// grid, and the next tick re-solves the fields from scratch.
pub fn insert_field_resources(world: &mut World, grid: Grid) {
    CrowdFields::new(&grid).insert_into(world, grid);
    world.insert_resource(SpatialHash::new(&grid));
    world.insert_resource(FieldRebuildState::default());
    world.insert_resource(ObstacleFootprints::default());

    let rounding = world
        .get_resource::<SimConfig>()
        .map(|config| config.footprint_rounding)
        .unwrap_or_default();
    let mut obstacles = world.query::<(Entity, &SimPosition, &Obstacle)>();
    let existing: Vec<(Entity, Vec3, Vec2)> = obstacles
        .iter(world)
        .map(|(entity, pos, obstacle)| (entity, pos.0, obstacle.half_extents))
        .collect();

    world.resource_scope(|world, mut registry: Mut<ObstacleRegistry>| {
        let mut footprints = world.resource_mut::<ObstacleFootprints>();
        for (entity, pos, half_extents) in &existing {
            let (min, max) = rounding.cell_bounds(&grid, pos.xz(), *half_extents);
            footprints.0.insert(*entity, registry.add_obstacle(min, max));
        }
    });

    info!(
        "[CONFIG] Field resources sized for a {}x{} grid ({} obstacles re-registered)",
        grid.width(),
        grid.height(),
        existing.len()
    );
}

/// Initialize SimConfig and the fixed timestep from InitialConfig at startup.
///
/// If the configured grid differs from the one built with the plugin, every
/// field is rebuilt at the new size.
pub fn init_sim_config_from_initial(
    mut fixed_time: ResMut<Time<Fixed>>,
    mut sim_config: ResMut<SimConfig>,
    grid: Res<Grid>,
    initial_config: Option<Res<InitialConfig>>,
    mut commands: Commands,
) {
    let config = match &initial_config {
        Some(cfg) => cfg.as_ref().clone(),
        None => {
            warn!("[CONFIG] InitialConfig not found, using defaults");
            InitialConfig::default()
        }
    };

    *sim_config = SimConfig::from(&config);
    fixed_time.set_timestep_seconds(1.0 / sim_config.tick_rate);

    let configured = grid_from_config(&config);
    if configured != *grid {
        commands.queue(move |world: &mut World| insert_field_resources(world, configured));
    }

    info!(
        "[CONFIG] SimConfig initialized: {} Hz, {}x{} grid",
        sim_config.tick_rate,
        configured.width(),
        configured.height()
    );
}
