/// Simulation layer - the fixed-rate crowd tick.
///
/// This module is organized into:
/// - **components**: Kinematic and obstacle components
/// - **resources**: Simulation resources (config, tick, target, field bookkeeping)
/// - **events**: Messages emitted by the simulation
/// - **systems**: Tick counter, obstacle lifecycle and field maintenance
/// - **systems_spatial**: Spatial hash population
/// - **systems_config**: Sizing resources from `InitialConfig`
/// - **physics**: Position integration

use bevy::prelude::*;

use crate::crowd::config::InitialConfig;

// Module declarations
pub mod components;
pub mod events;
pub mod physics;
pub mod resources;
pub mod systems;
pub mod systems_config;
pub mod systems_spatial;

// Re-export commonly used items
pub use components::*;
pub use events::*;
pub use resources::*;
pub use systems_config::{bake_world_geometry, insert_field_resources};

// System sets for organizing execution order
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum SimSet {
    Fields,      // Obstacle bookkeeping, cost update, integration + flow re-solve
    Spatial,     // Rebuilding the spatial hash from agent positions
    Steering,    // Calculating new velocities from flow and neighbors
    Integration, // Applying velocity to position
}

/// Main simulation plugin
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        // Fields are sized up front so every system has its resources from the first tick.
        let initial = app
            .world()
            .get_resource::<InitialConfig>()
            .cloned()
            .unwrap_or_default();
        let sim_config = SimConfig::from(&initial);

        app.insert_resource(Time::<Fixed>::from_seconds(1.0 / sim_config.tick_rate));
        app.insert_resource(sim_config);
        app.init_resource::<SimTick>();
        app.init_resource::<NavTarget>();
        insert_field_resources(app.world_mut(), systems_config::grid_from_config(&initial));

        // Register events
        app.add_message::<FieldsRebuilt>();

        // Configure System Sets
        app.configure_sets(
            FixedUpdate,
            (
                SimSet::Fields,
                SimSet::Spatial,
                SimSet::Steering,
                SimSet::Integration,
            )
                .chain(),
        );

        // Startup systems
        app.add_systems(Startup, systems_config::init_sim_config_from_initial);

        // Fixed update systems
        app.add_systems(
            FixedUpdate,
            (
                // Increment tick counter first (before all other systems)
                systems::increment_sim_tick.before(SimSet::Fields),
                // Removals before additions so a re-added obstacle ends up registered.
                (
                    systems::release_obstacles,
                    systems::register_obstacles,
                    systems::rebuild_fields,
                )
                    .chain()
                    .in_set(SimSet::Fields),
                systems_spatial::populate_spatial_hash.in_set(SimSet::Spatial),
                physics::integrate_positions
                    .run_if(physics::positions_integrated)
                    .in_set(SimSet::Integration),
            ),
        );
    }
}
