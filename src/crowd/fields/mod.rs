/// Navigation fields.
///
/// Data flows one way, leaves first:
/// - **obstacles**: per-cell occupancy counts and the footprints that produced them
/// - **cost_field**: traversal cost per cell, derived from occupancy
/// - **integration_field**: cost-to-target, flooded from the target cell
/// - **flow_field**: unit steering direction per cell
/// - **bake**: one-off seeding of occupancy from world geometry
use bevy::prelude::*;

use crate::crowd::grid::Grid;

pub mod bake;
pub mod cost_field;
pub mod flow_field;
pub mod integration_field;
pub mod obstacles;
#[cfg(test)]
mod tests;

pub use bake::{bake_cost_field, OverlapHit, OverlapQuery};
pub use cost_field::{CostField, IMPASSABLE, WALKABLE};
pub use flow_field::FlowField;
pub use integration_field::{IntegrationField, SolveReport, SolveStrategy, UNREACHED};
pub use obstacles::{Footprint, FootprintRounding, ObstacleRegistry};

/// Cells per task when a field pass is split across the compute pool.
pub(crate) const PAR_CHUNK_SIZE: usize = 256;

/// Every grid-sized field, built together so they always agree on size.
pub struct CrowdFields {
    pub registry: ObstacleRegistry,
    pub cost: CostField,
    pub integration: IntegrationField,
    pub flow: FlowField,
}

impl CrowdFields {
    pub fn new(grid: &Grid) -> Self {
        Self {
            registry: ObstacleRegistry::new(grid),
            cost: CostField::new(grid),
            integration: IntegrationField::new(grid),
            flow: FlowField::new(grid),
        }
    }

    /// Re-solve the integration field and extract directions from it.
    pub fn resolve(&mut self, target: Option<IVec2>) -> SolveReport {
        let report = self.integration.solve(&self.cost, target);
        self.flow.extract(&self.integration);
        report
    }

    /// Replace the grid and every field resource in `world`.
    pub fn insert_into(self, world: &mut World, grid: Grid) {
        world.insert_resource(grid);
        world.insert_resource(self.registry);
        world.insert_resource(self.cost);
        world.insert_resource(self.integration);
        world.insert_resource(self.flow);
    }
}
