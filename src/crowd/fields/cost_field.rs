use bevy::prelude::*;
use bevy::tasks::{ComputeTaskPool, ParallelSliceMut, TaskPool};
use fixedbitset::FixedBitSet;

use super::obstacles::{Footprint, ObstacleRegistry};
use super::PAR_CHUNK_SIZE;
use crate::crowd::grid::Grid;

/// Cost of a cell no agent may enter.
pub const IMPASSABLE: u8 = u8::MAX;
/// Cost of an ordinary free cell.
pub const WALKABLE: u8 = 1;

/// Per-cell traversal cost, derived from obstacle occupancy.
///
/// A blocked cell costs [`IMPASSABLE`]; a free cell costs its terrain value,
/// which is [`WALKABLE`] unless [`CostField::set_terrain_cost`] said otherwise.
/// The field is a pure function of the [`ObstacleRegistry`] and the terrain
/// layer, so rebuilding it twice without changes gives identical bytes.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct CostField {
    costs: Vec<u8>,
    terrain: Vec<u8>,
    /// Cells whose terrain cost differs from `WALKABLE`.
    weighted_cells: usize,
}

impl CostField {
    pub fn new(grid: &Grid) -> Self {
        let cells = grid.total_cells();
        Self {
            costs: vec![WALKABLE; cells],
            terrain: vec![WALKABLE; cells],
            weighted_cells: 0,
        }
    }

    pub fn costs(&self) -> &[u8] {
        &self.costs
    }

    pub fn cost(&self, cell: usize) -> u8 {
        self.costs[cell]
    }

    pub fn is_impassable(&self, cell: usize) -> bool {
        self.costs[cell] == IMPASSABLE
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    /// True when every free cell costs the same, which lets the integration
    /// solver use plain FIFO relaxation.
    pub fn is_uniform(&self) -> bool {
        self.weighted_cells == 0
    }

    pub fn terrain_cost(&self, cell: usize) -> u8 {
        self.terrain[cell]
    }

    /// Set the base cost a cell has while it is not blocked. Clamped to `1..=254`.
    pub fn set_terrain_cost(&mut self, cell: usize, cost: u8) {
        let cost = cost.clamp(WALKABLE, IMPASSABLE - 1);
        let previous = std::mem::replace(&mut self.terrain[cell], cost);

        match (previous == WALKABLE, cost == WALKABLE) {
            (true, false) => self.weighted_cells += 1,
            (false, true) => self.weighted_cells -= 1,
            _ => {}
        }

        if self.costs[cell] != IMPASSABLE {
            self.costs[cell] = cost;
        }
    }

    /// Recompute every cell from the registry, fanned out over the compute pool.
    pub fn rebuild_all(&mut self, registry: &ObstacleRegistry) {
        let occupancy = registry.occupancy_slice();
        let terrain = &self.terrain;
        let pool = ComputeTaskPool::get_or_init(TaskPool::default);

        self.costs.par_chunk_map_mut(pool, PAR_CHUNK_SIZE, |chunk_index, chunk| {
            let start = chunk_index * PAR_CHUNK_SIZE;
            for (offset, cost) in chunk.iter_mut().enumerate() {
                let cell = start + offset;
                *cost = cell_cost(occupancy[cell], terrain[cell]);
            }
        });
    }

    /// Recompute only the cells in `dirty`. Returns how many costs changed.
    pub fn rebuild_dirty(&mut self, registry: &ObstacleRegistry, dirty: &FixedBitSet) -> usize {
        let mut changed = 0;
        for cell in dirty.ones() {
            if cell >= self.costs.len() {
                continue;
            }
            let cost = cell_cost(registry.occupancy(cell), self.terrain[cell]);
            if self.costs[cell] != cost {
                self.costs[cell] = cost;
                changed += 1;
            }
        }
        changed
    }

    /// Reopen cells of a just-removed obstacle.
    ///
    /// A cell is reset to its walkable cost only when its occupancy is now zero
    /// *and* it currently holds [`IMPASSABLE`]; anything else is left alone.
    /// Returns the number of reopened cells. This does not re-solve the
    /// integration or flow fields.
    pub fn reconcile_footprint(
        &mut self,
        grid: &Grid,
        registry: &ObstacleRegistry,
        footprint: &Footprint,
    ) -> usize {
        let mut reopened = 0;
        for cell in footprint.cells(grid) {
            if registry.occupancy(cell) == 0 && self.costs[cell] == IMPASSABLE {
                self.costs[cell] = self.terrain[cell];
                reopened += 1;
            }
        }
        reopened
    }
}

fn cell_cost(occupancy: u16, terrain: u8) -> u8 {
    if occupancy > 0 {
        IMPASSABLE
    } else {
        terrain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(w: usize, h: usize) -> (Grid, ObstacleRegistry, CostField) {
        let grid = Grid::new(w, h).unwrap();
        let registry = ObstacleRegistry::new(&grid);
        let cost = CostField::new(&grid);
        (grid, registry, cost)
    }

    #[test]
    fn test_new_field_is_walkable() {
        let (_, _, cost) = setup(4, 3);
        assert_eq!(cost.len(), 12);
        assert!(cost.costs().iter().all(|&c| c == WALKABLE));
        assert!(cost.is_uniform());
    }

    #[test]
    fn test_rebuild_all_marks_blocked_cells() {
        let (grid, mut registry, mut cost) = setup(8, 8);
        registry.add_obstacle(IVec2::new(2, 2), IVec2::new(3, 4));
        cost.rebuild_all(&registry);

        for cell in 0..grid.total_cells() {
            let expected = if registry.is_blocked(cell) { IMPASSABLE } else { WALKABLE };
            assert_eq!(cost.cost(cell), expected, "cell {}", cell);
        }
        assert_eq!(cost.costs().iter().filter(|&&c| c == IMPASSABLE).count(), 6);
    }

    #[test]
    fn test_rebuild_dirty_matches_rebuild_all() {
        let (_, mut registry, mut incremental) = setup(16, 16);
        let mut full = incremental.clone();

        registry.add_obstacle(IVec2::new(1, 1), IVec2::new(5, 3));
        let fp = registry.add_obstacle(IVec2::new(10, 10), IVec2::new(12, 15));
        registry.remove_obstacle(&fp);
        registry.add_obstacle(IVec2::new(11, 11), IVec2::new(11, 11));

        let dirty = registry.take_dirty();
        incremental.rebuild_dirty(&registry, &dirty);
        full.rebuild_all(&registry);

        assert_eq!(incremental, full);
    }

    #[test]
    fn test_reconcile_only_reopens_cleared_walls() {
        let (grid, mut registry, mut cost) = setup(5, 5);
        let a = registry.add_obstacle(IVec2::new(0, 0), IVec2::new(2, 0));
        registry.add_obstacle(IVec2::new(2, 0), IVec2::new(2, 0));
        cost.rebuild_all(&registry);

        registry.remove_obstacle(&a);
        let reopened = cost.reconcile_footprint(&grid, &registry, &a);

        assert_eq!(reopened, 2);
        assert_eq!(cost.cost(grid.cell_index(0, 0)), WALKABLE);
        assert_eq!(cost.cost(grid.cell_index(1, 0)), WALKABLE);
        assert_eq!(cost.cost(grid.cell_index(2, 0)), IMPASSABLE, "still covered by the second obstacle");
    }

    #[test]
    fn test_reconcile_restores_terrain_cost() {
        let (grid, mut registry, mut cost) = setup(3, 3);
        let cell = grid.cell_index(1, 1);
        cost.set_terrain_cost(cell, 4);
        let fp = registry.add_obstacle(IVec2::new(1, 1), IVec2::new(1, 1));
        cost.rebuild_all(&registry);
        assert!(cost.is_impassable(cell));

        registry.remove_obstacle(&fp);
        cost.reconcile_footprint(&grid, &registry, &fp);
        assert_eq!(cost.cost(cell), 4);
    }

    #[test]
    fn test_terrain_cost_tracks_uniformity() {
        let (_, _, mut cost) = setup(3, 3);
        cost.set_terrain_cost(4, 7);
        assert!(!cost.is_uniform());
        assert_eq!(cost.cost(4), 7);
        cost.set_terrain_cost(4, 0);
        assert_eq!(cost.terrain_cost(4), WALKABLE, "clamped up to walkable");
        assert!(cost.is_uniform());
        cost.set_terrain_cost(2, IMPASSABLE);
        assert_eq!(cost.terrain_cost(2), IMPASSABLE - 1, "terrain can't make a wall");
    }
}
