use bevy::prelude::*;
use bevy::tasks::{ComputeTaskPool, ParallelSliceMut, TaskPool};

use super::integration_field::{IntegrationField, UNREACHED};
use super::PAR_CHUNK_SIZE;
use crate::crowd::grid::Grid;

/// Gradients with a squared length below this are treated as flat.
pub const FLAT_EPSILON: f32 = 1e-3;

/// Per-cell steering direction, pointing down the integration gradient.
///
/// Directions live on the grid plane: `x` is world X, `y` is world Z.
/// Every entry is either unit length or exactly zero.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct FlowField {
    grid: Grid,
    directions: Vec<Vec2>,
}

impl FlowField {
    pub fn new(grid: &Grid) -> Self {
        Self {
            grid: *grid,
            directions: vec![Vec2::ZERO; grid.total_cells()],
        }
    }

    pub fn directions(&self) -> &[Vec2] {
        &self.directions
    }

    pub fn direction(&self, cell: usize) -> Vec2 {
        self.directions[cell]
    }

    /// Direction under a world position, or `None` outside the grid.
    pub fn direction_at(&self, pos: Vec3) -> Option<Vec2> {
        self.grid.world_to_index(pos).map(|cell| self.directions[cell])
    }

    /// Recompute every direction from `integration` using central differences.
    ///
    /// Cells are independent, so the work is split into chunks on the compute pool.
    pub fn extract(&mut self, integration: &IntegrationField) {
        let grid = self.grid;
        let values = integration.values();
        let pool = ComputeTaskPool::get_or_init(TaskPool::default);

        self.directions.par_chunk_map_mut(pool, PAR_CHUNK_SIZE, |chunk_index, chunk| {
            let start = chunk_index * PAR_CHUNK_SIZE;
            for (offset, direction) in chunk.iter_mut().enumerate() {
                *direction = gradient_direction(&grid, values, start + offset);
            }
        });
    }
}

fn gradient_direction(grid: &Grid, values: &[u32], cell: usize) -> Vec2 {
    let own = values[cell];
    if own == UNREACHED {
        return Vec2::ZERO;
    }
    let (cx, cy) = grid.cell_coords(cell);

    // Missing or unreached neighbors read as flat ground.
    let sample = |dx: i32, dy: i32| -> f32 {
        let n = IVec2::new(cx as i32 + dx, cy as i32 + dy);
        if !grid.contains(n) {
            return own as f32;
        }
        match values[grid.cell_index(n.x as usize, n.y as usize)] {
            UNREACHED => own as f32,
            v => v as f32,
        }
    };

    let gradient = Vec2::new(sample(-1, 0) - sample(1, 0), sample(0, -1) - sample(0, 1));
    if gradient.length_squared() < FLAT_EPSILON {
        Vec2::ZERO
    } else {
        gradient.normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crowd::fields::CostField;

    fn solved(grid: &Grid, target: IVec2) -> IntegrationField {
        let cost = CostField::new(grid);
        let mut integration = IntegrationField::new(grid);
        integration.solve(&cost, Some(target));
        integration
    }

    #[test]
    fn test_flow_points_toward_target_in_a_row() {
        let grid = Grid::new(5, 1).unwrap();
        let integration = solved(&grid, IVec2::new(4, 0));
        let mut flow = FlowField::new(&grid);
        flow.extract(&integration);

        for x in 0..4 {
            assert_eq!(flow.direction(x), Vec2::X, "cell {}", x);
        }
    }

    #[test]
    fn test_target_cell_is_a_local_minimum() {
        let grid = Grid::new(5, 5).unwrap();
        let integration = solved(&grid, IVec2::new(2, 2));
        let mut flow = FlowField::new(&grid);
        flow.extract(&integration);

        assert_eq!(flow.direction(grid.cell_index(2, 2)), Vec2::ZERO);
    }

    #[test]
    fn test_diagonal_cells_get_diagonal_directions() {
        let grid = Grid::new(5, 5).unwrap();
        let integration = solved(&grid, IVec2::new(2, 2));
        let mut flow = FlowField::new(&grid);
        flow.extract(&integration);

        let dir = flow.direction(grid.cell_index(1, 1));
        let expected = Vec2::ONE.normalize();
        assert!((dir - expected).length() < 1e-6, "got {:?}", dir);
    }

    #[test]
    fn test_unreached_cells_have_no_direction() {
        let mut integration = IntegrationField::new(&Grid::new(3, 3).unwrap());
        let grid = *integration.grid();
        let mut registry = crate::crowd::fields::ObstacleRegistry::new(&grid);
        registry.add_obstacle(IVec2::new(0, 1), IVec2::new(2, 1));
        let mut cost = CostField::new(&grid);
        cost.rebuild_all(&registry);
        integration.solve(&cost, Some(IVec2::new(1, 0)));

        let mut flow = FlowField::new(&grid);
        flow.extract(&integration);

        for cell in 3..9 {
            assert_eq!(flow.direction(cell), Vec2::ZERO, "cell {}", cell);
        }
        // Row 0 still flows toward the target along the wall.
        assert_eq!(flow.direction(grid.cell_index(0, 0)), Vec2::X);
        assert_eq!(flow.direction(grid.cell_index(2, 0)), Vec2::NEG_X);
    }

    #[test]
    fn test_direction_at_world_position() {
        let grid = Grid::new(4, 4).unwrap();
        let integration = solved(&grid, IVec2::new(3, 1));
        let mut flow = FlowField::new(&grid);
        flow.extract(&integration);

        assert_eq!(flow.direction_at(grid.cell_to_world(0, 1)), Some(Vec2::X));
        assert_eq!(flow.direction_at(Vec3::new(50.0, 0.0, 0.0)), None);
    }
}
