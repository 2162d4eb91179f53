use bevy::prelude::*;
use bevy::tasks::{ComputeTaskPool, ParallelSliceMut, TaskPool};

use super::cost_field::CostField;
use super::obstacles::ObstacleRegistry;
use super::PAR_CHUNK_SIZE;
use crate::crowd::grid::Grid;

/// Collision layer bits understood by [`bake_cost_field`].
pub mod layers {
    pub const OBSTACLE: u32 = 1 << 7;
}

/// Radius of the probe sphere placed at each cell center.
pub const PROBE_RADIUS: f32 = 0.45;
/// Height of the probe above the ground plane.
pub const PROBE_HEIGHT: f32 = 0.1;

/// Result of one overlap probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlapHit {
    pub hit: bool,
    pub hit_count: u32,
}

impl OverlapHit {
    pub const MISS: Self = Self { hit: false, hit_count: 0 };

    pub fn count(hit_count: u32) -> Self {
        Self { hit: hit_count > 0, hit_count }
    }
}

/// World-geometry probe used to seed obstacle occupancy at bake time.
///
/// Implemented by whatever owns the collision world. Any `Fn(Vec3, f32, u32)
/// -> OverlapHit` closure works too, which is what tests use.
pub trait OverlapQuery: Send + Sync {
    fn overlaps(&self, center: Vec3, radius: f32, layer_mask: u32) -> OverlapHit;
}

impl<F> OverlapQuery for F
where
    F: Fn(Vec3, f32, u32) -> OverlapHit + Send + Sync,
{
    fn overlaps(&self, center: Vec3, radius: f32, layer_mask: u32) -> OverlapHit {
        self(center, radius, layer_mask)
    }
}

/// Probe every cell center and seed `registry` with the hit counts, then
/// rebuild `cost` from the result.
///
/// Counts from the bake share the registry's counters with later
/// add/remove calls. Returns the number of blocked cells.
pub fn bake_cost_field(
    grid: &Grid,
    registry: &mut ObstacleRegistry,
    cost: &mut CostField,
    query: &dyn OverlapQuery,
    layer_mask: u32,
) -> usize {
    let mut hits = vec![0u16; grid.total_cells()];
    let pool = ComputeTaskPool::get_or_init(TaskPool::default);

    hits.par_chunk_map_mut(pool, PAR_CHUNK_SIZE, |chunk_index, chunk| {
        let start = chunk_index * PAR_CHUNK_SIZE;
        for (offset, hit) in chunk.iter_mut().enumerate() {
            let (cx, cy) = grid.cell_coords(start + offset);
            let center = grid.cell_to_world(cx, cy) + Vec3::Y * PROBE_HEIGHT;
            let result = query.overlaps(center, PROBE_RADIUS, layer_mask);
            *hit = if result.hit {
                result.hit_count.clamp(1, u16::MAX as u32) as u16
            } else {
                0
            };
        }
    });

    for (cell, &count) in hits.iter().enumerate() {
        registry.seed_from_overlap(cell, count);
    }
    // The dirty cells are covered by the full rebuild below.
    registry.take_dirty();
    cost.rebuild_all(registry);

    let blocked = hits.iter().filter(|&&c| c > 0).count();
    info!(
        "[FIELDS] Baked cost field from geometry: {} of {} cells blocked",
        blocked,
        grid.total_cells()
    );
    blocked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crowd::fields::IMPASSABLE;

    #[test]
    fn test_bake_seeds_counts_from_query() {
        let grid = Grid::new(6, 6).unwrap();
        let mut registry = ObstacleRegistry::new(&grid);
        let mut cost = CostField::new(&grid);

        // Two overlapping shapes over world x in [-1, 0], one over z = 2.
        let query = |center: Vec3, _radius: f32, mask: u32| {
            assert_eq!(mask, layers::OBSTACLE);
            assert!((center.y - PROBE_HEIGHT).abs() < 1e-6);
            if (-1.0..=0.0).contains(&center.x) && center.z == 0.0 {
                OverlapHit::count(2)
            } else if center.z == 2.0 {
                OverlapHit::count(1)
            } else {
                OverlapHit::MISS
            }
        };

        let blocked = bake_cost_field(&grid, &mut registry, &mut cost, &query, layers::OBSTACLE);

        assert_eq!(blocked, 2 + 6);
        assert_eq!(registry.occupancy(grid.cell_index(2, 3)), 2);
        assert_eq!(registry.occupancy(grid.cell_index(3, 3)), 2);
        assert_eq!(registry.occupancy(grid.cell_index(0, 5)), 1);
        assert_eq!(cost.cost(grid.cell_index(3, 3)), IMPASSABLE);
        assert!(!registry.has_dirty());
    }

    #[test]
    fn test_baked_counts_compose_with_removal() {
        let grid = Grid::new(3, 3).unwrap();
        let mut registry = ObstacleRegistry::new(&grid);
        let mut cost = CostField::new(&grid);
        let query = |center: Vec3, _: f32, _: u32| {
            if center.x == 0.0 && center.z == 0.0 {
                OverlapHit::count(1)
            } else {
                OverlapHit::MISS
            }
        };
        bake_cost_field(&grid, &mut registry, &mut cost, &query, layers::OBSTACLE);

        let center = grid.cell_index(1, 1);
        let footprint = registry.add_obstacle(IVec2::new(1, 1), IVec2::new(1, 1));
        assert_eq!(registry.occupancy(center), 2);
        registry.remove_obstacle(&footprint);
        assert!(registry.is_blocked(center), "baked shape still covers the cell");
    }

    #[test]
    fn test_hit_without_count_still_blocks() {
        let grid = Grid::new(2, 2).unwrap();
        let mut registry = ObstacleRegistry::new(&grid);
        let mut cost = CostField::new(&grid);
        let query = |_: Vec3, _: f32, _: u32| OverlapHit { hit: true, hit_count: 0 };

        let blocked = bake_cost_field(&grid, &mut registry, &mut cost, &query, layers::OBSTACLE);
        assert_eq!(blocked, 4);
        assert!(cost.costs().iter().all(|&c| c == IMPASSABLE));
    }
}
