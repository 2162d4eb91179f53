use bevy::prelude::*;
use fixedbitset::FixedBitSet;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::crowd::error::CrowdError;
use crate::crowd::grid::Grid;

/// How a world-space obstacle box is snapped to cell coordinates.
///
/// `Outer` floors the min corner and ceils the max corner, so an obstacle
/// always covers at least every cell it touches. `Nearest` rounds both corners
/// and is tighter for boxes aligned to cell centers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FootprintRounding {
    #[default]
    Outer,
    Nearest,
}

impl FootprintRounding {
    /// Cell-space corners (inclusive, unclamped) of a world AABB on the X/Z plane.
    pub fn cell_bounds(self, grid: &Grid, center: Vec2, half_extents: Vec2) -> (IVec2, IVec2) {
        let min = center - half_extents.abs();
        let max = center + half_extents.abs();
        let (min, max) = match self {
            FootprintRounding::Outer => (min.floor(), max.ceil()),
            FootprintRounding::Nearest => (min.round(), max.round()),
        };
        let offset = grid.offset();
        (min.as_ivec2() + offset, max.as_ivec2() + offset)
    }
}

/// Clamped cell rectangle an obstacle was registered with.
///
/// Handed out by [`ObstacleRegistry::add_obstacle`] and required by
/// [`ObstacleRegistry::remove_obstacle`]. Removal always uses the recorded
/// footprint rather than recomputing it from the obstacle's current bounds,
/// so counts can't drift when an obstacle moves or the rounding changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    bounds: Option<(UVec2, UVec2)>,
}

impl Footprint {
    pub const EMPTY: Self = Self { bounds: None };

    pub fn min(&self) -> Option<UVec2> {
        self.bounds.map(|(min, _)| min)
    }

    pub fn max(&self) -> Option<UVec2> {
        self.bounds.map(|(_, max)| max)
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    pub fn cell_count(&self) -> usize {
        self.bounds.map_or(0, |(min, max)| {
            ((max.x - min.x + 1) * (max.y - min.y + 1)) as usize
        })
    }

    /// Flattened indices of every covered cell, row by row.
    pub fn cells(&self, grid: &Grid) -> impl Iterator<Item = usize> + '_ {
        let width = grid.width();
        let (min, max) = match self.bounds {
            Some(bounds) => bounds,
            // Empty ranges; yields nothing.
            None => (UVec2::ONE, UVec2::ZERO),
        };
        (min.y..=max.y).flat_map(move |y| {
            (min.x..=max.x).map(move |x| y as usize * width + x as usize)
        })
    }
}

/// Per-cell obstacle reference counts.
///
/// A cell is blocked while at least one obstacle covers it. Obstacles that
/// overlap simply stack their counts, so removing one of two overlapping
/// obstacles leaves the shared cells blocked.
///
/// Every mutation marks the touched cells dirty; the cost field consumes the
/// dirty set with [`ObstacleRegistry::take_dirty`] to update only what changed.
#[derive(Resource, Debug, Clone)]
pub struct ObstacleRegistry {
    grid: Grid,
    occupancy: Vec<u16>,
    /// Adds beyond `u16::MAX` per cell, released before the counter itself.
    saturated: FxHashMap<usize, u32>,
    dirty: FixedBitSet,
}

impl ObstacleRegistry {
    pub fn new(grid: &Grid) -> Self {
        let cells = grid.total_cells();
        Self {
            grid: *grid,
            occupancy: vec![0; cells],
            saturated: FxHashMap::default(),
            dirty: FixedBitSet::with_capacity(cells),
        }
    }

    pub fn occupancy(&self, cell: usize) -> u16 {
        self.occupancy[cell]
    }

    pub fn occupancy_slice(&self) -> &[u16] {
        &self.occupancy
    }

    pub fn is_blocked(&self, cell: usize) -> bool {
        self.occupancy[cell] > 0
    }

    /// Register an obstacle covering the inclusive cell rectangle `min..=max`.
    ///
    /// The rectangle is clamped to the grid. A rectangle lying entirely outside
    /// the grid registers nothing and returns [`Footprint::EMPTY`].
    pub fn add_obstacle(&mut self, min_cell: IVec2, max_cell: IVec2) -> Footprint {
        let Some(footprint) = self.clamp_footprint(min_cell, max_cell) else {
            debug!(
                "[OBSTACLES] Ignoring obstacle outside the grid: {:?}..={:?}",
                min_cell, max_cell
            );
            return Footprint::EMPTY;
        };

        let grid = self.grid;
        for cell in footprint.cells(&grid) {
            let count = &mut self.occupancy[cell];
            if *count == u16::MAX {
                let extra = self.saturated.entry(cell).or_default();
                if *extra == 0 {
                    warn!("[OBSTACLES] Occupancy saturated at cell {}", cell);
                }
                *extra += 1;
                continue;
            }
            *count += 1;
            self.dirty.insert(cell);
        }

        footprint
    }

    /// Release a footprint previously returned by [`Self::add_obstacle`].
    ///
    /// Returns the number of cells whose counter was already zero. Those cells
    /// are logged and left at zero; this means the caller removed something it
    /// never added.
    pub fn remove_obstacle(&mut self, footprint: &Footprint) -> usize {
        let grid = self.grid;
        let mut underflows = 0;

        for cell in footprint.cells(&grid) {
            if let Some(extra) = self.saturated.get_mut(&cell) {
                *extra -= 1;
                if *extra == 0 {
                    self.saturated.remove(&cell);
                }
                continue;
            }
            let count = &mut self.occupancy[cell];
            if *count == 0 {
                underflows += 1;
                warn!("[OBSTACLES] {}", CrowdError::OccupancyUnderflow { cell });
                continue;
            }
            *count -= 1;
            self.dirty.insert(cell);
        }

        underflows
    }

    /// Overwrite a cell's count with the number of shapes a geometric bake found there.
    pub fn seed_from_overlap(&mut self, cell: usize, hit_count: u16) {
        self.saturated.remove(&cell);
        if self.occupancy[cell] != hit_count {
            self.occupancy[cell] = hit_count;
            self.dirty.insert(cell);
        }
    }

    pub fn has_dirty(&self) -> bool {
        self.dirty.ones().next().is_some()
    }

    /// Hand the dirty set to the caller and start a fresh one.
    pub fn take_dirty(&mut self) -> FixedBitSet {
        let cells = self.occupancy.len();
        std::mem::replace(&mut self.dirty, FixedBitSet::with_capacity(cells))
    }

    fn clamp_footprint(&self, min_cell: IVec2, max_cell: IVec2) -> Option<Footprint> {
        let min = min_cell.min(max_cell);
        let max = min_cell.max(max_cell);
        let w = self.grid.width() as i32;
        let h = self.grid.height() as i32;

        if max.x < 0 || max.y < 0 || min.x >= w || min.y >= h {
            return None;
        }

        let lo = UVec2::new(min.x.clamp(0, w - 1) as u32, min.y.clamp(0, h - 1) as u32);
        let hi = UVec2::new(max.x.clamp(0, w - 1) as u32, max.y.clamp(0, h - 1) as u32);
        Some(Footprint { bounds: Some((lo, hi)) })
    }
}
