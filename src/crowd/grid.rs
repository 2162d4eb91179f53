use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::error::CrowdError;

/// 4-connected neighbor offsets in solver order: up, down, left, right.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(0, 1), (0, -1), (-1, 0), (1, 0)];

/// The navigation grid shared by every field and the spatial hash.
///
/// Cells are one world unit. The grid is centered on the world origin: cell
/// `(0, 0)` sits at world `(-width/2, -height/2)` on the X/Z plane and a world
/// position maps to the cell whose center it rounds to.
///
/// # Lifetime
///
/// Built once at setup and never mutated. Changing size means building a new
/// `Grid` and every field that depends on it (see
/// `simulation::insert_field_resources`).
///
/// # Example
///
/// ```rust
/// use horde::crowd::Grid;
///
/// let grid = Grid::new(10, 10).unwrap();
/// assert_eq!(grid.world_to_cell(-5.0, -5.0), Some((0, 0)));
/// assert_eq!(grid.world_to_cell(0.2, 0.4), Some((5, 5)));
/// assert_eq!(grid.cell_index(3, 2), 23);
/// ```
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: usize,
    height: usize,
    offset_x: i32,
    offset_y: i32,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Result<Self, CrowdError> {
        if width == 0 || height == 0 || width > i32::MAX as usize || height > i32::MAX as usize {
            return Err(CrowdError::Configuration { width, height });
        }

        Ok(Self {
            width,
            height,
            offset_x: (width / 2) as i32,
            offset_y: (height / 2) as i32,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn total_cells(&self) -> usize {
        self.width * self.height
    }

    /// Offset added to a rounded world coordinate to get a cell coordinate.
    pub fn offset(&self) -> IVec2 {
        IVec2::new(self.offset_x, self.offset_y)
    }

    pub fn cell_index(&self, cx: usize, cy: usize) -> usize {
        cy * self.width + cx
    }

    pub fn cell_coords(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    pub fn contains(&self, cell: IVec2) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.width && (cell.y as usize) < self.height
    }

    /// Rounded cell coordinate for a world X/Z position, possibly outside the grid.
    pub fn world_to_cell_unclamped(&self, x: f32, z: f32) -> IVec2 {
        IVec2::new(x.round() as i32 + self.offset_x, z.round() as i32 + self.offset_y)
    }

    pub fn world_to_cell(&self, x: f32, z: f32) -> Option<(usize, usize)> {
        let cell = self.world_to_cell_unclamped(x, z);
        self.contains(cell).then(|| (cell.x as usize, cell.y as usize))
    }

    /// Flattened cell index under a world position; only X and Z are used.
    pub fn world_to_index(&self, pos: Vec3) -> Option<usize> {
        self.world_to_cell(pos.x, pos.z).map(|(cx, cy)| self.cell_index(cx, cy))
    }

    /// World-space center of a cell, at height zero.
    pub fn cell_to_world(&self, cx: usize, cy: usize) -> Vec3 {
        Vec3::new(
            (cx as i32 - self.offset_x) as f32,
            0.0,
            (cy as i32 - self.offset_y) as f32,
        )
    }

    pub fn center_cell(&self) -> (usize, usize) {
        (self.width / 2, self.height / 2)
    }

    pub fn clamp_cell(&self, cell: IVec2) -> (usize, usize) {
        (
            cell.x.clamp(0, self.width as i32 - 1) as usize,
            cell.y.clamp(0, self.height as i32 - 1) as usize,
        )
    }

    /// In-bounds 4-neighbors of a cell, in [`NEIGHBOR_OFFSETS`] order.
    pub fn neighbors4(&self, cx: usize, cy: usize) -> SmallVec<[(usize, usize); 4]> {
        let mut out = SmallVec::new();
        for (dx, dy) in NEIGHBOR_OFFSETS {
            let n = IVec2::new(cx as i32 + dx, cy as i32 + dy);
            if self.contains(n) {
                out.push((n.x as usize, n.y as usize));
            }
        }
        out
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            offset_x: 32,
            offset_y: 32,
        }
    }
}
