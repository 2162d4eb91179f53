use bevy::prelude::*;

use super::{AgentSnapshot, SpatialHash};

impl SpatialHash {
    /// Snapshots stored in one cell. Empty for an out-of-range index.
    pub fn bucket(&self, cell: usize) -> &[AgentSnapshot] {
        if cell + 1 >= self.cell_start.len() {
            return &[];
        }
        let start = self.cell_start[cell] as usize;
        let end = self.cell_start[cell + 1] as usize;
        &self.entries[start..end]
    }

    /// Agents in one cell.
    pub fn query(&self, cell: usize) -> impl Iterator<Item = Entity> + '_ {
        self.bucket(cell).iter().map(|snapshot| snapshot.entity)
    }

    /// Snapshots across the `(2r+1)²` block of cells centered on `cell`,
    /// clipped to the grid.
    ///
    /// Buckets in one row are adjacent in memory, so each row is read as a
    /// single slice.
    pub fn neighborhood(&self, cell: usize, radius: usize) -> impl Iterator<Item = &AgentSnapshot> + '_ {
        let grid = self.grid;
        let (rows, cols) = if cell < grid.total_cells() {
            let (cx, cy) = grid.cell_coords(cell);
            (
                cy.saturating_sub(radius)..=cy.saturating_add(radius).min(grid.height() - 1),
                cx.saturating_sub(radius)..=cx.saturating_add(radius).min(grid.width() - 1),
            )
        } else {
            // Empty ranges; yields nothing.
            (1..=0, 1..=0)
        };

        rows.flat_map(move |row| {
            let first = grid.cell_index(*cols.start(), row);
            let last = grid.cell_index(*cols.end(), row);
            let start = self.cell_start[first] as usize;
            let end = self.cell_start[last + 1] as usize;
            self.entries[start..end].iter()
        })
    }

    /// Entity ids across the block around `cell`.
    ///
    /// Populates `out` instead of allocating a new Vec. Clears `out` first.
    pub fn query_neighborhood(&self, cell: usize, radius: usize, out: &mut Vec<Entity>) {
        out.clear();
        out.extend(self.neighborhood(cell, radius).map(|snapshot| snapshot.entity));
    }
}
