use bevy::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::crowd::grid::Grid;

mod query;

/// Kinematic state of one agent, captured when the hash is populated.
///
/// Steering reads neighbors from these copies, so it never needs a second
/// query over the velocities it is writing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSnapshot {
    pub entity: Entity,
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Per-tick multi-map from grid cell to the agents standing in it.
///
/// One bucket per navigation cell; an agent lands in the cell its position
/// rounds to. The hash is rebuilt from scratch each tick in three steps:
///
/// 1. [`SpatialHash::clear`] empties every bucket.
/// 2. [`SpatialHash::insert`] stages snapshots. It takes `&self` and locks
///    only the target bucket, so a parallel query can fill the hash.
/// 3. [`SpatialHash::finalize`] sorts each bucket by entity and packs all of
///    them into one contiguous array. Reads after this point are lock-free.
///
/// Queries made before `finalize` see an empty hash.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use horde::crowd::Grid;
/// use horde::crowd::spatial_hash::{AgentSnapshot, SpatialHash};
///
/// let grid = Grid::new(10, 10).unwrap();
/// let mut hash = SpatialHash::new(&grid);
///
/// let entity = Entity::from_bits(1);
/// hash.insert(AgentSnapshot { entity, position: Vec3::ZERO, velocity: Vec3::X });
/// hash.finalize();
///
/// let cell = grid.world_to_index(Vec3::ZERO).unwrap();
/// assert_eq!(hash.query(cell).collect::<Vec<_>>(), vec![entity]);
/// ```
///
/// # Performance
///
/// - **Insert:** O(1), one uncontended lock in the common case
/// - **Finalize:** O(n log k) for k agents per bucket
/// - **Query:** O(k) over a contiguous slice
#[derive(Resource)]
pub struct SpatialHash {
    grid: Grid,
    staging: Vec<Mutex<Vec<AgentSnapshot>>>,
    /// `cell_start[c]..cell_start[c + 1]` indexes `entries` for cell `c`.
    cell_start: Vec<u32>,
    entries: Vec<AgentSnapshot>,
    skipped: AtomicUsize,
}

impl SpatialHash {
    pub fn new(grid: &Grid) -> Self {
        let cells = grid.total_cells();
        Self {
            grid: *grid,
            staging: (0..cells).map(|_| Mutex::new(Vec::new())).collect(),
            cell_start: vec![0; cells + 1],
            entries: Vec::new(),
            skipped: AtomicUsize::new(0),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Drop every entry. Bucket allocations are kept for the next tick.
    pub fn clear(&mut self) {
        for bucket in &mut self.staging {
            bucket.get_mut().unwrap_or_else(PoisonError::into_inner).clear();
        }
        self.cell_start.fill(0);
        self.entries.clear();
        *self.skipped.get_mut() = 0;
    }

    /// Stage an agent under the cell its position rounds to.
    ///
    /// Returns `false`, and counts the agent as skipped, when that cell is
    /// outside the grid.
    pub fn insert(&self, snapshot: AgentSnapshot) -> bool {
        let Some(cell) = self.grid.world_to_index(snapshot.position) else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        self.staging[cell]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(snapshot);
        true
    }

    /// Pack staged buckets into the read-only layout, sorted by entity.
    pub fn finalize(&mut self) {
        self.entries.clear();
        for (cell, bucket) in self.staging.iter_mut().enumerate() {
            let bucket = bucket.get_mut().unwrap_or_else(PoisonError::into_inner);
            bucket.sort_unstable_by_key(|snapshot| snapshot.entity);
            self.cell_start[cell] = self.entries.len() as u32;
            self.entries.append(bucket);
        }
        let cells = self.staging.len();
        self.cell_start[cells] = self.entries.len() as u32;
    }

    /// Count the total number of entries across all cells.
    pub fn total_entries(&self) -> usize {
        self.entries.len()
    }

    /// Count the number of non-empty cells.
    pub fn non_empty_cells(&self) -> usize {
        self.cell_start.windows(2).filter(|w| w[1] > w[0]).count()
    }

    /// Agents skipped since the last clear because they stood outside the grid.
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }
}
