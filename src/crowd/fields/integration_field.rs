use bevy::prelude::*;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use super::cost_field::{CostField, IMPASSABLE};
use crate::crowd::grid::Grid;

/// Integration value of a cell the wavefront never reached.
pub const UNREACHED: u32 = u32::MAX;

/// Which relaxation order produced an integration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStrategy {
    /// FIFO wavefront. Exact while every walkable cell has the same cost.
    Wavefront,
    /// Binary-heap Dijkstra, used once terrain costs vary.
    Dijkstra,
}

/// Summary of one integration solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveReport {
    pub target: (usize, usize),
    pub strategy: SolveStrategy,
    pub reached: usize,
}

/// Cost-to-target for every cell, flooded outward from the target.
///
/// # Invariants
///
/// After [`IntegrationField::solve`]:
/// - the target cell holds `0`;
/// - impassable and disconnected cells hold [`UNREACHED`];
/// - every other cell holds `min(neighbor + own cost)` over its reached
///   4-neighbors.
///
/// # Algorithm
///
/// Cost-relaxation flood fill over the 4-connected grid. With a uniform cost
/// field the FIFO queue visits cells in distance order, so it is plain BFS and
/// each cell settles the first time it is reached. A FIFO queue is *not* exact
/// once costs differ, so a non-uniform [`CostField`] switches the solver to a
/// priority queue. Both use the same relaxation step and neighbor order.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct IntegrationField {
    grid: Grid,
    values: Vec<u32>,
    target: Option<(usize, usize)>,
}

impl IntegrationField {
    pub fn new(grid: &Grid) -> Self {
        Self {
            grid: *grid,
            values: vec![UNREACHED; grid.total_cells()],
            target: None,
        }
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    pub fn value(&self, cell: usize) -> u32 {
        self.values[cell]
    }

    pub fn is_reached(&self, cell: usize) -> bool {
        self.values[cell] != UNREACHED
    }

    /// Target cell of the most recent solve, if any.
    pub fn target_cell(&self) -> Option<(usize, usize)> {
        self.target
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Flood the field from `target`.
    ///
    /// The target is clamped into the grid; `None` means the grid center.
    /// Runs sequentially: every relaxation depends on the ones before it.
    pub fn solve(&mut self, cost: &CostField, target: Option<IVec2>) -> SolveReport {
        let (tx, ty) = match target {
            Some(cell) => self.grid.clamp_cell(cell),
            None => self.grid.center_cell(),
        };
        self.target = Some((tx, ty));

        self.values.fill(UNREACHED);
        let target_idx = self.grid.cell_index(tx, ty);
        self.values[target_idx] = 0;

        let strategy = if cost.is_uniform() {
            self.flood_wavefront(cost, target_idx);
            SolveStrategy::Wavefront
        } else {
            self.flood_dijkstra(cost, target_idx);
            SolveStrategy::Dijkstra
        };

        let reached = self.values.iter().filter(|&&v| v != UNREACHED).count();
        SolveReport {
            target: (tx, ty),
            strategy,
            reached,
        }
    }

    fn flood_wavefront(&mut self, cost: &CostField, target_idx: usize) {
        let mut queue = VecDeque::new();
        queue.push_back(target_idx);

        while let Some(current) = queue.pop_front() {
            let current_value = self.values[current];
            let (cx, cy) = self.grid.cell_coords(current);

            for (nx, ny) in self.grid.neighbors4(cx, cy) {
                let n_idx = self.grid.cell_index(nx, ny);
                if let Some(candidate) = relax(current_value, cost.cost(n_idx), self.values[n_idx]) {
                    self.values[n_idx] = candidate;
                    queue.push_back(n_idx);
                }
            }
        }
    }

    fn flood_dijkstra(&mut self, cost: &CostField, target_idx: usize) {
        // Sequence number keeps equal-cost pops in insertion order.
        let mut heap = BinaryHeap::new();
        let mut sequence: u64 = 0;
        heap.push(Reverse((0u32, sequence, target_idx)));

        while let Some(Reverse((value, _, current))) = heap.pop() {
            if value > self.values[current] {
                continue; // Stale entry
            }
            let (cx, cy) = self.grid.cell_coords(current);

            for (nx, ny) in self.grid.neighbors4(cx, cy) {
                let n_idx = self.grid.cell_index(nx, ny);
                if let Some(candidate) = relax(value, cost.cost(n_idx), self.values[n_idx]) {
                    self.values[n_idx] = candidate;
                    sequence += 1;
                    heap.push(Reverse((candidate, sequence, n_idx)));
                }
            }
        }
    }
}

/// New value for a neighbor if stepping into it from `current` is an improvement.
fn relax(current: u32, neighbor_cost: u8, neighbor_value: u32) -> Option<u32> {
    if neighbor_cost == IMPASSABLE {
        return None;
    }
    let candidate = current.saturating_add(neighbor_cost as u32);
    (candidate < neighbor_value && candidate != UNREACHED).then_some(candidate)
}
