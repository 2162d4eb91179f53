/// Messages emitted by the simulation.

use bevy::prelude::*;

use crate::crowd::fields::{SolveStrategy, SolveReport};

/// Written whenever the integration and flow fields were re-solved.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldsRebuilt {
    pub tick: u64,
    pub target_cell: (usize, usize),
    pub strategy: SolveStrategy,
    pub reached_cells: usize,
}

impl FieldsRebuilt {
    pub fn from_report(tick: u64, report: &SolveReport) -> Self {
        Self {
            tick,
            target_cell: report.target,
            strategy: report.strategy,
            reached_cells: report.reached,
        }
    }
}
