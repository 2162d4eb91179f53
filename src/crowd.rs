use bevy::prelude::*;

pub mod agent;
pub mod config;
pub mod error;
pub mod fields;
pub mod grid;
pub mod simulation;
pub mod spatial_hash;

pub use error::CrowdError;
pub use grid::Grid;

use agent::AgentPlugin;
use config::CrowdConfigPlugin;
use simulation::SimulationPlugin;

/// Ticks between periodic `profile_log!` lines.
pub const PERF_LOG_INTERVAL: u64 = 100;

/// Everything needed to run a flow-field crowd inside a Bevy app.
///
/// The host is expected to provide `MinimalPlugins` (or `DefaultPlugins`) and
/// `AssetPlugin`, since the steering tunables are a hot-reloadable asset.
/// Headless hosts and tests that don't want assets can add
/// [`SimulationPlugin`] and [`AgentPlugin`] directly.
pub struct CrowdPlugin;

impl Plugin for CrowdPlugin {
    fn build(&self, app: &mut App) {
        // Config first: SimulationPlugin sizes its fields from InitialConfig.
        app.add_plugins(CrowdConfigPlugin);
        app.add_plugins((SimulationPlugin, AgentPlugin));
        info!("[CROWD] Plugin registered");
    }
}
