use bevy::prelude::*;
use bevy_common_assets::ron::RonAssetPlugin;
use serde::{Deserialize, Serialize};

use crate::crowd::agent::{Agent, SteeringParams};
use crate::crowd::error::CrowdError;
use crate::crowd::fields::FootprintRounding;

pub const INITIAL_CONFIG_PATH: &str = "assets/initial_config.ron";
/// Asset path of the hot-reloadable steering tunables, relative to `assets/`.
pub const STEERING_CONFIG_PATH: &str = "steering.steering.ron";

/// Static configuration loaded once at startup. Grid size and tick rate fix
/// the size of every field, so changing them means rebuilding the world.
#[derive(Resource, Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InitialConfig {
    // Grid & timing
    pub grid_width: usize,
    pub grid_height: usize,
    pub tick_rate: f64,

    // Field maintenance
    pub target_move_threshold: f32,
    pub footprint_rounding: FootprintRounding,

    // Agents
    pub integrate_positions: bool,
    pub neighbor_radius_cells: usize,

    // Headless demo
    pub demo_agent_count: usize,
    pub demo_obstacle_count: usize,
    pub demo_ticks: u64,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            grid_width: 64,
            grid_height: 64,
            tick_rate: 30.0,
            target_move_threshold: 1.0,
            footprint_rounding: FootprintRounding::Outer,
            integrate_positions: true,
            neighbor_radius_cells: 1,
            demo_agent_count: 500,
            demo_obstacle_count: 12,
            demo_ticks: 600,
        }
    }
}

impl InitialConfig {
    /// Read and parse a RON file.
    pub fn from_file(path: &str) -> Result<Self, CrowdError> {
        let contents = std::fs::read_to_string(path).map_err(|e| CrowdError::ConfigRead {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        ron::from_str::<InitialConfig>(&contents).map_err(|e| CrowdError::ConfigParse {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Load static initial configuration synchronously, falling back to defaults.
pub fn load_initial_config(path: &str) -> InitialConfig {
    match InitialConfig::from_file(path) {
        Ok(config) => {
            info!("[CONFIG] Loaded initial config from {}", path);
            config
        }
        Err(e) => {
            error!("[CONFIG] {}", e);
            error!("[CONFIG] Using default InitialConfig");
            InitialConfig::default()
        }
    }
}

/// Steering tunables that can be hot-reloaded while the simulation runs.
#[derive(Deserialize, Serialize, Asset, TypePath, Clone, Debug)]
pub struct SteeringConfig {
    pub agents: SteeringParams,
}

#[derive(Resource)]
pub struct SteeringConfigHandle(pub Handle<SteeringConfig>);

/// Loads [`InitialConfig`] and watches the [`SteeringConfig`] asset.
///
/// Requires `AssetPlugin`.
pub struct CrowdConfigPlugin;

impl Plugin for CrowdConfigPlugin {
    fn build(&self, app: &mut App) {
        // Fields are sized from this during SimulationPlugin::build, so it
        // has to exist before Startup.
        if !app.world().contains_resource::<InitialConfig>() {
            app.insert_resource(load_initial_config(INITIAL_CONFIG_PATH));
        }

        app.add_plugins(RonAssetPlugin::<SteeringConfig>::new(&["steering.ron"]))
            .add_systems(Startup, setup_steering_config)
            .add_systems(Update, (apply_steering_config, apply_steering_to_new_agents).chain());
    }
}

/// Load runtime steering configuration asynchronously (can be hot-reloaded).
fn setup_steering_config(mut commands: Commands, asset_server: Res<AssetServer>) {
    let handle = asset_server.load(STEERING_CONFIG_PATH);
    commands.insert_resource(SteeringConfigHandle(handle));
}

/// Push loaded or edited steering tunables to every agent.
pub fn apply_steering_config(
    config_handle: Option<Res<SteeringConfigHandle>>,
    steering_configs: Res<Assets<SteeringConfig>>,
    mut events: MessageReader<AssetEvent<SteeringConfig>>,
    mut agents: Query<&mut SteeringParams, With<Agent>>,
) {
    let Some(config_handle) = config_handle else {
        return;
    };
    let id = config_handle.0.id();

    for event in events.read() {
        if !(event.is_modified(id) || event.is_loaded_with_dependencies(id)) {
            continue;
        }
        let Some(config) = steering_configs.get(&config_handle.0) else {
            continue;
        };
        let mut updated = 0;
        for mut params in agents.iter_mut() {
            *params = config.agents;
            updated += 1;
        }
        info!("[CONFIG] Steering config applied to {} agents", updated);
    }
}

/// Agents spawned after the steering config loaded start from it too.
pub fn apply_steering_to_new_agents(
    config_handle: Option<Res<SteeringConfigHandle>>,
    steering_configs: Res<Assets<SteeringConfig>>,
    mut agents: Query<&mut SteeringParams, Added<Agent>>,
) {
    let Some(config) = config_handle.and_then(|handle| steering_configs.get(&handle.0)) else {
        return;
    };
    for mut params in agents.iter_mut() {
        *params = config.agents;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_config_parses_partial_ron() {
        let config: InitialConfig = ron::from_str("(grid_width: 16, tick_rate: 20.0)").unwrap();
        assert_eq!(config.grid_width, 16);
        assert_eq!(config.grid_height, 64);
        assert_eq!(config.tick_rate, 20.0);
        assert_eq!(config.footprint_rounding, FootprintRounding::Outer);
    }

    #[test]
    fn test_rounding_parses_by_name() {
        let config: InitialConfig = ron::from_str("(footprint_rounding: Nearest)").unwrap();
        assert_eq!(config.footprint_rounding, FootprintRounding::Nearest);
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let err = InitialConfig::from_file("does/not/exist.ron").unwrap_err();
        assert!(matches!(err, CrowdError::ConfigRead { .. }));
        assert_eq!(load_initial_config("does/not/exist.ron"), InitialConfig::default());
    }

    #[test]
    fn test_bundled_configs_parse() {
        let initial = InitialConfig::from_file(INITIAL_CONFIG_PATH).unwrap();
        assert!(initial.grid_width > 0 && initial.grid_height > 0);

        let contents = std::fs::read_to_string(format!("assets/{}", STEERING_CONFIG_PATH)).unwrap();
        let steering: SteeringConfig = ron::from_str(&contents).unwrap();
        assert!(steering.agents.max_speed > 0.0);
    }

    #[test]
    fn test_new_agents_take_loaded_steering() {
        let mut app = App::new();
        app.init_resource::<Assets<SteeringConfig>>();
        let tuned = SteeringParams { max_speed: 3.5, ..default() };
        let handle = app
            .world_mut()
            .resource_mut::<Assets<SteeringConfig>>()
            .add(SteeringConfig { agents: tuned });
        app.insert_resource(SteeringConfigHandle(handle));
        app.add_systems(Update, apply_steering_to_new_agents);

        let agent = app.world_mut().spawn(Agent).id();
        app.update();

        assert_eq!(*app.world().get::<SteeringParams>(agent).unwrap(), tuned);
    }
}
