use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use rand::Rng;

use horde::crowd::agent::Agent;
use horde::crowd::config::{load_initial_config, InitialConfig, INITIAL_CONFIG_PATH};
use horde::crowd::fields::bake::layers;
use horde::crowd::fields::{IntegrationField, OverlapHit};
use horde::crowd::simulation::systems_config::tick_rate_from_config;
use horde::crowd::simulation::{
    bake_world_geometry, FieldsRebuilt, NavTarget, Obstacle, SimPosition, SimSet, SimTick, SimVelocity,
};
use horde::crowd::spatial_hash::SpatialHash;
use horde::crowd::{CrowdPlugin, Grid};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_LOG_FILTER: &str = "bevy_ecs=info,bevy_asset=warn,horde=info";
const STATS_INTERVAL: u64 = 60;

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn setup_file_logging() -> std::io::Result<String> {
    // Create logs directory if it doesn't exist
    let log_dir = PathBuf::from("logs");
    fs::create_dir_all(&log_dir)?;

    // Clean up old log files, keeping only the last 25
    cleanup_old_logs(&log_dir, 25);

    // Generate timestamped filename
    let now = chrono::Local::now();
    let log_filename = format!("horde_{}.log", now.format("%Y%m%d_%H%M%S"));
    let log_path_str = log_dir.join(&log_filename).to_string_lossy().to_string();

    let file_appender = RollingFileAppender::new(
        Rotation::NEVER, // Don't rotate during a single run
        &log_dir,
        &log_filename,
    );

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false); // No ANSI colors in file

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false);

    tracing_subscriber::registry()
        .with(log_filter())
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(log_path_str)
}

fn cleanup_old_logs(log_dir: &Path, keep_count: usize) {
    if let Ok(entries) = fs::read_dir(log_dir) {
        let mut log_files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|s| s.starts_with("horde") && s.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();

        // Sort by modified time (oldest first)
        log_files.sort_by_key(|e| e.metadata().ok().and_then(|m| m.modified().ok()));

        if log_files.len() > keep_count {
            for file in log_files.iter().take(log_files.len() - keep_count) {
                let _ = fs::remove_file(file.path());
            }
        }
    }
}

// ============================================================================
// Demo Scene
// ============================================================================

/// Bookkeeping for the headless demo run.
#[derive(Resource, Default)]
struct DemoState {
    /// Obstacle despawned halfway through to exercise cost reconciliation.
    doomed_obstacle: Option<Entity>,
    agents_spawned: usize,
}

fn spawn_demo_scene(
    mut commands: Commands,
    mut state: ResMut<DemoState>,
    config: Res<InitialConfig>,
    grid: Res<Grid>,
) {
    let mut rng = rand::rng();
    let half_w = grid.width() as f32 * 0.5 - 1.0;
    let half_h = grid.height() as f32 * 0.5 - 1.0;

    for i in 0..config.demo_obstacle_count {
        let position = Vec3::new(
            rng.random_range(-half_w * 0.6..half_w * 0.6),
            0.0,
            rng.random_range(-half_h * 0.6..half_h * 0.6),
        );
        let half_extents = Vec2::new(rng.random_range(0.5..2.0), rng.random_range(0.5..2.0));
        let entity = commands
            .spawn((Obstacle::new(half_extents), SimPosition(position)))
            .id();
        if i == 0 {
            state.doomed_obstacle = Some(entity);
        }
    }

    for _ in 0..config.demo_agent_count {
        let position = Vec3::new(
            rng.random_range(-half_w..half_w),
            0.0,
            rng.random_range(-half_h..half_h),
        );
        commands.spawn((Agent, SimPosition(position)));
    }
    state.agents_spawned = config.demo_agent_count;

    info!(
        "[DEMO] Spawned {} agents and {} obstacles on a {}x{} grid",
        config.demo_agent_count,
        config.demo_obstacle_count,
        grid.width(),
        grid.height()
    );
}

/// Bake a wall along the border of the map from a stand-in collision query.
fn bake_border_walls(world: &mut World) {
    let grid = *world.resource::<Grid>();
    let edge_x = (grid.width() / 2) as f32 - 1.0;
    let edge_z = (grid.height() / 2) as f32 - 1.0;
    let border = move |center: Vec3, _radius: f32, mask: u32| {
        let on_border = center.x <= -edge_x || center.x >= edge_x || center.z <= -edge_z || center.z >= edge_z;
        if mask & layers::OBSTACLE != 0 && on_border {
            OverlapHit::count(1)
        } else {
            OverlapHit::MISS
        }
    };
    bake_world_geometry(world, &border, layers::OBSTACLE);
}

/// Sweep the target around a circle centered on the origin.
fn move_target(tick: Res<SimTick>, grid: Res<Grid>, mut target: ResMut<NavTarget>) {
    let radius = grid.width().min(grid.height()) as f32 * 0.3;
    let angle = tick.0 as f32 * 0.005;
    target.0 = Some(Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius));
}

fn despawn_obstacle_midway(
    tick: Res<SimTick>,
    config: Res<InitialConfig>,
    mut state: ResMut<DemoState>,
    mut commands: Commands,
) {
    if tick.0 != config.demo_ticks / 2 {
        return;
    }
    if let Some(entity) = state.doomed_obstacle.take() {
        info!("[DEMO] Tick {}: despawning obstacle {:?}", tick.0, entity);
        commands.entity(entity).despawn();
    }
}

fn report_stats(
    tick: Res<SimTick>,
    config: Res<InitialConfig>,
    state: Res<DemoState>,
    agents: Query<(&SimPosition, &SimVelocity), With<Agent>>,
    target: Res<NavTarget>,
    integration: Res<IntegrationField>,
    hash: Res<SpatialHash>,
    mut rebuilt: MessageReader<FieldsRebuilt>,
    mut exit: MessageWriter<AppExit>,
) {
    for message in rebuilt.read() {
        debug!(
            "[DEMO] Tick {}: fields re-solved toward {:?} ({:?}, {} cells reached)",
            message.tick, message.target_cell, message.strategy, message.reached_cells
        );
    }

    let finished = tick.0 >= config.demo_ticks;
    if tick.0 % STATS_INTERVAL != 0 && !finished {
        return;
    }

    let count = agents.iter().len().max(1) as f32;
    let mean_speed = agents.iter().map(|(_, v)| v.0.xz().length()).sum::<f32>() / count;
    let mean_distance = target.0.map_or(0.0, |t| {
        agents.iter().map(|(p, _)| p.0.xz().distance(t.xz())).sum::<f32>() / count
    });

    info!(
        "[DEMO] Tick {}: {}/{} agents indexed, mean speed {:.2}, mean distance to target {:.2}, target cell {:?}",
        tick.0,
        hash.total_entries(),
        state.agents_spawned,
        mean_speed,
        mean_distance,
        integration.target_cell()
    );

    if finished {
        info!("[DEMO] Finished after {} ticks", tick.0);
        exit.write(AppExit::Success);
    }
}

fn main() {
    let log_file = match setup_file_logging() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Failed to set up file logging ({}), logging to stdout only", e);
            tracing_subscriber::registry()
                .with(log_filter())
                .with(fmt::layer().with_writer(std::io::stdout))
                .init();
            String::from("<stdout>")
        }
    };

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Horde crowd demo - Logging to file                      ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║  Log file: {:<45} ║", log_file);
    println!("╚══════════════════════════════════════════════════════════╝");

    let initial = load_initial_config(INITIAL_CONFIG_PATH);
    let frame = Duration::from_secs_f64(1.0 / tick_rate_from_config(&initial));

    // MinimalPlugins has no LogPlugin, so the subscriber above is the only one.
    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(frame)))
        .add_plugins(AssetPlugin::default())
        .insert_resource(initial)
        .add_plugins(CrowdPlugin)
        .init_resource::<DemoState>()
        .add_systems(Startup, (bake_border_walls, spawn_demo_scene))
        .add_systems(
            FixedUpdate,
            (
                (move_target, despawn_obstacle_midway).before(SimSet::Fields),
                report_stats.after(SimSet::Integration),
            ),
        )
        .run();
}
