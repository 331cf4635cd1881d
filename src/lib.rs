#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Forge
//!
//! A chunked voxel world pipeline: sparse octree storage, a background job scheduler,
//! neighbour-gated terrain generation and a face-culling mesher with greedy merging.
//!
//! ## Key Modules
//!
//! * `core` - Shared resources, configuration and diagnostics
//! * `engine_state` - The engine itself: voxels, the scheduler and meshing
//!
//! ## Architecture
//!
//! The host owns an [`EngineState`](engine_state::EngineState) and ticks it once per
//! frame. Terrain generation and meshing run on the scheduler's threads; the tick collects
//! their results, applies queued gameplay edits and reports what changed through chunk
//! events. Drawing, physics and persistence belong to the host.
//!
//! ## Usage
//!
//! ```no_run
//! fn main() {
//!     if let Err(err) = voxel_forge::run() {
//!         eprintln!("{err}");
//!     }
//! }
//! ```
//!
//! `run` drives a headless session: it loads the configuration named by
//! `VOXEL_FORGE_CONFIG` (or the defaults), generates and meshes the area around the
//! origin and logs pipeline statistics.

use std::sync::Arc;
use std::time::Duration;

use cgmath::{EuclideanSpace, Point3};
use log::{info, warn};

use crate::core::config::{ConfigError, EngineConfig};
use crate::core::diagnostics::{PipelineStage, RollingTimings};
use crate::engine_state::voxels::block::BlockRegistry;
use crate::engine_state::voxels::terrain::PerlinTerrain;
use crate::engine_state::EngineState;

pub mod core;
pub mod engine_state;

/// Environment variable naming the JSON configuration file.
pub const CONFIG_ENV_VAR: &str = "VOXEL_FORGE_CONFIG";
/// How long the headless session waits for the interior to finish meshing.
const SESSION_DEADLINE: Duration = Duration::from_secs(60);
const STATS_INTERVAL: Duration = Duration::from_secs(1);
const TIMING_SAMPLES: usize = 256;

/// Reads the configuration from [`CONFIG_ENV_VAR`], or the defaults when it is unset.
pub fn load_config() -> Result<EngineConfig, ConfigError> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            EngineConfig::load(path)
        }
        None => Ok(EngineConfig::default()),
    }
}

/// Runs a headless session around the origin and logs how the pipeline performed.
pub fn run() -> Result<(), ConfigError> {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();
    info!("Logger initialized");

    let config = load_config()?;
    let radius = config.generation.load_radius;
    let timings = Arc::new(RollingTimings::new(TIMING_SAMPLES));
    let mut engine = EngineState::new(
        config.clone(),
        Arc::new(BlockRegistry::with_defaults()),
        Arc::new(PerlinTerrain::new(config.generation.seed)),
        timings.clone(),
    );

    let origin = Point3::origin();
    engine.set_focus(origin);

    // Chunks two rings in from the edge have every neighbour they need to mesh.
    let interior = (radius - 2).max(0);
    let interior_positions: Vec<Point3<i32>> = engine
        .world()
        .positions()
        .into_iter()
        .filter(|position| (position.x - origin.x).abs() <= interior && (position.z - origin.z).abs() <= interior)
        .collect();

    let started = web_time::Instant::now();
    let mut last_frame = web_time::Instant::now();
    let mut last_report = web_time::Instant::now();
    loop {
        let frame_time = last_frame.elapsed();
        last_frame = web_time::Instant::now();
        engine.tick(frame_time);
        engine.drain_events();

        let meshed = interior_positions
            .iter()
            .filter(|position| engine.chunk(**position).is_some_and(|chunk| chunk.mesh().is_some()))
            .count();
        if meshed == interior_positions.len() {
            break;
        }
        if started.elapsed() > SESSION_DEADLINE {
            warn!(
                "Stopped after {:?} with {}/{} interior chunks meshed",
                SESSION_DEADLINE,
                meshed,
                interior_positions.len()
            );
            break;
        }
        if last_report.elapsed() > STATS_INTERVAL {
            info!("{:?}", engine.stats());
            last_report = web_time::Instant::now();
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    info!("Session finished in {:?}: {:?}", started.elapsed(), engine.stats());
    for stage in [PipelineStage::Build, PipelineStage::Mesh] {
        let summary = timings.summary(stage);
        info!(
            "{:?}: {} samples, mean {:?}, max {:?}",
            stage, summary.samples, summary.mean, summary.max
        );
    }
    engine.shutdown();
    Ok(())
}
