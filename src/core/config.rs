//! # Engine Configuration
//!
//! Runtime knobs for the scheduler, terrain pipeline, mesher and frame budget. Every field
//! has a default so a configuration file only needs to name what it overrides:
//!
//! ```json
//! {
//!     "threading": { "mode": "Multi", "cpu_fraction": 0.75 },
//!     "generation": { "load_radius": 4 },
//!     "meshing": { "greedy": true }
//! }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating an [`EngineConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid configuration JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    /// A value parsed but is out of range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending setting.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// How the scheduler executes dequeued jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadingMode {
    /// Jobs run one after another on the scheduler's own background thread.
    Single,
    /// Jobs are fanned out across the worker pool.
    Multi,
}

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadingConfig {
    /// Mode at startup, and the highest mode adaptive threading may pick.
    pub mode: ThreadingMode,
    /// Fraction of the available CPU cores turned into pool workers.
    pub cpu_fraction: f32,
    /// Upper bound on how long the dispatch loop waits for a pending job.
    pub dequeue_wait_ms: u64,
    /// How long a finished job is kept for `try_take_finished` before being evicted.
    pub retention_ms: u64,
    /// Hard cap on the number of finished jobs held at once.
    pub max_retained_jobs: usize,
}

impl Default for ThreadingConfig {
    fn default() -> Self {
        Self {
            mode: ThreadingMode::Multi,
            cpu_fraction: 0.5,
            dequeue_wait_ms: 20,
            retention_ms: 5_000,
            max_retained_jobs: 4_096,
        }
    }
}

impl ThreadingConfig {
    /// `dequeue_wait_ms` as a duration.
    pub fn dequeue_wait(&self) -> Duration {
        Duration::from_millis(self.dequeue_wait_ms)
    }

    /// `retention_ms` as a duration.
    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }

    /// Number of pool workers derived from `cpu_fraction`, never less than one.
    pub fn worker_count(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        ((cores as f32 * self.cpu_fraction).floor() as usize).max(1)
    }
}

/// Terrain generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Seed for terrain noise and accent placement.
    pub seed: u32,
    /// Chunks loaded around the focus point, in chunk units, on every axis.
    pub load_radius: i32,
    /// When set, accents also wait for the chunks directly above and below.
    pub gate_vertical_neighbors: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            load_radius: 3,
            gate_vertical_neighbors: false,
        }
    }
}

/// Mesher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshingConfig {
    /// Merge coplanar faces into larger quads.
    pub greedy: bool,
}

impl Default for MeshingConfig {
    fn default() -> Self {
        Self { greedy: true }
    }
}

/// Per-frame time budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Time each tick may spend applying queued voxel edits.
    pub edit_budget_ms: f32,
    /// Target frame time used by the adaptive threading governor.
    pub frame_budget_ms: f32,
    /// Let the threading governor switch modes on frame time.
    pub adaptive_threading: bool,
    /// Consecutive frames on one side of the budget before the mode flips.
    pub adaptive_window: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            edit_budget_ms: 2.0,
            frame_budget_ms: 16.6,
            adaptive_threading: false,
            adaptive_window: 30,
        }
    }
}

impl FrameConfig {
    /// `edit_budget_ms` as a duration.
    pub fn edit_budget(&self) -> Duration {
        Duration::from_secs_f32(self.edit_budget_ms / 1000.0)
    }

    /// `frame_budget_ms` as a duration.
    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs_f32(self.frame_budget_ms / 1000.0)
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scheduler settings.
    pub threading: ThreadingConfig,
    /// Terrain generation settings.
    pub generation: GenerationConfig,
    /// Mesher settings.
    pub meshing: MeshingConfig,
    /// Per-frame budgets.
    pub frame: FrameConfig,
}

impl EngineConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: EngineConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.threading;
        if !(t.cpu_fraction > 0.0 && t.cpu_fraction <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "threading.cpu_fraction",
                reason: format!("{} is outside (0, 1]", t.cpu_fraction),
            });
        }
        if t.dequeue_wait_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "threading.dequeue_wait_ms",
                reason: "must be positive".into(),
            });
        }
        if t.max_retained_jobs == 0 {
            return Err(ConfigError::Invalid {
                field: "threading.max_retained_jobs",
                reason: "must be positive".into(),
            });
        }
        if self.generation.load_radius < 1 {
            return Err(ConfigError::Invalid {
                field: "generation.load_radius",
                reason: format!("{} is less than 1", self.generation.load_radius),
            });
        }
        let f = &self.frame;
        if !(f.edit_budget_ms.is_finite() && f.edit_budget_ms > 0.0) {
            return Err(ConfigError::Invalid {
                field: "frame.edit_budget_ms",
                reason: "must be a positive number".into(),
            });
        }
        if !(f.frame_budget_ms.is_finite() && f.frame_budget_ms > 0.0) {
            return Err(ConfigError::Invalid {
                field: "frame.frame_budget_ms",
                reason: "must be a positive number".into(),
            });
        }
        if f.adaptive_window == 0 {
            return Err(ConfigError::Invalid {
                field: "frame.adaptive_window",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}
