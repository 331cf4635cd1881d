//! # Pipeline Diagnostics
//!
//! Write-only timing sink for the generation and meshing stages. The engine pushes one
//! sample per finished job; a UI or log line can read back the rolling mean.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Pipeline stage a timing sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Raw terrain and accent generation.
    Build,
    /// Mesh generation.
    Mesh,
}

/// Receives elapsed-time samples from the pipeline.
pub trait DiagnosticsSink: Send + Sync {
    /// Records how long one unit of `stage` took.
    fn record(&self, stage: PipelineStage, elapsed: Duration);
}

/// Discards every sample.
pub struct NullDiagnostics;

impl DiagnosticsSink for NullDiagnostics {
    fn record(&self, _stage: PipelineStage, _elapsed: Duration) {}
}

/// Snapshot of one stage's rolling buffer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimingSummary {
    /// Samples currently held.
    pub samples: usize,
    /// Mean of the held samples.
    pub mean: Duration,
    /// Longest held sample.
    pub max: Duration,
}

/// Keeps the most recent `capacity` samples per stage.
pub struct RollingTimings {
    capacity: usize,
    build: Mutex<VecDeque<Duration>>,
    mesh: Mutex<VecDeque<Duration>>,
}

impl RollingTimings {
    /// Keeps the last `capacity` samples per stage.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            build: Mutex::new(VecDeque::with_capacity(capacity)),
            mesh: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn buffer(&self, stage: PipelineStage) -> &Mutex<VecDeque<Duration>> {
        match stage {
            PipelineStage::Build => &self.build,
            PipelineStage::Mesh => &self.mesh,
        }
    }

    /// Summarises the samples held for `stage`.
    pub fn summary(&self, stage: PipelineStage) -> TimingSummary {
        let samples = self.buffer(stage).lock().unwrap_or_else(PoisonError::into_inner);
        if samples.is_empty() {
            return TimingSummary::default();
        }
        let total: Duration = samples.iter().sum();
        TimingSummary {
            samples: samples.len(),
            mean: total / samples.len() as u32,
            max: samples.iter().copied().max().unwrap_or_default(),
        }
    }
}

impl DiagnosticsSink for RollingTimings {
    fn record(&self, stage: PipelineStage, elapsed: Duration) {
        let mut samples = self.buffer(stage).lock().unwrap_or_else(PoisonError::into_inner);
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_most_recent_samples() {
        let timings = RollingTimings::new(2);
        timings.record(PipelineStage::Mesh, Duration::from_millis(10));
        timings.record(PipelineStage::Mesh, Duration::from_millis(2));
        timings.record(PipelineStage::Mesh, Duration::from_millis(4));

        let summary = timings.summary(PipelineStage::Mesh);
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.mean, Duration::from_millis(3));
        assert_eq!(summary.max, Duration::from_millis(4));
        assert_eq!(timings.summary(PipelineStage::Build), TimingSummary::default());
    }
}
