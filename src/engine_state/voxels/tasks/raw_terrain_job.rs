//! # Raw Terrain Job
//!
//! This module defines the `RawTerrainJob`, which runs the first generation step of a
//! chunk on a worker. The job samples the terrain generator for the chunk's bounds and
//! keeps the result; the engine installs it into the chunk store on the main thread.

use std::sync::Arc;

use crate::engine_state::{
    task_management::task::{CancellationToken, Job, JobKind},
    voxels::{
        terrain::{GenerationError, TerrainGenerator, TerrainSample},
        volume::Volume,
    },
};

/// Samples raw terrain for one chunk.
///
/// The job owns everything it reads: a shared handle to the generator and the bounds.
/// It never touches the chunk map.
pub struct RawTerrainJob {
    generator: Arc<dyn TerrainGenerator>,
    bounds: Volume,
    result: Option<Result<TerrainSample, GenerationError>>,
}

impl RawTerrainJob {
    /// Creates a new raw terrain job.
    ///
    /// # Arguments
    /// * `generator` - The terrain source shared by all generation jobs
    /// * `bounds` - World-space voxel bounds of the chunk to generate
    pub fn new(generator: Arc<dyn TerrainGenerator>, bounds: Volume) -> Self {
        RawTerrainJob {
            generator,
            bounds,
            result: None,
        }
    }

    /// Bounds being sampled.
    pub fn bounds(&self) -> Volume {
        self.bounds
    }

    /// Takes the sampled terrain. `None` if the job never ran.
    pub fn take_result(&mut self) -> Option<Result<TerrainSample, GenerationError>> {
        self.result.take()
    }
}

impl Job for RawTerrainJob {
    fn process(&mut self, cancel: &CancellationToken) {
        self.result = Some(self.generator.sample(self.bounds, cancel));
    }

    fn kind(&self) -> JobKind {
        JobKind::LongRunning
    }

    fn name(&self) -> &'static str {
        "raw-terrain"
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Point3;

    use super::*;
    use crate::engine_state::voxels::block::VoxelId;
    use crate::engine_state::voxels::chunk::octree::VoxelOctree;

    struct Unavailable;

    impl TerrainGenerator for Unavailable {
        fn sample(
            &self,
            _bounds: Volume,
            _cancel: &CancellationToken,
        ) -> Result<TerrainSample, GenerationError> {
            Err(GenerationError::Unavailable)
        }
    }

    struct Solid;

    impl TerrainGenerator for Solid {
        fn sample(
            &self,
            bounds: Volume,
            _cancel: &CancellationToken,
        ) -> Result<TerrainSample, GenerationError> {
            Ok(TerrainSample {
                bounds,
                voxels: VoxelOctree::new(bounds.size as usize, VoxelId(1)),
            })
        }
    }

    #[test]
    fn keeps_the_generator_result() {
        let bounds = Volume::new(Point3::new(0, 0, 0), 8);
        let mut job = RawTerrainJob::new(Arc::new(Solid), bounds);
        assert!(job.take_result().is_none());

        job.process(&CancellationToken::new());
        let sample = job.take_result().unwrap().unwrap();
        assert_eq!(sample.bounds, bounds);
        assert_eq!(sample.voxels.uniform_value(), Some(VoxelId(1)));

        let mut failing = RawTerrainJob::new(Arc::new(Unavailable), bounds);
        failing.process(&CancellationToken::new());
        assert_eq!(failing.take_result(), Some(Err(GenerationError::Unavailable)));
    }
}
