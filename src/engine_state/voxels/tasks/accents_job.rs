//! # Accents Job
//!
//! Second generation step. The job copies the chunk's raw terrain, grows the trees that
//! reach into it and hands the decorated copy back for the main thread to install. Raw
//! terrain of the chunk and its planar neighbours is read through shared store handles,
//! one column per read lock.

use std::ops::Range;

use cgmath::Point3;

use crate::{
    core::MtResource,
    engine_state::{
        task_management::task::{CancellationToken, Job, JobKind},
        voxels::{
            accents::{Accents, TerrainColumns},
            block::VoxelId,
            chunk::octree::VoxelOctree,
            terrain::GenerationError,
            volume::Volume,
        },
    },
};

/// Read-only handles to the stores around a chunk, with their bounds.
pub struct StoreNeighborhood {
    stores: Vec<(Volume, MtResource<VoxelOctree>)>,
}

impl StoreNeighborhood {
    /// Wraps the planar neighbours' stores, each with its bounds.
    pub fn new(stores: Vec<(Volume, MtResource<VoxelOctree>)>) -> Self {
        StoreNeighborhood { stores }
    }
}

impl TerrainColumns for StoreNeighborhood {
    fn column(&self, x: i32, z: i32, ys: Range<i32>, out: &mut Vec<VoxelId>) -> bool {
        let column_base = Point3::new(x, ys.start, z);
        let Some((bounds, store)) = self.stores.iter().find(|(bounds, _)| bounds.contains(column_base))
        else {
            return false;
        };
        let store = store.get();
        out.clear();
        for y in ys {
            match bounds.to_local(Point3::new(x, y, z)) {
                Some(local) => out.push(store.get(local)),
                None => return false,
            }
        }
        true
    }
}

/// Decorates one chunk.
pub struct AccentsJob {
    accents: Accents,
    bounds: Volume,
    store: MtResource<VoxelOctree>,
    neighborhood: StoreNeighborhood,
    result: Option<Result<VoxelOctree, GenerationError>>,
}

impl AccentsJob {
    /// # Arguments
    /// * `accents` - Tree placement for the world seed
    /// * `bounds` - World-space bounds of the chunk
    /// * `store` - The chunk's own store, holding its raw terrain
    /// * `neighborhood` - The chunk's store and its loaded planar neighbours
    pub fn new(
        accents: Accents,
        bounds: Volume,
        store: MtResource<VoxelOctree>,
        neighborhood: StoreNeighborhood,
    ) -> Self {
        AccentsJob {
            accents,
            bounds,
            store,
            neighborhood,
            result: None,
        }
    }

    /// Bounds of the chunk being decorated.
    pub fn bounds(&self) -> Volume {
        self.bounds
    }

    /// Takes the decorated store. `None` if the job never ran.
    pub fn take_result(&mut self) -> Option<Result<VoxelOctree, GenerationError>> {
        self.result.take()
    }
}

impl Job for AccentsJob {
    fn process(&mut self, cancel: &CancellationToken) {
        let mut decorated = self.store.get().clone();
        let result = self
            .accents
            .decorate(&mut decorated, self.bounds, &self.neighborhood, cancel)
            .map(|written| {
                log::trace!("Accents wrote {} voxels into {:?}", written, self.bounds.min);
                decorated
            });
        self.result = Some(result);
    }

    fn kind(&self) -> JobKind {
        JobKind::LongRunning
    }

    fn name(&self) -> &'static str {
        "accents"
    }
}
