//! Job for building a chunk mesh on a worker thread.
//!
//! The job holds shared handles to the chunk's store and to the stores of its face
//! neighbours. The chunk's own store is read-locked for the whole meshing pass; neighbour
//! stores are only locked for single-point boundary queries.

use cgmath::Point3;

use crate::{
    core::MtResource,
    engine_state::{
        rendering::meshing::{BoundaryLookup, ChunkMesh, MeshError, Mesher},
        task_management::task::{CancellationToken, Job, JobKind},
        voxels::{block::VoxelId, chunk::octree::VoxelOctree, volume::Volume},
    },
};

/// Boundary lookup over the stores of the loaded face neighbours.
///
/// Points in unloaded space read as empty.
#[derive(Default)]
pub struct NeighborStores {
    stores: Vec<(Volume, MtResource<VoxelOctree>)>,
}

impl NeighborStores {
    /// Wraps the stores of the completed face neighbours, each with its bounds.
    pub fn new(stores: Vec<(Volume, MtResource<VoxelOctree>)>) -> Self {
        NeighborStores { stores }
    }
}

impl BoundaryLookup for NeighborStores {
    fn get_voxel_or_boundary(&self, global: Point3<i32>) -> VoxelId {
        self.stores
            .iter()
            .find_map(|(bounds, store)| {
                bounds
                    .to_local(global)
                    .map(|local| store.get().get(local))
            })
            .unwrap_or(VoxelId::EMPTY)
    }
}

/// Meshes one chunk.
pub struct ChunkMeshJob {
    mesher: Mesher,
    bounds: Volume,
    store: MtResource<VoxelOctree>,
    neighbors: NeighborStores,
    result: Option<Result<ChunkMesh, MeshError>>,
}

impl ChunkMeshJob {
    /// Creates a new chunk mesh job.
    ///
    /// # Arguments
    /// * `mesher` - Mesher configured with the block registry and greedy flag
    /// * `bounds` - World-space bounds of the chunk
    /// * `store` - The chunk's voxel store
    /// * `neighbors` - Stores of the loaded face neighbours
    pub fn new(
        mesher: Mesher,
        bounds: Volume,
        store: MtResource<VoxelOctree>,
        neighbors: NeighborStores,
    ) -> Self {
        ChunkMeshJob {
            mesher,
            bounds,
            store,
            neighbors,
            result: None,
        }
    }

    /// Bounds of the chunk being meshed.
    pub fn bounds(&self) -> Volume {
        self.bounds
    }

    /// Takes the built mesh. `None` if the job never ran.
    pub fn take_result(&mut self) -> Option<Result<ChunkMesh, MeshError>> {
        self.result.take()
    }
}

impl Job for ChunkMeshJob {
    fn process(&mut self, cancel: &CancellationToken) {
        let store = self.store.get();
        let result = self
            .mesher
            .mesh(&*store, self.bounds.min, &self.neighbors, cancel);
        drop(store);
        self.result = Some(result);
    }

    fn kind(&self) -> JobKind {
        JobKind::Short
    }

    fn name(&self) -> &'static str {
        "chunk-mesh"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;
    use crate::engine_state::voxels::block::BlockRegistry;

    fn solid(bounds: Volume) -> (Volume, MtResource<VoxelOctree>) {
        (
            bounds,
            MtResource::new(VoxelOctree::new(bounds.size as usize, BlockType::STONE.id())),
        )
    }

    #[test]
    fn loaded_neighbors_hide_shared_faces() {
        let center = Volume::new(Point3::new(0, 0, 0), 8);
        let (_, store) = solid(center);
        let west = solid(Volume::new(Point3::new(-8, 0, 0), 8));
        let east = solid(Volume::new(Point3::new(8, 0, 0), 8));
        let mesher = Mesher::new(Arc::new(BlockRegistry::with_defaults()), true);

        let mut job = ChunkMeshJob::new(mesher, center, store, NeighborStores::new(vec![west, east]));
        job.process(&CancellationToken::new());
        let mesh = job.take_result().unwrap().unwrap();

        // Four open faces remain, each merged into one quad.
        assert_eq!(mesh.quad_count(), 4);
        assert!(mesh.vertices.iter().all(|vertex| vertex.normal[0] == 0.0));
    }

    #[test]
    fn unloaded_space_reads_as_empty() {
        let lookup = NeighborStores::default();
        assert_eq!(lookup.get_voxel_or_boundary(Point3::new(100, -3, 7)), VoxelId::EMPTY);

        let lookup = NeighborStores::new(vec![solid(Volume::new(Point3::new(0, 0, 0), 4))]);
        assert_eq!(lookup.get_voxel_or_boundary(Point3::new(3, 3, 3)), BlockType::STONE.id());
        assert_eq!(lookup.get_voxel_or_boundary(Point3::new(4, 3, 3)), VoxelId::EMPTY);
    }
}
