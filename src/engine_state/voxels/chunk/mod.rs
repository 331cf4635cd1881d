//! # Chunk Module
//!
//! This module provides the `Chunk` struct: one cubic block of
//! `CHUNK_DIMENSION³` voxels, its generation progress and its latest mesh.
//!
//! ## Storage
//!
//! Voxel ids live in a [`VoxelOctree`] behind an [`MtResource`], so jobs on worker threads
//! can hold a handle and take short read locks while the main thread keeps the only write
//! path. Uniform regions cost one node, which keeps the many all-air and all-stone chunks
//! of a world nearly free.
//!
//! ## Lifecycle
//!
//! A chunk is created (or taken from the world's recycle pool) at a chunk coordinate,
//! walks the [`generation`] state machine, is meshed, and is finally returned to the pool
//! where [`Chunk::reset`] wipes it for its next position.

use std::sync::Arc;

use cgmath::Point3;

use crate::core::MtResource;
use crate::engine_state::rendering::meshing::ChunkMesh;

use super::block::VoxelId;
use super::volume::Volume;

pub mod dense_volume;
pub mod generation;
pub mod octree;

use generation::{GenerationState, MeshTracker};
use octree::VoxelOctree;

/// The dimension (width, height, depth) of a chunk in voxels.
pub const CHUNK_DIMENSION: i32 = 32;

/// One cubic piece of the world.
pub struct Chunk {
    /// Position in chunk coordinates (not voxel coordinates).
    position: Point3<i32>,
    bounds: Volume,
    store: MtResource<VoxelOctree>,
    generation: GenerationState,
    meshing: MeshTracker,
    mesh: Option<Arc<ChunkMesh>>,
}

impl Chunk {
    /// Creates an all-air chunk at `position` that has not started generating.
    pub fn new(position: Point3<i32>) -> Self {
        Chunk {
            position,
            bounds: Volume::of_chunk(position, CHUNK_DIMENSION),
            store: MtResource::new(VoxelOctree::new(CHUNK_DIMENSION as usize, VoxelId::EMPTY)),
            generation: GenerationState::default(),
            meshing: MeshTracker::default(),
            mesh: None,
        }
    }

    /// Wipes the chunk for reuse at a new position.
    ///
    /// The store is replaced rather than cleared: a cancelled job may still hold the old
    /// handle.
    pub fn reset(&mut self, position: Point3<i32>) {
        self.position = position;
        self.bounds = Volume::of_chunk(position, CHUNK_DIMENSION);
        self.store = MtResource::new(VoxelOctree::new(CHUNK_DIMENSION as usize, VoxelId::EMPTY));
        self.generation.reset();
        self.meshing.reset();
        self.mesh = None;
    }

    /// Chunk coordinate.
    pub fn position(&self) -> Point3<i32> {
        self.position
    }

    /// World-space voxel bounds.
    pub fn bounds(&self) -> Volume {
        self.bounds
    }

    /// Shared handle to the voxel store.
    pub fn store(&self) -> &MtResource<VoxelOctree> {
        &self.store
    }

    /// Replaces the voxel content with a finished generation result.
    pub fn install_terrain(&mut self, octree: VoxelOctree) {
        debug_assert_eq!(octree.size(), CHUNK_DIMENSION as usize);
        *self.store.get_mut() = octree;
    }

    /// Generation progress.
    pub fn generation(&self) -> &GenerationState {
        &self.generation
    }

    /// Mutable generation progress.
    pub fn generation_mut(&mut self) -> &mut GenerationState {
        &mut self.generation
    }

    /// Meshing progress.
    pub fn meshing(&self) -> &MeshTracker {
        &self.meshing
    }

    /// Mutable meshing progress.
    pub fn meshing_mut(&mut self) -> &mut MeshTracker {
        &mut self.meshing
    }

    /// Most recently installed mesh.
    pub fn mesh(&self) -> Option<&Arc<ChunkMesh>> {
        self.mesh.as_ref()
    }

    /// Replaces the mesh and marks meshing finished.
    pub fn install_mesh(&mut self, mesh: Arc<ChunkMesh>) {
        self.mesh = Some(mesh);
        self.meshing.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::generation::{GenerationStep, MeshState};
    use super::*;

    #[test]
    fn reset_returns_a_fresh_chunk_at_the_new_position() {
        let mut chunk = Chunk::new(Point3::new(0, 0, 0));
        let old_store = chunk.store().clone();
        chunk.install_terrain(VoxelOctree::new(CHUNK_DIMENSION as usize, VoxelId(1)));
        chunk.generation_mut().begin();
        chunk.generation_mut().finish(std::time::Duration::ZERO);
        chunk.meshing_mut().request();
        chunk.meshing_mut().begin();
        chunk.install_mesh(Arc::new(ChunkMesh::empty()));

        chunk.reset(Point3::new(1, -2, 3));

        assert_eq!(chunk.position(), Point3::new(1, -2, 3));
        assert_eq!(chunk.bounds().min, Point3::new(32, -64, 96));
        assert_eq!(chunk.generation().step(), GenerationStep::RawTerrain);
        assert_eq!(chunk.meshing().state(), MeshState::Unmeshed);
        assert!(chunk.mesh().is_none());
        assert!(!chunk.store().ptr_eq(&old_store));
        assert_eq!(chunk.store().get().uniform_value(), Some(VoxelId::EMPTY));
        assert_eq!(old_store.get().uniform_value(), Some(VoxelId(1)));
    }
}
