//! # World Module
//!
//! This module provides the `World` struct which manages the collection of loaded chunks.
//! It serves as the central coordinator for chunk loading, unloading, voxel queries and
//! gameplay edits.
//!
//! ## Architecture
//!
//! The world uses sparse storage: chunks live in a hash map keyed by chunk coordinate and
//! neighbours are found by coordinate offset, never by pointer. Unloaded chunks go into a
//! small recycle pool and are reset before their next use.
//!
//! ## Edits
//!
//! `try_place` and `try_remove` only queue an [`EditAction`]. The queue is drained on the
//! main thread by [`World::apply_edits`] within a time budget, using a non-blocking write
//! lock: a chunk whose store is currently read by a mesher keeps its edit for a later
//! frame. Every applied edit emits a [`ChunkEvent::TerrainChanged`] and marks the chunk and
//! any face neighbour it touches for re-meshing.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use cgmath::{Point3, Vector3};
use log::{debug, trace};
use thiserror::Error;

use crate::core::MtResource;
use crate::engine_state::voxels::{
    block::{block_side::SideSet, VoxelId},
    chunk::{generation::GenerationStep, octree::VoxelOctree, Chunk, CHUNK_DIMENSION},
    volume::{chunk_coordinate_of, Volume},
};

/// Chunks kept for reuse after unloading.
pub const CHUNK_POOL_CAPACITY: usize = 64;

/// Why a voxel read failed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldError {
    /// No loaded chunk contains the point.
    #[error("{0:?} is outside every loaded chunk")]
    OutOfBounds(Point3<i32>),
    /// The chunk is loaded but its raw terrain has not been installed yet.
    #[error("chunk {0:?} has not generated its terrain yet")]
    NotGenerated(Point3<i32>),
}

/// A queued voxel write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditAction {
    /// Global voxel position.
    pub global: Point3<i32>,
    /// Value to write; [`VoxelId::EMPTY`] removes.
    pub id: VoxelId,
}

/// Change notifications for neighbour invalidation and renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkEvent {
    /// Voxels changed.
    TerrainChanged {
        /// Bounds of the changed chunk.
        bounds: Volume,
        /// Chunk faces the change touched.
        sides: SideSet,
    },
    /// A new mesh was installed.
    MeshChanged {
        /// Bounds of the remeshed chunk.
        bounds: Volume,
        /// Faces whose geometry may differ.
        sides: SideSet,
    },
}

/// Represents a voxel world composed of chunks.
pub struct World {
    chunks: HashMap<Point3<i32>, Chunk>,
    pool: Vec<Chunk>,
    edits: VecDeque<EditAction>,
    events: Vec<ChunkEvent>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates a new, empty world.
    pub fn new() -> Self {
        World {
            chunks: HashMap::new(),
            pool: Vec::new(),
            edits: VecDeque::new(),
            events: Vec::new(),
        }
    }

    /// The loaded chunk at `position`.
    pub fn chunk(&self, position: Point3<i32>) -> Option<&Chunk> {
        self.chunks.get(&position)
    }

    /// Mutable access to the loaded chunk at `position`.
    pub fn chunk_mut(&mut self, position: Point3<i32>) -> Option<&mut Chunk> {
        self.chunks.get_mut(&position)
    }

    /// Every loaded chunk, in no particular order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Positions of every loaded chunk.
    pub fn positions(&self) -> Vec<Point3<i32>> {
        self.chunks.keys().copied().collect()
    }

    /// Loaded chunk count.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunk is loaded.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Unloaded chunks kept for reuse.
    pub fn pooled_count(&self) -> usize {
        self.pool.len()
    }

    /// Loads a fresh chunk at `position`. Returns `false` if it was already loaded.
    pub fn load_chunk(&mut self, position: Point3<i32>) -> bool {
        if self.chunks.contains_key(&position) {
            return false;
        }
        let chunk = match self.pool.pop() {
            Some(mut chunk) => {
                chunk.reset(position);
                chunk
            }
            None => Chunk::new(position),
        };
        self.chunks.insert(position, chunk);
        true
    }

    /// Loads every chunk within `radius` chunks of `center` on each axis.
    ///
    /// Returns the newly loaded positions, nearest first.
    pub fn load_area(&mut self, center: Point3<i32>, radius: i32) -> Vec<Point3<i32>> {
        let mut loaded = Vec::new();
        for dz in -radius..=radius {
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let position = center + Vector3::new(dx, dy, dz);
                    if self.load_chunk(position) {
                        loaded.push(position);
                    }
                }
            }
        }
        loaded.sort_by_key(|position| {
            let d = *position - center;
            (d.x * d.x + d.y * d.y + d.z * d.z, position.y, position.z, position.x)
        });
        loaded
    }

    /// Removes the chunk at `position` and keeps it for reuse.
    pub fn unload_chunk(&mut self, position: Point3<i32>) -> bool {
        let Some(chunk) = self.chunks.remove(&position) else {
            return false;
        };
        if self.pool.len() < CHUNK_POOL_CAPACITY {
            self.pool.push(chunk);
        }
        true
    }

    /// Generation step of each neighbour at `offsets`, `None` where nothing is loaded.
    pub fn neighbor_steps(
        &self,
        position: Point3<i32>,
        offsets: &[Vector3<i32>],
    ) -> Vec<Option<GenerationStep>> {
        offsets
            .iter()
            .map(|offset| {
                self.chunk(position + *offset)
                    .map(|chunk| chunk.generation().step())
            })
            .collect()
    }

    /// Store handles of the chunk at `position` and its loaded neighbours at `offsets`.
    pub fn neighborhood(
        &self,
        position: Point3<i32>,
        offsets: &[Vector3<i32>],
    ) -> Vec<(Volume, MtResource<VoxelOctree>)> {
        std::iter::once(Vector3::new(0, 0, 0))
            .chain(offsets.iter().copied())
            .filter_map(|offset| self.chunk(position + offset))
            .map(|chunk| (chunk.bounds(), chunk.store().clone()))
            .collect()
    }

    /// Reads one voxel.
    ///
    /// Unloaded space and chunks without raw terrain are reported as errors, never as
    /// empty.
    pub fn get_voxel(&self, global: Point3<i32>) -> Result<VoxelId, WorldError> {
        let position = chunk_coordinate_of(global, CHUNK_DIMENSION);
        let chunk = self
            .chunk(position)
            .ok_or(WorldError::OutOfBounds(global))?;
        if chunk.generation().step() == GenerationStep::RawTerrain {
            return Err(WorldError::NotGenerated(position));
        }
        let local = chunk
            .bounds()
            .to_local(global)
            .ok_or(WorldError::OutOfBounds(global))?;
        let id = chunk.store().get().get(local);
        Ok(id)
    }

    /// Queues placing `id` at `global`. Only complete chunks accept edits.
    pub fn try_place(&mut self, global: Point3<i32>, id: VoxelId) -> bool {
        if id.is_empty() || !self.accepts_edit(global) {
            return false;
        }
        self.edits.push_back(EditAction { global, id });
        true
    }

    /// Queues clearing the voxel at `global`.
    pub fn try_remove(&mut self, global: Point3<i32>) -> bool {
        if !self.accepts_edit(global) {
            return false;
        }
        self.edits.push_back(EditAction {
            global,
            id: VoxelId::EMPTY,
        });
        true
    }

    fn accepts_edit(&self, global: Point3<i32>) -> bool {
        self.chunk(chunk_coordinate_of(global, CHUNK_DIMENSION))
            .is_some_and(|chunk| chunk.generation().is_complete())
    }

    /// Edits queued and not yet applied.
    pub fn pending_edits(&self) -> usize {
        self.edits.len()
    }

    /// Applies queued edits until the queue is empty or `budget` is spent.
    ///
    /// At least one edit is attempted per call. Each edit is attempted at most once; edits
    /// that cannot be written right now keep their order at the front of the queue.
    /// Returns the number of edits applied.
    pub fn apply_edits(&mut self, budget: Duration) -> usize {
        let start = web_time::Instant::now();
        let mut deferred = Vec::new();
        let mut attempted = 0;
        let mut applied = 0;

        while let Some(edit) = self.edits.pop_front() {
            if attempted > 0 && start.elapsed() >= budget {
                self.edits.push_front(edit);
                break;
            }
            attempted += 1;
            match self.apply_edit(edit) {
                EditOutcome::Applied => applied += 1,
                EditOutcome::Deferred => deferred.push(edit),
                EditOutcome::Dropped => {}
            }
        }

        for edit in deferred.into_iter().rev() {
            self.edits.push_front(edit);
        }
        applied
    }

    fn apply_edit(&mut self, edit: EditAction) -> EditOutcome {
        let position = chunk_coordinate_of(edit.global, CHUNK_DIMENSION);
        let Some(chunk) = self.chunks.get_mut(&position) else {
            debug!("Dropping edit at {:?}: chunk unloaded", edit.global);
            return EditOutcome::Dropped;
        };
        if !chunk.generation().is_complete() {
            trace!("Deferring edit at {:?}: chunk still generating", edit.global);
            return EditOutcome::Deferred;
        }
        let bounds = chunk.bounds();
        let Some(local) = bounds.to_local(edit.global) else {
            return EditOutcome::Dropped;
        };
        let changed = match chunk.store().try_get_mut() {
            Some(mut store) => store.set(local, edit.id),
            None => {
                trace!("Deferring edit at {:?}: store is being read", edit.global);
                return EditOutcome::Deferred;
            }
        };
        if !changed {
            return EditOutcome::Applied;
        }

        chunk.meshing_mut().request();
        let sides = bounds.boundary_sides(local);
        for side in sides.iter() {
            if let Some(neighbor) = self.chunks.get_mut(&(position + side.offset())) {
                neighbor.meshing_mut().request();
            }
        }
        self.events.push(ChunkEvent::TerrainChanged { bounds, sides });
        EditOutcome::Applied
    }

    /// Queues an event for the next [`drain_events`](Self::drain_events).
    pub fn push_event(&mut self, event: ChunkEvent) {
        self.events.push(event);
    }

    /// Takes every event raised since the last call, oldest first.
    pub fn drain_events(&mut self) -> Vec<ChunkEvent> {
        std::mem::take(&mut self.events)
    }
}

enum EditOutcome {
    Applied,
    Deferred,
    Dropped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_side::BlockSide;
    use crate::engine_state::voxels::block::block_type::BlockType;
    use crate::engine_state::voxels::chunk::generation::MeshState;

    fn complete(world: &mut World, position: Point3<i32>) {
        world.load_chunk(position);
        let chunk = world.chunk_mut(position).unwrap();
        for _ in 0..2 {
            chunk.generation_mut().begin();
            chunk.generation_mut().finish(Duration::ZERO);
        }
    }

    #[test]
    fn unknown_space_is_not_empty() {
        let mut world = World::new();
        assert_eq!(
            world.get_voxel(Point3::new(5, 5, 5)),
            Err(WorldError::OutOfBounds(Point3::new(5, 5, 5)))
        );

        world.load_chunk(Point3::new(0, 0, 0));
        assert_eq!(
            world.get_voxel(Point3::new(5, 5, 5)),
            Err(WorldError::NotGenerated(Point3::new(0, 0, 0)))
        );

        complete(&mut world, Point3::new(-1, 0, 0));
        assert_eq!(world.get_voxel(Point3::new(-1, 0, 0)), Ok(VoxelId::EMPTY));
    }

    #[test]
    fn edits_are_queued_until_applied() {
        let mut world = World::new();
        world.load_chunk(Point3::new(1, 0, 0));
        assert!(!world.try_place(Point3::new(40, 1, 1), BlockType::STONE.id()));

        complete(&mut world, Point3::new(0, 0, 0));
        let target = Point3::new(3, 4, 5);
        assert!(world.try_place(target, BlockType::STONE.id()));
        assert!(!world.try_place(target, VoxelId::EMPTY));
        assert_eq!(world.get_voxel(target), Ok(VoxelId::EMPTY));
        assert_eq!(world.pending_edits(), 1);

        assert_eq!(world.apply_edits(Duration::from_millis(5)), 1);
        assert_eq!(world.get_voxel(target), Ok(BlockType::STONE.id()));
        assert_eq!(
            world.chunk(Point3::new(0, 0, 0)).unwrap().meshing().state(),
            MeshState::PendingGeneration
        );
        assert_eq!(
            world.drain_events(),
            vec![ChunkEvent::TerrainChanged {
                bounds: Volume::of_chunk(Point3::new(0, 0, 0), CHUNK_DIMENSION),
                sides: SideSet::empty(),
            }]
        );
        assert!(world.drain_events().is_empty());

        assert!(world.try_remove(target));
        world.apply_edits(Duration::from_millis(5));
        assert_eq!(world.get_voxel(target), Ok(VoxelId::EMPTY));
    }

    #[test]
    fn boundary_edits_invalidate_the_neighbor() {
        let mut world = World::new();
        complete(&mut world, Point3::new(0, 0, 0));
        complete(&mut world, Point3::new(1, 0, 0));

        assert!(world.try_place(Point3::new(31, 0, 7), BlockType::DIRT.id()));
        world.apply_edits(Duration::from_millis(5));

        assert!(world.chunk(Point3::new(1, 0, 0)).unwrap().meshing().is_dirty());
        let events = world.drain_events();
        let ChunkEvent::TerrainChanged { sides, .. } = events[0] else {
            panic!("expected a terrain event");
        };
        assert!(sides.contains(BlockSide::RIGHT));
        assert!(sides.contains(BlockSide::BOTTOM));
        assert_eq!(sides.len(), 2);
    }

    #[test]
    fn edits_wait_while_the_store_is_read() {
        let mut world = World::new();
        complete(&mut world, Point3::new(0, 0, 0));
        let store = world.chunk(Point3::new(0, 0, 0)).unwrap().store().clone();
        let first = Point3::new(1, 1, 1);
        let second = Point3::new(2, 2, 2);
        world.try_place(first, BlockType::STONE.id());
        world.try_place(second, BlockType::SAND.id());

        {
            let _reader = store.get();
            assert_eq!(world.apply_edits(Duration::from_millis(5)), 0);
        }
        assert_eq!(world.pending_edits(), 2);

        assert_eq!(world.apply_edits(Duration::from_millis(5)), 2);
        assert_eq!(world.get_voxel(first), Ok(BlockType::STONE.id()));
        assert_eq!(world.get_voxel(second), Ok(BlockType::SAND.id()));
    }

    #[test]
    fn zero_budget_still_makes_progress() {
        let mut world = World::new();
        complete(&mut world, Point3::new(0, 0, 0));
        for x in 0..4 {
            world.try_place(Point3::new(x, 0, 0), BlockType::STONE.id());
        }
        assert!(world.apply_edits(Duration::ZERO) >= 1);
    }

    #[test]
    fn unloaded_chunks_are_recycled_fresh() {
        let mut world = World::new();
        complete(&mut world, Point3::new(0, 0, 0));
        world.try_place(Point3::new(0, 0, 0), BlockType::STONE.id());
        world.apply_edits(Duration::from_millis(5));

        assert!(world.unload_chunk(Point3::new(0, 0, 0)));
        assert!(!world.unload_chunk(Point3::new(0, 0, 0)));
        assert_eq!(world.pooled_count(), 1);

        assert!(world.load_chunk(Point3::new(2, 0, 0)));
        assert_eq!(world.pooled_count(), 0);
        let chunk = world.chunk(Point3::new(2, 0, 0)).unwrap();
        assert_eq!(chunk.generation().step(), GenerationStep::RawTerrain);
        assert_eq!(chunk.store().get().uniform_value(), Some(VoxelId::EMPTY));
    }

    #[test]
    fn load_area_orders_nearest_first() {
        let mut world = World::new();
        let loaded = world.load_area(Point3::new(0, 0, 0), 1);
        assert_eq!(loaded.len(), 27);
        assert_eq!(loaded[0], Point3::new(0, 0, 0));
        assert!(world.load_area(Point3::new(0, 0, 0), 1).is_empty());
        assert_eq!(
            world.neighbor_steps(Point3::new(1, 0, 0), &[Vector3::new(1, 0, 0)]),
            vec![None]
        );
    }
}
