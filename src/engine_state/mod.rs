//! # Engine State Module
//!
//! The core engine module that drives the voxel pipeline.
//!
//! ## Key Components
//!
//! * `EngineState` - The main state container, ticked once per frame
//! * `rendering` - Meshing and the mesh job
//! * `task_management` - The job scheduler and the adaptive threading governor
//! * `voxels` - Voxel data, chunks, terrain generation and the world
//!
//! ## Architecture
//!
//! `EngineState` owns the scheduler and the world and is the only place where the two
//! meet. Each tick it:
//!
//! 1. feeds the frame time to the threading governor
//! 2. takes back finished jobs and installs their output into the chunks
//! 3. applies queued voxel edits within the edit budget
//! 4. starts the generation step of every chunk whose neighbours allow it
//! 5. starts a mesh job for every dirty, complete chunk whose face neighbours are ready
//!
//! Jobs are handed shared store handles and never see the chunk map. A job that was lost
//! (cancelled, panicked or evicted before it was collected) leaves its chunk in the state
//! it was in before, and the work is requested again on the next tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cgmath::{EuclideanSpace, Point3};
use log::{debug, warn};

use crate::core::config::{EngineConfig, ThreadingMode};
use crate::core::diagnostics::{DiagnosticsSink, PipelineStage};
use crate::core::MtResource;

use rendering::meshing::Mesher;
use rendering::tasks::chunk_mesh_job::{ChunkMeshJob, NeighborStores};
use task_management::governor::ThreadingGovernor;
use task_management::task::{Job, JobHandle, JobId, JobStatus};
use task_management::Scheduler;
use voxels::{
    accents::Accents,
    block::{
        block_side::{BlockSide, SideSet},
        BlockRegistry, VoxelId,
    },
    chunk::{
        generation::{GenerationStep, PLANAR_NEIGHBOR_OFFSETS, VERTICAL_NEIGHBOR_OFFSETS},
        octree::VoxelOctree,
        Chunk,
    },
    tasks::{
        accents_job::{AccentsJob, StoreNeighborhood},
        raw_terrain_job::RawTerrainJob,
    },
    terrain::TerrainGenerator,
    volume::Volume,
    world::{ChunkEvent, World, WorldError},
};

pub mod rendering;
pub mod task_management;
pub mod voxels;

#[derive(Debug, Clone, Copy)]
enum GenerationJob {
    RawTerrain(JobHandle<RawTerrainJob>),
    Accents(JobHandle<AccentsJob>),
}

impl GenerationJob {
    fn id(&self) -> JobId {
        match self {
            GenerationJob::RawTerrain(handle) => handle.id(),
            GenerationJob::Accents(handle) => handle.id(),
        }
    }
}

/// Jobs in flight for one chunk.
#[derive(Debug, Default)]
struct ChunkJobs {
    generation: Option<GenerationJob>,
    mesh: Option<JobHandle<ChunkMeshJob>>,
}

impl ChunkJobs {
    fn is_idle(&self) -> bool {
        self.generation.is_none() && self.mesh.is_none()
    }

    fn ids(&self) -> impl Iterator<Item = JobId> + '_ {
        self.generation
            .iter()
            .map(GenerationJob::id)
            .chain(self.mesh.iter().map(JobHandle::id))
    }
}

/// What polling a job handle produced this tick.
enum Polled<T> {
    Pending,
    Lost(JobStatus),
    Finished(Option<T>, Duration),
}

fn poll<J: Job, T>(
    scheduler: &Scheduler,
    handle: &JobHandle<J>,
    take: impl FnOnce(J) -> Option<T>,
) -> Polled<T> {
    if let Some(finished) = scheduler.try_take_finished(handle) {
        return Polled::Finished(take(finished.job), finished.elapsed);
    }
    match scheduler.status(handle.id()) {
        JobStatus::Queued | JobStatus::Running | JobStatus::Done => Polled::Pending,
        lost => Polled::Lost(lost),
    }
}

/// Read-only counters for a debug overlay or log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    /// Chunks currently loaded.
    pub loaded_chunks: usize,
    /// Chunks whose generation reached `Complete`.
    pub complete_chunks: usize,
    /// Chunks holding a mesh, current or stale.
    pub meshed_chunks: usize,
    /// Jobs waiting in the scheduler queue.
    pub queued_jobs: usize,
    /// Jobs currently executing.
    pub in_flight_jobs: usize,
    /// Threads executing jobs in the current mode.
    pub workers: usize,
    /// Gameplay edits still waiting to be applied.
    pub pending_edits: usize,
}

/// The main state container for the voxel engine.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use cgmath::Point3;
/// use voxel_forge::core::config::EngineConfig;
/// use voxel_forge::core::diagnostics::NullDiagnostics;
/// use voxel_forge::engine_state::voxels::block::BlockRegistry;
/// use voxel_forge::engine_state::voxels::terrain::PerlinTerrain;
/// use voxel_forge::engine_state::EngineState;
///
/// let config = EngineConfig::default();
/// let mut engine = EngineState::new(
///     config.clone(),
///     Arc::new(BlockRegistry::with_defaults()),
///     Arc::new(PerlinTerrain::new(config.generation.seed)),
///     Arc::new(NullDiagnostics),
/// );
/// engine.load_area(Point3::new(0, 0, 0), 2);
///
/// // Main loop
/// loop {
///     engine.tick(Duration::from_millis(16));
///     for event in engine.drain_events() {
///         // Hand new meshes to the renderer...
///     }
/// }
/// ```
pub struct EngineState {
    config: EngineConfig,
    scheduler: Scheduler,
    world: World,
    generator: Arc<dyn TerrainGenerator>,
    accents: Accents,
    mesher: Mesher,
    diagnostics: Arc<dyn DiagnosticsSink>,
    jobs: HashMap<Point3<i32>, ChunkJobs>,
    governor: Option<ThreadingGovernor>,
    /// Chunk the loaded area is centred on; nearer chunks are dispatched first.
    focus: Point3<i32>,
}

impl EngineState {
    /// Creates the engine and starts its scheduler.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated engine configuration
    /// * `registry` - Block definitions shared with the mesher
    /// * `generator` - Source of raw terrain
    /// * `diagnostics` - Receives build and mesh timings
    pub fn new(
        config: EngineConfig,
        registry: Arc<BlockRegistry>,
        generator: Arc<dyn TerrainGenerator>,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        let mut scheduler = Scheduler::new(config.threading.clone());
        scheduler.start();

        let governor = config
            .frame
            .adaptive_threading
            .then(|| ThreadingGovernor::from_config(&config.frame, config.threading.mode));

        Self {
            accents: Accents::new(config.generation.seed),
            mesher: Mesher::new(registry, config.meshing.greedy),
            config,
            scheduler,
            world: World::new(),
            generator,
            diagnostics,
            jobs: HashMap::new(),
            governor,
            focus: Point3::origin(),
        }
    }

    /// Advances the pipeline by one frame.
    ///
    /// # Arguments
    ///
    /// * `frame_time` - Duration of the previous frame, used by adaptive threading
    pub fn tick(&mut self, frame_time: Duration) {
        if !self.scheduler.is_running() {
            return;
        }
        if let Some(governor) = &mut self.governor {
            if let Some(mode) = governor.observe(frame_time, self.scheduler.mode()) {
                self.scheduler.set_mode(mode);
            }
        }

        self.collect_finished();
        self.world.apply_edits(self.config.frame.edit_budget());
        self.dispatch_generation();
        self.dispatch_meshes();
    }

    /// Loads every chunk within `radius` of `center` and makes it the dispatch focus.
    ///
    /// Returns the number of newly loaded chunks.
    pub fn load_area(&mut self, center: Point3<i32>, radius: i32) -> usize {
        self.focus = center;
        let loaded = self.world.load_area(center, radius);
        if !loaded.is_empty() {
            debug!("Loaded {} chunks around {:?}", loaded.len(), center);
        }
        loaded.len()
    }

    /// Moves the focus to `chunk_position`: chunks outside the configured radius are
    /// unloaded and the radius around the new focus is loaded.
    pub fn set_focus(&mut self, chunk_position: Point3<i32>) {
        if chunk_position == self.focus && !self.world.is_empty() {
            return;
        }
        let radius = self.config.generation.load_radius;
        let out_of_range: Vec<Point3<i32>> = self
            .world
            .positions()
            .into_iter()
            .filter(|position| {
                let offset = *position - chunk_position;
                offset.x.abs() > radius || offset.y.abs() > radius || offset.z.abs() > radius
            })
            .collect();
        if !out_of_range.is_empty() {
            debug!("Unloading {} chunks outside the radius of {:?}", out_of_range.len(), chunk_position);
        }
        for position in out_of_range {
            self.unload_chunk(position);
        }
        self.load_area(chunk_position, radius);
    }

    /// Unloads a chunk, cancelling its jobs. Returns `false` if it was not loaded.
    pub fn unload_chunk(&mut self, position: Point3<i32>) -> bool {
        if let Some(jobs) = self.jobs.remove(&position) {
            for id in jobs.ids() {
                self.scheduler.cancel(id);
            }
        }
        if !self.world.unload_chunk(position) {
            return false;
        }
        for side in BlockSide::all() {
            self.request_mesh_if_complete(position + side.offset());
        }
        true
    }

    /// Reads a voxel. See [`World::get_voxel`].
    pub fn get_voxel(&self, global: Point3<i32>) -> Result<VoxelId, WorldError> {
        self.world.get_voxel(global)
    }

    /// Queues a placement. See [`World::try_place`].
    pub fn try_place(&mut self, global: Point3<i32>, id: VoxelId) -> bool {
        self.world.try_place(global, id)
    }

    /// Queues a removal. See [`World::try_remove`].
    pub fn try_remove(&mut self, global: Point3<i32>) -> bool {
        self.world.try_remove(global)
    }

    /// Takes the change events raised since the last call.
    pub fn drain_events(&mut self) -> Vec<ChunkEvent> {
        self.world.drain_events()
    }

    /// The loaded chunk at `position`.
    pub fn chunk(&self, position: Point3<i32>) -> Option<&Chunk> {
        self.world.chunk(position)
    }

    /// Read access to the chunk map.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The scheduler's current mode, which adaptive threading may have lowered.
    pub fn threading_mode(&self) -> ThreadingMode {
        self.scheduler.mode()
    }

    /// Counts chunks, jobs and edits as of now.
    pub fn stats(&self) -> EngineStats {
        let mut stats = EngineStats {
            loaded_chunks: self.world.len(),
            queued_jobs: self.scheduler.queued_count(),
            in_flight_jobs: self.scheduler.in_flight_count(),
            workers: self.scheduler.worker_count(),
            pending_edits: self.world.pending_edits(),
            ..Default::default()
        };
        for chunk in self.world.chunks() {
            stats.complete_chunks += chunk.generation().is_complete() as usize;
            stats.meshed_chunks += chunk.mesh().is_some() as usize;
        }
        stats
    }

    /// Stops the scheduler. In-flight jobs are cancelled and joined.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
        self.jobs.clear();
    }

    fn collect_finished(&mut self) {
        let positions: Vec<Point3<i32>> = self.jobs.keys().copied().collect();
        for position in positions {
            self.collect_generation(position);
            self.collect_mesh(position);
        }
        self.jobs.retain(|_, jobs| !jobs.is_idle());
    }

    fn collect_generation(&mut self, position: Point3<i32>) {
        let Some(job) = self.jobs.get(&position).and_then(|jobs| jobs.generation) else {
            return;
        };
        let polled = match job {
            GenerationJob::RawTerrain(handle) => poll(&self.scheduler, &handle, |mut job| {
                job.take_result()
                    .map(|result| result.map(|sample| sample.voxels))
            }),
            GenerationJob::Accents(handle) => {
                poll(&self.scheduler, &handle, |mut job| job.take_result())
            }
        };

        match polled {
            Polled::Pending => return,
            Polled::Finished(Some(Ok(voxels)), elapsed) => self.finish_step(position, voxels, elapsed),
            Polled::Finished(Some(Err(err)), _) => {
                debug!("Generation of {:?} skipped: {}; retrying", position, err);
                self.abort_generation(position);
            }
            Polled::Finished(None, _) => self.abort_generation(position),
            Polled::Lost(status) => {
                debug!("Generation job for {:?} ended as {:?}; retrying", position, status);
                self.abort_generation(position);
            }
        }
        if let Some(jobs) = self.jobs.get_mut(&position) {
            jobs.generation = None;
        }
    }

    fn abort_generation(&mut self, position: Point3<i32>) {
        if let Some(chunk) = self.world.chunk_mut(position) {
            chunk.generation_mut().abort();
        }
    }

    fn finish_step(&mut self, position: Point3<i32>, voxels: VoxelOctree, elapsed: Duration) {
        let Some(chunk) = self.world.chunk_mut(position) else {
            return;
        };
        chunk.install_terrain(voxels);
        if chunk.generation_mut().finish(elapsed) != GenerationStep::Complete {
            return;
        }

        let bounds = chunk.bounds();
        self.diagnostics
            .record(PipelineStage::Build, chunk.generation().tier_time());
        chunk.meshing_mut().request();
        self.world.push_event(ChunkEvent::TerrainChanged {
            bounds,
            sides: SideSet::all(),
        });
        for side in BlockSide::all() {
            self.request_mesh_if_complete(position + side.offset());
        }
    }

    fn request_mesh_if_complete(&mut self, position: Point3<i32>) {
        if let Some(chunk) = self.world.chunk_mut(position) {
            if chunk.generation().is_complete() {
                chunk.meshing_mut().request();
            }
        }
    }

    fn collect_mesh(&mut self, position: Point3<i32>) {
        let Some(handle) = self.jobs.get(&position).and_then(|jobs| jobs.mesh) else {
            return;
        };
        let polled = poll(&self.scheduler, &handle, |mut job| job.take_result());
        if matches!(polled, Polled::Pending) {
            return;
        }
        if let Some(jobs) = self.jobs.get_mut(&position) {
            jobs.mesh = None;
        }
        let Some(chunk) = self.world.chunk_mut(position) else {
            return;
        };

        match polled {
            Polled::Finished(Some(Ok(mesh)), elapsed) => {
                let bounds = chunk.bounds();
                chunk.install_mesh(Arc::new(mesh));
                self.diagnostics.record(PipelineStage::Mesh, elapsed);
                self.world.push_event(ChunkEvent::MeshChanged {
                    bounds,
                    sides: SideSet::all(),
                });
            }
            Polled::Finished(Some(Err(err)), _) => {
                debug!("Meshing of {:?} stopped: {}; retrying", position, err);
                chunk.meshing_mut().abort();
            }
            Polled::Lost(status) => {
                debug!("Mesh job for {:?} ended as {:?}; retrying", position, status);
                chunk.meshing_mut().abort();
            }
            Polled::Finished(None, _) | Polled::Pending => chunk.meshing_mut().abort(),
        }
    }

    /// Loaded positions, nearest to the focus first.
    fn positions_by_distance(&self) -> Vec<Point3<i32>> {
        let mut positions = self.world.positions();
        let focus = self.focus;
        positions.sort_by_key(|position| {
            let d = *position - focus;
            (d.x * d.x + d.y * d.y + d.z * d.z, position.y, position.z, position.x)
        });
        positions
    }

    fn dispatch_generation(&mut self) {
        let mut offsets = PLANAR_NEIGHBOR_OFFSETS.to_vec();
        if self.config.generation.gate_vertical_neighbors {
            offsets.extend(VERTICAL_NEIGHBOR_OFFSETS);
        }

        for position in self.positions_by_distance() {
            if self.jobs.get(&position).is_some_and(|jobs| jobs.generation.is_some()) {
                continue;
            }
            let Some(chunk) = self.world.chunk(position) else {
                continue;
            };
            let neighbors = self.world.neighbor_steps(position, &offsets);
            if !chunk.generation().can_start(&neighbors) {
                continue;
            }

            let bounds = chunk.bounds();
            let enqueued = match chunk.generation().step() {
                GenerationStep::RawTerrain => self
                    .scheduler
                    .enqueue(RawTerrainJob::new(Arc::clone(&self.generator), bounds))
                    .map(GenerationJob::RawTerrain),
                GenerationStep::Accents => {
                    let neighborhood = StoreNeighborhood::new(
                        self.world.neighborhood(position, &PLANAR_NEIGHBOR_OFFSETS),
                    );
                    self.scheduler
                        .enqueue(AccentsJob::new(
                            self.accents,
                            bounds,
                            chunk.store().clone(),
                            neighborhood,
                        ))
                        .map(GenerationJob::Accents)
                }
                GenerationStep::Complete => continue,
            };

            match enqueued {
                Ok(job) => {
                    if let Some(chunk) = self.world.chunk_mut(position) {
                        chunk.generation_mut().begin();
                    }
                    self.jobs.entry(position).or_default().generation = Some(job);
                }
                Err(err) => {
                    warn!("Cannot dispatch generation for {:?}: {}", position, err);
                    return;
                }
            }
        }
    }

    /// Whether boundary queries for `position` can be answered: every planar face
    /// neighbour is complete, and a loaded vertical neighbour is complete too. Unloaded
    /// space above or below reads as empty.
    fn mesh_neighbors_ready(&self, position: Point3<i32>) -> bool {
        BlockSide::all().into_iter().all(|side| {
            match self.world.chunk(position + side.offset()) {
                Some(neighbor) => neighbor.generation().is_complete(),
                None => side.axis() == 1,
            }
        })
    }

    fn mesh_neighbor_stores(&self, position: Point3<i32>) -> Vec<(Volume, MtResource<VoxelOctree>)> {
        BlockSide::all()
            .into_iter()
            .filter_map(|side| self.world.chunk(position + side.offset()))
            .filter(|neighbor| neighbor.generation().is_complete())
            .map(|neighbor| (neighbor.bounds(), neighbor.store().clone()))
            .collect()
    }

    fn dispatch_meshes(&mut self) {
        for position in self.positions_by_distance() {
            if self.jobs.get(&position).is_some_and(|jobs| jobs.mesh.is_some()) {
                continue;
            }
            let Some(chunk) = self.world.chunk(position) else {
                continue;
            };
            if !chunk.meshing().is_dirty() {
                continue;
            }
            let complete = chunk.generation().is_complete();
            if !chunk
                .meshing()
                .can_dispatch(complete, complete && self.mesh_neighbors_ready(position))
            {
                continue;
            }

            let job = ChunkMeshJob::new(
                self.mesher.clone(),
                chunk.bounds(),
                chunk.store().clone(),
                NeighborStores::new(self.mesh_neighbor_stores(position)),
            );
            match self.scheduler.enqueue(job) {
                Ok(handle) => {
                    if let Some(chunk) = self.world.chunk_mut(position) {
                        chunk.meshing_mut().begin();
                    }
                    self.jobs.entry(position).or_default().mesh = Some(handle);
                }
                Err(err) => {
                    warn!("Cannot dispatch meshing for {:?}: {}", position, err);
                    return;
                }
            }
        }
    }
}
