//! # Chunk Generation State Machine
//!
//! Every chunk walks `RawTerrain → Accents → Complete` exactly once per load. The step a
//! chunk is in names the job it still has to run; a chunk in `Accents` has finished its raw
//! terrain. Steps never skip and never go backwards, except through [`GenerationState::reset`]
//! when a chunk is recycled.
//!
//! A step may only start when no job for the chunk is in flight and every planar neighbour
//! has reached at least the same step. Accents read neighbour terrain near the border, so a
//! chunk must not decorate before the chunks around it have their raw terrain.
//!
//! Meshing is tracked separately by [`MeshTracker`]: a rebuild can be requested at any time,
//! but only dispatches once terrain is complete and the face neighbours can answer boundary
//! queries.

use std::time::Duration;

use cgmath::Vector3;

/// The eight horizontal neighbours (edges and corners), y being up.
pub const PLANAR_NEIGHBOR_OFFSETS: [Vector3<i32>; 8] = [
    Vector3::new(-1, 0, -1),
    Vector3::new(0, 0, -1),
    Vector3::new(1, 0, -1),
    Vector3::new(-1, 0, 0),
    Vector3::new(1, 0, 0),
    Vector3::new(-1, 0, 1),
    Vector3::new(0, 0, 1),
    Vector3::new(1, 0, 1),
];

/// The chunks directly above and below.
pub const VERTICAL_NEIGHBOR_OFFSETS: [Vector3<i32>; 2] =
    [Vector3::new(0, 1, 0), Vector3::new(0, -1, 0)];

/// Pipeline step a chunk is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GenerationStep {
    /// Waiting for noise terrain.
    RawTerrain,
    /// Terrain installed; waiting for trees and other cross-chunk features.
    Accents,
    /// Fully generated; readable and editable.
    Complete,
}

impl GenerationStep {
    /// The step after this one. `Complete` is terminal.
    pub fn next(self) -> GenerationStep {
        match self {
            GenerationStep::RawTerrain => GenerationStep::Accents,
            GenerationStep::Accents | GenerationStep::Complete => GenerationStep::Complete,
        }
    }
}

/// Per-chunk generation progress.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationState {
    step: GenerationStep,
    generating: bool,
    tier_time: Duration,
}

impl Default for GenerationState {
    fn default() -> Self {
        GenerationState {
            step: GenerationStep::RawTerrain,
            generating: false,
            tier_time: Duration::ZERO,
        }
    }
}

impl GenerationState {
    /// The step whose job runs next.
    pub fn step(&self) -> GenerationStep {
        self.step
    }

    /// Whether the current step's job is in flight.
    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// Whether generation has reached `Complete`.
    pub fn is_complete(&self) -> bool {
        self.step == GenerationStep::Complete
    }

    /// Job time spent on this chunk since it was loaded.
    pub fn tier_time(&self) -> Duration {
        self.tier_time
    }

    /// Transition guard for starting the job of the current step.
    ///
    /// `neighbors` holds the step of each gating neighbour, `None` when that neighbour is
    /// not loaded. Raw terrain reads nothing outside its own bounds and ignores them.
    pub fn can_start(&self, neighbors: &[Option<GenerationStep>]) -> bool {
        if self.generating || self.step == GenerationStep::Complete {
            return false;
        }
        if self.step == GenerationStep::RawTerrain {
            return true;
        }
        neighbors
            .iter()
            .all(|neighbor| matches!(neighbor, Some(step) if *step >= self.step))
    }

    /// Marks the current step's job as in flight.
    pub fn begin(&mut self) {
        debug_assert!(!self.generating, "chunk already generating");
        self.generating = true;
    }

    /// Advances after the current step's job finished and returns the new step.
    pub fn finish(&mut self, elapsed: Duration) -> GenerationStep {
        debug_assert!(self.generating, "finished a step that was never started");
        self.generating = false;
        self.tier_time += elapsed;
        self.step = self.step.next();
        self.step
    }

    /// Clears the in-flight flag without advancing; the step is retried later.
    pub fn abort(&mut self) {
        self.generating = false;
    }

    /// Back to the initial state, for pooled chunks.
    pub fn reset(&mut self) {
        *self = GenerationState::default();
    }
}

/// Lifecycle of a chunk's mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshState {
    /// No mesh has been requested.
    Unmeshed,
    /// A mesh is wanted but terrain or neighbours are not ready yet.
    PendingGeneration,
    /// A mesh job is in flight.
    MeshPending,
    /// The latest mesh has been handed to the chunk.
    Meshed,
}

/// Mesh lifecycle of one chunk, plus whether its mesh is stale.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshTracker {
    state: MeshState,
    dirty: bool,
    has_mesh: bool,
}

impl Default for MeshTracker {
    fn default() -> Self {
        MeshTracker {
            state: MeshState::Unmeshed,
            dirty: false,
            has_mesh: false,
        }
    }
}

impl MeshTracker {
    /// Where meshing is in its lifecycle.
    pub fn state(&self) -> MeshState {
        self.state
    }

    /// Whether a rebuild has been requested and not yet dispatched.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Requests a rebuild after terrain completion or a voxel change.
    pub fn request(&mut self) {
        self.dirty = true;
        if self.state == MeshState::Unmeshed {
            self.state = MeshState::PendingGeneration;
        }
    }

    /// Dispatch guard: a rebuild is wanted, none is in flight, terrain is complete and the
    /// neighbours needed for boundary faces are ready.
    pub fn can_dispatch(&self, generation_complete: bool, neighbors_ready: bool) -> bool {
        self.dirty && self.state != MeshState::MeshPending && generation_complete && neighbors_ready
    }

    /// Marks a mesh job as in flight.
    pub fn begin(&mut self) {
        self.dirty = false;
        self.state = MeshState::MeshPending;
    }

    /// The job's mesh was installed. A request that arrived meanwhile stays dirty.
    pub fn finish(&mut self) {
        self.has_mesh = true;
        self.state = MeshState::Meshed;
    }

    /// The job was lost or cancelled; keep the previous mesh and ask again.
    pub fn abort(&mut self) {
        self.dirty = true;
        self.state = if self.has_mesh {
            MeshState::Meshed
        } else {
            MeshState::PendingGeneration
        };
    }

    /// Forgets any mesh state, for pooled chunks.
    pub fn reset(&mut self) {
        *self = MeshTracker::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_neighbors(step: Option<GenerationStep>) -> [Option<GenerationStep>; 8] {
        [step; 8]
    }

    #[test]
    fn accents_wait_for_a_missing_neighbor() {
        let mut state = GenerationState::default();
        assert!(state.can_start(&all_neighbors(None)));
        state.begin();
        assert_eq!(state.finish(Duration::from_millis(3)), GenerationStep::Accents);

        let mut neighbors = all_neighbors(Some(GenerationStep::Accents));
        neighbors[5] = None;
        assert!(!state.can_start(&neighbors));
    }

    #[test]
    fn accents_wait_for_neighbor_raw_terrain() {
        let mut state = GenerationState::default();
        state.begin();
        state.finish(Duration::ZERO);

        let mut neighbors = all_neighbors(Some(GenerationStep::Complete));
        neighbors[0] = Some(GenerationStep::RawTerrain);
        assert!(!state.can_start(&neighbors));

        neighbors[0] = Some(GenerationStep::Accents);
        assert!(state.can_start(&neighbors));
    }

    #[test]
    fn in_flight_and_complete_chunks_cannot_start() {
        let mut state = GenerationState::default();
        state.begin();
        assert!(!state.can_start(&all_neighbors(Some(GenerationStep::Complete))));
        state.abort();
        assert_eq!(state.step(), GenerationStep::RawTerrain);
        assert!(state.can_start(&[]));

        state.begin();
        state.finish(Duration::from_millis(1));
        state.begin();
        state.finish(Duration::from_millis(2));
        assert!(state.is_complete());
        assert_eq!(state.tier_time(), Duration::from_millis(3));
        assert!(!state.can_start(&all_neighbors(Some(GenerationStep::Complete))));

        state.reset();
        assert_eq!(state, GenerationState::default());
    }

    #[test]
    fn mesh_requests_during_flight_trigger_another_build() {
        let mut tracker = MeshTracker::default();
        assert!(!tracker.can_dispatch(true, true));

        tracker.request();
        assert_eq!(tracker.state(), MeshState::PendingGeneration);
        assert!(!tracker.can_dispatch(false, true));
        assert!(!tracker.can_dispatch(true, false));
        assert!(tracker.can_dispatch(true, true));

        tracker.begin();
        assert!(!tracker.can_dispatch(true, true));
        tracker.request();
        assert!(!tracker.can_dispatch(true, true));

        tracker.finish();
        assert_eq!(tracker.state(), MeshState::Meshed);
        assert!(tracker.can_dispatch(true, true));
    }

    #[test]
    fn aborted_first_mesh_returns_to_pending() {
        let mut tracker = MeshTracker::default();
        tracker.request();
        tracker.begin();
        tracker.abort();
        assert_eq!(tracker.state(), MeshState::PendingGeneration);
        assert!(tracker.is_dirty());
    }
}
