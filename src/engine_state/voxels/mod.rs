//! # Voxel Engine Core
//!
//! This module contains the voxel data model and the generation side of the pipeline.
//!
//! ## Architecture
//!
//! * **Block**: voxel ids, block definitions and the registry resolving them
//! * **Volume**: world-space bounds and global/local coordinate conversion
//! * **Chunk**: one octree-backed cube of voxels plus its generation and mesh state
//! * **Terrain**: the raw terrain generator contract and the bundled Perlin generator
//! * **Accents**: seeded tree placement that is seamless across chunk borders
//! * **World**: the chunk map, recycle pool, edit queue and change events
//! * **Tasks**: the generation jobs handed to the scheduler
//!
//! ## Data Flow
//!
//! 1. The world loads chunks around a focus point
//! 2. Each chunk runs `RawTerrain` and then, once its planar neighbours caught up,
//!    `Accents` on a worker; results are installed on the main thread
//! 3. Complete chunks accept gameplay edits through the queued edit path
//! 4. Terrain changes request meshes, which the rendering side builds
//!
//! ## Thread Safety
//!
//! Chunk stores are shared with workers as `MtResource` handles. Workers only read them;
//! every write happens on the main thread, either when a job result is installed or when
//! an edit is applied.

pub mod accents;
pub mod block;
pub mod chunk;
pub mod tasks;
pub mod terrain;
pub mod volume;
pub mod world;
