//! # Voxel Task System
//!
//! Generation jobs run by the scheduler, one per step of the chunk state machine:
//!
//! - `RawTerrainJob`: samples the terrain generator for a chunk's bounds
//! - `AccentsJob`: decorates a copy of the raw terrain using the planar neighbours
//!
//! Both return their output by value; the engine installs it on the main thread.

pub mod accents_job;
pub mod raw_terrain_job;
