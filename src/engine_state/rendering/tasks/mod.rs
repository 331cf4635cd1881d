//! Background tasks for the rendering side.
//!
//! # Available Tasks
//! - `ChunkMeshJob`: builds the mesh of one chunk on a worker

pub mod chunk_mesh_job;
