//! Mesh generation for the voxel engine.
//!
//! This module turns chunk stores into renderer-ready geometry. Drawing itself belongs to
//! the host: a finished [`ChunkMesh`](meshing::ChunkMesh) is plain vertex and index data,
//! and the engine announces new meshes through `ChunkEvent::MeshChanged`.
//!
//! - `meshing`: the face-culling mesher and its greedy merge pass
//! - `tasks`: the mesh job run by the scheduler
//! - `texture`: the texture atlas consulted by the block registry
//! - `vertex`: the vertex format

pub mod meshing;
pub mod tasks;
pub mod texture;
pub mod vertex;

pub use vertex::Vertex;
