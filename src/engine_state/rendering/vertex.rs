//! Vertex data structures for chunk meshes.
//!
//! This module defines the vertex format produced by the mesher. It is plain old data so a
//! renderer can upload `ChunkMesh::vertices` with `bytemuck::cast_slice` and no conversion.

use cgmath::Point3;

use crate::engine_state::voxels::block::block_side::BlockSide;

/// A vertex of a chunk mesh.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes), chunk-local
/// - Normal: [f32; 3] (12 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes), corner of the atlas region
/// - Repeat: [f32; 2] (8 bytes), position across the quad in voxels
///
/// Total size: 40 bytes
///
/// A merged quad spans several voxels but keeps the atlas region of a single voxel. The
/// `repeat` coordinate runs from `0` to the quad's width and height, so a shader can tile
/// the region once per voxel.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Chunk-local position.
    pub position: [f32; 3],
    /// Unit normal of the face.
    pub normal: [f32; 3],
    /// Atlas coordinate of this corner.
    pub tex_coords: [f32; 2],
    /// How often the tile repeats across a merged quad.
    pub repeat: [f32; 2],
}

impl Vertex {
    /// A vertex at a chunk-local corner of a face on `side`.
    pub fn new(position: Point3<usize>, side: BlockSide, tex_coords: [f32; 2], repeat: [f32; 2]) -> Self {
        Vertex {
            position: [position.x as f32, position.y as f32, position.z as f32],
            normal: side.normal(),
            tex_coords,
            repeat,
        }
    }
}
