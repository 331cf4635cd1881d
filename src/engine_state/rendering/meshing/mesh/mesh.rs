//! Mesh buffers produced for one chunk.
//!
//! This module holds the output side of the mesher: the vertex buffer, the index buffer in
//! whichever width it needs, and the builder that appends faces to them in order.

use crate::engine_state::rendering::vertex::Vertex;

use super::face::{face_indices, Face};

/// Largest vertex count a 16-bit index buffer can address.
pub const MAX_U16_INDEXED_VERTICES: usize = u16::MAX as usize + 1;

/// Triangle list indices, narrowed to 16 bits whenever the vertex count allows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshIndices {
    /// Used while every vertex index fits in 16 bits.
    U16(Vec<u16>),
    /// Used once any vertex index needs more than 16 bits.
    U32(Vec<u32>),
}

impl MeshIndices {
    /// Picks the narrowest representation able to address `vertex_count` vertices.
    pub fn from_u32(indices: Vec<u32>, vertex_count: usize) -> Self {
        if vertex_count <= MAX_U16_INDEXED_VERTICES {
            MeshIndices::U16(indices.into_iter().map(|index| index as u16).collect())
        } else {
            MeshIndices::U32(indices)
        }
    }

    /// Number of indices.
    pub fn len(&self) -> usize {
        match self {
            MeshIndices::U16(indices) => indices.len(),
            MeshIndices::U32(indices) => indices.len(),
        }
    }

    /// Whether the buffer holds no indices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The index at `position`, widened.
    pub fn get(&self, position: usize) -> Option<u32> {
        match self {
            MeshIndices::U16(indices) => indices.get(position).map(|&index| index as u32),
            MeshIndices::U32(indices) => indices.get(position).copied(),
        }
    }

    /// Raw bytes, ready for an index buffer upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MeshIndices::U16(indices) => bytemuck::cast_slice(indices),
            MeshIndices::U32(indices) => bytemuck::cast_slice(indices),
        }
    }
}

impl Default for MeshIndices {
    fn default() -> Self {
        MeshIndices::U16(Vec::new())
    }
}

/// Geometry for one chunk, in chunk-local coordinates.
///
/// Every face contributes four vertices and six indices, so `vertices.len() / 4` is the
/// number of quads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkMesh {
    /// Four vertices per quad.
    pub vertices: Vec<Vertex>,
    /// Six indices per quad.
    pub indices: MeshIndices,
}

impl ChunkMesh {
    /// A mesh with no geometry, for chunks with nothing visible.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the buffer holds no indices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Number of quads in the mesh.
    pub fn quad_count(&self) -> usize {
        self.vertices.len() / 4
    }

    /// Number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex buffer as raw bytes, ready for upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

/// Accumulates faces into vertex and index buffers.
#[derive(Debug, Default)]
pub struct MeshBuilder {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    faces: u32,
}

impl MeshBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the four vertices and six indices of `face`.
    pub fn push_face(&mut self, face: &Face) {
        self.vertices.extend_from_slice(&face.vertices());
        self.indices.extend_from_slice(&face_indices(self.faces));
        self.faces += 1;
    }

    /// Finishes the mesh, narrowing indices to 16 bits when they fit.
    pub fn build(self) -> ChunkMesh {
        let vertex_count = self.vertices.len();
        ChunkMesh {
            vertices: self.vertices,
            indices: MeshIndices::from_u32(self.indices, vertex_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_indices_up_to_the_16_bit_ceiling() {
        let indices = vec![0, 1, 65_535];
        assert!(matches!(
            MeshIndices::from_u32(indices.clone(), MAX_U16_INDEXED_VERTICES),
            MeshIndices::U16(_)
        ));
        let wide = MeshIndices::from_u32(indices, MAX_U16_INDEXED_VERTICES + 1);
        assert!(matches!(wide, MeshIndices::U32(_)));
        assert_eq!(wide.get(2), Some(65_535));
        assert_eq!(wide.as_bytes().len(), 12);
    }

    #[test]
    fn each_pushed_face_becomes_one_quad() {
        use cgmath::Point3;

        use crate::engine_state::rendering::texture::UvRect;
        use crate::engine_state::voxels::block::block_side::BlockSide;
        use crate::engine_state::voxels::block::block_type::BlockType;

        let mut builder = MeshBuilder::new();
        for x in 0..3 {
            let cell = Point3::new(x, 0, 0);
            builder.push_face(&Face::unit(cell, BlockSide::TOP, BlockType::STONE.id(), UvRect::EMPTY));
        }
        let mesh = builder.build();
        assert_eq!(mesh.quad_count(), 3);
        assert_eq!(mesh.triangle_count(), 6);
        assert_eq!(mesh.vertices.len(), 12);
        assert_eq!(mesh.indices.get(12), Some(8));
    }

    #[test]
    fn empty_mesh_has_no_triangles() {
        let mesh = MeshBuilder::new().build();
        assert!(mesh.is_empty());
        assert_eq!(mesh.triangle_count(), 0);
        assert!(mesh.indices.is_empty());
    }
}
