//! Mesh generation for voxel chunks.
//!
//! This module turns a voxel volume into triangle geometry by face culling: a voxel face is
//! emitted only when the voxel across it is empty or transparent. Faces on the outer shell
//! of the volume ask a [`BoundaryLookup`] what lies across the chunk border, so a chunk
//! never draws the wall between itself and a solid neighbour.
//!
//! # Algorithm
//! For every side, in [`BlockSide::all`] order, the volume is cut into layers along the
//! side's normal. Each layer fills a [`SliceMask`] with the ids of its exposed faces and
//! then emits either one quad per cell or, with greedy meshing enabled, the merged
//! rectangles from [`merge_slice`]. Faces only merge when their ids match, and because
//! texture regions depend only on `(id, side)` the merged quads keep the same look.
//!
//! # Output
//! - An empty volume produces [`ChunkMesh::empty`], not an error
//! - Output is deterministic for a fixed volume and boundary
//! - Index width switches to 32 bits once the vertex count leaves the 16-bit range
//!
//! # Cancellation
//! The mesher polls its [`CancellationToken`] once per layer and bails out with
//! [`MeshError::Cancelled`].

use std::sync::Arc;

use cgmath::Point3;
use thiserror::Error;

use crate::engine_state::{
    task_management::task::CancellationToken,
    voxels::{
        block::{block_side::BlockSide, BlockRegistry, VoxelId},
        chunk::dense_volume::VoxelVolume,
    },
};

pub mod mesh;

pub use mesh::{ChunkMesh, MeshIndices};
use mesh::{face_axes, merge_slice, unit_rects, Face, MaskRect, MeshBuilder, SliceMask};

/// Why a meshing job produced no mesh.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshError {
    /// The job's token tripped mid-mesh.
    #[error("meshing was cancelled")]
    Cancelled,
}

/// Read-only view of the voxels just outside a volume.
///
/// Implementations answer for global points across the volume's six faces. A point that
/// nothing is loaded for should read as [`VoxelId::EMPTY`].
pub trait BoundaryLookup {
    /// The voxel at a global point just outside the volume.
    fn get_voxel_or_boundary(&self, global: Point3<i32>) -> VoxelId;
}

impl<F> BoundaryLookup for F
where
    F: Fn(Point3<i32>) -> VoxelId,
{
    fn get_voxel_or_boundary(&self, global: Point3<i32>) -> VoxelId {
        self(global)
    }
}

/// Face-culling mesher bound to a block registry.
#[derive(Clone)]
pub struct Mesher {
    registry: Arc<BlockRegistry>,
    greedy: bool,
}

impl Mesher {
    /// A mesher over `registry`, merging faces when `greedy` is set.
    pub fn new(registry: Arc<BlockRegistry>, greedy: bool) -> Self {
        Mesher { registry, greedy }
    }

    /// Whether coplanar faces are merged.
    pub fn is_greedy(&self) -> bool {
        self.greedy
    }

    /// Meshes `volume`, whose local origin sits at the global point `origin`.
    pub fn mesh<V, B>(
        &self,
        volume: &V,
        origin: Point3<i32>,
        boundary: &B,
        cancel: &CancellationToken,
    ) -> Result<ChunkMesh, MeshError>
    where
        V: VoxelVolume + ?Sized,
        B: BoundaryLookup + ?Sized,
    {
        if volume.is_known_empty() {
            return Ok(ChunkMesh::empty());
        }

        let dimensions = volume.dimensions();
        let mut builder = MeshBuilder::new();

        for side in BlockSide::all() {
            let axis = side.axis();
            let (u, v) = face_axes(side);
            let mut mask = SliceMask::new(dimensions[u.index], dimensions[v.index]);

            for layer in 0..dimensions[axis] {
                if cancel.is_cancelled() {
                    return Err(MeshError::Cancelled);
                }

                let cell_at = |u_value: usize, v_value: usize| {
                    let mut cell = Point3::new(0, 0, 0);
                    cell[axis] = layer;
                    cell[u.index] = u_value;
                    cell[v.index] = v_value;
                    cell
                };

                mask.clear();
                for v_value in 0..mask.v_len() {
                    for u_value in 0..mask.u_len() {
                        let cell = cell_at(u_value, v_value);
                        let id = volume.voxel(cell);
                        if !id.is_empty() && self.is_exposed(volume, origin, boundary, cell, side) {
                            mask.set(u_value, v_value, id);
                        }
                    }
                }
                if mask.is_empty() {
                    continue;
                }

                let mut emit = |rect: MaskRect| {
                    builder.push_face(&Face {
                        cell: cell_at(rect.u, rect.v),
                        side,
                        width: rect.width,
                        height: rect.height,
                        id: rect.id,
                        uv: self.registry.uv(rect.id, side),
                    });
                };
                if self.greedy {
                    merge_slice(&mask, &mut emit);
                } else {
                    unit_rects(&mask, &mut emit);
                }
            }
        }

        Ok(builder.build())
    }

    /// Whether the face of `cell` on `side` can be seen.
    fn is_exposed<V, B>(
        &self,
        volume: &V,
        origin: Point3<i32>,
        boundary: &B,
        cell: Point3<usize>,
        side: BlockSide,
    ) -> bool
    where
        V: VoxelVolume + ?Sized,
        B: BoundaryLookup + ?Sized,
    {
        let dimensions = volume.dimensions();
        let offset = side.offset();
        let neighbor = Point3::new(
            cell.x as i32 + offset.x,
            cell.y as i32 + offset.y,
            cell.z as i32 + offset.z,
        );
        let inside = (0..3).all(|axis| neighbor[axis] >= 0 && (neighbor[axis] as usize) < dimensions[axis]);

        let id = if inside {
            volume.voxel(neighbor.cast::<usize>().unwrap_or(cell))
        } else {
            boundary.get_voxel_or_boundary(Point3::new(
                origin.x + neighbor.x,
                origin.y + neighbor.y,
                origin.z + neighbor.z,
            ))
        };
        id.is_empty() || self.registry.is_transparent(id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::engine_state::rendering::texture::UvRect;
    use crate::engine_state::voxels::block::block_type::BlockType;
    use crate::engine_state::voxels::chunk::dense_volume::DenseVolume;
    use crate::engine_state::voxels::chunk::octree::VoxelOctree;

    fn mesher(greedy: bool) -> Mesher {
        Mesher::new(Arc::new(BlockRegistry::with_defaults()), greedy)
    }

    fn empty_boundary(_: Point3<i32>) -> VoxelId {
        VoxelId::EMPTY
    }

    fn stone_boundary(_: Point3<i32>) -> VoxelId {
        BlockType::STONE.id()
    }

    fn mesh<V: VoxelVolume + ?Sized>(
        mesher: &Mesher,
        volume: &V,
        boundary: fn(Point3<i32>) -> VoxelId,
    ) -> ChunkMesh {
        mesher
            .mesh(volume, Point3::new(0, 0, 0), &boundary, &CancellationToken::new())
            .unwrap()
    }

    /// Unit voxel faces covered by a mesh, as `(normal, cell)` pairs.
    fn covered_faces(mesh: &ChunkMesh) -> HashSet<([i32; 3], [usize; 3])> {
        let mut covered = HashSet::new();
        for quad in mesh.vertices.chunks(4) {
            let normal = quad[0].normal.map(|n| n as i32);
            let min = (0..3).map(|axis| quad.iter().map(|vertex| vertex.position[axis]).fold(f32::MAX, f32::min));
            let max = (0..3).map(|axis| quad.iter().map(|vertex| vertex.position[axis]).fold(f32::MIN, f32::max));
            let (min, max): (Vec<f32>, Vec<f32>) = (min.collect(), max.collect());
            let mut ranges = [0..0, 0..0, 0..0];
            for axis in 0..3 {
                ranges[axis] = if normal[axis] != 0 {
                    let plane = min[axis] as usize;
                    let cell = if normal[axis] > 0 { plane - 1 } else { plane };
                    cell..cell + 1
                } else {
                    min[axis] as usize..max[axis] as usize
                };
            }
            for x in ranges[0].clone() {
                for y in ranges[1].clone() {
                    for z in ranges[2].clone() {
                        assert!(covered.insert((normal, [x, y, z])), "face covered twice");
                    }
                }
            }
        }
        covered
    }

    #[test]
    fn single_voxel_next_to_empty_emits_one_face() {
        let mut volume = DenseVolume::new([2, 1, 1], VoxelId::EMPTY);
        volume.set(Point3::new(0, 0, 0), BlockType::DIRT.id());

        for greedy in [false, true] {
            let mesh = mesh(&mesher(greedy), &volume, stone_boundary);
            assert_eq!(mesh.quad_count(), 1);
            assert_eq!(mesh.triangle_count(), 2);
            assert!(mesh.vertices.iter().all(|vertex| vertex.normal == [1.0, 0.0, 0.0]));
            assert!(mesh.vertices.iter().all(|vertex| vertex.position[0] == 1.0));
        }
    }

    #[test]
    fn empty_chunk_meshes_to_nothing() {
        let octree = VoxelOctree::new(32, VoxelId::EMPTY);
        let mesh = mesh(&mesher(true), &octree, stone_boundary);
        assert!(mesh.is_empty());
        assert_eq!(mesh.triangle_count(), 0);

        let dense = DenseVolume::new([4, 4, 4], VoxelId::EMPTY);
        assert!(self::mesh(&mesher(false), &dense, empty_boundary).is_empty());
    }

    #[test]
    fn solid_chunk_is_occluded_by_solid_neighbors() {
        let octree = VoxelOctree::new(32, BlockType::STONE.id());
        assert_eq!(mesh(&mesher(false), &octree, stone_boundary).triangle_count(), 0);
    }

    #[test]
    fn solid_chunk_in_open_space_exposes_its_shell() {
        let octree = VoxelOctree::new(32, BlockType::STONE.id());
        let naive = mesh(&mesher(false), &octree, empty_boundary);
        assert_eq!(naive.quad_count(), 6 * 32 * 32);
        assert!(matches!(naive.indices, MeshIndices::U16(_)));

        let greedy = mesh(&mesher(true), &octree, empty_boundary);
        assert_eq!(greedy.quad_count(), 6);
        assert_eq!(covered_faces(&greedy), covered_faces(&naive));
    }

    #[test]
    fn greedy_output_covers_the_same_surface() {
        let mut rng = fastrand::Rng::with_seed(42);
        let palette = [
            VoxelId::EMPTY,
            BlockType::STONE.id(),
            BlockType::DIRT.id(),
            BlockType::LEAVES.id(),
        ];
        for _ in 0..10 {
            let volume = VoxelOctree::from_fn(8, |_| palette[rng.usize(0..palette.len())]);
            let naive = mesh(&mesher(false), &volume, empty_boundary);
            let greedy = mesh(&mesher(true), &volume, empty_boundary);
            assert!(greedy.quad_count() <= naive.quad_count());
            assert_eq!(covered_faces(&greedy), covered_faces(&naive));
        }
    }

    #[test]
    fn transparent_neighbors_do_not_hide_faces() {
        let mut volume = DenseVolume::new([2, 1, 1], BlockType::STONE.id());
        volume.set(Point3::new(1, 0, 0), BlockType::LEAVES.id());
        let mesh = mesh(&mesher(false), &volume, stone_boundary);
        // Only the stone's +X face shows; the leaves sit against opaque stone on every side.
        assert_eq!(mesh.quad_count(), 1);
        assert!(mesh.vertices.iter().all(|vertex| vertex.normal == [1.0, 0.0, 0.0]));
    }

    #[test]
    fn large_meshes_switch_to_wide_indices() {
        let checkerboard =
            VoxelOctree::from_fn(32, |p| if (p.x + p.y + p.z) % 2 == 0 { BlockType::STONE.id() } else { VoxelId::EMPTY });
        let mesh = mesh(&mesher(true), &checkerboard, empty_boundary);
        assert_eq!(mesh.quad_count(), 32 * 32 * 32 / 2 * 6);
        assert!(matches!(mesh.indices, MeshIndices::U32(_)));
        let last = mesh.indices.get(mesh.indices.len() - 1).unwrap();
        assert!(last as usize >= u16::MAX as usize);
    }

    #[test]
    fn output_is_deterministic() {
        let mut rng = fastrand::Rng::with_seed(3);
        let volume = VoxelOctree::from_fn(16, |_| if rng.bool() { BlockType::GRASS.id() } else { VoxelId::EMPTY });
        let first = mesh(&mesher(true), &volume, stone_boundary);
        let second = mesh(&mesher(true), &volume, stone_boundary);
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_ids_still_mesh_without_texture() {
        let volume = DenseVolume::new([1, 1, 1], VoxelId(999));
        let mesh = mesh(&mesher(false), &volume, empty_boundary);
        assert_eq!(mesh.quad_count(), 6);
        let corners = UvRect::EMPTY.corners();
        assert!(mesh.vertices.iter().all(|vertex| corners.contains(&vertex.tex_coords)));
    }

    #[test]
    fn cancelled_token_stops_meshing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let volume = VoxelOctree::new(8, BlockType::STONE.id());
        let result = mesher(true).mesh(&volume, Point3::new(0, 0, 0), &empty_boundary, &cancel);
        assert_eq!(result, Err(MeshError::Cancelled));
    }
}
