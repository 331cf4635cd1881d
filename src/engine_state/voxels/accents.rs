//! # Accents
//!
//! Surface decoration applied in the `Accents` step. The bundled accent is trees.
//!
//! Whether a column grows a tree, and how tall, is a pure function of the world seed and
//! the column coordinate. The base of the tree is the topmost grass voxel of the column's
//! raw terrain, read from whichever chunk holds that column. Every chunk evaluates all
//! trees whose canopy can reach into it, in global column order, and writes only its own
//! voxels. Two chunks therefore always agree on a tree that straddles their border, which
//! is why a chunk may only decorate once its planar neighbours have raw terrain.
//!
//! Vertical neighbours are not consulted, so a tree only grows when trunk and canopy fit
//! inside the layer of chunks holding its base.

use std::ops::Range;

use cgmath::Point3;

use crate::engine_state::task_management::task::CancellationToken;

use super::block::block_type::BlockType;
use super::block::VoxelId;
use super::chunk::octree::VoxelOctree;
use super::terrain::GenerationError;
use super::volume::Volume;

/// One column in this many grows a tree.
pub const TREE_RARITY: u32 = 60;
/// Shortest tree trunk, in voxels.
pub const MIN_TRUNK_HEIGHT: i32 = 4;
/// Tallest tree trunk, in voxels.
pub const MAX_TRUNK_HEIGHT: i32 = 6;
/// Horizontal reach of the canopy from the trunk.
pub const CANOPY_RADIUS: i32 = 2;

/// Read access to raw terrain columns around the chunk being decorated.
pub trait TerrainColumns {
    /// Fills `out` with the voxels of column `(x, z)` for the heights in `ys`, bottom to
    /// top. Returns `false` when that column is not available.
    fn column(&self, x: i32, z: i32, ys: Range<i32>, out: &mut Vec<VoxelId>) -> bool;
}

fn is_accent(id: VoxelId) -> bool {
    id == BlockType::WOOD.id() || id == BlockType::LEAVES.id()
}

/// Deterministic per-column seed.
fn column_seed(seed: u32, x: i32, z: i32) -> u64 {
    let mut hash = seed as u64 ^ 0x9E37_79B9_7F4A_7C15;
    for value in [x as u32 as u64, z as u32 as u64] {
        hash = (hash ^ value).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        hash ^= hash >> 31;
    }
    hash
}

/// Tree placement for one world seed.
#[derive(Debug, Clone, Copy)]
pub struct Accents {
    seed: u32,
}

impl Accents {
    /// Accents placed deterministically from `seed`.
    pub fn new(seed: u32) -> Self {
        Accents { seed }
    }

    /// Trunk height if the column at `(x, z)` grows a tree.
    pub fn tree_height(&self, x: i32, z: i32) -> Option<i32> {
        let mut rng = fastrand::Rng::with_seed(column_seed(self.seed, x, z));
        (rng.u32(0..TREE_RARITY) == 0).then(|| rng.i32(MIN_TRUNK_HEIGHT..=MAX_TRUNK_HEIGHT))
    }

    /// Grows every tree that reaches into `bounds`, writing into `target`.
    ///
    /// `target` holds the chunk's raw terrain and receives the accents; `columns` answers
    /// for this chunk and its planar neighbours. Returns the number of voxels written.
    pub fn decorate<C: TerrainColumns + ?Sized>(
        &self,
        target: &mut VoxelOctree,
        bounds: Volume,
        columns: &C,
        cancel: &CancellationToken,
    ) -> Result<usize, GenerationError> {
        let ys = bounds.min.y..bounds.max().y;
        let max = bounds.max();
        let mut column = Vec::with_capacity(bounds.size as usize);
        let mut written = 0;

        for z in bounds.min.z - CANOPY_RADIUS..max.z + CANOPY_RADIUS {
            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }
            for x in bounds.min.x - CANOPY_RADIUS..max.x + CANOPY_RADIUS {
                let Some(trunk) = self.tree_height(x, z) else {
                    continue;
                };
                if !columns.column(x, z, ys.clone(), &mut column) {
                    return Err(GenerationError::Unavailable);
                }
                let Some(base) = surface(&column).map(|index| ys.start + index as i32) else {
                    continue;
                };
                let top = base + trunk;
                if top + 1 >= ys.end {
                    continue;
                }
                written += grow_tree(target, bounds, Point3::new(x, base, z), top);
            }
        }
        Ok(written)
    }
}

/// Index of the topmost grass voxel with nothing but air or accents above it.
fn surface(column: &[VoxelId]) -> Option<usize> {
    let grass = BlockType::GRASS.id();
    for index in (0..column.len()).rev() {
        let id = column[index];
        if id == grass {
            return Some(index);
        }
        if !id.is_empty() && !is_accent(id) {
            return None;
        }
    }
    None
}

/// Writes the part of one tree that lies inside `bounds`.
fn grow_tree(target: &mut VoxelOctree, bounds: Volume, base: Point3<i32>, top: i32) -> usize {
    let (wood, leaves) = (BlockType::WOOD.id(), BlockType::LEAVES.id());
    let mut written = 0;

    let mut place = |point: Point3<i32>, id: VoxelId, replaces: &dyn Fn(VoxelId) -> bool| {
        if let Some(local) = bounds.to_local(point) {
            let current = target.get(local);
            if replaces(current) && target.set(local, id) {
                written += 1;
            }
        }
    };

    for y in base.y + 1..=top {
        place(Point3::new(base.x, y, base.z), wood, &|current| {
            current.is_empty() || current == leaves
        });
    }
    for y in top - 2..=top + 1 {
        let radius = if y >= top { 1 } else { CANOPY_RADIUS };
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                if radius == CANOPY_RADIUS && dx.abs() == radius && dz.abs() == radius {
                    continue;
                }
                place(Point3::new(base.x + dx, y, base.z + dz), leaves, &|current| {
                    current.is_empty()
                });
            }
        }
    }
    written
}
