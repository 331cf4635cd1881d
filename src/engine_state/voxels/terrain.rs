//! # Terrain Generation
//!
//! The noise side of the `RawTerrain` step. A [`TerrainGenerator`] turns the world-space
//! bounds of a chunk into voxel ids; the engine only ever talks to the trait, so hosts can
//! plug in their own generator.
//!
//! [`PerlinTerrain`] is the bundled generator: a 2D Perlin height field gives rolling
//! hills, layered grass or sand over dirt over stone, and a 3D Perlin field carves caves
//! below the surface.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use cgmath::Point3;
use lru::LruCache;
use noise::{NoiseFn, Perlin};
use thiserror::Error;

use crate::engine_state::task_management::task::CancellationToken;

use super::block::block_type::BlockType;
use super::block::VoxelId;
use super::chunk::dense_volume::{DenseVolume, VoxelVolume};
use super::chunk::octree::VoxelOctree;
use super::volume::Volume;

/// Why a generation step produced nothing this time. Both are retried on a later tick.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationError {
    /// The backing data is not ready yet.
    #[error("terrain data is unavailable for these bounds")]
    Unavailable,
    /// The job's token tripped mid-build.
    #[error("generation was cancelled")]
    Cancelled,
}

/// Raw voxel content for one chunk's bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainSample {
    /// The bounds that were sampled.
    pub bounds: Volume,
    /// Voxels in chunk-local coordinates.
    pub voxels: VoxelOctree,
}

/// Source of raw terrain.
pub trait TerrainGenerator: Send + Sync {
    /// Generates the voxels of `bounds`. Implementations should return
    /// [`GenerationError::Unavailable`] rather than block when their data is not ready.
    fn sample(
        &self,
        bounds: Volume,
        cancel: &CancellationToken,
    ) -> Result<TerrainSample, GenerationError>;
}

/// Builds a `size³` octree from `voxel`, one z slab at a time.
///
/// The token is checked before every slab, so a cancelled build stops within one slab of
/// evaluations instead of finishing the chunk.
pub fn build_cancellable<F: FnMut(Point3<usize>) -> VoxelId>(
    size: usize,
    cancel: &CancellationToken,
    mut voxel: F,
) -> Result<VoxelOctree, GenerationError> {
    let mut dense = DenseVolume::new([size; 3], VoxelId::EMPTY);
    for z in 0..size {
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        for y in 0..size {
            for x in 0..size {
                let local = Point3::new(x, y, z);
                dense.set(local, voxel(local));
            }
        }
    }
    Ok(VoxelOctree::from_fn(size, |local| dense.voxel(local)))
}

/// Scaling factor applied to world coordinates when sampling the height field.
pub const HEIGHT_SCALE_FACTOR: f64 = 0.01;
/// Scaling factor for the finer detail octave of the height field.
pub const DETAIL_SCALE_FACTOR: f64 = 0.04;
/// Scaling factor applied to world coordinates when sampling cave noise.
pub const CAVE_SCALE_FACTOR: f64 = 0.02;
/// Cave noise above this value is carved out.
pub const CAVE_THRESHOLD: f64 = 0.35;
/// Surface height where the height field reads zero.
pub const BASE_HEIGHT: i32 = 16;
/// Height-field units to voxels.
pub const HEIGHT_AMPLITUDE: f64 = 24.0;
/// Surfaces at or below this height are sand instead of grass.
pub const SAND_LEVEL: i32 = 6;
/// Dirt layers between the surface and stone.
pub const DIRT_DEPTH: i32 = 3;
/// Height maps kept for vertically stacked chunks.
const HEIGHT_MAP_CACHE: usize = 256;

/// Perlin hills with caves.
pub struct PerlinTerrain {
    seed: u32,
    height: Perlin,
    detail: Perlin,
    caves: Perlin,
    height_maps: Mutex<LruCache<(i32, i32, i32), Arc<[i32]>>>,
}

impl PerlinTerrain {
    /// A generator whose noise fields derive from `seed`.
    pub fn new(seed: u32) -> Self {
        PerlinTerrain {
            seed,
            height: Perlin::new(seed),
            detail: Perlin::new(seed.wrapping_add(1)),
            caves: Perlin::new(seed.wrapping_add(2)),
            height_maps: Mutex::new(LruCache::new(
                NonZeroUsize::new(HEIGHT_MAP_CACHE).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// The seed this generator was built with.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Surface height of the column at `(x, z)`: the highest solid voxel.
    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        let (x, z) = (x as f64, z as f64);
        let broad = self.height.get([x * HEIGHT_SCALE_FACTOR, z * HEIGHT_SCALE_FACTOR]);
        let detail = self.detail.get([x * DETAIL_SCALE_FACTOR, z * DETAIL_SCALE_FACTOR]);
        BASE_HEIGHT + ((broad + 0.25 * detail) * HEIGHT_AMPLITUDE).round() as i32
    }

    /// Column heights for the footprint of `bounds`, x fastest.
    fn height_map(&self, bounds: Volume) -> Arc<[i32]> {
        let key = (bounds.min.x, bounds.min.z, bounds.size);
        let mut cache = self.height_maps.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(heights) = cache.get(&key) {
            return Arc::clone(heights);
        }
        let size = bounds.size;
        let heights: Arc<[i32]> = (0..size * size)
            .map(|i| self.surface_height(bounds.min.x + i % size, bounds.min.z + i / size))
            .collect();
        cache.put(key, Arc::clone(&heights));
        heights
    }

    /// The voxel at `global` given the column's surface height.
    fn voxel_at(&self, global: Point3<i32>, surface: i32) -> VoxelId {
        if global.y > surface {
            return VoxelId::EMPTY;
        }
        let depth = surface - global.y;
        if depth > DIRT_DEPTH - 1 {
            let cave = self.caves.get([
                global.x as f64 * CAVE_SCALE_FACTOR,
                global.y as f64 * CAVE_SCALE_FACTOR,
                global.z as f64 * CAVE_SCALE_FACTOR,
            ]);
            if cave > CAVE_THRESHOLD {
                return VoxelId::EMPTY;
            }
        }
        let block = match depth {
            0 if surface <= SAND_LEVEL => BlockType::SAND,
            0 => BlockType::GRASS,
            d if d < DIRT_DEPTH => BlockType::DIRT,
            _ => BlockType::STONE,
        };
        block.id()
    }
}

impl TerrainGenerator for PerlinTerrain {
    fn sample(
        &self,
        bounds: Volume,
        cancel: &CancellationToken,
    ) -> Result<TerrainSample, GenerationError> {
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        let heights = self.height_map(bounds);
        let size = bounds.size;
        let highest = heights.iter().copied().max().unwrap_or(i32::MIN);

        // Entirely above the surface: skip the per-voxel pass.
        if bounds.min.y > highest {
            return Ok(TerrainSample {
                bounds,
                voxels: VoxelOctree::new(size as usize, VoxelId::EMPTY),
            });
        }

        let voxels = build_cancellable(size as usize, cancel, |local| {
            let global = bounds.to_global(local);
            let surface = heights[local.x + local.z * size as usize];
            self.voxel_at(global, surface)
        })?;
        Ok(TerrainSample { bounds, voxels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::chunk::CHUNK_DIMENSION;

    #[test]
    fn same_seed_generates_the_same_chunk() {
        let bounds = Volume::of_chunk(Point3::new(1, 0, -2), CHUNK_DIMENSION);
        let a = PerlinTerrain::new(11).sample(bounds, &CancellationToken::new()).unwrap();
        let b = PerlinTerrain::new(11).sample(bounds, &CancellationToken::new()).unwrap();
        assert_eq!(a, b);
        assert!(a.voxels.check_invariants());
    }

    #[test]
    fn surface_layers_follow_the_height_field() {
        let terrain = PerlinTerrain::new(5);
        let bounds = Volume::of_chunk(Point3::new(0, 0, 0), CHUNK_DIMENSION);
        let sample = terrain.sample(bounds, &CancellationToken::new()).unwrap();

        for (x, z) in [(0, 0), (7, 19), (31, 31)] {
            let surface = terrain.surface_height(x, z);
            if !(0..CHUNK_DIMENSION - 1).contains(&surface) {
                continue;
            }
            let top = sample.voxels.get(Point3::new(x as usize, surface as usize, z as usize));
            assert!(top == BlockType::GRASS.id() || top == BlockType::SAND.id());
            let above = sample.voxels.get(Point3::new(x as usize, surface as usize + 1, z as usize));
            assert_eq!(above, VoxelId::EMPTY);
        }
    }

    #[test]
    fn sky_chunks_are_uniform_air() {
        let bounds = Volume::of_chunk(Point3::new(0, 10, 0), CHUNK_DIMENSION);
        let sample = PerlinTerrain::new(0).sample(bounds, &CancellationToken::new()).unwrap();
        assert_eq!(sample.voxels.uniform_value(), Some(VoxelId::EMPTY));
    }

    #[test]
    fn cancelling_mid_build_stops_at_the_next_slab() {
        let cancel = CancellationToken::new();
        let mut evaluated = 0;
        let built = build_cancellable(8, &cancel, |local| {
            evaluated += 1;
            if local.z == 2 {
                cancel.cancel();
            }
            BlockType::STONE.id()
        });
        assert_eq!(built, Err(GenerationError::Cancelled));
        assert_eq!(evaluated, 3 * 8 * 8);
    }

    #[test]
    fn an_uncancelled_build_matches_the_voxel_function() {
        let built = build_cancellable(8, &CancellationToken::new(), |local| {
            if local.y < 3 {
                BlockType::DIRT.id()
            } else {
                VoxelId::EMPTY
            }
        })
        .unwrap();
        assert_eq!(built.get(Point3::new(5, 2, 7)), BlockType::DIRT.id());
        assert_eq!(built.get(Point3::new(5, 3, 7)), VoxelId::EMPTY);
        assert!(built.check_invariants());
    }

    #[test]
    fn cancelled_sampling_returns_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let bounds = Volume::of_chunk(Point3::new(0, 0, 0), CHUNK_DIMENSION);
        assert_eq!(
            PerlinTerrain::new(0).sample(bounds, &cancel),
            Err(GenerationError::Cancelled)
        );
    }
}
