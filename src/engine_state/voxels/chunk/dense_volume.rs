//! # Dense Volumes
//!
//! [`VoxelVolume`] is the read-only view the mesher works against. Both the chunk octree
//! and [`DenseVolume`], a flat `w × h × d` array, implement it, so a caller can mesh live
//! chunk storage or a detached snapshot of any shape.

use cgmath::Point3;

use crate::engine_state::voxels::block::VoxelId;

use super::octree::VoxelOctree;

/// Read access to a box of voxels with local coordinates in `[0, dimensions)`.
pub trait VoxelVolume {
    /// Extent along x, y and z.
    fn dimensions(&self) -> [usize; 3];

    /// Voxel at a local point inside the dimensions.
    fn voxel(&self, local: Point3<usize>) -> VoxelId;

    /// Whether every voxel is empty, if that can be answered without scanning.
    fn is_known_empty(&self) -> bool {
        false
    }
}

impl VoxelVolume for VoxelOctree {
    fn dimensions(&self) -> [usize; 3] {
        [self.size(); 3]
    }

    fn voxel(&self, local: Point3<usize>) -> VoxelId {
        self.get(local)
    }

    fn is_known_empty(&self) -> bool {
        self.uniform_value() == Some(VoxelId::EMPTY)
    }
}

/// Flat voxel array, x fastest, then y, then z.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseVolume {
    dimensions: [usize; 3],
    voxels: Vec<VoxelId>,
}

impl DenseVolume {
    /// A volume of `dimensions` with every voxel set to `fill`.
    pub fn new(dimensions: [usize; 3], fill: VoxelId) -> Self {
        DenseVolume {
            dimensions,
            voxels: vec![fill; dimensions[0] * dimensions[1] * dimensions[2]],
        }
    }

    /// Copies an octree into a flat array.
    pub fn from_octree(octree: &VoxelOctree) -> Self {
        let size = octree.size();
        let mut dense = DenseVolume::new([size; 3], VoxelId::EMPTY);
        octree.for_each_region(|min, region, value| {
            if value.is_empty() {
                return;
            }
            for z in min.z..min.z + region {
                for y in min.y..min.y + region {
                    for x in min.x..min.x + region {
                        dense.set(Point3::new(x, y, z), value);
                    }
                }
            }
        });
        dense
    }

    fn index(&self, local: Point3<usize>) -> usize {
        debug_assert!(
            local.x < self.dimensions[0]
                && local.y < self.dimensions[1]
                && local.z < self.dimensions[2],
            "{local:?} outside {:?}",
            self.dimensions
        );
        local.x + self.dimensions[0] * (local.y + self.dimensions[1] * local.z)
    }

    /// Writes one voxel.
    pub fn set(&mut self, local: Point3<usize>, value: VoxelId) {
        let index = self.index(local);
        self.voxels[index] = value;
    }

    /// Voxel count.
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    /// Whether any dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }
}

impl VoxelVolume for DenseVolume {
    fn dimensions(&self) -> [usize; 3] {
        self.dimensions
    }

    fn voxel(&self, local: Point3<usize>) -> VoxelId {
        self.voxels[self.index(local)]
    }
}
