//! # Volume Module
//!
//! Axis-aligned cubic regions in world space. A [`Volume`] is the bounds of one chunk, and
//! the conversions here are the only place global and chunk-local coordinates meet.

use cgmath::{Point3, Vector3};

use super::block::block_side::{BlockSide, SideSet};

/// An axis-aligned cube of `size³` voxels starting at `min` (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Volume {
    /// Lowest corner, inclusive.
    pub min: Point3<i32>,
    /// Edge length in voxels.
    pub size: i32,
}

impl Volume {
    /// A cube of `size` voxels per edge at `min`.
    pub fn new(min: Point3<i32>, size: i32) -> Self {
        debug_assert!(size > 0, "volume size must be positive");
        Volume { min, size }
    }

    /// Bounds of the chunk at `chunk_position` for chunks of `chunk_dimension` voxels.
    pub fn of_chunk(chunk_position: Point3<i32>, chunk_dimension: i32) -> Self {
        Volume::new(
            Point3::new(
                chunk_position.x * chunk_dimension,
                chunk_position.y * chunk_dimension,
                chunk_position.z * chunk_dimension,
            ),
            chunk_dimension,
        )
    }

    /// Exclusive upper corner.
    pub fn max(&self) -> Point3<i32> {
        self.min + Vector3::new(self.size, self.size, self.size)
    }

    /// Whether `point` lies inside.
    pub fn contains(&self, point: Point3<i32>) -> bool {
        let max = self.max();
        (self.min.x..max.x).contains(&point.x)
            && (self.min.y..max.y).contains(&point.y)
            && (self.min.z..max.z).contains(&point.z)
    }

    /// Whether the two cubes share any voxel.
    pub fn intersects(&self, other: &Volume) -> bool {
        let (a_max, b_max) = (self.max(), other.max());
        self.min.x < b_max.x
            && other.min.x < a_max.x
            && self.min.y < b_max.y
            && other.min.y < a_max.y
            && self.min.z < b_max.z
            && other.min.z < a_max.z
    }

    /// Voxel count.
    pub fn volume(&self) -> usize {
        (self.size as usize).pow(3)
    }

    /// Converts a global point to local coordinates, or `None` if it lies outside.
    pub fn to_local(&self, point: Point3<i32>) -> Option<Point3<usize>> {
        if !self.contains(point) {
            return None;
        }
        Some(Point3::new(
            (point.x - self.min.x) as usize,
            (point.y - self.min.y) as usize,
            (point.z - self.min.z) as usize,
        ))
    }

    /// Global position of a local voxel.
    pub fn to_global(&self, local: Point3<usize>) -> Point3<i32> {
        Point3::new(
            self.min.x + local.x as i32,
            self.min.y + local.y as i32,
            self.min.z + local.z as i32,
        )
    }

    /// Faces of this volume that the local point lies directly against.
    ///
    /// An edit on such a voxel can change what the neighbour across that face exposes.
    pub fn boundary_sides(&self, local: Point3<usize>) -> SideSet {
        let last = (self.size - 1) as usize;
        let mut sides = SideSet::empty();
        if local.x == 0 {
            sides.insert(BlockSide::LEFT);
        }
        if local.x == last {
            sides.insert(BlockSide::RIGHT);
        }
        if local.y == 0 {
            sides.insert(BlockSide::BOTTOM);
        }
        if local.y == last {
            sides.insert(BlockSide::TOP);
        }
        if local.z == 0 {
            sides.insert(BlockSide::BACK);
        }
        if local.z == last {
            sides.insert(BlockSide::FRONT);
        }
        sides
    }
}

/// Chunk coordinate containing `global` for chunks of `chunk_dimension` voxels.
pub fn chunk_coordinate_of(global: Point3<i32>, chunk_dimension: i32) -> Point3<i32> {
    Point3::new(
        global.x.div_euclid(chunk_dimension),
        global.y.div_euclid(chunk_dimension),
        global.z.div_euclid(chunk_dimension),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_coordinates_map_to_the_lower_chunk() {
        assert_eq!(chunk_coordinate_of(Point3::new(-1, 0, 31), 32), Point3::new(-1, 0, 0));
        assert_eq!(chunk_coordinate_of(Point3::new(-32, -33, 32), 32), Point3::new(-1, -2, 1));
    }

    #[test]
    fn local_and_global_round_trip() {
        let bounds = Volume::of_chunk(Point3::new(-1, 2, 0), 16);
        let global = Point3::new(-3, 40, 15);
        let local = bounds.to_local(global).unwrap();
        assert_eq!(local, Point3::new(13, 8, 15));
        assert_eq!(bounds.to_global(local), global);
        assert!(bounds.to_local(Point3::new(0, 40, 15)).is_none());
    }

    #[test]
    fn boundary_sides_reports_touched_faces() {
        let bounds = Volume::new(Point3::new(0, 0, 0), 4);
        let corner = bounds.boundary_sides(Point3::new(0, 3, 1));
        assert!(corner.contains(BlockSide::LEFT));
        assert!(corner.contains(BlockSide::TOP));
        assert_eq!(corner.len(), 2);
        assert!(bounds.boundary_sides(Point3::new(1, 1, 2)).is_empty());
    }

    #[test]
    fn touching_volumes_do_not_intersect() {
        let a = Volume::new(Point3::new(0, 0, 0), 4);
        let b = Volume::new(Point3::new(4, 0, 0), 4);
        let c = Volume::new(Point3::new(3, 3, 3), 4);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
    }
}
