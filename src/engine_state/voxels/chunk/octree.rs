//! # Voxel Octree
//!
//! Sparse storage for the voxel ids of one chunk. Terrain is mostly long runs of air or
//! stone, so a cubic region that holds a single id is stored as one uniform node no matter
//! how large it is.
//!
//! ## Node states
//!
//! A node covering a cube of half-width `extent` is either:
//! - **uniform**: one [`VoxelId`] for the whole cube, or
//! - **subdivided**: exactly eight children of half-width `extent / 2`, one per octant.
//!
//! A subdivided node never has eight uniform children holding the same id; the write that
//! would create that state collapses the node instead. Nodes with `extent == 0` (a single
//! voxel) are always uniform and are overwritten in place.
//!
//! ## Octant addressing
//!
//! Inside a node, bit 0 of the octant index is set when `x >= extent`, bit 1 when
//! `y >= extent` and bit 2 when `z >= extent`. The child sees the parent coordinates minus
//! `extent` on every axis whose bit is set. `get`, `set` and the builders all go through
//! [`octant`] so reads and writes can never disagree.

use cgmath::Point3;

use crate::engine_state::voxels::block::VoxelId;

#[derive(Debug, Clone, PartialEq)]
enum OctreeNode {
    Uniform(VoxelId),
    Subdivided(Box<[OctreeNode; 8]>),
}

/// Octant index and child-local coordinates for a point inside a node of `extent`.
#[inline]
fn octant(x: usize, y: usize, z: usize, extent: usize) -> (usize, usize, usize, usize) {
    let (bx, by, bz) = (x >= extent, y >= extent, z >= extent);
    let index = bx as usize | (by as usize) << 1 | (bz as usize) << 2;
    (
        index,
        x - extent * bx as usize,
        y - extent * by as usize,
        z - extent * bz as usize,
    )
}

/// Offset of octant `index` in units of the parent's extent.
#[inline]
fn octant_offset(index: usize) -> (usize, usize, usize) {
    (index & 1, (index >> 1) & 1, (index >> 2) & 1)
}

fn common_value(children: &[OctreeNode; 8]) -> Option<VoxelId> {
    let first = match children[0] {
        OctreeNode::Uniform(value) => value,
        OctreeNode::Subdivided(_) => return None,
    };
    children[1..]
        .iter()
        .all(|child| matches!(child, OctreeNode::Uniform(value) if *value == first))
        .then_some(first)
}

impl OctreeNode {
    /// Writes `value` and reports whether anything changed.
    fn set(&mut self, x: usize, y: usize, z: usize, extent: usize, value: VoxelId) -> bool {
        match self {
            OctreeNode::Uniform(current) if *current == value => return false,
            OctreeNode::Uniform(current) if extent == 0 => {
                *current = value;
                return true;
            }
            OctreeNode::Uniform(current) => {
                let old = *current;
                *self = OctreeNode::Subdivided(Box::new(std::array::from_fn(|_| {
                    OctreeNode::Uniform(old)
                })));
            }
            OctreeNode::Subdivided(_) => {}
        }

        let OctreeNode::Subdivided(children) = self else {
            unreachable!("node was subdivided above");
        };
        let (index, cx, cy, cz) = octant(x, y, z, extent);
        let changed = children[index].set(cx, cy, cz, extent / 2, value);
        if changed {
            if let Some(value) = common_value(children) {
                *self = OctreeNode::Uniform(value);
            }
        }
        debug_assert!(
            !matches!(&*self, OctreeNode::Subdivided(children) if common_value(children).is_some()),
            "octree node left collapsible after write"
        );
        changed
    }

    fn build(
        min: (usize, usize, usize),
        size: usize,
        f: &mut dyn FnMut(Point3<usize>) -> VoxelId,
    ) -> OctreeNode {
        if size == 1 {
            return OctreeNode::Uniform(f(Point3::new(min.0, min.1, min.2)));
        }
        let extent = size / 2;
        let children: [OctreeNode; 8] = std::array::from_fn(|index| {
            let (ox, oy, oz) = octant_offset(index);
            OctreeNode::build(
                (min.0 + ox * extent, min.1 + oy * extent, min.2 + oz * extent),
                extent,
                &mut *f,
            )
        });
        match common_value(&children) {
            Some(value) => OctreeNode::Uniform(value),
            None => OctreeNode::Subdivided(Box::new(children)),
        }
    }

    fn visit_regions(
        &self,
        min: (usize, usize, usize),
        size: usize,
        f: &mut dyn FnMut(Point3<usize>, usize, VoxelId),
    ) {
        match self {
            OctreeNode::Uniform(value) => f(Point3::new(min.0, min.1, min.2), size, *value),
            OctreeNode::Subdivided(children) => {
                let extent = size / 2;
                for (index, child) in children.iter().enumerate() {
                    let (ox, oy, oz) = octant_offset(index);
                    child.visit_regions(
                        (min.0 + ox * extent, min.1 + oy * extent, min.2 + oz * extent),
                        extent,
                        f,
                    );
                }
            }
        }
    }

    fn node_count(&self) -> usize {
        match self {
            OctreeNode::Uniform(_) => 1,
            OctreeNode::Subdivided(children) => {
                1 + children.iter().map(OctreeNode::node_count).sum::<usize>()
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            OctreeNode::Uniform(_) => 0,
            OctreeNode::Subdivided(children) => {
                1 + children.iter().map(OctreeNode::depth).max().unwrap_or(0)
            }
        }
    }

    fn is_canonical(&self, extent: usize) -> bool {
        match self {
            OctreeNode::Uniform(_) => true,
            OctreeNode::Subdivided(children) => {
                extent >= 1
                    && common_value(children).is_none()
                    && children.iter().all(|child| child.is_canonical(extent / 2))
            }
        }
    }
}

/// Self-compressing octree over a cube of `size³` voxels, `size` a power of two.
///
/// Two octrees compare equal when they have the same size and the same tree shape, which,
/// because of the collapse rule, is the same as holding the same voxels.
///
/// # Examples
/// ```
/// use cgmath::Point3;
/// use voxel_forge::engine_state::voxels::{block::VoxelId, chunk::octree::VoxelOctree};
///
/// let mut octree = VoxelOctree::new(32, VoxelId::EMPTY);
/// octree.set(Point3::new(3, 4, 5), VoxelId(2));
/// assert_eq!(octree.get(Point3::new(3, 4, 5)), VoxelId(2));
///
/// octree.set(Point3::new(3, 4, 5), VoxelId::EMPTY);
/// assert!(octree.is_uniform());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelOctree {
    size: usize,
    root: OctreeNode,
}

impl VoxelOctree {
    /// Creates a uniform octree.
    ///
    /// # Panics
    /// Panics if `size` is not a power of two.
    pub fn new(size: usize, fill: VoxelId) -> Self {
        assert!(size.is_power_of_two(), "octree size {size} is not a power of two");
        VoxelOctree {
            size,
            root: OctreeNode::Uniform(fill),
        }
    }

    /// Builds an octree from a per-voxel function, collapsing while it builds.
    ///
    /// This is much cheaper than `size³` calls to [`set`](Self::set) and is what terrain
    /// generation uses.
    ///
    /// # Panics
    /// Panics if `size` is not a power of two.
    pub fn from_fn<F: FnMut(Point3<usize>) -> VoxelId>(size: usize, mut f: F) -> Self {
        assert!(size.is_power_of_two(), "octree size {size} is not a power of two");
        VoxelOctree {
            size,
            root: OctreeNode::build((0, 0, 0), size, &mut f),
        }
    }

    /// Edge length in voxels.
    pub fn size(&self) -> usize {
        self.size
    }

    fn in_range(&self, point: Point3<usize>) -> bool {
        point.x < self.size && point.y < self.size && point.z < self.size
    }

    /// Reads the voxel at a local point in `[0, size)³`.
    ///
    /// Out-of-range points are a caller bug; use [`try_get`](Self::try_get) when the point
    /// is not known to be inside.
    pub fn get(&self, point: Point3<usize>) -> VoxelId {
        debug_assert!(self.in_range(point), "{point:?} outside octree of size {}", self.size);
        let (mut x, mut y, mut z) = (point.x, point.y, point.z);
        let mut extent = self.size / 2;
        let mut node = &self.root;
        loop {
            match node {
                OctreeNode::Uniform(value) => return *value,
                OctreeNode::Subdivided(children) => {
                    let (index, cx, cy, cz) = octant(x, y, z, extent);
                    (x, y, z) = (cx, cy, cz);
                    node = &children[index];
                    extent /= 2;
                }
            }
        }
    }

    /// Like [`get`](Self::get), but `None` outside the cube.
    pub fn try_get(&self, point: Point3<usize>) -> Option<VoxelId> {
        self.in_range(point).then(|| self.get(point))
    }

    /// Writes one voxel, subdividing on divergence and collapsing on convergence.
    ///
    /// Returns `true` if the stored value changed. Writing the value that is already
    /// there never subdivides.
    pub fn set(&mut self, point: Point3<usize>, value: VoxelId) -> bool {
        debug_assert!(self.in_range(point), "{point:?} outside octree of size {}", self.size);
        self.root
            .set(point.x, point.y, point.z, self.size / 2, value)
    }

    /// Bounds-checked [`set`](Self::set). Returns `None` for out-of-range points.
    pub fn try_set(&mut self, point: Point3<usize>, value: VoxelId) -> Option<bool> {
        self.in_range(point).then(|| self.set(point, value))
    }

    /// Replaces the whole content with a single value.
    pub fn fill(&mut self, value: VoxelId) {
        self.root = OctreeNode::Uniform(value);
    }

    /// Whether every voxel holds the same value.
    pub fn is_uniform(&self) -> bool {
        matches!(self.root, OctreeNode::Uniform(_))
    }

    /// The single value of a uniform octree.
    pub fn uniform_value(&self) -> Option<VoxelId> {
        match self.root {
            OctreeNode::Uniform(value) => Some(value),
            OctreeNode::Subdivided(_) => None,
        }
    }

    /// Calls `f(min, size, id)` for every uniform region, in octant order.
    pub fn for_each_region<F: FnMut(Point3<usize>, usize, VoxelId)>(&self, mut f: F) {
        self.root.visit_regions((0, 0, 0), self.size, &mut f);
    }

    /// Nodes currently allocated, leaves included.
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// Levels below the root; zero for a uniform tree.
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Approximate heap and inline footprint of the tree.
    pub fn memory_bytes(&self) -> usize {
        self.node_count() * std::mem::size_of::<OctreeNode>()
    }

    /// `true` when no subdivided node could be collapsed and no node is subdivided
    /// below voxel granularity.
    pub fn check_invariants(&self) -> bool {
        self.root.is_canonical(self.size / 2)
    }
}
