use cgmath::Point3;

use crate::engine_state::{
    rendering::{texture::UvRect, vertex::Vertex},
    voxels::block::{block_side::BlockSide, VoxelId},
};

/// One in-plane axis of a face: which coordinate it runs along and in which direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceAxis {
    /// Coordinate index: 0 for x, 1 for y, 2 for z.
    pub index: usize,
    /// Whether the axis runs towards larger coordinates.
    pub positive: bool,
}

impl FaceAxis {
    const fn new(index: usize, positive: bool) -> Self {
        FaceAxis { index, positive }
    }
}

/// The `(u, v)` axes spanning a side's plane, with `u × v` pointing out of the voxel.
///
/// Side faces keep `v` pointing up so textures stand upright.
pub fn face_axes(side: BlockSide) -> (FaceAxis, FaceAxis) {
    match side {
        BlockSide::FRONT => (FaceAxis::new(0, true), FaceAxis::new(1, true)),
        BlockSide::BACK => (FaceAxis::new(0, false), FaceAxis::new(1, true)),
        BlockSide::BOTTOM => (FaceAxis::new(0, true), FaceAxis::new(2, true)),
        BlockSide::TOP => (FaceAxis::new(0, true), FaceAxis::new(2, false)),
        BlockSide::LEFT => (FaceAxis::new(2, true), FaceAxis::new(1, true)),
        BlockSide::RIGHT => (FaceAxis::new(2, false), FaceAxis::new(1, true)),
    }
}

/// A rectangular quad covering `width × height` voxel faces of one block type.
///
/// `cell` is the voxel with the smallest coordinates among the covered ones; `width` runs
/// along the side's `u` axis and `height` along its `v` axis, both counted in voxels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Lowest voxel covered by the quad.
    pub cell: Point3<usize>,
    /// Side of the voxels the quad faces out of.
    pub side: BlockSide,
    /// Extent along the face's first in-plane axis, in voxels.
    pub width: usize,
    /// Extent along the face's second in-plane axis, in voxels.
    pub height: usize,
    /// Block drawn on the quad.
    pub id: VoxelId,
    /// Atlas tile of the block on this side.
    pub uv: UvRect,
}

impl Face {
    /// A single voxel face.
    pub fn unit(cell: Point3<usize>, side: BlockSide, id: VoxelId, uv: UvRect) -> Self {
        Face {
            cell,
            side,
            width: 1,
            height: 1,
            id,
            uv,
        }
    }

    /// Corners in the order lower-left, lower-right, upper-left, upper-right as seen from
    /// outside the voxel.
    pub fn corners(&self) -> [Point3<usize>; 4] {
        let (u, v) = face_axes(self.side);
        let mut base = self.cell;
        if self.side.is_positive() {
            base[self.side.axis()] += 1;
        }

        let span = |axis: FaceAxis, extent: usize| {
            if axis.positive {
                (base[axis.index], base[axis.index] + extent)
            } else {
                (base[axis.index] + extent, base[axis.index])
            }
        };
        let (u_start, u_end) = span(u, self.width);
        let (v_start, v_end) = span(v, self.height);

        let corner = |u_value: usize, v_value: usize| {
            let mut point = base;
            point[u.index] = u_value;
            point[v.index] = v_value;
            point
        };
        [
            corner(u_start, v_start),
            corner(u_end, v_start),
            corner(u_start, v_end),
            corner(u_end, v_end),
        ]
    }

    /// The four vertices of the quad, in [`Face::corners`] order.
    pub fn vertices(&self) -> [Vertex; 4] {
        let [ll, lr, ul, ur] = self.corners();
        let [uv_ll, uv_lr, uv_ur, uv_ul] = self.uv.corners();
        let (w, h) = (self.width as f32, self.height as f32);
        [
            Vertex::new(ll, self.side, uv_ll, [0.0, 0.0]),
            Vertex::new(lr, self.side, uv_lr, [w, 0.0]),
            Vertex::new(ul, self.side, uv_ul, [0.0, h]),
            Vertex::new(ur, self.side, uv_ur, [w, h]),
        ]
    }
}

/// Two counter-clockwise triangles over the vertices of face number `face_index`.
pub fn face_indices(face_index: u32) -> [u32; 6] {
    let base = face_index * 4;
    [base, base + 1, base + 3, base, base + 3, base + 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Vector3};

    fn to_vector(point: Point3<usize>) -> Vector3<f32> {
        Vector3::new(point.x as f32, point.y as f32, point.z as f32)
    }

    #[test]
    fn every_side_winds_outward() {
        for side in BlockSide::all() {
            let face = Face {
                cell: Point3::new(2, 3, 4),
                side,
                width: 2,
                height: 3,
                id: VoxelId(1),
                uv: UvRect::EMPTY,
            };
            let [ll, lr, ul, ur] = face.corners().map(to_vector);
            let indices = face_indices(0);
            let corners = [ll, lr, ul, ur];
            for triangle in indices.chunks(3) {
                let (a, b, c) = (
                    corners[triangle[0] as usize],
                    corners[triangle[1] as usize],
                    corners[triangle[2] as usize],
                );
                let normal = (b - a).cross(c - a).normalize();
                let expected = side.offset();
                let expected = Vector3::new(expected.x as f32, expected.y as f32, expected.z as f32);
                assert!((normal - expected).magnitude() < 1e-6, "{side:?} winds inward");
            }
            // The quad spans width × height on its plane.
            assert!(((lr - ll).magnitude() - 2.0).abs() < 1e-6);
            assert!(((ul - ll).magnitude() - 3.0).abs() < 1e-6);
            assert_eq!(ur, lr + (ul - ll));
        }
    }

    #[test]
    fn positive_faces_sit_on_the_far_plane() {
        let cell = Point3::new(0, 0, 0);
        let right = Face::unit(cell, BlockSide::RIGHT, VoxelId(1), UvRect::EMPTY);
        assert!(right.corners().iter().all(|corner| corner.x == 1));
        let left = Face::unit(cell, BlockSide::LEFT, VoxelId(1), UvRect::EMPTY);
        assert!(left.corners().iter().all(|corner| corner.x == 0));
    }
}
