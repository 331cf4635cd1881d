//! Greedy meshing over one slice of a chunk.
//!
//! The mesher fills a [`SliceMask`] per side and per layer with the id of every visible
//! face. [`merge_slice`] then sweeps the mask row by row: it grows a rectangle to the right
//! while the id matches, grows it upwards while the whole row segment matches, marks the
//! cells as consumed and moves on. Every visible cell ends up in exactly one rectangle, so
//! the merged geometry covers the same surface as the per-voxel faces.

use bitvec::prelude::*;

use crate::engine_state::voxels::block::VoxelId;

/// Face ids of one layer, indexed by absolute `(u, v)` coordinates, `u` fastest.
/// Empty cells hold [`VoxelId::EMPTY`].
#[derive(Debug, Clone, PartialEq)]
pub struct SliceMask {
    u_len: usize,
    v_len: usize,
    cells: Vec<VoxelId>,
}

impl SliceMask {
    /// An empty `u_len × v_len` mask.
    pub fn new(u_len: usize, v_len: usize) -> Self {
        SliceMask {
            u_len,
            v_len,
            cells: vec![VoxelId::EMPTY; u_len * v_len],
        }
    }

    /// Cells along `u`.
    pub fn u_len(&self) -> usize {
        self.u_len
    }

    /// Cells along `v`.
    pub fn v_len(&self) -> usize {
        self.v_len
    }

    /// Face id at `(u, v)`.
    pub fn get(&self, u: usize, v: usize) -> VoxelId {
        self.cells[u + v * self.u_len]
    }

    /// Sets the face id at `(u, v)`.
    pub fn set(&mut self, u: usize, v: usize, id: VoxelId) {
        self.cells[u + v * self.u_len] = id;
    }

    /// Empties every cell for reuse on the next layer.
    pub fn clear(&mut self) {
        self.cells.fill(VoxelId::EMPTY);
    }

    /// Whether no cell holds a face.
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|id| id.is_empty())
    }
}

/// A rectangle of equal face ids inside a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskRect {
    /// Lowest `u` covered.
    pub u: usize,
    /// Lowest `v` covered.
    pub v: usize,
    /// Cells covered along `u`.
    pub width: usize,
    /// Cells covered along `v`.
    pub height: usize,
    /// The face id shared by every covered cell.
    pub id: VoxelId,
}

/// Calls `emit` once per visible cell, in row order.
pub fn unit_rects(mask: &SliceMask, mut emit: impl FnMut(MaskRect)) {
    for v in 0..mask.v_len {
        for u in 0..mask.u_len {
            let id = mask.get(u, v);
            if !id.is_empty() {
                emit(MaskRect {
                    u,
                    v,
                    width: 1,
                    height: 1,
                    id,
                });
            }
        }
    }
}

/// Covers every visible cell with maximal-width rectangles, in row order of their origin.
pub fn merge_slice(mask: &SliceMask, mut emit: impl FnMut(MaskRect)) {
    let index = |u: usize, v: usize| u + v * mask.u_len;
    let mut consumed = bitvec![0; mask.cells.len()];

    for v in 0..mask.v_len {
        let mut u = 0;
        while u < mask.u_len {
            let id = mask.get(u, v);
            if id.is_empty() || consumed[index(u, v)] {
                u += 1;
                continue;
            }

            let mut width = 1;
            while u + width < mask.u_len
                && mask.get(u + width, v) == id
                && !consumed[index(u + width, v)]
            {
                width += 1;
            }

            let mut height = 1;
            'grow: while v + height < mask.v_len {
                for k in 0..width {
                    if mask.get(u + k, v + height) != id || consumed[index(u + k, v + height)] {
                        break 'grow;
                    }
                }
                height += 1;
            }

            for dv in 0..height {
                for du in 0..width {
                    consumed.set(index(u + du, v + dv), true);
                }
            }

            emit(MaskRect {
                u,
                v,
                width,
                height,
                id,
            });
            u += width;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(mask: &SliceMask) -> Vec<MaskRect> {
        let mut rects = Vec::new();
        merge_slice(mask, |rect| rects.push(rect));
        rects
    }

    #[test]
    fn full_slice_merges_into_one_rect() {
        let mut mask = SliceMask::new(5, 3);
        for v in 0..3 {
            for u in 0..5 {
                mask.set(u, v, VoxelId(2));
            }
        }
        assert_eq!(
            collect(&mask),
            vec![MaskRect {
                u: 0,
                v: 0,
                width: 5,
                height: 3,
                id: VoxelId(2)
            }]
        );
    }

    #[test]
    fn different_ids_are_not_merged() {
        let mut mask = SliceMask::new(2, 1);
        mask.set(0, 0, VoxelId(1));
        mask.set(1, 0, VoxelId(2));
        assert_eq!(collect(&mask).len(), 2);
    }

    #[test]
    fn merged_rects_cover_each_visible_cell_once() {
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..50 {
            let (u_len, v_len) = (rng.usize(1..12), rng.usize(1..12));
            let mut mask = SliceMask::new(u_len, v_len);
            for v in 0..v_len {
                for u in 0..u_len {
                    mask.set(u, v, VoxelId(rng.u16(0..3)));
                }
            }

            let mut covered = SliceMask::new(u_len, v_len);
            for rect in collect(&mask) {
                for v in rect.v..rect.v + rect.height {
                    for u in rect.u..rect.u + rect.width {
                        assert!(covered.get(u, v).is_empty(), "cell covered twice");
                        covered.set(u, v, rect.id);
                    }
                }
            }
            assert_eq!(covered, mask);
        }
    }
}
