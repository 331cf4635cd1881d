//! # Block Side Module
//!
//! This module defines the six faces of a voxel and a compact set type over them, used
//! both by the mesher (which face to emit) and by change events (which chunk boundaries an
//! edit touched).

use cgmath::Vector3;
use num_derive::FromPrimitive;

/// Represents the six possible faces of a voxel block.
///
/// The discriminants are stable and index per-side tables such as
/// [`BlockTextures::PerSide`](super::BlockTextures::PerSide).
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, FromPrimitive)]
pub enum BlockSide {
    /// The face facing positive Z
    FRONT = 0,

    /// The face facing negative Z
    BACK = 1,

    /// The face facing negative Y
    BOTTOM = 2,

    /// The face facing positive Y
    TOP = 3,

    /// The face facing negative X
    LEFT = 4,

    /// The face facing positive X
    RIGHT = 5,
}

impl BlockSide {
    /// Returns all six block faces in discriminant order.
    ///
    /// The mesher walks sides in this order, so it is part of the deterministic output
    /// contract.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::BOTTOM,
            BlockSide::TOP,
            BlockSide::LEFT,
            BlockSide::RIGHT,
        ]
    }

    /// Converts a stored discriminant back into a side.
    pub fn from_index(index: u8) -> Option<BlockSide> {
        num_traits::FromPrimitive::from_u8(index)
    }

    /// Unit step from a voxel to its neighbour across this face.
    pub fn offset(self) -> Vector3<i32> {
        match self {
            BlockSide::FRONT => Vector3::new(0, 0, 1),
            BlockSide::BACK => Vector3::new(0, 0, -1),
            BlockSide::BOTTOM => Vector3::new(0, -1, 0),
            BlockSide::TOP => Vector3::new(0, 1, 0),
            BlockSide::LEFT => Vector3::new(-1, 0, 0),
            BlockSide::RIGHT => Vector3::new(1, 0, 0),
        }
    }

    /// Outward unit normal.
    pub fn normal(self) -> [f32; 3] {
        let offset = self.offset();
        [offset.x as f32, offset.y as f32, offset.z as f32]
    }

    /// The side facing the other way.
    pub fn opposite(self) -> BlockSide {
        match self {
            BlockSide::FRONT => BlockSide::BACK,
            BlockSide::BACK => BlockSide::FRONT,
            BlockSide::BOTTOM => BlockSide::TOP,
            BlockSide::TOP => BlockSide::BOTTOM,
            BlockSide::LEFT => BlockSide::RIGHT,
            BlockSide::RIGHT => BlockSide::LEFT,
        }
    }

    /// Axis index (0 = x, 1 = y, 2 = z) the face normal points along.
    pub fn axis(self) -> usize {
        match self {
            BlockSide::LEFT | BlockSide::RIGHT => 0,
            BlockSide::BOTTOM | BlockSide::TOP => 1,
            BlockSide::BACK | BlockSide::FRONT => 2,
        }
    }

    /// Whether the face normal points along the positive axis.
    pub fn is_positive(self) -> bool {
        matches!(self, BlockSide::FRONT | BlockSide::TOP | BlockSide::RIGHT)
    }
}

/// A set of block sides stored as a 6-bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SideSet(u8);

impl SideSet {
    /// No sides.
    pub fn empty() -> Self {
        SideSet(0)
    }

    /// All six sides.
    pub fn all() -> Self {
        SideSet(0b11_1111)
    }

    /// Adds `side`.
    pub fn insert(&mut self, side: BlockSide) {
        self.0 |= 1 << side as u8;
    }

    /// Whether `side` is a member.
    pub fn contains(&self, side: BlockSide) -> bool {
        self.0 & (1 << side as u8) != 0
    }

    /// Sides in either set.
    pub fn union(self, other: SideSet) -> SideSet {
        SideSet(self.0 | other.0)
    }

    /// Whether the set has no sides.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of sides in the set.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in discriminant order.
    pub fn iter(self) -> impl Iterator<Item = BlockSide> {
        BlockSide::all()
            .into_iter()
            .filter(move |side| self.contains(*side))
    }
}

impl FromIterator<BlockSide> for SideSet {
    fn from_iter<I: IntoIterator<Item = BlockSide>>(iter: I) -> Self {
        let mut set = SideSet::empty();
        for side in iter {
            set.insert(side);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_sides_cancel_out() {
        for side in BlockSide::all() {
            assert_eq!(side.offset() + side.opposite().offset(), Vector3::new(0, 0, 0));
            assert_eq!(side.opposite().opposite(), side);
            assert_eq!(BlockSide::from_index(side as u8), Some(side));
        }
        assert_eq!(BlockSide::from_index(6), None);
    }

    #[test]
    fn side_set_iterates_in_discriminant_order() {
        let set: SideSet = [BlockSide::RIGHT, BlockSide::FRONT, BlockSide::RIGHT]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![BlockSide::FRONT, BlockSide::RIGHT]);
        assert_eq!(SideSet::all().len(), 6);
    }
}
