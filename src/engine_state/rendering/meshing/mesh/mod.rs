//! Mesh data structures and the greedy merge pass.
//!
//! # Architecture
//! - [`ChunkMesh`]: vertex and index buffers for one chunk
//! - [`Face`]: a quad on one side of a run of voxels, with its per-side winding template
//! - [`merge_slice`]: sweep-and-mask merging of coplanar faces within one layer

mod face;
mod greedy;
mod mesh;

pub use face::{face_axes, face_indices, Face, FaceAxis};
pub use greedy::{merge_slice, unit_rects, MaskRect, SliceMask};
pub use mesh::*;
