//! Texture atlas lookup for the mesher.
//!
//! Block textures are packed into a square grid atlas. The atlas only answers one
//! question: which normalized UV rectangle holds the texture called `name`.

use std::collections::HashMap;

/// Tile index of every texture in the bundled atlas, row-major.
static DEFAULT_ATLAS_TILES: phf::Map<&'static str, u32> = phf::phf_map! {
    "stone" => 0,
    "dirt" => 1,
    "grass_top" => 2,
    "grass_side" => 3,
    "wood_top" => 4,
    "wood_bark" => 5,
    "leaves" => 6,
    "sand" => 7,
};

/// Tiles per row of the bundled atlas.
pub const DEFAULT_ATLAS_TILES_PER_ROW: u32 = 4;

/// A normalized rectangle inside the atlas texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    /// Lower-left texture coordinate.
    pub min: [f32; 2],
    /// Upper-right texture coordinate.
    pub max: [f32; 2],
}

impl UvRect {
    /// Used for faces whose texture could not be resolved.
    pub const EMPTY: UvRect = UvRect {
        min: [0.0, 0.0],
        max: [0.0, 0.0],
    };

    /// Corner UVs in quad order: lower-left, lower-right, upper-right, upper-left.
    pub fn corners(&self) -> [[f32; 2]; 4] {
        [
            [self.min[0], self.max[1]],
            [self.max[0], self.max[1]],
            [self.max[0], self.min[1]],
            [self.min[0], self.min[1]],
        ]
    }
}

/// Maps texture names to their region in a square grid atlas.
#[derive(Debug, Clone)]
pub struct TextureAtlas {
    tiles_per_row: u32,
    tiles: HashMap<String, u32>,
}

impl TextureAtlas {
    /// An empty atlas laid out `tiles_per_row` tiles square.
    pub fn new(tiles_per_row: u32) -> Self {
        TextureAtlas {
            tiles_per_row: tiles_per_row.max(1),
            tiles: HashMap::new(),
        }
    }

    /// The atlas shipped with the built-in block palette.
    pub fn default_atlas() -> Self {
        let mut atlas = TextureAtlas::new(DEFAULT_ATLAS_TILES_PER_ROW);
        for (name, tile) in DEFAULT_ATLAS_TILES.entries() {
            atlas.insert(name, *tile);
        }
        atlas
    }

    /// Names the tile at index `tile`.
    pub fn insert(&mut self, name: &str, tile: u32) {
        self.tiles.insert(name.to_string(), tile);
    }

    /// Region of the named texture, or `None` if the atlas does not contain it.
    pub fn region(&self, name: &str) -> Option<UvRect> {
        let tile = *self.tiles.get(name)?;
        let step = 1.0 / self.tiles_per_row as f32;
        let (column, row) = (tile % self.tiles_per_row, tile / self.tiles_per_row);
        Some(UvRect {
            min: [column as f32 * step, row as f32 * step],
            max: [(column + 1) as f32 * step, (row + 1) as f32 * step],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_atlas_regions_are_grid_cells() {
        let atlas = TextureAtlas::default_atlas();
        let grass_side = atlas.region("grass_side").unwrap();
        assert_eq!(grass_side.min, [0.75, 0.0]);
        assert_eq!(grass_side.max, [1.0, 0.25]);
        let leaves = atlas.region("leaves").unwrap();
        assert_eq!(leaves.min, [0.5, 0.25]);
        assert!(atlas.region("missing").is_none());
    }
}
