//! # Block Module
//!
//! Voxel identifiers and the registry that gives them meaning. Chunk stores only hold
//! [`VoxelId`]s; everything else about a block (transparency, collision, light, textures)
//! lives in a [`BlockRegistry`] built once at start-up and shared read-only with workers.
//!
//! Texture rules are plain data ([`BlockTextures`]) resolved to atlas regions while the
//! registry is built, so the mesher never looks anything up by name.

use serde::{Deserialize, Serialize};

use crate::engine_state::rendering::texture::{TextureAtlas, UvRect};

use block_side::BlockSide;

pub mod block_side;
pub mod block_type;

/// Handle into the block registry. Zero is reserved for empty space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct VoxelId(pub u16);

impl VoxelId {
    /// Air.
    pub const EMPTY: VoxelId = VoxelId(0);

    /// Whether this is air.
    pub fn is_empty(self) -> bool {
        self == VoxelId::EMPTY
    }
}

/// Which atlas texture each face of a block uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockTextures {
    /// Never drawn (air, invisible barriers).
    None,
    /// The same texture on all six faces.
    Uniform(String),
    /// Separate top and bottom textures, one texture for the four sides.
    TopSideBottom {
        /// Texture of the upward face.
        top: String,
        /// Texture of the four horizontal faces.
        side: String,
        /// Texture of the downward face.
        bottom: String,
    },
    /// One texture per face, indexed by [`BlockSide`] discriminant.
    PerSide([String; 6]),
}

impl BlockTextures {
    fn texture_name(&self, side: BlockSide) -> Option<&str> {
        match self {
            BlockTextures::None => None,
            BlockTextures::Uniform(name) => Some(name.as_str()),
            BlockTextures::TopSideBottom { top, side: sides, bottom } => Some(match side {
                BlockSide::TOP => top.as_str(),
                BlockSide::BOTTOM => bottom.as_str(),
                _ => sides.as_str(),
            }),
            BlockTextures::PerSide(names) => Some(names[side as usize].as_str()),
        }
    }
}

/// Static description of a block type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDefinition {
    /// Unique lookup name.
    pub name: String,
    /// Faces of neighbouring blocks stay visible through this one.
    pub transparent: bool,
    /// Whether entities collide with the block.
    pub collideable: bool,
    /// Light emitted, 0 to 15.
    pub light_level: u8,
    /// Atlas textures per face.
    pub textures: BlockTextures,
}

impl BlockDefinition {
    /// The definition registered at id zero.
    pub fn air() -> Self {
        BlockDefinition {
            name: "air".into(),
            transparent: true,
            collideable: false,
            light_level: 0,
            textures: BlockTextures::None,
        }
    }

    /// A solid, collideable block that emits no light.
    pub fn opaque(name: &str, textures: BlockTextures) -> Self {
        BlockDefinition {
            name: name.into(),
            transparent: false,
            collideable: true,
            light_level: 0,
            textures,
        }
    }
}

struct ResolvedBlock {
    definition: BlockDefinition,
    uvs: [UvRect; 6],
}

/// Read-only lookup from [`VoxelId`] to block properties.
///
/// The id of a block is its index in the definition list it was built from. Ids that are
/// not registered behave like air: transparent, not collideable, no texture.
pub struct BlockRegistry {
    blocks: Vec<ResolvedBlock>,
}

impl BlockRegistry {
    /// Resolves every definition's texture names against `atlas`.
    ///
    /// A name the atlas does not know resolves to [`UvRect::EMPTY`]; the face is still
    /// meshed, just without a texture.
    pub fn build(definitions: Vec<BlockDefinition>, atlas: &TextureAtlas) -> Self {
        let blocks = definitions
            .into_iter()
            .map(|definition| {
                let uvs = BlockSide::all().map(|side| {
                    match definition.textures.texture_name(side) {
                        None => UvRect::EMPTY,
                        Some(name) => atlas.region(name).unwrap_or_else(|| {
                            log::warn!(
                                "Block `{}` references unknown texture `{}`",
                                definition.name,
                                name
                            );
                            UvRect::EMPTY
                        }),
                    }
                });
                ResolvedBlock { definition, uvs }
            })
            .collect();
        BlockRegistry { blocks }
    }

    /// Registry of the built-in [`block_type::BlockType`] palette on the default atlas.
    pub fn with_defaults() -> Self {
        Self::build(
            block_type::BlockType::default_definitions(),
            &TextureAtlas::default_atlas(),
        )
    }

    /// Builds a registry from a JSON array of [`BlockDefinition`]s.
    pub fn from_json(json: &str, atlas: &TextureAtlas) -> Result<Self, serde_json::Error> {
        let definitions: Vec<BlockDefinition> = serde_json::from_str(json)?;
        Ok(Self::build(definitions, atlas))
    }

    fn resolved(&self, id: VoxelId) -> Option<&ResolvedBlock> {
        if id.is_empty() {
            return None;
        }
        self.blocks.get(id.0 as usize)
    }

    /// The definition registered for `id`.
    pub fn definition(&self, id: VoxelId) -> Option<&BlockDefinition> {
        self.blocks.get(id.0 as usize).map(|block| &block.definition)
    }

    /// The id registered under `name`.
    pub fn id_of(&self, name: &str) -> Option<VoxelId> {
        self.blocks
            .iter()
            .position(|block| block.definition.name == name)
            .map(|index| VoxelId(index as u16))
    }

    /// Whether `id` has a definition.
    pub fn is_registered(&self, id: VoxelId) -> bool {
        (id.0 as usize) < self.blocks.len()
    }

    /// Whether faces behind this voxel stay visible.
    pub fn is_transparent(&self, id: VoxelId) -> bool {
        self.resolved(id)
            .map_or(true, |block| block.definition.transparent)
    }

    /// Whether entities collide with `id`. Unknown ids do not collide.
    pub fn is_collideable(&self, id: VoxelId) -> bool {
        self.resolved(id)
            .is_some_and(|block| block.definition.collideable)
    }

    /// Light emitted by `id`. Unknown ids emit none.
    pub fn light_level(&self, id: VoxelId) -> u8 {
        self.resolved(id)
            .map_or(0, |block| block.definition.light_level)
    }

    /// Atlas region for one face of a block. Faces look the same at every position.
    pub fn uv(&self, id: VoxelId, side: BlockSide) -> UvRect {
        self.resolved(id)
            .map_or(UvRect::EMPTY, |block| block.uvs[side as usize])
    }

    /// Number of registered blocks, air included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::block_type::BlockType;
    use super::*;

    #[test]
    fn unknown_ids_behave_like_air() {
        let registry = BlockRegistry::with_defaults();
        let unknown = VoxelId(999);
        assert!(registry.is_transparent(unknown));
        assert!(!registry.is_collideable(unknown));
        assert_eq!(registry.uv(unknown, BlockSide::TOP), UvRect::EMPTY);
        assert!(registry.is_transparent(VoxelId::EMPTY));
    }

    #[test]
    fn top_side_bottom_textures_resolve_per_face() {
        let registry = BlockRegistry::with_defaults();
        let grass = BlockType::GRASS.id();
        assert!(!registry.is_transparent(grass));
        assert_ne!(registry.uv(grass, BlockSide::TOP), registry.uv(grass, BlockSide::LEFT));
        assert_eq!(
            registry.uv(grass, BlockSide::BOTTOM),
            registry.uv(BlockType::DIRT.id(), BlockSide::TOP)
        );
        assert!(registry.is_transparent(BlockType::LEAVES.id()));
    }

    #[test]
    fn missing_texture_degrades_to_empty_uv() {
        let json = r#"[
            { "name": "air", "transparent": true, "collideable": false, "light_level": 0, "textures": "None" },
            { "name": "lamp", "transparent": false, "collideable": true, "light_level": 12,
              "textures": { "Uniform": "no_such_texture" } }
        ]"#;
        let registry = BlockRegistry::from_json(json, &TextureAtlas::default_atlas()).unwrap();
        let lamp = registry.id_of("lamp").unwrap();
        assert_eq!(lamp, VoxelId(1));
        assert_eq!(registry.light_level(lamp), 12);
        assert_eq!(registry.uv(lamp, BlockSide::FRONT), UvRect::EMPTY);
    }
}
