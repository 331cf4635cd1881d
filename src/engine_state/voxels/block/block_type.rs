//! # Block Type Module
//!
//! The built-in block palette used by the default registry and the bundled terrain
//! generator. Hosts with their own content can ignore it and build a registry from
//! [`BlockDefinition`](super::BlockDefinition)s directly.

use num_derive::FromPrimitive;

use super::{BlockDefinition, BlockTextures, VoxelId};

/// Enumerates the built-in block types. The discriminant is the [`VoxelId`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BlockType {
    /// Empty space. Always id zero.
    AIR = 0,

    /// Bedrock of the terrain below the dirt layers.
    STONE = 1,

    /// Layers between the surface and stone.
    DIRT = 2,

    /// Dirt with a grass top; accents only grow trees on it.
    GRASS = 3,

    /// Tree trunks.
    WOOD = 4,

    /// Tree canopy. Transparent, so faces behind it are still meshed.
    LEAVES = 5,

    /// Low-lying surfaces.
    SAND = 6,
}

impl BlockType {
    /// The registry id of this block.
    pub fn id(self) -> VoxelId {
        VoxelId(self as u16)
    }

    /// The built-in block with `id`, if any.
    pub fn from_id(id: VoxelId) -> Option<BlockType> {
        num_traits::FromPrimitive::from_u16(id.0)
    }

    /// Definitions for every built-in type, in id order.
    pub fn default_definitions() -> Vec<BlockDefinition> {
        vec![
            BlockDefinition::air(),
            BlockDefinition::opaque("stone", BlockTextures::Uniform("stone".into())),
            BlockDefinition::opaque("dirt", BlockTextures::Uniform("dirt".into())),
            BlockDefinition::opaque(
                "grass",
                BlockTextures::TopSideBottom {
                    top: "grass_top".into(),
                    side: "grass_side".into(),
                    bottom: "dirt".into(),
                },
            ),
            BlockDefinition::opaque(
                "wood",
                BlockTextures::TopSideBottom {
                    top: "wood_top".into(),
                    side: "wood_bark".into(),
                    bottom: "wood_top".into(),
                },
            ),
            BlockDefinition {
                name: "leaves".into(),
                transparent: true,
                collideable: true,
                light_level: 0,
                textures: BlockTextures::Uniform("leaves".into()),
            },
            BlockDefinition::opaque("sand", BlockTextures::Uniform("sand".into())),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_and_match_definition_order() {
        let definitions = BlockType::default_definitions();
        for block_type in [BlockType::AIR, BlockType::GRASS, BlockType::SAND] {
            assert_eq!(BlockType::from_id(block_type.id()), Some(block_type));
            assert_eq!(
                definitions[block_type as usize].name,
                format!("{:?}", block_type).to_lowercase()
            );
        }
        assert_eq!(BlockType::from_id(VoxelId(200)), None);
    }
}
