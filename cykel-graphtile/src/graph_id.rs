use crate::tile_hierarchy::STANDARD_LEVELS;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use thiserror::Error;
use zerocopy::{LE, U64};
use zerocopy_derive::{Immutable, IntoBytes, Unaligned};

/// The max valid hierarchy level.
///
/// The bit field reserves 3 bits, but only levels 0-2 exist in this graph.
const MAX_HIERARCHY_LEVEL: u8 = 2;

/// The max valid tile ID (22 bits).
const MAX_GRAPH_TILE_ID: u64 = (1 << 22) - 1;

/// The max valid index within a tile (21 bits).
const MAX_TILE_INDEX: u64 = (1 << 21) - 1;

#[derive(Debug, Error, PartialEq)]
pub enum InvalidGraphIdError {
    #[error("Level is larger than the maximum allowed value.")]
    Level,
    #[error("Tile ID is larger than the maximum allowed value.")]
    GraphTileId,
    #[error("Tile index is larger than the maximum allowed value.")]
    TileIndex,
}

/// An identifier of a node or an edge within the tiled, hierarchical graph.
///
/// Packs a hierarchy level, tile ID, and an index within the tile into
/// 46 bits of a little-endian 64-bit integer:
///
/// ```text
///        MSb                                     LSb
///        ▼                                       ▼
/// bit   64         46        25         3        0
/// pos    ┌──────────┬─────────┬─────────┬────────┐
///        │ RESERVED │ index   │ tileid  │ level  │
///        └──────────┴─────────┴─────────┴────────┘
/// size     18         21        22        3
/// ```
///
/// Three levels exist, with tile sizes of 4.0°, 1.0°, and 0.25°.
/// Within each tile, nodes and directed edges are identified by index.
#[repr(C)]
#[derive(IntoBytes, Immutable, Unaligned, Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct GraphId(U64<LE>);

impl GraphId {
    /// Tries to construct a graph ID from the given components.
    ///
    /// # Errors
    ///
    /// Fails if any argument exceeds the allowed number of field bits:
    /// `level` ∈ {0, 1, 2}, `tile_id` < 2^22, `index` < 2^21.
    #[inline]
    pub const fn try_from_components(
        level: u8,
        tile_id: u64,
        index: u64,
    ) -> Result<Self, InvalidGraphIdError> {
        if level > MAX_HIERARCHY_LEVEL {
            Err(InvalidGraphIdError::Level)
        } else if tile_id > MAX_GRAPH_TILE_ID {
            Err(InvalidGraphIdError::GraphTileId)
        } else if index > MAX_TILE_INDEX {
            Err(InvalidGraphIdError::TileIndex)
        } else {
            Ok(Self(U64::<LE>::new(
                level as u64 | (tile_id << 3) | index << 25,
            )))
        }
    }

    /// Creates a graph ID from the given components without validity checks.
    ///
    /// # Safety
    ///
    /// Invalid values risk out-of-bounds level or tile indexes downstream.
    /// Only use this with values already proven valid (e.g. read back from
    /// a bit field of the correct width).
    pub const unsafe fn from_components_unchecked(level: u8, tile_id: u64, index: u64) -> Self {
        Self(U64::<LE>::new(level as u64 | (tile_id << 3) | index << 25))
    }

    /// Creates a graph ID from a packed value.
    ///
    /// # Errors
    ///
    /// Fails if any component is out of range.
    pub const fn try_from_id(id: u64) -> Result<Self, InvalidGraphIdError> {
        let result = GraphId(U64::<LE>::new(id));
        if result.level() > MAX_HIERARCHY_LEVEL {
            Err(InvalidGraphIdError::Level)
        } else if result.index() > MAX_TILE_INDEX {
            Err(InvalidGraphIdError::TileIndex)
        } else {
            Ok(result)
        }
    }

    /// Creates a graph ID from a packed value without validity checks.
    ///
    /// # Safety
    ///
    /// See [`GraphId::from_components_unchecked`].
    pub const unsafe fn from_id_unchecked(id: U64<LE>) -> Self {
        Self(id)
    }

    /// Creates a new graph ID from the existing one, but with a new index.
    /// This is how edges and nodes within a known tile are addressed.
    ///
    /// # Errors
    ///
    /// See [`GraphId::try_from_components`].
    #[inline]
    pub const fn with_index(&self, tile_index: u64) -> Result<Self, InvalidGraphIdError> {
        Self::try_from_components(self.level(), self.tile_id(), tile_index)
    }

    /// Extracts the raw (packed) graph ID value.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0.get()
    }

    /// Gets the hierarchy level.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn level(&self) -> u8 {
        (self.value() & 0x7) as u8
    }

    /// Gets the graph tile ID.
    #[inline]
    pub const fn tile_id(&self) -> u64 {
        (self.value() & 0x01ff_fff8) >> 3
    }

    /// Gets the index within the tile and level.
    #[inline]
    pub const fn index(&self) -> u64 {
        (self.value() & 0x3fff_fe00_0000) >> 25
    }

    /// Returns a [`GraphId`] with the index zeroed.
    /// This identifies the tile itself and is what cache keys and
    /// file names are derived from.
    #[inline]
    #[must_use]
    pub const fn tile_base_id(&self) -> GraphId {
        GraphId(U64::<LE>::new(self.value() & 0x01ff_ffff))
    }

    /// Constructs the relative on-disk path for this tile.
    ///
    /// The tile ID is written as zero-padded three-digit path components:
    /// the local level holds over a million tiles and takes three
    /// (`2/AAA/BBB/CCC.ext`), the coarser levels take two (`L/AAA/BBB.ext`).
    ///
    /// # Errors
    ///
    /// Fails if the tile ID is out of range for this level's tiling.
    pub fn file_path(&self, extension: &str) -> Result<PathBuf, InvalidGraphIdError> {
        // IDs read from tile data bypass the checked constructors,
        // so the level is re-validated here.
        let Some(level) = STANDARD_LEVELS.get(self.level() as usize) else {
            return Err(InvalidGraphIdError::Level);
        };

        let max_id = u64::from(level.tiling_system.tile_count()) - 1;
        let tile_id = self.tile_id();
        if tile_id > max_id {
            return Err(InvalidGraphIdError::GraphTileId);
        }

        // How many components the level's largest tile ID needs.
        let mut component_count = 1u32;
        let mut scale = 1_000u64;
        while max_id >= scale {
            component_count += 1;
            scale *= 1_000;
        }

        let mut path = PathBuf::from(self.level().to_string());
        for component in (0..component_count).rev() {
            path.push(format!("{:03}", (tile_id / 1_000u64.pow(component)) % 1_000));
        }
        path.set_extension(extension);

        Ok(path)
    }
}

impl Default for GraphId {
    /// The zero ID: level 0, tile 0, index 0.
    fn default() -> Self {
        Self(U64::<LE>::new(0))
    }
}

impl Display for GraphId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{}/{}/{}",
            self.level(),
            self.tile_id(),
            self.index()
        ))
    }
}
