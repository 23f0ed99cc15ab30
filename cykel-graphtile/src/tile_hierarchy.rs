//! # The tile hierarchy
//!
//! The routing graph is cut into three levels of square tiles over WGS84.
//! Coarser levels hold more important roads; a node can be linked to its
//! counterpart on an adjacent level via a transition record.

use crate::{GraphId, RoadClass};
use geo::{Coord, Rect, coord};
use std::sync::LazyLock;

/// A tiling system description.
pub struct TilingSystem {
    /// The bounding box of the tiling system.
    pub bounding_box: Rect<f64>,
    /// The size of each side of a square tile, in degrees.
    pub tile_size: f64,
    /// The number of rows in the tiling system.
    pub n_rows: u32,
    /// The number of columns in the tiling system.
    pub n_cols: u32,
}

impl TilingSystem {
    fn new(bounding_box: Rect<f64>, tile_size: f64) -> Self {
        Self {
            bounding_box,
            tile_size,
            #[expect(clippy::cast_possible_truncation)]
            #[expect(clippy::cast_sign_loss)]
            n_rows: (bounding_box.height() / tile_size).round() as u32,
            #[expect(clippy::cast_possible_truncation)]
            #[expect(clippy::cast_sign_loss)]
            n_cols: (bounding_box.width() / tile_size).round() as u32,
        }
    }

    /// The total number of tiles in this tiling.
    pub const fn tile_count(&self) -> u32 {
        self.n_rows * self.n_cols
    }

    /// The tile ID containing the given coordinate.
    ///
    /// Row and column are derived with a `floor`, so a point exactly on a
    /// tile border deterministically resolves to the tile north/east of it
    /// (except at the far edge of the grid, which clamps inward).
    pub fn tile_id_at(&self, coord: Coord<f64>) -> u64 {
        let col = (((coord.x - self.bounding_box.min().x) / self.tile_size).floor())
            .clamp(0.0, f64::from(self.n_cols - 1));
        let row = (((coord.y - self.bounding_box.min().y) / self.tile_size).floor())
            .clamp(0.0, f64::from(self.n_rows - 1));
        #[expect(clippy::cast_possible_truncation)]
        #[expect(clippy::cast_sign_loss)]
        let (row, col) = (row as u64, col as u64);
        row * u64::from(self.n_cols) + col
    }

    /// The southwest corner of the given tile.
    pub fn tile_base(&self, tile_id: u64) -> Coord<f64> {
        let row = tile_id / u64::from(self.n_cols);
        let col = tile_id % u64::from(self.n_cols);
        #[expect(clippy::cast_precision_loss)]
        coord! {
            x: self.bounding_box.min().x + col as f64 * self.tile_size,
            y: self.bounding_box.min().y + row as f64 * self.tile_size,
        }
    }
}

/// A level in the tile hierarchy.
pub struct TileLevel {
    /// The hierarchy level.
    pub level: u8,
    /// The minimum class of road contained in this hierarchy level.
    pub minimum_road_class: RoadClass,
    /// The human-readable name of the level.
    pub name: &'static str,
    /// The tiling system used for this level.
    pub tiling_system: TilingSystem,
}

impl TileLevel {
    /// The base (index 0) graph ID of the tile containing the coordinate.
    ///
    /// # Panics
    ///
    /// Panics if the level's tile count somehow exceeds the 22-bit ID space;
    /// the standard levels never do.
    pub fn tile_containing(&self, coord: Coord<f64>) -> GraphId {
        let tile_id = self.tiling_system.tile_id_at(coord);
        GraphId::try_from_components(self.level, tile_id, 0).expect("tile id within 22 bits")
    }
}

fn world_bounds() -> Rect<f64> {
    Rect::new(coord! { x: -180f64, y: -90f64 }, coord! { x: 180f64, y: 90f64 })
}

/// The three standard hierarchy levels.
pub static STANDARD_LEVELS: LazyLock<[TileLevel; 3]> = LazyLock::new(|| {
    [
        TileLevel {
            level: 0,
            minimum_road_class: RoadClass::Primary,
            name: "highway",
            tiling_system: TilingSystem::new(world_bounds(), 4.0),
        },
        TileLevel {
            level: 1,
            minimum_road_class: RoadClass::Tertiary,
            name: "arterial",
            tiling_system: TilingSystem::new(world_bounds(), 1.0),
        },
        TileLevel {
            level: 2,
            minimum_road_class: RoadClass::ServiceOther,
            name: "local",
            tiling_system: TilingSystem::new(world_bounds(), 0.25),
        },
    ]
});

/// The finest (most local) level, where all roads are present.
/// Queries snap their endpoints here.
pub const LOCAL_LEVEL: u8 = 2;
