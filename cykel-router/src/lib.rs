//! # cykel-router
//!
//! The routing layer: snaps coordinates to graph nodes, runs a
//! bidirectional A\* over the tiled graph, and packages the result
//! (geometry plus summary counters) for the caller. The HTTP surface
//! lives elsewhere; this crate's `RoutePlanner` is the request-reply
//! boundary.

mod cancel;
pub mod navigator;
mod route;
pub mod search;

use cykel_graphtile::GraphId;
use cykel_graphtile::tile_provider::GraphTileProviderError;
use thiserror::Error;

pub use cancel::CancelToken;
pub use navigator::GraphNavigator;
pub use route::{RouteOptions, RoutePlanner, RouteRequest, RouteSummary};
pub use search::{SearchOptions, SearchResult};

/// The closed set of ways a routing query can fail.
///
/// Cancellation variants are cooperative outcomes, not faults, and are
/// never logged as errors.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Tile {level}/{tile_id} is not present on disk")]
    TileMissing { level: u8, tile_id: u64 },
    #[error("Tile {level}/{tile_id} was refused: {reason}")]
    TileCorrupt {
        level: u8,
        tile_id: u64,
        reason: String,
    },
    #[error("No node within {radius_km} km of ({lat}, {lon})")]
    NoNodeNearby {
        lat: f64,
        lon: f64,
        radius_km: f64,
    },
    #[error("No route found: {0}")]
    NoRouteFound(&'static str),
    #[error("The query was cancelled")]
    Cancelled,
    #[error("The query deadline expired")]
    DeadlineExceeded,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoutingError {
    /// Maps a tile fetch failure for `tile` into the routing taxonomy.
    ///
    /// Corrupt tiles are logged here (once per observation) and then
    /// behave like missing ones at the search layer.
    pub(crate) fn from_provider(tile: GraphId, error: GraphTileProviderError) -> Self {
        let base = tile.tile_base_id();
        match error {
            GraphTileProviderError::TileDoesNotExist => RoutingError::TileMissing {
                level: base.level(),
                tile_id: base.tile_id(),
            },
            GraphTileProviderError::DecodingError(e) => {
                tracing::warn!(tile = %base, error = %e, "Refusing corrupt tile");
                RoutingError::TileCorrupt {
                    level: base.level(),
                    tile_id: base.tile_id(),
                    reason: e.to_string(),
                }
            }
            e => RoutingError::Internal(format!("fetching tile {base}: {e}")),
        }
    }

    /// Whether this error marks a boundary of the reachable graph
    /// (the search skips past it) rather than a query-fatal fault.
    pub(crate) fn is_graph_boundary(&self) -> bool {
        matches!(
            self,
            RoutingError::TileMissing { .. } | RoutingError::TileCorrupt { .. }
        )
    }
}
