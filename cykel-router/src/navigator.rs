//! Graph navigation: the glue between raw tiles and the search.
//!
//! The navigator resolves node states (graph IDs) to coordinates,
//! neighbours, and level transitions, loading whatever tiles that takes
//! through the shared provider. It also snaps query coordinates to their
//! nearest graph node.

use crate::RoutingError;
use cykel_graphtile::graph_tile::{DirectedEdge, GraphTile, GraphTileHandle};
use cykel_graphtile::spatial::DistanceApproximator;
use cykel_graphtile::tile_hierarchy::STANDARD_LEVELS;
use cykel_graphtile::tile_provider::GraphTileProvider;
use cykel_graphtile::{Access, GraphId};
use geo::{Coord, Distance, Haversine};
use std::sync::Arc;
use tracing::debug;

/// How far from the query point we are willing to snap, in meters.
const SNAP_RADIUS_M: f64 = 2_000.0;

/// Bucket rings searched around the query point. Buckets are hundredths of
/// a degree, so two rings comfortably cover the snap radius.
const SNAP_BUCKET_RINGS: i32 = 2;

/// Tiles with fewer nodes than this are scanned linearly instead of
/// through the bucket index.
const LINEAR_SCAN_THRESHOLD: usize = 2_000;

/// An outbound, bicycle-traversable edge yielded during expansion.
pub struct Neighbour {
    /// The traversed edge's own graph ID.
    pub edge_id: GraphId,
    pub edge: DirectedEdge,
    /// The state at the far end (possibly another tile and/or level).
    pub end_node: GraphId,
}

pub struct GraphNavigator<P> {
    provider: P,
}

impl<P: GraphTileProvider> GraphNavigator<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Fetches the tile containing the given ID, mapping failures into the
    /// routing error taxonomy.
    ///
    /// # Errors
    ///
    /// `TileMissing`, `TileCorrupt`, or `Internal` per [`RoutingError`].
    pub fn tile(&self, id: GraphId) -> Result<Arc<GraphTileHandle>, RoutingError> {
        self.provider
            .get_tile(id)
            .map_err(|e| RoutingError::from_provider(id, e))
    }

    /// Snaps a coordinate to the nearest node on the given hierarchy level.
    ///
    /// Searches the enclosing tile's spatial buckets (or scans the whole
    /// tile when it is small), ranking candidates with a fast planar
    /// approximation and verifying the winner against the snap radius with
    /// a proper Haversine distance.
    ///
    /// # Errors
    ///
    /// Fails with `TileMissing`/`TileCorrupt` when the enclosing tile is
    /// unavailable, or `NoNodeNearby` when the tile holds no node within
    /// the snap radius.
    pub fn locate(&self, point: Coord<f64>, level: u8) -> Result<GraphId, RoutingError> {
        let tile_id = STANDARD_LEVELS[usize::from(level)].tile_containing(point);
        let tile = self.tile(tile_id)?;

        let candidates: Vec<u32> = if tile.nodes().len() < LINEAR_SCAN_THRESHOLD {
            // Node counts fit in 21 bits.
            #[expect(clippy::cast_possible_truncation)]
            let count = tile.nodes().len() as u32;
            (0..count).collect()
        } else {
            tile.node_indices_near(point, SNAP_BUCKET_RINGS)
        };

        let approximator = DistanceApproximator::new(point);
        let nearest = candidates
            .into_iter()
            .map(|index| {
                let coord = tile.node_coordinate(&tile.nodes()[index as usize]);
                (index, approximator.distance_squared(coord))
            })
            .min_by(|(_, a), (_, b)| a.total_cmp(b));

        let no_node_nearby = || RoutingError::NoNodeNearby {
            lat: point.y,
            lon: point.x,
            radius_km: SNAP_RADIUS_M / 1000.0,
        };

        let (index, _) = nearest.ok_or_else(no_node_nearby)?;
        let coord = tile.node_coordinate(&tile.nodes()[index as usize]);
        if Haversine.distance(point.into(), coord.into()) > SNAP_RADIUS_M {
            return Err(no_node_nearby());
        }

        tile_id
            .with_index(u64::from(index))
            .map_err(|e| RoutingError::Internal(e.to_string()))
    }

    /// The coordinate of a node state.
    ///
    /// # Errors
    ///
    /// Fails if the node's tile cannot be loaded or the index is invalid.
    pub fn coords(&self, node: GraphId) -> Result<Coord<f64>, RoutingError> {
        let tile = self.tile(node)?;
        let info = tile
            .get_node(node)
            .map_err(|e| RoutingError::Internal(format!("node {node}: {e}")))?;
        Ok(tile.node_coordinate(info))
    }

    /// The bicycle-traversable outbound edges of a node.
    ///
    /// Traversability here is the access-mask gate (either direction open
    /// to bicycles); directional access and surface gating are the cost
    /// model's concern. Edges pointing at tiles that cannot exist are
    /// dropped with a log line rather than failing the query.
    ///
    /// # Errors
    ///
    /// Fails if the node's tile cannot be loaded or the index is invalid.
    pub fn neighbours(&self, node: GraphId) -> Result<Vec<Neighbour>, RoutingError> {
        let tile = self.tile(node)?;
        let info = tile
            .get_node(node)
            .map_err(|e| RoutingError::Internal(format!("node {node}: {e}")))?;

        let first_edge_index = u64::from(info.edge_index());
        let mut result = Vec::with_capacity(usize::from(info.edge_count()));
        for (offset, edge) in tile.outbound_edges(info).iter().enumerate() {
            let access = edge.forward_access() | edge.reverse_access();
            if !access.contains(Access::Bicycle) {
                continue;
            }

            let end_node = edge.end_node_id();
            let level = &STANDARD_LEVELS[usize::from(end_node.level().min(2))];
            if end_node.tile_id() >= u64::from(level.tiling_system.tile_count()) {
                debug!(edge_end = %end_node, "Edge points outside the tiling; skipping");
                continue;
            }

            let edge_id = node
                .with_index(first_edge_index + offset as u64)
                .map_err(|e| RoutingError::Internal(e.to_string()))?;
            result.push(Neighbour {
                edge_id,
                edge: edge.clone(),
                end_node,
            });
        }
        Ok(result)
    }

    /// Resolves the opposing half of an edge pair: the edge at the far
    /// node that comes back along the same way.
    ///
    /// Returns `Ok(None)` when the opposing index points past the far
    /// node's edge list (the edge is then one-way-effective in reverse;
    /// logged, not fatal).
    ///
    /// # Errors
    ///
    /// Propagates tile fetch failures for the far tile.
    pub fn opposing(
        &self,
        neighbour: &Neighbour,
    ) -> Result<Option<(GraphId, DirectedEdge)>, RoutingError> {
        let tile = self.tile(neighbour.end_node)?;
        let info = tile.get_node(neighbour.end_node).map_err(|e| {
            RoutingError::Internal(format!("end node {}: {e}", neighbour.end_node))
        })?;

        let opposing_index = neighbour.edge.opposing_edge_index();
        if opposing_index >= info.edge_count() {
            debug!(
                edge = %neighbour.edge_id,
                opposing_index,
                "Opposing edge index out of range; treating as one-way"
            );
            return Ok(None);
        }

        let opposing_id = neighbour
            .end_node
            .with_index(u64::from(info.edge_index()) + u64::from(opposing_index))
            .map_err(|e| RoutingError::Internal(e.to_string()))?;
        let edge = tile
            .get_directed_edge(opposing_id)
            .map_err(|e| RoutingError::Internal(format!("edge {opposing_id}: {e}")))?;
        Ok(Some((opposing_id, edge.clone())))
    }

    /// The level transitions of a node: `(end state, is_up)` pairs,
    /// at most one up and one down.
    ///
    /// # Errors
    ///
    /// Fails if the node's tile cannot be loaded or the index is invalid.
    pub fn transitions(&self, node: GraphId) -> Result<Vec<(GraphId, bool)>, RoutingError> {
        let tile = self.tile(node)?;
        let info = tile
            .get_node(node)
            .map_err(|e| RoutingError::Internal(format!("node {node}: {e}")))?;
        Ok(tile
            .transitions_for_node(info)
            .iter()
            .map(|t| (t.corresponding_end_node_id(), t.is_up()))
            .collect())
    }
}
