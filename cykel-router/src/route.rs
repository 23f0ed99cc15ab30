//! The request coordinator: accepts a pair of coordinates plus rider
//! preferences, runs the search, and shapes the result for the caller.

use crate::cancel::CancelToken;
use crate::navigator::GraphNavigator;
use crate::search::{self, PathStep, SearchOptions};
use crate::RoutingError;
use cykel_costing::{BicycleCosting, CostParams};
use cykel_graphtile::graph_tile::GraphTile;
use cykel_graphtile::shape_codec::encode_shape;
use cykel_graphtile::tile_hierarchy::LOCAL_LEVEL;
use cykel_graphtile::tile_provider::GraphTileProvider;
use cykel_graphtile::EdgeUse;
use geo::Coord;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteOptions {
    /// Interpolate each edge's stored geometry into the result shape
    /// instead of connecting node coordinates only.
    pub densify_shape: bool,
    /// Apply turn-based maneuver costs during the search.
    pub use_transition_costs: Option<bool>,
    /// Expand free transitions between hierarchy levels.
    pub allow_level_transitions: Option<bool>,
}

#[derive(Clone, Debug)]
pub struct RouteRequest {
    /// Start coordinate (x = lon, y = lat).
    pub start: Coord<f64>,
    /// End coordinate (x = lon, y = lat).
    pub end: Coord<f64>,
    pub params: CostParams,
    pub options: RouteOptions,
}

/// A successful route.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RouteSummary {
    /// The route geometry as a varint polyline at 1e-6 precision
    /// (decode with the shape codec).
    #[serde(skip)]
    pub shape: Vec<u8>,
    /// Total length in kilometers.
    pub length_km: f64,
    /// Estimated riding time in seconds.
    pub time_s: f64,
    /// Distance ridden on roads shared with car traffic.
    pub car_km: f64,
    /// Distance ridden on cycleways, paths, and other car-free ways.
    pub cyclefree_km: f64,
    /// Hierarchy level transitions along the path.
    pub transitions: u32,
}

/// The request-reply boundary of the router.
///
/// One planner serves many concurrent queries; the tile cache inside the
/// provider is the only shared state. Cost models are built per request
/// from the submitted parameters.
pub struct RoutePlanner<P> {
    navigator: GraphNavigator<P>,
}

impl<P: GraphTileProvider> RoutePlanner<P> {
    pub fn new(provider: P) -> Self {
        Self {
            navigator: GraphNavigator::new(provider),
        }
    }

    pub fn navigator(&self) -> &GraphNavigator<P> {
        &self.navigator
    }

    /// Computes a bicycle route between two coordinates.
    ///
    /// # Errors
    ///
    /// Any variant of [`RoutingError`](crate::RoutingError): missing or
    /// corrupt endpoint tiles, no snappable node, no route, cancellation.
    pub fn route(
        &self,
        request: &RouteRequest,
        cancel: &CancelToken,
    ) -> Result<RouteSummary, RoutingError> {
        let origin = self.navigator.locate(request.start, LOCAL_LEVEL)?;
        let destination = self.navigator.locate(request.end, LOCAL_LEVEL)?;

        let costing = BicycleCosting::new(&request.params);
        let options = SearchOptions {
            use_transition_costs: request.options.use_transition_costs.unwrap_or(true),
            allow_level_transitions: request.options.allow_level_transitions.unwrap_or(true),
            max_iterations: None,
        };

        let result = search::bidirectional_astar(
            &self.navigator,
            &costing,
            origin,
            destination,
            &options,
            cancel,
        )?;

        info!(
            %origin,
            %destination,
            cost = result.cost,
            secs = result.secs,
            iterations = result.iterations,
            "Route found"
        );

        self.summarize(&result.path, result.secs, request.options.densify_shape)
    }

    /// Converts a node path into geometry and summary counters.
    fn summarize(
        &self,
        path: &[PathStep],
        secs: f64,
        densify: bool,
    ) -> Result<RouteSummary, RoutingError> {
        let mut shape: Vec<Coord<f64>> = Vec::with_capacity(path.len());
        let mut length_m = 0u64;
        let mut car_m = 0u64;
        let mut cyclefree_m = 0u64;
        let mut transitions = 0u32;

        let mut previous_node = None;
        for step in path {
            let coord = self.navigator.coords(step.node)?;

            match &step.edge {
                Some(edge) => {
                    let length = u64::from(edge.length());
                    length_m += length;
                    if is_carfree(edge.edge_use()) {
                        cyclefree_m += length;
                    } else {
                        car_m += length;
                    }

                    if densify && let Some(edge_id) = step.edge_id {
                        // Splice in the edge's stored geometry, oriented in
                        // travel direction, without duplicating endpoints.
                        let tile = self.navigator.tile(edge_id)?;
                        let info = tile.get_edge_info(edge).map_err(|e| {
                            RoutingError::Internal(format!("edge info for {edge_id}: {e}"))
                        })?;
                        let mut geometry = info.decode_raw_shape();
                        if !edge.is_forward() {
                            geometry.reverse();
                        }
                        if geometry.len() > 2 {
                            shape.extend(&geometry[1..geometry.len() - 1]);
                        }
                    }
                }
                None => {
                    // Not reached by an edge: either the origin or a level
                    // transition (same location on an adjacent level).
                    if previous_node.is_some() {
                        transitions += 1;
                        previous_node = Some(step.node);
                        continue;
                    }
                }
            }

            shape.push(coord);
            previous_node = Some(step.node);
        }

        #[expect(clippy::cast_precision_loss)]
        let (length_km, car_km, cyclefree_km) = (
            length_m as f64 / 1000.0,
            car_m as f64 / 1000.0,
            cyclefree_m as f64 / 1000.0,
        );

        Ok(RouteSummary {
            shape: encode_shape(&shape),
            length_km,
            time_s: secs,
            car_km,
            cyclefree_km,
            transitions,
        })
    }
}

/// Use categories that keep the rider away from motor traffic.
fn is_carfree(edge_use: EdgeUse) -> bool {
    matches!(
        edge_use,
        EdgeUse::Cycleway
            | EdgeUse::MountainBike
            | EdgeUse::Path
            | EdgeUse::Footway
            | EdgeUse::Pedestrian
            | EdgeUse::Steps
    )
}
