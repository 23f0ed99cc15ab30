//! End-to-end routing tests over synthetic tile sets.
//!
//! Each test builds a small world (one or more tiles on disk in a temp
//! directory), then routes over it through the public planner or the
//! search functions directly.

use approx::assert_relative_eq;
use cykel_costing::{BicycleCosting, BicycleType, CostParams, Costing};
use cykel_graphtile::graph_tile::{DirectedEdgeSpec, GraphTileBuilder};
use cykel_graphtile::shape_codec::decode_shape;
use cykel_graphtile::tile_hierarchy::STANDARD_LEVELS;
use cykel_graphtile::tile_provider::DirectoryTileProvider;
use cykel_graphtile::{Access, EdgeUse, GraphId, Surface};
use cykel_router::search::{self, SearchOptions};
use cykel_router::{CancelToken, GraphNavigator, RouteOptions, RoutePlanner, RouteRequest, RoutingError};
use enumset::EnumSet;
use geo::{Coord, Distance, Haversine, coord};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

const BIKE_OPEN: fn() -> EnumSet<Access> = EnumSet::all;

/// A multi-tile test graph. Ways are added as twin pairs so opposing edge
/// indices can be wired up exactly as the tile format expects.
#[derive(Default)]
struct TestGraph {
    nodes: Vec<(GraphId, Coord<f64>)>,
    /// Per node, the outbound edge indices in local (tile) order.
    adjacency: Vec<Vec<usize>>,
    edges: Vec<TestEdge>,
    transitions: Vec<(usize, usize, bool)>,
}

struct TestEdge {
    from: usize,
    to: usize,
    twin: usize,
    spec: DirectedEdgeSpec,
}

impl TestGraph {
    fn new() -> Self {
        Self::default()
    }

    /// Adds a node in the tile containing `coord` on the given level.
    fn add_node(&mut self, level: u8, coord: Coord<f64>) -> usize {
        let tile = STANDARD_LEVELS[usize::from(level)].tile_containing(coord);
        // The in-tile index is assigned per tile at write time; store the
        // position within the tile's insertion order for now.
        let index = self
            .nodes
            .iter()
            .filter(|(id, _)| id.tile_base_id() == tile)
            .count();
        self.nodes
            .push((tile.with_index(index as u64).unwrap(), coord));
        self.adjacency.push(Vec::new());
        self.nodes.len() - 1
    }

    /// Adds a two-way street between `a` and `b`. Returns the edge indices
    /// of the two halves.
    fn add_way(&mut self, a: usize, b: usize, spec: &DirectedEdgeSpec) -> (usize, usize) {
        let forward = self.edges.len();
        let backward = forward + 1;

        let mut forward_spec = spec.clone();
        forward_spec.forward = true;
        let mut backward_spec = spec.clone();
        backward_spec.forward = false;
        std::mem::swap(
            &mut backward_spec.forward_access,
            &mut backward_spec.reverse_access,
        );

        self.edges.push(TestEdge {
            from: a,
            to: b,
            twin: backward,
            spec: forward_spec,
        });
        self.edges.push(TestEdge {
            from: b,
            to: a,
            twin: forward,
            spec: backward_spec,
        });
        self.adjacency[a].push(forward);
        self.adjacency[b].push(backward);
        (forward, backward)
    }

    /// Adds a one-way street from `a` to `b`: the return half exists (as
    /// the tile format requires) but grants no access at all.
    fn add_oneway(&mut self, a: usize, b: usize, spec: &DirectedEdgeSpec) -> (usize, usize) {
        let mut spec = spec.clone();
        spec.forward_access = BIKE_OPEN();
        spec.reverse_access = EnumSet::empty();
        self.add_way(a, b, &spec)
    }

    fn add_transition(&mut self, from: usize, to: usize, up: bool) {
        self.transitions.push((from, to, up));
    }

    /// Serializes all tiles into the standard directory layout.
    fn write(&self, dir: &Path) {
        let mut builders: BTreeMap<GraphId, GraphTileBuilder> = BTreeMap::new();
        for (id, coord) in &self.nodes {
            let builder = builders
                .entry(id.tile_base_id())
                .or_insert_with(|| GraphTileBuilder::new(*id).unwrap());
            builder.add_node(*coord, EnumSet::all()).unwrap();
        }

        for (from, edge_indices) in self.adjacency.iter().enumerate() {
            let (from_id, from_coord) = self.nodes[from];
            let builder = builders.get_mut(&from_id.tile_base_id()).unwrap();
            for edge_index in edge_indices {
                let edge = &self.edges[*edge_index];
                let (to_id, to_coord) = self.nodes[edge.to];

                // The opposing index is the twin's position among the end
                // node's outbound edges.
                let opposing_edge_index = self.adjacency[edge.to]
                    .iter()
                    .position(|e| *e == edge.twin)
                    .unwrap() as u8;

                let mut spec = edge.spec.clone();
                spec.end_node = to_id;
                spec.opposing_edge_index = opposing_edge_index;
                if spec.length == 0 {
                    spec.length =
                        Haversine.distance(from_coord.into(), to_coord.into()).round() as u32;
                }
                if spec.shape.is_empty() {
                    spec.shape = vec![from_coord, to_coord];
                }
                builder.add_edge(from_id.index() as u32, spec).unwrap();
            }
        }

        for (from, to, up) in &self.transitions {
            let (from_id, _) = self.nodes[*from];
            let (to_id, _) = self.nodes[*to];
            let builder = builders.get_mut(&from_id.tile_base_id()).unwrap();
            builder
                .add_transition(from_id.index() as u32, to_id, *up)
                .unwrap();
        }

        for (tile_id, builder) in builders {
            let path = dir.join(tile_id.file_path("gph").unwrap());
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, builder.into_bytes().unwrap()).unwrap();
        }
    }

    fn node_id(&self, node: usize) -> GraphId {
        self.nodes[node].0
    }

    fn node_coord(&self, node: usize) -> Coord<f64> {
        self.nodes[node].1
    }
}

fn planner(dir: &Path) -> RoutePlanner<Arc<DirectoryTileProvider>> {
    let provider = Arc::new(DirectoryTileProvider::new(
        dir.into(),
        NonZeroUsize::new(16).unwrap(),
    ));
    RoutePlanner::new(provider)
}

fn flat_street() -> DirectedEdgeSpec {
    DirectedEdgeSpec {
        speed: 30,
        ..DirectedEdgeSpec::default()
    }
}

fn request(start: Coord<f64>, end: Coord<f64>) -> RouteRequest {
    RouteRequest {
        start,
        end,
        params: CostParams::default(),
        options: RouteOptions::default(),
    }
}

/// A short three-node street within one tile.
fn line_world() -> (TestGraph, tempfile::TempDir) {
    let mut graph = TestGraph::new();
    let a = graph.add_node(2, coord! { x: 16.37, y: 48.21 });
    let b = graph.add_node(2, coord! { x: 16.374, y: 48.21 });
    let c = graph.add_node(2, coord! { x: 16.378, y: 48.21 });
    graph.add_way(a, b, &flat_street());
    graph.add_way(b, c, &flat_street());

    let dir = tempfile::tempdir().unwrap();
    graph.write(dir.path());
    (graph, dir)
}

#[test]
fn test_straight_line_route() {
    let (graph, dir) = line_world();
    let planner = planner(dir.path());

    let summary = planner
        .route(
            &request(graph.node_coord(0), graph.node_coord(2)),
            &CancelToken::new(),
        )
        .expect("route");

    // Two hops of ~296 m each.
    let expected_m = Haversine.distance(graph.node_coord(0).into(), graph.node_coord(1).into())
        + Haversine.distance(graph.node_coord(1).into(), graph.node_coord(2).into());
    assert_relative_eq!(summary.length_km, expected_m / 1000.0, epsilon = 2e-3);
    assert!(summary.time_s > 0.0);
    assert_eq!(summary.transitions, 0);
    assert_relative_eq!(summary.car_km, summary.length_km);
    assert_relative_eq!(summary.cyclefree_km, 0.0);

    let shape = decode_shape(&summary.shape);
    assert_eq!(shape.len(), 3);
    assert!((shape.first().unwrap().x - 16.37).abs() < 1e-5);
    assert!((shape.last().unwrap().x - 16.378).abs() < 1e-5);
}

#[test]
fn test_opposing_edges_point_back() {
    let (graph, dir) = line_world();
    let provider = Arc::new(DirectoryTileProvider::new(
        dir.path().into(),
        NonZeroUsize::new(16).unwrap(),
    ));
    let navigator = GraphNavigator::new(provider);

    // Every edge's opposing mate ends where the edge began.
    for node in 0..3 {
        let node_id = graph.node_id(node);
        for neighbour in navigator.neighbours(node_id).unwrap() {
            let (opposing_id, opposing_edge) = navigator
                .opposing(&neighbour)
                .unwrap()
                .expect("every way has a twin");
            assert_eq!(opposing_edge.end_node_id(), node_id);
            assert_eq!(opposing_id.tile_base_id(), neighbour.end_node.tile_base_id());
        }
    }
}

#[test]
fn test_trivial_route_when_endpoints_coincide() {
    let (graph, dir) = line_world();
    let planner = planner(dir.path());

    let summary = planner
        .route(
            &request(graph.node_coord(1), graph.node_coord(1)),
            &CancelToken::new(),
        )
        .expect("route");

    assert_relative_eq!(summary.length_km, 0.0);
    assert_relative_eq!(summary.time_s, 0.0);
    assert_eq!(decode_shape(&summary.shape).len(), 1);
}

#[test]
fn test_missing_tile_fails_query() {
    let dir = tempfile::tempdir().unwrap();
    let planner = planner(dir.path());

    let result = planner.route(
        &request(
            coord! { x: 16.37, y: 48.21 },
            coord! { x: 16.378, y: 48.21 },
        ),
        &CancelToken::new(),
    );
    assert!(matches!(result, Err(RoutingError::TileMissing { .. })));
}

#[test]
fn test_no_node_nearby() {
    let mut graph = TestGraph::new();
    // Only node in the tile is ~11 km from the query point.
    let a = graph.add_node(2, coord! { x: 16.37, y: 48.10 });
    let b = graph.add_node(2, coord! { x: 16.374, y: 48.10 });
    graph.add_way(a, b, &flat_street());
    let dir = tempfile::tempdir().unwrap();
    graph.write(dir.path());

    let planner = planner(dir.path());
    let result = planner.route(
        &request(coord! { x: 16.37, y: 48.21 }, graph.node_coord(1)),
        &CancelToken::new(),
    );
    assert!(
        matches!(result, Err(RoutingError::NoNodeNearby { radius_km, .. }) if radius_km == 2.0)
    );
}

#[test]
fn test_one_way_street() {
    // Two nodes in adjacent tiles joined by a single one-way street.
    let mut graph = TestGraph::new();
    let a = graph.add_node(2, coord! { x: 16.49, y: 48.21 });
    let b = graph.add_node(2, coord! { x: 16.51, y: 48.21 });
    assert_ne!(
        graph.node_id(a).tile_base_id(),
        graph.node_id(b).tile_base_id(),
        "the fixture should span two tiles"
    );
    graph.add_oneway(a, b, &flat_street());
    let dir = tempfile::tempdir().unwrap();
    graph.write(dir.path());

    let planner = planner(dir.path());

    // With the current: fine.
    let summary = planner
        .route(
            &request(graph.node_coord(a), graph.node_coord(b)),
            &CancelToken::new(),
        )
        .expect("the one-way direction routes");
    assert!(summary.length_km > 1.0);

    // Against it: no route.
    let result = planner.route(
        &request(graph.node_coord(b), graph.node_coord(a)),
        &CancelToken::new(),
    );
    assert!(matches!(result, Err(RoutingError::NoRouteFound(_))));

    // The unidirectional search agrees in both directions.
    let provider = Arc::new(DirectoryTileProvider::new(
        dir.path().into(),
        NonZeroUsize::new(16).unwrap(),
    ));
    let navigator = GraphNavigator::new(provider);
    let costing = BicycleCosting::new(&CostParams::default());
    let options = SearchOptions::default();
    assert!(
        search::dijkstra(
            &navigator,
            &costing,
            graph.node_id(a),
            graph.node_id(b),
            &options,
            &CancelToken::new(),
        )
        .is_ok()
    );
    assert!(matches!(
        search::dijkstra(
            &navigator,
            &costing,
            graph.node_id(b),
            graph.node_id(a),
            &options,
            &CancelToken::new(),
        ),
        Err(RoutingError::NoRouteFound(_))
    ));
}

#[test]
fn test_surface_gating_forces_detour() {
    // A short dirt shortcut and a longer paved detour.
    let mut graph = TestGraph::new();
    let a = graph.add_node(2, coord! { x: 16.37, y: 48.21 });
    let b = graph.add_node(2, coord! { x: 16.376, y: 48.21 });
    let detour = graph.add_node(2, coord! { x: 16.373, y: 48.218 });
    graph.add_way(
        a,
        b,
        &DirectedEdgeSpec {
            surface: Surface::Dirt,
            ..flat_street()
        },
    );
    graph.add_way(a, detour, &flat_street());
    graph.add_way(detour, b, &flat_street());
    let dir = tempfile::tempdir().unwrap();
    graph.write(dir.path());

    let planner = planner(dir.path());

    let road_request = RouteRequest {
        params: CostParams {
            bicycle_type: BicycleType::Road,
            ..CostParams::default()
        },
        ..request(graph.node_coord(a), graph.node_coord(b))
    };
    let road = planner
        .route(&road_request, &CancelToken::new())
        .expect("a road bike routes around the dirt");

    let mountain_request = RouteRequest {
        params: CostParams {
            bicycle_type: BicycleType::Mountain,
            ..CostParams::default()
        },
        ..request(graph.node_coord(a), graph.node_coord(b))
    };
    let mountain = planner
        .route(&mountain_request, &CancelToken::new())
        .expect("a mountain bike rides the dirt");

    // The road bike's path is the long way around.
    assert!(road.length_km > mountain.length_km * 1.5);
}

#[test]
fn test_cancellation_and_deadline() {
    let (graph, dir) = line_world();
    let planner = planner(dir.path());

    let cancelled = CancelToken::new();
    cancelled.cancel();
    assert!(matches!(
        planner.route(
            &request(graph.node_coord(0), graph.node_coord(2)),
            &cancelled
        ),
        Err(RoutingError::Cancelled)
    ));

    let expired = CancelToken::with_deadline(std::time::Instant::now());
    assert!(matches!(
        planner.route(&request(graph.node_coord(0), graph.node_coord(2)), &expired),
        Err(RoutingError::DeadlineExceeded)
    ));
}

#[test]
fn test_iteration_cap() {
    let (graph, dir) = line_world();
    let provider = Arc::new(DirectoryTileProvider::new(
        dir.path().into(),
        NonZeroUsize::new(16).unwrap(),
    ));
    let navigator = GraphNavigator::new(provider);
    let costing = BicycleCosting::new(&CostParams::default());

    let options = SearchOptions {
        max_iterations: Some(1),
        ..SearchOptions::default()
    };
    let result = search::bidirectional_astar(
        &navigator,
        &costing,
        graph.node_id(0),
        graph.node_id(2),
        &options,
        &CancelToken::new(),
    );
    assert!(matches!(result, Err(RoutingError::NoRouteFound(_))));
}

#[test]
fn test_level_transitions_are_free() {
    // A and B are unconnected on the local level but linked on level 1.
    let mut graph = TestGraph::new();
    let a = graph.add_node(2, coord! { x: 16.37, y: 48.21 });
    let b = graph.add_node(2, coord! { x: 16.39, y: 48.21 });
    let a_arterial = graph.add_node(1, coord! { x: 16.37, y: 48.21 });
    let b_arterial = graph.add_node(1, coord! { x: 16.39, y: 48.21 });
    graph.add_way(a_arterial, b_arterial, &flat_street());
    graph.add_transition(a, a_arterial, true);
    graph.add_transition(a_arterial, a, false);
    graph.add_transition(b, b_arterial, true);
    graph.add_transition(b_arterial, b, false);
    let dir = tempfile::tempdir().unwrap();
    graph.write(dir.path());

    let planner = planner(dir.path());
    let summary = planner
        .route(
            &RouteRequest {
                options: RouteOptions {
                    use_transition_costs: Some(false),
                    ..RouteOptions::default()
                },
                ..request(graph.node_coord(a), graph.node_coord(b))
            },
            &CancelToken::new(),
        )
        .expect("routes via the arterial level");

    assert_eq!(summary.transitions, 2);

    // The only time spent is riding the arterial edge; the transitions
    // themselves are free.
    let provider = Arc::new(DirectoryTileProvider::new(
        dir.path().into(),
        NonZeroUsize::new(16).unwrap(),
    ));
    let navigator = GraphNavigator::new(provider);
    let costing = BicycleCosting::new(&CostParams::default());
    let edge = navigator
        .neighbours(graph.node_id(a_arterial))
        .unwrap()
        .pop()
        .unwrap()
        .edge;
    assert_relative_eq!(summary.time_s, costing.edge_cost(&edge).secs, epsilon = 1e-9);

    // Disabling level transitions makes the pair unreachable.
    let result = planner.route(
        &RouteRequest {
            options: RouteOptions {
                allow_level_transitions: Some(false),
                ..RouteOptions::default()
            },
            ..request(graph.node_coord(a), graph.node_coord(b))
        },
        &CancelToken::new(),
    );
    assert!(matches!(result, Err(RoutingError::NoRouteFound(_))));
}

#[test]
fn test_densified_shape_follows_edge_geometry() {
    let mut graph = TestGraph::new();
    let a = graph.add_node(2, coord! { x: 16.37, y: 48.21 });
    let b = graph.add_node(2, coord! { x: 16.374, y: 48.21 });
    graph.add_way(
        a,
        b,
        &DirectedEdgeSpec {
            shape: vec![
                coord! { x: 16.37, y: 48.21 },
                coord! { x: 16.372, y: 48.2115 },
                coord! { x: 16.374, y: 48.21 },
            ],
            ..flat_street()
        },
    );
    let dir = tempfile::tempdir().unwrap();
    graph.write(dir.path());

    let planner = planner(dir.path());

    let plain = planner
        .route(
            &request(graph.node_coord(a), graph.node_coord(b)),
            &CancelToken::new(),
        )
        .unwrap();
    assert_eq!(decode_shape(&plain.shape).len(), 2);

    let densified = planner
        .route(
            &RouteRequest {
                options: RouteOptions {
                    densify_shape: true,
                    ..RouteOptions::default()
                },
                ..request(graph.node_coord(a), graph.node_coord(b))
            },
            &CancelToken::new(),
        )
        .unwrap();
    let shape = decode_shape(&densified.shape);
    assert_eq!(shape.len(), 3);
    assert!(shape.iter().any(|c| (c.y - 48.2115).abs() < 1e-5));
}

/// Bidirectional A* and plain Dijkstra agree on a randomized grid.
#[test]
fn test_bidirectional_matches_dijkstra() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0x00c1_0c1e);
    let mut graph = TestGraph::new();

    const COLS: usize = 8;
    const ROWS: usize = 6;
    let mut ids = [[0usize; COLS]; ROWS];
    for (row, row_ids) in ids.iter_mut().enumerate() {
        for (col, id) in row_ids.iter_mut().enumerate() {
            *id = graph.add_node(
                2,
                coord! {
                    x: 16.30 + col as f64 * 0.004,
                    y: 48.10 + row as f64 * 0.003,
                },
            );
        }
    }

    let random_street = |rng: &mut StdRng| DirectedEdgeSpec {
        speed: rng.random_range(20..=60),
        surface: if rng.random_bool(0.2) {
            Surface::Compacted
        } else {
            Surface::Paved
        },
        edge_use: if rng.random_bool(0.15) {
            EdgeUse::Cycleway
        } else {
            EdgeUse::Road
        },
        ..DirectedEdgeSpec::default()
    };

    for row in 0..ROWS {
        for col in 0..COLS {
            // Drop a few streets to make the grid imperfect.
            if col + 1 < COLS && !(rng.random_bool(0.1)) {
                let spec = random_street(&mut rng);
                graph.add_way(ids[row][col], ids[row][col + 1], &spec);
            }
            if row + 1 < ROWS && !(rng.random_bool(0.1)) {
                let spec = random_street(&mut rng);
                graph.add_way(ids[row][col], ids[row + 1][col], &spec);
            }
        }
    }

    let dir = tempfile::tempdir().unwrap();
    graph.write(dir.path());

    let provider = Arc::new(DirectoryTileProvider::new(
        dir.path().into(),
        NonZeroUsize::new(16).unwrap(),
    ));
    let navigator = GraphNavigator::new(provider);
    let costing = BicycleCosting::new(&CostParams::default());
    // Turn costs depend on the predecessor, which node-keyed Dijkstra
    // cannot represent; equivalence is checked on plain edge costs.
    let options = SearchOptions {
        use_transition_costs: false,
        ..SearchOptions::default()
    };

    for _ in 0..50 {
        let origin = graph.node_id(rng.random_range(0..graph.nodes.len()));
        let destination = graph.node_id(rng.random_range(0..graph.nodes.len()));

        let via_dijkstra = search::dijkstra(
            &navigator,
            &costing,
            origin,
            destination,
            &options,
            &CancelToken::new(),
        );
        let via_bidirectional = search::bidirectional_astar(
            &navigator,
            &costing,
            origin,
            destination,
            &options,
            &CancelToken::new(),
        );

        match (via_dijkstra, via_bidirectional) {
            (Ok(expected), Ok(actual)) => {
                assert!(
                    (expected.cost - actual.cost).abs() < 1e-6,
                    "{origin} -> {destination}: dijkstra {} vs bidirectional {}",
                    expected.cost,
                    actual.cost
                );
            }
            (Err(RoutingError::NoRouteFound(_)), Err(RoutingError::NoRouteFound(_))) => {}
            (expected, actual) => {
                panic!("{origin} -> {destination}: disagreement: {expected:?} vs {actual:?}");
            }
        }
    }
}

/// The same randomized check against an independent implementation
/// (the `pathfinding` crate).
#[test]
fn test_search_matches_external_oracle() {
    let (graph, dir) = line_world();
    let provider = Arc::new(DirectoryTileProvider::new(
        dir.path().into(),
        NonZeroUsize::new(16).unwrap(),
    ));
    let navigator = GraphNavigator::new(provider);
    let costing = BicycleCosting::new(&CostParams::default());
    let options = SearchOptions {
        use_transition_costs: false,
        ..SearchOptions::default()
    };

    let successors = |node: &GraphId| {
        let mut out = Vec::new();
        for neighbour in navigator.neighbours(*node).unwrap() {
            if !costing.edge_allowed(&neighbour.edge) {
                continue;
            }
            let cost = costing.edge_cost(&neighbour.edge);
            if cost.is_finite() {
                // Fixed-point cost in micro-units for the oracle's Ord bound.
                out.push((neighbour.end_node, (cost.cost * 1e6).round() as u64));
            }
        }
        out
    };

    let oracle = pathfinding::prelude::dijkstra(
        &graph.node_id(0),
        successors,
        |node| *node == graph.node_id(2),
    )
    .expect("oracle finds a path");

    let ours = search::bidirectional_astar(
        &navigator,
        &costing,
        graph.node_id(0),
        graph.node_id(2),
        &options,
        &CancelToken::new(),
    )
    .expect("search finds a path");

    let oracle_cost = oracle.1 as f64 / 1e6;
    assert!(
        (oracle_cost - ours.cost).abs() < 1e-3,
        "oracle {oracle_cost} vs ours {}",
        ours.cost
    );
    assert_eq!(oracle.0.len(), ours.path.len());
}
