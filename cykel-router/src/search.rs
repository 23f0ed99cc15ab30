//! Bidirectional A\* over the tiled graph.
//!
//! Two best-first searches run in lockstep: one forward from the origin
//! over outbound edges, one from the destination traversing each outbound
//! edge's opposing mate (so one-way restrictions hold in reverse). A state
//! is a node `(level, tile, index)`; costs come from the injected
//! [`Costing`]. The fronts stop once their frontier can no longer beat the
//! best meeting found so far.

use crate::cancel::CancelToken;
use crate::navigator::GraphNavigator;
use crate::RoutingError;
use cykel_costing::{Cost, Costing};
use cykel_graphtile::GraphId;
use cykel_graphtile::graph_tile::DirectedEdge;
use cykel_graphtile::tile_provider::GraphTileProvider;
use geo::{Bearing, Coord, Distance, Haversine};
use std::collections::{BinaryHeap, HashMap};
use tracing::debug;

/// Expansion cap by crow-fly distance between the endpoints.
/// A blown cap means the graph is broken (or the query hopeless), so the
/// search gives up rather than grinding on. Edge expansions and level
/// transitions count equally.
fn adaptive_iteration_limit(distance_m: f64) -> usize {
    if distance_m < 5_000.0 {
        50_000
    } else if distance_m < 20_000.0 {
        100_000
    } else if distance_m < 50_000.0 {
        200_000
    } else {
        300_000
    }
}

#[derive(Clone, Debug)]
pub struct SearchOptions {
    /// Apply turn-based maneuver costs at each expansion.
    pub use_transition_costs: bool,
    /// Expand the free transitions between hierarchy levels.
    /// Hierarchical search strategies may disable them.
    pub allow_level_transitions: bool,
    /// Overrides the distance-based expansion cap.
    pub max_iterations: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            use_transition_costs: true,
            allow_level_transitions: true,
            max_iterations: None,
        }
    }
}

/// One hop of a reconstructed path.
#[derive(Clone, Debug)]
pub struct PathStep {
    pub node: GraphId,
    /// The edge traversed to arrive at this node, in travel direction.
    /// `None` for the origin and for level transitions.
    pub edge_id: Option<GraphId>,
    pub edge: Option<DirectedEdge>,
}

#[derive(Debug)]
pub struct SearchResult {
    pub path: Vec<PathStep>,
    /// Total cost of the path (the minimized quantity).
    pub cost: f64,
    /// Total riding time in seconds.
    pub secs: f64,
    /// Expansions spent finding it.
    pub iterations: usize,
}

struct HeapEntry {
    sort_cost: f64,
    cost: Cost,
    node: GraphId,
}

// Order by sort cost, inverted: BinaryHeap is a max-heap and we want the
// cheapest entry on top.
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.sort_cost.total_cmp(&self.sort_cost)
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.sort_cost.total_cmp(&other.sort_cost).is_eq()
    }
}

impl Eq for HeapEntry {}

#[derive(Clone)]
struct PredEntry {
    pred: GraphId,
    edge_id: Option<GraphId>,
    edge: Option<DirectedEdge>,
}

#[derive(Clone, Copy, Eq, PartialEq)]
enum Direction {
    Forward,
    Reverse,
}

/// One direction's search state.
struct Front {
    heap: BinaryHeap<HeapEntry>,
    /// Best g-cost pushed per state (settled or frontier).
    best: HashMap<GraphId, Cost>,
    /// States popped with their final g-cost.
    settled: HashMap<GraphId, Cost>,
    pred: HashMap<GraphId, PredEntry>,
    done: bool,
    direction: Direction,
    /// The opposite search's origin; `None` disables the heuristic
    /// (plain uniform-cost search).
    target: Option<Coord<f64>>,
    heuristic_speed_mps: f64,
}

impl Front {
    fn new(
        origin: GraphId,
        direction: Direction,
        target: Option<Coord<f64>>,
        origin_coord: Coord<f64>,
        heuristic_speed_mps: f64,
    ) -> Self {
        let mut front = Self {
            heap: BinaryHeap::new(),
            best: HashMap::new(),
            settled: HashMap::new(),
            pred: HashMap::new(),
            done: false,
            direction,
            target,
            heuristic_speed_mps,
        };
        let h = front.heuristic(origin_coord);
        front.best.insert(origin, Cost::ZERO);
        front.heap.push(HeapEntry {
            sort_cost: h,
            cost: Cost::ZERO,
            node: origin,
        });
        front
    }

    fn heuristic(&self, coord: Coord<f64>) -> f64 {
        match self.target {
            Some(target) => {
                Haversine.distance(coord.into(), target.into()) / self.heuristic_speed_mps
            }
            None => 0.0,
        }
    }

    /// Pushes a state if it improves on everything seen so far.
    /// The predecessor entry tracks the best-known g, so reconstruction
    /// always follows the cheapest discovered path.
    fn push_improved(&mut self, node: GraphId, g: Cost, h: f64, pred: PredEntry) {
        if self.settled.contains_key(&node) {
            return;
        }
        if let Some(best) = self.best.get(&node)
            && g.cost >= best.cost
        {
            return;
        }
        self.best.insert(node, g);
        self.pred.insert(node, pred);
        self.heap.push(HeapEntry {
            sort_cost: g.cost + h,
            cost: g,
            node,
        });
    }
}

/// Advances one front by a single expansion.
fn step<P: GraphTileProvider, C: Costing>(
    navigator: &GraphNavigator<P>,
    costing: &C,
    options: &SearchOptions,
    front: &mut Front,
    other_best: &HashMap<GraphId, Cost>,
    best_meeting: &mut Option<(GraphId, f64)>,
    iterations: &mut usize,
) -> Result<(), RoutingError> {
    if front.done {
        return Ok(());
    }
    let Some(entry) = front.heap.pop() else {
        front.done = true;
        return Ok(());
    };
    *iterations += 1;

    // Lazy deletion: a state pops once with its best g; later copies are
    // stale and discarded.
    if front.settled.contains_key(&entry.node) {
        return Ok(());
    }
    front.settled.insert(entry.node, entry.cost);

    // If the other direction already knows a g-cost for this state, their
    // sum is a complete path; keep the cheapest.
    if let Some(other_g) = other_best.get(&entry.node) {
        let total = entry.cost.cost + other_g.cost;
        if best_meeting.is_none_or(|(_, best)| total < best) {
            *best_meeting = Some((entry.node, total));
        }
    }

    // This front can stop once its frontier minimum cannot beat the best
    // meeting; the other front may keep going.
    if let Some((_, best)) = best_meeting
        && entry.sort_cost >= *best
    {
        front.done = true;
        return Ok(());
    }

    let pred_entry = front.pred.get(&entry.node).cloned();
    let node_coord = navigator.coords(entry.node)?;
    let pred_coord = if options.use_transition_costs {
        match &pred_entry {
            Some(p) => Some(navigator.coords(p.pred)?),
            None => None,
        }
    } else {
        None
    };

    for neighbour in navigator.neighbours(entry.node)? {
        // Resolve the edge actually ridden. The reverse front walks each
        // outbound edge's opposing mate, so an edge pair whose return half
        // is missing or closed to bicycles is simply not expandable.
        let (edge_id, edge) = match front.direction {
            Direction::Forward => (neighbour.edge_id, neighbour.edge.clone()),
            Direction::Reverse => match navigator.opposing(&neighbour) {
                Ok(Some(pair)) => pair,
                Ok(None) => continue,
                Err(e) if e.is_graph_boundary() => continue,
                Err(e) => return Err(e),
            },
        };
        if !costing.edge_allowed(&edge) {
            continue;
        }
        let mut cost = costing.edge_cost(&edge);
        if !cost.is_finite() {
            continue;
        }

        // A neighbour in an absent or refused tile is a boundary of the
        // reachable graph, not an error.
        let next_node = neighbour.end_node;
        let next_coord = match navigator.coords(next_node) {
            Ok(coord) => coord,
            Err(e) if e.is_graph_boundary() => continue,
            Err(e) => return Err(e),
        };

        if options.use_transition_costs
            && let (Some(pred_coord), Some(pred_entry)) = (pred_coord, &pred_entry)
        {
            // The turn happens at the node being expanded. In travel order
            // the forward front goes pred -> node -> next and enters the
            // new edge; the reverse front goes next -> node -> pred and
            // enters the previously relaxed one.
            cost = cost
                + match front.direction {
                    Direction::Forward => costing.transition_cost(
                        turn_degrees(pred_coord, node_coord, next_coord),
                        &edge,
                    ),
                    Direction::Reverse => match &pred_entry.edge {
                        Some(entered) => costing.transition_cost(
                            turn_degrees(next_coord, node_coord, pred_coord),
                            entered,
                        ),
                        // The previous hop was a level transition.
                        None => Cost::ZERO,
                    },
                };
        }

        let g = entry.cost + cost;
        let h = front.heuristic(next_coord);
        front.push_improved(
            next_node,
            g,
            h,
            PredEntry {
                pred: entry.node,
                edge_id: Some(edge_id),
                edge: Some(edge),
            },
        );
    }

    if options.allow_level_transitions {
        for (end_node, _up) in navigator.transitions(entry.node)? {
            let next_coord = match navigator.coords(end_node) {
                Ok(coord) => coord,
                Err(e) if e.is_graph_boundary() => continue,
                Err(e) => return Err(e),
            };
            let h = front.heuristic(next_coord);
            // Level transitions are free and carry no time.
            front.push_improved(
                end_node,
                entry.cost,
                h,
                PredEntry {
                    pred: entry.node,
                    edge_id: None,
                    edge: None,
                },
            );
        }
    }

    Ok(())
}

/// Least-cost path between two located nodes.
///
/// # Errors
///
/// `NoRouteFound` when the fronts never meet or the expansion cap is hit;
/// `Cancelled`/`DeadlineExceeded` from the token; tile errors when a
/// front's own tile disappears mid-query.
pub fn bidirectional_astar<P: GraphTileProvider, C: Costing>(
    navigator: &GraphNavigator<P>,
    costing: &C,
    origin: GraphId,
    destination: GraphId,
    options: &SearchOptions,
    cancel: &CancelToken,
) -> Result<SearchResult, RoutingError> {
    let origin_coord = navigator.coords(origin)?;
    let destination_coord = navigator.coords(destination)?;

    if origin == destination {
        return Ok(SearchResult {
            path: vec![PathStep {
                node: origin,
                edge_id: None,
                edge: None,
            }],
            cost: 0.0,
            secs: 0.0,
            iterations: 0,
        });
    }

    let crow_fly = Haversine.distance(origin_coord.into(), destination_coord.into());
    let limit = options
        .max_iterations
        .unwrap_or_else(|| adaptive_iteration_limit(crow_fly));
    let heuristic_speed_mps = f64::from(costing.max_speed_kph()) / 3.6;

    let mut forward = Front::new(
        origin,
        Direction::Forward,
        Some(destination_coord),
        origin_coord,
        heuristic_speed_mps,
    );
    let mut reverse = Front::new(
        destination,
        Direction::Reverse,
        Some(origin_coord),
        destination_coord,
        heuristic_speed_mps,
    );

    let mut best_meeting: Option<(GraphId, f64)> = None;
    let mut iterations = 0usize;

    while !(forward.done && reverse.done) {
        cancel.check()?;
        if iterations >= limit {
            debug!(iterations, limit, "Expansion cap exceeded");
            return Err(RoutingError::NoRouteFound("expansion limit exceeded"));
        }

        step(
            navigator,
            costing,
            options,
            &mut forward,
            &reverse.best,
            &mut best_meeting,
            &mut iterations,
        )?;
        step(
            navigator,
            costing,
            options,
            &mut reverse,
            &forward.best,
            &mut best_meeting,
            &mut iterations,
        )?;
    }

    let Some((meeting, _)) = best_meeting else {
        return Err(RoutingError::NoRouteFound("the searches never met"));
    };

    debug!(
        %meeting,
        iterations,
        forward_settled = forward.settled.len(),
        reverse_settled = reverse.settled.len(),
        "Search fronts met"
    );

    // Splice origin -> meeting -> destination from the two pred chains.
    let mut path = Vec::new();
    let mut node = meeting;
    while let Some(p) = forward.pred.get(&node) {
        path.push(PathStep {
            node,
            edge_id: p.edge_id,
            edge: p.edge.clone(),
        });
        node = p.pred;
    }
    path.push(PathStep {
        node,
        edge_id: None,
        edge: None,
    });
    path.reverse();

    let mut node = meeting;
    while let Some(p) = reverse.pred.get(&node) {
        path.push(PathStep {
            node: p.pred,
            edge_id: p.edge_id,
            edge: p.edge.clone(),
        });
        node = p.pred;
    }

    let leg_cost = |front: &Front| {
        front
            .settled
            .get(&meeting)
            .or_else(|| front.best.get(&meeting))
            .copied()
            .unwrap_or(Cost::ZERO)
    };
    let total = leg_cost(&forward) + leg_cost(&reverse);

    Ok(SearchResult {
        path,
        cost: total.cost,
        secs: total.secs,
        iterations,
    })
}

/// Unidirectional uniform-cost search sharing the forward expansion
/// semantics. Slower than the bidirectional search; used to cross-check
/// its results.
///
/// # Errors
///
/// As for [`bidirectional_astar`].
pub fn dijkstra<P: GraphTileProvider, C: Costing>(
    navigator: &GraphNavigator<P>,
    costing: &C,
    origin: GraphId,
    destination: GraphId,
    options: &SearchOptions,
    cancel: &CancelToken,
) -> Result<SearchResult, RoutingError> {
    let origin_coord = navigator.coords(origin)?;
    let destination_coord = navigator.coords(destination)?;

    if origin == destination {
        return Ok(SearchResult {
            path: vec![PathStep {
                node: origin,
                edge_id: None,
                edge: None,
            }],
            cost: 0.0,
            secs: 0.0,
            iterations: 0,
        });
    }

    let crow_fly = Haversine.distance(origin_coord.into(), destination_coord.into());
    let limit = options
        .max_iterations
        .unwrap_or_else(|| adaptive_iteration_limit(crow_fly));

    let mut front = Front::new(origin, Direction::Forward, None, origin_coord, 1.0);
    // The meeting bookkeeping degenerates to "did we settle the target".
    let mut best_meeting: Option<(GraphId, f64)> = None;
    let mut target_best: HashMap<GraphId, Cost> = HashMap::new();
    target_best.insert(destination, Cost::ZERO);

    let mut iterations = 0usize;
    while !front.done {
        cancel.check()?;
        if iterations >= limit {
            return Err(RoutingError::NoRouteFound("expansion limit exceeded"));
        }
        step(
            navigator,
            costing,
            options,
            &mut front,
            &target_best,
            &mut best_meeting,
            &mut iterations,
        )?;
    }

    if best_meeting.is_none() {
        return Err(RoutingError::NoRouteFound("destination unreachable"));
    }

    let mut path = Vec::new();
    let mut node = destination;
    while let Some(p) = front.pred.get(&node) {
        path.push(PathStep {
            node,
            edge_id: p.edge_id,
            edge: p.edge.clone(),
        });
        node = p.pred;
    }
    path.push(PathStep {
        node,
        edge_id: None,
        edge: None,
    });
    path.reverse();

    let total = front.settled.get(&destination).copied().unwrap_or(Cost::ZERO);
    Ok(SearchResult {
        path,
        cost: total.cost,
        secs: total.secs,
        iterations,
    })
}

/// The relative bearing (degrees, clockwise, 0 = straight on) of the turn
/// at `at`, arriving from `prev` and leaving toward `next`.
fn turn_degrees(prev: Coord<f64>, at: Coord<f64>, next: Coord<f64>) -> u16 {
    let inbound = Haversine.bearing(prev.into(), at.into());
    let outbound = Haversine.bearing(at.into(), next.into());
    #[expect(clippy::cast_possible_truncation)]
    #[expect(clippy::cast_sign_loss)]
    let relative = (outbound - inbound).rem_euclid(360.0).round() as u16;
    relative % 360
}
