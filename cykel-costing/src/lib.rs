//! # cykel-costing
//!
//! The bicycle cost model: maps a directed edge's attributes (and the
//! rider's preferences) to a traversal cost and duration. Cost models are
//! cheap to construct and live for a single request; all preference-derived
//! tables are precomputed at construction.

mod bicycle;

use cykel_graphtile::graph_tile::DirectedEdge;
use serde::{Deserialize, Serialize};

pub use bicycle::{BicycleCosting, Turn};

/// A traversal cost: the value minimized by the search, plus the wall-clock
/// seconds the traversal takes. The two deliberately differ; preferences
/// inflate cost, never the reported duration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Cost {
    pub cost: f64,
    pub secs: f64,
}

impl Cost {
    /// A cost denoting "impassable for this configuration".
    /// Edges with this cost must be skipped entirely by the search.
    pub const IMPASSABLE: Cost = Cost {
        cost: f64::INFINITY,
        secs: 0.0,
    };

    pub const ZERO: Cost = Cost {
        cost: 0.0,
        secs: 0.0,
    };

    pub fn new(cost: f64, secs: f64) -> Self {
        Self { cost, secs }
    }

    /// Whether the edge is traversable at all.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.cost.is_finite()
    }
}

impl std::ops::Add for Cost {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            cost: self.cost + other.cost,
            secs: self.secs + other.secs,
        }
    }
}

/// A cost model for a single travel mode.
pub trait Costing {
    /// May the edge be traversed in its stored direction at all?
    /// (Access-mask gating; surface and preference gating happens in
    /// [`Costing::edge_cost`].)
    fn edge_allowed(&self, edge: &DirectedEdge) -> bool;

    /// The cost and duration of traversing the edge.
    /// Returns [`Cost::IMPASSABLE`] when the edge cannot be ridden
    /// under this configuration.
    fn edge_cost(&self, edge: &DirectedEdge) -> Cost;

    /// The cost of the maneuver onto `to`, given the turn angle in degrees
    /// (0 = straight ahead, clockwise positive).
    fn transition_cost(&self, turn_degrees: u16, to: &DirectedEdge) -> Cost;

    /// The fastest speed this model can ever produce, in kph.
    /// Search heuristics divide by this, so underestimating it breaks
    /// admissibility.
    fn max_speed_kph(&self) -> f32 {
        25.0
    }
}

/// The kind of bicycle being ridden.
///
/// Determines base speed, surface tolerance, and how mountain bike trails
/// are treated.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub enum BicycleType {
    Road,
    Cross,
    #[default]
    Hybrid,
    Mountain,
}

impl BicycleType {
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

fn default_preference() -> f32 {
    0.25
}

/// Rider preferences, deserializable directly from the
/// `costing_options.bicycle` request shape.
///
/// All float preferences are proportions in [0, 1]; out-of-range values are
/// clamped when the cost model is constructed. The optional speed override
/// is clamped to [5, 60] kph.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CostParams {
    pub bicycle_type: BicycleType,
    /// Willingness to ride on roads alongside car traffic.
    pub use_roads: f32,
    /// Willingness to climb.
    pub use_hills: f32,
    /// How strongly to penalize surfaces near the allowed limit.
    pub avoid_bad_surfaces: f32,
    /// Strongly prefer routes away from car traffic entirely.
    pub avoid_cars: bool,
    /// Override for the rider's speed on flat smooth ground, in kph.
    pub cycling_speed: Option<f32>,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            bicycle_type: BicycleType::default(),
            use_roads: default_preference(),
            use_hills: default_preference(),
            avoid_bad_surfaces: default_preference(),
            avoid_cars: false,
            cycling_speed: None,
        }
    }
}
