//! The bicycle edge-cost formula.
//!
//! Costs are seconds inflated by a stress factor: the riding time along an
//! edge times a multiplier built from how accommodating the edge is to
//! cyclists (lanes, networks, sidepaths) and how stressful the roadway
//! itself is (class, posted speed, trucks, surfaces, grades).

use crate::{BicycleType, Cost, CostParams, Costing};
use cykel_graphtile::graph_tile::DirectedEdge;
use cykel_graphtile::{Access, CycleLane, EdgeUse, Surface};

/// Walking speed when an edge demands dismounting, in kph.
const DISMOUNT_SPEED: f32 = 5.1;

/// Climbing speed on steps, in kph.
const STEPS_SPEED: f32 = 1.0;

/// Cost multiplier for steps.
const STEPS_STRESS: f64 = 8.0;

/// Cost multiplier for ferries.
const FERRY_STRESS: f64 = 1.5;

/// Flat maneuver penalty applied to every transition, in cost-seconds.
const MANEUVER_PENALTY: f32 = 5.0;

/// Default flat-ground speed in kph, by bicycle type.
const DEFAULT_SPEED: [f32; 4] = [25.0, 20.0, 18.0, 16.0];

/// The roughest surface each bicycle type will ride at all.
const WORST_ALLOWED_SURFACE: [Surface; 4] = [
    Surface::Compacted, // Road
    Surface::Gravel,    // Cross
    Surface::Dirt,      // Hybrid
    Surface::Path,      // Mountain
];

/// The first surface that picks up an avoid-bad-surfaces penalty,
/// by bicycle type.
const MINIMAL_SURFACE_PENALIZED: [Surface; 4] = [
    Surface::PavedRough, // Road
    Surface::Compacted,  // Cross
    Surface::Compacted,  // Hybrid
    Surface::Gravel,     // Mountain
];

/// Speed multipliers by surface, per bicycle type.
const ROAD_SURFACE_SPEED_FACTORS: [f32; 8] = [1.0, 1.0, 0.9, 0.6, 0.5, 0.3, 0.2, 0.0];
const CROSS_SURFACE_SPEED_FACTORS: [f32; 8] = [1.0, 1.0, 1.0, 0.8, 0.7, 0.5, 0.4, 0.0];
const HYBRID_SURFACE_SPEED_FACTORS: [f32; 8] = [1.0, 1.0, 1.0, 0.8, 0.6, 0.4, 0.25, 0.0];
const MOUNTAIN_SURFACE_SPEED_FACTORS: [f32; 8] = [1.0, 1.0, 1.0, 1.0, 0.9, 0.75, 0.55, 0.0];

/// Speed multipliers by weighted grade (7 = flat, lower = downhill).
const GRADE_SPEED_FACTOR: [f32; 16] = [
    2.4,  // -10% and steeper
    2.2,  // -8%
    2.0,  // -6.5%
    1.9,  // -5%
    1.7,  // -3%
    1.4,  // -1.5%
    1.2,  // -0.5%
    1.0,  // 0%
    0.95, // 1.5%
    0.85, // 3%
    0.75, // 5%
    0.65, // 6.5%
    0.55, // 8%
    0.5,  // 10%
    0.45, // 11.5%
    0.4,  // 13% and steeper
];

/// How much a grade is avoided (before scaling by the hill preference),
/// by weighted grade.
const AVOID_HILLS_STRENGTH: [f32; 16] = [
    3.0,  // -10% and steeper: treacherous descent
    2.0,  // -8%
    1.0,  // -6.5%
    0.5,  // -5%
    0.2,  // -3%
    0.1,  // -1.5%
    0.0,  // -0.5%
    0.05, // 0%
    0.1,  // 1.5%
    0.3,  // 3%
    0.8,  // 5%
    2.0,  // 6.5%
    3.0,  // 8%
    4.5,  // 10%
    6.5,  // 11.5%
    10.0, // 13% and steeper
];

/// Roadway stress contribution by road class
/// (motorway down to service/other).
const ROAD_CLASS_FACTOR: [f32; 8] = [1.0, 0.4, 0.2, 0.1, 0.05, 0.05, 0.0, 0.5];

/// Penalty factors for surfaces at or beyond the minimal penalized surface.
const SURFACE_PENALTY_FACTORS: [f32; 4] = [1.0, 2.5, 4.5, 7.0];

/// Extra roadway stress by road class when the rider wants to stay away
/// from car traffic entirely. Heavy toward motorways, light toward
/// service streets.
const CAR_AVOIDANCE_FACTOR: [f32; 8] = [10.0, 7.0, 5.0, 3.0, 2.0, 1.5, 1.0, 0.5];

/// Turn-type penalties in cost-seconds, indexed by [`Turn`].
const TURN_PENALTY: [f32; 8] = [
    0.0,  // Straight
    0.5,  // SlightRight
    2.0,  // Right
    3.0,  // SharpRight
    20.0, // Reverse
    7.0,  // SharpLeft
    5.0,  // Left
    1.0,  // SlightLeft
];

/// A classification of the angle between two consecutive edges.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Turn {
    Straight,
    SlightRight,
    Right,
    SharpRight,
    Reverse,
    SharpLeft,
    Left,
    SlightLeft,
}

impl Turn {
    /// Classifies a relative bearing in degrees
    /// (0 = straight ahead, clockwise positive).
    pub fn from_degrees(degrees: u16) -> Self {
        match degrees % 360 {
            0..=10 | 351..=359 => Turn::Straight,
            11..=44 => Turn::SlightRight,
            45..=135 => Turn::Right,
            136..=159 => Turn::SharpRight,
            160..=200 => Turn::Reverse,
            201..=224 => Turn::SharpLeft,
            225..=315 => Turn::Left,
            _ => Turn::SlightLeft,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// The bicycle cost model, with all preference-derived tables precomputed.
///
/// Construction is cheap; one instance is built per request.
pub struct BicycleCosting {
    bicycle_type: BicycleType,
    /// Flat-ground speed in kph after clamping and overrides.
    speed: f32,
    use_roads: f32,
    avoid_bad_surfaces: f32,
    avoid_cars: bool,
    worst_allowed_surface: Surface,
    minimal_surface_penalized: Surface,
    surface_speed_factor: &'static [f32; 8],
    road_factor: f32,
    sidepath_factor: f32,
    livingstreet_factor: f32,
    track_factor: f32,
    grade_penalty: [f32; 16],
    speed_penalty: [f32; 256],
    cyclelane_factor: [f32; 8],
    path_cyclelane_factor: [f32; 4],
}

impl BicycleCosting {
    pub fn new(params: &CostParams) -> Self {
        let use_roads = params.use_roads.clamp(0.0, 1.0);
        let use_hills = params.use_hills.clamp(0.0, 1.0);
        let avoid_bad_surfaces = params.avoid_bad_surfaces.clamp(0.0, 1.0);
        let bicycle_type = params.bicycle_type;

        let speed = params
            .cycling_speed
            .unwrap_or(DEFAULT_SPEED[bicycle_type.index()])
            .clamp(5.0, 60.0);

        let road_factor = if use_roads >= 0.5 {
            1.5 - use_roads
        } else {
            2.0 - 2.0 * use_roads
        };

        let mut grade_penalty = [0f32; 16];
        for (penalty, strength) in grade_penalty.iter_mut().zip(&AVOID_HILLS_STRENGTH) {
            *penalty = (1.0 - use_hills) * strength;
        }

        // Penalize higher-speed roads more for riders who prefer quiet ways.
        let speed_penalty_scale = (1.0 - use_roads) * 0.75 + 0.25;
        let mut speed_penalty = [0f32; 256];
        for (kph, penalty) in speed_penalty.iter_mut().enumerate() {
            #[expect(clippy::cast_precision_loss)]
            let kph = kph as f32;
            let base = if kph <= 40.0 {
                kph / 40.0
            } else if kph <= 65.0 {
                kph / 25.0 - 0.6
            } else {
                kph / 50.0 + 0.7
            };
            *penalty = (base - 1.0) * speed_penalty_scale + 1.0;
        }

        // Accommodation on roads, indexed by 4*shoulder + cyclelane.
        let shared = 0.9 + use_roads * 0.05;
        let dedicated = 0.4 + use_roads * 0.45;
        let separated = 0.15 + use_roads * 0.6;
        let cyclelane_factor = [
            1.0, // no shoulder, no lane
            shared,
            dedicated,
            separated,
            0.7 + use_roads * 0.2, // shoulder, no lane
            shared,
            dedicated,
            separated,
        ];

        // Accommodation on cycleways, footways, and paths.
        let path_cyclelane_factor = [
            0.2 + use_roads * 0.8, // plain path or footway
            0.2 + use_roads * 0.8, // shared path
            0.1 + use_roads * 0.9, // dedicated
            0.05 + use_roads * 0.95, // separated
        ];

        let surface_speed_factor = match bicycle_type {
            BicycleType::Road => &ROAD_SURFACE_SPEED_FACTORS,
            BicycleType::Cross => &CROSS_SURFACE_SPEED_FACTORS,
            BicycleType::Hybrid => &HYBRID_SURFACE_SPEED_FACTORS,
            BicycleType::Mountain => &MOUNTAIN_SURFACE_SPEED_FACTORS,
        };

        Self {
            bicycle_type,
            speed,
            use_roads,
            avoid_bad_surfaces,
            avoid_cars: params.avoid_cars,
            worst_allowed_surface: WORST_ALLOWED_SURFACE[bicycle_type.index()],
            minimal_surface_penalized: MINIMAL_SURFACE_PENALIZED[bicycle_type.index()],
            surface_speed_factor,
            road_factor,
            sidepath_factor: 3.0 * (1.0 - use_roads),
            livingstreet_factor: 0.2 + 0.8 * use_roads,
            track_factor: 0.5 + use_roads,
            grade_penalty,
            speed_penalty,
            cyclelane_factor,
            path_cyclelane_factor,
        }
    }

    /// The flat-ground cycling speed (after clamping), in kph.
    pub fn cycling_speed(&self) -> f32 {
        self.speed
    }

    /// Uses where stress comes from sharing the roadway with motor traffic.
    fn is_roadlike(edge_use: EdgeUse) -> bool {
        !matches!(
            edge_use,
            EdgeUse::Cycleway
                | EdgeUse::Footway
                | EdgeUse::Path
                | EdgeUse::Pedestrian
                | EdgeUse::MountainBike
                | EdgeUse::Steps
                | EdgeUse::Ferry
                | EdgeUse::RailFerry
        )
    }
}

impl Costing for BicycleCosting {
    fn edge_allowed(&self, edge: &DirectedEdge) -> bool {
        edge.forward_access().contains(Access::Bicycle)
    }

    fn edge_cost(&self, edge: &DirectedEdge) -> Cost {
        let surface = edge.surface();
        if surface > self.worst_allowed_surface {
            return Cost::IMPASSABLE;
        }

        let length = f64::from(edge.length());
        let edge_use = edge.edge_use();
        let road_speed = edge.speed().max(1);

        match edge_use {
            EdgeUse::Steps => {
                let secs = length * 3.6 / f64::from(STEPS_SPEED);
                return Cost::new(secs * STEPS_STRESS, secs);
            }
            EdgeUse::Ferry | EdgeUse::RailFerry => {
                let secs = length * 3.6 / f64::from(road_speed);
                return Cost::new(secs * FERRY_STRESS, secs);
            }
            _ => {}
        }

        // How much the edge accommodates cyclists, and how stressful the
        // roadway itself is. The product of the two scales the final factor.
        let mut accommodation = 1.0f32;
        let mut roadway_stress = 1.0f32;
        match edge_use {
            EdgeUse::Cycleway | EdgeUse::Footway | EdgeUse::Path | EdgeUse::Pedestrian => {
                accommodation = self.path_cyclelane_factor[edge.cycle_lane().discriminant() as usize];
            }
            EdgeUse::MountainBike => {
                accommodation = if self.bicycle_type == BicycleType::Mountain {
                    0.3 + self.use_roads
                } else {
                    self.path_cyclelane_factor[edge.cycle_lane().discriminant() as usize]
                };
            }
            EdgeUse::LivingStreet => {
                roadway_stress = self.livingstreet_factor;
            }
            EdgeUse::Track => {
                roadway_stress = self.track_factor;
            }
            _ => {
                let lane_index =
                    usize::from(edge.shoulder()) * 4 + edge.cycle_lane().discriminant() as usize;
                accommodation = self.cyclelane_factor[lane_index];
                roadway_stress +=
                    f32::from(edge.lane_count().saturating_sub(1)) * 0.05 * self.road_factor;
                if edge.truck_route() {
                    roadway_stress += 0.5;
                }
                roadway_stress += self.road_factor
                    * ROAD_CLASS_FACTOR[edge.classification().discriminant() as usize];
                roadway_stress *= self.speed_penalty[usize::from(road_speed)];
            }
        }

        if edge.use_sidepath() {
            accommodation += self.sidepath_factor;
        }
        if edge.bike_network() {
            accommodation *= 0.95;
        }

        let grade = usize::from(edge.weighted_grade().min(15));
        let mut factor = 1.0 + self.grade_penalty[grade] + accommodation * roadway_stress;

        if self.avoid_cars && Self::is_roadlike(edge_use) {
            factor += CAR_AVOIDANCE_FACTOR[edge.classification().discriminant() as usize];
        }

        if surface >= self.minimal_surface_penalized {
            let index = (surface.discriminant() - self.minimal_surface_penalized.discriminant())
                as usize;
            factor += self.avoid_bad_surfaces * SURFACE_PENALTY_FACTORS[index];
        }

        let bike_speed = if edge.dismount() {
            DISMOUNT_SPEED.round()
        } else {
            (self.speed * self.surface_speed_factor[surface.discriminant() as usize]
                * GRADE_SPEED_FACTOR[grade])
                .round()
        }
        .clamp(1.0, 255.0);

        let secs = length * 3.6 / f64::from(bike_speed);
        Cost::new(secs * f64::from(factor), secs)
    }

    fn transition_cost(&self, turn_degrees: u16, to: &DirectedEdge) -> Cost {
        let turn = Turn::from_degrees(turn_degrees);
        let mut penalty = MANEUVER_PENALTY + TURN_PENALTY[turn.index()];
        if to.edge_use() == EdgeUse::Cycleway {
            penalty *= 0.5;
        }
        if to.bike_network() {
            penalty *= 0.7;
        }
        // Penalty only; maneuvers do not inflate the reported duration.
        Cost::new(f64::from(penalty), 0.0)
    }

    fn max_speed_kph(&self) -> f32 {
        // A configured speed above the 25 kph ceiling raises the heuristic
        // bound, keeping A* admissible for fast riders.
        self.speed.max(25.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cykel_graphtile::GraphId;
    use cykel_graphtile::graph_tile::{
        DirectedEdgeSpec, GraphTile, GraphTileBuilder, GraphTileHandle,
    };
    use cykel_graphtile::{RoadClass, Surface};
    use enumset::EnumSet;
    use geo::coord;

    /// Builds a single-edge tile and hands back the parsed edge record.
    fn build_edge(spec: DirectedEdgeSpec) -> DirectedEdge {
        let tile_id = GraphId::try_from_components(2, 795_665, 0).unwrap();
        let mut builder = GraphTileBuilder::new(tile_id).unwrap();
        let node = builder
            .add_node(coord! { x: 16.26, y: 48.01 }, EnumSet::all())
            .unwrap();
        let end_node = tile_id.with_index(u64::from(node)).unwrap();
        builder
            .add_edge(node, DirectedEdgeSpec { end_node, ..spec })
            .unwrap();
        let tile = GraphTileHandle::try_from(builder.into_bytes().unwrap()).unwrap();
        let node = tile.get_node(end_node).unwrap();
        tile.outbound_edges(node)[0].clone()
    }

    fn flat_residential(length: u32) -> DirectedEdgeSpec {
        DirectedEdgeSpec {
            length,
            speed: 50,
            edge_use: EdgeUse::Road,
            classification: RoadClass::Residential,
            surface: Surface::Paved,
            cycle_lane: CycleLane::None,
            weighted_grade: 7,
            ..DirectedEdgeSpec::default()
        }
    }

    #[test]
    fn test_flat_paved_residential_hybrid() {
        // Hybrid, defaults: speed 18 kph on paved flat ground, so a 1 km
        // edge takes 200 s. use_roads = 0.25 gives road_factor 1.5 and a
        // speed penalty of (50/25 - 0.6 - 1) * 0.8125 + 1 = 1.325; the
        // residential class factor is 0, so stress = 1.325, accommodation
        // = 1.0, grade penalty = 0.75 * 0.05. Total factor 2.3625.
        let costing = BicycleCosting::new(&CostParams::default());
        let cost = costing.edge_cost(&build_edge(flat_residential(1000)));

        assert_relative_eq!(cost.secs, 200.0, epsilon = 1e-9);
        assert_relative_eq!(cost.cost, 472.5, epsilon = 1e-3);
    }

    #[test]
    fn test_steps_are_expensive() {
        let costing = BicycleCosting::new(&CostParams::default());
        let cost = costing.edge_cost(&build_edge(DirectedEdgeSpec {
            edge_use: EdgeUse::Steps,
            ..flat_residential(1000)
        }));

        assert_relative_eq!(cost.secs, 3600.0, epsilon = 1e-9);
        assert_relative_eq!(cost.cost, 8.0 * 3600.0, epsilon = 1e-6);
    }

    #[test]
    fn test_ferry() {
        let costing = BicycleCosting::new(&CostParams::default());
        let cost = costing.edge_cost(&build_edge(DirectedEdgeSpec {
            edge_use: EdgeUse::Ferry,
            speed: 18,
            ..flat_residential(1000)
        }));

        assert_relative_eq!(cost.secs, 200.0, epsilon = 1e-9);
        assert_relative_eq!(cost.cost, 300.0, epsilon = 1e-6);
    }

    #[test]
    fn test_surface_gating_by_bicycle_type() {
        let dirt = || DirectedEdgeSpec {
            surface: Surface::Dirt,
            ..flat_residential(1000)
        };

        let road = BicycleCosting::new(&CostParams {
            bicycle_type: BicycleType::Road,
            ..CostParams::default()
        });
        assert!(!road.edge_cost(&build_edge(dirt())).is_finite());

        let mountain = BicycleCosting::new(&CostParams {
            bicycle_type: BicycleType::Mountain,
            ..CostParams::default()
        });
        assert!(mountain.edge_cost(&build_edge(dirt())).is_finite());
    }

    #[test]
    fn test_speed_non_increasing_in_surface() {
        // Effective speed must never rise as the surface gets worse.
        let costing = BicycleCosting::new(&CostParams::default());
        let mut last_secs = 0.0f64;
        for surface in [
            Surface::PavedSmooth,
            Surface::Paved,
            Surface::PavedRough,
            Surface::Compacted,
            Surface::Dirt,
        ] {
            let cost = costing.edge_cost(&build_edge(DirectedEdgeSpec {
                surface,
                ..flat_residential(1000)
            }));
            assert!(cost.is_finite(), "{surface:?} is allowed for hybrid");
            assert!(
                cost.secs >= last_secs,
                "seconds decreased from {last_secs} at {surface:?}"
            );
            last_secs = cost.secs;
        }
    }

    #[test]
    fn test_hill_preference_orders_costs() {
        // An uphill edge costs at least as much for a hill-avoider as for a
        // hill-seeker.
        for grade in 8..16 {
            let edge = build_edge(DirectedEdgeSpec {
                weighted_grade: grade,
                ..flat_residential(1000)
            });
            let avoider = BicycleCosting::new(&CostParams {
                use_hills: 0.0,
                ..CostParams::default()
            });
            let seeker = BicycleCosting::new(&CostParams {
                use_hills: 1.0,
                ..CostParams::default()
            });
            assert!(
                avoider.edge_cost(&edge).cost >= seeker.edge_cost(&edge).cost,
                "grade {grade}"
            );
        }
    }

    #[test]
    fn test_zero_length_edge_is_free() {
        let costing = BicycleCosting::new(&CostParams::default());
        let cost = costing.edge_cost(&build_edge(flat_residential(0)));
        assert_relative_eq!(cost.cost, 0.0);
        assert_relative_eq!(cost.secs, 0.0);
    }

    #[test]
    fn test_dismount_speed() {
        let costing = BicycleCosting::new(&CostParams::default());
        let cost = costing.edge_cost(&build_edge(DirectedEdgeSpec {
            dismount: true,
            ..flat_residential(1000)
        }));
        // 5.1 kph rounds to 5.
        assert_relative_eq!(cost.secs, 1000.0 * 3.6 / 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_params_are_clamped() {
        let costing = BicycleCosting::new(&CostParams {
            use_roads: 7.5,
            use_hills: -3.0,
            cycling_speed: Some(500.0),
            ..CostParams::default()
        });
        // The speed override clamps to 60 kph.
        assert_relative_eq!(costing.cycling_speed(), 60.0);
        // use_roads clamps to 1.0, so road_factor bottoms out at 0.5.
        assert_relative_eq!(costing.road_factor, 0.5);
        // use_hills clamps to 0, leaving the full hill strength in place.
        assert_relative_eq!(costing.grade_penalty[15], AVOID_HILLS_STRENGTH[15]);
    }

    #[test]
    fn test_derived_road_factor() {
        let at = |use_roads: f32| {
            BicycleCosting::new(&CostParams {
                use_roads,
                ..CostParams::default()
            })
            .road_factor
        };
        assert_relative_eq!(at(0.0), 2.0);
        assert_relative_eq!(at(0.25), 1.5);
        assert_relative_eq!(at(0.5), 1.0);
        assert_relative_eq!(at(1.0), 0.5);
    }

    #[test]
    fn test_speed_penalty_piecewise() {
        let costing = BicycleCosting::new(&CostParams {
            use_roads: 1.0, // scale = 0.25
            ..CostParams::default()
        });
        assert_relative_eq!(costing.speed_penalty[40], 1.0, epsilon = 1e-6);
        // 50 kph: base 1.4, scaled to 1.1.
        assert_relative_eq!(costing.speed_penalty[50], 1.1, epsilon = 1e-6);
        // 100 kph: base 2.7, scaled to 1.425.
        assert_relative_eq!(costing.speed_penalty[100], 1.425, epsilon = 1e-6);
    }

    #[test]
    fn test_cycle_lanes_reduce_cost() {
        let costing = BicycleCosting::new(&CostParams::default());
        let without = costing.edge_cost(&build_edge(flat_residential(1000)));
        let with = costing.edge_cost(&build_edge(DirectedEdgeSpec {
            cycle_lane: CycleLane::Separated,
            ..flat_residential(1000)
        }));
        assert!(with.cost < without.cost);
        assert_relative_eq!(with.secs, without.secs);
    }

    #[test]
    fn test_bad_surface_penalty_scales_with_preference() {
        let edge = build_edge(DirectedEdgeSpec {
            surface: Surface::Dirt,
            ..flat_residential(1000)
        });
        let tolerant = BicycleCosting::new(&CostParams {
            avoid_bad_surfaces: 0.0,
            ..CostParams::default()
        });
        let averse = BicycleCosting::new(&CostParams {
            avoid_bad_surfaces: 1.0,
            ..CostParams::default()
        });
        assert!(averse.edge_cost(&edge).cost > tolerant.edge_cost(&edge).cost);
    }

    #[test]
    fn test_avoid_cars_penalizes_busy_roads() {
        let primary = || DirectedEdgeSpec {
            classification: RoadClass::Primary,
            ..flat_residential(1000)
        };
        let relaxed = BicycleCosting::new(&CostParams::default());
        let avoider = BicycleCosting::new(&CostParams {
            avoid_cars: true,
            ..CostParams::default()
        });
        let delta = avoider.edge_cost(&build_edge(primary())).cost
            - relaxed.edge_cost(&build_edge(primary())).cost;
        assert!(delta > 0.0);

        // Cycleways pick up no car penalty at all.
        let cycleway = || DirectedEdgeSpec {
            edge_use: EdgeUse::Cycleway,
            ..flat_residential(1000)
        };
        assert_relative_eq!(
            avoider.edge_cost(&build_edge(cycleway())).cost,
            relaxed.edge_cost(&build_edge(cycleway())).cost
        );
    }

    #[test]
    fn test_turn_classification() {
        assert_eq!(Turn::from_degrees(0), Turn::Straight);
        assert_eq!(Turn::from_degrees(355), Turn::Straight);
        assert_eq!(Turn::from_degrees(30), Turn::SlightRight);
        assert_eq!(Turn::from_degrees(90), Turn::Right);
        assert_eq!(Turn::from_degrees(150), Turn::SharpRight);
        assert_eq!(Turn::from_degrees(180), Turn::Reverse);
        assert_eq!(Turn::from_degrees(210), Turn::SharpLeft);
        assert_eq!(Turn::from_degrees(270), Turn::Left);
        assert_eq!(Turn::from_degrees(330), Turn::SlightLeft);
    }

    #[test]
    fn test_transition_costs() {
        let costing = BicycleCosting::new(&CostParams::default());
        let road = build_edge(flat_residential(100));

        let straight = costing.transition_cost(0, &road);
        assert_relative_eq!(straight.cost, 5.0);
        assert_relative_eq!(straight.secs, 0.0);

        let left = costing.transition_cost(270, &road);
        assert_relative_eq!(left.cost, 10.0);

        let uturn = costing.transition_cost(180, &road);
        assert_relative_eq!(uturn.cost, 25.0);

        // Halved onto a cycleway.
        let cycleway = build_edge(DirectedEdgeSpec {
            edge_use: EdgeUse::Cycleway,
            ..flat_residential(100)
        });
        assert_relative_eq!(costing.transition_cost(270, &cycleway).cost, 5.0);

        // Scaled by 0.7 onto a bike network edge.
        let network = build_edge(DirectedEdgeSpec {
            bike_network: true,
            ..flat_residential(100)
        });
        assert_relative_eq!(costing.transition_cost(270, &network).cost, 7.0);
    }

    #[test]
    fn test_access_gating() {
        let costing = BicycleCosting::new(&CostParams::default());
        let open = build_edge(flat_residential(100));
        assert!(costing.edge_allowed(&open));

        let closed = build_edge(DirectedEdgeSpec {
            forward_access: EnumSet::empty(),
            ..flat_residential(100)
        });
        assert!(!costing.edge_allowed(&closed));
    }
}
