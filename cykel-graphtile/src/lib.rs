//! # cykel-graphtile
//!
//! Reader (and writer) for the hierarchical, bit-packed binary graph tiles
//! consumed by the cykel bicycle router. Tiles live in a three-level grid
//! (4.0°, 1.0°, 0.25°) and hold nodes, directed edges, level transitions,
//! and a variable-length edge info blob with names and geometry.

mod graph_id;
pub mod graph_tile;
mod le;
pub mod shape_codec;
pub mod spatial;
pub mod tile_hierarchy;
pub mod tile_provider;

use enumset::EnumSetType;
use std::borrow::Cow;

pub use graph_id::{GraphId, InvalidGraphIdError};

/// Road class; broad hierarchies of relative importance.
///
/// The bicycle costing model uses this to scale roadway stress
/// (a motorway is a lot less pleasant to ride on than a residential street).
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RoadClass {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Unclassified,
    Residential,
    ServiceOther,
}

impl RoadClass {
    const fn into_bits(self) -> u8 {
        self as _
    }

    const fn from_bits(value: u8) -> Self {
        match value {
            0 => Self::Motorway,
            1 => Self::Trunk,
            2 => Self::Primary,
            3 => Self::Secondary,
            4 => Self::Tertiary,
            5 => Self::Unclassified,
            6 => Self::Residential,
            // The field is 3 bits wide, so this arm is exhaustive.
            _ => Self::ServiceOther,
        }
    }

    /// The numeric discriminant (0 = motorway ... 7 = service/other).
    #[inline]
    pub const fn discriminant(self) -> u8 {
        self as u8
    }
}

/// Generalized surface type, ordered from best to worst.
///
/// Costing models refuse edges which are "too rough" for the bicycle type.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord)]
pub enum Surface {
    PavedSmooth,
    Paved,
    PavedRough,
    Compacted,
    Dirt,
    Gravel,
    Path,
    Impassable,
}

impl Surface {
    const fn into_bits(self) -> u8 {
        self as _
    }

    const fn from_bits(value: u8) -> Self {
        match value {
            0 => Self::PavedSmooth,
            1 => Self::Paved,
            2 => Self::PavedRough,
            3 => Self::Compacted,
            4 => Self::Dirt,
            5 => Self::Gravel,
            6 => Self::Path,
            // 3-bit field; exhaustive.
            _ => Self::Impassable,
        }
    }

    /// The numeric discriminant (0 = smooth pavement ... 7 = impassable).
    #[inline]
    pub const fn discriminant(self) -> u8 {
        self as u8
    }
}

/// Sub-categorization of ways based on specialized usage.
///
/// The discriminants are part of the tile format (a 6-bit field),
/// so the gaps between values are intentional.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EdgeUse {
    /// Standard road (the default).
    Road = 0,
    /// Entrance or exit ramp.
    Ramp = 1,
    /// Agricultural use, forest tracks, and some unspecified rough roads.
    Track = 3,
    /// Driveway or private service road.
    Driveway = 4,
    /// Service road with limited routing use.
    Alley = 5,
    /// Streets with preference towards bicyclists and pedestrians.
    LivingStreet = 10,
    /// A generic service road.
    ServiceRoad = 11,
    /// A dedicated bicycle path.
    Cycleway = 20,
    /// A mountain bike trail.
    MountainBike = 21,
    /// A sidewalk along another road.
    Sidewalk = 24,
    /// A type of road with pedestrian priority; bicycles may be granted access.
    Footway = 25,
    /// A stairway/steps.
    Steps = 26,
    Path = 27,
    Pedestrian = 28,
    /// Other / unspecified.
    Other = 40,
    Ferry = 41,
    RailFerry = 42,
}

impl EdgeUse {
    const fn into_bits(self) -> u8 {
        self as _
    }

    const fn from_bits(value: u8) -> Self {
        match value {
            0 => Self::Road,
            1 => Self::Ramp,
            3 => Self::Track,
            4 => Self::Driveway,
            5 => Self::Alley,
            10 => Self::LivingStreet,
            11 => Self::ServiceRoad,
            20 => Self::Cycleway,
            21 => Self::MountainBike,
            24 => Self::Sidewalk,
            25 => Self::Footway,
            26 => Self::Steps,
            27 => Self::Path,
            28 => Self::Pedestrian,
            41 => Self::Ferry,
            42 => Self::RailFerry,
            // Unknown values (including uses this router never touches,
            // like transit lines) collapse to Other rather than failing the
            // whole tile.
            _ => Self::Other,
        }
    }
}

/// Cycle lane designation along an edge.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CycleLane {
    None,
    /// Shared with motor traffic (e.g. sharrows).
    Shared,
    /// A dedicated, painted lane.
    Dedicated,
    /// Physically separated from traffic.
    Separated,
}

impl CycleLane {
    const fn into_bits(self) -> u8 {
        self as _
    }

    const fn from_bits(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Shared,
            2 => Self::Dedicated,
            // 2-bit field; exhaustive.
            _ => Self::Separated,
        }
    }

    /// The numeric discriminant (0 = none ... 3 = separated).
    #[inline]
    pub const fn discriminant(self) -> u8 {
        self as u8
    }
}

/// Access permission by travel type.
///
/// Stored in the tile as a 12-bit field; bicycle access is bit 2.
#[derive(Debug, EnumSetType)]
#[enumset(repr = "u16")]
pub enum Access {
    Auto,
    Pedestrian,
    Bicycle,
    Truck,
    Emergency,
    Taxi,
    Bus,
    HOV,
    Wheelchair,
    Moped,
    Motorcycle,
    GolfCart,
    // NOTE: Only 12 bits are stored, so this enum cannot grow.
}

trait AsCowStr {
    /// Interprets the bytes as UTF-8 (lossily if needed),
    /// stopping before the first null byte.
    fn as_cow_str(&self) -> Cow<'_, str>;
}

impl AsCowStr for [u8] {
    fn as_cow_str(&self) -> Cow<'_, str> {
        let null_index = self.iter().position(|c| *c == 0).unwrap_or(self.len());
        String::from_utf8_lossy(&self[0..null_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enumset::EnumSet;

    #[test]
    fn test_bicycle_access_bit() {
        // The on-disk format stores bicycle access in bit 2.
        let set: EnumSet<Access> = EnumSet::from_repr(1 << 2);
        assert_eq!(set.len(), 1);
        assert!(set.contains(Access::Bicycle));
    }

    #[test]
    fn test_access_mask_width() {
        let set: EnumSet<Access> = EnumSet::all();
        assert_eq!(set.len(), 12);
        assert_eq!(set.as_repr(), 4095);
    }

    #[test]
    fn test_surface_ordering() {
        assert!(Surface::PavedSmooth < Surface::Compacted);
        assert!(Surface::Gravel < Surface::Impassable);
    }

    #[test]
    fn test_edge_use_unknown_collapses_to_other() {
        assert_eq!(EdgeUse::from_bits(50), EdgeUse::Other);
        assert_eq!(EdgeUse::from_bits(63), EdgeUse::Other);
    }
}
