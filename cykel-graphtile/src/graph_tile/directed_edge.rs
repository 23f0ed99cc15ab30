use crate::{Access, CycleLane, EdgeUse, GraphId, RoadClass, Surface};
use bitfield_struct::bitfield;
use enumset::EnumSet;
use zerocopy::{LE, U16, U32, U64};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, Unaligned};

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::le::conv_u64le::from_inner,
    into = crate::le::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, PartialEq)]
struct FirstBitfield {
    #[bits(46, from = crate::le::conv_u64le::from_inner, into = crate::le::conv_u64le::into_inner)]
    end_node: U64<LE>,
    #[bits(7)]
    opposing_edge_index: u8,
    // Booleans represented as single bits for infailability;
    // see the comment in node.rs.
    #[bits(1)]
    forward: u8,
    #[bits(1)]
    leaves_tile: u8,
    #[bits(9)]
    _spare: U16<LE>,
}

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::le::conv_u64le::from_inner,
    into = crate::le::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, PartialEq)]
struct SecondBitfield {
    #[bits(25, from = crate::le::conv_u32le::from_inner, into = crate::le::conv_u32le::into_inner)]
    edge_info_offset: U32<LE>,
    #[bits(12, from = crate::le::conv_u16le::from_inner, into = crate::le::conv_u16le::into_inner)]
    forward_access: U16<LE>,
    #[bits(12, from = crate::le::conv_u16le::from_inner, into = crate::le::conv_u16le::into_inner)]
    reverse_access: U16<LE>,
    #[bits(1)]
    truck_route: u8,
    #[bits(14)]
    _spare: U16<LE>,
}

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::le::conv_u64le::from_inner,
    into = crate::le::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, PartialEq)]
struct ThirdBitfield {
    /// Posted/estimated speed in kph.
    #[bits(8)]
    speed: u8,
    #[bits(6)]
    edge_use: u8,
    #[bits(3)]
    classification: u8,
    #[bits(3)]
    surface: u8,
    #[bits(2)]
    cycle_lane: u8,
    #[bits(4)]
    lane_count: u8,
    /// Quantized slope: 0-15 with 7 = flat; see the costing model.
    #[bits(4)]
    weighted_grade: u8,
    #[bits(1)]
    shoulder: u8,
    #[bits(1)]
    bike_network: u8,
    #[bits(1)]
    use_sidepath: u8,
    #[bits(1)]
    dismount: u8,
    #[bits(30)]
    _spare: U32<LE>,
}

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::le::conv_u64le::from_inner,
    into = crate::le::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, PartialEq)]
struct FourthBitfield {
    /// Length in meters (24 bits; ~16,777 km ceiling).
    #[bits(24, from = crate::le::conv_u32le::from_inner, into = crate::le::conv_u32le::into_inner)]
    length: U32<LE>,
    #[bits(40)]
    _spare: U64<LE>,
}

/// A directed edge within the routing graph.
///
/// Each physical way is stored twice, once at each end node.
/// This struct contains only the information needed for routing
/// decisions; names and geometry live in [`EdgeInfo`](super::EdgeInfo),
/// shared by both directions of the pair.
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, Debug, Clone, PartialEq)]
#[repr(C)]
pub struct DirectedEdge {
    first_bitfield: FirstBitfield,
    second_bitfield: SecondBitfield,
    third_bitfield: ThirdBitfield,
    fourth_bitfield: FourthBitfield,
    _reserved: [U64<LE>; 2],
}

// The directed edge record layout is part of the external format.
const _: () = assert!(size_of::<DirectedEdge>() == 48);

impl DirectedEdge {
    /// The graph ID of this edge's end node (possibly in another tile
    /// and/or on another level).
    #[inline]
    pub fn end_node_id(&self) -> GraphId {
        // SAFETY: the field is limited to 46 bits.
        unsafe { GraphId::from_id_unchecked(self.first_bitfield.end_node()) }
    }

    /// The local index (among the end node's outbound edges) of the edge
    /// that goes back the other way.
    #[inline]
    pub const fn opposing_edge_index(&self) -> u8 {
        self.first_bitfield.opposing_edge_index()
    }

    /// Is the edge info stored in this edge's direction?
    #[inline]
    pub const fn is_forward(&self) -> bool {
        self.first_bitfield.forward() != 0
    }

    /// Does this edge end in a different tile?
    #[inline]
    pub const fn leaves_tile(&self) -> bool {
        self.first_bitfield.leaves_tile() != 0
    }

    /// The byte offset of this edge's record in the tile's edge info blob.
    #[inline]
    pub const fn edge_info_offset(&self) -> u32 {
        self.second_bitfield.edge_info_offset().get()
    }

    /// Access mask when traversing the edge in its stored direction.
    #[inline]
    pub fn forward_access(&self) -> EnumSet<Access> {
        EnumSet::from_repr_truncated(self.second_bitfield.forward_access().get())
    }

    /// Access mask when traversing the edge against its stored direction.
    #[inline]
    pub fn reverse_access(&self) -> EnumSet<Access> {
        EnumSet::from_repr_truncated(self.second_bitfield.reverse_access().get())
    }

    /// Is this edge part of a designated truck route?
    #[inline]
    pub const fn truck_route(&self) -> bool {
        self.second_bitfield.truck_route() != 0
    }

    /// Posted or estimated road speed in kph.
    #[inline]
    pub const fn speed(&self) -> u8 {
        self.third_bitfield.speed()
    }

    /// The specialized usage of this edge.
    #[inline]
    pub const fn edge_use(&self) -> EdgeUse {
        EdgeUse::from_bits(self.third_bitfield.edge_use())
    }

    /// The road classification (0 = motorway ... 7 = service/other).
    #[inline]
    pub const fn classification(&self) -> RoadClass {
        RoadClass::from_bits(self.third_bitfield.classification())
    }

    /// The surface type.
    #[inline]
    pub const fn surface(&self) -> Surface {
        Surface::from_bits(self.third_bitfield.surface())
    }

    /// The cycle lane designation.
    #[inline]
    pub const fn cycle_lane(&self) -> CycleLane {
        CycleLane::from_bits(self.third_bitfield.cycle_lane())
    }

    /// The number of lanes.
    #[inline]
    pub const fn lane_count(&self) -> u8 {
        self.third_bitfield.lane_count()
    }

    /// Quantized slope (0-15, 7 = flat, higher = uphill).
    #[inline]
    pub const fn weighted_grade(&self) -> u8 {
        self.third_bitfield.weighted_grade()
    }

    /// Does the road have a usable shoulder?
    #[inline]
    pub const fn shoulder(&self) -> bool {
        self.third_bitfield.shoulder() != 0
    }

    /// Is this edge part of a signed bicycle network?
    #[inline]
    pub const fn bike_network(&self) -> bool {
        self.third_bitfield.bike_network() != 0
    }

    /// Is a separate sidepath tagged for cyclists along this road?
    #[inline]
    pub const fn use_sidepath(&self) -> bool {
        self.third_bitfield.use_sidepath() != 0
    }

    /// Must cyclists dismount on this edge?
    #[inline]
    pub const fn dismount(&self) -> bool {
        self.third_bitfield.dismount() != 0
    }

    /// Length of the edge in meters.
    #[inline]
    pub const fn length(&self) -> u32 {
        self.fourth_bitfield.length().get()
    }

    #[expect(clippy::too_many_arguments)]
    pub(crate) fn new(
        end_node: GraphId,
        opposing_edge_index: u8,
        forward: bool,
        edge_info_offset: u32,
        forward_access: EnumSet<Access>,
        reverse_access: EnumSet<Access>,
        truck_route: bool,
        speed: u8,
        edge_use: EdgeUse,
        classification: RoadClass,
        surface: Surface,
        cycle_lane: CycleLane,
        lane_count: u8,
        weighted_grade: u8,
        shoulder: bool,
        bike_network: bool,
        use_sidepath: bool,
        dismount: bool,
        length: u32,
        leaves_tile: bool,
    ) -> Self {
        Self {
            first_bitfield: FirstBitfield::new()
                .with_end_node(U64::<LE>::new(end_node.value()))
                .with_opposing_edge_index(opposing_edge_index)
                .with_forward(u8::from(forward))
                .with_leaves_tile(u8::from(leaves_tile)),
            second_bitfield: SecondBitfield::new()
                .with_edge_info_offset(U32::<LE>::new(edge_info_offset))
                .with_forward_access(U16::<LE>::new(forward_access.as_repr()))
                .with_reverse_access(U16::<LE>::new(reverse_access.as_repr()))
                .with_truck_route(u8::from(truck_route)),
            third_bitfield: ThirdBitfield::new()
                .with_speed(speed)
                .with_edge_use(edge_use.into_bits())
                .with_classification(classification.into_bits())
                .with_surface(surface.into_bits())
                .with_cycle_lane(cycle_lane.into_bits())
                .with_lane_count(lane_count)
                .with_weighted_grade(weighted_grade)
                .with_shoulder(u8::from(shoulder))
                .with_bike_network(u8::from(bike_network))
                .with_use_sidepath(u8::from(use_sidepath))
                .with_dismount(u8::from(dismount)),
            fourth_bitfield: FourthBitfield::new().with_length(U32::<LE>::new(length)),
            _reserved: [U64::<LE>::new(0); 2],
        }
    }
}
