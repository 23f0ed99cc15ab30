use crate::{Access, GraphId};
use bitfield_struct::bitfield;
use enumset::EnumSet;
use geo::{Coord, coord};
use zerocopy::{LE, U16, U32, U64};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, Unaligned};

/// Max number of outbound edges per node (7-bit field).
pub(crate) const MAX_EDGES_PER_NODE: usize = 127;

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::le::conv_u64le::from_inner,
    into = crate::le::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, PartialEq)]
struct FirstBitfield {
    #[bits(22, from = crate::le::conv_u32le::from_inner, into = crate::le::conv_u32le::into_inner)]
    lat_offset: U32<LE>,
    #[bits(4)]
    lat_offset7: u8,
    #[bits(22, from = crate::le::conv_u32le::from_inner, into = crate::le::conv_u32le::into_inner)]
    lon_offset: U32<LE>,
    #[bits(4)]
    lon_offset7: u8,
    #[bits(12, from = crate::le::conv_u16le::from_inner, into = crate::le::conv_u16le::into_inner)]
    access: U16<LE>,
}

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::le::conv_u64le::from_inner,
    into = crate::le::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, PartialEq)]
struct SecondBitfield {
    #[bits(21, from = crate::le::conv_u32le::from_inner, into = crate::le::conv_u32le::into_inner)]
    edge_index: U32<LE>,
    #[bits(7)]
    edge_count: u8,
    #[bits(21, from = crate::le::conv_u32le::from_inner, into = crate::le::conv_u32le::into_inner)]
    transition_index: U32<LE>,
    // Booleans are stored as single bits so the struct stays `FromBytes`
    // (every bit pattern is valid).
    #[bits(1)]
    has_up_transition: u8,
    #[bits(1)]
    has_down_transition: u8,
    #[bits(4)]
    density: u8,
    #[bits(9)]
    _spare: U16<LE>,
}

/// Information for a node within the graph.
///
/// The graph uses a forward star structure:
/// nodes point at their first outbound directed edge (plus a count),
/// and each directed edge points at its end node.
/// Transitions to adjacent hierarchy levels hang off nodes the same way.
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, Debug, Clone, PartialEq)]
#[repr(C)]
pub struct NodeInfo {
    first_bit_field: FirstBitfield,
    second_bit_field: SecondBitfield,
    _reserved: [U64<LE>; 2],
}

// The node record layout is part of the external format.
const _: () = assert!(size_of::<NodeInfo>() == 32);

impl NodeInfo {
    /// Gets the coordinate of the node.
    ///
    /// Positions are stored as offsets from the tile's SW corner
    /// in micro-degrees plus a tenth-of-a-micro-degree refinement,
    /// giving 0.1 µ° of precision.
    #[inline]
    pub fn coordinate(&self, sw_corner: Coord<f64>) -> Coord<f64> {
        let lat_offset = f64::from(self.first_bit_field.lat_offset().get()) * 1e-6
            + f64::from(self.first_bit_field.lat_offset7()) * 1e-7;
        let lon_offset = f64::from(self.first_bit_field.lon_offset().get()) * 1e-6
            + f64::from(self.first_bit_field.lon_offset7()) * 1e-7;
        coord! { x: sw_corner.x + lon_offset, y: sw_corner.y + lat_offset }
    }

    /// The access mask for this node.
    #[inline]
    pub fn access(&self) -> EnumSet<Access> {
        // The field is 12 bits and the enum has 12 variants,
        // so every stored pattern is representable.
        EnumSet::from_repr_truncated(self.first_bit_field.access().get())
    }

    /// The index within this tile of the node's first outbound directed edge.
    #[inline]
    pub const fn edge_index(&self) -> u32 {
        self.second_bit_field.edge_index().get()
    }

    /// The number of outbound edges (on this level).
    #[inline]
    pub const fn edge_count(&self) -> u8 {
        self.second_bit_field.edge_count()
    }

    /// The index within this tile of the node's first level transition.
    #[inline]
    pub const fn transition_index(&self) -> u32 {
        self.second_bit_field.transition_index().get()
    }

    /// Does this node have a transition up to a coarser level?
    #[inline]
    pub const fn has_up_transition(&self) -> bool {
        self.second_bit_field.has_up_transition() != 0
    }

    /// Does this node have a transition down to a finer level?
    #[inline]
    pub const fn has_down_transition(&self) -> bool {
        self.second_bit_field.has_down_transition() != 0
    }

    /// The number of level transitions at this node (at most one up + one down).
    #[inline]
    pub const fn transition_count(&self) -> u8 {
        self.second_bit_field.has_up_transition() + self.second_bit_field.has_down_transition()
    }

    /// The relative road density at the node (0-15).
    #[inline]
    pub const fn density(&self) -> u8 {
        self.second_bit_field.density()
    }

    pub(crate) fn new(
        lat_offset: u32,
        lat_offset7: u8,
        lon_offset: u32,
        lon_offset7: u8,
        access: EnumSet<Access>,
    ) -> Self {
        Self {
            first_bit_field: FirstBitfield::new()
                .with_lat_offset(U32::<LE>::new(lat_offset))
                .with_lat_offset7(lat_offset7)
                .with_lon_offset(U32::<LE>::new(lon_offset))
                .with_lon_offset7(lon_offset7)
                .with_access(U16::<LE>::new(access.as_repr())),
            second_bit_field: SecondBitfield::new(),
            _reserved: [U64::<LE>::new(0); 2],
        }
    }

    pub(crate) fn set_edges(&mut self, edge_index: u32, edge_count: u8) {
        self.second_bit_field
            .set_edge_index(U32::<LE>::new(edge_index));
        self.second_bit_field.set_edge_count(edge_count);
    }

    pub(crate) fn set_transitions(&mut self, transition_index: u32, up: bool, down: bool) {
        self.second_bit_field
            .set_transition_index(U32::<LE>::new(transition_index));
        self.second_bit_field.set_has_up_transition(u8::from(up));
        self.second_bit_field
            .set_has_down_transition(u8::from(down));
    }
}

/// A zero-cost link between the corresponding nodes on two adjacent
/// hierarchy levels.
#[bitfield(u64,
    repr = U64<LE>,
    from = crate::le::conv_u64le::from_inner,
    into = crate::le::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, PartialEq)]
pub struct NodeTransition {
    #[bits(46, from = crate::le::conv_u64le::from_inner, into = crate::le::conv_u64le::into_inner)]
    end_node_id: U64<LE>,
    #[bits(1)]
    up: u8,
    #[bits(17)]
    _spare: U32<LE>,
}

// The transition record layout is part of the external format.
const _: () = assert!(size_of::<NodeTransition>() == 8);

impl NodeTransition {
    /// The ID of the corresponding node on the adjacent hierarchy level.
    #[inline]
    pub const fn corresponding_end_node_id(&self) -> GraphId {
        // SAFETY: the field is limited to 46 bits.
        unsafe { GraphId::from_id_unchecked(self.end_node_id()) }
    }

    /// Is the transition up to a coarser level?
    #[inline]
    pub const fn is_up(&self) -> bool {
        self.up() != 0
    }

    pub(crate) fn new_transition(end_node: GraphId, up: bool) -> Self {
        Self::new()
            .with_end_node_id(U64::<LE>::new(end_node.value()))
            .with_up(u8::from(up))
    }
}
