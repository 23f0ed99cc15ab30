use crate::graph_tile::GraphTileBuildError;
use crate::{AsCowStr, GraphId};
use bitfield_struct::bitfield;
use geo::{Coord, coord};
use std::borrow::Cow;
use zerocopy::{F32, LE, U16, U32, U64};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, Unaligned};

/// Remaining variable offset slots reserved for format growth.
/// The header is padded to exactly 272 bytes.
const EMPTY_SLOTS: usize = 51;

/// The number of UTF-8 bytes in the fixed size version field.
pub(crate) const VERSION_LEN: usize = 16;

/// The tile format generation this reader understands.
///
/// The leading integer of the writer version string; bumped on
/// incompatible layout changes.
const SUPPORTED_GENERATION: u32 = 3;

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::le::conv_u64le::from_inner,
    into = crate::le::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, PartialEq)]
struct FirstBitfield {
    #[bits(46, from = crate::le::conv_u64le::from_inner, into = crate::le::conv_u64le::into_inner)]
    graph_id: U64<LE>,
    /// Relative road density within this tile (0-15).
    #[bits(4)]
    density: u8,
    #[bits(14)]
    _spare: U16<LE>,
}

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::le::conv_u64le::from_inner,
    into = crate::le::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, PartialEq)]
struct CountsBitfield {
    #[bits(21, from = crate::le::conv_u32le::from_inner, into = crate::le::conv_u32le::into_inner)]
    node_count: U32<LE>,
    #[bits(21, from = crate::le::conv_u32le::from_inner, into = crate::le::conv_u32le::into_inner)]
    directed_edge_count: U32<LE>,
    #[bits(22)]
    _spare: U32<LE>,
}

#[bitfield(u32,
    repr = U32<LE>,
    from = crate::le::conv_u32le::from_inner,
    into = crate::le::conv_u32le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, PartialEq)]
struct TransitionCountBitfield {
    /// No, this is not a typo: the field is 22 bits wide.
    /// Every node can have up to two transitions (one up, one down).
    #[bits(22, from = crate::le::conv_u32le::from_inner, into = crate::le::conv_u32le::into_inner)]
    transition_count: U32<LE>,
    #[bits(10)]
    _spare: U16<LE>,
}

/// Summary information about the graph tile.
///
/// Contains the tile's identity, the writer version, entity counts,
/// and byte offsets delimiting the variable length data blobs.
#[derive(Clone, FromBytes, IntoBytes, Immutable, Unaligned, Debug, PartialEq)]
#[repr(C)]
pub struct GraphTileHeader {
    bit_field_1: FirstBitfield,
    base_lon_lat: [F32<LE>; 2],
    pub(super) version: [u8; VERSION_LEN],
    /// The dataset ID (canonically, the source OSM changeset ID).
    pub dataset_id: U64<LE>,
    counts_bitfield: CountsBitfield,
    transition_count_bitfield: TransitionCountBitfield,
    /// Offset (from the start of the tile) of the edge info blob.
    edge_info_offset: U32<LE>,
    /// Offset (from the start of the tile) of the text blob.
    text_offset: U32<LE>,
    /// The date the tile was created, as days since the format epoch.
    create_date: U32<LE>,
    /// The size of the tile (in bytes).
    tile_size: U32<LE>,
    _empty_slots: [U32<LE>; EMPTY_SLOTS],
}

// The header layout is part of the external format.
const _: () = assert!(size_of::<GraphTileHeader>() == 272);

impl GraphTileHeader {
    /// The full graph ID of this tile.
    #[inline]
    pub const fn graph_id(&self) -> GraphId {
        // SAFETY: the bit field is limited to 46 bits.
        unsafe { GraphId::from_id_unchecked(self.bit_field_1.graph_id()) }
    }

    /// The relative road density within this tile (0-15).
    #[inline]
    pub const fn density(&self) -> u8 {
        self.bit_field_1.density()
    }

    /// The coordinate of the southwest corner of this graph tile.
    #[inline]
    pub fn sw_corner(&self) -> Coord<f64> {
        coord! {
            x: f64::from(self.base_lon_lat[0].get()),
            y: f64::from(self.base_lon_lat[1].get()),
        }
    }

    /// Gets the writer version used to generate this graph tile.
    pub fn version(&self) -> Cow<'_, str> {
        self.version.as_cow_str()
    }

    /// Whether the writer's format generation is one this reader supports.
    pub fn is_version_supported(&self) -> bool {
        let version = self.version();
        version
            .split('.')
            .next()
            .and_then(|generation| generation.parse::<u32>().ok())
            .is_some_and(|generation| generation == SUPPORTED_GENERATION)
    }

    /// The number of nodes in this graph tile.
    #[inline]
    pub const fn node_count(&self) -> u32 {
        self.counts_bitfield.node_count().get()
    }

    /// The number of directed edges in this graph tile.
    #[inline]
    pub const fn directed_edge_count(&self) -> u32 {
        self.counts_bitfield.directed_edge_count().get()
    }

    /// The number of node transitions in this graph tile.
    #[inline]
    pub const fn transition_count(&self) -> u32 {
        self.transition_count_bitfield.transition_count().get()
    }

    /// The offset (in bytes, from the start of the tile) of the edge info blob.
    #[inline]
    pub const fn edge_info_offset(&self) -> usize {
        self.edge_info_offset.get() as usize
    }

    /// The offset (in bytes, from the start of the tile) of the text blob.
    #[inline]
    pub const fn text_offset(&self) -> usize {
        self.text_offset.get() as usize
    }

    /// The creation date as days since the format epoch.
    #[inline]
    pub const fn create_date(&self) -> u32 {
        self.create_date.get()
    }

    /// The total size of the tile in bytes.
    #[inline]
    pub const fn tile_size(&self) -> usize {
        self.tile_size.get() as usize
    }
}

/// Assembles a header from already-laid-out tile contents.
pub(super) struct GraphTileHeaderBuilder {
    pub version: [u8; VERSION_LEN],
    pub graph_id: GraphId,
    pub density: u8,
    pub sw_corner: Coord<f64>,
    pub dataset_id: u64,
    pub node_count: usize,
    pub directed_edge_count: usize,
    pub transition_count: usize,
    pub edge_info_offset: usize,
    pub text_offset: usize,
    pub tile_size: usize,
    pub create_date: u32,
}

impl GraphTileHeaderBuilder {
    fn checked_count(
        field: &'static str,
        value: usize,
        bits: u32,
    ) -> Result<u32, GraphTileBuildError> {
        let max = (1usize << bits) - 1;
        if value > max {
            Err(GraphTileBuildError::BitfieldOverflow {
                field: field.to_string(),
                value,
            })
        } else {
            #[expect(clippy::cast_possible_truncation)]
            let value = value as u32;
            Ok(value)
        }
    }

    pub(super) fn build(self) -> Result<GraphTileHeader, GraphTileBuildError> {
        let node_count = Self::checked_count("node_count", self.node_count, 21)?;
        let directed_edge_count =
            Self::checked_count("directed_edge_count", self.directed_edge_count, 21)?;
        let transition_count =
            Self::checked_count("transition_count", self.transition_count, 22)?;

        #[expect(clippy::cast_possible_truncation)]
        let base_lon_lat = [
            F32::<LE>::new(self.sw_corner.x as f32),
            F32::<LE>::new(self.sw_corner.y as f32),
        ];

        Ok(GraphTileHeader {
            bit_field_1: FirstBitfield::new()
                .with_graph_id(U64::<LE>::new(self.graph_id.value()))
                .with_density(self.density),
            base_lon_lat,
            version: self.version,
            dataset_id: U64::<LE>::new(self.dataset_id),
            counts_bitfield: CountsBitfield::new()
                .with_node_count(U32::<LE>::new(node_count))
                .with_directed_edge_count(U32::<LE>::new(directed_edge_count)),
            transition_count_bitfield: TransitionCountBitfield::new()
                .with_transition_count(U32::<LE>::new(transition_count)),
            edge_info_offset: U32::<LE>::new(u32::try_from(self.edge_info_offset)?),
            text_offset: U32::<LE>::new(u32::try_from(self.text_offset)?),
            create_date: U32::<LE>::new(self.create_date),
            tile_size: U32::<LE>::new(u32::try_from(self.tile_size)?),
            _empty_slots: [U32::<LE>::new(0); EMPTY_SLOTS],
        })
    }
}
