use crate::graph_tile::GraphTileDecodingError;
use crate::shape_codec::{decode_first_coordinate, decode_shape};
use crate::AsCowStr;
use bitfield_struct::bitfield;
use geo::Coord;
use std::borrow::Cow;
use zerocopy::{FromBytes, LE, U16, U32};
use zerocopy_derive::{FromBytes, Immutable, KnownLayout, Unaligned};

#[bitfield(u32,
    repr = U32<LE>,
    from = crate::le::conv_u32le::from_inner,
    into = crate::le::conv_u32le::into_inner
)]
#[derive(FromBytes, Immutable, Unaligned, KnownLayout)]
struct InnerBitfield {
    #[bits(4)]
    name_count: u8,
    #[bits(16, from = crate::le::conv_u16le::from_inner, into = crate::le::conv_u16le::into_inner)]
    encoded_shape_size: U16<LE>,
    #[bits(12)]
    _spare: U16<LE>,
}

#[derive(Debug, FromBytes, Immutable, Unaligned, KnownLayout)]
#[repr(C)]
struct EdgeInfoInner {
    /// The source way ID.
    way_id: U32<LE>,
    bitfield: InnerBitfield,
}

/// Edge information that isn't required during path finding.
///
/// Each record holds names and geometry for a directed edge pair
/// (the forward and reverse halves share one record; the stored shape is in
/// the forward direction, so reverse traversals must flip it).
/// Kept out of [`DirectedEdge`](super::DirectedEdge) so the hot routing
/// loop never touches it.
#[derive(Debug)]
pub struct EdgeInfo<'a> {
    inner: &'a EdgeInfoInner,
    name_offsets: &'a [U32<LE>],
    /// The raw varint-encoded shape bytes.
    pub encoded_shape: &'a [u8],
    text_memory: &'a [u8],
}

impl EdgeInfo<'_> {
    /// The source way ID of the edge.
    #[inline]
    pub const fn way_id(&self) -> u32 {
        self.inner.way_id.get()
    }

    /// Decodes the geometry for an edge pair.
    ///
    /// Always returns the stored (forward) coordinate order; reverse
    /// traversals that care about ordering must flip the result.
    ///
    /// # Performance
    ///
    /// This decodes the packed varint representation on every call.
    /// Cache the result if you need the geometry more than once.
    pub fn decode_raw_shape(&self) -> Vec<Coord<f64>> {
        decode_shape(self.encoded_shape)
    }

    /// Decodes only the first coordinate of the geometry
    /// (two varint reads instead of a full decode).
    pub fn first_coordinate(&self) -> Option<Coord<f64>> {
        decode_first_coordinate(self.encoded_shape)
    }

    /// Gets all names for this edge.
    ///
    /// Mostly pointer chasing; the main cost in hot paths is the allocation.
    pub fn get_names(&self) -> Vec<Cow<'_, str>> {
        self.name_offsets
            .iter()
            .filter_map(|offset| {
                self.text_memory
                    .get(offset.get() as usize..)
                    .map(AsCowStr::as_cow_str)
            })
            .collect()
    }
}

impl<'a> TryFrom<(&'a [u8], &'a [u8])> for EdgeInfo<'a> {
    type Error = GraphTileDecodingError;

    fn try_from((bytes, text_memory): (&'a [u8], &'a [u8])) -> Result<Self, Self::Error> {
        let (inner, bytes) = EdgeInfoInner::ref_from_prefix(bytes)
            .map_err(|e| GraphTileDecodingError::CastError(e.to_string()))?;

        let (name_offsets, bytes) = <[U32<LE>]>::ref_from_prefix_with_elems(
            bytes,
            inner.bitfield.name_count() as usize,
        )
        .map_err(|e| GraphTileDecodingError::CastError(e.to_string()))?;

        let shape_size = inner.bitfield.encoded_shape_size().get() as usize;
        let encoded_shape = bytes
            .get(..shape_size)
            .ok_or(GraphTileDecodingError::Truncated)?;

        Ok(Self {
            inner,
            name_offsets,
            encoded_shape,
            text_memory,
        })
    }
}
