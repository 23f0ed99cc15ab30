use std::collections::HashMap;

use self_cell::self_cell;
use thiserror::Error;
use zerocopy::{FromBytes, transmute};

use crate::spatial::bucket_key;
use crate::{GraphId, InvalidGraphIdError};
use geo::Coord;

// To keep files manageable, internal modules are specific to each record
// type, and the public types are re-exported here.

mod builder;
mod directed_edge;
mod edge_info;
mod header;
mod node;

pub use builder::{DirectedEdgeSpec, GraphTileBuilder};
pub use directed_edge::DirectedEdge;
pub use edge_info::EdgeInfo;
pub use header::GraphTileHeader;
pub use node::{NodeInfo, NodeTransition};

#[derive(Debug, Error)]
pub enum GraphTileDecodingError {
    #[error("The byte buffer ends before the data the header promises.")]
    Truncated,
    #[error("Inconsistent header fields: {0}")]
    BadMagic(String),
    #[error("Unsupported tile format version: {0}")]
    UnsupportedVersion(String),
    #[error("Data cast failed (this almost always means invalid data): {0}")]
    CastError(String),
    #[error("Invalid graph ID.")]
    GraphIdParseError(#[from] InvalidGraphIdError),
}

#[derive(Debug, Error)]
pub enum GraphTileBuildError {
    #[error("Invalid version string: {0} does not fit into 16 bytes in UTF-8.")]
    InvalidVersionString(String),
    #[error("Invalid index: {0}.")]
    InvalidIndex(String),
    #[error(
        "Bitfield overflow: Value {value} for field {field} exceeds the allowed number of bits."
    )]
    BitfieldOverflow { field: String, value: usize },
    #[error("Coordinate {0:?} lies outside the tile being built.")]
    CoordinateOutsideTile(Coord<f64>),
    #[error(
        "Unable to cast an integer to another type (usually means data is too large for the type): {0:?}."
    )]
    TryFromInt(#[from] std::num::TryFromIntError),
    #[error("Invalid graph ID: {0}")]
    InvalidGraphId(#[from] InvalidGraphIdError),
}

#[derive(Debug, Error, PartialEq)]
pub enum LookupError {
    #[error("Mismatched base; the graph ID cannot exist in this tile.")]
    MismatchedBase,
    #[error("The feature at the index specified does not exist in this tile.")]
    InvalidIndex,
}

pub trait GraphTile {
    /// Gets the graph ID of the tile.
    fn graph_id(&self) -> GraphId;

    /// Does the supplied graph ID belong in this tile?
    ///
    /// A true result does not guarantee that an object with this ID exists;
    /// it only checks the level and tile ID.
    fn may_contain_id(&self, id: GraphId) -> bool;

    /// Gets a reference to the [`GraphTileHeader`].
    fn header(&self) -> &GraphTileHeader;

    /// Gets a reference to a node in this tile by graph ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph ID cannot be contained in this tile
    /// or the index is invalid.
    fn get_node(&self, id: GraphId) -> Result<&NodeInfo, LookupError>;

    /// Gets a reference to a directed edge in this tile by graph ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph ID cannot be contained in this tile
    /// or the index is invalid.
    fn get_directed_edge(&self, id: GraphId) -> Result<&DirectedEdge, LookupError>;

    /// The outbound directed edges of a node (contiguous by construction).
    fn outbound_edges(&self, node: &NodeInfo) -> &[DirectedEdge];

    /// The level transitions of a node (at most one up and one down).
    fn transitions_for_node(&self, node: &NodeInfo) -> &[NodeTransition];

    /// Gets edge info for a directed edge.
    ///
    /// This is NOT a zero-cost operation; avoid calling it during costing.
    ///
    /// # Errors
    ///
    /// Any errors here mean the tile is corrupt.
    fn get_edge_info(
        &self,
        directed_edge: &DirectedEdge,
    ) -> Result<EdgeInfo<'_>, GraphTileDecodingError>;

    /// A raw slice of the tile's nodes (i.e. for linear scans).
    fn nodes(&self) -> &[NodeInfo];

    /// Indices of nodes in the spatial buckets within `rings` buckets of the
    /// coordinate (one ring ≈ 1.1 km of latitude).
    fn node_indices_near(&self, coord: Coord<f64>, rings: i32) -> Vec<u32>;

    /// The coordinate of a node in this tile.
    fn node_coordinate(&self, node: &NodeInfo) -> Coord<f64> {
        node.coordinate(self.header().sw_corner())
    }
}

self_cell! {
    /// A read-only owned view of a graph tile.
    ///
    /// Constructed from the (decompressed) tile bytes; all parsed structure
    /// borrows from the owned buffer, so a tile is a pure function of its
    /// bytes and never re-reads the file system.
    pub struct GraphTileHandle {
        owner: Vec<u8>,
        #[covariant]
        dependent: GraphTileView,
    }
}

impl GraphTile for GraphTileHandle {
    #[inline]
    fn graph_id(&self) -> GraphId {
        self.borrow_dependent().graph_id()
    }

    #[inline]
    fn may_contain_id(&self, id: GraphId) -> bool {
        self.borrow_dependent().may_contain_id(id)
    }

    #[inline]
    fn header(&self) -> &GraphTileHeader {
        self.borrow_dependent().header()
    }

    #[inline]
    fn get_node(&self, id: GraphId) -> Result<&NodeInfo, LookupError> {
        self.borrow_dependent().get_node(id)
    }

    #[inline]
    fn get_directed_edge(&self, id: GraphId) -> Result<&DirectedEdge, LookupError> {
        self.borrow_dependent().get_directed_edge(id)
    }

    #[inline]
    fn outbound_edges(&self, node: &NodeInfo) -> &[DirectedEdge] {
        self.borrow_dependent().outbound_edges(node)
    }

    #[inline]
    fn transitions_for_node(&self, node: &NodeInfo) -> &[NodeTransition] {
        self.borrow_dependent().transitions_for_node(node)
    }

    #[inline]
    fn get_edge_info(
        &self,
        directed_edge: &DirectedEdge,
    ) -> Result<EdgeInfo<'_>, GraphTileDecodingError> {
        self.borrow_dependent().get_edge_info(directed_edge)
    }

    #[inline]
    fn nodes(&self) -> &[NodeInfo] {
        self.borrow_dependent().nodes()
    }

    #[inline]
    fn node_indices_near(&self, coord: Coord<f64>, rings: i32) -> Vec<u32> {
        self.borrow_dependent().node_indices_near(coord, rings)
    }
}

impl TryFrom<Vec<u8>> for GraphTileHandle {
    type Error = GraphTileDecodingError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        GraphTileHandle::try_new(value, |data| GraphTileView::try_from(data.as_ref()))
    }
}

/// An internal view over a single tile.
///
/// Access normally goes through the [`GraphTile`] trait.
pub struct GraphTileView<'a> {
    /// Header with tile metadata and internal sizes.
    header: GraphTileHeader,
    nodes: &'a [NodeInfo],
    transitions: &'a [NodeTransition],
    directed_edges: &'a [DirectedEdge],
    /// Raw edge info records, indexed into by directed edges.
    edge_info_memory: &'a [u8],
    /// Null-terminated names, referenced from edge info records.
    text_memory: &'a [u8],
    /// Nodes bucketed by `(floor(lat·100), floor(lon·100))` for
    /// sub-kilometre nearest-node queries.
    node_buckets: HashMap<(i32, i32), Vec<u32>>,
}

impl GraphTile for GraphTileView<'_> {
    #[inline]
    fn graph_id(&self) -> GraphId {
        self.header.graph_id()
    }

    #[inline]
    fn may_contain_id(&self, id: GraphId) -> bool {
        id.tile_base_id() == self.graph_id().tile_base_id()
    }

    #[inline]
    fn header(&self) -> &GraphTileHeader {
        &self.header
    }

    #[inline]
    fn get_node(&self, id: GraphId) -> Result<&NodeInfo, LookupError> {
        if self.may_contain_id(id) {
            // Indexes are limited to 21 bits, so the cast is lossless.
            #[expect(clippy::cast_possible_truncation)]
            let index = id.index() as usize;
            self.nodes.get(index).ok_or(LookupError::InvalidIndex)
        } else {
            Err(LookupError::MismatchedBase)
        }
    }

    fn get_directed_edge(&self, id: GraphId) -> Result<&DirectedEdge, LookupError> {
        if self.may_contain_id(id) {
            #[expect(clippy::cast_possible_truncation)]
            let index = id.index() as usize;
            self.directed_edges
                .get(index)
                .ok_or(LookupError::InvalidIndex)
        } else {
            Err(LookupError::MismatchedBase)
        }
    }

    fn outbound_edges(&self, node: &NodeInfo) -> &[DirectedEdge] {
        let start = node.edge_index() as usize;
        let end = start + usize::from(node.edge_count());
        // An out-of-range run means a corrupt node record; expose no edges.
        self.directed_edges.get(start..end).unwrap_or(&[])
    }

    fn transitions_for_node(&self, node: &NodeInfo) -> &[NodeTransition] {
        let start = node.transition_index() as usize;
        let end = start + usize::from(node.transition_count());
        self.transitions.get(start..end).unwrap_or(&[])
    }

    fn get_edge_info(
        &self,
        directed_edge: &DirectedEdge,
    ) -> Result<EdgeInfo<'_>, GraphTileDecodingError> {
        let edge_info_offset = directed_edge.edge_info_offset() as usize;
        let record = self
            .edge_info_memory
            .get(edge_info_offset..)
            .ok_or(GraphTileDecodingError::Truncated)?;

        EdgeInfo::try_from((record, self.text_memory))
    }

    #[inline]
    fn nodes(&self) -> &[NodeInfo] {
        self.nodes
    }

    fn node_indices_near(&self, coord: Coord<f64>, rings: i32) -> Vec<u32> {
        let (row, col) = bucket_key(coord);
        let mut result = Vec::new();
        for dy in -rings..=rings {
            for dx in -rings..=rings {
                if let Some(indices) = self.node_buckets.get(&(row + dy, col + dx)) {
                    result.extend_from_slice(indices);
                }
            }
        }
        result
    }
}

impl<'a> TryFrom<&'a [u8]> for GraphTileView<'a> {
    type Error = GraphTileDecodingError;

    fn try_from(bytes: &'a [u8]) -> Result<Self, Self::Error> {
        const HEADER_SIZE: usize = size_of::<GraphTileHeader>();

        // Fixed-size header
        let Some(header_slice) = bytes.get(0..HEADER_SIZE) else {
            return Err(GraphTileDecodingError::Truncated);
        };
        let header_slice: [u8; HEADER_SIZE] = header_slice
            .try_into()
            .map_err(|_| GraphTileDecodingError::Truncated)?;
        let header: GraphTileHeader = transmute!(header_slice);

        if !header.is_version_supported() {
            return Err(GraphTileDecodingError::UnsupportedVersion(
                header.version().into_owned(),
            ));
        }

        if header.tile_size() > bytes.len() {
            return Err(GraphTileDecodingError::Truncated);
        }
        if header.tile_size() != bytes.len() {
            return Err(GraphTileDecodingError::BadMagic(format!(
                "header claims {} bytes but the buffer holds {}",
                header.tile_size(),
                bytes.len()
            )));
        }

        // The fixed-size arrays follow the header back to back;
        // the two blobs are delimited by the header offsets.
        let node_count = header.node_count() as usize;
        let transition_count = header.transition_count() as usize;
        let directed_edge_count = header.directed_edge_count() as usize;
        let fixed_end = HEADER_SIZE
            + node_count * size_of::<NodeInfo>()
            + transition_count * size_of::<NodeTransition>()
            + directed_edge_count * size_of::<DirectedEdge>();

        let edge_info_offset = header.edge_info_offset();
        let text_offset = header.text_offset();
        if fixed_end > edge_info_offset
            || edge_info_offset > text_offset
            || text_offset > header.tile_size()
        {
            return Err(GraphTileDecodingError::BadMagic(format!(
                "entity counts (nodes={node_count}, transitions={transition_count}, edges={directed_edge_count}) disagree with the blob offsets ({edge_info_offset}, {text_offset})"
            )));
        }

        let body = &bytes[HEADER_SIZE..];
        let (nodes, body) = <[NodeInfo]>::ref_from_prefix_with_elems(body, node_count)
            .map_err(|e| GraphTileDecodingError::CastError(e.to_string()))?;
        let (transitions, body) =
            <[NodeTransition]>::ref_from_prefix_with_elems(body, transition_count)
                .map_err(|e| GraphTileDecodingError::CastError(e.to_string()))?;
        let (directed_edges, _body) =
            <[DirectedEdge]>::ref_from_prefix_with_elems(body, directed_edge_count)
                .map_err(|e| GraphTileDecodingError::CastError(e.to_string()))?;

        let edge_info_memory = &bytes[edge_info_offset..text_offset];
        let text_memory = &bytes[text_offset..header.tile_size()];

        // Spatial index for nearest-node queries, built once at parse time.
        let sw_corner = header.sw_corner();
        let mut node_buckets: HashMap<(i32, i32), Vec<u32>> = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            #[expect(clippy::cast_possible_truncation)]
            node_buckets
                .entry(bucket_key(node.coordinate(sw_corner)))
                .or_default()
                .push(index as u32);
        }

        Ok(Self {
            header,
            nodes,
            transitions,
            directed_edges,
            edge_info_memory,
            text_memory,
            node_buckets,
        })
    }
}
