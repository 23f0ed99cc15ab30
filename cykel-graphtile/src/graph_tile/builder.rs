use super::header::{GraphTileHeaderBuilder, VERSION_LEN};
use super::{DirectedEdge, GraphTileBuildError, GraphTileHeader, NodeInfo, NodeTransition};
use crate::graph_tile::node::MAX_EDGES_PER_NODE;
use crate::shape_codec::encode_shape;
use crate::tile_hierarchy::STANDARD_LEVELS;
use crate::{Access, CycleLane, EdgeUse, GraphId, RoadClass, Surface};
use enumset::EnumSet;
use geo::Coord;
use std::collections::HashMap;
use zerocopy::IntoBytes;

/// The writer version stamped into built tiles.
///
/// The leading integer is the format generation the reader checks;
/// the suffix identifies this writer.
const DEFAULT_WRITER_VERSION: [u8; VERSION_LEN] = *b"3.5.1-cykel\0\0\0\0\0";

/// Maximum names per edge info record (4-bit count field).
const MAX_NAMES_PER_EDGE: usize = 15;

/// Attributes of a directed edge to be added to a tile.
///
/// The defaults describe an unremarkable flat residential street,
/// open to everyone in both directions.
#[derive(Clone, Debug)]
pub struct DirectedEdgeSpec {
    pub end_node: GraphId,
    /// The local index of the reverse half of this edge pair,
    /// among the end node's outbound edges.
    pub opposing_edge_index: u8,
    /// Whether the shared edge info is stored in this edge's direction.
    pub forward: bool,
    pub forward_access: EnumSet<Access>,
    pub reverse_access: EnumSet<Access>,
    pub truck_route: bool,
    /// Posted/estimated speed in kph.
    pub speed: u8,
    pub edge_use: EdgeUse,
    pub classification: RoadClass,
    pub surface: Surface,
    pub cycle_lane: CycleLane,
    pub lane_count: u8,
    /// Quantized slope, 7 = flat.
    pub weighted_grade: u8,
    pub shoulder: bool,
    pub bike_network: bool,
    pub use_sidepath: bool,
    pub dismount: bool,
    /// Length in meters.
    pub length: u32,
    pub way_id: u32,
    pub names: Vec<String>,
    pub shape: Vec<Coord<f64>>,
}

impl Default for DirectedEdgeSpec {
    fn default() -> Self {
        Self {
            end_node: GraphId::default(),
            opposing_edge_index: 0,
            forward: true,
            forward_access: EnumSet::all(),
            reverse_access: EnumSet::all(),
            truck_route: false,
            speed: 50,
            edge_use: EdgeUse::Road,
            classification: RoadClass::Residential,
            surface: Surface::Paved,
            cycle_lane: CycleLane::None,
            lane_count: 1,
            weighted_grade: 7,
            shoulder: false,
            bike_network: false,
            use_sidepath: false,
            dismount: false,
            length: 100,
            way_id: 0,
            names: Vec::new(),
            shape: Vec::new(),
        }
    }
}

/// A builder for constructing graph tiles programmatically.
///
/// Nodes are added first; edges and transitions reference them by index.
/// Edges may be added in any order: serialization groups them by start
/// node (preserving insertion order within a node, which is what the
/// opposing-edge indices refer to) and wires up the forward-star pointers.
pub struct GraphTileBuilder {
    graph_id: GraphId,
    sw_corner: Coord<f64>,
    dataset_id: u64,
    density: u8,
    create_date: u32,
    writer_version: [u8; VERSION_LEN],
    nodes: Vec<NodeInfo>,
    edges: Vec<(u32, DirectedEdgeSpec)>,
    transitions: Vec<(u32, GraphId, bool)>,
}

impl GraphTileBuilder {
    /// Creates a builder for the given tile.
    ///
    /// The SW corner is derived from the tile's position in the hierarchy.
    ///
    /// # Errors
    ///
    /// Fails if the tile ID is out of range for the level's tiling.
    pub fn new(graph_id: GraphId) -> Result<Self, GraphTileBuildError> {
        let base = graph_id.tile_base_id();
        let level = &STANDARD_LEVELS[base.level() as usize];
        if base.tile_id() >= u64::from(level.tiling_system.tile_count()) {
            return Err(GraphTileBuildError::InvalidIndex(format!(
                "tile {} does not exist on level {}",
                base.tile_id(),
                base.level()
            )));
        }

        Ok(Self {
            graph_id: base,
            sw_corner: level.tiling_system.tile_base(base.tile_id()),
            dataset_id: 0,
            density: 0,
            create_date: 0,
            writer_version: DEFAULT_WRITER_VERSION,
            nodes: Vec::new(),
            edges: Vec::new(),
            transitions: Vec::new(),
        })
    }

    /// The base graph ID of the tile being built.
    pub fn graph_id(&self) -> GraphId {
        self.graph_id
    }

    /// Sets the version string to encode in the tile header.
    ///
    /// # Errors
    ///
    /// The string must be <= 16 bytes when encoded as UTF-8.
    pub fn with_version(mut self, version: &str) -> Result<Self, GraphTileBuildError> {
        let bytes = version.as_bytes();
        if bytes.len() > VERSION_LEN {
            return Err(GraphTileBuildError::InvalidVersionString(
                version.to_string(),
            ));
        }
        let mut out = [0u8; VERSION_LEN];
        out[..bytes.len()].copy_from_slice(bytes);
        self.writer_version = out;
        Ok(self)
    }

    /// Sets the dataset ID recorded in the header.
    #[must_use]
    pub fn with_dataset_id(mut self, dataset_id: u64) -> Self {
        self.dataset_id = dataset_id;
        self
    }

    /// Adds a node at the given coordinate, returning its index.
    ///
    /// # Errors
    ///
    /// Fails if the coordinate lies outside the tile's bounds.
    pub fn add_node(
        &mut self,
        coord: Coord<f64>,
        access: EnumSet<Access>,
    ) -> Result<u32, GraphTileBuildError> {
        // Offsets are stored in tenths of micro-degrees from the SW corner.
        #[expect(clippy::cast_possible_truncation)]
        let lat_tenths = ((coord.y - self.sw_corner.y) * 1e7).round() as i64;
        #[expect(clippy::cast_possible_truncation)]
        let lon_tenths = ((coord.x - self.sw_corner.x) * 1e7).round() as i64;
        if lat_tenths < 0 || lon_tenths < 0 {
            return Err(GraphTileBuildError::CoordinateOutsideTile(coord));
        }
        let (lat_micro, lat7) = (lat_tenths / 10, lat_tenths % 10);
        let (lon_micro, lon7) = (lon_tenths / 10, lon_tenths % 10);
        if lat_micro >= (1 << 22) || lon_micro >= (1 << 22) {
            return Err(GraphTileBuildError::CoordinateOutsideTile(coord));
        }

        #[expect(clippy::cast_possible_truncation)]
        #[expect(clippy::cast_sign_loss)]
        self.nodes.push(NodeInfo::new(
            lat_micro as u32,
            lat7 as u8,
            lon_micro as u32,
            lon7 as u8,
            access,
        ));
        u32::try_from(self.nodes.len() - 1).map_err(Into::into)
    }

    /// Adds a directed edge leaving the given node.
    ///
    /// # Errors
    ///
    /// Fails if the start node index is invalid.
    pub fn add_edge(
        &mut self,
        start_node: u32,
        spec: DirectedEdgeSpec,
    ) -> Result<(), GraphTileBuildError> {
        if start_node as usize >= self.nodes.len() {
            return Err(GraphTileBuildError::InvalidIndex(format!(
                "start node {start_node} does not exist"
            )));
        }
        if spec.names.len() > MAX_NAMES_PER_EDGE {
            return Err(GraphTileBuildError::BitfieldOverflow {
                field: "name_count".to_string(),
                value: spec.names.len(),
            });
        }
        self.edges.push((start_node, spec));
        Ok(())
    }

    /// Adds a level transition from the given node.
    ///
    /// # Errors
    ///
    /// Fails if the node index is invalid.
    pub fn add_transition(
        &mut self,
        node: u32,
        end_node: GraphId,
        up: bool,
    ) -> Result<(), GraphTileBuildError> {
        if node as usize >= self.nodes.len() {
            return Err(GraphTileBuildError::InvalidIndex(format!(
                "node {node} does not exist"
            )));
        }
        self.transitions.push((node, end_node, up));
        Ok(())
    }

    /// Serializes the tile as owned bytes.
    ///
    /// # Errors
    ///
    /// Fails if any count or offset exceeds its bit field
    /// (e.g. more than 127 edges at one node, or an edge info blob
    /// beyond 2^25 bytes).
    pub fn into_bytes(mut self) -> Result<Vec<u8>, GraphTileBuildError> {
        const HEADER_SIZE: usize = size_of::<GraphTileHeader>();

        // Group by start node; insertion order within a node is preserved
        // (it is what opposing edge indices refer to).
        self.edges.sort_by_key(|(start, _)| *start);
        self.transitions.sort_by_key(|(node, _, _)| *node);

        // Wire up the forward star pointers.
        let mut edge_counts = vec![0usize; self.nodes.len()];
        for (start, _) in &self.edges {
            edge_counts[*start as usize] += 1;
        }
        let mut cursor = 0usize;
        for (node, count) in self.nodes.iter_mut().zip(&edge_counts) {
            if *count > MAX_EDGES_PER_NODE {
                return Err(GraphTileBuildError::BitfieldOverflow {
                    field: "edge_count".to_string(),
                    value: *count,
                });
            }
            #[expect(clippy::cast_possible_truncation)]
            node.set_edges(cursor as u32, *count as u8);
            cursor += count;
        }

        let mut transition_records = Vec::with_capacity(self.transitions.len());
        let mut cursor = 0usize;
        let mut transition_iter = self.transitions.iter().peekable();
        for (index, node) in self.nodes.iter_mut().enumerate() {
            let start = cursor;
            let mut up = false;
            let mut down = false;
            while let Some((_, end, is_up)) =
                transition_iter.next_if(|(n, _, _)| *n as usize == index)
            {
                transition_records.push(NodeTransition::new_transition(*end, *is_up));
                if *is_up {
                    up = true;
                } else {
                    down = true;
                }
                cursor += 1;
            }
            #[expect(clippy::cast_possible_truncation)]
            node.set_transitions(start as u32, up, down);
        }

        // Edge info + text blobs, deduplicating names.
        let mut text_memory: Vec<u8> = Vec::new();
        let mut name_offsets: HashMap<String, u32> = HashMap::new();
        let mut edge_info_memory: Vec<u8> = Vec::new();
        let mut edge_records = Vec::with_capacity(self.edges.len());
        for (_, spec) in &self.edges {
            let offset = edge_info_memory.len();
            if offset >= (1 << 25) {
                return Err(GraphTileBuildError::BitfieldOverflow {
                    field: "edge_info_offset".to_string(),
                    value: offset,
                });
            }

            let encoded_shape = encode_shape(&spec.shape);
            let shape_size = u16::try_from(encoded_shape.len()).map_err(|_| {
                GraphTileBuildError::BitfieldOverflow {
                    field: "encoded_shape_size".to_string(),
                    value: encoded_shape.len(),
                }
            })?;

            edge_info_memory.extend(spec.way_id.to_le_bytes());
            #[expect(clippy::cast_possible_truncation)]
            let bitfield = (spec.names.len() as u32) | (u32::from(shape_size) << 4);
            edge_info_memory.extend(bitfield.to_le_bytes());
            for name in &spec.names {
                let name_offset = match name_offsets.get(name) {
                    Some(offset) => *offset,
                    None => {
                        let offset = u32::try_from(text_memory.len())?;
                        text_memory.extend(name.as_bytes());
                        text_memory.push(0);
                        name_offsets.insert(name.clone(), offset);
                        offset
                    }
                };
                edge_info_memory.extend(name_offset.to_le_bytes());
            }
            edge_info_memory.extend(&encoded_shape);

            let leaves_tile = spec.end_node.tile_base_id() != self.graph_id;
            #[expect(clippy::cast_possible_truncation)]
            edge_records.push(DirectedEdge::new(
                spec.end_node,
                spec.opposing_edge_index,
                spec.forward,
                offset as u32,
                spec.forward_access,
                spec.reverse_access,
                spec.truck_route,
                spec.speed,
                spec.edge_use,
                spec.classification,
                spec.surface,
                spec.cycle_lane,
                spec.lane_count,
                spec.weighted_grade,
                spec.shoulder,
                spec.bike_network,
                spec.use_sidepath,
                spec.dismount,
                spec.length,
                leaves_tile,
            ));
        }

        let edge_info_offset = HEADER_SIZE
            + self.nodes.len() * size_of::<NodeInfo>()
            + transition_records.len() * size_of::<NodeTransition>()
            + edge_records.len() * size_of::<DirectedEdge>();
        let text_offset = edge_info_offset + edge_info_memory.len();
        let tile_size = text_offset + text_memory.len();

        let header = GraphTileHeaderBuilder {
            version: self.writer_version,
            graph_id: self.graph_id,
            density: self.density,
            sw_corner: self.sw_corner,
            dataset_id: self.dataset_id,
            node_count: self.nodes.len(),
            directed_edge_count: edge_records.len(),
            transition_count: transition_records.len(),
            edge_info_offset,
            text_offset,
            tile_size,
            create_date: self.create_date,
        }
        .build()?;

        let mut out = Vec::with_capacity(tile_size);
        out.extend(header.as_bytes());
        for node in &self.nodes {
            out.extend(node.as_bytes());
        }
        for transition in &transition_records {
            out.extend(transition.as_bytes());
        }
        for edge in &edge_records {
            out.extend(edge.as_bytes());
        }
        out.extend(edge_info_memory);
        out.extend(text_memory);

        debug_assert_eq!(out.len(), tile_size);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_tile::{GraphTile, GraphTileHandle};
    use geo::coord;

    #[test]
    fn test_edges_regrouped_by_start_node() {
        let tile_id = GraphId::try_from_components(2, 795_665, 0).unwrap();
        let mut builder = GraphTileBuilder::new(tile_id).unwrap();
        let a = builder
            .add_node(coord! { x: 16.26, y: 48.01 }, EnumSet::all())
            .unwrap();
        let b = builder
            .add_node(coord! { x: 16.27, y: 48.02 }, EnumSet::all())
            .unwrap();

        // Interleave edges from two nodes; the builder must group them.
        for (start, length) in [(a, 10), (b, 20), (a, 30)] {
            builder
                .add_edge(
                    start,
                    DirectedEdgeSpec {
                        end_node: tile_id.with_index(0).unwrap(),
                        length,
                        ..DirectedEdgeSpec::default()
                    },
                )
                .unwrap();
        }

        let tile = GraphTileHandle::try_from(builder.into_bytes().unwrap()).unwrap();
        let node_a = tile.get_node(tile_id.with_index(0).unwrap()).unwrap();
        let node_b = tile.get_node(tile_id.with_index(1).unwrap()).unwrap();

        let a_lengths: Vec<_> = tile
            .outbound_edges(node_a)
            .iter()
            .map(DirectedEdge::length)
            .collect();
        assert_eq!(a_lengths, vec![10, 30]);
        let b_lengths: Vec<_> = tile
            .outbound_edges(node_b)
            .iter()
            .map(DirectedEdge::length)
            .collect();
        assert_eq!(b_lengths, vec![20]);
    }

    #[test]
    fn test_name_deduplication() {
        let tile_id = GraphId::try_from_components(2, 795_665, 0).unwrap();
        let mut builder = GraphTileBuilder::new(tile_id).unwrap();
        let a = builder
            .add_node(coord! { x: 16.26, y: 48.01 }, EnumSet::all())
            .unwrap();
        for _ in 0..2 {
            builder
                .add_edge(
                    a,
                    DirectedEdgeSpec {
                        end_node: tile_id.with_index(0).unwrap(),
                        names: vec!["Hauptstraße".to_string()],
                        ..DirectedEdgeSpec::default()
                    },
                )
                .unwrap();
        }

        let tile = GraphTileHandle::try_from(builder.into_bytes().unwrap()).unwrap();
        // Both records resolve the name, and the text blob holds it once.
        let node = tile.get_node(tile_id.with_index(0).unwrap()).unwrap();
        for edge in tile.outbound_edges(node) {
            let info = tile.get_edge_info(edge).unwrap();
            assert_eq!(info.get_names(), vec!["Hauptstraße"]);
        }
        let text_size = tile.header().tile_size() - tile.header().text_offset();
        assert_eq!(text_size, "Hauptstraße".len() + 1);
    }

    #[test]
    fn test_coordinate_outside_tile() {
        let tile_id = GraphId::try_from_components(2, 795_665, 0).unwrap();
        let mut builder = GraphTileBuilder::new(tile_id).unwrap();
        assert!(matches!(
            builder.add_node(coord! { x: 10.0, y: 40.0 }, EnumSet::all()),
            Err(GraphTileBuildError::CoordinateOutsideTile(_))
        ));
    }

    #[test]
    fn test_invalid_references() {
        let tile_id = GraphId::try_from_components(2, 795_665, 0).unwrap();
        let mut builder = GraphTileBuilder::new(tile_id).unwrap();
        assert!(matches!(
            builder.add_edge(0, DirectedEdgeSpec::default()),
            Err(GraphTileBuildError::InvalidIndex(_))
        ));
        assert!(matches!(
            builder.add_transition(0, GraphId::default(), true),
            Err(GraphTileBuildError::InvalidIndex(_))
        ));
    }

    #[test]
    fn test_custom_version_round_trips() {
        let tile_id = GraphId::try_from_components(0, 100, 0).unwrap();
        let builder = GraphTileBuilder::new(tile_id)
            .unwrap()
            .with_version("3.4.0")
            .unwrap();
        let tile = GraphTileHandle::try_from(builder.into_bytes().unwrap()).unwrap();
        assert_eq!(tile.header().version(), "3.4.0");

        assert!(
            GraphTileBuilder::new(tile_id)
                .unwrap()
                .with_version("a string that is far too long for the field")
                .is_err()
        );
    }
}
