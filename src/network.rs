use std::fmt::Debug;

use log::warn;
use serde::Deserialize;

use crate::col::HashMap;
use crate::error::ImportError;
use crate::indexer::Indexer;
use crate::primitives::Meters;

/// Road node id as found in the source map data.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct ExtNodeId(pub u64);
impl Debug for ExtNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}", self.0))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(pub u32);
impl Debug for NodeIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("n#{}", self.0))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeIdx(pub u32);
impl Debug for EdgeIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("e#{}", self.0))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtNode {
    pub id: ExtNodeId,
    /// Longitude.
    pub x: f64,
    /// Latitude.
    pub y: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtEdge {
    pub u: ExtNodeId,
    pub v: ExtNodeId,
    pub length: Option<Meters>,
}

#[derive(Debug)]
pub struct NodePayload {
    pub id: ExtNodeId,
    pub x: f64,
    pub y: f64,
    pub incident: Vec<EdgeIdx>,
}

#[derive(Debug)]
pub struct EdgePayload {
    pub u: NodeIdx,
    pub v: NodeIdx,
    pub length: Meters,
}

impl EdgePayload {
    pub fn other(&self, node: NodeIdx) -> NodeIdx {
        if self.u == node {
            self.v
        } else {
            self.u
        }
    }
}

/// Edge length used when the source data has none or an unusable one.
pub const DEFAULT_EDGE_LENGTH: Meters = 1.0;

/// Undirected road graph. Directed source edges are folded into undirected
/// ones; parallel edges are kept.
#[derive(Debug)]
pub struct RoadNetwork {
    nodes: Vec<NodePayload>,
    edges: Vec<EdgePayload>,
    node_by_ext_id: HashMap<ExtNodeId, NodeIdx>,
}

fn sanitize_length(length: Option<Meters>) -> Meters {
    match length {
        Some(length) if length.is_finite() && length >= 0.0 => length,
        _ => DEFAULT_EDGE_LENGTH,
    }
}

impl RoadNetwork {
    pub fn create(ext_nodes: &[ExtNode], ext_edges: &[ExtEdge]) -> Result<Self, ImportError> {
        let mut indexer = Indexer::new(|it| NodeIdx(it as u32));
        let mut nodes: Vec<NodePayload> = Vec::with_capacity(ext_nodes.len());
        for node in ext_nodes {
            let idx = indexer.index(node.id);
            if idx.0 as usize == nodes.len() {
                nodes.push(NodePayload {
                    id: node.id,
                    x: node.x,
                    y: node.y,
                    incident: Vec::new(),
                });
            } else {
                warn!("Duplicate road node {:?}, keeping the first one", node.id);
            }
        }

        let mut edges: Vec<EdgePayload> = Vec::with_capacity(ext_edges.len());
        for edge in ext_edges {
            let u = indexer
                .get(&edge.u)
                .ok_or(ImportError::UnknownEdgeEndpoint(edge.u))?;
            let v = indexer
                .get(&edge.v)
                .ok_or(ImportError::UnknownEdgeEndpoint(edge.v))?;
            let edge_idx = EdgeIdx(edges.len() as u32);
            edges.push(EdgePayload {
                u,
                v,
                length: sanitize_length(edge.length),
            });
            nodes[u.0 as usize].incident.push(edge_idx);
            if u != v {
                nodes[v.0 as usize].incident.push(edge_idx);
            }
        }

        let node_by_ext_id = indexer.into_map();
        Ok(RoadNetwork {
            nodes,
            edges,
            node_by_ext_id,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, node_idx: NodeIdx) -> &NodePayload {
        &self.nodes[node_idx.0 as usize]
    }

    pub fn edge(&self, edge_idx: EdgeIdx) -> &EdgePayload {
        &self.edges[edge_idx.0 as usize]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIdx, &NodePayload)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (NodeIdx(idx as u32), node))
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeIdx, &EdgePayload)> {
        self.edges
            .iter()
            .enumerate()
            .map(|(idx, edge)| (EdgeIdx(idx as u32), edge))
    }

    pub fn resolve(&self, ext_id: ExtNodeId) -> Option<NodeIdx> {
        self.node_by_ext_id.get(&ext_id).copied()
    }

    pub fn ext_id(&self, node_idx: NodeIdx) -> ExtNodeId {
        self.node(node_idx).id
    }

    /// Neighbors of `node_idx` with the length of the connecting edge.
    pub fn neighbors(&self, node_idx: NodeIdx) -> impl Iterator<Item = (NodeIdx, Meters)> + '_ {
        self.node(node_idx).incident.iter().map(move |&edge_idx| {
            let edge = self.edge(edge_idx);
            (edge.other(node_idx), edge.length)
        })
    }

    /// Length of the shortest direct edge between `a` and `b`, if they are adjacent.
    #[cfg(test)]
    pub fn edge_length(&self, a: NodeIdx, b: NodeIdx) -> Option<Meters> {
        self.neighbors(a)
            .filter(|&(other, _)| other == b)
            .map(|(_, length)| length)
            .min_by(|x, y| x.total_cmp(y))
    }
}
