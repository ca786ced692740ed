use std::fs::File;

use log::{info, warn};
use serde::Deserialize;
use sqlite::OpenFlags;

use crate::{
    col::{set_new, HashSet},
    error::ImportError,
    location::ExtLocation,
    network::{ExtEdge, ExtNode, ExtNodeId, NodeIdx, RoadNetwork},
    trip::ExtTripRequest,
};

fn reader() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.trim(csv::Trim::All).delimiter(b',');

    builder
}

pub fn parse_trips(stream: impl std::io::Read) -> Result<Box<[ExtTripRequest]>, csv::Error> {
    reader().from_reader(stream).deserialize().collect()
}
pub fn parse_locations(stream: impl std::io::Read) -> Result<Box<[ExtLocation]>, csv::Error> {
    reader().from_reader(stream).deserialize().collect()
}
pub fn parse_nodes(stream: impl std::io::Read) -> Result<Box<[ExtNode]>, csv::Error> {
    reader().from_reader(stream).deserialize().collect()
}
pub fn parse_edges(stream: impl std::io::Read) -> Result<Box<[ExtEdge]>, csv::Error> {
    reader().from_reader(stream).deserialize().collect()
}

#[derive(Debug, Deserialize)]
struct CongestionRow {
    node: ExtNodeId,
}

pub fn parse_congestion(stream: impl std::io::Read) -> Result<Box<[ExtNodeId]>, csv::Error> {
    reader()
        .from_reader(stream)
        .deserialize::<CongestionRow>()
        .map(|row| row.map(|it| it.node))
        .collect()
}

/// Maps congested node ids onto the network; ids not in the network are dropped.
pub fn resolve_congestion(network: &RoadNetwork, ext_ids: &[ExtNodeId]) -> HashSet<NodeIdx> {
    let mut congestion = set_new();
    for &ext_id in ext_ids {
        match network.resolve(ext_id) {
            Some(node) => {
                congestion.insert(node);
            }
            None => warn!("Congested node {:?} is not part of the road network", ext_id),
        }
    }
    congestion
}

pub fn read_trips(path: &str) -> Result<Box<[ExtTripRequest]>, ImportError> {
    info!("Reading trip requests from {}...", path);
    Ok(parse_trips(File::open(path)?)?)
}

pub fn read_locations(path: &str) -> Result<Box<[ExtLocation]>, ImportError> {
    Ok(parse_locations(File::open(path)?)?)
}

pub fn read_congestion(path: &str) -> Result<Box<[ExtNodeId]>, ImportError> {
    Ok(parse_congestion(File::open(path)?)?)
}

pub fn import_network_csv(nodes_path: &str, edges_path: &str) -> Result<RoadNetwork, ImportError> {
    info!("Importing road network from {} and {}...", nodes_path, edges_path);
    let nodes = parse_nodes(File::open(nodes_path)?)?;
    let edges = parse_edges(File::open(edges_path)?)?;
    RoadNetwork::create(&nodes, &edges)
}

pub fn import_network(in_fname: &str) -> Result<RoadNetwork, ImportError> {
    info!("Importing road network from {}...", in_fname);
    let connection =
        sqlite::Connection::open_with_flags(in_fname, OpenFlags::default().with_read_only())?;
    import_network_from(&connection)
}

fn ext_node_id(column: &'static str, value: i64) -> Result<ExtNodeId, ImportError> {
    u64::try_from(value)
        .map(ExtNodeId)
        .map_err(|_| ImportError::InvalidValue { column, value })
}

/// Reads the `node(id, x, y)` and `edge(u, v, length)` tables.
pub fn import_network_from(connection: &sqlite::Connection) -> Result<RoadNetwork, ImportError> {
    let nodes: Vec<ExtNode> = connection
        .prepare("SELECT id, CAST(x AS REAL), CAST(y AS REAL) FROM node ORDER BY id ASC;")?
        .iter()
        .map(|it| -> Result<ExtNode, ImportError> {
            let it = it?;
            Ok(ExtNode {
                id: ext_node_id("node.id", it.read(0))?,
                x: it.read(1),
                y: it.read(2),
            })
        })
        .collect::<Result<_, _>>()?;

    let edges: Vec<ExtEdge> = connection
        .prepare("SELECT u, v, CAST(length AS REAL) FROM edge;")?
        .iter()
        .map(|it| -> Result<ExtEdge, ImportError> {
            let it = it?;
            Ok(ExtEdge {
                u: ext_node_id("edge.u", it.read(0))?,
                v: ext_node_id("edge.v", it.read(1))?,
                length: it.read::<Option<f64>, _>(2),
            })
        })
        .collect::<Result<_, _>>()?;

    info!("Read {} nodes and {} edges", nodes.len(), edges.len());
    RoadNetwork::create(&nodes, &edges)
}
