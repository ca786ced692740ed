pub mod dijkstra;
pub mod oracle;
