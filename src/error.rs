use thiserror::Error;

use crate::grouping::GroupId;
use crate::network::{ExtNodeId, NodeIdx};

/// Two nodes lie in different connected components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no path between {from:?} and {to:?}")]
pub struct NoPathError {
    pub from: NodeIdx,
    pub to: NodeIdx,
}

/// A group's route could not be computed completely.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnroutableGroupError {
    #[error("group {group} is unroutable: {source}")]
    NoPath {
        group: GroupId,
        #[source]
        source: NoPathError,
    },
    #[error("group {group} has no stops")]
    NoStops { group: GroupId },
}

impl UnroutableGroupError {
    pub fn group(&self) -> GroupId {
        match self {
            UnroutableGroupError::NoPath { group, .. } => *group,
            UnroutableGroupError::NoStops { group } => *group,
        }
    }
}

/// A trip request that cannot be placed on the road network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedInputError {
    #[error("rider {rider}: unknown location {location:?}")]
    UnknownLocation { rider: u64, location: Box<str> },
    #[error("rider {rider}: node {node:?} is not part of the road network")]
    UnknownNode { rider: u64, node: ExtNodeId },
    #[error("rider {rider}: location {location:?} has no road node")]
    MissingNode { rider: u64, location: Box<str> },
    #[error("rider {rider}: unrecognized trip type {trip_type:?}")]
    UnknownTripType { rider: u64, trip_type: Box<str> },
    #[error("rider {rider}: invalid departure time {time:?}")]
    InvalidDepartureTime { rider: u64, time: Box<str> },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("capacity must be at least 1")]
    ZeroCapacity,
    #[error("speed must be positive, got {0}")]
    InvalidSpeed(f64),
    #[error("delay probability must lie in [0, 1], got {0}")]
    InvalidProbability(f64),
    #[error("{name} must be a non-negative number of minutes, got {value}")]
    NegativeMinutes { name: &'static str, value: f64 },
    #[error("at least one match tier is required")]
    NoTiers,
    #[error("invalid match tier {0:?}")]
    InvalidTier(Box<str>),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlite::Error),
    #[error("edge references unknown node {0:?}")]
    UnknownEdgeEndpoint(ExtNodeId),
    #[error("location {name:?}: {reason}")]
    InvalidLocation { name: Box<str>, reason: Box<str> },
    #[error("invalid value in column {column}: {value}")]
    InvalidValue { column: &'static str, value: i64 },
    #[error("invalid text in column {column}: {value:?}")]
    InvalidText { column: &'static str, value: Box<str> },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("output file already exists: {0}")]
    OutputExists(Box<str>),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlite::Error),
}
