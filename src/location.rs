use std::fmt::Debug;

use serde::Deserialize;

use crate::{
    col::{map_new, HashMap},
    error::{ImportError, MalformedInputError},
    network::{ExtNodeId, NodeIdx, RoadNetwork},
    trip::{parse_clock_time, Direction, ExtTripRequest, TripRequest, TripStop},
};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub u32);
impl Debug for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("r#{}", self.0))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(pub u32);
impl Debug for AnchorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("a#{}", self.0))
    }
}

/// Where a trip starts or ends, at the granularity used for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Place {
    /// An area riders live in, e.g. a city section.
    Region(RegionId),
    /// A single shared facility such as a school or workplace.
    Anchor(AnchorId),
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub enum LocationKind {
    #[serde(rename = "region")]
    Region,
    #[serde(rename = "anchor")]
    Anchor,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExtLocation {
    pub kind: LocationKind,
    pub name: String,
    pub node: Option<u64>,
}

#[derive(Debug)]
pub struct AnchorPayload {
    pub name: Box<str>,
    pub node: NodeIdx,
}

/// Lookup table from location names to regions and anchors, built once per run.
#[derive(Debug)]
pub struct LocationTable {
    regions: Vec<Box<str>>,
    anchors: Vec<AnchorPayload>,
    place_by_name: HashMap<Box<str>, Place>,
}

impl LocationTable {
    pub fn create(
        ext_locations: &[ExtLocation],
        network: &RoadNetwork,
    ) -> Result<Self, ImportError> {
        let mut table = LocationTable {
            regions: Vec::new(),
            anchors: Vec::new(),
            place_by_name: map_new(),
        };
        for location in ext_locations {
            let name: Box<str> = location.name.trim().into();
            if table.place_by_name.contains_key(&name) {
                return Err(ImportError::InvalidLocation {
                    name,
                    reason: "declared twice".into(),
                });
            }
            let place = match location.kind {
                LocationKind::Region => {
                    table.regions.push(name.clone());
                    Place::Region(RegionId(table.regions.len() as u32 - 1))
                }
                LocationKind::Anchor => {
                    let node = location
                        .node
                        .and_then(|it| network.resolve(ExtNodeId(it)))
                        .ok_or_else(|| ImportError::InvalidLocation {
                            name: name.clone(),
                            reason: "anchor needs a node of the road network".into(),
                        })?;
                    table.anchors.push(AnchorPayload {
                        name: name.clone(),
                        node,
                    });
                    Place::Anchor(AnchorId(table.anchors.len() as u32 - 1))
                }
            };
            table.place_by_name.insert(name, place);
        }
        Ok(table)
    }

    pub fn place(&self, name: &str) -> Option<Place> {
        self.place_by_name.get(name.trim()).copied()
    }

    pub fn anchor(&self, anchor: AnchorId) -> &AnchorPayload {
        &self.anchors[anchor.0 as usize]
    }

    pub fn name(&self, place: Place) -> &str {
        match place {
            Place::Region(region) => &self.regions[region.0 as usize],
            Place::Anchor(anchor) => &self.anchor(anchor).name,
        }
    }

    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn num_anchors(&self) -> usize {
        self.anchors.len()
    }

    fn resolve_stop(
        &self,
        network: &RoadNetwork,
        rider: u64,
        location: &str,
        node: Option<u64>,
    ) -> Result<TripStop, MalformedInputError> {
        let place = self
            .place(location)
            .ok_or_else(|| MalformedInputError::UnknownLocation {
                rider,
                location: location.into(),
            })?;
        let node = match (node, place) {
            (Some(ext_id), _) => {
                network
                    .resolve(ExtNodeId(ext_id))
                    .ok_or(MalformedInputError::UnknownNode {
                        rider,
                        node: ExtNodeId(ext_id),
                    })?
            }
            (None, Place::Anchor(anchor)) => self.anchor(anchor).node,
            (None, Place::Region(_)) => {
                return Err(MalformedInputError::MissingNode {
                    rider,
                    location: location.into(),
                })
            }
        };
        Ok(TripStop { place, node })
    }

    /// Places a raw trip row onto the road network.
    pub fn resolve_trip(
        &self,
        network: &RoadNetwork,
        ext: &ExtTripRequest,
        input_index: usize,
    ) -> Result<TripRequest, MalformedInputError> {
        let direction = Direction::from_trip_type(&ext.trip_type).ok_or_else(|| {
            MalformedInputError::UnknownTripType {
                rider: ext.id,
                trip_type: ext.trip_type.as_str().into(),
            }
        })?;
        let departure = parse_clock_time(&ext.departure_time).ok_or_else(|| {
            MalformedInputError::InvalidDepartureTime {
                rider: ext.id,
                time: ext.departure_time.as_str().into(),
            }
        })?;
        let origin = self.resolve_stop(network, ext.id, &ext.origin_location, ext.origin_node)?;
        let destination = self.resolve_stop(
            network,
            ext.id,
            &ext.destination_location,
            ext.destination_node,
        )?;
        Ok(TripRequest {
            category: ext.category.as_str().into(),
            rider_id: ext.id,
            gender: ext.gender.as_str().into(),
            age: ext.age,
            direction,
            day: ext.day,
            departure,
            origin,
            destination,
            input_index,
        })
    }
}
