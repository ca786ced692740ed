use std::fmt::Display;
use std::str::FromStr;

use chrono::NaiveTime;

use crate::{error::ConfigError, location::Place, trip::TripRequest};

/// A trip attribute that can take part in a match key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchField {
    Origin,
    Destination,
    Departure,
    Category,
}

impl MatchField {
    fn name(&self) -> &'static str {
        match self {
            MatchField::Origin => "origin",
            MatchField::Destination => "destination",
            MatchField::Departure => "departure",
            MatchField::Category => "category",
        }
    }
}

impl FromStr for MatchField {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "origin" => Ok(MatchField::Origin),
            "destination" => Ok(MatchField::Destination),
            "departure" | "time" => Ok(MatchField::Departure),
            "category" => Ok(MatchField::Category),
            other => Err(ConfigError::InvalidTier(other.into())),
        }
    }
}

/// Projection of a trip onto the fields of one tier. Fields outside the tier
/// stay `None` and therefore never separate two trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    origin: Option<Place>,
    destination: Option<Place>,
    departure: Option<NaiveTime>,
    category: Option<Box<str>>,
}

/// One level of the relaxation ladder used during group formation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchTier {
    /// Bucket by exact equality on the fields, cut each bucket into full groups.
    Key(Vec<MatchField>),
    /// Time-window matching around the earliest pending trip; forms full groups only.
    Window { same_destination: bool },
}

impl MatchTier {
    pub fn key(fields: &[MatchField], trip: &TripRequest) -> MatchKey {
        let mut key = MatchKey {
            origin: None,
            destination: None,
            departure: None,
            category: None,
        };
        for field in fields {
            match field {
                MatchField::Origin => key.origin = Some(trip.origin.place),
                MatchField::Destination => key.destination = Some(trip.destination.place),
                MatchField::Departure => key.departure = Some(trip.departure),
                MatchField::Category => key.category = Some(trip.category.clone()),
            }
        }
        key
    }

    pub fn default_tiers() -> Vec<MatchTier> {
        vec![
            MatchTier::Key(vec![
                MatchField::Origin,
                MatchField::Departure,
                MatchField::Destination,
            ]),
            MatchTier::Key(vec![MatchField::Origin, MatchField::Departure]),
            MatchTier::Window {
                same_destination: false,
            },
        ]
    }

    /// Parses a comma-separated tier list, e.g. `origin+departure,window`.
    pub fn parse_list(s: &str) -> Result<Vec<MatchTier>, ConfigError> {
        s.split(',')
            .filter(|it| !it.trim().is_empty())
            .map(MatchTier::from_str)
            .collect()
    }
}

impl FromStr for MatchTier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.trim().split('+').map(str::trim).collect::<Vec<_>>();
        match parts.as_slice() {
            ["window"] => Ok(MatchTier::Window {
                same_destination: false,
            }),
            ["window", "destination"] | ["destination", "window"] => Ok(MatchTier::Window {
                same_destination: true,
            }),
            _ if parts.contains(&"window") => Err(ConfigError::InvalidTier(s.into())),
            _ => {
                let fields = parts
                    .iter()
                    .map(|it| it.parse::<MatchField>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| ConfigError::InvalidTier(s.into()))?;
                if fields.is_empty() {
                    return Err(ConfigError::InvalidTier(s.into()));
                }
                Ok(MatchTier::Key(fields))
            }
        }
    }
}

impl Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchTier::Key(fields) => {
                let names = fields.iter().map(MatchField::name).collect::<Vec<_>>();
                f.write_str(&names.join("+"))
            }
            MatchTier::Window {
                same_destination: false,
            } => f.write_str("window"),
            MatchTier::Window {
                same_destination: true,
            } => f.write_str("window+destination"),
        }
    }
}
