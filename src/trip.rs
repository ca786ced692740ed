use std::fmt::{Debug, Display};

use chrono::{NaiveTime, Timelike};
use num_derive::FromPrimitive;
use serde::Deserialize;

use crate::location::Place;
use crate::network::NodeIdx;
use crate::primitives::Minutes;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive)]
pub enum Day {
    #[serde(rename = "M")]
    Mon = 0,
    #[serde(rename = "Tu")]
    Tue = 1,
    #[serde(rename = "W")]
    Wed = 2,
    #[serde(rename = "Th")]
    Thu = 3,
    #[serde(rename = "F")]
    Fri = 4,
    #[serde(rename = "Sa")]
    Sat = 5,
    #[serde(rename = "Su")]
    Sun = 6,
}

impl Day {
    pub fn code(&self) -> &'static str {
        match self {
            Day::Mon => "M",
            Day::Tue => "Tu",
            Day::Wed => "W",
            Day::Thu => "Th",
            Day::Fri => "F",
            Day::Sat => "Sa",
            Day::Sun => "Su",
        }
    }
}

/// Whether a trip leaves home (outbound) or heads back home (return).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive)]
pub enum Direction {
    Outbound = 0,
    Return = 1,
}

fn is_home(label: &str) -> bool {
    label.eq_ignore_ascii_case("house") || label.eq_ignore_ascii_case("home")
}

impl Direction {
    /// Accepts `outbound`/`return` or an arrow label such as `House -> School`.
    pub fn from_trip_type(trip_type: &str) -> Option<Direction> {
        let trip_type = trip_type.trim();
        if trip_type.eq_ignore_ascii_case("outbound") {
            return Some(Direction::Outbound);
        }
        if trip_type.eq_ignore_ascii_case("return") {
            return Some(Direction::Return);
        }
        let (from, to) = trip_type.split_once("->")?;
        match (is_home(from.trim()), is_home(to.trim())) {
            (true, false) => Some(Direction::Outbound),
            (false, true) => Some(Direction::Return),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Direction::Outbound => "out",
            Direction::Return => "ret",
        }
    }
}

/// The set of trips grouped independently of all others.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Stratum {
    pub day: Day,
    pub direction: Direction,
}
impl Debug for Stratum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}-{}", self.day.code(), self.direction.code()))
    }
}
impl Display for Stratum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TripStop {
    pub place: Place,
    pub node: NodeIdx,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TripRequest {
    pub category: Box<str>,
    pub rider_id: u64,
    pub gender: Box<str>,
    pub age: u32,
    pub direction: Direction,
    pub day: Day,
    pub departure: NaiveTime,
    pub origin: TripStop,
    pub destination: TripStop,
    /// Position in the input table; breaks ties between equal departures.
    pub input_index: usize,
}

impl TripRequest {
    pub fn stratum(&self) -> Stratum {
        Stratum {
            day: self.day,
            direction: self.direction,
        }
    }

    pub fn departure_minutes(&self) -> Minutes {
        to_minutes(self.departure)
    }

    /// The endpoint a shared anchor would sit on: the destination when
    /// leaving home, the origin when returning.
    pub fn anchor_side(&self) -> &TripStop {
        match self.direction {
            Direction::Outbound => &self.destination,
            Direction::Return => &self.origin,
        }
    }

    /// The endpoint at the rider's home side.
    pub fn member_side(&self) -> &TripStop {
        match self.direction {
            Direction::Outbound => &self.origin,
            Direction::Return => &self.destination,
        }
    }
}

/// A row of the trips table as it comes from the population generator.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExtTripRequest {
    pub category: String,
    pub id: u64,
    pub gender: String,
    pub age: u32,
    pub trip_type: String,
    pub day: Day,
    pub departure_time: String,
    pub origin_location: String,
    pub origin_node: Option<u64>,
    pub destination_location: String,
    pub destination_node: Option<u64>,
}

pub fn to_minutes(time: NaiveTime) -> Minutes {
    time.num_seconds_from_midnight() as Minutes / 60.0
}

pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// Formats a clock reading in minutes as `HH:MM`, wrapping past midnight.
pub fn format_clock(minutes: Minutes) -> String {
    let seconds = (minutes * 60.0).round().rem_euclid(86_400.0) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
        .map(|time| time.format("%H:%M").to_string())
        .unwrap_or_default()
}
