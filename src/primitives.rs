/// Road distances, in meters.
pub type Meters = f64;

/// Durations and clock readings, in minutes. Clock readings count from midnight
/// of the trip's day and may run past 24h.
pub type Minutes = f64;

pub const METERS_PER_MILE: Meters = 1609.34;

pub const EPS: f64 = 1e-9;
