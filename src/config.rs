use crate::{error::ConfigError, grouping::MatchTier, primitives::Minutes};

/// Batch parameters of a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Maximum number of riders sharing a vehicle (`K`).
    pub capacity: usize,
    /// Nominal cruise speed.
    pub speed_mph: f64,
    /// Probability of a random incident per leg.
    pub delay_probability: f64,
    pub delay_minutes: Minutes,
    pub congestion_delay_minutes: Minutes,
    /// Two trips are time-compatible if their departures differ by at most this.
    pub time_window_minutes: Minutes,
    pub stop_dwell_minutes: Minutes,
    /// Largest number of free stops for which all visiting orders are tried.
    pub exact_search_limit: usize,
    pub tiers: Vec<MatchTier>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            speed_mph: 60.0,
            delay_probability: 0.01,
            delay_minutes: 5.0,
            congestion_delay_minutes: 5.0,
            time_window_minutes: 30.0,
            stop_dwell_minutes: 2.0,
            exact_search_limit: 8,
            tiers: MatchTier::default_tiers(),
        }
    }
}

fn check_minutes(name: &'static str, value: Minutes) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NegativeMinutes { name, value })
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !(self.speed_mph.is_finite() && self.speed_mph > 0.0) {
            return Err(ConfigError::InvalidSpeed(self.speed_mph));
        }
        if !(0.0..=1.0).contains(&self.delay_probability) {
            return Err(ConfigError::InvalidProbability(self.delay_probability));
        }
        check_minutes("delay_minutes", self.delay_minutes)?;
        check_minutes("congestion_delay_minutes", self.congestion_delay_minutes)?;
        check_minutes("time_window_minutes", self.time_window_minutes)?;
        check_minutes("stop_dwell_minutes", self.stop_dwell_minutes)?;
        if self.tiers.is_empty() {
            return Err(ConfigError::NoTiers);
        }
        Ok(())
    }
}
