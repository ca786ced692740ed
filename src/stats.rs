use itertools::Itertools;
use log::info;

use crate::{
    grouping::{Group, GroupId},
    primitives::{Meters, Minutes},
    routing::RouteAssignment,
    timeline::TimedLeg,
};

/// Summary of one batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    pub num_requests: usize,
    /// Requests skipped because they could not be placed on the network.
    pub num_malformed_requests: usize,
    pub num_groups: usize,
    pub num_routed_groups: usize,
    pub num_unroutable_groups: usize,
    pub mean_group_size: f64,
    /// Sum of the route lengths of all routed groups.
    pub total_distance: Meters,
    /// Mean over routed groups of the summed leg travel times.
    pub average_trip_time: Minutes,
    pub computation_time: std::time::Duration,
}

/// Trip time per group: the sum of its legs' travel times, dwell excluded.
/// Groups appear in the order of their first leg.
pub fn trip_times(legs: &[TimedLeg]) -> Vec<(GroupId, Minutes)> {
    legs.iter()
        .group_by(|it| it.group)
        .into_iter()
        .map(|(group, legs)| (group, legs.map(|it| it.travel_time).sum()))
        .collect()
}

impl RunStats {
    pub fn compute(
        num_requests: usize,
        num_malformed_requests: usize,
        groups: &[Group],
        routes: &[RouteAssignment],
        legs: &[TimedLeg],
        computation_time: std::time::Duration,
    ) -> Self {
        let num_members: usize = groups.iter().map(|it| it.members.len()).sum();
        let trip_times = trip_times(legs);
        let average_trip_time = if trip_times.is_empty() {
            0.0
        } else {
            trip_times.iter().map(|(_, time)| time).sum::<Minutes>() / trip_times.len() as f64
        };
        RunStats {
            num_requests,
            num_malformed_requests,
            num_groups: groups.len(),
            num_routed_groups: routes.len(),
            num_unroutable_groups: groups.len() - routes.len(),
            mean_group_size: if groups.is_empty() {
                0.0
            } else {
                num_members as f64 / groups.len() as f64
            },
            total_distance: routes.iter().map(|it| it.total_distance).sum(),
            average_trip_time,
            computation_time,
        }
    }

    /// Key-value rows as stored in the result file.
    pub fn rows(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("num_requests", self.num_requests as f64),
            ("num_malformed_requests", self.num_malformed_requests as f64),
            ("num_groups", self.num_groups as f64),
            ("num_routed_groups", self.num_routed_groups as f64),
            ("num_unroutable_groups", self.num_unroutable_groups as f64),
            ("mean_group_size", self.mean_group_size),
            ("total_distance_m", self.total_distance),
            ("average_trip_time_min", self.average_trip_time),
            (
                "computation_time_ms",
                self.computation_time.as_millis() as f64,
            ),
        ]
    }

    pub fn log(&self) {
        info!(
            "{} requests ({} malformed) in {} groups of mean size {:.2}",
            self.num_requests, self.num_malformed_requests, self.num_groups, self.mean_group_size
        );
        info!(
            "{} groups routed, {} unroutable, total distance {:.1} m",
            self.num_routed_groups, self.num_unroutable_groups, self.total_distance
        );
        info!(
            "Average trip time: {:.2} min (computed in {:?})",
            self.average_trip_time, self.computation_time
        );
    }
}
