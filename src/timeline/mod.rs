use rand::Rng;

use crate::{
    col::HashSet,
    config::PoolConfig,
    grouping::{Group, GroupId},
    network::NodeIdx,
    primitives::{Meters, Minutes, METERS_PER_MILE},
    routing::RouteAssignment,
};

/// One edge traversal of a group's expanded path.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedLeg {
    pub group: GroupId,
    pub from: NodeIdx,
    pub to: NodeIdx,
    pub distance: Meters,
    /// Driving time including incident and congestion delays, excluding dwell.
    pub travel_time: Minutes,
    /// Clock reading in minutes after midnight when `to` is reached.
    pub arrival: Minutes,
    pub from_is_stop: bool,
    pub to_is_stop: bool,
}

pub struct TimelineSimulator<'a> {
    config: &'a PoolConfig,
    congestion: &'a HashSet<NodeIdx>,
}

impl<'a> TimelineSimulator<'a> {
    pub fn new(config: &'a PoolConfig, congestion: &'a HashSet<NodeIdx>) -> Self {
        Self { config, congestion }
    }

    /// Nominal driving time at the configured cruise speed.
    pub fn nominal_travel_time(&self, distance: Meters) -> Minutes {
        distance / METERS_PER_MILE / self.config.speed_mph * 60.0
    }

    /// Walks the expanded path of `route`, starting at the group's departure.
    ///
    /// One random draw is consumed per leg, so equal seeds give equal timelines.
    pub fn simulate<R: Rng>(
        &self,
        group: &Group,
        route: &RouteAssignment,
        rng: &mut R,
    ) -> Vec<TimedLeg> {
        let stops = route.stop_nodes();
        let mut current = group.departure_minutes();
        route
            .full_path
            .windows(2)
            .zip(&route.leg_distances)
            .map(|(pair, &distance)| {
                let (from, to) = (pair[0], pair[1]);
                let mut travel_time = self.nominal_travel_time(distance);
                if rng.gen::<f64>() < self.config.delay_probability {
                    travel_time += self.config.delay_minutes;
                }
                if self.congestion.contains(&from) || self.congestion.contains(&to) {
                    travel_time += self.config.congestion_delay_minutes;
                }
                let from_is_stop = stops.contains(&from);
                let dwell = if from_is_stop {
                    self.config.stop_dwell_minutes
                } else {
                    0.0
                };
                current += travel_time + dwell;
                TimedLeg {
                    group: group.id,
                    from,
                    to,
                    distance,
                    travel_time,
                    arrival: current,
                    from_is_stop,
                    to_is_stop: stops.contains(&to),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::{
        col::set_new,
        primitives::EPS,
        routing::{RouteSequencer, SearchStrategy},
        shortest_path::oracle::NetworkDistanceOracle,
        test::sample::{group_of, grid_network, node_at, outbound_to_anchor},
        trip::Direction,
    };

    fn no_delays() -> PoolConfig {
        PoolConfig {
            delay_probability: 0.0,
            ..Default::default()
        }
    }

    fn straight_route(group: &Group, nodes: Vec<NodeIdx>, distances: Vec<Meters>) -> RouteAssignment {
        RouteAssignment {
            group: group.id,
            order: vec![nodes[0], *nodes.last().unwrap()],
            total_distance: distances.iter().sum(),
            full_path: nodes,
            leg_distances: distances,
            strategy: SearchStrategy::Exact,
        }
    }

    #[test]
    fn test_one_mile_at_sixty_mph_takes_one_minute() {
        let network = grid_network(5, 1, METERS_PER_MILE);
        let school = node_at(&network, 4, 0);
        let group = group_of(
            Direction::Outbound,
            (0..4)
                .map(|i| outbound_to_anchor(i, node_at(&network, i as u32, 0), school, "07:00"))
                .collect(),
        );
        let config = no_delays();
        let congestion = set_new();
        let simulator = TimelineSimulator::new(&config, &congestion);
        assert!((simulator.nominal_travel_time(1609.34) - 1.0).abs() < EPS);

        let oracle = NetworkDistanceOracle::new(&network);
        let route = RouteSequencer::new(&oracle, 8).sequence(&group).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let legs = simulator.simulate(&group, &route, &mut rng);
        assert_eq!(legs.len(), 4);
        assert!(legs.iter().all(|it| (it.travel_time - 1.0).abs() < EPS));
        // 07:00 + 4 legs of 1 minute + 4 dwells of 2 minutes at member stops.
        assert!((legs.last().unwrap().arrival - (7.0 * 60.0 + 12.0)).abs() < EPS);
        assert!(legs.iter().all(|it| it.from_is_stop && it.to_is_stop));
    }

    #[test]
    fn test_dwell_only_at_stops_and_congestion_stacks() {
        let network = grid_network(4, 1, 100.0);
        let nodes = (0..4).map(|c| node_at(&network, c, 0)).collect_vec();
        let group = group_of(
            Direction::Outbound,
            vec![outbound_to_anchor(0, nodes[0], nodes[3], "08:00")],
        );
        let route = straight_route(&group, nodes.clone(), vec![100.0; 3]);
        let config = PoolConfig {
            delay_probability: 1.0,
            ..Default::default()
        };
        let mut congestion = set_new();
        congestion.insert(nodes[2]);
        let simulator = TimelineSimulator::new(&config, &congestion);
        let legs = simulator.simulate(&group, &route, &mut ChaCha8Rng::seed_from_u64(3));

        let base = simulator.nominal_travel_time(100.0);
        assert!((legs[0].travel_time - (base + 5.0)).abs() < EPS);
        assert!((legs[1].travel_time - (base + 10.0)).abs() < EPS);
        assert!((legs[2].travel_time - (base + 10.0)).abs() < EPS);
        assert!(legs[0].from_is_stop && !legs[0].to_is_stop);
        assert!(!legs[1].from_is_stop && !legs[1].to_is_stop);
        assert!(legs[2].to_is_stop);
        let expected = 8.0 * 60.0 + 3.0 * base + 25.0 + 2.0;
        assert!((legs[2].arrival - expected).abs() < EPS);
    }

    #[test]
    fn test_arrivals_never_decrease() {
        let network = grid_network(5, 5, 250.0);
        let oracle = NetworkDistanceOracle::new(&network);
        let school = node_at(&network, 2, 2);
        let group = group_of(
            Direction::Outbound,
            [(0, 0), (4, 1), (1, 4), (3, 3)]
                .iter()
                .enumerate()
                .map(|(i, &(c, r))| outbound_to_anchor(i, node_at(&network, c, r), school, "06:30"))
                .collect(),
        );
        let route = RouteSequencer::new(&oracle, 8).sequence(&group).unwrap();
        let config = PoolConfig {
            delay_probability: 0.3,
            ..Default::default()
        };
        let congestion = set_new();
        let simulator = TimelineSimulator::new(&config, &congestion);
        let legs = simulator.simulate(&group, &route, &mut ChaCha8Rng::seed_from_u64(17));
        assert_eq!(legs.len(), route.full_path.len() - 1);
        assert!(legs[0].arrival > group.departure_minutes());
        assert!(legs.iter().tuple_windows().all(|(a, b)| a.arrival <= b.arrival));
    }

    #[test]
    fn test_same_seed_gives_same_timeline() {
        let network = grid_network(6, 1, 500.0);
        let nodes = (0..6).map(|c| node_at(&network, c, 0)).collect_vec();
        let group = group_of(
            Direction::Outbound,
            vec![outbound_to_anchor(0, nodes[0], nodes[5], "09:00")],
        );
        let route = straight_route(&group, nodes, vec![500.0; 5]);
        let config = PoolConfig {
            delay_probability: 0.5,
            ..Default::default()
        };
        let congestion = set_new();
        let simulator = TimelineSimulator::new(&config, &congestion);
        let first = simulator.simulate(&group, &route, &mut ChaCha8Rng::seed_from_u64(42));
        let second = simulator.simulate(&group, &route, &mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(first, second);
    }
}
