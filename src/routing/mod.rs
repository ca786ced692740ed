use itertools::Itertools;
use log::debug;

use crate::{
    col::{set_new, HashSet},
    error::{NoPathError, UnroutableGroupError},
    grouping::{Group, GroupId},
    network::NodeIdx,
    primitives::Meters,
    shortest_path::oracle::NetworkDistanceOracle,
    trip::Direction,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorEnd {
    /// The route starts at the anchor (return trips).
    Head,
    /// The route ends at the anchor (outbound trips).
    Tail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    Exact,
    NearestNeighbor,
}

/// The stops one group has to visit.
#[derive(Debug, Clone, PartialEq)]
pub struct StopSet {
    pub anchor: Option<(NodeIdx, AnchorEnd)>,
    /// Stops whose visiting order is free, de-duplicated, in member order.
    pub free: Vec<NodeIdx>,
}

fn push_unique(stops: &mut Vec<NodeIdx>, seen: &mut HashSet<NodeIdx>, node: NodeIdx) {
    if seen.insert(node) {
        stops.push(node);
    }
}

impl StopSet {
    pub fn of(group: &Group) -> StopSet {
        let mut seen = set_new();
        let mut free = Vec::new();
        match group.anchor {
            Some(anchor) => {
                seen.insert(anchor);
                for member in &group.members {
                    push_unique(&mut free, &mut seen, member.member_side().node);
                }
                let end = match group.stratum().direction {
                    Direction::Outbound => AnchorEnd::Tail,
                    Direction::Return => AnchorEnd::Head,
                };
                StopSet {
                    anchor: Some((anchor, end)),
                    free,
                }
            }
            None => {
                for member in &group.members {
                    push_unique(&mut free, &mut seen, member.origin.node);
                    push_unique(&mut free, &mut seen, member.destination.node);
                }
                StopSet { anchor: None, free }
            }
        }
    }

    pub fn all(&self) -> Vec<NodeIdx> {
        self.anchor
            .iter()
            .map(|&(node, _)| node)
            .chain(self.free.iter().copied())
            .collect()
    }

    fn arrange(&self, free_order: impl IntoIterator<Item = NodeIdx>) -> Vec<NodeIdx> {
        match self.anchor {
            None => free_order.into_iter().collect(),
            Some((anchor, AnchorEnd::Head)) => std::iter::once(anchor).chain(free_order).collect(),
            Some((anchor, AnchorEnd::Tail)) => free_order
                .into_iter()
                .chain(std::iter::once(anchor))
                .collect(),
        }
    }
}

/// Visiting order and fully expanded path of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteAssignment {
    pub group: GroupId,
    /// Member stops (and anchor) in visiting order.
    pub order: Vec<NodeIdx>,
    /// Every road node passed, consecutive entries joined by one edge.
    pub full_path: Vec<NodeIdx>,
    /// `leg_distances[i]` is the length of `full_path[i] -> full_path[i + 1]`.
    pub leg_distances: Vec<Meters>,
    pub total_distance: Meters,
    pub strategy: SearchStrategy,
}

impl RouteAssignment {
    pub fn stop_nodes(&self) -> HashSet<NodeIdx> {
        self.order.iter().copied().collect()
    }
}

pub struct RouteSequencer<'a, 'b> {
    oracle: &'a NetworkDistanceOracle<'b>,
    exact_search_limit: usize,
}

impl<'a, 'b> RouteSequencer<'a, 'b> {
    pub fn new(oracle: &'a NetworkDistanceOracle<'b>, exact_search_limit: usize) -> Self {
        Self {
            oracle,
            exact_search_limit,
        }
    }

    pub fn order_distance(&self, order: &[NodeIdx]) -> Result<Meters, NoPathError> {
        order
            .iter()
            .tuple_windows()
            .map(|(&a, &b)| self.oracle.distance(a, b))
            .sum()
    }

    pub fn sequence(&self, group: &Group) -> Result<RouteAssignment, UnroutableGroupError> {
        let unroutable = |source| UnroutableGroupError::NoPath {
            group: group.id,
            source,
        };
        let stops = StopSet::of(group);
        if stops.anchor.is_none() && stops.free.is_empty() {
            return Err(UnroutableGroupError::NoStops { group: group.id });
        }
        self.oracle.precompute(&stops.all());

        let (order, strategy) =
            if stops.anchor.is_some() && stops.free.len() <= self.exact_search_limit {
                (self.exact(&stops).map_err(unroutable)?, SearchStrategy::Exact)
            } else {
                (
                    self.nearest_neighbor(&stops).map_err(unroutable)?,
                    SearchStrategy::NearestNeighbor,
                )
            };
        debug!(
            "{}: {} stops ordered by {:?}",
            group.id,
            order.len(),
            strategy
        );

        let (full_path, leg_distances) = self.expand(&order).map_err(unroutable)?;
        let total_distance = leg_distances.iter().sum();
        Ok(RouteAssignment {
            group: group.id,
            order,
            full_path,
            leg_distances,
            total_distance,
            strategy,
        })
    }

    /// Tries every order of the free stops; ties keep the first order found.
    fn exact(&self, stops: &StopSet) -> Result<Vec<NodeIdx>, NoPathError> {
        if stops.free.len() <= 1 {
            return Ok(stops.arrange(stops.free.iter().copied()));
        }
        let mut best: Option<(Meters, Vec<NodeIdx>)> = None;
        for permutation in stops.free.iter().copied().permutations(stops.free.len()) {
            let order = stops.arrange(permutation);
            let distance = self.order_distance(&order)?;
            if best.as_ref().map_or(true, |(best_distance, _)| distance < *best_distance) {
                best = Some((distance, order));
            }
        }
        Ok(best.map(|(_, order)| order).unwrap_or_default())
    }

    /// Greedy tour over the free stops, starting at the anchor when the route
    /// starts there and at the first free stop otherwise.
    fn nearest_neighbor(&self, stops: &StopSet) -> Result<Vec<NodeIdx>, NoPathError> {
        let mut unvisited = stops.free.clone();
        let mut tour: Vec<NodeIdx> = Vec::with_capacity(unvisited.len());
        let mut current = match stops.anchor {
            Some((anchor, AnchorEnd::Head)) => anchor,
            _ => {
                let first = unvisited.remove(0);
                tour.push(first);
                first
            }
        };
        while !unvisited.is_empty() {
            let distances = unvisited
                .iter()
                .map(|&node| self.oracle.distance(current, node))
                .collect::<Result<Vec<_>, _>>()?;
            let Some((next_idx, _)) = distances
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(b.1))
            else {
                break;
            };
            current = unvisited.remove(next_idx);
            tour.push(current);
        }
        Ok(stops.arrange(tour))
    }

    /// Concatenates the shortest paths between consecutive stops.
    fn expand(&self, order: &[NodeIdx]) -> Result<(Vec<NodeIdx>, Vec<Meters>), NoPathError> {
        let mut full_path: Vec<NodeIdx> = order.first().copied().into_iter().collect();
        let mut leg_distances: Vec<Meters> = Vec::new();
        for (&a, &b) in order.iter().tuple_windows() {
            let segment = self.oracle.path(a, b)?;
            full_path.extend(segment.nodes().iter().skip(1));
            leg_distances.extend(segment.leg_distances());
        }
        Ok((full_path, leg_distances))
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::{
        network::ExtNodeId,
        primitives::EPS,
        test::sample::{
            grid_network, group_of, node_at, outbound_to_anchor, point_to_point, with_isolated_node,
        },
        trip::Direction,
    };

    #[test]
    fn test_exact_matches_brute_force() {
        let network = grid_network(5, 5, 100.0);
        let oracle = NetworkDistanceOracle::new(&network);
        let sequencer = RouteSequencer::new(&oracle, 8);
        let school = node_at(&network, 2, 2);
        let homes = [(0, 4), (4, 0), (0, 0), (4, 4)];
        let group = group_of(
            Direction::Outbound,
            homes
                .iter()
                .enumerate()
                .map(|(i, &(c, r))| outbound_to_anchor(i, node_at(&network, c, r), school, "07:00"))
                .collect(),
        );

        let route = sequencer.sequence(&group).unwrap();
        assert_eq!(route.strategy, SearchStrategy::Exact);
        assert_eq!(*route.order.last().unwrap(), school);
        assert_eq!(route.order.len(), 5);

        let brute_force_best = route.order[..4]
            .iter()
            .copied()
            .permutations(4)
            .map(|perm| {
                let mut order = perm;
                order.push(school);
                sequencer.order_distance(&order).unwrap()
            })
            .min_by(|a, b| a.total_cmp(b))
            .unwrap();
        assert!((route.total_distance - brute_force_best).abs() < EPS);
    }

    #[test]
    fn test_return_trip_starts_at_anchor() {
        let network = grid_network(3, 1, 100.0);
        let oracle = NetworkDistanceOracle::new(&network);
        let sequencer = RouteSequencer::new(&oracle, 8);
        let school = node_at(&network, 0, 0);
        let mut a = outbound_to_anchor(0, node_at(&network, 2, 0), school, "15:00");
        let mut b = outbound_to_anchor(1, node_at(&network, 1, 0), school, "15:00");
        for trip in [&mut a, &mut b] {
            trip.direction = Direction::Return;
            std::mem::swap(&mut trip.origin, &mut trip.destination);
        }
        let group = group_of(Direction::Return, vec![a, b]);
        assert_eq!(group.anchor, Some(school));

        let route = sequencer.sequence(&group).unwrap();
        assert_eq!(
            route.order,
            vec![school, node_at(&network, 1, 0), node_at(&network, 2, 0)]
        );
        assert_eq!(route.full_path, route.order);
        assert_eq!(route.total_distance, 200.0);
    }

    #[test]
    fn test_full_path_is_a_walk() {
        let network = grid_network(4, 4, 50.0);
        let oracle = NetworkDistanceOracle::new(&network);
        let sequencer = RouteSequencer::new(&oracle, 8);
        let group = group_of(
            Direction::Outbound,
            vec![
                point_to_point(0, node_at(&network, 0, 0), node_at(&network, 3, 3), "08:00"),
                point_to_point(1, node_at(&network, 1, 0), node_at(&network, 3, 1), "08:00"),
                point_to_point(2, node_at(&network, 0, 3), node_at(&network, 2, 2), "08:10"),
            ],
        );
        let route = sequencer.sequence(&group).unwrap();
        assert_eq!(route.strategy, SearchStrategy::NearestNeighbor);
        assert_eq!(route.order.len(), 6);
        assert_eq!(route.order[0], node_at(&network, 0, 0));
        assert_eq!(route.full_path.len(), route.leg_distances.len() + 1);
        for ((&a, &b), &length) in route
            .full_path
            .iter()
            .tuple_windows()
            .zip(&route.leg_distances)
        {
            assert_eq!(network.edge_length(a, b), Some(length));
        }
        let sum: f64 = route.leg_distances.iter().sum();
        assert!((sum - route.total_distance).abs() < EPS);
        assert!(
            (sequencer.order_distance(&route.order).unwrap() - route.total_distance).abs() < EPS
        );
    }

    #[test]
    fn test_nearest_neighbor_picks_closest_first() {
        let network = grid_network(6, 1, 10.0);
        let oracle = NetworkDistanceOracle::new(&network);
        let sequencer = RouteSequencer::new(&oracle, 8);
        let group = group_of(
            Direction::Outbound,
            vec![
                point_to_point(0, node_at(&network, 2, 0), node_at(&network, 5, 0), "08:00"),
                point_to_point(1, node_at(&network, 0, 0), node_at(&network, 3, 0), "08:00"),
            ],
        );
        let route = sequencer.sequence(&group).unwrap();
        // From x=2 the nearest stop is x=3 (10m), then x=5 (20m), then x=0 (50m).
        assert_eq!(
            route.order,
            vec![
                node_at(&network, 2, 0),
                node_at(&network, 3, 0),
                node_at(&network, 5, 0),
                node_at(&network, 0, 0)
            ]
        );
        assert_eq!(route.total_distance, 80.0);
    }

    #[test]
    fn test_large_anchored_group_falls_back_to_heuristic() {
        let network = grid_network(4, 4, 10.0);
        let oracle = NetworkDistanceOracle::new(&network);
        let sequencer = RouteSequencer::new(&oracle, 2);
        let school = node_at(&network, 0, 0);
        let group = group_of(
            Direction::Outbound,
            (0..3)
                .map(|i| outbound_to_anchor(i, node_at(&network, 3, i as u32), school, "07:00"))
                .collect(),
        );
        let route = sequencer.sequence(&group).unwrap();
        assert_eq!(route.strategy, SearchStrategy::NearestNeighbor);
        assert_eq!(route.order.first(), Some(&node_at(&network, 3, 0)));
        assert_eq!(route.order.last(), Some(&school));
    }

    #[test]
    fn test_disconnected_group_is_unroutable() {
        let network = with_isolated_node(grid_network(2, 1, 10.0), ExtNodeId(999));
        let oracle = NetworkDistanceOracle::new(&network);
        let sequencer = RouteSequencer::new(&oracle, 8);
        let island = network.resolve(ExtNodeId(999)).unwrap();
        let group = group_of(
            Direction::Outbound,
            vec![point_to_point(0, node_at(&network, 0, 0), island, "07:00")],
        );
        assert!(matches!(
            sequencer.sequence(&group),
            Err(UnroutableGroupError::NoPath { .. })
        ));
    }

    #[test]
    fn test_shared_home_stops_are_visited_once() {
        let network = grid_network(3, 1, 10.0);
        let oracle = NetworkDistanceOracle::new(&network);
        let sequencer = RouteSequencer::new(&oracle, 8);
        let school = node_at(&network, 2, 0);
        let home = node_at(&network, 0, 0);
        let group = group_of(
            Direction::Outbound,
            vec![
                outbound_to_anchor(0, home, school, "07:00"),
                outbound_to_anchor(1, home, school, "07:00"),
            ],
        );
        let route = sequencer.sequence(&group).unwrap();
        assert_eq!(route.order, vec![home, school]);
        assert_eq!(route.full_path.len(), 3);
    }
}
