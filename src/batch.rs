use std::collections::BTreeMap;

use log::{info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::{
    col::HashSet,
    config::PoolConfig,
    error::{ConfigError, MalformedInputError, UnroutableGroupError},
    grouping::{Group, GroupFormationEngine},
    location::LocationTable,
    network::{NodeIdx, RoadNetwork},
    routing::{RouteAssignment, RouteSequencer},
    shortest_path::oracle::NetworkDistanceOracle,
    stats::RunStats,
    timeline::{TimedLeg, TimelineSimulator},
    trip::{ExtTripRequest, Stratum, TripRequest},
};

/// Something left out of the results, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub enum Exclusion {
    Request(MalformedInputError),
    Group(UnroutableGroupError),
}

impl Exclusion {
    pub fn subject(&self) -> String {
        match self {
            Exclusion::Request(err) => {
                let rider = match err {
                    MalformedInputError::UnknownLocation { rider, .. }
                    | MalformedInputError::UnknownNode { rider, .. }
                    | MalformedInputError::MissingNode { rider, .. }
                    | MalformedInputError::UnknownTripType { rider, .. }
                    | MalformedInputError::InvalidDepartureTime { rider, .. } => rider,
                };
                format!("rider {}", rider)
            }
            Exclusion::Group(err) => format!("group {}", err.group()),
        }
    }

    pub fn reason(&self) -> String {
        match self {
            Exclusion::Request(err) => err.to_string(),
            Exclusion::Group(err) => err.to_string(),
        }
    }
}

/// Everything one batch run produces.
#[derive(Debug)]
pub struct BatchOutcome {
    /// All groups, ordered by stratum and group id.
    pub groups: Vec<Group>,
    /// Routes of the routable groups, in group order.
    pub routes: Vec<RouteAssignment>,
    /// Timed legs of all routed groups, grouped by group in group order.
    pub legs: Vec<TimedLeg>,
    pub exclusions: Vec<Exclusion>,
    pub stats: RunStats,
}

/// Read-only state shared by every stage of a run.
pub struct RunContext<'a> {
    pub network: &'a RoadNetwork,
    pub locations: &'a LocationTable,
    pub config: &'a PoolConfig,
    pub congestion: HashSet<NodeIdx>,
    pub oracle: NetworkDistanceOracle<'a>,
}

impl<'a> RunContext<'a> {
    /// Fails if `config` does not pass [`PoolConfig::validate`].
    pub fn new(
        network: &'a RoadNetwork,
        locations: &'a LocationTable,
        config: &'a PoolConfig,
        congestion: HashSet<NodeIdx>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            network,
            locations,
            config,
            congestion,
            oracle: NetworkDistanceOracle::new(network),
        })
    }

    /// Places every row on the network; rows that cannot be placed are skipped.
    pub fn resolve_requests(
        &self,
        ext_requests: &[ExtTripRequest],
    ) -> (Vec<TripRequest>, Vec<Exclusion>) {
        let mut requests = Vec::with_capacity(ext_requests.len());
        let mut exclusions = Vec::new();
        for (input_index, ext) in ext_requests.iter().enumerate() {
            match self.locations.resolve_trip(self.network, ext, input_index) {
                Ok(request) => requests.push(request),
                Err(err) => {
                    warn!("Skipping trip request: {}", err);
                    exclusions.push(Exclusion::Request(err));
                }
            }
        }
        (requests, exclusions)
    }

    /// Forms the groups of every stratum independently.
    pub fn form_groups(&self, requests: Vec<TripRequest>) -> Vec<Group> {
        let mut strata: BTreeMap<Stratum, Vec<TripRequest>> = BTreeMap::new();
        for request in requests {
            strata.entry(request.stratum()).or_default().push(request);
        }
        let engine = GroupFormationEngine::new(
            self.config.capacity,
            self.config.time_window_minutes,
            &self.config.tiers,
        );
        let groups = strata
            .into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(stratum, requests)| {
                let num_requests = requests.len();
                let groups = engine.form_groups(stratum, requests);
                info!(
                    "{}: {} requests in {} groups",
                    stratum,
                    num_requests,
                    groups.len()
                );
                groups
            })
            .collect::<Vec<_>>();
        groups.into_iter().flatten().collect()
    }

    /// Routes and times every group. The timeline of the group at position `i`
    /// draws from ChaCha stream `i` of `seed`.
    pub fn route_and_time(
        &self,
        groups: &[Group],
        seed: u64,
    ) -> Vec<Result<(RouteAssignment, Vec<TimedLeg>), UnroutableGroupError>> {
        let sequencer = RouteSequencer::new(&self.oracle, self.config.exact_search_limit);
        let simulator = TimelineSimulator::new(self.config, &self.congestion);
        groups
            .par_iter()
            .enumerate()
            .map(|(ordinal, group)| -> Result<_, UnroutableGroupError> {
                let route = sequencer.sequence(group)?;
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                rng.set_stream(ordinal as u64);
                let legs = simulator.simulate(group, &route, &mut rng);
                Ok((route, legs))
            })
            .collect()
    }

    pub fn run(&self, ext_requests: &[ExtTripRequest], seed: u64) -> BatchOutcome {
        let time_started = std::time::Instant::now();
        let num_requests = ext_requests.len();
        let (requests, mut exclusions) = self.resolve_requests(ext_requests);
        let num_malformed = exclusions.len();

        let groups = self.form_groups(requests);
        info!("Formed {} groups", groups.len());

        let mut routes = Vec::with_capacity(groups.len());
        let mut legs = Vec::new();
        for result in self.route_and_time(&groups, seed) {
            match result {
                Ok((route, group_legs)) => {
                    routes.push(route);
                    legs.extend(group_legs);
                }
                Err(err) => {
                    warn!("{}", err);
                    exclusions.push(Exclusion::Group(err));
                }
            }
        }

        info!("Cached {} shortest paths", self.oracle.cached_pairs());

        let stats = RunStats::compute(
            num_requests,
            num_malformed,
            &groups,
            &routes,
            &legs,
            time_started.elapsed(),
        );
        stats.log();
        BatchOutcome {
            groups,
            routes,
            legs,
            exclusions,
            stats,
        }
    }
}
