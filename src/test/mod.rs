
use itertools::Itertools;

use crate::{
    batch::{BatchOutcome, Exclusion, RunContext},
    col::set_new,
    config::PoolConfig,
    error::{ConfigError, MalformedInputError, UnroutableGroupError},
    network::RoadNetwork,
    trip::{Day, Direction},
};
use sample::{sample_locations, sample_network, sample_trips};

fn run_sample(network: &RoadNetwork, config: &PoolConfig, seed: u64) -> BatchOutcome {
    let locations = sample_locations(network);
    let context = RunContext::new(network, &locations, config, set_new()).unwrap();
    context.run(&sample_trips(), seed)
}

#[test]
fn test_every_valid_request_lands_in_exactly_one_group() {
    let network = sample_network();
    let outcome = run_sample(&network, &PoolConfig::default(), 1);

    let grouped = outcome
        .groups
        .iter()
        .flat_map(|it| it.members.iter().map(|m| m.rider_id))
        .sorted()
        .collect_vec();
    assert_eq!(grouped, (1..=15).filter(|&it| it != 14).collect_vec());
    assert!(outcome
        .groups
        .iter()
        .all(|it| it.members.iter().all(|m| m.stratum() == it.stratum())));

    let malformed = outcome
        .exclusions
        .iter()
        .filter_map(|it| match it {
            Exclusion::Request(err) => Some(err.clone()),
            Exclusion::Group(_) => None,
        })
        .collect_vec();
    assert_eq!(malformed.len(), 2);
    assert!(matches!(
        malformed[0],
        MalformedInputError::UnknownLocation { rider: 14, .. }
    ));
    assert!(matches!(
        malformed[1],
        MalformedInputError::UnknownTripType { rider: 16, .. }
    ));
}

#[test]
fn test_sample_groups() {
    let network = sample_network();
    let outcome = run_sample(&network, &PoolConfig::default(), 1);
    let summary = outcome
        .groups
        .iter()
        .map(|it| {
            (
                it.id.to_string(),
                it.tier,
                it.anchor.is_some(),
                it.members.iter().map(|m| m.rider_id).collect_vec(),
            )
        })
        .collect_vec();
    assert_eq!(
        summary,
        vec![
            ("M-out-1".to_string(), 0, true, vec![1, 2, 3, 4]),
            ("M-out-2".to_string(), 1, false, vec![5, 6, 7, 8]),
            ("M-ret-1".to_string(), 3, true, vec![9, 10, 11]),
            ("Tu-out-1".to_string(), 3, true, vec![12, 13]),
            ("Su-out-1".to_string(), 3, true, vec![15]),
        ]
    );
    assert!(outcome.groups.iter().all(|it| it.members.len() <= 4));
}

#[test]
fn test_unroutable_group_is_excluded_not_fatal() {
    let network = sample_network();
    let outcome = run_sample(&network, &PoolConfig::default(), 1);

    let unroutable = outcome
        .exclusions
        .iter()
        .filter_map(|it| match it {
            Exclusion::Group(err) => Some(err),
            Exclusion::Request(_) => None,
        })
        .collect_vec();
    assert_eq!(unroutable.len(), 1);
    assert!(matches!(unroutable[0], UnroutableGroupError::NoPath { .. }));
    assert_eq!(unroutable[0].group().stratum.day, Day::Sun);
    assert_eq!(outcome.exclusions[2].subject(), "group Su-out-1");

    assert_eq!(outcome.routes.len(), 4);
    assert_eq!(outcome.stats.num_routed_groups, 4);
    assert_eq!(outcome.stats.num_unroutable_groups, 1);
    assert_eq!(outcome.stats.num_malformed_requests, 2);
    assert!(outcome.legs.iter().all(|it| it.group.stratum.day != Day::Sun));
}

#[test]
fn test_routes_respect_anchor_position() {
    let network = sample_network();
    let outcome = run_sample(&network, &PoolConfig::default(), 1);
    for (group, route) in outcome
        .groups
        .iter()
        .filter(|it| it.stratum().day != Day::Sun)
        .zip(&outcome.routes)
    {
        assert_eq!(group.id, route.group);
        if let Some(anchor) = group.anchor {
            match group.stratum().direction {
                Direction::Outbound => assert_eq!(route.order.last(), Some(&anchor)),
                Direction::Return => assert_eq!(route.order.first(), Some(&anchor)),
            }
        }
        let legs = outcome
            .legs
            .iter()
            .filter(|it| it.group == group.id)
            .collect_vec();
        assert_eq!(legs.len(), route.full_path.len() - 1);
        assert!(legs.iter().tuple_windows().all(|(a, b)| a.arrival <= b.arrival));
        assert!(legs[0].arrival > group.departure_minutes());
    }
}

#[test]
fn test_same_seed_same_outcome() {
    let network = sample_network();
    let config = PoolConfig {
        delay_probability: 0.25,
        ..Default::default()
    };
    let first = run_sample(&network, &config, 99);
    let second = run_sample(&network, &config, 99);
    assert_eq!(first.groups, second.groups);
    assert_eq!(first.routes, second.routes);
    assert_eq!(first.legs, second.legs);
    assert_eq!(first.exclusions, second.exclusions);
    assert_eq!(first.stats.average_trip_time, second.stats.average_trip_time);
}

#[test]
fn test_seed_only_changes_timing() {
    let network = sample_network();
    let config = PoolConfig {
        delay_probability: 0.5,
        ..Default::default()
    };
    let first = run_sample(&network, &config, 1);
    let second = run_sample(&network, &config, 2);
    assert_eq!(first.groups, second.groups);
    assert_eq!(first.routes, second.routes);
    assert_eq!(
        first.legs.iter().map(|it| (it.from, it.to)).collect_vec(),
        second.legs.iter().map(|it| (it.from, it.to)).collect_vec()
    );
}

#[test]
fn test_smaller_capacity() {
    let network = sample_network();
    let config = PoolConfig {
        capacity: 2,
        ..Default::default()
    };
    let outcome = run_sample(&network, &config, 1);
    assert!(outcome.groups.iter().all(|it| it.members.len() <= 2));
    let num_members: usize = outcome.groups.iter().map(|it| it.members.len()).sum();
    assert_eq!(num_members, 14);
}

#[test]
fn test_invalid_config_is_rejected_before_running() {
    let network = sample_network();
    let locations = sample_locations(&network);
    let config = PoolConfig {
        capacity: 0,
        ..Default::default()
    };
    assert!(matches!(
        RunContext::new(&network, &locations, &config, set_new()),
        Err(ConfigError::ZeroCapacity)
    ));
}
