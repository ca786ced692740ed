mod tier;

use std::fmt::{Debug, Display};

use log::debug;

pub use tier::{MatchField, MatchKey, MatchTier};

use crate::{
    col::bucket_by,
    location::Place,
    network::NodeIdx,
    primitives::{Minutes, EPS},
    trip::{Stratum, TripRequest},
};

/// Group id, unique within its stratum and hence within the run.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId {
    pub stratum: Stratum,
    pub seq: u32,
}
impl Debug for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}-{}", self.stratum, self.seq))
    }
}
impl Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: GroupId,
    /// Members ordered by departure, then by input order.
    pub members: Vec<TripRequest>,
    /// Node shared by every member's anchor-side endpoint, if any.
    pub anchor: Option<NodeIdx>,
    /// Index of the tier that formed the group; `tiers.len()` for the final flush.
    pub tier: usize,
}

impl Group {
    pub fn new(id: GroupId, members: Vec<TripRequest>, tier: usize) -> Self {
        debug_assert!(!members.is_empty());
        let anchor = shared_anchor(&members);
        Group {
            id,
            members,
            anchor,
            tier,
        }
    }

    pub fn stratum(&self) -> Stratum {
        self.id.stratum
    }

    /// Scheduled departure of the vehicle: that of the earliest member.
    pub fn departure_minutes(&self) -> Minutes {
        self.members
            .first()
            .map(TripRequest::departure_minutes)
            .unwrap_or(0.0)
    }
}

fn shared_anchor(members: &[TripRequest]) -> Option<NodeIdx> {
    let first = members.first()?.anchor_side();
    if !matches!(first.place, Place::Anchor(_)) {
        return None;
    }
    members
        .iter()
        .all(|it| it.anchor_side() == first)
        .then_some(first.node)
}

/// Hands out consecutive group ids for one stratum.
pub struct GroupIdAllocator {
    stratum: Stratum,
    next_seq: u32,
}

impl GroupIdAllocator {
    pub fn new(stratum: Stratum) -> Self {
        Self {
            stratum,
            next_seq: 1,
        }
    }

    pub fn next(&mut self) -> GroupId {
        let id = GroupId {
            stratum: self.stratum,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        id
    }
}

/// Partitions the trips of one stratum into groups of at most `capacity`
/// members, relaxing the match criteria tier by tier.
pub struct GroupFormationEngine<'a> {
    capacity: usize,
    time_window: Minutes,
    tiers: &'a [MatchTier],
}

fn sort_pending(pending: &mut [TripRequest]) {
    pending.sort_by(|a, b| {
        a.departure
            .cmp(&b.departure)
            .then_with(|| a.input_index.cmp(&b.input_index))
    });
}

impl<'a> GroupFormationEngine<'a> {
    pub fn new(capacity: usize, time_window: Minutes, tiers: &'a [MatchTier]) -> Self {
        assert!(capacity > 0);
        Self {
            capacity,
            time_window,
            tiers,
        }
    }

    pub fn form_groups(&self, stratum: Stratum, requests: Vec<TripRequest>) -> Vec<Group> {
        debug_assert!(requests.iter().all(|it| it.stratum() == stratum));
        let mut ids = GroupIdAllocator::new(stratum);
        let mut groups: Vec<Group> = Vec::new();
        let mut pending = requests;
        sort_pending(&mut pending);

        for (tier_idx, tier) in self.tiers.iter().enumerate() {
            if pending.is_empty() {
                break;
            }
            let groups_before = groups.len();
            let (formed, leftover) = match tier {
                MatchTier::Key(fields) => self.match_by_key(fields, pending),
                MatchTier::Window { same_destination } => {
                    self.match_by_window(pending, *same_destination, true)
                }
            };
            groups.extend(
                formed
                    .into_iter()
                    .map(|members| Group::new(ids.next(), members, tier_idx)),
            );
            pending = leftover;
            sort_pending(&mut pending);
            debug!(
                "{}: tier {} ({}) formed {} groups, {} trips pending",
                stratum,
                tier_idx,
                tier,
                groups.len() - groups_before,
                pending.len()
            );
        }

        if !pending.is_empty() {
            let final_tier = self.tiers.len();
            let (formed, leftover) = self.match_by_window(pending, false, false);
            debug_assert!(leftover.is_empty());
            debug!("{}: final flush formed {} groups", stratum, formed.len());
            groups.extend(
                formed
                    .into_iter()
                    .map(|members| Group::new(ids.next(), members, final_tier)),
            );
        }
        groups
    }

    /// Cuts every bucket into consecutive full groups; remainders are returned.
    fn match_by_key(
        &self,
        fields: &[MatchField],
        pending: Vec<TripRequest>,
    ) -> (Vec<Vec<TripRequest>>, Vec<TripRequest>) {
        let mut formed = Vec::new();
        let mut leftover = Vec::new();
        for mut bucket in bucket_by(pending, |trip| MatchTier::key(fields, trip)) {
            let num_full = bucket.len() / self.capacity * self.capacity;
            leftover.extend(bucket.drain(num_full..));
            while !bucket.is_empty() {
                let rest = bucket.split_off(self.capacity);
                formed.push(bucket);
                bucket = rest;
            }
        }
        (formed, leftover)
    }

    /// Repeatedly takes the earliest untried trip as pivot and groups it with
    /// the earliest unassigned trips departing within the time window. With
    /// `full_only`, pivots that cannot fill a vehicle stay pending.
    fn match_by_window(
        &self,
        pending: Vec<TripRequest>,
        same_destination: bool,
        full_only: bool,
    ) -> (Vec<Vec<TripRequest>>, Vec<TripRequest>) {
        let times = pending
            .iter()
            .map(TripRequest::departure_minutes)
            .collect::<Vec<_>>();
        let mut assigned = vec![false; pending.len()];
        let mut formed_idxs: Vec<Vec<usize>> = Vec::new();

        for pivot in 0..pending.len() {
            if assigned[pivot] {
                continue;
            }
            let mut candidates = vec![pivot];
            candidates.extend(
                (0..pending.len())
                    .filter(|&j| j != pivot && !assigned[j])
                    .filter(|&j| (times[j] - times[pivot]).abs() <= self.time_window + EPS)
                    .filter(|&j| {
                        !same_destination
                            || pending[j].destination.place == pending[pivot].destination.place
                    })
                    .take(self.capacity - 1),
            );
            if full_only && candidates.len() < self.capacity {
                continue;
            }
            candidates.sort_unstable();
            for &j in &candidates {
                assigned[j] = true;
            }
            formed_idxs.push(candidates);
        }

        let mut slots = pending.into_iter().map(Some).collect::<Vec<_>>();
        let formed = formed_idxs
            .into_iter()
            .map(|idxs| {
                idxs.into_iter()
                    .filter_map(|j| slots[j].take())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let leftover = slots.into_iter().flatten().collect::<Vec<_>>();
        (formed, leftover)
    }
}
