use std::collections::BinaryHeap;

use crate::{
    col::{map_new, HashMap},
    network::{NodeIdx, RoadNetwork},
    primitives::Meters,
};

#[derive(Debug, Clone, PartialEq)]
struct QueueItem {
    node_id: NodeIdx,
    distance: Meters,
}
impl Eq for QueueItem {}
impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node_id.0.cmp(&self.node_id.0))
    }
}

/// A shortest path together with the distance travelled up to each of its nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPath {
    nodes: Vec<NodeIdx>,
    /// `cumulative[i]` is the distance from `nodes[0]` to `nodes[i]`.
    cumulative: Vec<Meters>,
}

impl ShortestPath {
    pub fn nodes(&self) -> &[NodeIdx] {
        &self.nodes
    }

    pub fn distance(&self) -> Meters {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Distances of the single edge traversals along the path.
    pub fn leg_distances(&self) -> impl Iterator<Item = Meters> + '_ {
        self.cumulative.windows(2).map(|w| w[1] - w[0])
    }

    pub fn reversed(&self) -> ShortestPath {
        let total = self.distance();
        ShortestPath {
            nodes: self.nodes.iter().rev().copied().collect(),
            cumulative: self.cumulative.iter().rev().map(|it| total - it).collect(),
        }
    }
}

struct Label {
    distance: Meters,
    predecessor: Option<NodeIdx>,
    settled: bool,
}

/// Runs Dijkstra from `source` until every node in `targets` is settled or the
/// component of `source` is exhausted. Returns one entry per target; `None` when
/// the target is unreachable.
pub fn dijkstra(
    network: &RoadNetwork,
    source: NodeIdx,
    targets: &[NodeIdx],
) -> Vec<Option<ShortestPath>> {
    let mut labels: HashMap<NodeIdx, Label> = map_new();
    labels.insert(
        source,
        Label {
            distance: 0.0,
            predecessor: None,
            settled: false,
        },
    );
    let mut remaining = targets.iter().filter(|&&it| it != source).count();

    let mut queue: BinaryHeap<QueueItem> = BinaryHeap::new();
    queue.push(QueueItem {
        node_id: source,
        distance: 0.0,
    });

    while let Some(QueueItem { node_id, distance }) = queue.pop() {
        if remaining == 0 {
            break;
        }
        let Some(label) = labels.get_mut(&node_id) else {
            continue;
        };
        if label.settled || distance > label.distance {
            continue;
        }
        label.settled = true;
        if node_id != source && targets.contains(&node_id) {
            remaining -= 1;
        }

        for (to_node_id, length) in network.neighbors(node_id) {
            let candidate = distance + length;
            let improves = match labels.get(&to_node_id) {
                None => true,
                Some(label) => !label.settled && candidate < label.distance,
            };
            if improves {
                labels.insert(
                    to_node_id,
                    Label {
                        distance: candidate,
                        predecessor: Some(node_id),
                        settled: false,
                    },
                );
                queue.push(QueueItem {
                    node_id: to_node_id,
                    distance: candidate,
                });
            }
        }
    }

    targets
        .iter()
        .map(|&target| reconstruct(&labels, source, target))
        .collect()
}

fn reconstruct(
    labels: &HashMap<NodeIdx, Label>,
    source: NodeIdx,
    target: NodeIdx,
) -> Option<ShortestPath> {
    let label = labels.get(&target).filter(|it| it.settled || target == source)?;
    let mut nodes = vec![target];
    let mut cumulative = vec![label.distance];
    let mut current = label.predecessor;
    while let Some(node_id) = current {
        let label = &labels[&node_id];
        nodes.push(node_id);
        cumulative.push(label.distance);
        current = label.predecessor;
    }
    nodes.reverse();
    cumulative.reverse();
    Some(ShortestPath { nodes, cumulative })
}
