use std::sync::{Arc, RwLock};

use rayon::prelude::*;

use crate::{
    col::{map_new, HashMap},
    error::NoPathError,
    network::{NodeIdx, RoadNetwork},
    primitives::Meters,
    shortest_path::dijkstra::{dijkstra, ShortestPath},
};

/// Cached entry, oriented from the smaller to the larger node index.
type CacheEntry = Option<Arc<ShortestPath>>;

/// Answers shortest-path queries on a [`RoadNetwork`].
///
/// Results are memoized per unordered node pair, including negative results.
/// The cache only grows, and it may be shared between rayon workers.
pub struct NetworkDistanceOracle<'a> {
    network: &'a RoadNetwork,
    cache: RwLock<HashMap<(NodeIdx, NodeIdx), CacheEntry>>,
}

fn pair_key(u: NodeIdx, v: NodeIdx) -> (NodeIdx, NodeIdx) {
    if u <= v {
        (u, v)
    } else {
        (v, u)
    }
}

impl<'a> NetworkDistanceOracle<'a> {
    pub fn new(network: &'a RoadNetwork) -> Self {
        Self {
            network,
            cache: RwLock::new(map_new()),
        }
    }

    pub fn cached_pairs(&self) -> usize {
        self.cache.read().unwrap().len()
    }

    fn lookup(&self, key: (NodeIdx, NodeIdx)) -> Option<CacheEntry> {
        self.cache.read().unwrap().get(&key).cloned()
    }

    fn compute(&self, key: (NodeIdx, NodeIdx)) -> CacheEntry {
        let entry = dijkstra(self.network, key.0, &[key.1])
            .pop()
            .flatten()
            .map(Arc::new);
        self.cache
            .write()
            .unwrap()
            .entry(key)
            .or_insert(entry)
            .clone()
    }

    /// Shortest path from `u` to `v`, in that direction.
    pub fn path(&self, u: NodeIdx, v: NodeIdx) -> Result<ShortestPath, NoPathError> {
        let key = pair_key(u, v);
        let entry = match self.lookup(key) {
            Some(entry) => entry,
            None => self.compute(key),
        };
        let path = entry.ok_or(NoPathError { from: u, to: v })?;
        Ok(if key.0 == u {
            path.as_ref().clone()
        } else {
            path.reversed()
        })
    }

    pub fn distance(&self, u: NodeIdx, v: NodeIdx) -> Result<Meters, NoPathError> {
        if u == v {
            return Ok(0.0);
        }
        let key = pair_key(u, v);
        let entry = match self.lookup(key) {
            Some(entry) => entry,
            None => self.compute(key),
        };
        entry
            .map(|path| path.distance())
            .ok_or(NoPathError { from: u, to: v })
    }

    /// Fills the cache with all pairs among `stops`, one search per stop.
    pub fn precompute(&self, stops: &[NodeIdx]) {
        let entries = stops
            .par_iter()
            .enumerate()
            .flat_map_iter(|(i, &source)| {
                let targets = stops[i + 1..]
                    .iter()
                    .copied()
                    .filter(|&target| self.lookup(pair_key(source, target)).is_none())
                    .collect::<Vec<_>>();
                let paths = dijkstra(self.network, source, &targets);
                targets
                    .into_iter()
                    .zip(paths)
                    .map(move |(target, path)| {
                        let key = pair_key(source, target);
                        let entry = path.map(|path| {
                            if key.0 == source {
                                path
                            } else {
                                path.reversed()
                            }
                        });
                        (key, entry.map(Arc::new))
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let mut cache = self.cache.write().unwrap();
        for (key, entry) in entries {
            cache.entry(key).or_insert(entry);
        }
    }
}
