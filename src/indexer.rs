use crate::col::{map_new, HashMap};
use std::hash::Hash;

/// Assigns dense indices to external ids in order of first appearance.
pub struct Indexer<Id, Index, F>
where
    Id: Eq + Hash,
    Index: Eq + Copy,
    F: Fn(usize) -> Index,
{
    index_by_id: HashMap<Id, Index>,
    to_index: F,
}

impl<Id: Eq + Hash, Index: Eq + Copy, F: Fn(usize) -> Index> Indexer<Id, Index, F> {
    pub fn new(to_index: F) -> Self {
        Self {
            index_by_id: map_new(),
            to_index,
        }
    }

    pub fn index(&mut self, id: Id) -> Index {
        let next = (self.to_index)(self.index_by_id.len());
        *self.index_by_id.entry(id).or_insert(next)
    }

    pub fn get(&self, id: &Id) -> Option<Index> {
        self.index_by_id.get(id).copied()
    }

    pub fn into_map(self) -> HashMap<Id, Index> {
        self.index_by_id
    }
}
