use std::hash::Hash;

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<K> = rustc_hash::FxHashSet<K>;

pub fn map_new<K, V>() -> HashMap<K, V> {
    rustc_hash::FxHashMap::default()
}

pub fn set_new<K>() -> HashSet<K> {
    rustc_hash::FxHashSet::default()
}

/// Buckets `items` by `key`, keeping buckets in order of their first member and
/// members in input order.
pub fn bucket_by<T, K: Eq + Hash>(
    items: impl IntoIterator<Item = T>,
    key: impl Fn(&T) -> K,
) -> Vec<Vec<T>> {
    let mut bucket_by_key: HashMap<K, usize> = map_new();
    let mut buckets: Vec<Vec<T>> = Vec::new();
    for item in items {
        let idx = *bucket_by_key.entry(key(&item)).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[idx].push(item);
    }
    buckets
}
