pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;

pub fn map_new<K, V>() -> HashMap<K, V> {
    rustc_hash::FxHashMap::default()
}

pub fn map_with_capacity<K, V>(capacity: usize) -> HashMap<K, V> {
    rustc_hash::FxHashMap::with_capacity_and_hasher(capacity, Default::default())
}
