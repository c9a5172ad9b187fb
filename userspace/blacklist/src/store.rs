#[cfg(test)]
pub(crate) mod test_store;

use std::path::Path;

use aya::Pod;

use crate::{map::TypedMap, sys::UpdateMode, Result};

/// Key-value operations the blacklist needs from a map.
///
/// Each call is atomic on its own, nothing is atomic across calls.
pub trait BpfStore {
    type K;
    type V;
    fn insert(&self, key: &Self::K, value: &Self::V, mode: UpdateMode) -> Result<()>;
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) for an absent key.
    fn get(&self, key: &Self::K) -> Result<Self::V>;
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) for an absent key.
    fn remove(&self, key: &Self::K) -> Result<()>;
    /// Successor of `key`, or the first key for `None`. `None` once exhausted.
    fn next_key(&self, key: Option<&Self::K>) -> Result<Option<Self::K>>;
    fn pin(&self, path: &Path) -> Result<()>;
}

impl<K: Pod, V: Pod> BpfStore for TypedMap<K, V> {
    type K = K;
    type V = V;
    fn insert(&self, key: &Self::K, value: &Self::V, mode: UpdateMode) -> Result<()> {
        TypedMap::insert(self, key, value, mode)
    }

    fn get(&self, key: &Self::K) -> Result<Self::V> {
        TypedMap::get(self, key)
    }

    fn remove(&self, key: &Self::K) -> Result<()> {
        TypedMap::remove(self, key)
    }

    fn next_key(&self, key: Option<&Self::K>) -> Result<Option<Self::K>> {
        TypedMap::next_key(self, key)
    }

    fn pin(&self, path: &Path) -> Result<()> {
        self.handle().pin(path)
    }
}
