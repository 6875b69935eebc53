//! [`SwapMap`]: the commit-after-every-mutation decorator.
//!
//! Wraps any [`PersistentMap`] that is also [`Committable`] and commits the
//! underlying store after every mutating contract call, whether the call
//! changed anything, did nothing, or failed. No uncommitted write survives
//! past the call that made it, so the graph can be interrupted between any
//! two index updates. Reads go straight to the inner map; there is no cache.

use tracing::warn;

use crate::error::StorageError;
use crate::traits::{Committable, PersistentMap};

#[derive(Debug)]
pub struct SwapMap<M> {
    inner: M,
}

impl<M> SwapMap<M> {
    pub fn new(inner: M) -> Self {
        SwapMap { inner }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    pub fn into_inner(self) -> M {
        self.inner
    }
}

impl<M: Committable> SwapMap<M> {
    /// Commits unconditionally, then reports the call's own error first.
    fn committed<T>(&self, result: Result<T, StorageError>) -> Result<T, StorageError> {
        let commit = self.inner.commit();
        match (result, commit) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(commit_err)) => {
                warn!(error = %commit_err, "commit after failed map call also failed");
                Err(err)
            }
        }
    }
}

impl<M: Committable> Committable for SwapMap<M> {
    fn commit(&self) -> Result<(), StorageError> {
        self.inner.commit()
    }
}

impl<M> PersistentMap for SwapMap<M>
where
    M: PersistentMap + Committable,
{
    type Key = M::Key;
    type Value = M::Value;

    fn get(&self, key: &M::Key) -> Result<Option<M::Value>, StorageError> {
        self.inner.get(key)
    }

    fn len(&self) -> Result<usize, StorageError> {
        self.inner.len()
    }

    fn page(
        &self,
        after: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(M::Key, M::Value)>, StorageError> {
        self.inner.page(after, limit)
    }

    fn contains_key(&self, key: &M::Key) -> Result<bool, StorageError> {
        self.inner.contains_key(key)
    }

    fn insert(&mut self, key: M::Key, value: M::Value) -> Result<Option<M::Value>, StorageError> {
        let result = self.inner.insert(key, value);
        self.committed(result)
    }

    fn remove(&mut self, key: &M::Key) -> Result<Option<M::Value>, StorageError> {
        let result = self.inner.remove(key);
        self.committed(result)
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        let result = self.inner.clear();
        self.committed(result)
    }

    fn insert_all<I>(&mut self, entries: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = (Self::Key, Self::Value)>,
    {
        let result = self.inner.insert_all(entries);
        self.committed(result)
    }

    fn replace_all<F>(&mut self, f: F) -> Result<(), StorageError>
    where
        F: FnMut(&Self::Key, Self::Value) -> Self::Value,
    {
        let result = self.inner.replace_all(f);
        self.committed(result)
    }

    fn insert_if_absent(
        &mut self,
        key: M::Key,
        value: M::Value,
    ) -> Result<Option<M::Value>, StorageError> {
        let result = self.inner.insert_if_absent(key, value);
        self.committed(result)
    }

    fn remove_if_eq(&mut self, key: &M::Key, expected: &M::Value) -> Result<bool, StorageError>
    where
        Self::Value: PartialEq,
    {
        let result = self.inner.remove_if_eq(key, expected);
        self.committed(result)
    }

    fn replace_if_eq(
        &mut self,
        key: M::Key,
        expected: &M::Value,
        value: M::Value,
    ) -> Result<bool, StorageError>
    where
        Self::Value: PartialEq,
    {
        let result = self.inner.replace_if_eq(key, expected, value);
        self.committed(result)
    }

    fn replace(&mut self, key: M::Key, value: M::Value) -> Result<Option<M::Value>, StorageError> {
        let result = self.inner.replace(key, value);
        self.committed(result)
    }

    fn compute<F>(&mut self, key: M::Key, f: F) -> Result<Option<M::Value>, StorageError>
    where
        F: FnOnce(&Self::Key, Option<Self::Value>) -> Option<Self::Value>,
        Self::Value: Clone,
    {
        let result = self.inner.compute(key, f);
        self.committed(result)
    }

    fn compute_if_absent<F>(&mut self, key: M::Key, f: F) -> Result<Option<M::Value>, StorageError>
    where
        F: FnOnce(&Self::Key) -> Option<Self::Value>,
        Self::Value: Clone,
    {
        let result = self.inner.compute_if_absent(key, f);
        self.committed(result)
    }

    fn compute_if_present<F>(
        &mut self,
        key: M::Key,
        f: F,
    ) -> Result<Option<M::Value>, StorageError>
    where
        F: FnOnce(&Self::Key, Self::Value) -> Option<Self::Value>,
        Self::Value: Clone,
    {
        let result = self.inner.compute_if_present(key, f);
        self.committed(result)
    }

    fn merge<F>(
        &mut self,
        key: M::Key,
        value: M::Value,
        f: F,
    ) -> Result<Option<M::Value>, StorageError>
    where
        F: FnOnce(Self::Value, Self::Value) -> Option<Self::Value>,
        Self::Value: Clone,
    {
        let result = self.inner.merge(key, value, f);
        self.committed(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::traits::MapStore;
    use crate::typed::TypedMap;

    fn swap(store: &MemoryStore) -> SwapMap<TypedMap<String, i64>> {
        SwapMap::new(TypedMap::open(store, "m").unwrap())
    }

    fn k(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn every_mutation_is_committed() {
        let store = MemoryStore::new();
        let mut map = swap(&store);

        map.insert(k("a"), 1).unwrap();
        assert_eq!(store.pending(), 0);
        map.merge(k("a"), 2, |old, new| Some(old + new)).unwrap();
        assert_eq!(store.pending(), 0);
        map.compute(k("b"), |_, _| Some(7)).unwrap();
        map.replace_all(|_, v| v * 10).unwrap();
        assert_eq!(store.pending(), 0);

        store.rollback();
        assert_eq!(map.get(&k("a")).unwrap(), Some(30));
        assert_eq!(map.get(&k("b")).unwrap(), Some(70));
    }

    #[test]
    fn no_op_calls_still_commit() {
        let store = MemoryStore::new();
        let mut map = swap(&store);
        let before = store.commit_count();

        assert_eq!(map.remove(&k("missing")).unwrap(), None);
        assert_eq!(map.replace(k("missing"), 1).unwrap(), None);
        assert!(!map.remove_if_eq(&k("missing"), &1).unwrap());
        assert_eq!(map.compute_if_present(k("missing"), |_, v| Some(v)).unwrap(), None);

        assert_eq!(store.commit_count(), before + 4);
        assert!(map.is_empty().unwrap());
    }

    #[test]
    fn failed_calls_still_commit() {
        let store = MemoryStore::new();
        let raw = store.open_map("m").unwrap();
        raw.insert(b"bad", b"{").unwrap();
        assert_eq!(store.pending(), 1);

        let mut map = swap(&store);
        let err = map.remove_if_eq(&k("bad"), &1);
        assert!(matches!(err, Err(StorageError::Serialization(_))));
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn reads_do_not_commit() {
        let store = MemoryStore::new();
        let mut map = swap(&store);
        map.insert(k("a"), 1).unwrap();
        let before = store.commit_count();

        map.get(&k("a")).unwrap();
        map.contains_key(&k("a")).unwrap();
        assert!(map.contains_value(&1).unwrap());
        map.entries().unwrap();
        map.len().unwrap();

        assert_eq!(store.commit_count(), before);
    }

    #[test]
    fn conditional_operations_follow_map_semantics() {
        let store = MemoryStore::new();
        let mut map = swap(&store);

        assert_eq!(map.insert_if_absent(k("a"), 1).unwrap(), None);
        assert_eq!(map.insert_if_absent(k("a"), 2).unwrap(), Some(1));
        assert!(!map.replace_if_eq(k("a"), &5, 9).unwrap());
        assert!(map.replace_if_eq(k("a"), &1, 9).unwrap());
        assert_eq!(map.replace(k("a"), 3).unwrap(), Some(9));
        assert_eq!(map.compute_if_absent(k("a"), |_| Some(100)).unwrap(), Some(3));
        assert_eq!(map.compute_if_absent(k("b"), |_| Some(4)).unwrap(), Some(4));
        assert_eq!(map.compute_if_present(k("b"), |_, _| None).unwrap(), None);
        assert!(!map.contains_key(&k("b")).unwrap());
        assert_eq!(map.merge(k("a"), 1, |_, _| None).unwrap(), None);
        assert!(map.is_empty().unwrap());

        map.insert_all([(k("x"), 1), (k("y"), 2)]).unwrap();
        assert_eq!(map.keys().unwrap(), vec![k("x"), k("y")]);
        map.clear().unwrap();
        store.rollback();
        assert_eq!(map.len().unwrap(), 0);
    }
}
