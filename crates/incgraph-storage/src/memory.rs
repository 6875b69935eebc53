//! In-memory implementation of [`MapStore`].
//!
//! [`MemoryStore`] is a first-class backend for tests and throwaway sessions.
//! It keeps the same pending-until-commit semantics as the SQLite backend:
//! every write is journaled, [`MapStore::commit`] discards the journal, and
//! [`MemoryStore::rollback`] undoes everything since the last commit, which
//! is how tests simulate a crash.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::rc::Rc;

use crate::error::StorageError;
use crate::traits::{MapStore, RawMap};

#[derive(Debug)]
struct Undo {
    map: String,
    key: Vec<u8>,
    previous: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    maps: BTreeMap<String, BTreeMap<Vec<u8>, Vec<u8>>>,
    journal: Vec<Undo>,
    commits: u64,
}

/// Shared handle to an in-memory store. Clones refer to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Undoes every write since the last commit, returning how many were
    /// discarded.
    pub fn rollback(&self) -> usize {
        let mut inner = self.inner.borrow_mut();
        let journal = std::mem::take(&mut inner.journal);
        let undone = journal.len();
        for undo in journal.into_iter().rev() {
            let map = inner.maps.entry(undo.map).or_default();
            match undo.previous {
                Some(value) => {
                    map.insert(undo.key, value);
                }
                None => {
                    map.remove(&undo.key);
                }
            }
        }
        undone
    }

    /// Number of writes not yet committed.
    pub fn pending(&self) -> usize {
        self.inner.borrow().journal.len()
    }

    /// Number of commits performed so far.
    pub fn commit_count(&self) -> u64 {
        self.inner.borrow().commits
    }
}

impl MapStore for MemoryStore {
    fn open_map(&self, name: &str) -> Result<Box<dyn RawMap>, StorageError> {
        self.inner
            .borrow_mut()
            .maps
            .entry(name.to_string())
            .or_default();
        Ok(Box::new(MemoryMap {
            store: self.clone(),
            name: name.to_string(),
        }))
    }

    fn commit(&self) -> Result<(), StorageError> {
        let mut inner = self.inner.borrow_mut();
        inner.journal.clear();
        inner.commits += 1;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// One named map inside a [`MemoryStore`].
#[derive(Debug)]
struct MemoryMap {
    store: MemoryStore,
    name: String,
}

impl MemoryMap {
    fn write(&self, key: &[u8], value: Option<&[u8]>) -> Option<Vec<u8>> {
        let mut inner = self.store.inner.borrow_mut();
        let map = inner.maps.entry(self.name.clone()).or_default();
        let previous = match value {
            Some(value) => map.insert(key.to_vec(), value.to_vec()),
            None => map.remove(key),
        };
        inner.journal.push(Undo {
            map: self.name.clone(),
            key: key.to_vec(),
            previous: previous.clone(),
        });
        previous
    }
}

impl RawMap for MemoryMap {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let inner = self.store.inner.borrow();
        Ok(inner.maps.get(&self.name).and_then(|m| m.get(key).cloned()))
    }

    fn insert(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.write(key, Some(value)))
    }

    fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.write(key, None))
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut inner = self.store.inner.borrow_mut();
        let removed = inner
            .maps
            .insert(self.name.clone(), BTreeMap::new())
            .unwrap_or_default();
        for (key, value) in removed {
            inner.journal.push(Undo {
                map: self.name.clone(),
                key,
                previous: Some(value),
            });
        }
        Ok(())
    }

    fn len(&self) -> Result<usize, StorageError> {
        let inner = self.store.inner.borrow();
        Ok(inner.maps.get(&self.name).map_or(0, BTreeMap::len))
    }

    fn scan_after(
        &self,
        cursor: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let inner = self.store.inner.borrow();
        let Some(map) = inner.maps.get(&self.name) else {
            return Ok(Vec::new());
        };
        let lower = match cursor {
            Some(cursor) => Bound::Excluded(cursor),
            None => Bound::Unbounded,
        };
        Ok(map
            .range::<[u8], _>((lower, Bound::Unbounded))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn commit(&self) -> Result<(), StorageError> {
        self.store.commit()
    }
}
