//! The storage contracts: raw byte maps, the typed map contract, and
//! order-preserving key encoding.
//!
//! Two layers:
//! - [`MapStore`] / [`RawMap`]: an embedded transactional store handing out
//!   named, ordered byte maps. Writes stay pending until [`MapStore::commit`].
//! - [`PersistentMap`]: the typed map contract every graph index is written
//!   against. Only a handful of primitives are required; the bulk and
//!   conditional operations are provided in terms of them, so a decorator
//!   such as [`crate::SwapMap`] sees each contract call as one unit.

use incgraph_core::{NodeId, SourceId};

use crate::error::StorageError;

/// Page size used by the provided whole-map snapshots.
pub const SNAPSHOT_PAGE: usize = 512;

/// An embedded transactional store holding any number of named byte maps.
///
/// All maps opened from one store share its transaction: a commit through
/// any of them makes every pending write durable.
pub trait MapStore {
    /// Opens (or lazily creates) the map called `name`.
    fn open_map(&self, name: &str) -> Result<Box<dyn RawMap>, StorageError>;

    /// Makes every pending write durable.
    fn commit(&self) -> Result<(), StorageError>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;
}

/// A named, byte-ordered map inside a [`MapStore`].
///
/// Handles share the store, so mutation goes through `&self`.
pub trait RawMap {
    fn name(&self) -> &str;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores `value` under `key`, returning the previous value.
    fn insert(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Deletes `key`, returning the previous value.
    fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    fn clear(&self) -> Result<(), StorageError>;

    fn len(&self) -> Result<usize, StorageError>;

    /// Up to `limit` entries whose key sorts strictly after `cursor` (from the
    /// first key when `None`), in ascending byte order.
    fn scan_after(
        &self,
        cursor: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;

    /// Commits the owning store.
    fn commit(&self) -> Result<(), StorageError>;
}

/// Something whose pending writes can be made durable.
pub trait Committable {
    fn commit(&self) -> Result<(), StorageError>;
}

/// Order-preserving key encoding.
///
/// `a < b` on the encoded bytes must hold exactly when the keys are meant
/// to sort that way, and `decode(encode(k)) == k`.
pub trait MapKey: Sized {
    fn encode(&self) -> Vec<u8>;
    fn decode(bytes: &[u8]) -> Result<Self, String>;
}

impl MapKey for String {
    fn encode(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self, String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())
    }
}

impl MapKey for NodeId {
    fn encode(&self) -> Vec<u8> {
        self.as_str().as_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self, String> {
        let name = String::decode(bytes)?;
        NodeId::new(name).map_err(|e| e.to_string())
    }
}

impl MapKey for SourceId {
    fn encode(&self) -> Vec<u8> {
        self.as_str().as_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self, String> {
        let id = String::decode(bytes)?;
        SourceId::new(id).map_err(|e| e.to_string())
    }
}

/// The map contract shared by every graph index.
///
/// Reads return owned values, and `keys` / `values` / `entries` return owned
/// snapshots, so callers can never mutate the index behind the map's back.
pub trait PersistentMap {
    type Key: MapKey;
    type Value;

    fn get(&self, key: &Self::Key) -> Result<Option<Self::Value>, StorageError>;

    fn len(&self) -> Result<usize, StorageError>;

    /// Up to `limit` entries whose encoded key sorts strictly after `after`.
    fn page(
        &self,
        after: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Self::Key, Self::Value)>, StorageError>;

    fn insert(
        &mut self,
        key: Self::Key,
        value: Self::Value,
    ) -> Result<Option<Self::Value>, StorageError>;

    fn remove(&mut self, key: &Self::Key) -> Result<Option<Self::Value>, StorageError>;

    fn clear(&mut self) -> Result<(), StorageError>;

    fn contains_key(&self, key: &Self::Key) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }

    /// Whether any entry holds `value`, scanning page by page.
    fn contains_value(&self, value: &Self::Value) -> Result<bool, StorageError>
    where
        Self::Value: PartialEq,
    {
        let mut cursor: Option<Vec<u8>> = None;
        loop {
            let page = self.page(cursor.as_deref(), SNAPSHOT_PAGE)?;
            if page.iter().any(|(_, v)| v == value) {
                return Ok(true);
            }
            if page.len() < SNAPSHOT_PAGE {
                return Ok(false);
            }
            cursor = page.last().map(|(k, _)| k.encode());
        }
    }

    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    fn insert_all<I>(&mut self, entries: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = (Self::Key, Self::Value)>,
    {
        for (key, value) in entries {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Replaces every value with `f(key, value)`.
    fn replace_all<F>(&mut self, mut f: F) -> Result<(), StorageError>
    where
        F: FnMut(&Self::Key, Self::Value) -> Self::Value,
    {
        for (key, value) in self.entries()? {
            let replaced = f(&key, value);
            self.insert(key, replaced)?;
        }
        Ok(())
    }

    /// Inserts only if `key` is absent; returns the existing value otherwise.
    fn insert_if_absent(
        &mut self,
        key: Self::Key,
        value: Self::Value,
    ) -> Result<Option<Self::Value>, StorageError> {
        match self.get(&key)? {
            Some(existing) => Ok(Some(existing)),
            None => {
                self.insert(key, value)?;
                Ok(None)
            }
        }
    }

    /// Removes `key` only if it currently maps to `expected`.
    fn remove_if_eq(
        &mut self,
        key: &Self::Key,
        expected: &Self::Value,
    ) -> Result<bool, StorageError>
    where
        Self::Value: PartialEq,
    {
        match self.get(key)? {
            Some(current) if current == *expected => {
                self.remove(key)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Replaces the value of `key` only if it currently maps to `expected`.
    fn replace_if_eq(
        &mut self,
        key: Self::Key,
        expected: &Self::Value,
        value: Self::Value,
    ) -> Result<bool, StorageError>
    where
        Self::Value: PartialEq,
    {
        match self.get(&key)? {
            Some(current) if current == *expected => {
                self.insert(key, value)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Replaces the value of `key` only if present; returns the old value.
    fn replace(
        &mut self,
        key: Self::Key,
        value: Self::Value,
    ) -> Result<Option<Self::Value>, StorageError> {
        if self.contains_key(&key)? {
            self.insert(key, value)
        } else {
            Ok(None)
        }
    }

    /// Recomputes the mapping for `key`; `None` from `f` removes it.
    fn compute<F>(&mut self, key: Self::Key, f: F) -> Result<Option<Self::Value>, StorageError>
    where
        F: FnOnce(&Self::Key, Option<Self::Value>) -> Option<Self::Value>,
        Self::Value: Clone,
    {
        let current = self.get(&key)?;
        let existed = current.is_some();
        match f(&key, current) {
            Some(value) => {
                self.insert(key, value.clone())?;
                Ok(Some(value))
            }
            None => {
                if existed {
                    self.remove(&key)?;
                }
                Ok(None)
            }
        }
    }

    /// Returns the current value, or stores and returns `f(key)` if absent.
    fn compute_if_absent<F>(
        &mut self,
        key: Self::Key,
        f: F,
    ) -> Result<Option<Self::Value>, StorageError>
    where
        F: FnOnce(&Self::Key) -> Option<Self::Value>,
        Self::Value: Clone,
    {
        if let Some(existing) = self.get(&key)? {
            return Ok(Some(existing));
        }
        match f(&key) {
            Some(value) => {
                self.insert(key, value.clone())?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Recomputes a present mapping; `None` from `f` removes it.
    fn compute_if_present<F>(
        &mut self,
        key: Self::Key,
        f: F,
    ) -> Result<Option<Self::Value>, StorageError>
    where
        F: FnOnce(&Self::Key, Self::Value) -> Option<Self::Value>,
        Self::Value: Clone,
    {
        let Some(current) = self.get(&key)? else {
            return Ok(None);
        };
        match f(&key, current) {
            Some(value) => {
                self.insert(key, value.clone())?;
                Ok(Some(value))
            }
            None => {
                self.remove(&key)?;
                Ok(None)
            }
        }
    }

    /// Stores `value` if absent, else `f(old, value)`; `None` removes it.
    fn merge<F>(
        &mut self,
        key: Self::Key,
        value: Self::Value,
        f: F,
    ) -> Result<Option<Self::Value>, StorageError>
    where
        F: FnOnce(Self::Value, Self::Value) -> Option<Self::Value>,
        Self::Value: Clone,
    {
        let merged = match self.get(&key)? {
            Some(current) => f(current, value),
            None => Some(value),
        };
        match merged {
            Some(value) => {
                self.insert(key, value.clone())?;
                Ok(Some(value))
            }
            None => {
                self.remove(&key)?;
                Ok(None)
            }
        }
    }

    fn keys(&self) -> Result<Vec<Self::Key>, StorageError> {
        Ok(self.entries()?.into_iter().map(|(k, _)| k).collect())
    }

    fn values(&self) -> Result<Vec<Self::Value>, StorageError> {
        Ok(self.entries()?.into_iter().map(|(_, v)| v).collect())
    }

    /// Snapshot of every entry in key order, read page by page.
    fn entries(&self) -> Result<Vec<(Self::Key, Self::Value)>, StorageError> {
        let mut out = Vec::new();
        let mut cursor: Option<Vec<u8>> = None;
        loop {
            let page = self.page(cursor.as_deref(), SNAPSHOT_PAGE)?;
            let Some((last, _)) = page.last() else {
                break;
            };
            cursor = Some(last.encode());
            let done = page.len() < SNAPSHOT_PAGE;
            out.extend(page);
            if done {
                break;
            }
        }
        Ok(out)
    }
}
