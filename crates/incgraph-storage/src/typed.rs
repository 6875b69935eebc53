//! [`TypedMap`]: a [`PersistentMap`] over a [`RawMap`].
//!
//! Keys go through [`MapKey`] so byte order matches key order; values are
//! stored as JSON via serde_json.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;
use crate::traits::{Committable, MapKey, MapStore, PersistentMap, RawMap};

pub struct TypedMap<K, V> {
    raw: Box<dyn RawMap>,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> TypedMap<K, V>
where
    K: MapKey,
    V: Serialize + DeserializeOwned,
{
    pub fn new(raw: Box<dyn RawMap>) -> Self {
        TypedMap {
            raw,
            _types: PhantomData,
        }
    }

    /// Opens the map called `name` in `store`.
    pub fn open(store: &dyn MapStore, name: &str) -> Result<Self, StorageError> {
        Ok(TypedMap::new(store.open_map(name)?))
    }

    pub fn name(&self) -> &str {
        self.raw.name()
    }

    fn decode_key(&self, bytes: &[u8]) -> Result<K, StorageError> {
        K::decode(bytes).map_err(|reason| StorageError::InvalidKey {
            map: self.raw.name().to_string(),
            reason,
        })
    }

    fn decode_value(bytes: Option<Vec<u8>>) -> Result<Option<V>, StorageError> {
        bytes
            .map(|b| serde_json::from_slice(&b))
            .transpose()
            .map_err(StorageError::from)
    }
}

impl<K, V> fmt::Debug for TypedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedMap")
            .field("name", &self.raw.name())
            .finish()
    }
}

impl<K, V> PersistentMap for TypedMap<K, V>
where
    K: MapKey,
    V: Serialize + DeserializeOwned,
{
    type Key = K;
    type Value = V;

    fn get(&self, key: &K) -> Result<Option<V>, StorageError> {
        Self::decode_value(self.raw.get(&key.encode())?)
    }

    fn len(&self) -> Result<usize, StorageError> {
        self.raw.len()
    }

    fn page(&self, after: Option<&[u8]>, limit: usize) -> Result<Vec<(K, V)>, StorageError> {
        self.raw
            .scan_after(after, limit)?
            .into_iter()
            .map(|(k, v)| -> Result<(K, V), StorageError> {
                Ok((self.decode_key(&k)?, serde_json::from_slice(&v)?))
            })
            .collect()
    }

    fn insert(&mut self, key: K, value: V) -> Result<Option<V>, StorageError> {
        let bytes = serde_json::to_vec(&value)?;
        Self::decode_value(self.raw.insert(&key.encode(), &bytes)?)
    }

    fn remove(&mut self, key: &K) -> Result<Option<V>, StorageError> {
        Self::decode_value(self.raw.remove(&key.encode())?)
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.raw.clear()
    }
}

impl<K, V> Committable for TypedMap<K, V> {
    fn commit(&self) -> Result<(), StorageError> {
        self.raw.commit()
    }
}
