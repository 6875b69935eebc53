//! SQLite implementation of [`MapStore`].
//!
//! [`SqliteStore`] keeps every named map in the single `entries` table
//! (see `migrations/001_initial_schema.sql`). The connection always holds
//! an open transaction: writes accumulate in it, [`MapStore::commit`] runs
//! `COMMIT` and immediately begins the next one. Closing the connection
//! without a commit therefore discards the pending writes, exactly like a
//! crash would.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::StorageError;
use crate::traits::{MapStore, RawMap};

/// SQLite-backed [`MapStore`]. Clones share the connection.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Rc<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens (or creates) a database file at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        conn.execute_batch("BEGIN")?;
        info!(path = %path.display(), "opened sqlite store");
        Ok(SqliteStore {
            conn: Rc::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens a private in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        conn.execute_batch("BEGIN")?;
        Ok(SqliteStore {
            conn: Rc::new(conn),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Runs SQLite's `quick_check`, returning `true` if the file is sound.
    pub fn quick_check(&self) -> Result<bool, StorageError> {
        let verdict: String = self
            .conn
            .query_row("PRAGMA quick_check", [], |row| row.get(0))?;
        Ok(verdict == "ok")
    }
}

impl MapStore for SqliteStore {
    fn open_map(&self, name: &str) -> Result<Box<dyn RawMap>, StorageError> {
        Ok(Box::new(SqliteMap {
            conn: Rc::clone(&self.conn),
            name: name.to_string(),
        }))
    }

    fn commit(&self) -> Result<(), StorageError> {
        commit(&self.conn)
    }

    fn location(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }
}

fn commit(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch("COMMIT")?;
    conn.execute_batch("BEGIN")?;
    Ok(())
}

/// One named map: the rows of `entries` with `map = name`.
#[derive(Debug)]
struct SqliteMap {
    conn: Rc<Connection>,
    name: String,
}

impl RawMap for SqliteMap {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value FROM entries WHERE map = ?1 AND key = ?2")?;
        let value = stmt
            .query_row(params![self.name, key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn insert(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let previous = self.get(key)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO entries (map, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (map, key) DO UPDATE SET value = excluded.value",
        )?;
        stmt.execute(params![self.name, key, value])?;
        Ok(previous)
    }

    fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let previous = self.get(key)?;
        if previous.is_some() {
            let mut stmt = self
                .conn
                .prepare_cached("DELETE FROM entries WHERE map = ?1 AND key = ?2")?;
            stmt.execute(params![self.name, key])?;
        }
        Ok(previous)
    }

    fn clear(&self) -> Result<(), StorageError> {
        let removed = self
            .conn
            .execute("DELETE FROM entries WHERE map = ?1", params![self.name])?;
        debug!(map = %self.name, removed, "cleared map");
        Ok(())
    }

    fn len(&self) -> Result<usize, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE map = ?1",
            params![self.name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn scan_after(
        &self,
        cursor: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let limit = limit as i64;
        let rows = match cursor {
            Some(cursor) => {
                let mut stmt = self.conn.prepare_cached(
                    "SELECT key, value FROM entries WHERE map = ?1 AND key > ?2
                     ORDER BY key LIMIT ?3",
                )?;
                let rows = stmt
                    .query_map(params![self.name, cursor, limit], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn.prepare_cached(
                    "SELECT key, value FROM entries WHERE map = ?1 ORDER BY key LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(params![self.name, limit], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    }

    fn commit(&self) -> Result<(), StorageError> {
        commit(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let store = SqliteStore::in_memory().unwrap();
        let map = store.open_map("m").unwrap();

        assert_eq!(map.insert(b"k", b"1").unwrap(), None);
        assert_eq!(map.insert(b"k", b"2").unwrap(), Some(b"1".to_vec()));
        assert_eq!(map.get(b"k").unwrap(), Some(b"2".to_vec()));
        assert_eq!(map.len().unwrap(), 1);

        assert_eq!(map.remove(b"k").unwrap(), Some(b"2".to_vec()));
        assert_eq!(map.remove(b"k").unwrap(), None);
        assert_eq!(map.len().unwrap(), 0);
    }

    #[test]
    fn maps_share_table_but_not_keys() {
        let store = SqliteStore::in_memory().unwrap();
        let a = store.open_map("a").unwrap();
        let b = store.open_map("b").unwrap();
        a.insert(b"k", b"1").unwrap();
        b.insert(b"k", b"2").unwrap();
        a.clear().unwrap();

        assert_eq!(a.get(b"k").unwrap(), None);
        assert_eq!(b.get(b"k").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn scan_orders_by_bytes() {
        let store = SqliteStore::in_memory().unwrap();
        let map = store.open_map("m").unwrap();
        for key in [b"b".as_slice(), b"a\x00z", b"a", b"c"] {
            map.insert(key, b"").unwrap();
        }

        let keys: Vec<_> = map
            .scan_after(None, 10)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(
            keys,
            vec![b"a".to_vec(), b"a\x00z".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );

        let after: Vec<_> = map
            .scan_after(Some(b"a\x00z".as_slice()), 1)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(after, vec![b"b".to_vec()]);
    }

    #[test]
    fn uncommitted_writes_are_lost_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            let map = store.open_map("m").unwrap();
            map.insert(b"kept", b"1").unwrap();
            store.commit().unwrap();
            map.insert(b"lost", b"2").unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let map = store.open_map("m").unwrap();
        assert_eq!(map.get(b"kept").unwrap(), Some(b"1".to_vec()));
        assert_eq!(map.get(b"lost").unwrap(), None);
        assert!(store.quick_check().unwrap());
    }
}
