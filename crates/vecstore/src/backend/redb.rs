//! Redb-backed persistent store for supplement rows.
//!
//! Redb gives ACID transactions and crash safety from a pure-Rust embedded
//! database, which keeps deployment to a single data directory. Writes are
//! serialized by redb's single-writer model; reads run on MVCC snapshots.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::backend::StoreBackend;
use crate::error::StoreError;

const ROWS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("supplement_rows");

pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open or create the database file and ensure the rows table exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let write_txn = db
            .begin_write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        {
            let _table = write_txn
                .open_table(ROWS_TABLE)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl StoreBackend for RedbBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(ROWS_TABLE)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            table
                .insert(key, value)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let table = read_txn
            .open_table(ROWS_TABLE)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        match table
            .get(key)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
        {
            Some(value) => Ok(Some(value.value().to_vec())),
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(ROWS_TABLE)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            table
                .remove(key)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    fn batch_put(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(ROWS_TABLE)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            for (key, value) in entries {
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            }
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    fn scan(
        &self,
        visitor: &mut dyn FnMut(&[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let table = read_txn
            .open_table(ROWS_TABLE)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        for item in table
            .iter()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
        {
            let (_, value) = item.map_err(|e| StoreError::Unavailable(e.to_string()))?;
            visitor(value.value())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_redb_roundtrip() {
        let file = NamedTempFile::new().unwrap();
        let backend = RedbBackend::open(file.path()).unwrap();

        backend.put("k1", b"v1").unwrap();
        assert_eq!(backend.get("k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(backend.get("nope").unwrap(), None);

        backend.delete("k1").unwrap();
        assert_eq!(backend.get("k1").unwrap(), None);
    }

    #[test]
    fn test_redb_batch_and_scan() {
        let file = NamedTempFile::new().unwrap();
        let backend = RedbBackend::open(file.path()).unwrap();

        backend
            .batch_put(vec![
                ("a".into(), b"1".to_vec()),
                ("b".into(), b"2".to_vec()),
            ])
            .unwrap();

        let mut collected = Vec::new();
        backend
            .scan(&mut |value| {
                collected.push(value.to_vec());
                Ok(())
            })
            .unwrap();
        assert_eq!(collected.len(), 2);
    }

    #[test]
    fn test_redb_survives_reopen() {
        let file = NamedTempFile::new().unwrap();
        {
            let backend = RedbBackend::open(file.path()).unwrap();
            backend.put("persist", b"yes").unwrap();
        }
        let backend = RedbBackend::open(file.path()).unwrap();
        assert_eq!(backend.get("persist").unwrap(), Some(b"yes".to_vec()));
    }
}
