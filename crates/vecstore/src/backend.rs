//! Pluggable key-value backends for supplement rows.
//!
//! The store only needs five primitives; everything else (indexes, ANN) is
//! rebuilt in memory from a scan at open time. The in-memory backend serves
//! tests and ephemeral deployments, the redb backend persistent ones.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::StoreError;

pub mod redb;

/// Storage primitives the vector store is built on.
pub trait StoreBackend: Send + Sync {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    fn batch_put(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), StoreError>;
    /// Visit every stored value. Used once at open to rebuild indexes.
    fn scan(&self, visitor: &mut dyn FnMut(&[u8]) -> Result<(), StoreError>)
        -> Result<(), StoreError>;
}

/// Backend selection, part of the store config.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    InMemory,
    Redb { path: PathBuf },
}

impl BackendConfig {
    pub fn in_memory() -> Self {
        BackendConfig::InMemory
    }

    pub fn redb(path: impl Into<PathBuf>) -> Self {
        BackendConfig::Redb { path: path.into() }
    }

    pub(crate) fn open(&self) -> Result<Box<dyn StoreBackend>, StoreError> {
        match self {
            BackendConfig::InMemory => Ok(Box::new(InMemoryBackend::default())),
            BackendConfig::Redb { path } => Ok(Box::new(redb::RedbBackend::open(path)?)),
        }
    }
}

/// HashMap-backed backend for tests and ephemeral use. A `BTreeMap` keeps
/// scan order deterministic.
#[derive(Default)]
pub struct InMemoryBackend {
    rows: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl StoreBackend for InMemoryBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.rows
            .write()
            .map_err(|_| StoreError::Unavailable("row lock poisoned".into()))?
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .rows
            .read()
            .map_err(|_| StoreError::Unavailable("row lock poisoned".into()))?
            .get(key)
            .cloned())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.rows
            .write()
            .map_err(|_| StoreError::Unavailable("row lock poisoned".into()))?
            .remove(key);
        Ok(())
    }

    fn batch_put(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Unavailable("row lock poisoned".into()))?;
        for (key, value) in entries {
            rows.insert(key, value);
        }
        Ok(())
    }

    fn scan(
        &self,
        visitor: &mut dyn FnMut(&[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Unavailable("row lock poisoned".into()))?;
        for value in rows.values() {
            visitor(value)?;
        }
        Ok(())
    }
}
