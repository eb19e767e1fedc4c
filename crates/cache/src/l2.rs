//! L2: durable TTL-enforced table on redb.
//!
//! Models the deployment's shared network KV: millisecond reads, durable
//! across restarts, TTL enforced on read with lazy reaping plus an explicit
//! [`L2Cache::sweep`]. redb transactions are synchronous, so every operation
//! hops to the blocking pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};

use normalizer::Fingerprint;

use crate::clock::Clock;
use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::tier::CacheTier;

const CACHE_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("search_cache");

pub struct L2Cache {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl L2Cache {
    /// Open or create the cache database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let db = Database::create(path).map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Self::with_database(db, clock)
    }

    /// Ephemeral tier for tests and single-process dev deployments.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Self::with_database(db, clock)
    }

    fn with_database(db: Database, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let write_txn = db
            .begin_write()
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        {
            let _table = write_txn
                .open_table(CACHE_TABLE)
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(Self {
            db: Arc::new(db),
            clock,
        })
    }

    /// Delete every expired row. Returns how many were removed. Expiry is
    /// already enforced on read; this reclaims space for entries nothing
    /// reads anymore.
    pub async fn sweep(&self) -> Result<usize, CacheError> {
        let db = self.db.clone();
        let now = self.clock.now();
        run_blocking(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            let removed;
            {
                let mut table = write_txn
                    .open_table(CACHE_TABLE)
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?;
                let mut expired: Vec<Vec<u8>> = Vec::new();
                for item in table
                    .iter()
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?
                {
                    let (key, value) =
                        item.map_err(|e| CacheError::Unavailable(e.to_string()))?;
                    if let Ok(entry) = decode_entry(value.value()) {
                        if !entry.is_live(now) {
                            expired.push(key.value().to_vec());
                        }
                    } else {
                        // Undecodable rows are garbage; reap them too.
                        expired.push(key.value().to_vec());
                    }
                }
                removed = expired.len();
                for key in expired {
                    table
                        .remove(key.as_slice())
                        .map_err(|e| CacheError::Unavailable(e.to_string()))?;
                }
            }
            write_txn
                .commit()
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            Ok(removed)
        })
        .await
    }

    /// Current population, for the per-tier gauge.
    pub async fn len(&self) -> Result<usize, CacheError> {
        let db = self.db.clone();
        run_blocking(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            let table = read_txn
                .open_table(CACHE_TABLE)
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            Ok(table
                .len()
                .map_err(|e| CacheError::Unavailable(e.to_string()))? as usize)
        })
        .await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, CacheError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CacheError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CacheError::Unavailable(format!("blocking task failed: {e}")))?
}

fn encode_entry(entry: &CacheEntry) -> Result<Vec<u8>, CacheError> {
    encode_to_vec(entry, standard()).map_err(|e| CacheError::Codec(e.to_string()))
}

fn decode_entry(bytes: &[u8]) -> Result<CacheEntry, CacheError> {
    let (entry, _) =
        decode_from_slice(bytes, standard()).map_err(|e| CacheError::Codec(e.to_string()))?;
    Ok(entry)
}

#[async_trait]
impl CacheTier for L2Cache {
    fn name(&self) -> &'static str {
        "l2"
    }

    async fn get(&self, key: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        let db = self.db.clone();
        let now = self.clock.now();
        let key_bytes = *key.as_bytes();
        run_blocking(move || {
            let entry = {
                let read_txn = db
                    .begin_read()
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?;
                let table = read_txn
                    .open_table(CACHE_TABLE)
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?;
                match table
                    .get(key_bytes.as_slice())
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?
                {
                    Some(value) => decode_entry(value.value())?,
                    None => return Ok(None),
                }
            };

            if entry.is_live(now) {
                return Ok(Some(entry));
            }
            // Lazy reap; failure to remove only delays the sweep.
            let write_txn = db
                .begin_write()
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            {
                let mut table = write_txn
                    .open_table(CACHE_TABLE)
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?;
                table
                    .remove(key_bytes.as_slice())
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            }
            write_txn
                .commit()
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            Ok(None)
        })
        .await
    }

    async fn put(&self, key: &Fingerprint, entry: CacheEntry) -> Result<(), CacheError> {
        let db = self.db.clone();
        let key_bytes = *key.as_bytes();
        let encoded = encode_entry(&entry)?;
        run_blocking(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            {
                let mut table = write_txn
                    .open_table(CACHE_TABLE)
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?;
                table
                    .insert(key_bytes.as_slice(), encoded.as_slice())
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            }
            write_txn
                .commit()
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &Fingerprint) -> Result<(), CacheError> {
        let db = self.db.clone();
        let key_bytes = *key.as_bytes();
        run_blocking(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            {
                let mut table = write_txn
                    .open_table(CACHE_TABLE)
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?;
                table
                    .remove(key_bytes.as_slice())
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            }
            write_txn
                .commit()
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn flush(&self) -> Result<(), CacheError> {
        let db = self.db.clone();
        run_blocking(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            {
                let mut table = write_txn
                    .open_table(CACHE_TABLE)
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?;
                let keys: Vec<Vec<u8>> = table
                    .iter()
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?
                    .filter_map(|item| item.ok().map(|(k, _)| k.value().to_vec()))
                    .collect();
                for key in keys {
                    table
                        .remove(key.as_slice())
                        .map_err(|e| CacheError::Unavailable(e.to_string()))?;
                }
            }
            write_txn
                .commit()
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn population(&self) -> Result<u64, CacheError> {
        Ok(self.len().await? as u64)
    }
}
