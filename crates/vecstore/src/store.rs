//! The `VectorStore` façade: validated inserts, exact lookup, and ANN search
//! over supplement rows.
//!
//! Rows live in the backend (bincode + zstd); the name index and the ANN
//! index are memory-resident and rebuilt from a scan at open time. All
//! mutations take the write lock, so an insert's duplicate check and its
//! backend write are atomic with respect to other inserts.

use std::collections::HashMap;
use std::sync::RwLock;

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};

use crate::ann::{dot, AnnConfig, AnnIndex};
use crate::backend::{BackendConfig, StoreBackend};
use crate::error::StoreError;
use crate::supplement::Supplement;

/// Allowed deviation of the embedding L2 norm from 1.0.
pub const NORM_EPSILON: f32 = 1e-3;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: BackendConfig,
    /// Expected embedding dimensionality.
    pub dimension: usize,
    pub ann: AnnConfig,
}

impl StoreConfig {
    pub fn in_memory(dimension: usize) -> Self {
        Self {
            backend: BackendConfig::in_memory(),
            dimension,
            ann: AnnConfig::default(),
        }
    }
}

/// One search result: a supplement and its exact cosine similarity.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub supplement: Supplement,
    pub similarity: f32,
}

struct Indexes {
    ann: AnnIndex,
    /// lowercase canonical name -> id
    by_name: HashMap<String, String>,
    /// lowercase alias -> owning id
    alias_owner: HashMap<String, String>,
}

pub struct VectorStore {
    backend: Box<dyn StoreBackend>,
    dimension: usize,
    inner: RwLock<Indexes>,
}

impl VectorStore {
    /// Open the store and rebuild the in-memory indexes from persisted rows.
    pub fn open(cfg: StoreConfig) -> Result<Self, StoreError> {
        let backend = cfg.backend.open()?;
        let mut indexes = Indexes {
            ann: AnnIndex::new(cfg.dimension, cfg.ann),
            by_name: HashMap::new(),
            alias_owner: HashMap::new(),
        };

        let mut rows: Vec<Supplement> = Vec::new();
        backend.scan(&mut |bytes| {
            rows.push(decode_row(bytes)?);
            Ok(())
        })?;
        // Deterministic rebuild order regardless of backend scan order.
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        for row in rows {
            index_row(&mut indexes, &row)?;
        }

        tracing::info!(rows = indexes.ann.len(), "vector store opened");
        Ok(Self {
            backend,
            dimension: cfg.dimension,
            inner: RwLock::new(indexes),
        })
    }

    /// Number of stored supplements.
    pub fn len(&self) -> usize {
        self.read_inner().map(|g| g.ann.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomic insert. Rejects dimension/norm violations with
    /// [`StoreError::InvalidEmbedding`] and canonical-name or alias
    /// collisions with [`StoreError::Duplicate`].
    pub fn insert(&self, supplement: Supplement) -> Result<(), StoreError> {
        self.validate_embedding(&supplement.embedding)?;

        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Unavailable("index lock poisoned".into()))?;

        let name_key = supplement.canonical_name.to_lowercase();
        if inner.by_name.contains_key(&name_key) {
            return Err(StoreError::Duplicate {
                name: supplement.canonical_name.clone(),
            });
        }
        // A new canonical name may not already be claimed as someone's alias,
        // and none of the new aliases may shadow an existing canonical name.
        if inner.alias_owner.contains_key(&name_key) {
            return Err(StoreError::Duplicate {
                name: supplement.canonical_name.clone(),
            });
        }
        for alias in &supplement.aliases {
            if inner.by_name.contains_key(&alias.to_lowercase()) {
                return Err(StoreError::Duplicate {
                    name: alias.clone(),
                });
            }
        }

        let encoded = encode_row(&supplement)?;
        self.backend.put(&supplement.id, &encoded)?;
        index_row(&mut inner, &supplement)?;
        tracing::debug!(id = %supplement.id, name = %supplement.canonical_name, "supplement inserted");
        Ok(())
    }

    /// Exact lookup by canonical name (case-insensitive).
    pub fn get_by_canonical_name(&self, name: &str) -> Result<Option<Supplement>, StoreError> {
        let id = {
            let inner = self.read_inner()?;
            match inner.by_name.get(&name.to_lowercase()) {
                Some(id) => id.clone(),
                None => return Ok(None),
            }
        };
        self.get_by_id(&id)
    }

    /// Lookup by row id.
    pub fn get_by_id(&self, id: &str) -> Result<Option<Supplement>, StoreError> {
        match self.backend.get(id)? {
            Some(bytes) => Ok(Some(decode_row(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Top-`k` rows by cosine similarity, descending, filtered at
    /// `min_similarity`. Ties within three decimals order by lower id.
    pub fn ann(
        &self,
        query: &[f32],
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchHit>, StoreError> {
        if query.len() != self.dimension {
            return Err(StoreError::InvalidEmbedding {
                expected: self.dimension,
                got: query.len(),
                norm: f32::NAN,
            });
        }

        let candidates: Vec<(String, f32)> = {
            let inner = self.read_inner()?;
            inner
                .ann
                .search(query, k)?
                .into_iter()
                .filter(|hit| hit.similarity >= min_similarity)
                .filter_map(|hit| {
                    inner
                        .ann
                        .id_for_slot(hit.slot)
                        .map(|id| (id.to_string(), hit.similarity))
                })
                .collect()
        };

        let mut hits = Vec::with_capacity(candidates.len());
        for (id, similarity) in candidates {
            if let Some(supplement) = self.get_by_id(&id)? {
                hits.push(SearchHit {
                    similarity,
                    supplement,
                });
            }
        }

        hits.sort_by(|a, b| {
            let a_key = (a.similarity * 1000.0).round() as i64;
            let b_key = (b.similarity * 1000.0).round() as i64;
            b_key
                .cmp(&a_key)
                .then_with(|| a.supplement.id.cmp(&b.supplement.id))
        });
        Ok(hits)
    }

    /// Exact similarity between a query vector and one stored row, if present.
    pub fn similarity_to(&self, query: &[f32], canonical_name: &str) -> Result<Option<f32>, StoreError> {
        Ok(self
            .get_by_canonical_name(canonical_name)?
            .map(|row| dot(query, &row.embedding)))
    }

    fn validate_embedding(&self, embedding: &[f32]) -> Result<(), StoreError> {
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if embedding.len() != self.dimension || (norm - 1.0).abs() > NORM_EPSILON {
            return Err(StoreError::InvalidEmbedding {
                expected: self.dimension,
                got: embedding.len(),
                norm,
            });
        }
        Ok(())
    }

    fn read_inner(&self) -> Result<std::sync::RwLockReadGuard<'_, Indexes>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("index lock poisoned".into()))
    }
}

fn index_row(indexes: &mut Indexes, row: &Supplement) -> Result<(), StoreError> {
    indexes
        .by_name
        .insert(row.canonical_name.to_lowercase(), row.id.clone());
    for alias in &row.aliases {
        indexes
            .alias_owner
            .insert(alias.to_lowercase(), row.id.clone());
    }
    indexes.ann.insert(row.id.clone(), row.embedding.clone())
}

fn encode_row(row: &Supplement) -> Result<Vec<u8>, StoreError> {
    let raw = encode_to_vec(row, standard()).map_err(|e| StoreError::Codec(e.to_string()))?;
    zstd::encode_all(raw.as_slice(), 0).map_err(|e| StoreError::Codec(e.to_string()))
}

fn decode_row(bytes: &[u8]) -> Result<Supplement, StoreError> {
    let raw = zstd::decode_all(bytes).map_err(|e| StoreError::Codec(e.to_string()))?;
    let (row, _) =
        decode_from_slice(&raw, standard()).map_err(|e| StoreError::Codec(e.to_string()))?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supplement::{EvidenceGrade, SupplementMetadata};
    use chrono::Utc;

    fn unit(v: Vec<f32>) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.into_iter().map(|x| x / norm).collect()
    }

    fn supplement(id: &str, name: &str, embedding: Vec<f32>) -> Supplement {
        let now = Utc::now();
        Supplement {
            schema_version: crate::supplement::ROW_SCHEMA_VERSION,
            id: id.into(),
            canonical_name: name.into(),
            aliases: vec![],
            embedding,
            metadata: SupplementMetadata {
                evidence_grade: EvidenceGrade::A,
                study_count: 42,
                category: Some("mineral".into()),
                first_seen: now,
            },
            created_at: now,
            updated_at: now,
        }
    }

    fn store() -> VectorStore {
        VectorStore::open(StoreConfig::in_memory(3)).unwrap()
    }

    #[test]
    fn test_insert_and_exact_lookup() {
        let store = store();
        store
            .insert(supplement("s1", "Magnesium", unit(vec![1.0, 0.0, 0.0])))
            .unwrap();

        let found = store.get_by_canonical_name("magnesium").unwrap().unwrap();
        assert_eq!(found.id, "s1");
        assert_eq!(found.canonical_name, "Magnesium");
        assert!(store.get_by_canonical_name("zinc").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_canonical_name_rejected() {
        let store = store();
        store
            .insert(supplement("s1", "Magnesium", unit(vec![1.0, 0.0, 0.0])))
            .unwrap();
        let err = store
            .insert(supplement("s2", "MAGNESIUM", unit(vec![0.0, 1.0, 0.0])))
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[test]
    fn test_alias_colliding_with_canonical_rejected() {
        let store = store();
        store
            .insert(supplement("s1", "Magnesium", unit(vec![1.0, 0.0, 0.0])))
            .unwrap();

        let mut other = supplement("s2", "Magnesium Oxide", unit(vec![0.0, 1.0, 0.0]));
        other.aliases = vec!["magnesium".into()];
        assert!(matches!(
            store.insert(other),
            Err(StoreError::Duplicate { .. })
        ));

        // And the mirror case: a canonical name that is already an alias.
        let mut with_alias = supplement("s3", "Zinc", unit(vec![0.0, 0.0, 1.0]));
        with_alias.aliases = vec!["cinc".into()];
        store.insert(with_alias).unwrap();
        assert!(matches!(
            store.insert(supplement("s4", "Cinc", unit(vec![0.5, 0.5, 0.0]))),
            Err(StoreError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_invalid_embedding_rejected() {
        let store = store();
        // Wrong dimension
        assert!(matches!(
            store.insert(supplement("s1", "Magnesium", unit(vec![1.0, 0.0]))),
            Err(StoreError::InvalidEmbedding { .. })
        ));
        // Right dimension, not unit norm
        assert!(matches!(
            store.insert(supplement("s1", "Magnesium", vec![2.0, 0.0, 0.0])),
            Err(StoreError::InvalidEmbedding { .. })
        ));
    }

    #[test]
    fn test_ann_orders_by_similarity() {
        let store = store();
        store
            .insert(supplement("s1", "Magnesium", unit(vec![1.0, 0.0, 0.0])))
            .unwrap();
        store
            .insert(supplement("s2", "Zinc", unit(vec![0.0, 1.0, 0.0])))
            .unwrap();
        store
            .insert(supplement("s3", "Calcium", unit(vec![0.9, 0.1, 0.0])))
            .unwrap();

        let hits = store.ann(&unit(vec![1.0, 0.0, 0.0]), 5, 0.5).unwrap();
        assert_eq!(hits.len(), 2); // zinc is orthogonal, filtered by floor
        assert_eq!(hits[0].supplement.canonical_name, "Magnesium");
        assert_eq!(hits[1].supplement.canonical_name, "Calcium");
    }

    #[test]
    fn test_ann_tie_breaks_by_lower_id() {
        let store = store();
        let v = unit(vec![1.0, 0.0, 0.0]);
        store.insert(supplement("b", "SuppB", v.clone())).unwrap();
        store.insert(supplement("a", "SuppA", v.clone())).unwrap();

        let hits = store.ann(&v, 5, 0.0).unwrap();
        assert_eq!(hits.len(), 2);
        // Identical similarity to three decimals: lower id first.
        assert_eq!(hits[0].supplement.id, "a");
        assert_eq!(hits[1].supplement.id, "b");
    }

    #[test]
    fn test_min_similarity_filters_everything() {
        let store = store();
        store
            .insert(supplement("s1", "Magnesium", unit(vec![1.0, 0.0, 0.0])))
            .unwrap();
        let hits = store.ann(&unit(vec![0.0, 1.0, 0.0]), 5, 0.85).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let store = store();
        assert!(matches!(
            store.ann(&[1.0, 0.0], 5, 0.0),
            Err(StoreError::InvalidEmbedding { .. })
        ));
    }

    #[test]
    fn test_reopen_rebuilds_indexes() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let cfg = StoreConfig {
            backend: BackendConfig::redb(file.path()),
            dimension: 3,
            ann: AnnConfig::default(),
        };
        {
            let store = VectorStore::open(cfg.clone()).unwrap();
            store
                .insert(supplement("s1", "Magnesium", unit(vec![1.0, 0.0, 0.0])))
                .unwrap();
        }
        let store = VectorStore::open(cfg).unwrap();
        assert_eq!(store.len(), 1);
        let hits = store.ann(&unit(vec![1.0, 0.0, 0.0]), 5, 0.5).unwrap();
        assert_eq!(hits[0].supplement.canonical_name, "Magnesium");
    }
}
