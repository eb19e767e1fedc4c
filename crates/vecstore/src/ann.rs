//! Approximate nearest neighbor search over unit vectors.
//!
//! Small corpora are scanned linearly (exact, and faster than graph
//! traversal below a few thousand rows); once the row count crosses the
//! configured threshold an HNSW graph is built and extended incrementally.
//! Similarities are always recomputed as exact dot products on the stored
//! vectors, so the graph only influences *which* candidates surface, never
//! their reported scores.

use std::collections::HashMap;

use hnsw_rs::prelude::*;

use crate::error::StoreError;

/// ANN tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct AnnConfig {
    /// Neighbors per node; higher improves recall at build cost.
    pub m: usize,
    /// Candidate-list width during construction.
    pub ef_construction: usize,
    /// Candidate-list width during search.
    pub ef_search: usize,
    /// Row count below which linear scan is used even when enabled.
    pub min_vectors_for_ann: usize,
    /// Extra capacity factor reserved when (re)building the graph, so
    /// incremental inserts do not force an immediate rebuild.
    pub capacity_headroom: usize,
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
            min_vectors_for_ann: 1_000,
            capacity_headroom: 1_024,
        }
    }
}

/// One ANN candidate: a slot in the vector table plus its exact similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnHit {
    pub slot: usize,
    pub similarity: f32,
}

/// In-memory ANN index mapping row ids to vector slots.
pub struct AnnIndex {
    config: AnnConfig,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    slot_to_id: Vec<String>,
    id_to_slot: HashMap<String, usize>,
    hnsw: Option<Hnsw<'static, f32, DistCosine>>,
    graph_capacity: usize,
}

impl AnnIndex {
    pub fn new(dimension: usize, config: AnnConfig) -> Self {
        Self {
            config,
            dimension,
            vectors: Vec::new(),
            slot_to_id: Vec::new(),
            id_to_slot: HashMap::new(),
            hnsw: None,
            graph_capacity: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn id_for_slot(&self, slot: usize) -> Option<&str> {
        self.slot_to_id.get(slot).map(String::as_str)
    }

    /// Insert a vector. Extends the HNSW graph in place while capacity
    /// allows; otherwise the graph is rebuilt with fresh headroom.
    pub fn insert(&mut self, id: String, vector: Vec<f32>) -> Result<(), StoreError> {
        if vector.len() != self.dimension {
            return Err(StoreError::InvalidEmbedding {
                expected: self.dimension,
                got: vector.len(),
                norm: f32::NAN,
            });
        }

        let slot = self.vectors.len();
        self.id_to_slot.insert(id.clone(), slot);
        self.slot_to_id.push(id);
        self.vectors.push(vector);

        if self.vectors.len() < self.config.min_vectors_for_ann {
            return Ok(());
        }
        if self.hnsw.is_some() && slot < self.graph_capacity {
            let graph = self.hnsw.as_ref().expect("checked above");
            graph.insert((&self.vectors[slot], slot));
        } else {
            self.rebuild();
        }
        Ok(())
    }

    /// Rebuild the HNSW graph from scratch with capacity headroom.
    fn rebuild(&mut self) {
        let nb_elem = self.vectors.len();
        if nb_elem < self.config.min_vectors_for_ann {
            self.hnsw = None;
            self.graph_capacity = 0;
            return;
        }
        let capacity = nb_elem + self.config.capacity_headroom;
        let nb_layer = 16.min((nb_elem as f32).ln().trunc() as usize).max(1);
        let graph = Hnsw::<f32, DistCosine>::new(
            self.config.m,
            capacity,
            nb_layer,
            self.config.ef_construction,
            DistCosine {},
        );
        let data: Vec<(&Vec<f32>, usize)> = self.vectors.iter().enumerate().map(|(i, v)| (v, i)).collect();
        graph.parallel_insert(&data);
        tracing::debug!(rows = nb_elem, capacity, "rebuilt hnsw graph");
        self.hnsw = Some(graph);
        self.graph_capacity = capacity;
    }

    /// Top-`k` candidates by cosine similarity, descending. Exact when the
    /// corpus is below the ANN threshold.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<AnnHit>, StoreError> {
        if query.len() != self.dimension {
            return Err(StoreError::InvalidEmbedding {
                expected: self.dimension,
                got: query.len(),
                norm: f32::NAN,
            });
        }
        if self.vectors.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let use_graph =
            self.hnsw.is_some() && self.vectors.len() >= self.config.min_vectors_for_ann;
        let mut hits = if use_graph {
            let graph = self.hnsw.as_ref().expect("checked above");
            let neighbours = graph.search(query, k, self.config.ef_search);
            neighbours
                .into_iter()
                .map(|n| {
                    let slot = n.get_origin_id();
                    AnnHit {
                        slot,
                        similarity: dot(query, &self.vectors[slot]),
                    }
                })
                .collect::<Vec<_>>()
        } else {
            self.vectors
                .iter()
                .enumerate()
                .map(|(slot, v)| AnnHit {
                    slot,
                    similarity: dot(query, v),
                })
                .collect()
        };

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }
}

/// Dot product; equals cosine similarity on unit vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(v: Vec<f32>) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.into_iter().map(|x| x / norm).collect()
    }

    #[test]
    fn test_linear_search_small_corpus() {
        let mut index = AnnIndex::new(3, AnnConfig::default());
        index.insert("a".into(), unit(vec![1.0, 0.0, 0.0])).unwrap();
        index.insert("b".into(), unit(vec![0.0, 1.0, 0.0])).unwrap();
        index.insert("c".into(), unit(vec![0.9, 0.1, 0.0])).unwrap();

        let hits = index.search(&unit(vec![1.0, 0.0, 0.0]), 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(index.id_for_slot(hits[0].slot), Some("a"));
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut index = AnnIndex::new(3, AnnConfig::default());
        assert!(matches!(
            index.insert("a".into(), vec![1.0, 0.0]),
            Err(StoreError::InvalidEmbedding { expected: 3, got: 2, .. })
        ));
        index.insert("a".into(), unit(vec![1.0, 1.0, 0.0])).unwrap();
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn test_empty_search() {
        let index = AnnIndex::new(3, AnnConfig::default());
        assert!(index.search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_graph_path_matches_linear_top_hit() {
        // Force the graph on from the start and check it agrees with the
        // exact scan about the best neighbor.
        let config = AnnConfig {
            min_vectors_for_ann: 10,
            ..Default::default()
        };
        let mut index = AnnIndex::new(4, config);
        for i in 0..50 {
            let angle = i as f32 * 0.1;
            index
                .insert(
                    format!("row-{i}"),
                    unit(vec![angle.cos(), angle.sin(), 0.1, 0.05]),
                )
                .unwrap();
        }
        let query = unit(vec![0.3f32.cos(), 0.3f32.sin(), 0.1, 0.05]);
        let hits = index.search(&query, 3).unwrap();
        assert_eq!(index.id_for_slot(hits[0].slot), Some("row-3"));
        assert!(hits[0].similarity > 0.99);
    }

    #[test]
    fn test_incremental_insert_after_build() {
        let config = AnnConfig {
            min_vectors_for_ann: 5,
            ..Default::default()
        };
        let mut index = AnnIndex::new(3, config);
        for i in 0..20 {
            index
                .insert(format!("row-{i}"), unit(vec![1.0, i as f32 * 0.01, 0.0]))
                .unwrap();
        }
        // A vector inserted after the graph was built must be findable.
        index
            .insert("fresh".into(), unit(vec![0.0, 0.0, 1.0]))
            .unwrap();
        let hits = index.search(&unit(vec![0.0, 0.0, 1.0]), 1).unwrap();
        assert_eq!(index.id_for_slot(hits[0].slot), Some("fresh"));
    }

    #[test]
    fn test_k_capped_by_corpus() {
        let mut index = AnnIndex::new(2, AnnConfig::default());
        index.insert("a".into(), vec![1.0, 0.0]).unwrap();
        index.insert("b".into(), vec![0.0, 1.0]).unwrap();
        let hits = index.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 2);
    }
}
