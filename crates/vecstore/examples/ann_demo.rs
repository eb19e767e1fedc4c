//! Insert a few rows and run an ANN query against the in-memory store.
//!
//! Run with `cargo run -p supp-vecstore --example ann_demo`.

use chrono::Utc;
use vecstore::{
    EvidenceGrade, StoreConfig, Supplement, SupplementMetadata, VectorStore, ROW_SCHEMA_VERSION,
};

fn unit(v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.into_iter().map(|x| x / norm).collect()
}

fn row(id: &str, name: &str, embedding: Vec<f32>) -> Supplement {
    let now = Utc::now();
    Supplement {
        schema_version: ROW_SCHEMA_VERSION,
        id: id.into(),
        canonical_name: name.into(),
        aliases: vec![],
        embedding,
        metadata: SupplementMetadata {
            evidence_grade: EvidenceGrade::A,
            study_count: 1000,
            category: Some("demo".into()),
            first_seen: now,
        },
        created_at: now,
        updated_at: now,
    }
}

fn main() {
    let store = VectorStore::open(StoreConfig::in_memory(3)).expect("in-memory store");

    store.insert(row("s1", "Magnesium", unit(vec![1.0, 0.1, 0.0]))).unwrap();
    store.insert(row("s2", "Calcium", unit(vec![0.9, 0.3, 0.1]))).unwrap();
    store.insert(row("s3", "Melatonin", unit(vec![0.0, 0.1, 1.0]))).unwrap();

    let query = unit(vec![1.0, 0.15, 0.05]);
    for hit in store.ann(&query, 3, 0.0).expect("search") {
        println!(
            "{:<12} similarity={:+.4} grade={}",
            hit.supplement.canonical_name, hit.similarity, hit.supplement.metadata.evidence_grade
        );
    }
}
