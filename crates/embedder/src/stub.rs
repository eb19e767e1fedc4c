//! Deterministic stub embeddings.
//!
//! The stub seeds a sinusoid from a hash of the input text, giving stable,
//! cheap, text-sensitive vectors of the real model's dimensionality. Tests
//! and model-less deployments run on it; identical text always produces an
//! identical vector, and the cosine geometry is good enough to exercise the
//! store and cache layers.

use fxhash::hash64;

use crate::config::{EmbedderConfig, EMBEDDING_DIM};
use crate::normalize::l2_normalize_in_place;
use crate::types::Embedding;

pub(crate) fn make_stub_embedding(text: &str, cfg: &EmbedderConfig) -> Embedding {
    let mut vector = vec![0f32; EMBEDDING_DIM];
    let seed = hash64(text.as_bytes());
    for (idx, value) in vector.iter_mut().enumerate() {
        // Mix the index into the seed so components decorrelate; a plain
        // shift repeats with period 32 and collapses half the dimensions.
        let mixed = seed
            .rotate_left((idx % 61) as u32)
            .wrapping_mul(0x9E37_79B9_7F4A_7C15 ^ idx as u64);
        *value = ((mixed >> 11) as f32 * 1e-9).sin();
    }
    if cfg.normalize {
        l2_normalize_in_place(&mut vector);
    }
    Embedding {
        vector,
        model_name: format!("{}-stub", cfg.model_name),
        normalized: cfg.normalize,
    }
}
