//! Produce a couple of stub embeddings and show their cosine relationships.
//!
//! Run with `cargo run -p supp-embedder --example embed_demo`.

use embedder::{Embedder, EmbedderConfig};

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn main() {
    let embedder = Embedder::new(EmbedderConfig::default());

    let texts = ["Magnesium", "Magnesium Glycinate", "Melatonin"];
    let embeddings: Vec<_> = texts
        .iter()
        .map(|t| embedder.embed(t).expect("stub embedding"))
        .collect();

    for (text, e) in texts.iter().zip(&embeddings) {
        let norm: f32 = e.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        println!("{text:22} dims={} l2={norm:.6} model={}", e.vector.len(), e.model_name);
    }

    println!();
    for i in 0..texts.len() {
        for j in (i + 1)..texts.len() {
            println!(
                "cos({}, {}) = {:+.4}",
                texts[i],
                texts[j],
                dot(&embeddings[i].vector, &embeddings[j].vector)
            );
        }
    }
}
