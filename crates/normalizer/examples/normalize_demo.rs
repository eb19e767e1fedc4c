//! Walk a handful of noisy queries through the normalization pipeline.
//!
//! Run with `cargo run -p supp-normalizer --example normalize_demo`.

use normalizer::{Normalizer, NormalizerConfig};

fn main() {
    let normalizer = Normalizer::new(NormalizerConfig::default()).expect("builtin dictionary");

    let queries = [
        "magnesio",
        "  Vitamína  D ",
        "magenesio",
        "GLICINATO DE MAGNESIO",
        "omega3",
        "quercetin phytosome",
    ];

    for raw in queries {
        match normalizer.normalize(raw) {
            Ok(out) => println!(
                "{raw:28} -> {:<22} confidence={:.2} method={} fingerprint={}",
                out.canonical,
                out.confidence,
                out.method,
                out.fingerprint()
            ),
            Err(err) => println!("{raw:28} -> rejected: {err}"),
        }
    }
}
