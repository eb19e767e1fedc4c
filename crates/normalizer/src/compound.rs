//! Compound-term normalization for hyphenation and spacing variants.
//!
//! Multi-word supplement names circulate in several separator spellings:
//! `omega-3`, `omega 3`, `omega3`; `l-carnitine`, `l carnitine`,
//! `lcarnitine`. The fuzzy stage catches most single-separator differences,
//! but fully collapsed spellings ("alphalipoicacid") can exceed the edit
//! budget. This stage folds a cleaned query down to its separator-free form
//! and looks that up against the folded forms of all known canonicals.

use std::collections::HashMap;

use crate::clean::clean;
use crate::dictionary::Dictionary;

/// Canonical compound spellings that deserve recognition even when the
/// dictionary overlay does not list them as variants.
const COMPOUND_CANONICALS: &[&str] = &[
    "Omega-3",
    "L-Carnitine",
    "L-Theanine",
    "L-Tyrosine",
    "Beta-Alanine",
    "Alpha-Lipoic Acid",
    "Coenzyme Q10",
    "Vitamin D",
    "Vitamin D3",
    "Vitamin B12",
    "5-HTP",
    "Magnesium Glycinate",
    "Magnesium Citrate",
    "Creatine Monohydrate",
    "Hyaluronic Acid",
    "Folic Acid",
    "Whey Protein",
    "Fish Oil",
    "Green Tea Extract",
    "Milk Thistle",
    "Saw Palmetto",
    "Valerian Root",
    "Ginkgo Biloba",
    "Grape Seed Extract",
];

/// Folded-form lookup table, built once alongside the dictionary.
pub struct CompoundTable {
    folded: HashMap<String, String>,
}

/// Strip every space and hyphen from a cleaned string.
fn fold(cleaned: &str) -> String {
    cleaned.chars().filter(|c| *c != ' ' && *c != '-').collect()
}

impl CompoundTable {
    /// Index the folded forms of the compound list plus every canonical the
    /// dictionary knows about. Dictionary-derived entries win on collision so
    /// overlays stay authoritative.
    pub fn build(dict: &Dictionary) -> Self {
        let mut folded = HashMap::new();
        for canonical in COMPOUND_CANONICALS {
            folded.insert(fold(&clean(canonical)), canonical.to_string());
        }
        for canonical in dict.canonicals() {
            folded.insert(fold(&clean(canonical)), canonical.to_string());
        }
        Self { folded }
    }

    /// Resolve a cleaned query via its separator-free form.
    ///
    /// Single-token queries without separators are only resolved when they
    /// differ from the stored folded form's original (i.e. the canonical has
    /// separators the query dropped); otherwise the exact stage would already
    /// have hit.
    pub fn resolve(&self, cleaned: &str) -> Option<&str> {
        self.folded.get(&fold(cleaned)).map(String::as_str)
    }
}
