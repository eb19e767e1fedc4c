//! Static Spanish/variant → English supplement dictionary.
//!
//! The dictionary is built once at startup from a compiled-in table plus an
//! optional JSON overlay file and is immutable afterwards. Keys are stored in
//! cleaned form (see [`clean`](crate::clean)); values are the canonical
//! English title-case names. Every canonical name also maps to itself, which
//! is what makes the whole normalization pipeline idempotent: feeding a
//! canonical form back in always resolves as an exact hit.

use std::collections::HashMap;
use std::path::Path;

use crate::clean::clean;
use crate::error::NormalizeError;

/// Compiled-in variant → canonical table.
///
/// Spanish names, common scientific/commercial synonyms, and frequent
/// misspellings for the seed catalog. Keys are written pre-cleaned
/// (lowercase, no accents) but are cleaned again at build time so a stray
/// entry cannot poison lookups.
const BUILTIN: &[(&str, &str)] = &[
    // Vitamins
    ("vitamina a", "Vitamin A"),
    ("vitamina b1", "Vitamin B1"),
    ("tiamina", "Vitamin B1"),
    ("vitamina b2", "Vitamin B2"),
    ("riboflavina", "Vitamin B2"),
    ("vitamina b3", "Vitamin B3"),
    ("niacina", "Vitamin B3"),
    ("vitamina b5", "Vitamin B5"),
    ("acido pantotenico", "Vitamin B5"),
    ("vitamina b6", "Vitamin B6"),
    ("vitamina b7", "Biotin"),
    ("biotina", "Biotin"),
    ("vitamina b9", "Folic Acid"),
    ("acido folico", "Folic Acid"),
    ("folato", "Folic Acid"),
    ("vitamina b12", "Vitamin B12"),
    ("cobalamina", "Vitamin B12"),
    ("vitamina c", "Vitamin C"),
    ("acido ascorbico", "Vitamin C"),
    ("vitamina d", "Vitamin D"),
    ("vitamina d3", "Vitamin D3"),
    ("colecalciferol", "Vitamin D3"),
    ("vitamina e", "Vitamin E"),
    ("tocoferol", "Vitamin E"),
    ("vitamina k", "Vitamin K"),
    ("vitamina k2", "Vitamin K2"),
    // Minerals
    ("magnesio", "Magnesium"),
    ("glicinato de magnesio", "Magnesium Glycinate"),
    ("citrato de magnesio", "Magnesium Citrate"),
    ("calcio", "Calcium"),
    ("hierro", "Iron"),
    ("zinc", "Zinc"),
    ("cinc", "Zinc"),
    ("potasio", "Potassium"),
    ("selenio", "Selenium"),
    ("cobre", "Copper"),
    ("manganeso", "Manganese"),
    ("cromo", "Chromium"),
    ("yodo", "Iodine"),
    ("boro", "Boron"),
    ("electrolitos", "Electrolytes"),
    // Amino acids and performance
    ("creatina", "Creatine"),
    ("monohidrato de creatina", "Creatine Monohydrate"),
    ("l carnitina", "L-Carnitine"),
    ("carnitina", "L-Carnitine"),
    ("l teanina", "L-Theanine"),
    ("teanina", "L-Theanine"),
    ("l tirosina", "L-Tyrosine"),
    ("tirosina", "L-Tyrosine"),
    ("glutamina", "Glutamine"),
    ("arginina", "Arginine"),
    ("taurina", "Taurine"),
    ("triptofano", "Tryptophan"),
    ("beta alanina", "Beta-Alanine"),
    ("aminoacidos ramificados", "BCAA"),
    ("bcaa", "BCAA"),
    ("hmb", "HMB"),
    ("proteina de suero", "Whey Protein"),
    ("proteina", "Whey Protein"),
    ("colageno", "Collagen"),
    // Fatty acids
    ("omega 3", "Omega-3"),
    ("omega tres", "Omega-3"),
    ("aceite de pescado", "Fish Oil"),
    ("aceite de krill", "Krill Oil"),
    ("aceite de higado de bacalao", "Cod Liver Oil"),
    // Botanicals
    ("curcuma", "Turmeric"),
    ("curcumina", "Curcumin"),
    ("jengibre", "Ginger"),
    ("ajo", "Garlic"),
    ("te verde", "Green Tea Extract"),
    ("extracto de te verde", "Green Tea Extract"),
    ("ashwagandha", "Ashwagandha"),
    ("rhodiola", "Rhodiola Rosea"),
    ("ginseng", "Ginseng"),
    ("maca", "Maca"),
    ("ginkgo biloba", "Ginkgo Biloba"),
    ("ginkgo", "Ginkgo Biloba"),
    ("valeriana", "Valerian Root"),
    ("manzanilla", "Chamomile"),
    ("cardo mariano", "Milk Thistle"),
    ("equinacea", "Echinacea"),
    ("sauco", "Elderberry"),
    ("palma enana", "Saw Palmetto"),
    ("saw palmetto", "Saw Palmetto"),
    ("extracto de semilla de uva", "Grape Seed Extract"),
    // Antioxidants and misc actives
    ("coenzima q10", "Coenzyme Q10"),
    ("coq10", "Coenzyme Q10"),
    ("acido alfa lipoico", "Alpha-Lipoic Acid"),
    ("quercetina", "Quercetin"),
    ("resveratrol", "Resveratrol"),
    ("luteina", "Lutein"),
    ("zeaxantina", "Zeaxanthin"),
    ("licopeno", "Lycopene"),
    ("astaxantina", "Astaxanthin"),
    ("berberina", "Berberine"),
    ("melatonina", "Melatonin"),
    ("cafeina", "Caffeine"),
    ("5 htp", "5-HTP"),
    ("gaba", "GABA"),
    ("acido hialuronico", "Hyaluronic Acid"),
    ("glucosamina", "Glucosamine"),
    ("condroitina", "Chondroitin"),
    ("msm", "MSM"),
    // Gut and whole-food
    ("probioticos", "Probiotics"),
    ("prebioticos", "Prebiotics"),
    ("fibra", "Fiber"),
    ("espirulina", "Spirulina"),
    ("chlorella", "Chlorella"),
    ("levadura de cerveza", "Brewer's Yeast"),
    ("jalea real", "Royal Jelly"),
    ("polen de abeja", "Bee Pollen"),
    ("propoleo", "Propolis"),
];

/// Immutable lookup table from cleaned query variants to canonical names.
pub struct Dictionary {
    entries: HashMap<String, String>,
    variants: HashMap<String, Vec<String>>,
}

impl Dictionary {
    /// Build the dictionary from the compiled-in table only.
    pub fn builtin() -> Self {
        let mut dict = Self {
            entries: HashMap::with_capacity(BUILTIN.len() * 2),
            variants: HashMap::new(),
        };
        for (variant, canonical) in BUILTIN {
            dict.add(variant, canonical);
        }
        dict
    }

    /// Build the dictionary from the compiled-in table plus a JSON overlay of
    /// the shape `{"variant": "Canonical Name", ...}`.
    ///
    /// Overlay entries are additive; an overlay key that collides with a
    /// builtin key wins, which lets deployments patch a bad mapping without
    /// a rebuild.
    pub fn with_overlay(path: &Path) -> Result<Self, NormalizeError> {
        let mut dict = Self::builtin();
        let raw = std::fs::read_to_string(path).map_err(|e| NormalizeError::DictionaryLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let overlay: HashMap<String, String> =
            serde_json::from_str(&raw).map_err(|e| NormalizeError::DictionaryLoad {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        for (variant, canonical) in &overlay {
            dict.add(variant, canonical);
        }
        Ok(dict)
    }

    fn add(&mut self, variant: &str, canonical: &str) {
        let key = clean(variant);
        if key.is_empty() {
            return;
        }
        self.entries.insert(key.clone(), canonical.to_string());
        // The canonical form must resolve to itself so normalization is
        // idempotent.
        self.entries
            .entry(clean(canonical))
            .or_insert_with(|| canonical.to_string());
        let variants = self.variants.entry(canonical.to_string()).or_default();
        if !variants.contains(&key) {
            variants.push(key);
        }
    }

    /// Exact lookup of a cleaned query.
    pub fn lookup(&self, cleaned: &str) -> Option<&str> {
        self.entries.get(cleaned).map(String::as_str)
    }

    /// All recorded variant spellings for a canonical name, used to
    /// invalidate the cache keys a newly discovered supplement may be hiding
    /// behind.
    pub fn variants_of(&self, canonical: &str) -> &[String] {
        self.variants
            .get(canonical)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate over every lookup key (variants plus canonical self-maps).
    /// The fuzzy matcher scans these.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of lookup keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical names known to the dictionary.
    pub fn canonicals(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_resolves_spanish_variants() {
        let dict = Dictionary::builtin();
        assert_eq!(dict.lookup("magnesio"), Some("Magnesium"));
        assert_eq!(
            dict.lookup("glicinato de magnesio"),
            Some("Magnesium Glycinate")
        );
        assert_eq!(dict.lookup("vitamina d"), Some("Vitamin D"));
    }

    #[test]
    fn canonical_forms_map_to_themselves() {
        let dict = Dictionary::builtin();
        assert_eq!(dict.lookup("magnesium"), Some("Magnesium"));
        assert_eq!(dict.lookup("vitamin d"), Some("Vitamin D"));
        assert_eq!(dict.lookup("omega-3"), Some("Omega-3"));
    }

    #[test]
    fn variants_of_lists_spanish_spellings() {
        let dict = Dictionary::builtin();
        let variants = dict.variants_of("Magnesium");
        assert!(variants.contains(&"magnesio".to_string()));
    }

    #[test]
    fn unknown_key_misses() {
        let dict = Dictionary::builtin();
        assert_eq!(dict.lookup("xyzzy"), None);
    }

    #[test]
    fn overlay_extends_and_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"fosfatidilserina": "Phosphatidylserine", "magnesio": "Magnesium Oxide"}}"#
        )
        .unwrap();

        let dict = Dictionary::with_overlay(file.path()).unwrap();
        assert_eq!(dict.lookup("fosfatidilserina"), Some("Phosphatidylserine"));
        // Overlay wins over the builtin mapping.
        assert_eq!(dict.lookup("magnesio"), Some("Magnesium Oxide"));
    }

    #[test]
    fn overlay_missing_file_errors() {
        let err = Dictionary::with_overlay(Path::new("/nonexistent/dict.json")).unwrap_err();
        assert!(matches!(err, NormalizeError::DictionaryLoad { .. }));
    }
}
