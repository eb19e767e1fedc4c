//! The seed catalog: the curated supplement set loaded by the bootstrap
//! migration.
//!
//! Grades and study counts are curated editorial values, not live PubMed
//! numbers; discovery keeps extending the catalog from real traffic after
//! bootstrap. Aliases carry the Spanish forms and common synonyms so the
//! embedding covers the vocabulary users actually type.

use vecstore::EvidenceGrade;

use crate::service::SearchService;
use searcher::{AdminError, UpsertMetadata};

pub struct SeedSupplement {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub category: &'static str,
    pub grade: EvidenceGrade,
    pub study_count: u32,
}

use EvidenceGrade::{A, B, C};

macro_rules! seed {
    ($name:literal, [$($alias:literal),*], $category:literal, $grade:expr, $count:literal) => {
        SeedSupplement {
            name: $name,
            aliases: &[$($alias),*],
            category: $category,
            grade: $grade,
            study_count: $count,
        }
    };
}

/// The bootstrap catalog, roughly seventy entries.
pub const SEED_SUPPLEMENTS: &[SeedSupplement] = &[
    // Vitamins
    seed!("Vitamin A", ["vitamina a", "retinol"], "vitamin", A, 5200),
    seed!("Vitamin B1", ["vitamina b1", "tiamina", "thiamine"], "vitamin", A, 1800),
    seed!("Vitamin B2", ["vitamina b2", "riboflavina", "riboflavin"], "vitamin", A, 1300),
    seed!("Vitamin B3", ["vitamina b3", "niacina", "niacin"], "vitamin", A, 2400),
    seed!("Vitamin B6", ["vitamina b6", "piridoxina"], "vitamin", A, 2100),
    seed!("Vitamin B12", ["vitamina b12", "cobalamina"], "vitamin", A, 3900),
    seed!("Vitamin C", ["vitamina c", "acido ascorbico"], "vitamin", A, 8700),
    seed!("Vitamin D", ["vitamina d"], "vitamin", A, 9600),
    seed!("Vitamin D3", ["vitamina d3", "colecalciferol"], "vitamin", A, 4100),
    seed!("Vitamin E", ["vitamina e", "tocoferol"], "vitamin", A, 5100),
    seed!("Vitamin K", ["vitamina k"], "vitamin", A, 1900),
    seed!("Vitamin K2", ["vitamina k2", "menaquinona"], "vitamin", B, 760),
    seed!("Biotin", ["biotina", "vitamina b7"], "vitamin", B, 540),
    seed!("Folic Acid", ["acido folico", "folato", "vitamina b9"], "vitamin", A, 6100),
    // Minerals
    seed!("Magnesium", ["magnesio"], "mineral", A, 4400),
    seed!("Magnesium Glycinate", ["glicinato de magnesio"], "mineral", B, 310),
    seed!("Magnesium Citrate", ["citrato de magnesio"], "mineral", B, 280),
    seed!("Calcium", ["calcio"], "mineral", A, 7800),
    seed!("Iron", ["hierro"], "mineral", A, 8900),
    seed!("Zinc", ["cinc"], "mineral", A, 5600),
    seed!("Potassium", ["potasio"], "mineral", A, 4700),
    seed!("Selenium", ["selenio"], "mineral", A, 2300),
    seed!("Copper", ["cobre"], "mineral", A, 1700),
    seed!("Manganese", ["manganeso"], "mineral", B, 620),
    seed!("Chromium", ["cromo"], "mineral", B, 810),
    seed!("Iodine", ["yodo"], "mineral", A, 2600),
    seed!("Boron", ["boro"], "mineral", C, 240),
    seed!("Electrolytes", ["electrolitos"], "mineral", B, 950),
    // Amino acids and performance
    seed!("Creatine", ["creatina"], "performance", A, 3200),
    seed!("Creatine Monohydrate", ["monohidrato de creatina"], "performance", A, 1400),
    seed!("L-Carnitine", ["carnitina", "l carnitina"], "performance", B, 1600),
    seed!("L-Theanine", ["teanina", "l teanina"], "nootropic", B, 390),
    seed!("L-Tyrosine", ["tirosina", "l tirosina"], "nootropic", B, 480),
    seed!("Glutamine", ["glutamina"], "performance", B, 2100),
    seed!("Arginine", ["arginina"], "performance", B, 2900),
    seed!("Taurine", ["taurina"], "performance", B, 1800),
    seed!("Tryptophan", ["triptofano"], "sleep", B, 1500),
    seed!("Beta-Alanine", ["beta alanina"], "performance", B, 420),
    seed!("BCAA", ["aminoacidos ramificados"], "performance", B, 980),
    seed!("HMB", ["hidroximetilbutirato"], "performance", C, 330),
    seed!("Whey Protein", ["proteina de suero"], "performance", A, 2700),
    seed!("Collagen", ["colageno"], "joint", B, 890),
    // Fatty acids
    seed!("Omega-3", ["omega 3", "acidos grasos omega 3"], "fatty-acid", A, 11200),
    seed!("Fish Oil", ["aceite de pescado"], "fatty-acid", A, 5400),
    seed!("Krill Oil", ["aceite de krill"], "fatty-acid", B, 260),
    seed!("Cod Liver Oil", ["aceite de higado de bacalao"], "fatty-acid", B, 410),
    // Botanicals
    seed!("Turmeric", ["curcuma"], "botanical", B, 3100),
    seed!("Curcumin", ["curcumina"], "botanical", A, 4600),
    seed!("Ginger", ["jengibre"], "botanical", A, 2800),
    seed!("Garlic", ["ajo"], "botanical", A, 3400),
    seed!("Green Tea Extract", ["te verde", "extracto de te verde"], "botanical", A, 3800),
    seed!("Ashwagandha", ["withania somnifera"], "adaptogen", B, 720),
    seed!("Rhodiola Rosea", ["rhodiola", "raiz artica"], "adaptogen", B, 380),
    seed!("Ginseng", ["panax ginseng"], "adaptogen", A, 2200),
    seed!("Maca", ["maca andina"], "adaptogen", C, 290),
    seed!("Ginkgo Biloba", ["ginkgo"], "botanical", A, 2500),
    seed!("Valerian Root", ["valeriana"], "sleep", B, 640),
    seed!("Chamomile", ["manzanilla"], "sleep", B, 880),
    seed!("Milk Thistle", ["cardo mariano", "silimarina"], "botanical", B, 1100),
    seed!("Echinacea", ["equinacea"], "immune", B, 940),
    seed!("Elderberry", ["sauco"], "immune", B, 330),
    seed!("Saw Palmetto", ["palma enana"], "botanical", B, 560),
    seed!("Grape Seed Extract", ["extracto de semilla de uva"], "botanical", B, 690),
    // Antioxidants and actives
    seed!("Coenzyme Q10", ["coenzima q10", "ubiquinona"], "antioxidant", A, 3300),
    seed!("Alpha-Lipoic Acid", ["acido alfa lipoico"], "antioxidant", B, 1300),
    seed!("Quercetin", ["quercetina"], "antioxidant", B, 1700),
    seed!("Resveratrol", ["trans resveratrol"], "antioxidant", A, 3600),
    seed!("Lutein", ["luteina"], "eye", A, 1400),
    seed!("Astaxanthin", ["astaxantina"], "antioxidant", B, 650),
    seed!("Berberine", ["berberina"], "metabolic", B, 1200),
    seed!("Melatonin", ["melatonina"], "sleep", A, 5800),
    seed!("Caffeine", ["cafeina"], "stimulant", A, 9700),
    seed!("5-HTP", ["5 hidroxitriptofano"], "mood", B, 310),
    seed!("Hyaluronic Acid", ["acido hialuronico"], "joint", B, 1600),
    seed!("Glucosamine", ["glucosamina"], "joint", A, 1800),
    seed!("Chondroitin", ["condroitina"], "joint", A, 1200),
    seed!("MSM", ["metilsulfonilmetano"], "joint", C, 260),
    // Gut and whole-food
    seed!("Probiotics", ["probioticos"], "gut", A, 9200),
    seed!("Spirulina", ["espirulina"], "whole-food", B, 1100),
    seed!("Chlorella", ["clorela"], "whole-food", C, 420),
];

/// Insert the seed catalog through the admin path. Idempotent: rows that
/// already exist are skipped. Returns how many rows this call created.
pub async fn bootstrap_seeds(service: &SearchService) -> Result<usize, AdminError> {
    let mut created = 0usize;
    for seed in SEED_SUPPLEMENTS {
        let outcome = service
            .searcher()
            .upsert_supplement(
                seed.name,
                seed.aliases.iter().map(|s| s.to_string()).collect(),
                UpsertMetadata {
                    evidence_grade: seed.grade,
                    study_count: seed.study_count,
                    category: Some(seed.category.to_string()),
                },
            )
            .await?;
        if outcome.created {
            created += 1;
        }
    }
    tracing::info!(
        created,
        total = SEED_SUPPLEMENTS.len(),
        "seed bootstrap complete"
    );
    Ok(created)
}
