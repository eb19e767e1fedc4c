//! The primary entity: a supplement row with its embedding and evidence
//! metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bump whenever the on-disk row layout changes.
pub const ROW_SCHEMA_VERSION: u16 = 1;

/// Ordinal rating of the supporting literature volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EvidenceGrade {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl std::fmt::Display for EvidenceGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EvidenceGrade::A => "A",
            EvidenceGrade::B => "B",
            EvidenceGrade::C => "C",
            EvidenceGrade::D => "D",
            EvidenceGrade::E => "E",
            EvidenceGrade::F => "F",
        };
        f.write_str(label)
    }
}

/// Scientific metadata attached to a supplement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplementMetadata {
    pub evidence_grade: EvidenceGrade,
    /// PubMed study count observed when the row was created/refreshed.
    pub study_count: u32,
    pub category: Option<String>,
    /// When this supplement first entered the system.
    pub first_seen: DateTime<Utc>,
}

/// One supplement row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplement {
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    /// Opaque stable identifier (UUID string in practice).
    pub id: String,
    /// Canonical English form, unique across the store.
    pub canonical_name: String,
    /// Spanish forms, scientific names, common misspellings.
    pub aliases: Vec<String>,
    /// 384-d unit vector generated from `canonical_name` joined with aliases.
    pub embedding: Vec<f32>,
    pub metadata: SupplementMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const fn default_schema_version() -> u16 {
    ROW_SCHEMA_VERSION
}

impl Supplement {
    /// The text the embedding is generated from: canonical name joined with
    /// every alias. Keeping this in one place means the admin upsert path
    /// and the discovery worker cannot drift apart.
    pub fn embedding_text(canonical_name: &str, aliases: &[String]) -> String {
        if aliases.is_empty() {
            return canonical_name.to_string();
        }
        let mut text = String::with_capacity(
            canonical_name.len() + aliases.iter().map(|a| a.len() + 2).sum::<usize>(),
        );
        text.push_str(canonical_name);
        for alias in aliases {
            text.push_str(", ");
            text.push_str(alias);
        }
        text
    }
}
