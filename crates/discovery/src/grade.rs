//! Evidence grading from PubMed study counts.

use serde::{Deserialize, Serialize};
use vecstore::EvidenceGrade;

/// Study-count thresholds, configurable but defaulting to the product rules:
/// ≥21 strong (A), ≥5 moderate (C), ≥1 low (E), 0 rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceThresholds {
    #[serde(default = "default_strong")]
    pub strong: u32,
    #[serde(default = "default_moderate")]
    pub moderate: u32,
    #[serde(default = "default_low")]
    pub low: u32,
}

impl Default for EvidenceThresholds {
    fn default() -> Self {
        Self {
            strong: default_strong(),
            moderate: default_moderate(),
            low: default_low(),
        }
    }
}

fn default_strong() -> u32 {
    21
}

fn default_moderate() -> u32 {
    5
}

fn default_low() -> u32 {
    1
}

/// Grading verdict for one study count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grading {
    /// Zero studies: no supplement is materialized.
    NoEvidence,
    Graded(EvidenceGrade),
}

pub fn grade(study_count: u32, thresholds: &EvidenceThresholds) -> Grading {
    if study_count >= thresholds.strong {
        Grading::Graded(EvidenceGrade::A)
    } else if study_count >= thresholds.moderate {
        Grading::Graded(EvidenceGrade::C)
    } else if study_count >= thresholds.low {
        Grading::Graded(EvidenceGrade::E)
    } else {
        Grading::NoEvidence
    }
}
