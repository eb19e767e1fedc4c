use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which layer produced or served a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    L1,
    L2,
    Vector,
    None,
}

impl std::fmt::Display for SourceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SourceTier::L1 => "l1",
            SourceTier::L2 => "l2",
            SourceTier::Vector => "vector",
            SourceTier::None => "none",
        };
        f.write_str(label)
    }
}

/// One cached search result. Created by write-through after a live search,
/// removed by invalidation or TTL expiry, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub supplement_id: String,
    pub similarity: f32,
    /// Tier that originally produced the result (always `vector` today).
    pub source_tier: SourceTier,
    pub cached_at: DateTime<Utc>,
    pub ttl_expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether the entry may still be served at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.ttl_expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn liveness_is_strict() {
        let cached_at = Utc::now();
        let entry = CacheEntry {
            supplement_id: "s1".into(),
            similarity: 0.92,
            source_tier: SourceTier::Vector,
            cached_at,
            ttl_expires_at: cached_at + Duration::days(7),
        };
        assert!(entry.is_live(cached_at));
        assert!(entry.is_live(cached_at + Duration::days(7) - Duration::seconds(1)));
        // At and after the expiry instant the entry must not be served.
        assert!(!entry.is_live(cached_at + Duration::days(7)));
        assert!(!entry.is_live(cached_at + Duration::days(7) + Duration::seconds(1)));
    }

    #[test]
    fn tier_labels() {
        assert_eq!(SourceTier::L1.to_string(), "l1");
        assert_eq!(SourceTier::Vector.to_string(), "vector");
        assert_eq!(
            serde_json::to_string(&SourceTier::L2).unwrap(),
            "\"l2\""
        );
    }
}
