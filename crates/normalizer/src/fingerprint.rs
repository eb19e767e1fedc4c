//! Cache fingerprints: truncated SHA-256 of the lowercased canonical query.
//!
//! The full 256-bit digest is overkill for a cache key; the leading 128 bits
//! keep collisions out of practical reach while halving key size in the L2
//! table. Fingerprints are plain value types: `Copy`, ordered, hashable, and
//! hex-printable for logs.

use sha2::{Digest, Sha256};

/// 128-bit cache key derived from a canonical query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    /// Fingerprint a canonical query. Input is lowercased before hashing so
    /// the key is insensitive to the title-casing of canonical names.
    pub fn of(canonical: &str) -> Self {
        let digest = Sha256::digest(canonical.to_lowercase().as_bytes());
        let mut truncated = [0u8; 16];
        truncated.copy_from_slice(&digest[..16]);
        Self(truncated)
    }

    /// Raw key bytes for storage backends.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Rebuild a fingerprint from stored bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Lowercase hex form used in logs and admin output.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive() {
        assert_eq!(Fingerprint::of("Vitamin D"), Fingerprint::of("vitamin d"));
        assert_eq!(Fingerprint::of("MAGNESIUM"), Fingerprint::of("magnesium"));
    }

    #[test]
    fn distinct_inputs_differ() {
        assert_ne!(Fingerprint::of("Vitamin D"), Fingerprint::of("Vitamin E"));
    }

    #[test]
    fn hex_is_32_chars() {
        let fp = Fingerprint::of("Magnesium");
        assert_eq!(fp.to_hex().len(), 32);
        assert_eq!(format!("{fp}"), fp.to_hex());
    }

    #[test]
    fn byte_roundtrip() {
        let fp = Fingerprint::of("Omega-3");
        let restored = Fingerprint::from_bytes(*fp.as_bytes());
        assert_eq!(fp, restored);
    }

    #[test]
    fn stable_across_calls() {
        assert_eq!(Fingerprint::of("Creatine"), Fingerprint::of("Creatine"));
    }
}
