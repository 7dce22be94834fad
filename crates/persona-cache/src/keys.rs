//! Cache key derivation.

use persona_core::{AuctionRequest, FingerprintKey};
use sha2::{Digest, Sha256};

pub const PROFILE_PREFIX: &str = "profile";
pub const AUCTION_PREFIX: &str = "auction";

/// Key for a profile: one digest per identity component.
pub fn profile_key(key: &FingerprintKey) -> String {
    format!(
        "{}:{}:{}",
        PROFILE_PREFIX,
        component_digest(key.fingerprint_id()),
        component_digest(key.hardware_id())
    )
}

/// Key for an auction: a digest of the summary plus the country code.
pub fn auction_key(request: &AuctionRequest) -> String {
    format!(
        "{}:{}:{}",
        AUCTION_PREFIX,
        summary_digest(&request.profile_summary),
        component_digest(&request.country_code.trim().to_ascii_uppercase())
    )
}

/// First 8 bytes of the SHA-256 of a profile summary, hex encoded.
pub fn summary_digest(summary: &str) -> String {
    let hash = Sha256::digest(summary.trim().as_bytes());
    hex::encode(&hash[..8])
}

/// Full hex SHA-256 of a caller-supplied key component. The output never
/// contains `:`, so distinct components cannot share a slot.
pub fn component_digest(component: &str) -> String {
    hex::encode(Sha256::digest(component.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auction(summary: &str, code: &str) -> AuctionRequest {
        AuctionRequest {
            profile_summary: summary.to_string(),
            country: "Anywhere".to_string(),
            country_code: code.to_string(),
        }
    }

    #[test]
    fn test_profile_key_uses_both_ids() {
        let key = FingerprintKey::new("abc123", "hw-9").unwrap();
        assert_eq!(
            profile_key(&key),
            format!(
                "profile:{}:{}",
                component_digest("abc123"),
                component_digest("hw-9")
            )
        );
    }

    #[test]
    fn test_profile_key_separates_lookalike_identities() {
        let colon = FingerprintKey::new("a:b", "c").unwrap();
        let underscore = FingerprintKey::new("a_b", "c").unwrap();
        let shifted = FingerprintKey::new("a", "b:c").unwrap();

        assert_ne!(profile_key(&colon), profile_key(&underscore));
        assert_ne!(profile_key(&colon), profile_key(&shifted));
        assert_eq!(profile_key(&colon).split(':').count(), 3);
    }

    #[test]
    fn test_auction_key_is_deterministic() {
        let a = auction_key(&auction("Linux developer", "us"));
        let b = auction_key(&auction("Linux developer", "US"));
        assert_eq!(a, b);
        assert!(a.starts_with("auction:"));
        assert!(a.ends_with(&component_digest("US")));
        assert_eq!(a.split(':').nth(1).map(str::len), Some(16));
    }

    #[test]
    fn test_auction_key_varies_with_summary_and_country() {
        let base = auction_key(&auction("gamer", "DE"));
        assert_ne!(base, auction_key(&auction("designer", "DE")));
        assert_ne!(base, auction_key(&auction("gamer", "FR")));
    }

    #[test]
    fn test_component_digest_is_hex() {
        let digest = component_digest("my key*");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
