//! Wire-format contract tests for persona-core types.

use persona_core::*;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_profile_wire_shape() {
    let mut profile = ProfileResult::with_defaults(true);
    profile.developer_score = 88;
    profile.device_tier = DeviceTier::Premium;
    profile.income_level = IncomeLevel::VeryHigh;
    profile.interests = vec!["rust".to_string()];

    let value = serde_json::to_value(&profile).expect("serialize");
    assert_eq!(
        value,
        json!({
            "isDeveloper": true,
            "isGamer": false,
            "isDesigner": false,
            "isPowerUser": false,
            "isPrivacyConscious": false,
            "isMobile": false,
            "developerScore": 88,
            "gamerScore": 0,
            "designerScore": 0,
            "techSavviness": 0,
            "privacyScore": 0,
            "confidence": 50,
            "deviceTier": "premium",
            "incomeLevel": "very-high",
            "ageRange": "25-34",
            "interests": ["rust"],
            "summary": ""
        })
    );
}

#[test]
fn test_auction_wire_shape() {
    let result = AuctionResult {
        bids: vec![BidRecord {
            bidder: "Northwind Ads".to_string(),
            category: "developer-tools".to_string(),
            cpm: 4.25,
            won: true,
        }],
        value_factors: vec![FactorRecord {
            factor: "Tier-1 market".to_string(),
            impact: FactorImpact::Positive,
            weight: 70,
        }],
    };

    let value = serde_json::to_value(&result).expect("serialize");
    assert_eq!(value["valueFactors"][0]["impact"], "positive");
    assert_eq!(value["bids"][0]["cpm"], 4.25);
}

#[test]
fn test_fingerprint_record_geo_enrichment() {
    let record: FingerprintRecord = serde_json::from_value(json!({
        "fingerprintId": "fp",
        "hardwareId": "hw",
        "hardwareConcurrency": 16,
        "geo": { "country": "Japan", "countryCode": "JP" }
    }))
    .expect("deserialize");

    assert_eq!(record.hardware_concurrency, Some(16));
    let geo = record.geo.expect("geo");
    assert_eq!(geo.country_code.as_deref(), Some("JP"));
    assert_eq!(geo.city, None);
}

#[test]
fn test_source_tags() {
    assert_eq!(serde_json::to_value(Source::Cache).unwrap(), json!("cache"));
    assert_eq!(serde_json::to_value(Source::Ai).unwrap(), json!("ai"));
    assert_eq!(Source::Fallback.to_string(), "fallback");
}
