//! Prompts sent to the inference providers.

use crate::providers::Prompt;
use persona_core::{AuctionRequest, FingerprintRecord};

const PROFILE_SYSTEM: &str = r#"You profile website visitors from browser fingerprint signals.
Reply with a single JSON object and nothing else, using exactly these keys:
{
  "isDeveloper": boolean,
  "isGamer": boolean,
  "isDesigner": boolean,
  "isPowerUser": boolean,
  "isPrivacyConscious": boolean,
  "isMobile": boolean,
  "developerScore": integer 0-100,
  "gamerScore": integer 0-100,
  "designerScore": integer 0-100,
  "techSavviness": integer 0-100,
  "privacyScore": integer 0-100,
  "confidence": integer 0-100,
  "deviceTier": "budget" | "mid" | "high" | "premium",
  "incomeLevel": "low" | "medium" | "high" | "very-high",
  "ageRange": string such as "25-34",
  "interests": array of at most 10 short strings,
  "summary": one or two sentences, at most 500 characters
}"#;

const AUCTION_SYSTEM: &str = r#"You simulate a real-time-bidding ad auction for one impression.
Reply with a single JSON object and nothing else:
{
  "bids": [
    { "bidder": string, "category": string, "cpm": number in USD between 0 and 50 }
  ],
  "valueFactors": [
    { "factor": string, "impact": "positive" | "negative" | "neutral", "weight": integer 0-100 }
  ]
}
Return between 4 and 12 bids from realistic ad networks and at most 8 value factors."#;

/// Prompt for a visitor profile. Only declared fingerprint fields are sent.
pub fn profile_prompt(record: &FingerprintRecord) -> Prompt {
    let mut signals = serde_json::to_value(record).unwrap_or_default();
    if let Some(map) = signals.as_object_mut() {
        map.remove("fingerprintId");
        map.remove("hardwareId");
        map.retain(|_, value| !value.is_null());
    }

    Prompt {
        system: PROFILE_SYSTEM.to_string(),
        user: format!("Fingerprint signals:\n{}", signals),
    }
}

/// Prompt for an auction simulation.
pub fn auction_prompt(request: &AuctionRequest) -> Prompt {
    Prompt {
        system: AUCTION_SYSTEM.to_string(),
        user: format!(
            "Visitor profile: {}\nCountry: {} ({})",
            request.profile_summary, request.country, request.country_code
        ),
    }
}
