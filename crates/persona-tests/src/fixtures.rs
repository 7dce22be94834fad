//! Test fixtures for creating sample data.

use persona_core::{AuctionRequest, FingerprintRecord, ScreenInfo};
use serde_json::{Value, json};

/// Factory for fingerprint records.
pub struct FingerprintFixture;

impl FingerprintFixture {
    /// A Linux desktop with a discrete GPU and developer fonts.
    pub fn developer(id: &str) -> FingerprintRecord {
        FingerprintRecord {
            fingerprint_id: format!("fp-{}", id),
            hardware_id: format!("hw-{}", id),
            user_agent: Some(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/126.0".to_string(),
            ),
            platform: Some("Linux x86_64".to_string()),
            languages: vec!["en-US".to_string(), "de-DE".to_string()],
            timezone: Some("Europe/Berlin".to_string()),
            screen: Some(ScreenInfo {
                width: 2560,
                height: 1440,
                color_depth: Some(24),
                pixel_ratio: Some(1.0),
            }),
            hardware_concurrency: Some(16),
            device_memory: Some(8.0),
            gpu_vendor: Some("NVIDIA Corporation".to_string()),
            gpu_renderer: Some("NVIDIA GeForce RTX 4080".to_string()),
            max_touch_points: Some(0),
            fonts: vec!["Fira Code".to_string(), "JetBrains Mono".to_string()],
            do_not_track: Some(true),
            ad_blocker: Some(true),
            cookies_enabled: Some(true),
            webgpu: Some(true),
            wasm: Some(true),
            ..Default::default()
        }
    }

    /// A phone with nothing but its identity and a touch screen.
    pub fn mobile(id: &str) -> FingerprintRecord {
        FingerprintRecord {
            fingerprint_id: format!("fp-{}", id),
            hardware_id: format!("hw-{}", id),
            platform: Some("iPhone".to_string()),
            max_touch_points: Some(5),
            screen: Some(ScreenInfo {
                width: 390,
                height: 844,
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Factory for auction requests.
pub struct AuctionFixture;

impl AuctionFixture {
    pub fn request(summary: &str, country_code: &str) -> AuctionRequest {
        AuctionRequest {
            profile_summary: summary.to_string(),
            country: country_name(country_code).to_string(),
            country_code: country_code.to_string(),
        }
    }

    pub fn developer_in_germany() -> AuctionRequest {
        Self::request("Senior Rust developer and PC gamer with a premium desktop", "DE")
    }
}

fn country_name(code: &str) -> &'static str {
    match code {
        "DE" => "Germany",
        "US" => "United States",
        "BR" => "Brazil",
        _ => "Unknown",
    }
}

/// Model output a provider might return for a profile request.
pub fn profile_completion() -> Value {
    json!({
        "isDeveloper": true,
        "isGamer": true,
        "isDesigner": false,
        "isPowerUser": true,
        "isPrivacyConscious": true,
        "isMobile": false,
        "developerScore": 92,
        "gamerScore": 71,
        "designerScore": 12,
        "techSavviness": 95,
        "privacyScore": 80,
        "confidence": 85,
        "deviceTier": "premium",
        "incomeLevel": "high",
        "ageRange": "25-34",
        "interests": ["rust", "gaming", "linux"],
        "summary": "Privacy-minded developer on a high-end Linux workstation."
    })
}

/// Model output a provider might return for an auction request.
pub fn auction_completion() -> Value {
    json!({
        "bids": [
            { "bidder": "JetBrains Ads", "category": "Developer Tools", "cpm": 9.5 },
            { "bidder": "Steam", "category": "Gaming", "cpm": 6.25 },
            { "bidder": "Generic DSP", "category": "Retail", "cpm": 1.1 }
        ],
        "valueFactors": [
            { "factor": "Developer audience", "impact": "positive", "weight": 80 }
        ]
    })
}

/// Wrap model output in a chat-completions response body.
pub fn chat_completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}
