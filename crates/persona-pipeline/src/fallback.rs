//! Deterministic local computations.
//!
//! Used when no provider is configured, the caller is over budget, or every
//! provider failed. Pure functions of the request: no I/O, no clock, no
//! randomness.

use persona_core::profile::clamp_score;
use persona_core::{
    AuctionRequest, AuctionResult, BidRecord, DeviceTier, FactorImpact, FactorRecord,
    FingerprintRecord, IncomeLevel, ProfileResult,
};
use sha2::{Digest, Sha256};

const DEV_FONTS: &[&str] = &[
    "fira code",
    "jetbrains mono",
    "source code pro",
    "cascadia code",
    "hack",
    "inconsolata",
    "menlo",
    "consolas",
    "ubuntu mono",
];

const DESIGN_FONTS: &[&str] = &[
    "helvetica neue",
    "futura",
    "avenir",
    "gill sans",
    "didot",
    "garamond",
    "baskerville",
    "optima",
];

const GAMING_GPUS: &[&str] = &["geforce", "rtx", "gtx", "radeon rx", "radeon pro", "arc a"];

const TIER1_COUNTRIES: &[&str] = &[
    "US", "GB", "CA", "AU", "DE", "CH", "NO", "SE", "DK", "NL",
];

const TIER2_COUNTRIES: &[&str] = &[
    "FR", "JP", "KR", "IE", "AT", "BE", "FI", "NZ", "SG", "IL", "IT", "ES",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarketTier {
    One,
    Two,
    Three,
}

fn market_tier(country_code: Option<&str>) -> MarketTier {
    let code = country_code.unwrap_or_default().trim().to_ascii_uppercase();
    if TIER1_COUNTRIES.contains(&code.as_str()) {
        MarketTier::One
    } else if TIER2_COUNTRIES.contains(&code.as_str()) {
        MarketTier::Two
    } else {
        MarketTier::Three
    }
}

fn count_matches(haystack: &[String], needles: &[&str]) -> usize {
    haystack
        .iter()
        .filter(|item| {
            let item = item.to_lowercase();
            needles.iter().any(|needle| item.contains(needle))
        })
        .count()
}

/// Profile from the declared fingerprint fields.
pub fn fallback_profile(record: &FingerprintRecord) -> ProfileResult {
    let platform = record.platform_lower();
    let agent = record.user_agent.as_deref().unwrap_or_default().to_lowercase();
    let gpu = record.gpu_lower();
    let cores = record.hardware_concurrency.unwrap_or(0);
    let memory = record.device_memory.unwrap_or(0.0);
    let screen = record.screen.unwrap_or_default();
    let pixel_ratio = screen.pixel_ratio.unwrap_or(1.0);
    let country_code = record.geo.as_ref().and_then(|g| g.country_code.as_deref());

    let is_linux = platform.contains("linux") && !platform.contains("android");
    let is_mac = platform.contains("mac");
    let is_windows = platform.contains("win");
    let is_mobile = (record.is_touch_device()
        && ["android", "iphone", "ipad", "ios"]
            .iter()
            .any(|p| platform.contains(p) || agent.contains(p)))
        || agent.contains("mobi");
    let mut signals = 0u32;

    let mut developer = 0.0;
    if is_linux {
        developer += 30.0;
        signals += 1;
    }
    if is_mac {
        developer += 15.0;
    }
    let dev_fonts = count_matches(&record.fonts, DEV_FONTS);
    if dev_fonts > 0 {
        developer += (dev_fonts as f64 * 8.0).min(24.0);
        signals += 1;
    }
    if cores >= 8 {
        developer += 10.0;
    }
    if cores >= 16 {
        developer += 5.0;
    }
    if memory >= 16.0 {
        developer += 10.0;
    }
    if record.webgpu == Some(true) {
        developer += 5.0;
    }
    if record.wasm == Some(true) {
        developer += 3.0;
    }
    if screen.width >= 2560 {
        developer += 5.0;
    }

    let mut gamer = 0.0;
    if GAMING_GPUS.iter().any(|g| gpu.contains(g)) {
        gamer += 35.0;
        signals += 1;
    }
    if gpu.contains("rtx") {
        gamer += 15.0;
    }
    if is_windows {
        gamer += 10.0;
    }
    if cores >= 8 {
        gamer += 10.0;
    }
    if memory >= 16.0 {
        gamer += 10.0;
    }
    if screen.width >= 2560 || screen.height >= 1440 {
        gamer += 5.0;
    }

    let mut designer = 0.0;
    if is_mac {
        designer += 25.0;
        signals += 1;
    }
    if pixel_ratio >= 2.0 {
        designer += 15.0;
    }
    let design_fonts = count_matches(&record.fonts, DESIGN_FONTS);
    if design_fonts > 0 {
        designer += (design_fonts as f64 * 8.0).min(24.0);
        signals += 1;
    }
    if screen.width >= 2560 {
        designer += 10.0;
    }
    if screen.color_depth.unwrap_or(24) >= 30 {
        designer += 15.0;
    }

    let mut privacy = 0.0;
    if record.do_not_track == Some(true) {
        privacy += 30.0;
        signals += 1;
    }
    if record.ad_blocker == Some(true) {
        privacy += 35.0;
        signals += 1;
    }
    if record.cookies_enabled == Some(false) {
        privacy += 20.0;
    }
    if agent.contains("firefox") {
        privacy += 10.0;
    }
    if record.fonts.is_empty() && record.user_agent.is_some() {
        privacy += 10.0;
    }

    let developer_score = clamp_score(developer);
    let gamer_score = clamp_score(gamer);
    let designer_score = clamp_score(designer);
    let privacy_score = clamp_score(privacy);

    let mut tech = developer * 0.5 + gamer * 0.2 + privacy * 0.3;
    if record.webgpu == Some(true) {
        tech += 10.0;
    }
    if cores >= 12 {
        tech += 10.0;
    }
    let tech_savviness = clamp_score(tech);

    let device_tier = device_tier(record, cores, memory);
    let income_level = income_level(device_tier, market_tier(country_code));

    let mut profile = ProfileResult::with_defaults(developer_score >= 50);
    profile.is_gamer = gamer_score >= 50;
    profile.is_designer = designer_score >= 50;
    profile.is_privacy_conscious = privacy_score >= 50;
    profile.is_mobile = is_mobile;
    profile.is_power_user = tech_savviness >= 60 || cores >= 12;
    profile.developer_score = developer_score;
    profile.gamer_score = gamer_score;
    profile.designer_score = designer_score;
    profile.tech_savviness = tech_savviness;
    profile.privacy_score = privacy_score;
    profile.confidence = (30 + signals * 5).min(75) as u8;
    profile.device_tier = device_tier;
    profile.income_level = income_level;
    profile.age_range = age_range(&profile).to_string();
    profile.interests = interests(&profile);
    profile.summary = summary(&profile, record);
    profile.bounded()
}

fn device_tier(record: &FingerprintRecord, cores: u32, memory: f64) -> DeviceTier {
    let gpu = record.gpu_lower();
    let apple_silicon = gpu.contains("apple m");
    if (memory >= 16.0 && cores >= 12) || (apple_silicon && memory >= 8.0 && cores >= 10) {
        DeviceTier::Premium
    } else if memory >= 8.0 && cores >= 8 {
        DeviceTier::High
    } else if (memory > 0.0 && memory <= 2.0) || (cores > 0 && cores <= 2) {
        DeviceTier::Budget
    } else {
        DeviceTier::Mid
    }
}

fn income_level(tier: DeviceTier, market: MarketTier) -> IncomeLevel {
    match (tier, market) {
        (DeviceTier::Premium, MarketTier::One) => IncomeLevel::VeryHigh,
        (DeviceTier::Premium, _) | (DeviceTier::High, MarketTier::One) => IncomeLevel::High,
        (DeviceTier::Budget, _) => IncomeLevel::Low,
        (DeviceTier::Mid, MarketTier::Three) => IncomeLevel::Low,
        _ => IncomeLevel::Medium,
    }
}

fn age_range(profile: &ProfileResult) -> &'static str {
    if profile.is_gamer && !profile.is_developer {
        "18-24"
    } else if profile.is_privacy_conscious && !profile.is_developer {
        "35-44"
    } else {
        persona_core::profile::DEFAULT_AGE_RANGE
    }
}

fn interests(profile: &ProfileResult) -> Vec<String> {
    let mut interests: Vec<&str> = Vec::new();
    if profile.is_developer {
        interests.extend(["programming", "open source", "developer tools"]);
    }
    if profile.is_gamer {
        interests.extend(["gaming", "esports", "pc hardware"]);
    }
    if profile.is_designer {
        interests.extend(["design", "photography", "typography"]);
    }
    if profile.is_privacy_conscious {
        interests.extend(["privacy", "security"]);
    }
    if profile.is_mobile {
        interests.push("mobile apps");
    }
    if profile.is_power_user {
        interests.push("technology");
    }
    if interests.is_empty() {
        interests.extend(["technology", "news"]);
    }
    interests.into_iter().map(str::to_string).collect()
}

fn summary(profile: &ProfileResult, record: &FingerprintRecord) -> String {
    let mut traits = Vec::new();
    if profile.is_developer {
        traits.push("developer");
    }
    if profile.is_gamer {
        traits.push("gamer");
    }
    if profile.is_designer {
        traits.push("designer");
    }
    if profile.is_privacy_conscious {
        traits.push("privacy-conscious user");
    }
    let persona = match traits.as_slice() {
        [] => "general audience visitor".to_string(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    };

    let device = match profile.device_tier {
        DeviceTier::Budget => "budget",
        DeviceTier::Mid => "mid-range",
        DeviceTier::High => "high-end",
        DeviceTier::Premium => "premium",
    };
    let form = if profile.is_mobile { "mobile device" } else { "device" };

    let mut summary = format!("Likely {} on a {} {}", persona, device, form);
    if let Some(country) = record.geo.as_ref().and_then(|g| g.country.as_deref()) {
        summary.push_str(" in ");
        summary.push_str(country);
    }
    summary.push('.');
    summary
}

/// Bidder roster with the category each one buys for.
const BIDDERS: &[(&str, &str)] = &[
    ("Google Ads", "search"),
    ("The Trade Desk", "programmatic"),
    ("Amazon DSP", "retail"),
    ("Criteo", "retargeting"),
    ("Meta Audience Network", "social"),
    ("Microsoft Advertising", "search"),
    ("AppLovin", "mobile"),
    ("Unity Ads", "gaming"),
];

/// Summary keywords that move the price, with the bidder category they favour.
const KEYWORDS: &[(&[&str], f64, &str, &str)] = &[
    (&["developer", "engineer", "programmer"], 1.6, "Developer audience", "programmatic"),
    (&["gamer", "gaming"], 1.3, "Gaming audience", "gaming"),
    (&["designer", "creative"], 1.25, "Creative professional", "social"),
    (&["premium", "high-end", "flagship"], 1.5, "Premium hardware", "retail"),
    (&["power user"], 1.2, "Power user", "search"),
    (&["mobile"], 0.9, "Mobile inventory", "mobile"),
    (&["privacy", "ad blocker", "ad-blocker"], 0.75, "Privacy tools present", "retargeting"),
    (&["budget", "low-end"], 0.7, "Budget hardware", "retail"),
];

/// Auction from the summary and country.
pub fn fallback_auction(request: &AuctionRequest) -> AuctionResult {
    let summary = request.profile_summary.to_lowercase();
    let market = market_tier(Some(request.country_code.as_str()));

    let (base, market_factor) = match market {
        MarketTier::One => (4.0, ("Tier-1 market", FactorImpact::Positive, 80)),
        MarketTier::Two => (2.5, ("Tier-2 market", FactorImpact::Neutral, 50)),
        MarketTier::Three => (1.0, ("Emerging market", FactorImpact::Negative, 30)),
    };

    let mut value_factors = vec![FactorRecord {
        factor: market_factor.0.to_string(),
        impact: market_factor.1,
        weight: market_factor.2,
    }];
    let mut multiplier = 1.0;
    let mut favoured: Vec<&str> = Vec::new();

    for (words, factor, label, category) in KEYWORDS {
        if words.iter().any(|w| summary.contains(w)) {
            multiplier *= factor;
            favoured.push(*category);
            value_factors.push(FactorRecord {
                factor: label.to_string(),
                impact: if *factor >= 1.0 {
                    FactorImpact::Positive
                } else {
                    FactorImpact::Negative
                },
                weight: clamp_score((factor - 1.0).abs() * 100.0 + 20.0),
            });
        }
    }

    let bids = BIDDERS
        .iter()
        .map(|(bidder, category)| {
            let affinity = if favoured.contains(category) { 1.2 } else { 1.0 };
            let cpm = base * multiplier * affinity * spread(request, bidder);
            BidRecord {
                bidder: bidder.to_string(),
                category: category.to_string(),
                cpm,
                won: false,
            }
        })
        .collect();

    AuctionResult {
        bids,
        value_factors,
    }
    .settled()
}

/// Per-bidder multiplier in `[0.7, 1.3]` from a SHA-256 of the request.
fn spread(request: &AuctionRequest, bidder: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(request.profile_summary.as_bytes());
    hasher.update([0]);
    hasher.update(request.country_code.to_ascii_uppercase().as_bytes());
    hasher.update([0]);
    hasher.update(bidder.as_bytes());
    let digest = hasher.finalize();
    let sample = u16::from_be_bytes([digest[0], digest[1]]) as f64 / u16::MAX as f64;
    0.7 + sample * 0.6
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_core::fingerprint::ScreenInfo;
    use persona_core::GeoEnrichment;

    fn developer_record() -> FingerprintRecord {
        FingerprintRecord {
            fingerprint_id: "fp".to_string(),
            hardware_id: "hw".to_string(),
            platform: Some("Linux x86_64".to_string()),
            fonts: vec!["Fira Code".to_string(), "JetBrains Mono".to_string()],
            hardware_concurrency: Some(16),
            device_memory: Some(32.0),
            gpu_vendor: Some("NVIDIA Corporation".to_string()),
            gpu_renderer: Some("NVIDIA GeForce RTX 4080".to_string()),
            webgpu: Some(true),
            screen: Some(ScreenInfo {
                width: 3840,
                height: 2160,
                color_depth: Some(24),
                pixel_ratio: Some(1.0),
            }),
            geo: Some(GeoEnrichment {
                country: Some("Germany".to_string()),
                country_code: Some("DE".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn auction(summary: &str, code: &str) -> AuctionRequest {
        AuctionRequest {
            profile_summary: summary.to_string(),
            country: "Somewhere".to_string(),
            country_code: code.to_string(),
        }
    }

    #[test]
    fn test_developer_workstation() {
        let profile = fallback_profile(&developer_record());
        assert!(profile.is_developer);
        assert!(profile.is_gamer);
        assert!(profile.is_power_user);
        assert_eq!(profile.device_tier, DeviceTier::Premium);
        assert_eq!(profile.income_level, IncomeLevel::VeryHigh);
        assert!(profile.interests.iter().any(|i| i == "programming"));
        assert!(profile.summary.ends_with("in Germany."));
    }

    #[test]
    fn test_empty_record_is_fully_populated() {
        let profile = fallback_profile(&FingerprintRecord::default());
        assert!(!profile.is_developer);
        assert_eq!(profile.device_tier, DeviceTier::Mid);
        assert_eq!(profile.age_range, "25-34");
        assert!(!profile.interests.is_empty());
        assert!(!profile.summary.is_empty());
        assert!(profile.confidence <= 100);
    }

    #[test]
    fn test_privacy_signals() {
        let record = FingerprintRecord {
            do_not_track: Some(true),
            ad_blocker: Some(true),
            user_agent: Some("Mozilla/5.0 (X11; rv:128.0) Gecko Firefox/128.0".to_string()),
            ..Default::default()
        };
        let profile = fallback_profile(&record);
        assert!(profile.is_privacy_conscious);
        assert!(profile.privacy_score >= 75);
    }

    #[test]
    fn test_mobile_detection() {
        let record = FingerprintRecord {
            platform: Some("iPhone".to_string()),
            max_touch_points: Some(5),
            ..Default::default()
        };
        assert!(fallback_profile(&record).is_mobile);
    }

    #[test]
    fn test_profile_is_deterministic() {
        let a = serde_json::to_string(&fallback_profile(&developer_record())).unwrap();
        let b = serde_json::to_string(&fallback_profile(&developer_record())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_auction_is_deterministic_and_settled() {
        let request = auction("Linux developer with a premium workstation", "US");
        let a = fallback_auction(&request);
        let b = fallback_auction(&request);
        assert_eq!(a, b);
        assert_eq!(a.bids.len(), BIDDERS.len());
        assert_eq!(a.bids.iter().filter(|b| b.won).count(), 1);
        assert!(a.bids.windows(2).all(|w| w[0].cpm >= w[1].cpm));
        assert!(a.bids.iter().all(|b| (0.0..=50.0).contains(&b.cpm)));
    }

    #[test]
    fn test_auction_prices_follow_market_and_keywords() {
        let top = |r: &AuctionResult| r.winning_bid().map(|b| b.cpm).unwrap_or_default();
        let tier1 = fallback_auction(&auction("visitor", "US"));
        let tier3 = fallback_auction(&auction("visitor", "BR"));
        assert!(top(&tier1) > top(&tier3));

        let developer = fallback_auction(&auction("developer", "US"));
        let budget = fallback_auction(&auction("budget phone", "US"));
        assert!(developer.bids.iter().map(|b| b.cpm).sum::<f64>() > budget.bids.iter().map(|b| b.cpm).sum::<f64>());
        assert!(developer
            .value_factors
            .iter()
            .any(|f| f.factor == "Developer audience" && f.impact == FactorImpact::Positive));
    }

    #[test]
    fn test_spread_is_bounded() {
        let request = auction("anything", "FR");
        for (bidder, _) in BIDDERS {
            let s = spread(&request, bidder);
            assert!((0.7..=1.3).contains(&s));
        }
    }
}
