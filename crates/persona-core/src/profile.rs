//! Visitor profile produced by the inference pipeline.

use serde::{Deserialize, Serialize};

pub const MAX_INTERESTS: usize = 10;
pub const MAX_SUMMARY_CHARS: usize = 500;
pub const DEFAULT_CONFIDENCE: u8 = 50;
pub const DEFAULT_AGE_RANGE: &str = "25-34";

/// Scored visitor profile.
///
/// Produced either by a remote provider (after normalization) or by the local
/// fallback computation. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResult {
    pub is_developer: bool,
    pub is_gamer: bool,
    pub is_designer: bool,
    pub is_power_user: bool,
    pub is_privacy_conscious: bool,
    pub is_mobile: bool,
    pub developer_score: u8,
    pub gamer_score: u8,
    pub designer_score: u8,
    pub tech_savviness: u8,
    pub privacy_score: u8,
    pub confidence: u8,
    pub device_tier: DeviceTier,
    pub income_level: IncomeLevel,
    pub age_range: String,
    pub interests: Vec<String>,
    pub summary: String,
}

impl ProfileResult {
    /// A profile with every optional field at its documented default.
    pub fn with_defaults(is_developer: bool) -> Self {
        Self {
            is_developer,
            is_gamer: false,
            is_designer: false,
            is_power_user: false,
            is_privacy_conscious: false,
            is_mobile: false,
            developer_score: 0,
            gamer_score: 0,
            designer_score: 0,
            tech_savviness: 0,
            privacy_score: 0,
            confidence: DEFAULT_CONFIDENCE,
            device_tier: DeviceTier::default(),
            income_level: IncomeLevel::default(),
            age_range: DEFAULT_AGE_RANGE.to_string(),
            interests: Vec::new(),
            summary: String::new(),
        }
    }

    /// Enforce the list and length bounds of the schema.
    pub fn bounded(mut self) -> Self {
        let mut seen = Vec::with_capacity(self.interests.len());
        for interest in self.interests.drain(..) {
            let interest = interest.trim().to_string();
            if interest.is_empty() || seen.iter().any(|s: &String| s.eq_ignore_ascii_case(&interest)) {
                continue;
            }
            seen.push(interest);
            if seen.len() == MAX_INTERESTS {
                break;
            }
        }
        self.interests = seen;

        if self.summary.chars().count() > MAX_SUMMARY_CHARS {
            self.summary = self.summary.chars().take(MAX_SUMMARY_CHARS).collect();
        }
        self
    }
}

/// Clamp any number into the 0-100 score range.
pub fn clamp_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceTier {
    Budget,
    #[default]
    Mid,
    High,
    Premium,
}

impl DeviceTier {
    /// Parse a loosely written tier name.
    pub fn parse_loose(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "budget" | "low" | "low-end" | "entry" => Some(Self::Budget),
            "mid" | "medium" | "mid-range" | "midrange" => Some(Self::Mid),
            "high" | "high-end" | "upper" => Some(Self::High),
            "premium" | "flagship" | "ultra" => Some(Self::Premium),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomeLevel {
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

impl IncomeLevel {
    pub fn parse_loose(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "low" => Some(Self::Low),
            "medium" | "mid" | "middle" | "average" => Some(Self::Medium),
            "high" | "upper-middle" => Some(Self::High),
            "very-high" | "veryhigh" | "wealthy" => Some(Self::VeryHigh),
            _ => None,
        }
    }
}
