//! Provider response normalizer.
//!
//! Takes the free-form completion text of any provider and maps it onto the
//! fixed internal schema, or reports why it cannot. Cleanup is permissive:
//! markdown fences and surrounding prose are dropped, trailing commas are
//! repaired, key spelling is matched loosely, optional values are coerced and
//! clamped. Required fields must be present and well-typed.

use persona_core::profile::clamp_score;
use persona_core::{
    AuctionResult, BidRecord, DeviceTier, FactorImpact, FactorRecord, IncomeLevel, ProfileResult,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

const DEFAULT_BID_CATEGORY: &str = "general";
const DEFAULT_FACTOR_WEIGHT: u8 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("no JSON object found in response")]
    NoJsonObject,
    #[error("invalid JSON: {0}")]
    Syntax(String),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("response contained no usable {0}")]
    Empty(&'static str),
}

/// Extract and parse the JSON object embedded in a completion.
pub fn parse_object(text: &str) -> Result<Map<String, Value>, NormalizeError> {
    let unfenced = strip_fences(text);
    let body = outermost_object(&unfenced).ok_or(NormalizeError::NoJsonObject)?;
    let repaired = remove_trailing_commas(body);

    match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(NormalizeError::NoJsonObject),
        Err(e) => Err(NormalizeError::Syntax(e.to_string())),
    }
}

fn strip_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Drop commas that directly precede `}` or `]`, outside string literals.
fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Key lookup that ignores case, `_` and `-`.
struct Fields<'a> {
    values: HashMap<String, &'a Value>,
}

fn canonical(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl<'a> Fields<'a> {
    fn new(object: &'a Map<String, Value>) -> Self {
        let mut values = HashMap::with_capacity(object.len());
        for (key, value) in object {
            values.entry(canonical(key)).or_insert(value);
        }
        Self { values }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.values
            .get(&canonical(name))
            .copied()
            .filter(|v| !v.is_null())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_f64().map(|n| n != 0.0),
            _ => None,
        }
    }

    fn number(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
            _ => None,
        }
    }

    fn text(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    fn list(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        }
    }

    fn array(&self, name: &str) -> Option<&'a Vec<Value>> {
        self.get(name).and_then(Value::as_array)
    }
}

/// Some providers wrap the payload, e.g. `{"profile": {...}}`.
fn unwrap_single<'a>(object: &'a Map<String, Value>, wrapper: &str) -> &'a Map<String, Value> {
    if object.len() == 1 {
        if let Some(Value::Object(inner)) = object.get(wrapper) {
            return inner;
        }
    }
    object
}

/// Normalize a profile completion.
pub fn normalize_profile(text: &str) -> Result<ProfileResult, NormalizeError> {
    let object = parse_object(text)?;
    let fields = Fields::new(unwrap_single(&object, "profile"));

    let is_developer = match fields.get("isDeveloper") {
        None => return Err(NormalizeError::MissingField("isDeveloper")),
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            return Err(NormalizeError::WrongType {
                field: "isDeveloper",
                expected: "a boolean",
            });
        }
    };

    let mut profile = ProfileResult::with_defaults(is_developer);
    profile.is_gamer = fields.bool("isGamer").unwrap_or(false);
    profile.is_designer = fields.bool("isDesigner").unwrap_or(false);
    profile.is_power_user = fields.bool("isPowerUser").unwrap_or(false);
    profile.is_privacy_conscious = fields.bool("isPrivacyConscious").unwrap_or(false);
    profile.is_mobile = fields.bool("isMobile").unwrap_or(false);

    let score = |name: &str| fields.number(name).map(clamp_score);
    profile.developer_score = score("developerScore").unwrap_or(0);
    profile.gamer_score = score("gamerScore").unwrap_or(0);
    profile.designer_score = score("designerScore").unwrap_or(0);
    profile.tech_savviness = score("techSavviness").unwrap_or(0);
    profile.privacy_score = score("privacyScore").unwrap_or(0);
    profile.confidence = score("confidence").unwrap_or(profile.confidence);

    if let Some(tier) = fields.text("deviceTier").and_then(|t| DeviceTier::parse_loose(&t)) {
        profile.device_tier = tier;
    }
    if let Some(level) = fields.text("incomeLevel").and_then(|l| IncomeLevel::parse_loose(&l)) {
        profile.income_level = level;
    }
    if let Some(age) = fields.text("ageRange") {
        profile.age_range = age;
    }
    profile.interests = fields.list("interests");
    if let Some(summary) = fields.text("summary") {
        profile.summary = summary;
    }

    Ok(profile.bounded())
}

/// Normalize an auction completion. At least one valid bid is required.
pub fn normalize_auction(text: &str) -> Result<AuctionResult, NormalizeError> {
    let object = parse_object(text)?;
    let fields = Fields::new(unwrap_single(&object, "auction"));

    let raw_bids = match fields.get("bids") {
        None => return Err(NormalizeError::MissingField("bids")),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(NormalizeError::WrongType {
                field: "bids",
                expected: "an array",
            });
        }
    };

    let bids: Vec<BidRecord> = raw_bids.iter().filter_map(parse_bid).collect();
    if bids.is_empty() {
        return Err(NormalizeError::Empty("bids"));
    }

    let value_factors = fields
        .array("valueFactors")
        .or_else(|| fields.array("factors"))
        .map(|items| items.iter().filter_map(parse_factor).collect())
        .unwrap_or_default();

    Ok(AuctionResult {
        bids,
        value_factors,
    }
    .settled())
}

fn parse_bid(value: &Value) -> Option<BidRecord> {
    let object = value.as_object()?;
    let fields = Fields::new(object);
    let bidder = fields.text("bidder").or_else(|| fields.text("name"))?;
    let cpm = fields.get("cpm")?.as_f64()?;

    Some(BidRecord {
        bidder,
        category: fields
            .text("category")
            .unwrap_or_else(|| DEFAULT_BID_CATEGORY.to_string()),
        cpm,
        won: false,
    })
}

fn parse_factor(value: &Value) -> Option<FactorRecord> {
    let object = value.as_object()?;
    let fields = Fields::new(object);
    let factor = fields.text("factor").or_else(|| fields.text("name"))?;

    Some(FactorRecord {
        factor,
        impact: fields
            .text("impact")
            .map(|i| FactorImpact::parse_loose(&i))
            .unwrap_or(FactorImpact::Neutral),
        weight: fields
            .number("weight")
            .map(clamp_score)
            .unwrap_or(DEFAULT_FACTOR_WEIGHT),
    })
}
