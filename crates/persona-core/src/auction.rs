//! Simulated real-time-bid auction types.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

pub const MAX_BIDS: usize = 12;
pub const MAX_FACTORS: usize = 8;
pub const MAX_CPM: f64 = 50.0;

/// Auction request: a human-readable profile summary plus the visitor's country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionRequest {
    pub profile_summary: String,
    pub country: String,
    pub country_code: String,
}

impl AuctionRequest {
    /// Validate and canonicalize the request.
    pub fn normalized(self) -> Result<Self> {
        let profile_summary = self.profile_summary.trim().to_string();
        if profile_summary.is_empty() {
            return Err(Error::InvalidRequest(
                "profileSummary must not be empty".to_string(),
            ));
        }

        let country_code = self.country_code.trim().to_ascii_uppercase();
        if country_code.len() != 2 || !country_code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::InvalidRequest(format!(
                "countryCode must be two ASCII letters, got {:?}",
                self.country_code
            )));
        }

        Ok(Self {
            profile_summary,
            country: self.country.trim().to_string(),
            country_code,
        })
    }
}

/// Auction outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionResult {
    pub bids: Vec<BidRecord>,
    pub value_factors: Vec<FactorRecord>,
}

impl AuctionResult {
    /// Cap list lengths, sort bids by descending cpm and mark the winner.
    pub fn settled(mut self) -> Self {
        for bid in &mut self.bids {
            bid.cpm = clamp_cpm(bid.cpm);
            bid.won = false;
        }
        // Stable sort keeps the earlier bid ahead on ties.
        self.bids.sort_by(|a, b| b.cpm.total_cmp(&a.cpm));
        self.bids.truncate(MAX_BIDS);
        if let Some(winner) = self.bids.first_mut() {
            winner.won = true;
        }
        self.value_factors.truncate(MAX_FACTORS);
        self
    }

    pub fn winning_bid(&self) -> Option<&BidRecord> {
        self.bids.iter().find(|b| b.won)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRecord {
    pub bidder: String,
    pub category: String,
    /// Cost per mille in USD.
    pub cpm: f64,
    pub won: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorRecord {
    pub factor: String,
    pub impact: FactorImpact,
    pub weight: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorImpact {
    Positive,
    Negative,
    Neutral,
}

impl FactorImpact {
    pub fn parse_loose(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "positive" | "high" | "+" | "up" => Self::Positive,
            "negative" | "low" | "-" | "down" => Self::Negative,
            _ => Self::Neutral,
        }
    }
}

/// Clamp to the accepted cpm range and round to cents.
pub fn clamp_cpm(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value.clamp(0.0, MAX_CPM) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(bidder: &str, cpm: f64) -> BidRecord {
        BidRecord {
            bidder: bidder.to_string(),
            category: "display".to_string(),
            cpm,
            won: true,
        }
    }

    #[test]
    fn test_normalized_uppercases_country_code() {
        let req = AuctionRequest {
            profile_summary: " developer on linux ".to_string(),
            country: "Germany".to_string(),
            country_code: "de".to_string(),
        }
        .normalized()
        .unwrap();
        assert_eq!(req.country_code, "DE");
        assert_eq!(req.profile_summary, "developer on linux");
    }

    #[test]
    fn test_normalized_rejects_bad_country_code() {
        let req = AuctionRequest {
            profile_summary: "gamer".to_string(),
            country: "Nowhere".to_string(),
            country_code: "X1".to_string(),
        };
        assert!(req.normalized().unwrap_err().is_caller_error());
    }

    #[test]
    fn test_settled_marks_single_winner() {
        let result = AuctionResult {
            bids: vec![bid("a", 1.0), bid("b", 75.0), bid("c", 3.333)],
            value_factors: vec![],
        }
        .settled();

        assert_eq!(result.bids[0].bidder, "b");
        assert_eq!(result.bids[0].cpm, MAX_CPM);
        assert_eq!(result.bids[1].cpm, 3.33);
        assert_eq!(result.bids.iter().filter(|b| b.won).count(), 1);
        assert_eq!(result.winning_bid().unwrap().bidder, "b");
    }

    #[test]
    fn test_settled_ties_keep_first() {
        let result = AuctionResult {
            bids: vec![bid("first", 2.0), bid("second", 2.0)],
            value_factors: vec![],
        }
        .settled();
        assert_eq!(result.winning_bid().unwrap().bidder, "first");
    }
}
