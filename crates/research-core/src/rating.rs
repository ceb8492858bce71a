//! Structured rating returned by the language model
//!
//! The serde shape matches the JSON document the model is asked to produce,
//! so a fenced model answer can be decoded straight into [`Rating`].

use crate::enums::{EntryRating, StrategyRating};
use serde::{Deserialize, Serialize};

const UNPARSED_ENTRY: &str = "Analysis completed but response format needs review";
const UNPARSED_STRATEGY: &str = "Unable to parse detailed analysis";
const UNAVAILABLE: &str = "Analysis temporarily unavailable";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryAssessment {
    pub rating: EntryRating,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAssessment {
    pub rating: StrategyRating,
    #[serde(default)]
    pub rationale: String,
}

/// A labelled risk or open issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFlag {
    pub label: String,
    #[serde(default, alias = "details")]
    pub detail: String,
}

/// A dated catalyst the model called out (earnings, ex-dividend, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDate {
    pub label: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Rating value object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    #[serde(rename = "summary_markdown", alias = "summary")]
    pub summary: String,
    pub entry: EntryAssessment,
    pub covered_call: StrategyAssessment,
    pub secured_put: StrategyAssessment,
    #[serde(default, rename = "risks_and_issues", alias = "risk_flags")]
    pub risk_flags: Vec<RiskFlag>,
    #[serde(default)]
    pub key_dates: Vec<KeyDate>,

    /// Rendered user message sent to the model
    #[serde(skip)]
    pub prompt: Option<String>,
    /// Unprocessed model answer
    #[serde(skip)]
    pub raw_response: Option<String>,
}

impl Rating {
    /// Fallback for a model answer that could not be decoded.
    ///
    /// The raw text becomes the summary so nothing the model said is lost.
    pub fn degraded_unparsed(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            summary: raw.clone(),
            entry: EntryAssessment {
                rating: EntryRating::Hold,
                rationale: UNPARSED_ENTRY.to_string(),
            },
            covered_call: StrategyAssessment {
                rating: StrategyRating::Neutral,
                rationale: UNPARSED_STRATEGY.to_string(),
            },
            secured_put: StrategyAssessment {
                rating: StrategyRating::Neutral,
                rationale: UNPARSED_STRATEGY.to_string(),
            },
            risk_flags: Vec::new(),
            key_dates: Vec::new(),
            prompt: None,
            raw_response: Some(raw),
        }
    }

    /// Fallback for a model call that never produced an answer.
    pub fn degraded_failure(cause: impl std::fmt::Display) -> Self {
        Self {
            summary: format!("Analysis failed: {cause}"),
            entry: EntryAssessment {
                rating: EntryRating::Hold,
                rationale: UNAVAILABLE.to_string(),
            },
            covered_call: StrategyAssessment {
                rating: StrategyRating::Neutral,
                rationale: UNAVAILABLE.to_string(),
            },
            secured_put: StrategyAssessment {
                rating: StrategyRating::Neutral,
                rationale: UNAVAILABLE.to_string(),
            },
            risk_flags: Vec::new(),
            key_dates: Vec::new(),
            prompt: None,
            raw_response: None,
        }
    }

    /// Whether this rating is one of the HOLD/NEUTRAL/NEUTRAL fallbacks
    pub fn is_degraded(&self) -> bool {
        matches!(self.entry.rationale.as_str(), UNPARSED_ENTRY | UNAVAILABLE)
            && self.entry.rating == EntryRating::Hold
            && self.covered_call.rating == StrategyRating::Neutral
            && self.secured_put.rating == StrategyRating::Neutral
    }

    /// Attach the prompt and raw answer this rating was derived from
    pub fn with_provenance(mut self, prompt: Option<String>, raw_response: Option<String>) -> Self {
        self.prompt = prompt;
        if raw_response.is_some() {
            self.raw_response = raw_response;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_model_document() {
        let json = r###"{
            "summary_markdown": "## AAPL\nSolid quarter.",
            "entry": {"rating": "buy", "rationale": "Reasonable valuation"},
            "covered_call": {"rating": "attractive", "rationale": "Elevated IV", "notes": "30 DTE"},
            "secured_put": {"rating": "neutral", "rationale": "Thin premium"},
            "risks_and_issues": [{"label": "Regulation", "details": "EU DMA exposure"}],
            "key_dates": [{"label": "Earnings", "date": "2024-07-30", "notes": "Q3"}]
        }"###;

        let rating: Rating = serde_json::from_str(json).unwrap();
        assert_eq!(rating.entry.rating, EntryRating::Buy);
        assert_eq!(rating.covered_call.rating, StrategyRating::Attractive);
        assert_eq!(rating.risk_flags.len(), 1);
        assert_eq!(rating.risk_flags[0].detail, "EU DMA exposure");
        assert_eq!(rating.key_dates[0].date.as_deref(), Some("2024-07-30"));
        assert!(rating.raw_response.is_none());
        assert!(!rating.is_degraded());
    }

    #[test]
    fn test_missing_optional_sections() {
        let json = r#"{
            "summary_markdown": "short",
            "entry": {"rating": "hold"},
            "covered_call": {"rating": "neutral", "rationale": ""},
            "secured_put": {"rating": "unattractive", "rationale": "Falling knife"}
        }"#;

        let rating: Rating = serde_json::from_str(json).unwrap();
        assert!(rating.risk_flags.is_empty());
        assert!(rating.key_dates.is_empty());
        assert_eq!(rating.entry.rationale, "");
    }

    #[test]
    fn test_degraded_unparsed() {
        let rating = Rating::degraded_unparsed("I think it's fine");
        assert_eq!(rating.summary, "I think it's fine");
        assert_eq!(rating.entry.rating, EntryRating::Hold);
        assert_eq!(rating.covered_call.rating, StrategyRating::Neutral);
        assert_eq!(rating.secured_put.rating, StrategyRating::Neutral);
        assert_eq!(rating.secured_put.rationale, UNPARSED_STRATEGY);
        assert_eq!(rating.raw_response.as_deref(), Some("I think it's fine"));
        assert!(rating.is_degraded());
    }

    #[test]
    fn test_degraded_failure() {
        let rating = Rating::degraded_failure("connection refused");
        assert_eq!(rating.summary, "Analysis failed: connection refused");
        assert_eq!(rating.entry.rationale, UNAVAILABLE);
        assert!(rating.risk_flags.is_empty());
        assert!(rating.is_degraded());
    }
}
