//! Provider credential identifiers

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// External service a credential belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKey {
    /// Generative model endpoint
    OpenAi,
    /// Quotes, fundamentals and earnings
    MarketData,
    News,
    /// Options chains; falls back to the market data key
    Options,
}

impl ProviderKey {
    pub const ALL: [Self; 4] = [Self::OpenAi, Self::MarketData, Self::News, Self::Options];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::MarketData => "market_data",
            Self::News => "news",
            Self::Options => "options",
        }
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "market_data" | "market" => Ok(Self::MarketData),
            "news" => Ok(Self::News),
            "options" => Ok(Self::Options),
            _ => Err(Error::UnknownToken {
                kind: "provider",
                value: s.to_string(),
            }),
        }
    }
}

/// Mask a secret for display: `abcd...wxyz`, or `***` when too short to reveal anything
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}
