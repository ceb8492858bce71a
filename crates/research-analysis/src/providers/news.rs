//! News contract and the risk-keyword classifier

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Words that mark a headline as risk-relevant
pub const ISSUE_KEYWORDS: [&str; 14] = [
    "lawsuit",
    "scandal",
    "fraud",
    "investigation",
    "penalty",
    "fine",
    "violation",
    "breach",
    "downgrade",
    "cut",
    "layoffs",
    "restructuring",
    "bankruptcy",
    "default",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source: Option<String>,
    pub summary: Option<String>,
    pub issue_flag: bool,
}

/// Whether a headline or its summary mentions a risk keyword.
///
/// Matches whole words and their inflections ("cuts", "fined") but not
/// words that merely contain a keyword ("executive").
pub fn is_issue_headline(title: &str, summary: &str) -> bool {
    let text = format!("{title} {summary}").to_lowercase();
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .any(|word| ISSUE_KEYWORDS.iter().any(|keyword| word.starts_with(keyword)))
}

/// Recent company news
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Items published within the last `lookback_days`, newest first
    async fn fetch_news(&self, symbol: &str, lookback_days: u32) -> Result<Vec<NewsItem>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_keywords() {
        assert!(is_issue_headline("ACME faces SEC investigation", ""));
        assert!(is_issue_headline("Analyst note", "Morgan Stanley issues downgrade"));
        assert!(is_issue_headline("ACME cuts guidance", ""));
        assert!(is_issue_headline("Regulator FINED the bank", ""));
    }

    #[test]
    fn test_no_issue_for_benign_news() {
        assert!(!is_issue_headline("ACME reports strong Q3 earnings beat", ""));
        assert!(!is_issue_headline("New executive joins board", "Financial results due"));
    }
}
