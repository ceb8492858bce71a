//! Enumerations persisted as fixed lowercase tokens
//!
//! The tokens are part of the storage format and must not change.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! token_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $token:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Storage token for this variant
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $token),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            /// Case-insensitive; spaces and hyphens are read as underscores.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let token = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
                match token.as_str() {
                    $($token => Ok(Self::$variant),)+
                    _ => Err(Error::UnknownToken {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }
    };
}

token_enum! {
    /// Lifecycle state of a batch run
    RunStatus, "run status" {
        /// Created by the trigger, not yet picked up
        Pending => "pending",
        /// Orchestrator is iterating symbols
        Running => "running",
        /// Iteration finished (individual symbols may have failed)
        Completed => "completed",
        /// A run-level error stopped the batch
        Failed => "failed",
    }
}

impl RunStatus {
    /// Whether the run can no longer change state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

token_enum! {
    /// How an analysis report came to exist
    AnalysisType, "analysis type" {
        /// Produced by a scheduled or manually triggered batch
        DailyAuto => "daily_auto",
        /// Produced by a single-symbol request
        OnDemand => "on_demand",
    }
}

token_enum! {
    /// Whether an earnings event lies ahead or has been reported
    EventType, "earnings event type" {
        Upcoming => "upcoming",
        Historical => "historical",
    }
}

token_enum! {
    /// Attractiveness of opening a new stock position
    EntryRating, "entry rating" {
        StrongBuy => "strong_buy",
        Buy => "buy",
        Hold => "hold",
        Avoid => "avoid",
    }
}

token_enum! {
    /// Attractiveness of an option-selling strategy
    StrategyRating, "strategy rating" {
        Attractive => "attractive",
        Neutral => "neutral",
        Unattractive => "unattractive",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_tokens() {
        assert_eq!(RunStatus::Pending.as_str(), "pending");
        assert_eq!(RunStatus::Running.as_str(), "running");
        assert_eq!(AnalysisType::DailyAuto.as_str(), "daily_auto");
        assert_eq!(AnalysisType::OnDemand.as_str(), "on_demand");
        assert_eq!(EventType::Historical.as_str(), "historical");
        assert_eq!(EntryRating::StrongBuy.as_str(), "strong_buy");
        assert_eq!(StrategyRating::Unattractive.as_str(), "unattractive");
    }

    #[test]
    fn test_lenient_parsing() {
        assert_eq!("Strong Buy".parse::<EntryRating>().unwrap(), EntryRating::StrongBuy);
        assert_eq!("strong-buy".parse::<EntryRating>().unwrap(), EntryRating::StrongBuy);
        assert_eq!(" NEUTRAL ".parse::<StrategyRating>().unwrap(), StrategyRating::Neutral);
    }

    #[test]
    fn test_unknown_token() {
        let err = "sell".parse::<EntryRating>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown entry rating token: \"sell\"");
    }

    #[test]
    fn test_serde_uses_tokens() {
        let json = serde_json::to_string(&RunStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");

        let rating: EntryRating = serde_json::from_str("\"BUY\"").unwrap();
        assert_eq!(rating, EntryRating::Buy);

        assert!(serde_json::from_str::<StrategyRating>("\"great\"").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }
}
