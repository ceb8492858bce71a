//! User-editable run configuration
//!
//! Stored as a singleton record and created with defaults on first read.

use crate::symbol::normalize_symbol;
use crate::{Error, Result, UNIVERSE_US_LARGE_CAP};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// How many market-cap leaders to analyze per daily run
    pub top_n: u32,
    pub universe: String,
    /// Extra symbols analyzed after the top list
    pub custom_tickers: Vec<String>,
    /// Local wall-clock time of the daily run, `HH:MM`
    pub daily_run_time_local: String,
    /// IANA time zone name the run time and run date are evaluated in
    pub time_zone: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            top_n: 20,
            universe: UNIVERSE_US_LARGE_CAP.to_string(),
            custom_tickers: Vec::new(),
            daily_run_time_local: "09:00".to_string(),
            time_zone: "America/New_York".to_string(),
        }
    }
}

/// Partial update; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub top_n: Option<u32>,
    pub universe: Option<String>,
    pub custom_tickers: Option<Vec<String>>,
    pub daily_run_time_local: Option<String>,
    pub time_zone: Option<String>,
}

impl UserConfig {
    /// Apply a partial update, normalizing tickers and validating the result
    pub fn apply(&self, update: ConfigUpdate) -> Result<Self> {
        let mut next = self.clone();

        if let Some(top_n) = update.top_n {
            next.top_n = top_n;
        }
        if let Some(universe) = update.universe {
            next.universe = universe.trim().to_string();
        }
        if let Some(tickers) = update.custom_tickers {
            let mut normalized: Vec<String> = Vec::with_capacity(tickers.len());
            for ticker in &tickers {
                let symbol = normalize_symbol(ticker)?;
                if !normalized.contains(&symbol) {
                    normalized.push(symbol);
                }
            }
            next.custom_tickers = normalized;
        }
        if let Some(time) = update.daily_run_time_local {
            next.daily_run_time_local = time.trim().to_string();
        }
        if let Some(tz) = update.time_zone {
            next.time_zone = tz.trim().to_string();
        }

        next.validate()?;
        Ok(next)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(Error::InvalidConfig(
                "top_n must be greater than 0".to_string(),
            ));
        }
        if self.universe.is_empty() {
            return Err(Error::InvalidConfig("universe must not be empty".to_string()));
        }
        self.run_time()?;
        self.tz()?;
        Ok(())
    }

    /// Parsed daily run time
    pub fn run_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.daily_run_time_local, "%H:%M").map_err(|_| {
            Error::InvalidConfig(format!(
                "daily_run_time_local must be HH:MM, got {:?}",
                self.daily_run_time_local
            ))
        })
    }

    /// Parsed time zone
    pub fn tz(&self) -> Result<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|_| Error::InvalidConfig(format!("unknown time zone {:?}", self.time_zone)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UserConfig::default();
        assert_eq!(config.top_n, 20);
        assert_eq!(config.universe, "US_LARGE_CAP");
        assert!(config.custom_tickers.is_empty());
        assert_eq!(config.run_time().unwrap(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(config.tz().unwrap(), chrono_tz::America::New_York);
    }

    #[test]
    fn test_apply_partial_update() {
        let config = UserConfig::default();
        let updated = config
            .apply(ConfigUpdate {
                top_n: Some(5),
                custom_tickers: Some(vec!["xom".into(), " XOM".into(), "cvx".into()]),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(updated.top_n, 5);
        assert_eq!(updated.custom_tickers, vec!["XOM", "CVX"]);
        assert_eq!(updated.time_zone, "America/New_York");
    }

    #[test]
    fn test_apply_rejects_invalid() {
        let config = UserConfig::default();
        assert!(config
            .apply(ConfigUpdate {
                top_n: Some(0),
                ..Default::default()
            })
            .is_err());
        assert!(config
            .apply(ConfigUpdate {
                daily_run_time_local: Some("9am".into()),
                ..Default::default()
            })
            .is_err());
        assert!(config
            .apply(ConfigUpdate {
                time_zone: Some("Mars/Olympus".into()),
                ..Default::default()
            })
            .is_err());
    }
}
