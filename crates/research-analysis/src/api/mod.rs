//! HTTP clients for the external data providers

pub mod alpha_vantage;
pub mod finnhub;

pub use alpha_vantage::AlphaVantageClient;
pub use finnhub::FinnhubClient;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

pub(crate) type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Direct limiter allowing `per_minute` requests; zero is treated as one
pub(crate) fn rate_limiter(per_minute: u32) -> SharedRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Parse a provider number, which may arrive as a string such as `"None"` or `"1.5%"`
pub(crate) fn parse_number(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(raw) => {
            let trimmed = raw.trim().trim_end_matches('%');
            if trimmed.is_empty() || trimmed == "-" || trimmed.eq_ignore_ascii_case("none") {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        },
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(&json!("189.84")), Some(189.84));
        assert_eq!(parse_number(&json!(12)), Some(12.0));
        assert_eq!(parse_number(&json!("3.2%")), Some(3.2));
        assert_eq!(parse_number(&json!("None")), None);
        assert_eq!(parse_number(&json!("-")), None);
        assert_eq!(parse_number(&json!(null)), None);
    }
}
