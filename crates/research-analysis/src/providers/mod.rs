//! External data provider contracts
//!
//! The orchestrator only sees these traits. Concrete HTTP clients live in
//! [`crate::api`]; tests substitute the generated mocks.

mod market;
mod news;

pub use market::{
    EarningsData, EarningsItem, MarketDataProvider, OptionContract, OptionsChain, Quote,
    rank_by_market_cap, select_best_call, select_best_put,
};
pub use news::{ISSUE_KEYWORDS, NewsItem, NewsProvider, is_issue_headline};

#[cfg(test)]
pub use market::MockMarketDataProvider;
#[cfg(test)]
pub use news::MockNewsProvider;
