//! Short-lived quote cache
//!
//! Ranking the large-cap universe and analysing each symbol request the same
//! quote within seconds of each other; the cache collapses those calls.

use crate::providers::Quote;
use cached::{Cached, TimedCache};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Thread-safe quote cache keyed by symbol
#[derive(Clone)]
pub struct QuoteCache {
    cache: Arc<RwLock<TimedCache<String, Quote>>>,
}

impl QuoteCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    pub async fn get(&self, symbol: &str) -> Option<Quote> {
        let mut cache = self.cache.write().await;
        cache.cache_get(symbol).cloned()
    }

    pub async fn insert(&self, quote: Quote) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(quote.symbol.clone(), quote);
    }

    /// Return the cached quote or run `fetcher`.
    ///
    /// Only found quotes are cached; an absent symbol is asked again next time.
    pub async fn get_or_fetch<F, Fut, E>(&self, symbol: &str, fetcher: F) -> Result<Option<Quote>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Quote>, E>>,
    {
        if let Some(quote) = self.get(symbol).await {
            tracing::debug!(symbol, "Quote cache hit");
            return Ok(Some(quote));
        }

        let fetched = fetcher().await?;
        if let Some(quote) = &fetched {
            self.insert(quote.clone()).await;
        }
        Ok(fetched)
    }

    pub async fn invalidate(&self, symbol: &str) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_remove(symbol);
    }

    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_get_or_fetch_caches_found_quotes() {
        let cache = QuoteCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let quote = cache
                .get_or_fetch("AAPL", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(Some(Quote::new("AAPL", 190.0)))
                })
                .await
                .unwrap();
            assert_eq!(quote.unwrap().symbol, "AAPL");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_absent_quotes_are_not_cached() {
        let cache = QuoteCache::new(Duration::from_secs(60));

        let quote = cache
            .get_or_fetch("ZZZQQ", || async { Ok::<_, ()>(None) })
            .await
            .unwrap();
        assert!(quote.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = QuoteCache::new(Duration::from_secs(60));
        cache.insert(Quote::new("MSFT", 420.0)).await;
        assert!(cache.get("MSFT").await.is_some());

        cache.invalidate("MSFT").await;
        assert!(cache.get("MSFT").await.is_none());
    }
}
