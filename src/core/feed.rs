// src/core/feed.rs
use crate::connectors::synthetic::SyntheticMarket;
use crate::connectors::traits::MarketDataProvider;
use crate::types::AssetQuote;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Last snapshot handed out by the feed and when it was fetched.
#[derive(Debug, Clone)]
pub struct QuoteCache {
    pub data: Vec<AssetQuote>,
    pub fetched_at: Instant,
}

impl QuoteCache {
    pub fn new(data: Vec<AssetQuote>, fetched_at: Instant) -> Self {
        Self { data, fetched_at }
    }

    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.fetched_at) < ttl
    }
}

/// Prioritised providers behind a TTL cache. Never returns an empty
/// snapshot: when every provider fails the synthetic market fills in.
pub struct MarketFeed {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    fallback: SyntheticMarket,
    cache: Mutex<Option<QuoteCache>>,
    ttl: Duration,
    timeout: Duration,
}

impl MarketFeed {
    pub fn new(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            providers,
            fallback: SyntheticMarket::default(),
            cache: Mutex::new(None),
            ttl,
            timeout,
        }
    }

    /// Cached data while fresh, otherwise a new fetch.
    pub async fn quotes(&self) -> Vec<AssetQuote> {
        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_fresh(Instant::now(), self.ttl) {
                    debug!("Using cached market data ({} quotes)", cached.data.len());
                    return cached.data.clone();
                }
            }
        }
        self.refresh().await
    }

    /// Bypasses the cache. The lock is not held across the network calls;
    /// concurrent refreshes simply overwrite each other.
    pub async fn refresh(&self) -> Vec<AssetQuote> {
        let quotes = self.fetch_from_providers().await;
        let mut cache = self.cache.lock().await;
        *cache = Some(QuoteCache::new(quotes.clone(), Instant::now()));
        quotes
    }

    pub async fn cached(&self) -> Option<QuoteCache> {
        self.cache.lock().await.clone()
    }

    async fn fetch_from_providers(&self) -> Vec<AssetQuote> {
        for provider in &self.providers {
            match tokio::time::timeout(self.timeout, provider.fetch_quotes()).await {
                Ok(Ok(quotes)) if !quotes.is_empty() => {
                    info!("Market data from {} ({} quotes)", provider.name(), quotes.len());
                    return quotes;
                }
                Ok(Ok(_)) => warn!("{} returned no quotes", provider.name()),
                Ok(Err(e)) => warn!("{} failed: {:#}", provider.name(), e),
                Err(_) => warn!(
                    "{} timed out after {}s",
                    provider.name(),
                    self.timeout.as_secs()
                ),
            }
        }
        warn!("All market providers unavailable, using synthetic data");
        self.fallback.generate()
    }
}
