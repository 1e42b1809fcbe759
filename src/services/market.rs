use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::quote_cache::{Cached, TtlCache};
use crate::error::QuoteError;
use crate::models::{HistoryInterval, PricePoint, Quote, SymbolMatch};

/// An external market-data source.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Quote, QuoteError>;

    /// Up to the last 100 bars, oldest first.
    async fn history(
        &self,
        symbol: &str,
        interval: HistoryInterval,
    ) -> Result<Vec<PricePoint>, QuoteError>;

    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, QuoteError>;
}

/// Cached front for a [`QuoteProvider`]. Built once at startup and shared
/// through the application state.
pub struct MarketData {
    provider: Arc<dyn QuoteProvider>,
    quotes: TtlCache<Quote>,
    history: TtlCache<Vec<PricePoint>>,
    search: TtlCache<Vec<SymbolMatch>>,
}

impl MarketData {
    pub fn new(provider: Arc<dyn QuoteProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            quotes: TtlCache::new(ttl),
            history: TtlCache::new(ttl),
            search: TtlCache::new(ttl),
        }
    }

    /// `symbol` must already be normalized (trimmed, upper-case).
    pub async fn get_quote(&self, symbol: &str) -> Result<Cached<Quote>, QuoteError> {
        let result = self
            .quotes
            .get_or_fetch(symbol, || self.provider.quote(symbol))
            .await?;
        debug!("quote {} served (cached: {})", symbol, result.cached);
        Ok(result)
    }

    pub async fn get_history(
        &self,
        symbol: &str,
        interval: HistoryInterval,
    ) -> Result<Cached<Vec<PricePoint>>, QuoteError> {
        let key = format!("{}_{}", symbol, interval.as_str());
        self.history
            .get_or_fetch(&key, || self.provider.history(symbol, interval))
            .await
    }

    /// Empty result sets are returned but not cached.
    pub async fn search(&self, query: &str) -> Result<Cached<Vec<SymbolMatch>>, QuoteError> {
        let key = query.trim().to_lowercase();
        if let Some(value) = self.search.get(&key).await {
            return Ok(Cached {
                value,
                cached: true,
            });
        }

        let matches = self.provider.search(query.trim()).await?;
        if !matches.is_empty() {
            self.search.insert(key, matches.clone()).await;
        }
        Ok(Cached {
            value: matches,
            cached: false,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Provider answering from a fixed price table; unknown symbols fail.
    #[derive(Default)]
    pub struct StaticProvider {
        prices: Mutex<HashMap<String, Decimal>>,
        pub quote_calls: AtomicUsize,
        pub search_calls: AtomicUsize,
    }

    impl StaticProvider {
        pub fn with_prices(prices: &[(&str, Decimal)]) -> Self {
            let provider = Self::default();
            {
                let mut table = provider.prices.lock().unwrap();
                for (symbol, price) in prices {
                    table.insert(symbol.to_string(), *price);
                }
            }
            provider
        }

        pub fn calls(&self) -> usize {
            self.quote_calls.load(Ordering::SeqCst)
        }
    }

    pub fn quote(symbol: &str, price: Decimal) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            price,
            open: None,
            change_absolute: None,
            change_percent: None,
            day_high: None,
            day_low: None,
            volume: None,
            previous_close: None,
            as_of: None,
        }
    }

    #[async_trait]
    impl QuoteProvider for StaticProvider {
        async fn quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
            self.quote_calls.fetch_add(1, Ordering::SeqCst);
            let price = self.prices.lock().unwrap().get(symbol).copied();
            match price {
                Some(price) => Ok(quote(symbol, price)),
                None => Err(QuoteError::Provider(format!("unknown symbol {}", symbol))),
            }
        }

        async fn history(
            &self,
            symbol: &str,
            _interval: HistoryInterval,
        ) -> Result<Vec<PricePoint>, QuoteError> {
            Err(QuoteError::NoData(symbol.to_string()))
        }

        async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, QuoteError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            let table = self.prices.lock().unwrap();
            let needle = query.to_uppercase();
            let mut matches: Vec<SymbolMatch> = table
                .keys()
                .filter(|symbol| symbol.contains(&needle))
                .map(|symbol| SymbolMatch {
                    symbol: symbol.clone(),
                    name: symbol.clone(),
                    asset_type: "Equity".into(),
                    region: "United States".into(),
                    currency: "USD".into(),
                })
                .collect();
            matches.sort_by(|a, b| a.symbol.cmp(&b.symbol));
            Ok(matches)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StaticProvider;
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn repeated_quotes_hit_provider_once_per_window() {
        let provider = Arc::new(StaticProvider::with_prices(&[("AAPL", dec!(130))]));
        let market = MarketData::new(provider.clone(), Duration::from_millis(200));

        let first = market.get_quote("AAPL").await.unwrap();
        let second = market.get_quote("AAPL").await.unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.value.price, dec!(130));
        assert_eq!(provider.calls(), 1);

        tokio::time::sleep(Duration::from_millis(350)).await;
        let third = market.get_quote("AAPL").await.unwrap();
        assert!(!third.cached);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn failed_quotes_are_retried() {
        let provider = Arc::new(StaticProvider::default());
        let market = MarketData::new(provider.clone(), Duration::from_secs(300));

        assert!(market.get_quote("NOPE").await.is_err());
        assert!(market.get_quote("NOPE").await.is_err());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn empty_searches_are_not_cached() {
        let provider = Arc::new(StaticProvider::with_prices(&[("TSLA", dec!(200))]));
        let market = MarketData::new(provider.clone(), Duration::from_secs(300));

        assert!(market.search("zzz").await.unwrap().value.is_empty());
        assert!(!market.search("zzz").await.unwrap().cached);

        let hit = market.search("tsl").await.unwrap();
        assert_eq!(hit.value.len(), 1);
        assert!(market.search("TSL").await.unwrap().cached);
        assert_eq!(provider.search_calls.load(Ordering::SeqCst), 3);
    }
}
