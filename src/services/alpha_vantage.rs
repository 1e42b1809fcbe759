//! Alpha Vantage client implementing [`QuoteProvider`].
//!
//! Alpha Vantage answers every request with HTTP 200 and reports problems in
//! the body (`"Error Message"`, `"Note"` and `"Information"` keys), so the
//! payload is inspected before the data fields are read.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use super::market::QuoteProvider;
use crate::config::DEFAULT_ALPHA_VANTAGE_URL;
use crate::error::QuoteError;
use crate::models::{HistoryInterval, PricePoint, Quote, SymbolMatch};

const HISTORY_LIMIT: usize = 100;

pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AlphaVantageClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_ALPHA_VANTAGE_URL.to_string(),
            api_key,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn call<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T, QuoteError> {
        let api_key = self.api_key.as_deref().ok_or(QuoteError::NotConfigured)?;
        let url = format!("{}/query", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("apikey", api_key)])
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(transport_error)?;

        let body: serde_json::Value = response.json().await.map_err(|e| {
            QuoteError::Provider(format!("malformed response: {}", e))
        })?;
        check_notices(&body)?;

        serde_json::from_value(body)
            .map_err(|e| QuoteError::Provider(format!("unexpected response shape: {}", e)))
    }
}

fn transport_error(e: reqwest::Error) -> QuoteError {
    if e.is_timeout() {
        QuoteError::Timeout
    } else {
        QuoteError::Provider(e.to_string())
    }
}

/// Turn rate-limit notes and error messages into typed failures.
fn check_notices(body: &serde_json::Value) -> Result<(), QuoteError> {
    if let Some(message) = body.get("Error Message").and_then(|v| v.as_str()) {
        return Err(QuoteError::NoData(message.to_string()));
    }
    for key in ["Note", "Information"] {
        if let Some(message) = body.get(key).and_then(|v| v.as_str()) {
            warn!("Alpha Vantage notice: {}", message);
            return Err(QuoteError::Provider(message.to_string()));
        }
    }
    Ok(())
}

fn decimal(raw: Option<&str>) -> Option<Decimal> {
    raw.and_then(|v| Decimal::from_str(v.trim()).ok())
}

fn integer(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|v| v.trim().parse().ok())
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote", default)]
    global_quote: Option<RawQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct RawQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "02. open")]
    open: Option<String>,
    #[serde(rename = "03. high")]
    high: Option<String>,
    #[serde(rename = "04. low")]
    low: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

impl RawQuote {
    fn into_quote(self, requested: &str) -> Option<Quote> {
        let price = decimal(self.price.as_deref())?;
        Some(Quote {
            symbol: self
                .symbol
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| requested.to_string()),
            price,
            open: decimal(self.open.as_deref()),
            change_absolute: decimal(self.change.as_deref()),
            change_percent: decimal(
                self.change_percent
                    .as_deref()
                    .map(|v| v.trim().trim_end_matches('%')),
            ),
            day_high: decimal(self.high.as_deref()),
            day_low: decimal(self.low.as_deref()),
            volume: integer(self.volume.as_deref()),
            previous_close: decimal(self.previous_close.as_deref()),
            as_of: self
                .latest_trading_day
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. adjusted close")]
    adjusted_close: Option<String>,
    #[serde(rename = "5. volume")]
    plain_volume: Option<String>,
    #[serde(rename = "6. volume")]
    adjusted_volume: Option<String>,
}

impl RawBar {
    fn into_point(self, date: NaiveDate) -> Option<PricePoint> {
        Some(PricePoint {
            date,
            open: decimal(Some(&self.open))?,
            high: decimal(Some(&self.high))?,
            low: decimal(Some(&self.low))?,
            close: decimal(Some(&self.close))?,
            adjusted_close: decimal(self.adjusted_close.as_deref()),
            volume: integer(self.adjusted_volume.as_deref().or(self.plain_volume.as_deref())),
        })
    }
}

fn series_params(interval: HistoryInterval) -> (&'static str, &'static str) {
    match interval {
        HistoryInterval::Daily => ("TIME_SERIES_DAILY_ADJUSTED", "Time Series (Daily)"),
        HistoryInterval::Weekly => ("TIME_SERIES_WEEKLY_ADJUSTED", "Weekly Adjusted Time Series"),
        HistoryInterval::Monthly => {
            ("TIME_SERIES_MONTHLY_ADJUSTED", "Monthly Adjusted Time Series")
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "bestMatches", default)]
    best_matches: Vec<RawMatch>,
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    #[serde(rename = "1. symbol")]
    symbol: String,
    #[serde(rename = "2. name", default)]
    name: String,
    #[serde(rename = "3. type", default)]
    asset_type: String,
    #[serde(rename = "4. region", default)]
    region: String,
    #[serde(rename = "8. currency", default)]
    currency: String,
}

#[async_trait]
impl QuoteProvider for AlphaVantageClient {
    async fn quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        debug!("Fetching Alpha Vantage quote for {}", symbol);
        let response: GlobalQuoteResponse = self
            .call(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;
        response
            .global_quote
            .and_then(|raw| raw.into_quote(symbol))
            .ok_or_else(|| QuoteError::NoData(symbol.to_string()))
    }

    async fn history(
        &self,
        symbol: &str,
        interval: HistoryInterval,
    ) -> Result<Vec<PricePoint>, QuoteError> {
        let (function, series_key) = series_params(interval);
        debug!("Fetching Alpha Vantage {} history for {}", interval.as_str(), symbol);
        let mut response: HashMap<String, serde_json::Value> = self
            .call(&[("function", function), ("symbol", symbol)])
            .await?;

        let series = response
            .remove(series_key)
            .ok_or_else(|| QuoteError::NoData(symbol.to_string()))?;
        let bars: BTreeMap<String, RawBar> = serde_json::from_value(series)
            .map_err(|e| QuoteError::Provider(format!("unexpected series shape: {}", e)))?;

        // BTreeMap keys are ISO dates, so iteration is chronological.
        let points: Vec<PricePoint> = bars
            .into_iter()
            .filter_map(|(date, bar)| {
                let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").ok()?;
                bar.into_point(date)
            })
            .collect();
        if points.is_empty() {
            return Err(QuoteError::NoData(symbol.to_string()));
        }

        let skip = points.len().saturating_sub(HISTORY_LIMIT);
        Ok(points.into_iter().skip(skip).collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, QuoteError> {
        let response: SearchResponse = self
            .call(&[("function", "SYMBOL_SEARCH"), ("keywords", query)])
            .await?;
        Ok(response
            .best_matches
            .into_iter()
            .map(|m| SymbolMatch {
                symbol: m.symbol,
                name: m.name,
                asset_type: m.asset_type,
                region: m.region,
                currency: m.currency,
            })
            .collect())
    }
}
