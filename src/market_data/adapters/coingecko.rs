use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Number, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::FetchError;
use crate::market_data::fetcher::SnapshotFetcher;
use crate::market_data::types::{Instrument, RawSnapshot};

/// Row of `GET /coins/markets`. Only the fields the dashboard shows.
#[derive(Debug, Deserialize)]
struct CoinMarket {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    image: Option<String>,
    current_price: Option<Number>,
    #[serde(default)]
    price_change_percentage_24h: Option<Decimal>,
    #[serde(default)]
    market_cap: Option<Decimal>,
    #[serde(default)]
    total_volume: Option<Decimal>,
    #[serde(default)]
    high_24h: Option<Decimal>,
    #[serde(default)]
    low_24h: Option<Decimal>,
    #[serde(default)]
    sparkline_in_7d: Option<Sparkline>,
}

#[derive(Debug, Deserialize)]
struct Sparkline {
    #[serde(default)]
    price: Vec<Option<Number>>,
}

/// Fixed-shape query for the top instruments by market cap.
#[derive(Debug, Clone)]
pub struct MarketsQuery {
    pub vs_currency: String,
    pub per_page: u32,
}

impl Default for MarketsQuery {
    fn default() -> Self {
        Self {
            vs_currency: "usd".to_string(),
            per_page: 20,
        }
    }
}

impl MarketsQuery {
    fn params(&self) -> [(&'static str, String); 5] {
        [
            ("vs_currency", self.vs_currency.clone()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", self.per_page.to_string()),
            ("sparkline", "true".to_string()),
            ("price_change_percentage", "24h".to_string()),
        ]
    }
}

pub struct CoinGeckoFetcher {
    client: Client,
    base_url: String,
    query: MarketsQuery,
}

impl CoinGeckoFetcher {
    pub fn new(base_url: impl Into<String>, query: MarketsQuery, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("crypto-dashboard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self::with_client(client, base_url, query))
    }

    pub(crate) fn with_client(client: Client, base_url: impl Into<String>, query: MarketsQuery) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            query,
        }
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        Self::new(
            cfg.api_base_url.clone(),
            MarketsQuery {
                vs_currency: cfg.vs_currency.clone(),
                per_page: cfg.page_size,
            },
            cfg.request_timeout,
        )
    }

    fn markets_url(&self) -> String {
        format!("{}/coins/markets", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SnapshotFetcher for CoinGeckoFetcher {
    async fn fetch(&self) -> Result<RawSnapshot, FetchError> {
        let url = self.markets_url();
        debug!(%url, per_page = self.query.per_page, "fetching market snapshot");

        let response = self
            .client
            .get(&url)
            .query(&self.query.params())
            .send()
            .await
            .map_err(|e| FetchError::network(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::bad_status(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::network(format!("failed to read body: {e}")))?;

        parse_markets(&body, Utc::now())
    }
}

/// Decode a `/coins/markets` body.
///
/// Only a body that is not a JSON array fails as a whole. Rows that don't
/// decode, or that have no usable current price, are skipped; a sparkline
/// with gaps keeps its usable samples and is rejected later on length.
pub(crate) fn parse_markets(body: &str, fetched_at: DateTime<Utc>) -> Result<RawSnapshot, FetchError> {
    let rows: Vec<Value> = serde_json::from_str(body)
        .map_err(|e| FetchError::malformed(format!("unexpected markets payload: {e}")))?;

    let instruments = rows.into_iter().filter_map(decode_row).collect();

    Ok(RawSnapshot {
        fetched_at,
        instruments,
    })
}

fn decode_row(value: Value) -> Option<Instrument> {
    let id = value.get("id").and_then(Value::as_str).unwrap_or("?").to_string();
    let row: CoinMarket = match serde_json::from_value(value) {
        Ok(row) => row,
        Err(err) => {
            warn!(%id, error = %err, "skipping undecodable market row");
            return None;
        }
    };

    let Some(raw_price) = row.current_price else {
        warn!(id = %row.id, "skipping market row without current price");
        return None;
    };
    let Some(current_price) = to_decimal(&raw_price) else {
        warn!(id = %row.id, price = %raw_price, "skipping market row with unrepresentable price");
        return None;
    };
    if current_price.is_zero() && raw_price.as_f64().is_some_and(|p| p != 0.0) {
        warn!(id = %row.id, price = %raw_price, "price below decimal precision, shown as zero");
    }

    let samples = row.sparkline_in_7d.map(|s| s.price).unwrap_or_default();
    let expected = samples.len();
    let price_series_7d: Vec<Decimal> = samples.iter().flatten().filter_map(to_decimal).collect();
    if price_series_7d.len() != expected {
        warn!(
            id = %row.id,
            gaps = expected - price_series_7d.len(),
            "price series has missing or unrepresentable samples"
        );
    }

    Some(Instrument {
        id: row.id,
        symbol: row.symbol,
        display_name: row.name,
        icon_ref: row.image.unwrap_or_default(),
        current_price,
        change_percent_24h: row.price_change_percentage_24h,
        market_cap: row.market_cap,
        volume_24h: row.total_volume,
        high_24h: row.high_24h,
        low_24h: row.low_24h,
        price_series_7d,
    })
}

fn to_decimal(n: &Number) -> Option<Decimal> {
    serde_json::from_value(Value::Number(n.clone())).ok()
}
