// src/connectors/coingecko.rs
use crate::connectors::messages::CoinGeckoPrice;
use crate::connectors::traits::MarketDataProvider;
use crate::types::AssetQuote;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

const SOURCE: &str = "CoinGecko";

/// CoinGecko id -> futures symbol.
const COINS: [(&str, &str); 10] = [
    ("bitcoin", "BTCUSDT"),
    ("ethereum", "ETHUSDT"),
    ("binancecoin", "BNBUSDT"),
    ("cardano", "ADAUSDT"),
    ("solana", "SOLUSDT"),
    ("ripple", "XRPUSDT"),
    ("polkadot", "DOTUSDT"),
    ("chainlink", "LINKUSDT"),
    ("avalanche-2", "AVAXUSDT"),
    ("polygon", "MATICUSDT"),
];

/// Spot aggregates only: no funding rate, open interest approximated as
/// market cap / 10.
pub struct CoinGeckoClient {
    http_client: Client,
    base_rest_url: String,
}

impl CoinGeckoClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent("scalp_planner/0.1")
            .build()
            .context("Failed to build CoinGecko HTTP client")?;
        Ok(Self {
            http_client,
            base_rest_url: "https://api.coingecko.com".to_string(),
        })
    }

    fn query_string() -> Result<String> {
        let ids = COINS.iter().map(|(id, _)| *id).collect::<Vec<_>>().join(",");
        let params = [
            ("ids", ids.as_str()),
            ("vs_currencies", "usd"),
            ("include_24hr_change", "true"),
            ("include_24hr_vol", "true"),
            ("include_market_cap", "true"),
        ];
        Ok(serde_urlencoded::to_string(params)?)
    }
}

pub fn symbol_for(coin_id: &str) -> String {
    COINS
        .iter()
        .find(|(id, _)| *id == coin_id)
        .map(|(_, symbol)| symbol.to_string())
        .unwrap_or_else(|| format!("{}USDT", coin_id.to_uppercase()))
}

pub fn to_quote(coin_id: &str, price: &CoinGeckoPrice) -> AssetQuote {
    let dec = |v: f64| Decimal::from_f64(v).unwrap_or_default();
    AssetQuote {
        symbol: symbol_for(coin_id),
        price: dec(price.usd).round_dp(4),
        price_change_percent: dec(price.usd_24h_change.unwrap_or(0.0)).round_dp(2),
        volume: dec(price.usd_24h_vol.unwrap_or(1_000_000_000.0)).round_dp(0),
        open_interest: price.usd_market_cap.map(|cap| dec(cap / 10.0).round_dp(0)),
        funding_rate: None,
        technicals: None,
        tradingview: None,
        source: SOURCE.to_string(),
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoClient {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn fetch_quotes(&self) -> Result<Vec<AssetQuote>> {
        let url = format!(
            "{}/api/v3/simple/price?{}",
            self.base_rest_url,
            Self::query_string()?
        );
        let prices = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json::<HashMap<String, CoinGeckoPrice>>()
            .await
            .context("Unexpected CoinGecko payload")?;

        let mut quotes: Vec<AssetQuote> = prices
            .iter()
            .map(|(id, price)| to_quote(id, price))
            .collect();
        quotes.sort_by(|a, b| b.volume.cmp(&a.volume));

        info!("{} returned {} symbols", SOURCE, quotes.len());
        Ok(quotes)
    }
}
