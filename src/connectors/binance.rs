// src/connectors/binance.rs
use crate::connectors::messages::{
    BinanceAggTradeEvent, BinanceOpenInterest, BinancePremiumIndex, BinanceTicker24h,
};
use crate::connectors::traits::{MarketDataProvider, StreamClient};
use crate::types::{AssetQuote, PriceTick};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use futures_util::StreamExt;
use reqwest::Client;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};
use url::Url;

const SOURCE: &str = "Binance Futures";

/// USDT-margined perpetuals: 24h tickers, funding and open interest over REST,
/// live prices over the aggTrade websocket.
pub struct BinanceFuturesClient {
    http_client: Client,
    base_rest_url: String,
    base_ws_url: String,
    symbols: Vec<String>,
}

impl BinanceFuturesClient {
    pub fn new(symbols: Vec<String>, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Binance HTTP client")?;
        Ok(Self {
            http_client,
            base_rest_url: "https://fapi.binance.com".to_string(),
            base_ws_url: "wss://fstream.binance.com/ws".to_string(),
            symbols,
        })
    }

    async fn get_json<T: for<'de> serde::Deserialize<'de>>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}{}", self.base_rest_url, endpoint);
        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    async fn open_interest(&self, symbol: &str) -> Option<Decimal> {
        let endpoint = format!("/fapi/v1/openInterest?symbol={}", symbol);
        match self.get_json::<BinanceOpenInterest>(&endpoint).await {
            Ok(oi) => Some(oi.open_interest),
            Err(e) => {
                debug!("Open interest unavailable for {}: {}", symbol, e);
                None
            }
        }
    }

    fn is_watched(&self, symbol: &str) -> bool {
        self.symbols.is_empty() || self.symbols.iter().any(|s| s == symbol)
    }
}

#[async_trait]
impl MarketDataProvider for BinanceFuturesClient {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn fetch_quotes(&self) -> Result<Vec<AssetQuote>> {
        let (tickers, premiums) = futures::try_join!(
            self.get_json::<Vec<BinanceTicker24h>>("/fapi/v1/ticker/24hr"),
            self.get_json::<Vec<BinancePremiumIndex>>("/fapi/v1/premiumIndex"),
        )
        .context("Binance futures snapshot failed")?;

        let premiums: HashMap<String, BinancePremiumIndex> = premiums
            .into_iter()
            .map(|p| (p.symbol.clone(), p))
            .collect();

        let watched: Vec<BinanceTicker24h> = tickers
            .into_iter()
            .filter(|t| self.is_watched(&t.symbol))
            .collect();

        // Open interest is per-symbol; fetch concurrently and tolerate gaps.
        let open_interest = join_all(watched.iter().map(|t| self.open_interest(&t.symbol))).await;

        let quotes: Vec<AssetQuote> = watched
            .into_iter()
            .zip(open_interest)
            .map(|(t, oi)| {
                let premium = premiums.get(&t.symbol);
                let mark = premium.map(|p| p.mark_price).unwrap_or(t.last_price);
                AssetQuote {
                    open_interest: oi.map(|contracts| contracts * mark),
                    funding_rate: premium.map(|p| p.last_funding_rate),
                    symbol: t.symbol,
                    price: t.last_price,
                    price_change_percent: t.price_change_percent,
                    volume: t.quote_volume,
                    technicals: None,
                    tradingview: None,
                    source: SOURCE.to_string(),
                }
            })
            .collect();

        info!("{} returned {} symbols", SOURCE, quotes.len());
        Ok(quotes)
    }
}

#[async_trait]
impl StreamClient for BinanceFuturesClient {
    async fn subscribe_ticker(
        &self,
        symbol: &str,
        sender: mpsc::Sender<PriceTick>,
    ) -> Result<JoinHandle<()>> {
        let ws_url = format!("{}/{}@aggTrade", self.base_ws_url, symbol.to_lowercase());
        let url = Url::parse(&ws_url)?;

        info!("Starting WebSocket task for: {}", symbol);

        let symbol = symbol.to_string();
        let handle = tokio::spawn(async move {
            match connect_async(url).await {
                Ok((ws_stream, _)) => {
                    let (_, mut read) = ws_stream.split();
                    info!("WebSocket connected for {}", symbol);

                    while let Some(message) = read.next().await {
                        let msg = match message {
                            Ok(msg) => msg,
                            Err(e) => {
                                error!("WebSocket Error for {}: {}", symbol, e);
                                break;
                            }
                        };
                        let Ok(text) = msg.to_text() else { continue };
                        match serde_json::from_str::<BinanceAggTradeEvent>(text) {
                            Ok(event) => {
                                let tick = PriceTick {
                                    symbol: event.symbol,
                                    price: event.price,
                                    timestamp: Utc::now().timestamp_millis() as u64,
                                };
                                if sender.send(tick).await.is_err() {
                                    // Engine gone.
                                    break;
                                }
                            }
                            Err(e) => debug!("Skipping frame for {}: {}", symbol, e),
                        }
                    }
                }
                Err(e) => warn!("Failed to connect WebSocket for {}: {}", symbol, e),
            }
            info!("WebSocket task finished for {}", symbol);
        });

        Ok(handle)
    }
}
