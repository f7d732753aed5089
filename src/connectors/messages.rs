// src/connectors/messages.rs
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Row of GET /fapi/v1/ticker/24hr.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceTicker24h {
    pub symbol: String,
    pub last_price: Decimal,
    pub price_change_percent: Decimal,
    pub quote_volume: Decimal,
}

/// Row of GET /fapi/v1/premiumIndex.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinancePremiumIndex {
    pub symbol: String,
    pub mark_price: Decimal,
    pub last_funding_rate: Decimal,
}

/// Row of GET /fapi/v1/openInterest.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceOpenInterest {
    pub symbol: String,
    pub open_interest: Decimal,
}

/// Aggregate trade event from wss://fstream.binance.com/ws/<symbol>@aggTrade.
/// Binance uses single-letter keys.
#[derive(Debug, Deserialize)]
pub struct BinanceAggTradeEvent {
    #[serde(rename = "e")]
    pub event_type: String, // "aggTrade"

    #[serde(rename = "E")]
    pub event_time: u64,

    #[serde(rename = "s")]
    pub symbol: String,

    #[serde(rename = "p")]
    pub price: Decimal,

    #[serde(rename = "q")]
    pub quantity: Decimal,

    #[serde(rename = "T")]
    pub trade_time: u64,

    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
}

/// Per-coin entry of CoinGecko /simple/price.
#[derive(Debug, Deserialize)]
pub struct CoinGeckoPrice {
    pub usd: f64,
    #[serde(default)]
    pub usd_24h_change: Option<f64>,
    #[serde(default)]
    pub usd_24h_vol: Option<f64>,
    #[serde(default)]
    pub usd_market_cap: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

/// OpenAI-compatible chat completion request.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatReply,
}

#[derive(Debug, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub content: Option<String>,
}
