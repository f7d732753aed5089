// src/config.rs

use crate::core::advisor::AnalysisRequest;
use crate::types::{Direction, PlanParameters, RiskTolerance};
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Dashboard,
    /// One analysis printed to stdout.
    Plan,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PlannerConfig {
    /// None = auto-select the best asset.
    #[serde(default)]
    pub symbol: Option<String>,
    /// None = sized from capital and risk percentage.
    #[serde(default)]
    pub investment: Option<Decimal>,
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
    #[serde(default)]
    pub timeframe_minutes: Option<u32>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub expected_profit_percent: Option<Decimal>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            symbol: None,
            investment: None,
            leverage: default_leverage(),
            risk_tolerance: RiskTolerance::default(),
            timeframe_minutes: None,
            direction: None,
            expected_profit_percent: None,
        }
    }
}

impl PlannerConfig {
    pub fn request(&self, total_capital: Decimal, settings: &UserSettings) -> AnalysisRequest {
        let investment = self
            .investment
            .unwrap_or_else(|| settings.position_size(total_capital));
        AnalysisRequest {
            symbol: self.symbol.clone(),
            params: PlanParameters {
                investment,
                leverage: self.leverage,
                risk_tolerance: self.risk_tolerance,
                timeframe_minutes: self.timeframe_minutes,
                forced_direction: self.direction,
                expected_profit_percent: self.expected_profit_percent,
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    BinanceFutures,
    Coingecko,
    Synthetic,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MarketConfig {
    /// Tried in order; synthetic data backs them all.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderKind>,
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub stream_ticks: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            symbols: default_symbols(),
            cache_ttl_secs: default_cache_ttl(),
            poll_interval_secs: default_poll_interval(),
            monitor_interval_secs: default_monitor_interval(),
            request_timeout_secs: default_timeout(),
            stream_ticks: true,
        }
    }
}

impl MarketConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct NarrationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Falls back to GROQ_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Account preferences. Persisted with the operations; the config values
/// only seed a fresh state file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default = "default_capital")]
    pub initial_capital: Decimal,
    #[serde(default = "default_true")]
    pub auto_calculate_capital: bool,
    #[serde(default = "default_risk_percentage")]
    pub risk_percentage: Decimal,
    #[serde(default = "default_max_operations")]
    pub max_simultaneous_operations: usize,
    #[serde(default = "default_true")]
    pub enable_real_time_alerts: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            initial_capital: default_capital(),
            auto_calculate_capital: true,
            risk_percentage: default_risk_percentage(),
            max_simultaneous_operations: default_max_operations(),
            enable_real_time_alerts: true,
        }
    }
}

impl UserSettings {
    /// Capital at risk per operation.
    pub fn position_size(&self, total_capital: Decimal) -> Decimal {
        total_capital * self.risk_percentage / Decimal::ONE_HUNDRED
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub narration: NarrationConfig,
    #[serde(default)]
    pub settings: UserSettings,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// `Settings.{toml,yaml,json}` if present, then `APP_` variables,
    /// e.g. `APP_PLANNER__LEVERAGE=20`.
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("Settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("market.providers")
                    .with_list_parse_key("market.symbols"),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

fn default_true() -> bool {
    true
}

fn default_leverage() -> u32 {
    10
}

fn default_providers() -> Vec<ProviderKind> {
    vec![ProviderKind::BinanceFutures, ProviderKind::Coingecko]
}

fn default_symbols() -> Vec<String> {
    [
        "BTCUSDT", "ETHUSDT", "BNBUSDT", "ADAUSDT", "SOLUSDT", "XRPUSDT", "DOTUSDT", "LINKUSDT",
        "AVAXUSDT", "MATICUSDT",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_cache_ttl() -> u64 {
    45
}

fn default_poll_interval() -> u64 {
    60
}

fn default_monitor_interval() -> u64 {
    3
}

fn default_timeout() -> u64 {
    8
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_temperature() -> f32 {
    0.2
}

fn default_capital() -> Decimal {
    Decimal::from(1000)
}

fn default_risk_percentage() -> Decimal {
    Decimal::from(2)
}

fn default_max_operations() -> usize {
    3
}

fn default_state_file() -> String {
    "planner_state.json".to_string()
}
