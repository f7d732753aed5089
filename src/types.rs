// src/types.rs
use crate::core::advisor::Analysis;
use crate::core::operations::TradingOperation;
use crate::core::stats::TradingStats;
use crate::error::PlannerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "LONG", alias = "long", alias = "Long")]
    Long,
    #[serde(rename = "SHORT", alias = "short", alias = "Short")]
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }

    /// Natural bias of a 24h move: positive change favours LONG, anything else SHORT.
    pub fn from_price_change(change_percent: Decimal) -> Self {
        if change_percent > Decimal::ZERO {
            Direction::Long
        } else {
            Direction::Short
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" => Ok(Direction::Long),
            "SHORT" => Ok(Direction::Short),
            other => Err(PlannerError::InvalidParameters(format!(
                "unknown direction '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskTolerance {
    /// 0.5 / 1.0 / 1.5
    pub fn multiplier(&self) -> Decimal {
        match self {
            RiskTolerance::Low => Decimal::new(5, 1),
            RiskTolerance::Medium => Decimal::ONE,
            RiskTolerance::High => Decimal::new(15, 1),
        }
    }
}

/// One row of a market data feed. Regenerated on every poll; only `symbol`
/// identifies a quote across fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetQuote {
    pub symbol: String,
    pub price: Decimal,
    pub price_change_percent: Decimal, // 24h, signed percent
    pub volume: Decimal,               // quote currency
    #[serde(default)]
    pub open_interest: Option<Decimal>,
    #[serde(default)]
    pub funding_rate: Option<Decimal>, // per 8h interval
    #[serde(default)]
    pub technicals: Option<TechnicalSnapshot>,
    #[serde(default)]
    pub tradingview: Option<ExternalRecommendation>,
    #[serde(default)]
    pub source: String,
}

impl AssetQuote {
    /// |24h change| stands in for volatility everywhere in the planner.
    pub fn volatility(&self) -> Decimal {
        self.price_change_percent.abs()
    }

    pub fn funding_rate_or_zero(&self) -> Decimal {
        self.funding_rate.unwrap_or(Decimal::ZERO)
    }
}

// --- Technical indicators (opaque inputs, real or synthetic) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RsiSignal {
    Oversold,
    Overbought,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiReading {
    pub value: f64,
    pub signal: RsiSignal,
}

impl RsiReading {
    pub fn is_oversold(&self) -> bool {
        self.signal == RsiSignal::Oversold || self.value < 30.0
    }

    pub fn is_overbought(&self) -> bool {
        self.signal == RsiSignal::Overbought || self.value > 70.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MacdTrend {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    pub trend: MacdTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BollingerReading {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub position: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmaTrend {
    #[serde(rename = "UP", alias = "UPTREND")]
    Up,
    #[serde(rename = "DOWN", alias = "DOWNTREND")]
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmaReading {
    pub ema20: f64,
    pub ema50: f64,
    pub trend: EmaTrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeReading {
    pub current: f64,
    pub average: f64,
    pub trend: VolumeTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportResistance {
    pub support: f64,
    pub resistance: f64,
    pub strength: f64,
}

/// Any section may be missing; a missing section contributes nothing to
/// direction or score decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    #[serde(default)]
    pub rsi: Option<RsiReading>,
    #[serde(default)]
    pub macd: Option<MacdReading>,
    #[serde(default)]
    pub bollinger: Option<BollingerReading>,
    #[serde(default)]
    pub ema: Option<EmaReading>,
    #[serde(default)]
    pub volume: Option<VolumeReading>,
    #[serde(default)]
    pub support_resistance: Option<SupportResistance>,
}

impl TechnicalSnapshot {
    pub fn macd_trend(&self) -> Option<MacdTrend> {
        self.macd.as_ref().map(|m| m.trend)
    }

    pub fn ema_trend(&self) -> Option<EmaTrend> {
        self.ema.as_ref().map(|e| e.trend)
    }

    pub fn volume_increasing(&self) -> bool {
        matches!(
            self.volume.as_ref().map(|v| v.trend),
            Some(VolumeTrend::Increasing)
        )
    }

    /// MACD and EMA pointing the same way.
    pub fn trend_confluence(&self) -> bool {
        matches!(
            (self.macd_trend(), self.ema_trend()),
            (Some(MacdTrend::Bullish), Some(EmaTrend::Up))
                | (Some(MacdTrend::Bearish), Some(EmaTrend::Down))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Sell,
    Neutral,
}

/// TradingView-style rating attached to some feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRecommendation {
    pub recommendation: Recommendation,
    pub oscillators: f64,
    pub moving_averages: f64,
    pub summary: f64,
    pub confidence: f64,
}

// --- Planning ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanParameters {
    pub investment: Decimal,
    pub leverage: u32,
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
    #[serde(default)]
    pub timeframe_minutes: Option<u32>,
    #[serde(default)]
    pub forced_direction: Option<Direction>,
    #[serde(default)]
    pub expected_profit_percent: Option<Decimal>,
}

impl PlanParameters {
    pub fn new(investment: Decimal, leverage: u32, risk_tolerance: RiskTolerance) -> Self {
        Self {
            investment,
            leverage,
            risk_tolerance,
            timeframe_minutes: None,
            forced_direction: None,
            expected_profit_percent: None,
        }
    }

    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.investment <= Decimal::ZERO {
            return Err(PlannerError::InvalidParameters(format!(
                "investment must be positive, got {}",
                self.investment
            )));
        }
        if self.leverage == 0 {
            return Err(PlannerError::InvalidParameters(
                "leverage must be at least 1".to_string(),
            ));
        }
        if self.timeframe_minutes == Some(0) {
            return Err(PlannerError::InvalidParameters(
                "timeframe must be positive".to_string(),
            ));
        }
        if let Some(p) = self.expected_profit_percent {
            if p <= Decimal::ZERO {
                return Err(PlannerError::InvalidParameters(format!(
                    "expected profit must be positive, got {}%",
                    p
                )));
            }
            // A 100% target puts a SHORT exit at zero.
            if p >= Decimal::ONE_HUNDRED {
                return Err(PlannerError::InvalidParameters(format!(
                    "expected profit must be below 100%, got {}%",
                    p
                )));
            }
        }
        Ok(())
    }

    pub fn notional(&self) -> Decimal {
        self.investment * Decimal::from(self.leverage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationEstimate {
    #[serde(rename = "3-8 min")]
    Fast,
    #[serde(rename = "8-15 min")]
    Medium,
    #[serde(rename = "15-30 min")]
    Slow,
}

impl DurationEstimate {
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationEstimate::Fast => "3-8 min",
            DurationEstimate::Medium => "8-15 min",
            DurationEstimate::Slow => "15-30 min",
        }
    }
}

impl fmt::Display for DurationEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalpingPlan {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub stop_loss: Decimal,
    pub leverage: u32,
    pub investment: Decimal,
    pub target_profit_percent: Decimal,
    pub stop_loss_percent: Decimal,
    pub expected_profit: Decimal, // gross
    pub risk_reward: Decimal,
    pub duration: DurationEstimate,
    pub success_rate: Decimal,
    pub fees: Decimal,
    pub net_profit: Decimal,
    pub funding_cost: Decimal,
}

// --- Live ticks ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: u64,
}

// --- Engine <-> dashboard ---

#[derive(Debug, Clone)]
pub enum UiEvent {
    MarketUpdate(Vec<AssetQuote>),
    PriceUpdate(PriceTick),
    Analysis(Box<Analysis>),
    Operations {
        operations: Vec<TradingOperation>,
        stats: TradingStats,
    },
    Alert(String),
    Log(String),
}

/// Key-driven requests from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    Plan,
    Commit,
    StartNext,
    CloseNext,
    DeleteNext,
}
