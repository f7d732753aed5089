// src/strategies/viability.rs
//! Pass/fail gate for a single asset against the caller's constraints.
//!
//! Every rule runs; all failing reasons are collected so the caller can show
//! the full picture rather than the first problem only.
use crate::types::{AssetQuote, Direction, MacdTrend, PlanParameters, TechnicalSnapshot};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViabilityReport {
    pub viable: bool,
    pub blocking_factors: Vec<String>,
}

impl ViabilityReport {
    pub fn reason(&self) -> Option<&str> {
        self.blocking_factors.first().map(String::as_str)
    }
}

/// Shorter holds need bigger moves: <=15min 3%, <=30min 2%, otherwise 1%.
pub fn required_volatility_for_timeframe(minutes: u32) -> Decimal {
    if minutes <= 15 {
        Decimal::from(3)
    } else if minutes <= 30 {
        Decimal::from(2)
    } else {
        Decimal::ONE
    }
}

pub fn required_volatility_for_profit(expected_profit_percent: Decimal) -> Decimal {
    expected_profit_percent * Decimal::new(3, 1)
}

/// |funding| above 1% per interval makes long holds too expensive.
pub fn funding_rate_ceiling() -> Decimal {
    Decimal::new(1, 2)
}

pub const LONG_HOLD_MINUTES: u32 = 30;

pub fn evaluate(
    candidate: &AssetQuote,
    technicals: Option<&TechnicalSnapshot>,
    params: &PlanParameters,
) -> ViabilityReport {
    let technicals = technicals.or(candidate.technicals.as_ref());
    let volatility = candidate.volatility();
    let mut blocking_factors = Vec::new();

    if let Some(direction) = params.forced_direction {
        if let Some(reason) = momentum_conflict(direction, technicals) {
            blocking_factors.push(reason);
        }
    }

    if let Some(minutes) = params.timeframe_minutes {
        let required = required_volatility_for_timeframe(minutes);
        if volatility < required {
            blocking_factors.push(format!(
                "Current volatility ({:.1}%) is below the {}% required for {} minutes",
                volatility, required, minutes
            ));
        }
    }

    if let Some(expected) = params.expected_profit_percent {
        let required = required_volatility_for_profit(expected);
        if volatility < required {
            blocking_factors.push(format!(
                "Volatility ({:.1}%) insufficient for a {}% profit target (needs {:.1}%)",
                volatility, expected, required
            ));
        }
    }

    if let (Some(rate), Some(minutes)) = (candidate.funding_rate, params.timeframe_minutes) {
        if rate.abs() > funding_rate_ceiling() && minutes > LONG_HOLD_MINUTES {
            blocking_factors.push(format!(
                "Funding rate ({}) too costly for a {}-minute hold",
                rate, minutes
            ));
        }
    }

    ViabilityReport {
        viable: blocking_factors.is_empty(),
        blocking_factors,
    }
}

// RSI defaults to a neutral 50 when absent; a missing MACD never conflicts.
fn momentum_conflict(direction: Direction, technicals: Option<&TechnicalSnapshot>) -> Option<String> {
    let rsi = technicals
        .and_then(|t| t.rsi.as_ref())
        .map(|r| r.value)
        .unwrap_or(50.0);
    let macd = technicals.and_then(|t| t.macd_trend());

    match (direction, macd) {
        (Direction::Long, Some(MacdTrend::Bearish)) if rsi > 75.0 => Some(format!(
            "Extreme indicator conflict: RSI overbought ({:.1}) with bearish MACD",
            rsi
        )),
        (Direction::Short, Some(MacdTrend::Bullish)) if rsi < 25.0 => Some(format!(
            "Extreme indicator conflict: RSI oversold ({:.1}) with bullish MACD",
            rsi
        )),
        _ => None,
    }
}
