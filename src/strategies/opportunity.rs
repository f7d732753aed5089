// src/strategies/opportunity.rs
//! Ranking of many assets for the "auto-select best asset" mode.
use crate::strategies::viability::{required_volatility_for_profit, required_volatility_for_timeframe};
use crate::types::{AssetQuote, Direction, PlanParameters};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

pub fn base_score() -> Decimal {
    Decimal::from(50)
}

/// 24h quote volume below this is too thin to scalp without slippage.
pub fn min_scalping_volume() -> Decimal {
    Decimal::from(100_000_000u64)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityScore {
    pub viable: bool,
    pub value: Decimal,
    pub blocking_factors: Vec<String>,
}

pub fn score(candidate: &AssetQuote, params: &PlanParameters) -> OpportunityScore {
    let volatility = candidate.volatility();
    let mut value = base_score();
    let mut viable = true;
    let mut blocking_factors = Vec::new();

    if let Some(direction) = params.forced_direction {
        let natural = Direction::from_price_change(candidate.price_change_percent);
        if direction == natural {
            value += Decimal::from(20);
        } else if volatility < Decimal::from(2) {
            blocking_factors.push("Direction against the trend with low volatility".to_string());
            viable = false;
        } else {
            value -= Decimal::from(10);
        }
    }

    if let Some(minutes) = params.timeframe_minutes {
        if volatility < required_volatility_for_timeframe(minutes) {
            blocking_factors.push(format!(
                "Volatility insufficient ({:.1}%) for {}min",
                volatility, minutes
            ));
            viable = false;
        } else {
            value += (volatility * Decimal::from(5)).min(Decimal::from(20));
        }
    }

    if let Some(expected) = params.expected_profit_percent {
        if volatility < required_volatility_for_profit(expected) {
            blocking_factors.push(format!(
                "Volatility insufficient for a {}% profit",
                expected
            ));
            viable = false;
        } else {
            value += expected.min(Decimal::from(15));
        }
    }

    if candidate.volume < min_scalping_volume() {
        blocking_factors.push("Volume insufficient for scalping".to_string());
        viable = false;
    }

    OpportunityScore {
        viable,
        value,
        blocking_factors,
    }
}

/// Market-wide reason shown when no candidate passes, checked in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockingFactor {
    ExcessiveProfitTarget,
    TimeframeTooShort,
    ConflictingDirection,
    InsufficientVolatility,
}

impl BlockingFactor {
    pub fn dominant(params: &PlanParameters) -> Self {
        if params
            .expected_profit_percent
            .is_some_and(|p| p > Decimal::from(5))
        {
            BlockingFactor::ExcessiveProfitTarget
        } else if params.timeframe_minutes.is_some_and(|m| m <= 15) {
            BlockingFactor::TimeframeTooShort
        } else if params.forced_direction.is_some() {
            BlockingFactor::ConflictingDirection
        } else {
            BlockingFactor::InsufficientVolatility
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BlockingFactor::ExcessiveProfitTarget => {
                "Expected profit too high for current conditions"
            }
            BlockingFactor::TimeframeTooShort => "Timeframe too short for current conditions",
            BlockingFactor::ConflictingDirection => "Forced direction against the market trend",
            BlockingFactor::InsufficientVolatility => "Overall volatility insufficient",
        }
    }
}

impl fmt::Display for BlockingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpportunitySearch<'a> {
    Found {
        quote: &'a AssetQuote,
        score: Decimal,
        /// Every viable candidate, the winner included.
        alternatives: usize,
    },
    NoneViable {
        analysed: usize,
        average_volatility: Decimal,
        dominant_factor: BlockingFactor,
    },
}

pub fn average_volatility(candidates: &[AssetQuote]) -> Decimal {
    if candidates.is_empty() {
        return Decimal::ZERO;
    }
    let total: Decimal = candidates.iter().map(AssetQuote::volatility).sum();
    total / Decimal::from(candidates.len())
}

pub fn find_best_opportunity<'a>(
    candidates: &'a [AssetQuote],
    params: &PlanParameters,
) -> OpportunitySearch<'a> {
    let mut best: Option<(&AssetQuote, Decimal)> = None;
    let mut alternatives = 0;

    for candidate in candidates {
        let result = score(candidate, params);
        if !result.viable {
            debug!(
                "{} rejected: {}",
                candidate.symbol,
                result.blocking_factors.join("; ")
            );
            continue;
        }
        alternatives += 1;
        // Strictly greater: the first of equal scores keeps the slot.
        if best.map_or(true, |(_, s)| result.value > s) {
            best = Some((candidate, result.value));
        }
    }

    debug!(
        "{} viable opportunities out of {}",
        alternatives,
        candidates.len()
    );

    match best {
        Some((quote, score)) => OpportunitySearch::Found {
            quote,
            score,
            alternatives,
        },
        None => OpportunitySearch::NoneViable {
            analysed: candidates.len(),
            average_volatility: average_volatility(candidates),
            dominant_factor: BlockingFactor::dominant(params),
        },
    }
}
