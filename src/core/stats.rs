// src/core/stats.rs
use crate::config::UserSettings;
use crate::core::operations::TradingOperation;
use crate::types::Direction;
use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use serde::Serialize;

/// Aggregates over closed operations. Derived only; recompute after every
/// change to the operation list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingStats {
    pub total_capital: Decimal,
    pub total_operations: usize,
    pub today_operations: usize,
    pub total_profit: Decimal,
    pub today_profit: Decimal,
    pub success_rate: Decimal,
    pub average_duration_minutes: Decimal,
    pub long_operations: usize,
    pub short_operations: usize,
}

pub fn compute_stats(
    operations: &[TradingOperation],
    settings: &UserSettings,
    now: DateTime<Local>,
) -> TradingStats {
    let today = now.date_naive();
    let closed: Vec<&TradingOperation> = operations
        .iter()
        .filter(|op| op.status().is_terminal())
        .collect();

    let profit_of = |op: &&TradingOperation| op.actual_profit().unwrap_or(Decimal::ZERO);

    let is_today = |op: &&&TradingOperation| {
        op.end_time()
            .map(|end| end.with_timezone(&Local).date_naive() == today)
            .unwrap_or(false)
    };

    let total_profit: Decimal = closed.iter().map(profit_of).sum();
    let today_ops: Vec<&&TradingOperation> = closed.iter().filter(is_today).collect();
    let today_profit: Decimal = today_ops.iter().map(|op| profit_of(*op)).sum();

    let successful = closed
        .iter()
        .filter(|op| op.actual_profit().map_or(false, |p| p > Decimal::ZERO))
        .count();
    let success_rate = if closed.is_empty() {
        Decimal::ZERO
    } else {
        Decimal::from(successful) * Decimal::ONE_HUNDRED / Decimal::from(closed.len())
    };

    let durations: Vec<Decimal> = closed
        .iter()
        .filter_map(|op| {
            op.end_time().map(|end| {
                Decimal::from((end - op.start_time()).num_milliseconds()) / Decimal::from(60_000)
            })
        })
        .collect();
    let average_duration_minutes = if durations.is_empty() {
        Decimal::ZERO
    } else {
        durations.iter().sum::<Decimal>() / Decimal::from(durations.len())
    };

    let count_direction = |dir: Direction| closed.iter().filter(|op| op.direction == dir).count();

    let total_capital = if settings.auto_calculate_capital {
        settings.initial_capital + total_profit
    } else {
        settings.initial_capital
    };

    TradingStats {
        total_capital,
        total_operations: closed.len(),
        today_operations: today_ops.len(),
        total_profit,
        today_profit,
        success_rate,
        average_duration_minutes,
        long_operations: count_direction(Direction::Long),
        short_operations: count_direction(Direction::Short),
    }
}
