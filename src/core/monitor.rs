// src/core/monitor.rs
use crate::core::operations::{OperationBook, TradingOperation};
use crate::strategies::pnl::{compute_pnl, PnlBreakdown};
use crate::types::{Direction, PriceTick};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    TargetReached,
    StopReached,
    InRange,
}

/// Where `price` sits relative to the operation's exit and stop levels.
/// Only meaningful for ACTIVE operations.
pub fn classify_tick(op: &TradingOperation, price: Decimal) -> TickOutcome {
    let (target_hit, stop_hit) = match op.direction {
        Direction::Long => (price >= op.exit_price, price <= op.stop_loss),
        Direction::Short => (price <= op.exit_price, price >= op.stop_loss),
    };
    if target_hit {
        TickOutcome::TargetReached
    } else if stop_hit {
        TickOutcome::StopReached
    } else {
        TickOutcome::InRange
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionAlert {
    pub operation_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub outcome: TickOutcome,
    pub price: Decimal,
    pub pnl: PnlBreakdown,
}

impl PositionAlert {
    pub fn message(&self) -> String {
        let label = match self.outcome {
            TickOutcome::TargetReached => "Take profit reached",
            TickOutcome::StopReached => "Stop loss reached",
            TickOutcome::InRange => "In range",
        };
        format!(
            "{}: {} {} @ {} (net {:.2})",
            label, self.symbol, self.direction, self.price, self.pnl.net
        )
    }
}

/// Latest price per symbol plus the set of operations already alerted.
#[derive(Debug, Default)]
pub struct PositionMonitor {
    latest: HashMap<String, Decimal>,
    alerted: HashSet<String>,
}

impl PositionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tick(&mut self, tick: &PriceTick) {
        self.latest.insert(tick.symbol.clone(), tick.price);
    }

    pub fn update_price(&mut self, symbol: &str, price: Decimal) {
        self.latest.insert(symbol.to_string(), price);
    }

    pub fn latest_price(&self, symbol: &str) -> Option<Decimal> {
        self.latest.get(symbol).copied()
    }

    /// One pass over the active operations. Each operation alerts at most
    /// once; nothing is emitted while `alerts_enabled` is off.
    pub fn check(&mut self, book: &OperationBook, alerts_enabled: bool) -> Vec<PositionAlert> {
        // Closed or deleted operations release their slot.
        self.alerted
            .retain(|id| book.get(id).map_or(false, |op| op.is_active()));

        if !alerts_enabled {
            return Vec::new();
        }

        let mut alerts = Vec::new();
        for op in book.active() {
            if self.alerted.contains(&op.id) {
                continue;
            }
            let Some(price) = self.latest_price(&op.symbol) else {
                continue;
            };
            let outcome = classify_tick(op, price);
            if outcome == TickOutcome::InRange {
                continue;
            }
            let pnl = compute_pnl(
                op.direction,
                op.entry_price,
                price,
                op.investment,
                op.leverage,
                op.fees,
                op.funding_cost,
            );
            let alert = PositionAlert {
                operation_id: op.id.clone(),
                symbol: op.symbol.clone(),
                direction: op.direction,
                outcome,
                price,
                pnl,
            };
            info!("{}", alert.message());
            self.alerted.insert(op.id.clone());
            alerts.push(alert);
        }
        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DurationEstimate, ScalpingPlan};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn active_book(direction: Direction, exit: Decimal, stop: Decimal) -> (OperationBook, String) {
        let plan = ScalpingPlan {
            symbol: "SOLUSDT".to_string(),
            direction,
            entry_price: dec!(100),
            exit_price: exit,
            stop_loss: stop,
            leverage: 10,
            investment: dec!(100),
            target_profit_percent: dec!(2),
            stop_loss_percent: dec!(1),
            expected_profit: dec!(20),
            risk_reward: dec!(2),
            duration: DurationEstimate::Fast,
            success_rate: dec!(70),
            fees: dec!(0.8),
            net_profit: dec!(19.2),
            funding_cost: Decimal::ZERO,
        };
        let mut book = OperationBook::default();
        let id = book.add(&plan, String::new(), Utc::now());
        book.start(&id, Utc::now()).unwrap();
        (book, id)
    }

    #[test]
    fn test_classify_long() {
        let (book, id) = active_book(Direction::Long, dec!(102), dec!(99));
        let op = book.get(&id).unwrap();
        assert_eq!(classify_tick(op, dec!(102.5)), TickOutcome::TargetReached);
        assert_eq!(classify_tick(op, dec!(98.9)), TickOutcome::StopReached);
        assert_eq!(classify_tick(op, dec!(101)), TickOutcome::InRange);
    }

    #[test]
    fn test_classify_short() {
        let (book, id) = active_book(Direction::Short, dec!(98), dec!(101));
        let op = book.get(&id).unwrap();
        assert_eq!(classify_tick(op, dec!(97.9)), TickOutcome::TargetReached);
        assert_eq!(classify_tick(op, dec!(101)), TickOutcome::StopReached);
        assert_eq!(classify_tick(op, dec!(99.5)), TickOutcome::InRange);
    }

    #[test]
    fn test_alert_once_per_operation() {
        let (book, id) = active_book(Direction::Long, dec!(102), dec!(99));
        let mut monitor = PositionMonitor::new();

        assert!(monitor.check(&book, true).is_empty());

        monitor.update_price("SOLUSDT", dec!(102.5));
        let alerts = monitor.check(&book, true);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].operation_id, id);
        assert_eq!(alerts[0].outcome, TickOutcome::TargetReached);
        assert_eq!(alerts[0].pnl.net, dec!(24.2));

        monitor.update_price("SOLUSDT", dec!(98));
        assert!(monitor.check(&book, true).is_empty());
    }

    #[test]
    fn test_alerts_disabled() {
        let (book, _) = active_book(Direction::Long, dec!(102), dec!(99));
        let mut monitor = PositionMonitor::new();
        monitor.update_price("SOLUSDT", dec!(90));
        assert!(monitor.check(&book, false).is_empty());
    }
}
