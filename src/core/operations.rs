// src/core/operations.rs
use crate::error::PlannerError;
use crate::strategies::pnl::compute_pnl;
use crate::types::{Direction, DurationEstimate, ScalpingPlan};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationStatus {
    Planned,
    Active,
    Completed,
    Stopped,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Planned => "PLANNED",
            OperationStatus::Active => "ACTIVE",
            OperationStatus::Completed => "COMPLETED",
            OperationStatus::Stopped => "STOPPED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Stopped)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A committed plan with its lifecycle. Status, timestamps and the realized
/// result only change through [`OperationBook`] transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingOperation {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub stop_loss: Decimal,
    pub leverage: u32,
    pub investment: Decimal,
    status: OperationStatus,
    start_time: DateTime<Utc>,
    #[serde(default)]
    end_time: Option<DateTime<Utc>>,
    pub planned_profit: Decimal,
    #[serde(default)]
    actual_profit: Option<Decimal>,
    pub fees: Decimal,
    pub funding_cost: Decimal,
    pub duration: DurationEstimate,
    pub success_rate: Decimal,
    #[serde(default)]
    pub ai_recommendation: String,
}

impl TradingOperation {
    pub fn from_plan(plan: &ScalpingPlan, recommendation: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            symbol: plan.symbol.clone(),
            direction: plan.direction,
            entry_price: plan.entry_price,
            exit_price: plan.exit_price,
            stop_loss: plan.stop_loss,
            leverage: plan.leverage,
            investment: plan.investment,
            status: OperationStatus::Planned,
            start_time: now,
            end_time: None,
            planned_profit: plan.expected_profit,
            actual_profit: None,
            fees: plan.fees,
            funding_cost: plan.funding_cost,
            duration: plan.duration,
            success_rate: plan.success_rate,
            ai_recommendation: recommendation,
        }
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn actual_profit(&self) -> Option<Decimal> {
        self.actual_profit
    }

    pub fn is_active(&self) -> bool {
        self.status == OperationStatus::Active
    }

    /// Whole minutes between start and end; None while open.
    pub fn duration_minutes(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_minutes())
    }

    fn finish(&mut self, status: OperationStatus, profit: Decimal, exit: Decimal, now: DateTime<Utc>) {
        self.status = status;
        self.actual_profit = Some(profit);
        self.exit_price = exit;
        self.end_time = Some(now.max(self.start_time));
    }
}

/// In-memory operation list; the single writer of every [`TradingOperation`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationBook {
    operations: Vec<TradingOperation>,
}

impl OperationBook {
    pub fn new(operations: Vec<TradingOperation>) -> Self {
        Self { operations }
    }

    pub fn all(&self) -> &[TradingOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TradingOperation> {
        self.operations.iter().find(|op| op.id == id)
    }

    pub fn active(&self) -> impl Iterator<Item = &TradingOperation> {
        self.operations.iter().filter(|op| op.is_active())
    }

    pub fn planned(&self) -> impl Iterator<Item = &TradingOperation> {
        self.operations
            .iter()
            .filter(|op| op.status == OperationStatus::Planned)
    }

    pub fn closed(&self) -> impl Iterator<Item = &TradingOperation> {
        self.operations.iter().filter(|op| op.status.is_terminal())
    }

    /// Commits a plan as a new PLANNED operation and returns its id.
    pub fn add(&mut self, plan: &ScalpingPlan, recommendation: String, now: DateTime<Utc>) -> String {
        let op = TradingOperation::from_plan(plan, recommendation, now);
        let id = op.id.clone();
        info!("Operation {} planned: {} {}", id, op.direction, op.symbol);
        self.operations.push(op);
        id
    }

    /// Fails with `TooManyActive` once `limit` operations are running.
    pub fn ensure_capacity(&self, limit: usize) -> Result<(), PlannerError> {
        if self.active().count() >= limit {
            return Err(PlannerError::TooManyActive { limit });
        }
        Ok(())
    }

    fn transition(
        &mut self,
        id: &str,
        expected: OperationStatus,
        action: &'static str,
    ) -> Result<&mut TradingOperation, PlannerError> {
        let op = self
            .operations
            .iter_mut()
            .find(|op| op.id == id)
            .ok_or_else(|| PlannerError::OperationNotFound(id.to_string()))?;
        if op.status != expected {
            warn!("Rejected {} on {}: status is {}", action, id, op.status);
            return Err(PlannerError::InvalidTransition {
                id: id.to_string(),
                from: op.status,
                action,
            });
        }
        Ok(op)
    }

    /// PLANNED -> ACTIVE; the start time is reset to the activation instant.
    pub fn start(&mut self, id: &str, now: DateTime<Utc>) -> Result<(), PlannerError> {
        let op = self.transition(id, OperationStatus::Planned, "start")?;
        op.status = OperationStatus::Active;
        op.start_time = now;
        info!("Operation {} active at {}", id, op.entry_price);
        Ok(())
    }

    pub fn complete(
        &mut self,
        id: &str,
        actual_profit: Decimal,
        exit_price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), PlannerError> {
        if actual_profit < Decimal::ZERO {
            return Err(PlannerError::InvalidParameters(format!(
                "completed operation needs a non-negative profit, got {}",
                actual_profit
            )));
        }
        let op = self.transition(id, OperationStatus::Active, "complete")?;
        op.finish(OperationStatus::Completed, actual_profit, exit_price, now);
        info!("Operation {} completed: {}", id, actual_profit);
        Ok(())
    }

    /// The loss is given as a magnitude and stored as a negative profit.
    pub fn stop(
        &mut self,
        id: &str,
        actual_loss: Decimal,
        exit_price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), PlannerError> {
        if actual_loss < Decimal::ZERO {
            return Err(PlannerError::InvalidParameters(format!(
                "loss is a magnitude, got {}",
                actual_loss
            )));
        }
        let op = self.transition(id, OperationStatus::Active, "stop")?;
        op.finish(OperationStatus::Stopped, -actual_loss, exit_price, now);
        info!("Operation {} stopped: -{}", id, actual_loss);
        Ok(())
    }

    /// Manual close at market. Net result decides COMPLETED or STOPPED.
    pub fn close_at_price(
        &mut self,
        id: &str,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Decimal, PlannerError> {
        let op = self
            .get(id)
            .ok_or_else(|| PlannerError::OperationNotFound(id.to_string()))?;
        let pnl = compute_pnl(
            op.direction,
            op.entry_price,
            price,
            op.investment,
            op.leverage,
            op.fees,
            op.funding_cost,
        );
        if pnl.is_profit() {
            self.complete(id, pnl.net, price, now)?;
        } else {
            self.stop(id, pnl.net.abs(), price, now)?;
        }
        Ok(pnl.net)
    }

    pub fn delete(&mut self, id: &str) -> Result<TradingOperation, PlannerError> {
        let idx = self
            .operations
            .iter()
            .position(|op| op.id == id)
            .ok_or_else(|| PlannerError::OperationNotFound(id.to_string()))?;
        Ok(self.operations.remove(idx))
    }

    pub fn delete_all(&mut self) {
        self.operations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn sample_plan(direction: Direction) -> ScalpingPlan {
        let (exit, stop) = match direction {
            Direction::Long => (dec!(102), dec!(99)),
            Direction::Short => (dec!(98), dec!(101)),
        };
        ScalpingPlan {
            symbol: "BTCUSDT".to_string(),
            direction,
            entry_price: dec!(100),
            exit_price: exit,
            stop_loss: stop,
            leverage: 10,
            investment: dec!(100),
            target_profit_percent: dec!(0.5),
            stop_loss_percent: dec!(0.3),
            expected_profit: dec!(5.0),
            risk_reward: dec!(1.67),
            duration: DurationEstimate::Medium,
            success_rate: dec!(70),
            fees: dec!(0.8),
            net_profit: dec!(4.2),
            funding_cost: Decimal::ZERO,
        }
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let t0 = Utc::now();
        let mut book = OperationBook::default();
        let id = book.add(&sample_plan(Direction::Long), "LONG".into(), t0);
        assert_eq!(book.get(&id).unwrap().status(), OperationStatus::Planned);

        let t1 = t0 + Duration::minutes(5);
        book.start(&id, t1).unwrap();
        assert_eq!(book.get(&id).unwrap().start_time(), t1);

        let t2 = t1 + Duration::minutes(12);
        book.complete(&id, dec!(4.1), dec!(102.1), t2).unwrap();
        let op = book.get(&id).unwrap();
        assert_eq!(op.status(), OperationStatus::Completed);
        assert_eq!(op.actual_profit(), Some(dec!(4.1)));
        assert_eq!(op.exit_price, dec!(102.1));
        assert_eq!(op.duration_minutes(), Some(12));
    }

    #[test]
    fn test_stop_records_negative_profit() {
        let t0 = Utc::now();
        let mut book = OperationBook::default();
        let id = book.add(&sample_plan(Direction::Long), String::new(), t0);
        book.start(&id, t0).unwrap();
        book.stop(&id, dec!(3.5), dec!(99), t0).unwrap();
        let op = book.get(&id).unwrap();
        assert_eq!(op.status(), OperationStatus::Stopped);
        assert_eq!(op.actual_profit(), Some(dec!(-3.5)));
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let t0 = Utc::now();
        let mut book = OperationBook::default();
        let id = book.add(&sample_plan(Direction::Long), String::new(), t0);

        let err = book.complete(&id, dec!(1), dec!(101), t0).unwrap_err();
        assert_eq!(
            err,
            PlannerError::InvalidTransition {
                id: id.clone(),
                from: OperationStatus::Planned,
                action: "complete",
            }
        );
        assert_eq!(book.get(&id).unwrap().status(), OperationStatus::Planned);

        book.start(&id, t0).unwrap();
        book.stop(&id, dec!(1), dec!(99), t0).unwrap();
        assert!(book.start(&id, t0).is_err());
        assert!(book.complete(&id, dec!(1), dec!(101), t0).is_err());
        assert_eq!(book.get(&id).unwrap().actual_profit(), Some(dec!(-1)));
    }

    #[test]
    fn test_result_sign_matches_status() {
        let t0 = Utc::now();
        let mut book = OperationBook::default();
        let a = book.add(&sample_plan(Direction::Long), String::new(), t0);
        let b = book.add(&sample_plan(Direction::Short), String::new(), t0);
        book.start(&a, t0).unwrap();
        book.start(&b, t0).unwrap();

        assert!(matches!(
            book.complete(&a, dec!(-7), dec!(99), t0),
            Err(PlannerError::InvalidParameters(_))
        ));
        assert!(matches!(
            book.stop(&b, dec!(-5), dec!(99), t0),
            Err(PlannerError::InvalidParameters(_))
        ));
        assert_eq!(book.get(&a).unwrap().status(), OperationStatus::Active);
        assert_eq!(book.get(&b).unwrap().status(), OperationStatus::Active);

        book.complete(&a, Decimal::ZERO, dec!(100), t0).unwrap();
        book.stop(&b, dec!(5), dec!(101), t0).unwrap();
        assert_eq!(book.get(&a).unwrap().actual_profit(), Some(Decimal::ZERO));
        assert_eq!(book.get(&b).unwrap().actual_profit(), Some(dec!(-5)));
    }

    #[test]
    fn test_unknown_id() {
        let mut book = OperationBook::default();
        assert_eq!(
            book.start("nope", Utc::now()),
            Err(PlannerError::OperationNotFound("nope".into()))
        );
        assert!(book.delete("nope").is_err());
    }

    #[test]
    fn test_end_time_never_before_start() {
        let t0 = Utc::now();
        let mut book = OperationBook::default();
        let id = book.add(&sample_plan(Direction::Short), String::new(), t0);
        book.start(&id, t0).unwrap();
        book.complete(&id, dec!(1), dec!(98), t0 - Duration::minutes(3)).unwrap();
        let op = book.get(&id).unwrap();
        assert!(op.end_time().unwrap() >= op.start_time());
    }

    #[test]
    fn test_close_at_price_routes_by_sign() {
        let t0 = Utc::now();
        let mut book = OperationBook::default();
        let win = book.add(&sample_plan(Direction::Long), String::new(), t0);
        let loss = book.add(&sample_plan(Direction::Long), String::new(), t0);
        book.start(&win, t0).unwrap();
        book.start(&loss, t0).unwrap();

        // +1% on 1000 notional = 10, minus 0.8 fees
        let net = book.close_at_price(&win, dec!(101), t0).unwrap();
        assert_eq!(net, dec!(9.2));
        assert_eq!(book.get(&win).unwrap().status(), OperationStatus::Completed);

        let net = book.close_at_price(&loss, dec!(99.5), t0).unwrap();
        assert_eq!(net, dec!(-5.8));
        let op = book.get(&loss).unwrap();
        assert_eq!(op.status(), OperationStatus::Stopped);
        assert_eq!(op.actual_profit(), Some(dec!(-5.8)));
    }

    #[test]
    fn test_capacity_and_delete() {
        let t0 = Utc::now();
        let mut book = OperationBook::default();
        let a = book.add(&sample_plan(Direction::Long), String::new(), t0);
        let b = book.add(&sample_plan(Direction::Short), String::new(), t0);
        book.start(&a, t0).unwrap();
        assert!(book.ensure_capacity(2).is_ok());
        assert_eq!(
            book.ensure_capacity(1),
            Err(PlannerError::TooManyActive { limit: 1 })
        );
        assert_eq!(book.planned().count(), 1);

        let removed = book.delete(&b).unwrap();
        assert_eq!(removed.id, b);
        assert_eq!(book.len(), 1);
        book.delete_all();
        assert!(book.is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let mut book = OperationBook::default();
        let id = book.add(&sample_plan(Direction::Long), String::new(), Utc::now());
        let json = serde_json::to_value(book.get(&id).unwrap()).unwrap();
        assert_eq!(json["status"], "PLANNED");
        assert_eq!(json["direction"], "LONG");
        assert_eq!(json["entryPrice"], "100");
        assert!(json["actualProfit"].is_null());
    }
}
