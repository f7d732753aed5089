// src/narration/review.rs
use crate::core::operations::TradingOperation;
use rust_decimal::Decimal;
use serde::Serialize;

/// Planned vs realized comparison of a closed operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationReview {
    pub profit_difference: Decimal,
    pub profit_difference_percent: Decimal,
    pub duration_minutes: i64,
    pub success: bool,
    pub accuracy_score: Decimal,
    pub summary: String,
}

pub fn review_operation(op: &TradingOperation) -> OperationReview {
    let planned = op.planned_profit;
    let actual = op.actual_profit().unwrap_or(Decimal::ZERO);
    let profit_difference = actual - planned;
    let profit_difference_percent = if planned.is_zero() {
        Decimal::ZERO
    } else {
        profit_difference / planned.abs() * Decimal::ONE_HUNDRED
    };
    let duration_minutes = op.duration_minutes().unwrap_or(0);
    let success = actual > Decimal::ZERO;
    let accuracy_score =
        (Decimal::ONE_HUNDRED - profit_difference_percent.abs()).max(Decimal::ZERO);

    let summary = [
        if success {
            "SUCCESSFUL OPERATION".to_string()
        } else {
            "LOSING OPERATION".to_string()
        },
        format!("{} {} | {}", op.symbol, op.direction, op.status()),
        format!("Planned: ${:.2} | Actual: ${:.2}", planned, actual),
        format!(
            "Difference: ${:.2} ({:.1}%)",
            profit_difference, profit_difference_percent
        ),
        format!("Duration: {}min", duration_minutes),
        if success {
            "Lesson: the strategy played out as expected".to_string()
        } else {
            "Lesson: the market moved against the position".to_string()
        },
    ]
    .join("\n");

    OperationReview {
        profit_difference,
        profit_difference_percent,
        duration_minutes,
        success,
        accuracy_score,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::operations::OperationBook;
    use crate::types::{Direction, DurationEstimate, ScalpingPlan};
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn closed(planned: Decimal, actual: Decimal, minutes: i64) -> TradingOperation {
        let plan = ScalpingPlan {
            symbol: "BNBUSDT".to_string(),
            direction: Direction::Long,
            entry_price: dec!(712),
            exit_price: dec!(715.56),
            stop_loss: dec!(709.86),
            leverage: 10,
            investment: dec!(100),
            target_profit_percent: dec!(0.5),
            stop_loss_percent: dec!(0.3),
            expected_profit: planned,
            risk_reward: dec!(1.67),
            duration: DurationEstimate::Medium,
            success_rate: dec!(68),
            fees: dec!(0.8),
            net_profit: planned - dec!(0.8),
            funding_cost: Decimal::ZERO,
        };
        let start = Utc::now();
        let mut book = OperationBook::default();
        let id = book.add(&plan, String::new(), start);
        book.start(&id, start).unwrap();
        let end = start + Duration::minutes(minutes);
        if actual >= Decimal::ZERO {
            book.complete(&id, actual, dec!(715), end).unwrap();
        } else {
            book.stop(&id, actual.abs(), dec!(710), end).unwrap();
        }
        book.get(&id).unwrap().clone()
    }

    #[test]
    fn test_review_metrics() {
        let review = review_operation(&closed(dec!(5), dec!(4), 9));
        assert_eq!(review.profit_difference, dec!(-1));
        assert_eq!(review.profit_difference_percent, dec!(-20));
        assert_eq!(review.duration_minutes, 9);
        assert!(review.success);
        assert_eq!(review.accuracy_score, dec!(80));
        assert!(review.summary.starts_with("SUCCESSFUL OPERATION"));
    }

    #[test]
    fn test_accuracy_floors_at_zero() {
        let review = review_operation(&closed(dec!(5), dec!(-6), 3));
        assert_eq!(review.profit_difference_percent, dec!(-220));
        assert_eq!(review.accuracy_score, Decimal::ZERO);
        assert!(!review.success);
    }

    #[test]
    fn test_zero_planned_profit() {
        let review = review_operation(&closed(Decimal::ZERO, dec!(1), 1));
        assert_eq!(review.profit_difference_percent, Decimal::ZERO);
        assert_eq!(review.accuracy_score, dec!(100));
    }
}
