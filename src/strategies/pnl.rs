// src/strategies/pnl.rs
use crate::types::Direction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Taker fee per side (0.04%).
pub fn taker_fee_rate() -> Decimal {
    Decimal::new(4, 4)
}

/// Share of one 8h funding interval a scalp is assumed to be exposed to.
pub fn funding_exposure() -> Decimal {
    Decimal::new(33, 2)
}

/// Entry and exit both pay the taker fee on the full notional.
pub fn round_trip_fees(investment: Decimal, leverage: u32) -> Decimal {
    investment * Decimal::from(leverage) * taker_fee_rate() * Decimal::from(2)
}

pub fn funding_cost(funding_rate: Decimal, investment: Decimal, leverage: u32) -> Decimal {
    funding_rate.abs() * investment * Decimal::from(leverage) * funding_exposure()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PnlBreakdown {
    pub gross: Decimal,
    pub fees: Decimal,
    pub funding_cost: Decimal,
    pub net: Decimal,
}

impl PnlBreakdown {
    pub fn from_gross(gross: Decimal, fees: Decimal, funding_cost: Decimal) -> Self {
        Self {
            gross,
            fees,
            funding_cost,
            net: gross - fees - funding_cost,
        }
    }

    pub fn is_profit(&self) -> bool {
        self.net >= Decimal::ZERO
    }
}

/// Leveraged P&L of moving from `entry` to `current`, net of the costs
/// already booked on the operation.
pub fn compute_pnl(
    direction: Direction,
    entry: Decimal,
    current: Decimal,
    investment: Decimal,
    leverage: u32,
    fees: Decimal,
    funding_cost: Decimal,
) -> PnlBreakdown {
    if entry.is_zero() {
        return PnlBreakdown::from_gross(Decimal::ZERO, fees, funding_cost);
    }
    let price_move = match direction {
        Direction::Long => (current - entry) / entry,
        Direction::Short => (entry - current) / entry,
    };
    let gross = price_move * investment * Decimal::from(leverage);
    PnlBreakdown::from_gross(gross, fees, funding_cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_trip_fees() {
        assert_eq!(round_trip_fees(dec!(100), 10), dec!(0.8));
        assert_eq!(round_trip_fees(dec!(250), 20), dec!(4));
    }

    #[test]
    fn test_funding_cost_uses_absolute_rate() {
        let pos = funding_cost(dec!(0.0001), dec!(100), 10);
        let neg = funding_cost(dec!(-0.0001), dec!(100), 10);
        assert_eq!(pos, dec!(0.033));
        assert_eq!(pos, neg);
    }

    #[test]
    fn test_long_pnl() {
        let pnl = compute_pnl(
            Direction::Long,
            dec!(100),
            dec!(102),
            dec!(100),
            10,
            dec!(0.8),
            dec!(0),
        );
        assert_eq!(pnl.gross, dec!(20));
        assert_eq!(pnl.net, dec!(19.2));
        assert!(pnl.is_profit());
    }

    #[test]
    fn test_short_pnl_loses_when_price_rises() {
        let pnl = compute_pnl(
            Direction::Short,
            dec!(100),
            dec!(101),
            dec!(100),
            10,
            dec!(0.8),
            dec!(0.2),
        );
        assert_eq!(pnl.gross, dec!(-10));
        assert_eq!(pnl.net, dec!(-11));
        assert!(!pnl.is_profit());
    }

    #[test]
    fn test_zero_entry_is_flat() {
        let pnl = compute_pnl(
            Direction::Long,
            Decimal::ZERO,
            dec!(5),
            dec!(100),
            10,
            dec!(0.8),
            dec!(0),
        );
        assert_eq!(pnl.gross, Decimal::ZERO);
        assert_eq!(pnl.net, dec!(-0.8));
    }
}
