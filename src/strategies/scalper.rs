// src/strategies/scalper.rs
use crate::error::PlannerError;
use crate::strategies::pnl::{self, PnlBreakdown};
use crate::types::{
    AssetQuote, Direction, DurationEstimate, EmaTrend, ExternalRecommendation, MacdTrend,
    PlanParameters, Recommendation, ScalpingPlan, TechnicalSnapshot,
};
use rust_decimal::Decimal;
use tracing::debug;

/// Stop distance as a fraction of the target distance.
pub fn stop_to_target_ratio() -> Decimal {
    Decimal::new(6, 1)
}

/// Tallies bullish vs bearish signals. The external recommendation counts
/// double; ties go SHORT.
pub fn determine_direction(
    technicals: Option<&TechnicalSnapshot>,
    external: Option<&ExternalRecommendation>,
    price_change_percent: Decimal,
) -> Direction {
    let mut bullish = 0u32;
    let mut bearish = 0u32;

    match external.map(|e| e.recommendation) {
        Some(Recommendation::Buy) => bullish += 2,
        Some(Recommendation::Sell) => bearish += 2,
        _ => {}
    }

    if let Some(t) = technicals {
        if let Some(rsi) = &t.rsi {
            if rsi.is_oversold() {
                bullish += 1;
            }
            if rsi.is_overbought() {
                bearish += 1;
            }
        }
        match t.macd_trend() {
            Some(MacdTrend::Bullish) => bullish += 1,
            Some(MacdTrend::Bearish) => bearish += 1,
            None => {}
        }
        match t.ema_trend() {
            Some(EmaTrend::Up) => bullish += 1,
            Some(EmaTrend::Down) => bearish += 1,
            None => {}
        }
    }

    if price_change_percent > Decimal::ONE {
        bullish += 1;
    }
    if price_change_percent < -Decimal::ONE {
        bearish += 1;
    }

    debug!("Direction tally: {} bullish / {} bearish", bullish, bearish);

    if bullish > bearish {
        Direction::Long
    } else {
        Direction::Short
    }
}

/// User target when given, otherwise 0.3% + multiplier x 0.2%.
pub fn target_profit_percent(params: &PlanParameters) -> Decimal {
    params.expected_profit_percent.unwrap_or_else(|| {
        Decimal::new(3, 1) + params.risk_tolerance.multiplier() * Decimal::new(2, 1)
    })
}

pub fn estimate_duration(
    volatility: Decimal,
    technicals: Option<&TechnicalSnapshot>,
) -> DurationEstimate {
    let volume_increasing = technicals.is_some_and(TechnicalSnapshot::volume_increasing);
    if volatility > Decimal::from(3) || volume_increasing {
        DurationEstimate::Fast
    } else if volatility > Decimal::new(15, 1) {
        DurationEstimate::Medium
    } else {
        DurationEstimate::Slow
    }
}

fn outside_neutral_band(value: f64) -> bool {
    value > 60.0 || value < 40.0
}

/// Heuristic confidence score, clamped to [45, 90] with an external
/// recommendation and [45, 85] without one.
pub fn success_rate(
    technicals: Option<&TechnicalSnapshot>,
    external: Option<&ExternalRecommendation>,
    volatility: Decimal,
    risk_multiplier: Decimal,
) -> Decimal {
    let mut rate = Decimal::from(55);

    let ceiling = match external {
        Some(ext) => {
            if ext.recommendation != Recommendation::Neutral {
                rate += Decimal::from(15);
            }
            if outside_neutral_band(ext.oscillators) {
                rate += Decimal::from(5);
            }
            if outside_neutral_band(ext.moving_averages) {
                rate += Decimal::from(5);
            }
            Decimal::from(90)
        }
        None => Decimal::from(85),
    };

    if let Some(t) = technicals {
        if t.trend_confluence() {
            rate += Decimal::from(10);
        }
        if t.volume_increasing() {
            rate += Decimal::from(8);
        }
    }
    if volatility > Decimal::from(2) {
        rate += Decimal::from(5);
    }
    rate += risk_multiplier * Decimal::from(5);

    rate.max(Decimal::from(45)).min(ceiling)
}

/// Builds a complete plan for `asset`. Missing technicals are treated as
/// absent signals; only malformed parameters or a non-positive price fail.
pub fn build_plan(
    asset: &AssetQuote,
    technicals: Option<&TechnicalSnapshot>,
    params: &PlanParameters,
) -> Result<ScalpingPlan, PlannerError> {
    params.validate()?;
    if asset.price <= Decimal::ZERO {
        return Err(PlannerError::InvalidParameters(format!(
            "{} has a non-positive price {}",
            asset.symbol, asset.price
        )));
    }

    let technicals = technicals.or(asset.technicals.as_ref());
    let external = asset.tradingview.as_ref();
    let volatility = asset.volatility();

    let direction = params.forced_direction.unwrap_or_else(|| {
        determine_direction(technicals, external, asset.price_change_percent)
    });

    let risk_multiplier = params.risk_tolerance.multiplier();
    let target_pct = target_profit_percent(params);
    let stop_pct = target_pct * stop_to_target_ratio();
    let hundred = Decimal::ONE_HUNDRED;

    let entry_price = asset.price;
    let (exit_price, stop_loss) = match direction {
        Direction::Long => (
            entry_price * (Decimal::ONE + target_pct / hundred),
            entry_price * (Decimal::ONE - stop_pct / hundred),
        ),
        Direction::Short => (
            entry_price * (Decimal::ONE - target_pct / hundred),
            entry_price * (Decimal::ONE + stop_pct / hundred),
        ),
    };

    let fees = pnl::round_trip_fees(params.investment, params.leverage);
    let funding_cost =
        pnl::funding_cost(asset.funding_rate_or_zero(), params.investment, params.leverage);
    let gross = params.notional() * target_pct / hundred;
    let profit = PnlBreakdown::from_gross(gross, fees, funding_cost);

    let plan = ScalpingPlan {
        symbol: asset.symbol.clone(),
        direction,
        entry_price,
        exit_price,
        stop_loss,
        leverage: params.leverage,
        investment: params.investment,
        target_profit_percent: target_pct,
        stop_loss_percent: stop_pct,
        expected_profit: profit.gross,
        risk_reward: target_pct / stop_pct,
        duration: estimate_duration(volatility, technicals),
        success_rate: success_rate(technicals, external, volatility, risk_multiplier),
        fees: profit.fees,
        net_profit: profit.net,
        funding_cost: profit.funding_cost,
    };

    debug!(
        "Plan for {}: {} entry {} exit {} stop {} net {}",
        plan.symbol, plan.direction, plan.entry_price, plan.exit_price, plan.stop_loss, plan.net_profit
    );

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        EmaReading, MacdReading, RiskTolerance, RsiReading, RsiSignal, VolumeReading, VolumeTrend,
    };
    use rust_decimal_macros::dec;

    fn quote(change: Decimal, funding: Option<Decimal>) -> AssetQuote {
        AssetQuote {
            symbol: "ETHUSDT".to_string(),
            price: dec!(2600),
            price_change_percent: change,
            volume: dec!(1800000000),
            open_interest: None,
            funding_rate: funding,
            technicals: None,
            tradingview: None,
            source: "test".to_string(),
        }
    }

    fn technicals(
        rsi: f64,
        macd: MacdTrend,
        ema: EmaTrend,
        volume: VolumeTrend,
    ) -> TechnicalSnapshot {
        TechnicalSnapshot {
            rsi: Some(RsiReading {
                value: rsi,
                signal: RsiSignal::Neutral,
            }),
            macd: Some(MacdReading {
                macd: 0.1,
                signal: 0.05,
                histogram: 0.05,
                trend: macd,
            }),
            bollinger: None,
            ema: Some(EmaReading {
                ema20: 1.0,
                ema50: 1.0,
                trend: ema,
            }),
            volume: Some(VolumeReading {
                current: 1.4,
                average: 1.0,
                trend: volume,
            }),
            support_resistance: None,
        }
    }

    fn external(rec: Recommendation, osc: f64, ma: f64) -> ExternalRecommendation {
        ExternalRecommendation {
            recommendation: rec,
            oscillators: osc,
            moving_averages: ma,
            summary: 50.0,
            confidence: 80.0,
        }
    }

    #[test]
    fn test_medium_risk_defaults() {
        let params = PlanParameters::new(dec!(100), 10, RiskTolerance::Medium);
        let plan = build_plan(&quote(dec!(0.5), None), None, &params).unwrap();

        assert_eq!(plan.target_profit_percent, dec!(0.5));
        assert_eq!(plan.stop_loss_percent, dec!(0.30));
        assert_eq!(plan.expected_profit, dec!(5));
        assert_eq!(plan.fees, dec!(0.8));
        assert_eq!(plan.funding_cost, Decimal::ZERO);
        assert_eq!(plan.net_profit, dec!(4.2));
    }

    #[test]
    fn test_target_by_risk_tolerance() {
        let mut p = PlanParameters::new(dec!(100), 10, RiskTolerance::Low);
        assert_eq!(target_profit_percent(&p), dec!(0.4));
        p.risk_tolerance = RiskTolerance::High;
        assert_eq!(target_profit_percent(&p), dec!(0.6));
        p.expected_profit_percent = Some(dec!(2.5));
        assert_eq!(target_profit_percent(&p), dec!(2.5));
    }

    #[test]
    fn test_prices_bracket_entry_for_both_directions() {
        for (direction, change) in [(Direction::Long, dec!(3)), (Direction::Short, dec!(-3))] {
            for risk in [RiskTolerance::Low, RiskTolerance::Medium, RiskTolerance::High] {
                for expected in [None, Some(dec!(0.1)), Some(dec!(4))] {
                    let mut p = PlanParameters::new(dec!(250), 20, risk);
                    p.forced_direction = Some(direction);
                    p.expected_profit_percent = expected;
                    let plan = build_plan(&quote(change, Some(dec!(0.0003))), None, &p).unwrap();
                    match plan.direction {
                        Direction::Long => {
                            assert!(plan.stop_loss < plan.entry_price);
                            assert!(plan.entry_price < plan.exit_price);
                        }
                        Direction::Short => {
                            assert!(plan.exit_price < plan.entry_price);
                            assert!(plan.entry_price < plan.stop_loss);
                        }
                    }
                    assert_eq!(plan.stop_loss_percent, plan.target_profit_percent * dec!(0.6));
                    assert_eq!(
                        plan.risk_reward,
                        plan.target_profit_percent / plan.stop_loss_percent
                    );
                }
            }
        }
    }

    #[test]
    fn test_funding_reduces_net_profit() {
        let params = PlanParameters::new(dec!(100), 10, RiskTolerance::Medium);
        let plan = build_plan(&quote(dec!(0.5), Some(dec!(-0.0002))), None, &params).unwrap();
        assert_eq!(plan.funding_cost, dec!(0.066));
        assert_eq!(plan.net_profit, dec!(5) - dec!(0.8) - dec!(0.066));
    }

    #[test]
    fn test_direction_without_signals_is_short() {
        assert_eq!(determine_direction(None, None, dec!(0.5)), Direction::Short);
        assert_eq!(determine_direction(None, None, dec!(1.5)), Direction::Long);
    }

    #[test]
    fn test_external_recommendation_weighs_double() {
        let tech = technicals(50.0, MacdTrend::Bearish, EmaTrend::Up, VolumeTrend::Decreasing);
        // 1 bull (EMA) vs 1 bear (MACD) is a tie: SHORT.
        assert_eq!(determine_direction(Some(&tech), None, dec!(0)), Direction::Short);
        let buy = external(Recommendation::Buy, 50.0, 50.0);
        assert_eq!(
            determine_direction(Some(&tech), Some(&buy), dec!(-1.5)),
            Direction::Long
        );
    }

    #[test]
    fn test_forced_direction_wins() {
        let mut p = PlanParameters::new(dec!(100), 10, RiskTolerance::Medium);
        p.forced_direction = Some(Direction::Long);
        let plan = build_plan(&quote(dec!(-5), None), None, &p).unwrap();
        assert_eq!(plan.direction, Direction::Long);
    }

    #[test]
    fn test_duration_buckets() {
        let rising = technicals(50.0, MacdTrend::Bullish, EmaTrend::Up, VolumeTrend::Increasing);
        assert_eq!(estimate_duration(dec!(3.1), None), DurationEstimate::Fast);
        assert_eq!(estimate_duration(dec!(0.2), Some(&rising)), DurationEstimate::Fast);
        assert_eq!(estimate_duration(dec!(1.6), None), DurationEstimate::Medium);
        assert_eq!(estimate_duration(dec!(1.5), None), DurationEstimate::Slow);
    }

    #[test]
    fn test_success_rate_without_technicals() {
        // 55 + 1.0 x 5
        assert_eq!(success_rate(None, None, dec!(1), Decimal::ONE), dec!(60));
        // Low floor never reached by bonuses alone, but stays 45 or above.
        assert!(success_rate(None, None, dec!(0), dec!(0.5)) >= dec!(45));
    }

    #[test]
    fn test_success_rate_is_clamped() {
        let best = technicals(20.0, MacdTrend::Bullish, EmaTrend::Up, VolumeTrend::Increasing);
        let strong = external(Recommendation::Sell, 10.0, 95.0);
        let high = dec!(1.5);

        // 55 + 10 + 8 + 5 + 7.5 = 85.5 -> 85 without the external rating.
        assert_eq!(success_rate(Some(&best), None, dec!(5), high), dec!(85));
        // With it the ceiling is 90.
        assert_eq!(success_rate(Some(&best), Some(&strong), dec!(5), high), dec!(90));
    }

    #[test]
    fn test_success_rate_bounds_over_combinations() {
        let macds = [MacdTrend::Bullish, MacdTrend::Bearish];
        let emas = [EmaTrend::Up, EmaTrend::Down];
        let volumes = [VolumeTrend::Increasing, VolumeTrend::Decreasing];
        let recs = [Recommendation::Buy, Recommendation::Sell, Recommendation::Neutral];
        let risks = [RiskTolerance::Low, RiskTolerance::Medium, RiskTolerance::High];
        for m in macds {
            for e in emas {
                for v in volumes {
                    let tech = technicals(50.0, m, e, v);
                    for r in recs {
                        for band in [0.0, 50.0, 100.0] {
                            let ext = external(r, band, band);
                            for risk in risks {
                                for vol in [dec!(0), dec!(2.5), dec!(50)] {
                                    for ext_opt in [None, Some(&ext)] {
                                        let rate = success_rate(
                                            Some(&tech),
                                            ext_opt,
                                            vol,
                                            risk.multiplier(),
                                        );
                                        assert!(rate >= dec!(45) && rate <= dec!(90));
                                        if ext_opt.is_none() {
                                            assert!(rate <= dec!(85));
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let params = PlanParameters::new(dec!(0), 10, RiskTolerance::Medium);
        assert!(build_plan(&quote(dec!(1), None), None, &params).is_err());

        let params = PlanParameters::new(dec!(100), 10, RiskTolerance::Medium);
        let mut q = quote(dec!(1), None);
        q.price = Decimal::ZERO;
        assert!(matches!(
            build_plan(&q, None, &params),
            Err(PlannerError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_oversized_target_rejected() {
        let crash = quote(dec!(-60), None);
        for direction in [Direction::Short, Direction::Long] {
            let mut p = PlanParameters::new(dec!(100), 10, RiskTolerance::Medium);
            p.forced_direction = Some(direction);
            p.expected_profit_percent = Some(dec!(150));
            assert!(matches!(
                build_plan(&crash, None, &p),
                Err(PlannerError::InvalidParameters(_))
            ));
        }

        let mut p = PlanParameters::new(dec!(100), 10, RiskTolerance::Medium);
        p.forced_direction = Some(Direction::Short);
        p.expected_profit_percent = Some(dec!(99));
        let plan = build_plan(&crash, None, &p).unwrap();
        assert!(plan.exit_price > Decimal::ZERO);
        assert!(plan.stop_loss > Decimal::ZERO);
    }
}
