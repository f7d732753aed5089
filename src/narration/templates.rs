// src/narration/templates.rs
//! Deterministic texts: the narrator prompt, rejection explanations and the
//! fallback analysis used when no narrator answers.
use crate::strategies::opportunity::BlockingFactor;
use crate::strategies::scalper::stop_to_target_ratio;
use crate::strategies::viability::ViabilityReport;
use crate::types::{AssetQuote, PlanParameters, TechnicalSnapshot};
use crate::utils::precision::format_price;
use rust_decimal::Decimal;

/// Target used by the fallback text when the caller gave none.
fn default_target() -> Decimal {
    Decimal::new(5, 1)
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "n/a".to_string())
}

fn indicator_lines(technicals: Option<&TechnicalSnapshot>) -> Vec<String> {
    let Some(t) = technicals else {
        return vec!["- Indicators: unavailable".to_string()];
    };
    let mut lines = Vec::new();
    if let Some(rsi) = &t.rsi {
        lines.push(format!("- RSI(14): {:.2} | Signal: {:?}", rsi.value, rsi.signal));
    }
    if let Some(macd) = &t.macd {
        lines.push(format!(
            "- MACD: {:.6} | Signal: {:.6} | Trend: {:?}",
            macd.macd, macd.signal, macd.trend
        ));
    }
    if let Some(bb) = &t.bollinger {
        lines.push(format!(
            "- Bollinger: upper {:.6} | lower {:.6} | position {}",
            bb.upper, bb.lower, bb.position
        ));
    }
    if let Some(ema) = &t.ema {
        lines.push(format!(
            "- EMA20: {:.6} | EMA50: {:.6} | Trend: {:?}",
            ema.ema20, ema.ema50, ema.trend
        ));
    }
    if let Some(vol) = &t.volume {
        lines.push(format!("- Volume: {:.2}x | Trend: {:?}", vol.current, vol.trend));
    }
    if let Some(sr) = &t.support_resistance {
        lines.push(format!(
            "- Support: {:.6} | Resistance: {:.6}",
            sr.support, sr.resistance
        ));
    }
    lines
}

pub fn analysis_prompt(
    quote: &AssetQuote,
    technicals: Option<&TechnicalSnapshot>,
    params: &PlanParameters,
) -> String {
    let mut lines = vec![
        "Analyse this futures scalping setup and give a detailed recommendation.".to_string(),
        String::new(),
        "OPERATION PARAMETERS:".to_string(),
        format!("- Asset: {}", quote.symbol),
        format!("- Price: ${}", format_price(quote.price)),
        format!("- 24h change: {}%", quote.price_change_percent),
        format!("- 24h volume: ${}", quote.volume),
        format!("- Open interest: ${}", opt(quote.open_interest)),
        format!("- Funding rate: {}", opt(quote.funding_rate)),
        format!("- Capital: ${}", params.investment),
        format!("- Leverage: {}x", params.leverage),
        match params.timeframe_minutes {
            Some(m) => format!("- FIXED TIMEFRAME: {} minutes", m),
            None => "- Timeframe: optimise".to_string(),
        },
        match params.forced_direction {
            Some(d) => format!("- FORCED DIRECTION: {}", d),
            None => "- Direction: from technical analysis".to_string(),
        },
        match params.expected_profit_percent {
            Some(p) => format!("- EXPECTED PROFIT: {}%", p),
            None => "- Profit: risk based".to_string(),
        },
        String::new(),
        "TECHNICAL INDICATORS:".to_string(),
    ];
    lines.extend(indicator_lines(technicals));

    if let Some(p) = params.expected_profit_percent {
        lines.push(String::new());
        lines.push(format!(
            "PROFIT TARGET: assess the volatility, time and probability needed to reach {}%.",
            p
        ));
    }
    if let Some(m) = params.timeframe_minutes {
        lines.push(String::new());
        lines.push(format!(
            "TIMEFRAME: assess whether {} can move enough within {} minutes, including funding impact.",
            quote.symbol, m
        ));
    }
    if let Some(d) = params.forced_direction {
        lines.push(String::new());
        lines.push(format!(
            "DIRECTION: {} was requested; check whether the indicators support it.",
            d
        ));
    }

    lines.push(String::new());
    lines.push("Answer with: FINAL DECISION (LONG/SHORT/NOT VIABLE), technical score /10, confluence /5, \
        probability %, entry, take profit, stop loss, risk/reward, max loss, expected profit, final score /100."
        .to_string());
    lines.join("\n")
}

pub fn viability_explanation(symbol: &str, report: &ViabilityReport, params: &PlanParameters) -> String {
    let mut lines = vec![format!("OPERATION NOT VIABLE FOR {}", symbol), String::new()];
    lines.push("Blocking factors:".to_string());
    lines.extend(report.blocking_factors.iter().map(|f| format!("- {}", f)));

    lines.push(String::new());
    lines.push("Requested parameters:".to_string());
    if let Some(m) = params.timeframe_minutes {
        lines.push(format!("- Timeframe: {} minutes", m));
    }
    if let Some(d) = params.forced_direction {
        lines.push(format!("- Direction: {}", d));
    }
    if let Some(p) = params.expected_profit_percent {
        lines.push(format!("- Expected profit: {}%", p));
    }

    lines.push(String::new());
    lines.push("Suggestions:".to_string());
    if params.timeframe_minutes.is_some() {
        lines.push("- Use a longer timeframe or wait for more volatility".to_string());
    }
    if params.forced_direction.is_some() {
        lines.push("- Wait for a technical reversal or let the direction be chosen".to_string());
    }
    if params.expected_profit_percent.is_some() {
        lines.push("- Lower the expected profit or wait for more volatility".to_string());
    }
    lines.push("- Watch the asset for a few minutes for changing conditions".to_string());
    lines.push(String::new());
    lines.push("Recommendation: wait for better conditions or adjust the parameters.".to_string());
    lines.join("\n")
}

pub fn market_condition(average_volatility: Decimal) -> &'static str {
    if average_volatility < Decimal::ONE {
        "sideways market"
    } else if average_volatility < Decimal::from(3) {
        "moderate volatility"
    } else {
        "high volatility"
    }
}

pub fn no_opportunity_explanation(
    params: &PlanParameters,
    analysed: usize,
    average_volatility: Decimal,
    dominant: BlockingFactor,
) -> String {
    let mut lines = vec![
        "NO OPPORTUNITY FOUND".to_string(),
        String::new(),
        "Current market:".to_string(),
        format!("- Average volatility: {:.2}%", average_volatility),
        format!("- Assets analysed: {}", analysed),
        format!("- Conditions: {}", market_condition(average_volatility)),
        format!("- Main blocker: {}", dominant),
        String::new(),
        "Restrictive parameters:".to_string(),
    ];
    if let Some(m) = params.timeframe_minutes {
        lines.push(format!("- Fixed timeframe: {} minutes (needs high volatility)", m));
    }
    if let Some(d) = params.forced_direction {
        lines.push(format!("- Fixed direction: {} (against the current trend)", d));
    }
    if let Some(p) = params.expected_profit_percent {
        lines.push(format!("- Expected profit: {}% (too high for current conditions)", p));
    }
    lines.extend(
        [
            "",
            "Suggestions:",
            "- Remove the timeframe restriction",
            "- Let the direction be chosen automatically",
            "- Lower the expected profit",
            "- Wait 15-30 minutes for conditions to change",
            "- Consider lower leverage",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    lines.join("\n")
}

pub fn best_opportunity_summary(
    quote: &AssetQuote,
    params: &PlanParameters,
    score: Decimal,
    alternatives: usize,
) -> String {
    let direction = params
        .forced_direction
        .map(|d| d.to_string())
        .unwrap_or_else(|| "from analysis".to_string());
    let mut lines = vec![
        format!("BEST OPPORTUNITY FOUND: {}", quote.symbol),
        String::new(),
        "Criteria met:".to_string(),
        match params.timeframe_minutes {
            Some(m) => format!("- Timeframe: {} minutes", m),
            None => "- Timeframe: optimised".to_string(),
        },
        format!("- Direction: {}", direction),
        match params.expected_profit_percent {
            Some(p) => format!("- Expected profit: {}%", p),
            None => "- Profit: optimised".to_string(),
        },
        format!("- Volatility: {:.1}%", quote.volatility()),
        format!(
            "- Volume: ${:.0}M",
            quote.volume / Decimal::from(1_000_000)
        ),
        String::new(),
        format!("Opportunity score: {}", score.round_dp(1)),
        format!("Viable alternatives: {}", alternatives),
        format!("Entry price: ${}", format_price(quote.price)),
    ];
    lines.push(String::new());
    lines.push("Selected automatically from your criteria.".to_string());
    lines.join("\n")
}

/// Stand-in analysis with fixed scores. Only produced after the viability
/// gate has passed.
pub fn fallback_analysis(params: &PlanParameters) -> String {
    let direction = params
        .forced_direction
        .map(|d| d.to_string())
        .unwrap_or_else(|| "optimal direction".to_string());
    let target = params.expected_profit_percent.unwrap_or_else(default_target);
    let stop = target * stop_to_target_ratio();

    let mut lines = vec![
        format!(
            "FINAL DECISION: {}",
            params
                .forced_direction
                .map(|d| d.to_string())
                .unwrap_or_else(|| "LONG".to_string())
        ),
        String::new(),
        "QUANTITATIVE ANALYSIS (fallback mode):".to_string(),
        "- Technical score: 6.5/10".to_string(),
        "- Confluence: 3/5 indicators aligned".to_string(),
        format!("- Probability: 65% for {}", direction),
    ];
    if let Some(m) = params.timeframe_minutes {
        lines.push(format!("- Timeframe fit: 7/10 for {}min", m));
    }
    if let Some(p) = params.expected_profit_percent {
        lines.push(format!("- {}% profit viability: 7/10", p));
    }
    lines.push(String::new());
    lines.push("EXECUTION PLAN:".to_string());
    lines.push("- Entry: current price".to_string());
    lines.push(match params.timeframe_minutes {
        Some(m) => format!("- Take profit: {}% (within {}min)", target, m),
        None => format!("- Take profit: {}% (8-15min)", target),
    });
    lines.push(format!("- Stop loss: {}%", stop.normalize()));
    lines.push(String::new());
    lines.push("RISK:".to_string());
    lines.push("- Risk/Reward: 1:1.67".to_string());
    lines.push("- Viable with the given parameters".to_string());
    lines.push(String::new());
    lines.push("FINAL SCORE: 65/100".to_string());
    lines.push(String::new());
    lines.push("Note: fallback analysis, the narrator was unavailable.".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, RiskTolerance};
    use rust_decimal_macros::dec;

    fn params() -> PlanParameters {
        PlanParameters::new(dec!(100), 10, RiskTolerance::Medium)
    }

    #[test]
    fn test_fallback_uses_fixed_scores() {
        let text = fallback_analysis(&params());
        assert!(text.contains("6.5/10"));
        assert!(text.contains("65%"));
        assert!(text.contains("Take profit: 0.5%"));
        assert!(text.contains("Stop loss: 0.3%"));
    }

    #[test]
    fn test_fallback_reflects_constraints() {
        let mut p = params();
        p.forced_direction = Some(Direction::Short);
        p.timeframe_minutes = Some(20);
        p.expected_profit_percent = Some(dec!(2));
        let text = fallback_analysis(&p);
        assert!(text.starts_with("FINAL DECISION: SHORT"));
        assert!(text.contains("within 20min"));
        assert!(text.contains("Stop loss: 1.2%"));
    }

    #[test]
    fn test_viability_explanation_lists_every_factor() {
        let report = ViabilityReport {
            viable: false,
            blocking_factors: vec!["first".into(), "second".into()],
        };
        let mut p = params();
        p.timeframe_minutes = Some(15);
        let text = viability_explanation("ADAUSDT", &report, &p);
        assert!(text.contains("NOT VIABLE FOR ADAUSDT"));
        assert!(text.contains("- first\n- second"));
        assert!(text.contains("- Timeframe: 15 minutes"));
        assert!(text.contains("longer timeframe"));
    }

    #[test]
    fn test_market_condition_buckets() {
        assert_eq!(market_condition(dec!(0.4)), "sideways market");
        assert_eq!(market_condition(dec!(2.2)), "moderate volatility");
        assert_eq!(market_condition(dec!(3)), "high volatility");
    }
}
