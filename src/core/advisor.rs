// src/core/advisor.rs
use crate::connectors::synthetic::SyntheticTechnicals;
use crate::connectors::traits::TechnicalSource;
use crate::error::PlannerError;
use crate::narration::{templates, NarrationService};
use crate::strategies::opportunity::{find_best_opportunity, OpportunitySearch};
use crate::strategies::scalper::build_plan;
use crate::types::{AssetQuote, PlanParameters, ScalpingPlan, TechnicalSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// None asks for the best asset in the feed.
    #[serde(default)]
    pub symbol: Option<String>,
    pub params: PlanParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub viable: bool,
    pub reason: Option<String>,
    pub narrative: String,
    pub narrated: bool,
    pub selected_symbol: Option<String>,
    pub auto_selected: bool,
    pub alternatives: usize,
    pub plan: Option<ScalpingPlan>,
}

impl Analysis {
    fn rejected(reason: String, narrative: String, symbol: Option<String>) -> Self {
        Self {
            viable: false,
            reason: Some(reason),
            narrative,
            narrated: false,
            selected_symbol: symbol,
            auto_selected: false,
            alternatives: 0,
            plan: None,
        }
    }
}

/// Runs one planning request against a market snapshot: viability or
/// ranking, narration, then the plan itself.
pub struct Advisor {
    technicals: Arc<dyn TechnicalSource>,
    narration: NarrationService,
}

impl Advisor {
    pub fn new(technicals: Arc<dyn TechnicalSource>, narration: NarrationService) -> Self {
        Self {
            technicals,
            narration,
        }
    }

    /// Only malformed parameters are errors; rejection is a normal outcome.
    pub async fn analyze(
        &self,
        quotes: &[AssetQuote],
        request: &AnalysisRequest,
    ) -> Result<Analysis, PlannerError> {
        request.params.validate()?;
        match request.symbol.as_deref() {
            Some(symbol) => self.analyze_symbol(quotes, symbol, &request.params).await,
            None => self.auto_select(quotes, &request.params).await,
        }
    }

    async fn analyze_symbol(
        &self,
        quotes: &[AssetQuote],
        symbol: &str,
        params: &PlanParameters,
    ) -> Result<Analysis, PlannerError> {
        let Some(quote) = quotes.iter().find(|q| q.symbol.eq_ignore_ascii_case(symbol)) else {
            let err = PlannerError::SymbolNotFound(symbol.to_string());
            warn!("{}", err);
            return Ok(Analysis::rejected(
                err.to_string(),
                format!("Asset {} not found in the current market data.", symbol),
                Some(symbol.to_string()),
            ));
        };

        let technicals = self.technicals_for(quote).await;
        let narrative = self
            .narration
            .analyse(quote, Some(&technicals), params)
            .await;

        if !narrative.viable {
            return Ok(Analysis::rejected(
                narrative.reason.unwrap_or_default(),
                narrative.text,
                Some(quote.symbol.clone()),
            ));
        }

        let plan = build_plan(quote, Some(&technicals), params)?;
        info!(
            "Plan ready for {}: {} net {:.2}",
            plan.symbol, plan.direction, plan.net_profit
        );
        Ok(Analysis {
            viable: true,
            reason: None,
            narrative: narrative.text,
            narrated: narrative.narrated,
            selected_symbol: Some(quote.symbol.clone()),
            auto_selected: false,
            alternatives: 0,
            plan: Some(plan),
        })
    }

    async fn auto_select(
        &self,
        quotes: &[AssetQuote],
        params: &PlanParameters,
    ) -> Result<Analysis, PlannerError> {
        info!("Searching best opportunity across {} assets", quotes.len());
        match find_best_opportunity(quotes, params) {
            OpportunitySearch::NoneViable {
                analysed,
                average_volatility,
                dominant_factor,
            } => {
                info!("No viable opportunity: {}", dominant_factor);
                Ok(Analysis::rejected(
                    dominant_factor.description().to_string(),
                    templates::no_opportunity_explanation(
                        params,
                        analysed,
                        average_volatility,
                        dominant_factor,
                    ),
                    None,
                ))
            }
            OpportunitySearch::Found {
                quote,
                score,
                alternatives,
            } => {
                info!(
                    "Best opportunity {} (score {}, {} viable)",
                    quote.symbol, score, alternatives
                );
                let technicals = self.technicals_for(quote).await;
                let plan = build_plan(quote, Some(&technicals), params)?;
                Ok(Analysis {
                    viable: true,
                    reason: None,
                    narrative: templates::best_opportunity_summary(
                        quote,
                        params,
                        score,
                        alternatives,
                    ),
                    narrated: false,
                    selected_symbol: Some(quote.symbol.clone()),
                    auto_selected: true,
                    alternatives,
                    plan: Some(plan),
                })
            }
        }
    }

    /// Feed-supplied indicators win; otherwise the technical source, and
    /// synthetic values when that fails.
    async fn technicals_for(&self, quote: &AssetQuote) -> TechnicalSnapshot {
        if let Some(t) = &quote.technicals {
            return t.clone();
        }
        match self.technicals.snapshot(&quote.symbol).await {
            Ok(t) => t,
            Err(e) => {
                warn!("Technicals unavailable for {}: {:#}", quote.symbol, e);
                SyntheticTechnicals::generate(&quote.symbol)
            }
        }
    }
}
