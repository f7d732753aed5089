// src/narration/mod.rs
pub mod review;
pub mod templates;

use crate::connectors::traits::Narrator;
use crate::strategies::viability;
use crate::types::{AssetQuote, PlanParameters, TechnicalSnapshot};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Narrative {
    pub viable: bool,
    pub reason: Option<String>,
    pub text: String,
    /// False when the text came from the deterministic fallback.
    pub narrated: bool,
}

/// Viability gate in front of an optional narrator. Whatever the narrator
/// does, a rejected candidate is never narrated and a failed call always
/// yields the fallback text.
#[derive(Clone, Default)]
pub struct NarrationService {
    narrator: Option<Arc<dyn Narrator>>,
}

impl NarrationService {
    pub fn new(narrator: Option<Arc<dyn Narrator>>) -> Self {
        Self { narrator }
    }

    pub fn is_online(&self) -> bool {
        self.narrator.is_some()
    }

    pub async fn analyse(
        &self,
        quote: &AssetQuote,
        technicals: Option<&TechnicalSnapshot>,
        params: &PlanParameters,
    ) -> Narrative {
        let report = viability::evaluate(quote, technicals, params);
        if !report.viable {
            info!(
                "{} not viable: {}",
                quote.symbol,
                report.blocking_factors.join("; ")
            );
            return Narrative {
                viable: false,
                reason: report.reason().map(str::to_string),
                text: templates::viability_explanation(&quote.symbol, &report, params),
                narrated: false,
            };
        }

        if let Some(narrator) = &self.narrator {
            let prompt = templates::analysis_prompt(quote, technicals, params);
            match narrator.narrate(&prompt).await {
                Ok(text) => {
                    return Narrative {
                        viable: true,
                        reason: None,
                        text,
                        narrated: true,
                    }
                }
                Err(e) => warn!("Narration failed for {}, using fallback: {:#}", quote.symbol, e),
            }
        }

        Narrative {
            viable: true,
            reason: None,
            text: templates::fallback_analysis(params),
            narrated: false,
        }
    }
}
