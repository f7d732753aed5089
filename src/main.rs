// src/main.rs
use anyhow::Context;
use dotenvy::dotenv;
use scalp_planner::config::{AppConfig, NarrationConfig, ProviderKind, RunMode};
use scalp_planner::connectors::binance::BinanceFuturesClient;
use scalp_planner::connectors::coingecko::CoinGeckoClient;
use scalp_planner::connectors::groq::GroqNarrator;
use scalp_planner::connectors::synthetic::{SyntheticMarket, SyntheticTechnicals};
use scalp_planner::connectors::traits::{MarketDataProvider, Narrator, StreamClient};
use scalp_planner::core::advisor::{Advisor, Analysis};
use scalp_planner::core::engine::{run_analysis, stored_planning_request, PlannerEngine};
use scalp_planner::core::feed::MarketFeed;
use scalp_planner::narration::NarrationService;
use scalp_planner::storage::StateStore;
use scalp_planner::utils::precision::format_price;
use scalp_planner::{logging, tui};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::new().context("Invalid configuration")?;
    let _guard = logging::init("logs", config.mode == RunMode::Plan);

    let timeout = config.market.request_timeout();
    let providers = build_providers(&config, timeout)?;
    let feed = Arc::new(MarketFeed::new(
        providers,
        config.market.cache_ttl(),
        timeout,
    ));
    let narration = NarrationService::new(build_narrator(&config.narration));
    if !narration.is_online() {
        info!("No narration key configured, using template narratives");
    }
    let advisor = Arc::new(Advisor::new(Arc::new(SyntheticTechnicals), narration));

    match config.mode {
        RunMode::Plan => {
            let store = StateStore::new(&config.storage.state_file);
            let request = stored_planning_request(&config, &store).await;
            let analysis = run_analysis(&feed, &advisor, &request).await?;
            print_analysis(&analysis);
        }
        RunMode::Dashboard => {
            let (ui_tx, ui_rx) = mpsc::channel(100);
            let (cmd_tx, cmd_rx) = mpsc::channel(16);

            let stream: Option<Arc<dyn StreamClient>> = if config.market.stream_ticks {
                Some(Arc::new(BinanceFuturesClient::new(
                    config.market.symbols.clone(),
                    timeout,
                )?))
            } else {
                None
            };
            let store = StateStore::new(&config.storage.state_file);
            let mut engine =
                PlannerEngine::new(config, feed, advisor, stream, store, ui_tx, cmd_rx);

            let engine_handle = tokio::spawn(async move {
                if let Err(e) = engine.run().await {
                    error!("Fatal Engine Error: {:#}", e);
                }
            });

            let ui_result = tui::run(ui_rx, cmd_tx).await;
            // The command sender is gone now, so the engine saves and exits.
            if let Err(e) = engine_handle.await {
                error!("Engine task failed: {}", e);
            }
            ui_result?;
        }
    }

    Ok(())
}

fn build_providers(
    config: &AppConfig,
    timeout: Duration,
) -> anyhow::Result<Vec<Arc<dyn MarketDataProvider>>> {
    let mut providers: Vec<Arc<dyn MarketDataProvider>> = Vec::new();
    for kind in &config.market.providers {
        let provider: Arc<dyn MarketDataProvider> = match kind {
            ProviderKind::BinanceFutures => Arc::new(BinanceFuturesClient::new(
                config.market.symbols.clone(),
                timeout,
            )?),
            ProviderKind::Coingecko => Arc::new(CoinGeckoClient::new(timeout)?),
            ProviderKind::Synthetic => Arc::new(SyntheticMarket::default()),
        };
        providers.push(provider);
    }
    Ok(providers)
}

fn build_narrator(config: &NarrationConfig) -> Option<Arc<dyn Narrator>> {
    if !config.enabled {
        return None;
    }
    let api_key = config
        .api_key
        .clone()
        .or_else(|| env::var("GROQ_API_KEY").ok())
        .filter(|k| !k.trim().is_empty())?;
    match GroqNarrator::new(
        &config.base_url,
        &api_key,
        &config.model,
        config.max_tokens,
        config.temperature,
        Duration::from_secs(config.timeout_secs),
    ) {
        Ok(narrator) => Some(Arc::new(narrator)),
        Err(e) => {
            warn!("Narration disabled: {:#}", e);
            None
        }
    }
}

fn print_analysis(analysis: &Analysis) {
    println!("========================================");
    println!("       SCALP PLANNER");
    println!("========================================");
    if let Some(symbol) = &analysis.selected_symbol {
        let how = if analysis.auto_selected {
            format!("auto-selected, {} alternatives", analysis.alternatives)
        } else {
            "requested".to_string()
        };
        println!("Asset:  {} ({})", symbol, how);
    }
    match &analysis.plan {
        Some(plan) => {
            println!("Side:   {} {}x", plan.direction, plan.leverage);
            println!(
                "Entry:  {}  Exit: {}  Stop: {}",
                format_price(plan.entry_price),
                format_price(plan.exit_price),
                format_price(plan.stop_loss)
            );
            println!(
                "Profit: ${:.2} gross, ${:.2} fees, ${:.2} funding, ${:.2} net",
                plan.expected_profit, plan.fees, plan.funding_cost, plan.net_profit
            );
            println!(
                "Odds:   {}% success, R/R {:.2}, {}",
                plan.success_rate, plan.risk_reward, plan.duration
            );
        }
        None => println!(
            "Not viable: {}",
            analysis.reason.as_deref().unwrap_or("no reason given")
        ),
    }
    println!("----------------------------------------");
    println!("{}", analysis.narrative);
}
