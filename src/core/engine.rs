// src/core/engine.rs
use crate::config::AppConfig;
use crate::config::UserSettings;
use crate::connectors::traits::StreamClient;
use crate::core::advisor::{Advisor, Analysis, AnalysisRequest};
use crate::core::feed::MarketFeed;
use crate::core::monitor::PositionMonitor;
use crate::core::operations::{OperationBook, TradingOperation};
use crate::core::stats::{compute_stats, TradingStats};
use crate::narration::review::review_operation;
use crate::error::PlannerError;
use crate::storage::{PersistedState, StateStore};
use crate::types::{AssetQuote, PriceTick, UiCommand, UiEvent};
use crate::utils::precision::format_price;
use anyhow::Result;
use chrono::{Local, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Fetch a snapshot (cached within TTL) and analyse it.
pub async fn run_analysis(
    feed: &MarketFeed,
    advisor: &Advisor,
    request: &AnalysisRequest,
) -> Result<Analysis, PlannerError> {
    let quotes = feed.quotes().await;
    advisor.analyze(&quotes, request).await
}

/// Planning request sized from the account state: the persisted operations
/// and settings when a state file exists, the configured settings otherwise.
pub async fn stored_planning_request(config: &AppConfig, store: &StateStore) -> AnalysisRequest {
    let state = match store.load().await {
        Ok(Some(state)) => state,
        Ok(None) => PersistedState {
            operations: Vec::new(),
            settings: config.settings.clone(),
        },
        Err(e) => {
            warn!("Ignoring unreadable state, using configured settings: {:#}", e);
            PersistedState {
                operations: Vec::new(),
                settings: config.settings.clone(),
            }
        }
    };
    sized_request(config, &state.operations, &state.settings)
}

fn sized_request(
    config: &AppConfig,
    operations: &[TradingOperation],
    settings: &UserSettings,
) -> AnalysisRequest {
    let capital = compute_stats(operations, settings, Local::now()).total_capital;
    config.planner.request(capital, settings)
}

/// Owns the operation list and settings. Timers and fetches feed it through
/// channels; every mutation is persisted and republished to the dashboard.
pub struct PlannerEngine {
    config: AppConfig,
    feed: Arc<MarketFeed>,
    advisor: Arc<Advisor>,
    stream: Option<Arc<dyn StreamClient>>,
    store: StateStore,
    book: OperationBook,
    settings: UserSettings,
    monitor: PositionMonitor,
    last_analysis: Option<Analysis>,
    subscriptions: HashMap<String, JoinHandle<()>>,
    ui_sender: mpsc::Sender<UiEvent>,
    command_receiver: mpsc::Receiver<UiCommand>,
    tick_sender: mpsc::Sender<PriceTick>,
    tick_receiver: mpsc::Receiver<PriceTick>,
    analysis_sender: mpsc::Sender<Result<Analysis, PlannerError>>,
    analysis_receiver: mpsc::Receiver<Result<Analysis, PlannerError>>,
}

impl PlannerEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AppConfig,
        feed: Arc<MarketFeed>,
        advisor: Arc<Advisor>,
        stream: Option<Arc<dyn StreamClient>>,
        store: StateStore,
        ui_sender: mpsc::Sender<UiEvent>,
        command_receiver: mpsc::Receiver<UiCommand>,
    ) -> Self {
        let settings = config.settings.clone();
        let (tick_sender, tick_receiver) = mpsc::channel(256);
        let (analysis_sender, analysis_receiver) = mpsc::channel(4);
        Self {
            config,
            feed,
            advisor,
            stream,
            store,
            book: OperationBook::default(),
            settings,
            monitor: PositionMonitor::new(),
            last_analysis: None,
            subscriptions: HashMap::new(),
            ui_sender,
            command_receiver,
            tick_sender,
            tick_receiver,
            analysis_sender,
            analysis_receiver,
        }
    }

    pub fn book(&self) -> &OperationBook {
        &self.book
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    pub fn stats(&self) -> TradingStats {
        compute_stats(self.book.all(), &self.settings, Local::now())
    }

    pub fn last_analysis(&self) -> Option<&Analysis> {
        self.last_analysis.as_ref()
    }

    pub async fn load_state(&mut self) {
        match self.store.load().await {
            Ok(Some(state)) => {
                self.book = OperationBook::new(state.operations);
                self.settings = state.settings;
            }
            Ok(None) => info!("No saved state, starting fresh"),
            Err(e) => error!("Failed to load state, starting fresh: {:#}", e),
        }
    }

    async fn save_state(&self) {
        let state = PersistedState {
            operations: self.book.all().to_vec(),
            settings: self.settings.clone(),
        };
        if let Err(e) = self.store.save(&state).await {
            error!("Failed to save planner state: {:#}", e);
        }
    }

    fn send_ui_event(&self, event: UiEvent) {
        match self.ui_sender.try_send(event) {
            Ok(_) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("UI Channel closed! Interface is likely dead.");
            }
        }
    }

    fn log(&self, message: String) {
        self.send_ui_event(UiEvent::Log(message));
    }

    fn publish_operations(&self) {
        self.send_ui_event(UiEvent::Operations {
            operations: self.book.all().to_vec(),
            stats: self.stats(),
        });
    }

    async fn commit_changes(&mut self) {
        self.save_state().await;
        self.publish_operations();
        self.subscribe_active().await;
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("Engine starting...");
        self.load_state().await;
        self.publish_operations();

        self.subscribe_active().await;

        let (quote_tx, mut quote_rx) = mpsc::channel::<Vec<AssetQuote>>(8);

        let mut poll = tokio::time::interval(Duration::from_secs(
            self.config.market.poll_interval_secs.max(1),
        ));
        let mut monitor = tokio::time::interval(Duration::from_secs(
            self.config.market.monitor_interval_secs.max(1),
        ));

        info!(
            "Engine loop running. Poll {}s, monitor {}s",
            self.config.market.poll_interval_secs, self.config.market.monitor_interval_secs
        );

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    // Fetches may overlap; the latest to resolve wins.
                    let feed = self.feed.clone();
                    let tx = quote_tx.clone();
                    tokio::spawn(async move {
                        let quotes = feed.quotes().await;
                        let _ = tx.send(quotes).await;
                    });
                }
                Some(quotes) = quote_rx.recv() => {
                    self.on_quotes(quotes).await;
                }
                Some(tick) = self.tick_receiver.recv() => {
                    self.monitor.on_tick(&tick);
                    self.send_ui_event(UiEvent::PriceUpdate(tick));
                }
                _ = monitor.tick() => {
                    self.check_positions();
                }
                Some(result) = self.analysis_receiver.recv() => {
                    self.on_analysis(result);
                }
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            info!("Command channel closed, stopping engine");
                            break;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl+C received, stopping engine");
                    break;
                }
            }
        }

        self.close_streams();
        self.save_state().await;
        Ok(())
    }

    async fn on_quotes(&mut self, quotes: Vec<AssetQuote>) {
        for quote in &quotes {
            self.monitor.update_price(&quote.symbol, quote.price);
        }
        self.send_ui_event(UiEvent::MarketUpdate(quotes));
        self.subscribe_active().await;
    }

    /// Keeps exactly one live trade stream per symbol with an active
    /// operation. Streams for closed symbols are aborted; streams that ended
    /// on their own are dropped and reopened.
    async fn subscribe_active(&mut self) {
        let active: HashSet<String> = self.book.active().map(|op| op.symbol.clone()).collect();

        self.subscriptions.retain(|symbol, handle| {
            if !active.contains(symbol) {
                info!("Closing tick stream for {}", symbol);
                handle.abort();
                false
            } else if handle.is_finished() {
                warn!("Tick stream for {} ended, resubscribing", symbol);
                false
            } else {
                true
            }
        });

        if !self.config.market.stream_ticks {
            return;
        }
        let Some(stream) = self.stream.clone() else {
            return;
        };
        for symbol in active {
            if self.subscriptions.contains_key(&symbol) {
                continue;
            }
            match stream.subscribe_ticker(&symbol, self.tick_sender.clone()).await {
                Ok(handle) => {
                    self.subscriptions.insert(symbol, handle);
                }
                Err(e) => warn!("Tick stream for {} unavailable: {:#}", symbol, e),
            }
        }
    }

    fn close_streams(&mut self) {
        for (_, handle) in self.subscriptions.drain() {
            handle.abort();
        }
    }

    fn check_positions(&mut self) {
        let alerts = self
            .monitor
            .check(&self.book, self.settings.enable_real_time_alerts);
        for alert in alerts {
            self.send_ui_event(UiEvent::Alert(alert.message()));
        }
    }

    fn on_analysis(&mut self, result: Result<Analysis, PlannerError>) {
        match result {
            Ok(analysis) => {
                match &analysis.plan {
                    Some(plan) => self.log(format!(
                        "Plan: {} {} entry {} exit {} stop {}",
                        plan.symbol,
                        plan.direction,
                        format_price(plan.entry_price),
                        format_price(plan.exit_price),
                        format_price(plan.stop_loss)
                    )),
                    None => self.log(format!(
                        "Not viable: {}",
                        analysis.reason.as_deref().unwrap_or("unknown")
                    )),
                }
                self.send_ui_event(UiEvent::Analysis(Box::new(analysis.clone())));
                self.last_analysis = Some(analysis);
            }
            Err(e) => {
                warn!("Analysis rejected: {}", e);
                self.log(format!("Analysis failed: {}", e));
            }
        }
    }

    fn planning_request(&self) -> AnalysisRequest {
        sized_request(&self.config, self.book.all(), &self.settings)
    }

    pub async fn handle_command(&mut self, command: UiCommand) {
        let now = Utc::now();
        match command {
            UiCommand::Plan => {
                let feed = self.feed.clone();
                let advisor = self.advisor.clone();
                let request = self.planning_request();
                let tx = self.analysis_sender.clone();
                self.log("Analysing...".to_string());
                tokio::spawn(async move {
                    let result = run_analysis(&feed, &advisor, &request).await;
                    let _ = tx.send(result).await;
                });
            }
            UiCommand::Commit => {
                let Some(analysis) = self.last_analysis.take() else {
                    self.log("Nothing to commit, plan first".to_string());
                    return;
                };
                let Some(plan) = &analysis.plan else {
                    self.log("Last analysis has no viable plan".to_string());
                    return;
                };
                let id = self.book.add(plan, analysis.narrative.clone(), now);
                self.log(format!("Planned operation {}", short_id(&id)));
                self.commit_changes().await;
            }
            UiCommand::StartNext => {
                let Some(id) = self.book.planned().next().map(|op| op.id.clone()) else {
                    self.log("No planned operation".to_string());
                    return;
                };
                let result = self
                    .book
                    .ensure_capacity(self.settings.max_simultaneous_operations)
                    .and_then(|_| self.book.start(&id, now));
                match result {
                    Ok(()) => {
                        self.log(format!("Started {}", short_id(&id)));
                        self.commit_changes().await;
                    }
                    Err(e) => self.log(format!("Cannot start: {}", e)),
                }
            }
            UiCommand::CloseNext => {
                let Some(op) = self.book.active().next() else {
                    self.log("No active operation".to_string());
                    return;
                };
                let id = op.id.clone();
                let Some(price) = self.monitor.latest_price(&op.symbol) else {
                    self.log(format!("No price for {} yet", op.symbol));
                    return;
                };
                match self.book.close_at_price(&id, price, now) {
                    Ok(net) => {
                        self.log(format!("Closed {} at {} (net {:.2})", short_id(&id), price, net));
                        if let Some(review) = self.book.get(&id).map(review_operation) {
                            self.log(review.summary);
                        }
                        self.commit_changes().await;
                    }
                    Err(e) => self.log(format!("Cannot close: {}", e)),
                }
            }
            UiCommand::DeleteNext => {
                let Some(id) = self.book.closed().next().map(|op| op.id.clone()) else {
                    self.log("No closed operation to delete".to_string());
                    return;
                };
                if let Err(e) = self.book.delete(&id) {
                    self.log(format!("Cannot delete: {}", e));
                    return;
                }
                self.log(format!("Deleted {}", short_id(&id)));
                self.commit_changes().await;
            }
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::synthetic::SyntheticTechnicals;
    use crate::core::operations::OperationStatus;
    use crate::narration::NarrationService;
    use crate::types::ScalpingPlan;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine() -> (PlannerEngine, mpsc::Receiver<UiEvent>, mpsc::Sender<UiCommand>) {
        engine_with_stream(None)
    }

    fn engine_with_stream(
        stream: Option<Arc<dyn StreamClient>>,
    ) -> (PlannerEngine, mpsc::Receiver<UiEvent>, mpsc::Sender<UiCommand>) {
        let mut config = AppConfig::default();
        config.planner.investment = Some(dec!(100));
        let feed = Arc::new(MarketFeed::new(
            Vec::new(),
            Duration::from_secs(45),
            Duration::from_secs(1),
        ));
        let advisor = Arc::new(Advisor::new(
            Arc::new(SyntheticTechnicals),
            NarrationService::default(),
        ));
        let path = std::env::temp_dir().join(format!("engine_{}.json", uuid::Uuid::new_v4()));
        let (ui_tx, ui_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let engine = PlannerEngine::new(
            config,
            feed,
            advisor,
            stream,
            StateStore::new(path),
            ui_tx,
            cmd_rx,
        );
        (engine, ui_rx, cmd_tx)
    }

    #[tokio::test]
    async fn test_plan_commit_start_close_delete() {
        let (mut engine, _ui, _cmd) = engine();

        engine.handle_command(UiCommand::Commit).await;
        assert!(engine.book().is_empty());

        engine.handle_command(UiCommand::Plan).await;
        let result = engine.analysis_receiver.recv().await.unwrap();
        engine.on_analysis(result);
        let analysis = engine.last_analysis().unwrap();
        assert!(analysis.viable);
        assert!(analysis.auto_selected);
        let plan = analysis.plan.clone().unwrap();

        engine.handle_command(UiCommand::Commit).await;
        assert_eq!(engine.book().planned().count(), 1);

        engine.handle_command(UiCommand::StartNext).await;
        assert_eq!(engine.book().active().count(), 1);

        // Closing flat loses the fees.
        engine.monitor.update_price(&plan.symbol, plan.entry_price);
        engine.handle_command(UiCommand::CloseNext).await;
        let op = &engine.book().all()[0];
        assert_eq!(op.status(), OperationStatus::Stopped);
        assert_eq!(op.actual_profit(), Some(-plan.fees - plan.funding_cost));
        assert_eq!(engine.stats().total_operations, 1);

        engine.handle_command(UiCommand::DeleteNext).await;
        assert!(engine.book().is_empty());

        tokio::fs::remove_file(engine.store.path()).await.ok();
    }

    /// Counts opened and still-running stream tasks. `drop_after_open`
    /// makes every task end right away, like a server disconnect.
    struct CountingStream {
        opened: Arc<AtomicUsize>,
        live: Arc<AtomicUsize>,
        drop_after_open: bool,
    }

    struct LiveGuard(Arc<AtomicUsize>);

    impl Drop for LiveGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl StreamClient for CountingStream {
        async fn subscribe_ticker(
            &self,
            _symbol: &str,
            _sender: mpsc::Sender<PriceTick>,
        ) -> Result<JoinHandle<()>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            self.live.fetch_add(1, Ordering::SeqCst);
            let guard = LiveGuard(self.live.clone());
            let drop_after_open = self.drop_after_open;
            Ok(tokio::spawn(async move {
                let _guard = guard;
                if !drop_after_open {
                    std::future::pending::<()>().await;
                }
            }))
        }
    }

    fn counting_stream(drop_after_open: bool) -> (Arc<CountingStream>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let opened = Arc::new(AtomicUsize::new(0));
        let live = Arc::new(AtomicUsize::new(0));
        let stream = Arc::new(CountingStream {
            opened: opened.clone(),
            live: live.clone(),
            drop_after_open,
        });
        (stream, opened, live)
    }

    async fn start_planned(engine: &mut PlannerEngine) -> ScalpingPlan {
        engine.handle_command(UiCommand::Plan).await;
        let result = engine.analysis_receiver.recv().await.unwrap();
        engine.on_analysis(result);
        let plan = engine.last_analysis().unwrap().plan.clone().unwrap();
        engine.handle_command(UiCommand::Commit).await;
        engine.handle_command(UiCommand::StartNext).await;
        plan
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_closing_operation_aborts_its_stream() {
        let (stream, opened, live) = counting_stream(false);
        let (mut engine, _ui, _cmd) = engine_with_stream(Some(stream as Arc<dyn StreamClient>));

        let plan = start_planned(&mut engine).await;
        settle().await;
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(live.load(Ordering::SeqCst), 1);
        assert!(engine.subscriptions.contains_key(&plan.symbol));

        // A second refresh must not open a duplicate.
        engine.subscribe_active().await;
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        engine.monitor.update_price(&plan.symbol, plan.entry_price);
        engine.handle_command(UiCommand::CloseNext).await;
        settle().await;
        assert!(engine.subscriptions.is_empty());
        assert_eq!(live.load(Ordering::SeqCst), 0);

        tokio::fs::remove_file(engine.store.path()).await.ok();
    }

    #[tokio::test]
    async fn test_ended_stream_is_reopened() {
        let (stream, opened, _live) = counting_stream(true);
        let (mut engine, _ui, _cmd) = engine_with_stream(Some(stream as Arc<dyn StreamClient>));

        let plan = start_planned(&mut engine).await;
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        settle().await;

        engine.subscribe_active().await;
        assert_eq!(opened.load(Ordering::SeqCst), 2);
        assert!(engine.subscriptions.contains_key(&plan.symbol));

        tokio::fs::remove_file(engine.store.path()).await.ok();
    }

    #[tokio::test]
    async fn test_stored_request_grows_with_realised_profit() {
        let mut config = AppConfig::default();
        let path = std::env::temp_dir().join(format!("plan_{}.json", uuid::Uuid::new_v4()));
        let store = StateStore::new(path);

        let fresh = stored_planning_request(&config, &store).await;
        assert_eq!(fresh.params.investment, dec!(20));

        let (mut engine, _ui, _cmd) = engine();
        let plan = start_planned(&mut engine).await;
        let id = engine.book().active().next().unwrap().id.clone();
        engine.book.complete(&id, dec!(250), plan.exit_price, Utc::now()).unwrap();
        store
            .save(&PersistedState {
                operations: engine.book().all().to_vec(),
                settings: UserSettings::default(),
            })
            .await
            .unwrap();

        // Persisted settings win over the configured ones.
        config.settings.initial_capital = dec!(1);
        let request = stored_planning_request(&config, &store).await;
        assert_eq!(engine.stats().total_capital, dec!(1250));
        assert_eq!(request.params.investment, dec!(25));

        tokio::fs::remove_file(store.path()).await.ok();
        tokio::fs::remove_file(engine.store.path()).await.ok();
    }

    #[tokio::test]
    async fn test_close_without_price_is_noop() {
        let (mut engine, _ui, _cmd) = engine();
        engine.handle_command(UiCommand::CloseNext).await;
        engine.handle_command(UiCommand::StartNext).await;
        assert!(engine.book().is_empty());
    }
}
