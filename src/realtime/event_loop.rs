use crate::config::ClassProfile;
use crate::core::clock::Clock;
use crate::core::events::TradingEvent;
use crate::core::model::{NavSnapshot, ScoredCandidate, StrategyClass};
use crate::market_data::{MarketDataCollector, SnapshotMap, Universe};
use crate::monitoring::HeartbeatMonitor;
use crate::realtime::{SignalGenerator, TradeExecutor};
use crate::risk::{RiskEngine, RiskStatus};
use crate::strategies::Screener;
use crate::traits::{EventSink, NavSource};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Cadences of the main cycle and the background loops
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub cycle_interval: Duration,
    pub heartbeat_interval: Duration,
    pub reset_sweep_interval: Duration,
    pub monitor_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(3600),
            heartbeat_interval: Duration::from_secs(30),
            reset_sweep_interval: Duration::from_secs(3600),
            monitor_interval: Duration::from_secs(60),
        }
    }
}

/// Collaborators of the scheduler
pub struct SchedulerParts {
    pub universe: Universe,
    pub spot_profile: ClassProfile,
    pub futures_profile: ClassProfile,
    pub collector: Arc<MarketDataCollector>,
    pub screener: Screener,
    pub signals: SignalGenerator,
    pub risk: Arc<RiskEngine>,
    pub executor: Arc<TradeExecutor>,
    pub nav_source: Arc<dyn NavSource>,
    /// Used until the NAV source first answers
    pub default_nav: NavSnapshot,
    pub events: Arc<dyn EventSink>,
    pub heartbeat: Arc<HeartbeatMonitor>,
    pub clock: Arc<dyn Clock>,
}

/// What happened to one class in one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassReport {
    pub scored: usize,
    pub executed: usize,
    pub rejected: usize,
    /// Not executed: decision failure or class paused
    pub skipped: usize,
    pub paused: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub snapshots: usize,
    pub classes: BTreeMap<StrategyClass, ClassReport>,
}

impl CycleReport {
    pub fn class(&self, class: StrategyClass) -> ClassReport {
        self.classes.get(&class).cloned().unwrap_or_default()
    }

    pub fn executed(&self) -> usize {
        self.classes.values().map(|c| c.executed).sum()
    }
}

/// Fixed-cadence trading loop:
/// collect, score, refresh NAV and daily stops, execute, feed back outcomes.
///
/// Heartbeat, reset sweep and pause monitor run as independent tasks.
pub struct TradingScheduler {
    config: SchedulerConfig,
    universe: Universe,
    spot_profile: ClassProfile,
    futures_profile: ClassProfile,
    collector: Arc<MarketDataCollector>,
    screener: Screener,
    signals: SignalGenerator,
    risk: Arc<RiskEngine>,
    executor: Arc<TradeExecutor>,
    nav_source: Arc<dyn NavSource>,
    events: Arc<dyn EventSink>,
    heartbeat: Arc<HeartbeatMonitor>,
    clock: Arc<dyn Clock>,
    last_nav: Mutex<NavSnapshot>,
    cycles: AtomicU64,
}

impl TradingScheduler {
    pub fn new(config: SchedulerConfig, parts: SchedulerParts) -> Self {
        Self {
            config,
            universe: parts.universe,
            spot_profile: parts.spot_profile,
            futures_profile: parts.futures_profile,
            collector: parts.collector,
            screener: parts.screener,
            signals: parts.signals,
            risk: parts.risk,
            executor: parts.executor,
            nav_source: parts.nav_source,
            events: parts.events,
            heartbeat: parts.heartbeat,
            clock: parts.clock,
            last_nav: Mutex::new(parts.default_nav),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn risk(&self) -> &Arc<RiskEngine> {
        &self.risk
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    fn profile(&self, class: StrategyClass) -> &ClassProfile {
        match class {
            StrategyClass::Spot => &self.spot_profile,
            StrategyClass::Futures => &self.futures_profile,
        }
    }

    /// Run one full cycle. Partial failures stay inside the report.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.emit(TradingEvent::SchedulerTick { cycle });
        info!("Cycle {} started", cycle);

        let snapshots = self.collector.collect_all(&self.universe).await;
        let ranked = self.score(&snapshots);

        let (nav, fresh) = self.refresh_nav().await;
        // A fallback NAV must not become the day's opening NAV
        if fresh {
            self.risk.apply_nav(&nav).await;
        }
        self.check_daily_stops().await;

        let mut report = CycleReport {
            cycle,
            snapshots: snapshots.len(),
            classes: BTreeMap::new(),
        };
        for class in StrategyClass::ALL {
            let candidates = ranked.get(&class).map(Vec::as_slice).unwrap_or(&[]);
            let class_report = self
                .process_signals(class, candidates, nav.for_class(class))
                .await;
            report.classes.insert(class, class_report);
        }

        info!(
            "Cycle {} done: {} snapshots, {} orders executed",
            cycle,
            report.snapshots,
            report.executed()
        );
        report
    }

    fn score(&self, snapshots: &SnapshotMap) -> BTreeMap<StrategyClass, Vec<ScoredCandidate>> {
        let mut ranked = BTreeMap::new();
        for (class, symbols) in &self.universe {
            let series = symbols.iter().filter_map(|symbol| {
                snapshots
                    .get(&(*class, symbol.clone()))
                    .map(|snapshot| (&snapshot.symbol, snapshot.candles.as_slice()))
            });
            let candidates = self
                .screener
                .score(*class, series, self.profile(*class).fee_rate);

            self.events.emit(TradingEvent::SignalsScored {
                class: *class,
                symbols: candidates.iter().map(|c| c.symbol.clone()).collect(),
            });
            ranked.insert(*class, candidates);
        }
        ranked
    }

    /// Latest NAV, or the previous one when the source has nothing.
    /// The flag is true when the source answered.
    async fn refresh_nav(&self) -> (NavSnapshot, bool) {
        let mut last = self.last_nav.lock().await;
        match self.nav_source.latest().await {
            Ok(nav) => {
                *last = nav;
                (nav, true)
            }
            Err(err) => {
                warn!("NAV refresh failed, reusing {}: {}", last.nav_total, err);
                (*last, false)
            }
        }
    }

    async fn check_daily_stops(&self) {
        for class in StrategyClass::ALL {
            let Some(pnl_pct) = self.risk.daily_pnl_pct(class).await else {
                continue;
            };
            let threshold = self.profile(class).daily_stop_pct;
            if self.risk.check_daily_stop(class, pnl_pct, threshold).await {
                self.emit_paused(class).await;
            }
        }
    }

    async fn process_signals(
        &self,
        class: StrategyClass,
        candidates: &[ScoredCandidate],
        nav: rust_decimal::Decimal,
    ) -> ClassReport {
        let mut report = ClassReport {
            scored: candidates.len(),
            ..ClassReport::default()
        };
        let mut outcomes = Vec::with_capacity(candidates.len());

        for (index, candidate) in candidates.iter().enumerate() {
            if self.risk.status(class).await.is_paused() {
                self.emit_paused(class).await;
                report.paused = true;
                report.skipped += candidates.len() - index;
                break;
            }

            let request = match self
                .signals
                .build_request(class, candidate, self.profile(class))
            {
                Ok(request) => request,
                Err(err) => {
                    warn!("[{}] {} skipped: {}", class, candidate.symbol, err);
                    report.skipped += 1;
                    continue;
                }
            };

            let result = self.executor.execute(nav, &request).await;
            match (result.accepted, result.order_response, result.reason) {
                (true, Some(response), _) => {
                    report.executed += 1;
                    self.events.emit(TradingEvent::OrderExecuted {
                        class,
                        symbol: request.symbol.clone(),
                        side: request.side,
                        response,
                    });
                    outcomes.push(true);
                }
                (_, _, reason) => {
                    report.rejected += 1;
                    self.events.emit(TradingEvent::OrderRejected {
                        class,
                        symbol: request.symbol.clone(),
                        reason: reason.unwrap_or_else(|| "unknown".to_string()),
                    });
                    outcomes.push(false);
                }
            }
        }

        // Outcomes count only once the class is done for this cycle
        for accepted in outcomes {
            let status = if accepted {
                self.risk.register_win(class).await
            } else {
                self.risk.register_loss(class).await
            };
            debug!("[{}] feedback {} -> {:?}", class, accepted, status);
        }
        report
    }

    async fn emit_paused(&self, class: StrategyClass) {
        if let Some(state) = self.risk.snapshot(class).await {
            self.events.emit(TradingEvent::CampaignPaused {
                class,
                until: state.paused_until,
                reason: state.pause_reason.map(|r| r.to_string()),
            });
        }
    }

    /// Stamp the heartbeat monitor and publish a heartbeat event
    pub fn beat(&self) {
        let at = self.clock.now();
        self.heartbeat.beat(at);
        self.events.emit(TradingEvent::Heartbeat { at });
    }

    /// Publish `campaign_paused` for every class currently paused
    pub async fn report_paused(&self) -> usize {
        let mut paused = 0;
        for class in StrategyClass::ALL {
            if let RiskStatus::Paused { .. } = self.risk.status(class).await {
                self.emit_paused(class).await;
                paused += 1;
            }
        }
        paused
    }

    /// Runs until `shutdown` fires. A cycle in progress always finishes.
    pub async fn run(self: Arc<Self>, shutdown: broadcast::Sender<()>) {
        info!(
            "Scheduler starting: cycle {:?}, heartbeat {:?}, reset sweep {:?}",
            self.config.cycle_interval,
            self.config.heartbeat_interval,
            self.config.reset_sweep_interval
        );

        let background = vec![
            tokio::spawn(Self::heartbeat_loop(self.clone(), shutdown.subscribe())),
            tokio::spawn(Self::reset_loop(self.clone(), shutdown.subscribe())),
            tokio::spawn(Self::monitor_loop(self.clone(), shutdown.subscribe())),
        ];

        let mut shutdown_rx = shutdown.subscribe();
        let mut ticker = interval(self.config.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested, stopping cycles");
                    break;
                }
            }
            self.run_cycle().await;
        }

        for handle in background {
            if let Err(err) = handle.await {
                error!("Background loop ended abnormally: {}", err);
            }
        }
        info!("Scheduler stopped after {} cycles", self.cycles());
    }

    async fn heartbeat_loop(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.config.heartbeat_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.beat(),
                _ = shutdown.recv() => break,
            }
        }
    }

    async fn reset_loop(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.config.reset_sweep_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.risk.reset_expired().await;
                }
                _ = shutdown.recv() => break,
            }
        }
    }

    async fn monitor_loop(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.config.monitor_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.report_paused().await;
                }
                _ = shutdown.recv() => break,
            }
        }
    }
}
