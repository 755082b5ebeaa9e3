use crypto_autotrader::{
    config::{Settings, TradingMode},
    connectors::{GatewayNavSource, PaperVenue},
    core::{Clock, StrategyClass, SystemClock},
    exchanges::{BinanceVenue, Market},
    init_logging,
    market_data::{MarketDataCollector, SnapshotCache},
    monitoring::{HeartbeatMonitor, JournalSink},
    oms::Gateway,
    realtime::{SchedulerConfig, SchedulerParts, SignalGenerator, TradeExecutor, TradingScheduler},
    risk::RiskEngine,
    strategies::{PolicyRegistry, Screener},
    traits::{NavSource, VenueClient},
};
use log::{error, info, warn};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast;

fn build_venue(
    settings: &Settings,
    market: Market,
) -> Result<Arc<dyn VenueClient>, Box<dyn std::error::Error>> {
    let key = settings.api_key.clone().unwrap_or_default();
    let secret = settings.api_secret.clone().unwrap_or_default();
    let binance: Arc<dyn VenueClient> = Arc::new(BinanceVenue::new(market, key, secret)?);
    Ok(match settings.mode {
        TradingMode::Live => binance,
        TradingMode::Paper => Arc::new(PaperVenue::new(binance)),
    })
}

async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let policies = PolicyRegistry::load(&[
        (StrategyClass::Spot, settings.spot.policy_path.clone()),
        (StrategyClass::Futures, settings.futures.policy_path.clone()),
    ])?;

    let spot = Arc::new(Gateway::new(
        "spot",
        build_venue(&settings, Market::Spot)?,
        settings.spot.min_interval,
        settings.retry_policy(),
    ));
    let futures = Arc::new(Gateway::new(
        "fut",
        build_venue(&settings, Market::UsdFutures)?,
        settings.futures.min_interval,
        settings.retry_policy(),
    ));

    let nav_source = Arc::new(GatewayNavSource::new(spot.clone(), futures.clone()));
    let default_nav = match nav_source.latest().await {
        Ok(nav) => {
            info!("Starting NAV spot={} futures={}", nav.nav_a, nav.nav_b);
            nav
        }
        Err(err) => {
            warn!("Account NAV unavailable, using configured defaults: {}", err);
            settings.default_nav()
        }
    };

    let collector = Arc::new(MarketDataCollector::new(
        spot.clone(),
        futures.clone(),
        Arc::new(SnapshotCache::new()),
        clock.clone(),
        settings.interval.clone(),
        settings.kline_limit,
    ));
    let risk = Arc::new(RiskEngine::new(settings.risk_config(), clock.clone()));
    let executor = Arc::new(TradeExecutor::new(
        risk.clone(),
        spot,
        futures,
        settings.spot.clone(),
        settings.futures.clone(),
    ));

    let config = SchedulerConfig {
        cycle_interval: settings.cycle_interval,
        heartbeat_interval: settings.heartbeat_interval,
        reset_sweep_interval: settings.reset_sweep_interval,
        monitor_interval: settings.monitor_interval,
    };
    let max_beat_age = chrono::Duration::from_std(settings.heartbeat_interval * 3)?;

    let scheduler = Arc::new(TradingScheduler::new(
        config,
        SchedulerParts {
            universe: settings.universe(),
            spot_profile: settings.spot.clone(),
            futures_profile: settings.futures.clone(),
            collector,
            screener: Screener::new(settings.screener_config()),
            signals: SignalGenerator::new(Arc::new(policies)),
            risk,
            executor,
            nav_source,
            default_nav,
            events: Arc::new(JournalSink::new(clock.clone())),
            heartbeat: Arc::new(HeartbeatMonitor::new(max_beat_age)),
            clock,
        },
    ));

    let (shutdown, _) = broadcast::channel(1);
    let signal_tx = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received");
            let _ = signal_tx.send(());
        }
    });

    scheduler.run(shutdown).await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("configuration error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_logging(&settings.log_level, settings.log_file.as_deref()) {
        eprintln!("failed to initialise logging: {}", err);
        return ExitCode::FAILURE;
    }

    info!(
        "autotrader starting in {:?} mode: {} spot / {} futures symbols",
        settings.mode,
        settings.spot_symbols.len(),
        settings.fut_symbols.len()
    );

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("fatal: {}", err);
            ExitCode::FAILURE
        }
    }
}
